//! Prometheus exporter for Kamstrup heat meters.
//!
//! The exporter polls the JSON endpoint of a smart gateway attached to the
//! meter and exposes the reading via an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Smart gateway  │<────│    Collector    │<────│   HTTP Server   │
//! │  (JSON status)  │     │  (6 samples)    │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Nothing is cached: every scrape triggers exactly one request to the
//! gateway. Unreachable gateways and unreadable values are reported as `0`.
//!
//! # Usage
//!
//! ```bash
//! PORT=9100 kamstir-exporter --device-url http://gateway.local:82/kamst-ir/api/read
//! ```

pub mod collector;
pub mod config;
pub mod device;
pub mod http;
pub mod mapping;

pub use collector::{MeterCollector, Sample, SharedCollector};
pub use config::ExporterConfig;
pub use device::{HttpFetcher, Snapshot, SnapshotSource};
pub use http::HttpServer;
pub use mapping::{DESCRIPTORS, MetricDescriptor, MetricKind};
