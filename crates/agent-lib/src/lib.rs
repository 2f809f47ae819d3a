//! Per-container network statistics collection
//!
//! This crate provides:
//! - Parsers for the per-process TCP, UDP and extended TCP tables in procfs
//! - Discovery, collection and housekeeping loops with cooperative shutdown
//! - A bounded, time-ordered sample store
//! - Prometheus and JSON export of the store
//! - Health checks and self-observability

pub mod collector;
pub mod error;
pub mod export;
pub mod health;
pub mod models;
pub mod observability;
pub mod storage;

pub use error::{ParseError, StoreError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use storage::SampleStore;
