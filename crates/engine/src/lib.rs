//! # Engine Crate
//!
//! Wires the detector, simulator and analytics crates into a single scan
//! pipeline behind an explicit engine context, and exposes the
//! request/response operation surface plus an async service wrapper with
//! timeout and cancellation.

pub mod api;
pub mod config;
pub mod context;
pub mod metrics;
pub mod pipeline;
pub mod service;
pub mod source;

pub use api::{ApiError, ApiResponse};
pub use config::EngineConfig;
pub use context::EngineContext;
pub use pipeline::{Opportunity, ScanReport, ScanRequest};
pub use service::{EngineService, EngineServiceHandle};
pub use source::{MarketDataSource, SimulatedMarket};
