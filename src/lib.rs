//! picverify - virtual-tile inspection for photonic IC layouts
//!
//! This library partitions a vector layout into a grid of tiles, renders
//! each tile into a raster image on demand, submits tiles to an external
//! classification service, and aggregates the results into a reviewable,
//! exportable dataset.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a facade over the
//! subsystem:
//!
//! ```ignore
//! use picverify::config::EngineConfig;
//! use picverify::coord::{GridConfig, WorldRect};
//! use picverify::service::InspectionService;
//!
//! let service = InspectionService::new(config, renderers, detailed, fast);
//! service.generate_grid(GridConfig::new(8, 8, 10.0, 512), layout_bounds).await?;
//!
//! let handle = service.start_run(service.all_addresses()?, None)?;
//! handle.wait().await;
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod coord;
pub mod dispatch;
pub mod grid;
pub mod logging;
pub mod messages;
pub mod render;
pub mod service;
pub mod store;

/// Version of the picverify library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
