//! sourcesense_core: repository metadata extraction pipeline
//!
//! This crate provides the five-stage extraction workflow (resolve config,
//! preflight, fetch, transform, publish), the GitHub source it reads from,
//! Parquet staging between stages, normalization into catalog entities, and
//! a scheduler that runs many workflow instances concurrently with persisted
//! run history and graceful shutdown.
//!
//! Basic usage:
//!
//! ```no_run
//! use std::time::Duration;
//! use sourcesense_core::config::loader::load_app_config;
//! use sourcesense_core::engine::SourceSense;
//!
//! # async fn start() -> Result<(), Box<dyn std::error::Error>> {
//! sourcesense_core::logging::init();
//! let config = load_app_config("sourcesense.yaml")?;
//! let service = SourceSense::from_config(&config)?
//!     .schedule("wf-nightly", Duration::from_secs(3600));
//! service.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod sources;
pub mod destinations;
pub mod transforms;
pub mod staging;
pub mod services;
pub mod events;
pub mod store;
pub mod scheduler;
pub mod config;
pub mod builder;
pub mod engine;
pub mod pipeline;

pub mod logging;

pub mod metrics;
