//! rebook-core: visit attribution and rebooking linkage over point-of-sale
//! extracts.
//!
//! Data flows leaf to leaf:
//! [`source`] → [`validate`] → [`group`] → {[`attribution`], [`rebooking`]}
//! → [`consolidate`] → [`sink`], orchestrated by [`pipeline::run`].
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums at the source, sink and pipeline seams;
//!   `anyhow::Result` where files are opened or config is loaded.
//! - **Logging**: `tracing` macros only. Installing a subscriber is the
//!   binary's job.
//! - **Money**: `rust_decimal::Decimal` throughout, so equal sums tie exactly.

pub mod attribution;
pub mod config;
pub mod consolidate;
pub mod db;
pub mod error;
pub mod group;
pub mod model;
pub mod pipeline;
pub mod rebooking;
pub mod report;
pub mod sink;
pub mod source;
pub mod validate;
