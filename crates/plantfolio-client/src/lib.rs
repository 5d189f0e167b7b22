//! Plantfolio Client - adapters for external services
//!
//! This crate provides the I/O implementations of the sync core's traits:
//!
//! - [`planta`] - the Planta API ([`plantfolio_core::traits::PlantSource`])
//! - [`storage`] - S3-compatible photo storage ([`plantfolio_core::traits::PhotoStorage`])
//!
//! # Overview
//!
//! The clients handle authentication, request building, response parsing,
//! and mapping failures into [`plantfolio_core::AppError`] variants that the
//! sync core classifies as retryable, fatal or per-plant.

pub mod planta;
pub mod storage;

// Re-export main client types
pub use planta::PlantaClient;
pub use storage::{S3Config, S3PhotoStorage};
