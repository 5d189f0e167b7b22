//! Plantfolio Server - REST API for the plant gallery
//!
//! This crate provides the HTTP surface of Plantfolio:
//!
//! - **Sync trigger**: `GET /api/sync-plants`, called by a scheduler with a
//!   shared bearer secret
//! - **Gallery**: read-only plant and photo endpoints
//! - **Run logs**: recent sync runs with their detailed errors
//!
//! # API Documentation
//!
//! When running the server, interactive API documentation is available
//! at `/swagger-ui`.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::create_router;
pub use state::{AppState, GalleryBackend, LiveBackend};
