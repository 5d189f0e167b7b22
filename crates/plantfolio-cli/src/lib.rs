//! Plantfolio CLI - argument definitions for the `plantfolio` binary.

mod config;

pub use config::{Command, Config, PlantaArgs, StorageArgs, TokenCommand, version_info};
