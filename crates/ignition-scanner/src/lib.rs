//! Ignition Scanner - Ignition project discovery and inheritance resolution
//!
//! This crate provides read-only scanning of Ignition project directories:
//! resource discovery per registered resource type, `project.json`
//! metadata, parent-chain inheritance, and a caching, coalescing service
//! that watches scanned projects for changes.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::items_after_statements,
    clippy::single_match_else,
    clippy::match_same_arms,
    clippy::unnecessary_debug_formatting,
    clippy::option_if_let_else,
    clippy::needless_pass_by_value,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::cast_precision_loss
)]

pub mod cache;
pub mod collision;
pub mod config;
pub mod error;
pub mod inheritance;
pub mod metadata;
pub mod output;
pub mod registry;
pub mod resources;
pub mod service;
pub mod types;
pub mod watcher;

pub use cache::{CacheStats, ScanCache};
pub use collision::CollisionReport;
pub use config::{ScannerConfig, ServiceConfig};
pub use error::{ScanError, ScanResult};
pub use registry::{ProviderRegistry, ResourceTypeDescriptor, ResourceTypeProvider, ScanSpec};
pub use service::{ProjectScanService, ScanEvent};
pub use types::{
    ProjectMetadata, ProjectResource, ProjectScanResult, ResourceFile, ResourceMetadata,
    ResourceOrigin, ScanWarning, WarningKind,
};
