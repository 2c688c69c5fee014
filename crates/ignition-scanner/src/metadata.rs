//! Project metadata loader
//!
//! Reads `project.json`. Loading never fails: a missing or malformed file
//! yields default metadata so that loosely structured directories can still
//! be scanned.

use crate::types::ProjectMetadata;
use std::path::Path;
use tracing::debug;

/// File marking a directory as an Ignition project
pub const PROJECT_FILE: &str = "project.json";

/// File marking a directory as a resource instance
pub const RESOURCE_FILE: &str = "resource.json";

/// Load `project.json` from a project directory
pub async fn load_project_metadata(project_path: &Path) -> ProjectMetadata {
    let file = project_path.join(PROJECT_FILE);
    let content = match tokio::fs::read_to_string(&file).await {
        Ok(content) => content,
        Err(e) => {
            debug!("No readable project file at {}: {e}", file.display());
            return ProjectMetadata::default();
        }
    };
    parse_project_metadata(&file, &content)
}

/// Parse `project.json` content, falling back to defaults when malformed
pub fn parse_project_metadata(file: &Path, content: &str) -> ProjectMetadata {
    match serde_json::from_str(content) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("Failed to parse {}: {e}", file.display());
            ProjectMetadata::default()
        }
    }
}

/// Whether `path` is an Ignition project
///
/// Only the presence of `project.json` counts; resource folders alone do
/// not make a project.
pub async fn is_ignition_project(path: &Path) -> bool {
    tokio::fs::try_exists(path.join(PROJECT_FILE))
        .await
        .unwrap_or(false)
}

/// Directory basename, the identity used by `parent` references
pub fn project_dir_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || "unnamed".to_string(),
        |n| n.to_string_lossy().to_string(),
    )
}
