//! Project detection command
//!
//! Handles: ignition-scan check PATH

use anyhow::Result;
use ignition_scanner::ProjectScanService;
use std::path::Path;

/// Print whether `path` is an Ignition project and return the verdict
pub async fn execute(path: &Path) -> Result<bool> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    let service = ProjectScanService::with_defaults();
    let is_project = service.is_ignition_project(path).await;
    if is_project {
        println!("{} is an Ignition project", path.display());
    } else {
        println!("{} is not an Ignition project (no project.json)", path.display());
    }
    Ok(is_project)
}
