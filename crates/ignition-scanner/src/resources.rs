//! Directory scanner
//!
//! Walks a project's resource directories for one resource type and turns
//! them into [`ProjectResource`] entries:
//! - singleton types: the type directory itself is the single instance
//! - multi-instance types: every subdirectory holding `resource.json` is an
//!   instance; subdirectories holding only further directories are
//!   organizational folders; directories with loose files but no
//!   `resource.json` are skipped, though their descendants are still visited

use crate::error::ScanResult;
use crate::metadata::RESOURCE_FILE;
use crate::registry::ResourceTypeDescriptor;
use crate::types::{ProjectResource, ResourceFile, ResourceMetadata, ResourceOrigin};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Component, Path};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Resources of one type plus the non-fatal problems hit while walking
#[derive(Debug, Clone, Default)]
pub struct TypeScan {
    pub resources: Vec<ProjectResource>,
    pub warnings: Vec<String>,
}

/// Scan a project for every resource of one type
///
/// # Errors
/// Returns an error if the descriptor is invalid or a type directory
/// cannot be read at all. Problems below the type directory are recorded
/// as warnings instead.
pub fn scan_resource_type(
    project_root: &Path,
    descriptor: &ResourceTypeDescriptor,
) -> ScanResult<TypeScan> {
    descriptor.validate()?;

    let mut scan = TypeScan::default();
    for directory in &descriptor.directory_paths {
        let type_dir = project_root.join(directory.trim_matches('/'));
        if descriptor.is_singleton {
            scan_singleton(project_root, &type_dir, descriptor, &mut scan)?;
        } else {
            scan_multi_instance(project_root, &type_dir, descriptor, &mut scan)?;
        }
    }

    Ok(scan)
}

/// Scan every descriptor in parallel, keeping per-type outcomes separate
pub fn scan_all_types(
    project_root: &Path,
    descriptors: &[ResourceTypeDescriptor],
) -> Vec<(String, ScanResult<TypeScan>)> {
    descriptors
        .par_iter()
        .map(|d| {
            (
                d.resource_type_id.clone(),
                scan_resource_type(project_root, d),
            )
        })
        .collect()
}

fn scan_singleton(
    project_root: &Path,
    type_dir: &Path,
    descriptor: &ResourceTypeDescriptor,
    scan: &mut TypeScan,
) -> ScanResult<()> {
    if !type_dir_exists(type_dir)? {
        return Ok(());
    }

    // Providers do not always ship resource.json; any content counts.
    let has_resource_file = type_dir.join(RESOURCE_FILE).is_file();
    if !has_resource_file && fs::read_dir(type_dir)?.next().is_none() {
        debug!("Empty singleton directory {}", type_dir.display());
        return Ok(());
    }

    let resource = build_resource(project_root, type_dir, descriptor, false, scan);
    scan.resources.push(resource);
    Ok(())
}

fn scan_multi_instance(
    project_root: &Path,
    type_dir: &Path,
    descriptor: &ResourceTypeDescriptor,
    scan: &mut TypeScan,
) -> ScanResult<()> {
    if !type_dir_exists(type_dir)? {
        return Ok(());
    }

    let walker = WalkDir::new(type_dir).min_depth(1).sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {e}", type_dir.display());
                scan.warnings.push(format!(
                    "Skipped unreadable entry under {}: {e}",
                    type_dir.display()
                ));
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let dir = entry.path();
        if dir.join(RESOURCE_FILE).is_file() {
            let resource = build_resource(project_root, dir, descriptor, false, scan);
            scan.resources.push(resource);
            continue;
        }

        match contains_plain_files(dir) {
            Ok(false) => {
                let folder = build_resource(project_root, dir, descriptor, true, scan);
                scan.resources.push(folder);
            }
            Ok(true) => {
                debug!("Not a resource (files without resource.json): {}", dir.display());
            }
            Err(e) => {
                warn!("Failed to read {}: {e}", dir.display());
                scan.warnings
                    .push(format!("Failed to read {}: {e}", dir.display()));
            }
        }
    }

    Ok(())
}

/// Absent type directories are normal; any other stat failure is not
fn type_dir_exists(type_dir: &Path) -> io::Result<bool> {
    match fs::metadata(type_dir) {
        Ok(metadata) => Ok(metadata.is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn contains_plain_files(dir: &Path) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        if entry?.file_type()?.is_file() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn build_resource(
    project_root: &Path,
    dir: &Path,
    descriptor: &ResourceTypeDescriptor,
    is_folder: bool,
    scan: &mut TypeScan,
) -> ProjectResource {
    let path = relative_path(project_root, dir);
    let name = path.rsplit('/').next().unwrap_or(&path).to_string();

    let files = if is_folder {
        Vec::new()
    } else {
        list_files(dir, &path).unwrap_or_else(|e| {
            warn!("Failed to list files in {}: {e}", dir.display());
            scan.warnings
                .push(format!("Failed to list files in {}: {e}", dir.display()));
            Vec::new()
        })
    };

    let display_name = if descriptor.is_singleton {
        descriptor.display_name.clone()
    } else {
        name.clone()
    };

    ProjectResource {
        resource_type: descriptor.resource_type_id.clone(),
        origin: ResourceOrigin::Local,
        source_project: None,
        files,
        metadata: ResourceMetadata {
            is_folder,
            key: format!("{}:{path}", descriptor.resource_type_id),
            name,
            category: descriptor.category.clone(),
            project_path: project_root.to_path_buf(),
            last_modified: modified_millis(dir),
            size: 0,
            display_name,
            singleton: descriptor.is_singleton,
        },
        path,
    }
}

fn list_files(dir: &Path, relative_dir: &str) -> io::Result<Vec<ResourceFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        files.push(ResourceFile {
            path: format!("{relative_dir}/{name}"),
            name,
            size: metadata.len(),
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

fn modified_millis(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
        .unwrap_or(0)
}

/// Path of `path` below `root`, joined with `/`
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use tempfile::TempDir;

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scripts() -> ResourceTypeDescriptor {
        ResourceTypeDescriptor::multi("script", "scripts").with_category("Scripting")
    }

    fn props() -> ResourceTypeDescriptor {
        ResourceTypeDescriptor::singleton("props", "props").with_display_name("Properties")
    }

    #[test]
    fn test_singleton_with_resource_file() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("props/resource.json"), "{}");

        let scan = scan_resource_type(dir.path(), &props()).unwrap();
        assert_eq!(scan.resources.len(), 1);
        let resource = &scan.resources[0];
        assert_eq!(resource.path, "props");
        assert!(!resource.is_folder());
        assert!(resource.metadata.singleton);
        assert_eq!(resource.metadata.display_name, "Properties");
        assert_eq!(resource.files.len(), 1);
        assert_eq!(resource.files[0].path, "props/resource.json");
        assert_eq!(resource.files[0].size, 2);
    }

    #[test]
    fn test_singleton_empty_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("props")).unwrap();

        let scan = scan_resource_type(dir.path(), &props()).unwrap();
        assert!(scan.resources.is_empty());
    }

    #[test]
    fn test_singleton_non_empty_without_resource_file() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("props/data.bin"), "abc");

        let scan = scan_resource_type(dir.path(), &props()).unwrap();
        assert_eq!(scan.resources.len(), 1);
        assert!(!scan.resources[0].is_folder());
        assert_eq!(scan.resources[0].metadata.size, 0);
    }

    #[test]
    fn test_missing_type_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(scan_resource_type(dir.path(), &props()).unwrap().resources.is_empty());
        assert!(scan_resource_type(dir.path(), &scripts()).unwrap().resources.is_empty());
    }

    #[test]
    fn test_multi_instance_resources_and_folders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("scripts/greet/resource.json"), "{}");
        touch(&root.join("scripts/greet/code.py"), "print('hi')");
        touch(&root.join("scripts/util/strings/resource.json"), "{}");
        touch(&root.join("scripts/util/strings/code.py"), "");

        let scan = scan_resource_type(root, &scripts()).unwrap();
        let entries: Vec<_> = scan
            .resources
            .iter()
            .map(|r| (r.path.as_str(), r.is_folder()))
            .collect();
        assert_eq!(
            entries,
            vec![
                ("scripts/greet", false),
                ("scripts/util", true),
                ("scripts/util/strings", false),
            ]
        );

        let greet = &scan.resources[0];
        assert_eq!(greet.key(), "script:scripts/greet");
        assert_eq!(greet.metadata.name, "greet");
        assert_eq!(greet.metadata.category.as_deref(), Some("Scripting"));
        let names: Vec<_> = greet.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["code.py", "resource.json"]);
        assert!(scan.resources[1].files.is_empty());
    }

    #[test]
    fn test_nested_resources_are_discovered() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("scripts/pkg/resource.json"), "{}");
        touch(&root.join("scripts/pkg/sub/resource.json"), "{}");

        let scan = scan_resource_type(root, &scripts()).unwrap();
        let paths: Vec<_> = scan.resources.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["scripts/pkg", "scripts/pkg/sub"]);
    }

    #[test]
    fn test_loose_files_without_resource_file_are_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("scripts/stray/notes.txt"), "x");
        touch(&root.join("scripts/stray/inner/resource.json"), "{}");

        let scan = scan_resource_type(root, &scripts()).unwrap();
        let paths: Vec<_> = scan.resources.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["scripts/stray/inner"]);
    }

    #[test]
    fn test_stray_files_next_to_resource_file_still_count() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("scripts/greet/resource.json"), "{}");
        touch(&root.join("scripts/greet/README"), "stray");

        let scan = scan_resource_type(root, &scripts()).unwrap();
        assert_eq!(scan.resources.len(), 1);
        assert_eq!(scan.resources[0].files.len(), 2);
    }

    #[test]
    fn test_empty_subdirectory_is_a_folder() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("scripts/empty")).unwrap();

        let scan = scan_resource_type(dir.path(), &scripts()).unwrap();
        assert_eq!(scan.resources.len(), 1);
        assert!(scan.resources[0].is_folder());
    }

    #[test]
    fn test_invalid_descriptor_fails() {
        let dir = TempDir::new().unwrap();
        let mut descriptor = scripts();
        descriptor.directory_paths.clear();

        let err = scan_resource_type(dir.path(), &descriptor).unwrap_err();
        assert!(matches!(err, ScanError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_type_directory_below_a_file_fails() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("blocked"), "not a directory");

        let descriptor = ResourceTypeDescriptor::multi("item", "blocked/items");
        let err = scan_resource_type(dir.path(), &descriptor).unwrap_err();
        assert!(matches!(err, ScanError::Io(_)));

        let singleton = ResourceTypeDescriptor::singleton("item", "blocked/item");
        assert!(scan_resource_type(dir.path(), &singleton).is_err());
    }

    #[test]
    fn test_scan_all_types_keeps_outcomes_per_type() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("scripts/a/resource.json"), "{}");
        touch(&dir.path().join("props/resource.json"), "{}");

        let outcomes = scan_all_types(dir.path(), &[scripts(), props()]);
        assert_eq!(outcomes.len(), 2);
        let total: usize = outcomes
            .iter()
            .map(|(_, r)| r.as_ref().unwrap().resources.len())
            .sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("/projects/demo");
        assert_eq!(
            relative_path(root, &root.join("scripts").join("a").join("b")),
            "scripts/a/b"
        );
    }
}
