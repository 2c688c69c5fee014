//! Inheritance resolver
//!
//! A project's `parent` names another project. Names are matched against
//! directory basenames first, since titles are only for display, and
//! against project titles and names as a fallback.

use crate::metadata::{is_ignition_project, load_project_metadata};
use crate::types::{ProjectMetadata, ProjectResource, ProjectScanResult, ScanWarning, WarningKind};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Known projects, looked up by the names a `parent` field may use
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    by_dir: HashMap<String, Arc<ProjectScanResult>>,
    by_name: HashMap<String, Arc<ProjectScanResult>>,
}

impl ProjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Arc<ProjectScanResult>>,
    {
        let mut index = Self::new();
        index.extend(results);
        index
    }

    /// Add a project; a later insert for the same name wins
    pub fn insert(&mut self, result: Arc<ProjectScanResult>) {
        let names = [
            Some(result.project_name.clone()),
            result.metadata.title.clone(),
            result.metadata.name.clone(),
        ];
        for name in names.into_iter().flatten() {
            self.by_name.insert(name, Arc::clone(&result));
        }
        self.by_dir.insert(result.dir_name(), result);
    }

    /// Add several projects in order
    pub fn extend<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = Arc<ProjectScanResult>>,
    {
        for result in results {
            self.insert(result);
        }
    }

    /// One entry per project directory
    pub fn results(&self) -> impl Iterator<Item = &Arc<ProjectScanResult>> {
        self.by_dir.values()
    }

    /// Find a project by directory basename, else by title or name
    pub fn find(&self, name: &str) -> Option<&Arc<ProjectScanResult>> {
        self.by_dir.get(name).or_else(|| self.by_name.get(name))
    }

    /// Distinct project paths, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self
            .by_dir
            .values()
            .map(|r| r.project_path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    pub fn len(&self) -> usize {
        self.by_dir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dir.is_empty()
    }
}

/// Outcome of walking a project's parent links
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainResolution {
    /// Ancestor names, nearest first
    pub chain: Vec<String>,
    pub warnings: Vec<ScanWarning>,
    /// Ancestor name the walk stopped at because nothing matched
    pub missing: Option<String>,
}

/// Resolve the ordered ancestor chain of a project
pub fn resolve_chain(
    project_dir_name: &str,
    metadata: &ProjectMetadata,
    index: &ProjectIndex,
) -> ChainResolution {
    let mut resolution = ChainResolution::default();
    let mut visited: HashSet<String> = HashSet::from([project_dir_name.to_string()]);
    let mut next = metadata.parent_name().map(str::to_string);

    while let Some(parent) = next.take() {
        if visited.contains(&parent) {
            warn!("Inheritance cycle in '{project_dir_name}' at '{parent}'");
            resolution.warnings.push(cycle_warning(project_dir_name, &parent));
            break;
        }

        let Some(ancestor) = index.find(&parent) else {
            debug!("Parent project '{parent}' of '{project_dir_name}' is not known");
            resolution.warnings.push(ScanWarning::new(
                WarningKind::UnresolvedParent,
                format!("Parent project '{parent}' could not be found"),
            ));
            resolution.missing = Some(parent);
            break;
        };

        // A title reference can lead back to a directory already in the chain.
        let ancestor_dir = ancestor.dir_name();
        if visited.contains(&ancestor_dir) {
            warn!("Inheritance cycle in '{project_dir_name}' at '{parent}'");
            resolution.warnings.push(cycle_warning(project_dir_name, &parent));
            break;
        }

        if !ancestor.metadata.inheritable {
            resolution.warnings.push(ScanWarning::new(
                WarningKind::ParentNotInheritable,
                format!("Parent project '{parent}' is not marked inheritable"),
            ));
        }

        visited.insert(parent.clone());
        visited.insert(ancestor_dir);
        next = ancestor.metadata.parent_name().map(str::to_string);
        resolution.chain.push(parent);
    }

    resolution
}

fn cycle_warning(project: &str, parent: &str) -> ScanWarning {
    ScanWarning::new(
        WarningKind::InheritanceCycle,
        format!("Inheritance cycle detected for '{project}' at parent '{parent}'"),
    )
}

/// Flatten the local resources of every ancestor, nearest first
///
/// Resources are not de-duplicated; consumers decide which copy wins.
pub fn resolve_inherited_resources(chain: &[String], index: &ProjectIndex) -> Vec<ProjectResource> {
    chain
        .iter()
        .filter_map(|name| index.find(name).map(|ancestor| (name, ancestor)))
        .flat_map(|(name, ancestor)| {
            ancestor
                .resources
                .iter()
                .map(move |resource| resource.inherited_from(name))
        })
        .collect()
}

/// Search the neighbourhood of known projects for a project called `name`
///
/// Sibling and grandparent directories of every known project path are
/// searched, first for a directory named `name`, then for a project whose
/// `project.json` title or name matches. Read errors count as "not found".
pub async fn find_project_directory(name: &str, known_paths: &[PathBuf]) -> Option<PathBuf> {
    let search_dirs = search_directories(known_paths);
    let plain_name = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);

    if plain_name {
        for dir in &search_dirs {
            let candidate = dir.join(name);
            let is_dir = tokio::fs::metadata(&candidate)
                .await
                .is_ok_and(|m| m.is_dir());
            if is_dir && is_ignition_project(&candidate).await {
                debug!("Found parent project '{name}' at {}", candidate.display());
                return Some(candidate);
            }
        }
    }

    for dir in &search_dirs {
        let subdirs = match read_subdirectories(dir).await {
            Ok(subdirs) => subdirs,
            Err(e) => {
                warn!("Failed to search {} for project '{name}': {e}", dir.display());
                continue;
            }
        };
        for subdir in subdirs {
            if !is_ignition_project(&subdir).await {
                continue;
            }
            let metadata = load_project_metadata(&subdir).await;
            if metadata.title.as_deref() == Some(name) || metadata.name.as_deref() == Some(name) {
                debug!("Found parent project '{name}' by title at {}", subdir.display());
                return Some(subdir);
            }
        }
    }

    None
}

fn search_directories(known_paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for path in known_paths {
        let parent = path.parent();
        let grandparent = parent.and_then(Path::parent);
        for dir in [parent, grandparent].into_iter().flatten() {
            if !dirs.iter().any(|d| d == dir) {
                dirs.push(dir.to_path_buf());
            }
        }
    }
    dirs
}

async fn read_subdirectories(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut subdirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            subdirs.push(entry.path());
        }
    }
    subdirs.sort();
    Ok(subdirs)
}
