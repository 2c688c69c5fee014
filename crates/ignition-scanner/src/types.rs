//! Shared types for the Ignition scanner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where a resource in a scan result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceOrigin {
    /// Found directly in the scanned project
    Local,
    /// Contributed by an ancestor project
    Inherited,
}

impl FromStr for ResourceOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ResourceOrigin::Local),
            "inherited" => Ok(ResourceOrigin::Inherited),
            _ => Err(format!("Invalid origin: {s}")),
        }
    }
}

/// A file directly inside a resource directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFile {
    /// File name
    pub name: String,
    /// Path relative to the project root, `/`-delimited
    pub path: String,
    /// Size in bytes
    pub size: u64,
}

/// Descriptive metadata attached to every resource entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    /// Organizational folder rather than a resource instance
    pub is_folder: bool,
    /// `type:path`, unique among a project's local resources
    pub key: String,
    /// Last path segment
    pub name: String,
    /// Grouping label of the resource type
    pub category: Option<String>,
    /// Absolute path of the project physically holding the resource
    pub project_path: PathBuf,
    /// Directory modification time, epoch millis (0 when unknown)
    pub last_modified: i64,
    /// Always 0 for directory-shaped resources
    pub size: u64,
    /// Human readable label
    pub display_name: String,
    /// Whether the resource type is a singleton
    pub singleton: bool,
}

/// One discovered resource or organizational folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResource {
    /// Resource type id
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Path relative to the project root, `/`-delimited
    pub path: String,
    /// Local or inherited
    pub origin: ResourceOrigin,
    /// Ancestor that contributed the resource (inherited only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_project: Option<String>,
    /// Direct files of a resource instance
    #[serde(default)]
    pub files: Vec<ResourceFile>,
    /// Descriptive metadata
    pub metadata: ResourceMetadata,
}

impl ProjectResource {
    /// The `type:path` key
    pub fn key(&self) -> &str {
        &self.metadata.key
    }

    /// Whether this entry is an organizational folder
    pub fn is_folder(&self) -> bool {
        self.metadata.is_folder
    }

    /// Copy of this resource as contributed by `ancestor`
    #[must_use]
    pub fn inherited_from(&self, ancestor: &str) -> Self {
        Self {
            origin: ResourceOrigin::Inherited,
            source_project: Some(ancestor.to_string()),
            ..self.clone()
        }
    }
}

/// Contents of `project.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Name of the parent project (not a path)
    pub parent: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub inheritable: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self {
            name: None,
            title: None,
            description: None,
            parent: None,
            enabled: true,
            inheritable: true,
        }
    }
}

impl ProjectMetadata {
    /// Whether the metadata identifies a real project
    pub fn is_identified(&self) -> bool {
        self.name.is_some() || self.title.is_some()
    }

    /// Parent name, ignoring blank values
    pub fn parent_name(&self) -> Option<&str> {
        self.parent
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Kind of a non-fatal scan warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// Directory has no project.json
    MissingProjectFile,
    /// No resources of any type were found
    NoResources,
    /// A single resource type could not be scanned
    ResourceTypeFailed,
    /// An entry below a resource directory could not be read
    UnreadableEntry,
    /// Parent project could not be found
    UnresolvedParent,
    /// Inheritance chain loops back on itself
    InheritanceCycle,
    /// Parent project is not marked inheritable
    ParentNotInheritable,
    /// A located parent project could not be scanned
    ParentDiscoveryFailed,
}

impl WarningKind {
    /// Whether the warning is produced by inheritance resolution
    pub fn is_inheritance(self) -> bool {
        matches!(
            self,
            WarningKind::UnresolvedParent
                | WarningKind::InheritanceCycle
                | WarningKind::ParentNotInheritable
                | WarningKind::ParentDiscoveryFailed
        )
    }
}

/// Structural issue found during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl ScanWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of scanning one project, as cached and handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectScanResult {
    /// Canonical absolute project directory
    pub project_path: PathBuf,
    /// Title, else name, else directory basename
    pub project_name: String,
    pub metadata: ProjectMetadata,
    /// Local resources only
    pub resources: Vec<ProjectResource>,
    /// Ancestor names, nearest first
    pub inheritance_chain: Vec<String>,
    /// Ancestors' local resources, in chain order
    pub inherited_resources: Vec<ProjectResource>,
    /// Elapsed scan time in milliseconds
    pub scan_time: u64,
    pub resource_count: usize,
    pub warnings: Vec<ScanWarning>,
    pub last_scanned: DateTime<Utc>,
}

impl ProjectScanResult {
    /// Directory basename, the key other projects use to inherit from this one
    pub fn dir_name(&self) -> String {
        crate::metadata::project_dir_name(&self.project_path)
    }

    /// Warnings of the given kind
    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &ScanWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }

    /// Local and inherited resources together, local first
    pub fn all_resources(&self) -> impl Iterator<Item = &ProjectResource> {
        self.resources.iter().chain(self.inherited_resources.iter())
    }
}

/// Pick the display name of a project
pub(crate) fn display_project_name(metadata: &ProjectMetadata, dir_name: &str) -> String {
    metadata
        .title
        .clone()
        .or_else(|| metadata.name.clone())
        .unwrap_or_else(|| dir_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults_from_empty_object() {
        let metadata: ProjectMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(metadata, ProjectMetadata::default());
        assert!(metadata.enabled);
        assert!(metadata.inheritable);
        assert!(!metadata.is_identified());
    }

    #[test]
    fn test_blank_parent_is_ignored() {
        let metadata = ProjectMetadata {
            parent: Some("  ".to_string()),
            ..ProjectMetadata::default()
        };
        assert_eq!(metadata.parent_name(), None);
    }

    #[test]
    fn test_origin_serializes_upper_case() {
        let json = serde_json::to_string(&ResourceOrigin::Inherited).unwrap();
        assert_eq!(json, "\"INHERITED\"");
        assert_eq!("local".parse::<ResourceOrigin>(), Ok(ResourceOrigin::Local));
    }

    #[test]
    fn test_display_name_precedence() {
        let mut metadata = ProjectMetadata {
            name: Some("name".to_string()),
            ..ProjectMetadata::default()
        };
        assert_eq!(display_project_name(&metadata, "dir"), "name");
        metadata.title = Some("Title".to_string());
        assert_eq!(display_project_name(&metadata, "dir"), "Title");
        assert_eq!(display_project_name(&ProjectMetadata::default(), "dir"), "dir");
    }
}
