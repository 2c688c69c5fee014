//! Resource type provider registry
//!
//! Providers describe where resources of their type live inside a project.
//! The scanner only needs two facts from each: which directories to scan and
//! whether the type is a singleton.

use crate::error::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scan configuration a provider exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSpec {
    /// Paths relative to the project root, `/`-delimited
    pub directory_paths: Vec<String>,
    /// Exactly one instance per project
    pub is_singleton: bool,
}

/// Capability contract of a resource type plugin
pub trait ResourceTypeProvider: Send + Sync {
    /// Unique type id
    fn resource_type_id(&self) -> &str;

    /// Human readable name
    fn display_name(&self) -> &str;

    /// Grouping label
    fn category(&self) -> Option<&str> {
        None
    }

    /// Whether resources of this type support content search
    fn searchable(&self) -> bool {
        false
    }

    fn scan_spec(&self) -> ScanSpec;
}

/// Registered description of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeDescriptor {
    pub resource_type_id: String,
    pub display_name: String,
    pub directory_paths: Vec<String>,
    pub is_singleton: bool,
    pub category: Option<String>,
    #[serde(default)]
    pub searchable: bool,
}

impl ResourceTypeDescriptor {
    /// Multi-instance type scanned under a single directory
    pub fn multi(id: &str, directory: &str) -> Self {
        Self {
            resource_type_id: id.to_string(),
            display_name: id.to_string(),
            directory_paths: vec![directory.to_string()],
            is_singleton: false,
            category: None,
            searchable: false,
        }
    }

    /// Singleton type stored at a single directory
    pub fn singleton(id: &str, directory: &str) -> Self {
        Self {
            is_singleton: true,
            ..Self::multi(id, directory)
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    #[must_use]
    pub fn with_searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    /// Build a descriptor from a provider's declared capabilities
    pub fn from_provider(provider: &dyn ResourceTypeProvider) -> Self {
        let spec = provider.scan_spec();
        Self {
            resource_type_id: provider.resource_type_id().to_string(),
            display_name: provider.display_name().to_string(),
            directory_paths: spec.directory_paths,
            is_singleton: spec.is_singleton,
            category: provider.category().map(str::to_string),
            searchable: provider.searchable(),
        }
    }

    /// Check the descriptor is usable for scanning
    pub fn validate(&self) -> ScanResult<()> {
        if self.resource_type_id.trim().is_empty() {
            return Err(ScanError::InvalidDescriptor(
                "resource type id is empty".to_string(),
            ));
        }
        if self.directory_paths.is_empty() {
            return Err(ScanError::InvalidDescriptor(format!(
                "resource type '{}' declares no directory paths",
                self.resource_type_id
            )));
        }
        Ok(())
    }
}

/// Lookup table of resource types by id
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    descriptors: HashMap<String, ResourceTypeDescriptor>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the standard Ignition resource types
    #[must_use]
    pub fn with_ignition_defaults() -> Self {
        let mut registry = Self::new();
        for descriptor in ignition_defaults() {
            registry.descriptors.insert(descriptor.resource_type_id.clone(), descriptor);
        }
        registry
    }

    /// Register a descriptor, replacing any previous one with the same id
    ///
    /// # Errors
    /// Returns `InvalidDescriptor` if the descriptor declares no directories
    pub fn register(&mut self, descriptor: ResourceTypeDescriptor) -> ScanResult<()> {
        descriptor.validate()?;
        self.descriptors
            .insert(descriptor.resource_type_id.clone(), descriptor);
        Ok(())
    }

    /// Register a provider through its capability contract
    ///
    /// # Errors
    /// Returns `InvalidDescriptor` if the provider declares no directories
    pub fn register_provider(&mut self, provider: &dyn ResourceTypeProvider) -> ScanResult<()> {
        self.register(ResourceTypeDescriptor::from_provider(provider))
    }

    pub fn get(&self, type_id: &str) -> Option<&ResourceTypeDescriptor> {
        self.descriptors.get(type_id)
    }

    /// All descriptors, sorted by id
    pub fn list(&self) -> Vec<&ResourceTypeDescriptor> {
        let mut all: Vec<_> = self.descriptors.values().collect();
        all.sort_by(|a, b| a.resource_type_id.cmp(&b.resource_type_id));
        all
    }

    /// Descriptors of types that support content search
    pub fn list_searchable(&self) -> Vec<&ResourceTypeDescriptor> {
        self.list().into_iter().filter(|d| d.searchable).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

const PERSPECTIVE: &str = "com.inductiveautomation.perspective";
const VISION: &str = "com.inductiveautomation.vision";

fn ignition_defaults() -> Vec<ResourceTypeDescriptor> {
    use ResourceTypeDescriptor as D;

    vec![
        D::multi("script-python", "ignition/script-python")
            .with_display_name("Python Scripts")
            .with_category("Scripting")
            .with_searchable(true),
        D::multi("named-query", "ignition/named-query")
            .with_display_name("Named Queries")
            .with_category("Data")
            .with_searchable(true),
        D::singleton("event-scripts", "ignition/event-scripts")
            .with_display_name("Gateway Events")
            .with_category("Scripting"),
        D::singleton("global-props", "ignition/global-props")
            .with_display_name("Project Properties")
            .with_category("Project"),
        D::multi("perspective-view", &format!("{PERSPECTIVE}/views"))
            .with_display_name("Perspective Views")
            .with_category("Perspective")
            .with_searchable(true),
        D::multi("perspective-style-class", &format!("{PERSPECTIVE}/style-classes"))
            .with_display_name("Style Classes")
            .with_category("Perspective")
            .with_searchable(true),
        D::singleton("perspective-page-config", &format!("{PERSPECTIVE}/page-config"))
            .with_display_name("Page Configuration")
            .with_category("Perspective"),
        D::singleton("perspective-session-props", &format!("{PERSPECTIVE}/session-props"))
            .with_display_name("Session Properties")
            .with_category("Perspective"),
        D::singleton(
            "perspective-session-scripts",
            &format!("{PERSPECTIVE}/session-scripts"),
        )
        .with_display_name("Session Events")
        .with_category("Perspective"),
        D::multi("vision-window", &format!("{VISION}/windows"))
            .with_display_name("Vision Windows")
            .with_category("Vision")
            .with_searchable(true),
        D::multi("vision-template", &format!("{VISION}/templates"))
            .with_display_name("Vision Templates")
            .with_category("Vision")
            .with_searchable(true),
        D::singleton("vision-client-tags", &format!("{VISION}/client-tags"))
            .with_display_name("Vision Client Tags")
            .with_category("Vision"),
        D::multi("report", "com.inductiveautomation.reporting/reports")
            .with_display_name("Reports")
            .with_category("Reporting")
            .with_searchable(true),
        D::multi(
            "alarm-pipeline",
            "com.inductiveautomation.alarm-notification/alarm-pipelines",
        )
        .with_display_name("Alarm Pipelines")
        .with_category("Alarming"),
        D::multi("sfc-chart", "com.inductiveautomation.sfc/charts")
            .with_display_name("SFC Charts")
            .with_category("SFC"),
        D::multi("webdev", "com.inductiveautomation.webdev/resources")
            .with_display_name("WebDev Resources")
            .with_category("WebDev")
            .with_searchable(true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    struct QueryProvider;

    impl ResourceTypeProvider for QueryProvider {
        fn resource_type_id(&self) -> &str {
            "query"
        }

        fn display_name(&self) -> &str {
            "Queries"
        }

        fn searchable(&self) -> bool {
            true
        }

        fn scan_spec(&self) -> ScanSpec {
            ScanSpec {
                directory_paths: vec!["queries".to_string()],
                is_singleton: false,
            }
        }
    }

    struct BrokenProvider;

    impl ResourceTypeProvider for BrokenProvider {
        fn resource_type_id(&self) -> &str {
            "broken"
        }

        fn display_name(&self) -> &str {
            "Broken"
        }

        fn scan_spec(&self) -> ScanSpec {
            ScanSpec {
                directory_paths: Vec::new(),
                is_singleton: true,
            }
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(ResourceTypeDescriptor::multi("script", "scripts"))
            .unwrap();

        let descriptor = registry.get("script").expect("script should be registered");
        assert_eq!(descriptor.directory_paths, vec!["scripts".to_string()]);
        assert!(!descriptor.is_singleton);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_register_without_directories_fails() {
        let mut registry = ProviderRegistry::new();
        let mut descriptor = ResourceTypeDescriptor::singleton("props", "props");
        descriptor.directory_paths.clear();

        let err = registry.register(descriptor).unwrap_err();
        assert!(matches!(err, ScanError::InvalidDescriptor(_)));
        assert!(registry.is_empty());

        assert!(registry.register_provider(&BrokenProvider).is_err());
    }

    #[test]
    fn test_reregistering_replaces() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(ResourceTypeDescriptor::multi("script", "scripts"))
            .unwrap();
        registry
            .register(ResourceTypeDescriptor::multi("script", "python"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("script").unwrap().directory_paths,
            vec!["python".to_string()]
        );
    }

    #[test]
    fn test_register_provider_and_searchable_filter() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(&QueryProvider).unwrap();
        registry
            .register(ResourceTypeDescriptor::singleton("props", "props"))
            .unwrap();

        let searchable: Vec<_> = registry
            .list_searchable()
            .into_iter()
            .map(|d| d.resource_type_id.as_str())
            .collect();
        assert_eq!(searchable, vec!["query"]);
        assert_eq!(registry.get("query").unwrap().display_name, "Queries");
    }

    #[test]
    fn test_ignition_defaults_are_valid() {
        let registry = ProviderRegistry::with_ignition_defaults();
        assert!(registry.len() >= 10);
        for descriptor in registry.list() {
            descriptor.validate().unwrap();
        }
        assert!(registry.get("script-python").unwrap().searchable);
        assert!(registry.get("perspective-page-config").unwrap().is_singleton);

        let ids: Vec<_> = registry.list().iter().map(|d| d.resource_type_id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
