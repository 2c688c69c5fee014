//! Resource override detection
//!
//! A resource key present both locally and in an ancestor, or in several
//! ancestors, is an override. The local copy wins; otherwise the ancestor
//! nearest in the inheritance chain does.

use crate::types::{ProjectScanResult, ResourceOrigin};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Report of resource keys defined more than once along a chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionReport {
    /// Collisions, sorted by key
    #[serde(default)]
    pub collisions: Vec<Collision>,
}

/// A single collision (same key in several projects)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collision {
    /// The colliding `type:path` key
    pub key: String,
    /// The occurrence that takes effect
    pub winner: CollisionOccurrence,
    /// All occurrences, local first then chain order
    pub occurrences: Vec<CollisionOccurrence>,
}

/// A single occurrence of a colliding key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionOccurrence {
    pub origin: ResourceOrigin,
    /// Project that defines it; the scanned project itself for local copies
    pub project: String,
}

impl CollisionReport {
    /// Find overridden resources in a scan result
    #[must_use]
    pub fn from_result(result: &ProjectScanResult) -> Self {
        let mut by_key: BTreeMap<&str, Vec<CollisionOccurrence>> = BTreeMap::new();

        for resource in result.all_resources().filter(|r| !r.is_folder()) {
            let project = match resource.origin {
                ResourceOrigin::Local => result.project_name.clone(),
                ResourceOrigin::Inherited => resource
                    .source_project
                    .clone()
                    .unwrap_or_else(|| result.project_name.clone()),
            };
            let occurrences = by_key.entry(resource.key()).or_default();
            let duplicate = occurrences
                .iter()
                .any(|o| o.origin == resource.origin && o.project == project);
            if !duplicate {
                occurrences.push(CollisionOccurrence {
                    origin: resource.origin,
                    project,
                });
            }
        }

        let collisions = by_key
            .into_iter()
            .filter(|(_, occurrences)| occurrences.len() > 1)
            .map(|(key, occurrences)| Collision {
                key: key.to_string(),
                // Local resources come first, then inherited ones in chain order
                winner: occurrences[0].clone(),
                occurrences,
            })
            .collect();

        Self { collisions }
    }

    /// Check if there are any collisions
    #[must_use]
    pub fn has_collisions(&self) -> bool {
        !self.collisions.is_empty()
    }

    /// Get total number of collisions
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.collisions.len()
    }
}
