//! JSON output formatter

use crate::error::ScanResult;
use crate::types::ProjectScanResult;
use std::sync::Arc;

/// Convert scan results to a pretty JSON array
///
/// # Errors
/// Returns an error if serialization fails
pub fn to_json(results: &[Arc<ProjectScanResult>]) -> ScanResult<String> {
    let results: Vec<&ProjectScanResult> = results.iter().map(AsRef::as_ref).collect();
    serde_json::to_string_pretty(&results).map_err(Into::into)
}
