//! Markdown output formatter

use crate::cache::CacheStats;
use crate::collision::CollisionReport;
use crate::types::ProjectScanResult;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Convert scan results to a Markdown report
#[must_use]
pub fn to_markdown(results: &[Arc<ProjectScanResult>], stats: Option<&CacheStats>) -> String {
    let mut output = String::new();

    output.push_str("# Ignition Project Inventory\n\n");
    let _ = writeln!(
        output,
        "**Generated at:** {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );

    if results.is_empty() {
        output.push_str("_No projects scanned_\n\n");
    }

    for result in results {
        write_project(&mut output, result);
    }

    if let Some(stats) = stats {
        output.push_str("## Cache\n\n");
        let _ = writeln!(output, "- **Entries:** {}", stats.entries);
        let _ = writeln!(output, "- **Hits:** {}", stats.cache_hits);
        let _ = writeln!(output, "- **Misses:** {}", stats.cache_misses);
        let _ = writeln!(output, "- **Hit rate:** {:.1}%\n", stats.hit_rate);
    }

    output
}

fn write_project(output: &mut String, result: &ProjectScanResult) {
    let _ = writeln!(output, "## {}\n", result.project_name);
    let _ = writeln!(output, "- **Path:** {}", result.project_path.display());
    if let Some(description) = &result.metadata.description {
        let _ = writeln!(output, "- **Description:** {description}");
    }
    if result.inheritance_chain.is_empty() {
        output.push_str("- **Inherits from:** _nothing_\n");
    } else {
        let _ = writeln!(
            output,
            "- **Inherits from:** {}",
            result.inheritance_chain.join(" → ")
        );
    }
    let _ = writeln!(output, "- **Resources:** {}", result.resource_count);
    let _ = writeln!(
        output,
        "- **Inherited resources:** {}",
        result.inherited_resources.len()
    );
    let _ = writeln!(output, "- **Scan time:** {} ms\n", result.scan_time);

    // Resource counts by type, folders excluded
    let mut by_type: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for resource in result.all_resources().filter(|r| !r.is_folder()) {
        let counts = by_type.entry(resource.resource_type.as_str()).or_default();
        if resource.source_project.is_some() {
            counts.1 += 1;
        } else {
            counts.0 += 1;
        }
    }
    if !by_type.is_empty() {
        output.push_str("### Resources\n\n");
        output.push_str("| Type | Local | Inherited |\n");
        output.push_str("|------|------:|----------:|\n");
        for (resource_type, (local, inherited)) in &by_type {
            let _ = writeln!(output, "| {resource_type} | {local} | {inherited} |");
        }
        output.push('\n');
    }

    let collisions = CollisionReport::from_result(result);
    if collisions.has_collisions() {
        let _ = writeln!(
            output,
            "### Overrides\n\n**Total:** {} overridden resources\n",
            collisions.total_count()
        );
        for collision in &collisions.collisions {
            let _ = writeln!(
                output,
                "- **{}** (winner: {})",
                collision.key, collision.winner.project
            );
        }
        output.push('\n');
    }

    if !result.warnings.is_empty() {
        output.push_str("### Warnings\n\n");
        for warning in &result.warnings {
            let _ = writeln!(output, "- {warning}");
        }
        output.push('\n');
    }
}
