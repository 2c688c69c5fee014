//! Project scan command
//!
//! Handles: ignition-scan scan [PROJECT...]

use crate::OutputFormat;
use anyhow::{Context, Result};
use ignition_scanner::output::{to_json, to_markdown};
use ignition_scanner::{
    CacheStats, ProjectScanResult, ProjectScanService, ProviderRegistry, ScannerConfig,
    ServiceConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CONFIG_FILE: &str = "config.toml";

pub struct ScanOptions {
    pub projects: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub use_cache: bool,
}

/// Default configuration file under the user config directory
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ignition-scanner").join(CONFIG_FILE))
}

/// Load the explicit config file, or the default one if it exists
fn load_config(explicit: Option<&Path>) -> Result<ScannerConfig> {
    if let Some(path) = explicit {
        return ScannerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            tracing::debug!("Using default config {}", path.display());
            ScannerConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        _ => Ok(ScannerConfig::default()),
    }
}

pub async fn execute(options: ScanOptions) -> Result<()> {
    let config = load_config(options.config.as_deref())?;

    let mut projects = options.projects.clone();
    projects.extend(config.existing_projects());
    if projects.is_empty() {
        anyhow::bail!("No projects to scan: pass project directories or list them in a config file");
    }

    // A one-shot scan has nothing to watch
    let service_config = ServiceConfig::from(&config).with_watch(false);
    let service = ProjectScanService::new(ProviderRegistry::with_ignition_defaults(), service_config);

    let results = service.scan_projects(&projects, options.use_cache).await;
    let stats = service.cache_stats();
    service.dispose();

    match &options.output {
        Some(dir) => write_reports(&results, &stats, options.format, dir)?,
        None => print_reports(&results, &stats, options.format)?,
    }

    Ok(())
}

fn print_reports(
    results: &[Arc<ProjectScanResult>],
    stats: &CacheStats,
    format: OutputFormat,
) -> Result<()> {
    if matches!(format, OutputFormat::Json | OutputFormat::Both) {
        println!("{}", to_json(results)?);
    }
    if matches!(format, OutputFormat::Markdown | OutputFormat::Both) {
        println!("{}", to_markdown(results, Some(stats)));
    }
    Ok(())
}

fn write_reports(
    results: &[Arc<ProjectScanResult>],
    stats: &CacheStats,
    format: OutputFormat,
    output_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    if matches!(format, OutputFormat::Json | OutputFormat::Both) {
        let path = output_dir.join("ignition-inventory.json");
        std::fs::write(&path, to_json(results)?)?;
        println!("Wrote JSON inventory to: {}", path.display());
    }
    if matches!(format, OutputFormat::Markdown | OutputFormat::Both) {
        let path = output_dir.join("ignition-inventory.md");
        std::fs::write(&path, to_markdown(results, Some(stats)))?;
        println!("Wrote Markdown inventory to: {}", path.display());
    }

    println!("\nScan complete!");
    println!("  Projects scanned: {}", results.len());
    let resources: usize = results.iter().map(|r| r.resource_count).sum();
    println!("  Local resources: {resources}");
    let warnings: usize = results.iter().map(|r| r.warnings.len()).sum();
    if warnings > 0 {
        println!("  Warnings: {warnings}");
    }

    Ok(())
}
