//! Resource type listing command
//!
//! Handles: ignition-scan types [--json]

use anyhow::Result;
use ignition_scanner::ProviderRegistry;

pub fn execute(json: bool) -> Result<()> {
    let registry = ProviderRegistry::with_ignition_defaults();
    let types = registry.list();

    if json {
        println!("{}", serde_json::to_string_pretty(&types)?);
        return Ok(());
    }

    println!("Resource types ({}):", types.len());
    for descriptor in types {
        let kind = if descriptor.is_singleton {
            "singleton"
        } else {
            "multi"
        };
        println!(
            "  {:<30} {:<10} {}",
            descriptor.resource_type_id,
            kind,
            descriptor.directory_paths.join(", ")
        );
    }
    Ok(())
}
