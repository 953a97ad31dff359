//! `caregaps tools` — List the functions the agent can call.

use caregaps_core::EventBus;
use std::sync::Arc;

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let registry =
        caregaps_tools::registry_from_config(&config, Arc::new(EventBus::default())).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
        return Ok(());
    }

    println!("Available functions ({})", registry.len());
    println!();
    for spec in registry.list_specs() {
        let required = if spec.required.is_empty() {
            String::new()
        } else {
            format!("  (requires: {})", spec.required.join(", "))
        };
        println!("  {}{required}", spec.qualified_name);
        println!("      {}", first_line(&spec.description));
    }

    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
