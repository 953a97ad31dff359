//! `caregaps doctor` — Diagnose configuration and connectivity.

use caregaps_config::AppConfig;
use caregaps_core::EventBus;
use std::sync::Arc;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("CareGaps Doctor — Diagnostics");
    println!("=============================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file — using defaults (run `caregaps onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the configuration before running further checks.");
            return Ok(());
        }
    };

    let profile = config.profile();
    println!(
        "  ✅ Profile: {:?} (max {} iterations, masking {}, data mode {:?})",
        profile.kind,
        profile.max_iterations,
        if profile.phi_masking { "on" } else { "off" },
        config.agent.data_mode
    );

    match caregaps_providers::build_provider(&config) {
        Ok(provider) => {
            println!("  ✅ API token configured");
            match provider.health_check().await {
                Ok(true) => println!("  ✅ Serving endpoint reachable: {}", config.llm.base_url),
                Ok(false) => {
                    println!("  ❌ Serving endpoint refused the request: {}", config.llm.base_url);
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Serving endpoint unreachable: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Model provider: {e}");
            issues += 1;
        }
    }

    let functions = &config.functions;
    for (label, path) in [
        ("Catalog file", &functions.catalog_path),
        ("Fixtures file", &functions.fixtures_path),
    ] {
        if let Some(path) = path {
            if path.exists() {
                println!("  ✅ {label}: {}", path.display());
            } else {
                println!("  ❌ {label} missing: {}", path.display());
                issues += 1;
            }
        }
    }

    match caregaps_tools::registry_from_config(&config, Arc::new(EventBus::default())).await {
        Ok(registry) => {
            let wanted = if functions.names.is_empty() {
                caregaps_tools::FUNCTION_ROSTER.len()
            } else {
                functions.names.len()
            };
            if registry.len() == wanted {
                println!("  ✅ Functions registered: {}", registry.len());
            } else {
                println!(
                    "  ⚠️  Functions registered: {} of {wanted} requested",
                    registry.len()
                );
                issues += 1;
            }
        }
        Err(e) => {
            println!("  ❌ Function catalog: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
