//! `statsagent doctor`: diagnose configuration and connectivity.

use statsagent_config::AppConfig;
use statsagent_core::data::DataService;
use statsagent_datacommons::{InMemoryDataService, McpDataClient};

pub async fn run(offline: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 statsagent doctor");
    println!("====================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file (defaults in use) — run `statsagent init`");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Cannot continue without a valid configuration.");
            return Ok(());
        }
    };

    // Reasoning provider
    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else if config.provider.name != "ollama" {
        println!("  ❌ No API key: set STATSAGENT_API_KEY or OPENAI_API_KEY");
        issues += 1;
    }

    match statsagent_providers::from_config(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  ❌ Provider '{}' rejected the request (check the API key)", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        // A missing key was reported above.
        Err(_) if !config.has_api_key() => {}
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    // Data service
    let service: Box<dyn DataService> = if offline {
        Box::new(InMemoryDataService::sample())
    } else {
        Box::new(McpDataClient::from_config(&config.data_service)?)
    };
    match service.health_check().await {
        Ok(true) => println!("  ✅ Data service '{}' reachable", service.name()),
        Ok(false) => {
            println!("  ❌ Data service at {} answered with an error", config.data_service.url);
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Data service at {} unreachable: {e}", config.data_service.url);
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
