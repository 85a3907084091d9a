//! `convoquery check` — Diagnose the setup and probe the completion endpoint.

use convoquery_config::AppConfig;
use convoquery_core::provider::CompletionService;
use convoquery_providers::OpenAiCompatService;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 ConvoQuery Check");
    println!("===================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `convoquery onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            return Err(e.into());
        }
    };

    let Some(api_key) = config.api_key.as_deref().filter(|_| config.has_api_key()) else {
        println!("  ❌ No API key configured (set CONVOQUERY_API_KEY or add api_key)");
        println!("\n  ⚠️  Cannot reach {} without a key.", config.base_url);
        return Ok(());
    };
    println!("  ✅ API key configured");

    let service = OpenAiCompatService::from_config(&config, api_key);
    match service.health_check().await {
        Ok(true) => println!("  ✅ {} reachable at {}", service.name(), config.base_url),
        Ok(false) => {
            println!("  ❌ {} answered but rejected the request", service.name());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ {} unreachable: {e}", service.name());
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
