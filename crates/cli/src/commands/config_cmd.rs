//! `convoquery config` — Configuration management commands.

use convoquery_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set CONVOQUERY_API_KEY or OPENAI_API_KEY env var)");
            }
            if config.scheduler.max_concurrent > 10 {
                warnings.push("More than 10 in-flight calls is likely to hit rate limits");
            }
            if config.scheduler.slot_wait() < config.scheduler.max_delay() {
                warnings.push("scheduler.slot_wait_ms is shorter than one paced call");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:  {}", config.provider);
            println!("   Endpoint:  {}", config.base_url);
            println!("   Model:     {}", config.model);
            println!("   Slots:     {}", config.scheduler.max_concurrent);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", redacted_toml(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

fn redacted_toml(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("[REDACTED]".into());
    }
    toml::to_string_pretty(&shown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn shown_config_hides_the_key() {
        let config = AppConfig {
            api_key: Some("sk-very-secret".into()),
            ..AppConfig::default()
        };
        let text = redacted_toml(&config).unwrap();
        assert!(!text.contains("sk-very-secret"));
        assert!(text.contains("[REDACTED]"));
        assert!(text.contains("[scheduler]"));
    }
}
