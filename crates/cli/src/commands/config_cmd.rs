//! `parley config`: inspect the effective configuration.

use parley_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    print!("{}", render(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");
            if !config.has_api_key() {
                println!("   Warning: no API key set (PARLEY_API_KEY or OPENROUTER_API_KEY)");
            }
            println!();
            println!("   Chat model:     {}", config.models.chat);
            println!("   Summary model:  {}", config.models.summary);
            println!("   Fallback model: {}", config.models.fallback);
            println!(
                "   Router:         {} ({})",
                if config.router.enabled { "on" } else { "off" },
                config.models.router
            );
            println!("   Summary every:  {} turns", config.context.summary_interval);
            println!("   Retry schedule: {:?}s", config.retry.timeouts_secs);
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// TOML for display, with the key masked.
fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
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
    fn rendered_config_masks_key() {
        let config = AppConfig {
            api_key: Some("sk-or-very-secret".into()),
            ..AppConfig::default()
        };
        let text = render(&config).unwrap();
        assert!(!text.contains("sk-or-very-secret"));
        assert!(text.contains("[REDACTED]"));
        assert!(text.contains("summary_interval"));
    }
}
