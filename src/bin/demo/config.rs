use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Demo configuration: the tray's appearance and the list of service
/// submenus to register.
#[derive(Debug, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_title")]
    pub title: String,
    pub tooltip: Option<String>,
    pub icon: Option<PathBuf>,
    #[serde(default = "default_services")]
    pub services: Vec<String>,
}

fn default_title() -> String {
    "Awesome App".to_owned()
}

fn default_services() -> Vec<String> {
    ["minishift", "kubernetes", "kubedash", "kvirt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn load(path: &Path) -> Result<DemoConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse(&content).with_context(|| format!("parsing config file {}", path.display()))
}

fn parse(content: &str) -> Result<DemoConfig> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = parse(
            r#"
              title = "My Services"
              tooltip = "hover text"
              icon = "/tmp/icon.png"
              services = ["alpha", "beta"]
            "#,
        )
        .unwrap();
        assert_eq!(config.title, "My Services");
        assert_eq!(config.tooltip.as_deref(), Some("hover text"));
        assert_eq!(config.services, vec!["alpha", "beta"]);
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.title, "Awesome App");
        assert!(config.tooltip.is_none());
        assert!(config.icon.is_none());
        assert_eq!(config.services.len(), 4);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("services = 12").is_err());
    }
}
