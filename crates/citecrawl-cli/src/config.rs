//! Configuration loading from TOML files

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for citecrawl
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlSection,
    pub openalex: OpenAlexSection,
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlSection {
    pub max_levels: u32,
    pub max_nodes: usize,
    pub page_size: usize,
    pub workers: usize,
}

impl Default for CrawlSection {
    fn default() -> Self {
        let defaults = citecrawl_openalex::CrawlConfig::default();
        Self {
            max_levels: defaults.max_levels,
            max_nodes: defaults.max_nodes,
            page_size: defaults.page_size,
            workers: defaults.workers,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAlexSection {
    pub base_url: String,
    /// Courtesy contact; `${VAR}` expands from the environment
    #[serde(deserialize_with = "deserialize_env_var")]
    pub mailto: Option<String>,
}

impl Default for OpenAlexSection {
    fn default() -> Self {
        Self {
            base_url: citecrawl_openalex::client::DEFAULT_BASE_URL.to_string(),
            mailto: std::env::var("CITECRAWL_MAILTO").ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    pub rate_per_sec: f64,
    pub burst: usize,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2,
            max_delay_secs: 60,
            rate_per_sec: 10.0,
            burst: 10,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./citecrawl.toml (current directory)
    /// 2. ~/.config/citecrawl/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("citecrawl.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "citecrawl") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Print the effective configuration as a table on stderr.
    pub fn print_table(&self) {
        use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Setting").fg(Color::Cyan),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        table.add_row(vec!["Max levels", &self.crawl.max_levels.to_string()]);
        table.add_row(vec!["Max nodes", &self.crawl.max_nodes.to_string()]);
        table.add_row(vec!["Page size", &self.crawl.page_size.to_string()]);
        table.add_row(vec!["Workers", &self.crawl.workers.to_string()]);
        table.add_row(vec!["OA base URL", &self.openalex.base_url]);
        table.add_row(vec![
            "Mailto",
            self.openalex.mailto.as_deref().unwrap_or("not set"),
        ]);
        table.add_row(vec!["Max retries", &self.http.max_retries.to_string()]);
        table.add_row(vec![
            "Backoff",
            &format!(
                "{}s base, {}s cap",
                self.http.base_delay_secs, self.http.max_delay_secs
            ),
        ]);
        table.add_row(vec![
            "Rate limit",
            &format!("{}/s (burst {})", self.http.rate_per_sec, self.http.burst),
        ]);

        eprintln!("\n{table}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.crawl.max_levels, 10);
        assert_eq!(config.crawl.max_nodes, 10_000);
        assert!(config.crawl.workers >= 1);
        assert_eq!(config.http.max_retries, 3);
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn expand_env_var_set() {
        std::env::set_var("CITECRAWL_TEST_VAR", "crawler@example.org");
        assert_eq!(
            expand_env_var("${CITECRAWL_TEST_VAR}"),
            Some("crawler@example.org".to_string())
        );
        std::env::remove_var("CITECRAWL_TEST_VAR");
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[crawl]
max_levels = 3
max_nodes = 500
page_size = 25
workers = 4

[openalex]
base_url = "http://localhost:8080"

[http]
rate_per_sec = 5.0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.crawl.max_levels, 3);
        assert_eq!(config.crawl.max_nodes, 500);
        assert_eq!(config.crawl.page_size, 25);
        assert_eq!(config.openalex.base_url, "http://localhost:8080");
        assert!((config.http.rate_per_sec - 5.0).abs() < f64::EPSILON);
        // unspecified sections keep defaults
        assert_eq!(config.http.max_retries, 3);
    }

    #[test]
    fn from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citecrawl.toml");
        std::fs::write(&path, "[crawl]\nmax_levels = 2\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.crawl.max_levels, 2);
    }

    #[test]
    fn from_file_missing_is_an_error() {
        let path = PathBuf::from("/nonexistent/citecrawl.toml");
        assert!(Config::from_file(&path).is_err());
    }
}
