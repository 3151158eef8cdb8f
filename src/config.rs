use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat that receives match alerts. Must be a TOML integer; a quoted
    /// value fails the parse and aborts startup.
    pub admin_chat_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Initial keyword and chat sets, applied before any runtime mutations.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub chats: Vec<i64>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.telegram.bot_token.trim().is_empty() {
            bail!("telegram.bot_token must not be empty");
        }
        Ok(config)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: "test-token".to_string(),
                admin_chat_id: 111,
            },
            server: ServerConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = Config::parse(
            r#"
            [telegram]
            bot_token = "123:abc"
            admin_chat_id = 111222333
            "#,
        )
        .unwrap();
        assert_eq!(config.telegram.admin_chat_id, 111222333);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert!(config.monitor.keywords.is_empty());
        assert!(config.monitor.chats.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let config = Config::parse(
            r#"
            [telegram]
            bot_token = "123:abc"
            admin_chat_id = -100200

            [server]
            host = "127.0.0.1"
            port = 9000

            [monitor]
            keywords = ["job", "freelance"]
            chats = [42, -1001234]
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.monitor.keywords, vec!["job", "freelance"]);
        assert_eq!(config.monitor.chats, vec![42, -1001234]);
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let result = Config::parse(
            r#"
            [telegram]
            admin_chat_id = 1
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_token_is_fatal() {
        let result = Config::parse(
            r#"
            [telegram]
            bot_token = "  "
            admin_chat_id = 1
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_non_integer_admin_id_is_fatal() {
        let result = Config::parse(
            r#"
            [telegram]
            bot_token = "123:abc"
            admin_chat_id = "not-a-number"
            "#,
        );
        assert!(result.is_err());
    }
}
