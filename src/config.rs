use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "agora", about = "A forum REST API server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token lifetime in minutes.
    pub token_minutes: i64,
    /// Password-reset ticket lifetime in minutes.
    pub reset_ticket_minutes: i64,
    /// Token signing secret. Falls back to AGORA_TOKEN_SECRET, then to a
    /// random per-process key (tokens then die with the process).
    pub token_secret: Option<String>,
    /// Password for the seeded general administrator. Falls back to
    /// AGORA_ADMIN_PASSWORD, then to "admin123".
    pub admin_password: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MailConfig {
    /// SMTP relay host. When unset, outbound mail is logged instead of sent.
    pub host: Option<String>,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    /// Base URL used to build password-reset links.
    pub frontend_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_minutes: 10,
            reset_ticket_minutes: 60,
            token_secret: None,
            admin_password: None,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            username: String::new(),
            password: String::new(),
            from: "forum@localhost".to_string(),
            frontend_url: "http://localhost:3001".to_string(),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Env overrides for secrets
        if config.auth.token_secret.is_none() {
            config.auth.token_secret = std::env::var("AGORA_TOKEN_SECRET").ok();
        }
        if config.auth.admin_password.is_none() {
            config.auth.admin_password = std::env::var("AGORA_ADMIN_PASSWORD").ok();
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("agora.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .expect("Could not determine home directory")
                .join(".agora")
        })
    }

    pub fn db_path(&self) -> &PathBuf {
        self.database.path.as_ref().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(data_dir: Option<PathBuf>) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.token_minutes, 10);
        assert_eq!(config.auth.reset_ticket_minutes, 60);
        assert!(config.auth.token_secret.is_none());
        assert!(config.mail.host.is_none());
        assert_eq!(config.mail.port, 587);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli(Some(PathBuf::from("/tmp/test-agora")));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-agora"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_agora() {
        let cli = cli(None);
        let dir = Config::data_dir(&cli);
        assert!(dir.ends_with(".agora"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = cli(Some(tmp.path().to_path_buf()));
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.db_path(), &tmp.path().join("agora.db"));
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[auth]
token_minutes = 5
token_secret = "from-file"

[mail]
host = "smtp.example.com"
from = "noreply@example.com"
frontend_url = "https://forum.example.com"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: None,
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.token_minutes, 5);
        assert_eq!(config.auth.token_secret.as_deref(), Some("from-file"));
        assert_eq!(config.mail.host.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.mail.frontend_url, "https://forum.example.com");
        // Unspecified sections keep their defaults
        assert_eq!(config.auth.reset_ticket_minutes, 60);
        assert_eq!(config.mail.port, 587);
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }
}
