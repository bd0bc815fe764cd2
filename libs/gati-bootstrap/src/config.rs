use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::paths::home_dir::resolve_home_dir;

fn default_subdir() -> &'static str {
    ".gati"
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default)]
    pub home_dir: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            host: default_host(),
            port: default_port(),
            request_timeout_secs: 0,
        }
    }
}

/// One logging sink's configuration: a `tracing_subscriber::EnvFilter`
/// level plus optional rotating-file settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    #[serde(default)]
    pub console_level: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub file_level: Option<String>,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

pub type LoggingConfig = HashMap<String, LogSection>;

fn default_logging_config() -> LoggingConfig {
    let mut cfg = LoggingConfig::new();
    cfg.insert(
        "default".to_string(),
        LogSection {
            console_level: Some("info".to_string()),
            ..Default::default()
        },
    );
    cfg
}

/// Root application configuration, layered from defaults, an optional YAML
/// file, and `GATI__`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_logging_config")]
    pub logging: LoggingConfig,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub modules_dir: Option<String>,
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: default_logging_config(),
            environment: default_environment(),
            modules_dir: None,
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct CliArgs {
    /// Path to a YAML config file
    #[arg(long)]
    pub config: Option<String>,
    /// Override the listen port
    #[arg(long)]
    pub port: Option<u16>,
    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,
    /// Increase log verbosity (repeatable: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Run with mocked/minimal defaults (used by tests and `check-config`)
    #[arg(long)]
    pub mock: bool,
}

impl AppConfig {
    /// Loads the layered configuration: built-in defaults, then an optional
    /// YAML file, then `GATI__`-prefixed environment variables
    /// (double-underscore separates nesting, e.g. `GATI__SERVER__PORT`).
    pub fn load_layered(config_path: Option<&str>) -> anyhow::Result<Self> {
        let base = AppConfig::default();
        let mut figment = Figment::from(Serialized::defaults(&base));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("GATI__").split("__"));

        let mut cfg: AppConfig = figment.extract()?;
        normalize_home_dir_inplace(&mut cfg)?;

        if let Some(dir) = cfg.modules_dir.clone() {
            merge_module_files(&mut cfg, Path::new(&dir))?;
        }

        Ok(cfg)
    }

    pub fn load_or_default(config_path: Option<&str>) -> Self {
        match Self::load_layered(config_path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(%err, "failed to load layered config, falling back to defaults");
                let mut cfg = AppConfig::default();
                let _ = normalize_home_dir_inplace(&mut cfg);
                cfg
            }
        }
    }

    /// Applies CLI overrides on top of a loaded configuration: `--port`
    /// wins over the config file, and `-v`/`-vv` raises the default
    /// console log level.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        let level = match args.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        };
        if let Some(level) = level {
            let section = self.logging.entry("default".to_string()).or_default();
            section.console_level = Some(level.to_string());
        }
    }

    /// Applies the plain `PORT`/`HOST` environment variables named directly
    /// by the external contract (as opposed to the `GATI__`-prefixed layer),
    /// as a final override pass after CLI flags.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(host) = std::env::var("HOST") {
            if !host.trim().is_empty() {
                self.server.host = host;
            }
        }
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn normalize_home_dir_inplace(cfg: &mut AppConfig) -> anyhow::Result<()> {
    let provided = if cfg.server.home_dir.trim().is_empty() {
        None
    } else {
        Some(cfg.server.home_dir.clone())
    };
    let resolved: PathBuf = resolve_home_dir(provided, default_subdir(), true)?;
    cfg.server.home_dir = resolved.to_string_lossy().into_owned();
    Ok(())
}

/// Reads every `.yml`/`.yaml` file in `dir` and merges it into
/// `cfg.modules` under a key derived from the file's stem.
fn merge_module_files(cfg: &mut AppConfig, dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if !is_yaml {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let contents = std::fs::read_to_string(&path)?;
        let value: serde_json::Value = serde_yaml::from_str(&contents)?;
        cfg.modules.insert(stem.to_string(), value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_structure() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.environment, "development");
        assert!(cfg.logging.contains_key("default"));
    }

    #[test]
    fn test_load_layered_normalizes_home_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", tmp.path());
        let cfg = AppConfig::load_layered(None).unwrap();
        assert!(PathBuf::from(&cfg.server.home_dir).is_absolute());
    }

    #[test]
    fn test_load_or_default_normalizes_home_dir_when_none() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", tmp.path());
        let cfg = AppConfig::load_or_default(None);
        assert!(PathBuf::from(&cfg.server.home_dir).is_absolute());
    }

    #[test]
    fn test_minimal_yaml_config() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", tmp.path());
        let yaml_path = tmp.path().join("config.yaml");
        std::fs::write(&yaml_path, "server:\n  port: 9000\n").unwrap();
        let cfg = AppConfig::load_layered(Some(yaml_path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.server.port, 9000);
    }

    #[test]
    fn test_env_overrides_port_and_host() {
        std::env::set_var("PORT", "9999");
        std::env::set_var("HOST", "10.0.0.1");
        let mut cfg = AppConfig::default();
        cfg.apply_env_overrides();
        std::env::remove_var("PORT");
        std::env::remove_var("HOST");
        assert_eq!(cfg.server.port, 9999);
        assert_eq!(cfg.server.host, "10.0.0.1");
    }

    #[test]
    fn test_cli_overrides() {
        let mut cfg = AppConfig::default();
        let args = CliArgs {
            port: Some(1234),
            ..Default::default()
        };
        cfg.apply_cli_overrides(&args);
        assert_eq!(cfg.server.port, 1234);
    }

    #[test]
    fn test_cli_verbose_levels_matrix() {
        for (verbose, expected) in [(0u8, None), (1, Some("debug")), (2, Some("trace"))] {
            let mut cfg = AppConfig::default();
            let args = CliArgs {
                verbose,
                ..Default::default()
            };
            cfg.apply_cli_overrides(&args);
            let level = cfg
                .logging
                .get("default")
                .and_then(|s| s.console_level.as_deref());
            match expected {
                None => assert_eq!(level, Some("info")),
                Some(expected) => assert_eq!(level, Some(expected)),
            }
        }
    }

    #[test]
    fn test_layered_config_loading_with_modules_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", tmp.path());
        let modules_dir = tmp.path().join("modules.d");
        std::fs::create_dir_all(&modules_dir).unwrap();
        std::fs::write(modules_dir.join("cache.yaml"), "ttl_secs: 60\n").unwrap();

        let yaml_path = tmp.path().join("config.yaml");
        std::fs::write(
            &yaml_path,
            format!("modules_dir: \"{}\"\n", modules_dir.to_str().unwrap()),
        )
        .unwrap();

        let cfg = AppConfig::load_layered(Some(yaml_path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.modules.get("cache").unwrap()["ttl_secs"], 60);
    }

    #[test]
    fn test_to_yaml_roundtrip_basic() {
        let cfg = AppConfig::default();
        let yaml = cfg.to_yaml().unwrap();
        let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.server.port, cfg.server.port);
    }

    #[test]
    fn test_invalid_yaml_missing_required_field() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", tmp.path());
        let yaml_path = tmp.path().join("config.yaml");
        std::fs::write(&yaml_path, "server:\n  unknown_field: true\n").unwrap();
        let result = AppConfig::load_layered(Some(yaml_path.to_str().unwrap()));
        assert!(result.is_err());
    }
}
