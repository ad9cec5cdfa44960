//! Configuration loading.
//!
//! This module loads controller settings from YAML and the environment with
//! a fixed precedence: file, then `UNITCTL_*` variables. Cluster credentials
//! themselves come from the kubeconfig or the pod's service account.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::api::Unit;
use crate::error::{ConfigError, Result};

use super::spec::ControllerConfig;

/// Variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "UNITCTL_CONFIG";

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "unitctl.yaml";

/// Configuration parser for loading controller configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory `.env` is loaded from.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads the full configuration: `.env`, the file found by
    /// [`find_config_file`] (defaults when there is none), environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `.env` or the configuration file cannot be loaded.
    pub fn load(&self, explicit: Option<&Path>) -> Result<ControllerConfig> {
        self.load_dotenv()?;

        let mut config = match find_config_file(explicit)? {
            Some(path) => self.load_file(path)?,
            None => {
                debug!("No configuration file found, using defaults");
                ControllerConfig::default()
            }
        };

        Self::apply_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ControllerConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ControllerConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(ControllerConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            }
            .into()
        })
    }

    /// Applies `UNITCTL_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(config: &mut ControllerConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let cluster = &mut config.cluster;

        if let Some(path) = lookup("UNITCTL_KUBECONFIG") {
            debug!("Overriding cluster.kubeconfig from environment");
            cluster.kubeconfig = Some(PathBuf::from(path));
        }
        if let Some(context) = lookup("UNITCTL_CONTEXT") {
            debug!("Overriding cluster.context from environment");
            cluster.context = Some(context);
        }
        if let Some(manager) = lookup("UNITCTL_FIELD_MANAGER") {
            debug!("Overriding cluster.field_manager from environment");
            cluster.field_manager = manager;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Finds the configuration file: `explicit`, then `$UNITCTL_CONFIG`, then
/// `./unitctl.yaml`, then `<config dir>/unitctl/config.yaml`.
///
/// Returns `None` when no file exists and none was named.
///
/// # Errors
///
/// Returns an error if an explicitly named file does not exist.
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    if let Some(path) = named {
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound { path }.into());
    }

    let candidates = [
        Some(PathBuf::from(DEFAULT_CONFIG_FILE)),
        dirs::config_dir().map(|d| d.join("unitctl").join("config.yaml")),
    ];

    let found = candidates.into_iter().flatten().find(|p| p.exists());
    if let Some(path) = &found {
        info!("Found configuration file: {}", path.display());
    }
    Ok(found)
}

/// Reads a `Unit` manifest from a YAML or JSON file.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable or not a valid Unit.
pub fn load_unit_manifest(path: impl AsRef<Path>) -> Result<Unit> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::ParseError {
                message: format!("Failed to read manifest: {e}"),
                location: Some(path.display().to_string()),
            }
        }
    })?;

    let unit: Unit = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
        message: format!("Invalid Unit manifest: {e}"),
        location: Some(path.display().to_string()),
    })?;

    debug!("Loaded manifest for Unit {}", unit.key());
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
cluster:
  kubeconfig: /etc/unitctl/kubeconfig
  context: prod
  timeout_secs: 10
reconcile:
  requeue_base_secs: 2
  requeue_max_secs: 60
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("parses");

        assert_eq!(
            config.cluster.kubeconfig,
            Some(PathBuf::from("/etc/unitctl/kubeconfig"))
        );
        assert_eq!(config.cluster.context.as_deref(), Some("prod"));
        assert_eq!(config.cluster.timeout_secs, 10);
        assert_eq!(config.reconcile.requeue_max_secs, 60);
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = ConfigParser::new()
            .parse_yaml("cluster: [", Some(Path::new("bad.yaml")))
            .expect_err("invalid yaml");

        assert!(matches!(
            err,
            ControllerError::Config(ConfigError::ParseError { location: Some(ref l), .. }) if l == "bad.yaml"
        ));
    }

    #[test]
    fn test_load_file_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("unitctl.yaml");
        std::fs::write(&path, "cluster:\n  context: kind-dev\n").expect("write");

        let config = ConfigParser::new().load_file(&path).expect("loads");
        assert_eq!(config.cluster.context.as_deref(), Some("kind-dev"));

        let missing = ConfigParser::new().load_file(dir.path().join("nope.yaml"));
        assert!(matches!(
            missing,
            Err(ControllerError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ControllerConfig::default();
        ConfigParser::apply_overrides(
            &mut config,
            env(&[
                ("UNITCTL_CONTEXT", "staging"),
                ("UNITCTL_FIELD_MANAGER", "ci"),
            ]),
        );

        assert_eq!(config.cluster.context.as_deref(), Some("staging"));
        assert_eq!(config.cluster.field_manager, "ci");
        assert!(config.cluster.kubeconfig.is_none());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ConfigParser::new().parse_yaml("  \n", None).expect("parses");
        assert_eq!(config, ControllerConfig::default());
        assert!(config.cluster.is_inferred());
    }

    #[test]
    fn test_explicit_missing_config_errors() {
        let result = find_config_file(Some(Path::new("/nonexistent/unitctl.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_unit_manifest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("db.yaml");
        std::fs::write(
            &path,
            "apiVersion: custom.hmlss.ml/v1\nkind: Unit\nmetadata:\n  name: db\nspec:\n  category: StatefulSet\n",
        )
        .expect("write");

        let unit = load_unit_manifest(&path).expect("loads");
        assert_eq!(unit.key().to_string(), "default/db");
        assert!(!unit.spec.category.is_stateless());

        std::fs::write(&path, "spec: [").expect("write");
        assert!(load_unit_manifest(&path).is_err());
    }
}
