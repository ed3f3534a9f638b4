//! Configuration loader.
//!
//! One TOML file per installation directory holds the configuration of
//! every instance, keyed by slot id under `[instances.N]`. Loading creates
//! the file (and any missing section) with defaults and writes it back, so
//! the operator always has something concrete to edit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use super::schema::BridgeConfig;

/// Config file name, resolved relative to the installation directory.
pub const CONFIG_FILE_NAME: &str = "serial-bridge.toml";

const CONFIG_VERSION: u32 = 2;

/// On-disk shape: a version marker plus one section per instance.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub version: u32,
    pub instances: BTreeMap<String, BridgeConfig>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            instances: BTreeMap::new(),
        }
    }
}

/// Load the configuration for `instance_id`, creating the file or the
/// instance section with defaults when missing. Returns the resolved
/// (sanitized, instance-path-substituted) config and the file path.
pub fn load_or_create_for_instance(
    base_dir: &Path,
    instance_id: u16,
) -> ConfigResult<(BridgeConfig, PathBuf)> {
    let path = base_dir.join(CONFIG_FILE_NAME);
    let mut changed = false;

    let mut file = match load_from_disk(&path)? {
        Some(file) => file,
        None => {
            changed = true;
            ConfigFile::default()
        }
    };

    let section = file
        .instances
        .entry(instance_id.to_string())
        .or_insert_with(|| {
            changed = true;
            BridgeConfig::default()
        });
    section.sanitize();
    section.apply_instance_paths(instance_id);
    let resolved = section.clone();

    if changed {
        save_to_disk(&path, &file)?;
    }

    Ok((resolved, path))
}

fn load_from_disk(path: &Path) -> ConfigResult<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(toml::from_str(&text)?))
}

fn save_to_disk(path: &Path, file: &ConfigFile) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
    }
    let text = toml::to_string_pretty(file)?;
    std::fs::write(path, text).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_load_creates_the_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, path) = load_or_create_for_instance(dir.path(), 1).unwrap();

        assert!(path.exists());
        assert_eq!(cfg.tcp.bind_host, "127.0.0.1");
        // Instance paths are resolved in the returned config.
        assert_eq!(cfg.device_select.state_file, "serial-bridge.state_1.json");
        assert_eq!(cfg.logging.health_log, "serial-bridge.health_1.jsonl");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[instances.1]"), "got: {text}");
    }

    #[test]
    fn distinct_instances_get_distinct_sections_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        let (one, _) = load_or_create_for_instance(dir.path(), 1).unwrap();
        let (two, _) = load_or_create_for_instance(dir.path(), 2).unwrap();

        assert_ne!(one.device_select.state_file, two.device_select.state_file);
        assert_ne!(one.logging.health_log, two.logging.health_log);

        let text = std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(text.contains("[instances.1]"));
        assert!(text.contains("[instances.2]"));
    }

    #[test]
    fn operator_edits_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        load_or_create_for_instance(dir.path(), 1).unwrap();

        let path = dir.path().join(CONFIG_FILE_NAME);
        let text = std::fs::read_to_string(&path).unwrap();
        let edited = text.replace("baud_rate = 115200", "baud_rate = 921600");
        assert_ne!(text, edited, "fixture expects the default baud in the file");
        std::fs::write(&path, edited).unwrap();

        let (cfg, _) = load_or_create_for_instance(dir.path(), 1).unwrap();
        assert_eq!(cfg.serial.baud_rate, 921_600);
    }

    #[test]
    fn malformed_file_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "not [valid toml").unwrap();

        let result = load_or_create_for_instance(dir.path(), 1);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn explicit_port_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
            version = 2

            [instances.1.tcp]
            port = 7123
            "#,
        )
        .unwrap();

        let (cfg, _) = load_or_create_for_instance(dir.path(), 1).unwrap();
        assert_eq!(cfg.tcp.port, Some(7123));
    }
}
