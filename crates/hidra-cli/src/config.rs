//! Configuration file loading

use std::path::Path;

use hidra_world::WorldConfig;

use crate::error::{CliError, CliResult};

/// Load a world configuration from a TOML file, or the defaults when no
/// path is given. Partial files work; unknown keys are rejected.
pub fn load_world_config(path: Option<&Path>) -> CliResult<WorldConfig> {
    let Some(path) = path else {
        return Ok(WorldConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|err| CliError::io(path.display().to_string(), err))?;
    let config: WorldConfig = toml::from_str(&text)
        .map_err(|err| CliError::invalid_file("config", path.display().to_string(), err))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_path() {
        let config = load_world_config(None).unwrap();
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seed0 = 42\nseed1 = 43\nmetrics_enabled = false").unwrap();
        let config = load_world_config(Some(file.path())).unwrap();
        assert_eq!(config.seed0, 42);
        assert_eq!(config.seed1, 43);
        assert!(!config.metrics_enabled);
        // Untouched fields keep their defaults
        assert_eq!(
            config.competition_radius,
            WorldConfig::default().competition_radius
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not_a_real_option = 1").unwrap();
        assert!(load_world_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_invalid_range_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_decay_rate = 7.0").unwrap();
        assert!(load_world_config(Some(file.path())).is_err());
    }
}
