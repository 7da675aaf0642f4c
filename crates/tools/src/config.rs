//! Configuration management for OpenHam tools

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use openham_frame::assembler::AssemblerConfig;
use openham_frame::message_buffer::MessageBufferConfig;
use openham_modem::scheduler::SchedulerConfig;

/// Settings file of the `openham` tool
///
/// ```toml
/// [station]
/// callsign = "K1ABC"
/// grid = "FN31"
///
/// [buffer]
/// max_age_secs = 120
///
/// [station.checksums.overrides]
/// "MSG" = "crc32"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub station: AssemblerConfig,
    pub buffer: MessageBufferConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openham_core::submode::Submode;
    use openham_frame::checksum::ChecksumKind;
    use openham_frame::directed::Command;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.station.callsign = "S56SPZ".to_string();
        config.station.grid = "JN75".to_string();
        config.station.checksums = config
            .station
            .checksums
            .clone()
            .with_override(Command::MSG, ChecksumKind::Crc32);
        config.buffer.max_age_secs = 120;
        config.scheduler.submodes = vec![Submode::Normal, Submode::Slow];

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [station]
            callsign = "KN4CRD"

            [buffer.checksums.overrides]
            "QUERY MSGS" = "none"
            "#,
        )
        .unwrap();
        assert_eq!(config.station.callsign, "KN4CRD");
        assert!(config.station.identify);
        assert_eq!(config.buffer.bucket_hz, 10);
        assert_eq!(config.buffer.checksums.kind_for(Command::QUERY_MSGS), ChecksumKind::None);
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::from_file(Path::new("/nonexistent/openham.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
