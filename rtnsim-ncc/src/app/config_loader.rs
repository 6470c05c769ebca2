//! Configuration Loading for the NCC Application
//!
//! Wraps the `NccConfig` from `rtnsim-common` with validation and error
//! handling specific to the NCC. All failures here are fatal at startup;
//! the scheduler never reloads configuration at runtime.

use std::path::Path;

use thiserror::Error;

use rtnsim_common::config::{CarrierTrafficType, NccConfig};
use rtnsim_common::{TerminalId, WaveformId};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ConfigValidationError),
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Superframe duration must be positive
    #[error("Superframe duration is zero")]
    ZeroSuperframeDuration,

    /// No frames configured
    #[error("Superframe has no frames")]
    NoFrames,

    /// No DAMA carriers configured
    #[error("Superframe has no DAMA carriers")]
    NoDamaCarriers,

    /// Waveform table is empty
    #[error("Waveform table is empty")]
    EmptyWaveformTable,

    /// Duplicate waveform id
    #[error("Duplicate waveform id: {0}")]
    DuplicateWaveform(WaveformId),

    /// Default waveform missing from the table
    #[error("Default waveform {0} is not in the table")]
    UnknownDefaultWaveform(WaveformId),

    /// Duplicate terminal id
    #[error("Duplicate terminal id: {0}")]
    DuplicateTerminal(TerminalId),

    /// Inconsistent per-terminal service rates
    #[error("Invalid service rates for {terminal}: {reason}")]
    InvalidServiceRates {
        /// Offending terminal.
        terminal: TerminalId,
        /// What is wrong with the rates.
        reason: String,
    },

    /// Target load outside (0, 1]
    #[error("Target load {0} is outside (0, 1]")]
    InvalidTargetLoad(f64),

    /// Publish guard must leave room inside the superframe
    #[error("Publish guard of {guard_ms} ms does not fit the {superframe_ms} ms superframe")]
    PublishGuardTooLarge {
        /// Configured guard in milliseconds.
        guard_ms: u64,
        /// Superframe duration in milliseconds.
        superframe_ms: u64,
    },
}

/// Loads an NCC configuration from a YAML file.
///
/// For comprehensive validation, call `validate_ncc_config` after loading.
pub fn load_ncc_config<P: AsRef<Path>>(path: P) -> Result<NccConfig, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_ncc_config_from_str(&contents)
}

/// Loads an NCC configuration from a YAML string.
pub fn load_ncc_config_from_str(yaml: &str) -> Result<NccConfig, ConfigError> {
    let config: NccConfig =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    Ok(config)
}

/// Validates a loaded NCC configuration.
pub fn validate_ncc_config(config: &NccConfig) -> Result<(), ConfigValidationError> {
    if config.superframe.duration_ms == 0 {
        return Err(ConfigValidationError::ZeroSuperframeDuration);
    }
    if config.superframe.frames.is_empty() {
        return Err(ConfigValidationError::NoFrames);
    }
    if !config
        .superframe
        .frames
        .iter()
        .any(|f| f.traffic == CarrierTrafficType::Dama && f.carrier_count > 0)
    {
        return Err(ConfigValidationError::NoDamaCarriers);
    }

    if config.waveform_table.waveforms.is_empty() {
        return Err(ConfigValidationError::EmptyWaveformTable);
    }
    let mut waveform_ids = Vec::new();
    for waveform in &config.waveform_table.waveforms {
        if waveform_ids.contains(&waveform.id) {
            return Err(ConfigValidationError::DuplicateWaveform(waveform.id));
        }
        waveform_ids.push(waveform.id);
    }
    if !waveform_ids.contains(&config.waveform_table.default_waveform) {
        return Err(ConfigValidationError::UnknownDefaultWaveform(
            config.waveform_table.default_waveform,
        ));
    }

    let mut terminal_ids = Vec::new();
    for terminal in &config.terminals {
        if terminal_ids.contains(&terminal.id) {
            return Err(ConfigValidationError::DuplicateTerminal(terminal.id));
        }
        terminal_ids.push(terminal.id);

        if terminal.cra_kbps > terminal.max_rbdc_kbps {
            return Err(ConfigValidationError::InvalidServiceRates {
                terminal: terminal.id,
                reason: format!(
                    "CRA {} kbps exceeds maximum rate {} kbps",
                    terminal.cra_kbps, terminal.max_rbdc_kbps
                ),
            });
        }
        if terminal.min_rbdc_kbps > terminal.max_rbdc_kbps {
            return Err(ConfigValidationError::InvalidServiceRates {
                terminal: terminal.id,
                reason: format!(
                    "minimum RBDC {} kbps exceeds maximum rate {} kbps",
                    terminal.min_rbdc_kbps, terminal.max_rbdc_kbps
                ),
            });
        }
    }

    if config.dama.target_load <= 0.0 || config.dama.target_load > 1.0 {
        return Err(ConfigValidationError::InvalidTargetLoad(
            config.dama.target_load,
        ));
    }

    if config.publish_guard_ms >= config.superframe.duration_ms {
        return Err(ConfigValidationError::PublishGuardTooLarge {
            guard_ms: config.publish_guard_ms,
            superframe_ms: config.superframe.duration_ms,
        });
    }

    Ok(())
}

/// Loads and validates an NCC configuration in one step.
pub fn load_and_validate_ncc_config<P: AsRef<Path>>(path: P) -> Result<NccConfig, ConfigError> {
    let config = load_ncc_config(path)?;
    validate_ncc_config(&config)?;
    Ok(config)
}
