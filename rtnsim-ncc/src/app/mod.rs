//! Application-level configuration loading and validation.

mod config_loader;

pub use config_loader::{
    load_and_validate_ncc_config, load_ncc_config, load_ncc_config_from_str, validate_ncc_config,
    ConfigError, ConfigValidationError,
};
