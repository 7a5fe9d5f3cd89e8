//! # cadence-settings
//!
//! Layered configuration for the Cadence service and dataset tools.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`CadenceSettings::default()`]
//! 2. **Settings file**: `--config`, `$CADENCE_CONFIG`, or `cadence.json`
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `CADENCE_*` overrides (highest priority)
//!
//! Settings are passed explicitly to the components that need them. There is
//! no process-wide settings singleton.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, check_genres, deep_merge, load_settings, load_settings_from_path, settings_path,
    validate,
};
pub use types::*;
