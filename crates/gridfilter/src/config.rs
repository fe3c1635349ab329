//! # Configuration
//!
//! Filtering defaults are managed by [`confique`], layered in priority order:
//! 1. **Environment variables**: `GRIDFILTER_IGNORE_CASE`, `GRIDFILTER_STRATEGY`
//! 2. **TOML file**: passed to [`FilterConfig::load`]; a missing file is skipped
//! 3. **Compiled defaults**: via `#[config(default = ...)]`
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `ignore_case` | `true` | Case sensitivity of string filters when the caller does not say |
//! | `strategy` | `ancestor-inclusion` | `ancestor-inclusion` or `matching-records-only` |

use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::strategy::StrategyKind;

/// Defaults applied by [`crate::service::FilteringService`].
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// Fold case in string conditions unless a filter call overrides it.
    #[config(env = "GRIDFILTER_IGNORE_CASE", default = true)]
    pub ignore_case: bool,

    /// Strategy installed when a service is created.
    #[config(env = "GRIDFILTER_STRATEGY", default = "ancestor-inclusion")]
    pub strategy: StrategyKind,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignore_case: true,
            strategy: StrategyKind::AncestorInclusion,
        }
    }
}

impl FilterConfig {
    /// Loads environment over `path` over defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::builder().env().file(path.as_ref()).load()?)
    }

    /// Loads environment over defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self::builder().env().load()?)
    }
}
