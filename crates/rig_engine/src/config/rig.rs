//! # Animation Runtime Configuration
//!
//! Settings for the skeletal animation runtime and the handle pools backing it.
//!
//! ```toml
//! log_level = "info"
//!
//! [animation]
//! default_speed = 1.0
//! default_looping = true
//! crossfade_seconds = 0.2
//!
//! [pools]
//! initial_capacity = 64
//! ```

use serde::{Deserialize, Serialize};

use super::Config;

/// Playback defaults applied to newly created animation players
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Playback speed multiplier
    pub default_speed: f32,
    /// Whether clips loop unless told otherwise
    pub default_looping: bool,
    /// Blend duration used by `AnimationPlayer::crossfade_default`
    pub crossfade_seconds: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            default_speed: 1.0,
            default_looping: true,
            crossfade_seconds: 0.2,
        }
    }
}

/// Pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Slots reserved up front in every runtime pool
    pub initial_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { initial_capacity: 64 }
    }
}

/// Top-level configuration for the rig runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Animation playback settings
    pub animation: AnimationConfig,
    /// Pool sizing
    pub pools: PoolConfig,
    /// Default `env_logger` filter
    pub log_level: String,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            animation: AnimationConfig::default(),
            pools: PoolConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config for RigConfig {}
