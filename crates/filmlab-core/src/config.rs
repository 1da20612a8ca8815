use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Engine-wide settings. Every field has a default so partial JSON
/// files are accepted.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub preview: PreviewConfig,
    pub history: HistoryConfig,
    pub histogram: HistogramConfig,
    pub film_profiles: FilmProfiles,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    /// Quiet period after the last parameter change before a remote
    /// render is requested.
    pub debounce_ms: u64,
    /// Width requested from the high-precision renderer.
    pub max_width: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 180,
            max_width: 1600,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of undo snapshots kept.
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistogramConfig {
    pub idle_stride: usize,
    pub drag_stride: usize,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            idle_stride: 2,
            drag_stride: 8,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parse config: {}", path.display()))?;
        info!(
            ?path,
            profiles = config.film_profiles.len(),
            "loaded engine config"
        );
        Ok(config)
    }
}

/// Parametric film characteristic curve.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilmProfile {
    pub gamma: f32,
    pub d_min: f32,
    pub d_max: f32,
}

impl FilmProfile {
    pub const DEFAULT: Self = Self {
        gamma: 0.6,
        d_min: 0.1,
        d_max: 3.0,
    };
}

pub const DEFAULT_PROFILE_KEY: &str = "default";

/// Film-curve profile table, keyed by stock name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FilmProfiles(BTreeMap<String, FilmProfile>);

impl Default for FilmProfiles {
    fn default() -> Self {
        let builtin = [
            (DEFAULT_PROFILE_KEY, FilmProfile::DEFAULT),
            ("portra400", FilmProfile { gamma: 0.65, d_min: 0.15, d_max: 2.9 }),
            ("ektar100", FilmProfile { gamma: 0.75, d_min: 0.12, d_max: 3.2 }),
            ("fuji400h", FilmProfile { gamma: 0.62, d_min: 0.14, d_max: 2.8 }),
            ("hp5", FilmProfile { gamma: 0.7, d_min: 0.2, d_max: 2.6 }),
            ("trix400", FilmProfile { gamma: 0.72, d_min: 0.18, d_max: 2.7 }),
        ];
        Self(
            builtin
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl FilmProfiles {
    /// Look up a profile, falling back to the default curve for unknown
    /// keys.
    pub fn resolve(&self, key: &str) -> FilmProfile {
        match self.0.get(key) {
            Some(profile) => *profile,
            None => {
                warn!(key, "unknown film profile, using default");
                self.0
                    .get(DEFAULT_PROFILE_KEY)
                    .copied()
                    .unwrap_or(FilmProfile::DEFAULT)
            }
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, profile: FilmProfile) {
        self.0.insert(key.into(), profile);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
