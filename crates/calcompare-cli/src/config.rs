//! Optional JSON configuration file for the ranking and normalization knobs.
//!
//! ```json
//! {
//!   "weights": { "time_of_day": 0.5, "proximity": 0.0 },
//!   "weekday_scores": { "friday": 0.4 },
//!   "step_minutes": 15,
//!   "time_zone": "Europe/Berlin",
//!   "default_event_time_zone": "Europe/Berlin",
//!   "dst_policy": "skip",
//!   "all_day_blocks": false
//! }
//! ```
//!
//! Every field is optional. Command-line flags override the file, and the
//! file overrides the engine defaults.

use std::path::Path;

use anyhow::{Context, Result};
use calcompare_engine::recurrence::DEFAULT_MAX_INSTANCES;
use calcompare_engine::{DstPolicy, NormalizeOptions, RankingWeights, WeekdayScores};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::debug;

use crate::dto::parse_time_zone;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub weights: RankingWeights,
    pub weekday_scores: WeekdayScores,
    pub step_minutes: Option<i64>,
    /// Zone for weekday and time-of-day evaluation of suggestions.
    pub time_zone: Option<String>,
    /// Zone for event times that carry neither an offset nor a `timeZone`.
    pub default_event_time_zone: Option<String>,
    pub dst_policy: DstPolicy,
    pub all_day_blocks: Option<bool>,
    pub max_recurrence_instances: Option<u16>,
}

impl EngineConfig {
    /// Load the config from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn normalize_options(&self) -> Result<NormalizeOptions> {
        let default_time_zone = self
            .default_event_time_zone
            .as_deref()
            .map(parse_time_zone)
            .transpose()?;
        Ok(NormalizeOptions {
            default_time_zone,
            dst_policy: self.dst_policy,
            all_day_blocks: self.all_day_blocks.unwrap_or(true),
            max_recurrence_instances: self
                .max_recurrence_instances
                .unwrap_or(DEFAULT_MAX_INSTANCES),
        })
    }

    /// Ranking zone, with `flag` taking precedence over the file.
    pub fn ranking_time_zone(&self, flag: Option<&str>) -> Result<Tz> {
        match flag.or(self.time_zone.as_deref()) {
            Some(name) => parse_time_zone(name),
            None => Ok(Tz::UTC),
        }
    }
}
