//! Configuration schema.
//!
//! [`MatchConfig`] is the raw deserialized YAML shape (duration fields are
//! humantime strings); [`MatchSettings`] is the parsed, typed form served to
//! the engine through the [`Settings`](crate::hooks::Settings) seam.

use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Day/night cycle speed for the match world.
///
/// The tick driver boosts the in-world clock every tick so a full cycle
/// takes the configured wall-clock time; the slowest setting and the two
/// pinned ones need no boost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayCycle {
    /// Full cycle every five minutes.
    #[default]
    FiveMinutes,
    /// Full cycle every ten minutes.
    TenMinutes,
    /// Natural cycle length.
    TwentyMinutes,
    /// Pinned to day.
    AlwaysDay,
    /// Pinned to night.
    AlwaysNight,
}

impl DayCycle {
    /// Extra in-world clock units added per 50 ms tick.
    #[must_use]
    pub const fn per_tick_boost(self) -> u32 {
        match self {
            Self::FiveMinutes => 4,
            Self::TenMinutes => 2,
            Self::TwentyMinutes | Self::AlwaysDay | Self::AlwaysNight => 0,
        }
    }
}

/// How initial placement spacing is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpreadMethod {
    /// One placement point per group.
    #[default]
    ByGroups,
    /// One placement point per combatant.
    ByMembers,
}

impl SpreadMethod {
    /// Minimum spacing between placement points for a spread of
    /// `max_spread`, sized so the expected number of generated points
    /// comfortably covers `groups`-or-`members` placements.
    #[must_use]
    pub fn min_spacing(self, max_spread: f64, groups: usize, members: usize) -> f64 {
        let n = match self {
            Self::ByGroups => groups,
            Self::ByMembers => members,
        }
        .max(1);
        #[allow(clippy::cast_precision_loss)]
        let n = n as f64;
        max_spread / (3.0 * n).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Raw config (YAML shape)
// ---------------------------------------------------------------------------

/// Raw match configuration as deserialized from YAML.
///
/// Duration-valued fields are humantime strings (`"15m"`, `"90s"`); they are
/// parsed into [`MatchSettings`] by [`MatchConfig::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    /// Per-stage duration overrides, keyed by stage id. `"0s"` disables a
    /// stage.
    pub intervals: IndexMap<String, String>,

    /// Per-stage boundary diameter overrides, keyed by stage id.
    pub boundaries: IndexMap<String, f64>,

    /// Combat-free grace period from match start.
    pub grace_period: Option<String>,

    /// Delay from match start until the one-time full heal.
    pub final_heal: Option<String>,

    /// Day/night cycle speed.
    pub day_cycle: DayCycle,

    /// Whether the post-victory bonus round is enabled.
    pub bonus_round: bool,

    /// Initial placement spacing method.
    pub spread: SpreadMethod,
}

impl MatchConfig {
    /// Parses the humantime fields into typed [`MatchSettings`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for any unparseable duration.
    pub fn resolve(&self) -> Result<MatchSettings, ConfigError> {
        let mut intervals = IndexMap::new();
        for (id, raw) in &self.intervals {
            intervals.insert(id.clone(), parse_duration(&format!("intervals.{id}"), raw)?);
        }

        let grace_period = self
            .grace_period
            .as_deref()
            .map(|raw| parse_duration("grace_period", raw))
            .transpose()?;
        let final_heal = self
            .final_heal
            .as_deref()
            .map(|raw| parse_duration("final_heal", raw))
            .transpose()?;

        Ok(MatchSettings {
            intervals,
            boundaries: self.boundaries.clone(),
            grace_period,
            final_heal,
            day_cycle: self.day_cycle,
            bonus_round: self.bonus_round,
            spread: self.spread,
        })
    }
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        expected: "a duration like '15m', '90s' or '0s'".to_string(),
    })
}

// ---------------------------------------------------------------------------
// Typed settings
// ---------------------------------------------------------------------------

/// Parsed, typed match settings.
#[derive(Debug, Clone, Default)]
pub struct MatchSettings {
    /// Per-stage duration overrides.
    pub intervals: IndexMap<String, Duration>,
    /// Per-stage boundary overrides.
    pub boundaries: IndexMap<String, f64>,
    /// Combat-free grace period.
    pub grace_period: Option<Duration>,
    /// Final heal delay.
    pub final_heal: Option<Duration>,
    /// Day/night cycle speed.
    pub day_cycle: DayCycle,
    /// Bonus round toggle.
    pub bonus_round: bool,
    /// Placement spacing method.
    pub spread: SpreadMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MatchConfig::default();
        assert_eq!(config.day_cycle, DayCycle::FiveMinutes);
        assert!(!config.bonus_round);
        assert_eq!(config.spread, SpreadMethod::ByGroups);
        assert!(config.grace_period.is_none());
    }

    #[test]
    fn parses_full_yaml() {
        let yaml = r"
intervals:
  boundary_hold: 45m
  respite: 0s
boundaries:
  boundary_hold: 800.0
grace_period: 10m
final_heal: 2m
day_cycle: always-day
bonus_round: true
spread: by-members
";
        let config: MatchConfig = serde_yaml::from_str(yaml).unwrap();
        let settings = config.resolve().unwrap();
        assert_eq!(
            settings.intervals.get("boundary_hold"),
            Some(&Duration::from_secs(45 * 60))
        );
        assert_eq!(settings.intervals.get("respite"), Some(&Duration::ZERO));
        assert_eq!(settings.grace_period, Some(Duration::from_secs(600)));
        assert_eq!(settings.day_cycle, DayCycle::AlwaysDay);
        assert!(settings.bonus_round);
        assert_eq!(settings.spread, SpreadMethod::ByMembers);
    }

    #[test]
    fn rejects_unknown_fields() {
        let yaml = "wither_bonus: true";
        let result: Result<MatchConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_duration() {
        let config: MatchConfig = serde_yaml::from_str("grace_period: soon").unwrap();
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("grace_period"));
    }

    #[test]
    fn day_cycle_boosts() {
        assert_eq!(DayCycle::FiveMinutes.per_tick_boost(), 4);
        assert_eq!(DayCycle::TenMinutes.per_tick_boost(), 2);
        assert_eq!(DayCycle::TwentyMinutes.per_tick_boost(), 0);
        assert_eq!(DayCycle::AlwaysDay.per_tick_boost(), 0);
        assert_eq!(DayCycle::AlwaysNight.per_tick_boost(), 0);
    }

    #[test]
    fn spacing_follows_group_count() {
        let spacing = SpreadMethod::ByGroups.min_spacing(1200.0, 3, 12);
        assert!((spacing - 1200.0 / 3.0_f64.sqrt() / 3.0_f64.sqrt()).abs() < 1.0);
        // by-members divides the same spread among more points
        let tighter = SpreadMethod::ByMembers.min_spacing(1200.0, 3, 12);
        assert!(tighter < spacing);
    }

    #[test]
    fn spacing_handles_zero_counts() {
        let spacing = SpreadMethod::ByGroups.min_spacing(100.0, 0, 0);
        assert!(spacing.is_finite() && spacing > 0.0);
    }
}
