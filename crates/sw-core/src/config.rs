//! Suggestion tuning parameters and their three-tier resolution.
//!
//! Every call resolves a fresh [`SuggestionConfig`] from system defaults,
//! stored user preferences, and per-request overrides. Later tiers win
//! field by field.

use serde::{Deserialize, Serialize};

/// Fully resolved tuning parameters for one suggestion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionConfig {
    /// Daily commitment cap. Days above half of it count as busy.
    /// Default: 480 (8 hours).
    pub max_daily_minutes: u32,

    /// Minimum gap kept around existing sessions.
    /// Default: 30.
    pub buffer_minutes: u32,

    /// Whether high-priority activities get a bonus for morning slots.
    /// Default: true.
    pub prefer_mornings: bool,

    /// High-priority sessions per day before new ones are penalized.
    /// Default: 2.
    pub max_high_priority_per_day: u32,

    /// IANA timezone all local-calendar reasoning happens in.
    /// Default: `"UTC"`.
    pub timezone: String,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            max_daily_minutes: 480,
            buffer_minutes: 30,
            prefer_mornings: true,
            max_high_priority_per_day: 2,
            timezone: "UTC".to_string(),
        }
    }
}

/// One tier of suggestion configuration; absent fields defer to lower tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_daily_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_mornings: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_high_priority_per_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl PartialConfig {
    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<SuggestionConfig> for PartialConfig {
    fn from(config: SuggestionConfig) -> Self {
        Self {
            max_daily_minutes: Some(config.max_daily_minutes),
            buffer_minutes: Some(config.buffer_minutes),
            prefer_mornings: Some(config.prefer_mornings),
            max_high_priority_per_day: Some(config.max_high_priority_per_day),
            timezone: Some(config.timezone),
        }
    }
}

impl SuggestionConfig {
    /// Merges `overrides ?? stored ?? defaults ?? built-in` per field.
    ///
    /// Stored preferences never carry a timezone; one stored anyway is ignored,
    /// since the timezone is a per-call hint from the caller's device.
    pub fn resolve(
        defaults: Option<&PartialConfig>,
        stored: Option<&PartialConfig>,
        overrides: Option<&PartialConfig>,
    ) -> Self {
        let builtin = Self::default();
        let tiers = [overrides, stored, defaults];

        let pick = |field: fn(&PartialConfig) -> Option<u32>, fallback: u32| {
            tiers.iter().flatten().find_map(|t| field(t)).unwrap_or(fallback)
        };

        let prefer_mornings = tiers
            .iter()
            .flatten()
            .find_map(|t| t.prefer_mornings)
            .unwrap_or(builtin.prefer_mornings);

        let timezone = [overrides, defaults]
            .into_iter()
            .flatten()
            .find_map(|t| t.timezone.clone())
            .unwrap_or(builtin.timezone);

        Self {
            max_daily_minutes: pick(|t| t.max_daily_minutes, builtin.max_daily_minutes),
            buffer_minutes: pick(|t| t.buffer_minutes, builtin.buffer_minutes),
            prefer_mornings,
            max_high_priority_per_day: pick(
                |t| t.max_high_priority_per_day,
                builtin.max_high_priority_per_day,
            ),
            timezone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_nothing_yields_builtin_defaults() {
        let resolved = SuggestionConfig::resolve(None, None, None);
        assert_eq!(resolved, SuggestionConfig::default());

        let empty = PartialConfig::default();
        let resolved = SuggestionConfig::resolve(Some(&empty), Some(&empty), Some(&empty));
        assert_eq!(resolved, SuggestionConfig::default());
    }

    #[test]
    fn stored_value_fills_missing_default() {
        let defaults = PartialConfig {
            max_daily_minutes: None,
            ..PartialConfig::default()
        };
        let stored = PartialConfig {
            max_daily_minutes: Some(600),
            ..PartialConfig::default()
        };
        let resolved = SuggestionConfig::resolve(
            Some(&defaults),
            Some(&stored),
            Some(&PartialConfig::default()),
        );
        assert_eq!(resolved.max_daily_minutes, 600);
    }

    #[test]
    fn override_beats_stored_beats_default_per_field() {
        let defaults = PartialConfig {
            max_daily_minutes: Some(300),
            buffer_minutes: Some(5),
            prefer_mornings: Some(true),
            max_high_priority_per_day: Some(9),
            timezone: Some("Europe/Paris".to_string()),
        };
        let stored = PartialConfig {
            buffer_minutes: Some(15),
            prefer_mornings: Some(false),
            ..PartialConfig::default()
        };
        let overrides = PartialConfig {
            prefer_mornings: Some(true),
            timezone: Some("Asia/Tokyo".to_string()),
            ..PartialConfig::default()
        };

        let resolved = SuggestionConfig::resolve(Some(&defaults), Some(&stored), Some(&overrides));
        assert_eq!(
            resolved,
            SuggestionConfig {
                max_daily_minutes: 300,
                buffer_minutes: 15,
                prefer_mornings: true,
                max_high_priority_per_day: 9,
                timezone: "Asia/Tokyo".to_string(),
            }
        );
    }

    #[test]
    fn stored_timezone_is_ignored() {
        let stored = PartialConfig {
            timezone: Some("Asia/Tokyo".to_string()),
            ..PartialConfig::default()
        };
        let resolved = SuggestionConfig::resolve(None, Some(&stored), None);
        assert_eq!(resolved.timezone, "UTC");
    }

    #[test]
    fn partial_config_deserializes_missing_fields_as_none() {
        let partial: PartialConfig = serde_json::from_str(r#"{"buffer_minutes": 10}"#).unwrap();
        assert_eq!(partial.buffer_minutes, Some(10));
        assert!(partial.max_daily_minutes.is_none());
        assert!(!partial.is_empty());
        assert!(PartialConfig::default().is_empty());
    }
}
