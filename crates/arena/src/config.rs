//! Arena configuration

use crate::error::{ArenaError, ArenaResult};
use crate::utils::alignment;

/// Environment variable overriding [`ArenaConfig::base_align`]
pub const ENV_BASE_ALIGN: &str = "EPOCH_ARENA_BASE_ALIGN";
/// Environment variable overriding [`ArenaConfig::track_stats`]
pub const ENV_TRACK_STATS: &str = "EPOCH_ARENA_TRACK_STATS";
/// Environment variable overriding [`ArenaConfig::alloc_pattern`]
pub const ENV_ALLOC_PATTERN: &str = "EPOCH_ARENA_ALLOC_PATTERN";
/// Environment variable overriding [`ArenaConfig::reset_pattern`]
pub const ENV_RESET_PATTERN: &str = "EPOCH_ARENA_RESET_PATTERN";

/// Configuration for bump arenas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Alignment of the arena base when the arena owns its memory.
    ///
    /// Requests up to this alignment never pay for padding at offset zero.
    pub base_align: usize,

    /// Fill pattern byte for freshly allocated regions (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for regions released by reset or restore (for debugging)
    pub reset_pattern: Option<u8>,

    /// Enable allocation counters
    pub track_stats: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            base_align: alignment::CACHE_LINE,
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xAA)
            } else {
                None
            },
            reset_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
            track_stats: cfg!(debug_assertions),
        }
    }
}

impl ArenaConfig {
    /// Production configuration - no fill patterns, no counters
    #[must_use]
    pub fn production() -> Self {
        Self {
            base_align: alignment::CACHE_LINE,
            alloc_pattern: None,
            reset_pattern: None,
            track_stats: false,
        }
    }

    /// Debug configuration - poison fills and counters enabled
    #[must_use]
    pub fn debug() -> Self {
        Self {
            base_align: alignment::CACHE_LINE,
            alloc_pattern: Some(0xAA),
            reset_pattern: Some(0xDD),
            track_stats: true,
        }
    }

    /// Sets the base alignment
    pub fn with_base_align(mut self, base_align: usize) -> Self {
        self.base_align = base_align;
        self
    }

    /// Enables or disables allocation counters
    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }

    /// Sets both debug fill patterns
    pub fn with_patterns(mut self, alloc: Option<u8>, reset: Option<u8>) -> Self {
        self.alloc_pattern = alloc;
        self.reset_pattern = reset;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> ArenaResult<()> {
        if !self.base_align.is_power_of_two() {
            return Err(ArenaError::InvalidConfig {
                reason: format!("base_align {} is not a power of two", self.base_align),
            });
        }
        if self.base_align > alignment::PAGE_SIZE {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "base_align {} exceeds the page size {}",
                    self.base_align,
                    alignment::PAGE_SIZE
                ),
            });
        }
        Ok(())
    }

    /// Load configuration from environment variables
    ///
    /// Starts from [`ArenaConfig::default`] and applies any of
    /// `EPOCH_ARENA_BASE_ALIGN`, `EPOCH_ARENA_TRACK_STATS`,
    /// `EPOCH_ARENA_ALLOC_PATTERN` and `EPOCH_ARENA_RESET_PATTERN` that are set.
    pub fn from_env() -> ArenaResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Same rules as [`ArenaConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> ArenaResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BASE_ALIGN) {
            config.base_align = parse_usize(ENV_BASE_ALIGN, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TRACK_STATS) {
            config.track_stats = parse_bool(ENV_TRACK_STATS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ALLOC_PATTERN) {
            config.alloc_pattern = parse_pattern(ENV_ALLOC_PATTERN, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RESET_PATTERN) {
            config.reset_pattern = parse_pattern(ENV_RESET_PATTERN, &raw)?;
        }

        config.validate()?;

        #[cfg(feature = "logging")]
        tracing::debug!(
            base_align = config.base_align,
            track_stats = config.track_stats,
            alloc_pattern = ?config.alloc_pattern,
            reset_pattern = ?config.reset_pattern,
            "arena config loaded"
        );

        Ok(config)
    }
}

fn parse_usize(key: &str, raw: &str) -> ArenaResult<usize> {
    raw.trim()
        .parse()
        .map_err(|_| ArenaError::invalid_config(&format!("{key}: expected an integer, got {raw:?}")))
}

fn parse_bool(key: &str, raw: &str) -> ArenaResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ArenaError::invalid_config(&format!(
            "{key}: expected a boolean, got {raw:?}"
        ))),
    }
}

/// Accepts `off`/`none`, a decimal byte or a `0x`-prefixed hex byte
fn parse_pattern(key: &str, raw: &str) -> ArenaResult<Option<u8>> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map(Some).map_err(|_| {
        ArenaError::invalid_config(&format!("{key}: expected a byte pattern, got {raw:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_presets_validate() {
        assert!(ArenaConfig::default().validate().is_ok());
        assert!(ArenaConfig::production().validate().is_ok());
        assert!(ArenaConfig::debug().validate().is_ok());
        assert_eq!(ArenaConfig::debug().alloc_pattern, Some(0xAA));
        assert!(!ArenaConfig::production().track_stats);
    }

    #[test]
    fn test_invalid_base_align() {
        let err = ArenaConfig::production()
            .with_base_align(48)
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), "ARENA:CONFIG:INVALID");

        let err = ArenaConfig::production()
            .with_base_align(8192)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("page size"));
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = ArenaConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ArenaConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ArenaConfig::from_lookup(lookup_from(&[
            (ENV_BASE_ALIGN, "16"),
            (ENV_TRACK_STATS, "on"),
            (ENV_ALLOC_PATTERN, "0xCC"),
            (ENV_RESET_PATTERN, "off"),
        ]))
        .unwrap();

        assert_eq!(config.base_align, 16);
        assert!(config.track_stats);
        assert_eq!(config.alloc_pattern, Some(0xCC));
        assert_eq!(config.reset_pattern, None);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        assert!(ArenaConfig::from_lookup(lookup_from(&[(ENV_BASE_ALIGN, "lots")])).is_err());
        assert!(ArenaConfig::from_lookup(lookup_from(&[(ENV_BASE_ALIGN, "24")])).is_err());
        assert!(ArenaConfig::from_lookup(lookup_from(&[(ENV_TRACK_STATS, "maybe")])).is_err());
        assert!(ArenaConfig::from_lookup(lookup_from(&[(ENV_ALLOC_PATTERN, "0x1FF")])).is_err());
    }

    #[test]
    fn test_decimal_pattern() {
        let config = ArenaConfig::from_lookup(lookup_from(&[(ENV_ALLOC_PATTERN, "170")])).unwrap();
        assert_eq!(config.alloc_pattern, Some(0xAA));
    }
}
