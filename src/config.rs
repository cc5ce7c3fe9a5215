use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Scoring rules applied when a round closes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRules {
    pub step_size: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub initial_score: f64,
}

impl Default for ScoreRules {
    fn default() -> Self {
        Self {
            step_size: 5.0,
            lower_bound: 0.0,
            upper_bound: 100.0,
            initial_score: 75.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_file: PathBuf,
    pub in_memory: bool,
    pub round_duration: Duration,
    pub rules: ScoreRules,
    pub vote_log_capacity: usize,
    pub recent_votes: usize,
    pub recent_history: usize,
    pub autosave_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data/productivity-data.json"),
            in_memory: false,
            round_duration: Duration::from_secs(60),
            rules: ScoreRules::default(),
            vote_log_capacity: 50,
            recent_votes: 10,
            recent_history: 60,
            autosave_interval: Duration::from_secs(30),
            tick_interval: Duration::from_millis(1000),
        }
    }
}

impl Config {
    /// Reads the `PULSE_*` environment variables. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let data_file = lookup("PULSE_DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_file);

        let rules = ScoreRules {
            step_size: parse_or(&lookup, "PULSE_STEP_SIZE", defaults.rules.step_size)?,
            lower_bound: parse_or(&lookup, "PULSE_LOWER_BOUND", defaults.rules.lower_bound)?,
            upper_bound: parse_or(&lookup, "PULSE_UPPER_BOUND", defaults.rules.upper_bound)?,
            initial_score: parse_or(&lookup, "PULSE_INITIAL_SCORE", defaults.rules.initial_score)?,
        };

        // A negative or non-finite step would invert or poison every close
        if !rules.step_size.is_finite() || rules.step_size < 0.0 {
            return Err(ConfigError::Invalid {
                key: "PULSE_STEP_SIZE".to_string(),
                value: rules.step_size.to_string(),
            });
        }

        let bounds_ok = rules.lower_bound < rules.upper_bound
            && (rules.lower_bound..=rules.upper_bound).contains(&rules.initial_score);
        if !bounds_ok {
            return Err(ConfigError::Bounds {
                lower: rules.lower_bound,
                upper: rules.upper_bound,
                initial: rules.initial_score,
            });
        }

        let round_seconds: u64 = parse_or(&lookup, "PULSE_ROUND_SECONDS", defaults.round_duration.as_secs())?;
        if round_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "PULSE_ROUND_SECONDS".to_string(),
                value: "0".to_string(),
            });
        }
        let autosave_seconds: u64 = parse_or(&lookup, "PULSE_AUTOSAVE_SECONDS", defaults.autosave_interval.as_secs())?;
        let tick_millis: u64 = parse_or(&lookup, "PULSE_TICK_MILLIS", defaults.tick_interval.as_millis() as u64)?;

        Ok(Self {
            data_file,
            in_memory: parse_or(&lookup, "PULSE_IN_MEMORY", defaults.in_memory)?,
            round_duration: Duration::from_secs(round_seconds),
            rules,
            vote_log_capacity: parse_or(&lookup, "PULSE_VOTE_LOG_CAPACITY", defaults.vote_log_capacity)?.max(1),
            recent_votes: parse_or(&lookup, "PULSE_RECENT_VOTES", defaults.recent_votes)?,
            recent_history: parse_or(&lookup, "PULSE_RECENT_HISTORY", defaults.recent_history)?,
            // tokio intervals panic on a zero period
            autosave_interval: Duration::from_secs(autosave_seconds.max(1)),
            tick_interval: Duration::from_millis(tick_millis.max(10)),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.rules.initial_score, 75.0);
        assert_eq!(config.round_duration, Duration::from_secs(60));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PULSE_LOWER_BOUND", "-20"),
            ("PULSE_STEP_SIZE", "2.5"),
            ("PULSE_ROUND_SECONDS", "30"),
            ("PULSE_DATA_FILE", "/tmp/pulse.json"),
            ("PULSE_IN_MEMORY", "true"),
        ]))
        .unwrap();
        assert_eq!(config.rules.lower_bound, -20.0);
        assert_eq!(config.rules.step_size, 2.5);
        assert_eq!(config.round_duration, Duration::from_secs(30));
        assert_eq!(config.data_file, PathBuf::from("/tmp/pulse.json"));
        assert!(config.in_memory);
    }

    #[test]
    fn rejects_garbage_numbers() {
        let err = Config::from_lookup(lookup_from(&[("PULSE_STEP_SIZE", "lots")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PULSE_STEP_SIZE".to_string(),
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = Config::from_lookup(lookup_from(&[("PULSE_LOWER_BOUND", "100")])).unwrap_err();
        assert!(matches!(err, ConfigError::Bounds { .. }));

        let err = Config::from_lookup(lookup_from(&[("PULSE_INITIAL_SCORE", "150")])).unwrap_err();
        assert!(matches!(err, ConfigError::Bounds { .. }));
    }

    #[test]
    fn rejects_negative_or_nan_step() {
        for raw in ["-1", "NaN", "inf"] {
            let err = Config::from_lookup(lookup_from(&[("PULSE_STEP_SIZE", raw)])).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { key, .. } if key == "PULSE_STEP_SIZE"),
                "{raw} was accepted"
            );
        }
        let config = Config::from_lookup(lookup_from(&[("PULSE_STEP_SIZE", "0")])).unwrap();
        assert_eq!(config.rules.step_size, 0.0);
    }

    #[test]
    fn rejects_zero_length_rounds() {
        assert!(Config::from_lookup(lookup_from(&[("PULSE_ROUND_SECONDS", "0")])).is_err());
    }
}
