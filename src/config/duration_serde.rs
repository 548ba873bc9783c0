//! `Duration` fields in the TOML config
//!
//! Accepted forms: a humantime string (`"20s"`, `"1m30s"`, `"250ms"`) or a
//! bare integer number of seconds. Values are written back as humantime
//! strings so a generated `config.toml` reads naturally.

/// Use with `#[serde(with = "duration_serde::duration")]`
pub mod duration {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Human(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)
            .map_err(|_| D::Error::custom("expected seconds or a duration such as \"20s\""))?
        {
            Raw::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
            Raw::Human(text) => humantime::parse_duration(&text)
                .map_err(|e| D::Error::custom(format!("invalid duration {text:?}: {e}"))),
        }
    }
}
