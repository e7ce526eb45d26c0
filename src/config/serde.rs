use std::time::Duration;

use humantime::parse_duration;
use serde::Deserialize;
use serde_with::DeserializeAs;

/// `serde_with` adapter reading durations such as `"250ms"` or `"1m 30s"`.
pub(crate) struct HumantimeDuration;

impl<'de> DeserializeAs<'de, Duration> for HumantimeDuration {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(raw.trim())
            .map_err(|err| serde::de::Error::custom(format!("invalid duration {raw:?}: {err}")))
    }
}
