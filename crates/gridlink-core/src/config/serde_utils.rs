//! Serde helpers for configuration types

/// Serialize and deserialize a `Duration` as a plain number of seconds.
///
/// Keeps config files readable: `interval = 30` instead of a nested
/// `{ secs = 30, nanos = 0 }` table.
///
/// # Examples
///
/// ```ignore
/// #[serde(with = "gridlink_core::config::serde_utils::duration_secs")]
/// pub interval: Duration,
/// ```
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
