//! Ambient scheduler configuration. These values never affect which
//! recommendations are produced for a given offer/requirement pair — they
//! describe the running framework (service name, target configuration
//! generation, external executor/master URIs) and exist so orchestrator
//! logs and the pod info it builds can be attributed to a framework
//! instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `serde(with = "humantime_duration")` support for `Duration` fields, so
/// `sleep_duration` can be written as `"5s"`/`"2m"` in a config file rather
/// than a raw nanosecond count, matching the human-readable duration
/// formats the rest of the ecosystem favors.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Flags that would normally be parsed from the command line by the
/// surrounding process. The core never parses `argv` itself — constructing
/// this struct is the caller's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulerFlags {
    pub api_port: u16,
    pub executor_uri: String,
    pub libmesos_uri: String,
    #[serde(with = "humantime_duration")]
    pub sleep_duration: Duration,
    pub framework_name: String,
}

impl Default for SchedulerFlags {
    fn default() -> Self {
        SchedulerFlags {
            api_port: 8080,
            executor_uri: String::new(),
            libmesos_uri: String::new(),
            sleep_duration: Duration::from_secs(5),
            framework_name: "marathon".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfiguration {
    pub service_name: String,
    /// Identifies the current generation of the service's configuration;
    /// bumped by the caller on every config change, consulted nowhere in
    /// this crate's own logic but threaded through for the caller's own
    /// target-configuration bookkeeping.
    pub target_config_id: Uuid,
    pub flags: SchedulerFlags,
}

impl SchedulerConfiguration {
    pub fn new(service_name: impl Into<String>, target_config_id: Uuid) -> Self {
        SchedulerConfiguration {
            service_name: service_name.into(),
            target_config_id,
            flags: SchedulerFlags::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json_with_human_readable_duration() {
        let config = SchedulerConfiguration::new("my-service", Uuid::from_u128(42));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"sleep_duration\":\"5s\""));

        let round_tripped: SchedulerConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped, config);
    }
}
