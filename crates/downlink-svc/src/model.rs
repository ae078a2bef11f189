use std::collections::HashMap;

use iot_domain::scheduler_spec::SchedulerSpec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for iot_domain::capability::HttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => iot_domain::capability::HttpMethod::Get,
            HttpMethod::Post => iot_domain::capability::HttpMethod::Post,
            HttpMethod::Put => iot_domain::capability::HttpMethod::Put,
            HttpMethod::Patch => iot_domain::capability::HttpMethod::Patch,
            HttpMethod::Delete => iot_domain::capability::HttpMethod::Delete,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInterval {
    Minute,
    Hour,
    Day,
}

impl TimeInterval {
    pub fn to_duration(self, value: i64) -> chrono::Duration {
        match self {
            TimeInterval::Minute => chrono::Duration::minutes(value),
            TimeInterval::Hour => chrono::Duration::hours(value),
            TimeInterval::Day => chrono::Duration::days(value),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeFilter {
    pub start_param: String,
    pub end_param: String,
    pub format: String,
    #[serde(default)]
    pub forecast: bool,
    pub interval: TimeInterval,
    pub value: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Downlink {
    pub id: Uuid,
    pub group_id: Uuid,
    pub thing_id: Uuid,
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub scheduler: SchedulerSpec,
    #[serde(default)]
    pub time_filter: Option<TimeFilter>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        // Lenient: a payload that isn't valid base64 is kept as the literal
        // bytes of the string (legacy backups may contain raw payloads).
        Ok(STANDARD.decode(&s).unwrap_or_else(|_| s.into_bytes()))
    }
}
