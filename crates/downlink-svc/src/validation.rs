use iot_domain::error::{Error, Result};

use crate::model::{Downlink, TimeFilter};

const MAX_NAME_LEN: usize = 254;
const MAX_PARAM_LEN: usize = 64;

/// Reject URLs that target loopback/link-local/private networks. This
/// mirrors the SSRF guard the rest of this codebase applies to any
/// user-supplied outbound URL.
pub fn validate_url(raw: &str) -> Result<url::Url> {
    let parsed =
        url::Url::parse(raw).map_err(|e| Error::Validation(format!("invalid url: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::Validation("url must be http(s)".into()));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Validation("url must have a host".into()))?;
    if host == "localhost" {
        return Err(Error::Validation("url must not target localhost".into()));
    }
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        if is_blocked_ip(&ip) {
            return Err(Error::Validation("url targets a disallowed network".into()));
        }
    }
    Ok(parsed)
}

fn is_blocked_ip(ip: &std::net::IpAddr) -> bool {
    match ip {
        std::net::IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        std::net::IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

fn validate_time_filter(tf: &TimeFilter) -> Result<()> {
    if tf.start_param.is_empty() || tf.start_param.len() > MAX_PARAM_LEN {
        return Err(Error::Validation("invalid start_param".into()));
    }
    if tf.end_param.is_empty() || tf.end_param.len() > MAX_PARAM_LEN {
        return Err(Error::Validation("invalid end_param".into()));
    }
    if tf.format.is_empty() {
        return Err(Error::Validation("time_filter.format is required".into()));
    }
    if tf.value <= 0 {
        return Err(Error::Validation(
            "time_filter.value must be positive".into(),
        ));
    }
    Ok(())
}

pub fn validate_downlink(d: &Downlink, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
    if d.name.is_empty() || d.name.len() > MAX_NAME_LEN {
        return Err(Error::Validation("invalid name length".into()));
    }
    validate_url(&d.url)?;
    if let Some(tf) = &d.time_filter {
        validate_time_filter(tf)?;
    }
    d.scheduler.validate(now)?;
    Ok(())
}
