//! Composes a rolling `[start, end]` query-window onto a downlink's URL.

use chrono::{DateTime, Utc};
use url::Url;

use crate::model::TimeFilter;

pub fn apply(url: &Url, filter: &TimeFilter, now: DateTime<Utc>) -> Url {
    let span = filter.interval.to_duration(filter.value);
    let (start, end) = if filter.forecast {
        (now, now + span)
    } else {
        (now - span, now)
    };

    let mut out = url.clone();
    {
        let mut pairs = out.query_pairs_mut();
        pairs.clear();
        for (k, v) in url.query_pairs() {
            if k != filter.start_param && k != filter.end_param {
                pairs.append_pair(&k, &v);
            }
        }
        pairs.append_pair(&filter.start_param, &format_time(start, &filter.format));
        pairs.append_pair(&filter.end_param, &format_time(end, &filter.format));
    }
    out
}

fn format_time(dt: DateTime<Utc>, format: &str) -> String {
    match format {
        "unix" => dt.timestamp().to_string(),
        "unix_ms" => dt.timestamp_millis().to_string(),
        "rfc3339" => dt.to_rfc3339(),
        custom => dt.format(custom).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeInterval;
    use chrono::TimeZone;

    #[test]
    fn appends_window_params() {
        let url = Url::parse("https://example.com/data?existing=1").unwrap();
        let filter = TimeFilter {
            start_param: "from".into(),
            end_param: "to".into(),
            format: "unix".into(),
            forecast: false,
            interval: TimeInterval::Hour,
            value: 2,
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let out = apply(&url, &filter, now);
        let pairs: std::collections::HashMap<_, _> = out.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("existing").unwrap(), "1");
        assert_eq!(
            pairs.get("from").unwrap(),
            &(now - chrono::Duration::hours(2)).timestamp().to_string()
        );
        assert_eq!(pairs.get("to").unwrap(), &now.timestamp().to_string());
    }

    #[test]
    fn forecast_looks_forward() {
        let url = Url::parse("https://example.com/data").unwrap();
        let filter = TimeFilter {
            start_param: "from".into(),
            end_param: "to".into(),
            format: "unix".into(),
            forecast: true,
            interval: TimeInterval::Day,
            value: 1,
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let out = apply(&url, &filter, now);
        let pairs: std::collections::HashMap<_, _> = out.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("from").unwrap(), &now.timestamp().to_string());
        assert_eq!(
            pairs.get("to").unwrap(),
            &(now + chrono::Duration::days(1)).timestamp().to_string()
        );
    }
}
