//! The downlink task closure: compose URL, fetch, decode, publish.

use std::sync::Arc;
use std::time::Duration;

use iot_domain::capability::{HttpFetcher, Publisher, ThingConfig};
use iot_scheduler::{task_fn, TaskFn};

use crate::model::Downlink;
use crate::{payload, time_window};

const FIRE_DEADLINE: Duration = Duration::from_secs(15);

pub fn build(
    downlink: Downlink,
    config: ThingConfig,
    fetcher: Arc<dyn HttpFetcher>,
    publisher: Arc<dyn Publisher>,
) -> TaskFn {
    task_fn(move || {
        let downlink = downlink.clone();
        let config = config.clone();
        let fetcher = fetcher.clone();
        let publisher = publisher.clone();
        async move {
            if let Err(e) = fire(&downlink, &config, fetcher.as_ref(), publisher.as_ref()).await {
                tracing::warn!(downlink_id = %downlink.id, error = %e, "downlink fire failed");
            }
        }
    })
}

async fn fire(
    downlink: &Downlink,
    config: &ThingConfig,
    fetcher: &dyn HttpFetcher,
    publisher: &dyn Publisher,
) -> iot_domain::error::Result<()> {
    let mut url = url::Url::parse(&downlink.url)
        .map_err(|e| iot_domain::error::Error::Validation(format!("invalid url: {e}")))?;
    if let Some(filter) = &downlink.time_filter {
        url = time_window::apply(&url, filter, chrono::Utc::now());
    }

    let mut headers = downlink.headers.clone();
    for (k, v) in &config.extra_headers {
        headers.entry(k.clone()).or_insert_with(|| v.clone());
    }

    let resp = fetcher
        .fetch(
            downlink.method.into(),
            url.as_str(),
            &headers,
            &downlink.payload,
            FIRE_DEADLINE,
        )
        .await?;

    let normalized = payload::decode(downlink.method.into_http_str(), url.as_str(), &resp);

    let prefix = config.publish_prefix.as_deref().unwrap_or("downlinks");
    let subject = format!("{prefix}.{}.{}", downlink.thing_id, downlink.id);
    publisher.publish(&subject, normalized).await?;
    Ok(())
}

impl crate::model::HttpMethod {
    fn into_http_str(self) -> &'static str {
        iot_domain::capability::HttpMethod::from(self).as_str()
    }
}
