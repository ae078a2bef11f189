//! A `Json` extractor whose rejection maps onto this crate's error
//! taxonomy instead of axum's own `JsonRejection`, so a malformed or
//! semantically invalid body (an unknown enum variant, a missing field)
//! surfaces through the normal `Error::Validation` → 400 path rather
//! than axum's built-in 422.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header;
use serde::de::DeserializeOwned;

use crate::error::Error;

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Err(Error::UnsupportedMediaType);
        }
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| Error::Validation(format!("invalid request body: {e}")))?;
        serde_json::from_slice(&bytes)
            .map(ValidatedJson)
            .map_err(|e| Error::Validation(format!("invalid request body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Body {
        frequency: Frequency,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Frequency {
        Once,
        Daily,
    }

    fn request(body: &str) -> Request<axum::body::Body> {
        Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_enum_variant_is_a_validation_error_not_a_422() {
        let req = request(r#"{"frequency":"invalid"}"#);
        match ValidatedJson::<Body>::from_request(req, &()).await {
            Err(Error::Validation(_)) => {}
            other => panic!(
                "expected Error::Validation, got a different outcome: {}",
                other.is_ok()
            ),
        }
    }

    #[tokio::test]
    async fn missing_field_is_a_validation_error() {
        let req = request("{}");
        match ValidatedJson::<Body>::from_request(req, &()).await {
            Err(Error::Validation(_)) => {}
            other => panic!(
                "expected Error::Validation, got a different outcome: {}",
                other.is_ok()
            ),
        }
    }

    #[tokio::test]
    async fn non_json_content_type_is_unsupported_media_type() {
        let req = Request::builder()
            .header(header::CONTENT_TYPE, "text/plain")
            .body(axum::body::Body::from(r#"{"frequency":"once"}"#))
            .unwrap();
        match ValidatedJson::<Body>::from_request(req, &()).await {
            Err(Error::UnsupportedMediaType) => {}
            other => panic!(
                "expected Error::UnsupportedMediaType, got a different outcome: {}",
                other.is_ok()
            ),
        }
    }

    #[tokio::test]
    async fn well_formed_body_parses() {
        let req = request(r#"{"frequency":"once"}"#);
        let ValidatedJson(body) = ValidatedJson::<Body>::from_request(req, &()).await.unwrap();
        assert!(matches!(body.frequency, Frequency::Once));
    }
}
