use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use crate::errors::AppError;

/// JSON body extractor that treats a missing body like `{}`.
///
/// Requests without a JSON content type or with an empty body yield
/// `T::default()`, so handlers report the missing fields themselves instead
/// of axum answering 415/422. A JSON array or scalar is treated the same way.
/// Malformed JSON is a 400.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.to_ascii_lowercase().contains("json"));

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        if !is_json || bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        let malformed = |e: serde_json::Error| {
            tracing::debug!("Rejected request body: {}", e);
            AppError::Validation("Malformed JSON body.".into()).into_response()
        };

        // Arrays and scalars carry no named fields
        let value: Value = serde_json::from_slice(&bytes).map_err(malformed)?;
        if !value.is_object() {
            return Ok(Self(T::default()));
        }
        serde_json::from_value(value).map(Self).map_err(malformed)
    }
}
