use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::courier::Courier;

pub const COURIER_ID_HEADER: &str = "x-courier-id";
pub const COURIER_NAME_HEADER: &str = "x-courier-name";

/// The courier a request is made on behalf of, taken from the identity
/// headers set by the authenticating gateway.
pub struct SignedInCourier(pub Courier);

#[async_trait]
impl<S> FromRequestParts<S> for SignedInCourier
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, COURIER_ID_HEADER)
            .ok_or_else(|| AppError::Authentication(format!("missing {COURIER_ID_HEADER} header")))?;
        let name = header_value(parts, COURIER_NAME_HEADER).unwrap_or_default();

        Ok(SignedInCourier(Courier::new(id, name)))
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
