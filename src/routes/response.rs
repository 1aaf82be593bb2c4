use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;

/// Success envelope: `{"status":"success"}` with optional `data`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

pub type ApiResponse<T> = crate::error::Result<Json<Envelope<T>>>;

pub fn success() -> Json<Envelope<()>> {
    Json(Envelope {
        status: "success",
        data: None,
    })
}

pub fn success_with<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        data: Some(data),
    })
}

/// JSON request body whose rejections render as error envelopes
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(JsonRejection::MissingJsonContentType(_)) => Err(AppError::invalid(
                "header 'Content-Type' must be 'application/json'",
            )),
            Err(rejection) => {
                tracing::warn!("Rejected request body: {}", rejection.body_text());
                Err(AppError::invalid("invalid json format for request body"))
            }
        }
    }
}
