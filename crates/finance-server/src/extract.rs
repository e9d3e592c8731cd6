//! Validated JSON bodies

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Field-level checks serde cannot express
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// `Json<T>` that answers 400 on a bad body or a failed [`Validate`]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;

        value.validate().map_err(ApiError::InvalidRequest)?;
        Ok(Self(value))
    }
}

/// Reject missing or blank strings
pub fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("`{field}` must not be empty"));
    }
    Ok(())
}
