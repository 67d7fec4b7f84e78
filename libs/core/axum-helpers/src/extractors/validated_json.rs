//! JSON extractor with automatic validation using the validator crate.

use crate::errors::AppError;
use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON extractor with automatic validation.
///
/// Body parse failures and `Validate` failures both reject with [`AppError`],
/// so every rejection renders as an `ErrorResponse`.
///
/// # Example
/// ```ignore
/// use axum_helpers::extractors::ValidatedJson;
///
/// #[derive(Deserialize, Validate)]
/// struct CompareRequest {
///     template_id: i64,
///     #[validate(length(min = 1))]
///     region: String,
/// }
///
/// async fn compare(ValidatedJson(payload): ValidatedJson<CompareRequest>) -> String {
///     format!("Comparing template {}", payload.template_id)
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state).await?;
        data.validate()?;
        Ok(ValidatedJson(data))
    }
}
