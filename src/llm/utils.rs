use crate::llm::ApiError;
use anyhow::Result;
use reqwest::{Response, StatusCode};

/// Pass successful responses through, turn anything else into an `ApiError`
pub async fn check_response_error(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let response_text = response
        .text()
        .await
        .map_err(|e| ApiError::NetworkError(e.to_string()))?;

    Err(error_for_status(status, error_message(&response_text)).into())
}

pub fn error_for_status(status: StatusCode, message: String) -> ApiError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimit(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Authentication(message),
        StatusCode::BAD_REQUEST => ApiError::InvalidRequest(message),
        status if status.is_server_error() => ApiError::ServiceError(message),
        _ => ApiError::Unknown(format!("Status {status}: {message}")),
    }
}

/// Error code reported inside a JSON payload rather than by the HTTP status
pub fn error_for_code(code: Option<i32>, message: String) -> ApiError {
    match code
        .and_then(|c| u16::try_from(c).ok())
        .and_then(|c| StatusCode::from_u16(c).ok())
    {
        Some(status) => error_for_status(status, message),
        None => ApiError::Unknown(message),
    }
}

/// Google APIs wrap errors as `{"error": {"message": ...}}`; fall back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
