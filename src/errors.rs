use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// The closed set of error kinds propagated as `code` in the response envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    DataNotReady { message: String, hint: Option<String> },

    #[error("all providers failed: {0}")]
    ProviderUnavailable(String),

    #[error("{0}")]
    RiskCheckFail(String),

    #[error("live trading is not available: {0}")]
    LiveNotAvailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn data_not_ready(msg: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::DataNotReady {
            message: msg.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DataNotReady { .. } => "DATA_NOT_READY",
            AppError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            AppError::RiskCheckFail(_) => "RISK_CHECK_FAIL",
            AppError::LiveNotAvailable(_) => "LIVE_NOT_AVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DataNotReady { .. } => StatusCode::CONFLICT,
            AppError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::RiskCheckFail(_) => StatusCode::CONFLICT,
            AppError::LiveNotAvailable(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::DataNotReady { hint, .. } => {
                hint.as_ref().map(|h| serde_json::json!({ "hint": h }))
            }
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "store error");
        AppError::Internal("store operation failed".to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "unexpected error");
        AppError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    details: Option<Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    ok: bool,
    error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let details = self.details();
        let message = self.to_string();
        let body = ErrorEnvelope {
            ok: false,
            error: ErrorBody {
                code,
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = AppError::validation("qty must be positive");
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn data_not_ready_carries_hint() {
        let err = AppError::data_not_ready("no bars", "ingest_bars_daily");
        assert_eq!(err.code(), "DATA_NOT_READY");
        let details = err.details().expect("hint present");
        assert_eq!(details["hint"], "ingest_bars_daily");
    }

    #[test]
    fn risk_check_fail_maps_to_409() {
        let err = AppError::RiskCheckFail("riskcheck is FAIL".to_string());
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
