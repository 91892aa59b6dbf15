use axum::response::{IntoResponse, Response};
use axum::{Json, http::StatusCode};
use hub_core::AdapterError;
use hub_ledger::LedgerError;
use hub_runner::EngineError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("verification failed")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("ledger error")]
    Ledger(#[from] LedgerError),
    #[error("bot engine error")]
    Engine(#[from] EngineError),
    #[error("platform delivery failed")]
    Adapter(#[from] AdapterError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Ledger(LedgerError::CardNotFound(_))
            | GatewayError::Ledger(LedgerError::BotNotFound(_)) => StatusCode::NOT_FOUND,
            GatewayError::Ledger(_) | GatewayError::Engine(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::Adapter(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn message(&self) -> String {
        match self {
            GatewayError::Ledger(err @ LedgerError::CardNotFound(_))
            | GatewayError::Ledger(err @ LedgerError::BotNotFound(_)) => err.to_string(),
            GatewayError::Ledger(_) | GatewayError::Engine(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_lookups_map_to_not_found() {
        let err = GatewayError::from(LedgerError::CardNotFound("c1".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "card c1 not found");

        let err = GatewayError::from(LedgerError::Store("disk".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "internal server error");
    }

    #[test]
    fn adapter_failures_are_bad_gateway() {
        let err = GatewayError::from(AdapterError::Transport("reset".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
