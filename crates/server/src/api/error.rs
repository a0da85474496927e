//! Mapping of core errors onto HTTP responses.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, warn};

use convertino_core::{InspectError, LedgerError, OrchestratorError, RegistryError};

/// JSON body returned with every error status.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn registry_error(e: RegistryError) -> ApiError {
    let status = match &e {
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::Active(_) => StatusCode::CONFLICT,
        RegistryError::UnsupportedType { .. } | RegistryError::InvalidTarget { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RegistryError::Inspect(InspectError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        RegistryError::Inspect(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    if status.is_server_error() {
        error!("Registry request failed: {}", e);
    } else {
        warn!("Registry request rejected: {}", e);
    }
    api_error(status, e.to_string())
}

pub fn orchestrator_error(e: OrchestratorError) -> ApiError {
    match e {
        OrchestratorError::Registry(e) => registry_error(e),
        OrchestratorError::NotRunning => {
            warn!("Request refused: {}", e);
            api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

pub fn ledger_error(e: LedgerError) -> ApiError {
    error!("Ledger request failed: {}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use convertino_core::FileId;

    #[test]
    fn test_registry_error_statuses() {
        let (status, _) = registry_error(RegistryError::NotFound(FileId::new(1)));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = registry_error(RegistryError::Active(FileId::new(1)));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = registry_error(RegistryError::Inspect(InspectError::NotFound {
            path: "/missing.mov".into(),
        }));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.0.error.contains("/missing.mov"));
    }

    #[test]
    fn test_orchestrator_error_unwraps_registry() {
        let (status, _) = orchestrator_error(OrchestratorError::Registry(
            RegistryError::Active(FileId::new(3)),
        ));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = orchestrator_error(OrchestratorError::NotRunning);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
