use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Validation failures raised by the order number generator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("identifiant de commande invalide : '{0}' (format attendu ORD-###)")]
    Malformed(String),

    #[error("identifiant de commande déjà utilisé : {0}")]
    AlreadyUsed(String),
}

impl From<SequenceError> for AppError {
    fn from(err: SequenceError) -> Self {
        match err {
            SequenceError::Malformed(_) => AppError::BadRequest(err.to_string()),
            SequenceError::AlreadyUsed(_) => AppError::Conflict(err.to_string()),
        }
    }
}

/// Input rejected by the order desk before anything is written.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderError {
    #[error("commande introuvable : {0}")]
    NotFound(String),

    #[error("{field} invalide : {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("créneau invalide : la fin doit être postérieure au début")]
    InvalidWindow,

    #[error("transition de statut impossible : {from} → {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(_) => AppError::NotFound(err.to_string()),
            OrderError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            OrderError::Sequence(inner) => inner.into(),
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}

/// Business-rule rejection from the assignment service.
///
/// These are ordinary values: the `Display` text is the reason shown to the
/// operator, verbatim.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssignmentError {
    #[error("Commande introuvable : {0}")]
    OrderNotFound(String),

    #[error("Chauffeur introuvable : {0}")]
    DriverNotFound(String),

    #[error("Affectation programmée introuvable : {0}")]
    ScheduledNotFound(String),

    #[error("Commande {order_id} en lecture seule (statut : {status})")]
    ReadOnlyOrder { order_id: String, status: String },

    /// First blocking reason from the compatibility evaluator.
    #[error("{0}")]
    Incompatible(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Une affectation programmée est déjà en attente pour la commande {0}")]
    AlreadyScheduled(String),

    #[error("Commande {order_id} déjà affectée au chauffeur {driver_id}")]
    AlreadyAssigned { order_id: String, driver_id: String },

    #[error("Date d'exécution invalide : {0}")]
    InvalidExecuteAt(String),
}

impl AssignmentError {
    fn status_code(&self) -> StatusCode {
        match self {
            AssignmentError::OrderNotFound(_)
            | AssignmentError::DriverNotFound(_)
            | AssignmentError::ScheduledNotFound(_) => StatusCode::NOT_FOUND,
            AssignmentError::InvalidExecuteAt(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for AssignmentError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.to_string()
        }));

        (self.status_code(), body).into_response()
    }
}
