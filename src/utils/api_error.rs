// HTTP error type returned by every handler.
// Domain errors convert in via From so handlers can use `?`.
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::db::StoreError;
use crate::services::{
    BillingError, EmailError, IdentityError, LinkError, MemberError, PlacesError, QrError,
    SessionError, WebhookError,
};
use crate::utils::stripe_signature::SignatureError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Third-party provider failure; the provider message is passed through
    #[error("{0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("Forbidden".to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "Internal server error".to_string()
            },
            ApiError::Database(detail) => {
                error!("Database error: {}", detail);
                "Database error".to_string()
            },
            ApiError::Upstream(msg) => {
                warn!("Upstream error: {}", msg);
                msg.clone()
            },
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(msg) => ApiError::BadRequest(msg),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(error: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(error.to_string())
    }
}

impl From<BillingError> for ApiError {
    fn from(error: BillingError) -> Self {
        match error {
            BillingError::Api { message, .. } => ApiError::Upstream(message),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<EmailError> for ApiError {
    fn from(error: EmailError) -> Self {
        match error {
            EmailError::InvalidEmail(msg) => ApiError::BadRequest(msg),
            EmailError::TemplateError(msg) => ApiError::Internal(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            },
            _ => "Invalid request body".to_string(),
        };
        ApiError::BadRequest(message)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<PlacesError> for ApiError {
    fn from(error: PlacesError) -> Self {
        ApiError::Upstream(error.to_string())
    }
}

impl From<IdentityError> for ApiError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::InvalidToken(_) | IdentityError::UnknownKey => ApiError::Unauthorized,
            IdentityError::Upstream(msg) => ApiError::Upstream(msg),
            IdentityError::NotConfigured(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::EncodingError(msg) => ApiError::Internal(msg),
            SessionError::Expired | SessionError::Invalid => ApiError::Unauthorized,
        }
    }
}

impl From<QrError> for ApiError {
    fn from(error: QrError) -> Self {
        match error {
            QrError::Encode(msg) => ApiError::BadRequest(msg),
            QrError::Image(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<SignatureError> for ApiError {
    fn from(error: SignatureError) -> Self {
        ApiError::BadRequest(format!("Webhook Error: {}", error))
    }
}

impl From<WebhookError> for ApiError {
    fn from(error: WebhookError) -> Self {
        match error {
            WebhookError::Signature(e) => e.into(),
            WebhookError::Payload(msg) => ApiError::BadRequest(format!("Webhook Error: {}", msg)),
            WebhookError::Store(e) => ApiError::Upstream(e.to_string()),
            WebhookError::Billing(e) => e.into(),
        }
    }
}

impl From<MemberError> for ApiError {
    fn from(error: MemberError) -> Self {
        match error {
            MemberError::Forbidden => ApiError::forbidden(),
            MemberError::ProRequired | MemberError::EmailMismatch => {
                ApiError::Forbidden(error.to_string())
            },
            MemberError::BusinessNotFound => ApiError::NotFound(error.to_string()),
            MemberError::InvalidToken | MemberError::RoleNotInvitable(_) => {
                ApiError::BadRequest(error.to_string())
            },
            MemberError::Store(e) => e.into(),
            MemberError::Email(e) => e.into(),
        }
    }
}

impl From<LinkError> for ApiError {
    fn from(error: LinkError) -> Self {
        match error {
            LinkError::Forbidden => ApiError::forbidden(),
            LinkError::NotFound | LinkError::NoReviewLink => ApiError::NotFound(error.to_string()),
            LinkError::SlugExhausted(_) => ApiError::Internal(error.to_string()),
            LinkError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(MemberError::InvalidToken).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(IdentityError::UnknownKey).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(LinkError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_json_rejection_is_bad_request() {
        use axum::{body::Body, extract::FromRequest, http::Request, Json};

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Payload {
            id: u32,
        }

        let request = Request::builder()
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let rejection = Json::<Payload>::from_request(request, &()).await.unwrap_err();
        let err = ApiError::from(rejection);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("missing field `id`"));
    }

    #[test]
    fn test_signature_errors_are_prefixed() {
        let err = ApiError::from(SignatureError::MissingHeader);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("Webhook Error: "));
    }

    #[test]
    fn test_provider_message_passed_through() {
        let err = ApiError::from(BillingError::Api {
            status: 400,
            message: "No such price: 'price_x'".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "No such price: 'price_x'");
    }
}
