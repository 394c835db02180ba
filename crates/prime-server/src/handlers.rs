//! HTTP Handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use prime_core::notify::{FollowerEmail, MailReceipt, OutgoingEmail, ReceiptEmail, WelcomeEmail};
use prime_core::{CoreError, DownloadLink, ModelId, UserId};
use prime_payments::{CheckoutRequest, PaymentError, SIGNATURE_HEADER};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
    pub payments_configured: bool,
    pub webhook_configured: bool,
    pub email_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    pub files: Vec<DownloadLink>,
}

/// Email endpoint answer: provider receipt, or `{skipped: true}`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EmailResponse {
    Sent(MailReceipt),
    Skipped { skipped: bool },
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.backend,
        payments_configured: state.checkout.is_some(),
        webhook_configured: state.webhook.is_some(),
        email_configured: state.mailer.is_some(),
    })
}

/// Create a hosted checkout session for the cart
pub async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let checkout = state.checkout.as_ref().ok_or_else(|| {
        tracing::error!("Checkout requested but payments are not configured");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Payments not configured",
            "PAYMENTS_DISABLED",
        )
    })?;

    let Json(payload) = payload.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, e.body_text(), "INVALID_CART")
    })?;

    let session = checkout.initiate(&payload).await.map_err(|e| match e {
        e if e.is_client_error() => api_error(StatusCode::BAD_REQUEST, e.to_string(), "INVALID_CART"),
        PaymentError::Provider(message) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, message, "CHECKOUT_ERROR")
        }
        e => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), "CHECKOUT_ERROR"),
    })?;

    Ok(Json(CheckoutResponse { url: session.url }))
}

/// Payment provider webhook
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, ApiError> {
    let webhook = state.webhook.as_ref().ok_or_else(|| {
        tracing::error!("Webhook received but required secrets are missing");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server misconfigured",
            "WEBHOOK_DISABLED",
        )
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "Webhook Error: Missing signature",
                "MISSING_SIGNATURE",
            )
        })?;

    let event = webhook
        .verifier
        .construct_event(&body, signature)
        .map_err(|e| {
            tracing::warn!(error = %e, "Webhook rejected");
            api_error(StatusCode::BAD_REQUEST, format!("Webhook Error: {e}"), "INVALID_WEBHOOK")
        })?;

    let outcome = webhook.reconciler.handle(event).await;
    tracing::debug!(?outcome, "Webhook reconciled");

    Ok(Json(WebhookAck { received: true }))
}

/// Signed download links for a model the caller is entitled to
pub async fn download_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DownloadResponse>, ApiError> {
    let caller = caller(&state, &headers).await;
    let model_id = ModelId::from_string(model_id);

    let files = state
        .entitlements
        .download_links(&model_id, caller.as_ref())
        .await
        .map_err(|e| match e {
            CoreError::ModelNotFound(_) => {
                api_error(StatusCode::NOT_FOUND, e.user_message(), "MODEL_NOT_FOUND")
            }
            CoreError::AccessDenied(_) => {
                api_error(StatusCode::FORBIDDEN, e.user_message(), "ACCESS_DENIED")
            }
            e => {
                tracing::error!(model_id = %model_id, error = %e, "Download failed");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "INTERNAL_ERROR")
            }
        })?;

    Ok(Json(DownloadResponse {
        success: true,
        files,
    }))
}

/// Purchase receipt email
pub async fn send_receipt_email(
    State(state): State<AppState>,
    payload: Result<Json<ReceiptEmail>, JsonRejection>,
) -> Result<Json<EmailResponse>, ApiError> {
    let Some(mailer) = state.mailer.as_ref() else {
        tracing::warn!("Email not configured, skipping receipt email");
        return Ok(skipped());
    };

    let Json(email) = payload.map_err(|_| missing_fields())?;
    if email.to.is_empty() {
        return Err(missing_fields());
    }

    deliver(mailer.as_ref(), &email.render()).await
}

/// Welcome email after signup
pub async fn send_welcome_email(
    State(state): State<AppState>,
    payload: Result<Json<WelcomeEmail>, JsonRejection>,
) -> Result<Json<EmailResponse>, ApiError> {
    let Some(mailer) = state.mailer.as_ref() else {
        tracing::warn!("Email not configured, skipping welcome email");
        return Ok(skipped());
    };

    let email = match payload {
        Ok(Json(email)) if !email.to.is_empty() => email,
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Email address is required",
                "MISSING_FIELDS",
            ))
        }
    };

    deliver(mailer.as_ref(), &email.render()).await
}

/// Tell a creator about a new follower
pub async fn send_follower_email(
    State(state): State<AppState>,
    payload: Result<Json<FollowerEmail>, JsonRejection>,
) -> Result<Json<EmailResponse>, ApiError> {
    let Some(mailer) = state.mailer.as_ref() else {
        tracing::warn!("Email not configured, skipping follower email");
        return Ok(skipped());
    };

    let Json(email) = payload.map_err(|_| missing_fields())?;
    if email.creator_id.is_empty() || email.creator_name.is_empty() {
        return Err(missing_fields());
    }

    let creator = UserId::from_string(email.creator_id.as_str());
    let to = match state.store.user_email(&creator).await {
        Ok(Some(to)) => to,
        Ok(None) => return Err(creator_not_found()),
        Err(e) => {
            tracing::error!(creator_id = %creator, error = %e, "Could not fetch creator email");
            return Err(creator_not_found());
        }
    };

    deliver(mailer.as_ref(), &email.render(&to)).await
}

// ============================================================================
// Helpers
// ============================================================================

/// Session token from `Authorization: Bearer` or the session cookie
fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Resolve the caller; lookup failures count as unauthenticated
async fn caller(state: &AppState, headers: &HeaderMap) -> Option<UserId> {
    let token = session_token(headers, &state.session_cookie)?;
    match state.sessions.resolve(token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Session lookup failed, treating caller as anonymous");
            None
        }
    }
}

async fn deliver(
    mailer: &dyn prime_core::Mailer,
    email: &OutgoingEmail,
) -> Result<Json<EmailResponse>, ApiError> {
    mailer
        .send(email)
        .await
        .map(|receipt| Json(EmailResponse::Sent(receipt)))
        .map_err(|e| {
            tracing::error!(subject = %email.subject, error = %e, "Email delivery failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), "EMAIL_ERROR")
        })
}

const fn skipped() -> Json<EmailResponse> {
    Json(EmailResponse::Skipped { skipped: true })
}

fn missing_fields() -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "Missing required variables", "MISSING_FIELDS")
}

fn creator_not_found() -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "Creator not found or email missing",
        "CREATOR_NOT_FOUND",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok_1"));
        headers.insert(header::COOKIE, HeaderValue::from_static("sb-access-token=tok_2"));
        assert_eq!(session_token(&headers, "sb-access-token"), Some("tok_1"));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sb-access-token=tok_2; other=x"),
        );
        assert_eq!(session_token(&headers, "sb-access-token"), Some("tok_2"));
        assert_eq!(session_token(&headers, "missing"), None);
        assert_eq!(session_token(&HeaderMap::new(), "sb-access-token"), None);
    }
}
