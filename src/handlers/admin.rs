//! Admin sign-in and password reset.
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use crate::auth::{describe_token, token_from_login_response};
use crate::error::ClientError;
use crate::http::ApiClient;
use crate::models::{LoginRequest, ResetPasswordRequest};

/// Signs in and hands back the bearer token. The token is only printed; exporting it as
/// `SUPPORT_API_TOKEN` is up to the caller.
///
/// # API
/// - **POST `/admin/verify`** with `{ email, password }`. The token comes back at the top level or under `data`.
pub async fn handle_login(email: &str, password: &str, client: &ApiClient) -> Result<Value, ClientError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ClientError::Validation("Email and password are required".to_string()));
    }

    let body = LoginRequest { email: email.to_string(), password: password.to_string() };
    let response = client.post_json_raw("/admin/verify", &body).await?;

    let token = token_from_login_response(&response).ok_or_else(|| ClientError::Api {
        status: 401,
        message: response
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or("Login failed")
            .to_string(),
    })?;

    info!(email, "signed in");
    Ok(json!({
        "token": token,
        "claims": describe_token(&token, Utc::now()),
    }))
}

/// Sets a new password using the token from the reset email.
///
/// # API
/// - **POST `/admin/reset-password`** with `{ email, token, password }`.
pub async fn handle_reset_password(
    email: &str,
    token: &str,
    password: &str,
    confirm: &str,
    client: &ApiClient,
) -> Result<Value, ClientError> {
    if email.trim().is_empty() || password.is_empty() || confirm.is_empty() {
        return Err(ClientError::Validation("All fields are required".to_string()));
    }
    if password != confirm {
        return Err(ClientError::Validation("Passwords do not match".to_string()));
    }
    if token.trim().is_empty() {
        return Err(ClientError::Validation(
            "Invalid or missing reset token. Request a new reset link.".to_string(),
        ));
    }

    let body = ResetPasswordRequest {
        email: email.trim().to_string(),
        token: token.trim().to_string(),
        password: password.to_string(),
    };
    let envelope = client
        .post_json::<Value, _>("/admin/reset-password", &body)
        .await?
        .ensure_success()?;

    info!(email = %body.email, "password reset");
    Ok(json!({ "email": body.email, "message": envelope.message }))
}
