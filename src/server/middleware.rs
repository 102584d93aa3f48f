// Identity extraction
//
// The upstream identity layer authenticates the caller and forwards who they
// are in headers. Requests without an id and alias never reach a handler.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use super::handlers::AppError;
use crate::identity::{Role, StudentIdentity};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ALIAS_HEADER: &str = "x-user-alias";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const GUARDIAN_EMAIL_HEADER: &str = "x-guardian-email";
pub const RESPONDER_EMAIL_HEADER: &str = "x-responder-email";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Build an identity from forwarded headers
pub fn identity_from_headers(headers: &HeaderMap) -> Option<StudentIdentity> {
    let id = header(headers, USER_ID_HEADER)?;
    let alias = header(headers, USER_ALIAS_HEADER)?;

    // Unknown roles get the least privilege
    let role = header(headers, USER_ROLE_HEADER)
        .and_then(|raw| raw.parse::<Role>().ok())
        .unwrap_or(Role::Student);

    let mut identity = StudentIdentity::student(id, alias).with_role(role);
    if let Some(name) = header(headers, USER_NAME_HEADER) {
        identity = identity.with_display_name(name);
    }
    if let Some(email) = header(headers, GUARDIAN_EMAIL_HEADER) {
        identity = identity.with_guardian_email(email);
    }
    if let Some(email) = header(headers, RESPONDER_EMAIL_HEADER) {
        identity = identity.with_responder_email(email);
    }
    Some(identity)
}

/// Attach the caller's identity to the request, or reject with 401
pub async fn identity_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = identity_from_headers(request.headers()).ok_or_else(|| {
        AppError::new(
            StatusCode::UNAUTHORIZED,
            anyhow::anyhow!("Caller identity is required"),
        )
    })?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Counselor/admin-only endpoints
pub fn require_responder(identity: &StudentIdentity) -> Result<(), AppError> {
    if identity.role.is_responder() {
        Ok(())
    } else {
        Err(AppError::new(
            StatusCode::FORBIDDEN,
            anyhow::anyhow!("Responder role required"),
        ))
    }
}
