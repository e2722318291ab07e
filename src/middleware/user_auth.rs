use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};

/// The authenticated caller, inserted into request extensions by [`require_user`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Require a valid `Authorization: Bearer <session token>` naming an existing user.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .sessions
        .verify(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    {
        let conn = state.db.get().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        queries::get_user_by_id(&conn, &user_id)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;
    }

    request.extensions_mut().insert(AuthUser { user_id });

    Ok(next.run(request).await)
}
