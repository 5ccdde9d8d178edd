use axum::{
    Router,
    body::Body,
    extract::Request,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{error::AppError, state::SharedState};

pub mod docs;
pub mod health;
pub mod player;
pub mod session;
pub mod sse;

/// Header carrying the identity of the calling user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user issuing a host request, taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Uuid);

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(session::router())
        .merge(player::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// Reject requests without a valid caller id and expose it to handlers as [`Caller`].
async fn require_caller(mut req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("missing `{USER_ID_HEADER}` header")))?;

    let caller = Uuid::parse_str(provided.trim()).map_err(|_| {
        AppError::Unauthorized(format!("`{USER_ID_HEADER}` is not a valid user id"))
    })?;

    req.extensions_mut().insert(Caller(caller));
    Ok(next.run(req).await)
}
