//! Shared request authentication.
//!
//! Every RPC handler except `Authorize` calls [`authenticate`] as its first
//! step. This is a plain helper function rather than a `tonic::Interceptor`
//! or `tower::Layer`: those run before the handler is selected and cannot
//! cleanly see which method is being dispatched in order to exempt
//! `Authorize`, so the gate lives in each handler body instead.

use std::sync::Arc;

use tonic::{Request, Status};
use vault_auth::AuthService;

const TOKEN_METADATA_KEY: &str = "token";

/// Extract the bearer token from request metadata, verify it, and return
/// the authenticated username.
///
/// Maps every failure to `Status::unauthenticated` except storage/signing
/// errors internal to the service, which are logged and surfaced as
/// `Status::internal` without detail.
pub fn authenticate<T>(auth: &Arc<AuthService>, req: &Request<T>) -> Result<String, Status> {
    let token = req
        .metadata()
        .get(TOKEN_METADATA_KEY)
        .ok_or_else(|| Status::unauthenticated("missing token"))?
        .to_str()
        .map_err(|_| Status::unauthenticated("token is not valid ascii"))?;

    if token.is_empty() {
        return Err(Status::unauthenticated("missing token"));
    }

    let claims = auth.verify_token(token).map_err(|err| match err {
        vault_auth::AuthError::ExpiredToken => Status::unauthenticated("token expired"),
        vault_auth::AuthError::InvalidToken => Status::unauthenticated("invalid token"),
        other => {
            tracing::error!(error = %other, "token verification failed");
            Status::internal("authentication failed")
        }
    })?;

    Ok(claims.username)
}
