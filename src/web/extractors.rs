//! Caller identity as resolved by the upstream auth proxy.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::PrincipalId;

pub static PRINCIPAL_HEADER: &str = "x-principal-id";

/// The authenticated principal, if the proxy attached one.
///
/// A missing or malformed header yields `Principal(None)`; the permission
/// gate treats that as an anonymous caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal(pub Option<PrincipalId>);

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<PrincipalId>().ok());
        Ok(Principal(id))
    }
}
