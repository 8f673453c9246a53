//! Client identity assignment
//!
//! A `mirrorcast_client` cookie holds the caller's [`ClientId`]. Requests
//! without a valid one get a fresh id and the cookie is set on the response.

use crate::types::ClientId;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;

pub const CLIENT_COOKIE: &str = "mirrorcast_client";

/// Middleware inserting the caller's [`ClientId`] as a request extension.
pub async fn assign_identity(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let existing = jar
        .get(CLIENT_COOKIE)
        .and_then(|cookie| ClientId::parse(cookie.value()));

    match existing {
        Some(client) => {
            request.extensions_mut().insert(client);
            next.run(request).await
        }
        None => {
            let client = ClientId::new();
            debug!(client_id = %client, "Assigned client identity");
            request.extensions_mut().insert(client);
            let response = next.run(request).await;
            let cookie = Cookie::build((CLIENT_COOKIE, client.to_string()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            (jar.add(cookie), response).into_response()
        }
    }
}
