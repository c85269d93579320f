//! Cookie → session → [`CurrentUser`] middleware.
//!
//! Protected routes see a `CurrentUser` extension or are never reached: a
//! missing, unknown or expired token redirects to `/login` before any
//! handler logic runs.

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use opsdesk_core::CurrentUser;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "opsdesk_session";

/// Pull one cookie's value out of the `Cookie:` header.
fn cookie_value(request: &Request, name: &str) -> Option<String> {
    let header = request.headers().get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match cookie_value(&request, SESSION_COOKIE) {
        Some(token) if !token.is_empty() => token,
        _ => return Redirect::to("/login").into_response(),
    };
    match state.sessions.find(&token).await {
        Ok(Some(session)) => {
            request
                .extensions_mut()
                .insert(CurrentUser::from_session(&session));
            next.run(request).await
        }
        Ok(None) => Redirect::to("/login").into_response(),
        Err(err) => crate::error::AppError(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_cookie(value: &str) -> Request {
        axum::http::Request::builder()
            .header(COOKIE, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn finds_the_session_cookie_among_others() {
        let request = request_with_cookie("theme=dark; opsdesk_session=tok-42; lang=en");
        assert_eq!(
            cookie_value(&request, SESSION_COOKIE),
            Some("tok-42".to_string())
        );
    }

    #[test]
    fn missing_cookie_is_none() {
        let request = request_with_cookie("theme=dark");
        assert_eq!(cookie_value(&request, SESSION_COOKIE), None);
    }

    #[test]
    fn no_cookie_header_is_none() {
        let request = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(cookie_value(&request, SESSION_COOKIE), None);
    }
}
