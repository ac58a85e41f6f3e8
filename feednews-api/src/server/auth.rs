use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use feednews_common::{
    auth::token::TokenCodec,
    model::{Id, user::UserMarker},
};
use std::{convert::Infallible, sync::Arc};
use thiserror::Error;
use tracing::debug;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Not authenticated!")]
pub struct NotAuthenticated;

/// Who is making a request.
///
/// Extracting a viewer never fails. A missing, malformed, forged or expired token all
/// yield [`Viewer::Anonymous`], and operations that need a user reject it themselves.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub enum Viewer {
    #[default]
    Anonymous,
    Authenticated(Id<UserMarker>),
}

impl Viewer {
    /// Reads `Authorization: <scheme> <token>`. The scheme word itself is not checked.
    pub fn from_headers(headers: &HeaderMap, tokens: &TokenCodec) -> Self {
        let Some(token) = bearer_token(headers) else {
            return Self::Anonymous;
        };

        match tokens.verify(token) {
            Ok(claims) => Self::Authenticated(claims.subject),
            Err(err) => {
                debug!(error = %err, "Treating request with invalid token as anonymous");
                Self::Anonymous
            }
        }
    }

    #[must_use]
    pub fn user_id(self) -> Option<Id<UserMarker>> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user_id) => Some(user_id),
        }
    }

    pub fn require(self) -> Result<Id<UserMarker>, NotAuthenticated> {
        self.user_id().ok_or(NotAuthenticated)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (_scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    (!token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for Viewer
where
    Arc<TokenCodec>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenCodec>::from_ref(state);

        Ok(Self::from_headers(&parts.headers, &tokens))
    }
}
