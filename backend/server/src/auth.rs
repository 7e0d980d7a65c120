//! # Auth Gate
//!
//! Password login hands back a bearer token; every mutating route resolves
//! that token to an [`Identity`] through the [`CurrentUser`] extractor.
//!
//! The token is the username itself. There is no signature or expiry, so
//! anyone who knows a username can act as that user. Swapping in a signed
//! scheme only touches [`issue_token`] and [`resolve_token`].
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use bank::frames::Credential;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{database::CredentialStore, error::AppError, state::AppState};

pub const TOKEN_TYPE: &str = "bearer";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub disabled: bool,
}

impl From<Credential> for Identity {
    fn from(credential: Credential) -> Self {
        Self {
            username: credential.username,
            disabled: credential.disabled,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
}

pub fn issue_token(credential: &Credential) -> String {
    credential.username.clone()
}

pub async fn login(
    credentials: &dyn CredentialStore,
    form: &LoginForm,
) -> Result<AccessToken, AppError> {
    let credential = credentials
        .credential(&form.username)
        .await?
        .ok_or(AppError::BadCredentials)?;

    let matches: bool = credential
        .password
        .as_bytes()
        .ct_eq(form.password.as_bytes())
        .into();

    if !matches {
        return Err(AppError::BadCredentials);
    }

    Ok(AccessToken {
        access_token: issue_token(&credential),
        token_type: TOKEN_TYPE,
    })
}

pub async fn resolve_token(
    credentials: &dyn CredentialStore,
    token: &str,
) -> Result<Identity, AppError> {
    credentials
        .credential(token)
        .await?
        .map(Identity::from)
        .ok_or(AppError::Unauthorized)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case(TOKEN_TYPE) {
        return None;
    }

    Some(token.trim()).filter(|token| !token.is_empty())
}

/// An authenticated, enabled user.
pub struct CurrentUser(pub Identity);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let identity = resolve_token(state.credentials.as_ref(), token).await?;

        if identity.disabled {
            return Err(AppError::InactiveUser);
        }

        Ok(Self(identity))
    }
}
