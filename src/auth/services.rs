use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{LoginRequest, RegisterRequest},
    password::{hash_password, verify_password, DUMMY_HASH},
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::{error::AppError, state::AppState};

pub const MIN_PASSWORD_LEN: usize = 5;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Validates, hashes off the async workers, and inserts the user.
pub async fn register(state: &AppState, payload: RegisterRequest) -> Result<User, AppError> {
    let email = payload.email.trim().to_lowercase();
    let username = payload.username.trim().to_string();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if !is_valid_username(&username) {
        warn!(username = %username, "invalid username");
        return Err(AppError::Validation(
            "Username must be 3-32 letters, digits, '.', '_' or '-'".into(),
        ));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::Validation("Password too short".into()));
    }

    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let user = state
        .users
        .create(NewUser {
            username,
            email,
            password_hash,
            first_name: non_blank(payload.first_name),
            last_name: non_blank(payload.last_name),
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "create user failed");
            AppError::from(e)
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Unknown login and wrong password are reported the same way.
pub async fn login(state: &AppState, payload: LoginRequest) -> Result<User, AppError> {
    let login = payload.login.trim();
    let found = state
        .users
        .find_by_email_or_username(&login.to_lowercase(), login)
        .await?;

    // unknown logins still pay for a full verify
    let password = payload.password;
    let hash = found
        .as_ref()
        .map_or_else(|| DUMMY_HASH.to_string(), |u| u.password_hash.clone());
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;

    let user = match found {
        Some(u) => u,
        None => {
            warn!(login = %login, "login unknown user");
            return Err(AppError::InvalidCredentials);
        }
    };
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}
