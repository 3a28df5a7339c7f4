use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
    http::StatusCode,
};
use serde_json::json;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::handlers::JsonBody;
use crate::models::{CredentialsForm, User};
use crate::services::{password::{self, Verification}, UserStore};

const MISSING_CREDENTIALS: &str = "Username and password are required.";
const USERNAME_TAKEN: &str = "Username already exists.";
// Same message for unknown users and wrong passwords.
const INVALID_CREDENTIALS: &str = "Invalid username or password.";

#[axum::debug_handler]
pub async fn handle_register(
    State((store, config)): State<(UserStore, Config)>,
    JsonBody(form): JsonBody<CredentialsForm>,
) -> AppResult<Response> {
    let (username, password) = form
        .credentials()
        .ok_or_else(|| AppError::Validation(MISSING_CREDENTIALS.into()))?;

    // Check first so duplicates are turned away before paying for a hash
    if store.read(|users| users.contains_key(username)).await? {
        tracing::info!("Registration rejected, username taken: {}", username);
        return Err(AppError::Conflict(USERNAME_TAKEN.into()));
    }

    let password_hash = password::hash(password, config.auth.bcrypt_cost).await?;

    // Re-checked under the write lock in case of a concurrent registration
    store
        .update(|users| {
            if users.contains_key(username) {
                return Err(AppError::Conflict(USERNAME_TAKEN.into()));
            }
            users.insert(username.to_owned(), User::new(password_hash));
            Ok(())
        })
        .await?;

    tracing::info!("Registered user: {}", username);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "User registered successfully." })),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn handle_login(
    State((store, config)): State<(UserStore, Config)>,
    JsonBody(form): JsonBody<CredentialsForm>,
) -> AppResult<Response> {
    let (username, password) = form
        .credentials()
        .ok_or_else(|| AppError::Validation(MISSING_CREDENTIALS.into()))?;

    tracing::debug!("Login attempt for user: {}", username);

    let stored = store
        .read(|users| users.get(username).map(|user| user.password.clone()))
        .await?;

    // Unknown users and password-less records still pay for a bcrypt check
    let verification = match stored.as_deref() {
        Some(stored) if !stored.is_empty() => password::verify(password, stored).await?,
        _ => password::verify_dummy(password, config.auth.bcrypt_cost).await?,
    };

    match verification {
        Verification::Invalid => {
            tracing::warn!("Failed login for user: {}", username);
            return Err(AppError::Auth(INVALID_CREDENTIALS.into()));
        }
        Verification::ValidLegacy => {
            // The login stands even if the upgrade cannot be persisted
            if let Err(e) = upgrade_legacy_password(&store, &config, username, password).await {
                tracing::warn!("Could not rehash legacy password for {}: {}", username, e);
            }
        }
        Verification::Valid => {}
    }

    tracing::info!("User logged in: {}", username);
    Ok(Json(json!({
        "success": true,
        "message": "Login successful.",
        "username": username,
    }))
    .into_response())
}

// Replaces a plaintext password with its hash, unless it changed meanwhile.
async fn upgrade_legacy_password(
    store: &UserStore,
    config: &Config,
    username: &str,
    plaintext: &str,
) -> AppResult<()> {
    let password_hash = password::hash(plaintext, config.auth.bcrypt_cost).await?;
    store
        .update(|users| {
            if let Some(user) = users.get_mut(username) {
                if user.password == plaintext {
                    user.password = password_hash;
                    tracing::info!("Rehashed legacy password for user: {}", username);
                }
            }
            Ok::<_, AppError>(())
        })
        .await
}
