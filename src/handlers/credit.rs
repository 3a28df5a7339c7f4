use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::handlers::JsonBody;
use crate::models::{AddCreditForm, Credit};
use crate::services::{password, UserStore};

const USER_NOT_FOUND: &str = "User not found.";

pub async fn add_credit(
    State((store, config)): State<(UserStore, Config)>,
    JsonBody(form): JsonBody<AddCreditForm>,
) -> AppResult<Response> {
    // The key is checked before anything else in the body is looked at
    let authorized = form.admin_key().map_or(false, |key| {
        password::constant_time_eq(key.as_bytes(), config.admin.key.as_bytes())
    });
    if !authorized {
        tracing::warn!("Rejected add-credit request with invalid admin key");
        return Err(AppError::Forbidden("Unauthorized: Invalid admin key".into()));
    }

    let amount = form
        .amount
        .as_ref()
        .and_then(Credit::from_value)
        .filter(Credit::is_positive);
    let (Some(username), Some(amount)) = (form.username(), amount) else {
        return Err(AppError::Validation(
            "Invalid input: username and positive amount are required.".into(),
        ));
    };

    let new_balance = store
        .update(|users| {
            let user = users
                .get_mut(username)
                .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;
            user.credit = user
                .credit
                .checked_add(&amount)
                .ok_or_else(|| AppError::Validation("Resulting credit balance is out of range.".into()))?;
            Ok::<_, AppError>(user.credit.clone())
        })
        .await?;

    tracing::info!("Added {} credit to {}, balance now {}", amount, username, new_balance);
    Ok(Json(json!({
        "success": true,
        "message": format!("Successfully added {} credit to {}.", amount, username),
        "newBalance": new_balance,
    }))
    .into_response())
}

pub async fn check_credit(
    State((store, _config)): State<(UserStore, Config)>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let credit = store
        .read(|users| users.get(&username).map(|user| user.credit.clone()))
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;

    Ok(Json(json!({
        "success": true,
        "username": username,
        "credit": credit,
    }))
    .into_response())
}
