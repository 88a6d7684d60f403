//! Admin-only user management.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use wanderlance_core::{UserId, UserRole};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::CurrentUser;
use crate::routes::ApiJson;
use crate::services::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// All accounts, oldest first.
pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<CurrentUser>>> {
    let users = AuthService::new(state.store(), state.tokens())
        .list_users()
        .await?;
    Ok(Json(users.iter().map(CurrentUser::from).collect()))
}

/// Grant or revoke the admin role.
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, target = %id))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> Result<Json<CurrentUser>> {
    let user_id =
        UserId::parse(&id).map_err(|_| AppError::NotFound("User not found".to_string()))?;

    if user_id == admin.id && body.role != UserRole::Admin {
        return Err(AppError::BadRequest(
            "Admins cannot remove their own admin role".to_string(),
        ));
    }

    let user = AuthService::new(state.store(), state.tokens())
        .set_role(user_id, body.role)
        .await?;
    Ok(Json(CurrentUser::from(&user)))
}
