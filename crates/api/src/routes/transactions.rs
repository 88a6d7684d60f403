//! Transaction route handlers.
//!
//! Buyers see their own records; admins see everything and move statuses.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use wanderlance_core::{TransactionId, TransactionStatus};

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::Transaction;
use crate::routes::ApiJson;
use crate::services::TransactionError;
use crate::services::TransactionService;
use crate::services::transactions::TransactionInput;
use crate::state::AppState;

/// Purchase details submitted by the buyer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub seller_name: String,
    pub description: String,
    /// Decimal string or number, e.g. `"149.00"`.
    pub amount: Decimal,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TransactionStatus,
}

/// Malformed ids are indistinguishable from unknown ones.
fn parse_id(raw: &str) -> std::result::Result<TransactionId, TransactionError> {
    TransactionId::parse(raw).map_err(|_| TransactionError::NotFound)
}

/// List transactions visible to the caller, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Transaction>>> {
    let transactions = TransactionService::new(state.store()).list(&user).await?;
    Ok(Json(transactions))
}

/// Record a purchase by the caller.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>)> {
    let transaction = TransactionService::new(state.store())
        .create(
            user.id,
            TransactionInput {
                seller_name: body.seller_name,
                description: body.description,
                amount: body.amount,
                currency: body.currency,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Transaction>> {
    let id = parse_id(&id)?;
    let transaction = TransactionService::new(state.store()).get(&user, id).await?;
    Ok(Json(transaction))
}

/// Move a transaction to a new status (admin only).
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, transaction_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<Transaction>> {
    let id = parse_id(&id)?;
    let transaction = TransactionService::new(state.store())
        .update_status(id, body.status)
        .await?;
    Ok(Json(transaction))
}
