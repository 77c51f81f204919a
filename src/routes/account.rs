use axum::{extract::State, Json};

use crate::{error::ApiResult, models::account::Account, models::auth::AuthenticatedUser, AppState};

/// GET /account/balance: the caller's group balance
pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Account>> {
    let account = state.ledger.balance(user.grp_id).await?;
    Ok(Json(account))
}
