use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::ApiResult,
    models::{
        auth::AuthenticatedUser,
        menu::{
            MenuId, MenuLookup, MenuStatus, MenuStatusQuery, MenuView, ProposeMenuRequest,
            UpdateItemRequest, UpdateMenuRequest,
        },
    },
    AppState,
};

/// GET /menu?status=pending|not_published|published|rejected
pub async fn get_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    query: Result<Query<MenuStatusQuery>, QueryRejection>,
) -> ApiResult<Json<MenuLookup>> {
    let Query(params) = query?;
    let status: MenuStatus = params.status.parse()?;

    let rows = match status {
        MenuStatus::Published => state.menus.view_accepted(user.grp_id).await?,
        other => state.menus.menu_by_status(user.grp_id, other).await?,
    };
    Ok(Json(MenuView::from_rows(&rows).into()))
}

/// POST /menu: propose a menu for a date
pub async fn post_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<ProposeMenuRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = payload?;
    let proposal = body.validate()?;
    let menu_id = state
        .menus
        .propose(user.grp_id, &user.username, proposal)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "menu_id": menu_id, "message": "Menu proposed" })),
    ))
}

/// PUT /menu: publish, reject or change the status of a menu
pub async fn put_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<UpdateMenuRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let message = state
        .menus
        .apply_update(user.grp_id, &user.username, &body)
        .await?;
    Ok(Json(json!({ "message": message })))
}

/// PATCH /menu/{menu_id}: swap one item for another
pub async fn patch_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    path: Result<Path<MenuId>, PathRejection>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Path(menu_id) = path?;
    let Json(body) = payload?;
    body.validate()?;
    state
        .menus
        .patch_item(menu_id, user.grp_id, &body.old_item, &body.new_item)
        .await?;
    Ok(Json(json!({
        "message": "success",
        "new_item": body.new_item,
        "menu_id": menu_id,
    })))
}
