// src/api/wishlist.rs

use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::api::auth::{require_role, AuthUser};
use crate::errors::ApiError;
use crate::holds;
use crate::models::{ItemStatus, ItemWithContext, Role};
use crate::{db, AppState};

/// Re-checks expiry on every HELD item in a freshly loaded list. Losing the
/// conditional update to a concurrent touch is fine; the re-read reflects
/// whichever state won.
async fn resolve_expiry(
    pool: &sqlx::PgPool,
    items: &mut [ItemWithContext],
) -> Result<(), sqlx::Error> {
    for ctx in items.iter_mut() {
        if ctx.item.status == ItemStatus::Held {
            holds::expire_if_needed(pool, &mut ctx.item).await?;
            if ctx.item.held_by_user_id.is_none() {
                ctx.held_by = None;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    pub orphanage_id: Option<i32>,
    pub status: Option<String>,
    pub child_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/wishlist/items",
    params(
        ("orphanageId" = Option<i32>, Query, description = "Filter by orphanage"),
        ("status" = Option<String>, Query, description = "AVAILABLE | HELD | VERIFYING | PURCHASED"),
        ("childId" = Option<i32>, Query, description = "Filter by child")
    ),
    responses(
        (status = 200, description = "Wishlist items with child/orphanage context"),
        (status = 400, description = "Invalid status filter")
    ),
    tag = "wishlist"
)]
#[get("/wishlist/items")]
pub async fn list_items(
    state: web::Data<AppState>,
    query: web::Query<ListItemsQuery>,
) -> Result<HttpResponse, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            ItemStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request("Invalid status filter"))?,
        ),
        None => None,
    };

    let filter = db::ItemFilter {
        orphanage_id: query.orphanage_id,
        status,
        child_id: query.child_id,
    };

    let mut items = db::list_items(&state.pool, &filter).await?;
    resolve_expiry(&state.pool, &mut items).await?;

    Ok(HttpResponse::Ok().json(items))
}

#[utoipa::path(
    get,
    path = "/api/wishlist/items/held-by-me",
    responses((status = 200, description = "Items currently held or awaiting verification")),
    security(("bearer" = [])),
    tag = "wishlist"
)]
#[get("/wishlist/items/held-by-me")]
pub async fn held_by_me(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let mut items = db::list_items_held_by(&state.pool, user.id).await?;
    resolve_expiry(&state.pool, &mut items).await?;

    // Keep only holds that survived the expiry check.
    items.retain(|ctx| {
        matches!(ctx.item.status, ItemStatus::Held | ItemStatus::Verifying)
    });

    Ok(HttpResponse::Ok().json(items))
}

#[utoipa::path(
    post,
    path = "/api/wishlist/{item_id}/hold",
    params(("item_id" = i32, Path, description = "Wishlist item id")),
    responses(
        (status = 200, description = "Item held or hold extended"),
        (status = 400, description = "Item already purchased"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Held by another donor or awaiting verification")
    ),
    security(("bearer" = [])),
    tag = "wishlist"
)]
#[post("/wishlist/{item_id}/hold")]
pub async fn hold_item(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    require_role(&user, Role::Donator)?;
    let item_id = path.into_inner();

    let result = holds::hold(&state.pool, item_id, user.id).await?;

    let item = db::get_item_with_context(&state.pool, result.item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Wishlist item not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": result.message,
        "item": item,
        "holdExpiresAt": item.item.hold_expires_at,
    })))
}

#[utoipa::path(
    post,
    path = "/api/wishlist/{item_id}/release",
    params(("item_id" = i32, Path, description = "Wishlist item id")),
    responses(
        (status = 200, description = "Hold released"),
        (status = 400, description = "Item is not currently held"),
        (status = 403, description = "Caller is not the holder"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer" = [])),
    tag = "wishlist"
)]
#[post("/wishlist/{item_id}/release")]
pub async fn release_item(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    require_role(&user, Role::Donator)?;
    let item_id = path.into_inner();

    holds::release(&state.pool, item_id, user.id).await?;

    let item = db::get_item_with_context(&state.pool, item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Wishlist item not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Item released successfully",
        "item": item,
    })))
}

#[utoipa::path(
    delete,
    path = "/api/wishlist/{item_id}/hold",
    params(("item_id" = i32, Path, description = "Wishlist item id")),
    responses(
        (status = 200, description = "Hold cancelled"),
        (status = 403, description = "Caller may not cancel this hold"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer" = [])),
    tag = "wishlist"
)]
#[delete("/wishlist/{item_id}/hold")]
pub async fn cancel_hold(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let item_id = path.into_inner();

    holds::cancel_hold(&state.pool, item_id, user.id, user.role).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Hold cancelled successfully",
    })))
}
