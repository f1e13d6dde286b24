// src/api/children.rs

use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::api::auth::{require_role, AuthUser};
use crate::db::NewWishlistItem;
use crate::errors::ApiError;
use crate::models::{ChildWithWishlist, ItemStatus, Role};
use crate::{db, holds, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItemBody {
    pub name: String,
    pub description: Option<String>,
    pub external_link: String,
    pub price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChildRequest {
    pub first_name: String,
    pub age: Option<i32>,
    pub orphanage_id: i32,
    #[serde(default)]
    pub wishlist_items: Vec<NewItemBody>,
}

#[post("/children")]
pub async fn create_child(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CreateChildRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&user, Role::Organizer)?;
    let payload = payload.into_inner();

    let first_name = payload.first_name.trim().to_string();
    if first_name.is_empty() {
        return Err(ApiError::bad_request("firstName must not be empty"));
    }
    if let Some(age) = payload.age {
        if !(0..=120).contains(&age) {
            return Err(ApiError::bad_request("age must be between 0 and 120"));
        }
    }

    let orphanage = db::get_orphanage(&state.pool, payload.orphanage_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Orphanage not found"))?;
    if orphanage.organizer_id != user.id {
        return Err(ApiError::forbidden(
            "You can only add children to your own orphanage",
        ));
    }

    let mut items = Vec::with_capacity(payload.wishlist_items.len());
    for item in payload.wishlist_items {
        if item.name.trim().is_empty() || item.external_link.trim().is_empty() {
            return Err(ApiError::bad_request(
                "Wishlist items must have name and externalLink",
            ));
        }
        items.push(NewWishlistItem {
            name: item.name.trim().to_string(),
            description: item.description,
            external_link: item.external_link.trim().to_string(),
            price: item.price,
        });
    }

    let (child, wishlist) =
        db::insert_child_with_items(&state.pool, orphanage.id, &first_name, payload.age, &items)
            .await?;

    Ok(HttpResponse::Created().json(json!({
        "id": child.id,
        "orphanageId": child.orphanage_id,
        "firstName": child.first_name,
        "age": child.age,
        "createdAt": child.created_at,
        "wishlist": wishlist,
    })))
}

#[get("/children/orphanage/{orphanage_id}")]
pub async fn children_for_orphanage(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let orphanage_id = path.into_inner();

    db::get_orphanage(&state.pool, orphanage_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Orphanage not found"))?;

    let rows = db::list_items_for_children(&state.pool, orphanage_id).await?;

    let mut children = Vec::with_capacity(rows.len());
    for (child, mut wishlist) in rows {
        for ctx in wishlist.iter_mut() {
            if ctx.item.status == ItemStatus::Held {
                holds::expire_if_needed(&state.pool, &mut ctx.item).await?;
                if ctx.item.held_by_user_id.is_none() {
                    ctx.held_by = None;
                }
            }
        }
        children.push(ChildWithWishlist { child, wishlist });
    }

    Ok(HttpResponse::Ok().json(children))
}

/// Deleting a child removes its wishlist items (and their donation history)
/// in the same transaction.
#[delete("/children/{child_id}")]
pub async fn delete_child(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    require_role(&user, Role::Organizer)?;
    let child_id = path.into_inner();

    let (_, organizer_id) = db::get_child(&state.pool, child_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Child not found"))?;
    if organizer_id != user.id {
        return Err(ApiError::forbidden(
            "You can only remove children from your own orphanage",
        ));
    }

    if !db::delete_child_cascade(&state.pool, child_id).await? {
        return Err(ApiError::not_found("Child not found"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Child and wishlist removed successfully",
    })))
}
