// src/api/orphanages.rs

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;

use crate::api::auth::{require_role, AuthUser};
use crate::errors::ApiError;
use crate::models::Role;
use crate::{db, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateOrphanageRequest {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
}

#[post("/orphanages")]
pub async fn create_orphanage(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CreateOrphanageRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&user, Role::Organizer)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }

    // One orphanage per organizer.
    if db::get_orphanage_by_organizer(&state.pool, user.id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "You have already registered an orphanage".to_string(),
        ));
    }

    let orphanage = db::insert_orphanage(
        &state.pool,
        user.id,
        &name,
        payload.description.as_deref(),
        payload.address.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Created().json(orphanage))
}

#[get("/orphanages")]
pub async fn list_orphanages(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let orphanages = db::list_orphanages(&state.pool).await?;
    Ok(HttpResponse::Ok().json(orphanages))
}

#[get("/orphanages/{orphanage_id}")]
pub async fn get_orphanage(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let orphanage = db::get_orphanage(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Orphanage not found"))?;
    Ok(HttpResponse::Ok().json(orphanage))
}
