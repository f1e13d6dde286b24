// src/api/donations.rs

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::auth::{require_role, AuthUser};
use crate::errors::ApiError;
use crate::fulfillment::{self, DonationInput};
use crate::models::Role;
use crate::{db, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationRequest {
    pub item_id: i32,
    pub order_id: Option<String>,
    pub proof_url: Option<String>,
    pub notes: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[utoipa::path(
    post,
    path = "/api/donations",
    request_body = CreateDonationRequest,
    responses(
        (status = 201, description = "Donation recorded, item moved to VERIFYING"),
        (status = 400, description = "No live hold by this donor"),
        (status = 403, description = "Item held by someone else"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Already submitted or purchased")
    ),
    security(("bearer" = [])),
    tag = "donations"
)]
#[post("/donations")]
pub async fn submit_donation(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CreateDonationRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&user, Role::Donator)?;
    let payload = payload.into_inner();

    let proof_url = non_empty(payload.proof_url);
    if let Some(url) = &proof_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ApiError::bad_request("proofUrl must be a valid URL"));
        }
    }

    let input = DonationInput {
        order_id: non_empty(payload.order_id),
        proof_url,
        notes: non_empty(payload.notes),
    };

    let donation = fulfillment::submit(&state.pool, payload.item_id, user.id, input).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Donation submitted successfully",
        "donation": donation,
    })))
}

/// Current donor's donation history, newest first.
#[get("/donations/me")]
pub async fn my_donations(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    require_role(&user, Role::Donator)?;
    let donations = db::list_donations_by_donor(&state.pool, user.id).await?;
    Ok(HttpResponse::Ok().json(donations))
}

/// Donations awaiting or past verification for the organizer's orphanage.
#[get("/donations/orphanage/{orphanage_id}")]
pub async fn orphanage_donations(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    require_role(&user, Role::Organizer)?;
    let orphanage_id = path.into_inner();

    let orphanage = db::get_orphanage(&state.pool, orphanage_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Orphanage not found"))?;
    if orphanage.organizer_id != user.id {
        return Err(ApiError::forbidden(
            "You can only view donations for your own orphanage",
        ));
    }

    let donations = db::list_donations_for_orphanage(&state.pool, orphanage_id).await?;
    Ok(HttpResponse::Ok().json(donations))
}

#[utoipa::path(
    post,
    path = "/api/donations/{donation_id}/verify",
    params(("donation_id" = i32, Path, description = "Donation id")),
    responses(
        (status = 200, description = "Item confirmed as PURCHASED"),
        (status = 400, description = "Item is not in VERIFYING status"),
        (status = 403, description = "Donation belongs to another orphanage"),
        (status = 404, description = "Donation not found")
    ),
    security(("bearer" = [])),
    tag = "donations"
)]
#[post("/donations/{donation_id}/verify")]
pub async fn verify_donation(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    require_role(&user, Role::Organizer)?;
    let donation_id = path.into_inner();

    let verified = fulfillment::verify(&state.pool, donation_id, user.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Donation verified successfully. Item status changed to PURCHASED.",
        "item": verified.item,
        "donation": verified.donation,
    })))
}
