// src/fulfillment.rs
//
// Donation submission (HELD -> VERIFYING, atomic with the donation insert)
// and organizer verification (VERIFYING -> PURCHASED, terminal).

use sqlx::PgPool;

use crate::db;
use crate::errors::ApiError;
use crate::holds;
use crate::models::{DonationWithContext, ItemStatus, ItemWithContext};

pub struct DonationInput {
    pub order_id: Option<String>,
    pub proof_url: Option<String>,
    pub notes: Option<String>,
}

pub async fn submit(
    pool: &PgPool,
    item_id: i32,
    donor_id: i32,
    input: DonationInput,
) -> Result<DonationWithContext, ApiError> {
    let mut item = db::get_item(pool, item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Wishlist item not found"))?;

    // Resolve a stale lease first; if it was this donor's, tell them to
    // re-hold rather than reporting a generic missing-hold error.
    let holder_before_expiry = item.held_by_user_id;
    let was_expired = holds::is_hold_expired(&item, chrono::Utc::now());
    holds::expire_if_needed(pool, &mut item).await?;
    if was_expired && holder_before_expiry == Some(donor_id) {
        return Err(ApiError::bad_request(
            "Your hold on this item has expired. Please hold it again before submitting a donation",
        ));
    }

    match item.status {
        ItemStatus::Purchased => {
            return Err(ApiError::state_conflict(
                "This item has already been purchased",
                ItemStatus::Purchased,
            ));
        }
        ItemStatus::Verifying => {
            return Err(ApiError::state_conflict(
                "This item has already been submitted for verification",
                ItemStatus::Verifying,
            ));
        }
        ItemStatus::Held if item.held_by_user_id != Some(donor_id) => {
            return Err(ApiError::forbidden(
                "You must hold this item before submitting a donation",
            ));
        }
        ItemStatus::Held => {}
        ItemStatus::Available => {
            return Err(ApiError::bad_request(
                "You must hold this item before submitting a donation",
            ));
        }
    }

    let donation_id = db::submit_donation(
        pool,
        item_id,
        donor_id,
        input.order_id.as_deref(),
        input.proof_url.as_deref(),
        input.notes.as_deref(),
    )
    .await?;

    let Some(donation_id) = donation_id else {
        // The item changed hands between our read and the transaction.
        let current = db::get_item(pool, item_id)
            .await?
            .map(|i| i.status)
            .unwrap_or(ItemStatus::Available);
        return Err(ApiError::state_conflict(
            "Item is no longer held by you",
            current,
        ));
    };

    db::get_donation_with_context(pool, donation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Donation not found"))
}

pub struct VerifiedDonation {
    pub item: ItemWithContext,
    pub donation: DonationWithContext,
}

pub async fn verify(
    pool: &PgPool,
    donation_id: i32,
    organizer_id: i32,
) -> Result<VerifiedDonation, ApiError> {
    let chain = db::get_donation_chain(pool, donation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Donation not found"))?;

    if chain.organizer_id != organizer_id {
        return Err(ApiError::forbidden(
            "You can only verify donations for your own orphanage",
        ));
    }

    if chain.item_status != ItemStatus::Verifying {
        return Err(ApiError::wrong_status(
            "Item is not in VERIFYING status",
            chain.item_status,
        ));
    }

    if !db::mark_purchased(pool, chain.item_id).await? {
        // A concurrent verify (stale or duplicate donation view) got there
        // first; report whatever the item says now.
        let current = db::get_item(pool, chain.item_id)
            .await?
            .map(|i| i.status)
            .unwrap_or(ItemStatus::Purchased);
        return Err(ApiError::wrong_status("Item is not in VERIFYING status", current));
    }

    let item = db::get_item_with_context(pool, chain.item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Wishlist item not found"))?;
    let donation = db::get_donation_with_context(pool, donation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Donation not found"))?;

    Ok(VerifiedDonation { item, donation })
}
