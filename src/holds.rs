// src/holds.rs
//
// The hold manager: at most one live hold per item, 24-hour lease, lazy
// expiry on access. Exclusivity comes from the conditional updates in db.rs;
// nothing here takes an in-process lock.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::db;
use crate::errors::ApiError;
use crate::models::{ItemStatus, Role, WishlistItem};

pub const HOLD_DURATION_HOURS: i64 = 24;

pub fn hold_duration() -> Duration {
    Duration::hours(HOLD_DURATION_HOURS)
}

/// A hold is stale once its expiry instant has passed. Only HELD items can
/// be stale; every other status ignores the expiry field.
pub fn is_hold_expired(item: &WishlistItem, now: DateTime<Utc>) -> bool {
    item.status == ItemStatus::Held
        && item.hold_expires_at.map_or(false, |expires| expires < now)
}

/// What a hold attempt should do, given an item whose expiry has already
/// been resolved.
#[derive(Debug, PartialEq, Eq)]
pub enum HoldDecision {
    /// Terminal state, nothing to hold.
    AlreadyPurchased,
    /// A submitted donation is awaiting the organizer.
    AwaitingVerification,
    /// Live hold belongs to someone else.
    HeldByOther,
    /// Re-entrant hold by the current holder: extend the lease.
    Extend,
    /// AVAILABLE (or freshly expired): take the hold.
    Acquire,
}

pub fn decide_hold(item: &WishlistItem, donor_id: i32) -> HoldDecision {
    match item.status {
        ItemStatus::Purchased => HoldDecision::AlreadyPurchased,
        ItemStatus::Verifying => HoldDecision::AwaitingVerification,
        ItemStatus::Held if item.held_by_user_id == Some(donor_id) => HoldDecision::Extend,
        ItemStatus::Held => HoldDecision::HeldByOther,
        ItemStatus::Available => HoldDecision::Acquire,
    }
}

/// Lazy expiry, run at the start of every call that inspects a HELD item.
/// The write is conditioned on the expiry value we read, so it can never
/// clobber a hold that was renewed in between; losing that race is benign
/// and we simply re-read whichever state won.
pub async fn expire_if_needed(
    pool: &PgPool,
    item: &mut WishlistItem,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    if !is_hold_expired(item, now) {
        return Ok(());
    }
    let Some(seen_expiry) = item.hold_expires_at else {
        return Ok(());
    };

    if db::clear_expired_hold(pool, item.id, seen_expiry).await? {
        item.status = ItemStatus::Available;
        item.held_by_user_id = None;
        item.hold_expires_at = None;
    } else if let Some(fresh) = db::get_item(pool, item.id).await? {
        *item = fresh;
    }
    Ok(())
}

/// Outcome of a successful hold call.
pub struct HoldResult {
    pub item_id: i32,
    pub message: &'static str,
}

pub async fn hold(pool: &PgPool, item_id: i32, donor_id: i32) -> Result<HoldResult, ApiError> {
    let mut item = db::get_item(pool, item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Wishlist item not found"))?;

    expire_if_needed(pool, &mut item).await?;

    match decide_hold(&item, donor_id) {
        HoldDecision::AlreadyPurchased => Err(ApiError::wrong_status(
            "Item has already been purchased",
            ItemStatus::Purchased,
        )),
        HoldDecision::AwaitingVerification => Err(ApiError::state_conflict(
            "Item has already been submitted for verification",
            ItemStatus::Verifying,
        )),
        HoldDecision::HeldByOther => Err(ApiError::state_conflict(
            "Item is currently held by another donor",
            ItemStatus::Held,
        )),
        HoldDecision::Extend => {
            let expires_at = Utc::now() + hold_duration();
            if db::extend_hold(pool, item_id, donor_id, expires_at).await? {
                Ok(HoldResult {
                    item_id,
                    message: "Hold extended for 24 hours",
                })
            } else {
                // Hold vanished between read and write.
                Err(conflict_with_current(pool, item_id).await?)
            }
        }
        HoldDecision::Acquire => {
            let expires_at = Utc::now() + hold_duration();
            if db::acquire_hold(pool, item_id, donor_id, expires_at).await? {
                Ok(HoldResult {
                    item_id,
                    message: "Item held successfully for 24 hours",
                })
            } else {
                // Lost the race: somebody else's conditional update won.
                Err(conflict_with_current(pool, item_id).await?)
            }
        }
    }
}

/// Error for a hold write that lost its conditional update, phrased for the
/// state the re-read found.
pub fn hold_conflict_error(current: ItemStatus) -> ApiError {
    match current {
        ItemStatus::Purchased => {
            ApiError::wrong_status("Item has already been purchased", current)
        }
        ItemStatus::Verifying => ApiError::state_conflict(
            "Item has already been submitted for verification",
            current,
        ),
        _ => ApiError::state_conflict("Item is currently held by another donor", current),
    }
}

async fn conflict_with_current(pool: &PgPool, item_id: i32) -> Result<ApiError, ApiError> {
    let current = db::get_item(pool, item_id)
        .await?
        .map(|i| i.status)
        .unwrap_or(ItemStatus::Available);
    Ok(hold_conflict_error(current))
}

pub async fn release(pool: &PgPool, item_id: i32, donor_id: i32) -> Result<(), ApiError> {
    let mut item = db::get_item(pool, item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Wishlist item not found"))?;

    expire_if_needed(pool, &mut item).await?;

    if item.status != ItemStatus::Held {
        // Double release fails loudly; it surfaces client bugs.
        return Err(ApiError::wrong_status(
            "Item is not currently held",
            item.status,
        ));
    }
    if item.held_by_user_id != Some(donor_id) {
        return Err(ApiError::forbidden(
            "You can only release items you are holding",
        ));
    }

    if !db::release_hold(pool, item_id, donor_id).await? {
        let current = db::get_item(pool, item_id)
            .await?
            .map(|i| i.status)
            .unwrap_or(ItemStatus::Available);
        return Err(ApiError::wrong_status("Item is not currently held", current));
    }
    Ok(())
}

/// Broader cancellation: the holder, an organizer/admin, or anyone once the
/// hold has expired. Clearing an already-cleared hold is a no-op success.
pub async fn cancel_hold(
    pool: &PgPool,
    item_id: i32,
    caller_id: i32,
    caller_role: Role,
) -> Result<(), ApiError> {
    let item = db::get_item(pool, item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Wishlist item not found"))?;

    let expired = item
        .hold_expires_at
        .map_or(false, |expires| expires < Utc::now());
    let privileged = matches!(caller_role, Role::Organizer | Role::Admin);
    let is_holder = item.held_by_user_id == Some(caller_id);

    if !expired && !is_holder && !privileged {
        return Err(ApiError::forbidden("You cannot cancel this hold"));
    }

    if item.status == ItemStatus::Held {
        if is_holder || privileged {
            db::clear_hold(pool, item_id).await?;
        } else if let Some(seen_expiry) = item.hold_expires_at {
            // Authorized only because the lease looked stale; condition the
            // write on the expiry we read so a concurrent renewal survives.
            // Losing that update means the hold is live again, nothing to do.
            db::clear_expired_hold(pool, item_id, seen_expiry).await?;
        }
    }
    Ok(())
}
