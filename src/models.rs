// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Wishlist item lifecycle. Transmitted on the wire as the literal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Available,
    Held,
    Verifying,
    Purchased,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "AVAILABLE",
            ItemStatus::Held => "HELD",
            ItemStatus::Verifying => "VERIFYING",
            ItemStatus::Purchased => "PURCHASED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(ItemStatus::Available),
            "HELD" => Some(ItemStatus::Held),
            "VERIFYING" => Some(ItemStatus::Verifying),
            "PURCHASED" => Some(ItemStatus::Purchased),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Donator,
    Organizer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donator => "DONATOR",
            Role::Organizer => "ORGANIZER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DONATOR" => Some(Role::Donator),
            "ORGANIZER" => Some(Role::Organizer),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Orphanage {
    pub id: i32,
    pub organizer_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub id: i32,
    pub orphanage_id: i32,
    pub first_name: String,
    pub age: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: i32,
    pub child_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub external_link: String,
    pub price: Option<String>,
    pub status: ItemStatus,
    pub held_by_user_id: Option<i32>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: i32,
    pub donor_id: i32,
    pub item_id: i32,
    pub order_id: Option<String>,
    pub proof_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

// Joined display shapes, matching what the client renders.

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanageSummary {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSummary {
    pub id: i32,
    pub first_name: String,
    pub age: Option<i32>,
    pub orphanage: OrphanageSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i32,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ItemWithContext {
    #[serde(flatten)]
    pub item: WishlistItem,
    pub child: ChildSummary,
    #[serde(rename = "heldBy")]
    pub held_by: Option<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct DonationWithContext {
    #[serde(flatten)]
    pub donation: Donation,
    pub donor: UserSummary,
    pub item: ItemWithContext,
}

#[derive(Debug, Serialize)]
pub struct ChildWithWishlist {
    #[serde(flatten)]
    pub child: Child,
    pub wishlist: Vec<ItemWithContext>,
}
