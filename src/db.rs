// src/db.rs
//
// Runtime queries throughout so the build does not depend on a dev database.
// All hold-state mutations are single conditional UPDATEs; callers check
// rows_affected to learn whether they won the transition.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};

use crate::models::{
    Child, ChildSummary, Donation, DonationWithContext, ItemStatus, ItemWithContext, Orphanage,
    OrphanageSummary, Role, User, UserSummary, WishlistItem,
};

const ITEM_CONTEXT_COLS: &str = r#"i.id, i.child_id, i.name, i.description, i.external_link,
       i.price::text AS price, i.status, i.held_by_user_id, i.hold_expires_at, i.created_at,
       c.first_name, c.age, c.orphanage_id,
       o.name AS orphanage_name,
       h.display_name AS holder_name, h.email AS holder_email"#;

const ITEM_CONTEXT_FROM: &str = r#"FROM wishlist_items i
       JOIN children c ON c.id = i.child_id
       JOIN orphanages o ON o.id = c.orphanage_id
       LEFT JOIN users h ON h.id = i.held_by_user_id"#;

fn decode_status(raw: &str) -> Result<ItemStatus, sqlx::Error> {
    ItemStatus::parse(raw)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown item status: {raw}").into()))
}

fn decode_role(raw: &str) -> Result<Role, sqlx::Error> {
    Role::parse(raw).ok_or_else(|| sqlx::Error::Decode(format!("unknown role: {raw}").into()))
}

fn item_from_row(row: &PgRow) -> Result<WishlistItem, sqlx::Error> {
    let raw_status: String = row.try_get("status")?;
    Ok(WishlistItem {
        id: row.try_get("id")?,
        child_id: row.try_get("child_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        external_link: row.try_get("external_link")?,
        price: row.try_get("price")?,
        status: decode_status(&raw_status)?,
        held_by_user_id: row.try_get("held_by_user_id")?,
        hold_expires_at: row.try_get("hold_expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn item_context_from_row(row: &PgRow) -> Result<ItemWithContext, sqlx::Error> {
    let item = item_from_row(row)?;
    let held_by = match item.held_by_user_id {
        Some(id) => Some(UserSummary {
            id,
            display_name: row.try_get("holder_name")?,
            email: row.try_get("holder_email")?,
        }),
        None => None,
    };
    Ok(ItemWithContext {
        child: ChildSummary {
            id: item.child_id,
            first_name: row.try_get("first_name")?,
            age: row.try_get("age")?,
            orphanage: OrphanageSummary {
                id: row.try_get("orphanage_id")?,
                name: row.try_get("orphanage_name")?,
            },
        },
        held_by,
        item,
    })
}

// ---------------------------------------------------------------------------
// Users

pub struct Credentials {
    pub user_id: i32,
    pub password_hash: String,
    pub role: Role,
}

pub async fn insert_user(
    pool: &PgPool,
    email: &str,
    display_name: &str,
    password_hash: &str,
    role: Role,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO users (email, display_name, password_hash, role)
           VALUES ($1, $2, $3, $4)
           RETURNING id"#,
    )
    .bind(email)
    .bind(display_name)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;
    row.try_get("id")
}

pub async fn get_credentials(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Credentials>, sqlx::Error> {
    let row = sqlx::query(r#"SELECT id, password_hash, role FROM users WHERE email = $1"#)
        .bind(email)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(r) => {
            let raw_role: String = r.try_get("role")?;
            Ok(Some(Credentials {
                user_id: r.try_get("id")?,
                password_hash: r.try_get("password_hash")?,
                role: decode_role(&raw_role)?,
            }))
        }
        None => Ok(None),
    }
}

pub async fn get_user(pool: &PgPool, user_id: i32) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, email, display_name, role, created_at FROM users WHERE id = $1"#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) => {
            let raw_role: String = r.try_get("role")?;
            Ok(Some(User {
                id: r.try_get("id")?,
                email: r.try_get("email")?,
                display_name: r.try_get("display_name")?,
                role: decode_role(&raw_role)?,
                created_at: r.try_get("created_at")?,
            }))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Orphanages

fn orphanage_from_row(row: &PgRow) -> Result<Orphanage, sqlx::Error> {
    Ok(Orphanage {
        id: row.try_get("id")?,
        organizer_id: row.try_get("organizer_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        address: row.try_get("address")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_orphanage(
    pool: &PgPool,
    organizer_id: i32,
    name: &str,
    description: Option<&str>,
    address: Option<&str>,
) -> Result<Orphanage, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO orphanages (organizer_id, name, description, address)
           VALUES ($1, $2, $3, $4)
           RETURNING id, organizer_id, name, description, address, created_at"#,
    )
    .bind(organizer_id)
    .bind(name)
    .bind(description)
    .bind(address)
    .fetch_one(pool)
    .await?;
    orphanage_from_row(&row)
}

pub async fn get_orphanage(pool: &PgPool, id: i32) -> Result<Option<Orphanage>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, organizer_id, name, description, address, created_at
           FROM orphanages WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(orphanage_from_row).transpose()
}

pub async fn get_orphanage_by_organizer(
    pool: &PgPool,
    organizer_id: i32,
) -> Result<Option<Orphanage>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, organizer_id, name, description, address, created_at
           FROM orphanages WHERE organizer_id = $1"#,
    )
    .bind(organizer_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(orphanage_from_row).transpose()
}

pub async fn list_orphanages(pool: &PgPool) -> Result<Vec<Orphanage>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, organizer_id, name, description, address, created_at
           FROM orphanages ORDER BY created_at DESC"#,
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(orphanage_from_row).collect()
}

// ---------------------------------------------------------------------------
// Children

fn child_from_row(row: &PgRow) -> Result<Child, sqlx::Error> {
    Ok(Child {
        id: row.try_get("id")?,
        orphanage_id: row.try_get("orphanage_id")?,
        first_name: row.try_get("first_name")?,
        age: row.try_get("age")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Child plus the organizer owning it, for ownership checks.
pub async fn get_child(pool: &PgPool, child_id: i32) -> Result<Option<(Child, i32)>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT ch.id, ch.orphanage_id, ch.first_name, ch.age, ch.created_at, o.organizer_id
           FROM children ch
           JOIN orphanages o ON o.id = ch.orphanage_id
           WHERE ch.id = $1"#,
    )
    .bind(child_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) => Ok(Some((child_from_row(&r)?, r.try_get("organizer_id")?))),
        None => Ok(None),
    }
}

pub struct NewWishlistItem {
    pub name: String,
    pub description: Option<String>,
    pub external_link: String,
    pub price: Option<f64>,
}

pub async fn insert_child_with_items(
    pool: &PgPool,
    orphanage_id: i32,
    first_name: &str,
    age: Option<i32>,
    items: &[NewWishlistItem],
) -> Result<(Child, Vec<WishlistItem>), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let child_row = sqlx::query(
        r#"INSERT INTO children (orphanage_id, first_name, age)
           VALUES ($1, $2, $3)
           RETURNING id, orphanage_id, first_name, age, created_at"#,
    )
    .bind(orphanage_id)
    .bind(first_name)
    .bind(age)
    .fetch_one(&mut *tx)
    .await?;
    let child = child_from_row(&child_row)?;

    let mut wishlist = Vec::with_capacity(items.len());
    for item in items {
        let row = sqlx::query(
            r#"INSERT INTO wishlist_items (child_id, name, description, external_link, price)
               VALUES ($1, $2, $3, $4, $5::numeric)
               RETURNING id, child_id, name, description, external_link, price::text AS price,
                         status, held_by_user_id, hold_expires_at, created_at"#,
        )
        .bind(child.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.external_link)
        .bind(item.price.map(|p| p.to_string()))
        .fetch_one(&mut *tx)
        .await?;
        wishlist.push(item_from_row(&row)?);
    }

    tx.commit().await?;
    Ok((child, wishlist))
}

/// Explicit cascade: the child owns its wishlist items, so deleting the child
/// removes the items and their donation history in one transaction.
pub async fn delete_child_cascade(pool: &PgPool, child_id: i32) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"DELETE FROM donations
           WHERE item_id IN (SELECT id FROM wishlist_items WHERE child_id = $1)"#,
    )
    .bind(child_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM wishlist_items WHERE child_id = $1")
        .bind(child_id)
        .execute(&mut *tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM children WHERE id = $1")
        .bind(child_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(deleted.rows_affected() == 1)
}

pub async fn list_items_for_children(
    pool: &PgPool,
    orphanage_id: i32,
) -> Result<Vec<(Child, Vec<ItemWithContext>)>, sqlx::Error> {
    let child_rows = sqlx::query(
        r#"SELECT id, orphanage_id, first_name, age, created_at
           FROM children WHERE orphanage_id = $1 ORDER BY created_at DESC"#,
    )
    .bind(orphanage_id)
    .fetch_all(pool)
    .await?;

    let mut result = Vec::with_capacity(child_rows.len());
    for row in &child_rows {
        let child = child_from_row(row)?;
        let sql = format!(
            "SELECT {ITEM_CONTEXT_COLS} {ITEM_CONTEXT_FROM} WHERE i.child_id = $1 ORDER BY i.created_at DESC"
        );
        let item_rows = sqlx::query(&sql).bind(child.id).fetch_all(pool).await?;
        let items = item_rows
            .iter()
            .map(item_context_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        result.push((child, items));
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Wishlist items

pub async fn get_item(pool: &PgPool, item_id: i32) -> Result<Option<WishlistItem>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, child_id, name, description, external_link, price::text AS price,
                  status, held_by_user_id, hold_expires_at, created_at
           FROM wishlist_items WHERE id = $1"#,
    )
    .bind(item_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(item_from_row).transpose()
}

pub async fn get_item_with_context(
    pool: &PgPool,
    item_id: i32,
) -> Result<Option<ItemWithContext>, sqlx::Error> {
    let sql = format!("SELECT {ITEM_CONTEXT_COLS} {ITEM_CONTEXT_FROM} WHERE i.id = $1");
    let row = sqlx::query(&sql).bind(item_id).fetch_optional(pool).await?;
    row.as_ref().map(item_context_from_row).transpose()
}

#[derive(Debug, Default)]
pub struct ItemFilter {
    pub orphanage_id: Option<i32>,
    pub status: Option<ItemStatus>,
    pub child_id: Option<i32>,
}

pub async fn list_items(
    pool: &PgPool,
    filter: &ItemFilter,
) -> Result<Vec<ItemWithContext>, sqlx::Error> {
    let mut qb: QueryBuilder<sqlx::Postgres> =
        QueryBuilder::new(format!("SELECT {ITEM_CONTEXT_COLS} {ITEM_CONTEXT_FROM} WHERE 1=1"));
    if let Some(orphanage_id) = filter.orphanage_id {
        qb.push(" AND c.orphanage_id = ");
        qb.push_bind(orphanage_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND i.status = ");
        qb.push_bind(status.as_str());
    }
    if let Some(child_id) = filter.child_id {
        qb.push(" AND i.child_id = ");
        qb.push_bind(child_id);
    }
    qb.push(" ORDER BY i.created_at DESC");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(item_context_from_row).collect()
}

/// Items the donor is actively holding, plus their submissions still awaiting
/// verification (the hold fields are cleared on submit, so VERIFYING items
/// are matched through the donations table).
pub async fn list_items_held_by(
    pool: &PgPool,
    donor_id: i32,
) -> Result<Vec<ItemWithContext>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {ITEM_CONTEXT_COLS} {ITEM_CONTEXT_FROM}
           WHERE (i.status = 'HELD' AND i.held_by_user_id = $1)
              OR (i.status = 'VERIFYING'
                  AND i.id IN (SELECT item_id FROM donations WHERE donor_id = $1))
           ORDER BY i.created_at DESC"#
    );
    let rows = sqlx::query(&sql).bind(donor_id).fetch_all(pool).await?;
    rows.iter().map(item_context_from_row).collect()
}

// ---------------------------------------------------------------------------
// Hold-state conditional updates

/// Clears a stale hold, conditioned on the exact expiry value previously
/// read so a concurrently renewed hold is never clobbered.
pub async fn clear_expired_hold(
    pool: &PgPool,
    item_id: i32,
    seen_expiry: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE wishlist_items
           SET status = 'AVAILABLE', held_by_user_id = NULL, hold_expires_at = NULL
           WHERE id = $1 AND status = 'HELD' AND hold_expires_at = $2"#,
    )
    .bind(item_id)
    .bind(seen_expiry)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// First successful conditional update wins the race for an AVAILABLE item.
pub async fn acquire_hold(
    pool: &PgPool,
    item_id: i32,
    donor_id: i32,
    expires_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE wishlist_items
           SET status = 'HELD', held_by_user_id = $2, hold_expires_at = $3
           WHERE id = $1 AND status = 'AVAILABLE'"#,
    )
    .bind(item_id)
    .bind(donor_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn extend_hold(
    pool: &PgPool,
    item_id: i32,
    donor_id: i32,
    expires_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE wishlist_items
           SET hold_expires_at = $3
           WHERE id = $1 AND status = 'HELD' AND held_by_user_id = $2"#,
    )
    .bind(item_id)
    .bind(donor_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn release_hold(
    pool: &PgPool,
    item_id: i32,
    donor_id: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE wishlist_items
           SET status = 'AVAILABLE', held_by_user_id = NULL, hold_expires_at = NULL
           WHERE id = $1 AND status = 'HELD' AND held_by_user_id = $2"#,
    )
    .bind(item_id)
    .bind(donor_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn clear_hold(pool: &PgPool, item_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE wishlist_items
           SET status = 'AVAILABLE', held_by_user_id = NULL, hold_expires_at = NULL
           WHERE id = $1 AND status = 'HELD'"#,
    )
    .bind(item_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_purchased(pool: &PgPool, item_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE wishlist_items SET status = 'PURCHASED'
           WHERE id = $1 AND status = 'VERIFYING'"#,
    )
    .bind(item_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

// ---------------------------------------------------------------------------
// Donations

/// Inserts the donation and flips the item to VERIFYING in one transaction.
/// Both writes commit together or not at all; returns None when the item was
/// no longer held by this donor at commit time.
pub async fn submit_donation(
    pool: &PgPool,
    item_id: i32,
    donor_id: i32,
    order_id: Option<&str>,
    proof_url: Option<&str>,
    notes: Option<&str>,
) -> Result<Option<i32>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"UPDATE wishlist_items
           SET status = 'VERIFYING', held_by_user_id = NULL, hold_expires_at = NULL
           WHERE id = $1 AND status = 'HELD' AND held_by_user_id = $2"#,
    )
    .bind(item_id)
    .bind(donor_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let row = sqlx::query(
        r#"INSERT INTO donations (donor_id, item_id, order_id, proof_url, notes)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id"#,
    )
    .bind(donor_id)
    .bind(item_id)
    .bind(order_id)
    .bind(proof_url)
    .bind(notes)
    .fetch_one(&mut *tx)
    .await?;
    let donation_id: i32 = row.try_get("id")?;

    tx.commit().await?;
    Ok(Some(donation_id))
}

const DONATION_CONTEXT_COLS: &str = r#"d.id AS donation_id, d.donor_id, d.item_id,
       d.order_id, d.proof_url, d.notes, d.created_at AS donation_created_at,
       u.display_name AS donor_name, u.email AS donor_email"#;

const DONATION_CONTEXT_FROM: &str = r#"FROM donations d
       JOIN users u ON u.id = d.donor_id
       JOIN wishlist_items i ON i.id = d.item_id
       JOIN children c ON c.id = i.child_id
       JOIN orphanages o ON o.id = c.orphanage_id
       LEFT JOIN users h ON h.id = i.held_by_user_id"#;

fn donation_context_from_row(row: &PgRow) -> Result<DonationWithContext, sqlx::Error> {
    let donor_id: i32 = row.try_get("donor_id")?;
    Ok(DonationWithContext {
        donation: Donation {
            id: row.try_get("donation_id")?,
            donor_id,
            item_id: row.try_get("item_id")?,
            order_id: row.try_get("order_id")?,
            proof_url: row.try_get("proof_url")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("donation_created_at")?,
        },
        donor: UserSummary {
            id: donor_id,
            display_name: row.try_get("donor_name")?,
            email: row.try_get("donor_email")?,
        },
        item: item_context_from_row(row)?,
    })
}

pub async fn get_donation_with_context(
    pool: &PgPool,
    donation_id: i32,
) -> Result<Option<DonationWithContext>, sqlx::Error> {
    let sql = format!(
        "SELECT {DONATION_CONTEXT_COLS}, {ITEM_CONTEXT_COLS} {DONATION_CONTEXT_FROM} WHERE d.id = $1"
    );
    let row = sqlx::query(&sql)
        .bind(donation_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(donation_context_from_row).transpose()
}

pub async fn list_donations_by_donor(
    pool: &PgPool,
    donor_id: i32,
) -> Result<Vec<DonationWithContext>, sqlx::Error> {
    let sql = format!(
        "SELECT {DONATION_CONTEXT_COLS}, {ITEM_CONTEXT_COLS} {DONATION_CONTEXT_FROM} \
         WHERE d.donor_id = $1 ORDER BY d.created_at DESC"
    );
    let rows = sqlx::query(&sql).bind(donor_id).fetch_all(pool).await?;
    rows.iter().map(donation_context_from_row).collect()
}

/// Latest donation per VERIFYING/PURCHASED item across the orphanage.
pub async fn list_donations_for_orphanage(
    pool: &PgPool,
    orphanage_id: i32,
) -> Result<Vec<DonationWithContext>, sqlx::Error> {
    let sql = format!(
        "SELECT DISTINCT ON (d.item_id) {DONATION_CONTEXT_COLS}, {ITEM_CONTEXT_COLS} \
         {DONATION_CONTEXT_FROM} \
         WHERE c.orphanage_id = $1 AND i.status IN ('VERIFYING', 'PURCHASED') \
         ORDER BY d.item_id, d.created_at DESC"
    );
    let rows = sqlx::query(&sql).bind(orphanage_id).fetch_all(pool).await?;
    rows.iter().map(donation_context_from_row).collect()
}

/// Donation joined up its ownership chain, for verification checks.
pub struct DonationChain {
    pub donation_id: i32,
    pub donor_id: i32,
    pub item_id: i32,
    pub item_status: ItemStatus,
    pub organizer_id: i32,
}

pub async fn get_donation_chain(
    pool: &PgPool,
    donation_id: i32,
) -> Result<Option<DonationChain>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT d.id AS donation_id, d.donor_id, d.item_id, i.status, o.organizer_id
           FROM donations d
           JOIN wishlist_items i ON i.id = d.item_id
           JOIN children c ON c.id = i.child_id
           JOIN orphanages o ON o.id = c.orphanage_id
           WHERE d.id = $1"#,
    )
    .bind(donation_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) => {
            let raw_status: String = r.try_get("status")?;
            Ok(Some(DonationChain {
                donation_id: r.try_get("donation_id")?,
                donor_id: r.try_get("donor_id")?,
                item_id: r.try_get("item_id")?,
                item_status: decode_status(&raw_status)?,
                organizer_id: r.try_get("organizer_id")?,
            }))
        }
        None => Ok(None),
    }
}
