use sqlx::{PgPool, Row};
use std::env;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use giftbridge::api::auth::generate_jwt;
use giftbridge::models::Role;
use giftbridge::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret";

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Recreates the test database and runs migrations. Returns None when
/// TEST_DATABASE_URL is not configured so suites can skip instead of failing.
pub async fn init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let test_url = match env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping integration test");
            return None;
        }
    };
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(424242)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    let create_result = sqlx::query(&create_sql).execute(&admin_pool).await;
    if let Err(e) = create_result {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(424242)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    Some(TestDb {
        pool,
        _guard: guard,
    })
}

pub fn build_state(pool: PgPool) -> AppState {
    AppState {
        pool,
        jwt_secret: TEST_JWT_SECRET.to_string(),
    }
}

pub fn token_for(user_id: i32, role: Role) -> String {
    generate_jwt(TEST_JWT_SECRET, user_id, role).expect("sign test jwt")
}

pub async fn insert_user(pool: &PgPool, role: Role) -> i32 {
    let suffix = Uuid::new_v4().to_string();
    sqlx::query(
        r#"INSERT INTO users (email, display_name, password_hash, role)
           VALUES ($1, $2, 'test-hash', $3)
           RETURNING id"#,
    )
    .bind(format!("user_{suffix}@test.local"))
    .bind(format!("user_{suffix}"))
    .bind(role.as_str())
    .fetch_one(pool)
    .await
    .expect("insert user")
    .get("id")
}

pub struct Seed {
    pub donor_a: i32,
    pub donor_b: i32,
    pub organizer: i32,
    pub orphanage_id: i32,
    pub child_id: i32,
    pub item_id: i32,
}

/// Donor pair, organizer with an orphanage, one child, one AVAILABLE item.
pub async fn seed_wishlist(pool: &PgPool) -> Seed {
    let donor_a = insert_user(pool, Role::Donator).await;
    let donor_b = insert_user(pool, Role::Donator).await;
    let organizer = insert_user(pool, Role::Organizer).await;

    let orphanage_id: i32 = sqlx::query(
        r#"INSERT INTO orphanages (organizer_id, name) VALUES ($1, 'Sunrise Home')
           RETURNING id"#,
    )
    .bind(organizer)
    .fetch_one(pool)
    .await
    .expect("insert orphanage")
    .get("id");

    let child_id: i32 = sqlx::query(
        r#"INSERT INTO children (orphanage_id, first_name, age) VALUES ($1, 'Mia', 7)
           RETURNING id"#,
    )
    .bind(orphanage_id)
    .fetch_one(pool)
    .await
    .expect("insert child")
    .get("id");

    let item_id: i32 = sqlx::query(
        r#"INSERT INTO wishlist_items (child_id, name, external_link, price)
           VALUES ($1, 'Lego set', 'https://example.com/lego', 29.99)
           RETURNING id"#,
    )
    .bind(child_id)
    .fetch_one(pool)
    .await
    .expect("insert item")
    .get("id");

    Seed {
        donor_a,
        donor_b,
        organizer,
        orphanage_id,
        child_id,
        item_id,
    }
}

pub async fn insert_item(pool: &PgPool, child_id: i32, name: &str) -> i32 {
    sqlx::query(
        r#"INSERT INTO wishlist_items (child_id, name, external_link)
           VALUES ($1, $2, 'https://example.com/item')
           RETURNING id"#,
    )
    .bind(child_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("insert item")
    .get("id")
}

pub async fn item_state(pool: &PgPool, item_id: i32) -> (String, Option<i32>) {
    let row = sqlx::query("SELECT status, held_by_user_id FROM wishlist_items WHERE id = $1")
        .bind(item_id)
        .fetch_one(pool)
        .await
        .expect("select item state");
    (row.get("status"), row.get("held_by_user_id"))
}

pub async fn backdate_hold(pool: &PgPool, item_id: i32, hours: i64) {
    sqlx::query(
        "UPDATE wishlist_items SET hold_expires_at = now() - ($2 || ' hours')::interval WHERE id = $1",
    )
    .bind(item_id)
    .bind(hours.to_string())
    .execute(pool)
    .await
    .expect("backdate hold");
}
