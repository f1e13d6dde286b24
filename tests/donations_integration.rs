use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use sqlx::Row;

use giftbridge::api;
use giftbridge::api::auth::JwtMiddleware;
use giftbridge::holds;
use giftbridge::models::Role;

mod support;

macro_rules! donations_app {
    ($state:expr) => {
        test::init_service(
            App::new().app_data($state.clone()).service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(support::TEST_JWT_SECRET))
                    .service(api::wishlist::hold_item)
                    .service(api::donations::submit_donation)
                    .service(api::donations::my_donations)
                    .service(api::donations::orphanage_donations)
                    .service(api::donations::verify_donation),
            ),
        )
        .await
    };
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

async fn donation_count(pool: &sqlx::PgPool, item_id: i32) -> i64 {
    sqlx::query("SELECT count(*) AS n FROM donations WHERE item_id = $1")
        .bind(item_id)
        .fetch_one(pool)
        .await
        .expect("count donations")
        .get("n")
}

#[actix_web::test]
async fn hold_submit_verify_full_flow() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let seed = support::seed_wishlist(pool).await;
    let state = web::Data::new(support::build_state(pool.clone()));
    let app = donations_app!(state);

    let token_a = support::token_for(seed.donor_a, Role::Donator);
    let token_b = support::token_for(seed.donor_b, Role::Donator);
    let token_org = support::token_for(seed.organizer, Role::Organizer);

    // Donor A takes the hold.
    let req = TestRequest::post()
        .uri(&format!("/api/wishlist/{}/hold", seed.item_id))
        .insert_header(bearer(&token_a))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // Donor B loses.
    let req = TestRequest::post()
        .uri(&format!("/api/wishlist/{}/hold", seed.item_id))
        .insert_header(bearer(&token_b))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    // A submits proof of purchase.
    let req = TestRequest::post()
        .uri("/api/donations")
        .insert_header(bearer(&token_a))
        .set_json(json!({
            "itemId": seed.item_id,
            "orderId": "AMZ1",
            "proofUrl": "https://example.com/receipt",
            "notes": "Shipped directly"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Donation submitted successfully");
    let donation_id = body["donation"]["id"].as_i64().expect("donation id");
    assert_eq!(body["donation"]["orderId"], "AMZ1");
    assert_eq!(body["donation"]["item"]["status"], "VERIFYING");

    let row = sqlx::query(
        "SELECT donor_id, order_id FROM donations WHERE id = $1",
    )
    .bind(donation_id as i32)
    .fetch_one(pool)
    .await
    .expect("select donation");
    assert_eq!(row.get::<i32, _>("donor_id"), seed.donor_a);
    assert_eq!(row.get::<String, _>("order_id"), "AMZ1");

    let (status, held_by) = support::item_state(pool, seed.item_id).await;
    assert_eq!(status, "VERIFYING");
    assert_eq!(held_by, None);

    // The organizer confirms.
    let req = TestRequest::post()
        .uri(&format!("/api/donations/{donation_id}/verify"))
        .insert_header(bearer(&token_org))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["item"]["status"], "PURCHASED");

    let (status, _) = support::item_state(pool, seed.item_id).await;
    assert_eq!(status, "PURCHASED");

    // Terminal state: no further hold.
    let req = TestRequest::post()
        .uri(&format!("/api/wishlist/{}/hold", seed.item_id))
        .insert_header(bearer(&token_a))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "PURCHASED");
}

#[actix_web::test]
async fn submit_without_hold_rejected() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let seed = support::seed_wishlist(pool).await;
    let state = web::Data::new(support::build_state(pool.clone()));
    let app = donations_app!(state);

    let token_a = support::token_for(seed.donor_a, Role::Donator);
    let req = TestRequest::post()
        .uri("/api/donations")
        .insert_header(bearer(&token_a))
        .set_json(json!({ "itemId": seed.item_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    assert_eq!(donation_count(pool, seed.item_id).await, 0);
    let (status, _) = support::item_state(pool, seed.item_id).await;
    assert_eq!(status, "AVAILABLE");
}

#[actix_web::test]
async fn submit_with_expired_hold_rejected() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let seed = support::seed_wishlist(pool).await;
    let state = web::Data::new(support::build_state(pool.clone()));
    let app = donations_app!(state);

    holds::hold(pool, seed.item_id, seed.donor_a)
        .await
        .expect("donor A holds");
    support::backdate_hold(pool, seed.item_id, 1).await;

    let token_a = support::token_for(seed.donor_a, Role::Donator);
    let req = TestRequest::post()
        .uri("/api/donations")
        .insert_header(bearer(&token_a))
        .set_json(json!({ "itemId": seed.item_id, "orderId": "AMZ2" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(
        body["error"].as_str().expect("error string").contains("expired"),
        "error should mention the expired hold"
    );

    // The stale lease was cleared, nothing was written.
    assert_eq!(donation_count(pool, seed.item_id).await, 0);
    let (status, held_by) = support::item_state(pool, seed.item_id).await;
    assert_eq!(status, "AVAILABLE");
    assert_eq!(held_by, None);
}

#[actix_web::test]
async fn submit_by_non_holder_forbidden() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let seed = support::seed_wishlist(pool).await;
    let state = web::Data::new(support::build_state(pool.clone()));
    let app = donations_app!(state);

    holds::hold(pool, seed.item_id, seed.donor_a)
        .await
        .expect("donor A holds");

    let token_b = support::token_for(seed.donor_b, Role::Donator);
    let req = TestRequest::post()
        .uri("/api/donations")
        .insert_header(bearer(&token_b))
        .set_json(json!({ "itemId": seed.item_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    assert_eq!(donation_count(pool, seed.item_id).await, 0);
    let (status, held_by) = support::item_state(pool, seed.item_id).await;
    assert_eq!(status, "HELD");
    assert_eq!(held_by, Some(seed.donor_a));
}

#[actix_web::test]
async fn duplicate_submit_conflicts() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let seed = support::seed_wishlist(pool).await;
    let state = web::Data::new(support::build_state(pool.clone()));
    let app = donations_app!(state);

    holds::hold(pool, seed.item_id, seed.donor_a)
        .await
        .expect("donor A holds");

    let token_a = support::token_for(seed.donor_a, Role::Donator);
    let req = TestRequest::post()
        .uri("/api/donations")
        .insert_header(bearer(&token_a))
        .set_json(json!({ "itemId": seed.item_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = TestRequest::post()
        .uri("/api/donations")
        .insert_header(bearer(&token_a))
        .set_json(json!({ "itemId": seed.item_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "VERIFYING");

    assert_eq!(donation_count(pool, seed.item_id).await, 1);
}

#[actix_web::test]
async fn verify_checks_ownership_and_status() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let seed = support::seed_wishlist(pool).await;
    let state = web::Data::new(support::build_state(pool.clone()));
    let app = donations_app!(state);

    holds::hold(pool, seed.item_id, seed.donor_a)
        .await
        .expect("donor A holds");

    let token_a = support::token_for(seed.donor_a, Role::Donator);
    let req = TestRequest::post()
        .uri("/api/donations")
        .insert_header(bearer(&token_a))
        .set_json(json!({ "itemId": seed.item_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    let donation_id = body["donation"]["id"].as_i64().expect("donation id");

    // A donor may not verify at all.
    let req = TestRequest::post()
        .uri(&format!("/api/donations/{donation_id}/verify"))
        .insert_header(bearer(&token_a))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    // Nor may an organizer of a different orphanage.
    let stranger = support::insert_user(pool, Role::Organizer).await;
    let token_stranger = support::token_for(stranger, Role::Organizer);
    let req = TestRequest::post()
        .uri(&format!("/api/donations/{donation_id}/verify"))
        .insert_header(bearer(&token_stranger))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    let (status, _) = support::item_state(pool, seed.item_id).await;
    assert_eq!(status, "VERIFYING");

    // The owner verifies; a second verify reports the terminal status.
    let token_org = support::token_for(seed.organizer, Role::Organizer);
    let req = TestRequest::post()
        .uri(&format!("/api/donations/{donation_id}/verify"))
        .insert_header(bearer(&token_org))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = TestRequest::post()
        .uri(&format!("/api/donations/{donation_id}/verify"))
        .insert_header(bearer(&token_org))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "PURCHASED");
}

#[actix_web::test]
async fn verify_missing_donation_not_found() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let seed = support::seed_wishlist(pool).await;
    let state = web::Data::new(support::build_state(pool.clone()));
    let app = donations_app!(state);

    let token_org = support::token_for(seed.organizer, Role::Organizer);
    let req = TestRequest::post()
        .uri("/api/donations/999999/verify")
        .insert_header(bearer(&token_org))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn donation_listings_for_donor_and_organizer() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let seed = support::seed_wishlist(pool).await;
    let state = web::Data::new(support::build_state(pool.clone()));
    let app = donations_app!(state);

    holds::hold(pool, seed.item_id, seed.donor_a)
        .await
        .expect("donor A holds");

    let token_a = support::token_for(seed.donor_a, Role::Donator);
    let req = TestRequest::post()
        .uri("/api/donations")
        .insert_header(bearer(&token_a))
        .set_json(json!({ "itemId": seed.item_id, "orderId": "AMZ3" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = TestRequest::get()
        .uri("/api/donations/me")
        .insert_header(bearer(&token_a))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let mine = body.as_array().expect("array");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["orderId"], "AMZ3");
    assert_eq!(mine[0]["item"]["child"]["orphanage"]["id"], seed.orphanage_id);

    let token_org = support::token_for(seed.organizer, Role::Organizer);
    let req = TestRequest::get()
        .uri(&format!("/api/donations/orphanage/{}", seed.orphanage_id))
        .insert_header(bearer(&token_org))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().expect("array").len(), 1);

    // Organizers only see their own orphanage's donations.
    let stranger = support::insert_user(pool, Role::Organizer).await;
    let token_stranger = support::token_for(stranger, Role::Organizer);
    let req = TestRequest::get()
        .uri(&format!("/api/donations/orphanage/{}", seed.orphanage_id))
        .insert_header(bearer(&token_stranger))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}
