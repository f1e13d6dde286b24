// src/main.rs
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use giftbridge::{api, docs, AppState};

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET required");
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let state = web::Data::new(AppState {
        pool,
        jwt_secret: jwt_secret.clone(),
    });

    log::info!("listening on 0.0.0.0:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Public routes
            .service(api::auth::register)
            .service(api::auth::login)
            .service(api::wishlist::list_items)
            .service(api::orphanages::list_orphanages)
            .service(api::orphanages::get_orphanage)
            .service(api::children::children_for_orphanage)
            // Protected routes
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware::new(jwt_secret.clone()))
                    .service(api::auth::me)
                    .service(api::wishlist::held_by_me)
                    .service(api::wishlist::hold_item)
                    .service(api::wishlist::release_item)
                    .service(api::wishlist::cancel_hold)
                    .service(api::donations::submit_donation)
                    .service(api::donations::my_donations)
                    .service(api::donations::orphanage_donations)
                    .service(api::donations::verify_donation)
                    .service(api::orphanages::create_orphanage)
                    .service(api::children::create_child)
                    .service(api::children::delete_child),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
