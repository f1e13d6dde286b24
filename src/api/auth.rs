// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{get, post, web, Error, HttpMessage, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::errors::ApiError;
use crate::models::Role;
use crate::{db, AppState};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i32,
    role: String,
    exp: usize,
}

/// Authenticated caller, injected into request extensions by the JWT
/// middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

pub fn require_role(user: &AuthUser, role: Role) -> Result<(), ApiError> {
    if user.role == role {
        Ok(())
    } else {
        Err(ApiError::forbidden(&format!(
            "This action requires the {} role",
            role.as_str()
        )))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map_or(false, |db_err| db_err.is_unique_violation())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered, token returned"),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') || !email.contains('.') {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    let display_name = payload.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(ApiError::bad_request("displayName must not be empty"));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }
    if payload.role == Role::Admin {
        return Err(ApiError::bad_request("Role must be DONATOR or ORGANIZER"));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)?;

    let user_id =
        match db::insert_user(&state.pool, &email, &display_name, &password_hash, payload.role)
            .await
        {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                return Err(ApiError::Conflict(
                    "User with this email already exists".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

    let token = generate_jwt(&state.jwt_secret, user_id, payload.role)?;

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "token": token,
        "user": {
            "id": user_id,
            "email": email,
            "displayName": display_name,
            "role": payload.role,
        }
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token returned"),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "auth"
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let Some(creds) = db::get_credentials(&state.pool, &email).await? else {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    };

    if !verify(&payload.password, &creds.password_hash)? {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let token = generate_jwt(&state.jwt_secret, creds.user_id, creds.role)?;

    let user = db::get_user(&state.pool, creds.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Login successful",
        "token": token,
        "user": user,
    })))
}

/// Current user with their orphanage, if they organize one.
#[get("/auth/me")]
pub async fn me(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let profile = db::get_user(&state.pool, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let orphanage = db::get_orphanage_by_organizer(&state.pool, user.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "id": profile.id,
        "email": profile.email,
        "displayName": profile.display_name,
        "role": profile.role,
        "orphanage": orphanage,
    })))
}

pub fn generate_jwt(
    secret: &str,
    user_id: i32,
    role: Role,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (Utc::now() + Duration::days(7)).timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        role: role.as_str().to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

/// Middleware that:
/// - takes `Authorization: Bearer <jwt>`
/// - validates the JWT
/// - puts an `AuthUser` into `req.extensions_mut()`
pub struct JwtMiddleware {
    secret: String,
}

impl JwtMiddleware {
    pub fn new(secret: impl Into<String>) -> Self {
        JwtMiddleware {
            secret: secret.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner {
            service,
            secret: self.secret.clone(),
        }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
    secret: String,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth_header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            match decode::<Claims>(
                token,
                &DecodingKey::from_secret(self.secret.as_ref()),
                &Validation::default(),
            ) {
                Ok(token_data) => {
                    let Some(role) = Role::parse(&token_data.claims.role) else {
                        return Box::pin(async move {
                            Err(actix_web::error::ErrorUnauthorized("Invalid token"))
                        });
                    };
                    req.extensions_mut().insert(AuthUser {
                        id: token_data.claims.sub,
                        role,
                    });
                    let fut = self.service.call(req);
                    return Box::pin(async move { fut.await });
                }
                Err(_) => {
                    return Box::pin(async move {
                        Err(actix_web::error::ErrorUnauthorized("Invalid token"))
                    })
                }
            }
        }

        Box::pin(async move {
            Err(actix_web::error::ErrorUnauthorized(
                "Missing or invalid Authorization header",
            ))
        })
    }
}
