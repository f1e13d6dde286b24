use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::wishlist::list_items,
        crate::api::wishlist::held_by_me,
        crate::api::wishlist::hold_item,
        crate::api::wishlist::release_item,
        crate::api::wishlist::cancel_hold,
        crate::api::donations::submit_donation,
        crate::api::donations::verify_donation
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::donations::CreateDonationRequest,
            crate::models::ItemStatus,
            crate::models::Role,
            crate::models::WishlistItem,
            crate::models::Donation
        )
    ),
    tags(
        (name = "auth", description = "Authentication"),
        (name = "wishlist", description = "Wishlist items and holds"),
        (name = "donations", description = "Donation submission and verification")
    )
)]
pub struct ApiDoc;
