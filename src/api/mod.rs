pub mod auth;
pub mod children;
pub mod donations;
pub mod orphanages;
pub mod wishlist;
