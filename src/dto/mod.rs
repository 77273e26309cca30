pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod wishlist;
