pub mod api;
pub mod geo;
pub mod identity;
pub mod models;
