//! Request handlers: auth flows, gallery operations and the HTTP routes

pub mod auth;
pub mod gallery;
pub mod routes;

pub use auth::AuthService;
pub use gallery::GalleryService;
pub use routes::{routes, AppState};
