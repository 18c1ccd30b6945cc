// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here sits behind jwt_auth_middleware, so handlers can take the
// caller as `Extension<Principal>`. School ownership is checked by the
// services, not the middleware.

pub mod auth;
pub mod school;
pub mod site;
pub mod theme;
pub mod upload;

pub use auth::whoami;
pub use school::{school_create, school_get};
pub use site::site_put;
pub use theme::{logo_post, theme_put, theme_recompute, update_and_check_contrast};
pub use upload::upload_post;
