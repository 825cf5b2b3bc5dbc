//! HTTP server surface: routes, handlers, injection script

pub mod handlers;
pub mod inject;
pub mod routes;

pub use inject::injection_script;
pub use routes::create_router;
