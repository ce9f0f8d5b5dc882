//! JSON HTTP surface: beacon ingest and per-site reports

pub mod handlers;
pub mod routes;

pub use routes::create_api_router;
