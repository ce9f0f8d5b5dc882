pub mod api;
pub mod config;
pub mod models;
pub mod reduce;
pub mod storage;
