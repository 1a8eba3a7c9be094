pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod logging;
pub mod relay;
pub mod retention;
pub mod sensors;
pub mod shutdown;
