pub mod auth_client;
pub mod config;
pub mod error;
pub mod failure;
pub mod http;
pub mod logging;
pub mod navigator;
pub mod resource_client;
