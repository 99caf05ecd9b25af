pub mod auth;
pub mod constants;
pub mod dispatcher;
pub mod health;
pub mod ingress;
pub mod logging;
pub mod main_helper;
pub mod redaction_layer;
pub mod routes;
pub mod server;
pub mod str_utils;
pub mod types;
pub mod upstream;

pub use types::*;

pub use main_helper::{AppState, Args};
