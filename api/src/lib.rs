pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod realtime;
pub mod routes;
pub mod store;

use config::AppConfig;
use realtime::Hub;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: db::Db,
    pub config: AppConfig,
    pub hub: Hub,
}
