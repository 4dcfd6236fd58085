pub mod config;
pub mod db;
pub mod files;
pub mod models;
pub mod sync;
pub mod ws;

use config::Config;

pub struct ClientState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
}
