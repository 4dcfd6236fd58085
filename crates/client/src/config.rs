use std::env;

#[derive(Clone)]
pub struct Config {
    pub ws_url: String,
    pub upload_url: String,
    pub upload_fallback_url: Option<String>,
    pub database_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            ws_url: env::var("AULA_WS_URL")
                .unwrap_or_else(|_| "ws://localhost:3001/ws".into()),
            upload_url: env::var("AULA_UPLOAD_URL")
                .unwrap_or_else(|_| "http://localhost:3001/api/upload".into()),
            upload_fallback_url: env::var("AULA_UPLOAD_FALLBACK_URL").ok(),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./aula.db".into()),
        }
    }
}
