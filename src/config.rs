use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,

    /// Buffered change events per notification channel.
    pub notify_capacity: usize,

    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            notify_capacity: env::var("NOTIFY_CAPACITY")
                .unwrap_or_else(|_| "64".to_string())
                .parse()
                .unwrap(),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        }
    }
}
