// Application configuration, loaded with the 'config' crate and 'dotenv'

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Base URL of the marketplace backend, e.g. "https://api.example.com"
    pub backend_url: String,
    pub server_address: String,
    /// Where the bearer token lives between runs (device-storage analogue)
    pub credentials_file: String,
    /// Quiet period before a keyword change triggers a search, in milliseconds
    pub search_debounce_ms: u64,
    pub request_timeout_secs: u64,
    /// Root category id the backend uses for the vehicles domain; drives
    /// which attribute schema applies
    pub vehicles_category_id: i64,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            // Add default values
            .set_default("backend_url", "http://127.0.0.1:5140")?
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("credentials_file", "credentials.json")?
            .set_default("search_debounce_ms", 400)?
            .set_default("request_timeout_secs", 15)?
            .set_default("vehicles_category_id", 2)?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_BACKEND_URL)
            .add_source(Environment::with_prefix("APP").separator("_"));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
