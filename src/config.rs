use std::env;

#[derive(Debug, Clone)]
pub struct Features {
    /// Whether permanent photo deletion is allowed.
    pub delete: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub db_path: String,
    pub originals_path: String,
    /// API token expected in the Authorization header. Empty string means
    /// single-user mode: every caller acts as the seeded admin.
    pub api_token: String,
    pub read_only: bool,
    pub features: Features,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            port: env::var("FOTOVAULT_PORT")
                .unwrap_or_else(|_| "18392".to_string())
                .parse()?,
            host: env::var("FOTOVAULT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            db_path: env::var("FOTOVAULT_DB_PATH")
                .unwrap_or_else(|_| "./data/database/fotovault.db".to_string()),
            originals_path: env::var("FOTOVAULT_ORIGINALS_PATH")
                .unwrap_or_else(|_| "./originals".to_string()),
            api_token: env::var("FOTOVAULT_API_TOKEN").unwrap_or_default(),
            read_only: env::var("FOTOVAULT_READ_ONLY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            features: Features {
                delete: env::var("FOTOVAULT_FEATURE_DELETE")
                    .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                    .unwrap_or(true),
            },
        })
    }

    /// Permanent deletion requires the feature flag and a writable store.
    pub fn delete_allowed(&self) -> bool {
        self.features.delete && !self.read_only
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            port: 0,
            host: "127.0.0.1".to_string(),
            db_path: ":memory:".to_string(),
            originals_path: "./originals".to_string(),
            api_token: String::new(),
            read_only: false,
            features: Features { delete: true },
        }
    }
}
