//! Runtime configuration read from the environment.

use std::path::PathBuf;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8001";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedConfig {
    /// Socket address the API binds to.
    pub listen: String,
    /// SQLite file; `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    /// Seed demo users and business units when those collections are empty.
    pub seed_demo_data: bool,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            db_path: None,
            seed_demo_data: true,
        }
    }
}

impl LedConfig {
    /// Read `LED_LISTEN`, `LED_DB_PATH` and `LED_SEED_DEMO`; unset variables keep defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let listen = lookup("LED_LISTEN")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.listen);
        let db_path = lookup("LED_DB_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let seed_demo_data = lookup("LED_SEED_DEMO")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.seed_demo_data);
        Self {
            listen,
            db_path,
            seed_demo_data,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
