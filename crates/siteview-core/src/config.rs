#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// DuckDB size string such as `"1GB"` or `"512MB"`.
    pub duckdb_memory_limit: String,
    pub auth_mode: AuthMode,
    /// Allowed CORS origins for the query endpoints. Empty means any origin.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthMode {
    None,
    /// Holds the HMAC secret read from `SITEVIEW_JWT_SECRET`.
    Jwt(String),
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("SITEVIEW_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("SITEVIEW_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("SITEVIEW_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            auth_mode: {
                let raw = std::env::var("SITEVIEW_AUTH").unwrap_or_else(|_| "jwt".to_string());
                match raw.as_str() {
                    "none" => AuthMode::None,
                    _ => {
                        let secret = std::env::var("SITEVIEW_JWT_SECRET").map_err(|_| {
                            "SITEVIEW_JWT_SECRET required when AUTH=jwt".to_string()
                        })?;
                        if secret.is_empty() {
                            return Err("SITEVIEW_JWT_SECRET must not be empty".to_string());
                        }
                        AuthMode::Jwt(secret)
                    }
                }
            },
            cors_origins: std::env::var("SITEVIEW_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn db_path(&self) -> String {
        format!("{}/siteview.db", self.data_dir)
    }
}
