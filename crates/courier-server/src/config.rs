use anyhow::Result;

/// Runtime configuration, read once at startup and handed down
/// explicitly — nothing below the binary touches the environment.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("COURIER_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()?,
            db_path: std::env::var("COURIER_DB_PATH").unwrap_or_else(|_| "courier.db".into()),
            jwt_secret: std::env::var("COURIER_JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".into()),
        })
    }
}
