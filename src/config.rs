use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub client_urls: Vec<String>,
    pub max_body_size: usize,
    pub cookie_secure: bool,
    pub log_level: String,
    pub cloudinary: Option<CloudinaryConfig>,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid HOST: {e}"))?;

        let port: u16 = env_or("PORT", "5001")
            .parse()
            .map_err(|e| format!("Invalid PORT: {e}"))?;

        let client_urls = split_list(&env_or("CLIENT_URLS", "http://localhost:5173"));

        let max_body_size: usize = env_or("MAX_BODY_SIZE", "26214400")
            .parse()
            .map_err(|e| format!("Invalid MAX_BODY_SIZE: {e}"))?;

        let cookie_secure = parse_bool(&env_or("COOKIE_SECURE", "false"))
            .ok_or_else(|| "Invalid COOKIE_SECURE: expected true or false".to_string())?;

        let log_level = env_or("LOG_LEVEL", "info");

        let cloudinary = match (
            std::env::var("CLOUDINARY_CLOUD_NAME").ok(),
            std::env::var("CLOUDINARY_API_KEY").ok(),
            std::env::var("CLOUDINARY_API_SECRET").ok(),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            client_urls,
            max_body_size,
            cookie_secure,
            log_level,
            cloudinary,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Comma-separated list; blanks and trailing slashes are dropped so entries
/// compare equal to browser `Origin` headers.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
