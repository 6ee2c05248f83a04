//! Environment-backed configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub payment: PaymentConfig,
    pub identity: IdentityConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let payment = PaymentConfig {
            key_id: std::env::var("PAYMENT_KEY_ID")?,
            key_secret: std::env::var("PAYMENT_KEY_SECRET")?,
            webhook_secret: std::env::var("PAYMENT_WEBHOOK_SECRET")?,
            api_url: std::env::var("PAYMENT_API_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com".into()),
        };
        let identity = IdentityConfig {
            jwt_secret: std::env::var("IDENTITY_JWT_SECRET")?,
            issuer: std::env::var("IDENTITY_ISSUER").unwrap_or_else(|_| "identity".into()),
            api_url: std::env::var("IDENTITY_API_URL")
                .unwrap_or_else(|_| "https://api.identity.example.com".into()),
            api_key: std::env::var("IDENTITY_API_KEY").unwrap_or_default(),
        };
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8083),
            payment,
            identity,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
