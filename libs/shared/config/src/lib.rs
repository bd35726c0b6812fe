use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub standard_session_rate: Decimal,
    pub conflict_tolerance_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            standard_session_rate: env::var("STANDARD_SESSION_RATE")
                .ok()
                .and_then(|v| v.parse::<Decimal>().ok())
                .unwrap_or_else(|| {
                    warn!("STANDARD_SESSION_RATE not set or invalid, using 1200.00");
                    dec!(1200.00)
                }),
            conflict_tolerance_minutes: env::var("CONFLICT_TOLERANCE_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or_else(|| {
                    warn!("CONFLICT_TOLERANCE_MINUTES not set or invalid, using 30");
                    30
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}
