use std::env;

use chrono::{FixedOffset, Offset, Utc};

use crate::models::OpeningHours;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub token_secret: String,
    pub opening_hour: u32,
    pub closing_hour: u32,
    pub slot_minutes: u32,
    pub utc_offset_minutes: i32,
    pub push_api_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "gymbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            token_secret: env::var("TOKEN_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            opening_hour: parse_var("GYM_OPENING_HOUR", 8),
            closing_hour: parse_var("GYM_CLOSING_HOUR", 22),
            slot_minutes: parse_var("SLOT_MINUTES", 60),
            utc_offset_minutes: parse_var("GYM_UTC_OFFSET_MINUTES", 0),
            push_api_url: env::var("PUSH_API_URL")
                .unwrap_or_else(|_| "https://exp.host/--/api/v2/push/send".to_string()),
        }
    }

    pub fn opening_hours(&self) -> OpeningHours {
        match OpeningHours::new(self.opening_hour, self.closing_hour, self.slot_minutes) {
            Ok(hours) => hours,
            Err(e) => {
                tracing::warn!(error = %e, "invalid opening hours configured, using defaults");
                OpeningHours::default()
            }
        }
    }

    /// Operational timezone of the gym.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| {
            tracing::warn!(
                offset = self.utc_offset_minutes,
                "invalid UTC offset configured, using UTC"
            );
            Utc.fix()
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
