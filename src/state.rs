use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::OpeningHours;
use crate::services::notify::NotificationSink;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub hours: OpeningHours,
    pub notifier: Box<dyn NotificationSink>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig, notifier: Box<dyn NotificationSink>) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            hours: config.opening_hours(),
            config,
            notifier,
        }
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database lock poisoned")))
    }
}
