pub mod auth;
pub mod availability;
pub mod directory;
pub mod lifecycle;
pub mod listing;
pub mod notify;
