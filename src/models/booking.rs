use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub member_id: String,
    /// `None` means self-practice.
    pub trainer_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_self_practice(&self) -> bool {
        self.trainer_id.is_none()
    }

    pub fn is_bound_to(&self, trainer_id: &str) -> bool {
        self.trainer_id.as_deref() == Some(trainer_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Cancelled,
}

/// A bound trainer's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "approved" => Some(BookingStatus::Approved),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Status after a trainer decision, or `None` when the booking is no
    /// longer awaiting one.
    pub fn decide(self, decision: Decision) -> Option<BookingStatus> {
        match (self, decision) {
            (BookingStatus::Pending, Decision::Approve) => Some(BookingStatus::Approved),
            (BookingStatus::Pending, Decision::Reject) => Some(BookingStatus::Cancelled),
            (BookingStatus::Approved, _) | (BookingStatus::Cancelled, _) => None,
        }
    }

    /// Status after the owning member withdraws the booking.
    pub fn withdraw(self) -> Option<BookingStatus> {
        match self {
            BookingStatus::Pending | BookingStatus::Approved => Some(BookingStatus::Cancelled),
            BookingStatus::Cancelled => None,
        }
    }
}

impl Decision {
    pub fn past_tense(&self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }
}
