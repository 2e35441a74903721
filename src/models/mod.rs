pub mod booking;
pub mod hours;
pub mod user;

pub use booking::{Booking, BookingStatus, Decision};
pub use hours::OpeningHours;
pub use user::{Caller, Role, User};
