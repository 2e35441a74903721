use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Fixed daily opening hours of the gym, in operational local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    opening_minute: u32,
    closing_minute: u32,
    slot_minutes: u32,
}

impl Default for OpeningHours {
    fn default() -> Self {
        Self {
            opening_minute: 8 * 60,
            closing_minute: 22 * 60,
            slot_minutes: 60,
        }
    }
}

impl OpeningHours {
    pub fn new(opening_hour: u32, closing_hour: u32, slot_minutes: u32) -> anyhow::Result<Self> {
        if closing_hour > 24 {
            return Err(anyhow::anyhow!("closing hour out of range: {closing_hour}"));
        }
        if opening_hour >= closing_hour {
            return Err(anyhow::anyhow!(
                "opening hour {opening_hour} must be before closing hour {closing_hour}"
            ));
        }
        if slot_minutes == 0 || slot_minutes > MINUTES_PER_DAY {
            return Err(anyhow::anyhow!("invalid slot granularity: {slot_minutes}"));
        }
        Ok(Self {
            opening_minute: opening_hour * 60,
            closing_minute: closing_hour * 60,
            slot_minutes,
        })
    }

    /// Candidate slot starts for `date`, ascending. A slot is offered when it
    /// starts before closing time, even if it runs past it.
    pub fn slots_for(&self, date: NaiveDate) -> Vec<NaiveDateTime> {
        (self.opening_minute..self.closing_minute)
            .step_by(self.slot_minutes as usize)
            .filter_map(|minute| NaiveTime::from_hms_opt(minute / 60, minute % 60, 0))
            .map(|time| date.and_time(time))
            .collect()
    }
}
