use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Bit-set over the seven weekdays. Sunday occupies bit 0, Saturday bit 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayMask(u8);

impl DayMask {
    pub const NONE: DayMask = DayMask(0);
    pub const EVERYDAY: DayMask = DayMask(0b0111_1111);
    pub const WEEKDAYS: DayMask = DayMask(0b0011_1110);
    pub const WEEKENDS: DayMask = DayMask(0b0100_0001);

    pub const MAX_BITS: u8 = 0b0111_1111;

    /// Accepts only values within the seven weekday bits.
    pub fn from_bits(bits: u8) -> Result<Self, String> {
        if bits > Self::MAX_BITS {
            return Err(format!("day mask {bits} is out of range 0..=127"));
        }
        Ok(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_on(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | Self::bit(day))
    }

    pub fn combine(masks: &[DayMask]) -> DayMask {
        DayMask(masks.iter().fold(0, |bits, mask| bits | mask.0))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_sunday()
    }
}
