//! Level mapping
//!
//! Converts between the dB level scale used by the test procedure and the
//! linear gain sent to the output. The offset is a rough heuristic for
//! consumer playback hardware, not a physical calibration.

use crate::config::level::GAIN_OFFSET_DB;

/// dB level <-> linear gain conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelMapper {
    offset_db: f32,
}

impl Default for LevelMapper {
    fn default() -> Self {
        Self::new(GAIN_OFFSET_DB)
    }
}

impl LevelMapper {
    pub fn new(offset_db: f32) -> Self {
        Self { offset_db }
    }

    pub fn offset_db(&self) -> f32 {
        self.offset_db
    }

    /// `10^((level + offset) / 20)`, clamped to 0.0..=1.0
    pub fn to_gain(&self, level_db: i32) -> f32 {
        let gain = 10f32.powf((level_db as f32 + self.offset_db) / 20.0);
        if gain.is_finite() {
            gain.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Inverse of [`to_gain`](Self::to_gain). Returns `None` for non-positive gain.
    pub fn to_level(&self, gain: f32) -> Option<f32> {
        if gain <= 0.0 || !gain.is_finite() {
            return None;
        }
        Some(20.0 * gain.log10() - self.offset_db)
    }
}
