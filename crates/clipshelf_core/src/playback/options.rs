use super::{PlaybackError, PlaybackResult};

pub const DEFAULT_SPEED: f32 = 1.0;
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Per-call playback transforms.
///
/// Defaults: `speed = 1.0`, `volume = 1.0`, `reverse = false`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    /// Playback rate multiplier. Changes tempo and pitch together.
    pub speed: f32,
    /// Linear gain multiplier.
    pub volume: f32,
    /// Play samples back to front.
    pub reverse: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            volume: DEFAULT_VOLUME,
            reverse: false,
        }
    }
}

impl PlaybackOptions {
    /// Builds options from optional overrides, filling defaults.
    pub fn from_overrides(speed: Option<f32>, volume: Option<f32>, reverse: bool) -> Self {
        Self {
            speed: speed.unwrap_or(DEFAULT_SPEED),
            volume: volume.unwrap_or(DEFAULT_VOLUME),
            reverse,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Rejects non-finite values, non-positive speed and negative volume.
    pub fn validate(&self) -> PlaybackResult<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(PlaybackError::InvalidOptions(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(PlaybackError::InvalidOptions(format!(
                "volume must be zero or greater, got {}",
                self.volume
            )));
        }
        Ok(())
    }
}
