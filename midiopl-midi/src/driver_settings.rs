use midiopl::AllocatorError;
use thiserror::Error;

/// Represents an error when initializing a driver.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("the number of voices must be between 1 and 18, but was {0}")]
    VoiceCountOutOfRange(usize),
    // Not produced once the voice count validates; lets `Driver::new` use `?`.
    #[error(transparent)]
    Allocator(#[from] AllocatorError),
}

/// Specifies a set of parameters for the driver.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// The number of chip voice channels.
    pub voice_count: usize,
    /// The value indicating whether note velocity controls the level.
    pub velocity_sensitive: bool,
}

impl DriverSettings {
    // OPL2 has nine melodic channels, OPL3 has eighteen.
    const DEFAULT_VOICE_COUNT: usize = 9;
    const MAXIMUM_VOICE_COUNT: usize = 18;
    const DEFAULT_VELOCITY_SENSITIVE: bool = true;

    pub fn new() -> Self {
        Self {
            voice_count: DriverSettings::DEFAULT_VOICE_COUNT,
            velocity_sensitive: DriverSettings::DEFAULT_VELOCITY_SENSITIVE,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), DriverError> {
        DriverSettings::check_voice_count(self.voice_count)?;

        Ok(())
    }

    fn check_voice_count(value: usize) -> Result<(), DriverError> {
        if !(1..=DriverSettings::MAXIMUM_VOICE_COUNT).contains(&value) {
            return Err(DriverError::VoiceCountOutOfRange(value));
        }

        Ok(())
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::new()
    }
}
