use crate::driver_settings::{DriverError, DriverSettings};
use log::debug;
use midiopl::{AllocationKind, VoiceAllocator, velocity};

/// Receives voice-level commands from the driver.
///
/// Implementations translate these into chip register writes.
pub trait VoiceSink {
    fn key_on(&mut self, voice: usize, key: u8, attenuation: u8);
    fn key_off(&mut self, voice: usize);
}

/// Counters collected while the driver runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    pub notes_on: usize,
    pub notes_off: usize,
    pub stray_notes_off: usize,
    pub steals: usize,
    pub peak_voices: usize,
}

/// Routes MIDI notes to chip voices through a [`VoiceAllocator`].
#[derive(Debug)]
pub struct Driver<S> {
    allocator: VoiceAllocator,
    sink: S,
    velocity_sensitive: bool,
    stats: DriverStats,
}

impl<S: VoiceSink> Driver<S> {
    /// Initializes a new driver.
    ///
    /// # Arguments
    ///
    /// * `settings` - The voice count and level behavior.
    /// * `sink` - The receiver of key-on and key-off commands.
    pub fn new(settings: &DriverSettings, sink: S) -> Result<Self, DriverError> {
        settings.validate()?;

        Ok(Self {
            allocator: VoiceAllocator::new(settings.voice_count)?,
            sink,
            velocity_sensitive: settings.velocity_sensitive,
            stats: DriverStats::default(),
        })
    }

    pub fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(channel, key);
            return;
        }

        let allocation = self.allocator.allocate_detailed(note_id(channel, key));
        match allocation.kind {
            AllocationKind::Idle => {}
            AllocationKind::Retrigger => self.sink.key_off(allocation.voice),
            AllocationKind::Steal { previous } => {
                debug!(
                    "channel {channel} key {key} took voice {} from note {previous:#x}",
                    allocation.voice
                );
                self.stats.steals += 1;
                self.sink.key_off(allocation.voice);
            }
        }

        let attenuation = if self.velocity_sensitive {
            velocity::attenuation(velocity)
        } else {
            0
        };
        self.sink.key_on(allocation.voice, key, attenuation);

        self.stats.notes_on += 1;
        self.stats.peak_voices = self.stats.peak_voices.max(self.allocator.active_count());
    }

    pub fn note_off(&mut self, channel: u8, key: u8) {
        match self.allocator.release(note_id(channel, key)) {
            Some(voice) => {
                self.sink.key_off(voice);
                self.stats.notes_off += 1;
            }
            None => {
                debug!("ignoring note off for channel {channel} key {key} with no voice");
                self.stats.stray_notes_off += 1;
            }
        }
    }

    /// Keys off every sounding voice and frees the whole pool.
    pub fn note_off_all(&mut self) {
        for voice in 0..self.allocator.voice_count() {
            if self.allocator.playing(voice) {
                self.sink.key_off(voice);
            }
        }
        self.allocator.release_all();
    }

    /// Keys off and frees the voices sounding notes on one channel.
    pub fn note_off_all_channel(&mut self, channel: u8) {
        let channel = channel as i32 & 0x0F;
        for voice in 0..self.allocator.voice_count() {
            if let Some(note) = self.allocator.note(voice) {
                if note >> 7 == channel {
                    self.sink.key_off(voice);
                    self.allocator.release(note);
                }
            }
        }
    }

    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

// MIDI keys are 7 bits, so the channel sits above them.
fn note_id(channel: u8, key: u8) -> i32 {
    ((channel as i32 & 0x0F) << 7) | (key as i32 & 0x7F)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Command {
        On { voice: usize, key: u8, attenuation: u8 },
        Off { voice: usize },
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink(pub Vec<Command>);

    impl VoiceSink for RecordingSink {
        fn key_on(&mut self, voice: usize, key: u8, attenuation: u8) {
            self.0.push(Command::On {
                voice,
                key,
                attenuation,
            });
        }

        fn key_off(&mut self, voice: usize) {
            self.0.push(Command::Off { voice });
        }
    }

    fn driver(voice_count: usize) -> Driver<RecordingSink> {
        let settings = DriverSettings {
            voice_count,
            velocity_sensitive: false,
        };
        Driver::new(&settings, RecordingSink::default()).unwrap()
    }

    #[test]
    fn invalid_settings_fail() {
        let settings = DriverSettings {
            voice_count: 0,
            velocity_sensitive: true,
        };
        assert!(matches!(
            Driver::new(&settings, RecordingSink::default()),
            Err(DriverError::VoiceCountOutOfRange(0))
        ));
    }

    #[test]
    fn same_key_on_different_channels_uses_two_voices() {
        let mut driver = driver(4);
        driver.note_on(0, 60, 100);
        driver.note_on(1, 60, 100);

        assert_eq!(driver.allocator().active_count(), 2);
        assert_eq!(
            driver.sink().0,
            vec![
                Command::On { voice: 0, key: 60, attenuation: 0 },
                Command::On { voice: 1, key: 60, attenuation: 0 },
            ]
        );
    }

    #[test]
    fn zero_velocity_is_note_off() {
        let mut driver = driver(2);
        driver.note_on(0, 60, 100);
        driver.note_on(0, 60, 0);

        assert_eq!(driver.allocator().active_count(), 0);
        assert_eq!(driver.sink().0.last(), Some(&Command::Off { voice: 0 }));
    }

    #[test]
    fn steal_keys_off_before_key_on() {
        let mut driver = driver(2);
        driver.note_on(0, 60, 100);
        driver.note_on(0, 62, 100);
        driver.note_on(0, 64, 100);

        assert_eq!(driver.stats().steals, 1);
        assert_eq!(
            driver.sink().0[2..],
            [
                Command::Off { voice: 0 },
                Command::On { voice: 0, key: 64, attenuation: 0 },
            ]
        );
    }

    #[test]
    fn retrigger_restarts_the_voice() {
        let mut driver = driver(2);
        driver.note_on(0, 60, 100);
        driver.note_on(0, 60, 100);

        assert_eq!(driver.stats().steals, 0);
        assert_eq!(driver.allocator().active_count(), 1);
        assert_eq!(driver.sink().0[1], Command::Off { voice: 0 });
    }

    #[test]
    fn stray_note_off_is_ignored() {
        let mut driver = driver(2);
        driver.note_off(0, 60);

        assert!(driver.sink().0.is_empty());
        assert_eq!(driver.stats().stray_notes_off, 1);
    }

    #[test]
    fn note_off_all_only_keys_off_playing_voices() {
        let mut driver = driver(3);
        driver.note_on(0, 60, 100);
        driver.note_on(0, 62, 100);
        driver.note_off(0, 60);
        driver.sink.0.clear();

        driver.note_off_all();
        assert_eq!(driver.sink().0, vec![Command::Off { voice: 1 }]);
        assert_eq!(driver.allocator().active_count(), 0);
    }

    #[test]
    fn note_off_all_channel_spares_other_channels() {
        let mut driver = driver(4);
        driver.note_on(0, 60, 100);
        driver.note_on(1, 64, 100);
        driver.note_on(1, 67, 100);
        driver.sink.0.clear();

        driver.note_off_all_channel(1);
        assert_eq!(
            driver.sink().0,
            vec![Command::Off { voice: 1 }, Command::Off { voice: 2 }]
        );
        assert!(driver.allocator().playing(0));
        assert_eq!(driver.allocator().active_count(), 1);
    }

    #[test]
    fn velocity_sets_attenuation() {
        let settings = DriverSettings::new();
        let mut driver = Driver::new(&settings, RecordingSink::default()).unwrap();
        driver.note_on(0, 60, 127);
        driver.note_on(0, 62, 1);

        assert_eq!(
            driver.sink().0,
            vec![
                Command::On { voice: 0, key: 60, attenuation: 0 },
                Command::On { voice: 1, key: 62, attenuation: velocity::attenuation(1) },
            ]
        );
    }
}
