mod driver;
mod driver_settings;
mod midifile;
mod midifile_sequencer;

pub use self::driver::{Driver, DriverStats, VoiceSink};
pub use self::driver_settings::{DriverError, DriverSettings};
pub use self::midifile::MidiFile;
pub use self::midifile_sequencer::MidiFileSequencer;

use midly::{MidiMessage, num::u4};

/// Feeds parsed MIDI channel messages into a voice driver.
pub trait MidiAdapter {
    fn process_midi_message(&mut self, channel: u4, msg: MidiMessage);
}

impl<S: VoiceSink> MidiAdapter for Driver<S> {
    fn process_midi_message(&mut self, channel: u4, msg: MidiMessage) {
        let channel = channel.as_int();

        match msg {
            MidiMessage::NoteOff { key, .. } => self.note_off(channel, key.as_int()),
            MidiMessage::NoteOn { key, vel } => self.note_on(channel, key.as_int(), vel.as_int()),
            MidiMessage::Controller { controller, .. } => match controller.as_int() {
                // All sound off, all notes off.
                0x78 | 0x7B => self.note_off_all_channel(channel),
                _ => (),
            },
            _ => (),
        }
    }
}
