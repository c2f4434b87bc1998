use crate::MidiAdapter;
use crate::driver::{Driver, VoiceSink};
use crate::midifile::{MidiEvent, MidiFile};

/// Plays a MIDI file into a driver as playback time advances.
pub struct MidiFileSequencer<S> {
    driver: Driver<S>,
    midi_file: MidiFile,
    current_time: f64,
    msg_index: usize,
}

impl<S: VoiceSink> MidiFileSequencer<S> {
    pub fn new(mut driver: Driver<S>, midi_file: MidiFile) -> Self {
        driver.note_off_all();
        Self {
            driver,
            midi_file,
            current_time: 0.0,
            msg_index: 0,
        }
    }

    /// Silences every voice. Playback can continue with [`advance`](Self::advance).
    pub fn stop(&mut self) {
        self.driver.note_off_all();
    }

    /// Moves the playback position forward and dispatches every event due by then.
    ///
    /// Returns the number of events dispatched.
    pub fn advance(&mut self, seconds: f64) -> usize {
        self.current_time += seconds;
        self.process_events()
    }

    fn process_events(&mut self) -> usize {
        let start = self.msg_index;
        while let Some(&MidiEvent { time, ch, msg }) = self.midi_file.events.get(self.msg_index) {
            if time > self.current_time {
                break;
            }
            self.driver.process_midi_message(ch, msg);
            self.msg_index += 1;
        }
        self.msg_index - start
    }

    /// Gets the current playback position in seconds.
    pub fn get_position(&self) -> f64 {
        self.current_time
    }

    pub fn end_of_sequence(&self) -> bool {
        self.msg_index == self.midi_file.events.len()
    }

    pub fn driver(&self) -> &Driver<S> {
        &self.driver
    }

    pub fn into_driver(self) -> Driver<S> {
        self.driver
    }
}
