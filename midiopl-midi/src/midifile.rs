use anyhow::{Result, anyhow};
use std::{collections::VecDeque, io::Read};

/// A standard MIDI file flattened into one time-ordered list of channel events.
#[derive(Debug)]
pub struct MidiFile {
    pub(crate) events: Vec<MidiEvent>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MidiEvent {
    pub(crate) time: f64,
    pub(crate) ch: midly::num::u4,
    pub(crate) msg: midly::MidiMessage,
}

#[derive(Debug)]
struct TempoChange {
    time: f64,
    us_per_beat: f64,
}

impl MidiFile {
    pub fn new<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = vec![];
        reader.read_to_end(&mut buf)?;
        Self::from_bytes(&buf)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let smf = midly::Smf::parse(buf)?;
        let ticks_per_beat = match smf.header.timing {
            midly::Timing::Metrical(tpb) => tpb.as_int() as f64,
            midly::Timing::Timecode(..) => return Err(anyhow!("Timecode is not supported")),
        };
        // Tempo changes live in the first track and apply to every other
        // track at the same absolute time.
        let mut tempo_changes: Vec<TempoChange> = vec![];
        let mut all_evts: Vec<VecDeque<MidiEvent>> = vec![];
        for track in smf.tracks {
            let first_track = all_evts.is_empty();
            let mut time = 0.0;
            let mut us_per_beat = 500_000.0;
            let mut tempo_idx = 0;
            let mut track_evts = VecDeque::new();
            for midly::TrackEvent { delta, kind } in track {
                if !first_track {
                    while tempo_idx < tempo_changes.len() && tempo_changes[tempo_idx].time <= time {
                        us_per_beat = tempo_changes[tempo_idx].us_per_beat;
                        tempo_idx += 1;
                    }
                }
                let delta_beats = delta.as_int() as f64 / ticks_per_beat;
                time += delta_beats * us_per_beat / 1_000_000.0;
                match kind {
                    midly::TrackEventKind::Meta(midly::MetaMessage::Tempo(tempo)) if first_track => {
                        us_per_beat = tempo.as_int() as f64;
                        tempo_changes.push(TempoChange { time, us_per_beat });
                    }
                    midly::TrackEventKind::Midi { channel, message } => {
                        track_evts.push_back(MidiEvent {
                            time,
                            ch: channel,
                            msg: message,
                        });
                    }
                    _ => {}
                }
            }
            all_evts.push(track_evts);
        }

        // Merge the tracks, taking the earliest pending event each time.
        // Ties keep track order.
        let mut events = vec![];
        while let Some(which) = all_evts
            .iter()
            .enumerate()
            .filter_map(|(i, evts)| evts.front().map(|evt| (i, evt.time)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
        {
            events.extend(all_evts[which].pop_front());
        }

        Ok(Self { events })
    }

    /// Get the length of the MIDI file in seconds.
    pub fn get_length(&self) -> f64 {
        self.events.last().map_or(0.0, |evt| evt.time)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
