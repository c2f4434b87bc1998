use log::{debug, trace};
use thiserror::Error;

/// The reserved note value that marks a voice as idle.
///
/// Callers must never pass it to [`VoiceAllocator::allocate`] as a real note.
pub const IDLE: i32 = -1;

/// Represents an error when initializing a voice allocator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocatorError {
    #[error("the number of voices must be greater than zero")]
    NoVoices,
}

/// Describes which rule picked the voice for a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationKind {
    /// The note was already sounding on this voice.
    Retrigger,
    /// The voice was idle.
    Idle,
    /// The voice was taken from another note.
    Steal { previous: i32 },
}

/// The result of a detailed allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub voice: usize,
    pub kind: AllocationKind,
}

#[derive(Debug, Default, Clone, Copy)]
struct VoiceSlot {
    note: Option<i32>,
    recency: u32,
}

/// Assigns a fixed pool of hardware voice channels to incoming notes.
///
/// Every mutation stamps the touched slot with a logical clock value, so
/// the least recently touched slot is always the one with the smallest
/// stamp. Idle slots are preferred over stealing, and among candidates of
/// the same kind the smallest stamp wins, with ties going to the lowest
/// index.
///
/// The clock is a `u32` and wraps after `u32::MAX` mutations. Ordering is
/// briefly perturbed when that happens.
#[derive(Debug)]
pub struct VoiceAllocator {
    voices: Box<[VoiceSlot]>,
    clock: u32,
}

impl VoiceAllocator {
    /// Creates an allocator with every voice idle.
    ///
    /// # Arguments
    ///
    /// * `voices` - The number of hardware voice channels.
    pub fn new(voices: usize) -> Result<Self, AllocatorError> {
        if voices == 0 {
            return Err(AllocatorError::NoVoices);
        }

        Ok(Self {
            voices: vec![VoiceSlot::default(); voices].into_boxed_slice(),
            clock: 0,
        })
    }

    /// Picks a voice for `note` and marks it as sounding that note.
    pub fn allocate(&mut self, note: i32) -> usize {
        self.allocate_detailed(note).voice
    }

    /// Same as [`allocate`](Self::allocate), but also reports whether the
    /// voice was retriggered, idle, or stolen from another note.
    pub fn allocate_detailed(&mut self, note: i32) -> Allocation {
        debug_assert_ne!(note, IDLE, "the idle sentinel is not a note");

        let allocation = if let Some(voice) = self.find_note(note) {
            Allocation {
                voice,
                kind: AllocationKind::Retrigger,
            }
        } else if let Some(voice) = self.find_lru(false) {
            Allocation {
                voice,
                kind: AllocationKind::Idle,
            }
        } else if let Some(voice) = self.find_lru(true) {
            let previous = self.voices[voice].note.unwrap_or(IDLE);
            debug!("voice {voice} stolen from note {previous} for note {note}");
            Allocation {
                voice,
                kind: AllocationKind::Steal { previous },
            }
        } else {
            unreachable!("an allocator with voices always has a candidate")
        };

        trace!(
            "note {note} -> voice {} ({:?})",
            allocation.voice, allocation.kind
        );
        self.touch(allocation.voice, Some(note));
        allocation
    }

    /// Marks the voice holding `note` as idle.
    ///
    /// Returns the voice, or `None` when no voice holds the note. A stray
    /// note-off is not an error.
    pub fn release(&mut self, note: i32) -> Option<usize> {
        let voice = self.find_note(note)?;
        trace!("note {note} released from voice {voice}");
        self.touch(voice, None);
        Some(voice)
    }

    /// Marks every voice as idle.
    ///
    /// Voices are touched in index order, so the next allocations of
    /// distinct notes fill voices from index 0 upward.
    pub fn release_all(&mut self) {
        for voice in 0..self.voices.len() {
            self.touch(voice, None);
        }
    }

    /// Returns whether the voice is sounding a note. Out of range indices
    /// are never playing.
    pub fn playing(&self, voice: usize) -> bool {
        self.note(voice).is_some()
    }

    /// Gets the note held by the voice.
    pub fn note(&self, voice: usize) -> Option<i32> {
        self.voices.get(voice).and_then(|slot| slot.note)
    }

    /// Gets the number of voices.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Gets the number of voices currently sounding a note.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|slot| slot.note.is_some()).count()
    }

    fn find_note(&self, note: i32) -> Option<usize> {
        self.voices.iter().position(|slot| slot.note == Some(note))
    }

    // Keeps the first minimum so that ties go to the lowest index.
    fn find_lru(&self, playing: bool) -> Option<usize> {
        let mut found: Option<(usize, u32)> = None;
        for (i, slot) in self.voices.iter().enumerate() {
            if slot.note.is_some() != playing {
                continue;
            }
            match found {
                Some((_, recency)) if slot.recency >= recency => {}
                _ => found = Some((i, slot.recency)),
            }
        }
        found.map(|(i, _)| i)
    }

    fn touch(&mut self, voice: usize, note: Option<i32>) {
        let slot = &mut self.voices[voice];
        slot.recency = self.clock;
        slot.note = note;
        self.clock = self.clock.wrapping_add(1);
    }
}
