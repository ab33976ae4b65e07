//! The hard-coded sequence of notes the demo fires at startup: a whole-tone
//! scale up from middle C, each note a little louder than the last.

use std::thread;
use std::time::Duration;

use crossbeam_queue::SegQueue;

use crate::io::SynthMsg;
use crate::NoteEvent;

pub const STARTUP_NOTE_COUNT: u8 = 10;
pub const STARTUP_NOTE_SPACING: Duration = Duration::from_secs(1);

const FIRST_NOTE: u8 = 60;
const NOTE_STEP: u8 = 2;
const FIRST_VELOCITY: u8 = 64;
const VELOCITY_STEP: u8 = 8;

/// The startup note-ons, in playing order. No note-offs follow; the demo's
/// patch decays on its own.
pub fn startup_notes() -> impl Iterator<Item = NoteEvent> {
    (0..STARTUP_NOTE_COUNT).map(|i| {
        NoteEvent::on(
            FIRST_NOTE + NOTE_STEP * i,
            FIRST_VELOCITY + VELOCITY_STEP * i,
        )
    })
}

/// Plays the startup notes into `midi_msgs`, blocking the calling thread for
/// about a second per note. Live MIDI keeps flowing meanwhile; the capture
/// threads feed the same queue.
pub fn play_startup_notes(midi_msgs: &SegQueue<SynthMsg>) {
    for event in startup_notes() {
        midi_msgs.push(SynthMsg::Note(event));
        thread::sleep(STARTUP_NOTE_SPACING);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_ten_rising_note_ons() {
        let notes: Vec<NoteEvent> = startup_notes().collect();
        assert_eq!(notes.len(), 10);
        for (i, event) in notes.iter().enumerate() {
            let i = i as u8;
            assert_eq!(*event, NoteEvent::on(60 + 2 * i, 64 + 8 * i));
        }
    }

    #[test]
    fn notes_are_a_second_apart() {
        assert_eq!(STARTUP_NOTE_SPACING, Duration::from_secs(1));
    }
}
