//! This crate wires live MIDI input into a bank of software-synthesizer voices
//! playing through the computer's default audio output, using
//! [fundsp](https://crates.io/crates/fundsp) for synthesis.
//!
//! It is organized as follows:
//! * The crate root contains the MIDI note-event model and the per-voice shared
//!   state that carries decoded events from MIDI threads into running
//!   [fundsp](https://crates.io/crates/fundsp) audio graphs.
//! * The `io` module enumerates and captures attached MIDI sources, watches for
//!   sources coming and going, and plays the synthesizer through the default
//!   output device.
//! * The `sound_builders` module wraps [fundsp](https://crates.io/crates/fundsp)
//!   audio graphs into `SynthFunc` voices with a variety of properties.
//! * The `sounds` module contains ready-made `SynthFunc` patches.
//! * The `script` module plays the hard-coded sequence of notes the demo fires
//!   at startup.
//!
//! The `midi_wire` binary (`src/main.rs`) is the complete demo: it builds the
//! synthesizer-to-output pipeline, connects every attached MIDI source, plays
//! the scripted startup notes, and then responds to live MIDI until the process
//! is killed. `src/bin/choice_demo.rs` does the same wiring but lets the user
//! switch patches from a console menu.

pub mod io;
pub mod script;
pub mod sound_builders;
pub mod sounds;

use fundsp::hacker::{midi_hz, shared, var, An, AudioUnit64, FrameMul, Net64, Shared, Var};
use std::fmt::Debug;
use std::sync::Arc;

/// MIDI values for note number and velocity range from 0 to 127.
pub const MAX_MIDI_VALUE: u8 = 127;

/// Gate value while a voice's note is sounding.
pub const GATE_ON: f64 = 1.0;

/// Gate value once a voice's note has been released.
pub const GATE_OFF: f64 = -1.0;

const NOTE_OFF_NIBBLE: u8 = 0x8;
const NOTE_ON_NIBBLE: u8 = 0x9;

/// `SynthFunc` objects translate `VoiceState` values into
/// [fundsp](https://crates.io/crates/fundsp) audio graphs.
pub type SynthFunc = Arc<dyn Fn(&VoiceState) -> Box<dyn AudioUnit64> + Send + Sync>;

/// A decoded MIDI note message.
///
/// Only note messages exist here: every other MIDI message type (control
/// change, pitch bend, aftertouch, system messages) is discarded at the wire,
/// which is the whole of this program's MIDI vocabulary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoteEvent {
    On { channel: u8, note: u8, velocity: u8 },
    Off { channel: u8, note: u8, velocity: u8 },
}

impl NoteEvent {
    /// Decodes one raw MIDI message as delivered by a MIDI source.
    ///
    /// A status byte with high nibble `0x9` is a note-on and `0x8` a note-off;
    /// anything else decodes to `None`, as do empty and truncated messages.
    /// Note and velocity are masked to 7 bits, so a data byte with its high
    /// bit set still lands in [0, 127]. The channel (the status byte's low
    /// nibble) is recorded but does not restrict forwarding.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        if data.len() < 2 {
            return None;
        }
        let channel = status & 0x0F;
        let note = data[0] & MAX_MIDI_VALUE;
        let velocity = data[1] & MAX_MIDI_VALUE;
        match status >> 4 {
            NOTE_ON_NIBBLE => Some(Self::On {
                channel,
                note,
                velocity,
            }),
            NOTE_OFF_NIBBLE => Some(Self::Off {
                channel,
                note,
                velocity,
            }),
            _ => None,
        }
    }

    /// A note-on originating inside the program rather than on the wire.
    ///
    /// Values are carried verbatim; only `from_bytes` masks, since masking is
    /// a property of wire decoding.
    pub fn on(note: u8, velocity: u8) -> Self {
        Self::On {
            channel: 0,
            note,
            velocity,
        }
    }

    pub fn note(&self) -> u8 {
        match self {
            Self::On { note, .. } | Self::Off { note, .. } => *note,
        }
    }

    pub fn velocity(&self) -> u8 {
        match self {
            Self::On { velocity, .. } | Self::Off { velocity, .. } => *velocity,
        }
    }

    pub fn channel(&self) -> u8 {
        match self {
            Self::On { channel, .. } | Self::Off { channel, .. } => *channel,
        }
    }
}

#[derive(Clone)]
/// Per-voice state shared between MIDI threads and the audio thread as
/// [fundsp `Shared` atomic variables](https://docs.rs/fundsp/0.12.0/fundsp/audionode/struct.Shared.html):
/// the sounding pitch in Hz, the normalized velocity, and a gate that is open
/// while the note is held.
pub struct VoiceState {
    pitch: Shared<f64>,
    velocity: Shared<f64>,
    gate: Shared<f64>,
}

impl Default for VoiceState {
    fn default() -> Self {
        Self {
            pitch: Default::default(),
            velocity: Default::default(),
            gate: shared(GATE_OFF),
        }
    }
}

impl Debug for VoiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceState")
            .field("pitch", &self.pitch.value())
            .field("velocity", &self.velocity.value())
            .field("gate", &self.gate.value())
            .finish()
    }
}

impl VoiceState {
    /// The most recent note-on pitch as a constant-output net.
    pub fn pitch(&self) -> Net64 {
        Net64::wrap(Box::new(var(&self.pitch)))
    }

    /// Returns `GATE_ON` while the voice's note is held and `GATE_OFF` after
    /// release. Amplitude adjusters key off this to shape the note's lifetime,
    /// whether as a hard cutoff or a gradual envelope.
    pub fn gate_var(&self) -> An<Var<f64>> {
        var(&self.gate)
    }

    /// The voice's volume: normalized note-on velocity scaled by the output of
    /// `adjuster`.
    pub fn volume(&self, adjuster: Box<dyn AudioUnit64>) -> Net64 {
        Net64::bin_op(
            Net64::wrap(Box::new(var(&self.velocity))),
            Net64::wrap(adjuster),
            FrameMul::new(),
        )
    }

    /// Pipes the current pitch into `synth`, then multiplies by
    /// `volume(adjuster)` to produce the voice's final sound.
    pub fn assemble_voice(
        &self,
        synth: Box<dyn AudioUnit64>,
        adjuster: Box<dyn AudioUnit64>,
    ) -> Box<dyn AudioUnit64> {
        self.assemble_pitched_voice(
            Box::new(Net64::pipe_op(self.pitch(), Net64::wrap(synth))),
            adjuster,
        )
    }

    /// Like `assemble_voice` for sounds that already consume the pitch.
    pub fn assemble_pitched_voice(
        &self,
        pitched_sound: Box<dyn AudioUnit64>,
        adjuster: Box<dyn AudioUnit64>,
    ) -> Box<dyn AudioUnit64> {
        Box::new(Net64::bin_op(
            Net64::wrap(pitched_sound),
            self.volume(adjuster),
            FrameMul::new(),
        ))
    }

    /// Encodes a note-on: pitch in Hz, velocity normalized to [0, 1], gate
    /// open. Velocities beyond the MIDI range saturate at full volume.
    pub fn on(&self, note: u8, velocity: u8) {
        self.pitch.set_value(midi_hz(note as f64));
        self.velocity
            .set_value((velocity as f64 / MAX_MIDI_VALUE as f64).min(1.0));
        self.gate.set_value(GATE_ON);
    }

    /// Encodes a note-off by closing the gate.
    pub fn off(&self) {
        self.gate.set_value(GATE_OFF);
    }

    pub fn pitch_hz(&self) -> f64 {
        self.pitch.value()
    }

    pub fn velocity_level(&self) -> f64 {
        self.velocity.value()
    }

    pub fn is_on(&self) -> bool {
        self.gate.value() == GATE_ON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn decodes_note_on() {
        assert_eq!(
            NoteEvent::from_bytes(&[0x90, 60, 100]),
            Some(NoteEvent::On {
                channel: 0,
                note: 60,
                velocity: 100
            })
        );
    }

    #[test]
    fn decodes_note_off() {
        assert_eq!(
            NoteEvent::from_bytes(&[0x80, 60, 40]),
            Some(NoteEvent::Off {
                channel: 0,
                note: 60,
                velocity: 40
            })
        );
    }

    #[test]
    fn decodes_any_channel() {
        assert_eq!(NoteEvent::from_bytes(&[0x93, 72, 99]).unwrap().channel(), 3);
        assert_eq!(
            NoteEvent::from_bytes(&[0x8F, 72, 0]).unwrap().channel(),
            0xF
        );
    }

    #[test]
    fn masks_data_bytes_to_seven_bits() {
        let event = NoteEvent::from_bytes(&[0x90, 0xFF, 0xC8]).unwrap();
        assert_eq!(event.note(), 127);
        assert_eq!(event.velocity(), 0xC8 & 0x7F);
    }

    #[test]
    fn discards_other_message_types() {
        // Control change, pitch bend, program change, channel pressure,
        // polyphonic pressure, system realtime, and a stray data byte.
        for msg in [
            vec![0xB0, 1, 64],
            vec![0xE0, 0, 64],
            vec![0xC0, 5],
            vec![0xD0, 17],
            vec![0xA0, 60, 33],
            vec![0xF8],
            vec![0x3C, 60, 100],
        ] {
            assert_eq!(NoteEvent::from_bytes(&msg), None);
        }
    }

    #[test]
    fn discards_truncated_messages() {
        assert_eq!(NoteEvent::from_bytes(&[]), None);
        assert_eq!(NoteEvent::from_bytes(&[0x90]), None);
        assert_eq!(NoteEvent::from_bytes(&[0x90, 60]), None);
    }

    #[test]
    fn voice_state_follows_note_events() {
        let state = VoiceState::default();
        assert!(!state.is_on());

        state.on(69, 127);
        assert!(state.is_on());
        assert_float_eq!(state.pitch_hz(), 440.0, abs <= 1e-6);
        assert_float_eq!(state.velocity_level(), 1.0, abs <= 1e-12);

        state.on(60, 64);
        assert_float_eq!(state.pitch_hz(), midi_hz(60.0), abs <= 1e-12);
        assert_float_eq!(state.velocity_level(), 64.0 / 127.0, abs <= 1e-12);

        state.off();
        assert!(!state.is_on());
    }

    #[test]
    fn oversized_velocity_saturates() {
        let state = VoiceState::default();
        state.on(60, 136);
        assert_float_eq!(state.velocity_level(), 1.0, abs <= 1e-12);
    }
}
