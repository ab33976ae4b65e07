//! Ready-made `SynthFunc` patches.

use std::sync::Arc;

use fundsp::hacker::{pulse, sine, triangle, AudioUnit64, FrameMul, Net64};

use crate::sound_builders::{gated_sound, Adsr, ProgramTable};
use crate::VoiceState;

macro_rules! program_table {
    ($( ($s:expr, $f:expr)),* ) => {vec![$({
        let synth: crate::SynthFunc = Arc::new($f);
        ($s.to_owned(), synth)
    },)*]}
}

pub fn options() -> ProgramTable {
    program_table![
        ("Gated Triangle", gated_triangle),
        ("Triangle", adsr_triangle),
        ("Sine", adsr_sine),
        ("Pulse", adsr_pulse),
        ("Moog Triangle", moog_triangle),
        ("Decaying Triangle", decaying_triangle)
    ]
}

pub const SUSTAINED: Adsr = Adsr {
    attack: 0.1,
    decay: 0.2,
    sustain: 0.4,
    release: 0.4,
};

/// Zero sustain: the note rings out and fades on its own, whether or not a
/// note-off ever arrives. The startup script relies on this.
pub const DECAYING: Adsr = Adsr {
    attack: 0.01,
    decay: 1.2,
    sustain: 0.0,
    release: 0.3,
};

pub fn gated_triangle(state: &VoiceState) -> Box<dyn AudioUnit64> {
    gated_sound(state, Box::new(triangle()))
}

pub fn decaying_triangle(state: &VoiceState) -> Box<dyn AudioUnit64> {
    state.assemble_voice(Box::new(triangle()), DECAYING.boxed(state))
}

pub fn adsr_triangle(state: &VoiceState) -> Box<dyn AudioUnit64> {
    state.assemble_voice(Box::new(triangle()), SUSTAINED.boxed(state))
}

pub fn adsr_sine(state: &VoiceState) -> Box<dyn AudioUnit64> {
    state.assemble_voice(Box::new(sine()), SUSTAINED.boxed(state))
}

pub fn adsr_pulse(state: &VoiceState) -> Box<dyn AudioUnit64> {
    Box::new(Net64::bin_op(
        SUSTAINED.timed_sound(Box::new(pulse()), state),
        state.volume(SUSTAINED.boxed(state)),
        FrameMul::new(),
    ))
}

pub fn moog_triangle(state: &VoiceState) -> Box<dyn AudioUnit64> {
    let pitched = Net64::pipe_op(state.pitch(), Net64::wrap(Box::new(triangle())));
    state.assemble_pitched_voice(
        Box::new(SUSTAINED.timed_moog(Box::new(pitched), state)),
        SUSTAINED.boxed(state),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 44100.0;

    fn render(sound: &mut Box<dyn AudioUnit64>, samples: usize) -> Vec<f64> {
        (0..samples).map(|_| sound.get_mono()).collect()
    }

    #[test]
    fn patches_are_mono() {
        let state = VoiceState::default();
        for (name, synth) in options() {
            let sound = synth(&state);
            assert_eq!(sound.inputs(), 0, "{name}");
            assert_eq!(sound.outputs(), 1, "{name}");
        }
    }

    #[test]
    fn silent_before_any_note() {
        let state = VoiceState::default();
        let mut sound = decaying_triangle(&state);
        sound.reset(Some(SAMPLE_RATE));
        assert!(render(&mut sound, 1000).iter().all(|s| s.abs() <= 1e-9));
    }

    #[test]
    fn sounding_note_produces_audio() {
        let state = VoiceState::default();
        state.on(69, 100);
        let mut sound = decaying_triangle(&state);
        sound.reset(Some(SAMPLE_RATE));
        let samples = render(&mut sound, 4410);
        assert!(samples.iter().all(|s| s.is_finite()));
        assert!(samples.iter().any(|s| s.abs() > 1e-3));
    }
}
