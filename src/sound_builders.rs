use fundsp::hacker::{adsr_live, clamp01, envelope2, moog_q, xerp, AudioUnit64, Net64};

use crate::{SynthFunc, VoiceState};

/// Named patches, as presented by the choice demo.
pub type ProgramTable = Vec<(String, SynthFunc)>;

/// Wraps `synth` so its amplitude follows the gate directly: sound starts the
/// instant the note goes down and stops the instant it is released.
pub fn gated_sound(state: &VoiceState, synth: Box<dyn AudioUnit64>) -> Box<dyn AudioUnit64> {
    let gate = state.gate_var();
    state.assemble_voice(synth, Box::new(gate >> envelope2(move |_, g| clamp01(g))))
}

#[derive(Copy, Clone, Debug)]
pub struct Adsr {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Adsr {
    /// The envelope as an amplitude adjuster driven by the voice's gate.
    pub fn boxed(&self, state: &VoiceState) -> Box<dyn AudioUnit64> {
        let gate = state.gate_var();
        Box::new(gate >> adsr_live(self.attack, self.decay, self.sustain, self.release))
    }

    fn net(&self, state: &VoiceState) -> Net64 {
        Net64::wrap(self.boxed(state))
    }

    /// Stacks pitch and envelope into a two-input sound such as `pulse`,
    /// where the envelope drives the second input.
    pub fn timed_sound(&self, timed_sound: Box<dyn AudioUnit64>, state: &VoiceState) -> Net64 {
        Net64::pipe_op(
            Net64::stack_op(state.pitch(), self.net(state)),
            Net64::wrap(timed_sound),
        )
    }

    /// Runs `source` through a Moog lowpass whose cutoff tracks the envelope.
    pub fn timed_moog(&self, source: Box<dyn AudioUnit64>, state: &VoiceState) -> Net64 {
        Net64::pipe_op(
            Net64::stack_op(
                Net64::wrap(source),
                Net64::pipe_op(
                    self.net(state),
                    Net64::wrap(Box::new(envelope2(move |_, n| xerp(1100.0, 11000.0, n)))),
                ),
            ),
            Net64::wrap(Box::new(moog_q(0.6))),
        )
    }
}
