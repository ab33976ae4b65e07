//! MIDI source capture, device watching, and audio output.
//!
//! The input side enumerates every MIDI source attached at startup and feeds
//! decoded note events into a lock-free queue. The output side owns the
//! synthesizer voice bank and renders it through the default
//! [cpal](https://crates.io/crates/cpal) output device. The two sides never
//! share a lock; everything crossing threads is a queue entry or an atomic
//! cell.

use anyhow::{anyhow, bail};
use bare_metal_modulo::*;
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, Sample, SampleFormat, Stream, StreamConfig,
};
use crossbeam_queue::SegQueue;
use crossbeam_utils::atomic::AtomicCell;
use fundsp::hacker::{AudioUnit64, FrameAdd, Net64};
use midir::{Ignore, MidiInput, MidiInputPort};
use read_input::{shortcut::input, InputBuild};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::{NoteEvent, SynthFunc, VoiceState, MAX_MIDI_VALUE};

const NUM_MIDI_VALUES: usize = MAX_MIDI_VALUE as usize + 1;

/// Name under which this program registers with the OS MIDI subsystem.
pub const CLIENT_NAME: &str = "midi_wire";

const WATCH_POLL: Duration = Duration::from_secs(1);
const CAPTURE_POLL: Duration = Duration::from_millis(50);

#[derive(Clone)]
/// Each `SynthMsg` is either a note event for the synthesizer or an
/// instruction to swap in a different patch.
pub enum SynthMsg {
    Note(NoteEvent),
    SetSynth(SynthFunc),
}

/// The names of all MIDI sources currently attached.
pub fn list_sources() -> anyhow::Result<Vec<String>> {
    let mut probe = MidiInput::new(CLIENT_NAME)?;
    probe.ignore(Ignore::None);
    let mut names = vec![];
    for port in probe.ports().iter() {
        names.push(probe.port_name(port)?);
    }
    Ok(names)
}

/// Enumerates every MIDI source attached right now, prints the count and each
/// source's name, and spawns a capture thread per source that forwards its
/// decoded note events into `midi_msgs`. Returns the number of sources
/// connected.
///
/// Zero sources is not an error; the synthesizer still runs, it just has
/// nothing live to listen to. Sources attached later are not picked up, since
/// enumeration happens once.
pub fn connect_all_sources(
    midi_msgs: Arc<SegQueue<SynthMsg>>,
    quit: Arc<AtomicCell<bool>>,
) -> anyhow::Result<usize> {
    let mut probe = MidiInput::new(CLIENT_NAME)?;
    probe.ignore(Ignore::None);
    let ports = probe.ports();
    println!("{} sources", ports.len());
    for (i, port) in ports.iter().enumerate() {
        let name = probe.port_name(port)?;
        println!("  source {i}: {name}");
        start_capture_thread(midi_msgs.clone(), port.clone(), name, quit.clone());
    }
    Ok(ports.len())
}

/// Connects one source and holds the connection open until `quit` flips.
///
/// midir consumes a `MidiInput` per connection, so each source gets its own
/// client. Connection failures are logged and the rest of the sources keep
/// working.
fn start_capture_thread(
    midi_msgs: Arc<SegQueue<SynthMsg>>,
    port: MidiInputPort,
    name: String,
    quit: Arc<AtomicCell<bool>>,
) {
    thread::spawn(move || {
        let mut midi_in = match MidiInput::new(CLIENT_NAME) {
            Ok(midi_in) => midi_in,
            Err(e) => {
                log::warn!("MIDI client for {name}: {e}");
                return;
            }
        };
        midi_in.ignore(Ignore::None);
        let _conn_in = match midi_in.connect(
            &port,
            "midi_wire-capture",
            move |_stamp, bytes, _| {
                if let Some(event) = NoteEvent::from_bytes(bytes) {
                    midi_msgs.push(SynthMsg::Note(event));
                }
            },
            (),
        ) {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!("connecting {name}: {e}");
                return;
            }
        };
        while !quit.load() {
            thread::sleep(CAPTURE_POLL);
        }
    });
}

/// Reports MIDI sources coming and going, one console line per change.
///
/// midir has no hotplug callback, so this polls the source names once a
/// second. Reporting is all it does; sources that appear after startup are
/// not wired into the synthesizer.
pub fn start_watch_thread(quit: Arc<AtomicCell<bool>>) {
    thread::spawn(move || {
        let mut known = list_sources().unwrap_or_default();
        while !quit.load() {
            thread::sleep(WATCH_POLL);
            match list_sources() {
                Ok(current) => {
                    for name in &current {
                        if !known.contains(name) {
                            println!("MIDI source attached: {name}");
                        }
                    }
                    for name in &known {
                        if !current.contains(name) {
                            println!("MIDI source detached: {name}");
                        }
                    }
                    known = current;
                }
                Err(e) => log::warn!("scanning MIDI sources: {e}"),
            }
        }
    });
}

/// Runs a `SynthPlayer` with `N` voices on its own thread, consuming
/// `midi_msgs` until `quit` flips.
pub fn start_output_thread<const N: usize>(
    midi_msgs: Arc<SegQueue<SynthMsg>>,
    synth: SynthFunc,
    quit: Arc<AtomicCell<bool>>,
) {
    thread::spawn(move || {
        let mut player = SynthPlayer::<N>::new(synth);
        if let Err(e) = player.run_output(midi_msgs, quit) {
            log::error!("audio output: {e}");
        }
    });
}

/// The synthesizer unit: a bank of `N` voices allocated round-robin, summed
/// into a single net and rendered through the default output device.
pub struct SynthPlayer<const N: usize> {
    states: [VoiceState; N],
    next: ModNumC<usize, N>,
    pitch2voice: [Option<usize>; NUM_MIDI_VALUES],
    recent_pitches: [Option<u8>; N],
    synth_func: SynthFunc,
}

impl<const N: usize> SynthPlayer<N> {
    pub fn new(synth_func: SynthFunc) -> Self {
        Self {
            states: [(); N].map(|_| VoiceState::default()),
            next: ModNumC::new(0),
            pitch2voice: [None; NUM_MIDI_VALUES],
            recent_pitches: [None; N],
            synth_func,
        }
    }

    /// Opens the default output device and renders the voice bank until
    /// `quit` flips, dispatching on the device's sample format.
    pub fn run_output(
        &mut self,
        midi_msgs: Arc<SegQueue<SynthMsg>>,
        quit: Arc<AtomicCell<bool>>,
    ) -> anyhow::Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(anyhow!("failed to find a default output device"))?;
        let config = device.default_output_config()?;
        match config.sample_format() {
            SampleFormat::F32 => self.run_synth::<f32>(midi_msgs, device, config.into(), quit),
            SampleFormat::I16 => self.run_synth::<i16>(midi_msgs, device, config.into(), quit),
            SampleFormat::U16 => self.run_synth::<u16>(midi_msgs, device, config.into(), quit),
        }
    }

    fn run_synth<T: Sample>(
        &mut self,
        midi_msgs: Arc<SegQueue<SynthMsg>>,
        device: Device,
        config: StreamConfig,
        quit: Arc<AtomicCell<bool>>,
    ) -> anyhow::Result<()> {
        while !quit.load() {
            let stream = self.build_stream::<T>(&config, &device)?;
            stream.play()?;
            self.handle_messages(midi_msgs.clone(), quit.clone());
        }
        Ok(())
    }

    /// Consumes queue messages until the patch changes (the stream must then
    /// be rebuilt around the new voice graphs) or `quit` flips.
    fn handle_messages(&mut self, midi_msgs: Arc<SegQueue<SynthMsg>>, quit: Arc<AtomicCell<bool>>) {
        let mut synth_changed = false;
        while !synth_changed && !quit.load() {
            if let Some(msg) = midi_msgs.pop() {
                match msg {
                    SynthMsg::Note(event) => self.handle_note(event),
                    SynthMsg::SetSynth(synth) => {
                        self.change_synth(synth);
                        synth_changed = true;
                    }
                }
            }
        }
    }

    fn handle_note(&mut self, event: NoteEvent) {
        match event {
            // Note-on at velocity zero means note-off, per MIDI convention.
            NoteEvent::On {
                note, velocity: 0, ..
            } => self.off(note),
            NoteEvent::On { note, velocity, .. } => self.on(note, velocity),
            NoteEvent::Off { note, .. } => self.off(note),
        }
    }

    fn sound(&self) -> Net64 {
        let mut sound = Net64::wrap(self.voice_at(0));
        for i in 1..N {
            sound = Net64::bin_op(sound, Net64::wrap(self.voice_at(i)), FrameAdd::new());
        }
        sound
    }

    fn voice_at(&self, i: usize) -> Box<dyn AudioUnit64> {
        (self.synth_func)(&self.states[i])
    }

    fn on(&mut self, note: u8, velocity: u8) {
        self.states[self.next.a()].on(note, velocity);
        self.pitch2voice[note as usize] = Some(self.next.a());
        self.recent_pitches[self.next.a()] = Some(note);
        self.next += 1;
    }

    fn off(&mut self, note: u8) {
        if let Some(i) = self.pitch2voice[note as usize] {
            // A newer note may have stolen the voice; releasing it now would
            // cut that note short.
            if self.recent_pitches[i] == Some(note) {
                self.release(i);
            }
            self.pitch2voice[note as usize] = None;
        }
    }

    fn release(&mut self, i: usize) {
        self.recent_pitches[i] = None;
        self.states[i].off();
    }

    fn release_all(&mut self) {
        for i in 0..N {
            self.release(i);
        }
        self.pitch2voice = [None; NUM_MIDI_VALUES];
    }

    fn change_synth(&mut self, new_synth: SynthFunc) {
        self.release_all();
        self.synth_func = new_synth;
    }

    fn build_stream<T: Sample>(
        &self,
        config: &StreamConfig,
        device: &Device,
    ) -> anyhow::Result<Stream> {
        let sample_rate = config.sample_rate.0 as f64;
        let mut sound = self.sound();
        sound.reset(Some(sample_rate));
        let mut next_value = move || sound.get_mono();
        let channels = config.channels as usize;
        let err_fn = |err| log::error!("audio stream: {err}");
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    write_data(data, channels, &mut next_value)
                },
                err_fn,
            )
            .or_else(|err| bail!("{err:?}"))
    }
}

fn write_data<T: Sample>(output: &mut [T], channels: usize, next_sample: &mut dyn FnMut() -> f64) {
    for frame in output.chunks_mut(channels) {
        let value: T = Sample::from::<f32>(&(next_sample() as f32));
        for sample in frame.iter_mut() {
            *sample = value;
        }
    }
}

/// Prints numbered `choices` and reads one back from the console.
pub fn console_choice_from<T, F: Fn(&T) -> &str>(
    prompt: &str,
    choices: &[T],
    prompt_func: F,
) -> usize {
    for (i, choice) in choices.iter().enumerate() {
        println!("{}: {}", i + 1, prompt_func(choice));
    }
    let prompt = format!("{prompt}: ");
    input().msg(prompt).inside(1..=choices.len()).get() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sounds::gated_triangle;
    use std::sync::Arc;

    fn test_player<const N: usize>() -> SynthPlayer<N> {
        SynthPlayer::<N>::new(Arc::new(gated_triangle))
    }

    #[test]
    fn allocates_voices_round_robin() {
        let mut player = test_player::<3>();
        player.on(60, 100);
        player.on(64, 90);
        assert!(player.states[0].is_on());
        assert!(player.states[1].is_on());
        assert!(!player.states[2].is_on());

        player.off(60);
        assert!(!player.states[0].is_on());
        assert!(player.states[1].is_on());
    }

    #[test]
    fn note_off_ignores_stolen_voices() {
        let mut player = test_player::<1>();
        player.on(60, 100);
        player.on(62, 100);
        // Voice 0 now belongs to note 62; the stale note-off must not cut it.
        player.off(60);
        assert!(player.states[0].is_on());

        player.off(62);
        assert!(!player.states[0].is_on());
    }

    #[test]
    fn velocity_zero_note_on_releases() {
        let mut player = test_player::<2>();
        player.handle_note(NoteEvent::on(60, 100));
        assert!(player.states[0].is_on());
        player.handle_note(NoteEvent::on(60, 0));
        assert!(!player.states[0].is_on());
    }

    #[test]
    fn changing_synth_silences_held_notes() {
        let mut player = test_player::<2>();
        player.on(60, 100);
        player.on(64, 100);
        player.change_synth(Arc::new(gated_triangle));
        assert!(player.states.iter().all(|s| !s.is_on()));
    }

    #[test]
    fn voice_bank_sums_to_mono() {
        let player = test_player::<4>();
        let sound = player.sound();
        assert_eq!(sound.inputs(), 0);
        assert_eq!(sound.outputs(), 1);
    }
}
