//! Same wiring as the main demo, minus the scripted notes, plus a console
//! menu for switching patches live and a clean way out.

use std::sync::Arc;

use crossbeam_queue::SegQueue;
use crossbeam_utils::atomic::AtomicCell;
use env_logger::Env;
use midi_wire::{
    io::{connect_all_sources, console_choice_from, start_output_thread, SynthMsg},
    sounds::options,
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let midi_msgs = Arc::new(SegQueue::new());
    let quit = Arc::new(AtomicCell::new(false));

    connect_all_sources(midi_msgs.clone(), quit.clone())?;
    let programs = options();
    start_output_thread::<10>(midi_msgs.clone(), programs[0].1.clone(), quit.clone());

    let main_menu = vec!["Pick a synthesizer sound", "Quit"];
    while !quit.load() {
        let choice = console_choice_from("Choice", &main_menu, |s| *s);
        if main_menu[choice] == "Quit" {
            quit.store(true);
        } else {
            let c = console_choice_from("Change sound to", &programs, |p| p.0.as_str());
            midi_msgs.push(SynthMsg::SetSynth(programs[c].1.clone()));
        }
    }
    Ok(())
}
