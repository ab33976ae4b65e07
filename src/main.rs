//! The complete demo: build the synthesizer-to-output pipeline, connect every
//! attached MIDI source, fire the scripted startup notes, then respond to live
//! MIDI until the process is killed. There is no shutdown path; Ctrl-C ends it.

use std::sync::Arc;
use std::thread;

use crossbeam_queue::SegQueue;
use crossbeam_utils::atomic::AtomicCell;
use env_logger::Env;
use midi_wire::{
    io::{connect_all_sources, start_output_thread, start_watch_thread},
    script::play_startup_notes,
    sounds::decaying_triangle,
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let midi_msgs = Arc::new(SegQueue::new());
    let quit = Arc::new(AtomicCell::new(false));

    println!("Building synthesizer -> output graph...");
    start_output_thread::<10>(midi_msgs.clone(), Arc::new(decaying_triangle), quit.clone());

    println!("Connecting MIDI sources...");
    connect_all_sources(midi_msgs.clone(), quit.clone())?;
    start_watch_thread(quit.clone());

    println!("Sending startup notes!");
    play_startup_notes(&midi_msgs);

    println!("Done! Ctrl-C to quit, or play via your MIDI keyboard.");
    loop {
        thread::park();
    }
}
