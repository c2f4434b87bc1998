use anyhow::{Context, Result, bail};
use log::info;
use midiopl_midi::{Driver, DriverSettings, MidiFile, MidiFileSequencer, VoiceSink};
use std::env;
use std::fs::File;

const USAGE: &str = "\
Usage: midiopl-player <file.mid> [voices]

  file.mid   Standard MIDI file to play
  voices     Number of chip voice channels, 1 to 18 (default 9)
";

// One millisecond of playback per sequencer step.
const TICK_SECONDS: f64 = 0.001;

/// Logs every voice command instead of writing chip registers.
#[derive(Debug, Default)]
struct LogSink {
    commands: usize,
}

impl VoiceSink for LogSink {
    fn key_on(&mut self, voice: usize, key: u8, attenuation: u8) {
        self.commands += 1;
        info!("voice {voice:>2} key on  {key:>3} atten {attenuation:#04x}");
    }

    fn key_off(&mut self, voice: usize) {
        self.commands += 1;
        info!("voice {voice:>2} key off");
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{USAGE}");
        bail!("missing MIDI file path");
    }

    let mut settings = DriverSettings::new();
    if let Some(voices) = args.get(2) {
        settings.voice_count = voices
            .parse()
            .with_context(|| format!("invalid voice count '{voices}'"))?;
    }

    let path = &args[1];
    let mut mid = File::open(path).with_context(|| format!("failed to open {path}"))?;
    let midi_file = MidiFile::new(&mut mid).with_context(|| format!("failed to parse {path}"))?;
    info!(
        "{path}: {} events, {:.1} s, {} voices",
        midi_file.event_count(),
        midi_file.get_length(),
        settings.voice_count
    );

    let driver = Driver::new(&settings, LogSink::default())?;
    let mut sequencer = MidiFileSequencer::new(driver, midi_file);
    let mut dispatched = 0;
    while !sequencer.end_of_sequence() {
        dispatched += sequencer.advance(TICK_SECONDS);
    }
    sequencer.stop();

    let driver = sequencer.into_driver();
    let stats = driver.stats();
    println!("events dispatched: {dispatched}");
    println!("notes on:          {}", stats.notes_on);
    println!("notes off:         {}", stats.notes_off);
    println!("stray notes off:   {}", stats.stray_notes_off);
    println!("voices stolen:     {}", stats.steals);
    println!("peak voices:       {}", stats.peak_voices);
    println!("voice commands:    {}", driver.sink().commands);

    Ok(())
}
