use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use tracing::{info, warn};

use cw_listen::audio::{self, CaptureHandle, Keying};
use cw_listen::cw::{derive_timing_config, AlphabetMode, CwEngine, DecodeEvent, EventSink, GapMarker, ThresholdMode};
use cw_listen::logging::init_logging;
use cw_listen::{Settings, Transcript};

#[derive(Debug, Parser)]
#[command(name = "cw-listen")]
#[command(about = "Decode Morse code from a microphone or a recording", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Per-run overrides of the saved settings
#[derive(Debug, Args)]
struct Overrides {
    /// Expected sending speed in words per minute
    #[arg(long, global = true)]
    wpm: Option<f32>,

    /// Centre of the listening band in Hz
    #[arg(long, global = true)]
    center_hz: Option<f32>,

    /// Width of the listening band in Hz
    #[arg(long, global = true)]
    bandwidth_hz: Option<f32>,

    /// Tone detector
    #[arg(long, value_enum, global = true)]
    threshold: Option<ThresholdArg>,

    /// Level (0-255) a static detector must exceed
    #[arg(long, global = true)]
    static_threshold: Option<f32>,

    /// Which characters to decode
    #[arg(long, value_enum, global = true)]
    mode: Option<ModeArg>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ThresholdArg {
    Static,
    Adaptive,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    Letters,
    Digits,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode live from an input device
    Listen {
        /// Input device name (see `cw-listen devices`)
        #[arg(long)]
        device: Option<String>,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<f32>,
    },
    /// List input devices
    Devices,
    /// Decode a WAV recording
    DecodeWav {
        file: PathBuf,
    },
    /// Key text as audio and decode it back
    Simulate {
        #[arg(long)]
        text: String,

        /// Keying speed, defaults to the decoder speed
        #[arg(long = "send-wpm")]
        send_wpm: Option<f32>,

        /// Tone frequency, defaults to the band centre
        #[arg(long)]
        tone_hz: Option<f32>,

        /// Also write the keyed audio to this WAV file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the effective settings
    Settings {
        /// Overwrite the saved settings with defaults
        #[arg(long, default_value_t = false)]
        reset: bool,

        /// Save the effective settings, overrides included
        #[arg(long, default_value_t = false, conflicts_with = "reset")]
        save: bool,
    },
}

impl Overrides {
    fn apply(&self, settings: &mut Settings) {
        if let Some(wpm) = self.wpm {
            settings.wpm = wpm;
        }
        if let Some(hz) = self.center_hz {
            settings.center_freq_hz = hz;
        }
        if let Some(hz) = self.bandwidth_hz {
            settings.bandwidth_hz = hz;
        }
        if let Some(threshold) = self.threshold {
            settings.threshold_mode = match threshold {
                ThresholdArg::Static => ThresholdMode::Static,
                ThresholdArg::Adaptive => ThresholdMode::Adaptive,
            };
        }
        if let Some(level) = self.static_threshold {
            settings.static_threshold = level;
        }
        if let Some(mode) = self.mode {
            settings.alphabet_mode = match mode {
                ModeArg::Letters => AlphabetMode::Letters,
                ModeArg::Digits => AlphabetMode::Digits,
            };
        }
    }
}

/// Prints characters as they arrive and keeps the transcript
struct Printer {
    transcript: Transcript,
    live: bool,
}

impl Printer {
    fn new(live: bool) -> Self {
        Self {
            transcript: Transcript::new(),
            live,
        }
    }

    fn echo(&self, text: &str) {
        if self.live {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }

    fn finish(self) {
        if self.live && !self.transcript.is_empty() {
            println!();
        }
        if self.transcript.is_empty() {
            println!("(nothing decoded)");
        } else {
            println!("{}", self.transcript.grouped_text().trim_end());
            println!("last group: {}", self.transcript.last_group());
        }
    }
}

impl EventSink for Printer {
    fn on_symbol(&mut self, character: char, sequence: &str) {
        self.echo(&character.to_string());
        self.transcript.push(&DecodeEvent::Symbol {
            character,
            sequence: sequence.to_string(),
        });
    }

    fn on_gap(&mut self, marker: GapMarker) {
        self.echo(marker.as_str());
        self.transcript.push(&DecodeEvent::Gap(marker));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = Settings::load();
    cli.overrides.apply(&mut settings);

    match cli.command {
        Command::Listen { device, seconds } => listen(&settings, device, seconds),
        Command::Devices => {
            for device in CaptureHandle::list_input_devices() {
                println!("{}", device.display_name);
            }
            Ok(())
        }
        Command::DecodeWav { file } => decode_wav(&settings, &file),
        Command::Simulate {
            text,
            send_wpm,
            tone_hz,
            out,
        } => simulate(&settings, &text, send_wpm, tone_hz, out),
        Command::Settings { reset, save } => show_settings(settings, reset, save),
    }
}

fn listen(settings: &Settings, device: Option<String>, seconds: Option<f32>) -> Result<()> {
    let mut engine = CwEngine::new(settings.engine_config()).context("invalid engine settings")?;
    let capture = CaptureHandle::new(settings.analyser_config(), settings.hop_size).context("start audio thread")?;

    let device = device.or_else(|| settings.input_device.clone());
    let sample_rate = capture.start(device).context("open input device")?;
    info!(sample_rate, "listening");

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs_f32(s.max(0.0).min(86_400.0)));
    let mut printer = Printer::new(true);
    engine.start();

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        match capture.frames().recv_timeout(Duration::from_millis(100)) {
            Ok(captured) => {
                engine
                    .tick(&captured.frame, captured.at, &mut printer)
                    .context("process spectrum frame")?;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !capture.is_capturing() {
                    warn!("capture stopped");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    engine.stop();
    capture.stop().context("stop capture")?;
    if capture.dropped_frames() > 0 {
        warn!(dropped = capture.dropped_frames(), "frames dropped while decoding");
    }
    printer.finish();
    Ok(())
}

fn decode_wav(settings: &Settings, file: &Path) -> Result<()> {
    let (samples, sample_rate) =
        audio::read_wav(file).with_context(|| format!("read wav {}", file.display()))?;
    info!(samples = samples.len(), sample_rate, "decoding recording");

    let mut engine = CwEngine::new(settings.engine_config()).context("invalid engine settings")?;
    let mut printer = Printer::new(false);
    audio::decode_samples(
        &samples,
        sample_rate,
        &settings.analyser_config(),
        settings.hop_size,
        &mut engine,
        &mut printer,
    )
    .context("decode recording")?;

    printer.finish();
    Ok(())
}

fn simulate(
    settings: &Settings,
    text: &str,
    send_wpm: Option<f32>,
    tone_hz: Option<f32>,
    out: Option<PathBuf>,
) -> Result<()> {
    const SAMPLE_RATE: u32 = 48000;

    // Space characters and words clear of the receiver's gap boundaries so
    // spectral smear cannot merge them
    let timing = derive_timing_config(settings.wpm, settings.dash_dot_ratio, settings.pause_multiplier);
    let dot = timing.dot_duration_ms;
    let keying = Keying {
        wpm: send_wpm.unwrap_or(settings.wpm),
        dash_dot_ratio: timing.dash_dot_ratio,
        char_gap_dots: (timing.inter_char_gap_ms + timing.inter_word_gap_ms) / 2.0 / dot,
        word_gap_dots: timing.inter_word_gap_ms / dot + 2.0,
        ..Default::default()
    };
    let samples = audio::key_text(text, &keying, tone_hz.unwrap_or(settings.center_freq_hz), SAMPLE_RATE);

    if let Some(path) = out.as_ref() {
        audio::write_wav(path, &samples, SAMPLE_RATE).with_context(|| format!("write wav {}", path.display()))?;
        eprintln!("wrote {}", path.display());
    }

    let mut engine = CwEngine::new(settings.engine_config()).context("invalid engine settings")?;
    let mut printer = Printer::new(false);
    audio::decode_samples(
        &samples,
        SAMPLE_RATE,
        &settings.analyser_config(),
        settings.hop_size,
        &mut engine,
        &mut printer,
    )
    .context("decode simulated audio")?;

    printer.finish();
    Ok(())
}

fn show_settings(settings: Settings, reset: bool, save: bool) -> Result<()> {
    let settings = if reset { Settings::default() } else { settings };
    if reset || save {
        let path = settings.save().context("save settings")?;
        eprintln!("saved {}", path.display());
    }
    let json = serde_json::to_string_pretty(&settings).context("serialize settings")?;
    println!("{json}");
    Ok(())
}
