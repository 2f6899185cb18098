pub mod analyser;
pub mod tone;
pub mod wav;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cw::{CwEngine, EventSink, SpectrumFrame};
use crate::error::{CwError, CwResult};

pub use analyser::{AnalyserConfig, SpectrumAnalyser};
pub use tone::{key_text, Keying, ToneGenerator};
pub use wav::{read_wav, write_wav};

/// Device info with display name and internal name for selection
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceInfo {
    /// User-friendly display name
    pub display_name: String,
    /// Internal name used for device selection (cpal name)
    pub internal_name: String,
}

/// Ring buffer size for captured audio (~1s at 48kHz)
const RING_BUFFER_SIZE: usize = 48000;

/// Spectrum frames buffered for the consumer before new ones are dropped
const FRAME_QUEUE_LEN: usize = 64;

/// Default analysis hop (~5ms at 48kHz)
pub const DEFAULT_HOP_SIZE: usize = 256;

/// A spectrum frame stamped with the capture time of its newest sample
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub frame: SpectrumFrame,
    pub at: Instant,
}

/// Commands sent to the audio thread
enum CaptureCommand {
    Start {
        input_device: Option<String>,
        reply: Sender<CwResult<u32>>,
    },
    Stop,
    Shutdown,
}

/// Handle to the capture engine.
///
/// The cpal stream is not `Send`, so it lives on a dedicated audio thread;
/// this handle only holds channels and atomics.
pub struct CaptureHandle {
    command_tx: Sender<CaptureCommand>,
    frames_rx: Receiver<CapturedFrame>,
    input_level: Arc<AtomicU32>,
    sample_rate: Arc<AtomicU32>,
    dropped_frames: Arc<AtomicU64>,
    is_capturing: Arc<AtomicBool>,
    settings: Arc<parking_lot::Mutex<ProcessingSettings>>,
}

impl CaptureHandle {
    /// Spawn the audio thread; nothing is captured until [`start`](Self::start)
    pub fn new(analyser: AnalyserConfig, hop_size: usize) -> CwResult<Self> {
        let (command_tx, command_rx) = bounded::<CaptureCommand>(16);
        let (frames_tx, frames_rx) = bounded::<CapturedFrame>(FRAME_QUEUE_LEN);

        let shared = Shared {
            input_level: Arc::new(AtomicU32::new(0.0_f32.to_bits())),
            sample_rate: Arc::new(AtomicU32::new(0)),
            dropped_frames: Arc::new(AtomicU64::new(0)),
            is_capturing: Arc::new(AtomicBool::new(false)),
        };

        let settings = Arc::new(parking_lot::Mutex::new(ProcessingSettings {
            analyser,
            hop_size: hop_size.max(1),
        }));

        let handle = Self {
            command_tx,
            frames_rx,
            input_level: Arc::clone(&shared.input_level),
            sample_rate: Arc::clone(&shared.sample_rate),
            dropped_frames: Arc::clone(&shared.dropped_frames),
            is_capturing: Arc::clone(&shared.is_capturing),
            settings: Arc::clone(&settings),
        };

        thread::Builder::new()
            .name("cw-audio".to_string())
            .spawn(move || audio_thread(command_rx, frames_tx, settings, shared))
            .map_err(|e| CwError::Audio(format!("failed to spawn audio thread: {}", e)))?;

        Ok(handle)
    }

    /// List available audio input devices
    pub fn list_input_devices() -> Vec<DeviceInfo> {
        let host = cpal::default_host();
        host.input_devices()
            .map(|devices| {
                devices
                    .filter_map(|d| {
                        d.name().ok().map(|name| DeviceInfo {
                            display_name: name.clone(),
                            internal_name: name,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Open the input device (default if `None`) and begin producing frames.
    ///
    /// Returns the device sample rate.
    pub fn start(&self, input_device: Option<String>) -> CwResult<u32> {
        let (reply, result) = bounded(1);
        self.command_tx
            .send(CaptureCommand::Start { input_device, reply })
            .map_err(|_| CwError::Audio("audio thread not responding".to_string()))?;
        result
            .recv()
            .map_err(|_| CwError::Audio("audio thread not responding".to_string()))?
    }

    /// Analysis settings for the next [`start`](Self::start)
    pub fn set_analyser(&self, analyser: AnalyserConfig, hop_size: usize) {
        let mut settings = self.settings.lock();
        settings.analyser = analyser;
        settings.hop_size = hop_size.max(1);
    }

    /// Analysis settings the next capture will use
    pub fn analyser_settings(&self) -> (AnalyserConfig, usize) {
        let settings = self.settings.lock();
        (settings.analyser.clone(), settings.hop_size)
    }

    /// Close the stream; queued frames stay readable
    pub fn stop(&self) -> CwResult<()> {
        self.command_tx
            .send(CaptureCommand::Stop)
            .map_err(|_| CwError::Audio("audio thread not responding".to_string()))
    }

    /// Frames in capture order
    pub fn frames(&self) -> &Receiver<CapturedFrame> {
        &self.frames_rx
    }

    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::Relaxed)
    }

    /// Smoothed input peak level, 0..1
    pub fn input_level(&self) -> f32 {
        f32::from_bits(self.input_level.load(Ordering::Relaxed))
    }

    /// Sample rate of the running stream, 0 if not started
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    /// Frames discarded because the consumer fell behind
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(CaptureCommand::Shutdown);
    }
}

struct Shared {
    input_level: Arc<AtomicU32>,
    sample_rate: Arc<AtomicU32>,
    dropped_frames: Arc<AtomicU64>,
    is_capturing: Arc<AtomicBool>,
}

struct ProcessingSettings {
    analyser: AnalyserConfig,
    hop_size: usize,
}

/// Stream plus the worker turning its samples into frames
struct ActiveCapture {
    _stream: Stream,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ActiveCapture {
    fn shutdown(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("spectrum worker panicked");
            }
        }
    }
}

/// Audio thread that owns the cpal Stream (not Send)
fn audio_thread(
    command_rx: Receiver<CaptureCommand>,
    frames_tx: Sender<CapturedFrame>,
    settings: Arc<parking_lot::Mutex<ProcessingSettings>>,
    shared: Shared,
) {
    let mut active: Option<ActiveCapture> = None;

    loop {
        match command_rx.recv() {
            Ok(CaptureCommand::Start { input_device, reply }) => {
                if let Some(capture) = active.take() {
                    capture.shutdown();
                }
                info!(device = ?input_device, "starting capture");

                let result = start_capture(input_device.as_deref(), &frames_tx, &settings, &shared);
                let reply_value = match result {
                    Ok((capture, sample_rate)) => {
                        active = Some(capture);
                        shared.is_capturing.store(true, Ordering::Relaxed);
                        Ok(sample_rate)
                    }
                    Err(e) => {
                        error!(error = %e, "failed to start capture");
                        Err(e)
                    }
                };
                let _ = reply.send(reply_value);
            }
            Ok(CaptureCommand::Stop) => {
                if let Some(capture) = active.take() {
                    capture.shutdown();
                    info!("capture stopped");
                }
                shared.is_capturing.store(false, Ordering::Relaxed);
            }
            Ok(CaptureCommand::Shutdown) | Err(_) => {
                if let Some(capture) = active.take() {
                    capture.shutdown();
                }
                shared.is_capturing.store(false, Ordering::Relaxed);
                debug!("audio thread exiting");
                break;
            }
        }
    }
}

fn start_capture(
    device_name: Option<&str>,
    frames_tx: &Sender<CapturedFrame>,
    settings: &Arc<parking_lot::Mutex<ProcessingSettings>>,
    shared: &Shared,
) -> CwResult<(ActiveCapture, u32)> {
    // Fresh ring buffer per start so no stale audio leaks into the new run
    let ring_buffer = HeapRb::<f32>::new(RING_BUFFER_SIZE);
    let (producer, consumer) = ring_buffer.split();
    let producer = Arc::new(parking_lot::Mutex::new(producer));

    let (stream, sample_rate) = create_input_stream(device_name, producer, Arc::clone(&shared.input_level))?;
    stream
        .play()
        .map_err(|e| CwError::Audio(format!("failed to start input stream: {}", e)))?;
    shared.sample_rate.store(sample_rate, Ordering::Relaxed);

    let (analyser, hop_size) = {
        let settings = settings.lock();
        (SpectrumAnalyser::new(settings.analyser.clone(), sample_rate), settings.hop_size)
    };

    let running = Arc::new(AtomicBool::new(true));
    let worker = {
        let running = Arc::clone(&running);
        let frames_tx = frames_tx.clone();
        let dropped = Arc::clone(&shared.dropped_frames);
        thread::Builder::new()
            .name("cw-spectrum".to_string())
            .spawn(move || spectrum_worker(consumer, analyser, hop_size, frames_tx, running, dropped))
            .map_err(|e| CwError::Audio(format!("failed to spawn spectrum worker: {}", e)))?
    };

    info!(sample_rate, hop_size, "capture started");
    Ok((
        ActiveCapture {
            _stream: stream,
            running,
            worker: Some(worker),
        },
        sample_rate,
    ))
}

/// Drain the ring buffer one hop at a time and publish a frame per hop.
///
/// Frame times come from the sample count so spacing follows the audio,
/// not the scheduler.
fn spectrum_worker(
    mut consumer: ringbuf::HeapCons<f32>,
    mut analyser: SpectrumAnalyser,
    hop_size: usize,
    frames_tx: Sender<CapturedFrame>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
) {
    let sample_rate = analyser.sample_rate() as f64;
    let started = Instant::now();
    let mut consumed: u64 = 0;
    let mut hop = vec![0.0f32; hop_size];

    while running.load(Ordering::Relaxed) {
        if consumer.occupied_len() < hop_size {
            thread::sleep(Duration::from_millis(2));
            continue;
        }
        let n = consumer.pop_slice(&mut hop);
        consumed += n as u64;
        analyser.push_samples(&hop[..n]);

        let captured = CapturedFrame {
            frame: analyser.frame(),
            at: started + Duration::from_secs_f64(consumed as f64 / sample_rate),
        };
        match frames_tx.try_send(captured) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if dropped.fetch_add(1, Ordering::Relaxed) % 100 == 0 {
                    warn!("frame queue full, dropping frames");
                }
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}

type CaptureProducer = Arc<parking_lot::Mutex<ringbuf::HeapProd<f32>>>;

/// Create an audio input stream for the named device, default otherwise
fn create_input_stream(
    device_name: Option<&str>,
    producer: CaptureProducer,
    input_level: Arc<AtomicU32>,
) -> CwResult<(Stream, u32)> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        let devices: Vec<_> = host
            .input_devices()
            .map_err(|e| CwError::Audio(e.to_string()))?
            .collect();

        match devices
            .iter()
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .cloned()
        {
            Some(device) => device,
            None => {
                warn!(device = name, "input device not found, using default");
                host.default_input_device()
                    .ok_or_else(|| CwError::Audio(format!("input device '{}' not found", name)))?
            }
        }
    } else {
        host.default_input_device()
            .ok_or_else(|| CwError::Audio("no default input device".to_string()))?
    };

    debug!(device = ?device.name(), "using input device");

    let config = device
        .default_input_config()
        .map_err(|e| CwError::Audio(e.to_string()))?;

    let channels = config.channels() as usize;
    let sample_rate = config.sample_rate().0;

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_input_stream::<f32>(&device, &config.into(), producer, channels, input_level),
        cpal::SampleFormat::I16 => build_input_stream::<i16>(&device, &config.into(), producer, channels, input_level),
        cpal::SampleFormat::U16 => build_input_stream::<u16>(&device, &config.into(), producer, channels, input_level),
        other => return Err(CwError::Audio(format!("unsupported input sample format {:?}", other))),
    }?;

    Ok((stream, sample_rate))
}

fn build_input_stream<T: cpal::SizedSample>(
    device: &Device,
    config: &StreamConfig,
    producer: CaptureProducer,
    channels: usize,
    input_level: Arc<AtomicU32>,
) -> CwResult<Stream>
where
    f32: FromSample<T>,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut producer = producer.lock();
                let mut peak: f32 = 0.0;

                // Convert to mono (average channels) and push to ring buffer
                for frame in data.chunks(channels) {
                    let sample: f32 = frame
                        .iter()
                        .map(|s| <f32 as FromSample<T>>::from_sample_(*s))
                        .sum::<f32>()
                        / channels as f32;
                    let _ = producer.try_push(sample);

                    peak = peak.max(sample.abs());
                }

                // Fast attack, slow decay
                let current = f32::from_bits(input_level.load(Ordering::Relaxed));
                let new_level = if peak > current {
                    peak
                } else {
                    current * 0.95 + peak * 0.05
                };
                input_level.store(new_level.to_bits(), Ordering::Relaxed);
            },
            |err| error!(error = %err, "input stream error"),
            None,
        )
        .map_err(|e| CwError::Audio(e.to_string()))?;

    Ok(stream)
}

/// Run recorded samples through the analyser and engine.
///
/// One tick per `hop_size` samples, stamped on a clock derived from the
/// sample position so decoding does not depend on wall time. The engine is
/// started if it is not already running.
pub fn decode_samples<S: EventSink>(
    samples: &[f32],
    sample_rate: u32,
    analyser: &AnalyserConfig,
    hop_size: usize,
    engine: &mut CwEngine,
    sink: &mut S,
) -> CwResult<()> {
    if sample_rate == 0 {
        return Err(CwError::Audio("sample rate must be positive".to_string()));
    }
    let hop_size = hop_size.max(1);
    let mut analyser = SpectrumAnalyser::new(analyser.clone(), sample_rate);

    engine.start();
    let origin = Instant::now();
    let mut position: u64 = 0;

    for chunk in samples.chunks(hop_size) {
        analyser.push_samples(chunk);
        position += chunk.len() as u64;
        let at = origin + Duration::from_secs_f64(position as f64 / sample_rate as f64);
        engine.tick(&analyser.frame(), at, sink)?;
    }

    debug!(
        samples = samples.len(),
        seconds = samples.len() as f64 / sample_rate as f64,
        "decoded recording"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cw::{DecodedOnly, EngineConfig};

    #[test]
    fn test_zero_sample_rate_rejected() {
        let mut engine = CwEngine::new(EngineConfig::default()).unwrap();
        let mut sink = DecodedOnly::default();
        let result = decode_samples(&[0.0; 10], 0, &AnalyserConfig::default(), 256, &mut engine, &mut sink);
        assert!(matches!(result, Err(CwError::Audio(_))));
    }

    #[test]
    fn test_analyser_settings_replaced_before_start() {
        let handle = CaptureHandle::new(AnalyserConfig::default(), DEFAULT_HOP_SIZE).unwrap();
        assert_eq!(handle.analyser_settings(), (AnalyserConfig::default(), DEFAULT_HOP_SIZE));
        assert!(!handle.is_capturing());
        assert_eq!(handle.sample_rate(), 0);

        let short = AnalyserConfig {
            fft_size: 512,
            smoothing: 0.0,
            ..Default::default()
        };
        handle.set_analyser(short.clone(), 0);
        assert_eq!(handle.analyser_settings(), (short, 1));
        handle.stop().unwrap();
    }

    #[test]
    fn test_silence_decodes_nothing() {
        let mut engine = CwEngine::new(EngineConfig::default()).unwrap();
        let mut sink = DecodedOnly::default();
        decode_samples(&vec![0.0; 48000], 48000, &AnalyserConfig::default(), 256, &mut engine, &mut sink).unwrap();
        assert!(engine.is_running());
        assert!(sink.0.is_empty());
    }
}
