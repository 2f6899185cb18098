//! End to end: keyed audio -> analyser -> engine -> events

use std::thread;

use cw_listen::audio::{decode_samples, key_text, read_wav, write_wav, AnalyserConfig, Keying};
use cw_listen::cw::{AlphabetMode, CwEngine, DecodeEvent, DecodedOnly, EngineConfig, GapMarker, ThresholdMode};
use cw_listen::Transcript;

const SAMPLE_RATE: u32 = 48000;
const HOP: usize = 256;

/// Short window and no smoothing so tone edges stay within ~10 ms
fn analyser() -> AnalyserConfig {
    AnalyserConfig {
        fft_size: 512,
        smoothing: 0.0,
        min_db: -100.0,
        max_db: -30.0,
        highpass_hz: None,
    }
}

/// 20 WPM: dot 60, dash 180, dot/dash boundary 90, char gap 120, word gap 420
fn engine_config() -> EngineConfig {
    EngineConfig {
        center_freq_hz: 1600.0,
        bandwidth_hz: 200.0,
        wpm: 20.0,
        dash_dot_ratio: 3.0,
        pause_multiplier: 2.0,
        threshold_mode: ThresholdMode::Static,
        static_threshold: 40.0,
        min_tone_ms: 20.0,
        ..Default::default()
    }
}

fn keying() -> Keying {
    Keying {
        wpm: 20.0,
        dash_dot_ratio: 3.0,
        // a little wider than 7 dots so window smear cannot shorten it below the boundary
        word_gap_dots: 9.0,
        ..Default::default()
    }
}

fn decode(samples: &[f32], config: EngineConfig) -> Vec<DecodeEvent> {
    let mut engine = CwEngine::new(config).unwrap();
    let mut sink = DecodedOnly::default();
    decode_samples(samples, SAMPLE_RATE, &analyser(), HOP, &mut engine, &mut sink).unwrap();
    sink.0
}

fn text_of(events: &[DecodeEvent]) -> String {
    let mut transcript = Transcript::new();
    for event in events {
        transcript.push(event);
    }
    transcript.full_text()
}

/// Deterministic low-level hiss
fn hiss(len: usize, amplitude: f32) -> Vec<f32> {
    let mut state: u32 = 0x1234_5678;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * amplitude
        })
        .collect()
}

#[test]
fn test_sos_decodes_with_single_word_marker() {
    let samples = key_text("SOS", &keying(), 1600.0, SAMPLE_RATE);
    let events = decode(&samples, engine_config());

    assert_eq!(
        events,
        vec![
            DecodeEvent::Symbol {
                character: 'S',
                sequence: "...".to_string()
            },
            DecodeEvent::Symbol {
                character: 'O',
                sequence: "---".to_string()
            },
            DecodeEvent::Symbol {
                character: 'S',
                sequence: "...".to_string()
            },
            DecodeEvent::Gap(GapMarker::Word),
        ]
    );
    assert_eq!(text_of(&events), "SOS / ");
}

#[test]
fn test_two_words() {
    let samples = key_text("CQ DE", &keying(), 1600.0, SAMPLE_RATE);
    let events = decode(&samples, engine_config());
    assert_eq!(text_of(&events), "CQ / DE / ");
}

#[test]
fn test_digits_mode() {
    let samples = key_text("73", &keying(), 1600.0, SAMPLE_RATE);
    let config = EngineConfig {
        alphabet_mode: AlphabetMode::Digits,
        ..engine_config()
    };
    assert_eq!(text_of(&decode(&samples, config)), "73 / ");
}

#[test]
fn test_letters_mode_does_not_decode_digits() {
    let samples = key_text("5", &keying(), 1600.0, SAMPLE_RATE);
    let events = decode(&samples, engine_config());
    assert_eq!(
        events[0],
        DecodeEvent::Symbol {
            character: '?',
            sequence: ".....".to_string()
        }
    );
}

#[test]
fn test_tone_outside_band_is_ignored() {
    let samples = key_text("SOS", &keying(), 9000.0, SAMPLE_RATE);
    assert!(decode(&samples, engine_config()).is_empty());
}

#[test]
fn test_adaptive_threshold_tracks_hiss() {
    let keyed = key_text("SOS", &keying(), 1600.0, SAMPLE_RATE);
    let noise = hiss(keyed.len(), 0.01);
    let samples: Vec<f32> = keyed.iter().zip(&noise).map(|(s, n)| s + n).collect();

    let config = EngineConfig {
        threshold_mode: ThresholdMode::Adaptive,
        adaptive_multiplier: 2.0,
        ..engine_config()
    };
    assert_eq!(text_of(&decode(&samples, config)), "SOS / ");
}

#[test]
fn test_adaptive_threshold_with_default_analyser() {
    // default window starts zero-filled and smears edges by ~130 ms, so key at 2 WPM
    let slow = Keying {
        wpm: 2.0,
        tail_ms: 6000.0,
        ..keying()
    };
    let keyed = key_text("SOS", &slow, 1600.0, SAMPLE_RATE);
    let noise = hiss(keyed.len(), 0.01);
    let samples: Vec<f32> = keyed.iter().zip(&noise).map(|(s, n)| s + n).collect();

    let config = EngineConfig {
        wpm: 2.0,
        bandwidth_hz: 100.0,
        threshold_mode: ThresholdMode::Adaptive,
        adaptive_multiplier: 2.0,
        ..engine_config()
    };
    let mut engine = CwEngine::new(config).unwrap();
    let mut sink = DecodedOnly::default();
    decode_samples(&samples, SAMPLE_RATE, &AnalyserConfig::default(), HOP, &mut engine, &mut sink).unwrap();

    assert_eq!(text_of(&sink.0), "SOS / ");
    assert!(engine.threshold().noise_floor().unwrap() > 10.0);
    assert!(!engine.tracker().is_tone_active());
}

#[test]
fn test_static_threshold_locked_by_hiss() {
    // hiss alone sits above a static level of 40, so the tone never ends
    let keyed = key_text("E", &keying(), 1600.0, SAMPLE_RATE);
    let noise = hiss(keyed.len(), 0.01);
    let samples: Vec<f32> = keyed.iter().zip(&noise).map(|(s, n)| s + n).collect();
    assert!(decode(&samples, engine_config()).is_empty());
}

#[test]
fn test_wav_round_trip_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sos.wav");
    write_wav(&path, &key_text("SOS", &keying(), 1600.0, SAMPLE_RATE), SAMPLE_RATE).unwrap();

    let (samples, rate) = read_wav(&path).unwrap();
    assert_eq!(rate, SAMPLE_RATE);
    assert_eq!(text_of(&decode(&samples, engine_config())), "SOS / ");
}

#[test]
fn test_events_forwarded_over_channel() {
    let samples = key_text("SOS", &keying(), 1600.0, SAMPLE_RATE);
    let (mut tx, rx) = crossbeam_channel::unbounded::<DecodeEvent>();

    let worker = thread::spawn(move || {
        let mut engine = CwEngine::new(engine_config()).unwrap();
        decode_samples(&samples, SAMPLE_RATE, &analyser(), HOP, &mut engine, &mut tx).unwrap();
    });
    worker.join().unwrap();

    let events: Vec<DecodeEvent> = rx.try_iter().collect();
    let toggles = events
        .iter()
        .filter(|e| matches!(e, DecodeEvent::RawToggle { .. }))
        .count();
    assert!(toggles > 100);

    let decoded: Vec<DecodeEvent> = events
        .into_iter()
        .filter(|e| !matches!(e, DecodeEvent::RawToggle { .. }))
        .collect();
    assert_eq!(text_of(&decoded), "SOS / ");
}

#[test]
fn test_speed_change_between_recordings() {
    let mut engine = CwEngine::new(engine_config()).unwrap();
    let mut sink = DecodedOnly::default();

    let slow = Keying {
        wpm: 12.0,
        ..keying()
    };
    engine.set_speed(12.0);
    engine.set_shape(3.0, 2.0);
    decode_samples(
        &key_text("K", &slow, 1600.0, SAMPLE_RATE),
        SAMPLE_RATE,
        &analyser(),
        HOP,
        &mut engine,
        &mut sink,
    )
    .unwrap();

    assert_eq!(text_of(&sink.0), "K / ");
    assert_eq!(engine.timing().dot_duration_ms, 100.0);
}
