use std::collections::VecDeque;
use std::f32::consts::{FRAC_1_SQRT_2, PI};
use std::sync::Arc;

use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Type};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tracing::warn;

use crate::cw::SpectrumFrame;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Analyser parameters, the same knobs a browser `AnalyserNode` exposes
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    /// Averaging constant over time, 0 = none
    pub smoothing: f32,
    /// Level mapped to byte 0
    pub min_db: f32,
    /// Level mapped to byte 255
    pub max_db: f32,
    /// High-pass cut-off applied before the FFT
    pub highpass_hz: Option<f32>,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
            highpass_hz: Some(1200.0),
        }
    }
}

fn valid_fft_size(size: usize) -> usize {
    size.clamp(MIN_FFT_SIZE, MAX_FFT_SIZE).next_power_of_two()
}

fn blackman(n: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f32 / n as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

/// Turns mono PCM into byte-scaled magnitude spectra
pub struct SpectrumAnalyser {
    config: AnalyserConfig,
    sample_rate: u32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    history: VecDeque<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    highpass: Option<DirectForm1<f32>>,
}

impl SpectrumAnalyser {
    pub fn new(mut config: AnalyserConfig, sample_rate: u32) -> Self {
        let size = valid_fft_size(config.fft_size);
        if size != config.fft_size {
            warn!(requested = config.fft_size, using = size, "fft size adjusted");
            config.fft_size = size;
        }
        if !(config.max_db > config.min_db) {
            let defaults = AnalyserConfig::default();
            warn!(min_db = config.min_db, max_db = config.max_db, "invalid decibel range, using defaults");
            config.min_db = defaults.min_db;
            config.max_db = defaults.max_db;
        }
        config.smoothing = if config.smoothing.is_nan() {
            0.0
        } else {
            config.smoothing.clamp(0.0, 0.99)
        };

        let highpass = config
            .highpass_hz
            .and_then(|hz| Self::highpass_filter(hz, sample_rate));

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);

        Self {
            sample_rate,
            fft,
            window: blackman(size),
            history: std::iter::repeat(0.0).take(size).collect(),
            smoothed: vec![0.0; size / 2],
            scratch: vec![Complex::new(0.0, 0.0); size],
            highpass,
            config,
        }
    }

    fn highpass_filter(frequency: f32, sample_rate: u32) -> Option<DirectForm1<f32>> {
        let fs = (sample_rate as f32).hz();
        match Coefficients::<f32>::from_params(Type::HighPass, fs, frequency.hz(), FRAC_1_SQRT_2) {
            Ok(coefficients) => Some(DirectForm1::<f32>::new(coefficients)),
            Err(e) => {
                warn!(frequency, sample_rate, error = ?e, "high-pass disabled");
                None
            }
        }
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Feed new samples; only the latest `fft_size` are kept
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            let sample = match self.highpass.as_mut() {
                Some(filter) => filter.run(sample),
                None => sample,
            };
            self.history.pop_front();
            self.history.push_back(sample);
        }
    }

    /// Spectrum of the current window
    pub fn frame(&mut self) -> SpectrumFrame {
        let n = self.config.fft_size;
        for (i, (sample, w)) in self.history.iter().zip(&self.window).enumerate() {
            self.scratch[i] = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.config.smoothing;
        let min_db = self.config.min_db;
        let scale = 255.0 / (self.config.max_db - min_db);

        let magnitudes = self
            .smoothed
            .iter_mut()
            .zip(&self.scratch)
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() / n as f32;
                *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
                let db = 20.0 * smoothed.log10();
                // -inf and NaN both saturate to 0
                (scale * (db - min_db)).clamp(0.0, 255.0) as u8
            })
            .collect();

        SpectrumFrame::new(magnitudes, self.sample_rate)
    }

    /// Forget all audio and smoothing state
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        if let Some(hz) = self.config.highpass_hz {
            self.highpass = Self::highpass_filter(hz, self.sample_rate);
        }
    }
}
