use crate::error::{CwError, CwResult};

/// One tick of spectral data from the capture side.
///
/// Magnitudes are byte-scaled (0-255), one per frequency bin covering
/// 0 Hz up to Nyquist.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub magnitudes: Vec<u8>,
    pub sample_rate: u32,
    pub bin_count: usize,
}

impl SpectrumFrame {
    pub fn new(magnitudes: Vec<u8>, sample_rate: u32) -> Self {
        let bin_count = magnitudes.len();
        Self {
            magnitudes,
            sample_rate,
            bin_count,
        }
    }

    /// Width of one bin in Hz
    pub fn freq_per_bin(&self) -> f32 {
        (self.sample_rate as f32 / 2.0) / self.bin_count as f32
    }

    fn validate(&self) -> CwResult<()> {
        if self.bin_count == 0 {
            return Err(CwError::InvalidFrame("bin count is 0".to_string()));
        }
        if self.magnitudes.len() != self.bin_count {
            return Err(CwError::InvalidFrame(format!(
                "{} magnitudes for {} bins",
                self.magnitudes.len(),
                self.bin_count
            )));
        }
        if self.sample_rate == 0 {
            return Err(CwError::InvalidFrame("sample rate is 0".to_string()));
        }
        Ok(())
    }
}

/// Carrier band the receiver listens to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandConfig {
    center_freq_hz: f32,
    bandwidth_hz: f32,
}

impl BandConfig {
    pub fn new(center_freq_hz: f32, bandwidth_hz: f32) -> CwResult<Self> {
        if !bandwidth_hz.is_finite() || bandwidth_hz <= 0.0 {
            return Err(CwError::InvalidBand(format!(
                "bandwidth must be positive, got {} Hz",
                bandwidth_hz
            )));
        }
        if !center_freq_hz.is_finite() || center_freq_hz < 0.0 {
            return Err(CwError::InvalidBand(format!(
                "centre frequency must be non-negative, got {} Hz",
                center_freq_hz
            )));
        }
        Ok(Self {
            center_freq_hz,
            bandwidth_hz,
        })
    }

    pub fn center_freq_hz(&self) -> f32 {
        self.center_freq_hz
    }

    pub fn bandwidth_hz(&self) -> f32 {
        self.bandwidth_hz
    }

    /// Inclusive bin range `(low, high)` covered by this band in `frame`.
    ///
    /// Fails when the centre lies at or above Nyquist, since no range with
    /// `low <= high < bin_count` can be centred there.
    pub fn bin_range(&self, frame: &SpectrumFrame) -> CwResult<(usize, usize)> {
        frame.validate()?;

        let freq_per_bin = frame.freq_per_bin();
        let center_bin = (self.center_freq_hz / freq_per_bin).floor() as usize;
        if center_bin >= frame.bin_count {
            return Err(CwError::InvalidBand(format!(
                "centre {} Hz is beyond Nyquist ({} Hz)",
                self.center_freq_hz,
                frame.sample_rate / 2
            )));
        }

        let half_width = ((self.bandwidth_hz / 2.0) / freq_per_bin).ceil() as usize;
        let low = center_bin.saturating_sub(half_width);
        let high = center_bin.saturating_add(half_width).min(frame.bin_count - 1);
        Ok((low, high))
    }
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            center_freq_hz: 1600.0,
            bandwidth_hz: 100.0,
        }
    }
}

/// Mean magnitude over the band: the activity level every later stage reads.
pub fn band_level(frame: &SpectrumFrame, band: &BandConfig) -> CwResult<f32> {
    let (low, high) = band.bin_range(frame)?;
    let bins = &frame.magnitudes[low..=high];
    let sum: u32 = bins.iter().map(|&m| m as u32).sum();
    Ok(sum as f32 / bins.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(bin_count: usize, sample_rate: u32, f: impl Fn(usize) -> u8) -> SpectrumFrame {
        SpectrumFrame::new((0..bin_count).map(f).collect(), sample_rate)
    }

    #[test]
    fn test_bin_range_matches_formula() {
        // 48 kHz / 1024 bins => 23.4375 Hz per bin
        let frame = frame_with(1024, 48000, |_| 0);
        let band = BandConfig::new(1600.0, 100.0).unwrap();
        // centre bin = floor(1600 / 23.4375) = 68, range = ceil(50 / 23.4375) = 3
        assert_eq!(band.bin_range(&frame).unwrap(), (65, 71));
    }

    #[test]
    fn test_level_is_band_mean() {
        let frame = frame_with(1024, 48000, |i| if (65..=71).contains(&i) { 210 } else { 3 });
        let band = BandConfig::new(1600.0, 100.0).unwrap();
        assert!((band_level(&frame, &band).unwrap() - 210.0).abs() < 1e-3);
    }

    #[test]
    fn test_range_clamped_at_edges() {
        let frame = frame_with(16, 1600, |i| i as u8);
        // 50 Hz per bin, centre at bin 0, half width 4 bins
        let band = BandConfig::new(10.0, 400.0).unwrap();
        assert_eq!(band.bin_range(&frame).unwrap(), (0, 4));

        let band = BandConfig::new(790.0, 400.0).unwrap();
        assert_eq!(band.bin_range(&frame).unwrap(), (11, 15));
        assert!((band_level(&frame, &band).unwrap() - 13.0).abs() < 1e-3);
    }

    #[test]
    fn test_huge_bandwidth_covers_whole_spectrum() {
        let frame = frame_with(1024, 48000, |_| 7);
        let band = BandConfig::new(1600.0, 1e30).unwrap();
        assert_eq!(band.bin_range(&frame).unwrap(), (0, 1023));
        assert!((band_level(&frame, &band).unwrap() - 7.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_bins_fails_fast() {
        let frame = SpectrumFrame::new(Vec::new(), 48000);
        let err = band_level(&frame, &BandConfig::default()).unwrap_err();
        assert!(matches!(err, CwError::InvalidFrame(_)));
    }

    #[test]
    fn test_mismatched_frame_fails_fast() {
        let mut frame = frame_with(512, 48000, |_| 0);
        frame.bin_count = 1024;
        assert!(matches!(
            band_level(&frame, &BandConfig::default()),
            Err(CwError::InvalidFrame(_))
        ));

        let frame = frame_with(512, 0, |_| 0);
        assert!(matches!(
            band_level(&frame, &BandConfig::default()),
            Err(CwError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_centre_above_nyquist_rejected() {
        let frame = frame_with(256, 8000, |_| 0);
        let band = BandConfig::new(4500.0, 100.0).unwrap();
        assert!(matches!(band.bin_range(&frame), Err(CwError::InvalidBand(_))));
    }

    #[test]
    fn test_bandwidth_must_be_positive() {
        assert!(BandConfig::new(1600.0, 0.0).is_err());
        assert!(BandConfig::new(1600.0, -20.0).is_err());
        assert!(BandConfig::new(f32::NAN, 100.0).is_err());
    }
}
