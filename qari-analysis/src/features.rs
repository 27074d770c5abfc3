//! Acoustic feature extraction for the tajweed detectors
//!
//! Features are computed once per request from the normalized 16 kHz
//! mono samples and shared read-only by all detectors: an RMS envelope
//! for duration/burst measures, and narrow-band energy (Goertzel) for
//! the nasalization measures. All measures are deterministic functions
//! of the samples.

use crate::audio::DecodedAudio;

/// RMS frame length in samples (16 ms at 16 kHz)
const FRAME_LEN: usize = 256;
/// Hop between RMS frames in samples (4 ms at 16 kHz)
const HOP_LEN: usize = 64;

/// Nasal formant band probed for ghunnah (Hz)
const NASAL_BAND: [f32; 5] = [250.0, 300.0, 350.0, 400.0, 450.0];
/// Reference band covering the speech spectrum (Hz)
const SPEECH_BAND: [f32; 8] = [100.0, 350.0, 600.0, 850.0, 1100.0, 1400.0, 1700.0, 2000.0];

/// Sample amplitude treated as clipping
const CLIP_LEVEL: f32 = 0.999;

/// Per-recording acoustic features
#[derive(Debug, Clone)]
pub struct AudioFeatures {
    sample_rate: u32,
    samples: Vec<f32>,
    /// RMS envelope, one value per hop
    rms: Vec<f32>,
    /// Fraction of samples at or above the clip level
    clipped_fraction: f64,
}

impl AudioFeatures {
    /// Extract features from a normalized recording
    pub fn extract(audio: &DecodedAudio) -> Self {
        let samples = audio.samples.clone();
        let rms = rms_envelope(&samples);
        let clipped = samples.iter().filter(|s| s.abs() >= CLIP_LEVEL).count();
        let clipped_fraction = if samples.is_empty() {
            0.0
        } else {
            clipped as f64 / samples.len() as f64
        };

        Self {
            sample_rate: audio.sample_rate,
            samples,
            rms,
            clipped_fraction,
        }
    }

    /// Whether acoustic measures can be trusted
    ///
    /// Degraded input (clipped or empty) makes the acoustic detectors
    /// fail closed: suppress emission rather than guess.
    pub fn usable(&self, max_clipped_fraction: f64) -> bool {
        !self.samples.is_empty() && self.clipped_fraction <= max_clipped_fraction
    }

    pub fn clipped_fraction(&self) -> f64 {
        self.clipped_fraction
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// RMS frame index range covering [start, end] seconds
    fn frame_range(&self, start_secs: f64, end_secs: f64) -> (usize, usize) {
        let to_frame = |secs: f64| -> usize {
            ((secs.max(0.0) * self.sample_rate as f64) as usize) / HOP_LEN
        };
        let lo = to_frame(start_secs).min(self.rms.len());
        let hi = to_frame(end_secs).min(self.rms.len());
        (lo, hi.max(lo))
    }

    /// Duration (seconds) of voiced audio within a window: frames whose
    /// RMS exceeds `rel_threshold` times the window mean
    pub fn voiced_duration(&self, start_secs: f64, end_secs: f64, rel_threshold: f32) -> f64 {
        let (lo, hi) = self.frame_range(start_secs, end_secs);
        let window = &self.rms[lo..hi];
        if window.is_empty() {
            return 0.0;
        }
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        let threshold = mean * rel_threshold;
        let voiced = window.iter().filter(|r| **r > threshold).count();
        voiced as f64 * HOP_LEN as f64 / self.sample_rate as f64
    }

    /// Peak and mean RMS over a window
    pub fn peak_mean_rms(&self, start_secs: f64, end_secs: f64) -> (f64, f64) {
        let (lo, hi) = self.frame_range(start_secs, end_secs);
        let window = &self.rms[lo..hi];
        if window.is_empty() {
            return (0.0, 0.0);
        }
        let peak = window.iter().cloned().fold(0.0f32, f32::max);
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        (peak as f64, mean as f64)
    }

    /// Peak/mean RMS burst ratio over a window; the qalqalah bounce
    /// shows as a sharp energy spike over a quiet release
    pub fn burst_ratio(&self, start_secs: f64, end_secs: f64) -> f64 {
        let (peak, mean) = self.peak_mean_rms(start_secs, end_secs);
        peak / (mean + 1e-6)
    }

    /// Ratio of nasal-band energy to overall speech-band energy over a
    /// window; nasalization concentrates energy around 250-450 Hz
    pub fn nasal_ratio(&self, start_secs: f64, end_secs: f64) -> f64 {
        let lo = ((start_secs.max(0.0) * self.sample_rate as f64) as usize).min(self.samples.len());
        let hi = ((end_secs.max(0.0) * self.sample_rate as f64) as usize).min(self.samples.len());
        let window = &self.samples[lo..hi.max(lo)];
        if window.len() < FRAME_LEN {
            return 0.0;
        }

        let nasal: f64 = NASAL_BAND
            .iter()
            .map(|f| goertzel_power(window, *f, self.sample_rate))
            .sum::<f64>()
            / NASAL_BAND.len() as f64;
        let speech: f64 = SPEECH_BAND
            .iter()
            .map(|f| goertzel_power(window, *f, self.sample_rate))
            .sum::<f64>()
            / SPEECH_BAND.len() as f64;

        if speech <= 0.0 {
            return 0.0;
        }
        nasal / speech
    }
}

/// RMS envelope with fixed frame/hop
fn rms_envelope(samples: &[f32]) -> Vec<f32> {
    if samples.len() < FRAME_LEN {
        return Vec::new();
    }
    let mut rms = Vec::with_capacity(samples.len() / HOP_LEN);
    let mut start = 0;
    while start + FRAME_LEN <= samples.len() {
        let frame = &samples[start..start + FRAME_LEN];
        let energy: f32 = frame.iter().map(|s| s * s).sum();
        rms.push((energy / FRAME_LEN as f32).sqrt());
        start += HOP_LEN;
    }
    rms
}

/// Power at a single frequency via the Goertzel algorithm
fn goertzel_power(samples: &[f32], freq_hz: f32, sample_rate: u32) -> f64 {
    let omega = 2.0 * std::f64::consts::PI * freq_hz as f64 / sample_rate as f64;
    let coeff = 2.0 * omega.cos();
    let mut s_prev = 0.0f64;
    let mut s_prev2 = 0.0f64;
    for sample in samples {
        let s = *sample as f64 + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }
    let power = s_prev2 * s_prev2 + s_prev * s_prev - coeff * s_prev * s_prev2;
    power.max(0.0) / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DecodedAudio, TARGET_SAMPLE_RATE};

    fn tone(freq: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
        let n = (TARGET_SAMPLE_RATE as f32 * duration_secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / TARGET_SAMPLE_RATE as f32;
                (2.0 * std::f32::consts::PI * freq * t).sin() * amplitude
            })
            .collect()
    }

    fn audio(samples: Vec<f32>) -> DecodedAudio {
        DecodedAudio {
            samples,
            sample_rate: TARGET_SAMPLE_RATE,
        }
    }

    #[test]
    fn test_voiced_duration_of_sustained_tone() {
        // 0.5s tone followed by 0.5s silence
        let mut samples = tone(300.0, 0.5, 0.5);
        samples.extend(vec![0.0f32; (TARGET_SAMPLE_RATE / 2) as usize]);
        let features = AudioFeatures::extract(&audio(samples));

        let voiced = features.voiced_duration(0.0, 1.0, 0.5);
        assert!(voiced > 0.4 && voiced < 0.6, "voiced = {}", voiced);
    }

    #[test]
    fn test_nasal_ratio_high_for_nasal_band_tone() {
        let features = AudioFeatures::extract(&audio(tone(350.0, 0.3, 0.5)));
        let nasal = features.nasal_ratio(0.0, 0.3);

        let features_high = AudioFeatures::extract(&audio(tone(1500.0, 0.3, 0.5)));
        let not_nasal = features_high.nasal_ratio(0.0, 0.3);

        assert!(nasal > not_nasal, "nasal={} not_nasal={}", nasal, not_nasal);
        assert!(nasal > 0.5);
    }

    #[test]
    fn test_burst_ratio_spikes_on_transient() {
        // Quiet hum with a loud burst in the middle
        let mut samples = tone(200.0, 0.3, 0.05);
        let burst_start = samples.len() / 2;
        for s in samples.iter_mut().skip(burst_start).take(512) {
            *s *= 12.0;
        }
        let features = AudioFeatures::extract(&audio(samples));
        assert!(features.burst_ratio(0.0, 0.3) > 1.5);
    }

    #[test]
    fn test_clipped_audio_unusable() {
        let samples = vec![1.0f32; TARGET_SAMPLE_RATE as usize];
        let features = AudioFeatures::extract(&audio(samples));
        assert!(!features.usable(0.01));
        assert!(features.clipped_fraction() > 0.9);
    }

    #[test]
    fn test_empty_window_measures_are_zero() {
        let features = AudioFeatures::extract(&audio(tone(300.0, 0.2, 0.5)));
        assert_eq!(features.voiced_duration(5.0, 6.0, 0.5), 0.0);
        assert_eq!(features.nasal_ratio(5.0, 6.0), 0.0);
    }

    #[test]
    fn test_determinism() {
        let samples = tone(440.0, 0.25, 0.4);
        let a = AudioFeatures::extract(&audio(samples.clone()));
        let b = AudioFeatures::extract(&audio(samples));
        assert_eq!(a.nasal_ratio(0.0, 0.25), b.nasal_ratio(0.0, 0.25));
        assert_eq!(
            a.voiced_duration(0.0, 0.25, 0.5),
            b.voiced_duration(0.0, 0.25, 0.5)
        );
    }
}
