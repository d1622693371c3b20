//! # Pitch Estimation Module
//!
//! Monophonic fundamental-frequency estimation for the sampler worker. The
//! estimator is a YIN variant suited to singing voice:
//!
//! - RMS gate so silence never produces a reading
//! - absolute-threshold dip search walked to its local minimum
//! - clarity check to reject unpitched noise
//! - parabolic interpolation for sub-sample period accuracy
//!
//! A Hann-windowed FFT magnitude spectrum (via RustFFT) backs an optional
//! refinement step that snaps the rough time-domain estimate onto the
//! nearest spectral peak.

use std::cmp::Ordering;
use std::f32::consts::TAU;

use rustfft::{FftPlanner, num_complex::Complex};

/// CMNDF value below which a dip is taken as the period candidate.
const DIP_THRESHOLD: f32 = 0.15;

/// CMNDF value above which the best dip is considered too unclear to trust.
const CLARITY_CUTOFF: f32 = 0.2;

/// Estimates the fundamental frequency of one audio frame.
///
/// Returns the frequency in Hz together with a clarity score in `0..=1`
/// (1 = a perfectly periodic frame), or `None` when the frame is silence,
/// noise, or carries no audible pitch.
///
/// # Arguments
/// * `frame` - Input samples, mono
/// * `sample_rate` - Sample rate in Hz
/// * `amplitude_threshold` - Minimum RMS for the frame to count as audible
pub fn detect(frame: &[f32], sample_rate: u32, amplitude_threshold: f32) -> Option<(f32, f32)> {
    let len = frame.len();
    let half = len / 2;
    if half < 4 {
        return None;
    }

    // Noise gate: silent frames never yield a pitch.
    let rms = (frame.iter().map(|&s| s * s).sum::<f32>() / len as f32).sqrt();
    if rms < amplitude_threshold {
        return None;
    }

    // Difference function over half the frame.
    let mut cmndf = vec![0.0f32; half];
    for tau in 1..half {
        let mut acc = 0.0;
        for i in 0..half {
            let delta = frame[i] - frame[i + tau];
            acc += delta * delta;
        }
        cmndf[tau] = acc;
    }

    // Cumulative mean normalization (the "N" in CMNDF).
    cmndf[0] = 1.0;
    let mut running_sum = 0.0;
    for tau in 1..half {
        running_sum += cmndf[tau];
        cmndf[tau] = if running_sum > 0.0 {
            cmndf[tau] * tau as f32 / running_sum
        } else {
            1.0
        };
    }

    // First dip under the absolute threshold, walked down to its local
    // minimum so we land on the true period rather than its shoulder.
    let mut period = 0;
    let mut tau = 2;
    while tau < half {
        if cmndf[tau] < DIP_THRESHOLD {
            while tau + 1 < half && cmndf[tau + 1] < cmndf[tau] {
                tau += 1;
            }
            period = tau;
            break;
        }
        tau += 1;
    }
    if period == 0 {
        // Nothing crossed the threshold; fall back to the global minimum
        // and let the clarity check decide whether it is real.
        period = cmndf
            .iter()
            .enumerate()
            .skip(2)
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
            .map(|(i, _)| i)?;
    }

    let dip = cmndf[period];
    if dip > CLARITY_CUTOFF {
        return None;
    }

    // Parabolic interpolation around the dip for sub-sample accuracy.
    let period_f = if period + 1 < half {
        let y1 = cmndf[period - 1];
        let y2 = cmndf[period];
        let y3 = cmndf[period + 1];
        let denom = y1 - 2.0 * y2 + y3;
        if denom.abs() > f32::EPSILON {
            period as f32 + (y1 - y3) / (2.0 * denom)
        } else {
            period as f32
        }
    } else {
        period as f32
    };

    let frequency = sample_rate as f32 / period_f;
    let clarity = (1.0 - dip).clamp(0.0, 1.0);

    // Only audible, finite results leave this function.
    (frequency.is_finite() && frequency > 20.0).then_some((frequency, clarity))
}

/// Computes the Hann-windowed magnitude spectrum of a frame.
///
/// The mean is removed first so a DC offset cannot masquerade as low-end
/// energy. Only the first half of the spectrum (up to Nyquist) is returned.
pub fn magnitude_spectrum(frame: &[f32]) -> Vec<f32> {
    let len = frame.len();
    if len < 2 {
        return Vec::new();
    }
    let mean = frame.iter().sum::<f32>() / len as f32;
    let window_denom = (len - 1) as f32;

    let mut buffer: Vec<Complex<f32>> = frame
        .iter()
        .enumerate()
        .map(|(i, &sample)| {
            let window = 0.5 * (1.0 - (TAU * i as f32 / window_denom).cos());
            Complex {
                re: (sample - mean) * window,
                im: 0.0,
            }
        })
        .collect();

    FftPlanner::new().plan_fft_forward(len).process(&mut buffer);

    buffer.iter().take(len / 2).map(|c| c.norm()).collect()
}

/// Snaps a rough frequency estimate onto the nearest spectral peak.
///
/// Searches two bins either side of the rough estimate in the magnitude
/// spectrum and interpolates the peak position on log magnitudes. Returns
/// `None` when no usable peak exists; callers fall back to the rough value.
pub fn refine(magnitudes: &[f32], rough_hz: f32, sample_rate: u32) -> Option<f32> {
    if rough_hz <= 0.0 || magnitudes.len() < 3 {
        return None;
    }
    let fft_size = magnitudes.len() * 2;
    let bin_hz = sample_rate as f32 / fft_size as f32;

    let center = (rough_hz / bin_hz).round() as isize;
    let lo = (center - 2).max(1) as usize;
    let hi = ((center + 2).max(0) as usize).min(magnitudes.len().saturating_sub(2));
    if lo > hi {
        return None;
    }

    let peak = (lo..=hi).max_by(|&a, &b| {
        magnitudes[a]
            .partial_cmp(&magnitudes[b])
            .unwrap_or(Ordering::Equal)
    })?;

    let y1 = magnitudes[peak - 1].ln();
    let y2 = magnitudes[peak].ln();
    let y3 = magnitudes[peak + 1].ln();
    if !(y1.is_finite() && y2.is_finite() && y3.is_finite()) {
        return None;
    }

    let denom = 2.0 * y2 - y1 - y3;
    if denom.abs() < 1e-6 {
        return None;
    }
    let shift = (y3 - y1) / (2.0 * denom);

    let refined = (peak as f32 + shift) * bin_hz;
    (refined.is_finite() && refined > 0.0).then_some(refined)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44_100;
    const FRAME: usize = 2048;

    fn sine(frequency: f32, amplitude: f32) -> Vec<f32> {
        (0..FRAME)
            .map(|i| amplitude * (TAU * frequency * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    #[test]
    fn detects_a_pure_tone() {
        for target in [220.0, 261.63, 440.0] {
            let frame = sine(target, 0.5);
            let (hz, clarity) = detect(&frame, SAMPLE_RATE, 0.01).unwrap();
            assert!((hz - target).abs() < 1.0, "expected ~{target}, got {hz}");
            assert!(clarity > 0.9, "clarity {clarity} too low for a pure tone");
        }
    }

    #[test]
    fn silence_yields_nothing() {
        let frame = vec![0.0; FRAME];
        assert_eq!(detect(&frame, SAMPLE_RATE, 0.01), None);
    }

    #[test]
    fn quiet_signal_is_gated_out() {
        let frame = sine(440.0, 0.001);
        assert_eq!(detect(&frame, SAMPLE_RATE, 0.01), None);
    }

    #[test]
    fn refinement_stays_on_the_true_peak() {
        let frame = sine(440.0, 0.5);
        let magnitudes = magnitude_spectrum(&frame);
        // Hand the refiner a deliberately sloppy rough estimate.
        let refined = refine(&magnitudes, 452.0, SAMPLE_RATE).unwrap();
        assert!((refined - 440.0).abs() < 5.0, "got {refined}");
    }

    #[test]
    fn refine_rejects_nonsense_input() {
        assert_eq!(refine(&[], 440.0, SAMPLE_RATE), None);
        let magnitudes = magnitude_spectrum(&sine(440.0, 0.5));
        assert_eq!(refine(&magnitudes, -1.0, SAMPLE_RATE), None);
    }
}
