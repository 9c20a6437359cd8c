//! Working half-spectrum interval for a band-pass response
//!
//! Cross-correlation accumulation and whitening only touch the part of the
//! half-spectrum the post-stack band-pass will keep anyway. The interval is
//! measured from the implemented filter itself: band-pass a unit impulse,
//! look at where its spectrum rises above a small fraction of its peak.

use crate::signal::{fft, Band, FilterDesignError, Sos};

/// Fraction of the peak response below which spectral content is treated
/// as negligible.
pub const CRITICAL_LEVEL: f32 = 1.0e-3;

/// Half-spectrum index interval `[i1, i2)` over which the zero-phase
/// band-pass `(f1, f2)` at sample rate `rate` keeps more than
/// `critical * max` of its peak amplitude, for a real FFT of `fftsize`.
///
/// `i1` is the first bin above threshold; `i2` the first bin at or after
/// `i1` back at or below it, clipped to `fftsize/2 + 1`.
pub fn band_bounds(
    fftsize: usize,
    rate: f64,
    f1: f64,
    f2: f64,
    critical: f32,
) -> Result<(usize, usize), FilterDesignError> {
    let sos = Sos::design(Band::Bandpass, f1, f2, rate)?;
    let mut impulse = vec![0.0f32; fftsize];
    impulse[0] = 1.0;
    sos.apply_zero_phase(&mut impulse);
    let amp: Vec<f32> = fft::rfft(&impulse, fftsize).iter().map(|c| c.norm()).collect();
    let half = fftsize / 2 + 1;
    let peak = amp.iter().fold(0.0f32, |a, &b| a.max(b));
    let threshold = peak * critical;
    let i1 = amp.iter().position(|&a| a > threshold).unwrap_or(0);
    let i2 = amp[i1..]
        .iter()
        .position(|&a| a <= threshold)
        .map(|off| i1 + off)
        .unwrap_or(half)
        .min(half);
    Ok((i1, i2))
}
