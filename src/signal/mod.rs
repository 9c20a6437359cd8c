//! Per-trace signal conditioning
//!
//! The preprocessing chain applied to every trace before it enters the
//! cross-correlation stack:
//!
//! 1. `detrend` - remove the least-squares affine trend
//! 2. `taper` - Tukey window
//! 3. Butterworth filtering ([`filter::Sos`], zero phase)
//! 4. `temporal_normalize` - running-mean amplitude normalization
//! 5. `frequency_whiten` - smoothed-spectrum whitening
//!
//! All operations take a real vector of a fixed run-wide length and return
//! one of the same length.

pub mod fft;
pub mod filter;
pub mod window;

pub use filter::{Band, FilterDesignError, Sos};

/// Floor for envelope and spectrum magnitudes before division.
pub const WATER_LEVEL: f32 = 1.0e-5;

/// Remove the ordinary-least-squares affine trend in place.
pub fn detrend(dat: &mut [f32]) {
    let n = dat.len();
    if n < 2 {
        return;
    }
    // OLS fit of y = a + b*x over x = 0..n-1; closed form from the moments.
    let nf = n as f64;
    let sum_x = nf * (nf - 1.0) * 0.5;
    let sum_xx = nf * (nf - 1.0) * (2.0 * nf - 1.0) / 6.0;
    let mut sum_y = 0.0f64;
    let mut sum_xy = 0.0f64;
    for (i, &v) in dat.iter().enumerate() {
        sum_y += v as f64;
        sum_xy += i as f64 * v as f64;
    }
    let denom = nf * sum_xx - sum_x * sum_x;
    let slope = (nf * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / nf;
    for (i, v) in dat.iter_mut().enumerate() {
        *v -= (intercept + slope * i as f64) as f32;
    }
}

/// Multiply by a Tukey window with taper fraction `ratio` in place.
pub fn taper(dat: &mut [f32], ratio: f64) {
    let w = window::tukey(dat.len(), ratio);
    for (v, wi) in dat.iter_mut().zip(w) {
        *v *= wi;
    }
}

/// Running-mean temporal normalization.
///
/// The envelope is the band-passed copy of the data (via `env_sos`),
/// rectified and smoothed with a centered moving average of `wt_size`
/// samples. The first and last `taper_len` envelope samples are replaced by
/// the nearest interior value so the window ramp-in does not leak into the
/// normalized trace. The data is then divided by `max(envelope, eps)`.
pub fn temporal_normalize(
    dat: &mut [f32],
    env_sos: &Sos,
    wt_size: usize,
    eps: f32,
    taper_len: usize,
) {
    let n = dat.len();
    if n == 0 {
        return;
    }
    let mut env = dat.to_vec();
    env_sos.apply_zero_phase(&mut env);
    for v in env.iter_mut() {
        *v = v.abs();
    }
    let mut env = window::moving_average(&env, wt_size);
    let t = taper_len.min(n.saturating_sub(1) / 2);
    if t > 0 {
        let head = env[t];
        let tail = env[n - 1 - t];
        for v in env[..t].iter_mut() {
            *v = head;
        }
        for v in env[n - t..].iter_mut() {
            *v = tail;
        }
    }
    for (v, e) in dat.iter_mut().zip(env) {
        *v /= e.max(eps);
    }
}

/// Spectral whitening against a smoothed copy of the own spectrum.
///
/// Works on the length-`fftsize` real FFT so that the retained band
/// `[k1, k2)` lines up with the pair accumulator's index interval. Bins
/// outside the band are zeroed; inside, each bin is divided by the centered
/// `wf_size`-bin moving average of the spectral magnitude (floored at
/// `eps`). The first and last `taper_len` output samples are cosine-ramped
/// to suppress the ringing the band edges introduce.
pub fn frequency_whiten(
    dat: &mut [f32],
    fftsize: usize,
    wf_size: usize,
    eps: f32,
    k1: usize,
    k2: usize,
    taper_len: usize,
) {
    let n = dat.len();
    if n == 0 {
        return;
    }
    let mut spectrum = fft::rfft(dat, fftsize);
    let nr = spectrum.len();
    let amp: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
    let smooth = window::moving_average(&amp, wf_size);
    let (k1, k2) = (k1.min(nr), k2.min(nr));
    for (k, bin) in spectrum.iter_mut().enumerate() {
        if k >= k1 && k < k2 {
            *bin /= smooth[k].max(eps);
        } else {
            *bin = num_complex::Complex::new(0.0, 0.0);
        }
    }
    let out = fft::irfft(&spectrum, fftsize);
    dat.copy_from_slice(&out[..n]);
    let t = taper_len.min(n / 2);
    if t > 0 {
        for i in 0..t {
            let w = 0.5 * (1.0 - (std::f64::consts::PI * i as f64 / t as f64).cos()) as f32;
            dat[i] *= w;
            dat[n - 1 - i] *= w;
        }
    }
}
