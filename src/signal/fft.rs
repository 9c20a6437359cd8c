//! Real FFT utilities
//!
//! Thin wrappers over `realfft` with process-wide plan caches, so every
//! trace and every stack row of the same length reuses one plan.

use num_complex::Complex;
use once_cell::sync::Lazy;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Cache of forward (real-to-complex) plans keyed by FFT length
static FORWARD_CACHE: Lazy<Mutex<HashMap<usize, Arc<dyn RealToComplex<f32>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Cache of inverse (complex-to-real) plans keyed by FFT length
static INVERSE_CACHE: Lazy<Mutex<HashMap<usize, Arc<dyn ComplexToReal<f32>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn forward_plan(n: usize) -> Arc<dyn RealToComplex<f32>> {
    let mut cache = FORWARD_CACHE.lock().unwrap();
    if let Some(plan) = cache.get(&n) {
        return Arc::clone(plan);
    }
    let plan = RealFftPlanner::<f32>::new().plan_fft_forward(n);
    cache.insert(n, Arc::clone(&plan));
    plan
}

fn inverse_plan(n: usize) -> Arc<dyn ComplexToReal<f32>> {
    let mut cache = INVERSE_CACHE.lock().unwrap();
    if let Some(plan) = cache.get(&n) {
        return Arc::clone(plan);
    }
    let plan = RealFftPlanner::<f32>::new().plan_fft_inverse(n);
    cache.insert(n, Arc::clone(&plan));
    plan
}

/// Forward real FFT of length `n`.
///
/// `dat` is zero-padded (or truncated) to `n` samples; the returned
/// half-spectrum has `n/2 + 1` bins.
pub fn rfft(dat: &[f32], n: usize) -> Vec<Complex<f32>> {
    let plan = forward_plan(n);
    let mut input = vec![0.0f32; n];
    let m = dat.len().min(n);
    input[..m].copy_from_slice(&dat[..m]);
    let mut spectrum = vec![Complex::new(0.0, 0.0); n / 2 + 1];
    plan.process(&mut input, &mut spectrum)
        .expect("forward FFT buffer lengths are fixed by construction");
    spectrum
}

/// Inverse real FFT to `n` time samples, normalized by `1/n`.
///
/// `spectrum` may be a truncated half-spectrum; missing high-frequency bins
/// are taken as zero. The imaginary parts of the DC and Nyquist bins are
/// forced to zero, which the inverse transform requires of a spectrum of
/// real data.
pub fn irfft(spectrum: &[Complex<f32>], n: usize) -> Vec<f32> {
    let plan = inverse_plan(n);
    let nr = n / 2 + 1;
    let mut full = vec![Complex::new(0.0f32, 0.0); nr];
    let m = spectrum.len().min(nr);
    full[..m].copy_from_slice(&spectrum[..m]);
    full[0].im = 0.0;
    if n % 2 == 0 {
        full[nr - 1].im = 0.0;
    }
    let mut out = vec![0.0f32; n];
    plan.process(&mut full, &mut out)
        .expect("inverse FFT buffer lengths are fixed by construction");
    let fac = 1.0 / n as f32;
    for v in out.iter_mut() {
        *v *= fac;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rfft_of_impulse_is_flat() {
        let mut x = vec![0.0f32; 64];
        x[0] = 1.0;
        let s = rfft(&x, 64);
        assert_eq!(s.len(), 33);
        for bin in &s {
            assert_abs_diff_eq!(bin.re, 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(bin.im, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn round_trip_recovers_signal() {
        let x: Vec<f32> = (0..128).map(|i| ((i * 7) % 13) as f32 - 6.0).collect();
        let s = rfft(&x, 128);
        let y = irfft(&s, 128);
        for (a, b) in x.iter().zip(&y) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-4);
        }
    }

    #[test]
    fn truncated_spectrum_is_zero_extended() {
        let x: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).sin()).collect();
        let s = rfft(&x, 64);
        let full = irfft(&s, 64);
        let trunc = irfft(&s[..20], 64);
        // Same as inverse of the spectrum with bins 20.. zeroed.
        let mut zeroed = s.clone();
        for bin in zeroed[20..].iter_mut() {
            *bin = Complex::new(0.0, 0.0);
        }
        let reference = irfft(&zeroed, 64);
        for (a, b) in trunc.iter().zip(&reference) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
        assert_ne!(full, trunc);
    }
}
