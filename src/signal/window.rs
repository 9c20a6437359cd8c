//! Tukey windows and running-mean smoothing

use std::f64::consts::PI;

/// Tukey (cosine-tapered) window of length `n`.
///
/// `ratio` in `[0, 0.5]` is the fraction of `n` tapered at *each* end;
/// `ratio == 0` yields a rectangular window, `ratio == 0.5` a full cosine
/// arch. Taper length is `floor(ratio * n)` samples per side.
pub fn tukey(n: usize, ratio: f64) -> Vec<f32> {
    let mut w = vec![1.0f32; n];
    let taper = ((ratio * n as f64) as usize).min(n / 2);
    if taper == 0 {
        return w;
    }
    for i in 0..taper {
        let v = 0.5 * (1.0 - (PI * i as f64 / taper as f64).cos());
        w[i] = v as f32;
        w[n - 1 - i] = v as f32;
    }
    w
}

/// Materialize a smoothing window of design length `len` (seconds or Hz)
/// at step `step` (sample interval or bin spacing) as an odd sample count:
/// `((round(len/step) / 2) * 2) + 1`.
pub fn odd_window_size(len: f64, step: f64) -> usize {
    (((len / step).round() as usize) / 2) * 2 + 1
}

/// Centered moving average with an odd window of `size` samples.
///
/// Near the edges the window shrinks to the samples that exist. Accumulates
/// in f64 via a prefix sum so the cost is O(n) independent of `size`.
pub fn moving_average(x: &[f32], size: usize) -> Vec<f32> {
    let n = x.len();
    if n == 0 || size <= 1 {
        return x.to_vec();
    }
    let half = size / 2;
    let mut prefix = vec![0.0f64; n + 1];
    for (i, &v) in x.iter().enumerate() {
        prefix[i + 1] = prefix[i] + v as f64;
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        out.push(((prefix[hi] - prefix[lo]) / (hi - lo) as f64) as f32);
    }
    out
}
