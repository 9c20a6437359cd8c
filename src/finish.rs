//! Post-stack assembly of the lag-domain matrix
//!
//! Runs only on the reduced global stack: inverse-transform every bin row
//! to the time domain, center the lag axis, then apply the optional
//! folding, taper+filter, peak normalization and lag-window cut.

use crate::config::{Config, Params};
use crate::signal::window::tukey;
use crate::signal::fft;
use ndarray::Array2;
use num_complex::Complex;

/// The finished distance-lag matrix with its lag axis.
pub struct FinishedStack {
    /// `nbins x nlags` real matrix
    pub mat: Array2<f32>,
    /// Time of the first lag sample, seconds
    pub cc_t0: f64,
    /// Time of the last lag sample, seconds
    pub cc_t1: f64,
}

/// Assemble the lag-domain stack from the reduced spectral stack.
pub fn finish(sspec: &Array2<Complex<f32>>, cfg: &Config, params: &Params) -> FinishedStack {
    let m = params.fftsize;
    let roll = params.npts - 1;
    let delta = cfg.delta;

    // Inverse transform each row, zero-lag centered at index npts-1, last
    // (aliased) sample dropped.
    let mut rows: Vec<Vec<f32>> = Vec::with_capacity(sspec.nrows());
    for row in sspec.rows() {
        let mut spec = row.to_vec();
        if !spec.is_empty() {
            spec[0] = Complex::new(0.0, 0.0);
        }
        let x = fft::irfft(&spec, m);
        let mut r = vec![0.0f32; m - 1];
        for (i, v) in r.iter_mut().enumerate() {
            *v = x[(i + m - roll) % m];
        }
        rows.push(r);
    }
    let mut cc_t0 = -(roll as f64) * delta;
    let mut cc_t1 = roll as f64 * delta;

    if cfg.post_folding {
        for row in rows.iter_mut() {
            let rev: Vec<f32> = row.iter().rev().copied().collect();
            for (v, r) in row.iter_mut().zip(rev) {
                *v += r;
            }
            row.drain(..roll);
        }
        cc_t0 = 0.0;
    }

    if let Some(sos) = &params.post_sos {
        let ncols = rows.first().map_or(0, Vec::len);
        let w = tukey(ncols, cfg.post_taper_ratio);
        for row in rows.iter_mut() {
            for (v, wi) in row.iter_mut().zip(&w) {
                *v *= wi;
            }
            sos.apply_zero_phase(row);
        }
    }

    if cfg.post_norm {
        for row in rows.iter_mut() {
            let peak = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
            if peak > 0.0 {
                let inv = 1.0 / peak;
                for v in row.iter_mut() {
                    *v *= inv;
                }
            }
        }
    }

    if let Some((t1, t2)) = cfg.post_cut {
        let ncols = rows.first().map_or(0, Vec::len);
        let t1 = t1.max(cc_t0);
        let t2 = t2.min(cc_t0 + (ncols.saturating_sub(1)) as f64 * delta);
        let i1 = (((t1 - cc_t0) / delta).round() as usize).min(ncols.saturating_sub(1));
        let i2 = (((t2 - cc_t0) / delta).round() as usize).min(ncols.saturating_sub(1));
        for row in rows.iter_mut() {
            *row = row[i1..=i2].to_vec();
        }
        cc_t0 += i1 as f64 * delta;
    }

    let ncols = rows.first().map_or(0, Vec::len);
    cc_t1 = cc_t0 + ncols.saturating_sub(1) as f64 * delta;
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    let mat = Array2::from_shape_vec((sspec.nrows(), ncols), flat).expect("uniform row length");
    FinishedStack { mat, cc_t0, cc_t1 }
}
