//! Per-group trace preprocessing
//!
//! Reads every trace of one event group, runs the conditioning chain
//! (detrend, taper, filter, temporal normalization, spectral whitening),
//! transforms to the half-spectrum and keeps the `[0, i2)` prefix as one
//! row of the group matrix. A trace that cannot be read, has the wrong
//! sample interval, or carries non-finite or all-zero data is skipped and
//! only shrinks the matrix; it never aborts the group.

use crate::config::{Config, Params};
use crate::jobs::Group;
use crate::sac::{Trace, UNDEF_F};
use crate::signal::{self, WATER_LEVEL};
use ndarray::Array2;
use num_complex::Complex;
use rayon::prelude::*;
use tracing::{debug, warn};

/// Complex spectra and receiver/event geometry of one event group.
pub struct GroupSpectra {
    /// `n x i2` half-spectrum prefixes, one row per accepted trace
    pub spectra: Array2<Complex<f32>>,
    pub stlo: Vec<f32>,
    pub stla: Vec<f32>,
    pub evlo: Vec<f32>,
    pub evla: Vec<f32>,
    pub az: Vec<f32>,
    pub baz: Vec<f32>,
    /// Number of files the group expanded to, before skips
    pub nfiles: usize,
}

impl GroupSpectra {
    pub fn ntraces(&self) -> usize {
        self.spectra.nrows()
    }
}

fn usable(dat: &[f32]) -> bool {
    let mut any_nonzero = false;
    for &v in dat {
        if !v.is_finite() {
            return false;
        }
        any_nonzero |= v != 0.0;
    }
    any_nonzero
}

/// Read, condition and transform one trace; `None` drops it from the group.
fn preprocess_trace(
    path: &std::path::Path,
    cfg: &Config,
    params: &Params,
) -> Option<(Vec<Complex<f32>>, [f32; 6])> {
    let trace = match Trace::read_cut(path, params.tmark, cfg.cut.t1, cfg.cut.t2) {
        Ok(trace) => trace,
        Err(err) => {
            debug!("skipping {}: {err}", path.display());
            return None;
        }
    };
    let hdr = &trace.header;
    if ((hdr.delta() as f64) - cfg.delta).abs() > 1.0e-4 * cfg.delta {
        warn!(
            "skipping {}: sample interval {} does not match configured {}",
            path.display(),
            hdr.delta(),
            cfg.delta
        );
        return None;
    }
    if hdr.stlo() == UNDEF_F || hdr.stla() == UNDEF_F {
        warn!("skipping {}: station coordinates unset", path.display());
        return None;
    }
    let mut dat = trace.data;
    if dat.len() != params.npts || !usable(&dat) {
        debug!("skipping {}: empty or non-finite cut", path.display());
        return None;
    }

    if cfg.pre_detrend {
        signal::detrend(&mut dat);
    }
    if cfg.pre_taper_ratio > 1.0e-5 {
        signal::taper(&mut dat, cfg.pre_taper_ratio);
    }
    if let Some(sos) = &params.pre_sos {
        sos.apply_zero_phase(&mut dat);
    }
    if let Some((env_sos, wt_size)) = &params.temporal {
        signal::temporal_normalize(&mut dat, env_sos, *wt_size, WATER_LEVEL, params.taper_len);
    }
    if let Some((wf_size, k1, k2)) = params.whiten {
        signal::frequency_whiten(
            &mut dat,
            params.fftsize,
            wf_size,
            WATER_LEVEL,
            k1,
            k2,
            params.taper_len,
        );
    }
    if !usable(&dat) {
        debug!("skipping {}: conditioning degenerated the trace", path.display());
        return None;
    }

    let mut spectrum = signal::fft::rfft(&dat, params.fftsize);
    spectrum.truncate(params.nspec());
    let geom = [
        hdr.stlo(),
        hdr.stla(),
        hdr.evlo(),
        hdr.evla(),
        hdr.az(),
        hdr.baz(),
    ];
    Some((spectrum, geom))
}

/// Preprocess every trace of a group into its spectra matrix.
///
/// Traces are conditioned in parallel but collected in file order, so the
/// resulting matrix (and everything accumulated from it) is deterministic.
pub fn preprocess_group(group: &Group, cfg: &Config, params: &Params) -> GroupSpectra {
    let files = group.trace_files();
    let nfiles = files.len();
    let rows: Vec<Option<(Vec<Complex<f32>>, [f32; 6])>> = files
        .par_iter()
        .map(|path| preprocess_trace(path, cfg, params))
        .collect();

    let nspec = params.nspec();
    let mut flat = Vec::new();
    let mut stlo = Vec::new();
    let mut stla = Vec::new();
    let mut evlo = Vec::new();
    let mut evla = Vec::new();
    let mut az = Vec::new();
    let mut baz = Vec::new();
    for row in rows.into_iter().flatten() {
        let (spectrum, geom) = row;
        flat.extend_from_slice(&spectrum);
        stlo.push(geom[0]);
        stla.push(geom[1]);
        evlo.push(geom[2]);
        evla.push(geom[3]);
        az.push(geom[4]);
        baz.push(geom[5]);
    }
    let n = stlo.len();
    let spectra = Array2::from_shape_vec((n, nspec), flat).expect("rows have uniform width");
    GroupSpectra {
        spectra,
        stlo,
        stla,
        evlo,
        evla,
        az,
        baz,
        nfiles,
    }
}
