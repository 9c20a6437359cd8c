//! Shared utilities for integration tests

use ccstack::config::{Config, CutWindow};
use ccstack::geomath;
use ccstack::sac::{Tmark, Trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::fs;
use std::path::Path;

/// Unit-variance white Gaussian noise with a fixed seed.
pub fn white_noise(n: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, 1.0).unwrap();
    (0..n).map(|_| normal.sample(&mut rng)).collect()
}

/// Write one SAC trace for a station of an event, with the azimuth header
/// filled from the geometry.
pub fn write_station_trace(
    path: &Path,
    data: Vec<f32>,
    delta: f64,
    (evlo, evla): (f64, f64),
    (stlo, stla): (f64, f64),
) {
    let mut trace = Trace::new(data, 0.0, delta as f32);
    trace.header.set_station(stlo as f32, stla as f32);
    trace.header.set_event(evlo as f32, evla as f32);
    trace.header.set_az_baz(
        geomath::azimuth(evlo, evla, stlo, stla) as f32,
        geomath::azimuth(stlo, stla, evlo, evla) as f32,
    );
    trace.write(path).unwrap();
}

/// Create one event directory `ev_<name>` under `root` holding one trace
/// per station.
pub fn write_event(
    root: &Path,
    name: &str,
    event: (f64, f64),
    stations: &[(f64, f64)],
    traces: &[Vec<f32>],
    delta: f64,
) {
    assert_eq!(stations.len(), traces.len());
    let dir = root.join(format!("ev_{name}"));
    fs::create_dir(&dir).unwrap();
    for (i, (station, data)) in stations.iter().zip(traces).enumerate() {
        write_station_trace(
            &dir.join(format!("st_{i:02}.sac")),
            data.clone(),
            delta,
            event,
            *station,
        );
    }
}

/// A configuration with every optional stage off, cutting `npts` samples
/// from the start of each trace.
pub fn bare_config(root: &Path, npts: usize, delta: f64) -> Config {
    Config {
        input_pattern: format!("{}/ev_*/*.sac", root.display()),
        cut: CutWindow {
            tmark: Tmark::B.code(),
            t1: 0.0,
            t2: (npts - 1) as f64 * delta,
        },
        delta,
        pre_detrend: false,
        pre_taper_ratio: 0.0,
        pre_filter: None,
        temporal_norm: None,
        spectral_whiten: None,
        post_folding: false,
        post_filter: None,
        post_norm: false,
        post_cut: None,
        output_prefix: root.join("out").to_string_lossy().into_owned(),
        ..Config::default()
    }
}
