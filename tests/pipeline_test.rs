//! End-to-end pipeline tests over synthetic SAC trees

mod test_utils;

use ccstack::config::OutputFormat;
use ndarray::{Array1, Array2};
use ndarray_npy::NpzReader;
use std::fs::File;
use test_utils::{bare_config, white_noise, write_event};

fn read_npz(prefix: &str) -> (Array2<f32>, Array1<i32>, Array1<f32>) {
    let mut npz = NpzReader::new(File::open(format!("{prefix}.npz")).unwrap()).unwrap();
    let mat: Array2<f32> = npz.by_name("ccstack").unwrap();
    let count: Array1<i32> = npz.by_name("stack_count").unwrap();
    let dist: Array1<f32> = npz.by_name("dist").unwrap();
    (mat, count, dist)
}

/// Single trace in a single group, two workers: the only contribution is
/// the self-pair in bin 0 and it equals the finished auto-correlation.
#[test]
fn single_trace_autocorrelation() {
    let tmp = tempfile::tempdir().unwrap();
    let npts = 1024usize;
    let data = white_noise(npts, 42);
    write_event(tmp.path(), "a", (0.0, 0.0), &[(30.0, 10.0)], &[data.clone()], 1.0);

    let mut cfg = bare_config(tmp.path(), npts, 1.0);
    cfg.workers = 2;
    let summary = ccstack::run(&cfg).unwrap();
    assert_eq!(summary.groups, 1);
    assert_eq!(summary.total_pairs, 1);

    let (mat, count, dist) = read_npz(&cfg.output_prefix);
    assert_eq!(count[0], 1);
    assert!(count.iter().skip(1).all(|&c| c == 0));
    assert_eq!(dist.len(), 181);
    assert_eq!(mat.ncols(), 2 * npts - 1);
    for b in 1..mat.nrows() {
        assert!(mat.row(b).iter().all(|&v| v == 0.0));
    }

    // Independent expectation: circular auto-correlation of the
    // zero-padded trace, DC term removed, zero lag centered.
    let m = 2 * npts;
    let mut circ = vec![0.0f64; m];
    for (lag, c) in circ.iter_mut().enumerate() {
        for n in 0..npts {
            let other = (n + lag) % m;
            if other < npts {
                *c += data[n] as f64 * data[other] as f64;
            }
        }
    }
    let mean_term = {
        let s: f64 = data.iter().map(|&v| v as f64).sum();
        s * s / m as f64
    };
    let peak = circ[0] - mean_term;
    for i in 0..m - 1 {
        let expect = circ[(i + m - (npts - 1)) % m] - mean_term;
        let got = mat[[0, i]] as f64;
        assert!(
            (got - expect).abs() < 1e-3 * peak.abs(),
            "lag sample {i}: got {got}, expected {expect}"
        );
    }
}

/// Distance selection: with range (0, 15) the 20-degree pair is rejected
/// and the stack-count budget comes out exactly.
#[test]
fn distance_selection_rejects_distant_pair() {
    let tmp = tempfile::tempdir().unwrap();
    let npts = 256usize;
    let stations = [(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)];
    let traces: Vec<Vec<f32>> = (0..3).map(|i| white_noise(npts, 100 + i)).collect();
    write_event(tmp.path(), "a", (5.0, -40.0), &stations, &traces, 1.0);

    let mut cfg = bare_config(tmp.path(), npts, 1.0);
    cfg.dist_range = (0.0, 15.0);
    cfg.dist_step = 1.0;
    // Wide-open windows: only the distance criterion can reject.
    cfg.daz_range = Some((-0.1, 90.1));
    cfg.gcd_ev_range = Some((-0.1, 90.1));
    let summary = ccstack::run(&cfg).unwrap();

    // 3 self-pairs + (0,10) + (10,20); the (0,20) pair is out of range.
    assert_eq!(summary.total_pairs, 5);
    let (_, count, _) = read_npz(&cfg.output_prefix);
    assert_eq!(count[0], 3);
    assert_eq!(count[10], 2);
    assert_eq!(count.iter().sum::<i32>(), 5);
}

/// Worker count must not change the result beyond float associativity.
#[test]
fn worker_count_is_bit_similar() {
    let tmp = tempfile::tempdir().unwrap();
    let npts = 256usize;
    for (g, name) in ["a", "b", "c"].iter().enumerate() {
        let stations = [(0.0, 0.0), (3.0 + g as f64, 1.0)];
        let traces: Vec<Vec<f32>> = (0..2)
            .map(|i| white_noise(npts, (g * 10 + i) as u64))
            .collect();
        write_event(tmp.path(), name, (g as f64, -30.0), &stations, &traces, 1.0);
    }

    let mut cfg1 = bare_config(tmp.path(), npts, 1.0);
    cfg1.output_prefix = format!("{}/out1", tmp.path().display());
    cfg1.workers = 1;
    ccstack::run(&cfg1).unwrap();

    let mut cfg3 = bare_config(tmp.path(), npts, 1.0);
    cfg3.output_prefix = format!("{}/out3", tmp.path().display());
    cfg3.workers = 3;
    ccstack::run(&cfg3).unwrap();

    let (m1, c1, _) = read_npz(&cfg1.output_prefix);
    let (m3, c3, _) = read_npz(&cfg3.output_prefix);
    assert_eq!(c1, c3);
    let scale = m1.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
    for (a, b) in m1.iter().zip(m3.iter()) {
        assert!((a - b).abs() <= 1e-4 * scale, "{a} vs {b}");
    }
}

/// Everything on at once: whitening, selection, folding, post filter and
/// normalization, both output formats.
#[test]
fn full_chain_smoke() {
    let tmp = tempfile::tempdir().unwrap();
    let npts = 512usize;
    let delta = 1.0;
    for name in ["a", "b"] {
        let stations = [(120.0, 10.0), (125.0, 12.0), (130.0, 8.0)];
        let traces: Vec<Vec<f32>> = (0..3)
            .map(|i| white_noise(npts + 64, (name.len() * 7 + i) as u64))
            .collect();
        write_event(tmp.path(), name, (100.0, 0.0), &stations, &traces, delta);
    }

    let mut cfg = bare_config(tmp.path(), npts, delta);
    cfg.pre_detrend = true;
    cfg.pre_taper_ratio = 0.005;
    cfg.temporal_norm = Some(ccstack::TemporalNorm {
        window_sec: 16.0,
        f1: 0.01,
        f2: 0.1,
    });
    cfg.spectral_whiten = Some(0.01);
    cfg.post_filter = Some(ccstack::FilterSpec {
        band: ccstack::signal::Band::Bandpass,
        f1: 0.01,
        f2: 0.1,
    });
    cfg.daz_range = Some((-0.1, 90.1));
    cfg.post_folding = true;
    cfg.post_norm = true;
    cfg.output_formats = vec![OutputFormat::Npz, OutputFormat::Sac];
    cfg.workers = 2;

    let summary = ccstack::run(&cfg).unwrap();
    assert_eq!(summary.groups, 2);
    assert!(summary.total_pairs > 0);
    // npz plus one SAC file per bin.
    assert_eq!(summary.written.len(), 1 + 181);

    let (mat, count, _) = read_npz(&cfg.output_prefix);
    assert_eq!(mat.ncols(), npts);
    assert_eq!(
        count.iter().map(|&c| c as i64).sum::<i64>(),
        summary.total_pairs
    );
    // Folding plus normalization: every populated row peaks at 1.
    for b in 0..mat.nrows() {
        if count[b] > 0 {
            let peak = mat.row(b).iter().fold(f32::NEG_INFINITY, |a, &v| a.max(v));
            assert!((peak - 1.0).abs() < 1e-4, "bin {b} peak {peak}");
        }
    }

    // The per-bin SAC traces mirror the matrix rows.
    let sac_path = format!("{}_{:05.1}_.sac", cfg.output_prefix, 0.0);
    let trace = ccstack::sac::Trace::read(std::path::Path::new(&sac_path)).unwrap();
    assert_eq!(trace.data.len(), npts);
    assert_eq!(trace.header.user(3), count[0] as f32);
}
