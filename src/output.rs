//! Stack emission
//!
//! Two modes, selectable together: a grouped-dataset container holding the
//! whole matrix plus its metadata, and one SAC time series per distance
//! bin with the pair count in the `user3` header slot.

use crate::config::{Config, OutputFormat, Params};
use crate::finish::FinishedStack;
use crate::sac::{SacError, Trace};
use ndarray::{arr0, Array1};
use ndarray_npy::{NpzWriter, WriteNpzError};
use snafu::{ResultExt, Snafu};
use std::fs::File;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
pub enum OutputError {
    #[snafu(display("failed to create {}: {source}", path.display()))]
    Create { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to write dataset {}: {source}", path.display()))]
    Dataset { path: PathBuf, source: WriteNpzError },

    #[snafu(display("failed to write stack trace: {source}"))]
    StackTrace { source: SacError },
}

/// Grouped-dataset container: `ccstack`, `stack_count` and `dist` arrays
/// plus the scalar lag-axis metadata.
fn write_npz(
    cfg: &Config,
    params: &Params,
    finished: &FinishedStack,
    count: &Array1<i32>,
) -> Result<PathBuf, OutputError> {
    let path = PathBuf::from(format!("{}.npz", cfg.output_prefix));
    let file = File::create(&path).context(CreateSnafu { path: path.clone() })?;
    let dist = Array1::from(params.dist_centers());
    let emit = |mut npz: NpzWriter<File>| -> Result<(), WriteNpzError> {
        npz.add_array("ccstack", &finished.mat)?;
        npz.add_array("stack_count", count)?;
        npz.add_array("dist", &dist)?;
        npz.add_array("cc_t0", &arr0(finished.cc_t0))?;
        npz.add_array("cc_t1", &arr0(finished.cc_t1))?;
        npz.add_array("delta", &arr0(cfg.delta))?;
        npz.finish()?;
        Ok(())
    };
    emit(NpzWriter::new(file)).context(DatasetSnafu { path: path.clone() })?;
    Ok(path)
}

/// One SAC file per distance bin, named `<prefix>_<dist>_.sac` with the
/// distance zero-padded to five characters and one decimal.
fn write_sac_bins(
    cfg: &Config,
    params: &Params,
    finished: &FinishedStack,
    count: &Array1<i32>,
) -> Result<Vec<PathBuf>, OutputError> {
    let mut paths = Vec::with_capacity(finished.mat.nrows());
    for (bin, dist) in params.dist_centers().into_iter().enumerate() {
        let path = PathBuf::from(format!("{}_{:05.1}_.sac", cfg.output_prefix, dist));
        let row = finished.mat.row(bin).to_vec();
        let mut trace = Trace::new(row, finished.cc_t0 as f32, cfg.delta as f32);
        trace.header.set_dist(dist);
        trace.header.set_user(3, count[bin] as f32);
        trace.write(&path).context(StackTraceSnafu)?;
        paths.push(path);
    }
    Ok(paths)
}

/// Emit the finished stack in every configured format. Returns the written
/// paths.
pub fn write_outputs(
    cfg: &Config,
    params: &Params,
    finished: &FinishedStack,
    count: &Array1<i32>,
) -> Result<Vec<PathBuf>, OutputError> {
    let mut written = Vec::new();
    for format in &cfg.output_formats {
        match format {
            OutputFormat::Npz => written.push(write_npz(cfg, params, finished, count)?),
            OutputFormat::Sac => written.extend(write_sac_bins(cfg, params, finished, count)?),
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CutWindow;
    use crate::sac::Tmark;
    use ndarray::{arr1, Array2};
    use ndarray_npy::NpzReader;

    fn small_setup(dir: &std::path::Path) -> (Config, Params, FinishedStack, Array1<i32>) {
        let cfg = Config {
            cut: CutWindow {
                tmark: Tmark::B.code(),
                t1: 0.0,
                t2: 9.0,
            },
            delta: 1.0,
            dist_range: (0.0, 2.0),
            dist_step: 1.0,
            post_filter: None,
            output_prefix: dir.join("stack").to_string_lossy().into_owned(),
            output_formats: vec![OutputFormat::Npz, OutputFormat::Sac],
            ..Config::default()
        };
        let params = Params::derive(&cfg).unwrap();
        let mut mat = Array2::zeros((3, 19));
        for b in 0..3 {
            for t in 0..19 {
                mat[[b, t]] = (b * 19 + t) as f32;
            }
        }
        let finished = FinishedStack {
            mat,
            cc_t0: -9.0,
            cc_t1: 9.0,
        };
        (cfg, params, finished, arr1(&[4, 0, 2]))
    }

    #[test]
    fn npz_holds_all_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, params, finished, count) = small_setup(dir.path());
        let written = write_outputs(&cfg, &params, &finished, &count).unwrap();
        let npz_path = written.iter().find(|p| p.extension().unwrap() == "npz").unwrap();

        let mut npz = NpzReader::new(File::open(npz_path).unwrap()).unwrap();
        let mat: Array2<f32> = npz.by_name("ccstack").unwrap();
        assert_eq!(mat, finished.mat);
        let counts: Array1<i32> = npz.by_name("stack_count").unwrap();
        assert_eq!(counts, count);
        let dist: Array1<f32> = npz.by_name("dist").unwrap();
        assert_eq!(dist, arr1(&[0.0f32, 1.0, 2.0]));
    }

    #[test]
    fn sac_bins_carry_counts_and_lag_start() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, params, finished, count) = small_setup(dir.path());
        write_outputs(&cfg, &params, &finished, &count).unwrap();

        let bin1 = dir.path().join("stack_001.0_.sac");
        let trace = Trace::read(&bin1).unwrap();
        assert_eq!(trace.data.len(), 19);
        assert_eq!(trace.header.b(), -9.0);
        assert_eq!(trace.header.user(3), 0.0);

        let bin0 = Trace::read(&dir.path().join("stack_000.0_.sac")).unwrap();
        assert_eq!(bin0.header.user(3), 4.0);
        assert_eq!(bin0.data[5], 5.0);
    }
}
