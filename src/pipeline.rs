//! End-to-end run orchestration
//!
//! Derives the run-wide parameters, partitions the event groups over the
//! worker pool, reduces the partial stacks and lets rank 0 finish and emit
//! the result.

use crate::config::{Config, ConfigError, Params};
use crate::finish;
use crate::jobs::{self, JobError};
use crate::output::{self, OutputError};
use crate::preproc::preprocess_group;
use crate::stack::{PairSelection, StackAccumulator};
use crate::world::{self, Partial};
use snafu::Snafu;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Snafu)]
pub enum RunError {
    #[snafu(context(false), display("{source}"))]
    Config { source: ConfigError },

    #[snafu(context(false), display("{source}"))]
    Jobs { source: JobError },

    #[snafu(context(false), display("{source}"))]
    Output { source: OutputError },
}

/// What a completed run produced.
pub struct RunSummary {
    pub groups: usize,
    pub total_pairs: i64,
    pub written: Vec<PathBuf>,
}

/// Execute the whole pipeline for one configuration.
pub fn run(cfg: &Config) -> Result<RunSummary, RunError> {
    let params = Params::derive(cfg)?;
    let groups = jobs::expand_groups(&cfg.input_pattern)?;
    let selection = PairSelection::build(
        cfg.daz_range,
        cfg.gcd_ev_range,
        cfg.gc_center_rect.clone(),
        cfg.dist_range,
        cfg.dist_step,
    );

    info!(
        npts = params.npts,
        fftsize = params.fftsize,
        df = params.df,
        "cut window [{}, {}] at delta {}",
        cfg.cut.t1,
        cfg.cut.t2,
        cfg.delta
    );
    let (i1, i2) = params.cc_bounds;
    info!(
        "working spectrum interval [{i1}, {i2}) of {} bins ({:.6} - {:.6} Hz)",
        params.fftsize / 2 + 1,
        i1 as f64 * params.df,
        i2 as f64 * params.df
    );
    info!(
        bins = params.nbins,
        step = params.dist_step,
        selection = selection.is_some(),
        "distance range [{}, {}]",
        cfg.dist_range.0,
        cfg.dist_range.1
    );
    info!(jobs = groups.len(), workers = cfg.workers, "distributing event groups");

    let (sspec, count) = world::reduce(cfg.workers, |world| -> Result<Partial, RunError> {
        let chunk = world.chunk(&groups);
        info!(
            "chunk of {} groups on rank {}/{}",
            chunk.len(),
            world.rank,
            world.size
        );
        let mut acc = StackAccumulator::new(
            params.nbins,
            params.nspec(),
            params.dist_start,
            params.dist_step,
            params.cc_bounds,
        );
        let mut t_read = 0.0f64;
        let mut t_stack = 0.0f64;
        for group in chunk {
            let started = Instant::now();
            let spectra = preprocess_group(group, cfg, &params);
            let read_done = Instant::now();
            let stacked = match &selection {
                Some(sel) => acc.accumulate_selected(&spectra, sel),
                None => acc.accumulate(&spectra),
            };
            let all_done = Instant::now();
            t_read += (read_done - started).as_secs_f64();
            t_stack += (all_done - read_done).as_secs_f64();
            info!(
                "{}: {} of {} traces accepted, {} pairs stacked",
                jobs::group_label(group),
                spectra.ntraces(),
                spectra.nfiles,
                stacked
            );
        }
        info!(
            "chunk done: read+condition {:.1}s, stack {:.1}s",
            t_read, t_stack
        );
        Ok((acc.sspec, acc.count))
    })?;

    let total_pairs: i64 = count.iter().map(|&c| c as i64).sum();
    info!(total_pairs, "reduction complete, finishing on rank 0");

    let finished = finish::finish(&sspec, cfg, &params);
    info!(
        "correlation lag range ({}, {}) over {} samples",
        finished.cc_t0,
        finished.cc_t1,
        finished.mat.ncols()
    );
    let written = output::write_outputs(cfg, &params, &finished, &count)?;
    for path in &written {
        info!("wrote {}", path.display());
    }
    Ok(RunSummary {
        groups: groups.len(),
        total_pairs,
        written,
    })
}
