//! Worker pool and sum reduction
//!
//! A fixed pool of `size` workers, each identified by a rank. Jobs are
//! split into contiguous chunks of `ceil(jobs / size)`; every worker builds
//! a partial spectral stack and count vector from its chunk, and the
//! partials are sum-reduced into the rank-0 result. Partials are summed in
//! rank order, so a run with a fixed worker count is bit-reproducible;
//! across different counts the sum is only reproducible up to float
//! associativity.

use crossbeam_channel::bounded;
use ndarray::{Array1, Array2};
use num_complex::Complex;
use tracing::info_span;

/// A worker's identity within the pool.
#[derive(Debug, Clone, Copy)]
pub struct World {
    pub rank: usize,
    pub size: usize,
}

impl World {
    /// This rank's contiguous chunk of the job list.
    pub fn chunk<'a, T>(&self, jobs: &'a [T]) -> &'a [T] {
        let per_rank = jobs.len().div_ceil(self.size.max(1));
        let lo = (self.rank * per_rank).min(jobs.len());
        let hi = (lo + per_rank).min(jobs.len());
        &jobs[lo..hi]
    }
}

/// A worker's partial result: spectral stack and per-bin pair counts.
pub type Partial = (Array2<Complex<f32>>, Array1<i32>);

/// Run `build` once per rank on its own thread and sum-reduce the partial
/// stacks into the rank-0 result.
///
/// Any worker error aborts the reduction; the lowest-ranked error wins.
pub fn reduce<F, E>(size: usize, build: F) -> Result<Partial, E>
where
    F: Fn(World) -> Result<Partial, E> + Sync,
    E: Send,
{
    assert!(size >= 1);
    std::thread::scope(|scope| {
        let build = &build;
        let (tx, rx) = bounded::<(usize, Result<Partial, E>)>(size);
        for rank in 1..size {
            let tx = tx.clone();
            scope.spawn(move || {
                let world = World { rank, size };
                let span = info_span!("worker", rank);
                let result = span.in_scope(|| build(world));
                // The receiver only disappears if the scope is unwinding.
                let _ = tx.send((rank, result));
            });
        }
        drop(tx);

        let root = {
            let span = info_span!("worker", rank = 0usize);
            span.in_scope(|| build(World { rank: 0, size }))
        };

        let mut partials: Vec<(usize, Result<Partial, E>)> = rx.iter().collect();
        partials.sort_by_key(|(rank, _)| *rank);

        let (mut sspec, mut count) = root?;
        for (_, partial) in partials {
            let (ps, pc) = partial?;
            sspec += &ps;
            count += &pc;
        }
        Ok((sspec, count))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array1, Array2};

    #[test]
    fn chunks_are_contiguous_and_cover_everything() {
        let jobs: Vec<usize> = (0..10).collect();
        for size in 1..=12 {
            let mut seen = Vec::new();
            for rank in 0..size {
                let world = World { rank, size };
                seen.extend_from_slice(world.chunk(&jobs));
            }
            assert_eq!(seen, jobs, "size {size}");
        }
    }

    #[test]
    fn last_chunk_may_be_short_or_empty() {
        let jobs: Vec<usize> = (0..5).collect();
        let w2 = World { rank: 1, size: 2 };
        assert_eq!(w2.chunk(&jobs), &[3, 4]);
        let w7 = World { rank: 6, size: 7 };
        assert!(w7.chunk(&jobs).is_empty());
    }

    #[test]
    fn reduce_sums_rank_partials() {
        let result: Result<Partial, ()> = reduce(4, |world| {
            let mut sspec = Array2::zeros((2, 3));
            sspec[[0, 0]] = Complex::new(world.rank as f32, 1.0);
            let count = arr1(&[world.rank as i32, 1]);
            Ok((sspec, count))
        });
        let (sspec, count) = result.unwrap();
        assert_eq!(sspec[[0, 0]], Complex::new(6.0, 4.0));
        assert_eq!(count, arr1(&[6, 4]));
    }

    #[test]
    fn worker_error_aborts_the_run() {
        let result: Result<Partial, String> = reduce(3, |world| {
            if world.rank == 2 {
                Err(format!("rank {} failed", world.rank))
            } else {
                Ok((Array2::zeros((1, 1)), Array1::zeros(1)))
            }
        });
        assert_eq!(result.unwrap_err(), "rank 2 failed");
    }

    #[test]
    fn single_worker_owns_all_jobs() {
        let jobs: Vec<usize> = (0..7).collect();
        let world = World { rank: 0, size: 1 };
        assert_eq!(world.chunk(&jobs).len(), 7);
    }
}
