//! Distance-binned cross-correlation stacking
//!
//! For every unordered pair of traces in a group (self-pairs included) the
//! conjugate product of their half-spectra is accumulated into the stack
//! row of the pair's inter-receiver distance bin. The inner
//! conjugate-multiply-add runs over contiguous slices restricted to the
//! working interval `[i1, i2)`.

use crate::config::Rect;
use crate::geomath;
use crate::preproc::GroupSpectra;
use ndarray::{Array1, Array2};
use num_complex::Complex;

/// Stations closer than this (per coordinate, degrees) count as colocated
/// when picking the pair's great-circle plane.
const SAME_STATION_TOL_DEG: f64 = 1.0e-3;

/// Effective pair-selection policy. Built only when at least one criterion
/// is configured; defaults fill the rest so every predicate can run
/// unconditionally.
#[derive(Debug, Clone)]
pub struct PairSelection {
    /// Inter-receiver distance window, already widened by half a bin
    pub dist: (f64, f64),
    /// Folded azimuth-difference window, degrees in `[0, 90]`
    pub daz: (f64, f64),
    /// Window on |event distance to the receiver great-circle plane|
    pub gcd_ev: (f64, f64),
    /// Accepting rectangles for the plane pole; a pair must hit one
    pub rects: Vec<Rect>,
}

impl PairSelection {
    /// Combine the configured criteria, if any, with the permissive
    /// defaults for the rest.
    pub fn build(
        daz: Option<(f64, f64)>,
        gcd_ev: Option<(f64, f64)>,
        rects: Option<Vec<Rect>>,
        dist_range: (f64, f64),
        dist_step: f64,
    ) -> Option<PairSelection> {
        if daz.is_none() && gcd_ev.is_none() && rects.is_none() {
            return None;
        }
        Some(PairSelection {
            dist: (
                dist_range.0 - dist_step * 0.5,
                dist_range.1 + dist_step * 0.5,
            ),
            daz: daz.unwrap_or((-0.1, 90.1)),
            gcd_ev: gcd_ev.unwrap_or((-0.1, 90.1)),
            rects: rects.unwrap_or_else(|| {
                vec![Rect {
                    lo1: -9999.0,
                    lo2: 9999.0,
                    la1: -9999.0,
                    la2: 9999.0,
                }]
            }),
        })
    }
}

/// Azimuth difference folded into `[0, 90]` degrees.
fn folded_daz(az1: f64, az2: f64) -> f64 {
    let mut daz = (az1 - az2).rem_euclid(360.0);
    if daz > 180.0 {
        daz = 360.0 - daz;
    }
    if daz > 90.0 {
        daz = 180.0 - daz;
    }
    daz
}

/// Per-worker spectral stack: `nbins x i2` complex accumulator plus the
/// pair count per bin. Allocated once and reused across all groups of the
/// worker's chunk.
pub struct StackAccumulator {
    pub sspec: Array2<Complex<f32>>,
    pub count: Array1<i32>,
    dist_start: f64,
    dist_step: f64,
    bounds: (usize, usize),
}

impl StackAccumulator {
    pub fn new(nbins: usize, nspec: usize, dist_start: f64, dist_step: f64, bounds: (usize, usize)) -> Self {
        StackAccumulator {
            sspec: Array2::zeros((nbins, nspec)),
            count: Array1::zeros(nbins),
            dist_start,
            dist_step,
            bounds,
        }
    }

    fn bin_for(&self, dist: f64) -> Option<usize> {
        let b = ((dist - self.dist_start) / self.dist_step).round();
        if b < 0.0 || b >= self.count.len() as f64 {
            return None;
        }
        Some(b as usize)
    }

    fn add_pair(&mut self, group: &GroupSpectra, i: usize, j: usize, bin: usize) {
        let (i1, i2) = self.bounds;
        let si = group.spectra.row(i);
        let sj = group.spectra.row(j);
        let si = si.as_slice().expect("row-major spectra");
        let sj = sj.as_slice().expect("row-major spectra");
        let mut row = self.sspec.row_mut(bin);
        let row = row.as_slice_mut().expect("row-major stack");
        for k in i1..i2 {
            row[k] += si[k].conj() * sj[k];
        }
        self.count[bin] += 1;
    }

    /// Stack every pair of the group. Returns the number of accumulated
    /// pairs.
    pub fn accumulate(&mut self, group: &GroupSpectra) -> usize {
        let n = group.ntraces();
        let mut stacked = 0;
        for i in 0..n {
            for j in i..n {
                let dist = geomath::haversine(
                    group.stlo[i] as f64,
                    group.stla[i] as f64,
                    group.stlo[j] as f64,
                    group.stla[j] as f64,
                );
                let Some(bin) = self.bin_for(dist) else {
                    continue;
                };
                self.add_pair(group, i, j, bin);
                stacked += 1;
            }
        }
        stacked
    }

    /// Stack the pairs that pass every selection predicate. Returns the
    /// number of accumulated pairs.
    pub fn accumulate_selected(&mut self, group: &GroupSpectra, sel: &PairSelection) -> usize {
        let n = group.ntraces();
        if n == 0 {
            return 0;
        }
        let (evlo, evla) = (group.evlo[0] as f64, group.evla[0] as f64);
        let mut stacked = 0;
        for i in 0..n {
            let (lo1, la1, az1) = (
                group.stlo[i] as f64,
                group.stla[i] as f64,
                group.az[i] as f64,
            );
            for j in i..n {
                let (lo2, la2, az2) = (
                    group.stlo[j] as f64,
                    group.stla[j] as f64,
                    group.az[j] as f64,
                );
                let dist = geomath::haversine(lo1, la1, lo2, la2);
                if dist < sel.dist.0 || dist > sel.dist.1 {
                    continue;
                }

                // Pole of the receiver-pair great-circle plane; colocated
                // receivers degenerate to the event-receiver plane.
                let colocated = i == j
                    || ((lo1 - lo2).abs() < SAME_STATION_TOL_DEG
                        && (la1 - la2).abs() < SAME_STATION_TOL_DEG);
                let ((cx, cy), _) = if colocated {
                    geomath::great_circle_plane_center(evlo, evla, lo1, la1)
                } else {
                    geomath::great_circle_plane_center(lo1, la1, lo2, la2)
                };
                if !sel.rects.iter().any(|r| r.contains(cx, cy)) {
                    continue;
                }

                let daz = folded_daz(az1, az2);
                if daz < sel.daz.0 || daz > sel.daz.1 {
                    continue;
                }

                let gcd = geomath::point_to_great_circle_plane(evlo, evla, lo1, la1, lo2, la2).abs();
                if gcd < sel.gcd_ev.0 || gcd > sel.gcd_ev.1 {
                    continue;
                }

                let Some(bin) = self.bin_for(dist) else {
                    continue;
                };
                self.add_pair(group, i, j, bin);
                stacked += 1;
            }
        }
        stacked
    }
}
