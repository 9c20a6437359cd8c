//! Run configuration and derived run-wide parameters
//!
//! Every optional processing stage is an `Option`-tagged value; the
//! pipeline branches on the tag, never on sentinels. `Config::validate`
//! runs before any I/O and turns every inconsistency into a fatal
//! [`ConfigError`]; `Params::derive` then fixes the run-wide values (trace
//! length, FFT size, smoothing windows, working spectrum interval,
//! distance bins) every worker shares.

use crate::band::{band_bounds, CRITICAL_LEVEL};
use crate::sac::Tmark;
use crate::signal::window::odd_window_size;
use crate::signal::{Band, FilterDesignError, Sos};
use snafu::Snafu;
use std::str::FromStr;

/// Cut window: time-mark code plus offsets in seconds.
#[derive(Debug, Clone, Copy)]
pub struct CutWindow {
    pub tmark: i32,
    pub t1: f64,
    pub t2: f64,
}

/// An IIR filter request: band kind and corner frequencies. `f2` is
/// ignored for lowpass/highpass.
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    pub band: Band,
    pub f1: f64,
    pub f2: f64,
}

impl FilterSpec {
    pub fn design(&self, rate: f64) -> Result<Sos, FilterDesignError> {
        Sos::design(self.band, self.f1, self.f2, rate)
    }
}

/// Running-mean temporal normalization parameters.
#[derive(Debug, Clone, Copy)]
pub struct TemporalNorm {
    /// Averaging window length in seconds
    pub window_sec: f64,
    /// Envelope band-pass corners in Hz
    pub f1: f64,
    pub f2: f64,
}

/// A longitude/latitude rectangle with cyclic longitude.
///
/// With `lo1 <= lo2` the rectangle covers `[lo1, lo2]`; otherwise it covers
/// the wrap-around arc `[lo1, 360) ∪ [0, lo2]`. Longitudes are in
/// `[0, 360)`.
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    pub lo1: f64,
    pub lo2: f64,
    pub la1: f64,
    pub la2: f64,
}

impl Rect {
    pub fn contains(&self, lo: f64, la: f64) -> bool {
        if la < self.la1 || la > self.la2 {
            return false;
        }
        if self.lo1 <= self.lo2 {
            lo >= self.lo1 && lo <= self.lo2
        } else {
            lo >= self.lo1 || lo <= self.lo2
        }
    }
}

/// Output emission modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Grouped-dataset container (`<prefix>.npz`)
    Npz,
    /// One SAC file per distance bin
    Sac,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hdf5" | "h5" | "npz" => Ok(OutputFormat::Npz),
            "sac" => Ok(OutputFormat::Sac),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

/// The full invocation parameter set.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shell-style path with one wildcarded directory component
    pub input_pattern: String,
    pub cut: CutWindow,
    /// Required sample interval in seconds
    pub delta: f64,
    pub pre_detrend: bool,
    pub pre_taper_ratio: f64,
    pub pre_filter: Option<FilterSpec>,
    pub temporal_norm: Option<TemporalNorm>,
    /// Whitening smoothing bandwidth in Hz
    pub spectral_whiten: Option<f64>,
    pub dist_range: (f64, f64),
    pub dist_step: f64,
    pub daz_range: Option<(f64, f64)>,
    pub gcd_ev_range: Option<(f64, f64)>,
    pub gc_center_rect: Option<Vec<Rect>>,
    pub post_folding: bool,
    pub post_taper_ratio: f64,
    pub post_filter: Option<FilterSpec>,
    pub post_norm: bool,
    pub post_cut: Option<(f64, f64)>,
    pub output_prefix: String,
    pub output_formats: Vec<OutputFormat>,
    pub log_prefix: Option<String>,
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input_pattern: String::new(),
            cut: CutWindow {
                tmark: Tmark::B.code(),
                t1: 10800.0,
                t2: 32400.0,
            },
            delta: 0.1,
            pre_detrend: true,
            pre_taper_ratio: 0.005,
            pre_filter: None,
            temporal_norm: None,
            spectral_whiten: None,
            dist_range: (0.0, 180.0),
            dist_step: 1.0,
            daz_range: None,
            gcd_ev_range: None,
            gc_center_rect: None,
            post_folding: false,
            post_taper_ratio: 0.005,
            post_filter: Some(FilterSpec {
                band: Band::Bandpass,
                f1: 0.02,
                f2: 0.066666,
            }),
            post_norm: false,
            post_cut: None,
            output_prefix: "cc_stack".to_string(),
            output_formats: vec![OutputFormat::Npz],
            log_prefix: None,
            workers: 1,
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("delta must be positive, got {delta}"))]
    BadDelta { delta: f64 },

    #[snafu(display("cut window must satisfy t1 < t2, got ({t1}, {t2})"))]
    BadCutWindow { t1: f64, t2: f64 },

    #[snafu(display("unknown time-mark code {code}"))]
    BadTmark { code: i32 },

    #[snafu(display("{which} taper ratio must lie in [0, 0.5], got {value}"))]
    BadTaperRatio { which: &'static str, value: f64 },

    #[snafu(display("dist step must be positive, got {step}"))]
    BadDistStep { step: f64 },

    #[snafu(display("dist range must satisfy dmin <= dmax, got ({dmin}, {dmax})"))]
    BadDistRange { dmin: f64, dmax: f64 },

    #[snafu(display("spectral whitening requires a band-pass post filter to bound the working spectrum"))]
    WhitenNeedsBandpassPostFilter,

    #[snafu(display("whitening bandwidth must be positive, got {wf}"))]
    BadWhitenBandwidth { wf: f64 },

    #[snafu(display("temporal normalization window must be positive, got {sec} s"))]
    BadTemporalWindow { sec: f64 },

    #[snafu(display("post cut must satisfy t1 < t2, got ({t1}, {t2})"))]
    BadPostCut { t1: f64, t2: f64 },

    #[snafu(display("no output format selected"))]
    NoOutputFormats,

    #[snafu(display("worker count must be at least 1"))]
    BadWorkers,

    #[snafu(display("{stage} filter design failed: {source}"))]
    FilterDesign {
        stage: &'static str,
        source: FilterDesignError,
    },
}

impl Config {
    /// Fatal-at-startup consistency checks. Filter designability is checked
    /// separately by [`Params::derive`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delta <= 0.0 {
            return Err(ConfigError::BadDelta { delta: self.delta });
        }
        if self.cut.t1 >= self.cut.t2 {
            return Err(ConfigError::BadCutWindow {
                t1: self.cut.t1,
                t2: self.cut.t2,
            });
        }
        if Tmark::from_code(self.cut.tmark).is_none() {
            return Err(ConfigError::BadTmark {
                code: self.cut.tmark,
            });
        }
        for (which, value) in [
            ("pre", self.pre_taper_ratio),
            ("post", self.post_taper_ratio),
        ] {
            if !(0.0..=0.5).contains(&value) {
                return Err(ConfigError::BadTaperRatio { which, value });
            }
        }
        if self.dist_step <= 0.0 {
            return Err(ConfigError::BadDistStep {
                step: self.dist_step,
            });
        }
        if self.dist_range.0 > self.dist_range.1 {
            return Err(ConfigError::BadDistRange {
                dmin: self.dist_range.0,
                dmax: self.dist_range.1,
            });
        }
        if let Some(tn) = &self.temporal_norm {
            if tn.window_sec <= 0.0 {
                return Err(ConfigError::BadTemporalWindow { sec: tn.window_sec });
            }
        }
        if let Some(wf) = self.spectral_whiten {
            if wf <= 0.0 {
                return Err(ConfigError::BadWhitenBandwidth { wf });
            }
            // The whitening band is derived from the post filter corners.
            match &self.post_filter {
                Some(spec) if spec.band == Band::Bandpass => {}
                _ => return Err(ConfigError::WhitenNeedsBandpassPostFilter),
            }
        }
        if let Some((t1, t2)) = self.post_cut {
            if t1 >= t2 {
                return Err(ConfigError::BadPostCut { t1, t2 });
            }
        }
        if self.output_formats.is_empty() {
            return Err(ConfigError::NoOutputFormats);
        }
        if self.workers == 0 {
            return Err(ConfigError::BadWorkers);
        }
        Ok(())
    }
}

/// Run-wide values derived once from a validated [`Config`].
#[derive(Debug, Clone)]
pub struct Params {
    /// Samples per cut trace
    pub npts: usize,
    /// Real FFT length (`2 * npts`)
    pub fftsize: usize,
    /// Sampling rate in Hz
    pub rate: f64,
    /// Frequency bin spacing of the length-`fftsize` FFT
    pub df: f64,
    pub tmark: Tmark,
    /// Taper length in samples used for whitening edge handling
    pub taper_len: usize,
    pub pre_sos: Option<Sos>,
    /// Envelope filter and window size (samples) for temporal normalization
    pub temporal: Option<(Sos, usize)>,
    /// Smoothing window (bins) and retained `[k1, k2)` for spectral whitening
    pub whiten: Option<(usize, usize, usize)>,
    /// Accumulation interval `[i1, i2)` of the half-spectrum
    pub cc_bounds: (usize, usize),
    pub post_sos: Option<Sos>,
    /// Number of distance bins
    pub nbins: usize,
    pub dist_start: f64,
    pub dist_step: f64,
}

impl Params {
    pub fn derive(cfg: &Config) -> Result<Params, ConfigError> {
        cfg.validate()?;
        let npts = ((cfg.cut.t2 - cfg.cut.t1) / cfg.delta).round() as usize + 1;
        let fftsize = npts * 2;
        let rate = 1.0 / cfg.delta;
        let df = 1.0 / (cfg.delta * fftsize as f64);
        let half = fftsize / 2 + 1;
        let tmark = Tmark::from_code(cfg.cut.tmark).expect("validated");
        let taper_len = (npts as f64 * cfg.pre_taper_ratio) as usize;

        let pre_sos = match &cfg.pre_filter {
            Some(spec) => Some(spec.design(rate).map_err(|source| ConfigError::FilterDesign {
                stage: "pre",
                source,
            })?),
            None => None,
        };
        let post_sos = match &cfg.post_filter {
            Some(spec) => Some(spec.design(rate).map_err(|source| ConfigError::FilterDesign {
                stage: "post",
                source,
            })?),
            None => None,
        };
        let temporal = match &cfg.temporal_norm {
            Some(tn) => {
                let sos = Sos::design(Band::Bandpass, tn.f1, tn.f2, rate).map_err(|source| {
                    ConfigError::FilterDesign {
                        stage: "temporal-normalization",
                        source,
                    }
                })?;
                Some((sos, odd_window_size(tn.window_sec, cfg.delta)))
            }
            None => None,
        };

        // The accumulator only works the part of the half-spectrum the
        // post-stack band-pass keeps; with no band-pass it keeps it all.
        let cc_bounds = match &cfg.post_filter {
            Some(spec) if spec.band == Band::Bandpass => {
                band_bounds(fftsize, rate, spec.f1, spec.f2, CRITICAL_LEVEL).map_err(|source| {
                    ConfigError::FilterDesign {
                        stage: "post",
                        source,
                    }
                })?
            }
            _ => (0, half),
        };

        let whiten = match cfg.spectral_whiten {
            Some(wf) => {
                let spec = cfg.post_filter.as_ref().expect("validated");
                let (k1, k2) = band_bounds(fftsize, rate, spec.f1, spec.f2 + wf, CRITICAL_LEVEL)
                    .map_err(|source| ConfigError::FilterDesign {
                        stage: "whitening",
                        source,
                    })?;
                Some((odd_window_size(wf, df), k1, k2))
            }
            None => None,
        };

        let nbins = ((cfg.dist_range.1 - cfg.dist_range.0) / cfg.dist_step).floor() as usize + 1;
        Ok(Params {
            npts,
            fftsize,
            rate,
            df,
            tmark,
            taper_len,
            pre_sos,
            temporal,
            whiten,
            cc_bounds,
            post_sos,
            nbins,
            dist_start: cfg.dist_range.0,
            dist_step: cfg.dist_step,
        })
    }

    /// Number of retained half-spectrum columns (`i2`).
    pub fn nspec(&self) -> usize {
        self.cc_bounds.1
    }

    /// Distance bin centers.
    pub fn dist_centers(&self) -> Vec<f32> {
        (0..self.nbins)
            .map(|b| (self.dist_start + b as f64 * self.dist_step) as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            input_pattern: "ev_*/*.sac".to_string(),
            cut: CutWindow {
                tmark: -5,
                t1: 0.0,
                t2: 102.3,
            },
            delta: 0.1,
            ..Config::default()
        }
    }

    #[test]
    fn derives_fft_layout() {
        let p = Params::derive(&base_config()).unwrap();
        assert_eq!(p.npts, 1024);
        assert_eq!(p.fftsize, 2048);
        assert!((p.rate - 10.0).abs() < 1e-12);
        assert!((p.df - 1.0 / (0.1 * 2048.0)).abs() < 1e-12);
        assert_eq!(p.nbins, 181);
        let centers = p.dist_centers();
        assert_eq!(centers[0], 0.0);
        assert_eq!(centers[180], 180.0);
    }

    #[test]
    fn cc_bounds_default_to_full_half_spectrum_without_bandpass() {
        let mut cfg = base_config();
        cfg.post_filter = None;
        let p = Params::derive(&cfg).unwrap();
        assert_eq!(p.cc_bounds, (0, 1025));
        assert_eq!(p.nspec(), 1025);
    }

    #[test]
    fn whiten_band_extends_past_post_filter() {
        let mut cfg = base_config();
        cfg.spectral_whiten = Some(0.02);
        let p = Params::derive(&cfg).unwrap();
        let (wf_size, k1, k2) = p.whiten.unwrap();
        let (i1, i2) = p.cc_bounds;
        assert_eq!(wf_size % 2, 1);
        assert!(k1 < k2);
        // The whitening band reaches 0.02 Hz past the post-filter band.
        assert!(k2 >= i2);
        assert!(k2 - k1 > i2 - i1);
    }

    #[test]
    fn rejects_bad_delta_and_step() {
        let mut cfg = base_config();
        cfg.delta = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::BadDelta { .. })));

        let mut cfg = base_config();
        cfg.dist_step = -1.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::BadDistStep { .. })));
    }

    #[test]
    fn whitening_without_bandpass_post_filter_is_fatal() {
        let mut cfg = base_config();
        cfg.spectral_whiten = Some(0.02);
        cfg.post_filter = None;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::WhitenNeedsBandpassPostFilter)
        ));

        cfg.post_filter = Some(FilterSpec {
            band: Band::Lowpass,
            f1: 1.0,
            f2: 0.0,
        });
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::WhitenNeedsBandpassPostFilter)
        ));
    }

    #[test]
    fn undesignable_filter_is_fatal_at_derive() {
        let mut cfg = base_config();
        // Corner above Nyquist (rate is 10 Hz).
        cfg.pre_filter = Some(FilterSpec {
            band: Band::Lowpass,
            f1: 20.0,
            f2: 0.0,
        });
        assert!(matches!(
            Params::derive(&cfg),
            Err(ConfigError::FilterDesign { stage: "pre", .. })
        ));
    }

    #[test]
    fn rect_longitude_wrap() {
        let plain = Rect {
            lo1: 120.0,
            lo2: 180.0,
            la1: 0.0,
            la2: 35.0,
        };
        assert!(plain.contains(150.0, 10.0));
        assert!(!plain.contains(190.0, 10.0));
        assert!(!plain.contains(150.0, 40.0));

        // lo1 > lo2 selects the arc through the date line.
        let wrap = Rect {
            lo1: 350.0,
            lo2: 10.0,
            la1: -10.0,
            la2: 10.0,
        };
        assert!(wrap.contains(355.0, 0.0));
        assert!(wrap.contains(5.0, 0.0));
        assert!(!wrap.contains(180.0, 0.0));
    }
}
