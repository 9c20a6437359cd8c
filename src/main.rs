//! Cross-correlation stacking command line
//!
//! Mirrors the classic option surface of event cross-correlation stackers:
//! slash-separated value triples for windows and filters, comma-separated
//! lists for rectangles and output formats.
//!
//! ```text
//! ccstack -I "events_*/processed/*.BHZ.sac" -T -5/10800/32400 -D 0.1 \
//!     -O cc --out-format hdf5,sac --pre-detrend --pre-taper 0.005 \
//!     --w-temporal 128/0.02/0.06667 --w-spec 0.02 --stack-dist 0/180/1 \
//!     --daz -0.1/20 --gcd-ev -0.1/30 --gc-center-rect 120/180/0/40 \
//!     --post-fold --post-filter bandpass/0.02/0.06667 --post-norm \
//!     --workers 4 --log cc_log
//! ```

use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use ccstack::config::{Config, CutWindow, FilterSpec, OutputFormat, Rect, TemporalNorm};
use ccstack::signal::Band;

fn split_floats(s: &str, n: usize, what: &str) -> Result<Vec<f64>, String> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != n {
        return Err(format!("{what} wants {n} slash-separated values, got '{s}'"));
    }
    parts
        .iter()
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| format!("{what}: '{p}' is not a number"))
        })
        .collect()
}

fn parse_cut(s: &str) -> Result<CutWindow, String> {
    let v = split_floats(s, 3, "cut window")?;
    if v[0].fract() != 0.0 {
        return Err(format!("time mark code must be an integer, got {}", v[0]));
    }
    Ok(CutWindow {
        tmark: v[0] as i32,
        t1: v[1],
        t2: v[2],
    })
}

fn parse_filter(s: &str) -> Result<FilterSpec, String> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 3 {
        return Err(format!("filter wants band/f1/f2, got '{s}'"));
    }
    let band: Band = parts[0].parse()?;
    let f1 = parts[1]
        .parse::<f64>()
        .map_err(|_| format!("filter corner '{}' is not a number", parts[1]))?;
    let f2 = parts[2]
        .parse::<f64>()
        .map_err(|_| format!("filter corner '{}' is not a number", parts[2]))?;
    Ok(FilterSpec { band, f1, f2 })
}

fn parse_temporal(s: &str) -> Result<TemporalNorm, String> {
    let v = split_floats(s, 3, "temporal normalization")?;
    Ok(TemporalNorm {
        window_sec: v[0],
        f1: v[1],
        f2: v[2],
    })
}

fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let v = split_floats(s, 2, "range")?;
    Ok((v[0], v[1]))
}

fn parse_dist(s: &str) -> Result<(f64, f64, f64), String> {
    let v = split_floats(s, 3, "stack distance")?;
    Ok((v[0], v[1], v[2]))
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let v = split_floats(s, 4, "rectangle")?;
    Ok(Rect {
        lo1: v[0].rem_euclid(360.0),
        lo2: v[1].rem_euclid(360.0),
        la1: v[2],
        la2: v[3],
    })
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse()
}

/// Compute cross-correlation stacks binned by inter-receiver distance.
#[derive(Parser, Debug)]
#[command(name = "ccstack", version)]
#[command(about = "Distance-binned cross-correlation stacking of event-organized recordings")]
struct Args {
    /// Filename wildcard with one wildcarded directory component,
    /// e.g. "events_*/processed/*.BHZ.sac"
    #[arg(short = 'I', long = "input", value_name = "PATTERN")]
    input: String,

    /// Cut window to read, as tmark/t1/t2 (tmark codes: -5 b, -4 e, -3 o,
    /// -2 a, 0-9 t0-t9)
    #[arg(short = 'T', long = "cut", value_name = "TMARK/T1/T2", value_parser = parse_cut, allow_hyphen_values = true)]
    cut: CutWindow,

    /// Required sample interval in seconds
    #[arg(short = 'D', long = "delta", value_name = "SECONDS")]
    delta: f64,

    /// Output filename prefix
    #[arg(short = 'O', long = "output", value_name = "PREFIX", default_value = "cc_stack")]
    output: String,

    /// Output formats: hdf5 (grouped dataset) and/or sac (one file per bin)
    #[arg(long = "out-format", value_name = "FMT[,FMT]", value_parser = parse_format, value_delimiter = ',', default_value = "hdf5")]
    out_format: Vec<OutputFormat>,

    /// Remove the best-fit linear trend from each trace
    #[arg(long = "pre-detrend")]
    pre_detrend: bool,

    /// Pre-processing taper ratio in [0, 0.5]
    #[arg(long = "pre-taper", value_name = "RATIO", default_value_t = 0.005)]
    pre_taper: f64,

    /// Pre-filter as band/f1/f2, e.g. bandpass/0.02/0.5
    #[arg(long = "pre-filter", value_name = "BAND/F1/F2", value_parser = parse_filter)]
    pre_filter: Option<FilterSpec>,

    /// Temporal normalization as window_seconds/f1/f2
    #[arg(long = "w-temporal", value_name = "SEC/F1/F2", value_parser = parse_temporal)]
    w_temporal: Option<TemporalNorm>,

    /// Spectral whitening smoothing bandwidth in Hz
    #[arg(long = "w-spec", value_name = "HZ")]
    w_spec: Option<f64>,

    /// Distance binning as dmin/dmax/step, degrees
    #[arg(long = "stack-dist", value_name = "D1/D2/STEP", value_parser = parse_dist, default_value = "0/180/1")]
    stack_dist: (f64, f64, f64),

    /// Select pairs by folded azimuth difference, degrees
    #[arg(long = "daz", value_name = "MIN/MAX", value_parser = parse_pair, allow_hyphen_values = true)]
    daz: Option<(f64, f64)>,

    /// Select pairs by event distance to the receiver great-circle plane
    #[arg(long = "gcd-ev", value_name = "MIN/MAX", value_parser = parse_pair, allow_hyphen_values = true)]
    gcd_ev: Option<(f64, f64)>,

    /// Select pairs whose great-circle-plane pole falls in one of the
    /// rectangles lo1/lo2/la1/la2[,lo1/lo2/la1/la2...]
    #[arg(long = "gc-center-rect", value_name = "RECT[,RECT]", value_parser = parse_rect, value_delimiter = ',', allow_hyphen_values = true)]
    gc_center_rect: Option<Vec<Rect>>,

    /// Fold negative and positive correlation lags
    #[arg(long = "post-fold")]
    post_fold: bool,

    /// Post-processing taper ratio in [0, 0.5]
    #[arg(long = "post-taper", value_name = "RATIO", default_value_t = 0.005)]
    post_taper: f64,

    /// Post-filter as band/f1/f2
    #[arg(long = "post-filter", value_name = "BAND/F1/F2", value_parser = parse_filter, default_value = "bandpass/0.02/0.066666")]
    post_filter: FilterSpec,

    /// Normalize each stack row by its maximum positive amplitude
    #[arg(long = "post-norm")]
    post_norm: bool,

    /// Cut the finished lag axis to t1/t2 seconds
    #[arg(long = "post-cut", value_name = "T1/T2", value_parser = parse_pair, allow_hyphen_values = true)]
    post_cut: Option<(f64, f64)>,

    /// Log file prefix; without it, logs go to stderr
    #[arg(long = "log", value_name = "PREFIX")]
    log: Option<String>,

    /// Number of workers
    #[arg(long = "workers", value_name = "N", default_value_t = 1)]
    workers: usize,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            input_pattern: self.input,
            cut: self.cut,
            delta: self.delta,
            pre_detrend: self.pre_detrend,
            pre_taper_ratio: self.pre_taper,
            pre_filter: self.pre_filter,
            temporal_norm: self.w_temporal,
            spectral_whiten: self.w_spec,
            dist_range: (self.stack_dist.0, self.stack_dist.1),
            dist_step: self.stack_dist.2,
            daz_range: self.daz,
            gcd_ev_range: self.gcd_ev,
            gc_center_rect: self.gc_center_rect,
            post_folding: self.post_fold,
            post_taper_ratio: self.post_taper,
            post_filter: Some(self.post_filter),
            post_norm: self.post_norm,
            post_cut: self.post_cut,
            output_prefix: self.output,
            output_formats: self.out_format,
            log_prefix: self.log,
            workers: self.workers,
        }
    }
}

fn main() -> ExitCode {
    let cfg = Args::parse().into_config();
    if let Err(err) = ccstack::tracing_init::init_tracing(cfg.log_prefix.as_deref()) {
        eprintln!("cannot open log file: {err}");
        return ExitCode::FAILURE;
    }
    match ccstack::run(&cfg) {
        Ok(summary) => {
            println!(
                "stacked {} pairs from {} event groups into {} files",
                summary.total_pairs,
                summary.groups,
                summary.written.len()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
