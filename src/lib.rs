//! Distance-binned cross-correlation stacking of event-organized
//! seismic recordings
//!
//! For every unordered pair of traces recorded from the same event, the
//! pipeline estimates a frequency-domain cross-correlation, stacks it into
//! the bin of the pair's inter-receiver great-circle distance, reduces the
//! partial stacks across a worker pool, and emits the distance-lag matrix
//! after post-processing.

pub mod band;
pub mod config;
pub mod finish;
pub mod geomath;
pub mod jobs;
pub mod output;
pub mod pipeline;
pub mod preproc;
pub mod sac;
pub mod signal;
pub mod stack;
pub mod tracing_init;
pub mod world;

pub use config::{Config, CutWindow, FilterSpec, OutputFormat, Params, Rect, TemporalNorm};
pub use pipeline::{run, RunError, RunSummary};
pub use world::World;
