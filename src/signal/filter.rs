//! Butterworth IIR filtering from second-order sections
//!
//! Filters are order-2 Butterworth sections in direct-form-II transposed
//! realization. A bandpass is the cascade of a high-pass section at the low
//! corner and a low-pass section at the high corner. Applying a filter runs
//! two passes, forward then time-reversed, so the net response is zero
//! phase (effective order 4). Sections run in f64 regardless of the sample
//! type at the interface.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F64};
use snafu::Snafu;
use std::str::FromStr;

/// Filter band kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Lowpass,
    Highpass,
    Bandpass,
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lowpass" | "lp" => Ok(Band::Lowpass),
            "highpass" | "hp" => Ok(Band::Highpass),
            "bandpass" | "bp" => Ok(Band::Bandpass),
            other => Err(format!("unknown filter band '{other}'")),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum FilterDesignError {
    /// Corner frequency at or above Nyquist, or not positive
    #[snafu(display("corner frequency {f} Hz invalid at sample rate {rate} Hz"))]
    BadCorner { f: f64, rate: f64 },

    /// Band-pass corners out of order
    #[snafu(display("band-pass corners out of order: {f1} >= {f2}"))]
    CornersOutOfOrder { f1: f64, f2: f64 },
}

/// A designed cascade of second-order sections.
#[derive(Debug, Clone)]
pub struct Sos {
    sections: Vec<Coefficients<f64>>,
}

impl Sos {
    /// Design a Butterworth filter at sample rate `rate`.
    ///
    /// `Lowpass`/`Highpass` use `f1` as the corner and ignore `f2`;
    /// `Bandpass` uses `(f1, f2)`.
    pub fn design(band: Band, f1: f64, f2: f64, rate: f64) -> Result<Self, FilterDesignError> {
        let nyquist = rate * 0.5;
        let corner = |f: f64| -> Result<(), FilterDesignError> {
            if f <= 0.0 || f >= nyquist {
                return Err(FilterDesignError::BadCorner { f, rate });
            }
            Ok(())
        };
        let section = |ty: Type<f64>, f: f64| {
            Coefficients::<f64>::from_params(ty, rate.hz(), f.hz(), Q_BUTTERWORTH_F64)
                .map_err(|_| FilterDesignError::BadCorner { f, rate })
        };
        let sections = match band {
            Band::Lowpass => {
                corner(f1)?;
                vec![section(Type::LowPass, f1)?]
            }
            Band::Highpass => {
                corner(f1)?;
                vec![section(Type::HighPass, f1)?]
            }
            Band::Bandpass => {
                corner(f1)?;
                corner(f2)?;
                if f1 >= f2 {
                    return Err(FilterDesignError::CornersOutOfOrder { f1, f2 });
                }
                vec![section(Type::HighPass, f1)?, section(Type::LowPass, f2)?]
            }
        };
        Ok(Sos { sections })
    }

    /// One forward pass through the section cascade with fresh filter state.
    fn pass(&self, buf: &mut [f64]) {
        for coeffs in &self.sections {
            let mut df2t = DirectForm2Transposed::<f64>::new(*coeffs);
            for v in buf.iter_mut() {
                *v = df2t.run(*v);
            }
        }
    }

    /// Zero-phase application: forward pass, then a pass over the reversed
    /// sequence.
    pub fn apply_zero_phase(&self, dat: &mut [f32]) {
        let mut buf: Vec<f64> = dat.iter().map(|&v| v as f64).collect();
        self.pass(&mut buf);
        buf.reverse();
        self.pass(&mut buf);
        buf.reverse();
        for (d, v) in dat.iter_mut().zip(buf) {
            *d = v as f32;
        }
    }
}
