//! SAC trace store
//!
//! Minimal binary SAC (v6) reader/writer: a 632-byte header of 70 f32
//! words, 40 i32 words and 192 bytes of character fields, followed by
//! `npts` f32 samples. Only evenly-sampled time-series files are handled.
//!
//! Files are written little-endian. On read the byte order is detected
//! from the `nvhdr` header word, which must be 6 under exactly one
//! interpretation.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use snafu::{ResultExt, Snafu};
use std::fs;
use std::path::{Path, PathBuf};

const NUM_FLOATS: usize = 70;
const NUM_INTS: usize = 40;
const NUM_CHARS: usize = 192;
const HEADER_BYTES: usize = NUM_FLOATS * 4 + NUM_INTS * 4 + NUM_CHARS;

/// Sentinel for unset float header words.
pub const UNDEF_F: f32 = -12345.0;
/// Sentinel for unset integer header words.
pub const UNDEF_I: i32 = -12345;

// Float word indices
const F_DELTA: usize = 0;
const F_DEPMIN: usize = 1;
const F_DEPMAX: usize = 2;
const F_B: usize = 5;
const F_E: usize = 6;
const F_O: usize = 7;
const F_A: usize = 8;
const F_T0: usize = 10;
const F_STLA: usize = 31;
const F_STLO: usize = 32;
const F_EVLA: usize = 35;
const F_EVLO: usize = 36;
const F_USER0: usize = 40;
const F_DIST: usize = 50;
const F_AZ: usize = 51;
const F_BAZ: usize = 52;
const F_DEPMEN: usize = 56;

// Integer word indices
const I_NVHDR: usize = 6;
const I_NPTS: usize = 9;
const I_IFTYPE: usize = 15;
const I_LEVEN: usize = 35;
const I_LOVROK: usize = 37;

/// `iftype` value for an evenly-sampled time series.
const ITIME: i32 = 1;

#[derive(Debug, Snafu)]
pub enum SacError {
    #[snafu(display("failed to read {}: {source}", path.display()))]
    Read { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    Write { path: PathBuf, source: std::io::Error },

    #[snafu(display("{} is too short for a SAC header ({len} bytes)", path.display()))]
    TooShort { path: PathBuf, len: usize },

    #[snafu(display("{} has no recognizable SAC header", path.display()))]
    BadHeader { path: PathBuf },

    #[snafu(display("{}: header claims {npts} samples, file holds {available}", path.display()))]
    TruncatedData { path: PathBuf, npts: usize, available: usize },

    #[snafu(display("{}: time mark {code} is unset in the header", path.display()))]
    UndefinedTimeMark { path: PathBuf, code: i32 },

    #[snafu(display("{}: cut window lies outside the recorded span", path.display()))]
    EmptyWindow { path: PathBuf },
}

/// Cut-window reference mark, by the conventional integer codes
/// (-5 `b`, -4 `e`, -3 `o`, -2 `a`, 0-9 `t0`-`t9`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tmark {
    B,
    E,
    O,
    A,
    T(u8),
}

impl Tmark {
    pub fn from_code(code: i32) -> Option<Tmark> {
        match code {
            -5 => Some(Tmark::B),
            -4 => Some(Tmark::E),
            -3 => Some(Tmark::O),
            -2 => Some(Tmark::A),
            0..=9 => Some(Tmark::T(code as u8)),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Tmark::B => -5,
            Tmark::E => -4,
            Tmark::O => -3,
            Tmark::A => -2,
            Tmark::T(i) => i as i32,
        }
    }

    fn float_index(self) -> usize {
        match self {
            Tmark::B => F_B,
            Tmark::E => F_E,
            Tmark::O => F_O,
            Tmark::A => F_A,
            Tmark::T(i) => F_T0 + i as usize,
        }
    }
}

/// Raw SAC header words with named accessors for the fields the pipeline
/// touches.
#[derive(Debug, Clone)]
pub struct Header {
    floats: [f32; NUM_FLOATS],
    ints: [i32; NUM_INTS],
    chars: [u8; NUM_CHARS],
}

impl Default for Header {
    fn default() -> Self {
        let mut h = Header {
            floats: [UNDEF_F; NUM_FLOATS],
            ints: [UNDEF_I; NUM_INTS],
            chars: [b' '; NUM_CHARS],
        };
        // Character fields default to the "-12345" sentinel text.
        for slot in 0..24 {
            h.chars[slot * 8..slot * 8 + 6].copy_from_slice(b"-12345");
        }
        h.ints[I_NVHDR] = 6;
        h.ints[I_IFTYPE] = ITIME;
        h.ints[I_LEVEN] = 1;
        h.ints[I_LOVROK] = 1;
        h
    }
}

impl Header {
    pub fn delta(&self) -> f32 {
        self.floats[F_DELTA]
    }
    pub fn b(&self) -> f32 {
        self.floats[F_B]
    }
    pub fn npts(&self) -> usize {
        self.ints[I_NPTS].max(0) as usize
    }
    pub fn stlo(&self) -> f32 {
        self.floats[F_STLO]
    }
    pub fn stla(&self) -> f32 {
        self.floats[F_STLA]
    }
    pub fn evlo(&self) -> f32 {
        self.floats[F_EVLO]
    }
    pub fn evla(&self) -> f32 {
        self.floats[F_EVLA]
    }
    pub fn az(&self) -> f32 {
        self.floats[F_AZ]
    }
    pub fn baz(&self) -> f32 {
        self.floats[F_BAZ]
    }

    pub fn set_delta(&mut self, v: f32) {
        self.floats[F_DELTA] = v;
    }
    pub fn set_b(&mut self, v: f32) {
        self.floats[F_B] = v;
    }
    pub fn set_station(&mut self, stlo: f32, stla: f32) {
        self.floats[F_STLO] = stlo;
        self.floats[F_STLA] = stla;
    }
    pub fn set_event(&mut self, evlo: f32, evla: f32) {
        self.floats[F_EVLO] = evlo;
        self.floats[F_EVLA] = evla;
    }
    pub fn set_az_baz(&mut self, az: f32, baz: f32) {
        self.floats[F_AZ] = az;
        self.floats[F_BAZ] = baz;
    }
    pub fn set_dist(&mut self, v: f32) {
        self.floats[F_DIST] = v;
    }
    pub fn set_user(&mut self, slot: usize, v: f32) {
        assert!(slot < 10);
        self.floats[F_USER0 + slot] = v;
    }
    pub fn user(&self, slot: usize) -> f32 {
        assert!(slot < 10);
        self.floats[F_USER0 + slot]
    }

    /// Absolute time of the given mark, or `None` when the header leaves it
    /// unset.
    pub fn time_mark(&self, tmark: Tmark) -> Option<f32> {
        let v = self.floats[tmark.float_index()];
        (v != UNDEF_F).then_some(v)
    }

    fn parse<B: ByteOrder>(raw: &[u8]) -> Header {
        let mut h = Header::default();
        for (i, f) in h.floats.iter_mut().enumerate() {
            *f = B::read_f32(&raw[i * 4..]);
        }
        let ints_off = NUM_FLOATS * 4;
        for (i, v) in h.ints.iter_mut().enumerate() {
            *v = B::read_i32(&raw[ints_off + i * 4..]);
        }
        let chars_off = ints_off + NUM_INTS * 4;
        h.chars.copy_from_slice(&raw[chars_off..chars_off + NUM_CHARS]);
        h
    }

    fn emit(&self, out: &mut Vec<u8>) {
        let mut word = [0u8; 4];
        for &f in &self.floats {
            LittleEndian::write_f32(&mut word, f);
            out.extend_from_slice(&word);
        }
        for &v in &self.ints {
            LittleEndian::write_i32(&mut word, v);
            out.extend_from_slice(&word);
        }
        out.extend_from_slice(&self.chars);
    }
}

/// One evenly-sampled trace: header plus samples.
#[derive(Debug, Clone)]
pub struct Trace {
    pub header: Header,
    pub data: Vec<f32>,
}

impl Trace {
    /// A new trace with the given samples, start time and sample interval.
    pub fn new(data: Vec<f32>, b: f32, delta: f32) -> Trace {
        let mut header = Header::default();
        header.set_delta(delta);
        header.set_b(b);
        header.ints[I_NPTS] = data.len() as i32;
        Trace { header, data }
    }

    /// Read a whole SAC file.
    pub fn read(path: &Path) -> Result<Trace, SacError> {
        let bytes = fs::read(path).context(ReadSnafu { path })?;
        if bytes.len() < HEADER_BYTES {
            return TooShortSnafu { path, len: bytes.len() }.fail();
        }
        let nvhdr_off = NUM_FLOATS * 4 + I_NVHDR * 4;
        let big_endian = if LittleEndian::read_i32(&bytes[nvhdr_off..]) == 6 {
            false
        } else if BigEndian::read_i32(&bytes[nvhdr_off..]) == 6 {
            true
        } else {
            return BadHeaderSnafu { path }.fail();
        };
        let header = if big_endian {
            Header::parse::<BigEndian>(&bytes[..HEADER_BYTES])
        } else {
            Header::parse::<LittleEndian>(&bytes[..HEADER_BYTES])
        };
        let npts = header.npts();
        let available = (bytes.len() - HEADER_BYTES) / 4;
        if available < npts {
            return TruncatedDataSnafu { path, npts, available }.fail();
        }
        let mut data = vec![0.0f32; npts];
        let raw = &bytes[HEADER_BYTES..HEADER_BYTES + npts * 4];
        if big_endian {
            BigEndian::read_f32_into(raw, &mut data);
        } else {
            LittleEndian::read_f32_into(raw, &mut data);
        }
        Ok(Trace { header, data })
    }

    /// Read a file and cut it to `[mark + t1, mark + t2]`.
    ///
    /// The cut keeps `round((t2 - t1)/delta) + 1` samples. Samples the
    /// recording does not cover are zero-filled; a window with no overlap
    /// at all is an error.
    pub fn read_cut(path: &Path, tmark: Tmark, t1: f64, t2: f64) -> Result<Trace, SacError> {
        let full = Trace::read(path)?;
        let delta = full.header.delta() as f64;
        let mark = full
            .header
            .time_mark(tmark)
            .ok_or_else(|| SacError::UndefinedTimeMark {
                path: path.to_path_buf(),
                code: tmark.code(),
            })? as f64;
        let b = full.header.b() as f64;
        let npts_cut = ((t2 - t1) / delta).round() as usize + 1;
        let i0 = ((mark + t1 - b) / delta).round() as i64;
        if i0 >= full.data.len() as i64 || i0 + npts_cut as i64 <= 0 {
            return EmptyWindowSnafu { path }.fail();
        }
        let mut data = vec![0.0f32; npts_cut];
        for (k, v) in data.iter_mut().enumerate() {
            let src = i0 + k as i64;
            if src >= 0 && (src as usize) < full.data.len() {
                *v = full.data[src as usize];
            }
        }
        let mut header = full.header;
        header.set_b((b + i0 as f64 * delta) as f32);
        header.ints[I_NPTS] = npts_cut as i32;
        Ok(Trace { header, data })
    }

    /// Write the trace little-endian, refreshing the dependent header
    /// fields (`npts`, `e`, amplitude extrema).
    pub fn write(&self, path: &Path) -> Result<(), SacError> {
        let mut header = self.header.clone();
        header.ints[I_NPTS] = self.data.len() as i32;
        if !self.data.is_empty() {
            let delta = header.delta();
            header.floats[F_E] = header.b() + (self.data.len() - 1) as f32 * delta;
            let (mut lo, mut hi, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0f64);
            for &v in &self.data {
                lo = lo.min(v);
                hi = hi.max(v);
                sum += v as f64;
            }
            header.floats[F_DEPMIN] = lo;
            header.floats[F_DEPMAX] = hi;
            header.floats[F_DEPMEN] = (sum / self.data.len() as f64) as f32;
        }
        let mut bytes = Vec::with_capacity(HEADER_BYTES + self.data.len() * 4);
        header.emit(&mut bytes);
        let mut word = [0u8; 4];
        for &v in &self.data {
            LittleEndian::write_f32(&mut word, v);
            bytes.extend_from_slice(&word);
        }
        fs::write(path, bytes).context(WriteSnafu { path })
    }
}
