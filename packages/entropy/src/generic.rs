//! Generic adaptive model for non-negative integers of unknown magnitude.
//!
//! No distribution is transmitted. Instead the caller keeps a running mean
//! `ex_q16` of past values and the model picks one of [`GENERIC_TABLES`]
//! learned CDFs from a quantized log of that mean. Values too large for 16
//! symbols are scaled down, with the dropped low bits sent raw and the
//! exponential tail handed to the Laplace tail coder.

use crate::cdf;
use crate::error::{Error, Result};
use crate::range::{RangeDecoder, RangeEncoder};
use crate::util::{ilog_i32, saturate_i32};

/// Number of CDF tables, two per octave of the expectation.
pub const GENERIC_TABLES: usize = 12;

/// Default adaptation increment of the CDF tables.
pub const DEFAULT_INCREMENT: u16 = 64;

/// Largest accepted `integration` shift for the running mean.
pub const MAX_INTEGRATION: u32 = 16;

/// Approximates `2 * log2(ex_q16 / 65536)`, clamped at zero.
///
/// The odd half step is decided by comparing the square of `ex_q16` against
/// the next power of two.
#[must_use]
pub fn log_ex(ex_q16: i32) -> i32 {
    let lg = ilog_i32(ex_q16);
    let ex = i64::from(ex_q16.max(0));
    let odd = if lg < 15 {
        ex * ex > 2_i64 << (2 * lg)
    } else {
        let tmp = ex >> (lg - 8);
        tmp * tmp > 1 << 15
    };
    (2 * lg - 33 + i32::from(odd)).max(0)
}

/// Table selection and scaling derived from the running mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Context {
    id: usize,
    shift: u32,
}

#[allow(clippy::cast_sign_loss)]
fn context(ex_q16: i32) -> Context {
    let lg_q1 = log_ex(ex_q16);
    Context {
        id: (lg_q1 as usize).min(GENERIC_TABLES - 1),
        shift: ((lg_q1 - 5) >> 1).max(0) as u32,
    }
}

/// Tail decay estimated from the running mean, assuming the distribution is
/// close to Laplacian for large values.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tail_decay(ex_q16: i32, shift: u32) -> u32 {
    let e = ((2 * i64::from(ex_q16.max(0)) >> 8) + ((1_i64 << shift) >> 1)) >> shift;
    (256 * e / (e + 256)).clamp(2, 254) as u32
}

#[allow(clippy::cast_possible_truncation)]
const fn rounded(v: i32, shift: u32) -> i32 {
    ((v as i64 + ((1_i64 << shift) >> 1)) >> shift) as i32
}

#[allow(clippy::cast_sign_loss)]
fn symbols(ms: Option<i32>) -> usize {
    ms.map_or(16, |m| (m as usize + 1).min(16))
}

/// Twelve adaptive 16-symbol CDFs sharing one increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericModel {
    cdf: [[u16; 16]; GENERIC_TABLES],
    increment: u16,
}

impl Default for GenericModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericModel {
    /// Creates a model with every table uniform and the default increment.
    #[must_use]
    pub const fn new() -> Self {
        let mut cdf = [[0; 16]; GENERIC_TABLES];
        let mut i = 0;
        while i < GENERIC_TABLES {
            let mut j = 0;
            while j < 16 {
                #[allow(clippy::cast_possible_truncation)]
                let v = (j as u16 + 1) * DEFAULT_INCREMENT;
                cdf[i][j] = v;
                j += 1;
            }
            i += 1;
        }
        Self {
            cdf,
            increment: DEFAULT_INCREMENT,
        }
    }

    /// Creates a model adapting by `increment` per coded symbol.
    ///
    /// # Errors
    ///
    /// * If `increment` is zero, above [`cdf::MAX_INCREMENT`], or too large
    ///   for the initial tables
    pub fn with_increment(increment: u16) -> Result<Self> {
        if increment == 0 || increment > cdf::MAX_INCREMENT {
            return Err(Error::InvalidParameter(format!(
                "generic increment {increment} outside 1..={}",
                cdf::MAX_INCREMENT
            )));
        }
        let mut model = Self {
            cdf: [[0; 16]; GENERIC_TABLES],
            increment,
        };
        for table in &mut model.cdf {
            cdf::init_adaptive(table, increment)?;
        }
        Ok(model)
    }

    /// Amount added to a table entry per coded symbol.
    #[must_use]
    pub const fn increment(&self) -> u16 {
        self.increment
    }

    /// The table selected by `id`, for inspection.
    #[must_use]
    pub fn table(&self, id: usize) -> Option<&[u16; 16]> {
        self.cdf.get(id)
    }

    /// Adapts table `id` after coding `x` (scaled to `xs`) and moves the
    /// running mean towards `x`.
    ///
    /// Encoder and decoder call this with the same arguments.
    #[allow(clippy::cast_sign_loss)]
    pub fn update(&mut self, ex_q16: &mut i32, x: i32, xs: i32, id: usize, integration: u32) {
        if let Some(table) = self.cdf.get_mut(id) {
            cdf::update_adaptive(table, xs.clamp(0, 15) as usize, self.increment);
        }
        let target = i64::from(x.clamp(0, 32767)) << 16;
        *ex_q16 = saturate_i32(i64::from(*ex_q16) + ((target - i64::from(*ex_q16)) >> integration));
    }

    fn check(x: Option<i32>, max: Option<i32>, integration: u32) -> Result<()> {
        if integration > MAX_INTEGRATION {
            return Err(Error::InvalidParameter(format!(
                "integration {integration} exceeds {MAX_INTEGRATION}"
            )));
        }
        if max.is_some_and(|m| m < 0) || x.is_some_and(|x| x < 0 || max.is_some_and(|m| x > m)) {
            return Err(Error::InvalidParameter(format!(
                "value {x:?} outside 0..={max:?}"
            )));
        }
        Ok(())
    }

    /// Encodes `x >= 0`, at most `max` when given, and adapts the model and
    /// `ex_q16`.
    ///
    /// # Errors
    ///
    /// * If `x` is out of range or `integration` exceeds [`MAX_INTEGRATION`]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn encode(
        &mut self,
        enc: &mut RangeEncoder,
        x: i32,
        max: Option<i32>,
        ex_q16: &mut i32,
        integration: u32,
    ) -> Result<()> {
        Self::check(Some(x), max, integration)?;
        let Context { id, shift } = context(*ex_q16);
        let xs = rounded(x, shift);
        let ms = max.map(|m| rounded(m, shift));
        log::trace!("generic encode: x={x} ex_q16={ex_q16} id={id} shift={shift}");

        enc.encode_cdf_unscaled(xs.min(15) as usize, &self.cdf[id][..symbols(ms)])?;

        if xs >= 15 {
            let decay = tail_decay(*ex_q16, shift);
            enc.encode_laplace_special(xs - 15, decay, ms.map(|m| m - 15))?;
        }

        if shift > 0 {
            let special = u32::from(xs == 0);
            if shift - special > 0 {
                let rounding = i64::from(special == 0) << (shift - 1);
                let low = i64::from(x) - (i64::from(xs) << shift) + rounding;
                enc.enc_bits(low as u32, shift - special)?;
            }
        }

        self.update(ex_q16, x, xs, id, integration);
        Ok(())
    }

    /// Decodes a value written by [`Self::encode`] with the same `max`,
    /// `ex_q16` and `integration`, and applies the same adaptation.
    ///
    /// # Errors
    ///
    /// * If `max` is negative or `integration` exceeds [`MAX_INTEGRATION`]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn decode(
        &mut self,
        dec: &mut RangeDecoder<'_>,
        max: Option<i32>,
        ex_q16: &mut i32,
        integration: u32,
    ) -> Result<i32> {
        Self::check(None, max, integration)?;
        let Context { id, shift } = context(*ex_q16);
        let ms = max.map(|m| rounded(m, shift));

        let mut xs = dec.decode_cdf_unscaled(&self.cdf[id][..symbols(ms)])? as i32;
        if xs == 15 {
            let decay = tail_decay(*ex_q16, shift);
            let tail = dec.decode_laplace_special(decay, ms.map(|m| m - 15))?;
            xs = dec.add_decoded(xs, tail);
        }

        let mut lsb = 0_i64;
        if shift > 0 {
            let special = u32::from(xs == 0);
            if shift - special > 0 {
                lsb = i64::from(dec.dec_bits(shift - special)?);
            }
            lsb -= i64::from(special == 0) << (shift - 1);
        }
        let x = saturate_i32((i64::from(xs) << shift) + lsb);
        log::trace!("generic decode: x={x} ex_q16={ex_q16} id={id} shift={shift}");

        self.update(ex_q16, x, xs, id, integration);
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0, 0 ; "zero")]
    #[test_case(100, 0 ; "tiny")]
    #[test_case(65536, 1 ; "one")]
    #[test_case(93184, 2 ; "root_two_rounded_up")]
    #[test_case(1 << 20, 9 ; "sixteen")]
    #[test_case(i32::MAX, 30 ; "largest")]
    fn test_log_ex(ex_q16: i32, expected: i32) {
        assert_eq!(log_ex(ex_q16), expected);
    }

    #[test]
    fn test_context_selects_table_and_shift() {
        assert_eq!(context(65536), Context { id: 1, shift: 0 });
        assert_eq!(context(1 << 20), Context { id: 9, shift: 2 });
        assert_eq!(context(i32::MAX), Context { id: 11, shift: 12 });
    }

    #[test]
    fn test_new_tables_are_uniform() {
        let model = GenericModel::new();
        assert_eq!(model.table(0).unwrap()[0], 64);
        assert_eq!(model.table(11).unwrap()[15], 1024);
        assert_eq!(model, GenericModel::with_increment(64).unwrap());
        assert!(model.table(12).is_none());
    }

    #[test]
    fn test_with_increment_rejects_zero() {
        let result = GenericModel::with_increment(0);
        let Err(Error::InvalidParameter(_)) = result else {
            panic!("Invalid response {result:?}");
        };
    }

    #[test]
    fn test_update_moves_mean_and_table() {
        let mut model = GenericModel::new();
        let mut ex_q16 = 65536;
        model.update(&mut ex_q16, 5, 5, 1, 2);
        assert_eq!(ex_q16, 65536 + ((5 * 65536 - 65536) >> 2));
        let table = model.table(1).unwrap();
        assert_eq!(table[4], 5 * 64);
        assert_eq!(table[5], 6 * 64 + 64);
        assert_eq!(table[15], 16 * 64 + 64);
    }

    #[test]
    fn test_update_clamps_large_values() {
        let mut model = GenericModel::new();
        let mut ex_q16 = 0;
        model.update(&mut ex_q16, 1_000_000, 1_000_000, 0, 0);
        assert_eq!(ex_q16, 32767 << 16);
    }

    #[test]
    fn test_bounded_round_trip() {
        let values = [(0, Some(0)), (3, Some(3)), (2, Some(20)), (40, Some(40)), (7, None)];

        let mut enc_model = GenericModel::new();
        let mut enc_ex = 2 << 16;
        let mut encoder = RangeEncoder::new();
        for &(x, max) in &values {
            enc_model.encode(&mut encoder, x, max, &mut enc_ex, 2).unwrap();
        }
        let packet = encoder.done().unwrap();

        let mut dec_model = GenericModel::new();
        let mut dec_ex = 2 << 16;
        let mut decoder = RangeDecoder::new(&packet);
        for &(x, max) in &values {
            assert_eq!(
                dec_model.decode(&mut decoder, max, &mut dec_ex, 2).unwrap(),
                x
            );
        }
        assert_eq!(enc_model, dec_model);
        assert_eq!(enc_ex, dec_ex);
    }

    #[test]
    fn test_encode_rejects_value_above_max() {
        let mut model = GenericModel::new();
        let mut ex_q16 = 65536;
        let mut encoder = RangeEncoder::new();
        let result = model.encode(&mut encoder, 9, Some(8), &mut ex_q16, 2);
        let Err(Error::InvalidParameter(_)) = result else {
            panic!("Invalid response {result:?}");
        };
        assert_eq!(ex_q16, 65536);
        assert_eq!(model, GenericModel::new());
    }
}
