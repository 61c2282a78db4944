//! CDF tables and the adaptive-CDF update shared by the models.
//!
//! A CDF here is a slice of at most 16 non-decreasing values where entry `s`
//! is the total frequency of symbols `0..=s`. The last entry is the total.

use crate::error::{Error, Result};
use crate::range::{RangeDecoder, RangeEncoder};

/// Largest number of symbols in a single CDF.
pub const MAX_SYMBOLS: usize = 16;

/// Largest increment accepted by the adaptive update.
///
/// With this bound a table that has just been halved still has room for one
/// more increment below 32768.
pub const MAX_INCREMENT: u16 = 8192;

const fn build_uniform_cdfs() -> [[u16; MAX_SYMBOLS]; MAX_SYMBOLS + 1] {
    let mut table = [[0; MAX_SYMBOLS]; MAX_SYMBOLS + 1];
    let mut n = 2;
    while n <= MAX_SYMBOLS {
        let mut i = 0;
        while i < n {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((32768 * (i as u32 + 1) + (n as u32 >> 1)) / n as u32) as u16;
            table[n][i] = v;
            i += 1;
        }
        n += 1;
    }
    table
}

/// Uniform Q15 CDFs, indexed by the number of symbols (2 through 16).
///
/// Row `n` holds `n` valid entries, each `round(32768 * (i + 1) / n)`.
pub static UNIFORM_CDFS_Q15: [[u16; MAX_SYMBOLS]; MAX_SYMBOLS + 1] = build_uniform_cdfs();

/// Returns the uniform Q15 CDF over `n` symbols.
///
/// # Errors
///
/// * If `n` is not in `2..=16`
pub fn uniform_cdf_q15(n: usize) -> Result<&'static [u16]> {
    if !(2..=MAX_SYMBOLS).contains(&n) {
        return Err(Error::InvalidParameter(format!(
            "uniform cdf needs 2..=16 symbols, got {n}"
        )));
    }
    Ok(&UNIFORM_CDFS_Q15[n][..n])
}

/// Validates a CDF and returns its total.
pub(crate) fn total(cdf: &[u16]) -> Result<u32> {
    let Some(&last) = cdf.last() else {
        return Err(Error::InvalidParameter("empty cdf".to_string()));
    };
    if cdf.len() > MAX_SYMBOLS {
        return Err(Error::InvalidParameter(format!(
            "cdf has {} symbols, at most {MAX_SYMBOLS} are supported",
            cdf.len()
        )));
    }
    if last == 0 {
        return Err(Error::InvalidParameter("cdf total is zero".to_string()));
    }
    Ok(u32::from(last))
}

/// Returns `(fl, fh)` for symbol `s`.
pub(crate) fn interval(cdf: &[u16], s: usize) -> Result<(u32, u32)> {
    if s >= cdf.len() {
        return Err(Error::InvalidParameter(format!(
            "symbol {s} outside a cdf of {} symbols",
            cdf.len()
        )));
    }
    let fl = if s > 0 { u32::from(cdf[s - 1]) } else { 0 };
    let fh = u32::from(cdf[s]);
    if fl >= fh {
        return Err(Error::InvalidParameter(format!(
            "symbol {s} has zero probability"
        )));
    }
    Ok((fl, fh))
}

/// Finds the symbol whose interval contains `fs`.
///
/// Returns the index of the first entry greater than `fs`, clamped to the
/// last symbol.
pub(crate) fn search(cdf: &[u16], fs: u32) -> usize {
    let last = cdf.len() - 1;
    let mut s = 0;
    while s < last && u32::from(cdf[s]) <= fs {
        s += 1;
    }
    s
}

/// Fills `cdf` with `(i + 1) * increment`, the starting point of an adaptive
/// table.
///
/// # Errors
///
/// * If the resulting total would exceed 32768
#[allow(clippy::cast_possible_truncation)]
pub fn init_adaptive(cdf: &mut [u16], increment: u16) -> Result<()> {
    if cdf.len() * usize::from(increment) > 32768 {
        return Err(Error::InvalidParameter(format!(
            "{} symbols with increment {increment} overflow a Q15 total",
            cdf.len()
        )));
    }
    for (i, c) in cdf.iter_mut().enumerate() {
        *c = (i as u16 + 1) * increment;
    }
    Ok(())
}

/// Adapts `cdf` after symbol `val` was coded.
///
/// When adding `increment` would push the total past 32767 every entry is
/// halved first. The `+ i + 1` term keeps every symbol's frequency non-zero.
/// Encoder and decoder must apply the exact same sequence of updates.
/// `increment` must already be within `1..=MAX_INCREMENT`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn update_adaptive(cdf: &mut [u16], val: usize, increment: u16) {
    let Some(&last) = cdf.last() else {
        return;
    };
    if u32::from(last) + u32::from(increment) > 32767 {
        for (i, c) in cdf.iter_mut().enumerate() {
            *c = (*c >> 1) + i as u16 + 1;
        }
    }
    let start = val.min(cdf.len());
    for c in &mut cdf[start..] {
        *c += increment;
    }
}

fn check_increment(increment: u16) -> Result<()> {
    if increment == 0 || increment > MAX_INCREMENT {
        return Err(Error::InvalidParameter(format!(
            "adaptation increment {increment} outside 1..={MAX_INCREMENT}"
        )));
    }
    Ok(())
}

impl RangeEncoder {
    /// Encodes `val` against an adaptive unscaled CDF and adapts the table.
    ///
    /// # Errors
    ///
    /// * If the CDF, the symbol or the increment is invalid
    pub fn encode_cdf_adapt(&mut self, val: usize, cdf: &mut [u16], increment: u16) -> Result<()> {
        check_increment(increment)?;
        self.encode_cdf_unscaled(val, cdf)?;
        update_adaptive(cdf, val, increment);
        Ok(())
    }
}

impl RangeDecoder<'_> {
    /// Decodes a symbol against an adaptive unscaled CDF and adapts the table
    /// the same way [`RangeEncoder::encode_cdf_adapt`] does.
    ///
    /// # Errors
    ///
    /// * If the CDF or the increment is invalid
    pub fn decode_cdf_adapt(&mut self, cdf: &mut [u16], increment: u16) -> Result<usize> {
        check_increment(increment)?;
        let val = self.decode_cdf_unscaled(cdf)?;
        update_adaptive(cdf, val, increment);
        Ok(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(2, &[16384, 32768] ; "two")]
    #[test_case(3, &[10923, 21845, 32768] ; "three")]
    #[test_case(4, &[8192, 16384, 24576, 32768] ; "four")]
    #[test_case(5, &[6554, 13107, 19661, 26214, 32768] ; "five")]
    fn test_uniform_cdf_values(n: usize, expected: &[u16]) {
        assert_eq!(uniform_cdf_q15(n).unwrap(), expected);
    }

    #[test]
    fn test_uniform_cdfs_are_strictly_increasing_and_normalized() {
        for n in 2..=MAX_SYMBOLS {
            let cdf = uniform_cdf_q15(n).unwrap();
            assert_eq!(cdf.len(), n);
            assert_eq!(cdf[n - 1], 32768);
            assert!(cdf.windows(2).all(|w| w[0] < w[1]), "n={n}");
        }
    }

    #[test_case(0 ; "zero")]
    #[test_case(1 ; "one")]
    #[test_case(17 ; "seventeen")]
    fn test_uniform_cdf_rejects_sizes(n: usize) {
        let result = uniform_cdf_q15(n);
        let Err(Error::InvalidParameter(_)) = result else {
            panic!("Invalid response {result:?}");
        };
    }

    #[test]
    fn test_interval_rejects_zero_probability() {
        let cdf = [10, 10, 20];
        assert_eq!(interval(&cdf, 0).unwrap(), (0, 10));
        assert!(interval(&cdf, 1).is_err());
        assert_eq!(interval(&cdf, 2).unwrap(), (10, 20));
        assert!(interval(&cdf, 3).is_err());
    }

    #[test_case(0, 0 ; "bottom")]
    #[test_case(9, 0 ; "end_of_first")]
    #[test_case(10, 2 ; "skips_empty_symbol")]
    #[test_case(19, 2 ; "last")]
    fn test_search(fs: u32, expected: usize) {
        assert_eq!(search(&[10, 10, 20], fs), expected);
    }

    #[test]
    fn test_update_adaptive_increments_tail() {
        let mut cdf = [0; 4];
        init_adaptive(&mut cdf, 64).unwrap();
        assert_eq!(cdf, [64, 128, 192, 256]);
        update_adaptive(&mut cdf, 2, 64);
        assert_eq!(cdf, [64, 128, 256, 320]);
    }

    #[test]
    fn test_update_adaptive_halves_before_overflow() {
        let mut cdf = [16000, 24000, 32700];
        update_adaptive(&mut cdf, 0, 100);
        assert_eq!(cdf, [8000 + 1 + 100, 12000 + 2 + 100, 16350 + 3 + 100]);
    }

    #[test]
    fn test_adaptive_round_trip_keeps_tables_in_sync() {
        let symbols = [0_usize, 3, 3, 1, 2, 3, 3, 3, 0, 2, 1, 3];
        let mut enc_cdf = [0; 4];
        init_adaptive(&mut enc_cdf, 32).unwrap();
        let mut encoder = RangeEncoder::new();
        for &s in &symbols {
            encoder.encode_cdf_adapt(s, &mut enc_cdf, 32).unwrap();
        }
        let packet = encoder.done().unwrap();

        let mut dec_cdf = [0; 4];
        init_adaptive(&mut dec_cdf, 32).unwrap();
        let mut decoder = RangeDecoder::new(&packet);
        for &s in &symbols {
            assert_eq!(decoder.decode_cdf_adapt(&mut dec_cdf, 32).unwrap(), s);
        }
        assert_eq!(enc_cdf, dec_cdf);
    }

    #[test_case(0 ; "zero")]
    #[test_case(MAX_INCREMENT + 1 ; "above_max")]
    #[test_case(u16::MAX ; "u16_max")]
    fn test_adapt_rejects_bad_increment(increment: u16) {
        let mut cdf = [16000, 24000, 32767];
        let mut encoder = RangeEncoder::new();
        let result = encoder.encode_cdf_adapt(0, &mut cdf, increment);
        let Err(Error::InvalidParameter(_)) = result else {
            panic!("Invalid response {result:?}");
        };
        assert_eq!(cdf, [16000, 24000, 32767]);

        let packet = [0_u8; 4];
        let mut decoder = RangeDecoder::new(&packet);
        let result = decoder.decode_cdf_adapt(&mut cdf, increment);
        let Err(Error::InvalidParameter(_)) = result else {
            panic!("Invalid response {result:?}");
        };
        assert_eq!(cdf, [16000, 24000, 32767]);
    }

    #[test]
    fn test_largest_increment_fits_after_halving() {
        let mut cdf = [16000, 24000, 32767];
        let mut encoder = RangeEncoder::new();
        encoder.encode_cdf_adapt(0, &mut cdf, MAX_INCREMENT).unwrap();
        assert_eq!(cdf, [8001 + 8192, 12002 + 8192, 16386 + 8192]);
    }
}
