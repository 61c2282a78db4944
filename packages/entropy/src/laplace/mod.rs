//! Coders for integers that follow a Laplace (two-sided exponential)
//! distribution.
//!
//! Three layers share the same tables:
//!
//! * the tail coder ([`RangeEncoder::encode_laplace_special`]) codes a
//!   non-negative value with a known decay in chunks of 15,
//! * the scalar coder ([`RangeEncoder::encode_laplace`]) codes a magnitude
//!   given its expectation and an upper bound,
//! * the vector coder ([`RangeEncoder::encode_laplace_vector`]) codes a whole
//!   vector of `n` integers whose absolute values sum to `k`.
//!
//! The vector coder consumes the means of an
//! [`AdaptContext`](crate::adapt::AdaptContext) and returns the values to
//! commit back into it.
//!
//! [`RangeEncoder::encode_laplace_special`]: crate::range::RangeEncoder::encode_laplace_special
//! [`RangeEncoder::encode_laplace`]: crate::range::RangeEncoder::encode_laplace
//! [`RangeEncoder::encode_laplace_vector`]: crate::range::RangeEncoder::encode_laplace_vector

mod decoder;
mod encoder;
pub mod tables;

pub use tables::{EXP_CDF_TABLE, LAPLACE_OFFSET};

use crate::adapt::{COUNT_EX_Q8, COUNT_Q8, K_Q8, NO_VALUE, NSB_ADAPT_CTXS, SUM_EX_Q8};
use crate::util::{ilog_i32, saturate_i32};

/// Decay values above this are squared down before tail coding.
const MAX_TAIL_DECAY: u32 = 235;

/// Tail CDF and the number of raw low bits for `decay` and `max`.
///
/// A decay close to 1 would spread the tail over too many chunks, so while
/// the (shifted) maximum does not fit in one chunk the decay is squared and
/// one more low bit is sent raw.
fn tail_shape(decay: u32, max: Option<i32>) -> (&'static [u16; 16], u32) {
    let mut decay = decay.min(255);
    let mut shift = 0;
    while max.is_none_or(|m| (m >> shift) >= 15) && decay > MAX_TAIL_DECAY {
        decay = (decay * decay + 128) >> 8;
        shift += 1;
    }
    let decay = decay.clamp(2, 254);
    log::trace!("tail decay={decay} shift={shift}");
    (&EXP_CDF_TABLE[((decay + 1) >> 1) as usize], shift)
}

/// Rounds `v / 2^shift` to nearest, ties up.
#[allow(clippy::cast_possible_truncation)]
const fn round_shift(v: i32, shift: u32) -> i32 {
    ((v as i64 + ((1_i64 << shift) >> 1)) >> shift) as i32
}

/// Parameters of the scalar coder after reducing a large expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalarShape {
    shift: u32,
    k: i32,
    decay: i32,
    cdf: [u16; 16],
}

#[allow(clippy::cast_sign_loss)]
fn scalar_shape(ex_q8: i32, k: i32) -> ScalarShape {
    let ex_q8 = ex_q8.max(0);
    let shift = (ilog_i32(ex_q8) - 11).max(0) as u32;
    let ex = round_shift(ex_q8, shift);
    let k = round_shift(k, shift);
    let decay = (256 * ex / (ex + 256)).min(254);

    let row = ((decay + 1) >> 1) as usize;
    let offset = LAPLACE_OFFSET[row];
    let mut cdf = [0; 16];
    for (c, &e) in cdf.iter_mut().zip(EXP_CDF_TABLE[row].iter()) {
        *c = e - offset;
    }

    ScalarShape {
        shift,
        k,
        decay,
        cdf,
    }
}

/// Number of symbols available to the scalar coder's first chunk.
#[allow(clippy::cast_sign_loss)]
const fn scalar_symbols(k: i32) -> usize {
    if k >= 15 { 16 } else { k as usize + 1 }
}

/// Ratio between pulse count and expected position used by delta mode.
fn delta_coef(means: &[i32; NSB_ADAPT_CTXS]) -> i64 {
    let count = i64::from(means[COUNT_Q8]);
    let count_ex = i64::from(means[COUNT_EX_Q8]);
    (256 * count / (1 + count_ex).max(1)).max(1)
}

/// Expected distance to the next pulse, in Q8.
fn delta_ex(coef: i64, span: i32, k_left: i32) -> i32 {
    saturate_i32(coef * i64::from(span) / i64::from(k_left).max(1))
}

/// Decay for the first pulse position. Empirical fit.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn delta_first_decay(coef: i64, n: i32, k_left: i32) -> u32 {
    let ex = coef * i64::from(n) / i64::from(k_left).max(1);
    if ex > 65280 {
        return 255;
    }
    let n = i64::from(n);
    let spread = (n + 1) * (n - 1) * (n - 1);
    let tail = if spread == 0 {
        0
    } else {
        (ex >> 5) * ex / spread
    };
    (256 * ex / (ex + 256) + tail).clamp(0, 255) as u32
}

/// Adaptation outputs of a delta-mode run.
fn delta_curr(k: i32, sum_c: i64, sum_ex: i64) -> [i32; NSB_ADAPT_CTXS] {
    let mut curr = [0; NSB_ADAPT_CTXS];
    if k > 0 {
        curr[COUNT_Q8] = saturate_i32(256 * sum_c);
        curr[COUNT_EX_Q8] = saturate_i32(sum_ex);
    } else {
        curr[COUNT_Q8] = NO_VALUE;
        curr[COUNT_EX_Q8] = NO_VALUE;
    }
    curr
}

/// Expected magnitude per pulse per position, in Q8.
fn general_exp_q8(means: &[i32; NSB_ADAPT_CTXS]) -> i64 {
    let mean_k = i64::from(means[K_Q8]);
    let mean_sum_ex = i64::from(means[SUM_EX_Q8]);
    if mean_k < 1 << 23 {
        256 * mean_k / (1 + mean_sum_ex).max(1)
    } else {
        mean_k / (1 + (mean_sum_ex >> 8)).max(1)
    }
}

/// Expected magnitude at a position with `left` positions remaining, and the
/// matching increment of the running sum.
fn general_ex(exp_q8: i64, kn: i32, left: i32) -> (i32, i64) {
    let kn = i64::from(kn);
    let left = i64::from(left);
    let ex = ((2 * exp_q8 * kn + left) / (2 * left)).min(kn * 256);
    let sum_ex_step = (2 * 256 * kn + left) / (2 * left);
    (saturate_i32(ex), sum_ex_step)
}

/// Adaptation outputs of a general-mode run.
fn general_curr(
    k: i32,
    kn: i32,
    sum_ex: i64,
    delta: Option<[i32; NSB_ADAPT_CTXS]>,
) -> [i32; NSB_ADAPT_CTXS] {
    let mut curr = delta.unwrap_or([0, 0, NO_VALUE, NO_VALUE]);
    curr[K_Q8] = k - kn;
    curr[SUM_EX_Q8] = saturate_i32(sum_ex);
    curr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{RangeDecoder, RangeEncoder};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(200, None, 0 ; "low_decay_unbounded")]
    #[test_case(255, Some(10), 0 ; "high_decay_small_max")]
    #[test_case(250, Some(1000), 2 ; "high_decay_large_max")]
    #[test_case(255, None, 5 ; "highest_decay_unbounded")]
    fn test_tail_shape_shift(decay: u32, max: Option<i32>, expected: u32) {
        let (_, shift) = tail_shape(decay, max);
        assert_eq!(shift, expected);
    }

    #[test]
    fn test_tail_shape_caps_out_of_range_decay() {
        let (cdf, _) = tail_shape(10_000, Some(3));
        assert_eq!(cdf, &EXP_CDF_TABLE[127]);
        let (cdf, _) = tail_shape(0, None);
        assert_eq!(cdf, &EXP_CDF_TABLE[1]);
    }

    #[test]
    fn test_scalar_shape_reduces_large_expectation() {
        let shape = scalar_shape(1 << 14, 100);
        assert_eq!(shape.shift, 4);
        assert_eq!(shape.k, 6);
        assert_eq!(shape.decay, 204);
        assert!(shape.cdf[0] >= 1);
    }

    #[test]
    fn test_delta_first_decay_single_position_has_no_tail_term() {
        assert_eq!(delta_first_decay(256, 1, 1), 128);
        assert_eq!(delta_first_decay(1 << 20, 4, 1), 255);
    }

    #[test]
    fn test_general_ex_is_capped_by_budget() {
        let (ex, step) = general_ex(100_000, 3, 2);
        assert_eq!(ex, 3 * 256);
        assert_eq!(step, (2 * 256 * 3 + 2) / 4);
    }

    #[test]
    fn test_special_round_trip() {
        let cases = [
            (0, 200, None),
            (14, 200, None),
            (15, 200, None),
            (100, 240, None),
            (12_345, 255, None),
            (7, 100, Some(7)),
            (0, 100, Some(0)),
            (29, 250, Some(30)),
            (500, 250, Some(1000)),
        ];

        let mut encoder = RangeEncoder::new();
        for &(x, decay, max) in &cases {
            encoder.encode_laplace_special(x, decay, max).unwrap();
        }
        let packet = encoder.done().unwrap();

        let mut decoder = RangeDecoder::new(&packet);
        for &(x, decay, max) in &cases {
            assert_eq!(decoder.decode_laplace_special(decay, max).unwrap(), x);
        }
        assert!(!decoder.has_error());
    }

    #[test]
    fn test_scalar_round_trip_with_shifted_expectation() {
        let cases = [
            (0, 0, 0),
            (0, 300, 10),
            (3, 300, 10),
            (10, 300, 10),
            (40, 2000, 200),
            (0, 1 << 15, 1000),
            (1, 1 << 15, 1000),
            (37, 1 << 15, 1000),
            (999, 1 << 16, 1000),
            (1000, 1 << 16, 1000),
        ];

        let mut encoder = RangeEncoder::new();
        for &(x, ex, k) in &cases {
            encoder.encode_laplace(x, ex, k).unwrap();
        }
        let packet = encoder.done().unwrap();

        let mut decoder = RangeDecoder::new(&packet);
        for &(x, ex, k) in &cases {
            assert_eq!(decoder.decode_laplace(ex, k).unwrap(), x, "ex={ex} k={k}");
        }
    }

    #[test]
    fn test_delta_mode_repeated_pulses_round_trip() {
        let means = [0, 0, 512, 1024];
        let vectors: [&[i32]; 3] = [&[0, 0, -3, 0, 0], &[1, 0, 0, -1, 0, 2], &[0, 0, 0, 0]];

        let mut encoder = RangeEncoder::new();
        let mut expected = vec![];
        for y in vectors {
            let k = y.iter().map(|v| v.abs()).sum();
            expected.push(encoder.encode_laplace_delta(y, k, &means).unwrap());
        }
        let packet = encoder.done().unwrap();

        let mut decoder = RangeDecoder::new(&packet);
        for (y, curr) in vectors.iter().zip(expected) {
            let k = y.iter().map(|v| v.abs()).sum();
            let mut out = vec![7; y.len()];
            assert_eq!(decoder.decode_laplace_delta(&mut out, k, &means).unwrap(), curr);
            assert_eq!(out, y.to_vec());
        }
    }

    #[test]
    fn test_delta_curr_without_pulses() {
        assert_eq!(delta_curr(0, 0, 0), [0, 0, NO_VALUE, NO_VALUE]);
        assert_eq!(delta_curr(2, 3, 512), [0, 0, 768, 512]);
    }
}
