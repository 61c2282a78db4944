use crate::adapt::NSB_ADAPT_CTXS;
use crate::error::{Error, Result};
use crate::range::RangeEncoder;

use super::{
    delta_coef, delta_curr, delta_ex, delta_first_decay, general_curr, general_ex,
    general_exp_q8, round_shift, scalar_shape, scalar_symbols, tail_shape,
};

#[allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]
impl RangeEncoder {
    /// Encodes the tail of a Laplace-distributed value.
    ///
    /// `x` is non-negative with `pdf(x) ~ decay^x` (`decay` in Q8). When
    /// `max` is given the distribution is truncated to `0..=max`, otherwise
    /// it is unbounded.
    ///
    /// # Errors
    ///
    /// * If `x` is negative or above `max`, or `max` is negative
    pub fn encode_laplace_special(&mut self, x: i32, decay: u32, max: Option<i32>) -> Result<()> {
        if x < 0 || max.is_some_and(|m| m < 0 || x > m) {
            return Err(Error::InvalidParameter(format!(
                "tail value {x} outside 0..={max:?}"
            )));
        }
        if max == Some(0) {
            return Ok(());
        }

        let (cdf, shift) = tail_shape(decay, max);
        let mut xs = x >> shift;
        let mut ms = max.map(|m| m >> shift);
        loop {
            let sym = xs.min(15);
            match ms {
                Some(m) if (1..15).contains(&m) => {
                    self.encode_cdf_unscaled(sym as usize, &cdf[..=m as usize])?;
                }
                _ => self.encode_cdf_q15(sym as usize, cdf)?,
            }
            xs -= 15;
            ms = ms.map(|m| m - 15);
            if sym < 15 || ms == Some(0) {
                break;
            }
        }

        if shift > 0 {
            self.enc_bits((x & ((1 << shift) - 1)) as u32, shift)?;
        }
        Ok(())
    }

    /// Encodes a magnitude `x` in `0..=k` whose expected value is `ex_q8`
    /// (Q8).
    ///
    /// Large expectations are scaled down and the dropped low bits are sent
    /// raw. Values from 15 (after scaling) up are finished by the tail coder.
    ///
    /// # Errors
    ///
    /// * If `x` is not in `0..=k`
    pub fn encode_laplace(&mut self, x: i32, ex_q8: i32, k: i32) -> Result<()> {
        if x < 0 || x > k {
            return Err(Error::InvalidParameter(format!(
                "magnitude {x} outside 0..={k}"
            )));
        }

        let shape = scalar_shape(ex_q8, k);
        let shift = shape.shift;
        let xs = round_shift(x, shift);
        log::trace!("laplace: x={x} ex_q8={ex_q8} k={k} shift={shift}");

        if shape.k != 0 {
            let sym = xs.min(15) as usize;
            self.encode_cdf_unscaled(sym, &shape.cdf[..scalar_symbols(shape.k)])?;
        }

        if shift > 0 {
            // Rounding leaves only half the values for a zero symbol.
            let special = u32::from(xs == 0);
            if shift - special > 0 {
                let rounding = i64::from(special == 0) << (shift - 1);
                let low = i64::from(x) - (i64::from(xs) << shift) + rounding;
                self.enc_bits(low as u32, shift - special)?;
            }
        }

        if xs >= 15 {
            self.encode_laplace_special(xs - 15, shape.decay as u32, Some(shape.k - 15))?;
        }
        Ok(())
    }

    /// Delta mode: few pulses, coded as distances between pulse positions.
    pub(super) fn encode_laplace_delta(
        &mut self,
        y: &[i32],
        k: i32,
        means: &[i32; NSB_ADAPT_CTXS],
    ) -> Result<[i32; NSB_ADAPT_CTXS]> {
        let n = y.len() as i32;
        let coef = delta_coef(means);
        let mut prev = 0;
        let mut sum_ex = 0_i64;
        let mut sum_c = 0_i64;
        let mut first = true;
        let mut k_left = k;

        for (i, &v) in y.iter().enumerate().map(|(i, v)| (i as i32, v)) {
            if v == 0 {
                continue;
            }
            let mag = v.abs();
            let count = i - prev;
            if first {
                let decay = delta_first_decay(coef, n, k_left);
                self.encode_laplace_special(count, decay, Some(n - 1))?;
                first = false;
            } else {
                self.encode_laplace(count, delta_ex(coef, n - prev, k_left), n - prev - 1)?;
            }
            sum_ex += 256 * i64::from(n - prev);
            sum_c += i64::from(count) * i64::from(k_left);

            self.enc_bits(u32::from(v < 0), 1)?;
            for j in 0..mag - 1 {
                self.encode_laplace(0, delta_ex(coef, n - i, k_left - 1 - j), n - i - 1)?;
                sum_ex += 256 * i64::from(n - i);
            }

            k_left -= mag;
            prev = i;
            if k_left == 0 {
                break;
            }
        }

        Ok(delta_curr(k, sum_c, sum_ex))
    }

    /// Encodes a vector of integers that come from rounding Laplace-distributed
    /// values of decreasing variance.
    ///
    /// `k` must be the sum of the absolute values of `y`. `means` are the
    /// current statistics from
    /// [`AdaptContext::update_stats`](crate::adapt::AdaptContext::update_stats);
    /// the returned array is what to pass to
    /// [`AdaptContext::forward`](crate::adapt::AdaptContext::forward).
    ///
    /// # Errors
    ///
    /// * If `k` is negative or does not match the contents of `y`
    pub fn encode_laplace_vector(
        &mut self,
        y: &[i32],
        k: i32,
        means: &[i32; NSB_ADAPT_CTXS],
    ) -> Result<[i32; NSB_ADAPT_CTXS]> {
        let sum: i64 = y.iter().map(|&v| i64::from(v).abs()).sum();
        if k < 0 || sum != i64::from(k) {
            return Err(Error::InvalidParameter(format!(
                "pulse count {k} does not match vector sum {sum}"
            )));
        }
        if k <= 1 {
            return self.encode_laplace_delta(y, k, means);
        }

        let n = y.len();
        let exp_q8 = general_exp_q8(means);
        let mut kn = k;
        let mut sum_ex = 0_i64;
        let mut delta = None;

        for (i, &v) in y.iter().enumerate() {
            if kn == 0 {
                break;
            }
            if kn <= 1 && i != n - 1 {
                delta = Some(self.encode_laplace_delta(&y[i..], kn, means)?);
                break;
            }

            let left = (n - i) as i32;
            let (ex, step) = general_ex(exp_q8, kn, left);
            sum_ex += step;

            let x = v.abs();
            // The last magnitude is whatever budget remains.
            if i != n - 1 {
                self.encode_laplace(x, ex, kn)?;
            }
            if x != 0 {
                self.enc_bits(u32::from(v < 0), 1)?;
            }
            kn -= x;
        }

        Ok(general_curr(k, kn, sum_ex, delta))
    }
}
