use crate::adapt::NSB_ADAPT_CTXS;
use crate::error::{Error, Result};
use crate::range::RangeDecoder;
use crate::util::saturate_i32;

use super::{
    delta_coef, delta_curr, delta_ex, delta_first_decay, general_curr, general_ex,
    general_exp_q8, scalar_shape, scalar_symbols, tail_shape,
};

#[allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]
impl RangeDecoder<'_> {
    /// Decodes a value written by
    /// [`RangeEncoder::encode_laplace_special`](crate::range::RangeEncoder::encode_laplace_special).
    ///
    /// A result above `max` can only come from a corrupt packet; it is
    /// clamped and recorded as a sticky error.
    ///
    /// # Errors
    ///
    /// * If `max` is negative
    pub fn decode_laplace_special(&mut self, decay: u32, max: Option<i32>) -> Result<i32> {
        if max.is_some_and(|m| m < 0) {
            return Err(Error::InvalidParameter(format!(
                "negative tail maximum {max:?}"
            )));
        }
        if max == Some(0) {
            return Ok(0);
        }

        let (cdf, shift) = tail_shape(decay, max);
        let mut ms = max.map(|m| m >> shift);
        let mut xs = 0_i32;
        loop {
            let sym = match ms {
                Some(m) if (1..15).contains(&m) => {
                    self.decode_cdf_unscaled(&cdf[..=m as usize])?
                }
                _ => self.decode_cdf_q15(cdf)?,
            } as i32;
            let Some(sum) = xs.checked_add(sym) else {
                self.record_corruption("laplace tail overflowed".to_string());
                break;
            };
            xs = sum;
            ms = ms.map(|m| m - 15);
            if sym < 15 || ms == Some(0) {
                break;
            }
        }

        let mut pos = if shift > 0 {
            let low = i64::from(self.dec_bits(shift)?);
            saturate_i32((i64::from(xs) << shift) + low)
        } else {
            xs
        };
        if let Some(m) = max
            && pos > m
        {
            self.record_corruption(format!("laplace tail {pos} above maximum {m}"));
            pos = m;
        }
        Ok(pos)
    }

    /// Decodes a magnitude written by
    /// [`RangeEncoder::encode_laplace`](crate::range::RangeEncoder::encode_laplace)
    /// with the same `ex_q8` and `k`.
    ///
    /// # Errors
    ///
    /// * If `k` is negative
    pub fn decode_laplace(&mut self, ex_q8: i32, k: i32) -> Result<i32> {
        if k < 0 {
            return Err(Error::InvalidParameter(format!(
                "negative magnitude bound {k}"
            )));
        }

        let shape = scalar_shape(ex_q8, k);
        let shift = shape.shift;
        let mut sym = if shape.k == 0 {
            0
        } else {
            self.decode_cdf_unscaled(&shape.cdf[..scalar_symbols(shape.k)])? as i32
        };

        let mut lsb = 0_i64;
        if shift > 0 {
            let special = u32::from(sym == 0);
            if shift - special > 0 {
                lsb = i64::from(self.dec_bits(shift - special)?);
            }
            lsb -= i64::from(special == 0) << (shift - 1);
        }

        if sym == 15 {
            let tail = self.decode_laplace_special(shape.decay as u32, Some(shape.k - 15))?;
            sym = self.add_decoded(sym, tail);
        }
        let x = saturate_i32((i64::from(sym) << shift) + lsb);
        log::trace!("laplace: x={x} ex_q8={ex_q8} k={k} shift={shift}");
        Ok(x)
    }

    /// Delta mode: decodes pulse positions as distances. Clears `y` first.
    pub(super) fn decode_laplace_delta(
        &mut self,
        y: &mut [i32],
        k: i32,
        means: &[i32; NSB_ADAPT_CTXS],
    ) -> Result<[i32; NSB_ADAPT_CTXS]> {
        y.fill(0);
        let n = y.len() as i32;
        let coef = delta_coef(means);
        let mut prev = 0;
        let mut pos = 0_i32;
        let mut sum_ex = 0_i64;
        let mut sum_c = 0_i64;
        let mut negative = false;
        let mut k_left = k;

        for pulse in 0..k {
            let count = if pulse == 0 {
                let decay = delta_first_decay(coef, n, k_left);
                self.decode_laplace_special(decay, Some(n - 1))?
            } else {
                self.decode_laplace(delta_ex(coef, n - prev, k_left), n - prev - 1)?
            };
            sum_ex += 256 * i64::from(n - prev);
            sum_c += i64::from(count) * i64::from(k_left);

            pos = pos.saturating_add(count);
            let Some(slot) = usize::try_from(pos).ok().and_then(|p| y.get_mut(p)) else {
                self.record_corruption(format!("pulse position {pos} outside {n} entries"));
                break;
            };
            if *slot == 0 {
                negative = self.dec_bits(1)? == 1;
            }
            *slot += if negative { -1 } else { 1 };

            prev = pos;
            k_left -= 1;
            if k_left == 0 {
                break;
            }
        }

        Ok(delta_curr(k, sum_c, sum_ex))
    }

    /// Decodes a vector written by
    /// [`RangeEncoder::encode_laplace_vector`](crate::range::RangeEncoder::encode_laplace_vector)
    /// into `y`, which must have the same length as the encoded vector.
    ///
    /// Returns the adaptation values to commit, exactly as the encoder did.
    ///
    /// # Errors
    ///
    /// * If `k` is negative, or positive with an empty `y`
    pub fn decode_laplace_vector(
        &mut self,
        y: &mut [i32],
        k: i32,
        means: &[i32; NSB_ADAPT_CTXS],
    ) -> Result<[i32; NSB_ADAPT_CTXS]> {
        if k < 0 || (k > 0 && y.is_empty()) {
            return Err(Error::InvalidParameter(format!(
                "cannot decode {k} pulses into {} entries",
                y.len()
            )));
        }
        if k <= 1 {
            return self.decode_laplace_delta(y, k, means);
        }

        y.fill(0);
        let n = y.len();
        let exp_q8 = general_exp_q8(means);
        let mut kn = k;
        let mut sum_ex = 0_i64;
        let mut delta = None;

        for i in 0..n {
            if kn == 0 {
                break;
            }
            if kn <= 1 && i != n - 1 {
                delta = Some(self.decode_laplace_delta(&mut y[i..], kn, means)?);
                break;
            }

            let left = (n - i) as i32;
            let (ex, step) = general_ex(exp_q8, kn, left);
            sum_ex += step;

            let mut x = if i == n - 1 {
                kn
            } else {
                self.decode_laplace(ex, kn)?
            };
            if x > kn {
                self.record_corruption(format!("magnitude {x} above remaining {kn}"));
                x = kn;
            }
            kn -= x;
            if x != 0 && self.dec_bits(1)? == 1 {
                x = -x;
            }
            y[i] = x;
        }

        Ok(general_curr(k, kn, sum_ex, delta))
    }
}
