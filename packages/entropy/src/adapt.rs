//! Per-row adaptation context.
//!
//! A causal 2D moving average over a grid of blocks. Every position combines
//! a forward horizontal average along the current row with a per-column
//! average carried from the rows above, and [`AdaptContext::row_backward`]
//! adds a backward pass over the finished row so the filter response is
//! symmetric. Several statistics are tracked side by side.
//!
//! The encoder and the decoder must drive the context with the same calls in
//! the same order.

use crate::error::{Error, Result};
use crate::util::saturate_i32;

/// Number of statistics tracked per position.
pub const NSB_ADAPT_CTXS: usize = 4;

/// Expected pulse count, Q8.
pub const K_Q8: usize = 0;
/// Expected sum of per-position expectations, Q8.
pub const SUM_EX_Q8: usize = 1;
/// Expected delta-mode pulse distance, Q8.
pub const COUNT_Q8: usize = 2;
/// Expected delta-mode distance expectation, Q8.
pub const COUNT_EX_Q8: usize = 3;

/// Marks a statistic that was not produced for a position. Such values are
/// never folded into any average.
pub const NO_VALUE: i32 = i32::MIN;

/// Largest accepted adaptation speed (log2 of the time constant).
pub const MAX_SPEED: u32 = 15;

/// Adaptation speeds and initial values of each statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptParams {
    /// log2 of the time constant of each statistic's averages.
    pub speeds: [u32; NSB_ADAPT_CTXS],
    /// Value each average starts from.
    pub inits: [i32; NSB_ADAPT_CTXS],
}

impl Default for AdaptParams {
    fn default() -> Self {
        Self {
            speeds: [2, 2, 1, 1],
            inits: [2031, 216, 104, 128],
        }
    }
}

impl AdaptParams {
    /// Replaces the adaptation speeds.
    #[must_use]
    pub const fn with_speeds(mut self, speeds: [u32; NSB_ADAPT_CTXS]) -> Self {
        self.speeds = speeds;
        self
    }

    /// Replaces the initial averages.
    #[must_use]
    pub const fn with_inits(mut self, inits: [i32; NSB_ADAPT_CTXS]) -> Self {
        self.inits = inits;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AdaptData {
    curr: i32,
    mean: i32,
}

/// One-pole IIR step: `acc + ((value - acc) >> speed)`.
fn follow(acc: i32, value: i32, speed: u32) -> i32 {
    saturate_i32(i64::from(acc) + ((i64::from(value) - i64::from(acc)) >> speed))
}

/// 2D moving average state for one row of `nhv` positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptContext {
    data: Vec<[AdaptData; NSB_ADAPT_CTXS]>,
    params: AdaptParams,
}

impl AdaptContext {
    /// Creates a context for rows of `nhv` positions, with column averages
    /// already set as by [`Self::row_init`].
    ///
    /// # Errors
    ///
    /// * If `nhv` is zero or a speed exceeds [`MAX_SPEED`]
    pub fn new(nhv: usize, params: AdaptParams) -> Result<Self> {
        if nhv == 0 {
            return Err(Error::InvalidParameter(
                "adaptation row must have at least one position".to_string(),
            ));
        }
        if let Some(speed) = params.speeds.iter().find(|&&s| s > MAX_SPEED) {
            return Err(Error::InvalidParameter(format!(
                "adaptation speed {speed} exceeds {MAX_SPEED}"
            )));
        }

        let empty = AdaptData {
            curr: NO_VALUE,
            mean: 0,
        };
        let mut ctx = Self {
            data: vec![[empty; NSB_ADAPT_CTXS]; nhv],
            params,
        };
        ctx.row_init();
        Ok(ctx)
    }

    /// Number of positions in a row.
    #[must_use]
    pub fn nhv(&self) -> usize {
        self.data.len()
    }

    /// Parameters the context was created with.
    #[must_use]
    pub const fn params(&self) -> &AdaptParams {
        &self.params
    }

    /// Resets every column average. Call once per frame.
    pub fn row_init(&mut self) {
        let AdaptParams { speeds, inits } = self.params;
        for column in &mut self.data {
            for (i, entry) in column.iter_mut().enumerate() {
                let init = i64::from(inits[i]);
                entry.mean = saturate_i32(2 * init - (init >> speeds[i]));
            }
        }
    }

    /// Returns a fresh horizontal average. Call at the start of every row.
    #[must_use]
    pub const fn hmean_init(&self) -> [i32; NSB_ADAPT_CTXS] {
        self.params.inits
    }

    fn column(&self, xpos: usize) -> Result<&[AdaptData; NSB_ADAPT_CTXS]> {
        self.data.get(xpos).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "position {xpos} outside a row of {}",
                self.data.len()
            ))
        })
    }

    /// Expected values at `xpos`, blending the column average with the
    /// horizontal average `hmean`.
    ///
    /// # Errors
    ///
    /// * If `xpos` is outside the row
    pub fn update_stats(
        &self,
        xpos: usize,
        hmean: &[i32; NSB_ADAPT_CTXS],
    ) -> Result<[i32; NSB_ADAPT_CTXS]> {
        let column = self.column(xpos)?;
        let speeds = self.params.speeds;
        let mut means = [0; NSB_ADAPT_CTXS];
        for (i, (mean, entry)) in means.iter_mut().zip(column).enumerate() {
            *mean = saturate_i32(i64::from(entry.mean) + i64::from(hmean[i] >> speeds[i]));
        }
        Ok(means)
    }

    /// Commits the values produced at `xpos`.
    ///
    /// Each value other than [`NO_VALUE`] is halved, folded into `hmean`, and
    /// `hmean` is then folded into the column average.
    ///
    /// # Errors
    ///
    /// * If `xpos` is outside the row
    pub fn forward(
        &mut self,
        xpos: usize,
        hmean: &mut [i32; NSB_ADAPT_CTXS],
        curr: &[i32; NSB_ADAPT_CTXS],
    ) -> Result<()> {
        self.column(xpos)?;
        let speeds = self.params.speeds;
        for (i, entry) in self.data[xpos].iter_mut().enumerate() {
            if curr[i] == NO_VALUE {
                entry.curr = NO_VALUE;
                continue;
            }
            entry.curr = curr[i] >> 1;
            hmean[i] = follow(hmean[i], entry.curr, speeds[i]);
            entry.mean = follow(entry.mean, hmean[i], speeds[i]);
        }
        log::trace!("adapt forward: xpos={xpos} hmean={hmean:?}");
        Ok(())
    }

    /// Runs the backward pass over the finished row. Call at the end of
    /// every row.
    pub fn row_backward(&mut self) {
        let speeds = self.params.speeds;
        let mut hmean = self.hmean_init();
        for column in self.data.iter_mut().rev() {
            for (i, entry) in column.iter_mut().enumerate() {
                if entry.curr == NO_VALUE {
                    continue;
                }
                let s = speeds[i];
                let correction = i64::from(hmean[i] >> s) - i64::from(hmean[i] >> (2 * s));
                entry.mean = saturate_i32(i64::from(entry.mean) + correction);
                hmean[i] = follow(hmean[i], entry.curr, s);
            }
        }
    }
}
