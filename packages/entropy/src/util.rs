/// Number of bits needed to represent `x`, with `ilog(0) == 0`.
#[must_use]
pub const fn ilog(x: u32) -> u32 {
    u32::BITS - x.leading_zeros()
}

/// Signed variant of [`ilog`]. Negative inputs are treated as zero.
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub const fn ilog_i32(x: i32) -> i32 {
    if x <= 0 { 0 } else { ilog(x as u32) as i32 }
}

/// Narrows a 64-bit intermediate back to `i32`, saturating at the bounds.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn saturate_i32(x: i64) -> i32 {
    if x > i32::MAX as i64 {
        i32::MAX
    } else if x < i32::MIN as i64 {
        i32::MIN
    } else {
        x as i32
    }
}
