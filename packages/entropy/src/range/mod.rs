//! Range encoder and decoder.
//!
//! The coder keeps a 32-bit range renormalized to `(2^23, 2^31]` and emits or
//! consumes whole bytes. Range-coded symbols grow forward from the start of the
//! buffer while raw bits grow backward from its end, so both share a single
//! packet.

mod decoder;
mod encoder;

pub use decoder::RangeDecoder;
pub use encoder::{Checkpoint, RangeEncoder};

use crate::util::ilog;

/// Number of bits in a single output symbol (one byte).
pub const SYM_BITS: u32 = 8;
/// Width of the coder state registers.
pub const CODE_BITS: u32 = 32;
/// Largest value of a single output symbol.
pub const SYM_MAX: u32 = (1 << SYM_BITS) - 1;
/// Shift that moves the top output symbol of `val` down to the low byte.
pub const CODE_SHIFT: u32 = CODE_BITS - SYM_BITS - 1;
/// Upper bound of the range (exclusive for `val`).
pub const CODE_TOP: u32 = 1 << (CODE_BITS - 1);
/// The range is renormalized whenever it falls to this value or below.
pub const CODE_BOT: u32 = CODE_TOP >> SYM_BITS;
/// Bits of the first byte that are not consumed by the decoder's initial fill.
pub const CODE_EXTRA: u32 = (CODE_BITS - 2) % SYM_BITS + 1;
/// Bits of precision entropy coded by `enc_uint` before falling back to raw bits.
pub const UINT_BITS: u32 = 4;
/// Resolution of [`Tell::tell_frac`]: 3 means eighths of a bit.
pub const BITRES: u32 = 3;
/// Largest number of raw bits accepted by a single `enc_bits`/`dec_bits` call.
pub const MAX_RAW_BITS: u32 = 32;
/// Largest total accepted by the generic `encode`/`decode` primitives.
pub const MAX_TOTAL: u32 = 1 << 16;

/// Bit accounting shared by the encoder and the decoder.
///
/// Both sides compute these values from `(nbits_total, rng)` alone, so the
/// encoder and decoder agree on them after processing the same symbols.
pub trait Tell {
    /// Total number of whole bits written or read so far, including the
    /// initial bit the coder claims at start.
    fn nbits_total(&self) -> u32;

    /// Current size of the coding interval.
    fn range(&self) -> u32;

    /// Number of whole bits "used" by the symbols coded so far.
    ///
    /// Always slightly larger than the exact value; a fresh coder reports 1.
    fn tell(&self) -> u32 {
        self.nbits_total().saturating_sub(ilog(self.range()))
    }

    /// Number of bits used so far scaled by `2^BITRES`.
    ///
    /// All rounding error is in the positive direction, and the result is
    /// never more than one scaled bit below `tell() << BITRES`.
    fn tell_frac(&self) -> u32 {
        tell_frac(self.nbits_total(), self.range())
    }
}

/// Fractional bit count from a whole-bit total and the current range.
///
/// Computes the worst-case number of bits needed to ensure the final value
/// lands inside the current interval for any subsequent bits. Independent of
/// `val`, so the decoder, which never sees it, gets the same answer.
#[must_use]
pub const fn tell_frac(nbits_total: u32, rng: u32) -> u32 {
    let nbits = nbits_total << BITRES;
    let mut l = ilog(rng);
    if l < 16 {
        return nbits.saturating_sub(l << BITRES);
    }
    let mut r = rng >> (l - 16);
    let mut i = 0;
    while i < BITRES {
        r = (r * r) >> 15;
        let b = r >> 16;
        l = (l << 1) | b;
        r >>= b;
        i += 1;
    }
    nbits.saturating_sub(l)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    struct Snapshot {
        nbits_total: u32,
        range: u32,
    }

    impl Tell for Snapshot {
        fn nbits_total(&self) -> u32 {
            self.nbits_total
        }

        fn range(&self) -> u32 {
            self.range
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(CODE_SHIFT, 23);
        assert_eq!(CODE_TOP, 0x8000_0000);
        assert_eq!(CODE_BOT, 0x0080_0000);
        assert_eq!(CODE_EXTRA, 7);
        assert_eq!(SYM_MAX, 0xFF);
    }

    #[test]
    fn test_fresh_state_reports_one_bit() {
        let s = Snapshot {
            nbits_total: 33,
            range: CODE_TOP,
        };
        assert_eq!(s.tell(), 1);
        assert_eq!(s.tell_frac(), 8);
    }

    #[test_case(0x100, 0x2C93_4200 ; "sample_a")]
    #[test_case(0xA2, 0x26B3_D280 ; "sample_b")]
    #[test_case(0x6A3, 0x02B7_9000 ; "sample_c")]
    #[test_case(0x39A, 0x0896_DA00 ; "sample_d")]
    #[test_case(0x679, 0x1165_3800 ; "sample_e")]
    #[test_case(0x40, 0x0080_0001 ; "range_at_bottom")]
    fn test_tell_frac_bounded_by_tell(nbits_total: u32, range: u32) {
        let s = Snapshot { nbits_total, range };
        let whole = s.tell() << BITRES;
        let frac = s.tell_frac();
        assert!(frac <= whole, "frac={frac} whole={whole}");
        assert!(frac + (1 << BITRES) > whole, "frac={frac} whole={whole}");
    }

    #[test]
    fn test_tell_frac_half_range_costs_one_more_bit() {
        let full = tell_frac(40, CODE_TOP);
        let half = tell_frac(40, CODE_TOP >> 1);
        assert_eq!(half - full, 1 << BITRES);
    }
}
