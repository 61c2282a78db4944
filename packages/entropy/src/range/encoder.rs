use crate::cdf;
use crate::error::{Error, Result};
use crate::range::{
    CODE_BITS, CODE_BOT, CODE_SHIFT, CODE_TOP, MAX_RAW_BITS, MAX_TOTAL, SYM_BITS, SYM_MAX, Tell,
    UINT_BITS,
};
use crate::util::ilog;

/// Range encoder producing the byte stream read by [`super::RangeDecoder`].
///
/// Range-coded symbols are written forward from the start of the packet and
/// raw bits from [`Self::enc_bits`] backward from its end. Output bytes are
/// held back until a later byte proves no carry can reach them: the last
/// candidate byte waits in `rem` and any run of `0xFF` bytes after it is only
/// counted in `ext`.
///
/// Capacity overruns are sticky: the first one is recorded, later writes are
/// dropped, and [`Self::done`] reports it.
///
/// # Examples
///
/// ```rust
/// # use vcodec_entropy::range::{RangeDecoder, RangeEncoder};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut encoder = RangeEncoder::new();
/// encoder.encode_bit_logp(true, 3)?;
/// encoder.enc_uint(700, 1000)?;
/// let packet = encoder.done()?;
///
/// let mut decoder = RangeDecoder::new(&packet);
/// assert!(decoder.decode_bit_logp(3)?);
/// assert_eq!(decoder.dec_uint(1000)?, 700);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RangeEncoder {
    buffer: Vec<u8>,
    end_buffer: Vec<u8>,
    limit: Option<usize>,
    rem: Option<u8>,
    ext: usize,
    val: u32,
    rng: u32,
    end_window: u64,
    end_bits: u32,
    nbits_total: u32,
    error: Option<Error>,
}

/// Encoder state saved by [`RangeEncoder::checkpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    buffer_len: usize,
    end_buffer_len: usize,
    rem: Option<u8>,
    ext: usize,
    val: u32,
    rng: u32,
    end_window: u64,
    end_bits: u32,
    nbits_total: u32,
    error: Option<Error>,
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeEncoder {
    /// Creates an encoder with a growable output buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            end_buffer: Vec::new(),
            limit: None,
            rem: None,
            ext: 0,
            val: 0,
            rng: CODE_TOP,
            end_window: 0,
            end_bits: 0,
            nbits_total: CODE_BITS + 1,
            error: None,
        }
    }

    /// Creates an encoder whose packet is exactly `limit` bytes long.
    ///
    /// Writes past the limit record [`Error::StorageExhausted`]. The finished
    /// packet is zero padded between the coded bytes and the raw bits.
    #[must_use]
    pub fn with_capacity(limit: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(limit),
            limit: Some(limit),
            ..Self::new()
        }
    }

    /// Discards everything encoded so far and starts a fresh stream, keeping
    /// the allocations and the capacity limit.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.end_buffer.clear();
        self.rem = None;
        self.ext = 0;
        self.val = 0;
        self.rng = CODE_TOP;
        self.end_window = 0;
        self.end_bits = 0;
        self.nbits_total = CODE_BITS + 1;
        self.error = None;
    }

    /// Saves the current state so a trial encode can be undone with
    /// [`Self::rollback`].
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            buffer_len: self.buffer.len(),
            end_buffer_len: self.end_buffer.len(),
            rem: self.rem,
            ext: self.ext,
            val: self.val,
            rng: self.rng,
            end_window: self.end_window,
            end_bits: self.end_bits,
            nbits_total: self.nbits_total,
            error: self.error.clone(),
        }
    }

    /// Restores a state saved by [`Self::checkpoint`] on this encoder.
    ///
    /// Bytes changed by [`Self::patch_initial_bits`] after the checkpoint are
    /// not restored.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.buffer.truncate(checkpoint.buffer_len);
        self.end_buffer.truncate(checkpoint.end_buffer_len);
        self.rem = checkpoint.rem;
        self.ext = checkpoint.ext;
        self.val = checkpoint.val;
        self.rng = checkpoint.rng;
        self.end_window = checkpoint.end_window;
        self.end_bits = checkpoint.end_bits;
        self.nbits_total = checkpoint.nbits_total;
        self.error = checkpoint.error;
    }

    /// Returns the sticky error, if any write or patch has failed.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns `true` once a sticky error has been recorded.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Number of range-coded bytes written to the output so far.
    ///
    /// Bytes still held back for carry resolution are not counted.
    #[must_use]
    pub const fn range_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the current range.
    #[must_use]
    pub const fn get_range(&self) -> u32 {
        self.rng
    }

    fn record_error(&mut self, error: Error) {
        if self.error.is_none() {
            log::warn!("range encoder error: {error}");
            self.error = Some(error);
        }
    }

    fn has_room(&self) -> bool {
        self.limit
            .is_none_or(|limit| self.buffer.len() + self.end_buffer.len() < limit)
    }

    fn write_byte(&mut self, value: u8) {
        if self.has_room() {
            self.buffer.push(value);
        } else {
            self.record_error(Error::StorageExhausted(format!(
                "no room for range coded byte at offset {}",
                self.buffer.len()
            )));
        }
    }

    fn write_byte_at_end(&mut self, value: u8) {
        if self.has_room() {
            self.end_buffer.push(value);
        } else {
            self.record_error(Error::StorageExhausted(format!(
                "no room for raw byte {} from the end",
                self.end_buffer.len()
            )));
        }
    }

    /// Outputs a symbol with a possible carry bit in bit 8.
    ///
    /// A symbol of `0xFF` may still change if a later carry arrives, so it is
    /// only counted. Any other symbol settles the carry for everything held
    /// back before it.
    #[allow(clippy::cast_possible_truncation)]
    fn carry_out(&mut self, c: u32) {
        if c == SYM_MAX {
            assert!(
                self.ext < usize::MAX,
                "pending 0xFF run counter overflowed"
            );
            self.ext += 1;
            return;
        }

        let carry = c >> SYM_BITS;
        if let Some(rem) = self.rem {
            self.write_byte(rem.wrapping_add(carry as u8));
        }
        if self.ext > 0 {
            let sym = ((SYM_MAX + carry) & SYM_MAX) as u8;
            for _ in 0..self.ext {
                self.write_byte(sym);
            }
            self.ext = 0;
        }
        self.rem = Some((c & SYM_MAX) as u8);
    }

    fn normalize(&mut self) {
        while self.rng <= CODE_BOT {
            self.carry_out(self.val >> CODE_SHIFT);
            self.val = (self.val << SYM_BITS) & (CODE_TOP - 1);
            self.rng <<= SYM_BITS;
            self.nbits_total += SYM_BITS;
        }
    }

    fn check_interval(fl: u32, fh: u32, ft: u32) -> Result<()> {
        if ft == 0 || ft > MAX_TOTAL || fl >= fh || fh > ft {
            return Err(Error::InvalidParameter(format!(
                "invalid interval [{fl}, {fh}) of {ft}"
            )));
        }
        Ok(())
    }

    /// Encodes the interval `[fl, fh)` out of a total of `ft`.
    ///
    /// # Errors
    ///
    /// * If `ft` is zero or above 65536, or the interval is empty or exceeds `ft`
    pub fn encode(&mut self, fl: u32, fh: u32, ft: u32) -> Result<()> {
        Self::check_interval(fl, fh, ft)?;
        log::trace!("encode: fl={fl} fh={fh} ft={ft} rng={}", self.rng);

        let r = self.rng / ft;
        if fl > 0 {
            self.val += self.rng - r * (ft - fl);
            self.rng = r * (fh - fl);
        } else {
            self.rng -= r * (ft - fh);
        }
        self.normalize();
        Ok(())
    }

    /// Encodes the interval `[fl, fh)` out of a total of `1 << bits`.
    ///
    /// Same as [`Self::encode`] with a power-of-two total, without the
    /// division.
    ///
    /// # Errors
    ///
    /// * If `bits > 16` or the interval is invalid
    pub fn encode_bin(&mut self, fl: u32, fh: u32, bits: u32) -> Result<()> {
        if bits > 16 {
            return Err(Error::InvalidParameter(format!(
                "binary total of {bits} bits is too wide"
            )));
        }
        let ft = 1_u32 << bits;
        Self::check_interval(fl, fh, ft)?;

        let r = self.rng >> bits;
        if fl > 0 {
            self.val += self.rng - r * (ft - fl);
            self.rng = r * (fh - fl);
        } else {
            self.rng -= r * (ft - fh);
        }
        self.normalize();
        Ok(())
    }

    /// Encodes a bit that is `true` with probability `1 / (1 << logp)`.
    ///
    /// # Errors
    ///
    /// * If `logp` is not in `1..=16`
    pub fn encode_bit_logp(&mut self, val: bool, logp: u32) -> Result<()> {
        if !(1..=16).contains(&logp) {
            return Err(Error::InvalidParameter(format!(
                "bit probability 1/2^{logp} out of range"
            )));
        }
        let s = self.rng >> logp;
        let r = self.rng - s;
        if val {
            self.val += r;
            self.rng = s;
        } else {
            self.rng = r;
        }
        self.normalize();
        Ok(())
    }

    /// Encodes a boolean where `false` has probability `fz / ft`.
    ///
    /// # Errors
    ///
    /// * If `fz` is not strictly between 0 and `ft`, or `ft` exceeds 65536
    pub fn encode_bool(&mut self, val: bool, fz: u32, ft: u32) -> Result<()> {
        if fz == 0 || fz >= ft {
            return Err(Error::InvalidParameter(format!(
                "bool probability {fz}/{ft} out of range"
            )));
        }
        if val {
            self.encode(fz, ft, ft)
        } else {
            self.encode(0, fz, ft)
        }
    }

    /// Encodes a boolean where `false` has probability `fz / 32768`.
    ///
    /// # Errors
    ///
    /// * If `fz` is not in `1..32768`
    pub fn encode_bool_q15(&mut self, val: bool, fz: u32) -> Result<()> {
        if fz == 0 || fz >= 32768 {
            return Err(Error::InvalidParameter(format!(
                "bool probability {fz}/32768 out of range"
            )));
        }
        if val {
            self.encode_bin(fz, 32768, 15)
        } else {
            self.encode_bin(0, fz, 15)
        }
    }

    /// Encodes symbol `s` of a CDF whose total is between 16384 and 32768.
    ///
    /// # Errors
    ///
    /// * If the CDF is malformed, its total is out of range, or `s` has zero
    ///   probability
    pub fn encode_cdf(&mut self, s: usize, cdf: &[u16]) -> Result<()> {
        let ft = cdf::total(cdf)?;
        if !(16384..=32768).contains(&ft) {
            return Err(Error::InvalidParameter(format!(
                "cdf total {ft} outside 16384..=32768"
            )));
        }
        let (fl, fh) = cdf::interval(cdf, s)?;
        self.encode(fl, fh, ft)
    }

    /// Encodes symbol `s` of a CDF whose total is exactly 32768.
    ///
    /// # Errors
    ///
    /// * If the CDF is malformed, its total is not 32768, or `s` has zero
    ///   probability
    pub fn encode_cdf_q15(&mut self, s: usize, cdf: &[u16]) -> Result<()> {
        let ft = cdf::total(cdf)?;
        if ft != 32768 {
            return Err(Error::InvalidParameter(format!(
                "q15 cdf total is {ft}, expected 32768"
            )));
        }
        let (fl, fh) = cdf::interval(cdf, s)?;
        self.encode_bin(fl, fh, 15)
    }

    /// Encodes symbol `s` of a CDF with any total up to 32768.
    ///
    /// The interval is scaled up by `15 - ilog(ft - 1)` bits so the coded
    /// total lies in `(16384, 32768]`. This is the entry point used by the
    /// adaptive models, whose totals drift as they learn.
    ///
    /// # Errors
    ///
    /// * If the CDF is malformed, its total exceeds 32768, or `s` has zero
    ///   probability
    pub fn encode_cdf_unscaled(&mut self, s: usize, cdf: &[u16]) -> Result<()> {
        let ft = cdf::total(cdf)?;
        if ft > 32768 {
            return Err(Error::InvalidParameter(format!(
                "unscaled cdf total {ft} exceeds 32768"
            )));
        }
        let (fl, fh) = cdf::interval(cdf, s)?;
        let scale = 15 - ilog(ft - 1);
        self.encode(fl << scale, fh << scale, ft << scale)
    }

    /// Encodes symbol `s` of a CDF whose total is exactly `1 << ftb`.
    ///
    /// # Errors
    ///
    /// * If `ftb > 15`, the total does not match, or `s` has zero probability
    pub fn encode_cdf_unscaled_dyadic(&mut self, s: usize, cdf: &[u16], ftb: u32) -> Result<()> {
        let ft = cdf::total(cdf)?;
        if ftb > 15 || ft != 1 << ftb {
            return Err(Error::InvalidParameter(format!(
                "dyadic cdf total {ft} is not 2^{ftb}"
            )));
        }
        let (fl, fh) = cdf::interval(cdf, s)?;
        self.encode_bin(fl, fh, ftb)
    }

    /// Encodes `fl` uniformly distributed in `[0, ft)`.
    ///
    /// Totals above 16 entropy code only the top [`UINT_BITS`] bits of
    /// precision and write the remainder as raw bits.
    ///
    /// # Errors
    ///
    /// * If `ft < 2` or `fl >= ft`
    #[allow(clippy::cast_possible_truncation)]
    pub fn enc_uint(&mut self, fl: u32, ft: u32) -> Result<()> {
        if ft < 2 || fl >= ft {
            return Err(Error::InvalidParameter(format!(
                "uint {fl} outside [0, {ft})"
            )));
        }
        if ft > 1 << UINT_BITS {
            let top = ft - 1;
            let ftb = ilog(top) - UINT_BITS;
            let nsyms = ((top >> ftb) + 1) as usize;
            self.encode_cdf_q15((fl >> ftb) as usize, cdf::uniform_cdf_q15(nsyms)?)?;
            self.enc_bits(fl & ((1 << ftb) - 1), ftb)
        } else {
            self.encode_cdf_q15(fl as usize, cdf::uniform_cdf_q15(ft as usize)?)
        }
    }

    /// Writes `bits` raw bits of `fl`, least significant first.
    ///
    /// Raw bits are packed into bytes that grow backward from the end of the
    /// packet and cost exactly `bits` in [`Tell::tell`].
    ///
    /// # Errors
    ///
    /// * If `bits > 32` or `fl` does not fit in `bits` bits
    #[allow(clippy::cast_possible_truncation)]
    pub fn enc_bits(&mut self, fl: u32, bits: u32) -> Result<()> {
        if bits > MAX_RAW_BITS || (bits < 32 && fl >> bits != 0) {
            return Err(Error::InvalidParameter(format!(
                "value {fl} does not fit in {bits} raw bits"
            )));
        }
        if bits == 0 {
            return Ok(());
        }

        self.end_window |= u64::from(fl) << self.end_bits;
        self.end_bits += bits;
        while self.end_bits >= SYM_BITS {
            self.write_byte_at_end((self.end_window & u64::from(SYM_MAX)) as u8);
            self.end_window >>= SYM_BITS;
            self.end_bits -= SYM_BITS;
        }
        self.nbits_total += bits;
        Ok(())
    }

    /// Overwrites the top `nbits` bits of the first byte of the packet.
    ///
    /// Lets a caller reserve flag bits at the start of the stream and fill
    /// them in later. This works once the first byte has been produced (written
    /// or held back for carry), or while enough of the range is settled that
    /// those bits of `val` can no longer change. Otherwise a sticky
    /// [`Error::PatchFailure`] is recorded.
    ///
    /// # Errors
    ///
    /// * If `nbits` is not in `1..=8` or `val` does not fit in `nbits` bits
    #[allow(clippy::cast_possible_truncation)]
    pub fn patch_initial_bits(&mut self, val: u32, nbits: u32) -> Result<()> {
        if !(1..=SYM_BITS).contains(&nbits) || val >> nbits != 0 {
            return Err(Error::InvalidParameter(format!(
                "cannot patch {val} into {nbits} bits"
            )));
        }
        let shift = SYM_BITS - nbits;
        let mask = ((1_u32 << nbits) - 1) << shift;

        if let Some(first) = self.buffer.first_mut() {
            *first = (u32::from(*first) & !mask | val << shift) as u8;
        } else if let Some(rem) = self.rem {
            self.rem = Some((u32::from(rem) & !mask | val << shift) as u8);
        } else if self.ext == 0 && self.rng <= CODE_TOP >> nbits {
            self.val = (self.val & !(mask << CODE_SHIFT)) | val << (CODE_SHIFT + shift);
        } else {
            self.record_error(Error::PatchFailure(format!(
                "initial {nbits} bits are not determined yet"
            )));
            return Ok(());
        }
        log::debug!("patched initial {nbits} bits to {val:#x}");
        Ok(())
    }

    /// Finishes the stream and returns the packet.
    ///
    /// Emits the shortest suffix that identifies the final interval, flushes
    /// the bytes held back for carry and the raw-bit window, and merges any
    /// leftover raw bits into the last coded byte when its low bits are
    /// unused.
    ///
    /// # Errors
    ///
    /// * [`Error::StorageExhausted`] if the packet did not fit in the capacity
    /// * [`Error::PatchFailure`] if an earlier patch failed
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss
    )]
    pub fn done(mut self) -> Result<Vec<u8>> {
        let mut l = (CODE_BITS - ilog(self.rng)) as i32;
        let mut msk = (CODE_TOP - 1) >> l;
        let mut end = (self.val + msk) & !msk;
        if u64::from(end | msk) >= u64::from(self.val) + u64::from(self.rng) {
            l += 1;
            msk >>= 1;
            end = (self.val + msk) & !msk;
        }
        while l > 0 {
            self.carry_out(end >> CODE_SHIFT);
            end = (end << SYM_BITS) & (CODE_TOP - 1);
            l -= SYM_BITS as i32;
        }
        if self.rem.is_some() || self.ext > 0 {
            self.carry_out(0);
        }

        let spare = (-l) as u32;
        let mut window = self.end_window as u8;
        let used = self.end_bits;

        let packet = match self.limit {
            Some(limit) => {
                let mut packet = vec![0; limit];
                packet[..self.buffer.len()].copy_from_slice(&self.buffer);
                for (i, byte) in self.end_buffer.iter().enumerate() {
                    packet[limit - 1 - i] = *byte;
                }
                if used > 0 && self.error.is_none() {
                    if self.end_buffer.len() >= limit {
                        self.record_error(Error::StorageExhausted(
                            "no room for trailing raw bits".to_string(),
                        ));
                    } else {
                        if self.buffer.len() + self.end_buffer.len() >= limit && spare < used {
                            window &= ((1_u32 << spare) - 1) as u8;
                            self.record_error(Error::StorageExhausted(
                                "trailing raw bits overlap the last coded byte".to_string(),
                            ));
                        }
                        packet[limit - self.end_buffer.len() - 1] |= window;
                    }
                }
                packet
            }
            None => {
                let mut packet = std::mem::take(&mut self.buffer);
                if used > 0 {
                    match packet.last_mut() {
                        Some(last) if spare >= used => *last |= window,
                        _ => packet.push(window),
                    }
                }
                packet.extend(self.end_buffer.iter().rev());
                packet
            }
        };

        if let Some(error) = self.error {
            return Err(error);
        }

        log::debug!(
            "range encoder done: {} bytes, {} total bits",
            packet.len(),
            self.nbits_total
        );

        Ok(packet)
    }
}

impl Tell for RangeEncoder {
    fn nbits_total(&self) -> u32 {
        self.nbits_total
    }

    fn range(&self) -> u32 {
        self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::RangeDecoder;
    use pretty_assertions::assert_eq;
    use rand::{Rng as _, SeedableRng as _, rngs::StdRng};
    use test_case::test_case;

    #[test]
    fn test_carry_propagates_through_pending_ff_run() {
        let mut encoder = RangeEncoder::new();
        encoder.carry_out(0x12);
        encoder.carry_out(0xFF);
        encoder.carry_out(0xFF);
        assert_eq!(encoder.range_bytes(), 0);
        assert_eq!(encoder.ext, 2);

        encoder.carry_out(0x100 | 0x34);
        assert_eq!(encoder.buffer, vec![0x13, 0x00, 0x00]);
        assert_eq!(encoder.rem, Some(0x34));
        assert_eq!(encoder.ext, 0);
    }

    #[test]
    fn test_pending_ff_run_without_carry() {
        let mut encoder = RangeEncoder::new();
        encoder.carry_out(0x80);
        encoder.carry_out(0xFF);
        encoder.carry_out(0x01);
        assert_eq!(encoder.buffer, vec![0x80, 0xFF]);
        assert_eq!(encoder.rem, Some(0x01));
    }

    #[test_case(5, 5, 10 ; "empty_interval")]
    #[test_case(0, 11, 10 ; "past_total")]
    #[test_case(0, 1, 0 ; "zero_total")]
    #[test_case(0, 1, 65537 ; "total_too_large")]
    fn test_encode_rejects_invalid_interval(fl: u32, fh: u32, ft: u32) {
        let mut encoder = RangeEncoder::new();
        let result = encoder.encode(fl, fh, ft);
        let Err(Error::InvalidParameter(_)) = result else {
            panic!("Invalid response {result:?}");
        };
        assert!(!encoder.has_error());
    }

    #[test_case(0 ; "zero")]
    #[test_case(17 ; "seventeen")]
    fn test_encode_bit_logp_rejects_probability(logp: u32) {
        let mut encoder = RangeEncoder::new();
        assert!(encoder.encode_bit_logp(true, logp).is_err());
    }

    #[test]
    fn test_enc_bits_rejects_wide_value() {
        let mut encoder = RangeEncoder::new();
        assert!(encoder.enc_bits(4, 2).is_err());
        assert!(encoder.enc_bits(0, 33).is_err());
        assert!(encoder.enc_bits(u32::MAX, 32).is_ok());
    }

    #[test]
    fn test_raw_bits_cost_exactly_their_width() {
        let mut encoder = RangeEncoder::new();
        encoder.encode_bit_logp(false, 2).unwrap();
        let before = encoder.tell();
        let before_frac = encoder.tell_frac();
        encoder.enc_bits(0x1F, 5).unwrap();
        assert_eq!(encoder.tell(), before + 5);
        assert_eq!(encoder.tell_frac(), before_frac + (5 << 3));
    }

    #[test]
    fn test_empty_stream_produces_empty_packet() {
        let packet = RangeEncoder::new().done().unwrap();
        assert!(packet.is_empty());
    }

    #[test]
    fn test_raw_bits_only_round_trip() {
        let mut encoder = RangeEncoder::new();
        encoder.enc_bits(0b101, 3).unwrap();
        encoder.enc_bits(0xABCD, 16).unwrap();
        let packet = encoder.done().unwrap();
        assert_eq!(packet.len(), 3);

        let mut decoder = RangeDecoder::new(&packet);
        assert_eq!(decoder.dec_bits(3).unwrap(), 0b101);
        assert_eq!(decoder.dec_bits(16).unwrap(), 0xABCD);
    }

    #[test_log::test]
    fn test_patch_initial_bits_before_any_symbol_fails() {
        let mut encoder = RangeEncoder::new();
        encoder.patch_initial_bits(0b10, 2).unwrap();
        let Some(Error::PatchFailure(_)) = encoder.error() else {
            panic!("Invalid error {:?}", encoder.error());
        };
        let result = encoder.done();
        let Err(Error::PatchFailure(_)) = result else {
            panic!("Invalid response {result:?}");
        };
    }

    #[test]
    fn test_patch_initial_bits_rewrites_reserved_flags() {
        let mut encoder = RangeEncoder::new();
        for _ in 0..3 {
            encoder.encode_bit_logp(false, 1).unwrap();
        }
        encoder.patch_initial_bits(0b101, 3).unwrap();
        assert!(!encoder.has_error());
        encoder.enc_uint(5, 10).unwrap();
        encoder.enc_uint(1234, 5000).unwrap();
        let packet = encoder.done().unwrap();
        assert_eq!(packet[0] >> 5, 0b101);

        let mut decoder = RangeDecoder::new(&packet);
        assert!(decoder.decode_bit_logp(1).unwrap());
        assert!(!decoder.decode_bit_logp(1).unwrap());
        assert!(decoder.decode_bit_logp(1).unwrap());
        assert_eq!(decoder.dec_uint(10).unwrap(), 5);
        assert_eq!(decoder.dec_uint(5000).unwrap(), 1234);
        assert!(!decoder.has_error());
    }

    #[test]
    fn test_patch_initial_bits_after_first_byte_is_written() {
        let mut encoder = RangeEncoder::new();
        for _ in 0..40 {
            encoder.encode_bit_logp(false, 1).unwrap();
        }
        encoder.patch_initial_bits(1, 1).unwrap();
        let packet = encoder.done().unwrap();
        assert_eq!(packet[0] & 0x80, 0x80);
    }

    #[test_log::test]
    fn test_capacity_exhaustion_is_sticky() {
        let mut encoder = RangeEncoder::with_capacity(2);
        for i in 0..64 {
            encoder.enc_uint(i * 13 % 1000, 1000).unwrap();
        }
        let Some(Error::StorageExhausted(_)) = encoder.error() else {
            panic!("Invalid error {:?}", encoder.error());
        };
        let result = encoder.done();
        let Err(Error::StorageExhausted(_)) = result else {
            panic!("Invalid response {result:?}");
        };
    }

    #[test]
    fn test_fixed_capacity_packet_is_padded_and_decodes() {
        let mut encoder = RangeEncoder::with_capacity(16);
        encoder.encode_bit_logp(true, 4).unwrap();
        encoder.enc_bits(0x5, 3).unwrap();
        encoder.enc_uint(77, 100).unwrap();
        let packet = encoder.done().unwrap();
        assert_eq!(packet.len(), 16);

        let mut decoder = RangeDecoder::new(&packet);
        assert!(decoder.decode_bit_logp(4).unwrap());
        assert_eq!(decoder.dec_bits(3).unwrap(), 0x5);
        assert_eq!(decoder.dec_uint(100).unwrap(), 77);
    }

    #[test]
    fn test_rollback_discards_trial_encode() {
        let mut encoder = RangeEncoder::new();
        encoder.enc_uint(3, 7).unwrap();
        let checkpoint = encoder.checkpoint();
        let tell = encoder.tell_frac();

        for i in 0..200 {
            encoder.enc_uint(i, 256).unwrap();
            encoder.enc_bits(i & 1, 1).unwrap();
        }
        encoder.rollback(checkpoint);
        assert_eq!(encoder.tell_frac(), tell);

        encoder.enc_uint(40_000, 65_536).unwrap();
        let packet = encoder.done().unwrap();

        let mut decoder = RangeDecoder::new(&packet);
        assert_eq!(decoder.dec_uint(7).unwrap(), 3);
        assert_eq!(decoder.dec_uint(65_536).unwrap(), 40_000);
    }

    #[test]
    fn test_reset_starts_a_fresh_stream() {
        let mut encoder = RangeEncoder::with_capacity(1);
        for _ in 0..32 {
            encoder.enc_uint(9, 10).unwrap();
        }
        assert!(encoder.has_error());
        encoder.reset();
        assert!(!encoder.has_error());
        assert_eq!(encoder.tell(), 1);
        encoder.encode_bool_q15(true, 16384).unwrap();
        let packet = encoder.done().unwrap();
        assert_eq!(packet.len(), 1);

        let mut decoder = RangeDecoder::new(&packet);
        assert!(decoder.decode_bool_q15(16384).unwrap());
    }

    #[test]
    fn test_skewed_bits_round_trip_through_carries() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let bits: Vec<(bool, u32)> = (0..5000)
            .map(|_| (rng.random_bool(0.9), rng.random_range(1..=16)))
            .collect();

        let mut encoder = RangeEncoder::new();
        for &(bit, logp) in &bits {
            encoder.encode_bit_logp(bit, logp).unwrap();
        }
        let packet = encoder.done().unwrap();

        let mut decoder = RangeDecoder::new(&packet);
        for (i, &(bit, logp)) in bits.iter().enumerate() {
            assert_eq!(decoder.decode_bit_logp(logp).unwrap(), bit, "symbol {i}");
        }
    }
}
