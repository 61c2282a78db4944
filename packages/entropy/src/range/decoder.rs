use crate::cdf;
use crate::error::{Error, Result};
use crate::range::{
    CODE_BITS, CODE_BOT, CODE_EXTRA, CODE_TOP, MAX_RAW_BITS, MAX_TOTAL, SYM_BITS, SYM_MAX, Tell,
    UINT_BITS,
};
use crate::util::ilog;

/// Range decoder for packets produced by [`super::RangeEncoder`].
///
/// Reads range-coded symbols from the beginning of the buffer and raw bits
/// from the end. Reading past either end yields zero bits, so a truncated
/// packet decodes as if it were padded with zeros and never fails by itself.
///
/// Values that cannot have been produced by a valid encoder, such as an
/// out-of-range [`Self::dec_uint`] result, are clamped and recorded as a
/// sticky [`Error::CorruptSymbol`]. Callers check [`Self::error`] at packet
/// boundaries.
///
/// # Examples
///
/// ```rust
/// # use vcodec_entropy::range::RangeDecoder;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let packet = vec![0x80, 0x00, 0x00, 0x00];
/// let mut decoder = RangeDecoder::new(&packet);
///
/// // Decode a bit with 50% probability
/// let bit = decoder.decode_bit_logp(1)?;
/// # let _ = bit;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RangeDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
    end_position: usize,
    end_window: u64,
    end_bits: u32,
    rem: u32,
    val: u32,
    rng: u32,
    nbits_total: u32,
    error: Option<Error>,
}

impl<'a> RangeDecoder<'a> {
    /// Creates a decoder over `data` and performs the initial fill.
    ///
    /// An empty buffer is valid and decodes as all zero bits.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        let mut decoder = Self {
            buffer: data,
            position: 0,
            end_position: 0,
            end_window: 0,
            end_bits: 0,
            rem: 0,
            val: 0,
            rng: 1 << CODE_EXTRA,
            nbits_total: CODE_BITS + 1 - ((CODE_BITS - CODE_EXTRA) / SYM_BITS) * SYM_BITS,
            error: None,
        };
        decoder.rem = decoder.read_byte();
        decoder.val = decoder.rng - 1 - (decoder.rem >> (SYM_BITS - CODE_EXTRA));
        decoder.normalize();
        decoder
    }

    /// Returns the sticky error, if corruption has been detected.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns `true` once corruption has been detected.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the current range.
    #[must_use]
    pub const fn get_range(&self) -> u32 {
        self.rng
    }

    /// Returns the current read position in the buffer.
    ///
    /// This is the byte offset for forward reading (range-coded symbols) and
    /// may run past the end of the buffer. Does not include bytes read from
    /// the end for raw bits.
    #[must_use]
    pub const fn get_position(&self) -> usize {
        self.position
    }

    pub(crate) fn record_corruption(&mut self, message: String) {
        if self.error.is_none() {
            log::warn!("range decoder detected corruption: {message}");
            self.error = Some(Error::CorruptSymbol(message));
        }
    }

    /// Adds two decoded parts of a value. An overflow can only come from a
    /// corrupt packet; the sum saturates and the corruption is recorded.
    pub(crate) fn add_decoded(&mut self, a: i32, b: i32) -> i32 {
        a.checked_add(b).unwrap_or_else(|| {
            self.record_corruption(format!("decoded value {a} + {b} overflowed"));
            a.saturating_add(b)
        })
    }

    fn read_byte(&mut self) -> u32 {
        let byte = self.buffer.get(self.position).copied().unwrap_or(0);
        self.position += 1;
        u32::from(byte)
    }

    fn read_byte_from_end(&mut self) -> u32 {
        let byte = self
            .buffer
            .len()
            .checked_sub(self.end_position + 1)
            .map_or(0, |i| self.buffer[i]);
        self.end_position += 1;
        u32::from(byte)
    }

    fn normalize(&mut self) {
        while self.rng <= CODE_BOT {
            self.nbits_total += SYM_BITS;
            self.rng <<= SYM_BITS;

            let prev = self.rem;
            self.rem = self.read_byte();
            let sym = ((prev << SYM_BITS) | self.rem) >> (SYM_BITS - CODE_EXTRA);

            self.val = ((self.val << SYM_BITS) + (SYM_MAX & !sym)) & (CODE_TOP - 1);
        }
    }

    /// Returns the cumulative frequency of the next symbol out of a total of
    /// `ft`. Must be followed by [`Self::update`] with the symbol's interval.
    ///
    /// # Errors
    ///
    /// * If `ft` is zero or above 65536
    pub fn decode(&mut self, ft: u32) -> Result<u32> {
        if ft == 0 || ft > MAX_TOTAL {
            return Err(Error::InvalidParameter(format!(
                "total {ft} out of range"
            )));
        }
        let ext = self.rng / ft;
        let s = self.val / ext;
        Ok(ft - (s + 1).min(ft))
    }

    /// Same as [`Self::decode`] with a total of `1 << bits`.
    ///
    /// # Errors
    ///
    /// * If `bits > 16`
    pub fn decode_bin(&mut self, bits: u32) -> Result<u32> {
        if bits > 16 {
            return Err(Error::InvalidParameter(format!(
                "binary total of {bits} bits is too wide"
            )));
        }
        let ft = 1_u32 << bits;
        let ext = self.rng >> bits;
        let s = self.val / ext;
        Ok(ft - (s + 1).min(ft))
    }

    /// Consumes the symbol occupying `[fl, fh)` out of `ft`.
    ///
    /// # Errors
    ///
    /// * If the interval is invalid
    pub fn update(&mut self, fl: u32, fh: u32, ft: u32) -> Result<()> {
        if ft == 0 || ft > MAX_TOTAL || fl >= fh || fh > ft {
            return Err(Error::InvalidParameter(format!(
                "invalid interval [{fl}, {fh}) of {ft}"
            )));
        }
        let ext = self.rng / ft;
        let s = ext * (ft - fh);
        self.val = self.val.saturating_sub(s);
        self.rng = if fl > 0 {
            ext * (fh - fl)
        } else {
            self.rng - s
        };
        self.normalize();
        Ok(())
    }

    /// Decodes a bit that is `true` with probability `1 / (1 << logp)`.
    ///
    /// # Errors
    ///
    /// * If `logp` is not in `1..=16`
    pub fn decode_bit_logp(&mut self, logp: u32) -> Result<bool> {
        if !(1..=16).contains(&logp) {
            return Err(Error::InvalidParameter(format!(
                "bit probability 1/2^{logp} out of range"
            )));
        }
        let s = self.rng >> logp;
        let ret = self.val < s;
        if ret {
            self.rng = s;
        } else {
            self.val -= s;
            self.rng -= s;
        }
        self.normalize();
        Ok(ret)
    }

    /// Decodes a boolean where `false` has probability `fz / ft`.
    ///
    /// # Errors
    ///
    /// * If `fz` is not strictly between 0 and `ft`, or `ft` exceeds 65536
    pub fn decode_bool(&mut self, fz: u32, ft: u32) -> Result<bool> {
        if fz == 0 || fz >= ft {
            return Err(Error::InvalidParameter(format!(
                "bool probability {fz}/{ft} out of range"
            )));
        }
        let fs = self.decode(ft)?;
        let val = fs >= fz;
        if val {
            self.update(fz, ft, ft)?;
        } else {
            self.update(0, fz, ft)?;
        }
        Ok(val)
    }

    /// Decodes a boolean where `false` has probability `fz / 32768`.
    ///
    /// # Errors
    ///
    /// * If `fz` is not in `1..32768`
    pub fn decode_bool_q15(&mut self, fz: u32) -> Result<bool> {
        if fz == 0 || fz >= 32768 {
            return Err(Error::InvalidParameter(format!(
                "bool probability {fz}/32768 out of range"
            )));
        }
        let fs = self.decode_bin(15)?;
        let val = fs >= fz;
        if val {
            self.update(fz, 32768, 32768)?;
        } else {
            self.update(0, fz, 32768)?;
        }
        Ok(val)
    }

    /// Finds the symbol for `fs` in `cdf`, scaled by `scale` bits, and
    /// consumes it.
    fn finish_cdf(&mut self, cdf: &[u16], fs: u32, scale: u32, ft: u32) -> Result<usize> {
        let s = cdf::search(cdf, fs >> scale);
        let (fl, fh) = cdf::interval(cdf, s)?;
        log::trace!("decoded cdf symbol {s} (fs={fs} scale={scale} ft={ft})");
        self.update(fl << scale, fh << scale, ft << scale)?;
        Ok(s)
    }

    /// Decodes a symbol from a CDF whose total is between 16384 and 32768.
    ///
    /// # Errors
    ///
    /// * If the CDF is malformed or its total is out of range
    pub fn decode_cdf(&mut self, cdf: &[u16]) -> Result<usize> {
        let ft = cdf::total(cdf)?;
        if !(16384..=32768).contains(&ft) {
            return Err(Error::InvalidParameter(format!(
                "cdf total {ft} outside 16384..=32768"
            )));
        }
        let fs = self.decode(ft)?;
        self.finish_cdf(cdf, fs, 0, ft)
    }

    /// Decodes a symbol from a CDF whose total is exactly 32768.
    ///
    /// # Errors
    ///
    /// * If the CDF is malformed or its total is not 32768
    pub fn decode_cdf_q15(&mut self, cdf: &[u16]) -> Result<usize> {
        let ft = cdf::total(cdf)?;
        if ft != 32768 {
            return Err(Error::InvalidParameter(format!(
                "q15 cdf total is {ft}, expected 32768"
            )));
        }
        let fs = self.decode_bin(15)?;
        self.finish_cdf(cdf, fs, 0, ft)
    }

    /// Decodes a symbol from a CDF with any total up to 32768.
    ///
    /// # Errors
    ///
    /// * If the CDF is malformed or its total exceeds 32768
    pub fn decode_cdf_unscaled(&mut self, cdf: &[u16]) -> Result<usize> {
        let ft = cdf::total(cdf)?;
        if ft > 32768 {
            return Err(Error::InvalidParameter(format!(
                "unscaled cdf total {ft} exceeds 32768"
            )));
        }
        let scale = 15 - ilog(ft - 1);
        let fs = self.decode(ft << scale)?;
        self.finish_cdf(cdf, fs, scale, ft)
    }

    /// Decodes a symbol from a CDF whose total is exactly `1 << ftb`.
    ///
    /// # Errors
    ///
    /// * If `ftb > 15` or the total does not match
    pub fn decode_cdf_unscaled_dyadic(&mut self, cdf: &[u16], ftb: u32) -> Result<usize> {
        let ft = cdf::total(cdf)?;
        if ftb > 15 || ft != 1 << ftb {
            return Err(Error::InvalidParameter(format!(
                "dyadic cdf total {ft} is not 2^{ftb}"
            )));
        }
        let fs = self.decode_bin(ftb)?;
        self.finish_cdf(cdf, fs, 0, ft)
    }

    /// Decodes a value uniformly distributed in `[0, ft)`.
    ///
    /// A decoded value above `ft - 1` can only come from a corrupt packet; it
    /// is clamped to `ft - 1` and recorded as a sticky error.
    ///
    /// # Errors
    ///
    /// * If `ft < 2`
    #[allow(clippy::cast_possible_truncation)]
    pub fn dec_uint(&mut self, ft: u32) -> Result<u32> {
        if ft < 2 {
            return Err(Error::InvalidParameter(format!(
                "uint total {ft} must be at least 2"
            )));
        }
        if ft > 1 << UINT_BITS {
            let top = ft - 1;
            let ftb = ilog(top) - UINT_BITS;
            let nsyms = ((top >> ftb) + 1) as usize;
            let high = self.decode_cdf_q15(cdf::uniform_cdf_q15(nsyms)?)? as u32;
            let t = (high << ftb) | self.dec_bits(ftb)?;
            if t <= top {
                return Ok(t);
            }
            self.record_corruption(format!("decoded value {t} >= ft {ft}"));
            return Ok(top);
        }
        Ok(self.decode_cdf_q15(cdf::uniform_cdf_q15(ft as usize)?)? as u32)
    }

    /// Reads `bits` raw bits written by `enc_bits`, backward from the end of
    /// the buffer.
    ///
    /// # Errors
    ///
    /// * If `bits > 32`
    #[allow(clippy::cast_possible_truncation)]
    pub fn dec_bits(&mut self, bits: u32) -> Result<u32> {
        if bits > MAX_RAW_BITS {
            return Err(Error::InvalidParameter(format!(
                "cannot decode more than {MAX_RAW_BITS} bits at once"
            )));
        }
        if bits == 0 {
            return Ok(0);
        }

        while self.end_bits < bits {
            let byte = self.read_byte_from_end();
            self.end_window |= u64::from(byte) << self.end_bits;
            self.end_bits += SYM_BITS;
        }

        let result = (self.end_window & ((1_u64 << bits) - 1)) as u32;
        self.end_window >>= bits;
        self.end_bits -= bits;
        self.nbits_total += bits;

        Ok(result)
    }
}

impl Tell for RangeDecoder<'_> {
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
    use test_case::test_case;

    #[test]
    fn test_new_with_empty_buffer() {
        let decoder = RangeDecoder::new(&[]);
        assert!(!decoder.has_error());
        assert!(decoder.get_range() > CODE_BOT);
        assert_eq!(decoder.tell(), 1);
    }

    #[test]
    fn test_initialization_values() {
        let data = vec![0b1010_1010, 0x00, 0x00, 0x00];
        let decoder = RangeDecoder::new(&data);
        assert!(decoder.get_range() > CODE_BOT);
        assert!(decoder.get_range() <= CODE_TOP);
        assert_eq!(decoder.nbits_total, 33);
        assert_eq!(decoder.get_position(), 4);
    }

    #[test]
    fn test_decode_zero_total_is_invalid() {
        let mut decoder = RangeDecoder::new(&[0x12, 0x34]);
        let result = decoder.decode(0);
        let Err(Error::InvalidParameter(_)) = result else {
            panic!("Invalid response {result:?}");
        };
    }

    #[test_case(vec![0xFF, 0x00, 0x00, 0x00, 0x00], 1, true ; "logp_1_high_bytes")]
    #[test_case(vec![0xFF, 0x00, 0x00, 0x00, 0x00], 4, true ; "logp_4_high_bytes")]
    #[test_case(vec![0x00, 0x00, 0x00, 0x00, 0x00], 1, false ; "logp_1_zero_bytes")]
    #[test_case(vec![0x00, 0x00, 0x00, 0x00, 0x00], 8, false ; "logp_8_zero_bytes")]
    fn test_decode_bit_logp_with_various_inputs(data: Vec<u8>, logp: u32, expected: bool) {
        let mut decoder = RangeDecoder::new(&data);
        assert_eq!(decoder.decode_bit_logp(logp).unwrap(), expected);
    }

    #[test]
    fn test_dec_bits_zero() {
        let data = vec![0xFF, 0xFF];
        let mut decoder = RangeDecoder::new(&data);
        assert_eq!(decoder.dec_bits(0).unwrap(), 0);
        assert_eq!(decoder.end_position, 0);
    }

    #[test]
    fn test_dec_bits_backward_reading() {
        let data = vec![0x00, 0x00, 0x12, 0x34];
        let mut decoder = RangeDecoder::new(&data);
        assert_eq!(decoder.dec_bits(8).unwrap(), 0x34);
        assert_eq!(decoder.dec_bits(8).unwrap(), 0x12);
    }

    #[test]
    fn test_dec_bits_lsb_first_within_byte() {
        let data = vec![0x00, 0b1011_0110];
        let mut decoder = RangeDecoder::new(&data);
        assert_eq!(decoder.dec_bits(1).unwrap(), 0);
        assert_eq!(decoder.dec_bits(2).unwrap(), 0b11);
        assert_eq!(decoder.dec_bits(5).unwrap(), 0b10110);
    }

    #[test]
    fn test_dec_bits_past_start_reads_zero() {
        let data = vec![0xAB];
        let mut decoder = RangeDecoder::new(&data);
        assert_eq!(decoder.dec_bits(8).unwrap(), 0xAB);
        assert_eq!(decoder.dec_bits(32).unwrap(), 0);
        assert!(!decoder.has_error());
    }

    #[test]
    fn test_dec_bits_too_many() {
        let mut decoder = RangeDecoder::new(&[0x00]);
        assert!(decoder.dec_bits(33).is_err());
    }

    #[test]
    fn test_dec_bits_counts_toward_tell() {
        let data = vec![0x55; 8];
        let mut decoder = RangeDecoder::new(&data);
        let before = decoder.tell();
        decoder.dec_bits(13).unwrap();
        assert_eq!(decoder.tell(), before + 13);
    }

    #[test]
    fn test_dec_uint_corruption_is_sticky_and_clamped() {
        // With ft = 17 the top symbol is coded against 9 uniform symbols and
        // one raw bit follows. A top symbol of 8 with a raw bit of 1 is 17,
        // which no encoder produces.
        let mut encoder = crate::range::RangeEncoder::new();
        encoder
            .encode_cdf_q15(8, crate::cdf::uniform_cdf_q15(9).unwrap())
            .unwrap();
        encoder.enc_bits(1, 1).unwrap();
        let packet = encoder.done().unwrap();

        let mut decoder = RangeDecoder::new(&packet);
        assert_eq!(decoder.dec_uint(17).unwrap(), 16);
        let Some(Error::CorruptSymbol(_)) = decoder.error() else {
            panic!("Invalid error {:?}", decoder.error());
        };
    }

    #[test]
    fn test_add_decoded_saturates_and_flags_overflow() {
        let data = [0_u8; 2];
        let mut decoder = RangeDecoder::new(&data);
        assert_eq!(decoder.add_decoded(15, 7), 22);
        assert!(!decoder.has_error());

        assert_eq!(decoder.add_decoded(15, i32::MAX - 3), i32::MAX);
        let Some(Error::CorruptSymbol(_)) = decoder.error() else {
            panic!("Invalid response {:?}", decoder.error());
        };
    }

    #[test]
    fn test_decoding_past_end_is_not_an_error() {
        let mut decoder = RangeDecoder::new(&[0x42]);
        for _ in 0..64 {
            decoder.decode_bit_logp(1).unwrap();
            decoder.dec_uint(1024).unwrap();
        }
        assert!(decoder.get_position() > 1);
        assert!(!decoder.has_error());
    }
}
