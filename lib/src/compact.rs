//! Compact "bits" encoding of 256-bit targets.
//!
//! The top byte is the size of the target in bytes, the low 23 bits are its
//! three most significant bytes. Bit 23 is a sign flag and must stay clear.

use thiserror::Error;

use crate::U256;

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007f_ffff;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactError {
    #[error("0x{0:08x} has the sign bit set")]
    Negative(u32),
    #[error("0x{0:08x} does not fit in 256 bits")]
    Overflow(u32),
    #[error("0x{0:08x} decodes to a zero target")]
    Zero(u32),
}

/// Expand compact bits into the full target.
pub fn decode(bits: u32) -> Result<U256, CompactError> {
    let exponent = bits >> 24;
    let mantissa = bits & MANTISSA_MASK;

    if mantissa != 0 && bits & SIGN_BIT != 0 {
        return Err(CompactError::Negative(bits));
    }

    if mantissa != 0
        && (exponent > 34
            || (mantissa > 0xff && exponent > 33)
            || (mantissa > 0xffff && exponent > 32))
    {
        return Err(CompactError::Overflow(bits));
    }

    let target = if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else {
        U256::from(mantissa) << (8 * (exponent - 3)) as usize
    };

    if target.is_zero() {
        return Err(CompactError::Zero(bits));
    }
    Ok(target)
}

/// Pack a target into compact bits. Anything below the top three bytes is
/// dropped, so the encoded target never exceeds the input.
pub fn encode(target: U256) -> u32 {
    let mut size = target.bits().div_ceil(8);
    let mut mantissa = if size <= 3 {
        target.low_u32() << (8 * (3 - size))
    } else {
        (target >> (8 * (size - 3))).low_u32()
    };

    // keep the sign bit clear by moving the mantissa down a byte
    if mantissa & SIGN_BIT != 0 {
        mantissa >>= 8;
        size += 1;
    }

    ((size as u32) << 24) | mantissa
}

/// Whether `bits` is the one encoding `encode` produces for its target.
pub fn is_canonical(bits: u32) -> bool {
    decode(bits).is_ok_and(|target| encode(target) == bits)
}
