//! Varint, zig-zag and tag primitives of the binary wire format.

use bytes::{Buf, BufMut};

use crate::protocol::descriptor::{WireType, MAX_FIELD_NUMBER};
use crate::protocol::error::{Result, ZrpcError};

/// A varint never takes more than 10 bytes.
pub const MAX_VARINT_LEN: usize = 10;

pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes `encode_varint` writes for `value`.
pub fn encoded_len_varint(value: u64) -> usize {
    // 1 byte per started group of 7 bits, at least one
    ((64 - (value | 1).leading_zeros() as usize) + 6) / 7
}

/// Reads one varint.
///
/// # Errors
///
/// [`ZrpcError::MalformedWireData`] on truncation, on an 11th byte, or when
/// the 10th byte carries more than the single remaining bit.
pub fn decode_varint(buf: &mut impl Buf) -> Result<u64> {
    let mut value = 0u64;
    for index in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(ZrpcError::MalformedWireData("truncated varint".to_string()));
        }
        let byte = buf.get_u8();
        if index == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(ZrpcError::MalformedWireData("varint overflows 64 bits".to_string()));
        }
        value |= u64::from(byte & 0x7f) << (7 * index);
        if byte < 0x80 {
            return Ok(value);
        }
    }
    Err(ZrpcError::MalformedWireData(
        "varint longer than 10 bytes".to_string(),
    ))
}

pub fn zigzag_encode32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

pub fn zigzag_decode32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

pub fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

pub fn encode_tag(field_number: u32, wire_type: WireType, buf: &mut impl BufMut) {
    encode_varint((u64::from(field_number) << 3) | wire_type.bits(), buf);
}

/// Reads a tag and splits it into field number and wire type.
pub fn decode_tag(buf: &mut impl Buf) -> Result<(u32, WireType)> {
    let key = decode_varint(buf)?;
    let wire_type = WireType::from_bits(key & 0x07)?;
    let number = key >> 3;
    if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
        return Err(ZrpcError::MalformedWireData(format!(
            "invalid field number {}",
            number
        )));
    }
    Ok((number as u32, wire_type))
}

/// Skips the payload of a field whose tag was already read.
pub fn skip_field(wire_type: WireType, buf: &mut impl Buf) -> Result<()> {
    let len = match wire_type {
        WireType::Varint => {
            decode_varint(buf)?;
            return Ok(());
        }
        WireType::Fixed64 => 8,
        WireType::Fixed32 => 4,
        WireType::LengthDelimited => decode_length(buf)?,
    };
    if buf.remaining() < len {
        return Err(ZrpcError::MalformedWireData(format!(
            "field needs {} bytes, {} remaining",
            len,
            buf.remaining()
        )));
    }
    buf.advance(len);
    Ok(())
}

/// Reads a length prefix and checks it against the remaining input.
pub fn decode_length(buf: &mut impl Buf) -> Result<usize> {
    let len = decode_varint(buf)?;
    let len = usize::try_from(len)
        .map_err(|_| ZrpcError::MalformedWireData(format!("length {} too large", len)))?;
    if len > buf.remaining() {
        return Err(ZrpcError::MalformedWireData(format!(
            "length prefix {} exceeds {} remaining bytes",
            len,
            buf.remaining()
        )));
    }
    Ok(len)
}
