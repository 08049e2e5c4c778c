//! DNS message header.

use crate::error::{Error, Result};
use crate::types::{Opcode, ResponseCode};
use bytes::BytesMut;

/// Size of the fixed DNS header in bytes.
pub const HEADER_SIZE: usize = 12;

const FLAG_QR: u16 = 0x8000;
const FLAG_AA: u16 = 0x0400;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;
const FLAG_AD: u16 = 0x0020;
const FLAG_CD: u16 = 0x0010;

/// The fixed 12-byte DNS message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Message identifier.
    pub id: u16,
    /// Raw flag bits (QR, opcode, AA, TC, RD, RA, AD, CD, RCODE).
    flags: u16,
    /// Question count.
    pub qd_count: u16,
    /// Answer count.
    pub an_count: u16,
    /// Authority count.
    pub ns_count: u16,
    /// Additional count.
    pub ar_count: u16,
}

impl Header {
    /// Builds a query header with recursion desired.
    pub fn query() -> Self {
        Self {
            flags: FLAG_RD,
            ..Self::default()
        }
    }

    /// Builds a response header mirroring a query's id, opcode, and RD.
    pub fn response_from(query: &Header) -> Self {
        let mut h = Self {
            id: query.id,
            flags: FLAG_QR | (query.flags & (0x7800 | FLAG_RD)),
            ..Self::default()
        };
        h.set_recursion_available(true);
        h
    }

    /// Returns true if the QR bit marks this a response.
    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    /// Returns the opcode.
    pub fn opcode(&self) -> Opcode {
        Opcode::from_u8(((self.flags >> 11) & 0x0F) as u8)
    }

    /// Returns true if the answer is authoritative.
    pub fn is_authoritative(&self) -> bool {
        self.flags & FLAG_AA != 0
    }

    /// Returns true if the message was truncated.
    pub fn is_truncated(&self) -> bool {
        self.flags & FLAG_TC != 0
    }

    /// Returns the RD bit.
    pub fn recursion_desired(&self) -> bool {
        self.flags & FLAG_RD != 0
    }

    /// Returns the RA bit.
    pub fn recursion_available(&self) -> bool {
        self.flags & FLAG_RA != 0
    }

    /// Returns the AD (authentic data) bit.
    pub fn authentic_data(&self) -> bool {
        self.flags & FLAG_AD != 0
    }

    /// Returns the CD (checking disabled) bit.
    pub fn checking_disabled(&self) -> bool {
        self.flags & FLAG_CD != 0
    }

    /// Returns the 4-bit response code.
    pub fn rcode(&self) -> ResponseCode {
        ResponseCode::from_u8((self.flags & 0x000F) as u8)
    }

    /// Sets or clears the QR bit.
    pub fn set_response(&mut self, on: bool) {
        self.set_flag(FLAG_QR, on);
    }

    /// Sets or clears the AA bit.
    pub fn set_authoritative(&mut self, on: bool) {
        self.set_flag(FLAG_AA, on);
    }

    /// Sets or clears the TC bit.
    pub fn set_truncated(&mut self, on: bool) {
        self.set_flag(FLAG_TC, on);
    }

    /// Sets or clears the RD bit.
    pub fn set_recursion_desired(&mut self, on: bool) {
        self.set_flag(FLAG_RD, on);
    }

    /// Sets or clears the RA bit.
    pub fn set_recursion_available(&mut self, on: bool) {
        self.set_flag(FLAG_RA, on);
    }

    /// Sets or clears the AD bit.
    pub fn set_authentic_data(&mut self, on: bool) {
        self.set_flag(FLAG_AD, on);
    }

    /// Sets or clears the CD bit.
    pub fn set_checking_disabled(&mut self, on: bool) {
        self.set_flag(FLAG_CD, on);
    }

    /// Sets the 4-bit response code.
    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.flags = (self.flags & !0x000F) | u16::from(rcode.to_u8() & 0x0F);
    }

    fn set_flag(&mut self, mask: u16, on: bool) {
        if on {
            self.flags |= mask;
        } else {
            self.flags &= !mask;
        }
    }

    /// Parses the header from the start of a message.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::BufferTooShort {
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }
        let u16_at = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);
        Ok(Self {
            id: u16_at(0),
            flags: u16_at(2),
            qd_count: u16_at(4),
            an_count: u16_at(6),
            ns_count: u16_at(8),
            ar_count: u16_at(10),
        })
    }

    /// Writes the header into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&self.qd_count.to_be_bytes());
        buf.extend_from_slice(&self.an_count.to_be_bytes());
        buf.extend_from_slice(&self.ns_count.to_be_bytes());
        buf.extend_from_slice(&self.ar_count.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_round_trip() {
        let mut h = Header::query();
        assert!(h.recursion_desired());
        assert!(!h.is_response());

        h.set_checking_disabled(true);
        h.set_authentic_data(true);
        h.set_rcode(ResponseCode::NXDomain);

        let mut buf = BytesMut::new();
        h.write_to(&mut buf);
        let parsed = Header::parse(&buf).unwrap();
        assert_eq!(parsed, h);
        assert!(parsed.checking_disabled());
        assert!(parsed.authentic_data());
        assert_eq!(parsed.rcode(), ResponseCode::NXDomain);
    }

    #[test]
    fn response_mirrors_query() {
        let mut q = Header::query();
        q.id = 0x1234;
        let r = Header::response_from(&q);
        assert!(r.is_response());
        assert_eq!(r.id, 0x1234);
        assert!(r.recursion_desired());
    }
}
