//! Resource records and rrset selection.

use crate::error::{Error, Result};
use crate::name::Name;
use crate::rdata::RData;
use crate::types::{RecordClass, RecordType};
use crate::wire::WireReader;
use bytes::BytesMut;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A single DNS resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    name: Name,
    rtype: RecordType,
    class: RecordClass,
    ttl: u32,
    rdata: RData,
}

impl ResourceRecord {
    /// Creates a record from its parts.
    pub fn new(name: Name, rtype: RecordType, class: RecordClass, ttl: u32, rdata: RData) -> Self {
        Self {
            name,
            rtype,
            class,
            ttl,
            rdata,
        }
    }

    /// Creates an IN-class A record.
    pub fn a(name: Name, ttl: u32, addr: Ipv4Addr) -> Self {
        Self::new(name, RecordType::A, RecordClass::IN, ttl, RData::A(addr))
    }

    /// Creates an IN-class AAAA record.
    pub fn aaaa(name: Name, ttl: u32, addr: Ipv6Addr) -> Self {
        Self::new(
            name,
            RecordType::AAAA,
            RecordClass::IN,
            ttl,
            RData::AAAA(addr),
        )
    }

    /// Creates an IN-class CNAME record.
    pub fn cname(name: Name, ttl: u32, target: Name) -> Self {
        Self::new(
            name,
            RecordType::CNAME,
            RecordClass::IN,
            ttl,
            RData::CNAME(target),
        )
    }

    /// Creates an IN-class NS record.
    pub fn ns(name: Name, ttl: u32, host: Name) -> Self {
        Self::new(name, RecordType::NS, RecordClass::IN, ttl, RData::NS(host))
    }

    /// The owner name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The record type.
    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// The record class.
    pub fn class(&self) -> RecordClass {
        self.class
    }

    /// The time to live in seconds.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// The typed payload.
    pub fn rdata(&self) -> &RData {
        &self.rdata
    }

    /// Parses a record at `offset`, returning it and the next offset.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, next) = Name::parse(message, offset)?;
        let mut reader = WireReader::new(message, next);
        let rtype = RecordType::from_u16(reader.read_u16()?);
        let class = RecordClass::from_u16(reader.read_u16()?);
        let ttl = reader.read_u32()?;
        let rdlen = reader.read_u16()? as usize;
        let rdata_offset = reader.position();
        if rdata_offset + rdlen > message.len() {
            return Err(Error::UnexpectedEof {
                offset: rdata_offset,
            });
        }
        let rdata = RData::parse(rtype, message, rdata_offset, rdlen)?;
        Ok((
            Self {
                name,
                rtype,
                class,
                ttl,
                rdata,
            },
            rdata_offset + rdlen,
        ))
    }

    /// Writes the record (uncompressed) into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.name.write_wire(buf);
        buf.extend_from_slice(&self.rtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.class.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.ttl.to_be_bytes());

        let len_pos = buf.len();
        buf.extend_from_slice(&[0, 0]);
        self.rdata.write_to(buf);
        let rdlen = (buf.len() - len_pos - 2) as u16;
        buf[len_pos..len_pos + 2].copy_from_slice(&rdlen.to_be_bytes());
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name, self.ttl, self.class, self.rtype, self.rdata
        )
    }
}

/// Extracts the rrset matching `owner` (case-insensitively) and any of
/// `types` from a message section.
///
/// This is the selection primitive signature verification uses to gather the
/// records covered by an RRSIG.
pub fn extract_rrset(
    section: &[ResourceRecord],
    owner: &Name,
    types: &[RecordType],
) -> Vec<ResourceRecord> {
    section
        .iter()
        .filter(|rr| types.contains(&rr.rtype()) && rr.name() == owner)
        .cloned()
        .collect()
}
