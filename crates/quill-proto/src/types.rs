//! Record types, classes, response codes, and opcodes.

use std::fmt;

/// DNS record type.
///
/// Only the types the resolver and validator actually interpret get their own
/// variant; everything else round-trips through `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address (1).
    A,
    /// Authoritative nameserver (2).
    NS,
    /// Canonical name alias (5).
    CNAME,
    /// Start of authority (6).
    SOA,
    /// IPv6 address (28).
    AAAA,
    /// EDNS(0) OPT pseudo-record (41).
    OPT,
    /// Delegation signer (43).
    DS,
    /// DNSSEC signature (46).
    RRSIG,
    /// Authenticated denial (47).
    NSEC,
    /// Zone public key (48).
    DNSKEY,
    /// Hashed authenticated denial (50).
    NSEC3,
    /// Any other type, carried opaquely.
    Unknown(u16),
}

impl RecordType {
    /// Maps a numeric type code to a `RecordType`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::NS,
            5 => Self::CNAME,
            6 => Self::SOA,
            28 => Self::AAAA,
            41 => Self::OPT,
            43 => Self::DS,
            46 => Self::RRSIG,
            47 => Self::NSEC,
            48 => Self::DNSKEY,
            50 => Self::NSEC3,
            other => Self::Unknown(other),
        }
    }

    /// Returns the numeric type code.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::A => 1,
            Self::NS => 2,
            Self::CNAME => 5,
            Self::SOA => 6,
            Self::AAAA => 28,
            Self::OPT => 41,
            Self::DS => 43,
            Self::RRSIG => 46,
            Self::NSEC => 47,
            Self::DNSKEY => 48,
            Self::NSEC3 => 50,
            Self::Unknown(v) => v,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::NS => write!(f, "NS"),
            Self::CNAME => write!(f, "CNAME"),
            Self::SOA => write!(f, "SOA"),
            Self::AAAA => write!(f, "AAAA"),
            Self::OPT => write!(f, "OPT"),
            Self::DS => write!(f, "DS"),
            Self::RRSIG => write!(f, "RRSIG"),
            Self::NSEC => write!(f, "NSEC"),
            Self::DNSKEY => write!(f, "DNSKEY"),
            Self::NSEC3 => write!(f, "NSEC3"),
            Self::Unknown(v) => write!(f, "TYPE{v}"),
        }
    }
}

/// DNS record class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordClass {
    /// Internet (1). The only class the resolver serves.
    IN,
    /// Chaos (3).
    CH,
    /// Hesiod (4).
    HS,
    /// Query-only wildcard class (255).
    ANY,
    /// Anything else.
    Unknown(u16),
}

impl RecordClass {
    /// Maps a numeric class code to a `RecordClass`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::IN,
            3 => Self::CH,
            4 => Self::HS,
            255 => Self::ANY,
            other => Self::Unknown(other),
        }
    }

    /// Returns the numeric class code.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::IN => 1,
            Self::CH => 3,
            Self::HS => 4,
            Self::ANY => 255,
            Self::Unknown(v) => v,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IN => write!(f, "IN"),
            Self::CH => write!(f, "CH"),
            Self::HS => write!(f, "HS"),
            Self::ANY => write!(f, "ANY"),
            Self::Unknown(v) => write!(f, "CLASS{v}"),
        }
    }
}

/// DNS response code (the 4-bit header field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseCode {
    /// No error (0).
    #[default]
    NoError,
    /// Format error (1).
    FormErr,
    /// Server failure (2).
    ServFail,
    /// Name does not exist (3).
    NXDomain,
    /// Not implemented (4).
    NotImp,
    /// Refused (5).
    Refused,
    /// Any other code.
    Unknown(u8),
}

impl ResponseCode {
    /// Maps the 4-bit header value to a `ResponseCode`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::FormErr,
            2 => Self::ServFail,
            3 => Self::NXDomain,
            4 => Self::NotImp,
            5 => Self::Refused,
            other => Self::Unknown(other),
        }
    }

    /// Returns the 4-bit header value.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::FormErr => 1,
            Self::ServFail => 2,
            Self::NXDomain => 3,
            Self::NotImp => 4,
            Self::Refused => 5,
            Self::Unknown(v) => v,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "NOERROR"),
            Self::FormErr => write!(f, "FORMERR"),
            Self::ServFail => write!(f, "SERVFAIL"),
            Self::NXDomain => write!(f, "NXDOMAIN"),
            Self::NotImp => write!(f, "NOTIMP"),
            Self::Refused => write!(f, "REFUSED"),
            Self::Unknown(v) => write!(f, "RCODE{v}"),
        }
    }
}

/// DNS opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Opcode {
    /// Standard query (0).
    #[default]
    Query,
    /// Zone change notification (4).
    Notify,
    /// Dynamic update (5).
    Update,
    /// Anything else.
    Unknown(u8),
}

impl Opcode {
    /// Maps the 4-bit header value to an `Opcode`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Query,
            4 => Self::Notify,
            5 => Self::Update,
            other => Self::Unknown(other),
        }
    }

    /// Returns the 4-bit header value.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Query => 0,
            Self::Notify => 4,
            Self::Update => 5,
            Self::Unknown(v) => v,
        }
    }
}
