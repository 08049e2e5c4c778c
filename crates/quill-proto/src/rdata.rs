//! Typed RDATA payloads.
//!
//! Record types the resolver never interprets are carried opaquely as
//! [`RData::Unknown`] so that signature verification can still cover them.

use crate::error::{Error, Result};
use crate::name::Name;
use crate::types::RecordType;
use crate::wire::WireReader;
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A delegation signer record payload (RFC 4034 §5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ds {
    key_tag: u16,
    algorithm: u8,
    digest_type: u8,
    digest: Vec<u8>,
}

impl Ds {
    /// Creates a DS payload.
    pub fn new(key_tag: u16, algorithm: u8, digest_type: u8, digest: impl Into<Vec<u8>>) -> Self {
        Self {
            key_tag,
            algorithm,
            digest_type,
            digest: digest.into(),
        }
    }

    /// The key tag of the referenced DNSKEY.
    pub fn key_tag(&self) -> u16 {
        self.key_tag
    }

    /// The signature algorithm number.
    pub fn algorithm(&self) -> u8 {
        self.algorithm
    }

    /// The digest algorithm number.
    pub fn digest_type(&self) -> u8 {
        self.digest_type
    }

    /// The digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// The digest as lowercase hex, for display and logs.
    pub fn digest_hex(&self) -> String {
        data_encoding::HEXLOWER.encode(&self.digest)
    }

    fn parse(reader: &mut WireReader<'_>, rdlen: usize) -> Result<Self> {
        if rdlen < 4 {
            return Err(Error::invalid(reader.position(), "DS rdata too short"));
        }
        let key_tag = reader.read_u16()?;
        let algorithm = reader.read_u8()?;
        let digest_type = reader.read_u8()?;
        let digest = reader.read_bytes(rdlen - 4)?.to_vec();
        Ok(Self {
            key_tag,
            algorithm,
            digest_type,
            digest,
        })
    }

    /// Writes the payload into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.key_tag.to_be_bytes());
        buf.extend_from_slice(&[self.algorithm, self.digest_type]);
        buf.extend_from_slice(&self.digest);
    }
}

/// A zone public key payload (RFC 4034 §2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dnskey {
    flags: u16,
    protocol: u8,
    algorithm: u8,
    public_key: Vec<u8>,
}

impl Dnskey {
    /// Creates a DNSKEY payload.
    pub fn new(flags: u16, protocol: u8, algorithm: u8, public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            flags,
            protocol,
            algorithm,
            public_key: public_key.into(),
        }
    }

    /// The flags field (256 = ZSK, 257 = KSK).
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// The protocol field; must be 3 for DNSSEC.
    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    /// The signature algorithm number.
    pub fn algorithm(&self) -> u8 {
        self.algorithm
    }

    /// The raw public key bytes.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Computes the RFC 4034 Appendix B key tag over the RDATA.
    pub fn key_tag(&self) -> u16 {
        let mut ac: u32 = 0;
        let mut feed = |i: usize, byte: u8| {
            if i & 1 == 0 {
                ac += u32::from(byte) << 8;
            } else {
                ac += u32::from(byte);
            }
        };

        let head = [
            (self.flags >> 8) as u8,
            self.flags as u8,
            self.protocol,
            self.algorithm,
        ];
        for (i, &b) in head.iter().enumerate() {
            feed(i, b);
        }
        for (i, &b) in self.public_key.iter().enumerate() {
            feed(i + 4, b);
        }

        ac += ac >> 16;
        (ac & 0xFFFF) as u16
    }

    fn parse(reader: &mut WireReader<'_>, rdlen: usize) -> Result<Self> {
        if rdlen < 4 {
            return Err(Error::invalid(reader.position(), "DNSKEY rdata too short"));
        }
        let flags = reader.read_u16()?;
        let protocol = reader.read_u8()?;
        let algorithm = reader.read_u8()?;
        let public_key = reader.read_bytes(rdlen - 4)?.to_vec();
        Ok(Self {
            flags,
            protocol,
            algorithm,
            public_key,
        })
    }

    /// Writes the payload into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&[self.protocol, self.algorithm]);
        buf.extend_from_slice(&self.public_key);
    }
}

/// A signature payload (RFC 4034 §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rrsig {
    type_covered: u16,
    algorithm: u8,
    labels: u8,
    original_ttl: u32,
    expiration: u32,
    inception: u32,
    key_tag: u16,
    signer_name: Name,
    signature: Vec<u8>,
}

impl Rrsig {
    /// Creates an RRSIG payload.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        type_covered: u16,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer_name: Name,
        signature: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            type_covered,
            algorithm,
            labels,
            original_ttl,
            expiration,
            inception,
            key_tag,
            signer_name,
            signature: signature.into(),
        }
    }

    /// The type code this signature covers.
    pub fn type_covered(&self) -> u16 {
        self.type_covered
    }

    /// The signature algorithm number.
    pub fn algorithm(&self) -> u8 {
        self.algorithm
    }

    /// The owner label count at signing time; fewer labels than the owner
    /// name indicates wildcard expansion.
    pub fn labels(&self) -> u8 {
        self.labels
    }

    /// The TTL of the covered rrset at signing time.
    pub fn original_ttl(&self) -> u32 {
        self.original_ttl
    }

    /// Expiration as a Unix timestamp.
    pub fn expiration(&self) -> u32 {
        self.expiration
    }

    /// Inception as a Unix timestamp.
    pub fn inception(&self) -> u32 {
        self.inception
    }

    /// The key tag of the signing DNSKEY.
    pub fn key_tag(&self) -> u16 {
        self.key_tag
    }

    /// The signing zone.
    pub fn signer_name(&self) -> &Name {
        &self.signer_name
    }

    /// The raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Returns true if `inception <= now <= expiration`.
    pub fn is_valid_at(&self, now: u32) -> bool {
        self.inception <= now && now <= self.expiration
    }

    fn parse(message: &[u8], offset: usize, rdlen: usize) -> Result<Self> {
        let mut reader = WireReader::new(message, offset);
        let type_covered = reader.read_u16()?;
        let algorithm = reader.read_u8()?;
        let labels = reader.read_u8()?;
        let original_ttl = reader.read_u32()?;
        let expiration = reader.read_u32()?;
        let inception = reader.read_u32()?;
        let key_tag = reader.read_u16()?;
        let (signer_name, next) = Name::parse(message, reader.position())?;
        let consumed = next - offset;
        if consumed > rdlen {
            return Err(Error::invalid(offset, "RRSIG signer overruns rdata"));
        }
        let mut reader = WireReader::new(message, next);
        let signature = reader.read_bytes(rdlen - consumed)?.to_vec();
        Ok(Self {
            type_covered,
            algorithm,
            labels,
            original_ttl,
            expiration,
            inception,
            key_tag,
            signer_name,
            signature,
        })
    }

    /// Writes the payload into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.write_prefix(buf);
        buf.extend_from_slice(&self.signature);
    }

    /// Writes the RDATA up to but excluding the signature, with the signer
    /// name exactly as stored. Signature verification lowercases separately.
    pub fn write_prefix(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.type_covered.to_be_bytes());
        buf.extend_from_slice(&[self.algorithm, self.labels]);
        buf.extend_from_slice(&self.original_ttl.to_be_bytes());
        buf.extend_from_slice(&self.expiration.to_be_bytes());
        buf.extend_from_slice(&self.inception.to_be_bytes());
        buf.extend_from_slice(&self.key_tag.to_be_bytes());
        self.signer_name.write_wire(buf);
    }
}

/// An authenticated-denial payload (RFC 4034 §4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec {
    next_name: Name,
    type_bitmap: Vec<u8>,
}

impl Nsec {
    /// Creates an NSEC payload.
    pub fn new(next_name: Name, type_bitmap: impl Into<Vec<u8>>) -> Self {
        Self {
            next_name,
            type_bitmap: type_bitmap.into(),
        }
    }

    /// Builds the windowed type bitmap from a list of type codes.
    pub fn from_types(next_name: Name, types: &[RecordType]) -> Self {
        let mut codes: Vec<u16> = types.iter().map(|t| t.to_u16()).collect();
        codes.sort_unstable();
        codes.dedup();

        let mut bitmap = Vec::new();
        let mut window = None;
        let mut bits = [0u8; 32];
        let mut high = 0usize;

        fn flush(window: u8, bits: &[u8; 32], high: usize, out: &mut Vec<u8>) {
            out.push(window);
            out.push(high as u8 + 1);
            out.extend_from_slice(&bits[..=high]);
        }

        for code in codes {
            let w = (code >> 8) as u8;
            if window != Some(w) {
                if let Some(prev) = window {
                    flush(prev, &bits, high, &mut bitmap);
                }
                window = Some(w);
                bits = [0u8; 32];
                high = 0;
            }
            let low = (code & 0xFF) as usize;
            bits[low / 8] |= 0x80 >> (low % 8);
            high = high.max(low / 8);
        }
        if let Some(prev) = window {
            flush(prev, &bits, high, &mut bitmap);
        }

        Self {
            next_name,
            type_bitmap: bitmap,
        }
    }

    /// The next owner name in canonical zone order.
    pub fn next_name(&self) -> &Name {
        &self.next_name
    }

    /// The raw type bitmap.
    pub fn type_bitmap(&self) -> &[u8] {
        &self.type_bitmap
    }

    /// Decodes the type bitmap into type codes.
    pub fn types(&self) -> Vec<u16> {
        let mut types = Vec::new();
        let bitmap = &self.type_bitmap;
        let mut pos = 0;

        while pos + 2 <= bitmap.len() {
            let window = u16::from(bitmap[pos]);
            let len = bitmap[pos + 1] as usize;
            pos += 2;
            if pos + len > bitmap.len() {
                break;
            }
            for (byte_idx, &byte) in bitmap[pos..pos + len].iter().enumerate() {
                for bit in 0..8u16 {
                    if byte & (0x80 >> bit) != 0 {
                        types.push(window * 256 + byte_idx as u16 * 8 + bit);
                    }
                }
            }
            pos += len;
        }

        types
    }

    /// Returns true if the bitmap asserts the given type at the owner.
    pub fn covers_type(&self, rtype: RecordType) -> bool {
        self.types().contains(&rtype.to_u16())
    }

    fn parse(message: &[u8], offset: usize, rdlen: usize) -> Result<Self> {
        let (next_name, next) = Name::parse(message, offset)?;
        let consumed = next - offset;
        if consumed > rdlen {
            return Err(Error::invalid(offset, "NSEC next name overruns rdata"));
        }
        let mut reader = WireReader::new(message, next);
        let type_bitmap = reader.read_bytes(rdlen - consumed)?.to_vec();
        Ok(Self {
            next_name,
            type_bitmap,
        })
    }

    /// Writes the payload into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.next_name.write_wire(buf);
        buf.extend_from_slice(&self.type_bitmap);
    }
}

/// A hashed authenticated-denial payload (RFC 5155).
///
/// The validator never accepts NSEC3 proofs; the payload is parsed only so
/// that its presence can be detected and downgraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec3 {
    hash_algorithm: u8,
    flags: u8,
    iterations: u16,
    salt: Vec<u8>,
    next_hashed: Vec<u8>,
    type_bitmap: Vec<u8>,
}

impl Nsec3 {
    /// Creates an NSEC3 payload.
    pub fn new(
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: impl Into<Vec<u8>>,
        next_hashed: impl Into<Vec<u8>>,
        type_bitmap: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            hash_algorithm,
            flags,
            iterations,
            salt: salt.into(),
            next_hashed: next_hashed.into(),
            type_bitmap: type_bitmap.into(),
        }
    }

    /// The hash algorithm number.
    pub fn hash_algorithm(&self) -> u8 {
        self.hash_algorithm
    }

    /// The iteration count.
    pub fn iterations(&self) -> u16 {
        self.iterations
    }

    fn parse(reader: &mut WireReader<'_>, rdlen: usize) -> Result<Self> {
        let start = reader.position();
        let hash_algorithm = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let iterations = reader.read_u16()?;
        let salt_len = reader.read_u8()? as usize;
        let salt = reader.read_bytes(salt_len)?.to_vec();
        let hash_len = reader.read_u8()? as usize;
        let next_hashed = reader.read_bytes(hash_len)?.to_vec();
        let consumed = reader.position() - start;
        if consumed > rdlen {
            return Err(Error::invalid(start, "NSEC3 fields overrun rdata"));
        }
        let type_bitmap = reader.read_bytes(rdlen - consumed)?.to_vec();
        Ok(Self {
            hash_algorithm,
            flags,
            iterations,
            salt,
            next_hashed,
            type_bitmap,
        })
    }

    /// Writes the payload into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&[self.hash_algorithm, self.flags]);
        buf.extend_from_slice(&self.iterations.to_be_bytes());
        buf.put_u8(self.salt.len() as u8);
        buf.extend_from_slice(&self.salt);
        buf.put_u8(self.next_hashed.len() as u8);
        buf.extend_from_slice(&self.next_hashed);
        buf.extend_from_slice(&self.type_bitmap);
    }
}

/// A typed RDATA payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    /// IPv4 address.
    A(Ipv4Addr),
    /// IPv6 address.
    AAAA(Ipv6Addr),
    /// Alias target.
    CNAME(Name),
    /// Delegation nameserver host.
    NS(Name),
    /// Delegation signer.
    DS(Ds),
    /// Zone public key.
    DNSKEY(Dnskey),
    /// Signature.
    RRSIG(Rrsig),
    /// Authenticated denial.
    NSEC(Nsec),
    /// Hashed authenticated denial.
    NSEC3(Nsec3),
    /// Opaque payload for uninterpreted types.
    Unknown(Vec<u8>),
}

impl RData {
    /// Parses the payload for `rtype` at `offset` within the full message.
    pub fn parse(rtype: RecordType, message: &[u8], offset: usize, rdlen: usize) -> Result<Self> {
        let mut reader = WireReader::new(message, offset);
        match rtype {
            RecordType::A => {
                if rdlen != 4 {
                    return Err(Error::invalid(offset, "A rdata must be 4 bytes"));
                }
                let bytes = reader.read_bytes(4)?;
                Ok(Self::A(Ipv4Addr::new(
                    bytes[0], bytes[1], bytes[2], bytes[3],
                )))
            }
            RecordType::AAAA => {
                if rdlen != 16 {
                    return Err(Error::invalid(offset, "AAAA rdata must be 16 bytes"));
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(reader.read_bytes(16)?);
                Ok(Self::AAAA(Ipv6Addr::from(octets)))
            }
            RecordType::CNAME => {
                let (target, _) = Name::parse(message, offset)?;
                Ok(Self::CNAME(target))
            }
            RecordType::NS => {
                let (host, _) = Name::parse(message, offset)?;
                Ok(Self::NS(host))
            }
            RecordType::DS => Ok(Self::DS(Ds::parse(&mut reader, rdlen)?)),
            RecordType::DNSKEY => Ok(Self::DNSKEY(Dnskey::parse(&mut reader, rdlen)?)),
            RecordType::RRSIG => Ok(Self::RRSIG(Rrsig::parse(message, offset, rdlen)?)),
            RecordType::NSEC => Ok(Self::NSEC(Nsec::parse(message, offset, rdlen)?)),
            RecordType::NSEC3 => Ok(Self::NSEC3(Nsec3::parse(&mut reader, rdlen)?)),
            _ => Ok(Self::Unknown(reader.read_bytes(rdlen)?.to_vec())),
        }
    }

    /// Writes the payload (uncompressed) into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Self::A(addr) => buf.extend_from_slice(&addr.octets()),
            Self::AAAA(addr) => buf.extend_from_slice(&addr.octets()),
            Self::CNAME(name) | Self::NS(name) => name.write_wire(buf),
            Self::DS(ds) => ds.write_to(buf),
            Self::DNSKEY(key) => key.write_to(buf),
            Self::RRSIG(sig) => sig.write_to(buf),
            Self::NSEC(nsec) => nsec.write_to(buf),
            Self::NSEC3(nsec3) => nsec3.write_to(buf),
            Self::Unknown(bytes) => buf.extend_from_slice(bytes),
        }
    }

    /// Returns the CNAME target, if this is a CNAME payload.
    pub fn as_cname(&self) -> Option<&Name> {
        match self {
            Self::CNAME(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the NS host, if this is an NS payload.
    pub fn as_ns(&self) -> Option<&Name> {
        match self {
            Self::NS(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the A address, if this is an A payload.
    pub fn as_a(&self) -> Option<Ipv4Addr> {
        match self {
            Self::A(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Returns the AAAA address, if this is an AAAA payload.
    pub fn as_aaaa(&self) -> Option<Ipv6Addr> {
        match self {
            Self::AAAA(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(addr) => write!(f, "{addr}"),
            Self::AAAA(addr) => write!(f, "{addr}"),
            Self::CNAME(name) | Self::NS(name) => write!(f, "{name}"),
            Self::DS(ds) => write!(
                f,
                "{} {} {} {}",
                ds.key_tag(),
                ds.algorithm(),
                ds.digest_type(),
                ds.digest_hex()
            ),
            Self::DNSKEY(key) => write!(
                f,
                "{} {} {} <{} key bytes>",
                key.flags(),
                key.protocol(),
                key.algorithm(),
                key.public_key().len()
            ),
            Self::RRSIG(sig) => write!(
                f,
                "covers {} key tag {} signer {}",
                sig.type_covered(),
                sig.key_tag(),
                sig.signer_name()
            ),
            Self::NSEC(nsec) => write!(f, "{}", nsec.next_name()),
            Self::NSEC3(n) => write!(f, "alg {} iterations {}", n.hash_algorithm(), n.iterations()),
            Self::Unknown(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn key_tag_is_stable() {
        let key = Dnskey::new(257, 3, 8, vec![3, 1, 0, 1, 0xAB, 0xCD]);
        let tag = key.key_tag();
        assert_eq!(tag, key.key_tag());
        // Flipping a key byte changes the tag.
        let other = Dnskey::new(257, 3, 8, vec![3, 1, 0, 1, 0xAB, 0xCE]);
        assert_ne!(tag, other.key_tag());
    }

    #[test]
    fn nsec_bitmap_round_trip() {
        let next = Name::from_str("b.example.").unwrap();
        let nsec = Nsec::from_types(
            next,
            &[RecordType::A, RecordType::NS, RecordType::SOA, RecordType::DNSKEY],
        );
        let types = nsec.types();
        assert_eq!(types, vec![1, 2, 6, 48]);
        assert!(nsec.covers_type(RecordType::NS));
        assert!(!nsec.covers_type(RecordType::CNAME));
    }

    #[test]
    fn rrsig_parse_round_trip() {
        let sig = Rrsig::new(
            1,
            15,
            2,
            300,
            1_700_000_000,
            1_600_000_000,
            12345,
            Name::from_str("example.").unwrap(),
            vec![0xAA; 64],
        );
        let mut buf = BytesMut::new();
        sig.write_to(&mut buf);
        let parsed = match RData::parse(RecordType::RRSIG, &buf, 0, buf.len()).unwrap() {
            RData::RRSIG(s) => s,
            other => panic!("unexpected rdata {other:?}"),
        };
        assert_eq!(parsed, sig);
        assert!(parsed.is_valid_at(1_650_000_000));
        assert!(!parsed.is_valid_at(1_500_000_000));
        assert!(!parsed.is_valid_at(1_800_000_000));
    }

    #[test]
    fn ds_parse_round_trip() {
        let ds = Ds::new(20326, 8, 2, vec![0xDE; 32]);
        let mut buf = BytesMut::new();
        ds.write_to(&mut buf);
        let parsed = RData::parse(RecordType::DS, &buf, 0, buf.len()).unwrap();
        assert_eq!(parsed, RData::DS(ds));
    }
}
