//! Question section entries.

use crate::error::Result;
use crate::name::Name;
use crate::types::{RecordClass, RecordType};
use crate::wire::WireReader;
use bytes::BytesMut;
use std::fmt;

/// A single DNS question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    /// Queried name.
    pub qname: Name,
    /// Queried type.
    pub qtype: RecordType,
    /// Queried class.
    pub qclass: RecordClass,
}

impl Question {
    /// Creates a question.
    pub fn new(qname: Name, qtype: RecordType, qclass: RecordClass) -> Self {
        Self {
            qname,
            qtype,
            qclass,
        }
    }

    /// Creates an IN-class question.
    pub fn internet(qname: Name, qtype: RecordType) -> Self {
        Self::new(qname, qtype, RecordClass::IN)
    }

    /// Parses a question at `offset`, returning it and the next offset.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (qname, next) = Name::parse(message, offset)?;
        let mut reader = WireReader::new(message, next);
        let qtype = RecordType::from_u16(reader.read_u16()?);
        let qclass = RecordClass::from_u16(reader.read_u16()?);
        Ok((
            Self {
                qname,
                qtype,
                qclass,
            },
            reader.position(),
        ))
    }

    /// Writes the question into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.qname.write_wire(buf);
        buf.extend_from_slice(&self.qtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.qclass.to_u16().to_be_bytes());
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.qname, self.qclass, self.qtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trip() {
        let q = Question::internet(Name::from_str("example.com").unwrap(), RecordType::AAAA);
        let mut buf = BytesMut::new();
        q.write_to(&mut buf);

        let (parsed, next) = Question::parse(&buf, 0).unwrap();
        assert_eq!(parsed, q);
        assert_eq!(next, buf.len());
    }
}
