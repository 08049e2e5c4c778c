//! DNS domain names.
//!
//! A [`Name`] stores its uncompressed wire form: a sequence of
//! length-prefixed labels terminated by the empty root label. Every `Name`
//! constructed through this module is fully qualified; callers can therefore
//! rely on the terminator being present. Comparison and hashing are
//! case-insensitive per RFC 1035, and [`Name::canonical_cmp`] implements the
//! RFC 4034 §6.1 canonical ordering used by denial-of-existence proofs.

use crate::error::{Error, Result};
use crate::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH, MAX_POINTER_HOPS};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A fully-qualified DNS domain name in wire form.
#[derive(Clone)]
pub struct Name {
    /// Uncompressed wire form, always ending with the root label.
    wire: SmallVec<[u8; 64]>,
}

impl Name {
    /// The root domain name.
    pub fn root() -> Self {
        Self {
            wire: SmallVec::from_slice(&[0]),
        }
    }

    /// Builds a name from uncompressed wire-format bytes.
    ///
    /// The bytes must contain a terminating root label and no compression
    /// pointers.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        let mut pos = 0;
        loop {
            let len = *bytes.get(pos).ok_or(Error::UnexpectedEof { offset: pos })? as usize;
            if len == 0 {
                pos += 1;
                break;
            }
            if len > MAX_LABEL_LENGTH {
                return Err(Error::invalid(pos, "compression pointer in stored name"));
            }
            pos += 1 + len;
            if pos > bytes.len() {
                return Err(Error::UnexpectedEof { offset: pos });
            }
        }
        if pos != bytes.len() {
            return Err(Error::invalid(pos, "trailing bytes after root label"));
        }
        if pos > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong { length: pos });
        }
        Ok(Self {
            wire: SmallVec::from_slice(bytes),
        })
    }

    /// Parses a possibly-compressed name out of a full DNS message.
    ///
    /// Returns the name and the offset just past its in-place encoding (the
    /// position after the first pointer, if any).
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut wire = SmallVec::<[u8; 64]>::new();
        let mut pos = offset;
        // Offset to resume at; set when the first pointer is followed.
        let mut resume = None;
        let mut hops = 0;

        loop {
            let len = *message.get(pos).ok_or(Error::UnexpectedEof { offset: pos })? as usize;

            if len & 0xC0 == 0xC0 {
                let low = *message
                    .get(pos + 1)
                    .ok_or(Error::UnexpectedEof { offset: pos + 1 })?
                    as usize;
                let target = ((len & 0x3F) << 8) | low;
                if resume.is_none() {
                    resume = Some(pos + 2);
                }
                hops += 1;
                if hops > MAX_POINTER_HOPS || target >= pos {
                    return Err(Error::PointerLoop);
                }
                pos = target;
                continue;
            }

            if len & 0xC0 != 0 {
                return Err(Error::invalid(pos, "reserved label type"));
            }

            if len == 0 {
                wire.push(0);
                let end = resume.unwrap_or(pos + 1);
                if wire.len() > MAX_NAME_LENGTH {
                    return Err(Error::NameTooLong { length: wire.len() });
                }
                return Ok((Self { wire }, end));
            }

            let label = message
                .get(pos + 1..pos + 1 + len)
                .ok_or(Error::UnexpectedEof { offset: pos + 1 })?;
            wire.push(len as u8);
            wire.extend_from_slice(label);
            if wire.len() > MAX_NAME_LENGTH {
                return Err(Error::NameTooLong { length: wire.len() });
            }
            pos += 1 + len;
        }
    }

    /// Returns the wire form, including the terminating root label.
    #[inline]
    pub fn as_wire(&self) -> &[u8] {
        &self.wire
    }

    /// Returns the wire-format length.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Returns true if this is the root name.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.wire.len() == 1
    }

    /// Returns the number of labels, excluding the root.
    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// Iterates over the labels, leftmost first, excluding the root.
    pub fn labels(&self) -> LabelIter<'_> {
        LabelIter {
            wire: &self.wire,
            pos: 0,
        }
    }

    /// Returns the name with the leftmost label removed, or `None` for root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let skip = 1 + self.wire[0] as usize;
        Some(Self {
            wire: SmallVec::from_slice(&self.wire[skip..]),
        })
    }

    /// Returns the name formed by the last `n` labels (a suffix of `self`).
    ///
    /// Asking for more labels than exist yields the whole name.
    pub fn suffix(&self, n: usize) -> Self {
        let count = self.label_count();
        let mut name = self.clone();
        while name.label_count() > n.min(count) {
            match name.parent() {
                Some(p) => name = p,
                None => break,
            }
        }
        name
    }

    /// Prepends a label, yielding a child name.
    pub fn prepend_label(&self, label: &str) -> Result<Self> {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(Error::LabelTooLong {
                length: label.len(),
            });
        }
        let new_len = 1 + label.len() + self.wire.len();
        if new_len > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong { length: new_len });
        }
        let mut wire = SmallVec::with_capacity(new_len);
        wire.push(label.len() as u8);
        wire.extend_from_slice(label.as_bytes());
        wire.extend_from_slice(&self.wire);
        Ok(Self { wire })
    }

    /// Builds the wildcard name `*.<last n labels of self>`.
    pub fn wildcard_of(&self, n: usize) -> Result<Self> {
        self.suffix(n).prepend_label("*")
    }

    /// Returns the last label (the top-level zone), lowercased.
    ///
    /// The root name has no TLD and yields the empty string.
    pub fn tld(&self) -> String {
        self.labels()
            .last()
            .map(|l| String::from_utf8_lossy(l).to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Returns the lowercased last `n` labels joined with dots, without a
    /// trailing dot.
    ///
    /// `last_n_labels("www.example.FOO.", 5)` is `"www.example.foo"`.
    pub fn last_n_labels(&self, n: usize) -> String {
        let labels: Vec<&[u8]> = self.labels().collect();
        let start = labels.len().saturating_sub(n);
        labels[start..]
            .iter()
            .map(|l| String::from_utf8_lossy(l).to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Returns the lowercased first `n` labels joined with dots.
    ///
    /// HIP-5 pseudo-hosts carry a handler's configuration payload in their
    /// leading labels; this is how the payload is extracted.
    pub fn first_n_labels(&self, n: usize) -> String {
        self.labels()
            .take(n)
            .map(|l| String::from_utf8_lossy(l).to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Returns true if `zone` is a suffix of this name (bailiwick test).
    ///
    /// Every name is a subdomain of itself and of the root.
    pub fn is_subdomain_of(&self, zone: &Name) -> bool {
        let mine: Vec<&[u8]> = self.labels().collect();
        let theirs: Vec<&[u8]> = zone.labels().collect();
        if theirs.len() > mine.len() {
            return false;
        }
        mine.iter()
            .rev()
            .zip(theirs.iter().rev())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Returns true if this name is a proper descendant of `zone`.
    pub fn is_strict_subdomain_of(&self, zone: &Name) -> bool {
        self.label_count() > zone.label_count() && self.is_subdomain_of(zone)
    }

    /// Lowercases the name in place.
    pub fn make_lowercase(&mut self) {
        for byte in self.wire.iter_mut() {
            byte.make_ascii_lowercase();
        }
    }

    /// Returns a lowercased copy.
    #[must_use]
    pub fn to_lowercase(&self) -> Self {
        let mut copy = self.clone();
        copy.make_lowercase();
        copy
    }

    /// Compares two names in RFC 4034 §6.1 canonical order.
    ///
    /// Labels are compared right to left as lowercased byte strings; when one
    /// name's labels are a proper suffix of the other's, the shorter name
    /// sorts first.
    pub fn canonical_cmp(&self, other: &Name) -> Ordering {
        let mine: Vec<&[u8]> = self.labels().collect();
        let theirs: Vec<&[u8]> = other.labels().collect();

        for (a, b) in mine.iter().rev().zip(theirs.iter().rev()) {
            match cmp_label_lowercase(a, b) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        mine.len().cmp(&theirs.len())
    }

    /// Writes the wire form into a buffer.
    pub fn write_wire(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.wire);
    }
}

fn cmp_label_lowercase(a: &[u8], b: &[u8]) -> Ordering {
    let a = a.iter().map(u8::to_ascii_lowercase);
    let b = b.iter().map(u8::to_ascii_lowercase);
    a.cmp(b)
}

/// Iterator over the labels of a name, excluding the root label.
pub struct LabelIter<'a> {
    wire: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let len = *self.wire.get(self.pos)? as usize;
        if len == 0 {
            return None;
        }
        let label = &self.wire[self.pos + 1..self.pos + 1 + len];
        self.pos += 1 + len;
        Some(label)
    }
}

impl FromStr for Name {
    type Err = Error;

    /// Parses a dotted name. A missing trailing dot is implied; the result is
    /// always fully qualified.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s == "." {
            return Ok(Self::root());
        }

        let s = s.strip_suffix('.').unwrap_or(s);
        let mut wire = SmallVec::<[u8; 64]>::new();

        for part in s.split('.') {
            if part.is_empty() || part.len() > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: part.len() });
            }
            for c in part.chars() {
                if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '*' {
                    return Err(Error::InvalidLabelChar { character: c });
                }
            }
            wire.push(part.len() as u8);
            wire.extend_from_slice(part.as_bytes());
        }

        wire.push(0);
        if wire.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong { length: wire.len() });
        }

        Ok(Self { wire })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        for label in self.labels() {
            for &b in label {
                if b.is_ascii_graphic() && b != b'.' && b != b'\\' {
                    write!(f, "{}", b as char)?;
                } else {
                    write!(f, "\\{:03}", b)?;
                }
            }
            write!(f, ".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name(\"{self}\")")
    }
}

impl PartialEq for Name {
    /// Case-insensitive equality per DNS semantics.
    fn eq(&self, other: &Self) -> bool {
        self.wire.len() == other.wire.len()
            && self
                .wire
                .iter()
                .zip(other.wire.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for &b in self.wire.iter() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_cmp(other)
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::root()
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
