//! # Quill DNS protocol types
//!
//! Wire-level DNS data model shared by the quill validator and resolver:
//!
//! - **Domain names** with case-insensitive comparison, RFC 4034 canonical
//!   ordering, and label-suffix utilities
//! - **Resource records** with typed RDATA for the record types the resolver
//!   handles (A, AAAA, CNAME, NS, DS, DNSKEY, RRSIG, NSEC, NSEC3)
//! - **Messages** with EDNS(0) support and section mutators that keep the
//!   header counts consistent
//!
//! Parsing accepts compressed names anywhere a name may appear; serialization
//! always writes uncompressed names.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::upper_case_acronyms)]

pub mod edns;
pub mod error;
pub mod header;
pub mod message;
pub mod name;
pub mod question;
pub mod rdata;
pub mod record;
pub mod types;
pub mod wire;

pub use edns::Edns;
pub use error::{Error, Result};
pub use header::{Header, HEADER_SIZE};
pub use message::Message;
pub use name::Name;
pub use question::Question;
pub use rdata::{Dnskey, Ds, Nsec, Nsec3, RData, Rrsig};
pub use record::{extract_rrset, ResourceRecord};
pub use types::{Opcode, RecordClass, RecordType, ResponseCode};

/// Maximum length of a single label in bytes.
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum length of a name in wire format, including the root label.
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum number of compression pointer hops tolerated while parsing a name.
pub const MAX_POINTER_HOPS: usize = 32;
