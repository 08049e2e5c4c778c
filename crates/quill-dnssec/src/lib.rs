//! # Quill DNSSEC validation
//!
//! Verifies DNS messages against a trusted key set and discovers trusted
//! child keys from a parent's DS set:
//!
//! - **DS filtering** keeps only supported algorithms and digests, strongest
//!   digest per key
//! - **Key discovery** matches answer DNSKEYs against the parent DS set and
//!   self-verifies the DNSKEY rrset
//! - **Signature verification** rebuilds message sections in place so only
//!   rrsets covered by a valid signature remain visible
//! - **Authenticated denial** checks NSEC proofs for NODATA and NXDOMAIN
//!
//! Weak RSA keys do not fail validation on their own: a message whose only
//! signatures come from downgradable keys is restored intact and reported
//! insecure, matching the behavior of resolvers that accept such zones
//! without trusting them.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod denial;
mod sig;

pub use denial::{covers, verify_name_error, verify_nodata};
pub use sig::ds_digest;

use quill_proto::{extract_rrset, Dnskey, Message, Name, RData, RecordType, ResourceRecord};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Minimum RSA modulus size, in bits, for a signature to count as secure.
///
/// Keys below this verify but can only yield an insecure result.
pub const MIN_RSA_KEY_SIZE: usize = 2048;

/// Errors produced by DNSSEC validation.
#[derive(Debug, Error)]
pub enum DnssecError {
    /// No DNSKEY in the answer matches the parent DS set.
    #[error("no valid dnskey records found")]
    NoDnskey,

    /// A DS record's owner is not the zone it was fetched for.
    #[error("DS record does not match zone name")]
    BadDs,

    /// A zone that should be signed carries no usable signatures.
    #[error("no rrsig records for zone that should be signed")]
    NoSignatures,

    /// An RRSIG references a key missing from the trusted set.
    #[error("no matching dnskey found for rrsig records")]
    MissingDnskey,

    /// An RRSIG's signer lies outside the zone's bailiwick.
    #[error("rrsig record out of bailiwick")]
    SignatureBailiwick,

    /// The wall clock falls outside the signature validity window.
    #[error("incorrect signature validity period")]
    InvalidSignaturePeriod,

    /// An RRSIG covers records that are not present.
    #[error("signed records are missing")]
    MissingSigned,

    /// The cryptographic check itself failed.
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    /// The signature algorithm is not supported.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(u8),

    /// The public key encoding is malformed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A verified answer retained no records for the question.
    #[error("empty answer")]
    EmptyAnswer,

    /// A wildcard-expanded answer lacks the NSEC proving the original name
    /// does not exist, or an NXDOMAIN lacks its wildcard proof.
    #[error("bad wildcard substitution")]
    WildcardUnproven,

    /// An NSEC bitmap asserts the queried (or CNAME) type exists.
    #[error("denied type {rtype} exists")]
    TypeExists {
        /// The type the bitmap asserted.
        rtype: RecordType,
    },

    /// A delegation's records disagree with each other.
    #[error("bad referral: {0}")]
    BadReferral(&'static str),

    /// A DS record appeared without an accompanying delegation.
    #[error("DS record exists without a delegation")]
    DsWithoutDelegation,

    /// Neither an NSEC nor a secure delegation settled the denial.
    #[error("no valid nsec records found")]
    NoDenialProof,

    /// The response code is not one validation understands.
    #[error("unexpected rcode {0}")]
    UnexpectedRcode(quill_proto::ResponseCode),
}

/// Result alias for validation operations.
pub type Result<T> = std::result::Result<T, DnssecError>;

/// Signature algorithms the validator accepts.
///
/// Anything else is treated as unsigned rather than rejected, so zones using
/// unknown algorithms degrade to insecure instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Algorithm {
    /// RSA/SHA-256 (8), RFC 5702.
    RsaSha256 = 8,
    /// RSA/SHA-512 (10), RFC 5702.
    RsaSha512 = 10,
    /// ECDSA P-256/SHA-256 (13), RFC 6605.
    EcdsaP256Sha256 = 13,
    /// ECDSA P-384/SHA-384 (14), RFC 6605.
    EcdsaP384Sha384 = 14,
    /// Ed25519 (15), RFC 8080.
    Ed25519 = 15,
}

impl Algorithm {
    /// Maps an algorithm number to a supported algorithm.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            _ => None,
        }
    }

    /// Returns true if the algorithm number is supported.
    pub fn is_supported(value: u8) -> bool {
        Self::from_u8(value).is_some()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RsaSha256 => "RSASHA256",
            Self::RsaSha512 => "RSASHA512",
            Self::EcdsaP256Sha256 => "ECDSAP256SHA256",
            Self::EcdsaP384Sha384 => "ECDSAP384SHA384",
            Self::Ed25519 => "ED25519",
        };
        write!(f, "{name}")
    }
}

/// DS digest algorithms the validator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestType {
    /// SHA-256 (2), RFC 4509.
    Sha256 = 2,
    /// SHA-384 (4), RFC 6605.
    Sha384 = 4,
}

impl DigestType {
    /// Returns true if the digest number is supported.
    pub fn is_supported(value: u8) -> bool {
        matches!(value, 2 | 4)
    }
}

/// A DNSKEY together with its owner zone.
#[derive(Debug, Clone)]
pub struct TrustedKey {
    owner: Name,
    key: Dnskey,
}

impl TrustedKey {
    /// Creates a trusted key entry.
    pub fn new(owner: Name, key: Dnskey) -> Self {
        Self { owner, key }
    }

    /// The zone that owns the key.
    pub fn owner(&self) -> &Name {
        &self.owner
    }

    /// The key itself.
    pub fn key(&self) -> &Dnskey {
        &self.key
    }
}

/// Trusted keys indexed by key tag.
///
/// Key tags are not collision-free; on a collision the last inserted key
/// wins, which matches how the message's answer section is walked.
#[derive(Debug, Clone, Default)]
pub struct TrustedKeys {
    keys: HashMap<u16, TrustedKey>,
}

impl TrustedKeys {
    /// Creates an empty key set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key under its computed tag.
    pub fn insert(&mut self, owner: Name, key: Dnskey) {
        self.keys.insert(key.key_tag(), TrustedKey::new(owner, key));
    }

    /// Looks up a key by tag.
    pub fn get(&self, key_tag: u16) -> Option<&TrustedKey> {
        self.keys.get(&key_tag)
    }

    /// Returns true if the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Filters a DS set down to usable records.
///
/// Every record must be owned by `zone` (else [`DnssecError::BadDs`]);
/// records with unsupported algorithms or digests are dropped silently, and
/// for each (key tag, algorithm) pair only the numerically strongest
/// supported digest survives.
pub fn filter_ds(zone: &Name, ds_set: &[ResourceRecord]) -> Result<Vec<quill_proto::Ds>> {
    let mut supported: HashMap<(u16, u8), quill_proto::Ds> = HashMap::new();

    for rr in ds_set {
        if rr.name() != zone {
            return Err(DnssecError::BadDs);
        }

        let RData::DS(ds) = rr.rdata() else {
            continue;
        };

        if !Algorithm::is_supported(ds.algorithm()) || !DigestType::is_supported(ds.digest_type())
        {
            continue;
        }

        let key = (ds.key_tag(), ds.algorithm());
        if let Some(existing) = supported.get(&key) {
            if existing.digest_type() >= ds.digest_type() {
                continue;
            }
        }
        supported.insert(key, ds.clone());
    }

    Ok(supported.into_values().collect())
}

/// Returns true if a key verifies but is too weak to certify a secure
/// result.
///
/// Only RSA qualifies: an exponent wider than 32 bits or a modulus below
/// `min_key_bits` downgrades. Malformed encodings (empty or zero-led
/// exponent, modulus outside 64..=512 bytes, zero-led modulus) are not
/// downgrades; such a key is simply not a candidate.
pub fn should_downgrade_key(key: &Dnskey, min_key_bits: usize) -> bool {
    if key.algorithm() != Algorithm::RsaSha256 as u8
        && key.algorithm() != Algorithm::RsaSha512 as u8
    {
        return false;
    }

    let buf = key.public_key();
    if buf.len() < 1 + 1 + 64 {
        // Exponent needs at least one byte and the modulus at least 64.
        return false;
    }

    // RFC 3110 §2: exponent length is one byte, or three when the first is
    // zero.
    let (exp_len, key_off) = if buf[0] == 0 {
        (usize::from(u16::from_be_bytes([buf[1], buf[2]])), 3)
    } else {
        (buf[0] as usize, 1)
    };

    if exp_len > 4 {
        // Wider than any exponent the crypto stack accepts.
        return true;
    }

    if exp_len == 0 || buf[key_off] == 0 {
        return false;
    }

    let mod_off = key_off + exp_len;
    let mod_len = buf.len() - mod_off;
    if mod_len < 64 || mod_len > 512 || buf[mod_off] == 0 {
        return false;
    }

    let mut exponent: u64 = 0;
    for &b in &buf[key_off..mod_off] {
        exponent = (exponent << 8) | u64::from(b);
    }
    if exponent > (1 << 31) - 1 {
        return true;
    }

    let modulus_bits = (mod_len - 1) * 8 + (8 - buf[mod_off].leading_zeros() as usize);
    modulus_bits < min_key_bits
}

/// Builds a zone's trusted key set from its DNSKEY response and the parent's
/// DS set.
///
/// Returns an empty set when the zone is provably insecure (no usable DS, or
/// every matching key is downgradable, or the DNSKEY rrset verifies only
/// insecurely). Returns [`DnssecError::NoDnskey`] when DS records exist but
/// no answer key matches them. On success the message's answer section has
/// been pruned to the verified rrsets and every surviving DNSKEY is trusted.
pub fn verify_dnskeys(
    zone: &Name,
    msg: &mut Message,
    parent_ds: &[ResourceRecord],
    now: u32,
    min_rsa_bits: usize,
) -> Result<TrustedKeys> {
    let ds_set = filter_ds(zone, parent_ds)?;
    if ds_set.is_empty() {
        debug!(zone = %zone, "no usable DS records, zone is insecure");
        return Ok(TrustedKeys::default());
    }

    let mut matching = TrustedKeys::new();
    for ds in &ds_set {
        for rr in msg.answers() {
            let RData::DNSKEY(key) = rr.rdata() else {
                continue;
            };
            if key.protocol() != 3 {
                continue;
            }
            if key.flags() != 256 && key.flags() != 257 {
                continue;
            }
            if key.algorithm() != ds.algorithm() {
                continue;
            }
            if key.key_tag() != ds.key_tag() {
                continue;
            }
            let Some(digest) = sig::ds_digest(rr.name(), key, ds.digest_type()) else {
                continue;
            };
            if digest != ds.digest() {
                continue;
            }

            matching.insert(rr.name().clone(), key.clone());
        }
    }

    if matching.is_empty() {
        return Err(DnssecError::NoDnskey);
    }

    let mut valid = TrustedKeys::new();
    for entry in matching.keys.into_values() {
        if !should_downgrade_key(&entry.key, min_rsa_bits) {
            valid.insert(entry.owner, entry.key);
        }
    }

    if valid.is_empty() {
        debug!(zone = %zone, "all matching keys are downgradable, zone is insecure");
        return Ok(TrustedKeys::default());
    }

    // Self-verify the DNSKEY rrset; this prunes the answer section down to
    // the verified sets.
    let secure = verify_signatures(zone, zone, msg, &valid, now, min_rsa_bits)?;
    if !secure {
        return Ok(TrustedKeys::default());
    }

    if msg.answers().is_empty() {
        return Err(DnssecError::NoDnskey);
    }

    let mut trusted = TrustedKeys::new();
    for rr in msg.answers() {
        if let RData::DNSKEY(key) = rr.rdata() {
            trusted.insert(rr.name().clone(), key.clone());
        }
    }

    trace!(zone = %zone, keys = trusted.len(), "established trusted key set");
    Ok(trusted)
}

/// Verifies every signature in the message and prunes unverified rrsets.
///
/// Sections are rebuilt to hold only rrsets covered by at least one verified
/// RRSIG. Unsigned NS records in the authority section that delegate below
/// `zone` toward `qname` are preserved separately and re-appended when
/// anything verified. If nothing verified but a downgradable key was seen,
/// the original sections are restored and the result is insecure.
pub fn verify_signatures(
    zone: &Name,
    qname: &Name,
    msg: &mut Message,
    trusted_keys: &TrustedKeys,
    now: u32,
    min_rsa_bits: usize,
) -> Result<bool> {
    let (answers, authority, additional) = msg.take_sections();
    let originals = [answers, authority, additional];
    let mut rebuilt: [Vec<ResourceRecord>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    let mut delegations: Vec<ResourceRecord> = Vec::new();

    let mut downgrade = false;
    let mut last_err: Option<DnssecError> = None;

    for (section_id, section) in originals.iter().enumerate() {
        if section.is_empty() {
            continue;
        }

        // One valid signature per rrset is enough; later duplicates are
        // skipped.
        let mut verified: HashSet<(Name, u16)> = HashSet::new();

        for rr in section {
            // Delegation NS records are unsigned by design; keep the ones
            // that delegate below the zone toward the query.
            if section_id == 1 && rr.rtype() == RecordType::NS {
                if rr.name().is_strict_subdomain_of(zone) && qname.is_subdomain_of(rr.name()) {
                    delegations.push(rr.clone());
                }
                continue;
            }

            let RData::RRSIG(sig) = rr.rdata() else {
                continue;
            };

            let sig_owner = rr.name().to_lowercase();
            if verified.contains(&(sig_owner.clone(), sig.type_covered())) {
                continue;
            }

            if !sig_owner.is_subdomain_of(zone) {
                last_err = Some(DnssecError::SignatureBailiwick);
                continue;
            }

            // RFC 4035 §5.3.1: the signer name must name the zone, i.e.
            // match the owner of the key.
            let Some(entry) = trusted_keys.get(sig.key_tag()) else {
                last_err = Some(DnssecError::MissingDnskey);
                continue;
            };
            if entry.owner() != sig.signer_name() {
                last_err = Some(DnssecError::MissingDnskey);
                continue;
            }

            if should_downgrade_key(entry.key(), min_rsa_bits) {
                downgrade = true;
                continue;
            }

            let rrset = extract_rrset(
                section,
                rr.name(),
                &[RecordType::from_u16(sig.type_covered())],
            );
            if rrset.is_empty() {
                last_err = Some(DnssecError::MissingSigned);
                continue;
            }

            if let Err(e) = sig::verify_rrset_signature(&rrset, sig, entry.key()) {
                last_err = Some(e);
                continue;
            }

            if !sig.is_valid_at(now) {
                last_err = Some(DnssecError::InvalidSignaturePeriod);
                continue;
            }

            verified.insert((sig_owner, sig.type_covered()));
            rebuilt[section_id].extend(rrset);
            rebuilt[section_id].push(rr.clone());
        }
    }

    if !rebuilt[0].is_empty() || !rebuilt[1].is_empty() {
        let [rebuilt_answers, mut rebuilt_authority, rebuilt_additional] = rebuilt;
        rebuilt_authority.extend(delegations);
        msg.set_answers(rebuilt_answers);
        msg.set_authority(rebuilt_authority);
        msg.set_additional(rebuilt_additional);
        return Ok(true);
    }

    if downgrade {
        // No secure path, but the keys involved only warrant a downgrade:
        // hand the message back untouched and report it insecure.
        let [answers, authority, additional] = originals;
        msg.set_answers(answers);
        msg.set_authority(authority);
        msg.set_additional(additional);
        return Ok(false);
    }

    Err(last_err.unwrap_or(DnssecError::NoSignatures))
}

/// Fully verifies a response message for `(qname, qtype)` within `zone`.
///
/// Returns the Secure bit: `Ok(true)` when signatures and (for negative
/// answers) denial proofs check out, `Ok(false)` when the zone is insecure,
/// and an error when the message is provably wrong.
pub fn verify(
    msg: &mut Message,
    zone: &Name,
    qname: &Name,
    qtype: RecordType,
    trusted_keys: &TrustedKeys,
    now: u32,
    min_rsa_bits: usize,
) -> Result<bool> {
    let secure = verify_signatures(zone, qname, msg, trusted_keys, now, min_rsa_bits)?;
    if !secure {
        return Ok(false);
    }

    match msg.rcode() {
        quill_proto::ResponseCode::NoError => {
            if msg.answers().is_empty() {
                verify_nodata(msg, zone, qname, qtype)
            } else {
                verify_answer(msg, qname, qtype)
            }
        }
        quill_proto::ResponseCode::NXDomain => verify_name_error(msg, zone, qname),
        other => Err(DnssecError::UnexpectedRcode(other)),
    }
}

/// Verifies a positive answer: only records owned by `qname` of the queried
/// type (or CNAME) survive, and wildcard-synthesized answers must carry an
/// NSEC covering the original name.
fn verify_answer(msg: &mut Message, qname: &Name, qtype: RecordType) -> Result<bool> {
    let qname_labels = qname.label_count() as u8;
    let mut wildcard = false;
    let mut answer: Vec<ResourceRecord> = Vec::new();

    for rr in msg.answers() {
        if rr.name() != qname {
            continue;
        }

        let rtype = rr.rtype();
        if rtype == qtype || rtype == RecordType::CNAME {
            answer.push(rr.clone());
            continue;
        }

        if let RData::RRSIG(sig) = rr.rdata() {
            let covered = RecordType::from_u16(sig.type_covered());
            if covered != qtype && covered != RecordType::CNAME {
                continue;
            }
            if sig.labels() < qname_labels {
                wildcard = true;
            }
            answer.push(rr.clone());
        }
    }

    if answer.is_empty() {
        return Err(DnssecError::EmptyAnswer);
    }
    msg.set_answers(answer);

    if wildcard {
        let proven = msg.authority().iter().any(|rr| match rr.rdata() {
            RData::NSEC(nsec) => covers(rr.name(), nsec.next_name(), qname),
            _ => false,
        });
        if !proven {
            return Err(DnssecError::WildcardUnproven);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use quill_proto::{Ds, Nsec, Question, RecordClass, ResponseCode, Rrsig};
    use std::str::FromStr;

    const NOW: u32 = 1_500_000_000;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn ds_rr(owner: &str, ds: Ds) -> ResourceRecord {
        ResourceRecord::new(
            name(owner),
            RecordType::DS,
            RecordClass::IN,
            300,
            RData::DS(ds),
        )
    }

    /// Builds a verifying RRSIG record over `rrset`.
    fn sign_rrset(
        signing: &SigningKey,
        key: &Dnskey,
        signer: &str,
        rrset: &[ResourceRecord],
        labels: u8,
    ) -> ResourceRecord {
        let type_covered = rrset[0].rtype().to_u16();
        let template = Rrsig::new(
            type_covered,
            15,
            labels,
            rrset[0].ttl(),
            NOW + 100_000,
            NOW - 100_000,
            key.key_tag(),
            name(signer),
            Vec::new(),
        );
        let data = sig::signing_data(rrset, &template).unwrap();
        let signature = signing.sign(&data).to_bytes().to_vec();
        ResourceRecord::new(
            rrset[0].name().clone(),
            RecordType::RRSIG,
            RecordClass::IN,
            rrset[0].ttl(),
            RData::RRSIG(Rrsig::new(
                type_covered,
                15,
                labels,
                rrset[0].ttl(),
                NOW + 100_000,
                NOW - 100_000,
                key.key_tag(),
                name(signer),
                signature,
            )),
        )
    }

    fn zone_keys() -> (SigningKey, Dnskey, TrustedKeys) {
        let signing = SigningKey::from_bytes(&[42u8; 32]);
        let key = Dnskey::new(257, 3, 15, signing.verifying_key().to_bytes().to_vec());
        let mut trusted = TrustedKeys::new();
        trusted.insert(name("example."), key.clone());
        (signing, key, trusted)
    }

    fn response(qname: &str, qtype: RecordType) -> Message {
        let query = Message::query(Question::internet(name(qname), qtype));
        Message::response_from(&query)
    }

    // ------------------------------------------------------------------
    // filter_ds
    // ------------------------------------------------------------------

    #[test]
    fn filter_ds_rejects_foreign_owner() {
        let zone = name("example.");
        let set = vec![ds_rr("other.", Ds::new(1, 15, 2, vec![0; 32]))];
        assert!(matches!(filter_ds(&zone, &set), Err(DnssecError::BadDs)));
    }

    #[test]
    fn filter_ds_drops_unsupported() {
        let zone = name("example.");
        let set = vec![
            // SHA-1 digest: unsupported.
            ds_rr("example.", Ds::new(1, 8, 1, vec![0; 20])),
            // GOST algorithm: unsupported.
            ds_rr("example.", Ds::new(2, 12, 2, vec![0; 32])),
            ds_rr("example.", Ds::new(3, 15, 2, vec![0; 32])),
        ];
        let filtered = filter_ds(&zone, &set).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].key_tag(), 3);
    }

    #[test]
    fn filter_ds_keeps_strongest_digest() {
        let zone = name("example.");
        let set = vec![
            ds_rr("example.", Ds::new(7, 15, 2, vec![0xAA; 32])),
            ds_rr("example.", Ds::new(7, 15, 4, vec![0xBB; 48])),
            ds_rr("example.", Ds::new(7, 15, 2, vec![0xCC; 32])),
        ];
        let filtered = filter_ds(&zone, &set).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].digest_type(), 4);
    }

    #[test]
    fn filter_ds_is_idempotent() {
        let zone = name("example.");
        let set = vec![
            ds_rr("example.", Ds::new(7, 15, 2, vec![0xAA; 32])),
            ds_rr("example.", Ds::new(7, 15, 4, vec![0xBB; 48])),
            ds_rr("example.", Ds::new(9, 13, 2, vec![0xDD; 32])),
        ];
        let once = filter_ds(&zone, &set).unwrap();
        let again_input: Vec<ResourceRecord> = once
            .iter()
            .map(|ds| ds_rr("example.", ds.clone()))
            .collect();
        let mut twice = filter_ds(&zone, &again_input).unwrap();
        let mut once = once;
        once.sort_by_key(Ds::key_tag);
        twice.sort_by_key(Ds::key_tag);
        assert_eq!(once, twice);
    }

    // ------------------------------------------------------------------
    // RSA downgrade rules
    // ------------------------------------------------------------------

    fn rsa_key(exponent: &[u8], modulus: &[u8]) -> Dnskey {
        let mut bytes = vec![exponent.len() as u8];
        bytes.extend_from_slice(exponent);
        bytes.extend_from_slice(modulus);
        Dnskey::new(256, 3, 8, bytes)
    }

    #[test]
    fn strong_rsa_key_is_not_downgraded() {
        let key = rsa_key(&[1, 0, 1], &[0xFFu8; 256]); // 2048-bit modulus
        assert!(!should_downgrade_key(&key, 2048));
    }

    #[test]
    fn weak_rsa_modulus_downgrades() {
        let key = rsa_key(&[1, 0, 1], &[0xFFu8; 128]); // 1024-bit modulus
        assert!(should_downgrade_key(&key, 2048));
        // A lower floor accepts it.
        assert!(!should_downgrade_key(&key, 1024));
    }

    #[test]
    fn oversized_exponent_downgrades() {
        let key = rsa_key(&[1, 2, 3, 4, 5], &[0xFFu8; 256]); // 5-byte exponent
        assert!(should_downgrade_key(&key, 2048));

        // Exactly 32 bits with the high bit set exceeds 2^31 - 1.
        let key = rsa_key(&[0x80, 0, 0, 0], &[0xFFu8; 256]);
        assert!(should_downgrade_key(&key, 2048));
    }

    #[test]
    fn malformed_rsa_keys_are_not_downgrades() {
        // Leading-zero modulus: corrupt, not downgradable.
        let mut modulus = vec![0u8];
        modulus.extend_from_slice(&[0xFF; 127]);
        assert!(!should_downgrade_key(&rsa_key(&[3], &modulus), 2048));

        // Too short to carry a modulus at all.
        let key = Dnskey::new(256, 3, 8, vec![1, 3]);
        assert!(!should_downgrade_key(&key, 2048));

        // Non-RSA algorithms never downgrade.
        let key = Dnskey::new(256, 3, 15, vec![0u8; 32]);
        assert!(!should_downgrade_key(&key, 2048));
    }

    // ------------------------------------------------------------------
    // verify_signatures / verify
    // ------------------------------------------------------------------

    #[test]
    fn verify_prunes_unsigned_rrsets() {
        let (signing, key, trusted) = zone_keys();

        let signed_set = vec![ResourceRecord::a(
            name("host.example."),
            300,
            "93.184.216.34".parse().unwrap(),
        )];
        let rrsig = sign_rrset(&signing, &key, "example.", &signed_set, 2);

        let mut msg = response("host.example.", RecordType::A);
        msg.add_answer(signed_set[0].clone());
        msg.add_answer(rrsig);
        // An unsigned stray record must not survive.
        msg.add_answer(ResourceRecord::a(
            name("stray.example."),
            300,
            "10.0.0.1".parse().unwrap(),
        ));

        let secure = verify(
            &mut msg,
            &name("example."),
            &name("host.example."),
            RecordType::A,
            &trusted,
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap();

        assert!(secure);
        assert_eq!(msg.answers().len(), 2); // the A and its RRSIG
        assert!(msg
            .answers()
            .iter()
            .all(|rr| rr.name() == &name("host.example.")));
    }

    #[test]
    fn verify_rejects_expired_signature() {
        let (signing, key, trusted) = zone_keys();
        let rrset = vec![ResourceRecord::a(
            name("host.example."),
            300,
            "93.184.216.34".parse().unwrap(),
        )];
        let rrsig = sign_rrset(&signing, &key, "example.", &rrset, 2);

        let mut msg = response("host.example.", RecordType::A);
        msg.add_answer(rrset[0].clone());
        msg.add_answer(rrsig);

        // Time well past the expiration.
        let err = verify(
            &mut msg,
            &name("example."),
            &name("host.example."),
            RecordType::A,
            &trusted,
            NOW + 1_000_000,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::InvalidSignaturePeriod));
    }

    #[test]
    fn verify_rejects_unknown_key_tag() {
        let (signing, key, _) = zone_keys();
        let rrset = vec![ResourceRecord::a(
            name("host.example."),
            300,
            "93.184.216.34".parse().unwrap(),
        )];
        let rrsig = sign_rrset(&signing, &key, "example.", &rrset, 2);

        let mut msg = response("host.example.", RecordType::A);
        msg.add_answer(rrset[0].clone());
        msg.add_answer(rrsig);

        // No trusted keys at all: the key tag cannot match.
        let err = verify(
            &mut msg,
            &name("example."),
            &name("host.example."),
            RecordType::A,
            &TrustedKeys::new(),
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::MissingDnskey));
    }

    #[test]
    fn verify_rejects_signer_outside_key_owner() {
        let (signing, key, _) = zone_keys();
        let rrset = vec![ResourceRecord::a(
            name("host.example."),
            300,
            "93.184.216.34".parse().unwrap(),
        )];
        let rrsig = sign_rrset(&signing, &key, "example.", &rrset, 2);

        let mut msg = response("host.example.", RecordType::A);
        msg.add_answer(rrset[0].clone());
        msg.add_answer(rrsig);

        // The right key under the wrong owner: signer-name check fails.
        let mut trusted = TrustedKeys::new();
        trusted.insert(name("elsewhere.example."), key);

        let err = verify(
            &mut msg,
            &name("example."),
            &name("host.example."),
            RecordType::A,
            &trusted,
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::MissingDnskey));
    }

    #[test]
    fn verify_keeps_in_bailiwick_delegations() {
        let (signing, key, trusted) = zone_keys();

        // A signed NSEC at the qname (NODATA) plus an unsigned delegation.
        let nsec_set = vec![ResourceRecord::new(
            name("child.example."),
            RecordType::NSEC,
            RecordClass::IN,
            300,
            RData::NSEC(Nsec::from_types(
                name("zz.example."),
                &[RecordType::NS],
            )),
        )];
        let nsec_sig = sign_rrset(&signing, &key, "example.", &nsec_set, 2);
        let delegation =
            ResourceRecord::ns(name("child.example."), 300, name("ns1.child.example."));

        let mut msg = response("child.example.", RecordType::AAAA);
        msg.add_authority(nsec_set[0].clone());
        msg.add_authority(nsec_sig);
        msg.add_authority(delegation.clone());
        // Out-of-hierarchy NS is dropped.
        msg.add_authority(ResourceRecord::ns(
            name("other.example."),
            300,
            name("ns1.other.example."),
        ));

        let secure = verify(
            &mut msg,
            &name("example."),
            &name("www.child.example."),
            RecordType::AAAA,
            &trusted,
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap();
        assert!(secure);

        assert!(msg.authority().contains(&delegation));
        assert!(!msg
            .authority()
            .iter()
            .any(|rr| rr.name() == &name("other.example.")));
    }

    #[test]
    fn downgradable_only_message_restored_insecure() {
        // A trusted set holding a weak RSA key with a known tag.
        let weak = rsa_key(&[1, 0, 1], &[0xFFu8; 128]);
        let tag = weak.key_tag();
        let mut trusted = TrustedKeys::new();
        trusted.insert(name("example."), weak);

        let a = ResourceRecord::a(
            name("host.example."),
            300,
            "93.184.216.34".parse().unwrap(),
        );
        let rrsig = ResourceRecord::new(
            name("host.example."),
            RecordType::RRSIG,
            RecordClass::IN,
            300,
            RData::RRSIG(Rrsig::new(
                RecordType::A.to_u16(),
                8,
                2,
                300,
                NOW + 1000,
                NOW - 1000,
                tag,
                name("example."),
                vec![0u8; 128],
            )),
        );

        let mut msg = response("host.example.", RecordType::A);
        msg.add_answer(a.clone());
        msg.add_answer(rrsig);

        let secure = verify_signatures(
            &name("example."),
            &name("host.example."),
            &mut msg,
            &trusted,
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap();

        assert!(!secure);
        // The message was restored rather than emptied.
        assert_eq!(msg.answers().len(), 2);
        assert!(msg.answers().contains(&a));
    }

    #[test]
    fn unsigned_message_is_an_error() {
        let (_, _, trusted) = zone_keys();
        let mut msg = response("host.example.", RecordType::A);
        msg.add_answer(ResourceRecord::a(
            name("host.example."),
            300,
            "10.0.0.1".parse().unwrap(),
        ));

        let err = verify_signatures(
            &name("example."),
            &name("host.example."),
            &mut msg,
            &trusted,
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::NoSignatures));
    }

    #[test]
    fn verify_answer_filters_other_owners() {
        let (signing, key, trusted) = zone_keys();
        let rrset = vec![ResourceRecord::a(
            name("host.example."),
            300,
            "93.184.216.34".parse().unwrap(),
        )];
        let rrsig = sign_rrset(&signing, &key, "example.", &rrset, 2);

        let mut msg = response("host.example.", RecordType::AAAA);
        msg.add_answer(rrset[0].clone());
        msg.add_answer(rrsig);

        // Signed A records cannot answer an AAAA question.
        let err = verify(
            &mut msg,
            &name("example."),
            &name("host.example."),
            RecordType::AAAA,
            &trusted,
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::EmptyAnswer));
    }

    #[test]
    fn wildcard_answer_needs_covering_nsec() {
        let (signing, key, trusted) = zone_keys();

        // Sign as the wildcard *.example. (one label below the zone).
        let rrset = vec![ResourceRecord::a(
            name("host.example."),
            300,
            "93.184.216.34".parse().unwrap(),
        )];
        let rrsig = sign_rrset(&signing, &key, "example.", &rrset, 1);

        let mut msg = response("host.example.", RecordType::A);
        msg.add_answer(rrset[0].clone());
        msg.add_answer(rrsig.clone());

        let err = verify(
            &mut msg,
            &name("example."),
            &name("host.example."),
            RecordType::A,
            &trusted,
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::WildcardUnproven));

        // With a signed NSEC covering the original name the answer passes.
        let nsec_set = vec![ResourceRecord::new(
            name("example."),
            RecordType::NSEC,
            RecordClass::IN,
            300,
            RData::NSEC(Nsec::from_types(name("zz.example."), &[RecordType::SOA])),
        )];
        let nsec_sig = sign_rrset(&signing, &key, "example.", &nsec_set, 1);

        let mut msg = response("host.example.", RecordType::A);
        msg.add_answer(rrset[0].clone());
        msg.add_answer(rrsig);
        msg.add_authority(nsec_set[0].clone());
        msg.add_authority(nsec_sig);

        let secure = verify(
            &mut msg,
            &name("example."),
            &name("host.example."),
            RecordType::A,
            &trusted,
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap();
        assert!(secure);
    }

    #[test]
    fn verify_rejects_unexpected_rcode() {
        let (signing, key, trusted) = zone_keys();
        let rrset = vec![ResourceRecord::a(
            name("host.example."),
            300,
            "10.0.0.1".parse().unwrap(),
        )];
        let rrsig = sign_rrset(&signing, &key, "example.", &rrset, 2);

        let mut msg = response("host.example.", RecordType::A);
        msg.add_answer(rrset[0].clone());
        msg.add_answer(rrsig);
        msg.set_rcode(ResponseCode::Refused);

        let err = verify(
            &mut msg,
            &name("example."),
            &name("host.example."),
            RecordType::A,
            &trusted,
            NOW,
            MIN_RSA_KEY_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::UnexpectedRcode(_)));
    }

    // ------------------------------------------------------------------
    // verify_dnskeys
    // ------------------------------------------------------------------

    #[test]
    fn verify_dnskeys_builds_trusted_set() {
        let signing = SigningKey::from_bytes(&[3u8; 32]);
        let key = Dnskey::new(257, 3, 15, signing.verifying_key().to_bytes().to_vec());
        let ds = Ds::new(
            key.key_tag(),
            15,
            2,
            sig::ds_digest(&name("child."), &key, 2).unwrap(),
        );

        let key_rr = ResourceRecord::new(
            name("child."),
            RecordType::DNSKEY,
            RecordClass::IN,
            3600,
            RData::DNSKEY(key.clone()),
        );
        let rrset = vec![key_rr.clone()];
        let rrsig = sign_rrset(&signing, &key, "child.", &rrset, 1);

        let mut msg = response("child.", RecordType::DNSKEY);
        msg.add_answer(key_rr);
        msg.add_answer(rrsig);

        let parent_ds = vec![ds_rr("child.", ds)];
        let trusted = verify_dnskeys(&name("child."), &mut msg, &parent_ds, NOW, 2048).unwrap();
        assert_eq!(trusted.len(), 1);
        assert!(trusted.get(key.key_tag()).is_some());
    }

    #[test]
    fn verify_dnskeys_empty_ds_means_insecure() {
        let mut msg = response("child.", RecordType::DNSKEY);
        let trusted = verify_dnskeys(&name("child."), &mut msg, &[], NOW, 2048).unwrap();
        assert!(trusted.is_empty());
    }

    #[test]
    fn verify_dnskeys_no_match_is_error() {
        let signing = SigningKey::from_bytes(&[3u8; 32]);
        let key = Dnskey::new(257, 3, 15, signing.verifying_key().to_bytes().to_vec());
        let key_rr = ResourceRecord::new(
            name("child."),
            RecordType::DNSKEY,
            RecordClass::IN,
            3600,
            RData::DNSKEY(key.clone()),
        );
        let mut msg = response("child.", RecordType::DNSKEY);
        msg.add_answer(key_rr);

        // DS with a digest that matches nothing.
        let parent_ds = vec![ds_rr("child.", Ds::new(key.key_tag(), 15, 2, vec![0u8; 32]))];
        let err = verify_dnskeys(&name("child."), &mut msg, &parent_ds, NOW, 2048).unwrap_err();
        assert!(matches!(err, DnssecError::NoDnskey));
    }

    #[test]
    fn verify_dnskeys_wrong_flags_rejected() {
        let signing = SigningKey::from_bytes(&[3u8; 32]);
        // Flags 0: not a zone key.
        let key = Dnskey::new(0, 3, 15, signing.verifying_key().to_bytes().to_vec());
        let ds = Ds::new(
            key.key_tag(),
            15,
            2,
            sig::ds_digest(&name("child."), &key, 2).unwrap(),
        );
        let key_rr = ResourceRecord::new(
            name("child."),
            RecordType::DNSKEY,
            RecordClass::IN,
            3600,
            RData::DNSKEY(key),
        );
        let mut msg = response("child.", RecordType::DNSKEY);
        msg.add_answer(key_rr);

        let parent_ds = vec![ds_rr("child.", ds)];
        let err = verify_dnskeys(&name("child."), &mut msg, &parent_ds, NOW, 2048).unwrap_err();
        assert!(matches!(err, DnssecError::NoDnskey));
    }
}
