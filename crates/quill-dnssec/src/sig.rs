//! Signature and digest primitives.
//!
//! Builds the RFC 4034 §3.1.8.1 signing data for an rrset and dispatches the
//! actual verification to the per-algorithm backends. RSA goes through ring's
//! legacy-size verifiers so that 1024-bit keys verify (they are handled by the
//! downgrade rules, not rejected outright); ECDSA and Ed25519 use their fixed
//! wire formats.

use crate::{Algorithm, DnssecError, Result};
use bytes::BytesMut;
use quill_proto::{Dnskey, Name, RData, RecordType, ResourceRecord, Rrsig};
use sha2::{Digest, Sha256, Sha384};

/// Computes the DS digest for a DNSKEY owned by `owner`.
///
/// Returns `None` for unsupported digest types.
pub fn ds_digest(owner: &Name, key: &Dnskey, digest_type: u8) -> Option<Vec<u8>> {
    let mut data = BytesMut::new();
    owner.to_lowercase().write_wire(&mut data);
    key.write_to(&mut data);

    match digest_type {
        2 => {
            let mut hasher = Sha256::new();
            hasher.update(&data);
            Some(hasher.finalize().to_vec())
        }
        4 => {
            let mut hasher = Sha384::new();
            hasher.update(&data);
            Some(hasher.finalize().to_vec())
        }
        _ => None,
    }
}

/// Verifies `sig` over `rrset` with `key`.
///
/// The rrset must be non-empty and share an owner name; the caller has
/// already matched the key tag.
pub(crate) fn verify_rrset_signature(
    rrset: &[ResourceRecord],
    sig: &Rrsig,
    key: &Dnskey,
) -> Result<()> {
    if key.protocol() != 3 {
        return Err(DnssecError::SignatureInvalid(format!(
            "DNSKEY protocol {} is not 3",
            key.protocol()
        )));
    }
    if key.algorithm() != sig.algorithm() {
        return Err(DnssecError::SignatureInvalid(
            "DNSKEY and RRSIG algorithm mismatch".to_string(),
        ));
    }

    let algorithm = Algorithm::from_u8(sig.algorithm())
        .ok_or(DnssecError::UnsupportedAlgorithm(sig.algorithm()))?;
    let data = signing_data(rrset, sig)?;
    verify_with_algorithm(algorithm, key.public_key(), &data, sig.signature())
}

/// Builds the signed data: the RRSIG RDATA minus the signature, followed by
/// the rrset in canonical form (RFC 4034 §3.1.8.1).
pub(crate) fn signing_data(rrset: &[ResourceRecord], sig: &Rrsig) -> Result<Vec<u8>> {
    let mut data = BytesMut::new();

    data.extend_from_slice(&sig.type_covered().to_be_bytes());
    data.extend_from_slice(&[sig.algorithm(), sig.labels()]);
    data.extend_from_slice(&sig.original_ttl().to_be_bytes());
    data.extend_from_slice(&sig.expiration().to_be_bytes());
    data.extend_from_slice(&sig.inception().to_be_bytes());
    data.extend_from_slice(&sig.key_tag().to_be_bytes());
    sig.signer_name().to_lowercase().write_wire(&mut data);

    let mut encoded: Vec<Vec<u8>> = Vec::with_capacity(rrset.len());
    for rr in rrset {
        let mut owner = rr.name().to_lowercase();
        // An RRSIG with fewer labels than the owner covers a
        // wildcard-expanded rrset; the signed owner is the wildcard itself.
        if (sig.labels() as usize) < owner.label_count() {
            owner = owner
                .wildcard_of(sig.labels() as usize)
                .map_err(|e| DnssecError::SignatureInvalid(e.to_string()))?;
        }

        let mut buf = BytesMut::new();
        owner.write_wire(&mut buf);
        buf.extend_from_slice(&sig.type_covered().to_be_bytes());
        buf.extend_from_slice(&rr.class().to_u16().to_be_bytes());
        buf.extend_from_slice(&sig.original_ttl().to_be_bytes());

        let rdata = canonical_rdata(rr.rdata());
        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        buf.extend_from_slice(&rdata);
        encoded.push(buf.to_vec());
    }

    // Canonical rrset order is the byte order of the encoded records.
    encoded.sort();
    for record in encoded {
        data.extend_from_slice(&record);
    }

    Ok(data.to_vec())
}

/// Encodes RDATA in canonical form: names embedded in CNAME, NS, and NSEC
/// payloads are lowercased (RFC 4034 §6.2); other payloads keep their wire
/// form.
fn canonical_rdata(rdata: &RData) -> Vec<u8> {
    let mut buf = BytesMut::new();
    match rdata {
        RData::CNAME(name) | RData::NS(name) => {
            name.to_lowercase().write_wire(&mut buf);
        }
        RData::NSEC(nsec) => {
            nsec.next_name().to_lowercase().write_wire(&mut buf);
            buf.extend_from_slice(nsec.type_bitmap());
        }
        other => other.write_to(&mut buf),
    }
    buf.to_vec()
}

fn verify_with_algorithm(
    algorithm: Algorithm,
    public_key: &[u8],
    data: &[u8],
    signature: &[u8],
) -> Result<()> {
    match algorithm {
        Algorithm::RsaSha256 => verify_rsa(
            public_key,
            data,
            signature,
            &ring::signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
        ),
        Algorithm::RsaSha512 => verify_rsa(
            public_key,
            data,
            signature,
            &ring::signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
        ),
        Algorithm::EcdsaP256Sha256 => verify_p256(public_key, data, signature),
        Algorithm::EcdsaP384Sha384 => verify_p384(public_key, data, signature),
        Algorithm::Ed25519 => verify_ed25519(public_key, data, signature),
    }
}

/// Splits a DNSKEY RSA public key (RFC 3110) into exponent and modulus.
pub(crate) fn split_rsa_key(public_key: &[u8]) -> Result<(&[u8], &[u8])> {
    if public_key.is_empty() {
        return Err(DnssecError::InvalidPublicKey("empty RSA key".to_string()));
    }

    let (exp_len, exp_offset) = if public_key[0] == 0 {
        if public_key.len() < 3 {
            return Err(DnssecError::InvalidPublicKey(
                "truncated RSA exponent length".to_string(),
            ));
        }
        (
            usize::from(u16::from_be_bytes([public_key[1], public_key[2]])),
            3,
        )
    } else {
        (public_key[0] as usize, 1)
    };

    if public_key.len() < exp_offset + exp_len {
        return Err(DnssecError::InvalidPublicKey(
            "truncated RSA key".to_string(),
        ));
    }

    Ok((
        &public_key[exp_offset..exp_offset + exp_len],
        &public_key[exp_offset + exp_len..],
    ))
}

fn verify_rsa(
    public_key: &[u8],
    data: &[u8],
    signature: &[u8],
    params: &'static ring::signature::RsaParameters,
) -> Result<()> {
    let (exponent, modulus) = split_rsa_key(public_key)?;
    let der = rsa_public_key_der(modulus, exponent);

    ring::signature::UnparsedPublicKey::new(params, &der)
        .verify(data, signature)
        .map_err(|_| DnssecError::SignatureInvalid("RSA signature invalid".to_string()))
}

/// Encodes `SEQUENCE { modulus INTEGER, exponent INTEGER }` — the
/// RSAPublicKey structure ring expects.
fn rsa_public_key_der(modulus: &[u8], exponent: &[u8]) -> Vec<u8> {
    fn der_length(len: usize) -> Vec<u8> {
        if len < 128 {
            vec![len as u8]
        } else if len < 256 {
            vec![0x81, len as u8]
        } else {
            vec![0x82, (len >> 8) as u8, len as u8]
        }
    }

    fn der_integer(data: &[u8]) -> Vec<u8> {
        let pad = !data.is_empty() && data[0] & 0x80 != 0;
        let mut out = vec![0x02];
        out.extend(der_length(data.len() + usize::from(pad)));
        if pad {
            out.push(0);
        }
        out.extend_from_slice(data);
        out
    }

    let n = der_integer(modulus);
    let e = der_integer(exponent);
    let mut out = vec![0x30];
    out.extend(der_length(n.len() + e.len()));
    out.extend(n);
    out.extend(e);
    out
}

fn verify_p256(public_key: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::{Signature, VerifyingKey};
    use p256::elliptic_curve::sec1::FromEncodedPoint;

    if public_key.len() != 64 {
        return Err(DnssecError::InvalidPublicKey(format!(
            "P-256 key must be 64 bytes, got {}",
            public_key.len()
        )));
    }
    if signature.len() != 64 {
        return Err(DnssecError::SignatureInvalid(format!(
            "P-256 signature must be 64 bytes, got {}",
            signature.len()
        )));
    }

    let mut uncompressed = vec![0x04];
    uncompressed.extend_from_slice(public_key);
    let point = p256::EncodedPoint::from_bytes(&uncompressed)
        .map_err(|e| DnssecError::InvalidPublicKey(e.to_string()))?;
    let key: p256::PublicKey = Option::from(p256::PublicKey::from_encoded_point(&point))
        .ok_or_else(|| DnssecError::InvalidPublicKey("invalid P-256 point".to_string()))?;

    let sig = Signature::from_slice(signature)
        .map_err(|e| DnssecError::SignatureInvalid(e.to_string()))?;
    VerifyingKey::from(&key)
        .verify(data, &sig)
        .map_err(|e| DnssecError::SignatureInvalid(e.to_string()))
}

fn verify_p384(public_key: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    use p384::ecdsa::signature::Verifier;
    use p384::ecdsa::{Signature, VerifyingKey};
    use p384::elliptic_curve::sec1::FromEncodedPoint;

    if public_key.len() != 96 {
        return Err(DnssecError::InvalidPublicKey(format!(
            "P-384 key must be 96 bytes, got {}",
            public_key.len()
        )));
    }
    if signature.len() != 96 {
        return Err(DnssecError::SignatureInvalid(format!(
            "P-384 signature must be 96 bytes, got {}",
            signature.len()
        )));
    }

    let mut uncompressed = vec![0x04];
    uncompressed.extend_from_slice(public_key);
    let point = p384::EncodedPoint::from_bytes(&uncompressed)
        .map_err(|e| DnssecError::InvalidPublicKey(e.to_string()))?;
    let key: p384::PublicKey = Option::from(p384::PublicKey::from_encoded_point(&point))
        .ok_or_else(|| DnssecError::InvalidPublicKey("invalid P-384 point".to_string()))?;

    let sig = Signature::from_slice(signature)
        .map_err(|e| DnssecError::SignatureInvalid(e.to_string()))?;
    VerifyingKey::from(&key)
        .verify(data, &sig)
        .map_err(|e| DnssecError::SignatureInvalid(e.to_string()))
}

fn verify_ed25519(public_key: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let key_bytes: [u8; 32] = public_key.try_into().map_err(|_| {
        DnssecError::InvalidPublicKey(format!(
            "Ed25519 key must be 32 bytes, got {}",
            public_key.len()
        ))
    })?;
    let sig_bytes: [u8; 64] = signature.try_into().map_err(|_| {
        DnssecError::SignatureInvalid(format!(
            "Ed25519 signature must be 64 bytes, got {}",
            signature.len()
        ))
    })?;

    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| DnssecError::InvalidPublicKey(e.to_string()))?;
    key.verify(data, &Signature::from_bytes(&sig_bytes))
        .map_err(|e| DnssecError::SignatureInvalid(e.to_string()))
}
