//! Authenticated denial of existence via NSEC.
//!
//! NSEC3 is deliberately not validated: a hashed denial in bailiwick
//! downgrades the zone to insecure instead of proving anything.

use crate::{DnssecError, Result};
use quill_proto::{Message, Name, RData, RecordType};
use std::cmp::Ordering;
use tracing::trace;

/// Returns true if `qname` falls strictly between `owner` and `next` in
/// canonical order.
///
/// An NSEC whose owner sorts at or after its next domain is the apex
/// wrap-around record; its range extends to the end of the zone.
pub fn covers(owner: &Name, next: &Name, qname: &Name) -> bool {
    // At or before the owner is never covered.
    if qname.canonical_cmp(owner) != Ordering::Greater {
        return false;
    }

    let wraps = owner.canonical_cmp(next) != Ordering::Less;
    wraps || qname.canonical_cmp(next) == Ordering::Less
}

/// Verifies a NOERROR/empty-answer response: either a proven NODATA at
/// `qname`, or a secure delegation. Returns `Ok(false)` when an NSEC3 denial
/// forces an insecure downgrade.
///
/// The message has already been pruned by signature verification, so every
/// record here except delegation NSes is signed.
pub fn verify_nodata(msg: &Message, zone: &Name, qname: &Name, qtype: RecordType) -> Result<bool> {
    if msg.authority().is_empty() {
        return Err(DnssecError::NoDenialProof);
    }

    for rr in msg.authority() {
        // Hashed denial cannot be checked; treat the zone as insecure.
        if rr.rtype() == RecordType::NSEC3 && rr.name().is_subdomain_of(zone) {
            trace!(zone = %zone, "NSEC3 denial, downgrading to insecure");
            return Ok(false);
        }

        if let RData::DS(_) = rr.rdata() {
            if !rr.name().is_strict_subdomain_of(zone) {
                return Err(DnssecError::BadReferral("DS owner is not below the zone"));
            }

            // Delegation NS records are unsigned; their owner must still
            // agree with the signed DS.
            let mut has_ns = false;
            for ns in msg.authority() {
                if ns.rtype() == RecordType::NS {
                    has_ns = true;
                    if ns.name() != rr.name() {
                        return Err(DnssecError::BadReferral("DS owner does not match NS"));
                    }
                }
            }

            if has_ns {
                return Ok(true);
            }
            return Err(DnssecError::DsWithoutDelegation);
        }

        if let RData::NSEC(nsec) = rr.rdata() {
            if rr.name() != qname {
                // The NSEC denies some other name; fall through to the
                // name-error style proof.
                return verify_name_error(msg, zone, qname);
            }

            if !nsec.next_name().is_subdomain_of(zone) {
                continue;
            }

            let mut has_delegation = false;
            let mut has_ds = false;
            for t in nsec.types() {
                if t == qtype.to_u16() {
                    return Err(DnssecError::TypeExists { rtype: qtype });
                }
                if t == RecordType::CNAME.to_u16() {
                    return Err(DnssecError::TypeExists {
                        rtype: RecordType::CNAME,
                    });
                }
                if t == RecordType::DS.to_u16() {
                    has_ds = true;
                    continue;
                }
                if t == RecordType::NS.to_u16() {
                    has_delegation = true;
                }
            }

            for ns in msg.authority() {
                if ns.rtype() == RecordType::NS {
                    if has_ds {
                        return Err(DnssecError::BadReferral(
                            "DS set in NSEC bitmap for insecure delegation",
                        ));
                    }
                    if !has_delegation {
                        return Err(DnssecError::BadReferral("NS not set in NSEC bitmap"));
                    }
                    if ns.name() != rr.name() {
                        return Err(DnssecError::BadReferral("NS owner does not match NSEC"));
                    }
                    if ns.name() == zone {
                        return Err(DnssecError::BadReferral("delegation to the queried zone"));
                    }
                }
            }

            return Ok(true);
        }
    }

    Err(DnssecError::NoDenialProof)
}

/// Verifies an NXDOMAIN response: one NSEC must cover `qname` and another
/// (possibly the same) must cover the closest wildcard that could have
/// synthesized it.
pub fn verify_name_error(msg: &Message, zone: &Name, qname: &Name) -> Result<bool> {
    let mut name_proof = false;
    let mut wildcard_proof = false;
    let qname_labels = qname.label_count();

    for rr in msg.authority() {
        if name_proof && wildcard_proof {
            break;
        }

        let RData::NSEC(nsec) = rr.rdata() else {
            continue;
        };

        if !name_proof && covers(rr.name(), nsec.next_name(), qname) {
            name_proof = true;
        }

        if !wildcard_proof {
            // Walk wildcards from *.parent(qname) upward while they stay in
            // bailiwick; the first covered one proves no wildcard applies.
            for stripped in 1..=qname_labels {
                let Ok(wildcard) = qname.wildcard_of(qname_labels - stripped) else {
                    break;
                };
                if !wildcard.is_subdomain_of(zone) {
                    break;
                }
                if covers(rr.name(), nsec.next_name(), &wildcard) {
                    wildcard_proof = true;
                    break;
                }
            }
        }
    }

    if !name_proof {
        return Err(DnssecError::NoDenialProof);
    }
    if !wildcard_proof {
        return Err(DnssecError::WildcardUnproven);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_proto::{Header, Nsec, RecordClass, ResourceRecord};
    use std::str::FromStr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn nsec_rr(owner: &str, next: &str, types: &[RecordType]) -> ResourceRecord {
        ResourceRecord::new(
            name(owner),
            RecordType::NSEC,
            RecordClass::IN,
            300,
            RData::NSEC(Nsec::from_types(name(next), types)),
        )
    }

    fn msg_with_authority(records: Vec<ResourceRecord>) -> Message {
        let mut msg = Message::new(Header::default());
        for rr in records {
            msg.add_authority(rr);
        }
        msg
    }

    #[test]
    fn covers_strict_bounds() {
        let owner = name("a.example.");
        let next = name("m.example.");

        assert!(covers(&owner, &next, &name("b.example.")));
        // At or before the owner: never covered.
        assert!(!covers(&owner, &next, &name("a.example.")));
        assert!(!covers(&owner, &next, &name("A.EXAMPLE.")));
        assert!(!covers(&owner, &next, &name("0.example.")));
        // At or after next (no wrap): never covered.
        assert!(!covers(&owner, &next, &name("m.example.")));
        assert!(!covers(&owner, &next, &name("z.example.")));
    }

    #[test]
    fn covers_apex_wraparound() {
        // Last NSEC in the zone: next points back at the apex.
        let owner = name("z.example.");
        let next = name("example.");
        assert!(covers(&owner, &next, &name("zz.example.")));
        assert!(!covers(&owner, &next, &name("a.example.")));
    }

    #[test]
    fn nodata_proof_accepts_missing_type() {
        let msg = msg_with_authority(vec![nsec_rr(
            "host.example.",
            "next.example.",
            &[RecordType::A, RecordType::NSEC],
        )]);
        let ok = verify_nodata(
            &msg,
            &name("example."),
            &name("host.example."),
            RecordType::AAAA,
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn nodata_proof_rejects_existing_type() {
        let msg = msg_with_authority(vec![nsec_rr(
            "host.example.",
            "next.example.",
            &[RecordType::A, RecordType::AAAA],
        )]);
        let err = verify_nodata(
            &msg,
            &name("example."),
            &name("host.example."),
            RecordType::AAAA,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::TypeExists { .. }));
    }

    #[test]
    fn nodata_proof_rejects_cname_in_bitmap() {
        let msg = msg_with_authority(vec![nsec_rr(
            "host.example.",
            "next.example.",
            &[RecordType::CNAME],
        )]);
        let err = verify_nodata(
            &msg,
            &name("example."),
            &name("host.example."),
            RecordType::AAAA,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::TypeExists { .. }));
    }

    #[test]
    fn nsec3_downgrades_to_insecure() {
        let nsec3 = ResourceRecord::new(
            name("hash.example."),
            RecordType::NSEC3,
            RecordClass::IN,
            300,
            RData::NSEC3(quill_proto::Nsec3::new(1, 0, 10, vec![], vec![0xAB; 20], vec![])),
        );
        let msg = msg_with_authority(vec![nsec3]);
        let ok = verify_nodata(
            &msg,
            &name("example."),
            &name("host.example."),
            RecordType::A,
        )
        .unwrap();
        assert!(!ok);
    }

    #[test]
    fn secure_delegation_requires_matching_ns() {
        let ds = ResourceRecord::new(
            name("child.example."),
            RecordType::DS,
            RecordClass::IN,
            300,
            RData::DS(quill_proto::Ds::new(1, 15, 2, vec![0u8; 32])),
        );
        let ns = ResourceRecord::ns(name("child.example."), 300, name("ns1.child.example."));
        let msg = msg_with_authority(vec![ds.clone(), ns]);
        assert!(verify_nodata(
            &msg,
            &name("example."),
            &name("child.example."),
            RecordType::DS
        )
        .unwrap());

        // NS owner disagreeing with the DS owner is a bad referral.
        let bad_ns = ResourceRecord::ns(name("other.example."), 300, name("ns1.example."));
        let msg = msg_with_authority(vec![ds.clone(), bad_ns]);
        let err = verify_nodata(
            &msg,
            &name("example."),
            &name("child.example."),
            RecordType::DS,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::BadReferral(_)));

        // DS without any delegation is a hard error.
        let msg = msg_with_authority(vec![ds]);
        let err = verify_nodata(
            &msg,
            &name("example."),
            &name("child.example."),
            RecordType::DS,
        )
        .unwrap_err();
        assert!(matches!(err, DnssecError::DsWithoutDelegation));
    }

    #[test]
    fn name_error_requires_both_proofs() {
        let zone = name("example.");
        let qname = name("missing.example.");

        // Covers the name but no wildcard proof.
        let msg = msg_with_authority(vec![nsec_rr("m.example.", "n.example.", &[RecordType::A])]);
        let err = verify_name_error(&msg, &zone, &qname).unwrap_err();
        assert!(matches!(err, DnssecError::WildcardUnproven));

        // One NSEC spanning the whole zone proves both the name and the
        // wildcard.
        let msg = msg_with_authority(vec![nsec_rr(
            "example.",
            "zzz.example.",
            &[RecordType::SOA],
        )]);
        assert!(verify_name_error(&msg, &zone, &qname).unwrap());

        // No NSEC covering the name at all.
        let msg = msg_with_authority(vec![nsec_rr(
            "n.example.",
            "o.example.",
            &[RecordType::A],
        )]);
        let err = verify_name_error(&msg, &zone, &qname).unwrap_err();
        assert!(matches!(err, DnssecError::NoDenialProof));
    }
}
