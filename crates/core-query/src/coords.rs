//! Sequence-coordinate selector registry.
//!
//! GenBank flatfile intervals are 1-based inclusive; Entrez ASN.1 and
//! docsum coordinates are 0-based. The `-0-based`, `-1-based`, and
//! `-ucsc-based` flags rewrite a registered selector into the INC, DEC, or
//! plain ELEMENT operation that converts its stored base into the
//! requested convention (UCSC being 0-based half-open: starts shift down,
//! stops stay inclusive-exclusive).
//!
//! The registry keys on the selector itself; the record types listed with
//! each entry document where the selector occurs.

use crate::ops::OpKind;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Which end of an interval a selector names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Start,
    Stop,
}

/// Requested coordinate convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    ZeroBased,
    OneBased,
    UcscBased,
}

impl Flavor {
    pub fn parse(flag: &str) -> Option<Self> {
        Some(match flag.to_ascii_lowercase().as_str() {
            "-0-based" => Self::ZeroBased,
            "-1-based" => Self::OneBased,
            "-ucsc-based" => Self::UcscBased,
            _ => return None,
        })
    }
}

struct Entry {
    base: u8,
    role: Role,
}

fn registry() -> &'static HashMap<&'static str, Entry> {
    static REGISTRY: OnceLock<HashMap<&'static str, Entry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut m = HashMap::new();
        // INSDSeq
        m.insert("INSDInterval_from", Entry { base: 1, role: Role::Start });
        m.insert("INSDInterval_to", Entry { base: 1, role: Role::Stop });
        m.insert("INSDInterval_point", Entry { base: 1, role: Role::Start });
        // DocumentSummary / GenomicInfoType
        m.insert("ChrStart", Entry { base: 0, role: Role::Start });
        m.insert("ChrStop", Entry { base: 0, role: Role::Stop });
        m.insert("ChrLoc", Entry { base: 0, role: Role::Start });
        // Entrezgene
        m.insert("Seq-interval_from", Entry { base: 0, role: Role::Start });
        m.insert("Seq-interval_to", Entry { base: 0, role: Role::Stop });
        // Rs (dbSNP attribute selectors)
        m.insert("@asnFrom", Entry { base: 0, role: Role::Start });
        m.insert("@asnTo", Entry { base: 0, role: Role::Stop });
        m.insert("@start", Entry { base: 0, role: Role::Start });
        m.insert("@end", Entry { base: 0, role: Role::Stop });
        m.insert("@physMapInt", Entry { base: 0, role: Role::Start });
        m.insert("@genMapInt", Entry { base: 0, role: Role::Start });
        m.insert("@protLoc", Entry { base: 1, role: Role::Start });
        m
    })
}

/// Is `selector` a registered coordinate element or attribute?
pub fn is_registered(selector: &str) -> bool {
    registry().contains_key(selector)
}

/// The operation a registered selector rewrites to under `flavor`.
pub fn rewrite(selector: &str, flavor: Flavor) -> Option<OpKind> {
    let entry = registry().get(selector)?;
    Some(match (entry.base, entry.role, flavor) {
        (1, Role::Start, Flavor::ZeroBased) => OpKind::Dec,
        (1, Role::Start, Flavor::OneBased) => OpKind::Element,
        (1, Role::Start, Flavor::UcscBased) => OpKind::Dec,
        (1, Role::Stop, Flavor::ZeroBased) => OpKind::Dec,
        (1, Role::Stop, Flavor::OneBased) => OpKind::Element,
        (1, Role::Stop, Flavor::UcscBased) => OpKind::Element,
        (0, Role::Start, Flavor::ZeroBased) => OpKind::Element,
        (0, Role::Start, Flavor::OneBased) => OpKind::Inc,
        (0, Role::Start, Flavor::UcscBased) => OpKind::Element,
        (0, Role::Stop, Flavor::ZeroBased) => OpKind::Element,
        (0, Role::Stop, Flavor::OneBased) => OpKind::Inc,
        (0, Role::Stop, Flavor::UcscBased) => OpKind::Inc,
        _ => OpKind::Element,
    })
}
