//! The shape of a List of Trusted Entities (LoTE), as the core consumes it.
//!
//! Parsing (JSON, signature verification, ETSI profile conformance) happens
//! upstream of this crate; what lands here is already-validated structure.

use url::Url;

use crate::context::ServiceTypeId;

/// A pointer to another LoTE that the current one references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerToLote {
    pub location: Url,
}

/// An X.509 certificate as carried inside a LoTE service entry.
///
/// Kept opaque (raw DER bytes) — this crate does not parse certificates;
/// that's the injected chain validator's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateObject {
    pub der: Vec<u8>,
}

impl CertificateObject {
    pub fn new(der: Vec<u8>) -> Self {
        CertificateObject { der }
    }
}

/// The X.509 anchors a service advertises, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigitalIdentity {
    pub x509_certificates: Vec<CertificateObject>,
}

/// The part of a [`Service`] the projector cares about: what type of service
/// this is, and which certificates back it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInformation {
    pub type_identifier: ServiceTypeId,
    pub digital_identity: DigitalIdentity,
}

/// A single service offered by a [`TrustedEntity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub information: ServiceInformation,
}

/// An entity (trust service provider) listed in a LoTE.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrustedEntity {
    pub services: Vec<Service>,
}

/// The abstract shape of a loaded LoTE document.
///
/// Implement this for whatever parsed representation your JSON layer
/// produces; [`InMemoryLote`] is a ready-made implementation for tests and
/// for callers who don't already have one.
pub trait LoteDocument: Send + Sync {
    /// The profile this list asserts conformance to (e.g. "PID providers").
    fn scheme_type(&self) -> &str;

    /// Other LoTEs this one points to, in declaration order.
    fn pointers_to_other(&self) -> &[PointerToLote];

    /// The entities this list vouches for, in declaration order.
    fn entities(&self) -> &[TrustedEntity];
}

/// A plain, in-memory [`LoteDocument`] — the concrete type used by tests and
/// by callers content to hold the whole document in a `Vec`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InMemoryLote {
    pub scheme_type: String,
    pub pointers_to_other: Vec<PointerToLote>,
    pub entities: Vec<TrustedEntity>,
}

impl InMemoryLote {
    pub fn new(scheme_type: impl Into<String>) -> Self {
        InMemoryLote {
            scheme_type: scheme_type.into(),
            pointers_to_other: Vec::new(),
            entities: Vec::new(),
        }
    }

    pub fn with_pointer(mut self, location: Url) -> Self {
        self.pointers_to_other.push(PointerToLote { location });
        self
    }

    pub fn with_entity(mut self, entity: TrustedEntity) -> Self {
        self.entities.push(entity);
        self
    }
}

impl LoteDocument for InMemoryLote {
    fn scheme_type(&self) -> &str {
        &self.scheme_type
    }

    fn pointers_to_other(&self) -> &[PointerToLote] {
        &self.pointers_to_other
    }

    fn entities(&self) -> &[TrustedEntity] {
        &self.entities
    }
}
