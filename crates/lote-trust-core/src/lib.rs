//! Trust-anchor provisioning and certificate-chain trust evaluation core for
//! an electronic identity wallet ecosystem.
//!
//! Given a certificate chain and a declared [`VerificationContext`], this
//! crate answers: is the chain anchored in a trust set authoritative for
//! that purpose? The authoritative trust sets are Lists of Trusted Entities
//! (LoTEs), published at well-known locations, possibly pointing
//! recursively to further lists.
//!
//! # What this crate does *not* do
//!
//! It never performs network I/O, never parses JWTs, never verifies a
//! LoTE's signature, and never implements PKIX path validation. All four
//! are injected by the caller: a document-fetcher function, a chain
//! validator, a platform key-store adapter, and the ETSI LoTE JSON schema
//! respectively live outside this crate.
//!
//! # Modules, in dependency order
//!
//! - [`cache`] — an async single-flight cache with TTL and LRU bounds.
//! - [`source`] — [`source::AnchorSource`], the query→anchors abstraction,
//!   and its `or` / `contra_map` / `cached` combinators.
//! - [`router`] — [`router::SupportedQueries`], a disjoint-union router over
//!   anchor sources.
//! - [`loader`] — [`loader::RecursiveLoader`], a bounded, cycle-safe
//!   traversal of a LoTE and the lists it points to.
//! - [`projector`] — [`projector::TrustAnchorProjector`], extracting anchor
//!   certificates from a loaded LoTE for a given service type.
//! - [`context_model`] — the static table mapping [`VerificationContext`] to
//!   a profile and an issuance/revocation service-type flavor.
//! - [`evaluator`] — [`evaluator::ChainTrustEvaluator`], composing an anchor
//!   source with an injected chain validator, with optional recovery.
//! - [`dispatcher`] — [`dispatcher::AttestationDispatcher`], mapping an
//!   attestation identifier to an issuance/revocation purpose pair.

pub mod cache;
pub mod context_model;
pub mod dispatcher;
pub mod evaluator;
pub mod loader;
pub mod projector;
pub mod router;
pub mod source;

pub use lote_trust_types::{
    CertificateObject, DigitalIdentity, InMemoryLote, LoteDocument, NonEmpty, NonEmptyError,
    PointerToLote, Service, ServiceInformation, ServiceTypeId, TrustedEntity, VerificationContext,
};
