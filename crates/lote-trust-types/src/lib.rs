//! Data model for trust-anchor provisioning in an EUDI-style wallet ecosystem.
//!
//! This crate has no async runtime dependency and performs no I/O: it only
//! defines the shapes that [`lote-trust-core`](https://docs.rs/lote-trust-core)
//! operates on.
//!
//! # Modules
//!
//! - [`context`] — [`VerificationContext`] and [`ServiceTypeId`], the closed
//!   set of verification purposes and the service-type identifiers they
//!   resolve to within a LoTE profile.
//! - [`lote`] — the [`LoteDocument`] trait and [`TrustedEntity`] / [`Service`]
//!   / [`CertificateObject`] shapes a loaded List of Trusted Entities exposes
//!   to the core.
//! - [`nonempty`] — [`NonEmpty`], a `Vec` wrapper that cannot be constructed
//!   empty, used everywhere the spec calls for a non-empty sequence.

pub mod context;
pub mod lote;
pub mod nonempty;

pub use context::{ServiceTypeId, VerificationContext};
pub use lote::{CertificateObject, DigitalIdentity, InMemoryLote, LoteDocument, PointerToLote, Service, ServiceInformation, TrustedEntity};
pub use nonempty::{NonEmpty, NonEmptyError};
