//! Maps each verification purpose to the LoTE profile that supplies its
//! anchors, and to an issuance/revocation flavor within that profile.
//!
//! [`locate`] alone only tells you *which* profile and *which* flavor a
//! purpose needs; it says nothing about the actual [`ServiceTypeId`] that
//! flavor resolves to (that's advertised by each profile's LoTE, not fixed
//! by this module). [`purpose_to_service_map`] closes that gap: given the
//! service-type identifiers a profile advertises and the set of purposes to
//! resolve, it builds exactly the `purpose_to_service` argument
//! [`crate::projector::from_lotes`] expects.

use std::collections::HashMap;
use std::fmt;

use lote_trust_types::{ServiceTypeId, VerificationContext};

/// Identifies a LoTE profile (e.g. "PID providers", or an EAA use case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileKey(String);

impl ProfileKey {
    pub fn new(name: impl Into<String>) -> Self {
        ProfileKey(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProfileKey {
    fn from(value: &str) -> Self {
        ProfileKey::new(value)
    }
}

/// Which of a profile's two service-type identifiers — issuance or
/// revocation — a purpose resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFlavor {
    Issuance,
    Revocation,
}

/// Where a [`VerificationContext`]'s anchors live: which profile, and which
/// of that profile's two service-type flavors.
#[derive(Debug, Clone)]
pub struct ContextMapping {
    pub profile: ProfileKey,
    pub flavor: ServiceFlavor,
}

/// The fixed (non-parameterized) purposes, used only as a table key — kept
/// separate from [`VerificationContext`] so the table below can be a plain
/// `const` slice without carrying `VerificationContext`'s `String` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixedPurpose {
    WalletInstanceAttestation,
    WalletUnitAttestation,
    WalletUnitAttestationStatus,
    Pid,
    PidStatus,
    PubEaa,
    PubEaaStatus,
    Qeaa,
    QeaaStatus,
    WalletRelyingPartyRegistrationCertificate,
    WalletRelyingPartyAccessCertificate,
}

impl FixedPurpose {
    fn from_context(context: &VerificationContext) -> Option<Self> {
        Some(match context {
            VerificationContext::WalletInstanceAttestation => FixedPurpose::WalletInstanceAttestation,
            VerificationContext::WalletUnitAttestation => FixedPurpose::WalletUnitAttestation,
            VerificationContext::WalletUnitAttestationStatus => FixedPurpose::WalletUnitAttestationStatus,
            VerificationContext::Pid => FixedPurpose::Pid,
            VerificationContext::PidStatus => FixedPurpose::PidStatus,
            VerificationContext::PubEaa => FixedPurpose::PubEaa,
            VerificationContext::PubEaaStatus => FixedPurpose::PubEaaStatus,
            VerificationContext::Qeaa => FixedPurpose::Qeaa,
            VerificationContext::QeaaStatus => FixedPurpose::QeaaStatus,
            VerificationContext::WalletRelyingPartyRegistrationCertificate => {
                FixedPurpose::WalletRelyingPartyRegistrationCertificate
            }
            VerificationContext::WalletRelyingPartyAccessCertificate => {
                FixedPurpose::WalletRelyingPartyAccessCertificate
            }
            VerificationContext::Eaa(_) | VerificationContext::EaaStatus(_) | VerificationContext::Custom(_) => {
                return None
            }
        })
    }
}

const FIXED_TABLE: &[(FixedPurpose, &str, ServiceFlavor)] = &[
    (FixedPurpose::WalletInstanceAttestation, "wallet-provider", ServiceFlavor::Issuance),
    (FixedPurpose::WalletUnitAttestation, "wallet-provider", ServiceFlavor::Issuance),
    (FixedPurpose::WalletUnitAttestationStatus, "wallet-provider", ServiceFlavor::Revocation),
    (FixedPurpose::Pid, "pid-providers", ServiceFlavor::Issuance),
    (FixedPurpose::PidStatus, "pid-providers", ServiceFlavor::Revocation),
    (FixedPurpose::PubEaa, "pub-eaa-providers", ServiceFlavor::Issuance),
    (FixedPurpose::PubEaaStatus, "pub-eaa-providers", ServiceFlavor::Revocation),
    (FixedPurpose::Qeaa, "qeaa-providers", ServiceFlavor::Issuance),
    (FixedPurpose::QeaaStatus, "qeaa-providers", ServiceFlavor::Revocation),
    (
        FixedPurpose::WalletRelyingPartyRegistrationCertificate,
        "relying-party-registrars",
        ServiceFlavor::Issuance,
    ),
    (
        FixedPurpose::WalletRelyingPartyAccessCertificate,
        "relying-party-registrars",
        ServiceFlavor::Issuance,
    ),
];

/// Resolves a verification purpose to the profile and flavor that supply its
/// anchors.
///
/// Fixed purposes go through [`FIXED_TABLE`]. `EAA`/`EAAStatus`/`Custom` are
/// parameterized by a caller-defined use case and are matched structurally:
/// each use case is its own profile, and the mechanical rule from spec.md
/// §4.F applies — a purpose whose name ends in `Status` resolves to the
/// revocation flavor.
pub fn locate(context: &VerificationContext) -> ContextMapping {
    if let Some(fixed) = FixedPurpose::from_context(context) {
        let (_, profile, flavor) = FIXED_TABLE
            .iter()
            .find(|(purpose, _, _)| *purpose == fixed)
            .expect("every FixedPurpose variant has a table row");
        return ContextMapping {
            profile: ProfileKey::new(*profile),
            flavor: *flavor,
        };
    }

    match context {
        VerificationContext::Eaa(use_case) => ContextMapping {
            profile: ProfileKey::new(use_case.clone()),
            flavor: ServiceFlavor::Issuance,
        },
        VerificationContext::EaaStatus(use_case) => ContextMapping {
            profile: ProfileKey::new(use_case.clone()),
            flavor: ServiceFlavor::Revocation,
        },
        VerificationContext::Custom(use_case) => ContextMapping {
            profile: ProfileKey::new(use_case.clone()),
            flavor: ServiceFlavor::Issuance,
        },
        _ => unreachable!("fixed variants are resolved via FIXED_TABLE above"),
    }
}

/// The two service-type identifiers a single LoTE profile advertises: one
/// for issuance, one for revocation. Supplied by the caller from the
/// profile's loaded LoTE (or its documented metadata) — this module only
/// knows which flavor a purpose needs, not the URI that flavor resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileServiceTypes {
    pub issuance: ServiceTypeId,
    pub revocation: ServiceTypeId,
}

impl ProfileServiceTypes {
    pub fn new(issuance: impl Into<ServiceTypeId>, revocation: impl Into<ServiceTypeId>) -> Self {
        ProfileServiceTypes {
            issuance: issuance.into(),
            revocation: revocation.into(),
        }
    }

    fn resolve(&self, flavor: ServiceFlavor) -> ServiceTypeId {
        match flavor {
            ServiceFlavor::Issuance => self.issuance.clone(),
            ServiceFlavor::Revocation => self.revocation.clone(),
        }
    }
}

/// Builds the `purpose_to_service` argument [`crate::projector::from_lotes`]
/// expects: for each of `contexts`, resolves it through [`locate`] to a
/// `(profile, flavor)`, then looks up that profile in `profile_types` and
/// picks the flavor's service-type identifier.
///
/// A context whose profile has no entry in `profile_types` is skipped
/// rather than treated as an error here — that profile's LoTE presumably
/// wasn't loaded for this run, and `from_lotes`/the router already surface
/// "supported but absent" as `MisconfiguredSource` at lookup time, which is
/// the place spec.md §7 wants that distinction made.
pub fn purpose_to_service_map(
    contexts: impl IntoIterator<Item = VerificationContext>,
    profile_types: &HashMap<ProfileKey, ProfileServiceTypes>,
) -> HashMap<ProfileKey, HashMap<VerificationContext, ServiceTypeId>> {
    let mut result: HashMap<ProfileKey, HashMap<VerificationContext, ServiceTypeId>> = HashMap::new();
    for context in contexts {
        let mapping = locate(&context);
        let Some(types) = profile_types.get(&mapping.profile) else {
            continue;
        };
        result
            .entry(mapping.profile.clone())
            .or_default()
            .insert(context, types.resolve(mapping.flavor));
    }
    result
}
