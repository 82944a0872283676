//! Verification purposes and the service-type identifiers they resolve to.

use std::fmt;

/// The closed set of reasons a caller might present a certificate chain for
/// validation.
///
/// Most variants are fixed (wallet attestations, PID, QEAA, relying-party
/// certificates); `EAA`, `EAAStatus`, and `Custom` are parameterized by a
/// use-case identifier because the wallet ecosystem can define new
/// attestation types without this crate changing.
///
/// # Invariant
///
/// For any non-empty `use_case`, `EAA(use_case)` and `EAAStatus(use_case)`
/// are a paired issuance/revocation purpose over the same use case — see
/// [`crate::context`] module tests, and [`VerificationContext::is_status`]
/// for how a purpose's flavor is told apart mechanically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VerificationContext {
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
    /// An issuance purpose for a wallet-ecosystem-defined attestation type.
    Eaa(String),
    /// The revocation-status counterpart of [`VerificationContext::Eaa`].
    EaaStatus(String),
    /// An issuance purpose outside the fixed catalog above.
    Custom(String),
}

impl VerificationContext {
    /// `true` for variants whose name denotes a revocation/status check
    /// rather than an issuance check — see spec.md §4.F: "purposes whose
    /// name ends in `Status` select the revocation identifier."
    pub fn is_status(&self) -> bool {
        matches!(
            self,
            VerificationContext::WalletUnitAttestationStatus
                | VerificationContext::PidStatus
                | VerificationContext::PubEaaStatus
                | VerificationContext::QeaaStatus
                | VerificationContext::EaaStatus(_)
        )
    }
}

impl fmt::Display for VerificationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationContext::WalletInstanceAttestation => write!(f, "WalletInstanceAttestation"),
            VerificationContext::WalletUnitAttestation => write!(f, "WalletUnitAttestation"),
            VerificationContext::WalletUnitAttestationStatus => write!(f, "WalletUnitAttestationStatus"),
            VerificationContext::Pid => write!(f, "PID"),
            VerificationContext::PidStatus => write!(f, "PIDStatus"),
            VerificationContext::PubEaa => write!(f, "PubEAA"),
            VerificationContext::PubEaaStatus => write!(f, "PubEAAStatus"),
            VerificationContext::Qeaa => write!(f, "QEAA"),
            VerificationContext::QeaaStatus => write!(f, "QEAAStatus"),
            VerificationContext::WalletRelyingPartyRegistrationCertificate => {
                write!(f, "WalletRelyingPartyRegistrationCertificate")
            }
            VerificationContext::WalletRelyingPartyAccessCertificate => {
                write!(f, "WalletRelyingPartyAccessCertificate")
            }
            VerificationContext::Eaa(use_case) => write!(f, "EAA({use_case})"),
            VerificationContext::EaaStatus(use_case) => write!(f, "EAAStatus({use_case})"),
            VerificationContext::Custom(use_case) => write!(f, "Custom({use_case})"),
        }
    }
}

/// An opaque, profile-scoped URI identifying a service's role within a LoTE
/// (issuance vs. revocation, within the same profile).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceTypeId(String);

impl ServiceTypeId {
    pub fn new(uri: impl Into<String>) -> Self {
        ServiceTypeId(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ServiceTypeId {
    fn from(value: String) -> Self {
        ServiceTypeId(value)
    }
}

impl From<&str> for ServiceTypeId {
    fn from(value: &str) -> Self {
        ServiceTypeId(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_variants_are_recognized() {
        assert!(VerificationContext::PidStatus.is_status());
        assert!(VerificationContext::EaaStatus("mdl".into()).is_status());
        assert!(!VerificationContext::Pid.is_status());
        assert!(!VerificationContext::Eaa("mdl".into()).is_status());
    }

    #[test]
    fn eaa_pairing_shares_use_case() {
        let use_case = "mdl".to_string();
        let issuance = VerificationContext::Eaa(use_case.clone());
        let revocation = VerificationContext::EaaStatus(use_case.clone());
        match (issuance, revocation) {
            (VerificationContext::Eaa(a), VerificationContext::EaaStatus(b)) => assert_eq!(a, b),
            _ => panic!("expected Eaa/EaaStatus pair"),
        }
    }
}
