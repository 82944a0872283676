//! Mapping an attestation identifier to a verification-purpose pair, and
//! delegating the actual trust decision to [`ChainTrustEvaluator`].

use crate::evaluator::{ChainTrustEvaluator, ChainValidator, EvaluationOutcome};
use lote_trust_types::VerificationContext;

/// A structural tag identifying the shape of an attestation, independent of
/// its content — an mdoc document type or an SD-JWT VC's `vct`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationIdentifier {
    Mdoc(String),
    SdJwtVc(String),
}

/// Which half of an issuance/revocation purpose pair to evaluate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurposeKind {
    Issuance,
    Revocation,
}

type Predicate = Box<dyn Fn(&AttestationIdentifier) -> bool + Send + Sync>;

/// Classifies an [`AttestationIdentifier`] into an issuance/revocation
/// [`VerificationContext`] pair, trying PID, then public EAA, then QEAA,
/// then each registered EAA use case in registration order — the first
/// matching predicate wins.
pub struct AttestationDispatcher {
    is_pid: Predicate,
    is_pub_eaa: Predicate,
    is_qeaa: Predicate,
    eaa_predicates: Vec<(String, Predicate)>,
}

impl AttestationDispatcher {
    pub fn new(
        is_pid: impl Fn(&AttestationIdentifier) -> bool + Send + Sync + 'static,
        is_pub_eaa: impl Fn(&AttestationIdentifier) -> bool + Send + Sync + 'static,
        is_qeaa: impl Fn(&AttestationIdentifier) -> bool + Send + Sync + 'static,
    ) -> Self {
        AttestationDispatcher {
            is_pid: Box::new(is_pid),
            is_pub_eaa: Box::new(is_pub_eaa),
            is_qeaa: Box::new(is_qeaa),
            eaa_predicates: Vec::new(),
        }
    }

    /// Registers a classification predicate for an EAA use case. Predicates
    /// are tried in registration order, after PID/PubEAA/QEAA.
    pub fn with_eaa_use_case(
        mut self,
        use_case: impl Into<String>,
        predicate: impl Fn(&AttestationIdentifier) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.eaa_predicates.push((use_case.into(), Box::new(predicate)));
        self
    }

    /// The issuance/revocation purpose pair for `identifier`, or `None` if
    /// no classification predicate matches.
    pub fn classify(&self, identifier: &AttestationIdentifier) -> Option<(VerificationContext, VerificationContext)> {
        if (self.is_pid)(identifier) {
            return Some((VerificationContext::Pid, VerificationContext::PidStatus));
        }
        if (self.is_pub_eaa)(identifier) {
            return Some((VerificationContext::PubEaa, VerificationContext::PubEaaStatus));
        }
        if (self.is_qeaa)(identifier) {
            return Some((VerificationContext::Qeaa, VerificationContext::QeaaStatus));
        }
        for (use_case, predicate) in &self.eaa_predicates {
            if predicate(identifier) {
                return Some((
                    VerificationContext::Eaa(use_case.clone()),
                    VerificationContext::EaaStatus(use_case.clone()),
                ));
            }
        }
        None
    }

    /// Classifies `identifier`, then delegates the chosen half of the
    /// purpose pair to `evaluator`. `None` if classification fails.
    pub async fn evaluate<C, A, V>(
        &self,
        evaluator: &ChainTrustEvaluator<C, A, V>,
        chain: &C,
        identifier: &AttestationIdentifier,
        kind: PurposeKind,
    ) -> Option<EvaluationOutcome<A, V::Cause>>
    where
        C: Send + Sync,
        A: Clone + Send + Sync + 'static,
        V: ChainValidator<C, A>,
    {
        let (issuance, revocation) = self.classify(identifier)?;
        let purpose = match kind {
            PurposeKind::Issuance => issuance,
            PurposeKind::Revocation => revocation,
        };
        Some(evaluator.evaluate(chain, &purpose).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{ChainValidation, PurposeSource};
    use crate::source::FnAnchorSource;
    use async_trait::async_trait;
    use lote_trust_types::NonEmpty;
    use std::collections::HashMap;
    use std::future::ready;
    use std::sync::Arc;

    fn dispatcher() -> AttestationDispatcher {
        AttestationDispatcher::new(
            |id| matches!(id, AttestationIdentifier::Mdoc(doc_type) if doc_type == "eu.europa.ec.eudi.pid.1"),
            |_| false,
            |_| false,
        )
        .with_eaa_use_case("mdl", |id| matches!(id, AttestationIdentifier::Mdoc(doc_type) if doc_type == "org.iso.18013.5.1.mDL"))
    }

    #[test]
    fn classifies_pid_before_eaa_use_cases() {
        let identifier = AttestationIdentifier::Mdoc("eu.europa.ec.eudi.pid.1".to_string());
        let (issuance, revocation) = dispatcher().classify(&identifier).unwrap();
        assert_eq!(issuance, VerificationContext::Pid);
        assert_eq!(revocation, VerificationContext::PidStatus);
    }

    #[test]
    fn classifies_registered_eaa_use_case() {
        let identifier = AttestationIdentifier::Mdoc("org.iso.18013.5.1.mDL".to_string());
        let (issuance, revocation) = dispatcher().classify(&identifier).unwrap();
        assert_eq!(issuance, VerificationContext::Eaa("mdl".to_string()));
        assert_eq!(revocation, VerificationContext::EaaStatus("mdl".to_string()));
    }

    #[test]
    fn unrecognized_identifier_does_not_classify() {
        let identifier = AttestationIdentifier::SdJwtVc("urn:unknown".to_string());
        assert!(dispatcher().classify(&identifier).is_none());
    }

    struct FixedValidator;

    #[async_trait]
    impl ChainValidator<String, u32> for FixedValidator {
        type Cause = String;

        async fn validate(&self, _chain: &String, anchors: &NonEmpty<u32>) -> ChainValidation<u32, String> {
            ChainValidation::Trusted(*anchors.first())
        }
    }

    #[tokio::test]
    async fn evaluate_delegates_to_the_chosen_purpose() {
        let mut anchors: HashMap<VerificationContext, PurposeSource<u32>> = HashMap::new();
        anchors.insert(
            VerificationContext::Pid,
            Arc::new(FnAnchorSource::new(|_: &()| ready(Some(NonEmpty::one(42))))),
        );
        let evaluator = ChainTrustEvaluator::new(FixedValidator, anchors);

        let identifier = AttestationIdentifier::Mdoc("eu.europa.ec.eudi.pid.1".to_string());
        let outcome = dispatcher()
            .evaluate(&evaluator, &"chain".to_string(), &identifier, PurposeKind::Issuance)
            .await
            .unwrap();

        assert!(matches!(outcome, EvaluationOutcome::Trusted(42)));
    }

    #[tokio::test]
    async fn evaluate_returns_none_when_unclassified() {
        let evaluator = ChainTrustEvaluator::new(FixedValidator, HashMap::new());
        let identifier = AttestationIdentifier::SdJwtVc("urn:unknown".to_string());
        let outcome = dispatcher()
            .evaluate(&evaluator, &"chain".to_string(), &identifier, PurposeKind::Issuance)
            .await;
        assert!(outcome.is_none());
    }
}
