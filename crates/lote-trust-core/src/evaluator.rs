//! Composing an anchor source with an injected chain validator, with
//! optional recovery into an alternative anchor set.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use lote_trust_types::{NonEmpty, VerificationContext};

use crate::source::AnchorSource;

/// The injected, caller-supplied decision of whether a chain terminates in
/// one of the given anchors.
///
/// `Cause` is an associated type rather than a second generic parameter so
/// that a single validator implementation settles on one cause
/// representation, instead of every caller re-specifying it.
#[async_trait]
pub trait ChainValidator<C, A>: Send + Sync
where
    C: Send + Sync,
    A: Clone + Send + Sync,
{
    type Cause: Clone + Send + Sync;

    async fn validate(&self, chain: &C, anchors: &NonEmpty<A>) -> ChainValidation<A, Self::Cause>;
}

/// The validator's binary verdict, before recovery is considered.
#[derive(Debug, Clone)]
pub enum ChainValidation<A, Cause> {
    Trusted(A),
    NotTrusted(Cause),
}

/// The evaluator's final, tri-valued outcome.
#[derive(Debug, Clone)]
pub enum EvaluationOutcome<A, Cause> {
    Trusted(A),
    NotTrusted(Cause),
    /// No anchor source is configured for the purpose, or the configured
    /// one yielded no anchors — a deployment error, never silently ignored.
    NotConfigured,
}

pub type PurposeSource<A> = Arc<dyn AnchorSource<(), A> + Send + Sync>;
pub type RecoveryFn<A, Cause> = Arc<dyn Fn(&Cause) -> Option<PurposeSource<A>> + Send + Sync>;

/// Composes a [`ChainValidator`] with a per-purpose map of anchor sources,
/// with optional one-shot recovery on a negative outcome.
pub struct ChainTrustEvaluator<C, A, V>
where
    V: ChainValidator<C, A>,
{
    validator: Arc<V>,
    anchors_by_purpose: HashMap<VerificationContext, PurposeSource<A>>,
    recovery: HashMap<VerificationContext, RecoveryFn<A, V::Cause>>,
    _chain: PhantomData<fn(&C)>,
}

impl<C, A, V> ChainTrustEvaluator<C, A, V>
where
    C: Send + Sync,
    A: Clone + Send + Sync + 'static,
    V: ChainValidator<C, A>,
{
    pub fn new(validator: V, anchors_by_purpose: HashMap<VerificationContext, PurposeSource<A>>) -> Self {
        ChainTrustEvaluator {
            validator: Arc::new(validator),
            anchors_by_purpose,
            recovery: HashMap::new(),
            _chain: PhantomData,
        }
    }

    /// Registers a recovery strategy for `purpose`: given the cause of a
    /// `NotTrusted`, optionally produce an alternative anchor source to
    /// retry against. Runs at most once per [`ChainTrustEvaluator::
    /// evaluate`] call.
    pub fn with_recovery(
        mut self,
        purpose: VerificationContext,
        recover: impl Fn(&V::Cause) -> Option<PurposeSource<A>> + Send + Sync + 'static,
    ) -> Self {
        self.recovery.insert(purpose, Arc::new(recover));
        self
    }

    /// Merges `other` into `self`: purposes present in both take `other`'s
    /// anchor source and recovery strategy ("right wins on conflict" — the
    /// spec permits requiring disjointness instead, but this crate documents
    /// and implements right-wins, see the grounding ledger).
    pub fn merge(mut self, other: Self) -> Self {
        self.anchors_by_purpose.extend(other.anchors_by_purpose);
        self.recovery.extend(other.recovery);
        ChainTrustEvaluator {
            validator: other.validator,
            anchors_by_purpose: self.anchors_by_purpose,
            recovery: self.recovery,
            _chain: PhantomData,
        }
    }

    /// Adapts this evaluator to accept chains in an alternative
    /// representation `C1`, via `h: C1 -> C`.
    pub fn contra_map<C1, H>(self, h: H) -> ChainTrustEvaluator<C1, A, ContraMapValidator<V, H, C>>
    where
        C1: Send + Sync,
        H: Fn(&C1) -> C + Send + Sync + 'static,
    {
        ChainTrustEvaluator {
            validator: Arc::new(ContraMapValidator {
                inner: self.validator,
                map: h,
                _chain: PhantomData,
            }),
            anchors_by_purpose: self.anchors_by_purpose,
            recovery: self.recovery,
            _chain: PhantomData,
        }
    }

    pub async fn evaluate(&self, chain: &C, purpose: &VerificationContext) -> EvaluationOutcome<A, V::Cause> {
        let Some(source) = self.anchors_by_purpose.get(purpose) else {
            return EvaluationOutcome::NotConfigured;
        };

        let anchors = match source.get(&()).await {
            Some(anchors) => anchors,
            None => {
                tracing::error!(%purpose, "configured anchor source yielded no anchors");
                return EvaluationOutcome::NotConfigured;
            }
        };

        match self.validator.validate(chain, &anchors).await {
            ChainValidation::Trusted(anchor) => EvaluationOutcome::Trusted(anchor),
            ChainValidation::NotTrusted(cause) => self.recover(chain, purpose, cause).await,
        }
    }

    async fn recover(&self, chain: &C, purpose: &VerificationContext, cause: V::Cause) -> EvaluationOutcome<A, V::Cause> {
        let Some(recover) = self.recovery.get(purpose) else {
            return EvaluationOutcome::NotTrusted(cause);
        };
        let Some(alt_source) = recover(&cause) else {
            return EvaluationOutcome::NotTrusted(cause);
        };
        let Some(alt_anchors) = alt_source.get(&()).await else {
            return EvaluationOutcome::NotTrusted(cause);
        };

        match self.validator.validate(chain, &alt_anchors).await {
            ChainValidation::Trusted(anchor) => EvaluationOutcome::Trusted(anchor),
            ChainValidation::NotTrusted(_) => EvaluationOutcome::NotTrusted(cause),
        }
    }
}

/// `evaluator.contra_map(h)` — see [`ChainTrustEvaluator::contra_map`].
pub struct ContraMapValidator<V, H, C2> {
    inner: Arc<V>,
    map: H,
    _chain: PhantomData<fn(&C2)>,
}

#[async_trait]
impl<C1, C2, A, V, H> ChainValidator<C1, A> for ContraMapValidator<V, H, C2>
where
    C1: Send + Sync,
    C2: Send + Sync,
    A: Clone + Send + Sync,
    V: ChainValidator<C2, A>,
    H: Fn(&C1) -> C2 + Send + Sync,
{
    type Cause = V::Cause;

    async fn validate(&self, chain: &C1, anchors: &NonEmpty<A>) -> ChainValidation<A, Self::Cause> {
        let mapped = (self.map)(chain);
        self.inner.validate(&mapped, anchors).await
    }
}
