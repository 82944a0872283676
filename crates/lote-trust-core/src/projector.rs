//! Selecting anchor certificates from a loaded LoTE for a target service
//! type, and assembling per-profile anchor sources into a router.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lote_trust_types::{CertificateObject, LoteDocument, NonEmpty, ServiceTypeId, VerificationContext};

use crate::context_model::ProfileKey;
use crate::router::{RouterConfigError, SupportedQueries};
use crate::source::FnAnchorSource;

/// Projects a single loaded LoTE onto the certificates backing a given
/// service type.
pub struct TrustAnchorProjector<L> {
    lote: Arc<L>,
}

impl<L: LoteDocument> TrustAnchorProjector<L> {
    pub fn new(lote: Arc<L>) -> Self {
        TrustAnchorProjector { lote }
    }

    /// The concatenation, in declaration order with duplicates preserved, of
    /// every matching service's certificates across every entity. `None` if
    /// nothing matches.
    pub fn project(&self, service_type: &ServiceTypeId) -> Option<NonEmpty<CertificateObject>> {
        let certificates: Vec<CertificateObject> = self
            .lote
            .entities()
            .iter()
            .flat_map(|entity| entity.services.iter())
            .filter(|service| &service.information.type_identifier == service_type)
            .flat_map(|service| service.information.digital_identity.x509_certificates.iter().cloned())
            .collect();

        NonEmpty::try_from_vec(certificates).ok()
    }
}

/// Builds a `SupportedQueries<VerificationContext, CertificateObject>` out of
/// every loaded profile: for each profile whose LoTE is present and whose
/// purpose→service-type mapping is non-empty, projects that mapping into a
/// fresh anchor source restricted to the profile's purpose set, then
/// disjoint-unions all such sources.
pub fn from_lotes<L>(
    lotes: HashMap<ProfileKey, Arc<L>>,
    purpose_to_service: HashMap<ProfileKey, HashMap<VerificationContext, ServiceTypeId>>,
) -> Result<SupportedQueries<VerificationContext, CertificateObject>, RouterConfigError>
where
    L: LoteDocument + 'static,
{
    let mut router: Option<SupportedQueries<VerificationContext, CertificateObject>> = None;

    for (profile, lote) in lotes {
        let Some(purpose_map) = purpose_to_service.get(&profile) else {
            continue;
        };
        if purpose_map.is_empty() {
            continue;
        }

        let queries: HashSet<VerificationContext> = purpose_map.keys().cloned().collect();
        let projector = Arc::new(TrustAnchorProjector::new(lote));
        let purpose_map = Arc::new(purpose_map.clone());

        let source = FnAnchorSource::new(move |purpose: &VerificationContext| {
            let projector = projector.clone();
            let purpose_map = purpose_map.clone();
            let purpose = purpose.clone();
            async move {
                let service_type = purpose_map.get(&purpose)?;
                projector.project(service_type)
            }
        });

        let profile_router = SupportedQueries::single(queries, source)?;
        router = Some(match router {
            Some(existing) => existing.merge(profile_router)?,
            None => profile_router,
        });
    }

    router.ok_or(RouterConfigError::EmptySet)
}
