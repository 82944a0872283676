//! The supported-queries router: a disjoint-union of anchor sources.
//!
//! [`SupportedQueries`] partitions the space of queries into disjoint sets,
//! each backed by one [`AnchorSource`]. Looking up a query that falls
//! outside every set is distinguished from looking up one that falls inside
//! a set whose source happens to have nothing to say — the former is a
//! caller mistake ([`QueryOutcome::QueryNotSupported`]), the latter is a
//! deployment error ([`QueryOutcome::MisconfiguredSource`]).

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use lote_trust_types::NonEmpty;

use crate::source::AnchorSource;

/// Bound required of the relabeling function `k` passed to
/// [`SupportedQueries::transform`]: it must be injective on each query set,
/// which is checked at runtime rather than encoded in the type.
type BoxedSource<Q, A> = Arc<dyn AnchorSource<Q, A> + Send + Sync>;

/// Construction-time failures for [`SupportedQueries`].
#[derive(Debug, thiserror::Error)]
pub enum RouterConfigError {
    #[error("supported query set is empty")]
    EmptySet,
    #[error("query sets overlap: {0} queries appear in more than one set")]
    OverlappingSets(usize),
    #[error("transform is not injective on a query set: {before} queries mapped to {after} distinct queries")]
    NonInjectiveTransform { before: usize, after: usize },
}

/// The tri-valued result of [`SupportedQueries::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome<A> {
    /// The query is supported and its source produced anchors.
    Found(NonEmpty<A>),
    /// The query is supported, but its source returned nothing — a
    /// deployment error, not a data error.
    MisconfiguredSource,
    /// No configured source is responsible for this query.
    QueryNotSupported,
}

impl<A> QueryOutcome<A> {
    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }
}

struct Route<Q, A> {
    queries: HashSet<Q>,
    source: BoxedSource<Q, A>,
}

/// An immutable mapping from disjoint query sets to anchor sources.
pub struct SupportedQueries<Q, A> {
    routes: Vec<Route<Q, A>>,
}

impl<Q, A> SupportedQueries<Q, A>
where
    Q: Eq + Hash + Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    /// Builds a router with a single route covering `queries`.
    pub fn single(
        queries: HashSet<Q>,
        source: impl AnchorSource<Q, A> + 'static,
    ) -> Result<Self, RouterConfigError> {
        if queries.is_empty() {
            return Err(RouterConfigError::EmptySet);
        }
        Ok(SupportedQueries {
            routes: vec![Route {
                queries,
                source: Arc::new(source),
            }],
        })
    }

    /// Disjoint-union of `self` and `other` (spec.md §4.C `+`). Fails if any
    /// query is covered by both.
    pub fn merge(mut self, other: Self) -> Result<Self, RouterConfigError> {
        let overlap = self.count_overlap(&other);
        if overlap > 0 {
            return Err(RouterConfigError::OverlappingSets(overlap));
        }
        self.routes.extend(other.routes);
        Ok(self)
    }

    fn count_overlap(&self, other: &Self) -> usize {
        let mut count = 0;
        for route in &self.routes {
            for other_route in &other.routes {
                count += route.queries.intersection(&other_route.queries).count();
            }
        }
        count
    }

    /// Re-expresses this router over a different query type `Q2`, via a
    /// bijection-on-each-set `(h: Q2 -> Q, k: Q -> Q2)`. `h` adapts each
    /// source (`contra_map`); `k` relabels each query set and must be
    /// injective on every set (checked) so the transformed sets stay the
    /// same size and, in aggregate, disjoint.
    pub fn transform<Q2, H, K>(self, h: H, k: K) -> Result<SupportedQueries<Q2, A>, RouterConfigError>
    where
        Q2: Eq + Hash + Clone + Send + Sync + 'static,
        H: Fn(&Q2) -> Q + Clone + Send + Sync + 'static,
        K: Fn(&Q) -> Q2,
    {
        let mut routes = Vec::with_capacity(self.routes.len());
        for route in self.routes {
            let before = route.queries.len();
            let new_queries: HashSet<Q2> = route.queries.iter().map(&k).collect();
            let after = new_queries.len();
            if after != before {
                return Err(RouterConfigError::NonInjectiveTransform { before, after });
            }
            let new_source = route.source.contra_map(h.clone());
            routes.push(Route {
                queries: new_queries,
                source: Arc::new(new_source),
            });
        }

        let transformed = SupportedQueries { routes };
        let mut seen_total = 0usize;
        let mut union: HashSet<&Q2> = HashSet::new();
        for route in &transformed.routes {
            seen_total += route.queries.len();
            union.extend(route.queries.iter());
        }
        if union.len() != seen_total {
            return Err(RouterConfigError::OverlappingSets(seen_total - union.len()));
        }
        Ok(transformed)
    }

    /// Resolves `query` against the router.
    pub async fn get(&self, query: &Q) -> QueryOutcome<A> {
        for route in &self.routes {
            if route.queries.contains(query) {
                return match route.source.get(query).await {
                    Some(anchors) => QueryOutcome::Found(anchors),
                    None => {
                        tracing::warn!("supported query resolved to no anchors (misconfigured source)");
                        QueryOutcome::MisconfiguredSource
                    }
                };
            }
        }
        QueryOutcome::QueryNotSupported
    }

    /// All queries this router claims to support, across all routes.
    pub fn supported_queries(&self) -> impl Iterator<Item = &Q> {
        self.routes.iter().flat_map(|route| route.queries.iter())
    }
}
