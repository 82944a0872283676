//! Anchor sources: the query→anchors abstraction, and its combinators.
//!
//! An [`AnchorSource`] answers "for this query, what are the anchors (if
//! any)?" `None` means *absent* — not configured through this source — and
//! is distinct from an empty answer, which [`NonEmpty`] makes unrepresentable.
//!
//! Rust has no declaration-site variance, so the `contra_map` combinator the
//! spec describes for a contravariant `Q` is expressed here as an adapter
//! struct (`ContraMap`) rather than a language-level variance annotation —
//! per spec.md §9's guidance for languages without it.

use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{AsyncCache, CacheConfigError, CacheParams};
use lote_trust_types::NonEmpty;

/// `Q → Option<NonEmpty<A>>`, suspendable.
///
/// `None` means the query has no anchors *through this source*; emitting an
/// empty sequence instead is a contract violation the type system forbids
/// by construction (the payload is [`NonEmpty`], never an empty `Vec`).
#[async_trait]
pub trait AnchorSource<Q, A>: Send + Sync
where
    Q: Send + Sync,
    A: Clone + Send + Sync,
{
    async fn get(&self, query: &Q) -> Option<NonEmpty<A>>;

    /// `x.or(y)`: try `self` first, fall back to `other` if `self` has no
    /// anchors for the query.
    fn or<S>(self, other: S) -> Or<Self, S>
    where
        Self: Sized,
        S: AnchorSource<Q, A>,
    {
        Or(self, other)
    }

    /// `x.contra_map(h)`: adapt `self` to answer queries of a different
    /// shape `Q2`, by mapping each `Q2` down to the `Q` this source expects.
    fn contra_map<Q2, H>(self, h: H) -> ContraMap<Self, H, Q>
    where
        Self: Sized,
        Q2: Send + Sync,
        H: Fn(&Q2) -> Q + Send + Sync,
    {
        ContraMap {
            source: self,
            map: h,
            _q: PhantomData,
        }
    }

    /// Wraps `self` with a single-flight, TTL- and LRU-bounded cache keyed
    /// by `Q`'s structural equality.
    fn cached(self, ttl: Duration, capacity: usize) -> Result<Cached<Self, Q, A>, CacheConfigError>
    where
        Self: Sized + 'static,
        Q: Eq + std::hash::Hash + Clone + Ord + 'static,
        A: 'static,
    {
        let cache = AsyncCache::new(CacheParams { ttl, capacity })?;
        Ok(Cached {
            source: Arc::new(self),
            cache: Arc::new(cache),
        })
    }
}

/// `x.or(y)` — see [`AnchorSource::or`].
pub struct Or<X, Y>(X, Y);

#[async_trait]
impl<Q, A, X, Y> AnchorSource<Q, A> for Or<X, Y>
where
    Q: Send + Sync,
    A: Clone + Send + Sync,
    X: AnchorSource<Q, A>,
    Y: AnchorSource<Q, A>,
{
    async fn get(&self, query: &Q) -> Option<NonEmpty<A>> {
        match self.0.get(query).await {
            Some(anchors) => Some(anchors),
            None => self.1.get(query).await,
        }
    }
}

/// `x.contra_map(h)` — see [`AnchorSource::contra_map`].
pub struct ContraMap<S, H, Q> {
    source: S,
    map: H,
    _q: PhantomData<Q>,
}

#[async_trait]
impl<Q2, Q, A, S, H> AnchorSource<Q2, A> for ContraMap<S, H, Q>
where
    Q2: Send + Sync,
    Q: Send + Sync,
    A: Clone + Send + Sync,
    S: AnchorSource<Q, A>,
    H: Fn(&Q2) -> Q + Send + Sync,
{
    async fn get(&self, query: &Q2) -> Option<NonEmpty<A>> {
        let mapped = (self.map)(query);
        self.source.get(&mapped).await
    }
}

/// `x.cached(ttl, capacity)` — see [`AnchorSource::cached`].
pub struct Cached<S, Q, A> {
    source: Arc<S>,
    cache: Arc<AsyncCache<Q, Option<NonEmpty<A>>, Infallible>>,
}

impl<S, Q, A> Clone for Cached<S, Q, A> {
    fn clone(&self) -> Self {
        Cached {
            source: self.source.clone(),
            cache: self.cache.clone(),
        }
    }
}

#[async_trait]
impl<Q, A, S> AnchorSource<Q, A> for Cached<S, Q, A>
where
    Q: Eq + std::hash::Hash + Clone + Ord + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    S: AnchorSource<Q, A> + 'static,
{
    async fn get(&self, query: &Q) -> Option<NonEmpty<A>> {
        let source = self.source.clone();
        let result = self
            .cache
            .get(query.clone(), move |q| {
                let source = source.clone();
                async move { Ok::<_, Infallible>(source.get(&q).await) }
            })
            .await;
        match result {
            Ok(anchors) => anchors,
            Err(never) => match never {},
        }
    }
}

#[async_trait]
impl<Q, A> AnchorSource<Q, A> for Arc<dyn AnchorSource<Q, A> + Send + Sync>
where
    Q: Send + Sync,
    A: Clone + Send + Sync,
{
    async fn get(&self, query: &Q) -> Option<NonEmpty<A>> {
        (**self).get(query).await
    }
}

/// An [`AnchorSource`] built directly from an async closure, for tests and
/// for callers who don't need the full combinator machinery.
pub struct FnAnchorSource<Q, A, F> {
    f: F,
    _marker: PhantomData<fn(&Q) -> A>,
}

impl<Q, A, F, Fut> FnAnchorSource<Q, A, F>
where
    F: Fn(&Q) -> Fut + Send + Sync,
    Fut: Future<Output = Option<NonEmpty<A>>> + Send,
{
    pub fn new(f: F) -> Self {
        FnAnchorSource {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<Q, A, F, Fut> AnchorSource<Q, A> for FnAnchorSource<Q, A, F>
where
    Q: Send + Sync,
    A: Clone + Send + Sync,
    F: Fn(&Q) -> Fut + Send + Sync,
    Fut: Future<Output = Option<NonEmpty<A>>> + Send,
{
    async fn get(&self, query: &Q) -> Option<NonEmpty<A>> {
        (self.f)(query).await
    }
}
