//! Bounded, cycle-safe traversal of a LoTE and the lists it points to.
//!
//! [`RecursiveLoader::load`] returns a lazy event stream: the traversal only
//! advances as the consumer polls, and dropping the stream stops it
//! (sends start failing is how a dropped receiver is noticed).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use url::Url;

use lote_trust_types::LoteDocument;

/// Construction-time failures for [`LoaderParams`].
#[derive(Debug, thiserror::Error)]
pub enum LoaderConfigError {
    #[error("max_depth must be at least 1")]
    ZeroMaxDepth,
    #[error("max_lists must be at least 1")]
    ZeroMaxLists,
    #[error("sibling_parallelism must be at least 1")]
    ZeroSiblingParallelism,
}

/// Traversal bounds, validated eagerly at construction.
#[derive(Debug, Clone, Copy)]
pub struct LoaderParams {
    pub max_depth: u32,
    pub max_lists: usize,
    pub sibling_parallelism: usize,
}

impl LoaderParams {
    pub fn validate(self) -> Result<Self, LoaderConfigError> {
        if self.max_depth < 1 {
            return Err(LoaderConfigError::ZeroMaxDepth);
        }
        if self.max_lists < 1 {
            return Err(LoaderConfigError::ZeroMaxLists);
        }
        if self.sibling_parallelism < 1 {
            return Err(LoaderConfigError::ZeroSiblingParallelism);
        }
        Ok(self)
    }
}

/// A traversal-bound or per-branch failure, carried as a stream item rather
/// than an error: it never aborts the rest of the traversal.
#[derive(Debug, Clone)]
pub enum LoadProblem<E> {
    MaxDepthReached(Url, u32),
    MaxListsReached(Url, usize),
    CircularReferenceDetected(Url),
    Error(Url, E),
}

/// One event in a [`RecursiveLoader::load`] stream.
#[derive(Debug)]
pub enum LoadEvent<L, E> {
    /// The root document. Emitted at most once, before anything else from
    /// its subtree.
    Primary(Arc<L>, Url),
    /// A successfully loaded referenced list, `depth >= 1`.
    Other(Arc<L>, Url, u32),
    /// A bound was hit, or a fetch failed.
    Problem(LoadProblem<E>),
}

/// The path from the root to the current node, as an immutable, `Arc`-linked
/// cons-list.
///
/// This is a *path* set, not a *seen* set: the same URI reached through two
/// sibling branches is visited twice, each getting its own fetch. This
/// matches the traversal this loader is modelled on, and is deliberate (see
/// the module-level open question below) — do not change this to a
/// globally-shared "seen" set.
///
/// Threading the path by value means "leaving" a node on return needs no
/// explicit code: the extended path simply goes out of scope.
#[derive(Clone)]
struct VisitPath(Option<Arc<VisitNode>>);

struct VisitNode {
    uri: Url,
    parent: Option<Arc<VisitNode>>,
}

impl VisitPath {
    fn root() -> Self {
        VisitPath(None)
    }

    fn contains(&self, uri: &Url) -> bool {
        let mut cursor = &self.0;
        while let Some(node) = cursor {
            if &node.uri == uri {
                return true;
            }
            cursor = &node.parent;
        }
        false
    }

    fn push(&self, uri: Url) -> Self {
        VisitPath(Some(Arc::new(VisitNode {
            uri,
            parent: self.0.clone(),
        })))
    }
}

/// A bounded, cycle-safe, sibling-parallel traversal of a LoTE document
/// graph, parameterized over the injected document fetcher.
///
/// `whether the same URI reachable via two sibling branches should be
/// fetched once or twice` is left unresolved upstream; this loader preserves
/// double-fetching (see [`VisitPath`]) rather than silently switching to a
/// dedup'd "seen" set.
pub struct RecursiveLoader<F> {
    fetch: F,
    params: LoaderParams,
}

impl<F, Fut, L, E> RecursiveLoader<F>
where
    F: Fn(Url) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<L, E>> + Send + 'static,
    L: LoteDocument + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(fetch: F, params: LoaderParams) -> Result<Self, LoaderConfigError> {
        Ok(RecursiveLoader {
            fetch,
            params: params.validate()?,
        })
    }

    /// Starts a traversal rooted at `start`. The returned stream drives the
    /// traversal lazily as it's polled; dropping it cancels in-flight work
    /// on a best-effort basis (further `tx.send`s simply fail and stop that
    /// branch).
    pub fn load(&self, start: Url) -> impl Stream<Item = LoadEvent<L, E>> {
        self.load_with_cancellation(start, CancellationToken::new())
    }

    /// Like [`RecursiveLoader::load`], but cancellable: cancelling `token`
    /// stops new fetches from starting and races any in-flight fetch, per
    /// the core's cancellation contract (propagate promptly, keep events
    /// already emitted valid).
    pub fn load_with_cancellation(
        &self,
        start: Url,
        token: CancellationToken,
    ) -> impl Stream<Item = LoadEvent<L, E>> {
        let (tx, rx) = mpsc::channel(32);
        let fetch = self.fetch.clone();
        let params = self.params;
        let loaded_count = Arc::new(AtomicUsize::new(0));

        tokio::spawn(step(
            fetch,
            params,
            tx,
            loaded_count,
            start,
            0,
            VisitPath::root(),
            token,
        ));

        ReceiverStream::new(rx)
    }
}

fn step<F, Fut, L, E>(
    fetch: F,
    params: LoaderParams,
    tx: mpsc::Sender<LoadEvent<L, E>>,
    loaded_count: Arc<AtomicUsize>,
    uri: Url,
    depth: u32,
    visiting: VisitPath,
    cancel: CancellationToken,
) -> BoxFuture<'static, ()>
where
    F: Fn(Url) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<L, E>> + Send + 'static,
    L: LoteDocument + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    Box::pin(async move {
        if cancel.is_cancelled() {
            return;
        }

        if depth > params.max_depth {
            tracing::debug!(%uri, max_depth = params.max_depth, "max depth reached");
            let _ = tx
                .send(LoadEvent::Problem(LoadProblem::MaxDepthReached(uri, params.max_depth)))
                .await;
            return;
        }
        if loaded_count.load(Ordering::SeqCst) >= params.max_lists {
            tracing::debug!(%uri, max_lists = params.max_lists, "max lists reached");
            let _ = tx
                .send(LoadEvent::Problem(LoadProblem::MaxListsReached(uri, params.max_lists)))
                .await;
            return;
        }
        if visiting.contains(&uri) {
            tracing::debug!(%uri, "circular reference detected");
            let _ = tx
                .send(LoadEvent::Problem(LoadProblem::CircularReferenceDetected(uri)))
                .await;
            return;
        }

        let visiting = visiting.push(uri.clone());

        let fetch_result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = fetch(uri.clone()) => result,
        };

        let lote = match fetch_result {
            Ok(lote) => lote,
            Err(cause) => {
                tracing::warn!(%uri, "fetch failed");
                let _ = tx.send(LoadEvent::Problem(LoadProblem::Error(uri, cause))).await;
                return;
            }
        };

        loaded_count.fetch_add(1, Ordering::SeqCst);
        let lote = Arc::new(lote);

        let event = if depth == 0 {
            LoadEvent::Primary(lote.clone(), uri.clone())
        } else {
            LoadEvent::Other(lote.clone(), uri.clone(), depth)
        };
        if tx.send(event).await.is_err() {
            return;
        }

        let pointers: Vec<Url> = lote
            .pointers_to_other()
            .iter()
            .map(|pointer| pointer.location.clone())
            .collect();

        for chunk in pointers.chunks(params.sibling_parallelism.max(1)) {
            if cancel.is_cancelled() {
                return;
            }
            let mut siblings = JoinSet::new();
            for pointer_uri in chunk.iter().cloned() {
                siblings.spawn(step(
                    fetch.clone(),
                    params,
                    tx.clone(),
                    loaded_count.clone(),
                    pointer_uri,
                    depth + 1,
                    visiting.clone(),
                    cancel.clone(),
                ));
            }
            while siblings.join_next().await.is_some() {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lote_trust_types::InMemoryLote;
    use std::collections::HashMap;
    use tokio_stream::StreamExt;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn fetcher(
        graph: HashMap<Url, InMemoryLote>,
    ) -> impl Fn(Url) -> futures::future::BoxFuture<'static, Result<InMemoryLote, String>> + Clone {
        let graph = Arc::new(graph);
        move |u: Url| {
            let graph = graph.clone();
            Box::pin(async move {
                graph
                    .get(&u)
                    .cloned()
                    .ok_or_else(|| format!("no such document: {u}"))
            })
        }
    }

    #[tokio::test]
    async fn cycle_and_child_error_scenario() {
        let a = uri("https://ex.org/a");
        let b = uri("https://ex.org/b");
        let c = uri("https://ex.org/c");

        let mut graph = HashMap::new();
        graph.insert(
            a.clone(),
            InMemoryLote::new("root").with_pointer(b.clone()).with_pointer(c.clone()),
        );
        graph.insert(b.clone(), InMemoryLote::new("b").with_pointer(a.clone()));
        // c is deliberately absent so fetch(c) fails.

        let loader = RecursiveLoader::new(
            fetcher(graph),
            LoaderParams {
                max_depth: 3,
                max_lists: 10,
                sibling_parallelism: 2,
            },
        )
        .unwrap();

        let events: Vec<_> = loader.load(a.clone()).collect().await;

        assert!(matches!(&events[0], LoadEvent::Primary(_, u) if *u == a));
        assert!(events
            .iter()
            .any(|e| matches!(e, LoadEvent::Other(_, u, 1) if *u == b)));
        assert!(events
            .iter()
            .any(|e| matches!(e, LoadEvent::Problem(LoadProblem::CircularReferenceDetected(u)) if *u == a)));
        assert!(events
            .iter()
            .any(|e| matches!(e, LoadEvent::Problem(LoadProblem::Error(u, _)) if *u == c)));
    }

    #[tokio::test]
    async fn depth_cutoff_scenario() {
        let a = uri("https://ex.org/a");
        let b = uri("https://ex.org/b");
        let c = uri("https://ex.org/c");

        let mut graph = HashMap::new();
        graph.insert(a.clone(), InMemoryLote::new("a").with_pointer(b.clone()));
        graph.insert(b.clone(), InMemoryLote::new("b").with_pointer(c.clone()));
        graph.insert(c.clone(), InMemoryLote::new("c"));

        let loader = RecursiveLoader::new(
            fetcher(graph),
            LoaderParams {
                max_depth: 1,
                max_lists: 10,
                sibling_parallelism: 2,
            },
        )
        .unwrap();

        let events: Vec<_> = loader.load(a.clone()).collect().await;

        assert!(matches!(&events[0], LoadEvent::Primary(_, u) if *u == a));
        assert!(events
            .iter()
            .any(|e| matches!(e, LoadEvent::Other(_, u, 1) if *u == b)));
        assert!(events
            .iter()
            .any(|e| matches!(e, LoadEvent::Problem(LoadProblem::MaxDepthReached(u, 1)) if *u == c)));
        assert!(!events
            .iter()
            .any(|e| matches!(e, LoadEvent::Other(_, u, _) if *u == c)));
    }

    #[tokio::test]
    async fn self_referential_root_yields_one_primary_and_one_cycle_problem() {
        let a = uri("https://ex.org/a");
        let mut graph = HashMap::new();
        graph.insert(a.clone(), InMemoryLote::new("a").with_pointer(a.clone()));

        let loader = RecursiveLoader::new(
            fetcher(graph),
            LoaderParams {
                max_depth: 5,
                max_lists: 5,
                sibling_parallelism: 1,
            },
        )
        .unwrap();

        let events: Vec<_> = loader.load(a.clone()).collect().await;

        let primaries = events
            .iter()
            .filter(|e| matches!(e, LoadEvent::Primary(_, _)))
            .count();
        let cycles = events
            .iter()
            .filter(|e| matches!(e, LoadEvent::Problem(LoadProblem::CircularReferenceDetected(_))))
            .count();
        assert_eq!(primaries, 1);
        assert_eq!(cycles, 1);
    }

    #[tokio::test]
    async fn max_lists_reached_stops_further_loading() {
        let a = uri("https://ex.org/a");
        let b = uri("https://ex.org/b");
        let c = uri("https://ex.org/c");

        let mut graph = HashMap::new();
        graph.insert(a.clone(), InMemoryLote::new("a").with_pointer(b.clone()));
        graph.insert(b.clone(), InMemoryLote::new("b").with_pointer(c.clone()));
        graph.insert(c.clone(), InMemoryLote::new("c"));

        let loader = RecursiveLoader::new(
            fetcher(graph),
            LoaderParams {
                max_depth: 10,
                max_lists: 1,
                sibling_parallelism: 1,
            },
        )
        .unwrap();

        let events: Vec<_> = loader.load(a.clone()).collect().await;

        assert!(events
            .iter()
            .any(|e| matches!(e, LoadEvent::Problem(LoadProblem::MaxListsReached(u, 1)) if *u == b)));
    }

    #[test]
    fn rejects_non_positive_parameters() {
        assert!(matches!(
            LoaderParams {
                max_depth: 0,
                max_lists: 1,
                sibling_parallelism: 1,
            }
            .validate(),
            Err(LoaderConfigError::ZeroMaxDepth)
        ));
        assert!(matches!(
            LoaderParams {
                max_depth: 1,
                max_lists: 0,
                sibling_parallelism: 1,
            }
            .validate(),
            Err(LoaderConfigError::ZeroMaxLists)
        ));
        assert!(matches!(
            LoaderParams {
                max_depth: 1,
                max_lists: 1,
                sibling_parallelism: 0,
            }
            .validate(),
            Err(LoaderConfigError::ZeroSiblingParallelism)
        ));
    }
}
