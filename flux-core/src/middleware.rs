use std::future::Future;
use std::sync::Arc;

use crate::api::Api;
use crate::context::{BoxFuture, Context};
use crate::operation::Operation;

/// Request-scoped state threaded through the middleware chain into the
/// dispatcher.
///
/// Carries the HTTP context together with the host [`Api`] handle and
/// the matched operation, so middleware and the dispatcher never need a
/// string-keyed context lookup to reach them.
pub struct Exchange {
    /// The underlying HTTP context.
    pub ctx: Box<dyn Context>,
    api: Api,
    operation: Arc<Operation>,
}

impl Exchange {
    pub(crate) fn new(ctx: Box<dyn Context>, api: Api, operation: Arc<Operation>) -> Self {
        Self { ctx, api, operation }
    }

    /// The host API this request is served by.
    pub fn api(&self) -> &Api {
        &self.api
    }

    /// The operation matched for this request.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Recover the HTTP context after dispatch.
    pub fn into_context(self) -> Box<dyn Context> {
        self.ctx
    }
}

type MiddlewareFn = dyn Fn(Exchange, Next) -> BoxFuture<'static, Exchange> + Send + Sync;

struct MiddlewareInner {
    name: &'static str,
    func: Box<MiddlewareFn>,
}

/// One link of an operation's middleware chain.
///
/// Middleware wrap the dispatcher: they run in list order on the way in
/// and unwind in reverse order, and short-circuit by returning without
/// calling [`Next::run`]. Identity (used for deduplication) is fixed at
/// construction — clones share it, a new `Middleware::new` never does.
#[derive(Clone)]
pub struct Middleware(Arc<MiddlewareInner>);

impl Middleware {
    /// Wrap a `fn(exchange, next)` closure.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let timing = Middleware::new("timing", |ex, next| async move {
    ///     let started = Instant::now();
    ///     let ex = next.run(ex).await;
    ///     tracing::debug!(elapsed = ?started.elapsed(), "request served");
    ///     ex
    /// });
    /// ```
    pub fn new<F, Fut>(name: &'static str, func: F) -> Self
    where
        F: Fn(Exchange, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Exchange> + Send + 'static,
    {
        Self(Arc::new(MiddlewareInner {
            name,
            func: Box::new(move |ex, next| Box::pin(func(ex, next))),
        }))
    }

    /// The diagnostic name given at construction.
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// Whether two handles share one identity.
    pub fn same_identity(&self, other: &Middleware) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn call(&self, ex: Exchange, next: Next) -> BoxFuture<'static, Exchange> {
        (self.0.func)(ex, next)
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Middleware({})", self.0.name)
    }
}

/// Collapse duplicate middleware (same identity), keeping the earliest
/// position of each.
pub(crate) fn dedup(list: &mut Vec<Middleware>) {
    let mut seen: Vec<Middleware> = Vec::with_capacity(list.len());
    list.retain(|mw| {
        if seen.iter().any(|kept| kept.same_identity(mw)) {
            false
        } else {
            seen.push(mw.clone());
            true
        }
    });
}

/// The endpoint a middleware chain terminates in — the compiled
/// dispatcher for one operation.
pub(crate) type Endpoint = dyn Fn(Exchange) -> BoxFuture<'static, Exchange> + Send + Sync;

/// The remainder of the middleware chain.
///
/// Calling [`run`](Next::run) advances to the next middleware and
/// finally the dispatcher; dropping it without running short-circuits
/// the request.
pub struct Next {
    chain: Arc<[Middleware]>,
    index: usize,
    endpoint: Arc<Endpoint>,
}

impl Next {
    pub(crate) fn new(chain: Arc<[Middleware]>, endpoint: Arc<Endpoint>) -> Self {
        Self {
            chain,
            index: 0,
            endpoint,
        }
    }

    /// Advance the chain.
    pub fn run(mut self, ex: Exchange) -> BoxFuture<'static, Exchange> {
        if self.index < self.chain.len() {
            let mw = self.chain[self.index].clone();
            self.index += 1;
            mw.call(ex, self)
        } else {
            (*self.endpoint)(ex)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &'static str) -> Middleware {
        Middleware::new(name, |ex, next| next.run(ex))
    }

    #[test]
    fn clones_share_identity() {
        let mw = noop("a");
        let clone = mw.clone();
        assert!(mw.same_identity(&clone));
    }

    #[test]
    fn distinct_constructions_differ() {
        assert!(!noop("a").same_identity(&noop("a")));
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let a = noop("a");
        let b = noop("b");
        let mut chain = vec![a.clone(), b.clone(), a.clone(), b.clone(), a.clone()];
        dedup(&mut chain);
        assert_eq!(chain.len(), 2);
        assert!(chain[0].same_identity(&a));
        assert!(chain[1].same_identity(&b));
    }

    #[test]
    fn dedup_of_duplicate_pair_matches_single() {
        let m = noop("m");
        let mut twice = vec![m.clone(), m.clone()];
        let mut once = vec![m.clone()];
        dedup(&mut twice);
        dedup(&mut once);
        assert_eq!(twice.len(), once.len());
        assert!(twice[0].same_identity(&once[0]));
    }
}
