//! Server configuration, the embedding surface, and the listener glue.
//!
//! A [`Server`] is configured and populated with handlers and hooks before
//! it runs; [`Server::run`] (or [`Server::serve`] with a pre-bound
//! listener) moves it behind an `Arc`, freezing the registration lists, and
//! then accepts connections and hands each one to a task produced by the
//! executor callback.
//!
//! The core imposes no request timeouts; embedders who need deadlines put
//! them on the socket or wrap handlers with `tokio::time::timeout`.

use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::Notify;
use tracing::{info, trace, warn};

use crate::connection::HttpConnection;
use crate::handler::{handler_fn, DecodeRequest, EncodeResponse, Handler, HandlerResult};
use crate::protocol::{HttpError, Method, Request, Response, StatusCode};
use crate::route::{AcceptFn, MatchOutcome, PathEntry, PathParams, PathPattern};

/// Spawns one connection task. The default is `tokio::spawn`.
pub type Executor = Arc<dyn Fn(Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync>;

/// The long-lived server value.
pub struct Server {
    address: Option<Vec<SocketAddr>>,
    executor: Executor,
    mask_sigpipe: bool,
    max_body_size: Option<usize>,
    fallback: Arc<dyn Handler>,
    routes: Vec<PathEntry>,
    decode_hooks: Vec<Box<dyn DecodeRequest>>,
    encode_hooks: Vec<Box<dyn EncodeResponse>>,
    stop: Arc<StopState>,
}

struct StopState {
    running: AtomicBool,
    notify: Notify,
}

/// A cheap handle for stopping a running server.
///
/// Stopping leaves in-flight requests alone; connection loops observe the
/// flag between requests.
#[derive(Clone)]
pub struct ServerHandle {
    stop: Arc<StopState>,
}

impl ServerHandle {
    pub fn stop(&self) {
        self.stop.running.store(false, Ordering::Relaxed);
        self.stop.notify.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.stop.running.load(Ordering::Relaxed)
    }
}

/// What handler selection produced for a request.
pub(crate) enum Selection {
    Handler(Arc<dyn Handler>),
    Reject { status: StatusCode, message: String },
}

pub struct ServerBuilder {
    address: Option<Vec<SocketAddr>>,
    executor: Executor,
    mask_sigpipe: bool,
    max_body_size: Option<usize>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            address: None,
            executor: Arc::new(|fut| {
                tokio::spawn(fut);
            }),
            mask_sigpipe: true,
            max_body_size: None,
        }
    }

    /// The address [`Server::run`] binds. Resolved eagerly.
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().unwrap().collect::<Vec<_>>());
        self
    }

    /// Replaces `tokio::spawn` as the way connection tasks are started.
    pub fn executor<F>(mut self, spawn: F) -> Self
    where
        F: Fn(Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static,
    {
        self.executor = Arc::new(spawn);
        self
    }

    /// Whether `SIGPIPE` is ignored at startup (default on), so a peer
    /// disconnect during a write surfaces as an ordinary I/O error.
    pub fn mask_sigpipe(mut self, mask: bool) -> Self {
        self.mask_sigpipe = mask;
        self
    }

    /// Caps materialised request bodies; larger bodies are answered with
    /// 413. Unlimited by default.
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = Some(limit);
        self
    }

    pub fn build(self) -> Server {
        Server {
            address: self.address,
            executor: self.executor,
            mask_sigpipe: self.mask_sigpipe,
            max_body_size: self.max_body_size,
            fallback: default_fallback(),
            routes: Vec::new(),
            decode_hooks: Vec::new(),
            encode_hooks: Vec::new(),
            stop: Arc::new(StopState { running: AtomicBool::new(true), notify: Notify::new() }),
        }
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Replaces the fallback handler used when no path entry matches.
    pub fn set_fallback(&mut self, handler: impl Handler + 'static) {
        self.fallback = Arc::new(handler);
    }

    /// Registers a path handler in full generality.
    ///
    /// Entries are scanned most-recently-registered-first. `accept` may
    /// refuse the request pre-body with a status; `build` turns the bound
    /// parameters into the per-request handler, or declines with `None`.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is malformed.
    pub fn add_path_handler<B>(&mut self, method: Option<Method>, pattern: &str, accept: Option<AcceptFn>, build: B)
    where
        B: Fn(&PathParams) -> Option<Arc<dyn Handler>> + Send + Sync + 'static,
    {
        let entry = PathEntry::new(method, PathPattern::parse(pattern), accept, Box::new(build));
        self.routes.insert(0, entry);
    }

    /// Registers an async function as a path handler.
    pub fn route<F, Fut>(&mut self, method: Option<Method>, pattern: &str, f: F)
    where
        F: Fn(PathParams, Request<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let f = Arc::new(f);
        self.add_path_handler(method, pattern, None, move |params: &PathParams| {
            Some(Arc::new(RouteFn { f: f.clone(), params: params.clone() }) as Arc<dyn Handler>)
        });
    }

    pub fn get<F, Fut>(&mut self, pattern: &str, f: F)
    where
        F: Fn(PathParams, Request<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(Some(Method::Get), pattern, f)
    }

    pub fn post<F, Fut>(&mut self, pattern: &str, f: F)
    where
        F: Fn(PathParams, Request<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(Some(Method::Post), pattern, f)
    }

    pub fn put<F, Fut>(&mut self, pattern: &str, f: F)
    where
        F: Fn(PathParams, Request<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(Some(Method::Put), pattern, f)
    }

    pub fn delete<F, Fut>(&mut self, pattern: &str, f: F)
    where
        F: Fn(PathParams, Request<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(Some(Method::Delete), pattern, f)
    }

    pub fn head<F, Fut>(&mut self, pattern: &str, f: F)
    where
        F: Fn(PathParams, Request<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(Some(Method::Head), pattern, f)
    }

    /// Adds a pre-body hook; see [`DecodeRequest`].
    pub fn add_decode_request(&mut self, hook: impl DecodeRequest + 'static) {
        self.decode_hooks.push(Box::new(hook));
    }

    /// Adds a post-handler hook; see [`EncodeResponse`].
    pub fn add_encode_response(&mut self, hook: impl EncodeResponse + 'static) {
        self.encode_hooks.push(Box::new(hook));
    }

    /// A handle that can stop this server later.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle { stop: self.stop.clone() }
    }

    /// Binds the configured address and serves until stopped.
    pub async fn run(self) -> Result<(), HttpError> {
        let address = self
            .address
            .clone()
            .ok_or_else(|| HttpError::Config { reason: "server address not configured".to_string() })?;
        let listener = TcpListener::bind(address.as_slice()).await?;
        self.serve(listener).await
    }

    /// Serves connections from a pre-bound listener until stopped.
    pub async fn serve(self, listener: TcpListener) -> Result<(), HttpError> {
        if self.mask_sigpipe {
            mask_sigpipe();
        }

        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "server listening");
        }

        let stop = self.stop.clone();
        let executor = self.executor.clone();
        let server = Arc::new(self);

        while stop.running.load(Ordering::Relaxed) {
            select! {
                _ = stop.notify.notified() => {
                    info!("stop requested, leaving the accept loop");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, remote)) => {
                            let server = server.clone();
                            (executor.as_ref())(Box::pin(async move {
                                let (reader, writer) = stream.into_split();
                                match HttpConnection::new(reader, writer).process(server).await {
                                    Ok(()) => trace!(%remote, "connection finished"),
                                    Err(e) => warn!(%remote, error = %e, "connection ended with an error"),
                                }
                            }));
                        }
                        Err(e) => warn!(cause = %e, "accept failed"),
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn is_running(&self) -> bool {
        self.stop.running.load(Ordering::Relaxed)
    }

    /// Scans the path entries in order; the first non-declining entry wins,
    /// the fallback catches the rest.
    pub(crate) fn select_handler(&self, request: &Request<()>) -> Selection {
        for entry in &self.routes {
            match entry.matches(request) {
                MatchOutcome::Decline => continue,
                MatchOutcome::Accept(handler) => return Selection::Handler(handler),
                MatchOutcome::Reject { status, message } => return Selection::Reject { status, message },
            }
        }
        Selection::Handler(self.fallback.clone())
    }

    pub(crate) fn decode_hooks(&self) -> &[Box<dyn DecodeRequest>] {
        &self.decode_hooks
    }

    pub(crate) fn encode_hooks(&self) -> &[Box<dyn EncodeResponse>] {
        &self.encode_hooks
    }

    pub(crate) fn max_body_size(&self) -> Option<usize> {
        self.max_body_size
    }
}

fn default_fallback() -> Arc<dyn Handler> {
    Arc::new(handler_fn(|request: Request<Bytes>| async move {
        Ok(Response::fail(StatusCode::NOT_FOUND, format!("no handler found for {}", request.target())))
    }))
}

fn mask_sigpipe() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

/// Adapts a `(params, request) -> response` async function to [`Handler`],
/// capturing the parameters bound at match time.
struct RouteFn<F> {
    f: Arc<F>,
    params: PathParams,
}

#[async_trait]
impl<F, Fut> Handler for RouteFn<F>
where
    F: Fn(PathParams, Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, request: Request<Bytes>) -> HandlerResult {
        (self.f)(self.params.clone(), request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Headers;

    fn get_request(path: &str) -> Request<()> {
        Request::new(Method::Get, path, Headers::new(), ())
    }

    #[test]
    fn most_recently_registered_entry_wins() {
        let mut server = Server::builder().build();
        server.get("/x", |_, _| async { Ok(Response::with_string("first")) });
        server.get("/x", |_, _| async { Ok(Response::with_string("second")) });

        // both entries match; the scan must pick the later registration
        let selection = server.select_handler(&get_request("/x"));
        let Selection::Handler(handler) = selection else {
            panic!("expected a handler");
        };

        let response = block_on(handler.handle(get_request("/x").with_body(Bytes::new()))).unwrap();
        assert_eq!(response.headers().get("Content-Length"), Some("6"));
    }

    #[test]
    fn method_mismatch_declines_to_the_fallback() {
        let mut server = Server::builder().build();
        server.post("/submit", |_, _| async { Ok(Response::with_string("posted")) });

        let selection = server.select_handler(&get_request("/submit"));
        let Selection::Handler(handler) = selection else {
            panic!("expected the fallback");
        };

        let response = block_on(handler.handle(get_request("/submit").with_body(Bytes::new()))).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn accept_predicates_can_reject_with_a_status() {
        let mut server = Server::builder().build();
        server.add_path_handler(
            None,
            "/guarded",
            Some(Box::new(|request: &Request<()>| {
                if request.headers().contains("Authorization") {
                    Ok(())
                } else {
                    Err((StatusCode::FORBIDDEN, "authorization required".to_string()))
                }
            })),
            |_params| {
                Some(Arc::new(handler_fn(|_| async { Ok(Response::with_string("in")) })) as Arc<dyn Handler>)
            },
        );

        match server.select_handler(&get_request("/guarded")) {
            Selection::Reject { status, message } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(message, "authorization required");
            }
            Selection::Handler(_) => panic!("expected a rejection"),
        }
    }

    #[test]
    fn stop_handle_flips_the_running_flag() {
        let server = Server::builder().build();
        let handle = server.handle();

        assert!(server.is_running());
        handle.stop();
        assert!(!server.is_running());
        assert!(!handle.is_running());
    }

    /// Minimal executor for resolving handler futures in sync tests; the
    /// handlers above never actually suspend.
    fn block_on<F: Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(fut)
    }
}
