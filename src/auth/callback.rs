//! Local HTTP listener receiving the OAuth redirect.
//!
//! Every accepted connection is served by hyper in its own task, so a browser
//! preconnect or a stalled client cannot hold up the real redirect. The first
//! request that hits `/callback` settles the flow, which moves through
//! `Waiting -> Received -> {Exchanged | Rejected}`. [`CallbackServer::run`]
//! consumes the server, so the sockets are released however the flow ends.

use super::oauth::{CodeExchanger, TokenResponse};
use crate::core::AsanaError;
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::future::select_all;
use http::{Request, Response, StatusCode, header};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use reqwest::Url;
use std::convert::Infallible;
use std::fmt::Display;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const CALLBACK_PATH: &str = "/callback";

const SUCCESS_PAGE: &str =
    "<h1>Authentication Successful!</h1><p>You can close this window and return to the terminal.</p>";
const FAILED_PAGE: &str = "<h1>Authentication Failed</h1><p>You can close this window.</p>";
const INVALID_PAGE: &str = "<h1>Invalid Request</h1><p>You can close this window.</p>";
const EXCHANGE_FAILED_PAGE: &str = "<h1>Token Exchange Failed</h1><p>You can close this window.</p>";
const SETTLED_PAGE: &str = "<h1>Request Ignored</h1><p>Authentication has already finished.</p>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackState {
    Waiting,
    Received {
        code: String,
    },
    Exchanged,
    Rejected {
        reason: String,
    },
}

/// Classify a request target (`/callback?code=..&state=..`).
///
/// Anything outside the callback path leaves the flow `Waiting`.
pub fn inspect_request(target: &str, expected_state: &str) -> CallbackState {
    let Ok(url) = Url::parse(&format!("http://localhost{target}")) else {
        return CallbackState::Waiting;
    };
    if url.path() != CALLBACK_PATH {
        return CallbackState::Waiting;
    }

    let param = |key: &str| {
        url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned()).unwrap_or_default()
    };

    let error = param("error");
    if !error.is_empty() {
        return CallbackState::Rejected {
            reason: format!("OAuth error: {error}"),
        };
    }

    let code = param("code");
    if code.is_empty() || param("state") != expected_state {
        return CallbackState::Rejected {
            reason: "Invalid OAuth callback".to_string(),
        };
    }

    CallbackState::Received {
        code,
    }
}

/// A `/callback` request handed from its connection task to the flow, which
/// answers with the page to render.
struct CallbackHit {
    next: CallbackState,
    reply: oneshot::Sender<(StatusCode, &'static str)>,
}

pub struct CallbackServer {
    listeners: Vec<TcpListener>,
    expected_state: String,
    state: CallbackState,
}

impl CallbackServer {
    /// Listen on a single address.
    pub async fn bind(addr: &str, expected_state: impl Into<String>) -> Result<Self> {
        let listener = listen(addr).await?;
        Ok(Self::with_listeners(vec![listener], expected_state.into()))
    }

    /// Listen on `127.0.0.1` and `::1` with the same port, so a redirect to
    /// `localhost` arrives whichever address family it resolves to.
    ///
    /// Port `0` picks a free IPv4 port and reuses it for IPv6. Hosts without
    /// IPv6 loopback fall back to IPv4 only.
    pub async fn bind_loopback(port: u16, expected_state: impl Into<String>) -> Result<Self> {
        let v4 = listen(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await?;
        let port = v4.local_addr().map(|addr| addr.port()).unwrap_or(port);

        let mut listeners = vec![v4];
        match TcpListener::bind(SocketAddr::from((Ipv6Addr::LOCALHOST, port))).await {
            Ok(v6) => listeners.push(v6),
            Err(e) => debug!("IPv6 loopback unavailable for the OAuth callback: {e}"),
        }

        Ok(Self::with_listeners(listeners, expected_state.into()))
    }

    fn with_listeners(listeners: Vec<TcpListener>, expected_state: String) -> Self {
        Self {
            listeners,
            expected_state,
            state: CallbackState::Waiting,
        }
    }

    /// The first bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listeners
            .first()
            .context("Callback server has no listener")?
            .local_addr()
            .context("Callback listener has no local address")
    }

    pub fn local_addrs(&self) -> Result<Vec<SocketAddr>> {
        self.listeners
            .iter()
            .map(|listener| listener.local_addr().context("Callback listener has no local address"))
            .collect()
    }

    fn transition(&mut self, next: CallbackState) {
        debug!("OAuth callback state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Serve until the callback arrives or `timeout` elapses.
    pub async fn run<E: CodeExchanger>(
        mut self,
        exchanger: &E,
        timeout: Duration,
    ) -> Result<TokenResponse> {
        match tokio::time::timeout(timeout, self.serve(exchanger)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("OAuth callback timed out after {}s", timeout.as_secs());
                Err(AsanaError::OAuth {
                    message: "Timed out waiting for the browser to complete authentication"
                        .to_string(),
                }
                .into())
            }
        }
    }

    async fn serve<E: CodeExchanger>(&mut self, exchanger: &E) -> Result<TokenResponse> {
        let (hits_tx, mut hits) = mpsc::channel::<CallbackHit>(8);

        let hit = loop {
            tokio::select! {
                accepted = accept_any(&self.listeners) => {
                    let (stream, peer) = accepted.context("Failed to accept OAuth callback")?;
                    debug!("Callback connection from {peer}");
                    spawn_connection(stream, self.expected_state.clone(), hits_tx.clone());
                }
                Some(hit) = hits.recv() => break hit,
            }
        };

        self.settle(hit, exchanger).await
    }

    /// Resolve the flow from the first `/callback` request and answer it.
    async fn settle<E: CodeExchanger>(
        &mut self,
        hit: CallbackHit,
        exchanger: &E,
    ) -> Result<TokenResponse> {
        let CallbackHit {
            next,
            reply,
        } = hit;
        self.transition(next.clone());

        let (result, status, body) = match next {
            CallbackState::Rejected {
                reason,
            } => {
                info!("OAuth callback rejected: {reason}");
                let body = if reason.starts_with("OAuth error") {
                    FAILED_PAGE
                } else {
                    INVALID_PAGE
                };
                let err = AsanaError::OAuth {
                    message: reason,
                };
                (Err(err.into()), StatusCode::BAD_REQUEST, body)
            }
            CallbackState::Received {
                code,
            } => {
                info!("OAuth callback received, exchanging code");
                match exchanger.exchange(&code).await {
                    Ok(token) => {
                        self.transition(CallbackState::Exchanged);
                        info!("OAuth code exchanged");
                        (Ok(token), StatusCode::OK, SUCCESS_PAGE)
                    }
                    Err(e) => {
                        self.transition(CallbackState::Rejected {
                            reason: e.to_string(),
                        });
                        (Err(e), StatusCode::INTERNAL_SERVER_ERROR, EXCHANGE_FAILED_PAGE)
                    }
                }
            }
            CallbackState::Waiting | CallbackState::Exchanged => {
                let err = AsanaError::OAuth {
                    message: "Invalid OAuth callback".to_string(),
                };
                (Err(err.into()), StatusCode::BAD_REQUEST, INVALID_PAGE)
            }
        };

        if reply.send((status, body)).is_err() {
            debug!("Browser disconnected before the callback response was sent");
        }
        result
    }
}

async fn listen<A: ToSocketAddrs + Display>(addr: A) -> Result<TcpListener> {
    let listener = TcpListener::bind(&addr).await.map_err(|e| AsanaError::OAuth {
        message: format!("Failed to start local server: {e}"),
    })?;
    debug!("OAuth callback listener on {addr}");
    Ok(listener)
}

async fn accept_any(listeners: &[TcpListener]) -> std::io::Result<(TcpStream, SocketAddr)> {
    let (accepted, _, _) = select_all(listeners.iter().map(|listener| Box::pin(listener.accept()))).await;
    accepted
}

fn spawn_connection(stream: TcpStream, expected_state: String, hits: mpsc::Sender<CallbackHit>) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let svc = service_fn(move |req: Request<Incoming>| {
            let target = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
            let next = inspect_request(target, &expected_state);
            let hits = hits.clone();
            async move { Ok::<_, Infallible>(answer(next, hits).await) }
        });

        if let Err(e) = http1::Builder::new().keep_alive(false).serve_connection(io, svc).await {
            debug!("Callback connection closed: {e}");
        }
    });
}

async fn answer(next: CallbackState, hits: mpsc::Sender<CallbackHit>) -> Response<Full<Bytes>> {
    if next == CallbackState::Waiting {
        return page(StatusCode::NOT_FOUND, "");
    }

    let (reply, outcome) = oneshot::channel();
    let hit = CallbackHit {
        next,
        reply,
    };
    if hits.send(hit).await.is_err() {
        return page(StatusCode::CONFLICT, SETTLED_PAGE);
    }

    match outcome.await {
        Ok((status, body)) => page(status, body),
        Err(_) => page(StatusCode::CONFLICT, SETTLED_PAGE),
    }
}

fn page(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap_or_default()
}
