use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use http::header::{DATE, SERVER};
use micro_envelope::connection::{HttpConnection, ResponseHook};
use micro_envelope::envelope::Message;
use micro_envelope::handler::RequestHandler;
use micro_envelope::protocol::{HttpRequest, HttpResponse};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::date::DateService;
use crate::router::{DEFAULT_CACHE_CAPACITY, RouteError, Router};

const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;
const SERVER_NAME: &str = concat!("micro-route/", env!("CARGO_PKG_VERSION"));

type SharedHandler = Arc<dyn RequestHandler>;

pub struct ServerBuilder {
    address: Option<io::Result<Vec<SocketAddr>>>,
    routes: Vec<(String, SharedHandler)>,
    read_buffer_size: usize,
    cache_capacity: usize,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            address: None,
            routes: Vec::new(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    #[must_use]
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    /// Adds a route behind the ones already registered; the first matching route serves
    /// a request.
    #[must_use]
    pub fn route(mut self, template: impl Into<String>, handler: impl RequestHandler + 'static) -> Self {
        let handler: SharedHandler = Arc::new(handler);
        self.routes.push((template.into(), handler));
        self
    }

    /// Initial capacity of each connection's read buffer.
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// How many paths each route remembers the captures of; `0` disables the memo.
    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::InvalidAddress)?;
        if address.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }

        let mut router = Router::with_cache_capacity(self.cache_capacity);
        for (template, handler) in self.routes {
            router.route(&template, handler)?;
        }

        Ok(Server { router, address, read_buffer_size: self.read_buffer_size })
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let templates: Vec<&str> = self.routes.iter().map(|(template, _)| template.as_str()).collect();
        f.debug_struct("ServerBuilder")
            .field("address", &self.address)
            .field("routes", &templates)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] io::Error),
    #[error(transparent)]
    Route(#[from] RouteError),
}

/// Accepts connections and dispatches their requests through a [`Router`].
///
/// Requests no route matches get an empty `404 Not Found`. Every response carries `Server`
/// and `Date` headers unless the handler set them.
pub struct Server {
    router: Router<SharedHandler>,
    address: Vec<SocketAddr>,
    read_buffer_size: usize,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let templates: Vec<&str> = self.router.routes().iter().map(|route| route.matcher().template()).collect();
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("routes", &templates)
            .field("read_buffer_size", &self.read_buffer_size)
            .finish_non_exhaustive()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn address(&self) -> &[SocketAddr] {
        &self.address
    }

    /// Installs a console subscriber, binds the configured address and serves forever.
    pub async fn start(self) {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            warn!(cause = %e, "a global subscriber is already installed");
        }

        info!("start listening at {:?}", self.address);
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        self.serve(tcp_listener).await;
    }

    /// Serves connections accepted on an already bound listener.
    pub async fn serve(self, tcp_listener: TcpListener) {
        let read_buffer_size = self.read_buffer_size;
        let hook = response_hook();
        let handler = Arc::new(self);

        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };
            debug!(%remote_addr, "accepted connection");

            let handler = Arc::clone(&handler);
            let hook = Arc::clone(&hook);

            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::with_capacity(reader, writer, read_buffer_size).response_hook(hook);
                match connection.process(handler).await {
                    Ok(()) => {
                        info!("finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!("service has error, cause {}, connection shutdown", e);
                    }
                }
            });
        }
    }
}

impl RequestHandler for Server {
    fn handle(&self, request: HttpRequest) {
        let Some(dispatch) = self.router.dispatch(request.path()) else {
            let response = HttpResponse::not_found();
            response.content_length(0);
            request.reply(response.clone());
            response.complete();
            return;
        };

        let handler = dispatch.handler();
        request.set_path_params(dispatch.into_variables());
        handler.handle(request);
    }
}

fn response_hook() -> ResponseHook {
    Arc::new(|response: &HttpResponse| {
        if response.header_value(SERVER.as_str()).is_none() {
            response.header(SERVER.as_str(), SERVER_NAME);
        }
        if response.header_value(DATE.as_str()).is_none() {
            response.header(DATE.as_str(), DateService::global().http_date());
        }
    })
}
