use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::CONNECTION;
use http::{Response, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::envelope::{Message, Payload, WriteCallback};
use crate::file::{AsyncFile, OpenOptions};
use crate::handler::RequestHandler;
use crate::protocol::{
    Frame, HttpError, HttpRequest, HttpResponse, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError,
};

const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Invoked on every response right before its head is encoded.
pub type ResponseHook = Arc<dyn Fn(&HttpResponse) + Send + Sync>;

type OutFrame = Frame<(ResponseHead, PayloadSize), Bytes>;

/// What the reply side of an exchange hands to the connection.
///
/// Every item carries the sequence number of the reply it belongs to, so items of a
/// superseded reply never reach the wire of the committed one.
enum Outbound {
    Head(u64, HttpResponse),
    Data(u64, Bytes, Option<WriteCallback>),
    File(u64, PathBuf, Option<WriteCallback>),
    End(u64),
}

impl Outbound {
    fn reply_id(&self) -> u64 {
        match self {
            Outbound::Head(id, _) | Outbound::Data(id, ..) | Outbound::File(id, ..) | Outbound::End(id) => *id,
        }
    }
}

enum FileChunk {
    Data(Bytes),
    Done,
    Failed(io::Error),
}

/// Drives one client connection: decode a request, dispatch it, stream its body into the
/// request envelope, write the reply, repeat while the connection is kept alive.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    response_hook: Option<ResponseHook>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_capacity(reader, writer, DEFAULT_READ_BUFFER_SIZE)
    }

    pub fn with_capacity(reader: R, writer: W, read_buffer_size: usize) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), read_buffer_size),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            response_hook: None,
        }
    }

    /// Sets a hook run on every response before it goes out, e.g. to stamp `Date`/`Server`.
    #[must_use]
    pub fn response_hook(mut self, hook: ResponseHook) -> Self {
        self.response_hook = Some(hook);
        self
    }

    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: RequestHandler + ?Sized,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Frame::Header((header, _payload_size)))) => {
                    if !self.do_process(header, &*handler).await? {
                        debug!("connection not kept alive, closing");
                        return Ok(());
                    }
                }

                Some(Ok(Frame::Payload(_))) => {
                    error!("error status because payload received outside a request");
                    self.send_error(StatusCode::BAD_REQUEST).await?;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) if is_peer_gone(&e) => {
                    debug!(cause = %e, "peer went away");
                    return Ok(());
                }

                Some(Err(e)) => {
                    error!(cause = %e, "can't receive next request");
                    let status = match e {
                        ParseError::UnsupportedTransferEncoding { .. } => StatusCode::NOT_IMPLEMENTED,
                        _ => StatusCode::BAD_REQUEST,
                    };
                    self.send_error(status).await?;
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    /// Runs one exchange; returns whether the connection stays open.
    async fn do_process<H>(&mut self, header: RequestHeader, handler: &H) -> Result<bool, HttpError>
    where
        H: RequestHandler + ?Sized,
    {
        let request = HttpRequest::from(header);
        let keep_alive = request.keep_alive();

        if request.expects_continue() {
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
            writer.flush().await.map_err(SendError::io)?;
            info!("receive expect request header, sent continue response");
        }

        let (sender, mut receiver) = mpsc::unbounded_channel();
        install_reply_listener(&request, sender);

        handler.handle(request.clone());

        loop {
            match self.framed_read.next().await {
                Some(Ok(Frame::Payload(PayloadItem::Chunk(bytes)))) => request.envelope().deliver(bytes),
                Some(Ok(Frame::Payload(PayloadItem::Eof))) => break,
                Some(Ok(Frame::Header(_))) => {
                    return Err(ParseError::invalid_body("receive a request head while reading the body").into());
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(ParseError::io(io::Error::from(io::ErrorKind::UnexpectedEof)).into());
                }
            }
        }
        request.complete();
        // the handler may still hold the request; once every clone is gone the reply channel closes
        drop(request);

        self.send_reply(&mut receiver, keep_alive).await?;
        Ok(keep_alive)
    }

    async fn send_reply(&mut self, receiver: &mut UnboundedReceiver<Outbound>, keep_alive: bool) -> Result<(), HttpError> {
        let (reply_id, response) = loop {
            match receiver.recv().await {
                Some(Outbound::Head(id, response)) => break (id, response),
                Some(_) => warn!("dropping response payload received before its head"),
                None => {
                    error!("request dropped without a reply");
                    return self.send_error(StatusCode::INTERNAL_SERVER_ERROR).await;
                }
            }
        };

        if let Some(hook) = &self.response_hook {
            hook(&response);
        }
        if !keep_alive {
            response.header(CONNECTION.as_str(), "close");
        }

        let payload_size = match response.declared_length() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        };
        debug!(status = %response.status(), ?payload_size, "sending response");

        let head: OutFrame = Frame::Header((response.to_head(), payload_size));
        if payload_size.is_empty() {
            self.framed_write.send(head).await?;
        } else {
            self.framed_write.feed(head).await?;
        }

        loop {
            let item = receiver.recv().await;
            if let Some(item) = &item {
                if item.reply_id() != reply_id {
                    debug!(reply_id = item.reply_id(), committed = reply_id, "dropping item of a superseded reply");
                    continue;
                }
            }

            match item {
                Some(Outbound::Data(_, bytes, on_complete)) => {
                    self.write_chunk(bytes, payload_size).await?;
                    if let Some(callback) = on_complete {
                        callback();
                    }
                }
                Some(Outbound::File(_, path, on_complete)) => {
                    self.write_file(path, payload_size).await?;
                    if let Some(callback) = on_complete {
                        callback();
                    }
                }
                Some(Outbound::End(_)) => {
                    if !payload_size.is_empty() {
                        let eof: OutFrame = Frame::Payload(PayloadItem::Eof);
                        self.framed_write.send(eof).await?;
                    }
                    return Ok(());
                }
                Some(Outbound::Head(..)) => warn!("ignoring a repeated head of the committed reply"),
                None => {
                    return Err(SendError::invalid_body("response dropped before it completed").into());
                }
            }
        }
    }

    async fn write_chunk(&mut self, bytes: Bytes, payload_size: PayloadSize) -> Result<(), HttpError> {
        if payload_size.is_empty() {
            warn!(len = bytes.len(), "dropping payload of a response declared empty");
            return Ok(());
        }
        let chunk: OutFrame = Frame::Payload(PayloadItem::Chunk(bytes));
        self.framed_write.send(chunk).await?;
        Ok(())
    }

    async fn write_file(&mut self, path: PathBuf, payload_size: PayloadSize) -> Result<(), HttpError> {
        let file = AsyncFile::open(&path, OpenOptions::reading()).await.map_err(SendError::io)?;
        let (sender, mut receiver) = mpsc::unbounded_channel();
        wire_file_handlers(&file, &sender);
        drop(sender);

        let reading = file.read_fully();
        while let Some(chunk) = receiver.recv().await {
            match chunk {
                FileChunk::Data(bytes) => self.write_chunk(bytes, payload_size).await?,
                FileChunk::Done => break,
                FileChunk::Failed(e) => {
                    error!(path = %path.display(), cause = %e, "can't stream file payload");
                    return Err(SendError::io(e).into());
                }
            }
        }
        drop(reading);
        Ok(())
    }

    async fn send_error(&mut self, status: StatusCode) -> Result<(), HttpError> {
        let mut head = Response::new(());
        *head.status_mut() = status;
        let frame: OutFrame = Frame::Header((head, PayloadSize::Empty));
        self.framed_write.send(frame).await?;
        Ok(())
    }
}

/// Routes the reply of `request` into `sender`: the head first, then every write of the
/// response, then its end. Each reply gets its own sequence number; the connection commits
/// to the first head it sees and drops everything tagged with another number.
fn install_reply_listener(request: &HttpRequest, sender: UnboundedSender<Outbound>) {
    let replies = AtomicU64::new(0);
    request.reply_handler(move |response: HttpResponse| {
        let id = replies.fetch_add(1, Ordering::Relaxed);
        if sender.send(Outbound::Head(id, response.clone())).is_err() {
            debug!("connection gone, dropping reply");
            return;
        }

        let data_sender = sender.clone();
        let attached = response.envelope().attach_sink(move |payload: Payload, on_complete: Option<WriteCallback>| {
            let item = match payload {
                Payload::Data(bytes) => Outbound::Data(id, bytes, on_complete),
                Payload::File(path) => Outbound::File(id, path, on_complete),
            };
            if data_sender.send(item).is_err() {
                debug!("connection gone, dropping response payload");
            }
        });
        if let Err(e) = attached {
            warn!(cause = %e, "response already bound to a transport");
            return;
        }

        let end_sender = sender.clone();
        response.on_complete(move || {
            if end_sender.send(Outbound::End(id)).is_err() {
                debug!("connection gone before response end");
            }
        });
    });
}

fn wire_file_handlers(file: &AsyncFile, sender: &UnboundedSender<FileChunk>) {
    let chunks = sender.clone();
    file.read_handler(move |buffer| {
        let _ = chunks.send(FileChunk::Data(buffer.freeze()));
    });
    let failures = sender.clone();
    file.failure_handler(move |e| {
        let _ = failures.send(FileChunk::Failed(io::Error::new(e.kind(), e.to_string())));
    });
    let done = sender.clone();
    file.on_complete(move || {
        let _ = done.send(FileChunk::Done);
    });
}

fn is_peer_gone(e: &ParseError) -> bool {
    match e {
        ParseError::Io { source } => matches!(
            source.kind(),
            io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionAborted | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn serve<H>(handler: H) -> (DuplexStream, tokio::task::JoinHandle<Result<(), HttpError>>)
    where
        H: RequestHandler + 'static,
    {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let task = tokio::spawn(HttpConnection::new(reader, writer).process(Arc::new(handler)));
        (client, task)
    }

    async fn exchange<H>(handler: H, request: &[u8]) -> String
    where
        H: RequestHandler + 'static,
    {
        let (mut client, task) = serve(handler);
        client.write_all(request).await.unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        task.await.unwrap().unwrap();
        response
    }

    #[tokio::test]
    async fn length_framed_reply() {
        let response = exchange(
            |request: HttpRequest| {
                let response = HttpResponse::ok();
                response.content_length(5);
                request.reply(response.clone());
                response.write("hello").unwrap();
                response.complete();
            },
            b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("content-length: 5\r\n"));
        assert!(response.contains("connection: close\r\n"));
        assert!(response.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn superseded_reply_never_mixes_into_the_committed_one() {
        let response = exchange(
            |request: HttpRequest| {
                let first = HttpResponse::ok();
                let second = HttpResponse::ok();
                request.reply(first.clone());
                request.reply(second.clone());

                second.write("SECOND").unwrap();
                second.complete();
                first.write("FIRST").unwrap();
                first.complete();
            },
            b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 1);
        assert!(response.contains("transfer-encoding: chunked\r\n"));
        assert!(response.ends_with("\r\n\r\n5\r\nFIRST\r\n0\r\n\r\n"));
        assert!(!response.contains("SECOND"));
    }

    #[tokio::test]
    async fn echoes_body_with_chunked_reply() {
        let response = exchange(
            |request: HttpRequest| {
                let body = request.subscribe();
                tokio::spawn(async move {
                    let bytes = BodyExt::collect(body).await.unwrap().to_bytes();
                    let response = HttpResponse::ok();
                    response.write(bytes).unwrap();
                    request.reply(response.clone());
                    response.complete();
                });
            },
            b"POST /echo HTTP/1.1\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world",
        )
        .await;

        assert!(response.contains("transfer-encoding: chunked\r\n"));
        assert!(response.ends_with("\r\n\r\nB\r\nhello world\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn expect_continue_is_answered_before_body() {
        let (mut client, task) = serve(|request: HttpRequest| {
            let response = HttpResponse::no_content();
            request.reply(response.clone());
            response.complete();
        });

        client.write_all(b"PUT /up HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 3\r\nConnection: close\r\n\r\n").await.unwrap();
        let mut interim = [0u8; 25];
        client.read_exact(&mut interim).await.unwrap();
        assert_eq!(&interim, b"HTTP/1.1 100 Continue\r\n\r\n");

        client.write_all(b"abc").await.unwrap();
        let mut rest = String::new();
        client.read_to_string(&mut rest).await.unwrap();
        assert!(rest.starts_with("HTTP/1.1 204 No Content\r\n"));
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn keep_alive_serves_several_requests() {
        let (mut client, task) = serve(|request: HttpRequest| {
            let body = format!("path={}", request.path());
            let response = HttpResponse::ok();
            response.content_length(body.len() as u64);
            response.write(body).unwrap();
            request.reply(response.clone());
            response.complete();
        });

        client.write_all(b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 2);
        assert!(response.contains("path=/one"));
        assert!(response.ends_with("path=/two"));
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn missing_reply_becomes_server_error() {
        let response = exchange(|_request: HttpRequest| {}, b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn file_payload_is_streamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, "<h1>from disk</h1>").unwrap();

        let response = exchange(
            move |request: HttpRequest| {
                let response = HttpResponse::ok();
                response.content_type("text/html");
                response.write(path.clone()).unwrap();
                response.complete();
                request.reply(response);
            },
            b"GET /index.html HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(response.contains("content-type: text/html\r\n"));
        assert!(response.ends_with("\r\n\r\n12\r\n<h1>from disk</h1>\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn response_hook_runs_before_head() {
        let (client, server) = tokio::io::duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let hook: ResponseHook = Arc::new(|response: &HttpResponse| {
            response.header("Server", "micro-envelope");
        });
        let handler = Arc::new(|request: HttpRequest| {
            let response = HttpResponse::no_content();
            request.reply(response.clone());
            response.complete();
        });
        let task = tokio::spawn(HttpConnection::new(reader, writer).response_hook(hook).process(handler));

        let mut client = client;
        client.write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.contains("server: micro-envelope\r\n"));
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn malformed_request_gets_bad_request() {
        let (mut client, task) = serve(|_request: HttpRequest| {});
        client.write_all(b"NOT A REQUEST\r\n\r\n").await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(task.await.unwrap().is_err());
    }
}
