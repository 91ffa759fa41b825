//! HTTP front-end.
//!
//! `POST /cmd` takes a JSON [`CollarRequest`] and answers once the command
//! has been transmitted. Every other `GET` is served from the static
//! directory, with `/` mapped to `index.html`.

use crate::remote::Remote;
use crate::request::CollarRequest;
use crate::transmitter::{Cancellation, Transmitter};
use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub const MAX_LINE_LENGTH: u64 = 8 * 1024;
pub const MAX_HEADER_LINES: usize = 64;
pub const MAX_BODY_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
enum HttpError {
    #[error("malformed request: {0}")]
    Malformed(&'static str),

    #[error("request too large")]
    TooLarge,

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug)]
struct Request {
    method: String,
    path: String,
    body: Vec<u8>,
}

#[derive(Debug)]
struct Response {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Response {
    fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: Vec::new(),
        }
    }

    fn text(status: u16, text: impl Into<String>) -> Self {
        Self {
            body: text.into().into_bytes(),
            ..Self::empty(status)
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            413 => "Payload Too Large",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }

    async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> io::Result<()> {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason(),
            self.content_type,
            self.body.len()
        );
        writer.write_all(head.as_bytes()).await?;
        writer.write_all(&self.body).await?;
        writer.flush().await
    }
}

pub struct HttpServer<T> {
    remote: Arc<Remote<T>>,
    static_dir: PathBuf,
    cancel: Cancellation,
}

impl<T: Transmitter> HttpServer<T> {
    pub fn new(remote: Arc<Remote<T>>, static_dir: PathBuf, cancel: Cancellation) -> Self {
        Self {
            remote,
            static_dir,
            cancel,
        }
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        info!("HTTP server listening on {}", listener.local_addr()?);
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(err) = server.handle_connection(stream).await {
                    debug!("HTTP connection from {} failed: {}", peer, err);
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);

        let response = match read_request(&mut reader).await {
            Ok(request) => self.route(request).await,
            Err(HttpError::Io(err)) => return Err(err),
            Err(HttpError::TooLarge) => Response::text(413, HttpError::TooLarge.to_string()),
            Err(err) => Response::text(400, err.to_string()),
        };
        response.write_to(&mut writer).await?;
        writer.shutdown().await
    }

    async fn route(&self, request: Request) -> Response {
        debug!("{} {}", request.method, request.path);
        match (request.method.as_str(), request.path.as_str()) {
            ("POST", "/cmd") => self.command(&request.body).await,
            (_, "/cmd") => Response::empty(405),
            ("GET", path) => serve_static(&self.static_dir, path).await,
            _ => Response::empty(405),
        }
    }

    async fn command(&self, body: &[u8]) -> Response {
        let request = match CollarRequest::from_json(body) {
            Ok(request) => request,
            Err(err) => {
                warn!("rejected HTTP command: {}", err);
                return Response::text(400, err.to_string());
            }
        };

        match self.remote.send(request.command(), &self.cancel).await {
            Ok(()) => Response::empty(200),
            Err(err) if err.is_bad_request() => {
                warn!("rejected HTTP command: {}", err);
                Response::text(400, err.to_string())
            }
            Err(err) => {
                warn!("HTTP command failed: {}", err);
                Response::text(500, err.to_string())
            }
        }
    }
}

async fn read_line_limited<R>(reader: &mut R, line: &mut String) -> Result<usize, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let n = (&mut *reader).take(MAX_LINE_LENGTH).read_line(line).await?;
    if n as u64 == MAX_LINE_LENGTH && !line.ends_with('\n') {
        return Err(HttpError::TooLarge);
    }
    Ok(n)
}

async fn read_request<R>(reader: &mut R) -> Result<Request, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if read_line_limited(reader, &mut line).await? == 0 {
        return Err(HttpError::Malformed("empty request"));
    }

    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(_version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::Malformed("bad request line"));
    };
    let method = method.to_string();
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut content_length = 0usize;
    let mut header_lines = 0;
    loop {
        if read_line_limited(reader, &mut line).await? == 0 {
            return Err(HttpError::Malformed("truncated headers"));
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }

        header_lines += 1;
        if header_lines > MAX_HEADER_LINES {
            return Err(HttpError::TooLarge);
        }

        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| HttpError::Malformed("bad content-length"))?;
            }
        }
    }

    if content_length > MAX_BODY_SIZE {
        return Err(HttpError::TooLarge);
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).await?;

    Ok(Request { method, path, body })
}

async fn serve_static(root: &Path, path: &str) -> Response {
    let relative = path.trim_start_matches('/');
    let relative = if relative.is_empty() {
        "index.html"
    } else {
        relative
    };
    if relative
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Response::empty(404);
    }

    let file = root.join(relative);
    match tokio::fs::read(&file).await {
        Ok(body) => Response {
            status: 200,
            content_type: content_type(&file),
            body,
        },
        Err(err) => {
            debug!("static file {}: {}", file.display(), err);
            Response::empty(404)
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
