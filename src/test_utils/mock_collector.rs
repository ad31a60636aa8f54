//! In-process stand-in for the collector's event endpoint.
//!
//! Each accepted connection is answered with the next [`CannedResponse`] and
//! the parsed request is forwarded to the test. The collector stops
//! accepting once every canned response has been used.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use native_tls::{Identity, TlsAcceptor};

use crate::config::{HecConfig, HecConfigBuilder};

const TEST_CERT_PEM: &[u8] = include_bytes!("fixtures/localhost.crt");
const TEST_KEY_PEM: &[u8] = include_bytes!("fixtures/localhost.key");

/// Self-signed identity for `localhost` / `127.0.0.1`.
pub fn self_signed_identity() -> Identity {
    Identity::from_pkcs8(TEST_CERT_PEM, TEST_KEY_PEM).expect("load test identity")
}

/// A request as seen by the mock collector.
#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Response replayed for one connection.
#[derive(Clone, Debug)]
pub struct CannedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl CannedResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    fn write_to(&self, stream: &mut impl Write) -> std::io::Result<()> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
             Connection: close\r\n",
            self.status,
            status_text(self.status),
            self.body.len()
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");
        stream.write_all(head.as_bytes())?;
        stream.write_all(&self.body)?;
        stream.flush()
    }
}

impl From<(u16, &str)> for CannedResponse {
    fn from((status, body): (u16, &str)) -> Self {
        Self::new(status, body)
    }
}

/// Handle on a running mock collector.
pub struct MockCollector {
    addr: SocketAddr,
    https: bool,
    requests: mpsc::Receiver<CapturedRequest>,
}

impl MockCollector {
    /// Serve `responses` over plain HTTP.
    pub fn start<R: Into<CannedResponse>>(responses: impl IntoIterator<Item = R>) -> Self {
        Self::spawn(None, responses.into_iter().map(Into::into).collect())
    }

    /// Serve `responses` over TLS using `identity`.
    ///
    /// Connections whose handshake fails consume their response without
    /// producing a captured request.
    pub fn start_tls<R: Into<CannedResponse>>(
        identity: Identity,
        responses: impl IntoIterator<Item = R>,
    ) -> Self {
        let acceptor = TlsAcceptor::new(identity).expect("build TLS acceptor");
        Self::spawn(Some(acceptor), responses.into_iter().map(Into::into).collect())
    }

    fn spawn(acceptor: Option<TlsAcceptor>, responses: Vec<CannedResponse>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener has address");
        let https = acceptor.is_some();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for response in responses {
                let Ok((stream, _)) = listener.accept() else {
                    break;
                };
                let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
                let captured = match &acceptor {
                    None => serve(stream, &response),
                    Some(acceptor) => match acceptor.accept(stream) {
                        Ok(tls) => serve(tls, &response),
                        Err(_) => continue,
                    },
                };
                let _ = tx.send(captured);
            }
        });

        Self {
            addr,
            https,
            requests: rx,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Builder pointed at this collector with short timeouts.
    pub fn config(&self) -> HecConfigBuilder {
        HecConfig::builder()
            .with_host(self.addr.ip().to_string())
            .with_port(self.addr.port())
            .with_protocol(if self.https { "https" } else { "http" })
            .with_token("00000000-0000-0000-0000-000000000000")
            .with_event_host("some_host")
            .with_connect_timeout_ms(2_000)
            .with_write_timeout_ms(2_000)
    }

    /// Requests received so far, waiting briefly for stragglers.
    pub fn received(&self) -> Vec<CapturedRequest> {
        let mut requests = Vec::new();
        while let Ok(request) = self.requests.recv_timeout(Duration::from_millis(200)) {
            requests.push(request);
        }
        requests
    }
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        204 => "No Content",
        302 => "Found",
        400 => "Bad Request",
        403 => "Forbidden",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn serve<S: Read + Write>(mut stream: S, response: &CannedResponse) -> CapturedRequest {
    let captured = read_http_request(&mut stream);
    let _ = response.write_to(&mut stream);
    captured
}

fn read_http_request(stream: &mut impl Read) -> CapturedRequest {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .expect("read request line");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read header");
        let Some((key, value)) = line.trim().split_once(':') else {
            break;
        };
        let (key, value) = (key.trim().to_lowercase(), value.trim().to_string());
        if key == "content-length" {
            content_length = value.parse().unwrap_or(0);
        }
        headers.push((key, value));
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).expect("read body");
    CapturedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}
