// src/connection/stream.rs

//! Dialing the chat server, over TLS or plain TCP.

use crate::core::TransportFault;
use async_trait::async_trait;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::{TlsConnector, rustls};
use tracing::info;

/// Opens a fresh byte stream to the chat server. The session calls this once
/// per connection cycle.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self) -> Result<Self::Stream, TransportFault>;

    /// Human-readable address for log lines.
    fn describe(&self) -> String;
}

/// An enum to wrap the two stream types a dialer can produce.
pub enum ChatStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for ChatStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ChatStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            ChatStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ChatStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        match self.get_mut() {
            ChatStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            ChatStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            ChatStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            ChatStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            ChatStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            ChatStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Dials `host:port`, wrapping the socket in TLS unless disabled.
pub struct TlsDialer {
    host: String,
    port: u16,
    connect_timeout: Duration,
    tls: Option<TlsConnector>,
}

impl TlsDialer {
    pub fn new(host: &str, port: u16, use_tls: bool, connect_timeout: Duration) -> Self {
        let tls = use_tls.then(|| {
            let mut root_cert_store = rustls::RootCertStore::empty();
            root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let tls_config = rustls::ClientConfig::builder()
                .with_root_certificates(root_cert_store)
                .with_no_client_auth();
            TlsConnector::from(Arc::new(tls_config))
        });
        Self {
            host: host.to_string(),
            port,
            connect_timeout,
            tls,
        }
    }

    async fn dial(&self) -> Result<ChatStream, TransportFault> {
        let addr = self.describe();
        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| TransportFault::Connect {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        let Some(connector) = &self.tls else {
            return Ok(ChatStream::Tcp(tcp_stream));
        };

        info!("Establishing TLS connection with {addr}");
        let domain = rustls::pki_types::ServerName::try_from(self.host.as_str())
            .map_err(|_| TransportFault::Tls(format!("invalid TLS domain name '{}'", self.host)))?
            .to_owned();
        let tls_stream = connector
            .connect(domain, tcp_stream)
            .await
            .map_err(|e| TransportFault::Tls(e.to_string()))?;
        Ok(ChatStream::Tls(Box::new(tls_stream)))
    }
}

#[async_trait]
impl Connector for TlsDialer {
    type Stream = ChatStream;

    async fn connect(&self) -> Result<ChatStream, TransportFault> {
        match tokio::time::timeout(self.connect_timeout, self.dial()).await {
            Ok(result) => result,
            Err(_) => Err(TransportFault::Connect {
                addr: self.describe(),
                reason: format!("timed out after {:?}", self.connect_timeout),
            }),
        }
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
