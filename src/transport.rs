// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Thin adapter over a TCP-or-TLS byte stream, preserving MQTT packet
//! framing on read and serializing writes at packet granularity.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};
use tokio_rustls::TlsConnector;

use crate::codec::{ByteArray, DecodePacket, FixedHeader};

/// Destination and transport-security selection for a connection attempt.
pub enum ConnectType {
    /// Plain TCP, host/port.
    Plain(String, u16),
    /// TLS over TCP, host/port and the TLS server name used for SNI and
    /// certificate verification.
    Tls(String, u16),
}

enum RawStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl RawStream {
    async fn read_buf(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            Self::Plain(socket) => socket.read_buf(buf).await,
            Self::Tls(socket) => socket.read_buf(buf).await,
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(socket) => socket.write_all(buf).await,
            Self::Tls(socket) => socket.write_all(buf).await,
        }
    }
}

fn default_tls_config() -> ClientConfig {
    let mut root_store = RootCertStore::empty();
    root_store.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(ta.subject, ta.spki, ta.name_constraints)
    }));
    ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// A connected byte-stream transport plus a write-mutex so outbound packets
/// are never interleaved mid-write.
pub struct Transport {
    stream: Mutex<RawStream>,
}

impl Transport {
    pub async fn connect(connect_type: &ConnectType) -> io::Result<Self> {
        let stream = match connect_type {
            ConnectType::Plain(host, port) => {
                let socket = TcpStream::connect((host.as_str(), *port)).await?;
                RawStream::Plain(socket)
            }
            ConnectType::Tls(host, port) => {
                let config = Arc::new(default_tls_config());
                let connector = TlsConnector::from(config);
                let socket = TcpStream::connect((host.as_str(), *port)).await?;
                let server_name = ServerName::try_from(host.as_str())
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid TLS server name"))?;
                let tls_socket = connector.connect(server_name, socket).await?;
                RawStream::Tls(Box::new(tls_socket))
            }
        };
        Ok(Self {
            stream: Mutex::new(stream),
        })
    }

    /// Write one fully-encoded packet. Serialized against other writers by
    /// the internal mutex so a packet is never split by a concurrent send.
    pub async fn send_packet(&self, encoded: &[u8]) -> io::Result<()> {
        let mut stream = self.stream.lock().await;
        stream.write_all(encoded).await
    }

    /// Read exactly one complete MQTT packet, blocking on the socket until a
    /// full fixed-header-plus-remaining-length has accumulated.
    pub async fn read_packet(&self, scratch: &mut Vec<u8>) -> io::Result<Vec<u8>> {
        let mut stream = self.stream.lock().await;
        loop {
            if let Some(frame_len) = try_frame_len(scratch) {
                let frame = scratch[..frame_len].to_vec();
                scratch.drain(..frame_len);
                return Ok(frame);
            }
            let n = stream.read_buf(scratch).await?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
            }
        }
    }
}

/// Returns the length of one complete packet at the front of `buf`, if one
/// has fully arrived yet.
fn try_frame_len(buf: &[u8]) -> Option<usize> {
    let mut ba = ByteArray::new(buf);
    match FixedHeader::decode(&mut ba) {
        Ok(header) => {
            let total = ba.offset() + header.remaining_length();
            if buf.len() >= total {
                Some(total)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
