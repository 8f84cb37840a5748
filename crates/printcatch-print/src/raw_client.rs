// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP print client (JetDirect, port 9100).
//
// Open a socket and write the bytes. No settings, no job tracking; the printer
// must understand the document format natively. Copies are sent as repeated
// transmissions on the same connection.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use printcatch_core::error::{PrintcatchError, Result};

/// Default raw TCP port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

const CHUNK_SIZE: usize = 8192;

/// Send document bytes directly to a printer via raw TCP.
pub async fn send_raw(
    host: &str,
    port: u16,
    document_bytes: &[u8],
    copies: u32,
    timeout: Duration,
) -> Result<()> {
    let addr = format!("{host}:{port}");
    info!(addr = %addr, total = document_bytes.len(), copies, "connecting via raw TCP");

    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| {
            PrintcatchError::Transport(format!(
                "Raw TCP connection to {addr} timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| PrintcatchError::Transport(format!("Raw TCP connect to {addr}: {e}")))?;

    for copy in 0..copies.max(1) {
        let mut sent = 0usize;
        for chunk in document_bytes.chunks(CHUNK_SIZE) {
            tokio::time::timeout(timeout, stream.write_all(chunk))
                .await
                .map_err(|_| {
                    PrintcatchError::Transport(format!("Raw TCP send to {addr} timed out"))
                })?
                .map_err(|e| {
                    PrintcatchError::Transport(format!(
                        "Raw TCP send failed at byte {sent} of copy {}: {e}",
                        copy + 1
                    ))
                })?;
            sent += chunk.len();
            debug!(sent, total = document_bytes.len(), copy = copy + 1, "raw TCP progress");
        }
    }

    stream
        .flush()
        .await
        .map_err(|e| PrintcatchError::Transport(format!("Raw TCP flush: {e}")))?;
    stream
        .shutdown()
        .await
        .map_err(|e| PrintcatchError::Transport(format!("Raw TCP shutdown: {e}")))?;

    info!(total = document_bytes.len(), "raw TCP print job sent successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn sends_every_copy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.expect("read");
            received
        });

        let document = vec![b'x'; CHUNK_SIZE + 10];
        send_raw("127.0.0.1", port, &document, 2, Duration::from_secs(5))
            .await
            .expect("send");

        let received = server.await.expect("server");
        assert_eq!(received.len(), document.len() * 2);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let result = send_raw("127.0.0.1", port, b"data", 1, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(PrintcatchError::Transport(_))));
    }
}
