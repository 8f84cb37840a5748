// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// LPR/LPD client (RFC 1179).
//
// Talks to a print server or printer on port 515 directly, without a local
// spooler: "receive job" command, control file (metadata), data file
// (document bytes). Every step waits for a zero acknowledgement byte.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use printcatch_core::error::{PrintcatchError, Result};
use printcatch_core::types::JobTicket;

/// Default LPR port.
pub const LPR_PORT: u16 = 515;

/// Queue used when the printer names none.
pub const DEFAULT_QUEUE: &str = "lp";

/// Host name announced in control files.
const HOSTNAME: &str = "printcatch";

/// RFC 1179 job numbers are three digits.
static NEXT_JOB: AtomicU16 = AtomicU16::new(1);

fn next_job_number() -> u16 {
    NEXT_JOB.fetch_add(1, Ordering::Relaxed) % 1000
}

/// Build the control file for a job.
///
/// One `l` (print literally) line per copy, so the server prints the data
/// file `copies` times.
pub fn control_file(job_num: u16, ticket: &JobTicket) -> String {
    let data_file = format!("dfA{job_num:03}{HOSTNAME}");
    let title: String = ticket.title.chars().filter(|c| *c != '\n').collect();

    let mut cf = format!("H{HOSTNAME}\nP{HOSTNAME}\nJ{title}\n");
    for _ in 0..ticket.copies.max(1) {
        cf.push_str(&format!("l{data_file}\n"));
    }
    cf.push_str(&format!("U{data_file}\nN{title}\n"));
    cf
}

async fn expect_ack(stream: &mut TcpStream, step: &str) -> Result<()> {
    let mut ack = [0u8; 1];
    stream
        .read_exact(&mut ack)
        .await
        .map_err(|e| PrintcatchError::Transport(format!("LPR {step} ack: {e}")))?;
    if ack[0] != 0 {
        return Err(PrintcatchError::Transport(format!(
            "LPR server rejected {step} (code {})",
            ack[0]
        )));
    }
    Ok(())
}

async fn write_step(stream: &mut TcpStream, bytes: &[u8], step: &str) -> Result<()> {
    stream
        .write_all(bytes)
        .await
        .map_err(|e| PrintcatchError::Transport(format!("LPR {step}: {e}")))
}

/// Send a document via the LPR/LPD protocol.
pub async fn send_lpr(
    host: &str,
    port: u16,
    queue: Option<&str>,
    document_bytes: &[u8],
    ticket: &JobTicket,
    timeout: Duration,
) -> Result<()> {
    let addr = format!("{host}:{port}");
    let queue = queue.filter(|q| !q.is_empty()).unwrap_or(DEFAULT_QUEUE);
    info!(addr = %addr, queue, job = %ticket.title, "connecting via LPR");

    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| {
            PrintcatchError::Transport(format!(
                "LPR connection to {addr} timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| PrintcatchError::Transport(format!("LPR connect to {addr}: {e}")))?;

    tokio::time::timeout(timeout, transfer(&mut stream, queue, document_bytes, ticket))
        .await
        .map_err(|_| {
            PrintcatchError::Transport(format!(
                "LPR transfer to {addr} timed out after {}s",
                timeout.as_secs()
            ))
        })??;

    info!(job = %ticket.title, "LPR job sent successfully");
    Ok(())
}

async fn transfer(
    stream: &mut TcpStream,
    queue: &str,
    document_bytes: &[u8],
    ticket: &JobTicket,
) -> Result<()> {
    let job_num = next_job_number();

    // 0x02 <queue> LF: receive a printer job
    write_step(stream, format!("\x02{queue}\n").as_bytes(), "command").await?;
    expect_ack(stream, "job request").await?;

    let control = control_file(job_num, ticket);
    let cf_header = format!("\x02{} cfA{job_num:03}{HOSTNAME}\n", control.len());
    write_step(stream, cf_header.as_bytes(), "control header").await?;
    expect_ack(stream, "control header").await?;
    write_step(stream, control.as_bytes(), "control file").await?;
    write_step(stream, &[0], "control terminator").await?;
    expect_ack(stream, "control file").await?;

    let df_header = format!("\x03{} dfA{job_num:03}{HOSTNAME}\n", document_bytes.len());
    write_step(stream, df_header.as_bytes(), "data header").await?;
    expect_ack(stream, "data header").await?;
    write_step(stream, document_bytes, "data send").await?;
    write_step(stream, &[0], "data terminator").await?;
    expect_ack(stream, "data file").await?;

    debug!(job_num, bytes = document_bytes.len(), "LPR transfer complete");
    Ok(())
}
