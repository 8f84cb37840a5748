// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spool through the local `lpr` command.
//
// The document is piped into `lpr` on stdin; queue, title and copy count go
// on the command line. A non-zero exit status is a transport failure.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use printcatch_core::error::{PrintcatchError, Result};
use printcatch_core::types::JobTicket;

/// Arguments passed to `lpr` for a job.
pub fn lpr_args(queue: Option<&str>, ticket: &JobTicket) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(queue) = queue.filter(|q| !q.is_empty()) {
        args.push("-P".to_owned());
        args.push(queue.to_owned());
    }
    if !ticket.title.is_empty() {
        args.push("-T".to_owned());
        args.push(ticket.title.clone());
    }
    if ticket.copies > 1 {
        args.push("-#".to_owned());
        args.push(ticket.copies.to_string());
    }
    args
}

/// Pipe `document_bytes` into `lpr_exec` and wait for it to finish.
///
/// Feeding stdin and waiting for the exit status share one `timeout`; a
/// command that stops reading is killed when it runs out. The job only counts
/// as accepted when the whole document was written and the command exited
/// zero.
pub async fn send_lpr_command(
    lpr_exec: &str,
    queue: Option<&str>,
    document_bytes: &[u8],
    ticket: &JobTicket,
    timeout: Duration,
) -> Result<()> {
    let args = lpr_args(queue, ticket);
    info!("printing via {} {}", lpr_exec, args.join(" "));

    let mut child = Command::new(lpr_exec)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| PrintcatchError::Transport(format!("cannot run {lpr_exec}: {e}")))?;

    let mut stdin = child.stdin.take().ok_or_else(|| {
        PrintcatchError::Transport(format!("{lpr_exec} has no stdin pipe"))
    })?;
    let feed = async move {
        let written = stdin.write_all(document_bytes).await;
        // Closing stdin signals end of document.
        drop(stdin);
        written
    };

    let (written, output) = tokio::time::timeout(timeout, async {
        tokio::join!(feed, child.wait_with_output())
    })
    .await
    .map_err(|_| {
        PrintcatchError::Transport(format!(
            "{lpr_exec} did not finish within {}s",
            timeout.as_secs()
        ))
    })?;
    let output =
        output.map_err(|e| PrintcatchError::Transport(format!("waiting for {lpr_exec}: {e}")))?;

    if !output.status.success() {
        let mut message = String::from_utf8_lossy(&output.stdout).into_owned();
        message.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(PrintcatchError::Transport(format!(
            "lpr failed ({}). Message: {}",
            output.status,
            message.trim()
        )));
    }

    if let Err(e) = written {
        debug!(kind = ?e.kind(), "{lpr_exec} stdin write failed");
        return Err(PrintcatchError::Transport(format!(
            "{lpr_exec} exited before reading the whole document: {e}"
        )));
    }

    info!(bytes = document_bytes.len(), "lpr accepted the job");
    Ok(())
}
