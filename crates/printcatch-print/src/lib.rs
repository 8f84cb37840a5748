// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printcatch Print — printer directory, default printer resolution, the dual
// safety catch, and report spooling over the OS print transports.  This crate
// connects the core domain types defined in `printcatch-core` to the host's
// report engine and the printers themselves.

pub mod directory;
pub mod dispatch;
pub mod gate;
pub mod lpr_client;
pub mod lpr_command;
pub mod raw_client;
pub mod report;
pub mod resolve;
pub mod store;
pub mod transport;

pub use directory::{MemoryDirectory, PrinterDirectory};
pub use dispatch::{Dispatcher, SpoolOutcome, SpoolRequest};
pub use gate::SafetyCatch;
pub use report::{FileReporter, RenderOptions, Reporter};
pub use resolve::resolve_printer;
pub use store::SqliteDirectory;
pub use transport::{SpoolTarget, SystemTransport, Transport};
