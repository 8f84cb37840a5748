// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printcatch printer directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a printer record.
    PrinterId
);

uuid_id!(
    /// Unique identifier for a print strategy record.
    StrategyId
);

/// Identity of a host-application user. Opaque to Printcatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(login: impl Into<String>) -> Self {
        Self(login.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which rendition of a report a printer consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    #[default]
    Pdf,
    Html,
    /// CPCL/XML for label and receipt printers.
    Cpcl,
}

impl ReportType {
    /// MIME type the reporting engine is expected to produce.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Html => "text/html",
            Self::Cpcl => "application/xml",
        }
    }

    /// Stable keyword used in persisted records and on the command line.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Cpcl => "cpcl",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "pdf" | "qweb-pdf" => Some(Self::Pdf),
            "html" | "qweb-html" => Some(Self::Html),
            "cpcl" | "qweb-cpcl" => Some(Self::Cpcl),
            _ => None,
        }
    }
}

/// Transport class a strategy selects for its printers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// Pipe the document into the local `lpr` command (OS print queue).
    #[default]
    LprCommand,
    /// Speak LPR/LPD (RFC 1179) directly to the printer or print server.
    Lpd,
    /// Raw TCP socket (JetDirect).
    RawTcp,
}

impl TransportKind {
    /// Human-readable name for logs and listings.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::LprCommand => "lpr command",
            Self::Lpd => "LPR/LPD",
            Self::RawTcp => "Direct TCP",
        }
    }

    /// Default port, for transports that open a socket themselves.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::LprCommand => None,
            Self::Lpd => Some(515),
            Self::RawTcp => Some(9100),
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::LprCommand => "lpr",
            Self::Lpd => "lpd",
            Self::RawTcp => "raw",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "lpr" => Some(Self::LprCommand),
            "lpd" => Some(Self::Lpd),
            "raw" | "jetdirect" => Some(Self::RawTcp),
            _ => None,
        }
    }
}

/// Where a printer's jobs go. Interpreted only by transports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportParams {
    /// Printer or print server host name / address.
    pub host: Option<String>,
    /// Port override; transports fall back to their default port.
    pub port: Option<u16>,
    /// Print queue name (`lpr -P`, LPD queue).
    pub queue: Option<String>,
}

/// A printer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub id: PrinterId,
    pub name: String,
    /// Unique across all printers when set. Matched case-sensitively.
    pub barcode: Option<String>,
    /// Shared safety policy; `None` falls back to the system default strategy.
    pub strategy_id: Option<StrategyId>,
    pub transport: TransportParams,
    pub report_type: ReportType,
    /// User default references to this printer are cleared on logout.
    pub is_ephemeral: bool,
    /// A group stands for its members: jobs sent to it go to the user's or
    /// the system's default member.
    pub is_group: bool,
    /// Group this printer belongs to. Must point at a printer with
    /// `is_group` set.
    pub group_id: Option<PrinterId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Printer {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PrinterId::new(),
            name: name.into(),
            barcode: None,
            strategy_id: None,
            transport: TransportParams::default(),
            report_type: ReportType::default(),
            is_ephemeral: false,
            is_group: false,
            group_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the barcode. A blank barcode means none.
    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = non_blank(barcode.into());
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyId) -> Self {
        self.strategy_id = Some(strategy);
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.transport.queue = non_blank(queue.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>, port: Option<u16>) -> Self {
        self.transport.host = non_blank(host.into());
        self.transport.port = port;
        self
    }

    pub fn with_report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = report_type;
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.is_ephemeral = true;
        self
    }

    /// Mark this printer as a printer group.
    pub fn group(mut self) -> Self {
        self.is_group = true;
        self
    }

    pub fn in_group(mut self, group: PrinterId) -> Self {
        self.group_id = Some(group);
        self
    }

    /// Copy with blank barcode, host and queue values replaced by `None`.
    pub fn normalized(&self) -> Self {
        let mut printer = self.clone();
        printer.barcode = printer.barcode.take().and_then(non_blank);
        printer.transport.host = printer.transport.host.take().and_then(non_blank);
        printer.transport.queue = printer.transport.queue.take().and_then(non_blank);
        printer
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

/// A print strategy: the safety policy and transport class shared by
/// printers that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: StrategyId,
    pub name: String,
    /// Strategy half of the safety catch.
    pub safety_catch_enabled: bool,
    pub transport: TransportKind,
    /// Extra process configuration key (`section.key`) that must also be
    /// truthy before this strategy prints. A bare key is looked up in the
    /// `print.strategy` section.
    pub safety_option: Option<String>,
}

impl Strategy {
    pub fn new(name: impl Into<String>, transport: TransportKind) -> Self {
        Self {
            id: StrategyId::new(),
            name: name.into(),
            safety_catch_enabled: false,
            transport,
            safety_option: None,
        }
    }

    pub fn with_safety_catch(mut self, enabled: bool) -> Self {
        self.safety_catch_enabled = enabled;
        self
    }

    pub fn with_safety_option(mut self, key: impl Into<String>) -> Self {
        self.safety_option = Some(key.into());
        self
    }
}

/// Output of the reporting collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl RenderedDocument {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Per-job metadata passed alongside the document to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub title: String,
    pub copies: u32,
}
