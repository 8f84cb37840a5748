// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end spooling through the dispatcher with recording collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use printcatch_core::config::{PRINT_SAFETY_CATCH, ProcessConfig};
use printcatch_core::error::{PrintcatchError, Result};
use printcatch_core::types::{
    JobTicket, Printer, RenderedDocument, ReportType, Strategy, TransportKind, UserId,
};
use printcatch_print::dispatch::hash_bytes;
use printcatch_print::{
    Dispatcher, MemoryDirectory, PrinterDirectory, RenderOptions, Reporter, SpoolOutcome,
    SpoolRequest, SpoolTarget, SqliteDirectory, Transport,
};

const RENDERED: &[u8] = b"%PDF-1.7 rendered";

#[derive(Default)]
struct RecordingReporter {
    calls: Mutex<Vec<(String, Vec<i64>, ReportType)>>,
    options: Mutex<Vec<RenderOptions>>,
    fail: bool,
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn render(
        &self,
        report: &str,
        records: &[i64],
        report_type: ReportType,
        options: &RenderOptions,
    ) -> Result<RenderedDocument> {
        self.calls
            .lock()
            .expect("lock")
            .push((report.to_owned(), records.to_vec(), report_type));
        self.options.lock().expect("lock").push(options.clone());
        if self.fail {
            return Err(PrintcatchError::Render(format!("no template for {report}")));
        }
        Ok(RenderedDocument::new(RENDERED.to_vec(), report_type.mime_type()))
    }
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(SpoolTarget, RenderedDocument, JobTicket)>>,
    fail: bool,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        target: &SpoolTarget,
        document: &RenderedDocument,
        ticket: &JobTicket,
    ) -> Result<()> {
        self.sent
            .lock()
            .expect("lock")
            .push((target.clone(), document.clone(), ticket.clone()));
        if self.fail {
            return Err(PrintcatchError::Transport("queue rejected job".into()));
        }
        Ok(())
    }
}

struct Harness {
    directory: Arc<dyn PrinterDirectory>,
    reporter: Arc<RecordingReporter>,
    transport: Arc<RecordingTransport>,
    dispatcher: Dispatcher,
}

impl Harness {
    fn with(
        directory: Arc<dyn PrinterDirectory>,
        process_flag: bool,
        reporter: RecordingReporter,
        transport: RecordingTransport,
    ) -> Self {
        let reporter = Arc::new(reporter);
        let transport = Arc::new(transport);
        let config = Arc::new(ProcessConfig::from_pairs([(
            PRINT_SAFETY_CATCH,
            json!(process_flag),
        )]));
        let dispatcher = Dispatcher::new(
            directory.clone(),
            reporter.clone(),
            transport.clone(),
            config,
        );
        Self {
            directory,
            reporter,
            transport,
            dispatcher,
        }
    }

    fn new(process_flag: bool) -> Self {
        Self::with(
            Arc::new(MemoryDirectory::new()),
            process_flag,
            RecordingReporter::default(),
            RecordingTransport::default(),
        )
    }

    /// Save a strategy and a printer using it.
    fn printer(&self, name: &str, strategy_flag: bool) -> Printer {
        let strategy = Strategy::new(format!("{name} strategy"), TransportKind::Lpd)
            .with_safety_catch(strategy_flag);
        self.directory.save_strategy(&strategy).expect("save strategy");
        let printer = Printer::new(name)
            .with_strategy(strategy.id)
            .with_host("10.1.2.3", None)
            .with_queue("raw");
        self.directory.save(&printer).expect("save printer");
        printer
    }

    fn render_options(&self) -> Vec<RenderOptions> {
        self.reporter.options.lock().expect("lock").clone()
    }

    fn renders(&self) -> usize {
        self.reporter.calls.lock().expect("lock").len()
    }

    fn sends(&self) -> Vec<(SpoolTarget, RenderedDocument, JobTicket)> {
        self.transport.sent.lock().expect("lock").clone()
    }
}

#[tokio::test]
async fn allowed_job_is_rendered_and_sent_once() {
    let h = Harness::new(true);
    let printer = h.printer("P", true);
    let request = SpoolRequest::new("sale.order", vec![42]);

    let outcome = h
        .dispatcher
        .spool_report(&request, Some(&printer), None)
        .await
        .expect("spool");

    assert_eq!(
        outcome,
        SpoolOutcome::Sent {
            printer: printer.id,
            document_hash: hash_bytes(RENDERED),
            bytes: RENDERED.len(),
        }
    );
    assert_eq!(h.renders(), 1);
    let sends = h.sends();
    assert_eq!(sends.len(), 1);
    let (target, document, ticket) = &sends[0];
    assert_eq!(document.bytes, RENDERED);
    assert_eq!(document.content_type, "application/pdf");
    assert_eq!(target.kind, TransportKind::Lpd);
    assert_eq!(target.params.host.as_deref(), Some("10.1.2.3"));
    assert_eq!(target.params.queue.as_deref(), Some("raw"));
    assert_eq!(ticket.title, "sale.order [42]");
    assert_eq!(ticket.copies, 1);
}

#[tokio::test]
async fn process_flag_off_renders_but_never_sends() {
    let h = Harness::new(false);
    let printer = h.printer("P", true);

    let outcome = h
        .dispatcher
        .spool_report(&SpoolRequest::new("sale.order", vec![1]), Some(&printer), None)
        .await
        .expect("spool");

    assert_eq!(outcome, SpoolOutcome::Disabled { printer: printer.id });
    assert_eq!(h.renders(), 1);
    assert!(h.sends().is_empty());
}

#[tokio::test]
async fn strategy_flag_off_never_sends() {
    let h = Harness::new(true);
    let printer = h.printer("P", false);

    let outcome = h
        .dispatcher
        .spool_report(&SpoolRequest::new("sale.order", vec![1]), Some(&printer), None)
        .await
        .expect("spool");

    assert_eq!(outcome, SpoolOutcome::Disabled { printer: printer.id });
    assert!(h.sends().is_empty());
}

#[tokio::test]
async fn no_printer_is_silent_noop() {
    let h = Harness::new(true);
    h.printer("unused", true);

    let outcome = h
        .dispatcher
        .spool_report(
            &SpoolRequest::new("sale.order", vec![1]),
            None,
            Some(&UserId::new("nobody")),
        )
        .await
        .expect("spool");

    assert_eq!(outcome, SpoolOutcome::NoPrinter);
    assert!(h.sends().is_empty());
}

#[tokio::test]
async fn strategyless_printer_fails_closed() {
    let h = Harness::new(true);
    let printer = Printer::new("bare");
    h.directory.save(&printer).expect("save");

    let outcome = h
        .dispatcher
        .spool_report(&SpoolRequest::new("r", vec![]), Some(&printer), None)
        .await
        .expect("spool");
    assert_eq!(outcome, SpoolOutcome::Disabled { printer: printer.id });
    assert!(h.sends().is_empty());
}

#[tokio::test]
async fn strategyless_printer_uses_default_strategy() {
    let h = Harness::new(true);
    let fallback = Strategy::new("fallback", TransportKind::RawTcp).with_safety_catch(true);
    h.directory.save_strategy(&fallback).expect("save strategy");
    h.directory.set_default_strategy(&fallback.id).expect("default");
    let printer = Printer::new("bare").with_host("10.9.9.9", Some(9100));
    h.directory.save(&printer).expect("save");

    let outcome = h
        .dispatcher
        .spool_report(&SpoolRequest::new("r", vec![]), Some(&printer), None)
        .await
        .expect("spool");
    assert!(outcome.is_sent());
    assert_eq!(h.sends()[0].0.kind, TransportKind::RawTcp);
}

#[tokio::test]
async fn user_default_then_system_default() {
    let h = Harness::new(true);
    let user_printer = h.printer("U", true);
    let system_printer = h.printer("S", true);
    let alice = UserId::new("alice");
    h.directory
        .set_user_default(&alice, &user_printer.id)
        .expect("user default");
    h.directory
        .set_system_default(&system_printer.id)
        .expect("system default");
    let request = SpoolRequest::new("stock.picking", vec![3]);

    let outcome = h
        .dispatcher
        .spool_report(&request, None, Some(&alice))
        .await
        .expect("alice");
    assert!(matches!(outcome, SpoolOutcome::Sent { printer, .. } if printer == user_printer.id));

    let outcome = h
        .dispatcher
        .spool_report(&request, None, Some(&UserId::new("bob")))
        .await
        .expect("bob");
    assert!(matches!(outcome, SpoolOutcome::Sent { printer, .. } if printer == system_printer.id));

    let sends = h.sends();
    assert_eq!(sends[0].0.printer, "U");
    assert_eq!(sends[1].0.printer, "S");
}

#[tokio::test]
async fn render_failure_propagates_without_send() {
    let h = Harness::with(
        Arc::new(MemoryDirectory::new()),
        true,
        RecordingReporter {
            fail: true,
            ..Default::default()
        },
        RecordingTransport::default(),
    );
    let printer = h.printer("P", true);

    let result = h
        .dispatcher
        .spool_report(&SpoolRequest::new("missing", vec![1]), Some(&printer), None)
        .await;
    assert!(matches!(result, Err(PrintcatchError::Render(_))));
    assert!(h.sends().is_empty());
}

#[tokio::test]
async fn transport_failure_propagates() {
    let h = Harness::with(
        Arc::new(MemoryDirectory::new()),
        true,
        RecordingReporter::default(),
        RecordingTransport {
            fail: true,
            ..Default::default()
        },
    );
    let printer = h.printer("P", true);

    let result = h
        .dispatcher
        .spool_report(&SpoolRequest::new("sale.order", vec![1]), Some(&printer), None)
        .await;
    assert!(matches!(result, Err(PrintcatchError::Transport(_))));
    assert_eq!(h.sends().len(), 1);
}

#[tokio::test]
async fn printer_report_type_selects_rendition() {
    let h = Harness::new(true);
    let strategy = Strategy::new("labels", TransportKind::Lpd).with_safety_catch(true);
    h.directory.save_strategy(&strategy).expect("save");
    let labeller = Printer::new("Labeller")
        .with_strategy(strategy.id)
        .with_host("10.0.0.5", None)
        .with_report_type(ReportType::Cpcl);
    h.directory.save(&labeller).expect("save");

    let request = SpoolRequest::new("product.label", vec![5])
        .with_title("Labels")
        .with_copies(3);
    h.dispatcher
        .spool_report(&request, Some(&labeller), None)
        .await
        .expect("spool");

    let calls = h.reporter.calls.lock().expect("lock").clone();
    assert_eq!(calls, vec![("product.label".to_owned(), vec![5], ReportType::Cpcl)]);
    let (_, document, ticket) = &h.sends()[0];
    assert_eq!(document.content_type, "application/xml");
    assert_eq!(ticket.title, "Labels");
    assert_eq!(ticket.copies, 3);

    let options = h.render_options();
    assert_eq!(options[0].copies, 3);
    assert_eq!(options[0].printer, Some(labeller.id));
    assert_eq!(options[0].data, Some(json!({"copies": 3})));
}

#[tokio::test]
async fn request_data_reaches_the_report_engine() {
    let h = Harness::new(true);
    let printer = h.printer("P", true);
    let request = SpoolRequest::new("sale.order", vec![8]).with_data(json!({"lang": "de"}));

    h.dispatcher
        .spool_report(&request, Some(&printer), None)
        .await
        .expect("spool");

    let options = h.render_options();
    assert_eq!(options[0].copies, 1);
    assert_eq!(options[0].data, Some(json!({"lang": "de"})));
}

#[tokio::test]
async fn test_page_prints_on_system_default() {
    let h = Harness::new(true);
    let printer = h.printer("Default", true);
    h.directory.set_system_default(&printer.id).expect("default");

    let outcome = h.dispatcher.spool_test_page(None, None).await.expect("test page");
    assert!(outcome.is_sent());

    let calls = h.reporter.calls.lock().expect("lock").clone();
    assert_eq!(calls[0].0, "print.report_test_page");
    assert_eq!(h.sends()[0].2.title, "Test page");
}

#[tokio::test]
async fn test_page_names_the_printer_it_is_printed_on() {
    let h = Harness::new(true);
    let upstairs = Printer::new("Upstairs").group();
    h.directory.save(&upstairs).expect("group");
    let mut plotter = h.printer("Plotter", true);
    plotter.group_id = Some(upstairs.id);
    h.directory.save(&plotter).expect("move into group");

    let outcome = h
        .dispatcher
        .spool_test_page(Some(&plotter), None)
        .await
        .expect("test page");
    assert!(matches!(outcome, SpoolOutcome::Sent { printer, .. } if printer == plotter.id));

    let options = h.render_options();
    assert_eq!(options[0].printer, Some(plotter.id));
    assert_eq!(
        options[0].data,
        Some(json!({
            "printer_id": plotter.id.to_string(),
            "printer_name": "Upstairs / Plotter",
        }))
    );
}

#[tokio::test]
async fn test_page_without_printer_renders_nothing() {
    let h = Harness::new(true);
    let outcome = h.dispatcher.spool_test_page(None, None).await.expect("test page");
    assert_eq!(outcome, SpoolOutcome::NoPrinter);
    assert_eq!(h.renders(), 0);
}

#[tokio::test]
async fn spooling_to_a_group_prints_on_its_default_member() {
    let h = Harness::new(true);
    let downstairs = Printer::new("Downstairs").group();
    h.directory.save(&downstairs).expect("group");
    let mut laser = h.printer("Laser", true);
    let mut inkjet = h.printer("Inkjet", true);
    for member in [&mut laser, &mut inkjet] {
        member.group_id = Some(downstairs.id);
        h.directory.save(member).expect("join group");
    }
    let request = SpoolRequest::new("sale.order", vec![1]);

    let outcome = h
        .dispatcher
        .spool_report(&request, Some(&downstairs), None)
        .await
        .expect("no member default");
    assert_eq!(outcome, SpoolOutcome::NoPrinter);

    h.directory.set_system_default(&laser.id).expect("group default");
    let bob = UserId::new("bob");
    h.directory.set_user_default(&bob, &inkjet.id).expect("bob's member");
    h.directory.set_user_default(&bob, &downstairs.id).expect("bob's default");

    let outcome = h
        .dispatcher
        .spool_report(&request, Some(&downstairs), None)
        .await
        .expect("system member");
    assert!(matches!(outcome, SpoolOutcome::Sent { printer, .. } if printer == laser.id));

    let outcome = h
        .dispatcher
        .spool_report(&request, None, Some(&bob))
        .await
        .expect("user member");
    assert!(matches!(outcome, SpoolOutcome::Sent { printer, .. } if printer == inkjet.id));

    let sends = h.sends();
    assert_eq!(sends[0].0.printer, "Laser");
    assert_eq!(sends[1].0.printer, "Inkjet");
}

#[tokio::test]
async fn spool_document_skips_rendering() {
    let h = Harness::new(true);
    let printer = h.printer("P", true);

    let outcome = h
        .dispatcher
        .spool_document(
            RenderedDocument::new(b"plain text".to_vec(), "text/plain"),
            "notes.txt",
            Some(2),
            Some(&printer),
            None,
        )
        .await
        .expect("spool");

    assert!(outcome.is_sent());
    assert_eq!(h.renders(), 0);
    let (_, document, ticket) = &h.sends()[0];
    assert_eq!(document.content_type, "text/plain");
    assert_eq!(ticket.copies, 2);
}

#[tokio::test]
async fn sqlite_directory_end_to_end() {
    let directory: Arc<dyn PrinterDirectory> =
        Arc::new(SqliteDirectory::open_in_memory().expect("open"));
    let h = Harness::with(
        directory,
        true,
        RecordingReporter::default(),
        RecordingTransport::default(),
    );
    let lab = h.printer("Lab 2", true);
    let mut lab = h.directory.get(&lab.id).expect("get").expect("present");
    lab.barcode = Some("PRNLAB02".into());
    h.directory.save(&lab).expect("save barcode");

    let found = h
        .directory
        .find_by_barcode("PRNLAB02")
        .expect("lookup")
        .expect("found");
    let outcome = h
        .dispatcher
        .spool_report(&SpoolRequest::new("sale.order", vec![1]), Some(&found), None)
        .await
        .expect("spool");
    assert!(outcome.is_sent());
    assert!(h.directory.find_by_barcode("NONEXISTENT").expect("lookup").is_none());
}

#[tokio::test]
async fn set_user_default_twice_then_resolve() {
    let h = Harness::new(true);
    let printer = h.printer("Mine", true);
    let user = UserId::new("alice");
    h.directory.set_user_default(&user, &printer.id).expect("first");
    h.directory.set_user_default(&user, &printer.id).expect("second");

    let outcome = h
        .dispatcher
        .spool_report(&SpoolRequest::new("r", vec![]), None, Some(&user))
        .await
        .expect("spool");
    assert!(matches!(outcome, SpoolOutcome::Sent { printer: p, .. } if p == printer.id));
}
