// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command handlers. Each takes the wired services and prints a short summary
// on stdout; diagnostics go through tracing.

use printcatch_core::error::Result;
use printcatch_core::types::{Printer, PrinterId, Strategy, UserId};
use printcatch_print::{SpoolOutcome, SpoolRequest};

use crate::cli::Commands;
use crate::services::app_services::AppServices;

pub async fn run(svc: &AppServices, command: Commands) -> Result<()> {
    match command {
        Commands::Printers => list(svc),
        Commands::AddPrinter {
            name,
            barcode,
            strategy,
            host,
            port,
            queue,
            report_type,
            ephemeral,
            group,
            is_group,
        } => {
            let mut printer = Printer::new(name).with_report_type(report_type);
            if let Some(barcode) = barcode {
                printer = printer.with_barcode(barcode);
            }
            if let Some(strategy) = strategy {
                printer = printer.with_strategy(svc.lookup_strategy(&strategy)?.id);
            }
            if let Some(host) = host {
                printer = printer.with_host(host, port);
            }
            if let Some(queue) = queue {
                printer = printer.with_queue(queue);
            }
            if ephemeral {
                printer = printer.ephemeral();
            }
            if let Some(group) = group {
                printer = printer.in_group(svc.lookup_printer(&group)?.id);
            }
            if is_group {
                printer = printer.group();
            }
            svc.directory().save(&printer)?;
            println!(
                "added {} {} ({})",
                if printer.is_group { "group" } else { "printer" },
                svc.directory().full_name(&printer)?,
                printer.id
            );
            Ok(())
        }
        Commands::AddStrategy {
            name,
            transport,
            safety_catch,
            safety_option,
            default,
        } => {
            let mut strategy = Strategy::new(name, transport).with_safety_catch(safety_catch);
            if let Some(key) = safety_option {
                strategy = strategy.with_safety_option(key);
            }
            svc.directory().save_strategy(&strategy)?;
            if default {
                svc.directory().set_default_strategy(&strategy.id)?;
            }
            println!("added strategy {} ({})", strategy.name, strategy.id);
            Ok(())
        }
        Commands::SetUserDefault { user, printer } => {
            let user = UserId::new(user);
            match printer {
                Some(key) => {
                    let printer = svc.lookup_printer(&key)?;
                    svc.directory().set_user_default(&user, &printer.id)?;
                    println!(
                        "default printer for {user}: {}",
                        svc.directory().full_name(&printer)?
                    );
                }
                None => {
                    svc.directory().clear_user_default(&user)?;
                    println!("cleared default printer for {user}");
                }
            }
            Ok(())
        }
        Commands::SetSystemDefault { printer } => {
            match printer {
                Some(key) => {
                    let printer = svc.lookup_printer(&key)?;
                    svc.directory().set_system_default(&printer.id)?;
                    println!(
                        "system default printer: {}",
                        svc.directory().full_name(&printer)?
                    );
                }
                None => {
                    svc.directory().clear_system_default()?;
                    println!("cleared system default printer");
                }
            }
            Ok(())
        }
        Commands::Find { barcode } => {
            match svc.directory().find_by_barcode(&barcode)? {
                Some(printer) => {
                    println!("{}\t{}", printer.id, svc.directory().full_name(&printer)?)
                }
                None => println!("no printer with barcode {barcode}"),
            }
            Ok(())
        }
        Commands::Logout { user } => {
            let user = UserId::new(user);
            if svc.directory().clear_ephemeral(&user)? {
                println!("cleared ephemeral default printers for {user}");
            }
            Ok(())
        }
        Commands::Spool {
            report,
            records,
            printer,
            user,
            title,
            copies,
        } => {
            let printer = printer.map(|key| svc.lookup_printer(&key)).transpose()?;
            let user = user.map(UserId::new);
            let mut request = SpoolRequest::new(report, records);
            if let Some(title) = title {
                request = request.with_title(title);
            }
            if let Some(copies) = copies {
                request = request.with_copies(copies);
            }
            let outcome = svc
                .dispatcher()
                .spool_report(&request, printer.as_ref(), user.as_ref())
                .await?;
            report_outcome(svc, &outcome)
        }
        Commands::TestPage { printer, user } => {
            let printer = printer.map(|key| svc.lookup_printer(&key)).transpose()?;
            let user = user.map(UserId::new);
            let outcome = svc
                .dispatcher()
                .spool_test_page(printer.as_ref(), user.as_ref())
                .await?;
            report_outcome(svc, &outcome)
        }
    }
}

fn list(svc: &AppServices) -> Result<()> {
    let directory = svc.directory();
    let system: Vec<PrinterId> = directory.system_defaults()?.into_iter().map(|p| p.id).collect();
    let default_strategy = directory.default_strategy()?.map(|s| s.id);

    for strategy in directory.list_strategies()? {
        let mark = if Some(strategy.id) == default_strategy { "*" } else { " " };
        println!(
            "{mark} strategy {}\t{}\t{}\tsafety catch {}",
            strategy.id,
            strategy.name,
            strategy.transport.display_name(),
            if strategy.safety_catch_enabled { "on" } else { "off" },
        );
    }
    for printer in directory.list()? {
        let mark = if system.contains(&printer.id) { "*" } else { " " };
        println!(
            "{mark} {}  {}\t{}\t{}\t{}",
            if printer.is_group { "group  " } else { "printer" },
            printer.id,
            directory.full_name(&printer)?,
            printer.barcode.as_deref().unwrap_or("-"),
            printer.report_type.keyword(),
        );
    }
    Ok(())
}

fn report_outcome(svc: &AppServices, outcome: &SpoolOutcome) -> Result<()> {
    match outcome {
        SpoolOutcome::Sent {
            printer,
            document_hash,
            bytes,
        } => {
            let name = match svc.directory().get(printer)? {
                Some(p) => svc.directory().full_name(&p)?,
                None => printer.to_string(),
            };
            println!("sent {bytes} bytes to {name} (sha256 {document_hash})");
        }
        SpoolOutcome::Disabled { printer } => {
            println!("printing disabled for printer {printer}; nothing sent");
        }
        SpoolOutcome::NoPrinter => println!("no printer selected; nothing printed"),
    }
    Ok(())
}
