//! Operator CLI for the courier client.
//!
//! Settings come from `COURIER_*` environment variables; see
//! [`courier::config::CourierSettings`]. Results are written to stdout as
//! JSON, or CSV for `logs --csv`.
//!
//! # Examples
//! ```sh
//! courierctl pincode 400001
//! courierctl search andheri
//! courierctl allocate --order ORD-1001 --quantity 2
//! courierctl logs --status failed --limit 20 --csv
//! ```

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use courier::bootstrap::CourierServices;
use courier::config::CourierSettings;
use courier::domain::transport::{CourierTransport, TransportSelector};
use courier::domain::{ApiName, AuditFilter, CallStatus};
use ortho_config::OrthoConfig;
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "courierctl", version, about = "Query the courier integration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check whether a pincode is serviceable.
    Pincode {
        /// Six-digit Indian postal code.
        code: String,
    },
    /// Search localities by area or city name.
    Search {
        /// Area or city name fragment; matched case-insensitively.
        query: String,
    },
    /// Allocate consignment notes for an order.
    Allocate {
        /// Order identifier.
        #[arg(long)]
        order: String,
        /// Number of notes to request, at most 1000.
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    /// List recorded vendor calls, newest first.
    Logs {
        /// Only `success` or `failed` calls.
        #[arg(long)]
        status: Option<CallStatus>,
        /// Only calls to one endpoint.
        #[arg(long)]
        api: Option<ApiName>,
        /// Maximum number of records.
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Emit CSV instead of JSON.
        #[arg(long)]
        csv: bool,
    },
    /// Totals and success rate over the audit log.
    Summary,
}

fn main() -> ExitCode {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Err(write_err) = writeln!(io::stderr().lock(), "courierctl: {err}") {
                drop(write_err);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> io::Result<()> {
    let settings = CourierSettings::load_from_iter([OsString::from("courierctl")])
        .map_err(|err| io::Error::other(format!("load settings: {err}")))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(cli.command, &settings))
}

async fn execute(command: Command, settings: &CourierSettings) -> io::Result<()> {
    let services = CourierServices::from_settings(settings)
        .await
        .map_err(|err| io::Error::other(format!("bootstrap: {err}")))?;

    match command {
        Command::Pincode { code } => {
            let resolved = services.resolver.resolve(&code).await.map_err(io::Error::other)?;
            write_json(&resolved)
        }
        Command::Search { query } => {
            let transport = services
                .credentials
                .current_transport()
                .await
                .map_err(io::Error::other)?;
            let matches = transport
                .search_locality(&query)
                .await
                .map_err(io::Error::other)?;
            write_json(&matches)
        }
        Command::Allocate { order, quantity } => {
            let batch = services
                .allocator
                .allocate(&order, quantity)
                .await
                .map_err(io::Error::other)?;
            write_json(&batch)
        }
        Command::Logs {
            status,
            api,
            limit,
            csv,
        } => {
            let filter = AuditFilter {
                status,
                api_name: api,
                limit: Some(limit),
            };
            if csv {
                let rendered = services
                    .audit
                    .export_csv(&filter)
                    .await
                    .map_err(io::Error::other)?;
                io::stdout().lock().write_all(rendered.as_bytes())
            } else {
                let records = services.audit.filter(&filter).await.map_err(io::Error::other)?;
                write_json(&records)
            }
        }
        Command::Summary => {
            let summary = services.audit.summary().await.map_err(io::Error::other)?;
            write_json(&summary)
        }
    }
}

fn write_json<T: Serialize>(value: &T) -> io::Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)
}
