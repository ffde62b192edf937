//! nRF 802.15.4 sniffer - Wireshark extcap bridge
//!
//! Reads frame reports from the nRF sniffer firmware over a serial link and
//! streams them to Wireshark as a live pcap capture.

mod capture;
mod config;
mod device;
mod error;
mod extcap;
mod fifo;
mod pcap;
mod sniffer;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use capture::CaptureSession;
use config::Cli;
use device::SerialOpener;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries extcap answers or the capture itself, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nrf802154_sniffer=info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    if cli.extcap_interfaces {
        println!("{}", extcap::interfaces());
    }

    if cli.extcap_dlts {
        println!("{}", extcap::dlts());
    }

    if cli.extcap_config {
        let ports = extcap::available_ports();
        println!(
            "{}",
            extcap::config(cli.extcap_reload_option.as_deref(), &ports)
        );
    }

    if cli.capture {
        run_capture(&cli).await?;
    }

    Ok(())
}

/// Run one capture session until it stops or a stop signal arrives
async fn run_capture(cli: &Cli) -> Result<()> {
    let config = cli.session_config().context("invalid capture configuration")?;
    let opener = SerialOpener::new(cli.serial_config());

    let mut session = CaptureSession::new(config, Box::new(opener));
    let stop = session.stop_handle();

    let mut capture = tokio::task::spawn_blocking(move || session.run());

    let result = tokio::select! {
        result = &mut capture => result,
        _ = shutdown_signal() => {
            info!("Stop signal received");
            stop.stop();
            capture.await
        }
    };

    let summary = result.context("capture task failed")??;
    info!(
        "Shutdown complete. Records written: {}",
        summary.records_written
    );
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
