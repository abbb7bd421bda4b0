/*
 *  main.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  ledscroll command line host
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{error, info};

#[cfg(unix)] // Only compile this block on Unix-like systems
use tokio::signal::unix::{signal, SignalKind};

use ledscroll::config::{self, Cli, ScrollConfig};
use ledscroll::display::{DeviceProvider, MockProvider, SpidevProvider};
use ledscroll::scroll::{CancelToken, Scroller};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP and logs which one arrived.
#[cfg(unix)]
async fn signal_handler() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

/// Bring the display up, then scroll (or hold a single glyph) until cancelled.
async fn run<P: DeviceProvider>(
    provider: P,
    settings: &ScrollConfig,
    show_char: Option<char>,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    let mut scroller = match Scroller::initialize(&provider, settings).await {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e.report());
            return Err(e).context("display setup failed");
        }
    };

    match show_char {
        Some(ch) => {
            info!("Showing {:?} until interrupted", ch);
            scroller.show_char(ch).await.context("failed to show character")?;
            cancel.cancelled().await;
        }
        None => {
            scroller.start_scrolling(cancel).await;
        }
    }

    scroller.shutdown(settings.clear_on_exit).await;
    Ok(())
}

#[tokio::main] // Requires the `tokio` runtime with `macros` and `rt-multi-thread` features
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli).context("failed to load configuration")?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        print!("{}", config::to_yaml(&cfg)?);
        return Ok(());
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level()))
        .format_timestamp_secs()
        .init();

    info!("{} v.{} built {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let settings = cfg.scroll_config();
    let cancel = CancelToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler().await {
            error!("Signal handler failed: {}", e);
        }
        stopper.cancel();
    });

    if cli.dry_run {
        info!("Dry run - no SPI device will be touched");
        run(MockProvider::new(), &settings, cli.show_char, &cancel).await
    } else {
        run(SpidevProvider, &settings, cli.show_char, &cancel).await
    }
}
