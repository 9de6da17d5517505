use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use viper_config::EcuConfig;
use viper_core::{ChannelScheduler, DeviceId, Ecu, ShmOpener, SignalKind};

const USAGE: &str = "usage: viper <config.toml> [run | generate | signal <SIGUSR1|SIGUSR2|SIGALRM> <device id>]";

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(config_path) = args.first() else {
        bail!(USAGE);
    };
    let config = EcuConfig::load(config_path).with_context(|| format!("loading {config_path}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let (scheduler, events) = ChannelScheduler::new();
    let mut ecu = Ecu::from_config(&config, Arc::new(scheduler), ShmOpener::new(config.poll_interval()));

    match args.get(1).map(String::as_str).unwrap_or("run") {
        "generate" => {
            ecu.generate().context("generating artifacts")?;
        }
        "signal" => {
            let (Some(kind), Some(device)) = (args.get(2), args.get(3)) else {
                bail!(USAGE);
            };
            let kind: SignalKind = kind.parse()?;
            let device = DeviceId(device.parse().with_context(|| format!("device id '{device}'"))?);
            // no reader: pending notifications belong to the running host
            ecu.open_session().context("opening session")?;
            let sent = ecu.send_signal(kind, device);
            ecu.kill();
            sent.with_context(|| format!("sending {kind} to device {device}"))?;
            tracing::info!(%kind, %device, "signal sent");
        }
        "run" => {
            ecu.start().context("starting ecu")?;
            loop {
                match events.recv_timeout(Duration::from_millis(250)) {
                    Ok(event) => tracing::info!(?event, "event"),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                for err in ecu.reader_errors() {
                    tracing::error!(error = %err, "reader fault");
                }
                if !ecu.is_running() {
                    tracing::warn!(state = ?ecu.reader_state(), "reader no longer running, shutting down");
                    break;
                }
            }
            ecu.kill();
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }
    Ok(())
}
