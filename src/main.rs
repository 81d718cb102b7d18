use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scribe_stream::{Config, Session, WavCaptureSource, WsConnector};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "scribe-stream",
    about = "Stream a WAV file to a live transcription service"
)]
struct Args {
    /// WAV file used as the capture source
    wav: PathBuf,

    /// Channel URL (overrides the config file)
    #[arg(long)]
    url: Option<String>,

    /// API key (overrides the config file)
    #[arg(long)]
    api_key: Option<String>,

    /// Config file path
    #[arg(long, default_value = "config/scribe-stream")]
    config: String,

    /// Only report finalized words
    #[arg(long)]
    finals_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let cfg = Config::load(&args.config).ok();
    if let Some(cfg) = &cfg {
        info!("Loaded config: {}", cfg.service.name);
    }

    let url = args
        .url
        .or_else(|| cfg.as_ref().map(|c| c.channel.url.clone()))
        .context("no channel url: pass --url or provide a config file")?;
    let api_key = args
        .api_key
        .or_else(|| cfg.as_ref().and_then(|c| c.channel.api_key.clone()))
        .unwrap_or_default();

    let mut session = Session::new(
        Arc::new(WavCaptureSource::new(&args.wav)),
        Arc::new(WsConnector),
    );
    session.set_channel_url(url)?;
    session.set_api_key(api_key)?;
    session.set_include_nonfinal(!args.finals_only)?;
    if let Some(cfg) = &cfg {
        session.set_timeslice(Duration::from_millis(cfg.audio.timeslice_ms))?;
        session.set_max_chunk_bytes(cfg.audio.max_chunk_bytes)?;
    }

    let (done_tx, mut done_rx) = mpsc::channel::<Result<(), String>>(1);

    session.on_partial_result(|transcript| {
        print!("\r{}", transcript.text());
        std::io::Write::flush(&mut std::io::stdout()).ok();
    })?;
    let tx = done_tx.clone();
    session.on_finished(move || {
        let _ = tx.try_send(Ok(()));
    })?;
    let tx = done_tx.clone();
    session.on_error(move |e| {
        let _ = tx.try_send(Err(e.to_string()));
    })?;

    session.start().await?;
    info!("Session started; press Ctrl-C to stop early");

    let outcome = tokio::select! {
        outcome = done_rx.recv() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Stopping session");
            // The session may have finished on its own in the meantime.
            if let Err(e) = session.stop().await {
                info!("Stop ignored: {e}");
            }
            done_rx.recv().await
        }
    };

    if let Some(Err(message)) = outcome {
        anyhow::bail!("transcription failed: {message}");
    }

    let transcript = session.transcript_snapshot();
    println!("\n{}", transcript.text());

    let stats = session.stats();
    info!(
        chunks_sent = stats.chunks_sent,
        bytes_sent = stats.bytes_sent,
        results_received = stats.results_received,
        "Session complete"
    );

    Ok(())
}
