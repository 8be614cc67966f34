use anyhow::Context;
use clap::Args;
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::oneshot;
use warmup_core::presenter::RELOAD_LABEL;
use warmup_core::{HttpProber, Outcome, Prober, WarmupConfig, WarmupScreen};

use crate::render::{JsonRenderer, Renderer, TerminalRenderer};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Default)]
pub struct WaitArgs {
    /// Per-probe timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub probe_timeout: Option<f64>,

    /// Delay between probe dispatches in seconds
    #[arg(long, value_name = "SECS")]
    pub interval: Option<f64>,

    /// Give up after this many completed probes
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Don't offer a reload when the backend never comes up
    #[arg(long)]
    pub no_prompt: bool,
}

impl WaitArgs {
    fn apply(&self, config: &mut WarmupConfig) {
        if let Some(secs) = self.probe_timeout {
            config.probe_timeout_ms = secs_to_ms(secs);
        }
        if let Some(secs) = self.interval {
            config.dispatch_interval_ms = secs_to_ms(secs);
        }
        if let Some(n) = self.max_attempts {
            config.max_attempts = n;
        }
    }
}

/// Seconds from the command line to config milliseconds. Negative and NaN
/// inputs become 0 and are then rejected by validation; huge ones saturate.
fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(mut config: WarmupConfig, args: WaitArgs, json: bool) -> anyhow::Result<()> {
    args.apply(&mut config);
    config.ensure_valid().context("invalid configuration")?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(wait(config, !args.no_prompt && !json, json));
    // A reload prompt interrupted by Ctrl-C leaves a blocking stdin read behind.
    rt.shutdown_background();
    result
}

async fn wait(config: WarmupConfig, prompt: bool, json: bool) -> anyhow::Result<()> {
    let prober: Arc<dyn Prober> =
        Arc::new(HttpProber::new(&config).context("failed to build probe client")?);
    let mut renderer: Box<dyn Renderer> = if json {
        Box::new(JsonRenderer::default())
    } else {
        Box::new(TerminalRenderer::new()?)
    };

    let (on_ready, mut handed_off) = handoff();
    let mut screen = WarmupScreen::mount(config, prober, on_ready)?;

    loop {
        let outcome = drive(&mut screen, renderer.as_mut()).await?;
        renderer.finish(outcome)?;

        match outcome {
            Outcome::Ready => {
                handed_off
                    .await
                    .context("ready callback was never invoked")?;
                if !json {
                    println!("Backend is ready.");
                }
                return Ok(());
            }
            Outcome::Failed(cause) => {
                if prompt && ask_reload().await? {
                    let (on_ready, rx) = handoff();
                    handed_off = rx;
                    screen = screen.reload(on_ready).await?;
                    if !json {
                        renderer = Box::new(TerminalRenderer::new()?);
                    }
                    continue;
                }
                screen.unmount().await;
                anyhow::bail!(
                    "backend at {} did not become ready ({cause:?})",
                    screen.config().health_url()
                );
            }
            Outcome::Unmounted => {
                anyhow::bail!("interrupted before the backend became ready")
            }
        }
    }
}

/// Render frames until the screen reaches an outcome or the user hits Ctrl-C.
async fn drive(screen: &mut WarmupScreen, renderer: &mut dyn Renderer) -> anyhow::Result<Outcome> {
    let mut frames = screen.subscribe();
    loop {
        tokio::select! {
            biased;
            Some(frame) = frames.next() => renderer.render(&frame)?,
            outcome = screen.finished() => {
                renderer.render(&screen.frame())?;
                return Ok(outcome);
            }
            _ = tokio::signal::ctrl_c() => {
                screen.unmount().await;
                return Ok(Outcome::Unmounted);
            }
        }
    }
}

/// The host side of the ready callback: a oneshot the callback completes.
fn handoff() -> (impl FnOnce() + Send + 'static, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    let on_ready = move || {
        tracing::info!("backend ready, handing control back");
        let _ = tx.send(());
    };
    (on_ready, rx)
}

/// Ask whether to reload. Ctrl-C at the prompt aborts the whole wait.
async fn ask_reload() -> anyhow::Result<bool> {
    eprint!("{RELOAD_LABEL}? [y/N] ");
    std::io::stderr().flush()?;
    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    });
    tokio::select! {
        answer = read => Ok(matches!(answer??.trim(), "y" | "Y" | "yes")),
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            anyhow::bail!("interrupted at the reload prompt")
        }
    }
}
