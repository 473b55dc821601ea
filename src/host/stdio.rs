//! Stdin/stdout JSON bridge.
//!
//! Reads newline-delimited [`HostMessage`]s from stdin, feeds them to a
//! [`TurnCoordinator`], and writes [`HostOutput`]s (engine requests plus
//! runtime events) as newline-delimited JSON to stdout.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::animation::AnimationSink;
use crate::config::AssistantConfig;
use crate::error::{AssistantError, Result};
use crate::host::contract::{HostMessage, HostOutput};
use crate::llm::{ProviderChain, ResponsePipeline};
use crate::pipeline::coordinator::TurnCoordinator;
use crate::runtime::RuntimeEvent;
use crate::stt::{RecognitionEngine, SessionOptions};
use crate::tts::{SynthesisEngine, Utterance};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};

/// Runtime event broadcast capacity.
const EVENT_CAPACITY: usize = 128;

/// Numbered outbound queue shared by the bridge engines.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<HostOutput>,
    seq: Arc<AtomicU64>,
}

impl Outbound {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostOutput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                seq: Arc::new(AtomicU64::new(1)),
            },
            rx,
        )
    }

    fn next_id(&self) -> String {
        format!("evt_{}", self.seq.fetch_add(1, Ordering::Relaxed))
    }

    /// Queue a request for the host.
    pub fn send(&self, event: &str, payload: serde_json::Value) {
        let out = HostOutput::new(self.next_id(), event, payload);
        if self.tx.send(out).is_err() {
            tracing::debug!(event, "bridge writer gone; dropping output");
        }
    }

    fn runtime(&self, event: &RuntimeEvent) -> HostOutput {
        HostOutput::runtime(self.next_id(), event)
    }
}

/// Speech-to-text engine living in the host.
#[derive(Debug)]
pub struct BridgeRecognizer {
    out: Outbound,
}

impl BridgeRecognizer {
    pub fn new(out: Outbound) -> Self {
        Self { out }
    }
}

impl RecognitionEngine for BridgeRecognizer {
    fn start(&mut self, options: &SessionOptions) -> Result<()> {
        let payload = serde_json::to_value(options)
            .map_err(|e| AssistantError::Recognition(format!("bad session options: {e}")))?;
        self.out.send("recognition.start", payload);
        Ok(())
    }

    fn stop(&mut self) {
        self.out.send("recognition.stop", json!({}));
    }
}

/// Text-to-speech engine living in the host.
#[derive(Debug)]
pub struct BridgeSynthesizer {
    out: Outbound,
}

impl BridgeSynthesizer {
    pub fn new(out: Outbound) -> Self {
        Self { out }
    }
}

impl SynthesisEngine for BridgeSynthesizer {
    fn speak(&mut self, utterance: &Utterance) -> Result<()> {
        let payload = serde_json::to_value(utterance)
            .map_err(|e| AssistantError::Synthesis(format!("bad utterance: {e}")))?;
        self.out.send("synthesis.speak", payload);
        Ok(())
    }

    fn cancel(&mut self) {
        self.out.send("synthesis.cancel", json!({}));
    }
}

/// Animation layer living in the host.
#[derive(Debug)]
pub struct BridgeAnimationSink {
    out: Outbound,
}

impl BridgeAnimationSink {
    pub fn new(out: Outbound) -> Self {
        Self { out }
    }
}

impl AnimationSink for BridgeAnimationSink {
    fn play(&self, name: &str, duration: Duration) {
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.out
            .send("animation.play", json!({ "name": name, "duration_ms": duration_ms }));
    }
}

/// Run the bridge on the process's stdin and stdout.
pub async fn run_stdio_bridge(config: AssistantConfig) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::BufWriter::new(tokio::io::stdout());
    run_bridge(config, stdin, &mut stdout).await
}

/// Run the bridge until the reader hits EOF or a `host.stop` message.
///
/// Engine requests and runtime events are written to `writer` in the order
/// they are produced. Requests still queued when the coordinator exits are
/// flushed before returning.
pub async fn run_bridge<R, W>(config: AssistantConfig, reader: R, writer: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (out, mut out_rx) = Outbound::new();
    let (runtime_tx, mut runtime_rx) = broadcast::channel(EVENT_CAPACITY);

    let pipeline = ResponsePipeline::new(
        config.llm.clone(),
        ProviderChain::from_config(&config.providers),
    );
    let coordinator = TurnCoordinator::new(
        config,
        Box::new(BridgeRecognizer::new(out.clone())),
        Box::new(BridgeSynthesizer::new(out.clone())),
        pipeline,
    )
    .with_animation_sink(Box::new(BridgeAnimationSink::new(out.clone())))
    .with_runtime_events(runtime_tx);
    let handle = coordinator.handle();
    let coordinator_task = tokio::spawn(coordinator.run());

    let mut lines = reader.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line.map_err(|e| {
                    AssistantError::Channel(format!("failed to read from stdin: {e}"))
                })?;
                let Some(line) = line else {
                    tracing::info!("stdin closed (EOF); shutting down bridge");
                    break;
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match parse_line(trimmed) {
                    Ok(Some(event)) => handle.send(event)?,
                    Ok(None) => {
                        tracing::info!("host.stop received; shutting down bridge");
                        break;
                    }
                    Err(message) => {
                        tracing::warn!(raw_line = %trimmed, error = %message, "rejected host message");
                        out.send("host.error", json!({ "message": message }));
                    }
                }
            }
            Some(output) = out_rx.recv() => write_output(writer, &output).await?,
            event = runtime_rx.recv() => match event {
                Ok(event) => write_output(writer, &out.runtime(&event)).await?,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "runtime event forwarder lagged; some events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown();
    match coordinator_task.await {
        Ok(Ok(log)) => tracing::info!(messages = log.len(), "coordinator finished"),
        Ok(Err(e)) => tracing::warn!(error = %e, "coordinator failed"),
        Err(e) => tracing::warn!(error = %e, "coordinator task panicked"),
    }

    // Flush whatever was produced during shutdown, in order.
    while let Ok(event) = runtime_rx.try_recv() {
        write_output(writer, &out.runtime(&event)).await?;
    }
    while let Ok(output) = out_rx.try_recv() {
        write_output(writer, &output).await?;
    }
    Ok(())
}

fn parse_line(line: &str) -> std::result::Result<Option<crate::pipeline::messages::Event>, String> {
    let message: HostMessage =
        serde_json::from_str(line).map_err(|e| format!("failed to parse host message: {e}"))?;
    message.into_event().map_err(|e| e.to_string())
}

/// Write a single JSON line and flush.
async fn write_output<W: AsyncWrite + Unpin>(writer: &mut W, output: &HostOutput) -> Result<()> {
    let json = serde_json::to_string(output)
        .map_err(|e| AssistantError::Pipeline(format!("failed to serialize output: {e}")))?;
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| AssistantError::Channel(format!("failed to write to stdout: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| AssistantError::Channel(format!("failed to write newline to stdout: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| AssistantError::Channel(format!("failed to flush stdout: {e}")))?;
    Ok(())
}
