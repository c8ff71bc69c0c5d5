use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use reqwest::Client;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::config::{InferenceBackend, InferenceConfig};
use crate::error::{KhetError, Result};
use crate::models::{GenerateOptions, GenerateRequest, GenerateResponse};

const SNAPSHOT_BUFFER: usize = 64;

/// Growing snapshots of the generated text; the channel closing means done.
pub type SnapshotReceiver = mpsc::Receiver<Result<String>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Full generated text, trimmed.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Each item is everything generated so far. There is no cancellation:
    /// dropping the receiver only stops delivery, not generation.
    async fn stream_complete(&self, prompt: &str) -> Result<SnapshotReceiver>;
}

pub fn from_config(cfg: &InferenceConfig) -> Result<Arc<dyn InferenceClient>> {
    let client: Arc<dyn InferenceClient> = match cfg.backend {
        InferenceBackend::Http => Arc::new(OllamaHttpTransport::new(cfg)?),
        InferenceBackend::Process => Arc::new(OllamaProcessTransport::new(cfg)),
    };
    Ok(client)
}

pub struct OllamaHttpTransport {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: u8,
}

impl OllamaHttpTransport {
    pub fn new(cfg: &InferenceConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_retries: cfg.max_retries.max(1),
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn request(&self, prompt: &str, stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream,
            options: Some(GenerateOptions {
                temperature: self.temperature,
            }),
        }
    }
}

#[async_trait]
impl InferenceClient for OllamaHttpTransport {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let req = self.request(prompt, false);
        let mut attempts = 0;

        while attempts < self.max_retries {
            attempts += 1;

            match self.client.post(self.generate_url()).json(&req).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body: GenerateResponse = response.json().await.map_err(|e| {
                            KhetError::Inference(format!("Failed to parse Ollama response: {e}"))
                        })?;
                        if let Some(err) = body.error {
                            return Err(KhetError::Inference(err));
                        }
                        return Ok(body.response.trim().to_string());
                    }

                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    if !retryable || attempts >= self.max_retries {
                        return Err(KhetError::Inference(format!(
                            "Ollama API error after {} attempts ({}): {}",
                            attempts,
                            status,
                            response
                                .text()
                                .await
                                .unwrap_or_else(|_| "Unknown error".to_string())
                        )));
                    }
                    tracing::warn!("Ollama returned {}, retrying", status);
                }
                Err(e) => {
                    if attempts >= self.max_retries {
                        return Err(KhetError::Inference(format!(
                            "Failed to reach Ollama after {attempts} attempts: {e}"
                        )));
                    }
                    tracing::warn!("Ollama request failed: {}, retrying", e);
                }
            }

            // Exponential backoff with jitter
            let base_delay = Duration::from_millis(200 * 2u64.pow(attempts.saturating_sub(1) as u32));
            let jitter = rand::thread_rng().gen_range(0.8..=1.2);
            let delay = Duration::from_millis((base_delay.as_millis() as f64 * jitter) as u64);
            sleep(std::cmp::min(delay, Duration::from_secs(30))).await;
        }

        Err(KhetError::Inference(format!(
            "Ollama request failed after {} attempts",
            self.max_retries
        )))
    }

    async fn stream_complete(&self, prompt: &str) -> Result<SnapshotReceiver> {
        let response = self
            .client
            .post(self.generate_url())
            .json(&self.request(prompt, true))
            .send()
            .await
            .map_err(|e| KhetError::Inference(format!("Failed to reach Ollama: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(KhetError::Inference(format!("Ollama API error ({status}): {text}")));
        }

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let mut body = response.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = NdjsonSnapshots::default();
            while let Some(chunk) = body.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(Err(KhetError::Inference(format!("Ollama stream broke: {e}"))))
                            .await;
                        return;
                    }
                };
                for item in decoder.push(&bytes) {
                    let stop = item.is_err();
                    if tx.send(item).await.is_err() || stop {
                        return;
                    }
                }
                if decoder.done {
                    return;
                }
            }
            for item in decoder.finish() {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}

/// Turns Ollama's newline-delimited JSON body into growing snapshots.
#[derive(Default)]
struct NdjsonSnapshots {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl NdjsonSnapshots {
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<String>> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(item) = self.line(&line) {
                let failed = item.is_err();
                out.push(item);
                if failed || self.done {
                    break;
                }
            }
        }
        out
    }

    fn finish(&mut self) -> Vec<Result<String>> {
        let rest = std::mem::take(&mut self.pending);
        if self.done {
            return Vec::new();
        }
        self.line(&rest).into_iter().collect()
    }

    fn line(&mut self, raw: &[u8]) -> Option<Result<String>> {
        let raw = String::from_utf8_lossy(raw);
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let chunk: GenerateResponse = match serde_json::from_str(raw) {
            Ok(chunk) => chunk,
            Err(e) => return Some(Err(KhetError::Json(e))),
        };
        if let Some(err) = chunk.error {
            return Some(Err(KhetError::Inference(err)));
        }
        self.done = chunk.done;
        if chunk.response.is_empty() {
            return None;
        }
        self.text.push_str(&chunk.response);
        Some(Ok(self.text.clone()))
    }
}

/// Turns raw process output into growing snapshots. Invalid bytes become
/// U+FFFD right away; only an incomplete trailing sequence is held back.
#[derive(Default)]
struct TextSnapshots {
    bytes: Vec<u8>,
    ready: usize,
}

impl TextSnapshots {
    fn push(&mut self, chunk: &[u8]) -> Option<String> {
        self.bytes.extend_from_slice(chunk);
        let before = self.ready;
        loop {
            match std::str::from_utf8(&self.bytes[self.ready..]) {
                Ok(s) => {
                    self.ready += s.len();
                    break;
                }
                Err(e) => {
                    self.ready += e.valid_up_to();
                    match e.error_len() {
                        Some(invalid) => self.ready += invalid,
                        None => break,
                    }
                }
            }
        }
        (self.ready > before).then(|| self.snapshot(self.ready))
    }

    fn finish(&mut self) -> Option<String> {
        if self.ready == self.bytes.len() {
            return None;
        }
        self.ready = self.bytes.len();
        Some(self.snapshot(self.ready))
    }

    fn snapshot(&self, end: usize) -> String {
        String::from_utf8_lossy(&self.bytes[..end]).into_owned()
    }
}

/// Runs `<binary> run <model>` and feeds the prompt on stdin.
pub struct OllamaProcessTransport {
    binary: String,
    model: String,
    timeout: Duration,
}

impl OllamaProcessTransport {
    pub fn new(cfg: &InferenceConfig) -> Self {
        Self {
            binary: cfg.ollama_binary.clone(),
            model: cfg.model.clone(),
            timeout: cfg.timeout(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["run", self.model.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> KhetError {
        KhetError::Inference(format!("Failed to start '{} run {}': {e}", self.binary, self.model))
    }
}

fn feed_prompt(stdin: Option<ChildStdin>, prompt: &str) {
    if let Some(mut stdin) = stdin {
        let prompt = prompt.to_string();
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                tracing::warn!("Failed to write prompt to model process: {}", e);
            }
            // stdin dropped here, closing the pipe
        });
    }
}

fn exit_error(status: std::process::ExitStatus, stderr: &str) -> KhetError {
    KhetError::Inference(format!("model process exited with {status}: {}", stderr.trim()))
}

#[async_trait]
impl InferenceClient for OllamaProcessTransport {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut child = self.command().spawn().map_err(|e| self.spawn_error(e))?;
        feed_prompt(child.stdin.take(), prompt);

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                KhetError::Inference(format!(
                    "model process timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            return Err(exit_error(
                output.status,
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn stream_complete(&self, prompt: &str) -> Result<SnapshotReceiver> {
        let mut child = self.command().spawn().map_err(|e| self.spawn_error(e))?;
        feed_prompt(child.stdin.take(), prompt);

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| KhetError::Internal("model process stdout not captured".into()))?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);

        tokio::spawn(async move {
            let mut decoder = TextSnapshots::default();
            let mut buf = [0u8; 1024];

            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Some(snapshot) = decoder.push(&buf[..n]) {
                            if tx.send(Ok(snapshot)).await.is_err() {
                                tracing::debug!("Snapshot receiver dropped; draining model output");
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(KhetError::Io(e))).await;
                        return;
                    }
                }
            }

            if let Some(snapshot) = decoder.finish() {
                let _ = tx.send(Ok(snapshot)).await;
            }

            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    let _ = tx.send(Err(exit_error(status, &stderr))).await;
                }
                Err(e) => {
                    let _ = tx.send(Err(KhetError::Io(e))).await;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut NdjsonSnapshots, input: &[&[u8]]) -> Vec<String> {
        let mut out = Vec::new();
        for part in input {
            for item in decoder.push(part) {
                out.push(item.expect("valid chunk"));
            }
        }
        for item in decoder.finish() {
            out.push(item.expect("valid chunk"));
        }
        out
    }

    #[test]
    fn test_ndjson_snapshots_grow_across_split_chunks() {
        let mut decoder = NdjsonSnapshots::default();
        let snapshots = drain(
            &mut decoder,
            &[
                b"{\"response\":\"Sow \",\"done\":false}\n{\"respo",
                b"nse\":\"in June\",\"done\":false}\n",
                b"{\"response\":\"\",\"done\":true}\n",
            ],
        );
        assert_eq!(snapshots, vec!["Sow ", "Sow in June"]);
        assert!(decoder.done);
    }

    #[test]
    fn test_ndjson_handles_unterminated_last_line() {
        let mut decoder = NdjsonSnapshots::default();
        let snapshots = drain(&mut decoder, &[b"{\"response\":\"ok\",\"done\":true}"]);
        assert_eq!(snapshots, vec!["ok"]);
    }

    #[test]
    fn test_ndjson_reports_model_error() {
        let mut decoder = NdjsonSnapshots::default();
        let items = decoder.push(b"{\"error\":\"model 'x' not found\"}\n");
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(KhetError::Inference(msg)) if msg.contains("not found")));
    }

    #[test]
    fn test_text_snapshots_hold_back_split_character() {
        let mut decoder = TextSnapshots::default();
        // "ಬ" (Kannada ba) is e0 b2 ac
        assert_eq!(decoder.push(b"ok \xe0\xb2").as_deref(), Some("ok "));
        assert_eq!(decoder.push(b"\xac").as_deref(), Some("ok \u{0cac}"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_text_snapshots_keep_growing_past_invalid_byte() {
        let mut decoder = TextSnapshots::default();
        assert_eq!(decoder.push(b"ok ").as_deref(), Some("ok "));
        assert_eq!(decoder.push(b"\xff").as_deref(), Some("ok \u{fffd}"));
        assert_eq!(decoder.push(b"more").as_deref(), Some("ok \u{fffd}more"));
        assert_eq!(decoder.push(b"").as_deref(), None);
        assert_eq!(decoder.push(b" text").as_deref(), Some("ok \u{fffd}more text"));
    }

    #[test]
    fn test_text_snapshots_flush_truncated_tail() {
        let mut decoder = TextSnapshots::default();
        assert_eq!(decoder.push(b"rain\xe0").as_deref(), Some("rain"));
        assert_eq!(decoder.finish().as_deref(), Some("rain\u{fffd}"));
    }

    fn process_config(binary: &str) -> InferenceConfig {
        InferenceConfig {
            ollama_binary: binary.to_string(),
            timeout_seconds: 5,
            ..InferenceConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_inference_error() {
        let transport = OllamaProcessTransport::new(&process_config("/nonexistent/ollama-binary"));
        let err = transport.complete("hello").await.unwrap_err();
        assert!(matches!(err, KhetError::Inference(_)));
        assert!(transport.stream_complete("hello").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_failure_surfaces_exit_status() {
        // `false run <model>` ignores its arguments and exits 1
        let transport = OllamaProcessTransport::new(&process_config("false"));
        let err = transport.complete("hello").await.unwrap_err();
        assert!(err.to_string().contains("exited with"));

        let mut rx = transport.stream_complete("hello").await.expect("spawned");
        let mut last = None;
        while let Some(item) = rx.recv().await {
            last = Some(item);
        }
        assert!(matches!(last, Some(Err(KhetError::Inference(_)))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_stream_emits_growing_snapshots() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("ollama");
        std::fs::write(
            &script,
            "#!/bin/sh\ncat > /dev/null\nprintf 'ok '\nsleep 0.2\nprintf '\\377'\nsleep 0.2\nprintf 'more'\nsleep 0.2\nprintf ' text'\n",
        )
        .expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");

        let transport = OllamaProcessTransport::new(&process_config(
            script.to_str().expect("utf-8 path"),
        ));
        let mut rx = transport.stream_complete("when to sow?").await.expect("spawned");

        let mut snapshots = Vec::new();
        while let Some(item) = rx.recv().await {
            snapshots.push(item.expect("clean exit"));
        }

        assert!(snapshots.len() >= 3, "got {snapshots:?}");
        assert_eq!(snapshots[0], "ok ");
        assert!(snapshots.windows(2).all(|w| w[1].starts_with(w[0].as_str())));
        assert_eq!(snapshots.last().map(String::as_str), Some("ok \u{fffd}more text"));
    }

    #[tokio::test]
    async fn test_http_transport_unreachable() {
        let cfg = InferenceConfig {
            backend: InferenceBackend::Http,
            base_url: "http://127.0.0.1:9".to_string(),
            max_retries: 1,
            ..InferenceConfig::default()
        };
        let transport = OllamaHttpTransport::new(&cfg).expect("client builds");
        assert!(matches!(
            transport.complete("hi").await,
            Err(KhetError::Inference(_))
        ));
        assert!(transport.stream_complete("hi").await.is_err());
    }
}
