use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::KhetError;
use crate::transport::InferenceClient;

const DIAGNOSTIC_PREFIX: &str = "⚠️ Error connecting to model";

/// The text shown in place of an answer when the model call fails.
pub fn diagnostic(err: &KhetError) -> String {
    format!("{DIAGNOSTIC_PREFIX}: {err}")
}

pub fn is_diagnostic(answer: &str) -> bool {
    answer.starts_with(DIAGNOSTIC_PREFIX)
}

/// Answer generation. Never fails: model errors become the answer text.
pub struct AnswerSynth {
    tx: Arc<dyn InferenceClient>,
    stream: bool,
}

impl AnswerSynth {
    pub fn new(tx: Arc<dyn InferenceClient>, stream: bool) -> Self {
        Self { tx, stream }
    }

    pub async fn answer(&self, prompt: &str) -> String {
        match self.tx.complete(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Answer generation failed: {}", e);
                diagnostic(&e)
            }
        }
    }

    /// Growing snapshots of the answer. Falls back to a single one-shot
    /// snapshot when streaming is disabled or cannot be started.
    pub async fn stream_answer(&self, prompt: &str) -> mpsc::Receiver<String> {
        let (out, rx) = mpsc::channel(64);

        let upstream = if self.stream {
            match self.tx.stream_complete(prompt).await {
                Ok(upstream) => Some(upstream),
                Err(e) => {
                    tracing::warn!("Streaming unavailable ({}), falling back to one-shot", e);
                    None
                }
            }
        } else {
            None
        };

        match upstream {
            Some(mut upstream) => {
                tokio::spawn(async move {
                    let mut snapshots = 0usize;
                    while let Some(item) = upstream.recv().await {
                        let text = match item {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::error!("Answer stream failed after {} snapshots: {}", snapshots, e);
                                let _ = out.send(diagnostic(&e)).await;
                                return;
                            }
                        };
                        snapshots += 1;
                        if out.send(text).await.is_err() {
                            return;
                        }
                    }
                    tracing::debug!("Answer stream finished after {} snapshots", snapshots);
                });
            }
            None => {
                let text = self.answer(prompt).await;
                let _ = out.send(text).await;
            }
        }

        rx
    }
}
