pub mod categories;
pub mod classifier;
pub mod config;
pub mod context;
pub mod crops;
pub mod error;
pub mod location;
pub mod models;
pub mod prompt;
pub mod session;
pub mod speech;
pub mod store;
pub mod synth;
pub mod transport;

use std::sync::Arc;

use crate::categories::CategorySet;
use crate::classifier::{LlmClassifier, QuestionClassifier};
use crate::config::Config;
use crate::context::ContextAssembler;
use crate::crops::CropVocabulary;
use crate::error::{KhetError, Result};
use crate::location::LocationResolver;
use crate::models::{ConversationEntry, LocationRecord};
use crate::prompt::compose_prompt;
use crate::session::ConversationLog;
use crate::speech::{NoSpeech, SpeechToText};
use crate::store::ReferenceStore;
use crate::synth::AnswerSynth;
use crate::transport::InferenceClient;

pub struct AdvisorService {
    config: Config,
    resolver: LocationResolver,
    assembler: ContextAssembler,
    classifier: Box<dyn QuestionClassifier>,
    synth: AnswerSynth,
    speech: Arc<dyn SpeechToText>,
}

impl AdvisorService {
    /// Load reference data and connect to the configured model backend.
    pub fn new(cfg: &Config) -> Result<Self> {
        let store = ReferenceStore::load(&cfg.data)?;
        let transport = transport::from_config(&cfg.inference)?;
        Self::with_parts(cfg, store, transport)
    }

    pub fn with_parts(
        cfg: &Config,
        store: ReferenceStore,
        transport: Arc<dyn InferenceClient>,
    ) -> Result<Self> {
        let store = Arc::new(store);
        let resolver = LocationResolver::new(&store.villages)?;
        let assembler = Self::assembler(cfg, store);

        let classifier = LlmClassifier::new(
            Arc::clone(&transport),
            CategorySet::new(cfg.vocabulary.categories.clone()),
        );
        let synth = AnswerSynth::new(Arc::clone(&transport), cfg.inference.stream);

        Ok(Self {
            config: cfg.clone(),
            resolver,
            assembler,
            classifier: Box::new(classifier),
            synth,
            speech: Arc::new(NoSpeech),
        })
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechToText>) -> Self {
        self.speech = speech;
        self
    }

    fn assembler(cfg: &Config, store: Arc<ReferenceStore>) -> ContextAssembler {
        ContextAssembler::new(
            store,
            CropVocabulary::new(cfg.vocabulary.crops.clone()),
            cfg.context,
        )
    }

    /// Re-read every reference table from disk. On failure the current data stays in place.
    pub fn reload_data(&mut self) -> Result<()> {
        let store = Arc::new(ReferenceStore::load(&self.config.data)?);
        self.resolver = LocationResolver::new(&store.villages)?;
        self.assembler = Self::assembler(&self.config, store);
        tracing::info!("Reference data reloaded");
        Ok(())
    }

    pub fn pincodes(&self) -> Vec<u32> {
        self.resolver.pincodes()
    }

    pub fn location(&self, pincode: u32) -> Result<&LocationRecord> {
        self.resolver.resolve(pincode)
    }

    pub fn speech_available(&self) -> bool {
        self.speech.is_available()
    }

    pub async fn transcribe(&self, audio: &[u8]) -> String {
        if !self.speech.is_available() {
            return String::new();
        }
        self.speech.transcribe(audio).await
    }

    /// Answer one question for `pincode`, reporting partial answers through
    /// `on_snapshot`. The entry is appended to `log` once the answer is
    /// complete; a rejected request leaves `log` untouched.
    pub async fn ask<F>(
        &self,
        log: &mut ConversationLog,
        pincode: u32,
        question: &str,
        mut on_snapshot: F,
    ) -> Result<ConversationEntry>
    where
        F: FnMut(&str),
    {
        if question.trim().is_empty() {
            return Err(KhetError::EmptyQuestion);
        }

        let location = self.resolver.resolve(pincode)?;
        tracing::info!(
            pincode,
            state = %location.state,
            district = %location.district,
            "Answering question"
        );

        let ctx = self.assembler.assemble(pincode, &location.state, question);
        let category = self.classifier.classify(question).await;
        let prompt = compose_prompt(&category, &ctx, location, question);

        let mut answer = String::new();
        let mut snapshots = self.synth.stream_answer(&prompt).await;
        while let Some(snapshot) = snapshots.recv().await {
            on_snapshot(&snapshot);
            answer = snapshot;
        }

        let entry = ConversationEntry {
            question: question.to_string(),
            answer: answer.trim().to_string(),
            category,
        };
        log.append(entry.clone());

        Ok(entry)
    }
}
