//! Maps a chat model name to a freshly built backend.

use super::backend::ModelBackend;
use super::chunk_source::ChunkOptions;
use super::gemini::{GeminiBackend, GeminiConfig};
use super::openai::{OpenAiBackend, OpenAiConfig};
use super::simulated::{SimulatedBackend, SIMULATED_RESPONSE};
use reqwest::Client;
use tracing::{debug, warn};

// Model names as stored on prompts and listed by /api/models
pub const MODEL_GEMINI_PRO: &str = "Gemini Pro";
pub const MODEL_GPT_4: &str = "GPT-4";
pub const MODEL_GPT_35_TURBO: &str = "GPT-3.5 Turbo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Simulated,
    Gemini,
    OpenAi,
}

impl BackendKind {
    /// Unrecognized names resolve to [`BackendKind::Simulated`].
    pub fn from_model_name(model_name: &str) -> Self {
        let name = model_name.trim();
        if name.eq_ignore_ascii_case(MODEL_GEMINI_PRO) {
            BackendKind::Gemini
        } else if name.eq_ignore_ascii_case(MODEL_GPT_4)
            || name.eq_ignore_ascii_case(MODEL_GPT_35_TURBO)
        {
            BackendKind::OpenAi
        } else {
            BackendKind::Simulated
        }
    }
}

/// Upstream model id for an OpenAI-routed display name
fn openai_model_id(model_name: &str) -> &'static str {
    if model_name.trim().eq_ignore_ascii_case(MODEL_GPT_35_TURBO) {
        "gpt-3.5-turbo"
    } else {
        "gpt-4"
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    pub body: String,
    pub options: ChunkOptions,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            body: SIMULATED_RESPONSE.to_string(),
            options: ChunkOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub simulated: SimulatedConfig,
    pub gemini: Option<GeminiConfig>,
    pub openai: Option<OpenAiConfig>,
}

pub struct BackendSelector {
    settings: BackendSettings,
    client: Client,
}

impl BackendSelector {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            client: Client::new(),
        }
    }

    /// Kind that `select` will actually build for `model_name`, after falling
    /// back for backends with no credentials configured.
    pub fn resolve(&self, model_name: &str) -> BackendKind {
        match BackendKind::from_model_name(model_name) {
            BackendKind::Gemini if self.settings.gemini.is_none() => {
                warn!(
                    "Model {} requested but Gemini is not configured, using simulated backend",
                    model_name
                );
                BackendKind::Simulated
            }
            BackendKind::OpenAi if self.settings.openai.is_none() => {
                warn!(
                    "Model {} requested but OpenAI is not configured, using simulated backend",
                    model_name
                );
                BackendKind::Simulated
            }
            kind => kind,
        }
    }

    /// Build a new backend for one request. Never fails.
    pub fn select(&self, model_name: &str) -> Box<dyn ModelBackend> {
        let kind = self.resolve(model_name);
        debug!("Resolved model {:?} to {:?} backend", model_name, kind);

        match (kind, &self.settings.gemini, &self.settings.openai) {
            (BackendKind::Gemini, Some(config), _) => {
                Box::new(GeminiBackend::new(self.client.clone(), config.clone()))
            }
            (BackendKind::OpenAi, _, Some(config)) => Box::new(OpenAiBackend::new(
                self.client.clone(),
                config.clone(),
                openai_model_id(model_name),
            )),
            _ => Box::new(SimulatedBackend::new(
                self.settings.simulated.body.clone(),
                self.settings.simulated.options,
            )),
        }
    }
}
