//! Narrative generation
//!
//! Purely explanatory. A narrator never fails: any backend problem yields
//! [`FALLBACK_NARRATIVE`], and nothing it returns feeds back into the
//! recommendation or the proposal.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::NarrativeConfig;
use crate::error::NarrativeError;
use crate::types::{ActionProposal, MarketSnapshots, RiskAnalysis};

pub const FALLBACK_NARRATIVE: &str =
    "AI reasoning unavailable. Running deterministic risk interpretation only.";

#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(
        &self,
        analysis: &RiskAnalysis,
        proposal: Option<&ActionProposal>,
        market: &MarketSnapshots,
    ) -> String;
}

/// Always returns the fallback text
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNarrator;

#[async_trait]
impl Narrator for NoopNarrator {
    async fn narrate(
        &self,
        _analysis: &RiskAnalysis,
        _proposal: Option<&ActionProposal>,
        _market: &MarketSnapshots,
    ) -> String {
        FALLBACK_NARRATIVE.to_string()
    }
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

/// Hugging Face inference API text generation
pub struct HuggingFaceNarrator {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl HuggingFaceNarrator {
    pub fn new(config: &NarrativeConfig, access_token: &str) -> Result<Self, NarrativeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NarrativeError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/models/{}",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            access_token: access_token.to_string(),
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError> {
        let body = GenerationRequest {
            inputs: prompt,
            parameters: GenerationParameters {
                max_new_tokens: 200,
                temperature: 0.3,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NarrativeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let generations: Vec<Generation> = response
            .json()
            .await
            .map_err(|e| NarrativeError::Malformed(e.to_string()))?;

        generations
            .into_iter()
            .next()
            .map(|g| g.generated_text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| NarrativeError::Malformed("empty generation".to_string()))
    }
}

#[async_trait]
impl Narrator for HuggingFaceNarrator {
    async fn narrate(
        &self,
        analysis: &RiskAnalysis,
        proposal: Option<&ActionProposal>,
        market: &MarketSnapshots,
    ) -> String {
        let prompt = build_prompt(analysis, proposal, market);
        match self.generate(&prompt).await {
            Ok(text) => {
                debug!("Narrative generated ({} chars)", text.len());
                text
            }
            Err(e) => {
                warn!("Narrative generation failed: {}", e);
                FALLBACK_NARRATIVE.to_string()
            }
        }
    }
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

pub fn build_prompt(
    analysis: &RiskAnalysis,
    proposal: Option<&ActionProposal>,
    market: &MarketSnapshots,
) -> String {
    format!(
        "You are the Autonomous Treasury Guardian. \
         Produce a concise, professional narrative for a treasury dashboard.\n\n\
         RISK STATUS:\n{}\n\n\
         PROPOSED ACTION:\n{}\n\n\
         MARKET DATA:\n{}\n\n\
         Write a 3-5 sentence explanation covering the current treasury state, \
         why the risk level is what it is, why the proposed action is justified, \
         and a short forward-looking note.\n",
        pretty(analysis),
        pretty(&proposal),
        pretty(market),
    )
}

/// HF narrator when a token is configured, otherwise the no-op narrator
pub fn narrator_from_config(config: &NarrativeConfig) -> Arc<dyn Narrator> {
    let Some(token) = config.access_token.as_deref() else {
        debug!("No HF access token, narratives use the fallback text");
        return Arc::new(NoopNarrator);
    };

    match HuggingFaceNarrator::new(config, token) {
        Ok(narrator) => Arc::new(narrator),
        Err(e) => {
            warn!("Falling back to no-op narrator: {}", e);
            Arc::new(NoopNarrator)
        }
    }
}
