//! Translator client boundary (spec.md §6 "Translator client").

use async_trait::async_trait;

use voicebridge_foundation::error::TranslateError;

#[derive(Debug, Clone)]
pub struct TranslateRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub enum TranslationEvent {
    Delta(String),
    End,
}

#[async_trait]
pub trait TranslationStream: Send {
    async fn next_event(&mut self) -> Result<Option<TranslationEvent>, TranslateError>;
}

#[async_trait]
pub trait TranslatorClient: Send + Sync {
    async fn translate(
        &self,
        request: TranslateRequest,
    ) -> Result<Box<dyn TranslationStream>, TranslateError>;
}
