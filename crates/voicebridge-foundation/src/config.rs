//! Configuration surface (spec.md §6, expanded in SPEC_FULL.md §6.5).
//!
//! A flat, `serde`-deserializable record with an explicit `validate()` step,
//! mirroring the teacher's configuration structs (`coldvox-vad::config`,
//! `coldvox-audio-quality::config`): plain `Default` impls for every nested
//! struct, doc comments only where a default value needs justification.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub recognizer_key: String,
    pub translator_key: String,
    pub synthesizer_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub input_device_id: Option<String>,
    pub output_device_id: Option<String>,
    pub input_gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device_id: None,
            output_device_id: None,
            input_gain: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    pub theta: f32,
    pub min_speech_ms: u32,
    pub min_silence_ms: u32,
    pub pad_ms: u32,
    pub max_utterance_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            theta: 0.5,
            min_speech_ms: 250,
            min_silence_ms: 300,
            pad_ms: 100,
            max_utterance_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    pub language_code: String,
    pub model_id: String,
    pub endpointing_ms: u32,
    pub utterance_end_ms: u32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            language_code: "es-ES".to_string(),
            model_id: "default".to_string(),
            endpointing_ms: 300,
            utterance_end_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            model_id: "default".to_string(),
            temperature: 0.3,
            max_tokens: 512,
            system_prompt: "Translate only; preserve proper nouns; preserve source-language \
                technical terms already in the target lexicon; match formality register; \
                omit meta-commentary."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyPreset {
    Quality,
    Balanced,
    Low,
    Lower,
    Lowest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    pub model_id: String,
    pub stability: f32,
    pub similarity: f32,
    pub style: f32,
    pub latency_preset: LatencyPreset,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            model_id: "default".to_string(),
            stability: 0.5,
            similarity: 0.8,
            style: 0.0,
            latency_preset: LatencyPreset::Lowest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Silent,
    Audible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub passthrough_forced: bool,
    pub metrics_interval_s: u32,
    pub log_level: String,
    pub session_log_path: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            passthrough_forced: false,
            metrics_interval_s: 30,
            log_level: "info".to_string(),
            session_log_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceBridgeConfig {
    pub credentials: Credentials,
    pub voice_id: String,
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub recognizer: RecognizerConfig,
    pub translator: TranslatorConfig,
    pub synthesizer: SynthesizerConfig,
    pub pipeline: PipelineConfig,
    pub output_mode: OutputMode,
}

impl VoiceBridgeConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: VoiceBridgeConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Eager range/non-empty validation. Called once at load time; the
    /// Orchestrator builder never re-validates after construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonempty("credentials.recognizer_key", &self.credentials.recognizer_key)?;
        require_nonempty("credentials.translator_key", &self.credentials.translator_key)?;
        require_nonempty("credentials.synthesizer_key", &self.credentials.synthesizer_key)?;
        require_nonempty("voice_id", &self.voice_id)?;

        require_range("audio.input_gain", self.audio.input_gain, 0.0, 2.0)?;
        require_range("vad.theta", self.vad.theta, 0.0, 1.0)?;
        require_range("translator.temperature", self.translator.temperature, 0.0, 2.0)?;
        require_range("synthesizer.stability", self.synthesizer.stability, 0.0, 1.0)?;
        require_range("synthesizer.similarity", self.synthesizer.similarity, 0.0, 1.0)?;
        require_range("synthesizer.style", self.synthesizer.style, 0.0, 1.0)?;

        if self.vad.min_speech_ms == 0 {
            return Err(ConfigError::Validation {
                field: "vad.min_speech_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.vad.max_utterance_ms <= self.vad.min_speech_ms {
            return Err(ConfigError::Validation {
                field: "vad.max_utterance_ms".to_string(),
                reason: "must exceed vad.min_speech_ms".to_string(),
            });
        }
        if self.pipeline.metrics_interval_s == 0 {
            return Err(ConfigError::Validation {
                field: "pipeline.metrics_interval_s".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

fn require_nonempty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(field.to_string()));
    }
    Ok(())
}

fn require_range(field: &str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Validation {
            field: field.to_string(),
            reason: format!("must be within [{min}, {max}], got {value}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_toml() -> &'static str {
        r#"
        voice_id = "voice-123"
        output_mode = "audible"

        [credentials]
        recognizer_key = "r"
        translator_key = "t"
        synthesizer_key = "s"

        [audio]
        input_gain = 1.0

        [vad]
        theta = 0.5
        min_speech_ms = 250
        min_silence_ms = 300
        pad_ms = 100
        max_utterance_ms = 15000

        [recognizer]
        language_code = "es-ES"
        model_id = "default"
        endpointing_ms = 300
        utterance_end_ms = 500

        [translator]
        model_id = "default"
        temperature = 0.3
        max_tokens = 512
        system_prompt = "translate"

        [synthesizer]
        model_id = "default"
        stability = 0.5
        similarity = 0.8
        style = 0.0
        latency_preset = "lowest"

        [pipeline]
        passthrough_forced = false
        metrics_interval_s = 30
        log_level = "info"
        "#
    }

    #[test]
    fn valid_config_parses_and_validates() {
        let config = VoiceBridgeConfig::from_toml_str(valid_toml()).unwrap();
        assert_eq!(config.voice_id, "voice-123");
    }

    #[test]
    fn out_of_range_gain_is_rejected() {
        let raw = valid_toml().replace("input_gain = 1.0", "input_gain = 3.0");
        let err = VoiceBridgeConfig::from_toml_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn empty_voice_id_is_rejected() {
        let raw = valid_toml().replace("voice-123", "");
        let err = VoiceBridgeConfig::from_toml_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn non_monotonic_vad_window_is_rejected() {
        let raw = valid_toml().replace("max_utterance_ms = 15000", "max_utterance_ms = 100");
        let err = VoiceBridgeConfig::from_toml_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }
}
