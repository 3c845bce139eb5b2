//! Translator stage (spec.md §4.4): streaming translation with
//! speculative growing-prefix forwarding.

pub mod client;
pub mod mock;
pub mod stage;
pub mod types;

pub use client::{TranslateRequest, TranslationEvent, TranslationStream, TranslatorClient};
pub use stage::run_translate_stage;
pub use types::Translation;
