//! `Translation` — spec.md §3.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Translation {
    pub original_text: String,
    pub translated_text: String,
    pub sequence: u64,
    pub origin_timestamp: Instant,
    pub translation_latency_ms: u64,
    /// The model-level bit carried in record metadata per spec.md §4.4,
    /// not a separate type: a growing-prefix record until the stream
    /// completes, then exactly one record with `is_final = true`.
    pub is_final: bool,
}
