//! Keyword and vector scoring.
//!
//! The weights and thresholds below are hand-tuned and kept as-is so scores
//! stay comparable with existing result sets. Treat them as tunable.

use std::collections::HashSet;

use crate::keywords::clean_words;

/// Share of the blended vector score taken from caption/text similarity.
pub const TEXT_WEIGHT: f32 = 0.7;
/// Share of the blended vector score taken from image similarity.
pub const VISUAL_WEIGHT: f32 = 0.3;
/// Blended similarities above this are squared and scaled.
pub const SHARPEN_THRESHOLD: f32 = 0.15;
pub const SHARPEN_GAIN: f32 = 1.3;
/// Vector scores never reach 1.0; that value belongs to full keyword containment.
pub const VECTOR_CEILING: f32 = 0.99;
/// Keyword overlap above this blends in the visual score.
pub const STRONG_TEXT_MATCH: f32 = 0.5;
/// Text share of a strong keyword match; the rest comes from the visual score.
pub const STRONG_BLEND_TEXT: f32 = 0.9;
/// Multiplier applied to weak keyword matches.
pub const WEAK_DAMPING: f32 = 0.5;

/// Dot product of two unit vectors.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn keyword_score(query_words: &HashSet<String>, caption: &str, visual_score: f32) -> f32 {
    if query_words.is_empty() {
        return visual_score;
    }
    let caption_words = clean_words(caption);
    let matches = query_words.intersection(&caption_words).count();
    let text_score = matches as f32 / query_words.len() as f32;
    if text_score >= 1.0 {
        1.0
    } else if text_score > STRONG_TEXT_MATCH {
        text_score * STRONG_BLEND_TEXT + visual_score * (1.0 - STRONG_BLEND_TEXT)
    } else {
        text_score * WEAK_DAMPING
    }
}

/// Blend text and visual cosine similarity, then sharpen anything above the noise floor.
///
/// A missing query side contributes 0. Blends at or below
/// [`SHARPEN_THRESHOLD`] pass through unchanged and may be negative.
pub fn vector_score(
    query_text: Option<&[f32]>,
    query_visual: Option<&[f32]>,
    candidate_text: Option<&[f32]>,
    candidate_visual: Option<&[f32]>,
) -> f32 {
    let text_sim = match (query_text, candidate_text) {
        (Some(q), Some(c)) => cosine(q, c),
        _ => 0.0,
    };
    let visual_sim = match (query_visual, candidate_visual) {
        (Some(q), Some(c)) => cosine(q, c),
        _ => 0.0,
    };
    let blended = text_sim * TEXT_WEIGHT + visual_sim * VISUAL_WEIGHT;
    if blended > SHARPEN_THRESHOLD {
        (blended.max(0.0).powi(2) * SHARPEN_GAIN).min(VECTOR_CEILING)
    } else {
        blended
    }
}

/// What the engine produced for one image or video frame.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub caption: String,
    pub text_embedding: Option<Vec<f32>>,
    pub visual_embedding: Option<Vec<f32>>,
}

/// The resolved query, one variant per scan mode.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringPolicy {
    Keyword { query_words: HashSet<String> },
    Vector { text: Option<Vec<f32>>, visual: Option<Vec<f32>> },
}

/// Keyword mode never has a visual score to blend in.
pub const KEYWORD_VISUAL_SCORE: f32 = 0.0;

impl ScoringPolicy {
    /// Whether candidates need embeddings, or only a caption.
    pub fn needs_embeddings(&self) -> bool { matches!(self, Self::Vector { .. }) }

    /// Whether candidates need a text embedding of their caption.
    pub fn needs_caption_embedding(&self) -> bool { matches!(self, Self::Vector { text: Some(_), .. }) }

    pub fn score(&self, candidate: &Candidate) -> f32 {
        match self {
            Self::Keyword { query_words } => keyword_score(query_words, &candidate.caption, KEYWORD_VISUAL_SCORE),
            Self::Vector { text, visual } => vector_score(
                text.as_deref(),
                visual.as_deref(),
                candidate.text_embedding.as_deref(),
                candidate.visual_embedding.as_deref(),
            ),
        }
    }
}
