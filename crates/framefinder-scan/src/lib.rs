pub mod keywords;
pub mod orchestrator;
pub mod query;
pub mod scoring;
pub mod service;

pub use keywords::clean_words;
pub use orchestrator::{Orchestrator, ScanError, ScanPhase, ScanSink, ScanSummary, SkipReason};
pub use query::{describe_query, resolve_query};
pub use scoring::{cosine, keyword_score, vector_score, Candidate, ScoringPolicy};
pub use service::{ChannelSink, ScanEvent, ScanHandle, ScanRequest, ScanService, ValidationError};
