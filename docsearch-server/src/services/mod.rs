//! Concrete adapters for the `docsearch-core` trait contracts, plus the
//! search pipeline and ingest pipeline built on top of them.

pub mod blob;
pub mod chat;
pub mod chunking;
pub mod embedding;
pub mod extraction;
pub mod history;
pub mod index;
pub mod ingest;
pub mod orchestrator;
pub mod scoring;

pub use blob::LocalBlobGateway;
pub use chat::LlmChatGateway;
pub use embedding::CachingEmbedder;
pub use index::FusedIndexGateway;
pub use ingest::{IngestPipeline, IngestRequest};
pub use orchestrator::SearchOrchestrator;
