pub mod contracts;
pub mod download_token;
pub mod error;
pub mod model;
pub mod sanitize;

pub use contracts::{BlobGateway, BlobMetadata, ChatGateway, Embedder, FieldKind, FieldSpec, HnswParams, IndexGateway, IndexHit, VectorMetric};
pub use download_token::DownloadTokenManager;
pub use error::{CoreError, ErrorMapper};
pub use model::{
  ChatHistoryEntry, ChatRole, ChunkId, DocumentChunk, DocumentSummary, SearchRequest, SearchResponse, SearchResult,
  UploadResponse, NO_INFORMATION_FOUND_MESSAGE,
};
