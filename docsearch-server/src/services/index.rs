//! Index Gateway: fuses a Meilisearch-backed keyword store with a
//! Postgres + pgvector ANN store behind one `IndexGateway`.
//!
//! Chunks are written to both backends under the same `id`. Keyword and
//! vector retrieval run concurrently and are merged client-side, the same
//! split the hybrid search service this is grounded on uses between its
//! keyword and semantic backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsearch_core::{CoreError, DocumentChunk, FieldKind, FieldSpec, HnswParams, IndexGateway, IndexHit};
use meilisearch_sdk::client::Client as MeiliClient;
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};

pub struct FusedIndexGateway {
  pool: PgPool,
  meili: MeiliClient,
  meili_index: String,
  pg_table: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct MeiliDocument {
  id: String,
  document_id: String,
  chunk_index: u32,
  content: String,
  metadata: Option<String>,
  created_at: DateTime<Utc>,
  original_file_name: Option<String>,
  content_type: Option<String>,
  file_size_bytes: Option<i64>,
  blob_path: Option<String>,
  blob_container: Option<String>,
  text_content_blob_path: Option<String>,
}

impl From<&DocumentChunk> for MeiliDocument {
  fn from(c: &DocumentChunk) -> Self {
    Self {
      id: c.id.0.clone(),
      document_id: c.document_id.clone(),
      chunk_index: c.chunk_index,
      content: c.content.clone(),
      metadata: c.metadata.clone(),
      created_at: c.created_at,
      original_file_name: c.original_file_name.clone(),
      content_type: c.content_type.clone(),
      file_size_bytes: c.file_size_bytes,
      blob_path: c.blob_path.clone(),
      blob_container: c.blob_container.clone(),
      text_content_blob_path: c.text_content_blob_path.clone(),
    }
  }
}

#[derive(FromRow)]
struct ChunkRow {
  id: String,
  document_id: String,
  chunk_index: i32,
  content: String,
  embedding: Vector,
  metadata: Option<String>,
  created_at: DateTime<Utc>,
  original_file_name: Option<String>,
  content_type: Option<String>,
  file_size_bytes: Option<i64>,
  blob_path: Option<String>,
  blob_container: Option<String>,
  text_content_blob_path: Option<String>,
}

impl ChunkRow {
  fn into_chunk(self) -> DocumentChunk {
    DocumentChunk {
      id: docsearch_core::ChunkId(self.id),
      document_id: self.document_id,
      chunk_index: self.chunk_index as u32,
      content: self.content,
      embedding: self.embedding.to_vec(),
      metadata: self.metadata,
      created_at: self.created_at,
      original_file_name: self.original_file_name,
      content_type: self.content_type,
      file_size_bytes: self.file_size_bytes,
      blob_path: self.blob_path,
      blob_container: self.blob_container,
      text_content_blob_path: self.text_content_blob_path,
    }
  }
}

impl FusedIndexGateway {
  /// Exposes the pool for health checks; not part of the `IndexGateway` contract.
  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  pub fn new(pool: PgPool, meili: MeiliClient, index_name: &str) -> Self {
    Self {
      pool,
      meili,
      meili_index: index_name.to_string(),
      pg_table: "document_chunks".to_string(),
    }
  }
}

#[async_trait]
impl IndexGateway for FusedIndexGateway {
  async fn initialize(&self, fields: &[FieldSpec], hnsw: HnswParams) -> Result<(), CoreError> {
    sqlx::query(&format!(
      "CREATE TABLE IF NOT EXISTS {table} (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding VECTOR NOT NULL,
        metadata TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        original_file_name TEXT,
        content_type TEXT,
        file_size_bytes BIGINT,
        blob_path TEXT,
        blob_container TEXT,
        text_content_blob_path TEXT
      )",
      table = self.pg_table
    ))
    .execute(&self.pool)
    .await
    .map_err(CoreError::from)?;

    sqlx::query(&format!(
      "CREATE INDEX IF NOT EXISTS {table}_document_id_idx ON {table} (document_id)",
      table = self.pg_table
    ))
    .execute(&self.pool)
    .await
    .map_err(CoreError::from)?;

    sqlx::query(&format!(
      "CREATE INDEX IF NOT EXISTS {table}_embedding_hnsw_idx ON {table}
       USING hnsw (embedding vector_cosine_ops) WITH (m = {m}, ef_construction = {efc})",
      table = self.pg_table,
      m = hnsw.m,
      efc = hnsw.ef_construction
    ))
    .execute(&self.pool)
    .await
    .map_err(CoreError::from)?;

    self
      .meili
      .create_index(&self.meili_index, Some("id"))
      .await
      .map_err(|e| CoreError::Upstream(e.to_string()))?;

    let index = self.meili.index(&self.meili_index);
    index
      .set_filterable_attributes(&[
        "document_id",
        "chunk_index",
        "blob_path",
        "content_type",
        "original_file_name",
        "text_content_blob_path",
        "file_size_bytes",
        "created_at",
      ])
      .await
      .map_err(|e| CoreError::Upstream(e.to_string()))?;
    index
      .set_sortable_attributes(&["created_at"])
      .await
      .map_err(|e| CoreError::Upstream(e.to_string()))?;

    for field in fields {
      let sql_type = match &field.kind {
        FieldKind::Keyword | FieldKind::Text => "TEXT".to_string(),
        FieldKind::Integer => "BIGINT".to_string(),
        FieldKind::Timestamp => "TIMESTAMPTZ".to_string(),
        FieldKind::Vector { dim, .. } => format!("VECTOR({dim})"),
      };
      sqlx::query(&format!(
        "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {name} {sql_type}",
        table = self.pg_table,
        name = field.name
      ))
      .execute(&self.pool)
      .await
      .map_err(CoreError::from)?;

      if field.filterable || field.sortable {
        sqlx::query(&format!(
          "CREATE INDEX IF NOT EXISTS {table}_{name}_idx ON {table} ({name})",
          table = self.pg_table,
          name = field.name
        ))
        .execute(&self.pool)
        .await
        .map_err(CoreError::from)?;
      }
    }

    Ok(())
  }

  async fn index_chunks(&self, chunks: &[DocumentChunk]) -> Result<(usize, usize), CoreError> {
    if chunks.is_empty() {
      return Ok((0, 0));
    }

    let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
    for chunk in chunks {
      let embedding = Vector::from(chunk.embedding.clone());
      sqlx::query(&format!(
        "INSERT INTO {table}
           (id, document_id, chunk_index, content, embedding, metadata, created_at,
            original_file_name, content_type, file_size_bytes, blob_path, blob_container, text_content_blob_path)
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
         ON CONFLICT (id) DO UPDATE SET
           content = EXCLUDED.content, embedding = EXCLUDED.embedding, metadata = EXCLUDED.metadata,
           original_file_name = EXCLUDED.original_file_name, content_type = EXCLUDED.content_type,
           file_size_bytes = EXCLUDED.file_size_bytes, blob_path = EXCLUDED.blob_path,
           blob_container = EXCLUDED.blob_container, text_content_blob_path = EXCLUDED.text_content_blob_path",
        table = self.pg_table
      ))
      .bind(&chunk.id.0)
      .bind(&chunk.document_id)
      .bind(chunk.chunk_index as i32)
      .bind(&chunk.content)
      .bind(embedding)
      .bind(&chunk.metadata)
      .bind(chunk.created_at)
      .bind(&chunk.original_file_name)
      .bind(&chunk.content_type)
      .bind(chunk.file_size_bytes)
      .bind(&chunk.blob_path)
      .bind(&chunk.blob_container)
      .bind(&chunk.text_content_blob_path)
      .execute(&mut *tx)
      .await
      .map_err(CoreError::from)?;
    }
    tx.commit().await.map_err(CoreError::from)?;

    let documents: Vec<MeiliDocument> = chunks.iter().map(MeiliDocument::from).collect();
    let index = self.meili.index(&self.meili_index);
    match index.add_or_replace(&documents, Some("id")).await {
      Ok(_) => Ok((chunks.len(), 0)),
      Err(e) => {
        tracing::error!(error = %e, "meilisearch indexing failed after postgres commit");
        Ok((0, chunks.len()))
      }
    }
  }

  async fn keyword_search(&self, query: &str, top: usize) -> Result<Vec<IndexHit>, CoreError> {
    let index = self.meili.index(&self.meili_index);
    let results = index
      .search()
      .with_query(query)
      .with_limit(top)
      .execute::<MeiliDocument>()
      .await
      .map_err(|e| CoreError::Upstream(e.to_string()))?;

    Ok(
      results
        .hits
        .into_iter()
        .enumerate()
        .map(|(rank, hit)| IndexHit {
          backend_score: hit.ranking_score.unwrap_or_else(|| 1.0 - (rank as f32 / top.max(1) as f32)),
          chunk: meili_doc_to_chunk(hit.result),
        })
        .collect(),
    )
  }

  async fn vector_search(&self, vector: &[f32], top: usize) -> Result<Vec<IndexHit>, CoreError> {
    self.vector_search_filtered(vector, top, None).await
  }

  async fn hybrid_search(
    &self,
    query: &str,
    vector: &[f32],
    top: usize,
    filter_document_id: Option<&str>,
  ) -> Result<Vec<IndexHit>, CoreError> {
    let fetch = top.min(100);
    let (keyword, semantic) = tokio::join!(
      self.keyword_search_filtered(query, fetch, filter_document_id),
      self.vector_search_filtered(vector, fetch, filter_document_id),
    );
    let keyword = keyword?;
    let semantic = semantic?;

    let mut merged: Vec<IndexHit> = semantic;
    let seen: std::collections::HashSet<String> = merged.iter().map(|h| h.chunk.id.0.clone()).collect();
    for hit in keyword {
      if !seen.contains(&hit.chunk.id.0) {
        merged.push(hit);
      }
    }
    merged.truncate(fetch);
    Ok(merged)
  }

  async fn get_chunk0s(&self, document_ids: &[String]) -> Result<Vec<DocumentChunk>, CoreError> {
    if document_ids.is_empty() {
      return Ok(Vec::new());
    }
    let rows: Vec<ChunkRow> = sqlx::query_as(&format!(
      "SELECT * FROM {table} WHERE chunk_index = 0 AND document_id = ANY($1)",
      table = self.pg_table
    ))
    .bind(document_ids)
    .fetch_all(&self.pool)
    .await
    .map_err(CoreError::from)?;
    Ok(rows.into_iter().map(ChunkRow::into_chunk).collect())
  }

  async fn document_exists(&self, document_id: &str) -> Result<bool, CoreError> {
    let row = sqlx::query(&format!(
      "SELECT 1 FROM {table} WHERE document_id = $1 LIMIT 1",
      table = self.pg_table
    ))
    .bind(document_id)
    .fetch_optional(&self.pool)
    .await
    .map_err(CoreError::from)?;
    Ok(row.is_some())
  }

  async fn delete_document(&self, document_id: &str) -> Result<bool, CoreError> {
    sqlx::query(&format!("DELETE FROM {table} WHERE document_id = $1", table = self.pg_table))
      .bind(document_id)
      .execute(&self.pool)
      .await
      .map_err(CoreError::from)?;

    let index = self.meili.index(&self.meili_index);
    let filter = format!("document_id = \"{document_id}\"");
    index
      .delete_documents_with_filter(filter.as_str().into())
      .await
      .map_err(|e| CoreError::Upstream(e.to_string()))?;

    Ok(true)
  }

  async fn get_chunk_count(&self, document_id: &str) -> Result<usize, CoreError> {
    let row = sqlx::query(&format!(
      "SELECT COUNT(*) AS count FROM {table} WHERE document_id = $1",
      table = self.pg_table
    ))
    .bind(document_id)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)?;
    let count: i64 = row.try_get("count").map_err(CoreError::from)?;
    Ok(count as usize)
  }

  async fn get_last_updated(&self, document_id: &str) -> Result<Option<DateTime<Utc>>, CoreError> {
    let row = sqlx::query(&format!(
      "SELECT MAX(created_at) AS last_updated FROM {table} WHERE document_id = $1",
      table = self.pg_table
    ))
    .bind(document_id)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)?;
    row.try_get("last_updated").map_err(CoreError::from)
  }

  async fn get_top_chunks(&self, document_id: &str, n: usize) -> Result<Vec<DocumentChunk>, CoreError> {
    let rows: Vec<ChunkRow> = sqlx::query_as(&format!(
      "SELECT * FROM {table} WHERE document_id = $1 ORDER BY chunk_index ASC LIMIT $2",
      table = self.pg_table
    ))
    .bind(document_id)
    .bind(n as i64)
    .fetch_all(&self.pool)
    .await
    .map_err(CoreError::from)?;
    Ok(rows.into_iter().map(ChunkRow::into_chunk).collect())
  }

  async fn get_adjacent_chunks(
    &self,
    document_id: &str,
    chunk_index: u32,
    k: usize,
  ) -> Result<Vec<DocumentChunk>, CoreError> {
    let lo = chunk_index as i64 - k as i64;
    let hi = chunk_index as i64 + k as i64;
    let rows: Vec<ChunkRow> = sqlx::query_as(&format!(
      "SELECT * FROM {table} WHERE document_id = $1 AND chunk_index BETWEEN $2 AND $3 ORDER BY chunk_index ASC",
      table = self.pg_table
    ))
    .bind(document_id)
    .bind(lo)
    .bind(hi)
    .fetch_all(&self.pool)
    .await
    .map_err(CoreError::from)?;
    Ok(rows.into_iter().map(ChunkRow::into_chunk).collect())
  }

  async fn list_documents(
    &self,
    max_results: usize,
    skip: usize,
    document_id_filter: Option<&str>,
  ) -> Result<Vec<docsearch_core::model::DocumentSummary>, CoreError> {
    let document_ids: Vec<String> = if let Some(id) = document_id_filter {
      sqlx::query_scalar(&format!(
        "SELECT DISTINCT document_id FROM {table} WHERE document_id = $1",
        table = self.pg_table
      ))
      .bind(id)
      .fetch_all(&self.pool)
      .await
      .map_err(CoreError::from)?
    } else {
      sqlx::query_scalar(&format!(
        "SELECT document_id FROM {table} WHERE chunk_index = 0
         ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        table = self.pg_table
      ))
      .bind(max_results as i64)
      .bind(skip as i64)
      .fetch_all(&self.pool)
      .await
      .map_err(CoreError::from)?
    };

    let mut summaries = Vec::with_capacity(document_ids.len());
    for document_id in document_ids {
      let chunk0s = self.get_chunk0s(std::slice::from_ref(&document_id)).await?;
      let chunk0 = chunk0s.into_iter().next();
      let chunk_count = self.get_chunk_count(&document_id).await?;
      let last_updated = self.get_last_updated(&document_id).await?;
      let sample_chunks = self
        .get_top_chunks(&document_id, 3)
        .await?
        .into_iter()
        .map(|c| c.content)
        .collect();

      summaries.push(docsearch_core::model::DocumentSummary {
        document_id,
        original_file_name: chunk0.as_ref().and_then(|c| c.original_file_name.clone()),
        content_type: chunk0.as_ref().and_then(|c| c.content_type.clone()),
        chunk_count,
        last_updated,
        sample_chunks,
      });
    }

    Ok(summaries)
  }
}

impl FusedIndexGateway {
  async fn keyword_search_filtered(
    &self,
    query: &str,
    top: usize,
    filter_document_id: Option<&str>,
  ) -> Result<Vec<IndexHit>, CoreError> {
    let index = self.meili.index(&self.meili_index);
    let filter = filter_document_id.map(|id| format!("document_id = \"{id}\""));
    let mut search = index.search();
    search.with_query(query).with_limit(top);
    if let Some(f) = &filter {
      search.with_filter(f);
    }
    let results = search
      .execute::<MeiliDocument>()
      .await
      .map_err(|e| CoreError::Upstream(e.to_string()))?;

    Ok(
      results
        .hits
        .into_iter()
        .enumerate()
        .map(|(rank, hit)| IndexHit {
          backend_score: hit.ranking_score.unwrap_or_else(|| 1.0 - (rank as f32 / top.max(1) as f32)),
          chunk: meili_doc_to_chunk(hit.result),
        })
        .collect(),
    )
  }

  async fn vector_search_filtered(
    &self,
    vector: &[f32],
    top: usize,
    filter_document_id: Option<&str>,
  ) -> Result<Vec<IndexHit>, CoreError> {
    let embedding = Vector::from(vector.to_vec());
    let rows: Vec<(ChunkRow, f64)> = if let Some(document_id) = filter_document_id {
      sqlx::query_as(&format!(
        "SELECT *, 1 - (embedding <=> $1) AS score FROM {table}
         WHERE document_id = $2 ORDER BY embedding <=> $1 LIMIT $3",
        table = self.pg_table
      ))
      .bind(&embedding)
      .bind(document_id)
      .bind(top as i64)
      .fetch_all(&self.pool)
      .await
      .map_err(CoreError::from)?
    } else {
      sqlx::query_as(&format!(
        "SELECT *, 1 - (embedding <=> $1) AS score FROM {table} ORDER BY embedding <=> $1 LIMIT $2",
        table = self.pg_table
      ))
      .bind(&embedding)
      .bind(top as i64)
      .fetch_all(&self.pool)
      .await
      .map_err(CoreError::from)?
    };

    Ok(
      rows
        .into_iter()
        .map(|(row, score)| IndexHit {
          backend_score: score as f32,
          chunk: row.into_chunk(),
        })
        .collect(),
    )
  }
}

fn meili_doc_to_chunk(doc: MeiliDocument) -> DocumentChunk {
  DocumentChunk {
    id: docsearch_core::ChunkId(doc.id),
    document_id: doc.document_id,
    chunk_index: doc.chunk_index,
    content: doc.content,
    embedding: Vec::new(),
    metadata: doc.metadata,
    created_at: doc.created_at,
    original_file_name: doc.original_file_name,
    content_type: doc.content_type,
    file_size_bytes: doc.file_size_bytes,
    blob_path: doc.blob_path,
    blob_container: doc.blob_container,
    text_content_blob_path: doc.text_content_blob_path,
  }
}
