//! Qdrant-backed chunk storage.
//!
//! Collections are namespaced with [`COLLECTION_PREFIX`] so redline's
//! data is distinguishable from other tenants of a shared Qdrant
//! instance. Chunk metadata is persisted as flat payload fields and
//! round-trips unchanged into [`RetrievedResult`]s.

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
    Filter, PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};

use crate::chunker::Chunk;
use crate::error::{IndexError, Result};

/// Namespace prefix for every collection this tool creates.
pub const COLLECTION_PREFIX: &str = "redline_";

/// Flat metadata persisted per chunk. String/integer fields only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub unit_type: String,
    pub unit_name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
}

/// One vector-search hit with decoded payload.
///
/// `distance` is a similarity cost: smaller is better. Qdrant reports
/// cosine similarity (larger is better), converted at this boundary.
#[derive(Debug, Clone)]
pub struct RetrievedResult {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

/// Qdrant client bound to one namespaced collection.
pub struct ChunkStore {
    qdrant: Qdrant,
    collection: String,
}

impl ChunkStore {
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be constructed.
    pub fn connect(url: &str, collection: &str) -> Result<Self> {
        let qdrant = Qdrant::from_url(url).build()?;
        Ok(Self {
            qdrant,
            collection: prefixed(collection),
        })
    }

    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Create the collection if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant operations fail.
    pub async fn ensure_collection(&self, vector_size: u64) -> Result<()> {
        if self.qdrant.collection_exists(&self.collection).await? {
            return Ok(());
        }

        self.qdrant
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await?;

        self.qdrant
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                "language",
                FieldType::Keyword,
            ))
            .await?;

        Ok(())
    }

    /// Upsert chunks with their embeddings. Ids are deterministic, so
    /// re-indexing unchanged code overwrites in place.
    ///
    /// # Errors
    ///
    /// Returns an error if a chunk is missing its embedding or the
    /// Qdrant upsert fails.
    pub async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let Some(vector) = chunk.embedding.clone() else {
                return Err(IndexError::Other(format!(
                    "chunk {} has no embedding attached",
                    chunk.id
                )));
            };
            let payload = chunk_payload(chunk)?;
            points.push(PointStruct::new(chunk.id.clone(), vector, payload));
        }

        if points.is_empty() {
            return Ok(0);
        }

        let count = points.len();
        self.qdrant
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await?;
        Ok(count)
    }

    /// Search for similar chunks, optionally filtered by language id.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant search fails.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        top_k: usize,
        language: Option<&str>,
    ) -> Result<Vec<RetrievedResult>> {
        let mut builder =
            SearchPointsBuilder::new(&self.collection, query_vector, top_k as u64)
                .with_payload(true);

        if let Some(lang) = language {
            builder = builder.filter(Filter::must(vec![Condition::matches(
                "language",
                lang.to_string(),
            )]));
        }

        let results = self.qdrant.search_points(builder).await?;

        Ok(results
            .result
            .iter()
            .filter_map(RetrievedResult::from_scored_point)
            .collect())
    }

    /// List this tool's collections (names carrying the prefix).
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant call fails.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self.qdrant.list_collections().await?;
        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .filter(|name| name.starts_with(COLLECTION_PREFIX))
            .collect())
    }

    /// Delete one of this tool's collections by bare or prefixed name.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant call fails.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.qdrant.delete_collection(prefixed(name)).await?;
        Ok(())
    }
}

/// Apply the namespace prefix unless already present.
#[must_use]
pub fn prefixed(name: &str) -> String {
    if name.starts_with(COLLECTION_PREFIX) {
        name.to_string()
    } else {
        format!("{COLLECTION_PREFIX}{name}")
    }
}

fn chunk_payload(
    chunk: &Chunk,
) -> Result<std::collections::HashMap<String, qdrant_client::qdrant::Value>> {
    let payload = serde_json::from_value(serde_json::json!({
        "document": chunk.text,
        "file_path": chunk.file_path,
        "unit_type": chunk.unit_type.id(),
        "unit_name": chunk.name,
        "start_line": chunk.start_line,
        "end_line": chunk.end_line,
        "language": chunk.language.id(),
    }))?;
    Ok(payload)
}

impl RetrievedResult {
    fn from_scored_point(point: &ScoredPoint) -> Option<Self> {
        let payload = &point.payload;
        let get_str = |key: &str| {
            payload
                .get(key)
                .and_then(qdrant_client::qdrant::Value::as_str)
                .cloned()
        };
        let get_int = |key: &str| {
            payload
                .get(key)
                .and_then(qdrant_client::qdrant::Value::as_integer)
                .and_then(|v| usize::try_from(v).ok())
        };

        let id = point.id.as_ref().map(point_id_string)?;

        Some(Self {
            id,
            document: get_str("document")?,
            metadata: ChunkMetadata {
                file_path: get_str("file_path")?,
                unit_type: get_str("unit_type")?,
                unit_name: get_str("unit_name")?,
                start_line: get_int("start_line")?,
                end_line: get_int("end_line")?,
                language: get_str("language")?,
            },
            distance: score_to_distance(point.score),
        })
    }
}

fn point_id_string(id: &qdrant_client::qdrant::PointId) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match &id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

/// Convert a cosine similarity score to a non-negative distance.
#[must_use]
pub fn score_to_distance(score: f32) -> f32 {
    (1.0 - score).max(0.0)
}
