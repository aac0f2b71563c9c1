use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use waypoint_config::search::ShapingConfig;

use crate::error::SearchError;
use crate::result::SearchResponse;

/// How the caller wants the response delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseMode {
    #[default]
    Single,
    Compressed,
    Batched,
    Streamed,
}

/// Shapes search responses for delivery: progressive-loading envelopes,
/// gzip framing for large payloads, and batch/chunk splitting.
pub struct ResponseShaper {
    config: ShapingConfig,
}

impl ResponseShaper {
    pub fn new(config: ShapingConfig) -> Self {
        Self { config }
    }

    /// Shape a formatted response document for single-shot or compressed
    /// delivery. Batched and streamed modes use their dedicated methods.
    pub fn shape(
        &self,
        mut document: Value,
        response: &SearchResponse,
        mode: ResponseMode,
    ) -> Result<Value, SearchError> {
        let initial_size = document.to_string().len();

        if self.config.enable_progressive_loading {
            self.add_progressive_loading(&mut document, response);
        }

        if self.config.include_performance_metrics {
            let metrics = self.performance_metrics(response, initial_size, &document)?;
            if let Some(object) = document.as_object_mut() {
                object.insert("performanceMetrics".to_string(), metrics);
            }
        }

        if mode == ResponseMode::Compressed && self.config.compress_large_responses {
            return self.compress(document);
        }
        Ok(document)
    }

    /// Embed only the first page and describe the rest in a `loadingState`
    /// block.
    fn add_progressive_loading(&self, document: &mut Value, response: &SearchResponse) {
        let per_page = self.config.results_per_page.max(1);

        let Some(results) = document.get_mut("results").and_then(Value::as_array_mut) else {
            return;
        };
        let embedded = results.len();
        let total_count = (response.total_count as usize).max(embedded);

        let mut paged = false;
        if embedded > per_page {
            results.truncate(per_page);
            paged = true;
        }
        let loaded = embedded.min(per_page);

        let total_pages = total_count.div_ceil(per_page).min(self.config.max_pages);
        let loading_state = json!({
            "totalResults": total_count,
            "loadedResults": loaded,
            "currentPage": 1,
            "totalPages": total_pages,
            "hasMore": embedded > per_page || response.has_more,
            "nextCursor": response.cursor,
            "loadProgress": loaded as f64 / total_count.max(1) as f64,
        });

        if let Some(object) = document.as_object_mut() {
            if paged {
                object.insert("resultsPaged".to_string(), Value::Bool(true));
            }
            object.insert("loadingState".to_string(), loading_state);
        }
    }

    fn performance_metrics(
        &self,
        response: &SearchResponse,
        initial_size: usize,
        document: &Value,
    ) -> Result<Value, SearchError> {
        let shaped_size = document.to_string().len();

        let (compressed_size, compression_ratio) = if self.config.compress_large_responses
            && initial_size > self.config.compression_threshold_bytes
        {
            let compressed = gzip(document.to_string().as_bytes())?;
            let size = compressed.len();
            (Some(size), Some(size as f64 / initial_size as f64))
        } else {
            (None, None)
        };

        Ok(json!({
            "queryTimeMs": response.execution_time_ms.unwrap_or(0.0),
            "resultCount": response.results.len(),
            "totalCount": response.total_count,
            "responseSizeBytes": shaped_size,
            "compressedSizeBytes": compressed_size,
            "compressionRatio": compression_ratio,
            "cacheHit": response.cache_hit,
            "queryComplexity": query_complexity(response),
        }))
    }

    /// Gzip + base64 wrapper for documents above the size threshold.
    /// Documents at or below it pass through untouched.
    pub fn compress(&self, document: Value) -> Result<Value, SearchError> {
        let serialized = document.to_string();
        let original_size = serialized.len();
        if original_size <= self.config.compression_threshold_bytes {
            return Ok(document);
        }

        let compressed = gzip(serialized.as_bytes())?;
        let compressed_size = compressed.len();
        debug!(
            "Compressed response: {original_size} bytes down to {compressed_size} bytes"
        );

        Ok(json!({
            "compressed": true,
            "originalSize": original_size,
            "compressedSize": compressed_size,
            "compressionRatio": compressed_size as f64 / original_size as f64,
            "format": "gzip+base64",
            "data": BASE64.encode(&compressed),
        }))
    }

    /// Inverse of [`compress`](Self::compress); uncompressed documents pass
    /// through.
    pub fn decompress(&self, document: Value) -> Result<Value, SearchError> {
        if document.get("compressed") != Some(&Value::Bool(true)) {
            return Ok(document);
        }

        let data = document
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| SearchError::Shaping("compressed wrapper has no data".to_string()))?;
        let compressed = BASE64
            .decode(data)
            .map_err(|e| SearchError::Shaping(format!("invalid base64 payload: {e}")))?;

        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut raw = String::new();
        decoder
            .read_to_string(&mut raw)
            .map_err(|e| SearchError::Shaping(format!("gzip decode failed: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| SearchError::Shaping(format!("decompressed payload is not JSON: {e}")))
    }

    /// Split a response into batches of at most `max_batch_size` results.
    pub fn batches(&self, document: &Value, response: &SearchResponse) -> Vec<Value> {
        let results = document
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let batch_size = self.config.max_batch_size.max(1);
        if results.len() <= batch_size {
            return vec![document.clone()];
        }

        let total_batches = results.len().div_ceil(batch_size);
        results
            .chunks(batch_size)
            .enumerate()
            .map(|(index, chunk)| {
                let mut batch = document.clone();
                if let Some(object) = batch.as_object_mut() {
                    object.insert("results".to_string(), Value::Array(chunk.to_vec()));
                    object.insert("batchIndex".to_string(), json!(index));
                    object.insert("totalBatches".to_string(), json!(total_batches));
                    object.insert("batchSize".to_string(), json!(chunk.len()));
                    object.insert(
                        "hasMore".to_string(),
                        json!(index < total_batches - 1 || response.has_more),
                    );
                }
                batch
            })
            .collect()
    }

    /// Split results into streaming chunks of at most `stream_chunk_size`.
    pub fn stream_chunks(&self, document: &Value, response: &SearchResponse) -> Vec<Value> {
        let results = document
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let chunk_size = self.config.stream_chunk_size.max(1);
        let total_chunks = results.len().div_ceil(chunk_size).max(1);

        if results.is_empty() {
            return vec![json!({
                "chunkIndex": 0,
                "totalChunks": 1,
                "results": [],
                "hasMore": false,
                "totalCount": response.total_count,
            })];
        }

        results
            .chunks(chunk_size)
            .enumerate()
            .map(|(index, chunk)| {
                json!({
                    "chunkIndex": index,
                    "totalChunks": total_chunks,
                    "results": chunk,
                    "hasMore": index < total_chunks - 1,
                    "totalCount": response.total_count,
                })
            })
            .collect()
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, SearchError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SearchError::Shaping(format!("gzip encode failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SearchError::Shaping(format!("gzip encode failed: {e}")))
}

/// 1–10 complexity estimate used in the metrics block.
fn query_complexity(response: &SearchResponse) -> u32 {
    let query = &response.query;
    let mut complexity: u32 = 1;
    complexity += (query.resource_types.len() as u32).min(2);
    complexity += (query.conditions.len() as u32).min(3);
    if query.sort.is_some() {
        complexity += 1;
    }
    if query.text.as_deref().map(str::len).unwrap_or(0) > 10 {
        complexity += 1;
    }
    complexity.min(10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryBuilder, ResourceType};
    use crate::result::SearchResult;
    use pretty_assertions::assert_eq;

    fn shaper() -> ResponseShaper {
        ResponseShaper::new(ShapingConfig::default())
    }

    fn response_with_results(count: usize) -> SearchResponse {
        let query = QueryBuilder::new().parse("type:issue payload").unwrap();
        let results = (0..count)
            .map(|i| SearchResult {
                id: format!("id-{i}"),
                resource_type: ResourceType::Issue,
                title: format!("Result {i}"),
                url: None,
                description: Some("x".repeat(400)),
                identifier: Some(format!("ENG-{i}")),
                created_at: None,
                updated_at: None,
                team: None,
                additional_data: Map::new(),
                score: None,
                description_truncated: None,
            })
            .collect::<Vec<_>>();
        SearchResponse {
            total_count: count as u64,
            results,
            has_more: false,
            cursor: None,
            query,
            execution_time_ms: Some(12.5),
            cache_hit: false,
        }
    }

    #[test]
    fn compress_then_decompress_is_identity() {
        let shaper = shaper();
        let response = response_with_results(60);
        let document = serde_json::to_value(&response).unwrap();

        let compressed = shaper.compress(document.clone()).unwrap();
        assert_eq!(compressed["compressed"], true);
        assert_eq!(compressed["format"], "gzip+base64");
        let original_size = compressed["originalSize"].as_u64().unwrap();
        let compressed_size = compressed["compressedSize"].as_u64().unwrap();
        assert!(compressed_size < original_size);

        let recovered = shaper.decompress(compressed).unwrap();
        assert_eq!(recovered, document);
    }

    #[test]
    fn small_documents_skip_compression() {
        let shaper = shaper();
        let document = json!({"results": [], "totalCount": 0});
        let shaped = shaper.compress(document.clone()).unwrap();
        assert_eq!(shaped, document);
    }

    #[test]
    fn progressive_loading_embeds_first_page() {
        let shaper = shaper();
        let response = response_with_results(50);
        let document = serde_json::to_value(&response).unwrap();

        let shaped = shaper
            .shape(document, &response, ResponseMode::Single)
            .unwrap();

        assert_eq!(shaped["results"].as_array().unwrap().len(), 20);
        assert_eq!(shaped["resultsPaged"], true);
        let state = &shaped["loadingState"];
        assert_eq!(state["totalResults"], 50);
        assert_eq!(state["loadedResults"], 20);
        assert_eq!(state["currentPage"], 1);
        assert_eq!(state["totalPages"], 3);
        assert_eq!(state["hasMore"], true);
        assert_eq!(state["loadProgress"], 0.4);
    }

    #[test]
    fn metrics_block_reports_query_shape() {
        let shaper = shaper();
        let response = response_with_results(3);
        let document = serde_json::to_value(&response).unwrap();

        let shaped = shaper
            .shape(document, &response, ResponseMode::Single)
            .unwrap();

        let metrics = &shaped["performanceMetrics"];
        assert_eq!(metrics["queryTimeMs"], 12.5);
        assert_eq!(metrics["resultCount"], 3);
        assert_eq!(metrics["cacheHit"], false);
        assert!(metrics["queryComplexity"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn batches_split_and_flag_continuation() {
        let shaper = ResponseShaper::new(ShapingConfig {
            max_batch_size: 10,
            ..ShapingConfig::default()
        });
        let response = response_with_results(25);
        let document = serde_json::to_value(&response).unwrap();

        let batches = shaper.batches(&document, &response);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0]["batchIndex"], 0);
        assert_eq!(batches[0]["totalBatches"], 3);
        assert_eq!(batches[0]["batchSize"], 10);
        assert_eq!(batches[0]["hasMore"], true);
        assert_eq!(batches[2]["batchSize"], 5);
        assert_eq!(batches[2]["hasMore"], false);
    }

    #[test]
    fn stream_chunks_cover_all_results() {
        let shaper = shaper();
        let response = response_with_results(12);
        let document = serde_json::to_value(&response).unwrap();

        let chunks = shaper.stream_chunks(&document, &response);
        assert_eq!(chunks.len(), 3);
        let total: usize = chunks
            .iter()
            .map(|c| c["results"].as_array().unwrap().len())
            .sum();
        assert_eq!(total, 12);
        assert_eq!(chunks[2]["hasMore"], false);
        assert_eq!(chunks[0]["totalCount"], 12);
    }

    #[test]
    fn empty_results_stream_as_single_empty_chunk() {
        let shaper = shaper();
        let response = response_with_results(0);
        let document = serde_json::to_value(&response).unwrap();

        let chunks = shaper.stream_chunks(&document, &response);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0]["results"].as_array().unwrap().len(), 0);
    }
}
