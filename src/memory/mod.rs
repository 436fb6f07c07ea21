pub mod format;
pub mod history;
pub mod retrieval;
pub mod service;
pub mod store;
pub mod types;
pub mod vector;

/// Encode an f32 embedding as little-endian bytes for the `embedding` BLOB column.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`embedding_to_bytes`]. Trailing partial values are dropped.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Current time as fixed-width RFC 3339 (microseconds, `Z`), so timestamps sort
/// lexicographically in SQL.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
