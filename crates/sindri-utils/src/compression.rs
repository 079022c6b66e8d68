/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Gzip object codec shared with the cluster agent.
//!
//! The `resources` and `operation_state` columns of ApplicationState store
//! gzip-compressed JSON. An empty byte sequence is the agreed encoding for
//! "no value" and decompresses to `None`, not an error.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("failed to serialize object: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to deserialize object: {0}")]
    Deserialize(#[source] serde_json::Error),
    #[error("gzip error: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Serializes `object` to JSON and gzips the result.
pub fn compress_object<T: Serialize>(object: &T) -> Result<Vec<u8>, CompressionError> {
    let json = serde_json::to_vec(object).map_err(CompressionError::Serialize)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Inverse of [`compress_object`]. Empty input yields `Ok(None)`.
pub fn decompress_object<T: DeserializeOwned>(
    bytes: &[u8],
) -> Result<Option<T>, CompressionError> {
    if bytes.is_empty() {
        return Ok(None);
    }

    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;

    serde_json::from_slice(&json)
        .map(Some)
        .map_err(CompressionError::Deserialize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Sample {
        name: String,
        count: i64,
    }

    #[test]
    fn test_round_trip_single_element() {
        let input = vec![Sample {
            name: "one".into(),
            count: 1,
        }];
        let compressed = compress_object(&input).unwrap();
        let output: Vec<Sample> = decompress_object(&compressed).unwrap().unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_round_trip_empty_list() {
        let input: Vec<Sample> = Vec::new();
        let compressed = compress_object(&input).unwrap();
        let output: Vec<Sample> = decompress_object(&compressed).unwrap().unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_round_trip_large_list() {
        let input: Vec<Sample> = (0..10_000)
            .map(|i| Sample {
                name: format!("resource-{}", i),
                count: i,
            })
            .collect();
        let compressed = compress_object(&input).unwrap();
        assert!(compressed.len() < input.len() * 8);
        let output: Vec<Sample> = decompress_object(&compressed).unwrap().unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_round_trip_none() {
        let input: Option<Sample> = None;
        let compressed = compress_object(&input).unwrap();
        let output: Option<Option<Sample>> = decompress_object(&compressed).unwrap();
        assert_eq!(output, Some(None));
    }

    #[test]
    fn test_decompress_empty_bytes_is_none_not_error() {
        let output: Option<Vec<Sample>> = decompress_object(&[]).unwrap();
        assert!(output.is_none());
    }

    #[test]
    fn test_decompress_garbage_is_error() {
        let result: Result<Option<Vec<Sample>>, _> = decompress_object(b"not gzip");
        assert!(result.is_err());
    }
}
