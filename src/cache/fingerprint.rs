// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Content-addressed cache keys

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const FIELD_SEPARATOR: u8 = 0x1f;

/// Hex SHA-256 over the normalized `(image url, description, mood)` triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(image_url: &str, description: Option<&str>, mood: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(image_url.trim().as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(normalize_description(description.unwrap_or("")).as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(mood.trim().to_lowercase().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, trim, and collapse internal whitespace runs to one space
pub fn normalize_description(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
