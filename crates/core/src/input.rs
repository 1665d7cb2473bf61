// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt input: plain text or a heterogeneous part sequence.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One part of a multi-part prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPart {
    Text { text: String },
    /// Image already materialized to a local file.
    LocalImage { path: PathBuf },
}

/// Input for one agent turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub parts: Vec<InputPart>,
}

impl Input {
    pub fn text(text: impl Into<String>) -> Self {
        Self { parts: vec![InputPart::Text { text: text.into() }] }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| match p {
            InputPart::Text { text } => text.trim().is_empty(),
            InputPart::LocalImage { .. } => false,
        })
    }

    /// Concatenated text parts (images are skipped).
    pub fn joined_text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let InputPart::Text { text } = part {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    /// Prepend a text block (used for history injection).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.parts.insert(0, InputPart::Text { text: prefix.into() });
        self
    }

    pub fn image_paths(&self) -> Vec<&PathBuf> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                InputPart::LocalImage { path } => Some(path),
                InputPart::Text { .. } => None,
            })
            .collect()
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Input {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}
