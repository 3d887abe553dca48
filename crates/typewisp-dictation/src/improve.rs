//! Boundary to the text-improvement service that rewrites staged transcripts.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use typewisp_core::error::{Result, TypewispError};

#[async_trait]
pub trait TextImprover: Send + Sync {
    /// Rewrite `text`, e.g. fixing grammar and punctuation.
    async fn improve(&self, text: String) -> Result<String>;
}

/// Improver with a fixed answer, recording what it was asked to rewrite.
#[derive(Debug, Clone)]
pub struct MockTextImprover {
    answer: std::result::Result<String, String>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl MockTextImprover {
    pub fn replacing_with(text: impl Into<String>) -> Self {
        Self {
            answer: Ok(text.into()),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            answer: Err(reason.into()),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextImprover for MockTextImprover {
    async fn improve(&self, text: String) -> Result<String> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(text);
        }
        self.answer.clone().map_err(TypewispError::Dictation)
    }
}
