// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content resolution — turn a document reference into print-ready bytes.
//
// Local files are taken as they are.  Remote documents are fetched once; when
// the server declares a page-description format the bytes pass through
// untouched, anything else is handed to a rendering surface for conversion.

use std::sync::Arc;

use druckbote_core::DocumentRef;
use druckbote_core::error::{DruckboteError, Result};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument};

use crate::render::{RenderSurfaceProvider, render_to_pdf};

/// Media types sent to the print utility without conversion.
const PRINT_READY_TYPES: &[&str] = &["application/pdf", "application/postscript"];

/// Upper bound on the upstream body kept in a `Fetch` error.
const ERROR_BODY_LIMIT: usize = 512;

/// How the bytes of a resolved document were obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// Read from the local filesystem.
    Local,
    /// Fetched and already print-ready.
    Fetched { content_type: String },
    /// Converted by a rendering surface.
    Rendered { content_type: Option<String> },
}

/// Print-ready bytes plus their provenance.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub bytes: Vec<u8>,
    pub source: ContentSource,
}

/// Resolves document references for the job pipeline.
#[derive(Clone)]
pub struct ContentResolver {
    client: reqwest::Client,
    renderer: Arc<dyn RenderSurfaceProvider>,
}

impl ContentResolver {
    pub fn new(renderer: Arc<dyn RenderSurfaceProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("druckbote/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DruckboteError::Config(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(client, renderer))
    }

    pub fn with_client(client: reqwest::Client, renderer: Arc<dyn RenderSurfaceProvider>) -> Self {
        Self { client, renderer }
    }

    /// Resolve `document` into print-ready bytes.
    #[instrument(skip(self), fields(document = %document))]
    pub async fn resolve(&self, document: &DocumentRef) -> Result<ResolvedDocument> {
        match document {
            DocumentRef::Local(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| DruckboteError::fetch(path.display().to_string(), e.to_string()))?;
                debug!(bytes = bytes.len(), "read local document");
                Ok(ResolvedDocument {
                    bytes,
                    source: ContentSource::Local,
                })
            }
            DocumentRef::Remote(url) => self.resolve_remote(url).await,
        }
    }

    async fn resolve_remote(&self, url: &str) -> Result<ResolvedDocument> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DruckboteError::Fetch {
                url: url.to_string(),
                status: e.status().map(|s| s.as_u16()),
                body: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().map(|mut text| {
                truncate_on_char_boundary(&mut text, ERROR_BODY_LIMIT);
                text
            });
            return Err(DruckboteError::Fetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                body,
                message: format!("upstream returned {status}"),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(media_type);

        if let Some(ct) = content_type.as_deref().filter(|ct| is_print_ready(ct)) {
            let bytes = response.bytes().await.map_err(|e| DruckboteError::Fetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                body: None,
                message: format!("reading body: {e}"),
            })?;
            info!(content_type = ct, bytes = bytes.len(), "fetched print-ready document");
            return Ok(ResolvedDocument {
                bytes: bytes.to_vec(),
                source: ContentSource::Fetched {
                    content_type: ct.to_string(),
                },
            });
        }

        // The surface loads the URL itself; the fetched body is not needed.
        drop(response);
        info!(content_type = ?content_type, "converting document on a rendering surface");
        let bytes = render_to_pdf(self.renderer.as_ref(), url).await?;
        Ok(ResolvedDocument {
            bytes,
            source: ContentSource::Rendered { content_type },
        })
    }
}

/// Lowercased media type without parameters (`Text/HTML; charset=utf-8` → `text/html`).
fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether `media_type` is a page-description format the print utility takes directly.
pub fn is_print_ready(media_type: &str) -> bool {
    PRINT_READY_TYPES.contains(&media_type)
}

fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
