//! The `key|text` bulk-load format.
//!
//! One item per line. The key runs up to the first `|`, so the text may
//! itself contain `|`. Blank lines are skipped.

use ragbot_core::error::KnowledgeError;

/// Outcome of a bulk ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub ingested: usize,
    pub skipped_duplicates: usize,
}

/// Parse one line. `line_no` is 1-based and only used for error reporting.
pub fn parse_ingest_line(line_no: usize, line: &str) -> Result<Option<(String, String)>, KnowledgeError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some((key, text)) = line.split_once('|') else {
        return Err(KnowledgeError::InvalidIngestLine {
            line: line_no,
            reason: "missing '|' separator".into(),
        });
    };

    let (key, text) = (key.trim(), text.trim());
    if key.is_empty() {
        return Err(KnowledgeError::InvalidIngestLine {
            line: line_no,
            reason: "empty key".into(),
        });
    }
    if text.is_empty() {
        return Err(KnowledgeError::InvalidIngestLine {
            line: line_no,
            reason: format!("empty text for key {key:?}"),
        });
    }

    Ok(Some((key.to_string(), text.to_string())))
}

/// Parse a whole ingest file. Fails on the first malformed line.
pub fn parse_ingest_source(source: &str) -> Result<Vec<(String, String)>, KnowledgeError> {
    let mut items = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        if let Some(item) = parse_ingest_line(idx + 1, line)? {
            items.push(item);
        }
    }
    Ok(items)
}
