use std::collections::HashMap;

use anyhow::Result;
use thiserror::Error;

use equibatch_core::types::{LengthRecord, LENGTH_MANIFEST_SCHEMA_VERSION};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LengthLookupError {
    #[error("no length recorded for sample_id {0}")]
    UnknownSample(u64),
}

/// In-memory length lookup keyed by sample id, remembering manifest order.
#[derive(Debug, Clone, Default)]
pub struct LengthTable {
    order: Vec<u64>,
    lengths: HashMap<u64, u64>,
}

impl LengthTable {
    /// Later records for the same sample id overwrite earlier lengths but keep the first position.
    pub fn from_records(records: impl IntoIterator<Item = LengthRecord>) -> Self {
        let mut table = Self::default();
        for r in records {
            if table.lengths.insert(r.sample_id, r.length).is_none() {
                table.order.push(r.sample_id);
            }
        }
        table
    }

    /// Deterministic pseudo-random lengths in `1..=max_sample_length`.
    pub fn synthetic(total_samples: u64, max_sample_length: u64) -> Result<Self> {
        anyhow::ensure!(max_sample_length > 0, "max_sample_length must be > 0");
        Ok(Self::from_records((0..total_samples).map(|sample_id| {
            // Knuth multiplicative hash; spreads consecutive ids across the range.
            let mixed = sample_id.wrapping_mul(2_654_435_761) >> 7;
            LengthRecord {
                sample_id,
                length: 1 + mixed % max_sample_length,
            }
        })))
    }

    pub fn sample_ids(&self) -> &[u64] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn length_of(&self, sample_id: &u64) -> std::result::Result<u64, LengthLookupError> {
        self.lengths
            .get(sample_id)
            .copied()
            .ok_or(LengthLookupError::UnknownSample(*sample_id))
    }
}

/// Parses a length manifest.
///
/// Format: a `schema_version=<n>` header line, then one `<sample_id>\t<length>` row per
/// sample. Blank lines are skipped; extra columns are ignored.
pub fn parse_length_manifest_tsv(bytes: &[u8]) -> Result<Vec<LengthRecord>> {
    let s = std::str::from_utf8(bytes).map_err(|e| anyhow::anyhow!("manifest not utf-8: {e}"))?;

    let mut lines = s.lines().enumerate();
    let (_, first) = lines
        .by_ref()
        .find(|(_, l)| !l.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("empty length manifest"))?;

    let Some((k, v)) = first.split_once('=') else {
        anyhow::bail!("length manifest header missing schema_version");
    };
    if k.trim() != "schema_version" {
        anyhow::bail!("length manifest header must be schema_version=<n>");
    }
    let schema_version: u32 = v
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid schema_version"))?;
    anyhow::ensure!(
        schema_version == LENGTH_MANIFEST_SCHEMA_VERSION,
        "unsupported schema_version {}",
        schema_version
    );

    let mut records = Vec::new();
    for (i, raw) in lines {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lineno = i + 1;
        let mut cols = line.split('\t');
        let (Some(id_col), Some(len_col)) = (cols.next(), cols.next()) else {
            anyhow::bail!("line {lineno}: expected at least 2 columns");
        };
        let sample_id: u64 = id_col
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("line {lineno}: bad sample_id"))?;
        let length: u64 = len_col
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("line {lineno}: bad length"))?;
        records.push(LengthRecord { sample_id, length });
    }

    Ok(records)
}
