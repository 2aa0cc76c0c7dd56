//! Tamper-evident certification records.
//!
//! Certifying an alert freezes the analysis evidence into a self-contained
//! record whose SHA-256 content hash covers every field. Any later edit to
//! the stored record fails `verify()`.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::Result;
use crate::engine::analyzer::VehicleAnalysis;
use crate::engine::thresholds::VehicleGapMetrics;

/// The evidence frozen at certification time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationBody {
    pub alert_id: i64,
    pub vehicle_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub metrics: VehicleGapMetrics,
    /// Per-gap confidences and justifications at certification time.
    pub gap_summaries: Vec<GapSummary>,
    /// Reference to the completed analysis artifact in the document store.
    pub artifact_ref: String,
    pub certified_at: DateTime<Utc>,
    pub certified_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub justification: String,
    pub was_profiled_during_gap: bool,
}

/// A sealed certification: body plus its content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapCertification {
    pub body: CertificationBody,
    /// Hex SHA-256 over the canonical JSON serialization of `body`.
    pub content_hash: String,
}

impl GapCertification {
    /// Seal a certification body.
    pub fn seal(body: CertificationBody) -> Result<Self> {
        let content_hash = hash_body(&body)?;
        Ok(Self { body, content_hash })
    }

    /// Build and seal a certification from an analysis result.
    pub fn from_analysis(
        alert_id: i64,
        analysis: &VehicleAnalysis,
        artifact_ref: &str,
        certified_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let gap_summaries = analysis
            .gaps
            .iter()
            .map(|gap| GapSummary {
                timestamp: gap.timestamp,
                confidence: gap.confidence,
                justification: gap.justification.clone(),
                was_profiled_during_gap: gap.was_profiled_during_gap,
            })
            .collect();
        Self::seal(CertificationBody {
            alert_id,
            vehicle_id: analysis.vehicle_id.clone(),
            window_start: analysis.window_start,
            window_end: analysis.window_end,
            metrics: analysis.metrics.clone(),
            gap_summaries,
            artifact_ref: artifact_ref.to_string(),
            certified_at: now,
            certified_by: certified_by.to_string(),
        })
    }

    /// Whether the stored hash still matches the body.
    pub fn verify(&self) -> Result<bool> {
        Ok(hash_body(&self.body)? == self.content_hash)
    }
}

fn hash_body(body: &CertificationBody) -> Result<String> {
    // serde_json keeps struct field order, so serialization is canonical for
    // a fixed schema version.
    let canonical = serde_json::to_vec(body)?;
    let digest = Sha256::digest(&canonical);
    Ok(format!("{digest:x}"))
}
