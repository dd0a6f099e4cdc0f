//! Threat-intelligence aggregation strategies
//!
//! Combine one report per responding peer into a single network verdict for
//! the target. The strategy is selected by configuration from a closed set of
//! variants; all of them fail closed when no reporter carries any trust.

use serde::{Deserialize, Serialize};

use crate::error::{CredenceError, Result};
use crate::intel::ThreatIntelligence;
use crate::{clamp_score, clamp_unit};

/// A single peer's report together with the trust we put in the reporter
#[derive(Debug, Clone)]
pub struct PeerReport {
    /// The reported intelligence
    pub report: ThreatIntelligence,
    /// Service trust of the reporting peer, `[0, 1]`
    pub reporter_trust: f64,
}

/// Strategy combining peer reports into one verdict, selected at
/// configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TiAggregation {
    /// Trust-weighted score, confidence averaged over all reporters
    #[default]
    AverageConfidence,
    /// Both score and confidence weighted by normalized reporter trust
    WeightedAverageConfidence,
    /// Confidence derived from the dispersion of weighted opinions
    StdevFromScore,
}

impl TiAggregation {
    /// Assembles reports given by all peers into the overall network opinion.
    ///
    /// Fails with [`CredenceError::InsufficientTrust`] when the reports are
    /// empty or the total reporter trust is zero - no aggregate can be
    /// computed without dividing by zero.
    pub fn assemble_peer_opinion(&self, reports: &[PeerReport]) -> Result<ThreatIntelligence> {
        let trust_sum: f64 = reports.iter().map(|r| r.reporter_trust).sum();
        if reports.is_empty() || trust_sum <= 0.0 {
            return Err(CredenceError::InsufficientTrust);
        }

        let opinion = match self {
            TiAggregation::AverageConfidence => average_confidence(reports, trust_sum),
            TiAggregation::WeightedAverageConfidence => weighted_average(reports, trust_sum),
            TiAggregation::StdevFromScore => stdev_from_score(reports, trust_sum),
        };

        Ok(ThreatIntelligence {
            score: clamp_score(opinion.score),
            confidence: clamp_unit(opinion.confidence),
        })
    }
}

/// Normalized reporter weights `trust_i / sum(trust)`; sums to one
pub(crate) fn normalize_reporter_trust(reports: &[PeerReport], trust_sum: f64) -> Vec<f64> {
    reports
        .iter()
        .map(|r| r.reporter_trust / trust_sum)
        .collect()
}

fn average_confidence(reports: &[PeerReport], trust_sum: f64) -> ThreatIntelligence {
    let score = reports
        .iter()
        .map(|r| r.report.score * r.reporter_trust)
        .sum::<f64>()
        / trust_sum;
    let confidence = reports
        .iter()
        .map(|r| r.report.confidence * r.reporter_trust)
        .sum::<f64>()
        / reports.len() as f64;

    ThreatIntelligence { score, confidence }
}

fn weighted_average(reports: &[PeerReport], trust_sum: f64) -> ThreatIntelligence {
    let weights = normalize_reporter_trust(reports, trust_sum);

    let score = reports
        .iter()
        .zip(&weights)
        .map(|(r, w)| r.report.score * w)
        .sum();
    let confidence = reports
        .iter()
        .zip(&weights)
        .map(|(r, w)| r.report.confidence * w)
        .sum();

    ThreatIntelligence { score, confidence }
}

fn stdev_from_score(reports: &[PeerReport], trust_sum: f64) -> ThreatIntelligence {
    let weights = normalize_reporter_trust(reports, trust_sum);

    let opinions: Vec<f64> = reports
        .iter()
        .zip(&weights)
        .map(|(r, w)| r.report.score * r.report.confidence * w)
        .collect();

    let score: f64 = opinions.iter().sum();
    let mean = score / opinions.len() as f64;
    let variance =
        opinions.iter().map(|o| (o - mean).powi(2)).sum::<f64>() / opinions.len() as f64;

    ThreatIntelligence {
        score,
        confidence: 1.0 - variance.sqrt(),
    }
}
