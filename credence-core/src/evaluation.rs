//! Threat-intelligence evaluation strategies
//!
//! Assign a satisfaction value per responding peer once the network verdict
//! for a target is known. The results feed back into the Service Trust
//! Engine, so peers whose reports diverge from the verdict gradually lose
//! service trust.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{CredenceError, Result};
use crate::intel::{TargetThreatIntelligence, ThreatIntelligence};
use crate::interaction::Weight;
use crate::peer::PeerId;
use crate::trust::TrustMatrix;
use crate::clamp_unit;

fn default_even_satisfaction() -> f64 {
    1.0
}

fn default_threshold() -> f64 {
    0.5
}

/// Strategy scoring how satisfying each peer's report was, selected at
/// configuration time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum TiEvaluation {
    /// Every responder receives the same fixed satisfaction
    Even {
        #[serde(default = "default_even_satisfaction")]
        satisfaction: f64,
    },
    /// Distance from the aggregated verdict is used as a penalisation
    DistanceBased,
    /// Like distance-based, but compared against local intelligence for the
    /// target when available
    LocalCompare,
    /// Distance-based when the verdict is confident enough, even otherwise
    Threshold {
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
}

impl Default for TiEvaluation {
    fn default() -> Self {
        TiEvaluation::Even {
            satisfaction: default_even_satisfaction(),
        }
    }
}

impl TiEvaluation {
    /// Evaluates the interaction with every peer that responded.
    ///
    /// `local` is the local intelligence for the target, consulted only by
    /// [`TiEvaluation::LocalCompare`]. The trust matrix keys must exactly
    /// equal the response keys; a mismatch is a fatal consistency error.
    pub fn evaluate(
        &self,
        aggregated: &TargetThreatIntelligence,
        responses: &HashMap<PeerId, ThreatIntelligence>,
        matrix: &TrustMatrix,
        local: Option<&TargetThreatIntelligence>,
    ) -> Result<Vec<(PeerId, f64, Weight)>> {
        assert_matching_keys(responses, matrix)?;

        let evaluated = match self {
            TiEvaluation::Even { satisfaction } => responses
                .keys()
                .map(|peer_id| {
                    (
                        peer_id.clone(),
                        clamp_unit(*satisfaction),
                        Weight::IntelligenceDataReport,
                    )
                })
                .collect(),
            TiEvaluation::DistanceBased => {
                distance_based(&aggregated.intelligence(), responses)
            }
            TiEvaluation::LocalCompare => {
                let baseline = match local {
                    Some(local_ti) => local_ti.intelligence(),
                    None => {
                        debug!(
                            target = %aggregated.target,
                            "no local intelligence, falling back to aggregated verdict"
                        );
                        aggregated.intelligence()
                    }
                };
                distance_based(&baseline, responses)
            }
            TiEvaluation::Threshold { threshold } => {
                if aggregated.confidence >= *threshold {
                    distance_based(&aggregated.intelligence(), responses)
                } else {
                    TiEvaluation::Even {
                        satisfaction: default_even_satisfaction(),
                    }
                    .evaluate(aggregated, responses, matrix, local)?
                }
            }
        };

        Ok(evaluated)
    }
}

/// Satisfaction drops with the distance between the baseline score and the
/// reported score, scaled by how confident both sides were
fn satisfaction(baseline: &ThreatIntelligence, report: &ThreatIntelligence) -> f64 {
    let distance = (baseline.score - report.score).abs() / 2.0;
    clamp_unit((1.0 - distance * report.confidence) * baseline.confidence)
}

fn distance_based(
    baseline: &ThreatIntelligence,
    responses: &HashMap<PeerId, ThreatIntelligence>,
) -> Vec<(PeerId, f64, Weight)> {
    responses
        .iter()
        .map(|(peer_id, report)| {
            (
                peer_id.clone(),
                satisfaction(baseline, report),
                Weight::IntelligenceDataReport,
            )
        })
        .collect()
}

fn assert_matching_keys(
    responses: &HashMap<PeerId, ThreatIntelligence>,
    matrix: &TrustMatrix,
) -> Result<()> {
    if responses.len() != matrix.len() {
        return Err(CredenceError::MatrixInconsistency {
            expected: responses.len(),
            actual: matrix.len(),
        });
    }
    for peer_id in responses.keys() {
        if !matrix.contains_key(peer_id) {
            return Err(CredenceError::PeerNotInMatrix(peer_id.clone()));
        }
    }
    Ok(())
}
