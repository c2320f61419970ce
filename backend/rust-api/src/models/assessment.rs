use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::pillar::{Pillar, QuestionKey};
use crate::engine::recommendations::select_recommendations;
use crate::engine::scoring::ScoreReport;
use crate::models::answer::{Answer, AnswerRecord, ScoredAnswer};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillarScore {
    pub pillar: Pillar,
    /// 0-10 scale.
    pub score: f64,
}

/// Finalized, immutable result of a completed questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: String,
    pub user_id: String,
    pub overall_score: f64,
    pub pillar_scores: Vec<PillarScore>,
    pub answers: Vec<AnswerRecord>,
    pub bank_version: u32,
    pub completed_at: DateTime<Utc>,
}

impl Assessment {
    pub fn from_report(
        id: String,
        user_id: String,
        report: &ScoreReport,
        answers: &BTreeMap<String, Answer>,
        bank_version: u32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let pillar_scores = report
            .per_pillar
            .iter()
            .map(|(pillar, score)| PillarScore {
                pillar: *pillar,
                score: *score,
            })
            .collect();

        let mut rows: Vec<(QuestionKey, AnswerRecord)> = answers
            .iter()
            .filter_map(|(key, answer)| {
                key.parse::<QuestionKey>()
                    .ok()
                    .map(|parsed| (parsed, AnswerRecord::new(&parsed, answer)))
            })
            .collect();
        rows.sort_by_key(|(key, _)| (key.pillar, key.index));

        Assessment {
            id,
            user_id,
            overall_score: report.overall,
            pillar_scores,
            answers: rows.into_iter().map(|(_, row)| row).collect(),
            bank_version,
            completed_at,
        }
    }

    pub fn per_pillar(&self) -> BTreeMap<Pillar, f64> {
        self.pillar_scores
            .iter()
            .map(|entry| (entry.pillar, entry.score))
            .collect()
    }

    pub fn pillar_score(&self, pillar: Pillar) -> f64 {
        self.pillar_scores
            .iter()
            .find(|entry| entry.pillar == pillar)
            .map(|entry| entry.score)
            .unwrap_or(0.0)
    }
}

/// Assessment together with the advice derived from its pillar scores.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentSummary {
    pub assessment: Assessment,
    pub recommendations: BTreeMap<Pillar, Vec<String>>,
}

impl From<Assessment> for AssessmentSummary {
    fn from(assessment: Assessment) -> Self {
        let recommendations = select_recommendations(&assessment.per_pillar());
        AssessmentSummary {
            assessment,
            recommendations,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRequest {
    pub answers: BTreeMap<String, ScoredAnswer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreResponse {
    pub overall_score: f64,
    pub per_pillar_scores: BTreeMap<Pillar, f64>,
    pub recommendations: BTreeMap<Pillar, Vec<String>>,
}

impl From<ScoreReport> for ScoreResponse {
    fn from(report: ScoreReport) -> Self {
        let recommendations = select_recommendations(&report.per_pillar);
        ScoreResponse {
            overall_score: report.overall,
            per_pillar_scores: report.per_pillar,
            recommendations,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationPreviewRequest {
    pub per_pillar: BTreeMap<String, f64>,
}

/// One point of a user's progress chart.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressPoint {
    pub assessment_id: String,
    pub completed_at: DateTime<Utc>,
    pub overall: f64,
    pub per_pillar: BTreeMap<Pillar, f64>,
    /// Change against the previous point; `None` for the first one.
    pub overall_delta: Option<f64>,
}

/// Builds chronological progress points from assessments in any order.
pub fn progress_points(assessments: &[Assessment]) -> Vec<ProgressPoint> {
    let mut ordered: Vec<&Assessment> = assessments.iter().collect();
    ordered.sort_by_key(|a| a.completed_at);

    let mut previous: Option<f64> = None;
    ordered
        .into_iter()
        .map(|assessment| {
            let point = ProgressPoint {
                assessment_id: assessment.id.clone(),
                completed_at: assessment.completed_at,
                overall: assessment.overall_score,
                per_pillar: assessment.per_pillar(),
                overall_delta: previous.map(|prev| assessment.overall_score - prev),
            };
            previous = Some(assessment.overall_score);
            point
        })
        .collect()
}
