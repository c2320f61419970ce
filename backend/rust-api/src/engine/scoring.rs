use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::pillar::{Pillar, QuestionKey};
use crate::models::answer::Answer;

/// Raw answer scores live in `[0, 1]`; pillar scores are reported on `[0, 10]`.
pub const PILLAR_SCALE: f64 = 10.0;

/// Anything carrying a raw answer score.
pub trait RawScore {
    fn raw_score(&self) -> f64;
}

impl RawScore for Answer {
    fn raw_score(&self) -> f64 {
        self.score
    }
}

/// Clamps a raw score into `[0, 1]`; non-finite values count as 0.
pub fn normalize_score(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub overall: f64,
    pub per_pillar: BTreeMap<Pillar, f64>,
}

/// Averages answers per pillar (scaled to 0-10) and takes the unweighted mean
/// of the eight pillar scores.
///
/// A pillar without answers scores 0. Keys that do not parse as
/// `<pillar>-<index>` are ignored. Raw scores outside `[0, 1]` are clamped.
pub fn compute_scores<A: RawScore>(answers: &BTreeMap<String, A>) -> ScoreReport {
    let mut totals: BTreeMap<Pillar, (f64, usize)> = BTreeMap::new();

    for (key, answer) in answers {
        let Ok(parsed) = key.parse::<QuestionKey>() else {
            continue;
        };
        let entry = totals.entry(parsed.pillar).or_insert((0.0, 0));
        entry.0 += normalize_score(answer.raw_score()) * PILLAR_SCALE;
        entry.1 += 1;
    }

    let per_pillar: BTreeMap<Pillar, f64> = Pillar::ALL
        .iter()
        .map(|pillar| {
            let score = match totals.get(pillar) {
                Some((sum, count)) if *count > 0 => sum / *count as f64,
                _ => 0.0,
            };
            (*pillar, score)
        })
        .collect();

    let overall = per_pillar.values().sum::<f64>() / Pillar::ALL.len() as f64;

    ScoreReport {
        overall,
        per_pillar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(score: f64) -> Answer {
        Answer {
            question_id: "q".into(),
            option_id: "o".into(),
            option_index: 0,
            score,
        }
    }

    fn answers(entries: &[(&str, f64)]) -> BTreeMap<String, Answer> {
        entries
            .iter()
            .map(|(key, score)| (key.to_string(), answer(*score)))
            .collect()
    }

    #[test]
    fn overall_is_mean_of_pillar_scores() {
        let mut entries = Vec::new();
        for (idx, pillar) in Pillar::ALL.iter().enumerate() {
            let key_a = format!("{}-0", pillar);
            let key_b = format!("{}-1", pillar);
            entries.push((key_a, (idx as f64) / 8.0));
            entries.push((key_b, 1.0 - (idx as f64) / 10.0));
        }
        let map: BTreeMap<String, Answer> = entries
            .into_iter()
            .map(|(k, s)| (k, answer(s)))
            .collect();

        let report = compute_scores(&map);
        let mean = report.per_pillar.values().sum::<f64>() / 8.0;
        assert_eq!(report.overall, mean);
        assert_eq!(report.per_pillar.len(), 8);
    }

    #[test]
    fn pillar_score_is_scaled_average() {
        let report = compute_scores(&answers(&[
            ("habits-0", 0.25),
            ("habits-1", 0.75),
            ("habits-2", 1.0),
        ]));
        let expected = (2.5 + 7.5 + 10.0) / 3.0;
        assert!((report.per_pillar[&Pillar::Habits] - expected).abs() < 1e-12);
    }

    #[test]
    fn unanswered_pillars_score_zero() {
        let report = compute_scores(&answers(&[("goals-0", 1.0)]));
        assert_eq!(report.per_pillar[&Pillar::Goals], 10.0);
        for pillar in Pillar::ALL.iter().filter(|p| **p != Pillar::Goals) {
            assert_eq!(report.per_pillar[pillar], 0.0);
        }
        assert_eq!(report.overall, 10.0 / 8.0);
    }

    #[test]
    fn empty_answers_score_zero_everywhere() {
        let report = compute_scores(&BTreeMap::<String, Answer>::new());
        assert_eq!(report.overall, 0.0);
        assert!(report.per_pillar.values().all(|s| *s == 0.0));
    }

    #[test]
    fn malformed_keys_are_ignored() {
        let report = compute_scores(&answers(&[
            ("income-0", 0.5),
            ("incomes-0", 1.0),
            ("income", 1.0),
            ("bogus", 1.0),
        ]));
        assert_eq!(report.per_pillar[&Pillar::Income], 5.0);
        assert_eq!(report.overall, 5.0 / 8.0);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let report = compute_scores(&answers(&[
            ("income-0", 3.0),
            ("assets-0", -1.0),
            ("goals-0", f64::NAN),
        ]));
        assert_eq!(report.per_pillar[&Pillar::Income], 10.0);
        assert_eq!(report.per_pillar[&Pillar::Assets], 0.0);
        assert_eq!(report.per_pillar[&Pillar::Goals], 0.0);
        assert_eq!(report.overall, 10.0 / 8.0);
    }

    #[test]
    fn scoring_is_idempotent() {
        let map = answers(&[("assets-0", 0.5), ("expenses-3", 0.25), ("mindsets-1", 1.0)]);
        let first = compute_scores(&map);
        let second = compute_scores(&map);
        assert_eq!(first, second);
    }
}
