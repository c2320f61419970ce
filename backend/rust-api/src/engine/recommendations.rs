use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::pillar::Pillar;

/// Pillar scores below this value get remedial advice.
pub const RECOMMENDATION_THRESHOLD: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    Remedial,
    Optimization,
}

impl ScoreTier {
    pub fn for_score(score: f64) -> Self {
        if score >= RECOMMENDATION_THRESHOLD {
            ScoreTier::Optimization
        } else {
            ScoreTier::Remedial
        }
    }
}

pub fn recommendations_for(pillar: Pillar, tier: ScoreTier) -> &'static [&'static str] {
    match (pillar, tier) {
        (Pillar::Awareness, ScoreTier::Remedial) => &[
            "Track every expense for the next 30 days using an app or a notebook.",
            "Write down your monthly take-home income and your fixed bills in one place.",
            "Calculate your net worth by listing everything you own and everything you owe.",
            "Set a weekly 15-minute slot to review your bank and card statements.",
        ],
        (Pillar::Awareness, ScoreTier::Optimization) => &[
            "Recalculate your net worth every quarter and note what moved it.",
            "Review the fees and interest rates on all accounts once a year and switch where it pays.",
            "Automate alerts for large or unusual transactions.",
        ],
        (Pillar::Goals, ScoreTier::Remedial) => &[
            "Write down one short-term and one long-term financial goal today.",
            "Give each goal a target amount and a deadline.",
            "Break your most important goal into a monthly savings amount.",
        ],
        (Pillar::Goals, ScoreTier::Optimization) => &[
            "Review your goals twice a year and adjust them to life changes.",
            "Open separate accounts or sub-accounts for each major goal.",
            "Extend your plan to cover retirement and other long-horizon goals.",
        ],
        (Pillar::Habits, ScoreTier::Remedial) => &[
            "Create a simple monthly budget with needs, wants and savings.",
            "Set up automatic payments so bills are never late.",
            "Move a fixed amount to savings on payday before spending anything.",
            "Adopt a 48-hour waiting rule before any large purchase.",
        ],
        (Pillar::Habits, ScoreTier::Optimization) => &[
            "Increase your automatic savings transfer each time your income rises.",
            "Do a monthly budget review and reallocate any surplus to your goals.",
            "Use rewards on cards you pay in full without changing your spending.",
        ],
        (Pillar::Mindsets, ScoreTier::Remedial) => &[
            "Notice the situations that trigger money stress and write them down.",
            "Start one small money habit you can keep every week to build confidence.",
            "Schedule a regular, calm money conversation with your partner or family.",
        ],
        (Pillar::Mindsets, ScoreTier::Optimization) => &[
            "Share what works for you with someone who is starting their financial journey.",
            "Set values-based spending priorities so purchases reflect what matters to you.",
            "Keep learning: read one personal finance book or course per quarter.",
        ],
        (Pillar::Assets, ScoreTier::Remedial) => &[
            "Build a starter emergency fund equal to one month of essential expenses.",
            "Join your employer retirement plan, at least up to any matching contribution.",
            "Check that you have basic health and property insurance in place.",
        ],
        (Pillar::Assets, ScoreTier::Optimization) => &[
            "Grow your emergency fund toward six months of essential expenses.",
            "Review your investment mix and rebalance once a year.",
            "Consider tax-advantaged accounts for long-term investing.",
        ],
        (Pillar::Liabilities, ScoreTier::Remedial) => &[
            "List all debts with balances, interest rates and minimum payments.",
            "Pick a payoff method (highest interest first or smallest balance first) and stick to it.",
            "Contact lenders about lower rates or hardship plans if payments are overwhelming.",
            "Stop adding to high-interest balances while you pay them down.",
        ],
        (Pillar::Liabilities, ScoreTier::Optimization) => &[
            "Check your credit report once a year and dispute any errors.",
            "Refinance remaining debt when a lower rate becomes available.",
            "Keep total debt payments below 15% of your income.",
        ],
        (Pillar::Income, ScoreTier::Remedial) => &[
            "Make sure your income covers essentials before taking on new commitments.",
            "Identify one skill or certification that could raise your earnings.",
            "Explore a small secondary income source to reduce reliance on one job.",
        ],
        (Pillar::Income, ScoreTier::Optimization) => &[
            "Negotiate your pay using market salary data at your next review.",
            "Direct raises and bonuses to goals before lifestyle upgrades.",
            "Develop a passive or investment income stream.",
        ],
        (Pillar::Expenses, ScoreTier::Remedial) => &[
            "Cancel subscriptions you have not used in the last month.",
            "Set spending limits for your top three discretionary categories.",
            "Create a sinking fund for irregular costs such as repairs and gifts.",
        ],
        (Pillar::Expenses, ScoreTier::Optimization) => &[
            "Renegotiate insurance, phone and utility contracts every year.",
            "Review recurring charges quarterly to catch price increases.",
            "Redirect the savings from lower bills straight to your goals.",
        ],
    }
}

/// Looks up the fixed advice list for each pillar's score tier.
pub fn select_recommendations(per_pillar: &BTreeMap<Pillar, f64>) -> BTreeMap<Pillar, Vec<String>> {
    per_pillar
        .iter()
        .map(|(pillar, score)| {
            let advice = recommendations_for(*pillar, ScoreTier::for_score(*score))
                .iter()
                .map(|line| line.to_string())
                .collect();
            (*pillar, advice)
        })
        .collect()
}

/// Same as [`select_recommendations`] for string-keyed scores; unknown pillar
/// identifiers are skipped.
pub fn select_recommendations_by_id(
    per_pillar: &BTreeMap<String, f64>,
) -> BTreeMap<Pillar, Vec<String>> {
    let typed: BTreeMap<Pillar, f64> = per_pillar
        .iter()
        .filter_map(|(id, score)| id.parse::<Pillar>().ok().map(|pillar| (pillar, *score)))
        .collect();
    select_recommendations(&typed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive_for_optimization() {
        assert_eq!(ScoreTier::for_score(5.999), ScoreTier::Remedial);
        assert_eq!(ScoreTier::for_score(6.0), ScoreTier::Optimization);
        assert_eq!(ScoreTier::for_score(10.0), ScoreTier::Optimization);
        assert_eq!(ScoreTier::for_score(0.0), ScoreTier::Remedial);
    }

    #[test]
    fn every_pillar_has_two_distinct_non_empty_lists() {
        for pillar in Pillar::ALL {
            let remedial = recommendations_for(pillar, ScoreTier::Remedial);
            let optimization = recommendations_for(pillar, ScoreTier::Optimization);
            assert!(!remedial.is_empty());
            assert!(!optimization.is_empty());
            assert_ne!(remedial, optimization);
        }
    }

    #[test]
    fn selection_follows_tier_per_pillar() {
        let scores: BTreeMap<Pillar, f64> = [(Pillar::Goals, 5.9), (Pillar::Income, 6.0)]
            .into_iter()
            .collect();
        let selected = select_recommendations(&scores);

        assert_eq!(selected.len(), 2);
        assert_eq!(
            selected[&Pillar::Goals][0],
            recommendations_for(Pillar::Goals, ScoreTier::Remedial)[0]
        );
        assert_eq!(
            selected[&Pillar::Income].len(),
            recommendations_for(Pillar::Income, ScoreTier::Optimization).len()
        );
    }

    #[test]
    fn unknown_pillar_ids_are_omitted() {
        let scores: BTreeMap<String, f64> = [
            ("habits".to_string(), 3.0),
            ("crypto".to_string(), 9.0),
        ]
        .into_iter()
        .collect();
        let selected = select_recommendations_by_id(&scores);
        assert_eq!(selected.len(), 1);
        assert!(selected.contains_key(&Pillar::Habits));
    }
}
