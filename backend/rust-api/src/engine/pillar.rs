use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The eight fixed categories of financial health, in questionnaire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Awareness,
    Goals,
    Habits,
    Mindsets,
    Assets,
    Liabilities,
    Income,
    Expenses,
}

impl Pillar {
    pub const ALL: [Pillar; 8] = [
        Pillar::Awareness,
        Pillar::Goals,
        Pillar::Habits,
        Pillar::Mindsets,
        Pillar::Assets,
        Pillar::Liabilities,
        Pillar::Income,
        Pillar::Expenses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pillar::Awareness => "awareness",
            Pillar::Goals => "goals",
            Pillar::Habits => "habits",
            Pillar::Mindsets => "mindsets",
            Pillar::Assets => "assets",
            Pillar::Liabilities => "liabilities",
            Pillar::Income => "income",
            Pillar::Expenses => "expenses",
        }
    }

    /// Human readable title used in emails, PDFs and exports.
    pub fn label(&self) -> &'static str {
        match self {
            Pillar::Awareness => "Financial Awareness",
            Pillar::Goals => "Goals",
            Pillar::Habits => "Habits",
            Pillar::Mindsets => "Mindsets",
            Pillar::Assets => "Assets",
            Pillar::Liabilities => "Liabilities",
            Pillar::Income => "Income",
            Pillar::Expenses => "Expenses",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Pillar> {
        Pillar::ALL.get(index).copied()
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pillar {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Pillar::ALL
            .iter()
            .copied()
            .find(|pillar| pillar.as_str() == value.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("Unknown pillar: {}", value))
    }
}

/// Positional identity of a question: `<pillar>-<index>`, e.g. `habits-3`.
///
/// Answer maps are keyed by the string form so drafts and scoring requests
/// share one representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuestionKey {
    pub pillar: Pillar,
    pub index: usize,
}

impl QuestionKey {
    pub fn new(pillar: Pillar, index: usize) -> Self {
        Self { pillar, index }
    }
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pillar, self.index)
    }
}

impl FromStr for QuestionKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (pillar, index) = value
            .split_once('-')
            .ok_or_else(|| format!("Malformed question key: {}", value))?;
        let pillar = pillar.parse::<Pillar>()?;
        let index = index
            .parse::<usize>()
            .map_err(|_| format!("Malformed question index in key: {}", value))?;
        Ok(QuestionKey { pillar, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pillar_order_matches_index() {
        for (idx, pillar) in Pillar::ALL.iter().enumerate() {
            assert_eq!(pillar.index(), idx);
            assert_eq!(Pillar::from_index(idx), Some(*pillar));
        }
        assert_eq!(Pillar::from_index(8), None);
    }

    #[test]
    fn pillar_parses_case_insensitively() {
        assert_eq!("Income".parse::<Pillar>(), Ok(Pillar::Income));
        assert!("savings".parse::<Pillar>().is_err());
    }

    #[test]
    fn question_key_round_trips_through_string() {
        let key = QuestionKey::new(Pillar::Liabilities, 4);
        assert_eq!(key.to_string(), "liabilities-4");
        assert_eq!("liabilities-4".parse::<QuestionKey>(), Ok(key));
    }

    #[test]
    fn malformed_question_keys_are_rejected() {
        assert!("liabilities".parse::<QuestionKey>().is_err());
        assert!("liabilities-x".parse::<QuestionKey>().is_err());
        assert!("wealth-1".parse::<QuestionKey>().is_err());
        assert!("".parse::<QuestionKey>().is_err());
    }
}
