use serde::{Deserialize, Serialize};

use crate::engine::pillar::{Pillar, QuestionKey};
use crate::models::question::QuestionBank;

/// Position of the questionnaire walk: which question is shown next.
///
/// Moves are linear over the bank shape and skip pillars without questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub pillar_index: usize,
    pub question_index: usize,
}

impl Cursor {
    pub fn new(pillar_index: usize, question_index: usize) -> Self {
        Self {
            pillar_index,
            question_index,
        }
    }

    pub fn from_key(key: &QuestionKey) -> Self {
        Self::new(key.pillar.index(), key.index)
    }

    pub fn key(&self) -> Option<QuestionKey> {
        Pillar::from_index(self.pillar_index).map(|pillar| QuestionKey::new(pillar, self.question_index))
    }

    /// First question of the first non-empty pillar.
    pub fn first(bank: &QuestionBank) -> Option<Cursor> {
        (0..Pillar::ALL.len())
            .find(|p| bank.question_count(*p) > 0)
            .map(|p| Cursor::new(p, 0))
    }

    pub fn is_valid(&self, bank: &QuestionBank) -> bool {
        self.question_index < bank.question_count(self.pillar_index)
    }

    pub fn next(&self, bank: &QuestionBank) -> Option<Cursor> {
        if self.question_index + 1 < bank.question_count(self.pillar_index) {
            return Some(Cursor::new(self.pillar_index, self.question_index + 1));
        }
        (self.pillar_index + 1..Pillar::ALL.len())
            .find(|p| bank.question_count(*p) > 0)
            .map(|p| Cursor::new(p, 0))
    }

    /// Previous question; at a pillar's first question this is the last
    /// question of the nearest earlier pillar. `None` at the very start.
    pub fn previous(&self, bank: &QuestionBank) -> Option<Cursor> {
        let count = bank.question_count(self.pillar_index);
        if self.question_index > 0 && count > 0 {
            let index = (self.question_index - 1).min(count - 1);
            return Some(Cursor::new(self.pillar_index, index));
        }
        (0..self.pillar_index.min(Pillar::ALL.len()))
            .rev()
            .find(|p| bank.question_count(*p) > 0)
            .map(|p| Cursor::new(p, bank.question_count(p) - 1))
    }

    pub fn is_last(&self, bank: &QuestionBank) -> bool {
        self.is_valid(bank) && self.next(bank).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::default_bank;

    #[test]
    fn next_walks_within_and_across_pillars() {
        let bank = default_bank();
        assert_eq!(Cursor::new(0, 0).next(&bank), Some(Cursor::new(0, 1)));
        assert_eq!(Cursor::new(0, 4).next(&bank), Some(Cursor::new(1, 0)));
        assert_eq!(Cursor::new(7, 4).next(&bank), None);
        assert!(Cursor::new(7, 4).is_last(&bank));
        assert!(!Cursor::new(6, 4).is_last(&bank));
    }

    #[test]
    fn previous_crosses_pillar_boundary() {
        let bank = default_bank();
        assert_eq!(Cursor::new(2, 0).previous(&bank), Some(Cursor::new(1, 4)));
        assert_eq!(Cursor::new(2, 3).previous(&bank), Some(Cursor::new(2, 2)));
        assert_eq!(Cursor::new(0, 0).previous(&bank), None);
    }

    #[test]
    fn navigation_skips_empty_pillars() {
        let mut bank = default_bank();
        bank.pillars[1].questions.clear();
        bank.pillars[2].questions.truncate(2);

        assert_eq!(Cursor::new(0, 4).next(&bank), Some(Cursor::new(2, 0)));
        assert_eq!(Cursor::new(2, 0).previous(&bank), Some(Cursor::new(0, 4)));
        assert_eq!(Cursor::new(3, 0).previous(&bank), Some(Cursor::new(2, 1)));
    }

    #[test]
    fn walking_forward_visits_every_question_once() {
        let bank = default_bank();
        let mut visited = Vec::new();
        let mut cursor = Cursor::first(&bank);
        while let Some(current) = cursor {
            visited.push(current.key().map(|k| k.to_string()));
            cursor = current.next(&bank);
        }
        assert_eq!(visited.len(), bank.total_questions());
        assert_eq!(visited.first().cloned().flatten().as_deref(), Some("awareness-0"));
        assert_eq!(visited.last().cloned().flatten().as_deref(), Some("expenses-4"));
    }
}
