use chrono::{DateTime, Duration, Utc};

use crate::models::draft::Draft;

/// Drafts untouched since this instant are old enough for a reminder.
pub fn reminder_cutoff(now: DateTime<Utc>, threshold_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(threshold_days))
}

/// Drafts last updated strictly before this instant have expired.
pub fn expiry_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(retention_days))
}

/// A draft is due a reminder when it has been idle for at least
/// `threshold_days`, fewer than `max_reminders` have gone out, and the last
/// attempt (sent or failed) is at least `threshold_days` old.
pub fn is_reminder_eligible(
    draft: &Draft,
    now: DateTime<Utc>,
    threshold_days: u32,
    max_reminders: u32,
) -> bool {
    let cutoff = reminder_cutoff(now, threshold_days);
    draft.last_updated <= cutoff
        && draft.reminders_sent < max_reminders
        && draft
            .last_reminder_attempt_at
            .map_or(true, |attempt| attempt <= cutoff)
}

pub fn is_expired(draft: &Draft, now: DateTime<Utc>, retention_days: u32) -> bool {
    draft.last_updated < expiry_cutoff(now, retention_days)
}

/// Whole days elapsed since `since`, never negative.
pub fn days_since(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_days().max(0)
}

/// Marks a reminder as sent. `last_updated` is left alone so the draft keeps
/// ageing toward expiry.
pub fn mark_reminder_sent(draft: &mut Draft, now: DateTime<Utc>) {
    draft.reminders_sent += 1;
    draft.last_reminder_sent_at = Some(now);
    draft.last_reminder_attempt_at = Some(now);
}

/// Records a failed delivery; the counter is unchanged but the draft waits
/// another threshold before the next attempt.
pub fn mark_reminder_failed(draft: &mut Draft, now: DateTime<Utc>) {
    draft.last_reminder_attempt_at = Some(now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::navigation::Cursor;

    fn draft_updated(days_ago: i64, reminders_sent: u32, now: DateTime<Utc>) -> Draft {
        let mut draft = Draft::new("user-1", Cursor::default(), 0, now - Duration::days(40));
        draft.last_updated = now - Duration::days(days_ago);
        draft.reminders_sent = reminders_sent;
        draft
    }

    #[test]
    fn idle_draft_with_reminders_left_is_eligible() {
        let now = Utc::now();
        let draft = draft_updated(4, 1, now);
        assert!(is_reminder_eligible(&draft, now, 3, 3));
    }

    #[test]
    fn exhausted_reminders_are_not_eligible() {
        let now = Utc::now();
        let draft = draft_updated(4, 3, now);
        assert!(!is_reminder_eligible(&draft, now, 3, 3));
    }

    #[test]
    fn recent_draft_is_not_eligible() {
        let now = Utc::now();
        let draft = draft_updated(2, 0, now);
        assert!(!is_reminder_eligible(&draft, now, 3, 3));
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let now = Utc::now();
        let draft = draft_updated(3, 0, now);
        assert!(is_reminder_eligible(&draft, now, 3, 3));
    }

    #[test]
    fn expiry_uses_retention_window() {
        let now = Utc::now();
        assert!(is_expired(&draft_updated(31, 0, now), now, 30));
        assert!(!is_expired(&draft_updated(29, 0, now), now, 30));
    }

    #[test]
    fn sending_reminder_keeps_last_updated() {
        let now = Utc::now();
        let mut draft = draft_updated(5, 0, now);
        let before = draft.last_updated;
        mark_reminder_sent(&mut draft, now);

        assert_eq!(draft.reminders_sent, 1);
        assert_eq!(draft.last_reminder_sent_at, Some(now));
        assert_eq!(draft.last_updated, before);
        assert_eq!(days_since(draft.last_updated, now), 5);
    }

    #[test]
    fn reminders_are_spaced_by_threshold() {
        let now = Utc::now();
        let mut draft = draft_updated(10, 0, now);
        mark_reminder_sent(&mut draft, now - Duration::days(1));
        assert!(!is_reminder_eligible(&draft, now, 3, 3));

        draft.last_reminder_attempt_at = Some(now - Duration::days(3));
        assert!(is_reminder_eligible(&draft, now, 3, 3));
    }

    #[test]
    fn failed_attempt_backs_off_without_counting() {
        let now = Utc::now();
        let mut draft = draft_updated(10, 1, now);
        mark_reminder_failed(&mut draft, now);

        assert_eq!(draft.reminders_sent, 1);
        assert_eq!(draft.last_reminder_attempt_at, Some(now));
        assert!(!is_reminder_eligible(&draft, now, 3, 3));
        assert!(is_reminder_eligible(&draft, now + Duration::days(3), 3, 3));
    }
}
