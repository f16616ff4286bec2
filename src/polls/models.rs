use serde::Serialize;
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl Question {
    /// Open for voting: no expiry, or expiry strictly after `now`.
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        self.expires_at.map_or(true, |expires| now < expires)
    }

    /// Published within the 24 hours up to `now`.
    pub fn was_published_recently(&self, now: OffsetDateTime) -> bool {
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }

    /// Sum of the tallies of this question's choices.
    pub fn total_votes(&self, choices: &[Choice]) -> i64 {
        choices
            .iter()
            .filter(|c| c.question_id == self.id)
            .map(|c| i64::from(c.votes))
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub votes: i32,
}

/// Proof that a user voted on a question.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Vote {
    pub id: i64,
    pub user_id: Uuid,
    pub question_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}


#[cfg(test)]
mod tests {
    use super::fixtures::{choice, question};
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

    #[test]
    fn active_without_expiry() {
        assert!(question(1, NOW, None).is_active(NOW));
    }

    #[test]
    fn active_iff_expiry_strictly_in_future() {
        let q = question(1, NOW, Some(NOW + Duration::seconds(1)));
        assert!(q.is_active(NOW));
        assert!(!q.is_active(NOW + Duration::seconds(1)));
        assert!(!question(2, NOW, Some(NOW)).is_active(NOW));
        assert!(!question(3, NOW, Some(NOW - Duration::hours(1))).is_active(NOW));
    }

    #[test]
    fn recently_published_window() {
        assert!(question(1, NOW, None).was_published_recently(NOW));
        assert!(question(1, NOW - Duration::hours(23), None).was_published_recently(NOW));
        assert!(question(1, NOW - Duration::days(1), None).was_published_recently(NOW));
        assert!(!question(1, NOW - Duration::days(1) - Duration::seconds(1), None)
            .was_published_recently(NOW));
        assert!(!question(1, NOW + Duration::days(30), None).was_published_recently(NOW));
    }

    #[test]
    fn total_votes_sums_own_choices() {
        let q = question(7, NOW, None);
        let choices = [choice(1, 7, 3), choice(2, 7, 4), choice(3, 8, 100)];
        assert_eq!(q.total_votes(&choices), 7);
        assert_eq!(q.total_votes(&[]), 0);
    }

    #[test]
    fn question_serializes_rfc3339() {
        let json = serde_json::to_value(question(1, NOW, None)).unwrap();
        assert_eq!(json["pub_date"], "2024-05-01T12:00:00Z");
        assert!(json["expires_at"].is_null());
    }
}
