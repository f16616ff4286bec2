//! Decides whether a ballot counts, and records it when it does.
//!
//! Checks run in a fixed order because the first failing one is the message
//! the voter sees: closed poll, then an earlier vote, then the selection.

use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::{Choice, Question};
use super::repo::{self, RecordOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteRejection {
    #[error("This poll is closed.")]
    PollClosed,
    #[error("You have already voted in this poll.")]
    AlreadyVoted,
    #[error("You didn't select a choice.")]
    NoSelection,
}

/// Applies the ballot rules and returns the id of the choice to count.
pub fn check_ballot(
    question: &Question,
    choices: &[Choice],
    already_voted: bool,
    selected: Option<i64>,
    now: OffsetDateTime,
) -> Result<i64, VoteRejection> {
    if !question.is_active(now) {
        return Err(VoteRejection::PollClosed);
    }
    if already_voted {
        return Err(VoteRejection::AlreadyVoted);
    }
    selected
        .filter(|id| choices.iter().any(|c| c.id == *id && c.question_id == question.id))
        .ok_or(VoteRejection::NoSelection)
}

/// Parses the submitted `choice` field; anything that is not an id counts as no selection.
pub fn parse_selection(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}

#[derive(Debug)]
pub enum Ballot {
    Counted { choice_id: i64 },
    Rejected {
        reason: VoteRejection,
        question: Question,
        choices: Vec<Choice>,
    },
    UnknownQuestion,
}

/// Runs the whole vote for `user_id` on `question_id`.
pub async fn cast_vote(
    db: &PgPool,
    user_id: Uuid,
    question_id: i64,
    selected: Option<i64>,
) -> anyhow::Result<Ballot> {
    let Some(question) = repo::find_question(db, question_id).await? else {
        return Ok(Ballot::UnknownQuestion);
    };
    let choices = repo::choices_for(db, question_id).await?;
    let already_voted = repo::find_vote(db, user_id, question_id).await?.is_some();

    let rejected = |reason: VoteRejection, question: Question, choices: Vec<Choice>| {
        warn!(%user_id, question_id, %reason, "vote rejected");
        Ok(Ballot::Rejected {
            reason,
            question,
            choices,
        })
    };

    let choice_id = match check_ballot(
        &question,
        &choices,
        already_voted,
        selected,
        OffsetDateTime::now_utc(),
    ) {
        Ok(id) => id,
        Err(reason) => return rejected(reason, question, choices),
    };

    match repo::record_vote(db, user_id, question_id, choice_id).await? {
        RecordOutcome::Recorded => {
            info!(%user_id, question_id, choice_id, "vote recorded");
            Ok(Ballot::Counted { choice_id })
        }
        // Lost a race with a concurrent submission from the same user.
        RecordOutcome::Duplicate => rejected(VoteRejection::AlreadyVoted, question, choices),
        RecordOutcome::ChoiceGone => rejected(VoteRejection::NoSelection, question, choices),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polls::models::fixtures::{choice, question};
    use time::{macros::datetime, Duration};

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

    fn open_poll() -> (Question, Vec<Choice>) {
        (question(1, NOW, None), vec![choice(10, 1, 0), choice(11, 1, 0)])
    }

    #[test]
    fn accepts_valid_choice_on_open_poll() {
        let (q, choices) = open_poll();
        assert_eq!(check_ballot(&q, &choices, false, Some(10), NOW), Ok(10));
    }

    #[test]
    fn closed_poll_wins_over_every_other_problem() {
        let q = question(2, NOW - Duration::days(2), Some(NOW - Duration::days(1)));
        let choices = vec![choice(20, 2, 0)];
        assert_eq!(
            check_ballot(&q, &choices, true, None, NOW),
            Err(VoteRejection::PollClosed)
        );
        assert_eq!(
            check_ballot(&q, &choices, false, Some(20), NOW),
            Err(VoteRejection::PollClosed)
        );
    }

    #[test]
    fn already_voted_wins_over_missing_selection() {
        let (q, choices) = open_poll();
        assert_eq!(
            check_ballot(&q, &choices, true, None, NOW),
            Err(VoteRejection::AlreadyVoted)
        );
        assert_eq!(
            check_ballot(&q, &choices, true, Some(11), NOW),
            Err(VoteRejection::AlreadyVoted)
        );
    }

    #[test]
    fn selection_must_belong_to_the_question() {
        let (q, mut choices) = open_poll();
        choices.push(choice(99, 2, 0));
        assert_eq!(
            check_ballot(&q, &choices, false, None, NOW),
            Err(VoteRejection::NoSelection)
        );
        assert_eq!(
            check_ballot(&q, &choices, false, Some(99), NOW),
            Err(VoteRejection::NoSelection)
        );
        assert_eq!(
            check_ballot(&q, &choices, false, Some(12345), NOW),
            Err(VoteRejection::NoSelection)
        );
    }

    #[test]
    fn poll_expiring_later_is_still_open() {
        let q = question(3, NOW, Some(NOW + Duration::minutes(5)));
        let choices = vec![choice(30, 3, 0)];
        assert_eq!(check_ballot(&q, &choices, false, Some(30), NOW), Ok(30));
    }

    #[test]
    fn selection_parsing() {
        assert_eq!(parse_selection(Some("42")), Some(42));
        assert_eq!(parse_selection(Some(" 7 ")), Some(7));
        assert_eq!(parse_selection(Some("abc")), None);
        assert_eq!(parse_selection(Some("")), None);
        assert_eq!(parse_selection(None), None);
    }

    #[test]
    fn rejection_messages() {
        assert_eq!(VoteRejection::PollClosed.to_string(), "This poll is closed.");
        assert_eq!(
            VoteRejection::AlreadyVoted.to_string(),
            "You have already voted in this poll."
        );
        assert_eq!(VoteRejection::NoSelection.to_string(), "You didn't select a choice.");
    }

    mod with_db {
        use super::*;
        use crate::state::testing::{insert_choice, insert_question, insert_user, tally, vote_rows};

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs a Postgres DATABASE_URL"]
        async fn second_vote_is_refused_and_counts_nothing(db: PgPool) {
            let user = insert_user(&db, "carol").await;
            let q = insert_question(&db, "Cats or dogs?", OffsetDateTime::now_utc(), None).await;
            let a = insert_choice(&db, q, "Cats").await;
            let b = insert_choice(&db, q, "Dogs").await;

            let first = cast_vote(&db, user, q, Some(a)).await.unwrap();
            assert!(matches!(first, Ballot::Counted { choice_id } if choice_id == a));
            assert_eq!(tally(&db, a).await, 1);

            let second = cast_vote(&db, user, q, Some(b)).await.unwrap();
            assert!(matches!(
                second,
                Ballot::Rejected { reason: VoteRejection::AlreadyVoted, .. }
            ));
            assert_eq!(tally(&db, a).await, 1);
            assert_eq!(tally(&db, b).await, 0);
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs a Postgres DATABASE_URL"]
        async fn racing_submissions_from_one_user_count_once(db: PgPool) {
            let user = insert_user(&db, "dave").await;
            let q = insert_question(&db, "Race?", OffsetDateTime::now_utc(), None).await;
            let c = insert_choice(&db, q, "Go").await;

            let mut tasks = Vec::new();
            for _ in 0..16 {
                let db = db.clone();
                tasks.push(tokio::spawn(async move { cast_vote(&db, user, q, Some(c)).await }));
            }
            let (mut counted, mut already) = (0, 0);
            for task in tasks {
                match task.await.unwrap().unwrap() {
                    Ballot::Counted { .. } => counted += 1,
                    Ballot::Rejected {
                        reason: VoteRejection::AlreadyVoted,
                        ..
                    } => already += 1,
                    other => panic!("unexpected ballot {other:?}"),
                }
            }

            assert_eq!((counted, already), (1, 15));
            assert_eq!(tally(&db, c).await, 1);
            assert_eq!(vote_rows(&db, q).await, 1);
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs a Postgres DATABASE_URL"]
        async fn closed_poll_keeps_its_tally(db: PgPool) {
            let user = insert_user(&db, "erin").await;
            let now = OffsetDateTime::now_utc();
            let q = insert_question(
                &db,
                "Too late?",
                now - Duration::days(2),
                Some(now - Duration::days(1)),
            )
            .await;
            let c = insert_choice(&db, q, "Yes").await;

            let ballot = cast_vote(&db, user, q, Some(c)).await.unwrap();
            assert!(matches!(
                ballot,
                Ballot::Rejected { reason: VoteRejection::PollClosed, .. }
            ));
            assert_eq!(tally(&db, c).await, 0);
            assert_eq!(vote_rows(&db, q).await, 0);
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs a Postgres DATABASE_URL"]
        async fn foreign_or_missing_choice_is_no_selection(db: PgPool) {
            let user = insert_user(&db, "frank").await;
            let q1 = insert_question(&db, "Mine?", OffsetDateTime::now_utc(), None).await;
            let q2 = insert_question(&db, "Theirs?", OffsetDateTime::now_utc(), None).await;
            insert_choice(&db, q1, "Own").await;
            let foreign = insert_choice(&db, q2, "Foreign").await;

            for selected in [Some(foreign), None] {
                let ballot = cast_vote(&db, user, q1, selected).await.unwrap();
                assert!(matches!(
                    ballot,
                    Ballot::Rejected { reason: VoteRejection::NoSelection, .. }
                ));
            }
            assert_eq!(vote_rows(&db, q1).await, 0);
            assert!(matches!(
                cast_vote(&db, user, q2 + 1000, Some(foreign)).await.unwrap(),
                Ballot::UnknownQuestion
            ));
        }
    }
}
