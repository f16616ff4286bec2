use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::models::{Choice, Question, Vote};
use crate::error::is_unique_violation;

/// Questions still open at `now`, newest first.
pub async fn list_active(db: &PgPool, now: OffsetDateTime) -> anyhow::Result<Vec<Question>> {
    let rows = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, question_text, pub_date, expires_at
          FROM questions
         WHERE expires_at IS NULL OR expires_at > $1
         ORDER BY pub_date DESC
        "#,
    )
    .bind(now)
    .fetch_all(db)
    .await
    .context("list active questions")?;
    Ok(rows)
}

pub async fn find_question(db: &PgPool, id: i64) -> anyhow::Result<Option<Question>> {
    let row = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, question_text, pub_date, expires_at
          FROM questions
         WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find question")?;
    Ok(row)
}

pub async fn choices_for(db: &PgPool, question_id: i64) -> anyhow::Result<Vec<Choice>> {
    let rows = sqlx::query_as::<_, Choice>(
        r#"
        SELECT id, question_id, choice_text, votes
          FROM choices
         WHERE question_id = $1
         ORDER BY id ASC
        "#,
    )
    .bind(question_id)
    .fetch_all(db)
    .await
    .context("list choices")?;
    Ok(rows)
}

pub async fn find_vote(db: &PgPool, user_id: Uuid, question_id: i64) -> anyhow::Result<Option<Vote>> {
    let row = sqlx::query_as::<_, Vote>(
        r#"
        SELECT id, user_id, question_id, created_at
          FROM votes
         WHERE user_id = $1 AND question_id = $2
        "#,
    )
    .bind(user_id)
    .bind(question_id)
    .fetch_optional(db)
    .await
    .context("find vote")?;
    Ok(row)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// `(user_id, question_id)` already had a vote.
    Duplicate,
    /// The choice vanished or moved to another question.
    ChoiceGone,
}

/// Stores the vote and bumps the tally as one transaction.
///
/// The unique index on `votes (user_id, question_id)` settles races between
/// submissions from the same user; the tally is incremented in SQL so
/// concurrent voters on one choice never lose an update.
pub async fn record_vote(
    db: &PgPool,
    user_id: Uuid,
    question_id: i64,
    choice_id: i64,
) -> anyhow::Result<RecordOutcome> {
    let mut tx = db.begin().await.context("begin vote tx")?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO votes (user_id, question_id)
        VALUES ($1, $2)
        "#,
    )
    .bind(user_id)
    .bind(question_id)
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            tx.rollback().await.context("rollback vote tx")?;
            return Ok(RecordOutcome::Duplicate);
        }
        Err(e) => return Err(e).context("insert vote"),
    }

    let bumped = sqlx::query(
        r#"
        UPDATE choices
           SET votes = votes + 1
         WHERE id = $1 AND question_id = $2
        "#,
    )
    .bind(choice_id)
    .bind(question_id)
    .execute(&mut *tx)
    .await
    .context("increment choice votes")?;

    if bumped.rows_affected() != 1 {
        tx.rollback().await.context("rollback vote tx")?;
        return Ok(RecordOutcome::ChoiceGone);
    }

    tx.commit().await.context("commit vote tx")?;
    Ok(RecordOutcome::Recorded)
}
