use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::is_unique_violation;
use crate::profiles::repo::Profile;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub date_joined: OffsetDateTime,
}

/// Everything needed to insert an account and its profile.
pub struct NewAccount<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub avatar: &'a str,
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(User, Profile),
    UsernameTaken,
}

impl User {
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, date_joined
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, date_joined
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(db)
            .await
            .context("check user exists")?;
        Ok(found)
    }

    pub async fn username_taken(db: &PgPool, username: &str) -> anyhow::Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(db)
                .await
                .context("check username taken")?;
        Ok(taken)
    }

    /// Inserts the user and its profile in one transaction.
    ///
    /// A concurrent registration of the same username loses on the unique
    /// constraint and comes back as [`CreateOutcome::UsernameTaken`].
    pub async fn create_with_profile(
        db: &PgPool,
        account: NewAccount<'_>,
    ) -> anyhow::Result<CreateOutcome> {
        let mut tx = db.begin().await.context("begin registration tx")?;

        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, date_joined
            "#,
        )
        .bind(account.id)
        .bind(account.username)
        .bind(account.email)
        .bind(account.password_hash)
        .fetch_one(&mut *tx)
        .await;

        let user = match inserted {
            Ok(u) => u,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await.context("rollback registration tx")?;
                return Ok(CreateOutcome::UsernameTaken);
            }
            Err(e) => return Err(e).context("insert user"),
        };

        let profile = Profile::insert_tx(&mut tx, user.id, account.avatar).await?;
        tx.commit().await.context("commit registration tx")?;
        Ok(CreateOutcome::Created(user, profile))
    }

    /// Hard delete; profile and votes go with it through `ON DELETE CASCADE`.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() == 1)
    }
}
