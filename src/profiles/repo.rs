use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// One-to-one extension of a user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub avatar: String, // storage key
    pub bio: String,
    pub location: String,
}

/// Fields an edit writes back.
#[derive(Debug)]
pub struct ProfileChanges<'a> {
    pub avatar: &'a str,
    pub bio: &'a str,
    pub location: &'a str,
}

impl Profile {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        avatar: &str,
    ) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, avatar)
            VALUES ($1, $2)
            RETURNING user_id, avatar, bio, location
            "#,
        )
        .bind(user_id)
        .bind(avatar)
        .fetch_one(&mut **tx)
        .await
        .context("insert profile")?;
        Ok(profile)
    }

    /// Returns the user's profile, creating a default one if it is missing.
    pub async fn get_or_create(
        db: &PgPool,
        user_id: Uuid,
        default_avatar: &str,
    ) -> anyhow::Result<Profile> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, avatar)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(default_avatar)
        .execute(db)
        .await
        .context("ensure profile")?;

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT user_id, avatar, bio, location
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("load profile")?;
        Ok(profile)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        changes: ProfileChanges<'_>,
    ) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
               SET avatar = $2, bio = $3, location = $4
             WHERE user_id = $1
            RETURNING user_id, avatar, bio, location
            "#,
        )
        .bind(user_id)
        .bind(changes.avatar)
        .bind(changes.bio)
        .bind(changes.location)
        .fetch_one(db)
        .await
        .context("update profile")?;
        Ok(profile)
    }
}
