use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::error::Result;
use crate::listeners::UserId;

/// Session data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Signed-in user resolved from a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
}

type SessionRow = (String, i64, String, String);
type UserRow = (i64, String, Option<String>, bool);

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Session store backed by SQLite
///
/// Sessions are created by the OAuth login flow; the live feed only resolves
/// them to find out who is listening.
#[derive(Clone)]
pub struct SessionStore {
    pool: Pool<Sqlite>,
    default_ttl: Duration,
}

impl SessionStore {
    pub fn new(pool: Pool<Sqlite>, ttl_secs: i64) -> Self {
        Self {
            pool,
            default_ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Insert or refresh a user's profile
    pub async fn upsert_user(
        &self,
        id: UserId,
        username: &str,
        avatar_url: Option<&str>,
        is_admin: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, avatar_url, is_admin)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET username = ?2, avatar_url = ?3, is_admin = ?4
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(avatar_url)
        .bind(is_admin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Create a new session
    pub async fn create(&self, user_id: UserId) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            expires_at: now + self.default_ttl,
        };

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    /// Get a session by ID. Expired sessions are deleted and reported as absent.
    pub async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, user_id, created_at, expires_at)) = row else {
            return Ok(None);
        };

        let session = Session {
            id,
            user_id,
            created_at: parse_timestamp(&created_at),
            expires_at: parse_timestamp(&expires_at),
        };

        if session.is_expired() {
            self.delete(&session.id).await?;
            Ok(None)
        } else {
            Ok(Some(session))
        }
    }

    /// Resolve a session ID to its user
    pub async fn user_for_session(&self, session_id: &str) -> Result<Option<SessionUser>> {
        let Some(session) = self.get(session_id).await? else {
            return Ok(None);
        };

        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, avatar_url, is_admin FROM users WHERE id = ?1",
        )
        .bind(session.user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username, avatar_url, is_admin)| SessionUser {
            id,
            username,
            avatar_url,
            is_admin,
        }))
    }

    pub async fn delete(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
