use async_trait::async_trait;
use nb_core::models::{Capability, ForumId, TopicId, UserId, UserMatch, UserProfile};
use nb_core::traits::{AccountRepo, Grant};
use sqlx::Row;
use tracing::warn;

use crate::SqliteBoardRepo;

/// Wildcards in the needle match literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl AccountRepo for SqliteBoardRepo {
    async fn user_for_secret(&self, secret_hash: &str) -> anyhow::Result<Option<UserId>> {
        let user: Option<i64> =
            sqlx::query_scalar("SELECT user_id FROM api_secrets WHERE secret_hash = ?")
                .bind(secret_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user.map(UserId))
    }

    async fn get_user(&self, id: UserId) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT user_id, username, user_email, user_lang, user_timezone FROM users WHERE user_id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UserProfile {
            user_id: UserId(row.try_get("user_id")?),
            username: row.try_get("username")?,
            user_email: row.try_get("user_email")?,
            user_lang: row.try_get("user_lang")?,
            user_timezone: row.try_get("user_timezone")?,
        }))
    }

    async fn search_users(&self, needle: &str) -> anyhow::Result<Vec<UserMatch>> {
        let pattern = format!("%{}%", escape_like(needle));
        let rows = sqlx::query(
            "SELECT user_id, username, user_email FROM users \
             WHERE lower(username) LIKE ? ESCAPE '\\' ORDER BY username",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UserMatch {
                    user_id: UserId(row.try_get("user_id")?),
                    username: row.try_get("username")?,
                    user_email: row.try_get("user_email")?,
                })
            })
            .collect()
    }

    async fn grants_for(&self, user: UserId) -> anyhow::Result<Vec<Grant>> {
        let rows = sqlx::query("SELECT forum_id, capability FROM acl_grants WHERE user_id = ?")
            .bind(user.0)
            .fetch_all(&self.pool)
            .await?;

        let mut grants = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("capability")?;
            // Rows for capabilities this service does not check are skipped.
            let Some(capability) = Capability::from_name(&name) else {
                warn!(%user, capability = %name, "ignoring unknown capability grant");
                continue;
            };
            grants.push(Grant {
                forum_id: ForumId(row.try_get("forum_id")?),
                capability,
            });
        }
        Ok(grants)
    }
}

/// Provisioning helpers used by seeding and tests.
impl SqliteBoardRepo {
    pub async fn create_user(&self, username: &str, email: &str) -> anyhow::Result<UserId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, user_email) VALUES (?, ?) RETURNING user_id",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(id))
    }

    /// Registers an already hashed API secret for `user`.
    pub async fn add_secret(&self, user: UserId, secret_hash: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO api_secrets (user_id, secret_hash) VALUES (?, ?)")
            .bind(user.0)
            .bind(secret_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Grants `capability` on `forum`; `ForumId::ROOT` grants it board-wide.
    pub async fn grant(&self, user: UserId, forum: ForumId, capability: Capability) -> anyhow::Result<()> {
        sqlx::query("INSERT OR IGNORE INTO acl_grants (user_id, forum_id, capability) VALUES (?, ?, ?)")
            .bind(user.0)
            .bind(forum.0)
            .bind(capability.name())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_topic_approved(&self, topic: TopicId, approved: bool) -> anyhow::Result<()> {
        sqlx::query("UPDATE topics SET topic_approved = ? WHERE topic_id = ?")
            .bind(i64::from(approved))
            .bind(topic.0)
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE posts SET post_approved = ? WHERE topic_id = ?")
            .bind(i64::from(approved))
            .bind(topic.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
