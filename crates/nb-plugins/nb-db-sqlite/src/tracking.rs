use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nb_core::models::{ForumId, TopicId, UserId};
use nb_core::traits::TrackingRepo;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::{to_timestamp, SqliteBoardRepo};

/// `SELECT <columns> FROM <table> WHERE user_id = ? AND <key> IN (...)`
fn select_for_user<'a>(
    columns: &str,
    table: &str,
    key: &str,
    user: UserId,
    ids: impl IntoIterator<Item = i64>,
) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new(format!("SELECT {columns} FROM {table} WHERE user_id = "));
    qb.push_bind(user.0).push(format!(" AND {key} IN ("));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
    qb
}

#[async_trait]
impl TrackingRepo for SqliteBoardRepo {
    async fn forum_marks(
        &self,
        user: UserId,
        forums: &[ForumId],
    ) -> anyhow::Result<HashMap<ForumId, DateTime<Utc>>> {
        if forums.is_empty() {
            return Ok(HashMap::new());
        }
        let mut qb = select_for_user(
            "forum_id, mark_time",
            "forums_track",
            "forum_id",
            user,
            forums.iter().map(|f| f.0),
        );

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok((
                    ForumId(row.try_get("forum_id")?),
                    to_timestamp(row.try_get("mark_time")?),
                ))
            })
            .collect()
    }

    async fn forum_watches(&self, user: UserId, forums: &[ForumId]) -> anyhow::Result<HashSet<ForumId>> {
        if forums.is_empty() {
            return Ok(HashSet::new());
        }
        let mut qb = select_for_user(
            "forum_id",
            "forums_watch",
            "forum_id",
            user,
            forums.iter().map(|f| f.0),
        );

        let ids: Vec<i64> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(ids.into_iter().map(ForumId).collect())
    }

    async fn topic_marks(
        &self,
        user: UserId,
        topics: &[TopicId],
    ) -> anyhow::Result<HashMap<TopicId, DateTime<Utc>>> {
        if topics.is_empty() {
            return Ok(HashMap::new());
        }
        let mut qb = select_for_user(
            "topic_id, mark_time",
            "topics_track",
            "topic_id",
            user,
            topics.iter().map(|t| t.0),
        );

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok((
                    TopicId(row.try_get("topic_id")?),
                    to_timestamp(row.try_get("mark_time")?),
                ))
            })
            .collect()
    }

    async fn topics_posted(&self, user: UserId, topics: &[TopicId]) -> anyhow::Result<HashSet<TopicId>> {
        if topics.is_empty() {
            return Ok(HashSet::new());
        }
        let mut qb = select_for_user(
            "topic_id",
            "topics_posted",
            "topic_id",
            user,
            topics.iter().map(|t| t.0),
        );
        qb.push(" AND topic_posted = 1");

        let ids: Vec<i64> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(ids.into_iter().map(TopicId).collect())
    }
}

impl SqliteBoardRepo {
    pub async fn mark_forum_read(
        &self,
        user: UserId,
        forum: ForumId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO forums_track (user_id, forum_id, mark_time) VALUES (?, ?, ?) \
             ON CONFLICT (user_id, forum_id) DO UPDATE SET mark_time = excluded.mark_time",
        )
        .bind(user.0)
        .bind(forum.0)
        .bind(at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_topic_read(
        &self,
        user: UserId,
        topic: TopicId,
        forum: ForumId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO topics_track (user_id, topic_id, forum_id, mark_time) VALUES (?, ?, ?, ?) \
             ON CONFLICT (user_id, topic_id) DO UPDATE SET mark_time = excluded.mark_time",
        )
        .bind(user.0)
        .bind(topic.0)
        .bind(forum.0)
        .bind(at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn watch_forum(&self, user: UserId, forum: ForumId) -> anyhow::Result<()> {
        sqlx::query("INSERT OR IGNORE INTO forums_watch (user_id, forum_id) VALUES (?, ?)")
            .bind(user.0)
            .bind(forum.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
