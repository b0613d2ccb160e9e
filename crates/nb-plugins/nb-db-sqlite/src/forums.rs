//! # Forum store
//!
//! `ForumRepo` over the nested-set `forums` table plus `topics` and `posts`.

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use nb_core::models::{
    ForumId, ForumNode, ForumStats, ForumType, LastPost, NewForum, PostId, PostRow, SortOrder,
    TopicId, TopicRow, TopicStatus, UserId,
};
use nb_core::traits::{ForumRepo, ForumScope, PostQuery, TopicQuery};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, instrument};

use crate::{to_timestamp, SqliteBoardRepo};

const FORUM_COLUMNS: &str = "forum_id, parent_id, forum_type, left_id, right_id, forum_name, \
     forum_link, forum_topics, forum_posts, forum_last_post_id, forum_last_poster_id, \
     forum_last_poster_name, forum_last_post_subject, forum_last_post_time, forum_topics_per_page, \
     forum_status";

/// `forum_status` value of a forum closed to posting.
const FORUM_LOCKED: i64 = 1;

const TOPIC_COLUMNS: &str = "topic_id, forum_id, topic_title, topic_first_poster_name, topic_time, \
     topic_last_poster_name, topic_last_post_id, topic_last_post_time, topic_replies, \
     topic_status, topic_approved";

fn forum_from_row(row: &SqliteRow) -> anyhow::Result<ForumNode> {
    let code: i64 = row.try_get("forum_type")?;
    let forum_type =
        ForumType::from_code(code).ok_or_else(|| anyhow!("unknown forum type code {code}"))?;
    let per_page: i64 = row.try_get("forum_topics_per_page")?;

    Ok(ForumNode {
        forum_id: ForumId(row.try_get("forum_id")?),
        parent_id: ForumId(row.try_get("parent_id")?),
        forum_type,
        left_id: row.try_get("left_id")?,
        right_id: row.try_get("right_id")?,
        name: row.try_get("forum_name")?,
        link: row.try_get("forum_link")?,
        total_topics: row.try_get("forum_topics")?,
        total_posts: row.try_get("forum_posts")?,
        last_post: LastPost {
            poster_id: row.try_get::<Option<i64>, _>("forum_last_poster_id")?.map(UserId),
            poster_name: row.try_get("forum_last_poster_name")?,
            post_id: row.try_get::<Option<i64>, _>("forum_last_post_id")?.map(PostId),
            subject: row.try_get("forum_last_post_subject")?,
            time: row
                .try_get::<Option<i64>, _>("forum_last_post_time")?
                .map(to_timestamp),
        },
        topics_per_page: u32::try_from(per_page).ok().filter(|n| *n > 0),
        locked: row.try_get::<i64, _>("forum_status")? == FORUM_LOCKED,
    })
}

fn topic_from_row(row: &SqliteRow) -> anyhow::Result<TopicRow> {
    Ok(TopicRow {
        topic_id: TopicId(row.try_get("topic_id")?),
        forum_id: ForumId(row.try_get("forum_id")?),
        title: row.try_get("topic_title")?,
        author: row.try_get("topic_first_poster_name")?,
        created_at: to_timestamp(row.try_get("topic_time")?),
        last_reply_author: row.try_get("topic_last_poster_name")?,
        last_reply_id: row.try_get::<Option<i64>, _>("topic_last_post_id")?.map(PostId),
        last_reply_at: to_timestamp(row.try_get("topic_last_post_time")?),
        reply_count: row.try_get("topic_replies")?,
        status: TopicStatus::from_code(row.try_get("topic_status")?),
        approved: row.try_get::<i64, _>("topic_approved")? != 0,
    })
}

/// Appends the shared post filter (topic, approval, optional time floor).
/// SQLite integers are signed; anything larger behaves as "no bound".
fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn push_post_filter(qb: &mut QueryBuilder<'_, Sqlite>, query: &PostQuery) {
    qb.push(" WHERE p.topic_id = ")
        .push_bind(query.topic_id.0)
        .push(" AND p.post_approved = 1");
    if let Some(after) = query.posted_after {
        qb.push(" AND p.post_time > ").push_bind(after.timestamp());
    }
}

#[async_trait]
impl ForumRepo for SqliteBoardRepo {
    async fn get_forum(&self, id: ForumId) -> anyhow::Result<Option<ForumNode>> {
        let sql = format!("SELECT {FORUM_COLUMNS} FROM forums WHERE forum_id = ?");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(forum_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn list_forums(&self, scope: ForumScope) -> anyhow::Result<Vec<ForumNode>> {
        let rows = match scope {
            ForumScope::WholeTree => {
                let sql = format!("SELECT {FORUM_COLUMNS} FROM forums ORDER BY left_id ASC");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
            ForumScope::ChildrenOf(parent) => {
                let sql = format!(
                    "SELECT {FORUM_COLUMNS} FROM forums WHERE parent_id = ? ORDER BY left_id ASC"
                );
                sqlx::query(&sql).bind(parent.0).fetch_all(&self.pool).await?
            }
        };
        debug!(rows = rows.len(), "loaded forum rows");

        rows.iter().map(forum_from_row).collect()
    }

    async fn forum_stats(&self, id: ForumId) -> anyhow::Result<Option<ForumStats>> {
        let row = sqlx::query(
            "SELECT f.forum_topics, f.forum_posts, \
             (SELECT COALESCE(SUM(t.topic_replies), 0) FROM topics t WHERE t.forum_id = f.forum_id) AS replies \
             FROM forums f WHERE f.forum_id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ForumStats {
            total_topics: row.try_get("forum_topics")?,
            total_posts: row.try_get("forum_posts")?,
            total_replies: row.try_get("replies")?,
        }))
    }

    /// Appends the forum as the last child of its parent, shifting the bounds
    /// of every row to the right of the insertion point.
    #[instrument(skip(self, forum), fields(parent = %forum.parent_id, name = %forum.name))]
    async fn create_forum(&self, forum: NewForum) -> anyhow::Result<ForumNode> {
        let mut tx = self.pool.begin().await?;

        let left_id: i64 = if forum.parent_id.is_root() {
            let max: Option<i64> = sqlx::query_scalar("SELECT MAX(right_id) FROM forums")
                .fetch_one(&mut *tx)
                .await?;
            max.unwrap_or(0) + 1
        } else {
            let parent_right: Option<i64> =
                sqlx::query_scalar("SELECT right_id FROM forums WHERE forum_id = ?")
                    .bind(forum.parent_id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            let Some(parent_right) = parent_right else {
                bail!("parent forum {} does not exist", forum.parent_id);
            };

            sqlx::query("UPDATE forums SET left_id = left_id + 2 WHERE left_id > ?")
                .bind(parent_right)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE forums SET right_id = right_id + 2 WHERE right_id >= ?")
                .bind(parent_right)
                .execute(&mut *tx)
                .await?;
            parent_right
        };

        let forum_id: i64 = sqlx::query_scalar(
            "INSERT INTO forums (parent_id, forum_type, left_id, right_id, forum_name, forum_link, \
             forum_topics_per_page, forum_status) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING forum_id",
        )
        .bind(forum.parent_id.0)
        .bind(forum.forum_type.code())
        .bind(left_id)
        .bind(left_id + 1)
        .bind(&forum.name)
        .bind(&forum.link)
        .bind(i64::from(forum.topics_per_page.unwrap_or(0)))
        .bind(if forum.locked { FORUM_LOCKED } else { 0 })
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(forum_id, left_id, "forum created");

        self.get_forum(ForumId(forum_id))
            .await?
            .ok_or_else(|| anyhow!("forum {forum_id} vanished after insert"))
    }

    /// Removes `[left_id, right_id]` and everything hanging off it, then closes the gap.
    #[instrument(skip(self))]
    async fn delete_forum(&self, id: ForumId) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let bounds = sqlx::query("SELECT left_id, right_id FROM forums WHERE forum_id = ?")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(bounds) = bounds else {
            return Ok(false);
        };
        let left_id: i64 = bounds.try_get("left_id")?;
        let right_id: i64 = bounds.try_get("right_id")?;
        let width = right_id - left_id + 1;

        let subtree = "SELECT forum_id FROM forums WHERE left_id BETWEEN ? AND ?";
        for table in ["posts", "topics_track", "forums_track", "forums_watch", "acl_grants"] {
            let sql = format!("DELETE FROM {table} WHERE forum_id IN ({subtree})");
            sqlx::query(&sql)
                .bind(left_id)
                .bind(right_id)
                .execute(&mut *tx)
                .await?;
        }
        let sql = format!(
            "DELETE FROM topics_posted WHERE topic_id IN \
             (SELECT topic_id FROM topics WHERE forum_id IN ({subtree}))"
        );
        sqlx::query(&sql)
            .bind(left_id)
            .bind(right_id)
            .execute(&mut *tx)
            .await?;
        let sql = format!("DELETE FROM topics WHERE forum_id IN ({subtree})");
        sqlx::query(&sql)
            .bind(left_id)
            .bind(right_id)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM forums WHERE left_id BETWEEN ? AND ?")
            .bind(left_id)
            .bind(right_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE forums SET left_id = left_id - ? WHERE left_id > ?")
            .bind(width)
            .bind(right_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE forums SET right_id = right_id - ? WHERE right_id > ?")
            .bind(width)
            .bind(right_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(removed, "forum subtree deleted");
        Ok(true)
    }

    async fn get_topic(&self, id: TopicId) -> anyhow::Result<Option<TopicRow>> {
        let sql = format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE topic_id = ?");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(topic_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn list_topics(&self, query: &TopicQuery) -> anyhow::Result<Vec<TopicRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {TOPIC_COLUMNS} FROM topics"));
        qb.push(" WHERE forum_id = ").push_bind(query.forum_id.0);
        if !query.include_unapproved {
            qb.push(" AND topic_approved = 1");
        }
        qb.push(" ORDER BY topic_last_post_time DESC, topic_id DESC")
            .push(" LIMIT ")
            .push_bind(saturating_i64(query.limit))
            .push(" OFFSET ")
            .push_bind(saturating_i64(query.offset));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(topic_from_row).collect()
    }

    async fn count_posts(&self, query: &PostQuery) -> anyhow::Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts p");
        // `limit` only bounds the listing, never the count.
        push_post_filter(&mut qb, query);
        let total = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self))]
    async fn list_posts(&self, query: &PostQuery) -> anyhow::Result<Vec<PostRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT p.post_id, p.poster_id, COALESCE(u.username, '') AS username, p.post_time, \
             p.post_text FROM posts p LEFT JOIN users u ON u.user_id = p.poster_id",
        );
        push_post_filter(&mut qb, query);
        qb.push(match query.sort {
            SortOrder::Asc => " ORDER BY p.post_time ASC, p.post_id ASC",
            SortOrder::Desc => " ORDER BY p.post_time DESC, p.post_id DESC",
        });
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ")
                .push_bind(saturating_i64(limit))
                .push(" OFFSET ")
                .push_bind(saturating_i64(query.offset));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(PostRow {
                    post_id: PostId(row.try_get("post_id")?),
                    author_id: UserId(row.try_get("poster_id")?),
                    author_username: row.try_get("username")?,
                    posted_at: to_timestamp(row.try_get("post_time")?),
                    post_text: row.try_get("post_text")?,
                })
            })
            .collect()
    }
}
