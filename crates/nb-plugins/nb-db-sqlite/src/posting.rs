//! # Posting
//!
//! Stores new topics and replies and keeps the denormalized counters and
//! last-post fields of topics and forums in step. Each submission is one
//! transaction.

use anyhow::anyhow;
use async_trait::async_trait;
use nb_core::models::{ForumId, NewReply, NewTopic, PostId, TopicId, UserId};
use nb_core::traits::PostingGateway;
use sqlx::{Sqlite, Transaction};
use tracing::{info, instrument};

use crate::SqliteBoardRepo;

struct PostInsert<'a> {
    topic_id: i64,
    forum_id: ForumId,
    author: UserId,
    subject: &'a str,
    body: &'a str,
    posted_at: i64,
}

async fn username(tx: &mut Transaction<'_, Sqlite>, user: UserId) -> anyhow::Result<String> {
    sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE user_id = ?")
        .bind(user.0)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| anyhow!("user {user} does not exist"))
}

async fn insert_post(tx: &mut Transaction<'_, Sqlite>, post: PostInsert<'_>) -> anyhow::Result<i64> {
    let post_id: i64 = sqlx::query_scalar(
        "INSERT INTO posts (topic_id, forum_id, poster_id, post_subject, post_text, post_time) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING post_id",
    )
    .bind(post.topic_id)
    .bind(post.forum_id.0)
    .bind(post.author.0)
    .bind(post.subject)
    .bind(post.body)
    .bind(post.posted_at)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT INTO topics_posted (user_id, topic_id, topic_posted) VALUES (?, ?, 1) \
         ON CONFLICT (user_id, topic_id) DO UPDATE SET topic_posted = 1",
    )
    .bind(post.author.0)
    .bind(post.topic_id)
    .execute(&mut **tx)
    .await?;

    Ok(post_id)
}

/// Moves the forum's last-post summary to the given post and bumps its counters.
async fn bump_forum(
    tx: &mut Transaction<'_, Sqlite>,
    forum_id: ForumId,
    new_topics: i64,
    post_id: i64,
    poster: (UserId, &str),
    subject: &str,
    posted_at: i64,
) -> anyhow::Result<()> {
    let updated = sqlx::query(
        "UPDATE forums SET forum_topics = forum_topics + ?, forum_posts = forum_posts + 1, \
         forum_last_post_id = ?, forum_last_poster_id = ?, forum_last_poster_name = ?, \
         forum_last_post_subject = ?, forum_last_post_time = ? WHERE forum_id = ?",
    )
    .bind(new_topics)
    .bind(post_id)
    .bind(poster.0 .0)
    .bind(poster.1)
    .bind(subject)
    .bind(posted_at)
    .bind(forum_id.0)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(anyhow!("forum {forum_id} does not exist"));
    }
    Ok(())
}

#[async_trait]
impl PostingGateway for SqliteBoardRepo {
    #[instrument(skip(self, topic), fields(forum = %topic.forum_id, author = %topic.author))]
    async fn submit_topic(&self, topic: NewTopic) -> anyhow::Result<TopicId> {
        let mut tx = self.pool.begin().await?;
        let author_name = username(&mut tx, topic.author).await?;
        let posted_at = topic.posted_at.timestamp();

        let topic_id: i64 = sqlx::query_scalar(
            "INSERT INTO topics (forum_id, topic_title, topic_poster, topic_first_poster_name, \
             topic_time, topic_last_poster_name, topic_last_post_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING topic_id",
        )
        .bind(topic.forum_id.0)
        .bind(&topic.title)
        .bind(topic.author.0)
        .bind(&author_name)
        .bind(posted_at)
        .bind(&author_name)
        .bind(posted_at)
        .fetch_one(&mut *tx)
        .await?;

        let post_id = insert_post(
            &mut tx,
            PostInsert {
                topic_id,
                forum_id: topic.forum_id,
                author: topic.author,
                subject: &topic.title,
                body: &topic.body,
                posted_at,
            },
        )
        .await?;

        sqlx::query("UPDATE topics SET topic_last_post_id = ? WHERE topic_id = ?")
            .bind(post_id)
            .bind(topic_id)
            .execute(&mut *tx)
            .await?;
        bump_forum(
            &mut tx,
            topic.forum_id,
            1,
            post_id,
            (topic.author, &author_name),
            &topic.title,
            posted_at,
        )
        .await?;

        tx.commit().await?;
        info!(topic_id, post_id, "topic submitted");
        Ok(TopicId(topic_id))
    }

    #[instrument(skip(self, reply), fields(topic = %reply.topic_id, author = %reply.author))]
    async fn submit_reply(&self, reply: NewReply) -> anyhow::Result<PostId> {
        let mut tx = self.pool.begin().await?;
        let author_name = username(&mut tx, reply.author).await?;
        let posted_at = reply.posted_at.timestamp();

        let post_id = insert_post(
            &mut tx,
            PostInsert {
                topic_id: reply.topic_id.0,
                forum_id: reply.forum_id,
                author: reply.author,
                subject: &reply.subject,
                body: &reply.body,
                posted_at,
            },
        )
        .await?;

        let updated = sqlx::query(
            "UPDATE topics SET topic_replies = topic_replies + 1, topic_last_post_id = ?, \
             topic_last_poster_name = ?, topic_last_post_time = ? WHERE topic_id = ?",
        )
        .bind(post_id)
        .bind(&author_name)
        .bind(posted_at)
        .bind(reply.topic_id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(anyhow!("topic {} does not exist", reply.topic_id));
        }

        bump_forum(
            &mut tx,
            reply.forum_id,
            0,
            post_id,
            (reply.author, &author_name),
            &reply.subject,
            posted_at,
        )
        .await?;

        tx.commit().await?;
        info!(post_id, "reply submitted");
        Ok(PostId(post_id))
    }
}
