//! # Tracking Merger
//!
//! Decorates forum and topic rows with the caller's read state.
//!
//! Missing tracking data always reads as "unread": an anonymous caller, a
//! forum never visited, or tracking switched off board-wide. Watch and
//! participation flags exist only for authenticated callers and are left out
//! of the output entirely for anonymous ones.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{
    BoardSettings, ForumEntry, ForumId, ForumNode, Principal, TopicId, TopicRow, TopicStatus,
    TopicSummary,
};
use crate::traits::TrackingRepo;

/// Read marks and watches of one caller for a set of forums.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForumTracking {
    pub marks: HashMap<ForumId, DateTime<Utc>>,
    /// `None` for anonymous callers.
    pub watches: Option<HashSet<ForumId>>,
}

impl ForumTracking {
    pub async fn load(
        repo: &dyn TrackingRepo,
        principal: &Principal,
        settings: &BoardSettings,
        forums: &[ForumId],
    ) -> anyhow::Result<Self> {
        let Principal::User(user) = *principal else {
            return Ok(Self::default());
        };
        if forums.is_empty() {
            return Ok(Self {
                marks: HashMap::new(),
                watches: Some(HashSet::new()),
            });
        }

        let marks = if settings.load_db_lastread {
            repo.forum_marks(user, forums).await?
        } else {
            HashMap::new()
        };
        let watches = repo.forum_watches(user, forums).await?;

        Ok(Self {
            marks,
            watches: Some(watches),
        })
    }
}

/// Read marks and participation of one caller for a page of topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicTracking {
    pub marks: HashMap<TopicId, DateTime<Utc>>,
    /// `None` for anonymous callers.
    pub posted: Option<HashSet<TopicId>>,
}

impl TopicTracking {
    pub async fn load(
        repo: &dyn TrackingRepo,
        principal: &Principal,
        settings: &BoardSettings,
        topics: &[TopicId],
    ) -> anyhow::Result<Self> {
        let Principal::User(user) = *principal else {
            return Ok(Self::default());
        };
        if topics.is_empty() {
            return Ok(Self {
                marks: HashMap::new(),
                posted: Some(HashSet::new()),
            });
        }

        let marks = if settings.load_db_lastread {
            repo.topic_marks(user, topics).await?
        } else {
            HashMap::new()
        };
        let posted = if settings.load_db_track {
            repo.topics_posted(user, topics).await?
        } else {
            HashSet::new()
        };

        Ok(Self {
            marks,
            posted: Some(posted),
        })
    }
}

/// A topic is unread unless its mark is at or after the last reply.
fn topic_unread(mark: Option<&DateTime<Utc>>, last_reply: DateTime<Utc>) -> bool {
    mark.is_none_or(|mark| *mark < last_reply)
}

/// Turns visible forum rows into listing entries.
///
/// A forum counts as read once it carries any mark; its last post time is
/// not compared.
pub fn annotate_forums(nodes: Vec<ForumNode>, tracking: &ForumTracking) -> Vec<ForumEntry> {
    nodes
        .into_iter()
        .map(|node| {
            let unread = !tracking.marks.contains_key(&node.forum_id);
            let watched = tracking
                .watches
                .as_ref()
                .map(|set| set.contains(&node.forum_id));
            ForumEntry {
                forum_id: node.forum_id,
                parent_id: node.parent_id,
                forum_name: node.name,
                unread,
                watched,
                total_topics: node.total_topics,
                total_posts: node.total_posts,
                last_poster_id: node.last_post.poster_id,
                last_poster_name: node.last_post.poster_name,
                last_post_topic_id: node.last_post.post_id,
                last_post_topic_name: node.last_post.subject,
                last_post_time: node.last_post.time,
            }
        })
        .collect()
}

/// Turns a page of topic rows into listing summaries.
pub fn annotate_topics(rows: Vec<TopicRow>, tracking: &TopicTracking) -> Vec<TopicSummary> {
    rows.into_iter()
        .map(|row| {
            let unread = topic_unread(tracking.marks.get(&row.topic_id), row.last_reply_at);
            let posted_by_caller = tracking
                .posted
                .as_ref()
                .map(|set| set.contains(&row.topic_id));
            TopicSummary {
                topic_id: row.topic_id,
                title: row.title,
                author: row.author,
                created_at: row.created_at,
                last_reply_author: row.last_reply_author,
                last_reply_id: row.last_reply_id,
                last_reply_at: row.last_reply_at,
                reply_count: row.reply_count,
                unread,
                posted_by_caller,
                locked: row.status == TopicStatus::Locked,
                status: row.status,
            }
        })
        .collect()
}
