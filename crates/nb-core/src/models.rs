//! # Domain Models
//!
//! These structs represent the core entities of nestboard: forums stored as a
//! nested set, topics, posts and the caller that asks for them.
//! Timestamps are serialized as unix seconds to keep the JSON wire format stable.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Forum identifier. `ForumId::ROOT` (0) is the virtual parent of top-level forums
    /// and the scope used for board-wide capabilities.
    ForumId
);
id_type!(TopicId);
id_type!(PostId);
id_type!(UserId);

impl ForumId {
    pub const ROOT: ForumId = ForumId(0);

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

/// The guest account. Anonymous callers are evaluated against its grants.
pub const ANONYMOUS_USER_ID: UserId = UserId(1);

/// Who is asking. Resolved once per request by the session subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
    Anonymous,
    User(UserId),
}

impl Principal {
    /// The account whose grants and tracking rows apply to this principal.
    pub fn user_id(&self) -> UserId {
        match self {
            Principal::Anonymous => ANONYMOUS_USER_ID,
            Principal::User(id) => *id,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }
}

/// Named permissions checked against a principal and a forum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "f_list")]
    List,
    #[serde(rename = "f_read")]
    Read,
    #[serde(rename = "f_post")]
    Post,
    #[serde(rename = "f_reply")]
    Reply,
    /// Moderator override: sees topics still waiting for approval.
    #[serde(rename = "m_approve")]
    Approve,
    #[serde(rename = "a_forumadd")]
    ForumAdd,
    #[serde(rename = "a_forumdel")]
    ForumDelete,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::List,
        Capability::Read,
        Capability::Post,
        Capability::Reply,
        Capability::Approve,
        Capability::ForumAdd,
        Capability::ForumDelete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::List => "f_list",
            Capability::Read => "f_read",
            Capability::Post => "f_post",
            Capability::Reply => "f_reply",
            Capability::Approve => "m_approve",
            Capability::ForumAdd => "a_forumadd",
            Capability::ForumDelete => "a_forumdel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.name() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a forum row represents in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForumType {
    Category,
    Post,
    Link,
}

impl ForumType {
    /// Storage code, matching the numbering of the forum table.
    pub fn code(self) -> i64 {
        match self {
            ForumType::Category => 0,
            ForumType::Post => 1,
            ForumType::Link => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ForumType::Category),
            1 => Some(ForumType::Post),
            2 => Some(ForumType::Link),
            _ => None,
        }
    }
}

/// Summary of the most recent post in a forum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastPost {
    pub poster_id: Option<UserId>,
    pub poster_name: String,
    pub post_id: Option<PostId>,
    pub subject: String,
    pub time: Option<DateTime<Utc>>,
}

/// A raw row of the nested-set forum table.
///
/// Every descendant of a node has its `left_id` strictly between the node's
/// `left_id` and `right_id`; a node is a leaf iff `right_id == left_id + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumNode {
    pub forum_id: ForumId,
    pub parent_id: ForumId,
    pub forum_type: ForumType,
    pub left_id: i64,
    pub right_id: i64,
    pub name: String,
    /// Link target for `ForumType::Link` rows, empty otherwise.
    pub link: String,
    pub total_topics: i64,
    pub total_posts: i64,
    pub last_post: LastPost,
    pub topics_per_page: Option<u32>,
    /// Closed to new topics and replies.
    pub locked: bool,
}

impl ForumNode {
    pub fn is_leaf(&self) -> bool {
        self.right_id == self.left_id + 1
    }

    /// Categories without children are never shown.
    pub fn is_empty_category(&self) -> bool {
        self.forum_type == ForumType::Category && self.is_leaf()
    }

    /// True for link forums that actually point somewhere.
    pub fn is_navigable_link(&self) -> bool {
        self.forum_type == ForumType::Link && !self.link.is_empty()
    }
}

/// Moderation state of a topic row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Normal,
    Locked,
    /// Shadow left behind when a topic is moved to another forum.
    #[serde(rename = "shadow")]
    Moved,
}

impl TopicStatus {
    pub fn code(self) -> i64 {
        match self {
            TopicStatus::Normal => 0,
            TopicStatus::Locked => 1,
            TopicStatus::Moved => 2,
        }
    }

    /// Unknown codes are treated as normal topics.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => TopicStatus::Locked,
            2 => TopicStatus::Moved,
            _ => TopicStatus::Normal,
        }
    }
}

/// A raw topic row as returned by the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRow {
    pub topic_id: TopicId,
    pub forum_id: ForumId,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub last_reply_author: String,
    pub last_reply_id: Option<PostId>,
    pub last_reply_at: DateTime<Utc>,
    pub reply_count: i64,
    pub status: TopicStatus,
    pub approved: bool,
}

/// A topic as listed on a forum page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSummary {
    pub topic_id: TopicId,
    #[serde(rename = "topic_title")]
    pub title: String,
    #[serde(rename = "topic_author_username")]
    pub author: String,
    #[serde(rename = "topic_time", with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "topic_last_reply_username")]
    pub last_reply_author: String,
    #[serde(rename = "topic_last_reply_id")]
    pub last_reply_id: Option<PostId>,
    #[serde(rename = "topic_last_reply_time", with = "chrono::serde::ts_seconds")]
    pub last_reply_at: DateTime<Utc>,
    #[serde(rename = "topic_num_replies")]
    pub reply_count: i64,
    #[serde(rename = "topic_unread")]
    pub unread: bool,
    /// Omitted for anonymous callers.
    #[serde(rename = "topic_posted", skip_serializing_if = "Option::is_none")]
    pub posted_by_caller: Option<bool>,
    #[serde(rename = "topic_locked")]
    pub locked: bool,
    #[serde(rename = "topic_status")]
    pub status: TopicStatus,
}

/// A forum as listed on the board index or as a subforum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForumEntry {
    pub forum_id: ForumId,
    pub parent_id: ForumId,
    pub forum_name: String,
    pub unread: bool,
    /// Omitted for anonymous callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched: Option<bool>,
    pub total_topics: i64,
    pub total_posts: i64,
    pub last_poster_id: Option<UserId>,
    pub last_poster_name: String,
    pub last_post_topic_id: Option<PostId>,
    pub last_post_topic_name: String,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_post_time: Option<DateTime<Utc>>,
}

/// Board-wide listing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardSettings {
    /// Global default page size, always greater than zero.
    pub topics_per_page: u32,
    /// Whether forum/topic read marks are tracked.
    pub load_db_lastread: bool,
    /// Whether "caller posted in this topic" is tracked.
    pub load_db_track: bool,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            topics_per_page: 25,
            load_db_lastread: true,
            load_db_track: true,
        }
    }
}

/// Aggregate counters for a single forum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForumStats {
    pub total_topics: i64,
    pub total_posts: i64,
    pub total_replies: i64,
}

/// A post row, joined with its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRow {
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_username: String,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_seconds")]
    pub posted_at: DateTime<Utc>,
    pub post_text: String,
}

/// Ordering of a post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than `DESC` (case-insensitive) falls back to ascending.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_uppercase).as_deref() {
            Some("DESC") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

/// Account profile exposed to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub user_email: String,
    pub user_lang: String,
    pub user_timezone: String,
}

/// One hit of a username search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMatch {
    pub user_id: UserId,
    pub username: String,
    pub user_email: String,
}

/// A fully-formed topic handed to the posting subsystem.
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub forum_id: ForumId,
    pub author: UserId,
    pub title: String,
    pub body: String,
    pub posted_at: DateTime<Utc>,
}

/// A fully-formed reply handed to the posting subsystem.
#[derive(Debug, Clone)]
pub struct NewReply {
    pub topic_id: TopicId,
    pub forum_id: ForumId,
    pub author: UserId,
    pub subject: String,
    pub body: String,
    pub posted_at: DateTime<Utc>,
}

/// A forum to be appended as the last child of `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewForum {
    #[serde(default = "root_forum")]
    pub parent_id: ForumId,
    #[serde(rename = "forum_name")]
    pub name: String,
    #[serde(default = "post_forum")]
    pub forum_type: ForumType,
    #[serde(rename = "forum_link", default)]
    pub link: String,
    #[serde(default)]
    pub topics_per_page: Option<u32>,
    /// Closed to new topics. Only post forums can be locked.
    #[serde(rename = "forum_locked", default)]
    pub locked: bool,
}

fn root_forum() -> ForumId {
    ForumId::ROOT
}

fn post_forum() -> ForumType {
    ForumType::Post
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_category_is_a_leaf_category() {
        let mut node = ForumNode {
            forum_id: ForumId(1),
            parent_id: ForumId::ROOT,
            forum_type: ForumType::Category,
            left_id: 1,
            right_id: 2,
            name: "General".into(),
            link: String::new(),
            total_topics: 0,
            total_posts: 0,
            last_post: LastPost::default(),
            topics_per_page: None,
            locked: false,
        };
        assert!(node.is_empty_category());

        node.right_id = 4;
        assert!(!node.is_empty_category());

        node.forum_type = ForumType::Post;
        node.right_id = 2;
        assert!(!node.is_empty_category());
    }

    #[test]
    fn capability_names_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(Capability::from_name(cap.name()), Some(cap));
        }
        assert_eq!(Capability::from_name("u_whatever"), None);
    }

    #[test]
    fn sort_order_is_lenient() {
        assert_eq!(SortOrder::parse_lenient(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient(Some("sideways")), SortOrder::Asc);
        assert_eq!(SortOrder::parse_lenient(None), SortOrder::Asc);
    }

    #[test]
    fn topic_status_serializes_shadow() {
        let json = serde_json::to_value(TopicStatus::Moved).unwrap();
        assert_eq!(json, serde_json::json!("shadow"));
        assert_eq!(TopicStatus::from_code(99), TopicStatus::Normal);
    }
}
