//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Store ports are async and report infrastructure failures through `anyhow`;
//! the authorization oracle is synchronous because its grants are prefetched
//! once per request by the `AuthProvider`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Capability, ForumId, ForumNode, ForumStats, NewForum, NewReply, NewTopic, PostId, PostRow,
    Principal, SortOrder, TopicId, TopicRow, UserId, UserMatch, UserProfile,
};

/// Which part of the forum tree a listing reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForumScope {
    /// Every forum on the board.
    WholeTree,
    /// Direct children of the given forum.
    ChildrenOf(ForumId),
}

impl ForumScope {
    /// Board listings treat the root as "whole tree".
    pub fn for_parent(parent: ForumId) -> Self {
        if parent.is_root() {
            ForumScope::WholeTree
        } else {
            ForumScope::ChildrenOf(parent)
        }
    }

    pub fn parent(&self) -> ForumId {
        match self {
            ForumScope::WholeTree => ForumId::ROOT,
            ForumScope::ChildrenOf(id) => *id,
        }
    }
}

/// One page of topics in a forum, most recent activity first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicQuery {
    pub forum_id: ForumId,
    /// Include topics still waiting for moderator approval.
    pub include_unapproved: bool,
    pub offset: u64,
    pub limit: u64,
}

/// Filter for a topic's post listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub topic_id: TopicId,
    pub sort: SortOrder,
    pub limit: Option<u64>,
    /// Posts skipped before the first one returned. Only applies with a `limit`.
    pub offset: u64,
    /// Keep only posts made strictly after this instant.
    pub posted_after: Option<DateTime<Utc>>,
}

/// A single capability grant. `ForumId::ROOT` grants apply board-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grant {
    pub forum_id: ForumId,
    pub capability: Capability,
}

/// Data persistence contract for forums, topics and posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ForumRepo: Send + Sync {
    // Forum Operations
    async fn get_forum(&self, id: ForumId) -> anyhow::Result<Option<ForumNode>>;
    /// Rows of the scope, ordered by `left_id` ascending.
    async fn list_forums(&self, scope: ForumScope) -> anyhow::Result<Vec<ForumNode>>;
    async fn forum_stats(&self, id: ForumId) -> anyhow::Result<Option<ForumStats>>;
    async fn create_forum(&self, forum: NewForum) -> anyhow::Result<ForumNode>;
    /// Removes the forum, its subtree and their content. `false` if it did not exist.
    async fn delete_forum(&self, id: ForumId) -> anyhow::Result<bool>;

    // Topic Operations
    async fn get_topic(&self, id: TopicId) -> anyhow::Result<Option<TopicRow>>;
    async fn list_topics(&self, query: &TopicQuery) -> anyhow::Result<Vec<TopicRow>>;

    // Post Operations
    async fn count_posts(&self, query: &PostQuery) -> anyhow::Result<i64>;
    async fn list_posts(&self, query: &PostQuery) -> anyhow::Result<Vec<PostRow>>;
}

/// Contract of the posting subsystem: stores fully-formed topics and replies.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostingGateway: Send + Sync {
    async fn submit_topic(&self, topic: NewTopic) -> anyhow::Result<TopicId>;
    async fn submit_reply(&self, reply: NewReply) -> anyhow::Result<PostId>;
}

/// Per-user read marks, watches and participation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TrackingRepo: Send + Sync {
    async fn forum_marks(
        &self,
        user: UserId,
        forums: &[ForumId],
    ) -> anyhow::Result<HashMap<ForumId, DateTime<Utc>>>;
    /// Forums the user watches for notifications.
    async fn forum_watches(&self, user: UserId, forums: &[ForumId]) -> anyhow::Result<HashSet<ForumId>>;
    async fn topic_marks(
        &self,
        user: UserId,
        topics: &[TopicId],
    ) -> anyhow::Result<HashMap<TopicId, DateTime<Utc>>>;
    /// Topics the user has posted in.
    async fn topics_posted(&self, user: UserId, topics: &[TopicId]) -> anyhow::Result<HashSet<TopicId>>;
}

/// Credential and grant storage backing the session subsystem.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Looks up the owner of a hashed API secret.
    async fn user_for_secret(&self, secret_hash: &str) -> anyhow::Result<Option<UserId>>;
    async fn get_user(&self, id: UserId) -> anyhow::Result<Option<UserProfile>>;
    /// Users whose name contains `needle`, case-insensitively, ordered by name.
    async fn search_users(&self, needle: &str) -> anyhow::Result<Vec<UserMatch>>;
    async fn grants_for(&self, user: UserId) -> anyhow::Result<Vec<Grant>>;
}

/// The authorization oracle. Must answer in O(1) per call.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Authorizer: Send + Sync {
    fn has_capability(&self, principal: &Principal, capability: Capability, forum: ForumId) -> bool;

    fn has_any_capability(
        &self,
        principal: &Principal,
        capabilities: &[Capability],
        forum: ForumId,
    ) -> bool {
        capabilities
            .iter()
            .any(|cap| self.has_capability(principal, *cap, forum))
    }
}

/// The resolved caller of one request.
#[derive(Clone)]
pub struct Session {
    pub principal: Principal,
    pub acl: Arc<dyn Authorizer>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("principal", &self.principal)
            .finish_non_exhaustive()
    }
}

/// Identity contract: resolves a caller secret into a `Session`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `None` means anonymous. An unknown secret is `AppError::Unauthorized`.
    async fn authenticate(&self, secret: Option<&str>) -> Result<Session>;
}
