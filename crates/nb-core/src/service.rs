//! # Board Service
//!
//! Request-level operations outside the listing pipeline: forum and topic
//! details, capability reports, posting, forum administration and account
//! lookups. Each operation checks the session's capabilities before it
//! touches a store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::assembler::{FORUM_NOT_FOUND, READ_DENIED_GUEST, READ_DENIED_USER};
use crate::error::{AppError, Result};
use crate::models::{
    Capability, ForumId, ForumNode, ForumStats, ForumType, NewForum, NewReply, NewTopic, PostId,
    PostRow, Principal, SortOrder, TopicId, TopicStatus, UserId, UserMatch, UserProfile,
};
use crate::traits::{AccountRepo, ForumRepo, PostQuery, PostingGateway, Session};

pub const TOPIC_NOT_FOUND: &str = "The topic you selected does not exist.";
const EMPTY_FORUM_STATS: &str = "Unable to collect info on empty forum id.";
const EMPTY_FORUM_PERMISSIONS: &str = "Unable to get permissions on empty forum id";
const AREA_DENIED: &str = "You are not authorised to access this area.";
const POST_DENIED: &str = "You are not authorised to post a new topic in this forum.";
const REPLY_DENIED: &str = "You do not have necessary permissions to post in this topic!";
const FORUM_ADD_DENIED: &str = "You are not authorised to create a new forum.";
const FORUM_DELETE_DENIED: &str = "You are not authorised to delete a forum.";
const MUST_BE_AUTHORIZED: &str = "Must be authorized";
const USER_NOT_FOUND: &str = "The user you selected does not exist.";
const FORUM_LOCKED: &str = "This forum is locked, you cannot post new topics or replies.";
const TOPIC_LOCKED: &str = "This topic is locked, you cannot edit posts or make further replies.";

/// What the caller may do in one forum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForumPermissions {
    pub can_see: bool,
    pub can_read: bool,
    pub can_post: bool,
    pub can_reply: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopicInfo {
    pub forum_id: ForumId,
    pub total_replies: i64,
}

/// Raw post listing parameters; non-positive values are ignored.
///
/// `page` counts in steps of `limit` and has no effect without one.
#[derive(Debug, Clone, Default)]
pub struct PostListing {
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub older_than: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicPosts {
    pub forum_id: ForumId,
    pub forum_name: String,
    pub topic_id: TopicId,
    pub topic_title: String,
    pub posts_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<PostRow>>,
}

/// Username search result. No hits leaves `users` out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSearch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserMatch>>,
}

pub struct BoardService<'a> {
    forums: &'a dyn ForumRepo,
    posting: &'a dyn PostingGateway,
    accounts: &'a dyn AccountRepo,
}

fn bad_format(errors: &[&str]) -> AppError {
    AppError::bad_format(format!("Following errors occured: {}", errors.join(",")))
}

impl<'a> BoardService<'a> {
    pub fn new(
        forums: &'a dyn ForumRepo,
        posting: &'a dyn PostingGateway,
        accounts: &'a dyn AccountRepo,
    ) -> Self {
        Self {
            forums,
            posting,
            accounts,
        }
    }

    pub async fn forum_stats(&self, forum_id: Option<ForumId>) -> Result<ForumStats> {
        let forum_id = forum_id.ok_or_else(|| AppError::not_found(EMPTY_FORUM_STATS))?;
        self.forums
            .forum_stats(forum_id)
            .await?
            .ok_or_else(|| AppError::not_found(FORUM_NOT_FOUND))
    }

    pub fn forum_permissions(&self, session: &Session, forum_id: Option<ForumId>) -> Result<ForumPermissions> {
        let forum_id = forum_id.ok_or_else(|| AppError::not_found(EMPTY_FORUM_PERMISSIONS))?;
        Ok(permissions(session, forum_id))
    }

    pub async fn topic_info(&self, topic_id: TopicId) -> Result<TopicInfo> {
        let topic = self
            .forums
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| AppError::not_found(TOPIC_NOT_FOUND))?;
        Ok(TopicInfo {
            forum_id: topic.forum_id,
            total_replies: topic.reply_count,
        })
    }

    pub async fn topic_permissions(&self, session: &Session, topic_id: TopicId) -> Result<ForumPermissions> {
        let info = self.topic_info(topic_id).await?;
        Ok(permissions(session, info.forum_id))
    }

    /// Approved posts of a topic the caller may read.
    #[instrument(skip(self, session), fields(principal = ?session.principal))]
    pub async fn topic_posts(
        &self,
        session: &Session,
        topic_id: TopicId,
        listing: PostListing,
    ) -> Result<TopicPosts> {
        let topic = self
            .forums
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| AppError::not_found(TOPIC_NOT_FOUND))?;

        if !session
            .acl
            .has_capability(&session.principal, Capability::Read, topic.forum_id)
        {
            let msg = if session.principal.is_anonymous() {
                READ_DENIED_GUEST
            } else {
                READ_DENIED_USER
            };
            return Err(AppError::unauthorized(msg));
        }

        let forum_name = self
            .forums
            .get_forum(topic.forum_id)
            .await?
            .map(|forum| forum.name)
            .unwrap_or_default();

        let limit = listing.limit.filter(|n| *n > 0).and_then(|n| u64::try_from(n).ok());
        let page = listing
            .page
            .filter(|n| *n > 1)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(1);
        let query = PostQuery {
            topic_id,
            sort: SortOrder::parse_lenient(listing.sort.as_deref()),
            limit,
            offset: limit.map_or(0, |limit| (page - 1).saturating_mul(limit)),
            posted_after: listing
                .older_than
                .filter(|secs| *secs > 0)
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        };
        let posts_count = self.forums.count_posts(&query).await?;
        let posts = self.forums.list_posts(&query).await?;

        Ok(TopicPosts {
            forum_id: topic.forum_id,
            forum_name,
            topic_id,
            topic_title: topic.title,
            posts_count,
            posts: (!posts.is_empty()).then_some(posts),
        })
    }

    #[instrument(skip(self, session, title, body), fields(principal = ?session.principal))]
    pub async fn new_topic(
        &self,
        session: &Session,
        forum_id: ForumId,
        title: &str,
        body: &str,
    ) -> Result<TopicId> {
        let Principal::User(author) = session.principal else {
            return Err(AppError::unauthorized(AREA_DENIED));
        };
        if !session
            .acl
            .has_capability(&session.principal, Capability::Post, forum_id)
        {
            return Err(AppError::unauthorized(POST_DENIED));
        }

        let mut errors = Vec::new();
        if title.trim().is_empty() {
            errors.push("topic_title is empty");
        }
        if body.trim().is_empty() {
            errors.push("topic_body is empty");
        }
        if !errors.is_empty() {
            return Err(bad_format(&errors));
        }

        let forum = self
            .forums
            .get_forum(forum_id)
            .await?
            .ok_or_else(|| AppError::not_found(FORUM_NOT_FOUND))?;
        if forum.forum_type != ForumType::Post {
            return Err(bad_format(&["topics can only be posted in post forums"]));
        }
        if forum.locked && !moderates(session, forum_id) {
            return Err(AppError::unauthorized(FORUM_LOCKED));
        }

        let topic_id = self
            .posting
            .submit_topic(NewTopic {
                forum_id,
                author,
                title: title.trim().to_string(),
                body: body.to_string(),
                posted_at: Utc::now(),
            })
            .await?;
        info!(%topic_id, %forum_id, "new topic");
        Ok(topic_id)
    }

    #[instrument(skip(self, session, body), fields(principal = ?session.principal))]
    pub async fn reply(&self, session: &Session, topic_id: TopicId, body: &str) -> Result<PostId> {
        let topic = self
            .forums
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| AppError::not_found(TOPIC_NOT_FOUND))?;
        if !session
            .acl
            .has_capability(&session.principal, Capability::Reply, topic.forum_id)
        {
            return Err(AppError::unauthorized(REPLY_DENIED));
        }
        if !moderates(session, topic.forum_id) {
            if topic.status == TopicStatus::Locked {
                return Err(AppError::unauthorized(TOPIC_LOCKED));
            }
            let forum_locked = self
                .forums
                .get_forum(topic.forum_id)
                .await?
                .is_some_and(|forum| forum.locked);
            if forum_locked {
                return Err(AppError::unauthorized(FORUM_LOCKED));
            }
        }
        if body.trim().is_empty() {
            return Err(bad_format(&["topic_body is empty"]));
        }

        let post_id = self
            .posting
            .submit_reply(NewReply {
                topic_id,
                forum_id: topic.forum_id,
                author: session.principal.user_id(),
                subject: format!("Re: {}", topic.title),
                body: body.to_string(),
                posted_at: Utc::now(),
            })
            .await?;
        info!(%post_id, %topic_id, "reply posted");
        Ok(post_id)
    }

    /// Appends a forum as the last child of `forum.parent_id`.
    #[instrument(skip(self, session, forum), fields(principal = ?session.principal))]
    pub async fn create_forum(&self, session: &Session, mut forum: NewForum) -> Result<ForumNode> {
        if !session
            .acl
            .has_capability(&session.principal, Capability::ForumAdd, ForumId::ROOT)
        {
            return Err(AppError::unauthorized(FORUM_ADD_DENIED));
        }

        forum.name = forum.name.trim().to_string();
        let mut errors = Vec::new();
        if forum.name.is_empty() {
            errors.push("forum_name is empty");
        }
        if forum.forum_type == ForumType::Link && forum.link.trim().is_empty() {
            errors.push("forum_link is required for link forums");
        }
        if !errors.is_empty() {
            return Err(bad_format(&errors));
        }
        // Categories and links cannot be locked.
        if forum.forum_type != ForumType::Post {
            forum.locked = false;
        }

        if !forum.parent_id.is_root() && self.forums.get_forum(forum.parent_id).await?.is_none() {
            return Err(AppError::not_found(FORUM_NOT_FOUND));
        }

        let created = self.forums.create_forum(forum).await?;
        info!(forum_id = %created.forum_id, "forum created");
        Ok(created)
    }

    /// Removes a forum with its subtree and content.
    #[instrument(skip(self, session), fields(principal = ?session.principal))]
    pub async fn delete_forum(&self, session: &Session, forum_id: ForumId) -> Result<ForumId> {
        if !session
            .acl
            .has_capability(&session.principal, Capability::ForumDelete, ForumId::ROOT)
        {
            return Err(AppError::unauthorized(FORUM_DELETE_DENIED));
        }
        if !self.forums.delete_forum(forum_id).await? {
            return Err(AppError::not_found(FORUM_NOT_FOUND));
        }
        info!(%forum_id, "forum deleted");
        Ok(forum_id)
    }

    pub async fn current_user(&self, session: &Session) -> Result<UserProfile> {
        if session.principal.is_anonymous() {
            return Err(AppError::unauthorized(MUST_BE_AUTHORIZED));
        }
        self.accounts
            .get_user(session.principal.user_id())
            .await?
            .ok_or_else(|| AppError::unauthorized(MUST_BE_AUTHORIZED))
    }

    /// Another member's profile. Only authenticated callers may look users up.
    pub async fn user_profile(&self, session: &Session, user_id: UserId) -> Result<UserProfile> {
        if session.principal.is_anonymous() {
            return Err(AppError::unauthorized(MUST_BE_AUTHORIZED));
        }
        self.accounts
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))
    }

    #[instrument(skip(self, session), fields(principal = ?session.principal))]
    pub async fn search_users(&self, session: &Session, query: &str) -> Result<UserSearch> {
        if session.principal.is_anonymous() {
            return Err(AppError::unauthorized(MUST_BE_AUTHORIZED));
        }
        let users = self.accounts.search_users(&query.trim().to_lowercase()).await?;
        Ok(UserSearch {
            users: (!users.is_empty()).then_some(users),
        })
    }
}

/// Moderators may still post where others are locked out.
fn moderates(session: &Session, forum_id: ForumId) -> bool {
    session
        .acl
        .has_capability(&session.principal, Capability::Approve, forum_id)
}

fn permissions(session: &Session, forum_id: ForumId) -> ForumPermissions {
    let check = |cap| session.acl.has_capability(&session.principal, cap, forum_id);
    ForumPermissions {
        can_see: check(Capability::List),
        can_read: check(Capability::Read),
        can_post: check(Capability::Post),
        can_reply: check(Capability::Reply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::models::{LastPost, TopicRow, TopicStatus, UserId};
    use crate::traits::{Authorizer, MockAccountRepo, MockForumRepo, MockPostingGateway};

    struct Grants(HashSet<(i64, Capability)>);

    impl Authorizer for Grants {
        fn has_capability(&self, _: &Principal, cap: Capability, forum: ForumId) -> bool {
            self.0.contains(&(forum.0, cap))
        }
    }

    fn session(principal: Principal, grants: &[(i64, Capability)]) -> Session {
        Session {
            principal,
            acl: Arc::new(Grants(grants.iter().copied().collect())),
        }
    }

    fn member(grants: &[(i64, Capability)]) -> Session {
        session(Principal::User(UserId(2)), grants)
    }

    fn topic_row(forum: i64) -> TopicRow {
        TopicRow {
            topic_id: TopicId(9),
            forum_id: ForumId(forum),
            title: "Welcome".into(),
            author: "admin".into(),
            created_at: DateTime::from_timestamp(100, 0).unwrap(),
            last_reply_author: "admin".into(),
            last_reply_id: Some(PostId(12)),
            last_reply_at: DateTime::from_timestamp(200, 0).unwrap(),
            reply_count: 3,
            status: TopicStatus::Normal,
            approved: true,
        }
    }

    fn forum_node(id: i64, forum_type: ForumType) -> ForumNode {
        ForumNode {
            forum_id: ForumId(id),
            parent_id: ForumId::ROOT,
            forum_type,
            left_id: 1,
            right_id: 2,
            name: "News".into(),
            link: String::new(),
            total_topics: 0,
            total_posts: 0,
            last_post: LastPost::default(),
            topics_per_page: None,
            locked: false,
        }
    }

    struct Ports {
        forums: MockForumRepo,
        posting: MockPostingGateway,
        accounts: MockAccountRepo,
    }

    impl Ports {
        fn new() -> Self {
            Self {
                forums: MockForumRepo::new(),
                posting: MockPostingGateway::new(),
                accounts: MockAccountRepo::new(),
            }
        }

        fn service(&self) -> BoardService<'_> {
            BoardService::new(&self.forums, &self.posting, &self.accounts)
        }
    }

    #[tokio::test]
    async fn stats_need_an_id_and_an_existing_forum() {
        let mut ports = Ports::new();
        ports.forums.expect_forum_stats().returning(|_| Ok(None));

        let err = ports.service().forum_stats(None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == EMPTY_FORUM_STATS));
        let err = ports.service().forum_stats(Some(ForumId(5))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == FORUM_NOT_FOUND));
    }

    #[test]
    fn permissions_report_each_capability() {
        let ports = Ports::new();
        let caller = member(&[(4, Capability::List), (4, Capability::Reply)]);

        let perms = ports.service().forum_permissions(&caller, Some(ForumId(4))).unwrap();
        assert_eq!(
            perms,
            ForumPermissions {
                can_see: true,
                can_read: false,
                can_post: false,
                can_reply: true,
            }
        );
        assert!(ports.service().forum_permissions(&caller, None).is_err());
    }

    #[tokio::test]
    async fn anonymous_cannot_start_topics() {
        let mut ports = Ports::new();
        ports.posting.expect_submit_topic().never();
        let guest = session(Principal::Anonymous, &[(4, Capability::Post)]);

        let err = ports
            .service()
            .new_topic(&guest, ForumId(4), "Hi", "there")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == AREA_DENIED));
    }

    #[tokio::test]
    async fn topic_needs_post_capability_and_content() {
        let mut ports = Ports::new();
        ports.posting.expect_submit_topic().never();

        let err = ports
            .service()
            .new_topic(&member(&[]), ForumId(4), "Hi", "there")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == POST_DENIED));

        let err = ports
            .service()
            .new_topic(&member(&[(4, Capability::Post)]), ForumId(4), "  ", "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::BadFormat(msg)
                if msg == "Following errors occured: topic_title is empty,topic_body is empty"
        ));
    }

    #[tokio::test]
    async fn topic_is_submitted_with_the_caller_as_author() {
        let mut ports = Ports::new();
        ports
            .forums
            .expect_get_forum()
            .returning(|id| Ok(Some(forum_node(id.0, ForumType::Post))));
        ports
            .posting
            .expect_submit_topic()
            .withf(|t| t.author == UserId(2) && t.forum_id == ForumId(4) && t.title == "Hi")
            .returning(|_| Ok(TopicId(31)));

        let id = ports
            .service()
            .new_topic(&member(&[(4, Capability::Post)]), ForumId(4), " Hi ", "there")
            .await
            .unwrap();
        assert_eq!(id, TopicId(31));
    }

    #[tokio::test]
    async fn reply_subject_quotes_the_topic_title() {
        let mut ports = Ports::new();
        ports
            .forums
            .expect_get_topic()
            .returning(|_| Ok(Some(topic_row(4))));
        ports
            .forums
            .expect_get_forum()
            .returning(|id| Ok(Some(forum_node(id.0, ForumType::Post))));
        ports
            .posting
            .expect_submit_reply()
            .withf(|r| r.subject == "Re: Welcome" && r.forum_id == ForumId(4))
            .returning(|_| Ok(PostId(77)));

        let id = ports
            .service()
            .reply(&member(&[(4, Capability::Reply)]), TopicId(9), "thanks")
            .await
            .unwrap();
        assert_eq!(id, PostId(77));
    }

    #[tokio::test]
    async fn reply_without_capability_is_rejected() {
        let mut ports = Ports::new();
        ports
            .forums
            .expect_get_topic()
            .returning(|_| Ok(Some(topic_row(4))));
        ports.posting.expect_submit_reply().never();

        let err = ports
            .service()
            .reply(&member(&[(5, Capability::Reply)]), TopicId(9), "thanks")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == REPLY_DENIED));
    }

    #[tokio::test]
    async fn post_listing_requires_read_and_normalizes_filters() {
        let mut ports = Ports::new();
        ports
            .forums
            .expect_get_topic()
            .returning(|_| Ok(Some(topic_row(4))));
        ports
            .forums
            .expect_get_forum()
            .returning(|id| Ok(Some(forum_node(id.0, ForumType::Post))));
        ports
            .forums
            .expect_count_posts()
            .withf(|q| {
                q.limit.is_none() && q.offset == 0 && q.posted_after.is_none() && q.sort == SortOrder::Desc
            })
            .returning(|_| Ok(0));
        ports.forums.expect_list_posts().returning(|_| Ok(vec![]));

        let guest = session(Principal::Anonymous, &[]);
        let err = ports
            .service()
            .topic_posts(&guest, TopicId(9), PostListing::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == READ_DENIED_GUEST));

        let listing = PostListing {
            sort: Some("desc".into()),
            limit: Some(0),
            older_than: Some(-3),
            page: Some(4),
        };
        let posts = ports
            .service()
            .topic_posts(&member(&[(4, Capability::Read)]), TopicId(9), listing)
            .await
            .unwrap();
        assert_eq!(posts.forum_name, "News");
        assert_eq!(posts.posts, None);
        let json = serde_json::to_value(&posts).unwrap();
        assert!(json.get("posts").is_none());
    }

    #[tokio::test]
    async fn post_pages_step_by_the_limit() {
        let mut ports = Ports::new();
        ports
            .forums
            .expect_get_topic()
            .returning(|_| Ok(Some(topic_row(4))));
        ports
            .forums
            .expect_get_forum()
            .returning(|id| Ok(Some(forum_node(id.0, ForumType::Post))));
        ports.forums.expect_count_posts().returning(|_| Ok(7));
        ports
            .forums
            .expect_list_posts()
            .withf(|q| q.limit == Some(3) && q.offset == 6)
            .returning(|_| Ok(vec![]));

        let listing = PostListing {
            limit: Some(3),
            page: Some(3),
            ..PostListing::default()
        };
        let posts = ports
            .service()
            .topic_posts(&member(&[(4, Capability::Read)]), TopicId(9), listing)
            .await
            .unwrap();
        assert_eq!(posts.posts_count, 7);
    }

    #[tokio::test]
    async fn locked_forum_refuses_new_topics_except_from_moderators() {
        let mut ports = Ports::new();
        ports.forums.expect_get_forum().returning(|id| {
            let mut node = forum_node(id.0, ForumType::Post);
            node.locked = true;
            Ok(Some(node))
        });
        ports
            .posting
            .expect_submit_topic()
            .times(1)
            .returning(|_| Ok(TopicId(50)));

        let err = ports
            .service()
            .new_topic(&member(&[(4, Capability::Post)]), ForumId(4), "Hi", "there")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == FORUM_LOCKED));

        let moderator = member(&[(4, Capability::Post), (4, Capability::Approve)]);
        let id = ports
            .service()
            .new_topic(&moderator, ForumId(4), "Hi", "there")
            .await
            .unwrap();
        assert_eq!(id, TopicId(50));
    }

    #[tokio::test]
    async fn locked_topics_and_forums_refuse_replies() {
        let mut ports = Ports::new();
        ports.forums.expect_get_topic().returning(|id| {
            let mut topic = topic_row(4);
            if id == TopicId(10) {
                topic.status = TopicStatus::Locked;
            }
            Ok(Some(topic))
        });
        ports.forums.expect_get_forum().returning(|id| {
            let mut node = forum_node(id.0, ForumType::Post);
            node.locked = true;
            Ok(Some(node))
        });
        ports.posting.expect_submit_reply().never();
        let caller = member(&[(4, Capability::Reply)]);

        let err = ports.service().reply(&caller, TopicId(10), "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == TOPIC_LOCKED));
        let err = ports.service().reply(&caller, TopicId(9), "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == FORUM_LOCKED));
    }

    #[tokio::test]
    async fn forum_admin_requires_board_wide_grants() {
        let mut ports = Ports::new();
        ports.forums.expect_create_forum().never();
        ports.forums.expect_delete_forum().never();

        let local_admin = member(&[(4, Capability::ForumAdd), (4, Capability::ForumDelete)]);
        let new_forum = NewForum {
            parent_id: ForumId::ROOT,
            name: "Off-topic".into(),
            forum_type: ForumType::Post,
            link: String::new(),
            topics_per_page: None,
            locked: false,
        };

        let err = ports
            .service()
            .create_forum(&local_admin, new_forum)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == FORUM_ADD_DENIED));
        let err = ports
            .service()
            .delete_forum(&local_admin, ForumId(4))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == FORUM_DELETE_DENIED));
    }

    #[tokio::test]
    async fn link_forums_need_a_target_and_are_never_locked() {
        let mut ports = Ports::new();
        ports
            .forums
            .expect_create_forum()
            .withf(|f| f.forum_type == ForumType::Link && !f.locked)
            .returning(|f| {
                let mut node = forum_node(12, f.forum_type);
                node.link = f.link;
                Ok(node)
            });
        let admin = member(&[(0, Capability::ForumAdd)]);

        let mut forum = NewForum {
            parent_id: ForumId::ROOT,
            name: "Docs".into(),
            forum_type: ForumType::Link,
            link: String::new(),
            topics_per_page: None,
            locked: true,
        };
        let err = ports.service().create_forum(&admin, forum.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::BadFormat(_)));

        forum.link = "https://example.org/docs".into();
        let created = ports.service().create_forum(&admin, forum).await.unwrap();
        assert_eq!(created.forum_id, ForumId(12));
    }

    #[tokio::test]
    async fn deleting_unknown_forum_is_not_found() {
        let mut ports = Ports::new();
        ports.forums.expect_delete_forum().returning(|_| Ok(false));

        let admin = member(&[(0, Capability::ForumDelete)]);
        let err = ports.service().delete_forum(&admin, ForumId(40)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn user_lookups_need_a_member() {
        let mut ports = Ports::new();
        ports.accounts.expect_search_users().never();
        ports.accounts.expect_get_user().returning(|_| Ok(None));
        let guest = session(Principal::Anonymous, &[]);

        let err = ports.service().search_users(&guest, "al").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == MUST_BE_AUTHORIZED));
        let err = ports.service().user_profile(&guest, UserId(3)).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = ports.service().user_profile(&member(&[]), UserId(3)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == USER_NOT_FOUND));
    }

    #[tokio::test]
    async fn search_lowercases_the_needle_and_omits_empty_results() {
        let mut ports = Ports::new();
        ports
            .accounts
            .expect_search_users()
            .withf(|needle| needle == "ali")
            .returning(|_| Ok(vec![]));

        let found = ports.service().search_users(&member(&[]), " ALI ").await.unwrap();
        assert_eq!(found.users, None);
        assert_eq!(serde_json::to_value(&found).unwrap(), serde_json::json!({}));
    }

    #[tokio::test]
    async fn anonymous_has_no_profile() {
        let mut ports = Ports::new();
        ports.accounts.expect_get_user().never();

        let err = ports
            .service()
            .current_user(&session(Principal::Anonymous, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == MUST_BE_AUTHORIZED));
    }
}
