//! # Topic Page Assembler
//!
//! Builds the two listing responses of the board: the forum index and a
//! single forum's page (its visible subforums plus one page of topics).

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{AppError, Result};
use crate::models::{BoardSettings, Capability, ForumEntry, ForumId, TopicSummary};
use crate::pagination::{self, PageWindow};
use crate::tracking::{self, ForumTracking, TopicTracking};
use crate::traits::{ForumRepo, ForumScope, Session, TopicQuery, TrackingRepo};
use crate::visibility::{VisibilityContext, VisibilityFilter};

pub const FORUM_NOT_FOUND: &str = "The forum you selected does not exist.";
pub(crate) const READ_DENIED_USER: &str = "You are not authorised to read this forum.";
pub(crate) const READ_DENIED_GUEST: &str =
    "The board requires you to be registered and logged in to view this forum.";

/// Caller-supplied paging, already coerced at the boundary.
/// Non-numeric input arrives here as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// One forum's listing page. Empty sections are left out of the JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForumPage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subforums: Option<Vec<ForumEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<TopicSummary>>,
    #[serde(skip)]
    pub pagination: PageWindow,
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Orchestrates visibility, tracking and pagination over the store ports.
pub struct TopicPageAssembler<'a> {
    forums: &'a dyn ForumRepo,
    tracking: &'a dyn TrackingRepo,
    settings: BoardSettings,
}

impl<'a> TopicPageAssembler<'a> {
    pub fn new(
        forums: &'a dyn ForumRepo,
        tracking: &'a dyn TrackingRepo,
        settings: BoardSettings,
    ) -> Self {
        Self {
            forums,
            tracking,
            settings,
        }
    }

    /// Visible forums under `parent` (the whole board for `ForumId::ROOT`).
    #[instrument(skip(self, session), fields(principal = ?session.principal))]
    pub async fn board_forums(&self, session: &Session, parent: ForumId) -> Result<Vec<ForumEntry>> {
        let scope = ForumScope::for_parent(parent);
        self.visible_forums(session, scope).await
    }

    /// Assembles the listing page of `forum_id`.
    #[instrument(skip(self, session), fields(principal = ?session.principal))]
    pub async fn assemble_page(
        &self,
        session: &Session,
        forum_id: ForumId,
        params: ListingParams,
    ) -> Result<ForumPage> {
        let forum = self
            .forums
            .get_forum(forum_id)
            .await?
            .ok_or_else(|| AppError::not_found(FORUM_NOT_FOUND))?;

        let principal = &session.principal;
        let acl = session.acl.as_ref();
        let may_enter = acl.has_any_capability(principal, &[Capability::List, Capability::Read], forum_id);
        let link_blocked =
            forum.is_navigable_link() && !acl.has_capability(principal, Capability::Read, forum_id);
        if !may_enter || link_blocked {
            let msg = if principal.is_anonymous() {
                READ_DENIED_GUEST
            } else {
                READ_DENIED_USER
            };
            return Err(AppError::unauthorized(msg));
        }

        let subforums = self
            .visible_forums(session, ForumScope::ChildrenOf(forum_id))
            .await?;

        let plan = pagination::plan(
            self.settings.topics_per_page,
            forum.topics_per_page,
            params.per_page,
            u64::try_from(forum.total_topics).unwrap_or(0),
            params.page,
        );
        debug!(page = plan.page, page_size = plan.page_size, offset = plan.offset, "topic page planned");

        let rows = if plan.is_past_end() {
            Vec::new()
        } else {
            let query = TopicQuery {
                forum_id,
                include_unapproved: acl.has_capability(principal, Capability::Approve, forum_id),
                offset: plan.offset,
                limit: plan.limit(),
            };
            self.forums.list_topics(&query).await?
        };
        let ids: Vec<_> = rows.iter().map(|row| row.topic_id).collect();
        let marks = TopicTracking::load(self.tracking, principal, &self.settings, &ids).await?;
        let topics = tracking::annotate_topics(rows, &marks);

        Ok(ForumPage {
            subforums: non_empty(subforums),
            topics: non_empty(topics),
            pagination: plan,
        })
    }

    async fn visible_forums(&self, session: &Session, scope: ForumScope) -> Result<Vec<ForumEntry>> {
        let rows = self.forums.list_forums(scope).await?;
        let ctx = VisibilityContext::new(&session.principal, session.acl.as_ref());
        let visible = VisibilityFilter::new(ctx).filter(rows, scope.parent());

        let ids: Vec<_> = visible.iter().map(|node| node.forum_id).collect();
        let marks = ForumTracking::load(self.tracking, &session.principal, &self.settings, &ids).await?;
        Ok(tracking::annotate_forums(visible, &marks))
    }
}
