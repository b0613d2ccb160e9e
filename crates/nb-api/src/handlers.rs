//! # nb-api Handlers
//!
//! Each handler resolves the caller, coerces path and query input leniently
//! and delegates to the core. Malformed ids never fail extraction; they turn
//! into the same `NotFound` a missing row would.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use nb_core::{
    AccountRepo, AppError, AuthProvider, BoardService, BoardSettings, ForumEntry, ForumId,
    ForumNode, ForumPage, ForumPermissions, ForumRepo, ForumStats, ForumType, ListingParams,
    NewForum, PostId, PostListing, PostingGateway, TopicId, TopicInfo, TopicPageAssembler,
    TopicPosts, TrackingRepo, UserId, UserProfile, UserSearch, FORUM_NOT_FOUND, TOPIC_NOT_FOUND,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extract::{lenient_int, positive_id, Caller};

/// State shared across all request handlers.
pub struct AppState {
    pub forums: Arc<dyn ForumRepo>,
    pub tracking: Arc<dyn TrackingRepo>,
    pub posting: Arc<dyn PostingGateway>,
    pub accounts: Arc<dyn AccountRepo>,
    pub auth: Arc<dyn AuthProvider>,
    pub settings: BoardSettings,
}

impl AppState {
    fn assembler(&self) -> TopicPageAssembler<'_> {
        TopicPageAssembler::new(self.forums.as_ref(), self.tracking.as_ref(), self.settings)
    }

    fn service(&self) -> BoardService<'_> {
        BoardService::new(
            self.forums.as_ref(),
            self.posting.as_ref(),
            self.accounts.as_ref(),
        )
    }
}

type AppData = State<Arc<AppState>>;

fn forum_id(raw: &str) -> Result<ForumId, ApiError> {
    positive_id(Some(raw))
        .map(ForumId)
        .ok_or_else(|| AppError::not_found(FORUM_NOT_FOUND).into())
}

fn topic_id(raw: &str) -> Result<TopicId, ApiError> {
    positive_id(Some(raw))
        .map(TopicId)
        .ok_or_else(|| AppError::not_found(TOPIC_NOT_FOUND).into())
}

// ── Board ───────────────────────────────────────────────────────────────────

pub async fn board_forums(State(state): AppData, Caller(session): Caller) -> ApiResult<Vec<ForumEntry>> {
    let forums = state.assembler().board_forums(&session, ForumId::ROOT).await?;
    Ok(Json(forums))
}

/// Non-numeric or non-positive parents list the whole board.
pub async fn board_forums_under(
    State(state): AppData,
    Caller(session): Caller,
    Path(parent): Path<String>,
) -> ApiResult<Vec<ForumEntry>> {
    let parent = positive_id(Some(&parent)).map_or(ForumId::ROOT, ForumId);
    let forums = state.assembler().board_forums(&session, parent).await?;
    Ok(Json(forums))
}

// ── Forums ──────────────────────────────────────────────────────────────────

pub async fn forum_stats(
    State(state): AppData,
    _caller: Caller,
    Path(raw): Path<String>,
) -> ApiResult<ForumStats> {
    let id = positive_id(Some(&raw)).map(ForumId);
    Ok(Json(state.service().forum_stats(id).await?))
}

pub async fn forum_permissions(
    State(state): AppData,
    Caller(session): Caller,
    Path(raw): Path<String>,
) -> ApiResult<ForumPermissions> {
    let id = positive_id(Some(&raw)).map(ForumId);
    Ok(Json(state.service().forum_permissions(&session, id)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
    per_page: Option<String>,
}

pub async fn forum_topics(
    State(state): AppData,
    Caller(session): Caller,
    Path(raw): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<ForumPage> {
    let params = ListingParams {
        page: lenient_int(query.page.as_deref()),
        per_page: lenient_int(query.per_page.as_deref()),
    };
    let page = state
        .assembler()
        .assemble_page(&session, forum_id(&raw)?, params)
        .await?;
    Ok(Json(page))
}

/// A page number in the path wins over the `page` query parameter.
pub async fn forum_topics_page(
    State(state): AppData,
    Caller(session): Caller,
    Path((raw, page)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> ApiResult<ForumPage> {
    let params = ListingParams {
        page: lenient_int(Some(&page)).or_else(|| lenient_int(query.page.as_deref())),
        per_page: lenient_int(query.per_page.as_deref()),
    };
    let page = state
        .assembler()
        .assemble_page(&session, forum_id(&raw)?, params)
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TopicBody {
    topic_title: String,
    topic_body: String,
}

#[derive(Debug, Serialize)]
pub struct TopicCreated {
    topic_id: TopicId,
}

pub async fn new_topic(
    State(state): AppData,
    Caller(session): Caller,
    Path(raw): Path<String>,
    Json(body): Json<TopicBody>,
) -> ApiResult<TopicCreated> {
    let topic_id = state
        .service()
        .new_topic(&session, forum_id(&raw)?, &body.topic_title, &body.topic_body)
        .await?;
    Ok(Json(TopicCreated { topic_id }))
}

/// The stored forum as returned to the creator.
#[derive(Debug, Serialize)]
pub struct ForumCreated {
    forum_id: ForumId,
    parent_id: ForumId,
    forum_name: String,
    forum_type: ForumType,
    forum_link: String,
    left_id: i64,
    right_id: i64,
    topics_per_page: Option<u32>,
    forum_locked: bool,
}

impl From<ForumNode> for ForumCreated {
    fn from(node: ForumNode) -> Self {
        Self {
            forum_id: node.forum_id,
            parent_id: node.parent_id,
            forum_name: node.name,
            forum_type: node.forum_type,
            forum_link: node.link,
            left_id: node.left_id,
            right_id: node.right_id,
            topics_per_page: node.topics_per_page,
            forum_locked: node.locked,
        }
    }
}

pub async fn create_root_forum(
    State(state): AppData,
    Caller(session): Caller,
    Json(forum): Json<NewForum>,
) -> ApiResult<ForumCreated> {
    let created = state.service().create_forum(&session, forum).await?;
    Ok(Json(created.into()))
}

/// A parent in the path overrides any `parent_id` in the body.
pub async fn create_child_forum(
    State(state): AppData,
    Caller(session): Caller,
    Path(raw): Path<String>,
    Json(mut forum): Json<NewForum>,
) -> ApiResult<ForumCreated> {
    if let Some(parent) = positive_id(Some(&raw)) {
        forum.parent_id = ForumId(parent);
    }
    let created = state.service().create_forum(&session, forum).await?;
    Ok(Json(created.into()))
}

#[derive(Debug, Serialize)]
pub struct ForumRemoved {
    removed_forum_id: ForumId,
}

pub async fn delete_forum(
    State(state): AppData,
    Caller(session): Caller,
    Path(raw): Path<String>,
) -> ApiResult<ForumRemoved> {
    let removed_forum_id = state
        .service()
        .delete_forum(&session, forum_id(&raw)?)
        .await?;
    Ok(Json(ForumRemoved { removed_forum_id }))
}

// ── Topics ──────────────────────────────────────────────────────────────────

pub async fn topic_info(
    State(state): AppData,
    _caller: Caller,
    Path(raw): Path<String>,
) -> ApiResult<TopicInfo> {
    Ok(Json(state.service().topic_info(topic_id(&raw)?).await?))
}

pub async fn topic_permissions(
    State(state): AppData,
    Caller(session): Caller,
    Path(raw): Path<String>,
) -> ApiResult<ForumPermissions> {
    let perms = state
        .service()
        .topic_permissions(&session, topic_id(&raw)?)
        .await?;
    Ok(Json(perms))
}

#[derive(Debug, Default, Deserialize)]
pub struct PostsQuery {
    sort: Option<String>,
    limit: Option<String>,
    #[serde(rename = "olderThan")]
    older_than: Option<String>,
}

impl PostsQuery {
    fn into_listing(self, page: Option<i64>) -> PostListing {
        PostListing {
            sort: self.sort,
            limit: lenient_int(self.limit.as_deref()),
            older_than: lenient_int(self.older_than.as_deref()),
            page,
        }
    }
}

pub async fn topic_posts(
    State(state): AppData,
    Caller(session): Caller,
    Path(raw): Path<String>,
    Query(query): Query<PostsQuery>,
) -> ApiResult<TopicPosts> {
    let posts = state
        .service()
        .topic_posts(&session, topic_id(&raw)?, query.into_listing(None))
        .await?;
    Ok(Json(posts))
}

/// Pages step by `limit`; without one the page is ignored.
pub async fn topic_posts_page(
    State(state): AppData,
    Caller(session): Caller,
    Path((raw, page)): Path<(String, String)>,
    Query(query): Query<PostsQuery>,
) -> ApiResult<TopicPosts> {
    let listing = query.into_listing(lenient_int(Some(&page)));
    let posts = state
        .service()
        .topic_posts(&session, topic_id(&raw)?, listing)
        .await?;
    Ok(Json(posts))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReplyBody {
    topic_body: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyCreated {
    post_id: PostId,
}

pub async fn reply(
    State(state): AppData,
    Caller(session): Caller,
    Path(raw): Path<String>,
    Json(body): Json<ReplyBody>,
) -> ApiResult<ReplyCreated> {
    let post_id = state
        .service()
        .reply(&session, topic_id(&raw)?, &body.topic_body)
        .await?;
    Ok(Json(ReplyCreated { post_id }))
}

// ── Account ─────────────────────────────────────────────────────────────────

pub async fn current_user(State(state): AppData, Caller(session): Caller) -> ApiResult<UserProfile> {
    Ok(Json(state.service().current_user(&session).await?))
}

/// Unknown or malformed ids read as a missing user.
pub async fn user_profile(
    State(state): AppData,
    Caller(session): Caller,
    Path(raw): Path<String>,
) -> ApiResult<UserProfile> {
    let user_id = UserId(positive_id(Some(&raw)).unwrap_or(0));
    Ok(Json(state.service().user_profile(&session, user_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub async fn search_users(
    State(state): AppData,
    Caller(session): Caller,
    Query(query): Query<SearchQuery>,
) -> ApiResult<UserSearch> {
    Ok(Json(state.service().search_users(&session, &query.q).await?))
}
