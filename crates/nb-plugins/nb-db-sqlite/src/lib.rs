//! # nb-db-sqlite
//!
//! SQLite implementation of the nestboard store ports: the nested-set forum
//! table, topics and posts (`ForumRepo`), the posting subsystem
//! (`PostingGateway`), read tracking (`TrackingRepo`) and credentials
//! (`AccountRepo`).
//!
//! Timestamps are stored as unix seconds.

mod accounts;
mod forums;
mod posting;
mod tracking;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

pub struct SqliteBoardRepo {
    pool: SqlitePool,
}

impl SqliteBoardRepo {
    /// Opens (creating if needed) the database at `url` and applies migrations.
    ///
    /// In-memory databases are per connection, so they get a single-connection pool.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 8 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(url, "sqlite board store ready");

        Ok(Self { pool })
    }
}

fn to_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nb_core::{
        AccountRepo, Capability, ForumId, ForumRepo, ForumScope, ForumType, NewForum, NewReply,
        NewTopic, PostQuery, PostingGateway, SortOrder, TopicQuery, TrackingRepo, UserId,
    };

    pub(crate) async fn repo() -> SqliteBoardRepo {
        SqliteBoardRepo::new("sqlite::memory:").await.unwrap()
    }

    fn new_forum(parent: i64, name: &str, forum_type: ForumType) -> NewForum {
        NewForum {
            parent_id: ForumId(parent),
            name: name.into(),
            forum_type,
            link: String::new(),
            topics_per_page: None,
            locked: false,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn nested_set_stays_consistent_across_inserts_and_deletes() {
        let repo = repo().await;
        let cat = repo.create_forum(new_forum(0, "General", ForumType::Category)).await.unwrap();
        let news = repo.create_forum(new_forum(cat.forum_id.0, "News", ForumType::Post)).await.unwrap();
        let chat = repo.create_forum(new_forum(cat.forum_id.0, "Chat", ForumType::Post)).await.unwrap();
        let deep = repo.create_forum(new_forum(news.forum_id.0, "Archive", ForumType::Post)).await.unwrap();
        let other = repo.create_forum(new_forum(0, "Other", ForumType::Post)).await.unwrap();

        let tree = repo.list_forums(ForumScope::WholeTree).await.unwrap();
        let bounds: Vec<_> = tree.iter().map(|f| (f.forum_id, f.left_id, f.right_id)).collect();
        assert_eq!(
            bounds,
            vec![
                (cat.forum_id, 1, 8),
                (news.forum_id, 2, 5),
                (deep.forum_id, 3, 4),
                (chat.forum_id, 6, 7),
                (other.forum_id, 9, 10),
            ]
        );

        assert!(repo.delete_forum(news.forum_id).await.unwrap());
        let tree = repo.list_forums(ForumScope::WholeTree).await.unwrap();
        let bounds: Vec<_> = tree.iter().map(|f| (f.forum_id, f.left_id, f.right_id)).collect();
        assert_eq!(
            bounds,
            vec![(cat.forum_id, 1, 4), (chat.forum_id, 2, 3), (other.forum_id, 5, 6)]
        );
        assert!(!repo.delete_forum(news.forum_id).await.unwrap());
    }

    #[tokio::test]
    async fn children_scope_returns_direct_children_in_order() {
        let repo = repo().await;
        let cat = repo.create_forum(new_forum(0, "General", ForumType::Category)).await.unwrap();
        let a = repo.create_forum(new_forum(cat.forum_id.0, "A", ForumType::Post)).await.unwrap();
        repo.create_forum(new_forum(a.forum_id.0, "A.1", ForumType::Post)).await.unwrap();
        let b = repo.create_forum(new_forum(cat.forum_id.0, "B", ForumType::Post)).await.unwrap();

        let children = repo.list_forums(ForumScope::ChildrenOf(cat.forum_id)).await.unwrap();
        let ids: Vec<_> = children.iter().map(|f| f.forum_id).collect();
        assert_eq!(ids, vec![a.forum_id, b.forum_id]);
    }

    #[tokio::test]
    async fn posting_updates_counters_and_listing_order() {
        let repo = repo().await;
        let user = repo.create_user("alice", "alice@example.org").await.unwrap();
        let forum = repo.create_forum(new_forum(0, "News", ForumType::Post)).await.unwrap();

        let first = repo
            .submit_topic(NewTopic {
                forum_id: forum.forum_id,
                author: user,
                title: "First".into(),
                body: "hello".into(),
                posted_at: at(100),
            })
            .await
            .unwrap();
        let second = repo
            .submit_topic(NewTopic {
                forum_id: forum.forum_id,
                author: user,
                title: "Second".into(),
                body: "hello again".into(),
                posted_at: at(200),
            })
            .await
            .unwrap();
        let reply = repo
            .submit_reply(NewReply {
                topic_id: first,
                forum_id: forum.forum_id,
                author: user,
                subject: "Re: First".into(),
                body: "bump".into(),
                posted_at: at(300),
            })
            .await
            .unwrap();

        let stored = repo.get_forum(forum.forum_id).await.unwrap().unwrap();
        assert_eq!(stored.total_topics, 2);
        assert_eq!(stored.total_posts, 3);
        assert_eq!(stored.last_post.post_id, Some(reply));
        assert_eq!(stored.last_post.subject, "Re: First");

        let stats = repo.forum_stats(forum.forum_id).await.unwrap().unwrap();
        assert_eq!(stats.total_replies, 1);

        let page = repo
            .list_topics(&TopicQuery {
                forum_id: forum.forum_id,
                include_unapproved: false,
                offset: 0,
                limit: 10,
            })
            .await
            .unwrap();
        let order: Vec<_> = page.iter().map(|t| t.topic_id).collect();
        assert_eq!(order, vec![first, second]);
        assert_eq!(page[0].reply_count, 1);
        assert_eq!(page[0].last_reply_author, "alice");

        let posted = repo.topics_posted(user, &[first, second]).await.unwrap();
        assert_eq!(posted.len(), 2);
    }

    #[tokio::test]
    async fn unapproved_topics_need_the_override() {
        let repo = repo().await;
        let user = repo.create_user("bob", "").await.unwrap();
        let forum = repo.create_forum(new_forum(0, "Queue", ForumType::Post)).await.unwrap();
        let topic = repo
            .submit_topic(NewTopic {
                forum_id: forum.forum_id,
                author: user,
                title: "Pending".into(),
                body: "please approve".into(),
                posted_at: at(10),
            })
            .await
            .unwrap();
        repo.set_topic_approved(topic, false).await.unwrap();

        let mut query = TopicQuery {
            forum_id: forum.forum_id,
            include_unapproved: false,
            offset: 0,
            limit: 10,
        };
        assert!(repo.list_topics(&query).await.unwrap().is_empty());
        query.include_unapproved = true;
        assert_eq!(repo.list_topics(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn oversized_bounds_saturate_instead_of_failing() {
        let repo = repo().await;
        let user = repo.create_user("frank", "").await.unwrap();
        let forum = repo.create_forum(new_forum(0, "Big", ForumType::Post)).await.unwrap();
        repo.submit_topic(NewTopic {
            forum_id: forum.forum_id,
            author: user,
            title: "Only".into(),
            body: "one".into(),
            posted_at: at(10),
        })
        .await
        .unwrap();

        let far = TopicQuery {
            forum_id: forum.forum_id,
            include_unapproved: false,
            offset: u64::MAX,
            limit: u64::MAX,
        };
        assert!(repo.list_topics(&far).await.unwrap().is_empty());
        let all = TopicQuery { offset: 0, ..far };
        assert_eq!(repo.list_topics(&all).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn post_listing_filters_and_sorts() {
        let repo = repo().await;
        let user = repo.create_user("carol", "").await.unwrap();
        let forum = repo.create_forum(new_forum(0, "Talk", ForumType::Post)).await.unwrap();
        let topic = repo
            .submit_topic(NewTopic {
                forum_id: forum.forum_id,
                author: user,
                title: "Thread".into(),
                body: "op".into(),
                posted_at: at(100),
            })
            .await
            .unwrap();
        for t in [200, 300] {
            repo.submit_reply(NewReply {
                topic_id: topic,
                forum_id: forum.forum_id,
                author: user,
                subject: "Re: Thread".into(),
                body: format!("reply at {t}"),
                posted_at: at(t),
            })
            .await
            .unwrap();
        }

        let query = PostQuery {
            topic_id: topic,
            sort: SortOrder::Desc,
            limit: Some(2),
            offset: 0,
            posted_after: Some(at(100)),
        };
        assert_eq!(repo.count_posts(&query).await.unwrap(), 2);
        let posts = repo.list_posts(&query).await.unwrap();
        let bodies: Vec<_> = posts.iter().map(|p| p.post_text.as_str()).collect();
        assert_eq!(bodies, vec!["reply at 300", "reply at 200"]);
        assert_eq!(posts[0].author_username, "carol");

        let second_page = PostQuery {
            limit: Some(1),
            offset: 1,
            posted_after: None,
            ..query
        };
        let posts = repo.list_posts(&second_page).await.unwrap();
        let bodies: Vec<_> = posts.iter().map(|p| p.post_text.as_str()).collect();
        assert_eq!(bodies, vec!["reply at 200"]);
    }

    #[tokio::test]
    async fn tracking_marks_round_trip() {
        let repo = repo().await;
        let user = repo.create_user("dave", "").await.unwrap();
        let forum = repo.create_forum(new_forum(0, "Track", ForumType::Post)).await.unwrap();

        repo.mark_forum_read(user, forum.forum_id, at(500)).await.unwrap();
        repo.watch_forum(user, forum.forum_id).await.unwrap();

        let marks = repo.forum_marks(user, &[forum.forum_id, ForumId(77)]).await.unwrap();
        assert_eq!(marks.get(&forum.forum_id), Some(&at(500)));
        assert_eq!(marks.len(), 1);
        let watches = repo.forum_watches(user, &[forum.forum_id]).await.unwrap();
        assert!(watches.contains(&forum.forum_id));
        assert!(repo.forum_marks(UserId(999), &[forum.forum_id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_search_matches_substrings_literally() {
        let repo = repo().await;
        let alice = repo.create_user("Alice", "alice@example.org").await.unwrap();
        repo.create_user("malice_bot", "").await.unwrap();
        repo.create_user("bob", "").await.unwrap();

        let names = |found: Vec<nb_core::UserMatch>| -> Vec<String> {
            found.into_iter().map(|u| u.username).collect()
        };
        assert_eq!(names(repo.search_users("lice").await.unwrap()), vec!["Alice", "malice_bot"]);
        assert_eq!(names(repo.search_users("e_b").await.unwrap()), vec!["malice_bot"]);
        assert!(repo.search_users("%").await.unwrap().is_empty());

        let hit = &repo.search_users("alice").await.unwrap()[0];
        assert_eq!(hit.user_id, alice);
        assert_eq!(hit.user_email, "alice@example.org");
    }

    #[tokio::test]
    async fn secrets_and_grants_resolve() {
        let repo = repo().await;
        let user = repo.create_user("erin", "erin@example.org").await.unwrap();
        repo.add_secret(user, "abc123").await.unwrap();
        repo.grant(user, ForumId(4), Capability::Read).await.unwrap();
        repo.grant(user, ForumId::ROOT, Capability::ForumAdd).await.unwrap();

        assert_eq!(repo.user_for_secret("abc123").await.unwrap(), Some(user));
        assert_eq!(repo.user_for_secret("nope").await.unwrap(), None);

        let grants = repo.grants_for(user).await.unwrap();
        assert_eq!(grants.len(), 2);
        let profile = repo.get_user(user).await.unwrap().unwrap();
        assert_eq!(profile.username, "erin");
    }
}
