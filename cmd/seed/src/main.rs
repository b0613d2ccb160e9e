//! Bootstraps an empty board: an administrator holding every capability
//! board-wide, guest read access and a starter category.
//!
//! Usage: `seed <admin-name> <admin-secret>`. The database URL and the secret
//! salt come from the server's layered settings.

use anyhow::{bail, Context};
use nb_auth_simple::hash_secret;
use nb_core::{Capability, ForumId, ForumRepo, ForumType, NewForum, ANONYMOUS_USER_ID};
use nb_db_sqlite::SqliteBoardRepo;
use nestboard::settings::Settings;
use secrecy::ExposeSecret;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let (Some(admin), Some(secret)) = (args.next(), args.next()) else {
        bail!("usage: seed <admin-name> <admin-secret>");
    };
    if secret.trim().is_empty() {
        bail!("the admin secret must not be empty");
    }

    let settings = Settings::load().context("failed to load configuration")?;
    let url = &settings.database.url;
    let salt = settings.auth.secret_salt.expose_secret();

    let repo = SqliteBoardRepo::new(url)
        .await
        .with_context(|| format!("failed to open database {url}"))?;

    let admin_id = repo
        .create_user(&admin, "")
        .await
        .with_context(|| format!("failed to create user {admin}"))?;
    repo.add_secret(admin_id, &hash_secret(salt, &secret)).await?;
    for capability in Capability::ALL {
        repo.grant(admin_id, ForumId::ROOT, capability).await?;
    }
    info!(user_id = admin_id.0, "administrator created");

    for capability in [Capability::List, Capability::Read] {
        repo.grant(ANONYMOUS_USER_ID, ForumId::ROOT, capability).await?;
    }

    let category = repo
        .create_forum(NewForum {
            parent_id: ForumId::ROOT,
            name: "General".into(),
            forum_type: ForumType::Category,
            link: String::new(),
            topics_per_page: None,
            locked: false,
        })
        .await?;
    let forum = repo
        .create_forum(NewForum {
            parent_id: category.forum_id,
            name: "Announcements".into(),
            forum_type: ForumType::Post,
            link: String::new(),
            topics_per_page: None,
            locked: false,
        })
        .await?;
    info!(category = category.forum_id.0, forum = forum.forum_id.0, "starter forums created");

    Ok(())
}
