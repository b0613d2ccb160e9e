//! # Visibility Filter
//!
//! Prunes a nested-set forum listing down to what a principal may see.
//!
//! Rows arrive ordered by `left_id`, so every descendant of a node directly
//! follows it and ends before the node's `right_id`. A single failed `list`
//! check therefore hides the whole branch: the filter remembers the branch's
//! `right_id` and skips rows until it leaves the branch, never consulting the
//! oracle for them.

use tracing::debug;

use crate::models::{Capability, ForumId, ForumNode, Principal};
use crate::traits::Authorizer;

/// Immutable, per-request inputs of a visibility decision.
#[derive(Clone, Copy)]
pub struct VisibilityContext<'a> {
    pub principal: &'a Principal,
    pub acl: &'a dyn Authorizer,
    /// Capability gating whether a forum appears in listings.
    pub list_capability: Capability,
}

impl<'a> VisibilityContext<'a> {
    pub fn new(principal: &'a Principal, acl: &'a dyn Authorizer) -> Self {
        Self {
            principal,
            acl,
            list_capability: Capability::List,
        }
    }

    fn can_list(&self, forum: ForumId) -> bool {
        self.acl
            .has_capability(self.principal, self.list_capability, forum)
    }
}

/// Single-pass, O(n) subtree pruning over nested-set rows.
pub struct VisibilityFilter<'a> {
    ctx: VisibilityContext<'a>,
}

impl<'a> VisibilityFilter<'a> {
    pub fn new(ctx: VisibilityContext<'a>) -> Self {
        Self { ctx }
    }

    /// Returns the visible rows in their original order.
    ///
    /// `rows` must already be restricted to the subtree of `scope` (the whole
    /// board for `ForumId::ROOT`) and sorted by `left_id` ascending.
    pub fn filter<I>(&self, rows: I, scope: ForumId) -> Vec<ForumNode>
    where
        I: IntoIterator<Item = ForumNode>,
    {
        let mut skip_until: Option<i64> = None;
        let mut visible = Vec::new();

        for row in rows {
            if let Some(right_id) = skip_until {
                if row.left_id < right_id {
                    continue;
                }
                skip_until = None;
            }

            if row.is_empty_category() {
                continue;
            }

            if !self.ctx.can_list(row.forum_id) {
                debug!(
                    forum_id = %row.forum_id,
                    scope = %scope,
                    "pruning forum branch without list permission"
                );
                skip_until = Some(row.right_id);
                continue;
            }

            visible.push(row);
        }

        visible
    }
}
