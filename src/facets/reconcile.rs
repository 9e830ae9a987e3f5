//! Reconciliation of a draft selection into a consistent one.
//!
//! The passes run in a fixed order, and the order decides the fixed point:
//!
//! 1. Prune: drop unknown ids, closed projects, projects outside the selected
//!    groups, and projects no selected user is a member of.
//! 2. Close upward: selected groups become the explicit groups plus every
//!    group owning a selected project.
//! 3. Backfill from users: when users are the only facet left, select every
//!    open project they belong to, then close upward again.
//! 4. Prune users: keep only members of a project in scope.
//!
//! Reordering these passes yields different (still consistent) selections.

use std::collections::{BTreeSet, HashSet};

use super::is_selectable;
use crate::models::graph::MembershipGraph;
use crate::models::{Entities, Selection};

/// Repair `draft` so every cross-facet membership invariant holds.
///
/// This is a total function: any draft over any entity state (including
/// empty collections) yields a valid, possibly empty, selection. It is also a
/// closure operator, so reconciling its own output returns the same value.
pub fn reconcile(draft: &Selection, graph: &MembershipGraph, entities: &Entities) -> Selection {
    let mut selection = prune(draft, graph, entities);
    close_upward(&mut selection, entities);

    if !selection.user_ids.is_empty()
        && selection.group_ids.is_empty()
        && selection.project_ids.is_empty()
    {
        backfill_from_users(&mut selection, graph, entities);
        close_upward(&mut selection, entities);
    }

    prune_users(&mut selection, graph, entities);

    if &selection != draft {
        tracing::debug!(
            groups = selection.group_ids.len(),
            projects = selection.project_ids.len(),
            users = selection.user_ids.len(),
            "selection reconciled"
        );
    }
    selection
}

fn prune(draft: &Selection, graph: &MembershipGraph, entities: &Entities) -> Selection {
    let known_groups: HashSet<&str> = entities.groups.iter().map(|g| g.id.as_str()).collect();
    let known_users: HashSet<&str> = entities.users.iter().map(|u| u.id.as_str()).collect();

    let group_ids: BTreeSet<String> = draft
        .group_ids
        .iter()
        .filter(|id| known_groups.contains(id.as_str()))
        .cloned()
        .collect();
    let user_ids: BTreeSet<String> = draft
        .user_ids
        .iter()
        .filter(|id| known_users.contains(id.as_str()))
        .cloned()
        .collect();

    let project_ids = draft
        .project_ids
        .iter()
        .filter(|pid| {
            let Some(project) = entities.project(pid) else {
                return false;
            };
            if !is_selectable(project, entities) {
                return false;
            }
            if !group_ids.is_empty()
                && !project
                    .group_id
                    .as_ref()
                    .is_some_and(|gid| group_ids.contains(gid))
            {
                return false;
            }
            user_ids.is_empty() || graph.has_any_member(pid, &user_ids)
        })
        .cloned()
        .collect();

    Selection {
        group_ids,
        project_ids,
        user_ids,
    }
}

/// Explicit groups are kept; groups owning selected projects are added.
fn close_upward(selection: &mut Selection, entities: &Entities) {
    for pid in &selection.project_ids {
        if let Some(gid) = entities
            .project(pid)
            .and_then(|p| p.group_id.as_ref())
            .filter(|gid| entities.group(gid).is_some())
        {
            selection.group_ids.insert(gid.clone());
        }
    }
}

fn backfill_from_users(selection: &mut Selection, graph: &MembershipGraph, entities: &Entities) {
    for uid in &selection.user_ids {
        for pid in graph.projects_of(uid) {
            if entities.project(pid).is_some_and(|p| is_selectable(p, entities)) {
                selection.project_ids.insert(pid.clone());
            }
        }
    }
}

/// Projects whose members decide which users survive.
///
/// The selected projects if any; otherwise every open project under the
/// selected groups; otherwise every selectable project.
pub(crate) fn projects_in_scope<'a>(selection: &'a Selection, entities: &'a Entities) -> Vec<&'a str> {
    if !selection.project_ids.is_empty() {
        return selection.project_ids.iter().map(String::as_str).collect();
    }
    entities
        .projects
        .iter()
        .filter(|p| is_selectable(p, entities))
        .filter(|p| {
            selection.group_ids.is_empty()
                || p.group_id
                    .as_ref()
                    .is_some_and(|gid| selection.group_ids.contains(gid))
        })
        .map(|p| p.id.as_str())
        .collect()
}

fn prune_users(selection: &mut Selection, graph: &MembershipGraph, entities: &Entities) {
    if selection.user_ids.is_empty() {
        return;
    }
    let scope = projects_in_scope(selection, entities);
    let kept: BTreeSet<String> = selection
        .user_ids
        .iter()
        .filter(|uid| scope.iter().any(|pid| graph.is_member(uid, pid)))
        .cloned()
        .collect();
    selection.user_ids = kept;
}
