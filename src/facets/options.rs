//! Option lists offered to the presentation layer for each facet.
//!
//! Each facet's candidates are filtered by the *other* facets' selection.
//! Options are computed, never stored in the selection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::is_selectable;
use crate::models::graph::MembershipGraph;
use crate::models::{Entities, Selection};

/// One selectable (or shown-but-disabled) value of a facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetOption {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Options for all three facets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetOptions {
    pub groups: Vec<FacetOption>,
    pub projects: Vec<FacetOption>,
    pub users: Vec<FacetOption>,
}

/// Compute the option lists for `selection`.
///
/// - Groups are narrowed by selected users (groups reached through their open projects).
/// - Projects are narrowed by selected groups and by selected users' membership;
///   closed projects stay visible but `disabled`.
/// - Users are narrowed to members of the selected projects, or failing that, of
///   the open projects under the selected groups.
pub fn facet_options(selection: &Selection, graph: &MembershipGraph, entities: &Entities) -> FacetOptions {
    let mut options = FacetOptions {
        groups: group_options(selection, graph, entities),
        projects: project_options(selection, graph, entities),
        users: user_options(selection, graph, entities),
    };
    for list in [&mut options.groups, &mut options.projects, &mut options.users] {
        list.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
    }
    options
}

fn group_options(selection: &Selection, graph: &MembershipGraph, entities: &Entities) -> Vec<FacetOption> {
    let reachable: Option<BTreeSet<&String>> = (!selection.user_ids.is_empty()).then(|| {
        selection
            .user_ids
            .iter()
            .flat_map(|uid| graph.groups_of(uid))
            .collect()
    });

    entities
        .groups
        .iter()
        .filter(|g| reachable.as_ref().is_none_or(|set| set.contains(&g.id)))
        .map(|group| {
            let open = entities
                .projects
                .iter()
                .filter(|p| p.group_id.as_deref() == Some(group.id.as_str()) && is_selectable(p, entities))
                .count();
            FacetOption {
                id: group.id.clone(),
                label: display_name(&group.name, &group.id),
                meta: Some(plural(open, "open project")),
                badge: None,
                disabled: false,
            }
        })
        .collect()
}

fn project_options(selection: &Selection, graph: &MembershipGraph, entities: &Entities) -> Vec<FacetOption> {
    entities
        .projects
        .iter()
        .filter(|p| {
            selection.group_ids.is_empty()
                || p.group_id
                    .as_ref()
                    .is_some_and(|gid| selection.group_ids.contains(gid))
        })
        .filter(|p| selection.user_ids.is_empty() || graph.has_any_member(&p.id, &selection.user_ids))
        .map(|project| {
            let group_name = project
                .group_id
                .as_deref()
                .and_then(|gid| entities.group(gid))
                .map(|g| display_name(&g.name, &g.id));
            FacetOption {
                id: project.id.clone(),
                label: display_name(&project.name, &project.id),
                meta: Some(group_name.unwrap_or_else(|| "No group".to_string())),
                badge: Some(project.status.label().to_string()),
                disabled: !is_selectable(project, entities),
            }
        })
        .collect()
}

fn user_options(selection: &Selection, graph: &MembershipGraph, entities: &Entities) -> Vec<FacetOption> {
    let allowed: Option<BTreeSet<&String>> = if !selection.project_ids.is_empty() {
        Some(
            selection
                .project_ids
                .iter()
                .flat_map(|pid| graph.members_of(pid))
                .collect(),
        )
    } else if !selection.group_ids.is_empty() {
        Some(
            super::projects_in_scope(selection, entities)
                .into_iter()
                .flat_map(|pid| graph.members_of(pid))
                .collect(),
        )
    } else {
        None
    };

    entities
        .users
        .iter()
        .filter(|u| allowed.as_ref().is_none_or(|set| set.contains(&u.id)))
        .map(|user| {
            let open = graph
                .projects_of(&user.id)
                .iter()
                .filter(|pid| entities.project(pid).is_some_and(|p| !p.is_closed()))
                .count();
            FacetOption {
                id: user.id.clone(),
                label: display_name(&user.name, &user.id),
                meta: (!user.email.is_empty()).then(|| user.email.clone()),
                badge: Some(plural(open, "project")),
                disabled: false,
            }
        })
        .collect()
}

fn display_name(name: &str, id: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        id.to_string()
    } else {
        trimmed.to_string()
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
