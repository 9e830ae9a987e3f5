//! Membership graph for facet consistency checks.
//!
//! This module derives adjacency lookups from the raw entity collections:
//! which users are members of a project, which projects a user belongs to, and
//! which groups a user reaches through open projects. The graph is a pure
//! function of its inputs and is rebuilt in full whenever entities change.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::Entities;

static EMPTY: BTreeSet<String> = BTreeSet::new();

/// Project/user adjacency derived from the entity collections.
///
/// Equality is set equality per key; map iteration order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipGraph {
    /// Project id -> member user ids (owner, access list, collaborators, task participants)
    project_members: HashMap<String, BTreeSet<String>>,

    /// User id -> project ids; the inverse of `project_members`
    user_projects: HashMap<String, BTreeSet<String>>,

    /// User id -> group ids reachable through the user's open projects
    user_groups: HashMap<String, BTreeSet<String>>,
}

impl MembershipGraph {
    /// Build the graph from the raw collections.
    ///
    /// Identifiers that do not resolve to a known entity are dropped silently:
    /// a task pointing at an unknown project contributes nothing, and unknown
    /// user ids never become members. Runs in O(P + T) over projects and tasks.
    pub fn build(entities: &Entities) -> Self {
        let known_users: HashSet<&str> = entities.users.iter().map(|u| u.id.as_str()).collect();
        let known_groups: HashSet<&str> = entities.groups.iter().map(|g| g.id.as_str()).collect();

        let mut project_members: HashMap<String, BTreeSet<String>> = entities
            .projects
            .iter()
            .map(|p| (p.id.clone(), BTreeSet::new()))
            .collect();

        for project in &entities.projects {
            if let Some(members) = project_members.get_mut(&project.id) {
                for uid in project.direct_member_ids() {
                    if known_users.contains(uid.as_str()) {
                        members.insert(uid.clone());
                    }
                }
            }
        }

        for task in &entities.tasks {
            let Some(members) = task
                .project_id
                .as_ref()
                .and_then(|pid| project_members.get_mut(pid))
            else {
                continue;
            };
            for uid in task.involved_user_ids() {
                if known_users.contains(uid.as_str()) {
                    members.insert(uid.clone());
                }
            }
        }

        let mut user_projects: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (pid, members) in &project_members {
            for uid in members {
                user_projects
                    .entry(uid.clone())
                    .or_default()
                    .insert(pid.clone());
            }
        }

        let mut user_groups: HashMap<String, BTreeSet<String>> = HashMap::new();
        for project in entities.open_projects() {
            let Some(gid) = project
                .group_id
                .as_ref()
                .filter(|gid| known_groups.contains(gid.as_str()))
            else {
                continue;
            };
            for uid in project_members.get(&project.id).into_iter().flatten() {
                user_groups
                    .entry(uid.clone())
                    .or_default()
                    .insert(gid.clone());
            }
        }

        Self {
            project_members,
            user_projects,
            user_groups,
        }
    }

    /// Member user ids of a project (empty for unknown projects).
    pub fn members_of(&self, project_id: &str) -> &BTreeSet<String> {
        self.project_members.get(project_id).unwrap_or(&EMPTY)
    }

    /// Project ids a user belongs to, open or closed.
    pub fn projects_of(&self, user_id: &str) -> &BTreeSet<String> {
        self.user_projects.get(user_id).unwrap_or(&EMPTY)
    }

    /// Group ids reachable from a user's open projects.
    pub fn groups_of(&self, user_id: &str) -> &BTreeSet<String> {
        self.user_groups.get(user_id).unwrap_or(&EMPTY)
    }

    /// Whether `user_id` is a member of `project_id`.
    pub fn is_member(&self, user_id: &str, project_id: &str) -> bool {
        self.members_of(project_id).contains(user_id)
    }

    /// Whether any of `user_ids` is a member of `project_id`.
    pub fn has_any_member<'a>(
        &self,
        project_id: &str,
        user_ids: impl IntoIterator<Item = &'a String>,
    ) -> bool {
        let members = self.members_of(project_id);
        user_ids.into_iter().any(|uid| members.contains(uid))
    }

    /// Number of projects tracked by the graph.
    pub fn len(&self) -> usize {
        self.project_members.len()
    }

    /// Check if the graph tracks no projects.
    pub fn is_empty(&self) -> bool {
        self.project_members.is_empty()
    }
}
