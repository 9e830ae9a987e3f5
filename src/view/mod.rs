//! Filtered view builder.
//!
//! Given a reconciled selection, derives the filtered projects, tasks and
//! groups plus local statistics. Everything here is recomputed per evaluation
//! because overdue counts depend on the evaluation instant.

mod kpi;
mod summary;

pub use kpi::{Kpis, ProjectStats, completion_rate, health_score};
pub use summary::{GroupInsight, ProjectInsight};

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::graph::MembershipGraph;
use crate::models::{Entities, Group, Project, Selection, Task};

/// Filtered subsets and statistics for one selection at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilteredView {
    pub groups: Vec<Group>,
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub kpis: Kpis,
    pub group_insights: Vec<GroupInsight>,
    pub project_insights: Vec<ProjectInsight>,
}

/// Build the filtered view for `selection` as of `now`.
///
/// Projects: open, in the selected groups and projects (when set), with a
/// selected user as member (when set). Tasks: under a filtered project and,
/// when users are selected, involving one of them. Groups: owners of a
/// filtered project.
pub fn build_view(
    selection: &Selection,
    graph: &MembershipGraph,
    entities: &Entities,
    now: DateTime<Utc>,
) -> FilteredView {
    let projects: Vec<&Project> = entities
        .open_projects()
        .filter(|p| {
            selection.group_ids.is_empty()
                || p.group_id
                    .as_ref()
                    .is_some_and(|gid| selection.group_ids.contains(gid))
        })
        .filter(|p| selection.project_ids.is_empty() || selection.project_ids.contains(&p.id))
        .filter(|p| selection.user_ids.is_empty() || graph.has_any_member(&p.id, &selection.user_ids))
        .collect();

    let project_ids: BTreeSet<&str> = projects.iter().map(|p| p.id.as_str()).collect();

    let tasks: Vec<&Task> = entities
        .tasks
        .iter()
        .filter(|t| {
            t.project_id
                .as_deref()
                .is_some_and(|pid| project_ids.contains(pid))
        })
        .filter(|t| {
            selection.user_ids.is_empty()
                || t.involved_user_ids().any(|uid| selection.user_ids.contains(uid))
        })
        .collect();

    let owning: BTreeSet<&str> = projects.iter().filter_map(|p| p.group_id.as_deref()).collect();
    let groups: Vec<&Group> = entities
        .groups
        .iter()
        .filter(|g| owning.contains(g.id.as_str()))
        .collect();

    let mut tasks_by_project: HashMap<&str, Vec<&Task>> = HashMap::new();
    for task in &tasks {
        if let Some(pid) = task.project_id.as_deref() {
            tasks_by_project.entry(pid).or_default().push(task);
        }
    }

    let project_insights: Vec<ProjectInsight> = projects
        .iter()
        .map(|project| {
            let scoped = tasks_by_project.get(project.id.as_str()).into_iter().flatten();
            let stats = ProjectStats::from_tasks(scoped.copied(), now);
            ProjectInsight::new(&project.id, &label(&project.name, &project.id), project.group_id.as_deref(), stats)
        })
        .collect();

    let group_insights = groups
        .iter()
        .map(|group| {
            let owned = project_insights
                .iter()
                .filter(|p| p.group_id.as_deref() == Some(group.id.as_str()));
            GroupInsight::from_projects(&group.id, &label(&group.name, &group.id), owned)
        })
        .collect();

    // Distinct owning groups, including ids that no longer resolve to a group.
    let kpis = Kpis::compute(owning.len(), &projects, &tasks, now);

    FilteredView {
        groups: groups.into_iter().cloned().collect(),
        projects: projects.into_iter().cloned().collect(),
        tasks: tasks.into_iter().cloned().collect(),
        kpis,
        group_insights,
        project_insights,
    }
}

fn label(name: &str, id: &str) -> String {
    if name.trim().is_empty() {
        id.to_string()
    } else {
        name.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskStatus, parse_datetime};
    use crate::test_utils::Fixture;

    fn now() -> DateTime<Utc> {
        parse_datetime("2026-06-01T12:00:00Z").unwrap()
    }

    fn view_for(selection: Selection, entities: &Entities) -> FilteredView {
        let graph = MembershipGraph::build(entities);
        build_view(&selection, &graph, entities, now())
    }

    fn project_ids(view: &FilteredView) -> Vec<&str> {
        view.projects.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_empty_selection_shows_open_projects() {
        let view = view_for(Selection::new(), &Fixture::scenario());
        assert_eq!(project_ids(&view), vec!["p1", "p3"]);
        assert_eq!(view.tasks.len(), 3);
        assert_eq!(view.kpis.groups, 2);
        assert_eq!(view.kpis.projects, 2);
        assert_eq!(view.kpis.ongoing_projects, 2);
    }

    #[test]
    fn test_user_filter_narrows_tasks_to_involvement() {
        let view = view_for(Selection::new().with_users(["u2"]), &Fixture::scenario());
        assert_eq!(project_ids(&view), vec!["p1"]);
        let tasks: Vec<&str> = view.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(tasks, vec!["t2"]);
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].id, "g1");
    }

    #[test]
    fn test_project_insights_and_group_rollup() {
        let view = view_for(Selection::new().with_groups(["g1"]), &Fixture::scenario());
        assert_eq!(view.project_insights.len(), 1);

        let p1 = &view.project_insights[0];
        assert_eq!(p1.stats.total, 2);
        assert_eq!(p1.stats.completed, 1);
        assert_eq!(p1.completion_rate, 50);
        assert_eq!(p1.health_score, Some(70));

        assert_eq!(view.group_insights.len(), 1);
        assert_eq!(view.group_insights[0].summary, "Group g1: 1 project, 1 of 2 tasks completed (50%).");
    }

    #[test]
    fn test_overdue_counts_depend_on_now() {
        let entities = Fixture::new()
            .group("g1")
            .project_with("p1", "g1", "ongoing", |p| p.end_date = parse_datetime("2026-05-01"))
            .project_with("p2", "g1", "on_hold", |p| p.end_date = parse_datetime("2026-07-01"))
            .task_with("t1", "p1", |t| t.due_date = parse_datetime("2026-05-15"))
            .task_with("t2", "p1", |t| {
                t.due_date = parse_datetime("2026-05-15");
                t.status = TaskStatus::Completed;
            })
            .build();

        let view = view_for(Selection::new(), &entities);
        assert_eq!(view.kpis.overdue_projects, 1);
        assert_eq!(view.kpis.overdue_tasks, 1);
        assert_eq!(view.kpis.ongoing_projects, 1);

        let graph = MembershipGraph::build(&entities);
        let earlier = build_view(&Selection::new(), &graph, &entities, parse_datetime("2026-01-01").unwrap());
        assert_eq!(earlier.kpis.overdue_projects, 0);
        assert_eq!(earlier.kpis.overdue_tasks, 0);
    }

    #[test]
    fn test_project_without_tasks_has_no_health_score() {
        let entities = Fixture::new().group("g1").project("p1", "g1", "ongoing").build();
        let view = view_for(Selection::new(), &entities);
        assert_eq!(view.project_insights[0].health_score, None);
        assert_eq!(view.project_insights[0].completion_rate, 0);
    }

    #[test]
    fn test_empty_entities_give_zero_kpis() {
        let view = view_for(Selection::new().with_users(["u1"]), &Entities::default());
        assert_eq!(view, FilteredView::default());
    }
}
