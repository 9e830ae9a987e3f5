//! Per-group and per-project insight text.
//!
//! Sentences are fixed templates over counts so the same view always produces
//! the same text.

use serde::{Deserialize, Serialize};

use super::kpi::{ProjectStats, completion_rate, health_score};

/// Local insight for one filtered project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInsight {
    pub project_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub stats: ProjectStats,
    pub completion_rate: u8,
    /// `None` when the project has no tasks in scope
    pub health_score: Option<u8>,
    pub summary: String,
}

impl ProjectInsight {
    pub fn new(project_id: &str, name: &str, group_id: Option<&str>, stats: ProjectStats) -> Self {
        let rate = stats.completion_rate();
        let summary = if stats.total == 0 {
            format!("{}: no tasks in scope.", name)
        } else {
            let mut text = format!(
                "{}: {} of {} tasks completed ({}%)",
                name, stats.completed, stats.total, rate
            );
            if stats.overdue > 0 {
                text.push_str(&format!(", {} overdue", stats.overdue));
            }
            if stats.blocked > 0 {
                text.push_str(&format!(", {} blocked", stats.blocked));
            }
            text.push('.');
            text
        };
        Self {
            project_id: project_id.to_string(),
            name: name.to_string(),
            group_id: group_id.map(str::to_string),
            stats,
            completion_rate: rate,
            health_score: health_score(&stats),
            summary,
        }
    }
}

/// Local insight for one filtered group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInsight {
    pub group_id: String,
    pub name: String,
    pub projects: usize,
    pub tasks: usize,
    pub completed_tasks: usize,
    pub overdue_tasks: usize,
    pub completion_rate: u8,
    pub summary: String,
}

impl GroupInsight {
    /// Roll up the insights of the group's filtered projects.
    pub fn from_projects<'a>(
        group_id: &str,
        name: &str,
        projects: impl IntoIterator<Item = &'a ProjectInsight>,
    ) -> Self {
        let (count, totals) = projects
            .into_iter()
            .fold((0, ProjectStats::default()), |(count, mut acc), p| {
                acc.total += p.stats.total;
                acc.completed += p.stats.completed;
                acc.blocked += p.stats.blocked;
                acc.overdue += p.stats.overdue;
                (count + 1, acc)
            });
        let rate = completion_rate(totals.completed, totals.total);
        let noun = if count == 1 { "project" } else { "projects" };
        let summary = if totals.total == 0 {
            format!("{}: {} {}, no tasks in scope.", name, count, noun)
        } else {
            format!(
                "{}: {} {}, {} of {} tasks completed ({}%).",
                name, count, noun, totals.completed, totals.total, rate
            )
        };
        Self {
            group_id: group_id.to_string(),
            name: name.to_string(),
            projects: count,
            tasks: totals.total,
            completed_tasks: totals.completed,
            overdue_tasks: totals.overdue,
            completion_rate: rate,
            summary,
        }
    }
}
