//! Aggregate counters over the filtered subsets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Project, ProjectStatus, Task, TaskStatus};

/// Headline numbers for the filtered view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpis {
    /// Distinct groups among the filtered projects
    pub groups: usize,
    pub projects: usize,
    pub ongoing_projects: usize,
    /// Past end date and not closed, as of the evaluation instant
    pub overdue_projects: usize,
    pub tasks: usize,
    /// Past due date and not completed, as of the evaluation instant
    pub overdue_tasks: usize,
}

impl Kpis {
    pub fn compute(groups: usize, projects: &[&Project], tasks: &[&Task], now: DateTime<Utc>) -> Self {
        Self {
            groups,
            projects: projects.len(),
            ongoing_projects: projects
                .iter()
                .filter(|p| p.status == ProjectStatus::Ongoing)
                .count(),
            overdue_projects: projects.iter().filter(|p| p.is_overdue(now)).count(),
            tasks: tasks.len(),
            overdue_tasks: tasks.iter().filter(|t| t.is_overdue(now)).count(),
        }
    }
}

/// Task counters for one project (or any other task scope).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total: usize,
    pub completed: usize,
    pub blocked: usize,
    pub overdue: usize,
}

impl ProjectStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>, now: DateTime<Utc>) -> Self {
        tasks.into_iter().fold(Self::default(), |mut stats, task| {
            stats.total += 1;
            if task.status.is_completed() {
                stats.completed += 1;
            }
            if task.status == TaskStatus::Blocked {
                stats.blocked += 1;
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
            stats
        })
    }

    pub fn completion_rate(&self) -> u8 {
        completion_rate(self.completed, self.total)
    }
}

/// Completed share in whole percent, rounded half up. Zero when `total` is 0.
pub fn completion_rate(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed * 100 + total / 2) / total) as u8
}

/// Weighted project health in 0..=100.
///
/// Returns `None` when there are no tasks to judge; callers render that as a
/// "no data" state rather than a number.
pub fn health_score(stats: &ProjectStats) -> Option<u8> {
    if stats.total == 0 {
        return None;
    }
    let total = stats.total as f64;
    let score = 40.0 + 60.0 * stats.completed as f64 / total
        - 20.0 * stats.blocked as f64 / total
        - 20.0 * stats.overdue as f64 / total;
    Some(score.round().clamp(0.0, 100.0) as u8)
}
