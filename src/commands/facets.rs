use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Output, format_selection, load_warning, to_json_string};
use crate::config::ResolvedConfig;
use crate::facets::{FacetOption, FacetOptions};
use crate::models::{Selection, parse_datetime};
use crate::store::LoadState;
use crate::view::FilteredView;
use crate::{Error, Result};

// === Reconcile ===

#[derive(Debug, Serialize)]
pub struct ReconcileResult {
    pub load: LoadState,
    pub draft: Selection,
    pub selection: Selection,
    /// Whether reconciliation altered the draft
    pub changed: bool,
}

impl Output for ReconcileResult {
    fn to_json(&self) -> String {
        to_json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        lines.extend(load_warning(&self.load));
        if self.changed {
            lines.push("Selection (adjusted):".to_string());
        } else {
            lines.push("Selection:".to_string());
        }
        lines.extend(format_selection(&self.selection));
        lines.join("\n")
    }
}

/// Reconcile `draft` against the loaded entities.
pub async fn reconcile(config: &ResolvedConfig, draft: Selection) -> Result<ReconcileResult> {
    let controller = super::load_controller(config, draft.clone()).await?;
    let selection = controller.selection().clone();
    Ok(ReconcileResult {
        load: controller.load_state().clone(),
        changed: selection != draft,
        draft,
        selection,
    })
}

// === Options ===

#[derive(Debug, Serialize)]
pub struct OptionsResult {
    pub load: LoadState,
    pub selection: Selection,
    pub options: FacetOptions,
}

fn format_option(option: &FacetOption, selected: bool) -> String {
    let mark = if selected { "[x]" } else { "[ ]" };
    let mut line = format!("  {} {} ({})", mark, option.label, option.id);
    if let Some(meta) = &option.meta {
        line.push_str(&format!(" - {}", meta));
    }
    if let Some(badge) = &option.badge {
        line.push_str(&format!(" [{}]", badge));
    }
    if option.disabled {
        line.push_str(" (disabled)");
    }
    line
}

impl Output for OptionsResult {
    fn to_json(&self) -> String {
        to_json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        lines.extend(load_warning(&self.load));

        let sections = [
            ("Groups", &self.options.groups, &self.selection.group_ids),
            ("Projects", &self.options.projects, &self.selection.project_ids),
            ("Users", &self.options.users, &self.selection.user_ids),
        ];
        for (title, options, selected) in sections {
            lines.push(format!("{} ({}):", title, options.len()));
            if options.is_empty() {
                lines.push("  (none)".to_string());
            }
            for option in options {
                lines.push(format_option(option, selected.contains(&option.id)));
            }
        }
        lines.join("\n")
    }
}

/// Option lists for each facet under the reconciled `draft`.
pub async fn options(config: &ResolvedConfig, draft: Selection) -> Result<OptionsResult> {
    let controller = super::load_controller(config, draft).await?;
    Ok(OptionsResult {
        load: controller.load_state().clone(),
        selection: controller.selection().clone(),
        options: controller.options(),
    })
}

// === View ===

#[derive(Debug, Serialize)]
pub struct ViewResult {
    pub load: LoadState,
    pub selection: Selection,
    /// Instant the overdue counts were evaluated at
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub view: FilteredView,
}

impl Output for ViewResult {
    fn to_json(&self) -> String {
        to_json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        lines.extend(load_warning(&self.load));

        let kpis = &self.view.kpis;
        lines.push(format!(
            "{} group(s), {} project(s) ({} ongoing, {} overdue), {} task(s) ({} overdue)",
            kpis.groups,
            kpis.projects,
            kpis.ongoing_projects,
            kpis.overdue_projects,
            kpis.tasks,
            kpis.overdue_tasks
        ));

        if !self.view.group_insights.is_empty() {
            lines.push(String::new());
            lines.push("Groups:".to_string());
            for group in &self.view.group_insights {
                lines.push(format!("  {}", group.summary));
            }
        }
        if !self.view.project_insights.is_empty() {
            lines.push(String::new());
            lines.push("Projects:".to_string());
            for project in &self.view.project_insights {
                match project.health_score {
                    Some(score) => lines.push(format!("  {} Health {}/100.", project.summary, score)),
                    None => lines.push(format!("  {}", project.summary)),
                }
            }
        }
        lines.join("\n")
    }
}

/// Filtered view for the reconciled `draft`, evaluated at `at` (default now).
pub async fn view(config: &ResolvedConfig, draft: Selection, at: Option<&str>) -> Result<ViewResult> {
    let at = match at {
        Some(raw) => parse_datetime(raw)
            .ok_or_else(|| Error::InvalidInput(format!("invalid --at value: {:?}", raw)))?,
        None => Utc::now(),
    };
    let controller = super::load_controller(config, draft).await?;
    Ok(ViewResult {
        load: controller.load_state().clone(),
        selection: controller.selection().clone(),
        at,
        view: controller.view(at),
    })
}
