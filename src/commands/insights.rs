use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{Output, format_selection, load_warning, to_json_string};
use crate::config::ResolvedConfig;
use crate::controller::InsightsController;
use crate::insight::{
    HttpInsightGenerator, InsightGenerator, InsightReport, InsightRequest, SchedulerConfig,
    SchedulerHandle, SchedulerPhase, SchedulerSnapshot, render_report, spawn_scheduler,
};
use crate::models::{Selection, SelectionEdit};
use crate::store::LoadState;
use crate::{Error, Result};

/// HTTP generator for the configured endpoint.
pub fn generator_for(config: &ResolvedConfig) -> Result<HttpInsightGenerator> {
    let endpoint = config.insight_endpoint().ok_or_else(|| {
        Error::InvalidConfig(
            "no insight endpoint: pass --endpoint, set SX_INSIGHT_ENDPOINT or insight-endpoint in sextant.kdl"
                .to_string(),
        )
    })?;
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(Error::InvalidConfig(format!(
            "insight endpoint must be an http(s) URL, got {:?}",
            endpoint
        )));
    }
    Ok(HttpInsightGenerator::new(
        endpoint,
        config.api_token().map(str::to_string),
        config.request_timeout(),
    )?)
}

// === One-shot insights ===

#[derive(Debug, Serialize)]
pub struct InsightsResult {
    pub load: LoadState,
    pub selection: Selection,
    pub request: InsightRequest,
    /// `null` when the generator had nothing to say
    pub insight: Option<InsightReport>,
}

impl Output for InsightsResult {
    fn to_json(&self) -> String {
        to_json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        lines.extend(load_warning(&self.load));
        lines.push("Selection:".to_string());
        lines.extend(format_selection(&self.selection));
        lines.push(String::new());
        lines.extend(render_report(self.insight.as_ref()));
        lines.join("\n")
    }
}

/// Reconcile `draft` and request one insight for it, bypassing the debounce.
pub async fn insights(
    config: &ResolvedConfig,
    draft: Selection,
    generator: &dyn InsightGenerator,
) -> Result<InsightsResult> {
    let controller = super::load_controller(config, draft).await?;
    let request = InsightRequest::from(controller.selection());
    let insight = generator.generate(&request).await?;
    Ok(InsightsResult {
        load: controller.load_state().clone(),
        selection: controller.selection().clone(),
        request,
        insight,
    })
}

// === Watch ===

/// One line of `watch` input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchInput {
    Edit(SelectionEdit),
    Refresh,
    Quit,
    Blank,
}

impl WatchInput {
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        match line.trim() {
            "" => Ok(WatchInput::Blank),
            "refresh" => Ok(WatchInput::Refresh),
            "quit" | "exit" => Ok(WatchInput::Quit),
            other => serde_json::from_str(other)
                .map(WatchInput::Edit)
                .map_err(|e| format!("invalid edit {:?}: {}", other, e)),
        }
    }
}

/// One line of `watch` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    Selection {
        selection: Selection,
    },
    Status {
        phase: SchedulerPhase,
    },
    Insight {
        seq: u64,
        insight: Option<InsightReport>,
        error: Option<String>,
    },
    Error {
        message: String,
    },
}

impl Output for WatchEvent {
    fn to_json(&self) -> String {
        to_json_string(self)
    }

    fn to_human(&self) -> String {
        match self {
            WatchEvent::Selection { selection } => {
                let mut lines = vec!["Selection:".to_string()];
                lines.extend(format_selection(selection));
                lines.join("\n")
            }
            WatchEvent::Status { phase } => format!("Status: {}", phase_label(*phase)),
            WatchEvent::Insight {
                seq,
                error: Some(error),
                ..
            } => format!("Insight #{} failed: {}", seq, error),
            WatchEvent::Insight { seq, insight, .. } => {
                let mut lines = vec![format!("Insight #{}:", seq)];
                lines.extend(render_report(insight.as_ref()).into_iter().map(|l| format!("  {}", l)));
                lines.join("\n")
            }
            WatchEvent::Error { message } => format!("Error: {}", message),
        }
    }
}

fn phase_label(phase: SchedulerPhase) -> &'static str {
    match phase {
        SchedulerPhase::Idle => "idle",
        SchedulerPhase::Scheduled => "scheduled",
        SchedulerPhase::InFlight => "in flight",
        SchedulerPhase::IdleWithError => "idle (last request failed)",
    }
}

fn is_busy(phase: SchedulerPhase) -> bool {
    matches!(phase, SchedulerPhase::Scheduled | SchedulerPhase::InFlight)
}

fn emit<W: Write>(out: &mut W, event: &WatchEvent, human: bool) -> Result<()> {
    if human {
        writeln!(out, "{}", event.to_human())?;
    } else {
        writeln!(out, "{}", event.to_json())?;
    }
    out.flush()?;
    Ok(())
}

/// Emit the events that separate `last` from `next`, then remember `next`.
fn report<W: Write>(
    out: &mut W,
    last: &mut SchedulerSnapshot,
    next: SchedulerSnapshot,
    human: bool,
) -> Result<()> {
    if next.last_applied_seq > last.last_applied_seq {
        let event = WatchEvent::Insight {
            seq: next.last_applied_seq,
            insight: next.result.clone(),
            error: next.error.clone(),
        };
        emit(out, &event, human)?;
    }
    if next.phase != last.phase {
        emit(out, &WatchEvent::Status { phase: next.phase }, human)?;
    }
    *last = next;
    Ok(())
}

/// Drive the controller from `input` and report scheduler activity to `out`.
///
/// Each input line is a JSON [`SelectionEdit`] or one of the words `refresh`
/// and `quit`. At end of input the loop keeps running until no request is
/// scheduled or outstanding, so piped edits still get their insight.
pub async fn watch<R, W>(
    controller: &mut InsightsController,
    generator: Arc<dyn InsightGenerator>,
    scheduler: SchedulerConfig,
    input: R,
    out: &mut W,
    human: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let handle = spawn_scheduler(generator, controller.subscribe(), scheduler);
    let result = drive(controller, &handle, input, out, human).await;
    handle.shutdown().await;
    result
}

async fn drive<R, W>(
    controller: &mut InsightsController,
    handle: &SchedulerHandle,
    input: R,
    out: &mut W,
    human: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut snapshots = handle.subscribe();
    let mut last = snapshots.borrow_and_update().clone();
    let mut lines = input.lines();
    let mut draining = false;

    emit(out, &WatchEvent::Selection { selection: controller.selection().clone() }, human)?;
    handle.mark_loaded().await;

    loop {
        tokio::select! {
            line = lines.next_line(), if !draining => match line? {
                Some(line) => match WatchInput::parse(&line) {
                    Ok(WatchInput::Edit(edit)) => {
                        if controller.apply(&edit)? {
                            let selection = controller.selection().clone();
                            emit(out, &WatchEvent::Selection { selection }, human)?;
                        }
                    }
                    Ok(WatchInput::Refresh) => handle.refresh().await,
                    Ok(WatchInput::Quit) => return Ok(()),
                    Ok(WatchInput::Blank) => {}
                    Err(message) => emit(out, &WatchEvent::Error { message }, human)?,
                },
                None => {
                    draining = true;
                    let snapshot = handle.flush().await;
                    report(out, &mut last, snapshot, human)?;
                    if !is_busy(last.phase) {
                        return Ok(());
                    }
                }
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = snapshots.borrow_and_update().clone();
                report(out, &mut last, snapshot, human)?;
                if draining && !is_busy(last.phase) {
                    return Ok(());
                }
            }
        }
    }
}
