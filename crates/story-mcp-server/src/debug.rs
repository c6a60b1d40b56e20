//! Step-level debugging: breakpoints, watches, and the execution trace

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use story_mcp_core::{Choice, Result, StoryMcpError, StoryRuntime};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::sessions::Session;

/// How much output text a trace entry or inspect snapshot keeps
const OUTPUT_TRUNCATE: usize = 200;

/// What a breakpoint watches for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointKind {
    /// Output text looks like entry into the named knot
    Knot,
    /// Output text looks like entry into the named stitch
    Stitch,
    /// Output text matches a regex (substring if the regex fails to compile)
    Pattern,
    /// A watched variable changed this step
    VariableChange,
}

impl BreakpointKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "knot" => Ok(BreakpointKind::Knot),
            "stitch" => Ok(BreakpointKind::Stitch),
            "pattern" => Ok(BreakpointKind::Pattern),
            "variable_change" => Ok(BreakpointKind::VariableChange),
            other => Err(StoryMcpError::Protocol(format!(
                "Unknown breakpoint type: {other}"
            ))),
        }
    }
}

/// A rule that pauses stepping
#[derive(Debug, Clone, Serialize)]
pub struct Breakpoint {
    /// Sequential id, unique within one debug session
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: BreakpointKind,
    pub target: String,
    pub enabled: bool,
}

impl Breakpoint {
    /// Evaluate against this step's output text and watch change-set.
    ///
    /// Location kinds use a coarse text heuristic since the runtime exposes
    /// no structured "current location" event: a `== name` marker in the
    /// output, or output that starts with the name after trimming.
    fn matches(&self, text: &str, changed: &[WatchChange]) -> bool {
        match self.kind {
            BreakpointKind::Pattern => match Regex::new(&self.target) {
                Ok(re) => re.is_match(text),
                // Invalid regex degrades to a literal substring match
                Err(_) => text.contains(&self.target),
            },
            BreakpointKind::VariableChange => changed.iter().any(|c| c.name == self.target),
            BreakpointKind::Knot | BreakpointKind::Stitch => {
                text.contains(&format!("== {}", self.target))
                    || text.trim_start().starts_with(&self.target)
            }
        }
    }
}

/// A watched variable's last value and how often it has changed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Watch {
    pub value: Value,
    pub change_count: u64,
}

/// One watched variable transitioning between steps
#[derive(Debug, Clone, Serialize)]
pub struct WatchChange {
    pub name: String,
    pub old: Value,
    pub new: Value,
}

/// One step recorded in the trailing execution trace
#[derive(Debug, Clone, Serialize)]
pub struct VisitEntry {
    pub step: u64,
    pub text: String,
    pub changed: Vec<String>,
    pub at: DateTime<Utc>,
}

/// Outcome of a single debug step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub text: String,
    pub can_continue: bool,
    pub choices: Vec<Choice>,
    pub tags: Vec<String>,
    pub step: u64,
    pub paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_breakpoint: Option<Breakpoint>,
    pub watch_changes: Vec<WatchChange>,
}

/// Read-only snapshot returned by `debug_inspect`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectSnapshot {
    pub step_count: u64,
    pub paused: bool,
    pub breakpoints: Vec<Breakpoint>,
    pub watches: BTreeMap<String, Watch>,
    pub last_output: String,
}

/// Per-session debugging state
pub struct DebugSession {
    breakpoints: Vec<Breakpoint>,
    next_breakpoint_id: u64,
    watches: BTreeMap<String, Watch>,
    step_count: u64,
    paused: bool,
    last_output: String,
    trace: VecDeque<VisitEntry>,
    trace_limit: usize,
}

impl DebugSession {
    fn new(trace_limit: usize) -> Self {
        Self {
            breakpoints: Vec::new(),
            next_breakpoint_id: 1,
            watches: BTreeMap::new(),
            step_count: 0,
            paused: false,
            last_output: String::new(),
            trace: VecDeque::new(),
            trace_limit,
        }
    }

    fn push_visit(&mut self, text: &str, changed: Vec<String>) {
        self.trace.push_back(VisitEntry {
            step: self.step_count,
            text: truncate(text, OUTPUT_TRUNCATE),
            changed,
            at: Utc::now(),
        });
        while self.trace.len() > self.trace_limit {
            self.trace.pop_front();
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Debug instrumentation across all sessions.
///
/// Debug sessions live independently of the sessions they wrap: ending one
/// never ends the other.
pub struct DebugEngine {
    sessions: DashMap<String, Arc<Mutex<DebugSession>>>,
    trace_limit: usize,
}

impl DebugEngine {
    pub fn new(trace_limit: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            trace_limit,
        }
    }

    /// Start (or restart) debugging for a session. The caller is responsible
    /// for having verified the session exists.
    pub fn start(&self, session_id: &str) {
        self.sessions.insert(
            session_id.to_string(),
            Arc::new(Mutex::new(DebugSession::new(self.trace_limit))),
        );
        info!(session_id, "Debug session started");
    }

    /// Stop debugging. Idempotent; the underlying session is untouched.
    pub fn end(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    fn get(&self, session_id: &str) -> Result<Arc<Mutex<DebugSession>>> {
        self.sessions
            .get(session_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| StoryMcpError::DebugSessionNotFound(session_id.to_string()))
    }

    pub async fn add_breakpoint(
        &self,
        session_id: &str,
        kind: BreakpointKind,
        target: String,
    ) -> Result<Breakpoint> {
        let dbg = self.get(session_id)?;
        let mut dbg = dbg.lock().await;
        let breakpoint = Breakpoint {
            id: dbg.next_breakpoint_id,
            kind,
            target,
            enabled: true,
        };
        dbg.next_breakpoint_id += 1;
        dbg.breakpoints.push(breakpoint.clone());
        debug!(session_id, breakpoint_id = breakpoint.id, ?kind, "Breakpoint added");
        Ok(breakpoint)
    }

    /// Remove by id; returns whether anything was removed
    pub async fn remove_breakpoint(&self, session_id: &str, id: u64) -> Result<bool> {
        let dbg = self.get(session_id)?;
        let mut dbg = dbg.lock().await;
        let before = dbg.breakpoints.len();
        dbg.breakpoints.retain(|bp| bp.id != id);
        Ok(dbg.breakpoints.len() != before)
    }

    /// Watch a variable, capturing its current value as the baseline.
    ///
    /// Re-adding refreshes the baseline but keeps the change count.
    pub async fn add_watch(&self, session_id: &str, session: &Session, name: &str) -> Result<Value> {
        let dbg = self.get(session_id)?;
        let baseline = {
            let runtime = session.runtime().await;
            read_variable(runtime.as_ref(), name).await
        };
        let mut dbg = dbg.lock().await;
        match dbg.watches.get_mut(name) {
            Some(watch) => watch.value = baseline.clone(),
            None => {
                dbg.watches.insert(
                    name.to_string(),
                    Watch {
                        value: baseline.clone(),
                        change_count: 0,
                    },
                );
            }
        }
        Ok(baseline)
    }

    /// Advance the session by exactly one continuation unit, updating
    /// watches, evaluating breakpoints, and recording a trace entry.
    ///
    /// Stepping while the story cannot continue (ended, or waiting on a
    /// choice) is an explicit error rather than a silent no-op.
    pub async fn step(&self, session_id: &str, session: &Session) -> Result<StepOutcome> {
        let dbg = self.get(session_id)?;
        let mut dbg = dbg.lock().await;
        let mut runtime = session.runtime().await;
        step_locked(&mut dbg, runtime.as_mut()).await
    }

    /// Clear the paused flag and step until a breakpoint hits, the story
    /// stops or offers choices, or `max_steps` is exhausted.
    pub async fn continue_run(
        &self,
        session_id: &str,
        session: &Session,
        max_steps: u64,
    ) -> Result<StepOutcome> {
        let dbg = self.get(session_id)?;
        let mut dbg = dbg.lock().await;
        let mut runtime = session.runtime().await;

        dbg.paused = false;
        let mut last: Option<StepOutcome> = None;
        for _ in 0..max_steps {
            if !runtime.can_continue() {
                break;
            }
            let outcome = step_locked(&mut dbg, runtime.as_mut()).await?;
            let stop =
                outcome.paused || !outcome.can_continue || !outcome.choices.is_empty();
            last = Some(outcome);
            if stop {
                break;
            }
        }

        // Nothing steppable at entry: report the current state untouched
        Ok(last.unwrap_or_else(|| StepOutcome {
            text: String::new(),
            can_continue: runtime.can_continue(),
            choices: runtime.current_choices(),
            tags: Vec::new(),
            step: dbg.step_count,
            paused: dbg.paused,
            hit_breakpoint: None,
            watch_changes: Vec::new(),
        }))
    }

    pub async fn inspect(&self, session_id: &str) -> Result<InspectSnapshot> {
        let dbg = self.get(session_id)?;
        let dbg = dbg.lock().await;
        Ok(InspectSnapshot {
            step_count: dbg.step_count,
            paused: dbg.paused,
            breakpoints: dbg.breakpoints.clone(),
            watches: dbg.watches.clone(),
            last_output: truncate(&dbg.last_output, OUTPUT_TRUNCATE),
        })
    }

    /// The most recent `last_n` trace entries, oldest first
    pub async fn trace(&self, session_id: &str, last_n: usize) -> Result<Vec<VisitEntry>> {
        let dbg = self.get(session_id)?;
        let dbg = dbg.lock().await;
        let skip = dbg.trace.len().saturating_sub(last_n);
        Ok(dbg.trace.iter().skip(skip).cloned().collect())
    }
}

/// Watch reads treat unknown variables as null rather than failing the step
async fn read_variable(runtime: &dyn StoryRuntime, name: &str) -> Value {
    match runtime.get_variable(name).await {
        Ok(value) => value,
        Err(_) => Value::Null,
    }
}

async fn step_locked(
    dbg: &mut DebugSession,
    runtime: &mut dyn StoryRuntime,
) -> Result<StepOutcome> {
    if !runtime.can_continue() {
        let pending = runtime.current_choices().len();
        return Err(StoryMcpError::StoryEnded(format!(
            "no output to advance past ({pending} choices pending)"
        )));
    }

    // 1. Snapshot watched values before advancing
    let names: Vec<String> = dbg.watches.keys().cloned().collect();
    let mut before = Vec::with_capacity(names.len());
    for name in &names {
        before.push(read_variable(runtime, name).await);
    }

    // 2. One continuation unit
    let result = runtime.continue_story().await?;

    // 3. Re-read watches; values refresh every step, counts bump only on
    //    serialized-inequality
    let mut changes = Vec::new();
    for (name, old) in names.iter().zip(before) {
        let new = read_variable(runtime, name).await;
        if let Some(watch) = dbg.watches.get_mut(name) {
            watch.value = new.clone();
            if old != new {
                watch.change_count += 1;
                changes.push(WatchChange {
                    name: name.clone(),
                    old,
                    new,
                });
            }
        }
    }

    // 4. First enabled breakpoint that matches pauses execution
    let hit = dbg
        .breakpoints
        .iter()
        .filter(|bp| bp.enabled)
        .find(|bp| bp.matches(&result.text, &changes))
        .cloned();
    if let Some(bp) = &hit {
        dbg.paused = true;
        info!(breakpoint_id = bp.id, target = %bp.target, "Breakpoint hit");
    }

    // 5. Record the visit
    dbg.step_count += 1;
    dbg.last_output = result.text.clone();
    let changed_names: Vec<String> = changes.iter().map(|c| c.name.clone()).collect();
    dbg.push_visit(&result.text, changed_names);

    Ok(StepOutcome {
        text: result.text,
        can_continue: result.can_continue,
        choices: result.choices,
        tags: result.tags,
        step: dbg.step_count,
        paused: dbg.paused,
        hit_breakpoint: hit,
        watch_changes: changes,
    })
}
