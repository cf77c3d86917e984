//! Breakpoint definitions and matching.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use smol_str::SmolStr;

use crate::model::SourceInfo;
use crate::trace::trace_debug;

/// Opaque breakpoint identifier (8 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointId(SmolStr);

impl BreakpointId {
    /// Identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BreakpointId {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

/// Where a breakpoint triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointKind {
    /// Any expression whose line range covers `line` in `source_id`.
    Line {
        /// Source the line belongs to.
        source_id: SmolStr,
        /// Line that must fall inside the expression's range.
        line: u32,
    },
    /// Any application of a function with a matching declared name.
    Function {
        /// Declared name to match.
        name: SmolStr,
        /// Match any declared name containing `name`.
        match_partial: bool,
    },
}

impl BreakpointKind {
    /// Check whether the location / function name pair matches.
    #[must_use]
    pub fn matches(&self, location: Option<&SourceInfo>, function_name: Option<&str>) -> bool {
        match self {
            BreakpointKind::Line { source_id, line } => location.is_some_and(|location| {
                location.source_id == *source_id && location.contains_line(*line)
            }),
            BreakpointKind::Function {
                name,
                match_partial,
            } => function_name.is_some_and(|candidate| {
                if *match_partial {
                    candidate.contains(name.as_str())
                } else {
                    candidate == name.as_str()
                }
            }),
        }
    }
}

/// Breakpoint definition with hit-count gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    /// Store-assigned identifier.
    pub id: BreakpointId,
    /// Where the breakpoint triggers.
    pub kind: BreakpointKind,
    /// Disabled breakpoints never match and do not count hits.
    pub enabled: bool,
    /// Condition source text. Stored for clients; never evaluated here.
    pub condition: Option<String>,
    /// Number of matching evaluations seen while enabled.
    pub hit_count: u64,
    /// Zero breaks on every match; otherwise break once `hit_count` reaches it.
    pub hit_count_target: u64,
}

impl Breakpoint {
    fn new(id: BreakpointId, kind: BreakpointKind) -> Self {
        Self {
            id,
            kind,
            enabled: true,
            condition: None,
            hit_count: 0,
            hit_count_target: 0,
        }
    }

    /// Whether the current hit count clears the hit-count gate.
    #[must_use]
    pub fn should_break_on_hit(&self) -> bool {
        self.hit_count_target == 0 || self.hit_count >= self.hit_count_target
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BreakpointKind::Line { source_id, line } => {
                write!(f, "LineBreakpoint{{{source_id}:{line}}}")
            }
            BreakpointKind::Function { name, .. } => write!(f, "FunctionBreakpoint{{{name}}}"),
        }
    }
}

/// Thread-safe breakpoint registry.
///
/// May be mutated from the controller thread while the interpreter thread
/// is running and matching against it.
#[derive(Debug, Default)]
pub struct BreakpointStore {
    breakpoints: Mutex<HashMap<BreakpointId, Breakpoint>>,
    next_id: AtomicU32,
}

impl BreakpointStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line breakpoint.
    pub fn add_line(&self, source_id: impl Into<SmolStr>, line: u32) -> BreakpointId {
        self.insert(BreakpointKind::Line {
            source_id: source_id.into(),
            line,
        })
    }

    /// Add a function breakpoint.
    pub fn add_function(&self, name: impl Into<SmolStr>, match_partial: bool) -> BreakpointId {
        self.insert(BreakpointKind::Function {
            name: name.into(),
            match_partial,
        })
    }

    /// Remove a breakpoint. Returns `false` if the id was unknown.
    pub fn remove(&self, id: &BreakpointId) -> bool {
        let removed = self.breakpoints.lock().remove(id).is_some();
        trace_debug(|| format!("remove breakpoint id={id} removed={removed}"));
        removed
    }

    /// Copy of the breakpoint with `id`.
    #[must_use]
    pub fn get(&self, id: &BreakpointId) -> Option<Breakpoint> {
        self.breakpoints.lock().get(id).cloned()
    }

    /// Snapshot all breakpoints, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<Breakpoint> {
        let mut breakpoints: Vec<_> = self.breakpoints.lock().values().cloned().collect();
        breakpoints.sort_by(|left, right| left.id.cmp(&right.id));
        breakpoints
    }

    /// Remove every breakpoint.
    pub fn clear(&self) {
        self.breakpoints.lock().clear();
    }

    /// Number of breakpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakpoints.lock().len()
    }

    /// Whether the store holds no breakpoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakpoints.lock().is_empty()
    }

    /// Enable or disable a breakpoint. Returns `false` if the id was unknown.
    pub fn set_enabled(&self, id: &BreakpointId, enabled: bool) -> bool {
        self.update(id, |breakpoint| breakpoint.enabled = enabled)
    }

    /// Replace the stored condition text. Returns `false` if the id was unknown.
    pub fn set_condition(&self, id: &BreakpointId, condition: Option<String>) -> bool {
        self.update(id, |breakpoint| breakpoint.condition = condition)
    }

    /// Pause only once the hit count reaches `target`. `0` pauses on every hit.
    pub fn set_hit_count_target(&self, id: &BreakpointId, target: u64) -> bool {
        self.update(id, |breakpoint| breakpoint.hit_count_target = target)
    }

    /// Check whether execution should stop at the given location.
    ///
    /// Every enabled, matching breakpoint visited has its hit count bumped,
    /// even when its hit-count gate is not yet cleared.
    pub fn should_break(&self, location: Option<&SourceInfo>, function_name: Option<&str>) -> bool {
        let mut breakpoints = self.breakpoints.lock();
        for breakpoint in breakpoints.values_mut() {
            if !breakpoint.enabled || !breakpoint.kind.matches(location, function_name) {
                continue;
            }
            breakpoint.hit_count = breakpoint.hit_count.saturating_add(1);
            if breakpoint.should_break_on_hit() {
                trace_debug(|| {
                    format!(
                        "breakpoint {} hit (count={})",
                        breakpoint.id, breakpoint.hit_count
                    )
                });
                return true;
            }
        }
        false
    }

    fn insert(&self, kind: BreakpointKind) -> BreakpointId {
        let id = self.generate_id();
        let breakpoint = Breakpoint::new(id.clone(), kind);
        tracing::debug!(%id, breakpoint = %breakpoint, "breakpoint added");
        self.breakpoints.lock().insert(id.clone(), breakpoint);
        id
    }

    fn update(&self, id: &BreakpointId, f: impl FnOnce(&mut Breakpoint)) -> bool {
        match self.breakpoints.lock().get_mut(id) {
            Some(breakpoint) => {
                f(breakpoint);
                true
            }
            None => false,
        }
    }

    fn generate_id(&self) -> BreakpointId {
        // Odd multiplier keeps the mapping bijective, so ids never repeat
        // within a store.
        let sequence = self.next_id.fetch_add(1, Ordering::Relaxed);
        let scrambled = sequence.wrapping_add(1).wrapping_mul(0x9E37_79B1);
        BreakpointId(SmolStr::new(format!("{scrambled:08x}")))
    }
}
