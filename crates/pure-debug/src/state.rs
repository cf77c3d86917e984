//! Paused execution state and its projections.

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::model::{function_display_name, ExprRef, ScopeRef, SourceInfo, ValueRef};

/// Preview budget used by [`VariableInfo`]'s `Display`.
pub const DEFAULT_PREVIEW_LENGTH: usize = 50;

const ELLIPSIS: &str = "...";

/// Type-parameter bindings of one generic application.
pub type TypeParameterScope = IndexMap<SmolStr, ValueRef>;

/// Interpreter context pushed to the debugger before each entry hook.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Innermost scope of the variable scope chain.
    pub scope: Option<ScopeRef>,
    /// Active function-expressions, outermost first.
    pub call_stack: Arc<[ExprRef]>,
    /// Type-parameter stack, outermost first.
    pub type_parameters: Arc<[TypeParameterScope]>,
}

impl ExecutionContext {
    /// Context from a scope chain, a call stack and a type-parameter stack.
    #[must_use]
    pub fn new(
        scope: Option<ScopeRef>,
        call_stack: Vec<ExprRef>,
        type_parameters: Vec<TypeParameterScope>,
    ) -> Self {
        Self {
            scope,
            call_stack: call_stack.into(),
            type_parameters: type_parameters.into(),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(None, Vec::new(), Vec::new())
    }
}

/// One entry of the paused call stack.
#[derive(Debug, Clone)]
pub struct CallStackFrame {
    /// Position in the stack; the innermost frame is 0.
    pub index: usize,
    /// Display name of the applied function.
    pub function_name: SmolStr,
    /// Location of the application, when known.
    pub source: Option<SourceInfo>,
    /// The applied function-expression.
    pub expression: ExprRef,
}

impl CallStackFrame {
    /// Frame `index` for `expression`.
    #[must_use]
    pub fn new(index: usize, expression: ExprRef) -> Self {
        Self {
            index,
            function_name: function_display_name(expression.as_ref()),
            source: expression.source_info().cloned(),
            expression,
        }
    }

    /// `name at source:line`, or `name (unknown location)`.
    #[must_use]
    pub fn location_string(&self) -> String {
        match &self.source {
            Some(source) => format!("{} at {source}", self.function_name),
            None => format!("{} (unknown location)", self.function_name),
        }
    }
}

impl fmt::Display for CallStackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.location_string())
    }
}

/// A variable binding visible at the pause point.
#[derive(Debug, Clone)]
pub struct VariableInfo {
    /// Binding name.
    pub name: SmolStr,
    /// Bound value; `None` when unbound.
    pub value: Option<ValueRef>,
    /// Type name of the value, `Nil` when unbound.
    pub type_name: SmolStr,
    /// Bound in the innermost scope rather than inherited.
    pub is_local: bool,
    preview_length: usize,
}

impl VariableInfo {
    /// Binding with the default preview budget.
    #[must_use]
    pub fn new(name: impl Into<SmolStr>, value: Option<ValueRef>, is_local: bool) -> Self {
        let type_name = match &value {
            None => SmolStr::new_inline("Nil"),
            Some(value) => value
                .classifier_name()
                .unwrap_or_else(|| SmolStr::new_inline("Unknown")),
        };
        Self {
            name: name.into(),
            value,
            type_name,
            is_local,
            preview_length: DEFAULT_PREVIEW_LENGTH,
        }
    }

    /// Override the budget used by `Display`.
    #[must_use]
    pub fn with_preview_length(mut self, preview_length: usize) -> Self {
        self.preview_length = preview_length;
        self
    }

    /// Printed form of the value, truncated to at most `max_length` characters.
    ///
    /// Truncated previews end with `...`, which counts against the budget.
    #[must_use]
    pub fn preview(&self, max_length: usize) -> String {
        let Some(value) = &self.value else {
            return "nil".to_string();
        };
        truncate_preview(&value.print(), max_length)
    }
}

impl fmt::Display for VariableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} = {}",
            self.name,
            self.type_name,
            self.preview(self.preview_length)
        )
    }
}

fn truncate_preview(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    if max_length < ELLIPSIS.len() {
        return ELLIPSIS[..max_length].to_string();
    }
    let mut preview: String = text.chars().take(max_length - ELLIPSIS.len()).collect();
    preview.push_str(ELLIPSIS);
    preview
}

/// Read-only view of the interpreter at a pause.
///
/// Built once per pause. Frame and variable projections are computed on
/// first use and cached for the lifetime of the snapshot.
#[derive(Debug)]
pub struct ExecutionState {
    expression: Option<ExprRef>,
    context: ExecutionContext,
    depth: usize,
    preview_length: usize,
    frames: OnceLock<Vec<CallStackFrame>>,
    variables: OnceLock<Vec<VariableInfo>>,
}

impl ExecutionState {
    /// Build a snapshot for `expression`.
    ///
    /// `depth` is the live call-stack size reported by the entry hook.
    #[must_use]
    pub fn new(expression: Option<ExprRef>, context: ExecutionContext, depth: usize) -> Self {
        Self {
            expression,
            context,
            depth,
            preview_length: DEFAULT_PREVIEW_LENGTH,
            frames: OnceLock::new(),
            variables: OnceLock::new(),
        }
    }

    /// Override the preview budget used for variables.
    #[must_use]
    pub fn with_preview_length(mut self, preview_length: usize) -> Self {
        self.preview_length = preview_length;
        self
    }

    /// Expression the interpreter paused at.
    #[must_use]
    pub fn expression(&self) -> Option<&ExprRef> {
        self.expression.as_ref()
    }

    /// Location of the paused expression.
    #[must_use]
    pub fn source_info(&self) -> Option<&SourceInfo> {
        self.expression
            .as_ref()
            .and_then(|expression| expression.source_info())
    }

    /// Call depth at the pause.
    #[must_use]
    pub fn call_stack_depth(&self) -> usize {
        self.depth
    }

    /// Innermost scope at the pause.
    #[must_use]
    pub fn scope(&self) -> Option<&ScopeRef> {
        self.context.scope.as_ref()
    }

    /// Type-parameter scopes, outermost first.
    #[must_use]
    pub fn type_parameters(&self) -> &[TypeParameterScope] {
        &self.context.type_parameters
    }

    /// Call-stack frames, innermost first.
    pub fn call_stack_frames(&self) -> &[CallStackFrame] {
        self.frames.get_or_init(|| {
            self.context
                .call_stack
                .iter()
                .rev()
                .enumerate()
                .map(|(index, expression)| CallStackFrame::new(index, expression.clone()))
                .collect()
        })
    }

    /// All visible bindings, innermost scope first.
    ///
    /// Shadowed names are kept; the first occurrence of a name is the
    /// effective binding.
    pub fn variables(&self) -> &[VariableInfo] {
        self.variables.get_or_init(|| {
            let mut variables = Vec::new();
            let mut scope = self.context.scope.clone();
            let mut is_local = true;
            while let Some(current) = scope {
                for name in current.local_names() {
                    let value = current.local_value(&name);
                    variables.push(
                        VariableInfo::new(name, value, is_local)
                            .with_preview_length(self.preview_length),
                    );
                }
                scope = current.parent();
                is_local = false;
            }
            variables
        })
    }

    /// Variables for a given frame.
    ///
    /// Scopes are not captured per frame, so every frame sees the current
    /// scope chain.
    pub fn variables_in_frame(&self, _frame_index: usize) -> &[VariableInfo] {
        self.variables()
    }

    /// Resolve a single name through the scope chain.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<VariableInfo> {
        let scope = self.context.scope.as_ref()?;
        let value = scope.lookup(name)?;
        let is_local = scope.local_value(name).is_some();
        Some(
            VariableInfo::new(name, Some(value), is_local)
                .with_preview_length(self.preview_length),
        )
    }

    /// One frame per line, innermost first.
    #[must_use]
    pub fn format_call_stack(&self) -> String {
        join_lines(self.call_stack_frames())
    }

    /// One variable per line, innermost scope first.
    #[must_use]
    pub fn format_variables(&self) -> String {
        join_lines(self.variables())
    }
}

fn join_lines<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
