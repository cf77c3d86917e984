//! Interpreter-facing data contracts.
//!
//! The debugger never builds expressions, values or scopes itself; it reads
//! them through the traits in this module. Everything handed over must be
//! `Send + Sync` because a paused snapshot is inspected from the controller
//! thread while the interpreter thread is parked.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

/// Shared handle to a function-expression.
pub type ExprRef = Arc<dyn FunctionExpression>;

/// Shared handle to a runtime value.
pub type ValueRef = Arc<dyn DebugValue>;

/// Shared handle to a variable scope.
pub type ScopeRef = Arc<dyn VariableScope>;

/// Source location attached to an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceInfo {
    /// Source identifier (usually a path).
    pub source_id: SmolStr,
    /// First line covered by the expression.
    pub start_line: u32,
    /// Line the expression is reported at.
    pub line: u32,
    /// Last line covered by the expression.
    pub end_line: u32,
}

impl SourceInfo {
    /// Location covering `start_line..=end_line`, reported at `line`.
    #[must_use]
    pub fn new(source_id: impl Into<SmolStr>, start_line: u32, line: u32, end_line: u32) -> Self {
        Self {
            source_id: source_id.into(),
            start_line,
            line,
            end_line,
        }
    }

    /// Location covering a single line.
    #[must_use]
    pub fn single_line(source_id: impl Into<SmolStr>, line: u32) -> Self {
        Self::new(source_id, line, line, line)
    }

    /// Check whether `line` falls within the inclusive line range.
    #[must_use]
    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.line)
    }
}

/// The function value a function-expression applies.
pub trait FunctionValue: Send + Sync {
    /// Declared name of the function, if it has one.
    fn declared_name(&self) -> Option<&str>;

    /// Synthetic name assigned to lambdas and other anonymous functions.
    fn lambda_name(&self) -> Option<&str> {
        None
    }
}

/// A single function application node, the unit the interpreter hook fires on.
pub trait FunctionExpression: fmt::Display + fmt::Debug + Send + Sync {
    /// Source location of the expression, if known.
    fn source_info(&self) -> Option<&SourceInfo>;

    /// The function being applied, if resolved.
    fn function(&self) -> Option<&dyn FunctionValue>;
}

/// A runtime value bound to a variable.
pub trait DebugValue: fmt::Debug + Send + Sync {
    /// Name of the runtime classifier (type) of the value.
    fn classifier_name(&self) -> Option<SmolStr>;

    /// Printable form of the value.
    fn print(&self) -> String;
}

/// One lexical scope in a scope chain.
pub trait VariableScope: fmt::Debug + Send + Sync {
    /// Names bound directly in this scope, in binding order.
    fn local_names(&self) -> Vec<SmolStr>;

    /// Value bound directly in this scope.
    fn local_value(&self, name: &str) -> Option<ValueRef>;

    /// Enclosing scope.
    fn parent(&self) -> Option<ScopeRef>;

    /// Resolve a name through the chain; the innermost binding wins.
    fn lookup(&self, name: &str) -> Option<ValueRef> {
        if let Some(value) = self.local_value(name) {
            return Some(value);
        }
        let mut scope = self.parent();
        while let Some(current) = scope {
            if let Some(value) = current.local_value(name) {
                return Some(value);
            }
            scope = current.parent();
        }
        None
    }
}

/// Display name for a function-expression.
///
/// Falls back from the declared name to the lambda name, then to
/// `<anonymous>`.
#[must_use]
pub fn function_display_name(expression: &dyn FunctionExpression) -> SmolStr {
    expression
        .function()
        .and_then(|function| function.declared_name().or_else(|| function.lambda_name()))
        .map_or_else(|| SmolStr::new_inline("<anonymous>"), SmolStr::new)
}

/// Declared name used for function breakpoint matching.
pub(crate) fn declared_function_name(expression: &dyn FunctionExpression) -> Option<&str> {
    expression
        .function()
        .and_then(|function| function.declared_name())
}
