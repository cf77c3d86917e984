//! Test harness: a minimal tree-walking interpreter over call trees.
//!
//! [`CallTree`] describes a program as nested function applications, each
//! with optional source metadata, local bindings and type arguments.
//! [`TreeWalker`] evaluates it depth-first and drives an
//! [`InterpreterHook`] exactly as a real interpreter would, which makes it
//! the reference client for the debug session.

#![allow(missing_docs)]

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::{DebugError, DebugResult};
use crate::hook::InterpreterHook;
use crate::model::{
    function_display_name, DebugValue, ExprRef, FunctionExpression, FunctionValue, ScopeRef,
    SourceInfo, ValueRef, VariableScope,
};
use crate::state::{ExecutionContext, TypeParameterScope};

/// Runtime value used by the harness.
#[derive(Debug, Clone, PartialEq)]
pub enum TestValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Value without a known classifier, printed verbatim.
    Opaque(String),
}

impl TestValue {
    pub fn string(text: impl Into<String>) -> ValueRef {
        Arc::new(TestValue::String(text.into()))
    }

    pub fn integer(value: i64) -> ValueRef {
        Arc::new(TestValue::Integer(value))
    }

    pub fn float(value: f64) -> ValueRef {
        Arc::new(TestValue::Float(value))
    }

    pub fn boolean(value: bool) -> ValueRef {
        Arc::new(TestValue::Boolean(value))
    }

    pub fn opaque(text: impl Into<String>) -> ValueRef {
        Arc::new(TestValue::Opaque(text.into()))
    }
}

impl DebugValue for TestValue {
    fn classifier_name(&self) -> Option<SmolStr> {
        let name = match self {
            TestValue::String(_) => "String",
            TestValue::Integer(_) => "Integer",
            TestValue::Float(_) => "Float",
            TestValue::Boolean(_) => "Boolean",
            TestValue::Opaque(_) => return None,
        };
        Some(SmolStr::new_inline(name))
    }

    fn print(&self) -> String {
        match self {
            TestValue::String(text) => format!("'{text}'"),
            TestValue::Integer(value) => value.to_string(),
            TestValue::Float(value) => value.to_string(),
            TestValue::Boolean(value) => value.to_string(),
            TestValue::Opaque(text) => text.clone(),
        }
    }
}

/// Function value with an optional declared or lambda name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFunction {
    pub declared_name: Option<SmolStr>,
    pub lambda_name: Option<SmolStr>,
}

impl FunctionValue for TestFunction {
    fn declared_name(&self) -> Option<&str> {
        self.declared_name.as_deref()
    }

    fn lambda_name(&self) -> Option<&str> {
        self.lambda_name.as_deref()
    }
}

/// Function-expression used by the harness.
#[derive(Debug, Clone, Default)]
pub struct TestExpression {
    function: Option<TestFunction>,
    source: Option<SourceInfo>,
}

impl TestExpression {
    /// Application of a declared function.
    pub fn named(name: impl Into<SmolStr>) -> Self {
        Self {
            function: Some(TestFunction {
                declared_name: Some(name.into()),
                lambda_name: None,
            }),
            source: None,
        }
    }

    /// Application of a lambda.
    pub fn lambda(name: impl Into<SmolStr>) -> Self {
        Self {
            function: Some(TestFunction {
                declared_name: None,
                lambda_name: Some(name.into()),
            }),
            source: None,
        }
    }

    /// Application whose function is unresolved.
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn at(self, source_id: &str, start_line: u32, line: u32, end_line: u32) -> Self {
        self.with_source(SourceInfo::new(source_id, start_line, line, end_line))
    }

    #[must_use]
    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for TestExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(...)", function_display_name(self))
    }
}

impl FunctionExpression for TestExpression {
    fn source_info(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }

    fn function(&self) -> Option<&dyn FunctionValue> {
        self.function
            .as_ref()
            .map(|function| function as &dyn FunctionValue)
    }
}

/// Scope with ordered bindings and an optional parent.
#[derive(Debug, Default)]
pub struct TestScope {
    bindings: IndexMap<SmolStr, ValueRef>,
    parent: Option<ScopeRef>,
}

impl TestScope {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(parent: &ScopeRef) -> Self {
        Self {
            bindings: IndexMap::new(),
            parent: Some(parent.clone()),
        }
    }

    #[must_use]
    pub fn bind(mut self, name: impl Into<SmolStr>, value: ValueRef) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn into_ref(self) -> ScopeRef {
        Arc::new(self)
    }
}

impl VariableScope for TestScope {
    fn local_names(&self) -> Vec<SmolStr> {
        self.bindings.keys().cloned().collect()
    }

    fn local_value(&self, name: &str) -> Option<ValueRef> {
        self.bindings.get(name).cloned()
    }

    fn parent(&self) -> Option<ScopeRef> {
        self.parent.clone()
    }
}

/// Literal bound to a local in a call-tree program.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Literal {
    fn to_value(&self) -> ValueRef {
        match self {
            Literal::Boolean(value) => TestValue::boolean(*value),
            Literal::Integer(value) => TestValue::integer(*value),
            Literal::Float(value) => TestValue::float(*value),
            Literal::String(text) => TestValue::string(text.clone()),
        }
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(i64::from(value))
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

/// Source span of a call node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpan {
    pub file: String,
    pub line: u32,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
}

impl SourceSpan {
    fn to_source_info(&self) -> SourceInfo {
        SourceInfo::new(
            self.file.as_str(),
            self.start_line.unwrap_or(self.line),
            self.line,
            self.end_line.unwrap_or(self.line),
        )
    }
}

/// One function application in a call-tree program.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallNode {
    /// Declared function name. `None` applies an unresolved function.
    #[serde(default)]
    pub function: Option<String>,
    /// Lambda name, used when no declared name is given.
    #[serde(default)]
    pub lambda: Option<String>,
    #[serde(default)]
    pub source: Option<SourceSpan>,
    /// Locals bound in the call's scope.
    #[serde(default)]
    pub locals: IndexMap<String, Literal>,
    /// Type arguments pushed onto the type-parameter stack for the call.
    #[serde(default)]
    pub type_arguments: IndexMap<String, String>,
    #[serde(default)]
    pub children: Vec<CallNode>,
}

impl CallNode {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: Some(function.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn at(mut self, file: &str, start_line: u32, line: u32, end_line: u32) -> Self {
        self.source = Some(SourceSpan {
            file: file.to_string(),
            line,
            start_line: Some(start_line),
            end_line: Some(end_line),
        });
        self
    }

    #[must_use]
    pub fn local(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn type_argument(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.type_arguments.insert(name.into(), type_name.into());
        self
    }

    #[must_use]
    pub fn child(mut self, child: CallNode) -> Self {
        self.children.push(child);
        self
    }

    fn to_expression(&self) -> ExprRef {
        let expression = match (&self.function, &self.lambda) {
            (Some(name), _) => TestExpression::named(name.as_str()),
            (None, Some(name)) => TestExpression::lambda(name.as_str()),
            (None, None) => TestExpression::anonymous(),
        };
        match &self.source {
            Some(span) => Arc::new(expression.with_source(span.to_source_info())),
            None => Arc::new(expression),
        }
    }
}

/// A call-tree program.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallTree {
    pub main: CallNode,
}

impl CallTree {
    pub fn new(main: CallNode) -> Self {
        Self { main }
    }

    pub fn from_toml_str(text: &str) -> DebugResult<Self> {
        toml::from_str(text)
            .map_err(|err| DebugError::InvalidConfig(format!("call tree: {err}").into()))
    }

    pub fn load(path: impl AsRef<Path>) -> DebugResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            DebugError::InvalidConfig(format!("{}: {err}", path.display()).into())
        })?;
        Self::from_toml_str(&text)
    }
}

/// Call node with its expression built once, so pauses see stable identities.
#[derive(Debug)]
struct Node {
    expression: ExprRef,
    locals: Vec<(SmolStr, ValueRef)>,
    type_arguments: Option<TypeParameterScope>,
    children: Vec<Node>,
}

impl Node {
    fn build(call: &CallNode) -> Self {
        let type_arguments = (!call.type_arguments.is_empty()).then(|| {
            call.type_arguments
                .iter()
                .map(|(name, type_name)| (SmolStr::new(name), TestValue::opaque(type_name.clone())))
                .collect()
        });
        Self {
            expression: call.to_expression(),
            locals: call
                .locals
                .iter()
                .map(|(name, literal)| (SmolStr::new(name), literal.to_value()))
                .collect(),
            type_arguments,
            children: call.children.iter().map(Node::build).collect(),
        }
    }
}

#[derive(Default)]
struct Frames {
    call_stack: Vec<ExprRef>,
    type_parameters: Vec<TypeParameterScope>,
}

/// Depth-first evaluator for a [`CallTree`].
///
/// Each call gets a fresh scope whose parent is the caller's scope.
#[derive(Debug)]
pub struct TreeWalker {
    root: Node,
}

impl TreeWalker {
    pub fn new(tree: &CallTree) -> Self {
        Self {
            root: Node::build(&tree.main),
        }
    }

    /// Expression of the program's entry call.
    pub fn main_expression(&self) -> &ExprRef {
        &self.root.expression
    }

    /// Evaluate the program, returning the number of calls evaluated.
    ///
    /// Stops at the first hook error; `on_end` is reported either way.
    pub fn run(&self, hook: &dyn InterpreterHook) -> DebugResult<usize> {
        hook.on_start(&self.root.expression);
        let mut frames = Frames::default();
        let result = self.walk(&self.root, None, None, &mut frames, hook);
        hook.on_end(&self.root.expression);
        result
    }

    fn walk(
        &self,
        node: &Node,
        parent: Option<&ExprRef>,
        scope: Option<&ScopeRef>,
        frames: &mut Frames,
        hook: &dyn InterpreterHook,
    ) -> DebugResult<usize> {
        let mut call_scope = match scope {
            Some(scope) => TestScope::child(scope),
            None => TestScope::root(),
        };
        for (name, value) in &node.locals {
            call_scope = call_scope.bind(name.clone(), value.clone());
        }
        let call_scope = call_scope.into_ref();

        frames.call_stack.push(node.expression.clone());
        if let Some(arguments) = &node.type_arguments {
            frames.type_parameters.push(arguments.clone());
        }
        hook.capture_context(ExecutionContext::new(
            Some(call_scope.clone()),
            frames.call_stack.clone(),
            frames.type_parameters.clone(),
        ));
        hook.on_entry(&node.expression, parent, frames.call_stack.len())?;

        let mut evaluated = 1;
        for child in &node.children {
            evaluated += self.walk(
                child,
                Some(&node.expression),
                Some(&call_scope),
                frames,
                hook,
            )?;
        }

        hook.on_exit(&node.expression);
        if node.type_arguments.is_some() {
            frames.type_parameters.pop();
        }
        frames.call_stack.pop();
        Ok(evaluated)
    }
}
