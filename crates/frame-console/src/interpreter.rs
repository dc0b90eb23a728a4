//! Tree-walking evaluation of parsed console statements.
//!
//! Statements run directly over the ruff AST against a [`Scope`]: the frame's namespaces for
//! console-level code, or a fresh local namespace for each function call. Exceptions unwind as
//! `Err(Exception)`; each call boundary (and the console level itself) records a traceback frame
//! as the exception leaves it.

use std::{rc::Rc, str::FromStr};

use ruff_python_ast::{self as ast, BoolOp, ConversionFlag, Expr, Number, Stmt};
use ruff_text_size::Ranged;

use crate::{
    builtins::Builtin,
    config::ConsoleConfig,
    exception::{ExcType, Exception, RunResult, StackFrame},
    format::format_value,
    frame::Namespace,
    function::{Function, FunctionBody, Param, Signature},
    io::ConsoleIo,
    methods,
    ops::{self, SliceBounds},
    parse::{ParsedSource, SourceMap},
    value::{BoundMethod, Dict, Value},
};

/// How a block of statements finished.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// The namespaces and position of the code currently running.
pub(crate) struct Scope<'s> {
    globals: &'s mut Namespace,
    /// `None` when the locals are the globals (a module-level frame).
    locals: Option<&'s mut Namespace>,
    /// Snapshot of an enclosing function's locals, for nested functions.
    enclosing: Option<&'s Namespace>,
    /// Names declared `global` in this scope.
    declared_globals: Vec<String>,
    source: Rc<SourceMap>,
    name: String,
    line: usize,
    /// Console-level code, as opposed to a function body.
    is_console: bool,
}

impl<'s> Scope<'s> {
    pub(crate) fn console(globals: &'s mut Namespace, locals: Option<&'s mut Namespace>, source: Rc<SourceMap>) -> Self {
        Self {
            globals,
            locals,
            enclosing: None,
            declared_globals: Vec::new(),
            source,
            name: "<module>".to_owned(),
            line: 1,
            is_console: true,
        }
    }

    fn function(globals: &'s mut Namespace, locals: &'s mut Namespace, function: &'s Function) -> Self {
        Self {
            globals,
            locals: Some(locals),
            enclosing: function.enclosing.as_ref(),
            declared_globals: Vec::new(),
            source: Rc::clone(&function.source),
            name: function.name.clone(),
            line: 1,
            is_console: false,
        }
    }

    /// The namespace assignments bind into.
    pub(crate) fn local_namespace(&self) -> &Namespace {
        self.locals.as_deref().unwrap_or(&*self.globals)
    }

    pub(crate) fn globals(&self) -> &Namespace {
        &*self.globals
    }

    fn is_declared_global(&self, name: &str) -> bool {
        self.declared_globals.iter().any(|declared| declared == name)
    }

    /// Resolves a name through locals, enclosing function, globals and builtins.
    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        if !self.is_declared_global(name) {
            if let Some(value) = self.locals.as_deref().and_then(|locals| locals.get(name)) {
                return Some(value.clone());
            }
            if let Some(value) = self.enclosing.and_then(|enclosing| enclosing.get(name)) {
                return Some(value.clone());
            }
        }
        if let Some(value) = self.globals.get(name) {
            return Some(value.clone());
        }
        lookup_builtin(name)
    }

    fn bind(&mut self, name: &str, value: Value) {
        let target = match &mut self.locals {
            Some(locals) if !self.declared_globals.iter().any(|declared| declared == name) => &mut **locals,
            _ => &mut *self.globals,
        };
        target.insert(name.to_owned(), value);
    }

    /// Removes a binding, returning whether it existed.
    fn unbind(&mut self, name: &str) -> bool {
        let target = match &mut self.locals {
            Some(locals) if !self.declared_globals.iter().any(|declared| declared == name) => &mut **locals,
            _ => &mut *self.globals,
        };
        target.shift_remove(name).is_some()
    }

    /// The traceback entry for the current position.
    fn stack_frame(&self) -> StackFrame {
        StackFrame {
            filename: self.source.filename().to_owned(),
            line: self.line,
            name: self.name.clone(),
        }
    }

    /// Locals to capture for functions defined in this scope.
    fn closure_snapshot(&self) -> Option<Namespace> {
        if self.is_console {
            return None;
        }
        let mut snapshot = self.enclosing.cloned().unwrap_or_default();
        if let Some(locals) = self.locals.as_deref() {
            snapshot.extend(locals.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Some(snapshot)
    }
}

/// Builtin functions, types and exception classes by name.
fn lookup_builtin(name: &str) -> Option<Value> {
    if let Ok(builtin) = Builtin::from_str(name) {
        return Some(Value::Builtin(builtin));
    }
    ExcType::from_str(name).ok().map(Value::ExcClass)
}

/// Evaluator state for one console command.
pub(crate) struct Interpreter<'a> {
    pub(crate) io: ConsoleIo<'a>,
    max_depth: usize,
    echo: bool,
    depth: usize,
    /// Exceptions whose `except` blocks are running, innermost last; the target of a bare `raise`.
    handling: Vec<Exception>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(io: ConsoleIo<'a>, config: &ConsoleConfig) -> Self {
        Self {
            io,
            max_depth: config.max_recursion_depth,
            echo: config.echo_expressions,
            depth: 0,
            handling: Vec::new(),
        }
    }

    /// Runs a compiled console statement against the frame's namespaces.
    pub(crate) fn run(
        &mut self,
        parsed: &ParsedSource,
        globals: &mut Namespace,
        locals: Option<&mut Namespace>,
    ) -> RunResult<()> {
        let mut scope = Scope::console(globals, locals, Rc::clone(&parsed.source));
        match self.exec_block(&parsed.body, &mut scope) {
            Ok(_) => Ok(()),
            Err(mut exc) => {
                exc.push_frame(scope.stack_frame());
                Err(exc)
            }
        }
    }

    // ============================================================================
    // Statements
    // ============================================================================

    fn exec_block(&mut self, body: &[Stmt], scope: &mut Scope<'_>) -> RunResult<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &mut Scope<'_>) -> RunResult<Flow> {
        let line = scope.source.line_of_node(stmt);
        scope.line = line;
        match stmt {
            Stmt::Expr(stmt) => {
                let value = self.eval(&stmt.value, scope)?;
                if scope.is_console && self.echo && !matches!(value, Value::None) {
                    let echoed = format!("{}\n", value.repr());
                    self.io.stdout.write(&echoed);
                }
            }
            Stmt::Assign(stmt) => {
                let value = self.eval(&stmt.value, scope)?;
                for target in &stmt.targets {
                    self.assign(target, value.clone(), scope)?;
                }
            }
            Stmt::AugAssign(stmt) => self.aug_assign(stmt, scope)?,
            Stmt::AnnAssign(stmt) => {
                if let Some(value) = &stmt.value {
                    let value = self.eval(value, scope)?;
                    self.assign(&stmt.target, value, scope)?;
                }
            }
            Stmt::If(stmt) => {
                if self.eval(&stmt.test, scope)?.is_truthy() {
                    return self.exec_block(&stmt.body, scope);
                }
                for clause in &stmt.elif_else_clauses {
                    let taken = match &clause.test {
                        Some(test) => self.eval(test, scope)?.is_truthy(),
                        None => true,
                    };
                    if taken {
                        return self.exec_block(&clause.body, scope);
                    }
                }
            }
            Stmt::While(stmt) => loop {
                scope.line = line;
                if !self.eval(&stmt.test, scope)?.is_truthy() {
                    return self.exec_block(&stmt.orelse, scope);
                }
                match self.exec_block(&stmt.body, scope)? {
                    Flow::Break => break,
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Normal | Flow::Continue => {}
                }
            },
            Stmt::For(stmt) => {
                if stmt.is_async {
                    return Err(not_supported("'async for' loops"));
                }
                let iterable = self.eval(&stmt.iter, scope)?;
                for item in iterable.iter_values()? {
                    self.assign(&stmt.target, item, scope)?;
                    match self.exec_block(&stmt.body, scope)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                return self.exec_block(&stmt.orelse, scope);
            }
            Stmt::Break(_) => return Ok(Flow::Break),
            Stmt::Continue(_) => return Ok(Flow::Continue),
            Stmt::Pass(_) => {}
            Stmt::Return(stmt) => {
                let value = match &stmt.value {
                    Some(value) => self.eval(value, scope)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::FunctionDef(def) => self.define_function(def, scope)?,
            Stmt::Delete(stmt) => {
                for target in &stmt.targets {
                    self.delete(target, scope)?;
                }
            }
            Stmt::Raise(stmt) => {
                let exc = match &stmt.exc {
                    None => self
                        .handling
                        .last()
                        .cloned()
                        .ok_or_else(|| ExcType::RuntimeError.msg("No active exception to reraise"))?,
                    Some(exc) => {
                        let value = self.eval(exc, scope)?;
                        to_exception(&value)?
                    }
                };
                return Err(exc);
            }
            Stmt::Assert(stmt) => {
                if !self.eval(&stmt.test, scope)?.is_truthy() {
                    let args = match &stmt.msg {
                        Some(msg) => vec![self.eval(msg, scope)?],
                        None => Vec::new(),
                    };
                    return Err(Exception::with_args(ExcType::AssertionError, args));
                }
            }
            Stmt::Try(stmt) => return self.exec_try(stmt, scope),
            Stmt::Global(stmt) => {
                for name in &stmt.names {
                    scope.declared_globals.push(name.as_str().to_owned());
                }
            }
            other => return Err(not_supported(statement_kind(other))),
        }
        Ok(Flow::Normal)
    }

    fn exec_try(&mut self, stmt: &ast::StmtTry, scope: &mut Scope<'_>) -> RunResult<Flow> {
        if stmt.is_star {
            return Err(not_supported("'except*' clauses"));
        }
        let outcome = match self.exec_block(&stmt.body, scope) {
            Ok(Flow::Normal) => self.exec_block(&stmt.orelse, scope),
            Ok(flow) => Ok(flow),
            Err(exc) => self.handle_exception(exc, &stmt.handlers, scope),
        };
        if stmt.finalbody.is_empty() {
            return outcome;
        }
        match self.exec_block(&stmt.finalbody, scope)? {
            Flow::Normal => outcome,
            flow => Ok(flow),
        }
    }

    fn handle_exception(
        &mut self,
        exc: Exception,
        handlers: &[ast::ExceptHandler],
        scope: &mut Scope<'_>,
    ) -> RunResult<Flow> {
        for handler in handlers {
            let ast::ExceptHandler::ExceptHandler(handler) = handler;
            scope.line = scope.source.line_of_node(handler);
            let matches = match &handler.type_ {
                None => true,
                Some(class) => {
                    let class = self.eval(class, scope)?;
                    exception_matches(&exc, &class)?
                }
            };
            if !matches {
                continue;
            }
            if let Some(name) = &handler.name {
                scope.bind(name.as_str(), Value::Exception(Rc::new(exc.clone())));
            }
            self.handling.push(exc);
            let result = self.exec_block(&handler.body, scope);
            self.handling.pop();
            if let Some(name) = &handler.name {
                scope.unbind(name.as_str());
            }
            return result;
        }
        Err(exc)
    }

    fn define_function(&mut self, def: &ast::StmtFunctionDef, scope: &mut Scope<'_>) -> RunResult<()> {
        if def.is_async {
            return Err(not_supported("'async def' functions"));
        }
        let decorators = def
            .decorator_list
            .iter()
            .map(|decorator| self.eval(&decorator.expression, scope))
            .collect::<RunResult<Vec<_>>>()?;
        let function = Function {
            name: def.name.as_str().to_owned(),
            signature: self.signature(&def.parameters, scope)?,
            body: FunctionBody::Block(def.body.to_vec()),
            source: Rc::clone(&scope.source),
            enclosing: scope.closure_snapshot(),
        };
        let mut value = Value::Function(Rc::new(function));
        for decorator in decorators.iter().rev() {
            value = self.call_value(decorator, vec![value], Vec::new(), scope)?;
        }
        scope.bind(def.name.as_str(), value);
        Ok(())
    }

    /// Builds a signature, evaluating parameter defaults now.
    fn signature(&mut self, params: &ast::Parameters, scope: &mut Scope<'_>) -> RunResult<Signature> {
        let mut eval_params = |params: &[ast::ParameterWithDefault]| -> RunResult<Vec<Param>> {
            params
                .iter()
                .map(|param| -> RunResult<Param> {
                    Ok(Param {
                        name: param.parameter.name.as_str().to_owned(),
                        default: match &param.default {
                            Some(default) => Some(self.eval(default, scope)?),
                            None => None,
                        },
                    })
                })
                .collect()
        };
        let mut positional = eval_params(&params.posonlyargs)?;
        positional.extend(eval_params(&params.args)?);
        let kwonly = eval_params(&params.kwonlyargs)?;
        Ok(Signature {
            positional,
            posonly_count: params.posonlyargs.len(),
            var_args: params.vararg.as_ref().map(|p| p.name.as_str().to_owned()),
            kwonly,
            var_kwargs: params.kwarg.as_ref().map(|p| p.name.as_str().to_owned()),
        })
    }

    // ============================================================================
    // Assignment targets
    // ============================================================================

    fn assign(&mut self, target: &Expr, value: Value, scope: &mut Scope<'_>) -> RunResult<()> {
        match target {
            Expr::Name(name) => {
                scope.bind(name.id.as_str(), value);
                Ok(())
            }
            Expr::Tuple(ast::ExprTuple { elts, .. }) | Expr::List(ast::ExprList { elts, .. }) => {
                self.unpack(elts, value, scope)
            }
            Expr::Subscript(subscript) => {
                let container = self.eval(&subscript.value, scope)?;
                if let Expr::Slice(slice) = &*subscript.slice {
                    let bounds = self.eval_slice(slice, scope)?;
                    ops::set_slice(&container, bounds, &value)
                } else {
                    let index = self.eval(&subscript.slice, scope)?;
                    ops::set_item(&container, &index, value)
                }
            }
            Expr::Attribute(attribute) => {
                let object = self.eval(&attribute.value, scope)?;
                Err(no_attribute(&object, attribute.attr.as_str()))
            }
            _ => Err(ExcType::SyntaxError.msg("cannot assign to expression")),
        }
    }

    fn unpack(&mut self, targets: &[Expr], value: Value, scope: &mut Scope<'_>) -> RunResult<()> {
        let items = value.to_vec().map_err(|_| {
            ExcType::TypeError.msg(format!("cannot unpack non-iterable {} object", value.type_name()))
        })?;
        let star = targets.iter().position(|target| matches!(target, Expr::Starred(_)));
        let Some(star) = star else {
            if items.len() != targets.len() {
                let message = if items.len() > targets.len() {
                    format!("too many values to unpack (expected {})", targets.len())
                } else {
                    format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )
                };
                return Err(ExcType::ValueError.msg(message));
            }
            for (target, item) in targets.iter().zip(items) {
                self.assign(target, item, scope)?;
            }
            return Ok(());
        };
        let required = targets.len() - 1;
        if items.len() < required {
            return Err(ExcType::ValueError.msg(format!(
                "not enough values to unpack (expected at least {required}, got {})",
                items.len()
            )));
        }
        let after = targets.len() - star - 1;
        let mut items = items;
        let tail = items.split_off(items.len() - after);
        let middle = items.split_off(star);
        for (target, item) in targets[..star].iter().zip(items) {
            self.assign(target, item, scope)?;
        }
        if let Expr::Starred(starred) = &targets[star] {
            self.assign(&starred.value, Value::list(middle), scope)?;
        }
        for (target, item) in targets[star + 1..].iter().zip(tail) {
            self.assign(target, item, scope)?;
        }
        Ok(())
    }

    fn aug_assign(&mut self, stmt: &ast::StmtAugAssign, scope: &mut Scope<'_>) -> RunResult<()> {
        match &*stmt.target {
            Expr::Name(name) => {
                let current = self.load_name(name.id.as_str(), scope)?;
                let rhs = self.eval(&stmt.value, scope)?;
                let result = inplace_op(stmt.op, &current, &rhs)?;
                scope.bind(name.id.as_str(), result);
                Ok(())
            }
            Expr::Subscript(subscript) => {
                let container = self.eval(&subscript.value, scope)?;
                let index = self.eval(&subscript.slice, scope)?;
                let current = ops::get_item(&container, &index)?;
                let rhs = self.eval(&stmt.value, scope)?;
                let result = inplace_op(stmt.op, &current, &rhs)?;
                ops::set_item(&container, &index, result)
            }
            Expr::Attribute(attribute) => {
                let object = self.eval(&attribute.value, scope)?;
                Err(no_attribute(&object, attribute.attr.as_str()))
            }
            _ => Err(ExcType::SyntaxError.msg("illegal expression for augmented assignment")),
        }
    }

    fn delete(&mut self, target: &Expr, scope: &mut Scope<'_>) -> RunResult<()> {
        match target {
            Expr::Name(name) => {
                if scope.unbind(name.id.as_str()) {
                    Ok(())
                } else {
                    Err(name_error(name.id.as_str()))
                }
            }
            Expr::Tuple(ast::ExprTuple { elts, .. }) | Expr::List(ast::ExprList { elts, .. }) => {
                elts.iter().try_for_each(|target| self.delete(target, scope))
            }
            Expr::Subscript(subscript) => {
                let container = self.eval(&subscript.value, scope)?;
                if let Expr::Slice(slice) = &*subscript.slice {
                    let bounds = self.eval_slice(slice, scope)?;
                    ops::del_slice(&container, bounds)
                } else {
                    let index = self.eval(&subscript.slice, scope)?;
                    ops::del_item(&container, &index)
                }
            }
            Expr::Attribute(attribute) => {
                let object = self.eval(&attribute.value, scope)?;
                Err(no_attribute(&object, attribute.attr.as_str()))
            }
            _ => Err(ExcType::SyntaxError.msg("cannot delete expression")),
        }
    }

    // ============================================================================
    // Expressions
    // ============================================================================

    pub(crate) fn eval(&mut self, expr: &Expr, scope: &mut Scope<'_>) -> RunResult<Value> {
        match expr {
            Expr::NumberLiteral(number) => match &number.value {
                Number::Int(int) => int
                    .as_i64()
                    .map(Value::Int)
                    .ok_or_else(|| ExcType::OverflowError.msg("integer literal too large")),
                Number::Float(float) => Ok(Value::Float(*float)),
                Number::Complex { .. } => Err(not_supported("complex numbers")),
            },
            Expr::StringLiteral(string) => Ok(Value::Str(string.value.to_string())),
            Expr::BooleanLiteral(boolean) => Ok(Value::Bool(boolean.value)),
            Expr::NoneLiteral(_) => Ok(Value::None),
            Expr::FString(fstring) => self.eval_fstring(&fstring.value, scope),
            Expr::Name(name) => self.load_name(name.id.as_str(), scope),
            Expr::BinOp(binop) => {
                let left = self.eval(&binop.left, scope)?;
                let right = self.eval(&binop.right, scope)?;
                ops::binary_op(binop.op, &left, &right)
            }
            Expr::UnaryOp(unary) => {
                let operand = self.eval(&unary.operand, scope)?;
                ops::unary_op(unary.op, &operand)
            }
            Expr::BoolOp(boolop) => {
                let mut result = Value::None;
                for value in &boolop.values {
                    result = self.eval(value, scope)?;
                    let decided = match boolop.op {
                        BoolOp::And => !result.is_truthy(),
                        BoolOp::Or => result.is_truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(result)
            }
            Expr::Compare(compare) => {
                let mut left = self.eval(&compare.left, scope)?;
                for (op, right) in compare.ops.iter().zip(&compare.comparators) {
                    let right = self.eval(right, scope)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::If(ternary) => {
                if self.eval(&ternary.test, scope)?.is_truthy() {
                    self.eval(&ternary.body, scope)
                } else {
                    self.eval(&ternary.orelse, scope)
                }
            }
            Expr::Named(named) => {
                let value = self.eval(&named.value, scope)?;
                self.assign(&named.target, value.clone(), scope)?;
                Ok(value)
            }
            Expr::Call(call) => self.eval_call(call, scope),
            Expr::Attribute(attribute) => {
                let object = self.eval(&attribute.value, scope)?;
                get_attribute(&object, attribute.attr.as_str())
            }
            Expr::Subscript(subscript) => {
                let container = self.eval(&subscript.value, scope)?;
                if let Expr::Slice(slice) = &*subscript.slice {
                    let bounds = self.eval_slice(slice, scope)?;
                    ops::get_slice(&container, bounds)
                } else {
                    let index = self.eval(&subscript.slice, scope)?;
                    ops::get_item(&container, &index)
                }
            }
            Expr::List(list) => Ok(Value::list(self.eval_elements(&list.elts, scope)?)),
            Expr::Tuple(tuple) => Ok(Value::tuple(self.eval_elements(&tuple.elts, scope)?)),
            Expr::Dict(dict) => self.eval_dict(dict, scope),
            Expr::ListComp(comp) => self.comprehension(Produce::List(&comp.elt), &comp.generators, scope),
            // Generators are evaluated eagerly; every consumer in the console accepts a list.
            Expr::Generator(comp) => self.comprehension(Produce::List(&comp.elt), &comp.generators, scope),
            Expr::DictComp(comp) => {
                self.comprehension(Produce::Dict(&comp.key, &comp.value), &comp.generators, scope)
            }
            Expr::Lambda(lambda) => {
                let signature = match &lambda.parameters {
                    Some(params) => self.signature(params, scope)?,
                    None => Signature::default(),
                };
                Ok(Value::Function(Rc::new(Function {
                    name: "<lambda>".to_owned(),
                    signature,
                    body: FunctionBody::Lambda(lambda.body.clone()),
                    source: Rc::clone(&scope.source),
                    enclosing: scope.closure_snapshot(),
                })))
            }
            Expr::Starred(_) => Err(ExcType::SyntaxError.msg("can't use starred expression here")),
            other => Err(not_supported(expression_kind(other))),
        }
    }

    fn load_name(&mut self, name: &str, scope: &Scope<'_>) -> RunResult<Value> {
        scope.lookup(name).ok_or_else(|| name_error(name))
    }

    /// Evaluates list/tuple elements, expanding `*iterable`.
    fn eval_elements(&mut self, elts: &[Expr], scope: &mut Scope<'_>) -> RunResult<Vec<Value>> {
        let mut items = Vec::with_capacity(elts.len());
        for elt in elts {
            if let Expr::Starred(starred) = elt {
                let iterable = self.eval(&starred.value, scope)?;
                items.extend(iterable.iter_values()?);
            } else {
                items.push(self.eval(elt, scope)?);
            }
        }
        Ok(items)
    }

    fn eval_dict(&mut self, dict: &ast::ExprDict, scope: &mut Scope<'_>) -> RunResult<Value> {
        let mut result = Dict::new();
        for item in &dict.items {
            match &item.key {
                Some(key) => {
                    let key = self.eval(key, scope)?;
                    let value = self.eval(&item.value, scope)?;
                    result.insert(key, value)?;
                }
                None => {
                    let Value::Dict(other) = self.eval(&item.value, scope)? else {
                        return Err(ExcType::TypeError.msg("'**' argument must be a mapping"));
                    };
                    for (key, value) in other.borrow().iter() {
                        result.insert(key.clone(), value.clone())?;
                    }
                }
            }
        }
        Ok(Value::dict(result))
    }

    fn eval_slice(&mut self, slice: &ast::ExprSlice, scope: &mut Scope<'_>) -> RunResult<SliceBounds> {
        let mut bound = |expr: &Option<Box<Expr>>| -> RunResult<Option<Value>> {
            expr.as_deref().map(|expr| self.eval(expr, scope)).transpose()
        };
        let lower = bound(&slice.lower)?;
        let upper = bound(&slice.upper)?;
        let step = bound(&slice.step)?;
        SliceBounds::from_values(lower, upper, step)
    }

    fn eval_fstring(&mut self, value: &ast::FStringValue, scope: &mut Scope<'_>) -> RunResult<Value> {
        let mut out = String::new();
        for part in value {
            match part {
                ast::FStringPart::Literal(literal) => out.push_str(&literal.value),
                ast::FStringPart::FString(fstring) => self.write_interpolated(&fstring.elements, scope, &mut out)?,
            }
        }
        Ok(Value::Str(out))
    }

    fn write_interpolated(
        &mut self,
        elements: &ast::InterpolatedStringElements,
        scope: &mut Scope<'_>,
        out: &mut String,
    ) -> RunResult<()> {
        for element in elements {
            match element {
                ast::InterpolatedStringElement::Literal(literal) => out.push_str(&literal.value),
                ast::InterpolatedStringElement::Interpolation(interpolation) => {
                    if let Some(debug) = &interpolation.debug_text {
                        out.push_str(debug.leading());
                        out.push_str(scope.source.text_of(interpolation.expression.range()));
                        out.push_str(debug.trailing());
                    }
                    let value = self.eval(&interpolation.expression, scope)?;
                    let mut spec = String::new();
                    if let Some(format_spec) = &interpolation.format_spec {
                        self.write_interpolated(&format_spec.elements, scope, &mut spec)?;
                    }
                    let value = match interpolation.conversion {
                        ConversionFlag::Repr | ConversionFlag::Ascii => Value::Str(value.repr()),
                        ConversionFlag::Str => Value::Str(value.to_string()),
                        ConversionFlag::None if interpolation.debug_text.is_some() && spec.is_empty() => {
                            Value::Str(value.repr())
                        }
                        ConversionFlag::None => value,
                    };
                    out.push_str(&format_value(&value, &spec)?);
                }
            }
        }
        Ok(())
    }

    fn comprehension(
        &mut self,
        produce: Produce<'_>,
        generators: &[ast::Comprehension],
        scope: &mut Scope<'_>,
    ) -> RunResult<Value> {
        let mut names = Vec::new();
        for generator in generators {
            target_names(&generator.target, &mut names);
        }
        let saved: Vec<(String, Option<Value>)> = names
            .into_iter()
            .map(|name| {
                let previous = scope.local_namespace().get(&name).cloned();
                (name, previous)
            })
            .collect();
        let mut collected = Collected::default();
        let result = self.comprehension_loop(produce, generators, scope, &mut collected);
        for (name, previous) in saved {
            match previous {
                Some(value) => scope.bind(&name, value),
                None => {
                    scope.unbind(&name);
                }
            }
        }
        result?;
        Ok(match produce {
            Produce::List(_) => Value::list(collected.items),
            Produce::Dict(..) => Value::dict(collected.dict),
        })
    }

    fn comprehension_loop(
        &mut self,
        produce: Produce<'_>,
        generators: &[ast::Comprehension],
        scope: &mut Scope<'_>,
        collected: &mut Collected,
    ) -> RunResult<()> {
        let Some((generator, rest)) = generators.split_first() else {
            match produce {
                Produce::List(elt) => collected.items.push(self.eval(elt, scope)?),
                Produce::Dict(key, value) => {
                    let key = self.eval(key, scope)?;
                    let value = self.eval(value, scope)?;
                    collected.dict.insert(key, value)?;
                }
            }
            return Ok(());
        };
        if generator.is_async {
            return Err(not_supported("asynchronous comprehensions"));
        }
        let iterable = self.eval(&generator.iter, scope)?;
        'items: for item in iterable.iter_values()? {
            self.assign(&generator.target, item, scope)?;
            for condition in &generator.ifs {
                if !self.eval(condition, scope)?.is_truthy() {
                    continue 'items;
                }
            }
            self.comprehension_loop(produce, rest, scope, collected)?;
        }
        Ok(())
    }

    // ============================================================================
    // Calls
    // ============================================================================

    fn eval_call(&mut self, call: &ast::ExprCall, scope: &mut Scope<'_>) -> RunResult<Value> {
        let callee = self.eval(&call.func, scope)?;
        let args = self.eval_elements(&call.arguments.args, scope)?;
        let mut kwargs = Vec::with_capacity(call.arguments.keywords.len());
        for keyword in &call.arguments.keywords {
            let value = self.eval(&keyword.value, scope)?;
            match &keyword.arg {
                Some(name) => kwargs.push((name.as_str().to_owned(), value)),
                None => {
                    let Value::Dict(dict) = &value else {
                        return Err(ExcType::TypeError.msg(format!(
                            "argument after ** must be a mapping, not {}",
                            value.type_name()
                        )));
                    };
                    for (key, value) in dict.borrow().iter() {
                        let Value::Str(key) = key else {
                            return Err(ExcType::TypeError.msg("keywords must be strings"));
                        };
                        kwargs.push((key.clone(), value.clone()));
                    }
                }
            }
        }
        self.call_value(&callee, args, kwargs, scope)
    }

    /// Calls any callable value.
    pub(crate) fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        scope: &mut Scope<'_>,
    ) -> RunResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args, kwargs, scope),
            Value::Builtin(builtin) => self.call_builtin(*builtin, args, kwargs, scope),
            Value::Method(method) => self.call_method(&method.receiver, &method.name, args, kwargs, scope),
            Value::ExcClass(exc_type) => {
                if let Some((name, _)) = kwargs.first() {
                    return Err(ExcType::TypeError.msg(format!("{exc_type}() takes no keyword arguments: '{name}'")));
                }
                Ok(Value::Exception(Rc::new(Exception::with_args(*exc_type, args))))
            }
            other => Err(ExcType::TypeError.msg(format!("'{}' object is not callable", other.type_name()))),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        scope: &mut Scope<'_>,
    ) -> RunResult<Value> {
        if self.depth >= self.max_depth {
            return Err(ExcType::RecursionError.msg("maximum recursion depth exceeded"));
        }
        let function = Rc::clone(function);
        let mut locals = function.signature.bind(&function.name, args, kwargs)?;
        let mut callee = Scope::function(&mut *scope.globals, &mut locals, &function);
        self.depth += 1;
        let result = match &function.body {
            FunctionBody::Block(body) => self.exec_block(body, &mut callee).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => Value::None,
            }),
            FunctionBody::Lambda(body) => {
                callee.line = callee.source.line_of_node(&**body);
                self.eval(body, &mut callee)
            }
        };
        self.depth -= 1;
        result.map_err(|mut exc| {
            exc.push_frame(callee.stack_frame());
            exc
        })
    }
}

/// What a comprehension builds.
#[derive(Clone, Copy)]
enum Produce<'e> {
    List(&'e Expr),
    Dict(&'e Expr, &'e Expr),
}

#[derive(Default)]
struct Collected {
    items: Vec<Value>,
    dict: Dict,
}

/// Names bound by an assignment target.
fn target_names(target: &Expr, names: &mut Vec<String>) {
    match target {
        Expr::Name(name) => names.push(name.id.as_str().to_owned()),
        Expr::Tuple(ast::ExprTuple { elts, .. }) | Expr::List(ast::ExprList { elts, .. }) => {
            for elt in elts {
                target_names(elt, names);
            }
        }
        Expr::Starred(starred) => target_names(&starred.value, names),
        _ => {}
    }
}

/// `target op= value`; `list += iterable` extends the list in place.
fn inplace_op(op: ast::Operator, current: &Value, rhs: &Value) -> RunResult<Value> {
    if op == ast::Operator::Add
        && let Value::List(items) = current
    {
        let extra = rhs.to_vec()?;
        items.borrow_mut().extend(extra);
        return Ok(current.clone());
    }
    ops::binary_op(op, current, rhs)
}

/// Attribute lookup on a value.
pub(crate) fn get_attribute(object: &Value, attr: &str) -> RunResult<Value> {
    if let Value::Exception(exc) = object
        && attr == "args"
    {
        return Ok(Value::tuple(exc.args().to_vec()));
    }
    if methods::has_method(object, attr) {
        return Ok(Value::Method(Rc::new(BoundMethod {
            receiver: object.clone(),
            name: attr.to_owned(),
        })));
    }
    Err(no_attribute(object, attr))
}

fn no_attribute(object: &Value, attr: &str) -> Exception {
    let message = match object {
        Value::ExcClass(exc_type) => format!("type object '{exc_type}' has no attribute '{attr}'"),
        Value::Builtin(builtin) if builtin.is_type() => {
            let name: &'static str = builtin.into();
            format!("type object '{name}' has no attribute '{attr}'")
        }
        other => format!("'{}' object has no attribute '{attr}'", other.type_name()),
    };
    ExcType::AttributeError.msg(message)
}

fn name_error(name: &str) -> Exception {
    ExcType::NameError.msg(format!("name '{name}' is not defined"))
}

fn not_supported(what: &str) -> Exception {
    ExcType::NotImplementedError.msg(format!("{what} are not supported in this console"))
}

/// The exception a `raise` statement throws for a value.
fn to_exception(value: &Value) -> RunResult<Exception> {
    match value {
        Value::ExcClass(exc_type) => Ok(Exception::with_args(*exc_type, Vec::new())),
        Value::Exception(exc) => Ok(exc.without_frames()),
        _ => Err(ExcType::TypeError.msg("exceptions must derive from BaseException")),
    }
}

/// Whether `exc` is caught by an `except` clause naming `class`.
fn exception_matches(exc: &Exception, class: &Value) -> RunResult<bool> {
    match class {
        Value::ExcClass(exc_type) => Ok(exc.exc_type().is_subclass_of(*exc_type)),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if exception_matches(exc, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(ExcType::TypeError.msg("catching classes that do not inherit from BaseException is not allowed")),
    }
}

fn statement_kind(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::ClassDef(_) => "class definitions",
        Stmt::Import(_) | Stmt::ImportFrom(_) => "import statements",
        Stmt::With(_) => "'with' statements",
        Stmt::Match(_) => "'match' statements",
        Stmt::Nonlocal(_) => "'nonlocal' declarations",
        Stmt::TypeAlias(_) => "type aliases",
        _ => "these statements",
    }
}

fn expression_kind(expr: &Expr) -> &'static str {
    match expr {
        Expr::Set(_) | Expr::SetComp(_) => "sets",
        Expr::BytesLiteral(_) => "bytes literals",
        Expr::Await(_) | Expr::Yield(_) | Expr::YieldFrom(_) => "coroutines and generators",
        Expr::EllipsisLiteral(_) => "Ellipsis literals",
        _ => "these expressions",
    }
}
