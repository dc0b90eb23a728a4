//! Functions defined by console code and their argument binding.
//!
//! A signature can include positional-only parameters, positional-or-keyword parameters,
//! `*args`, keyword-only parameters and `**kwargs`. Defaults are evaluated once, when the
//! `def` statement runs, and stored with the parameter.

use std::rc::Rc;

use ruff_python_ast::{Expr, Stmt};

use crate::{
    exception::{ExcType, Exception, RunResult},
    frame::Namespace,
    parse::SourceMap,
    value::{Dict, Value},
};

/// One named parameter and its default, if any.
#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub name: String,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Signature {
    /// Positional-only parameters followed by positional-or-keyword parameters.
    pub positional: Vec<Param>,
    /// How many entries of `positional` are positional-only.
    pub posonly_count: usize,
    pub var_args: Option<String>,
    pub kwonly: Vec<Param>,
    pub var_kwargs: Option<String>,
}

impl Signature {
    /// Binds call arguments to parameter names, producing the callee's initial locals.
    pub fn bind(&self, func_name: &str, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> RunResult<Namespace> {
        let mut bound: Vec<Option<Value>> = vec![None; self.positional.len()];
        let mut extra_args = Vec::new();
        let given = args.len();
        for (i, arg) in args.into_iter().enumerate() {
            match bound.get_mut(i) {
                Some(slot) => *slot = Some(arg),
                None if self.var_args.is_some() => extra_args.push(arg),
                None => return Err(too_many_positional(func_name, &self.positional, given)),
            }
        }

        let mut kwonly: Vec<Option<Value>> = vec![None; self.kwonly.len()];
        let mut extra_kwargs = Dict::new();
        for (name, value) in kwargs {
            let slot = if let Some(i) = self.positional.iter().position(|p| p.name == name)
                && i >= self.posonly_count
            {
                &mut bound[i]
            } else if let Some(i) = self.kwonly.iter().position(|p| p.name == name) {
                &mut kwonly[i]
            } else if self.var_kwargs.is_some() {
                extra_kwargs.insert(Value::Str(name), value)?;
                continue;
            } else {
                return Err(ExcType::TypeError.msg(format!(
                    "{func_name}() got an unexpected keyword argument '{name}'"
                )));
            };
            if slot.is_some() {
                return Err(ExcType::TypeError.msg(format!(
                    "{func_name}() got multiple values for argument '{name}'"
                )));
            }
            *slot = Some(value);
        }

        let mut namespace = Namespace::with_capacity(bound.len() + kwonly.len() + 2);
        let mut missing = Vec::new();
        for (param, value) in self.positional.iter().zip(bound) {
            match value.or_else(|| param.default.clone()) {
                Some(value) => {
                    namespace.insert(param.name.clone(), value);
                }
                None => missing.push(param.name.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(missing_arguments(func_name, "positional", &missing));
        }
        if let Some(name) = &self.var_args {
            namespace.insert(name.clone(), Value::tuple(extra_args));
        }
        for (param, value) in self.kwonly.iter().zip(kwonly) {
            match value.or_else(|| param.default.clone()) {
                Some(value) => {
                    namespace.insert(param.name.clone(), value);
                }
                None => missing.push(param.name.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(missing_arguments(func_name, "keyword-only", &missing));
        }
        if let Some(name) = &self.var_kwargs {
            namespace.insert(name.clone(), Value::dict(extra_kwargs));
        }
        Ok(namespace)
    }
}

fn too_many_positional(func_name: &str, params: &[Param], given: usize) -> Exception {
    let required = params.iter().filter(|p| p.default.is_none()).count();
    let takes = if required == params.len() {
        params.len().to_string()
    } else {
        format!("from {required} to {}", params.len())
    };
    let plural = if params.len() == 1 && required == params.len() {
        "argument"
    } else {
        "arguments"
    };
    let was = if given == 1 { "was" } else { "were" };
    ExcType::TypeError.msg(format!(
        "{func_name}() takes {takes} positional {plural} but {given} {was} given"
    ))
}

fn missing_arguments(func_name: &str, kind: &str, names: &[&str]) -> Exception {
    let count = names.len();
    let plural = if count == 1 { "argument" } else { "arguments" };
    ExcType::TypeError.msg(format!(
        "{func_name}() missing {count} required {kind} {plural}: {}",
        format_param_names(names)
    ))
}

/// `'a'`, `'a' and 'b'`, `'a', 'b' and 'c'`.
fn format_param_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [name] => format!("'{name}'"),
        [rest @ .., last] => {
            let rest: Vec<_> = rest.iter().map(|n| format!("'{n}'")).collect();
            format!("{} and '{last}'", rest.join(", "))
        }
    }
}

/// What a function runs when called.
#[derive(Debug)]
pub(crate) enum FunctionBody {
    /// The statements of a `def`.
    Block(Vec<Stmt>),
    /// The expression of a `lambda`.
    Lambda(Box<Expr>),
}

/// A function created by a `def` statement or `lambda` in console code.
#[derive(Debug)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) signature: Signature,
    pub(crate) body: FunctionBody,
    pub(crate) source: Rc<SourceMap>,
    /// Locals of the enclosing function at definition time, for nested functions.
    pub(crate) enclosing: Option<Namespace>,
}

impl Function {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, default: Option<Value>) -> Param {
        Param {
            name: name.to_owned(),
            default,
        }
    }

    fn signature() -> Signature {
        Signature {
            positional: vec![param("a", None), param("b", Some(Value::Int(2)))],
            ..Signature::default()
        }
    }

    #[test]
    fn binds_positional_and_defaults() {
        let ns = signature().bind("f", vec![Value::Int(1)], vec![]).unwrap();
        assert_eq!(ns.get("a"), Some(&Value::Int(1)));
        assert_eq!(ns.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn binds_keywords() {
        let ns = signature()
            .bind("f", vec![], vec![("b".to_owned(), Value::Int(5)), ("a".to_owned(), Value::Int(4))])
            .unwrap();
        assert_eq!(ns.get("b"), Some(&Value::Int(5)));
    }

    #[test]
    fn reports_binding_errors() {
        let err = signature().bind("f", vec![], vec![]).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: f() missing 1 required positional argument: 'a'");
        let err = signature()
            .bind("f", vec![Value::Int(1), Value::Int(2), Value::Int(3)], vec![])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: f() takes from 1 to 2 positional arguments but 3 were given"
        );
        let err = signature()
            .bind("f", vec![Value::Int(1)], vec![("a".to_owned(), Value::Int(1))])
            .unwrap_err();
        assert_eq!(err.to_string(), "TypeError: f() got multiple values for argument 'a'");
        let err = signature()
            .bind("f", vec![], vec![("z".to_owned(), Value::Int(1))])
            .unwrap_err();
        assert_eq!(err.to_string(), "TypeError: f() got an unexpected keyword argument 'z'");
    }

    #[test]
    fn collects_varargs() {
        let sig = Signature {
            var_args: Some("args".to_owned()),
            var_kwargs: Some("kw".to_owned()),
            ..Signature::default()
        };
        let ns = sig
            .bind("f", vec![Value::Int(1)], vec![("x".to_owned(), Value::Int(2))])
            .unwrap();
        assert_eq!(ns.get("args").map(Value::repr).as_deref(), Some("(1,)"));
        assert_eq!(ns.get("kw").map(Value::repr).as_deref(), Some("{'x': 2}"));
    }
}
