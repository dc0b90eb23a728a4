//! Methods of the builtin `str`, `list`, `dict` and `tuple` types.

use crate::{
    builtins::{Kwargs, check_arity, int_arg},
    exception::{ExcType, Exception, RunResult},
    format::str_format,
    interpreter::{Interpreter, Scope},
    ops,
    value::{Dict, Value},
};

const STR_METHODS: &[&str] = &[
    "capitalize",
    "count",
    "endswith",
    "find",
    "format",
    "index",
    "isalnum",
    "isalpha",
    "isdigit",
    "isspace",
    "join",
    "lower",
    "lstrip",
    "replace",
    "rstrip",
    "split",
    "splitlines",
    "startswith",
    "strip",
    "title",
    "upper",
    "zfill",
];

const LIST_METHODS: &[&str] = &[
    "append", "clear", "copy", "count", "extend", "index", "insert", "pop", "remove", "reverse", "sort",
];

const DICT_METHODS: &[&str] = &[
    "clear",
    "copy",
    "get",
    "items",
    "keys",
    "pop",
    "setdefault",
    "update",
    "values",
];

const TUPLE_METHODS: &[&str] = &["count", "index"];

/// Method names available on a value, as listed by `dir(value)`.
#[must_use]
pub(crate) fn method_names(value: &Value) -> &'static [&'static str] {
    match value {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Tuple(_) => TUPLE_METHODS,
        Value::Exception(_) => &["args"],
        _ => &[],
    }
}

#[must_use]
pub(crate) fn has_method(value: &Value, name: &str) -> bool {
    !matches!(value, Value::Exception(_)) && method_names(value).contains(&name)
}

impl Interpreter<'_> {
    /// Calls `receiver.name(*args, **kwargs)` for a method reported by [`has_method`].
    pub(crate) fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        scope: &mut Scope<'_>,
    ) -> RunResult<Value> {
        let qualified = format!("{}.{name}", receiver.type_name());
        let mut kwargs = Kwargs::new(&qualified, kwargs);
        let result = match receiver {
            Value::Str(s) if name == "format" => {
                let kwargs = kwargs.take_all();
                return str_format(s, &args, &kwargs).map(Value::Str);
            }
            Value::Str(s) => str_method(s, name, &qualified, &args, &mut kwargs)?,
            Value::List(_) if name == "sort" => {
                check_arity(&qualified, &args, 0, 0)?;
                let key = kwargs.take("key").filter(|key| !matches!(key, Value::None));
                let reverse = kwargs.take("reverse").is_some_and(|r| r.is_truthy());
                let Value::List(items) = receiver else {
                    return Err(no_method(receiver, name));
                };
                let snapshot = items.borrow().clone();
                let sorted = self.sort_values(snapshot, key.as_ref(), reverse, scope)?;
                *items.borrow_mut() = sorted;
                Value::None
            }
            Value::List(_) => list_method(receiver, name, &qualified, args)?,
            Value::Dict(_) => dict_method(receiver, name, &qualified, args, &mut kwargs)?,
            Value::Tuple(items) => sequence_method(items, name, &qualified, &args, "tuple")?,
            _ => return Err(no_method(receiver, name)),
        };
        kwargs.finish()?;
        Ok(result)
    }
}

fn no_method(receiver: &Value, name: &str) -> Exception {
    ExcType::AttributeError.msg(format!("'{}' object has no attribute '{name}'", receiver.type_name()))
}

fn str_arg<'v>(func: &str, value: &'v Value) -> RunResult<&'v str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(ExcType::TypeError.msg(format!(
            "{func}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

/// Optional `chars` argument of the strip family.
fn strip_chars(func: &str, args: &[Value]) -> RunResult<Option<Vec<char>>> {
    check_arity(func, args, 0, 1)?;
    match args.first() {
        None | Some(Value::None) => Ok(None),
        Some(chars) => Ok(Some(str_arg(func, chars)?.chars().collect())),
    }
}

/// Char index of a byte offset.
fn char_index(s: &str, byte: usize) -> i64 {
    i64::try_from(s[..byte].chars().count()).unwrap_or(i64::MAX)
}

fn str_method(s: &str, name: &str, func: &str, args: &[Value], kwargs: &mut Kwargs<'_>) -> RunResult<Value> {
    let no_args = || check_arity(func, args, 0, 0);
    let value = match name {
        "upper" => {
            no_args()?;
            Value::str(s.to_uppercase())
        }
        "lower" => {
            no_args()?;
            Value::str(s.to_lowercase())
        }
        "title" => {
            no_args()?;
            let mut out = String::with_capacity(s.len());
            let mut previous_cased = false;
            for c in s.chars() {
                if previous_cased {
                    out.extend(c.to_lowercase());
                } else {
                    out.extend(c.to_uppercase());
                }
                previous_cased = c.is_alphabetic();
            }
            Value::Str(out)
        }
        "capitalize" => {
            no_args()?;
            let mut chars = s.chars();
            let mut out: String = chars.next().map(|c| c.to_uppercase().collect()).unwrap_or_default();
            out.push_str(&chars.as_str().to_lowercase());
            Value::Str(out)
        }
        "strip" | "lstrip" | "rstrip" => {
            let chars = strip_chars(func, args)?;
            let matches = |c: char| chars.as_ref().map_or(c.is_whitespace(), |set| set.contains(&c));
            let stripped = match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            Value::str(stripped)
        }
        "split" => {
            check_arity(func, args, 0, 2)?;
            let sep = args.first().cloned().or_else(|| kwargs.take("sep"));
            let maxsplit = match args.get(1).cloned().or_else(|| kwargs.take("maxsplit")) {
                Some(n) => int_arg(&n)?,
                None => -1,
            };
            let maxsplit = usize::try_from(maxsplit).ok();
            let parts = match sep {
                None | Some(Value::None) => split_whitespace(s, maxsplit),
                Some(sep) => {
                    let sep = str_arg(func, &sep)?;
                    if sep.is_empty() {
                        return Err(ExcType::ValueError.msg("empty separator"));
                    }
                    match maxsplit {
                        Some(n) => s.splitn(n + 1, sep).map(str::to_owned).collect(),
                        None => s.split(sep).map(str::to_owned).collect(),
                    }
                }
            };
            Value::list(parts.into_iter().map(Value::Str).collect())
        }
        "splitlines" => {
            no_args()?;
            Value::list(s.lines().map(Value::str).collect())
        }
        "join" => {
            check_arity(func, args, 1, 1)?;
            let mut parts = Vec::new();
            for (i, item) in args[0].iter_values()?.enumerate() {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(ExcType::TypeError.msg(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )));
                    }
                }
            }
            Value::Str(parts.join(s))
        }
        "replace" => {
            check_arity(func, args, 2, 3)?;
            let old = str_arg(func, &args[0])?;
            let new = str_arg(func, &args[1])?;
            let count = match args.get(2).cloned().or_else(|| kwargs.take("count")) {
                Some(count) => int_arg(&count)?,
                None => -1,
            };
            match usize::try_from(count) {
                Ok(count) => Value::Str(s.replacen(old, new, count)),
                Err(_) => Value::Str(s.replace(old, new)),
            }
        }
        "startswith" | "endswith" => {
            check_arity(func, args, 1, 1)?;
            let candidates = match &args[0] {
                Value::Tuple(items) => items.to_vec(),
                other => vec![other.clone()],
            };
            let mut found = false;
            for candidate in &candidates {
                let affix = str_arg(func, candidate)?;
                found |= if name == "startswith" {
                    s.starts_with(affix)
                } else {
                    s.ends_with(affix)
                };
            }
            Value::Bool(found)
        }
        "find" | "index" => {
            check_arity(func, args, 1, 1)?;
            let needle = str_arg(func, &args[0])?;
            match s.find(needle) {
                Some(byte) => Value::Int(char_index(s, byte)),
                None if name == "find" => Value::Int(-1),
                None => return Err(ExcType::ValueError.msg("substring not found")),
            }
        }
        "count" => {
            check_arity(func, args, 1, 1)?;
            let needle = str_arg(func, &args[0])?;
            Value::Int(i64::try_from(s.matches(needle).count()).unwrap_or(i64::MAX))
        }
        "isdigit" | "isalpha" | "isalnum" | "isspace" => {
            no_args()?;
            let test: fn(char) -> bool = match name {
                "isdigit" => |c| c.is_ascii_digit(),
                "isalpha" => char::is_alphabetic,
                "isalnum" => char::is_alphanumeric,
                _ => char::is_whitespace,
            };
            Value::Bool(!s.is_empty() && s.chars().all(test))
        }
        "zfill" => {
            check_arity(func, args, 1, 1)?;
            let width = usize::try_from(int_arg(&args[0])?).unwrap_or(0);
            let len = s.chars().count();
            if len >= width {
                Value::str(s)
            } else {
                let (sign, digits) = match s.chars().next() {
                    Some(c @ ('+' | '-')) => (Some(c), &s[1..]),
                    _ => (None, s),
                };
                let mut out: String = sign.into_iter().collect();
                out.push_str(&"0".repeat(width - len));
                out.push_str(digits);
                Value::Str(out)
            }
        }
        _ => return Err(no_method(&Value::str(s), name)),
    };
    Ok(value)
}

/// `str.split()` without a separator: runs of whitespace separate, edges are ignored.
fn split_whitespace(s: &str, maxsplit: Option<usize>) -> Vec<String> {
    let Some(maxsplit) = maxsplit else {
        return s.split_whitespace().map(str::to_owned).collect();
    };
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() == maxsplit {
            parts.push(rest.to_owned());
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        parts.push(rest[..end].to_owned());
        rest = rest[end..].trim_start();
    }
    parts
}

/// Resolves a possibly negative index for `insert`, clamping to the list bounds.
fn insert_position(index: i64, len: usize) -> usize {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let index = if index < 0 { (index + len_i).max(0) } else { index.min(len_i) };
    usize::try_from(index).unwrap_or(len)
}

fn list_method(receiver: &Value, name: &str, func: &str, args: Vec<Value>) -> RunResult<Value> {
    let Value::List(items) = receiver else {
        return Err(no_method(receiver, name));
    };
    let value = match name {
        "append" => {
            check_arity(func, &args, 1, 1)?;
            let mut args = args;
            items.borrow_mut().extend(args.pop());
            Value::None
        }
        "extend" => {
            check_arity(func, &args, 1, 1)?;
            let extra = args[0].to_vec()?;
            items.borrow_mut().extend(extra);
            Value::None
        }
        "insert" => {
            check_arity(func, &args, 2, 2)?;
            let index = int_arg(&args[0])?;
            let mut list = items.borrow_mut();
            let position = insert_position(index, list.len());
            list.insert(position, args[1].clone());
            Value::None
        }
        "pop" => {
            check_arity(func, &args, 0, 1)?;
            let mut list = items.borrow_mut();
            if list.is_empty() {
                return Err(ExcType::IndexError.msg("pop from empty list"));
            }
            let index = match args.first() {
                Some(index) => int_arg(index)?,
                None => -1,
            };
            let len = i64::try_from(list.len()).unwrap_or(i64::MAX);
            let resolved = if index < 0 { index + len } else { index };
            let position = usize::try_from(resolved)
                .ok()
                .filter(|position| *position < list.len())
                .ok_or_else(|| ExcType::IndexError.msg("pop index out of range"))?;
            list.remove(position)
        }
        "remove" => {
            check_arity(func, &args, 1, 1)?;
            let mut list = items.borrow_mut();
            let position = list
                .iter()
                .position(|item| item.py_eq(&args[0]))
                .ok_or_else(|| ExcType::ValueError.msg("list.remove(x): x not in list"))?;
            list.remove(position);
            Value::None
        }
        "clear" => {
            check_arity(func, &args, 0, 0)?;
            items.borrow_mut().clear();
            Value::None
        }
        "copy" => {
            check_arity(func, &args, 0, 0)?;
            Value::list(items.borrow().clone())
        }
        "reverse" => {
            check_arity(func, &args, 0, 0)?;
            items.borrow_mut().reverse();
            Value::None
        }
        _ => {
            let snapshot = items.borrow().clone();
            sequence_method(&snapshot, name, func, &args, "list")?
        }
    };
    Ok(value)
}

/// `index` and `count`, shared by lists and tuples.
fn sequence_method(items: &[Value], name: &str, func: &str, args: &[Value], type_name: &str) -> RunResult<Value> {
    check_arity(func, args, 1, 1)?;
    let needle = &args[0];
    match name {
        "index" => items
            .iter()
            .position(|item| item.py_eq(needle))
            .map(|i| Value::Int(i64::try_from(i).unwrap_or(i64::MAX)))
            .ok_or_else(|| ExcType::ValueError.msg(format!("{} is not in {type_name}", needle.repr()))),
        "count" => {
            let count = items.iter().filter(|item| item.py_eq(needle)).count();
            Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
        }
        _ => Err(ExcType::AttributeError.msg(format!("'{type_name}' object has no attribute '{name}'"))),
    }
}

fn key_error(key: &Value) -> Exception {
    Exception::with_args(ExcType::KeyError, vec![key.clone()])
}

fn check_hashable(key: &Value) -> RunResult<()> {
    if key.is_hashable() {
        Ok(())
    } else {
        Err(ExcType::TypeError.msg(format!("unhashable type: '{}'", key.type_name())))
    }
}

fn dict_method(
    receiver: &Value,
    name: &str,
    func: &str,
    args: Vec<Value>,
    kwargs: &mut Kwargs<'_>,
) -> RunResult<Value> {
    let Value::Dict(dict) = receiver else {
        return Err(no_method(receiver, name));
    };
    let value = match name {
        "get" => {
            check_arity(func, &args, 1, 2)?;
            check_hashable(&args[0])?;
            let found = dict.borrow().get(&args[0]).cloned();
            found.or_else(|| args.get(1).cloned()).unwrap_or(Value::None)
        }
        "keys" => {
            check_arity(func, &args, 0, 0)?;
            Value::list(dict.borrow().keys().cloned().collect())
        }
        "values" => {
            check_arity(func, &args, 0, 0)?;
            Value::list(dict.borrow().values().cloned().collect())
        }
        "items" => {
            check_arity(func, &args, 0, 0)?;
            let pairs = dict
                .borrow()
                .iter()
                .map(|(key, value)| Value::tuple(vec![key.clone(), value.clone()]))
                .collect();
            Value::list(pairs)
        }
        "pop" => {
            check_arity(func, &args, 1, 2)?;
            check_hashable(&args[0])?;
            let removed = dict.borrow_mut().remove(&args[0]);
            match (removed, args.get(1)) {
                (Some(value), _) => value,
                (None, Some(default)) => default.clone(),
                (None, None) => return Err(key_error(&args[0])),
            }
        }
        "setdefault" => {
            check_arity(func, &args, 1, 2)?;
            let existing = dict.borrow().get(&args[0]).cloned();
            match existing {
                Some(value) => value,
                None => {
                    let default = args.get(1).cloned().unwrap_or(Value::None);
                    dict.borrow_mut().insert(args[0].clone(), default.clone())?;
                    default
                }
            }
        }
        "update" => {
            check_arity(func, &args, 0, 1)?;
            let mut incoming = match args.first() {
                Some(Value::Dict(other)) => other.borrow().clone(),
                Some(pairs) => ops::dict_from_pairs(pairs)?,
                None => Dict::new(),
            };
            for (key, value) in kwargs.take_all() {
                incoming.insert(Value::Str(key), value)?;
            }
            let mut target = dict.borrow_mut();
            for (key, value) in incoming.iter() {
                target.insert(key.clone(), value.clone())?;
            }
            Value::None
        }
        "clear" => {
            check_arity(func, &args, 0, 0)?;
            dict.borrow_mut().clear();
            Value::None
        }
        "copy" => {
            check_arity(func, &args, 0, 0)?;
            Value::dict(dict.borrow().clone())
        }
        _ => return Err(no_method(receiver, name)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_split_honors_maxsplit() {
        assert_eq!(split_whitespace("  a b  c ", None), ["a", "b", "c"]);
        assert_eq!(split_whitespace("  a b  c ", Some(1)), ["a", "b  c "]);
        assert!(split_whitespace("   ", Some(2)).is_empty());
    }

    #[test]
    fn insert_positions_clamp() {
        assert_eq!(insert_position(-1, 3), 2);
        assert_eq!(insert_position(-10, 3), 0);
        assert_eq!(insert_position(10, 3), 3);
    }

    #[test]
    fn method_lookup() {
        assert!(has_method(&Value::str("x"), "upper"));
        assert!(!has_method(&Value::Int(1), "upper"));
        assert!(has_method(&Value::list(vec![]), "sort"));
        assert!(!has_method(&Value::tuple(vec![]), "append"));
    }

    #[test]
    fn tuple_index_error() {
        let err = sequence_method(&[Value::Int(1)], "index", "tuple.index", &[Value::Int(5)], "tuple").unwrap_err();
        assert_eq!(err.to_string(), "ValueError: 5 is not in tuple");
    }
}
