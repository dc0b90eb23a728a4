//! Builtin functions and types available to console code.

use std::cmp::Ordering;

use ruff_python_ast::Operator;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    exception::{ExcType, Exception, RunResult},
    interpreter::{Interpreter, Scope},
    methods,
    ops,
    value::{Dict, Range, Value},
};

/// A builtin function or type, looked up by its Python name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    Print,
    Input,
    Len,
    Str,
    Repr,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Dict,
    Range,
    Abs,
    Min,
    Max,
    Sum,
    Sorted,
    Reversed,
    Enumerate,
    Zip,
    Round,
    Dir,
    Locals,
    Globals,
    Exit,
    Quit,
    Isinstance,
    Any,
    All,
    Ord,
    Chr,
}

impl Builtin {
    /// Whether this name is a type (`int`, `list`, ...) rather than a plain function.
    #[must_use]
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Self::Str | Self::Int | Self::Float | Self::Bool | Self::List | Self::Tuple | Self::Dict | Self::Range
        )
    }
}

/// Keyword arguments of a builtin call, consumed by name.
pub(crate) struct Kwargs<'f> {
    func: &'f str,
    items: Vec<(String, Value)>,
}

impl<'f> Kwargs<'f> {
    pub(crate) fn new(func: &'f str, items: Vec<(String, Value)>) -> Self {
        Self { func, items }
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<Value> {
        let index = self.items.iter().position(|(key, _)| key == name)?;
        Some(self.items.remove(index).1)
    }

    /// Takes every remaining keyword, e.g. for `dict(**kwargs)`.
    pub(crate) fn take_all(&mut self) -> Vec<(String, Value)> {
        std::mem::take(&mut self.items)
    }

    /// Fails if any keyword was not consumed.
    pub(crate) fn finish(self) -> RunResult<()> {
        match self.items.first() {
            None => Ok(()),
            Some((name, _)) => Err(ExcType::TypeError.msg(format!(
                "'{name}' is an invalid keyword argument for {}()",
                self.func
            ))),
        }
    }
}

pub(crate) fn check_arity(func: &str, args: &[Value], min: usize, max: usize) -> RunResult<()> {
    let given = args.len();
    if (min..=max).contains(&given) {
        return Ok(());
    }
    let message = if min == max {
        let expected = if min == 1 { "one argument".to_owned() } else { format!("{min} arguments") };
        format!("{func}() takes exactly {expected} ({given} given)")
    } else if given < min {
        format!("{func} expected at least {min} argument{}, got {given}", plural(min))
    } else {
        format!("{func} expected at most {max} argument{}, got {given}", plural(max))
    };
    Err(ExcType::TypeError.msg(message))
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

pub(crate) fn int_arg(value: &Value) -> RunResult<i64> {
    value.as_int().ok_or_else(|| {
        ExcType::TypeError.msg(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

/// The items of `args`, or of its single argument when only one is given (`min`/`max` style).
fn candidates(func: &str, args: Vec<Value>) -> RunResult<Vec<Value>> {
    match args.len() {
        0 => Err(ExcType::TypeError.msg(format!("{func} expected at least 1 argument, got 0"))),
        1 => args[0].to_vec(),
        _ => Ok(args),
    }
}

impl Interpreter<'_> {
    pub(crate) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        scope: &mut Scope<'_>,
    ) -> RunResult<Value> {
        let name: &'static str = builtin.into();
        let mut kwargs = Kwargs::new(name, kwargs);
        let result = match builtin {
            Builtin::Print => {
                let sep = text_kwarg(kwargs.take("sep"), " ", "sep")?;
                let end = text_kwarg(kwargs.take("end"), "\n", "end")?;
                kwargs.take("flush");
                kwargs.take("file");
                let mut text = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(&sep);
                text.push_str(&end);
                self.io.stdout.write(&text);
                Value::None
            }
            Builtin::Input => {
                check_arity(name, &args, 0, 1)?;
                if let Some(prompt) = args.first() {
                    let prompt = prompt.to_string();
                    if !prompt.is_empty() {
                        self.io.stdout.write(&prompt);
                    }
                }
                let line = self.io.stdin.read_line(&mut *self.io.stderr)?;
                let line = line.strip_suffix('\n').unwrap_or(&line);
                Value::str(line.strip_suffix('\r').unwrap_or(line))
            }
            Builtin::Len => {
                check_arity(name, &args, 1, 1)?;
                let len = match &args[0] {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Tuple(items) => items.len(),
                    Value::Dict(dict) => dict.borrow().len(),
                    Value::Range(range) => range.len(),
                    other => {
                        return Err(ExcType::TypeError.msg(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )));
                    }
                };
                Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
            }
            Builtin::Str => {
                check_arity(name, &args, 0, 1)?;
                Value::Str(args.first().map(ToString::to_string).unwrap_or_default())
            }
            Builtin::Repr => {
                check_arity(name, &args, 1, 1)?;
                Value::Str(args[0].repr())
            }
            Builtin::Int => {
                check_arity(name, &args, 0, 2)?;
                let base = match (args.get(1), kwargs.take("base")) {
                    (Some(base), _) => Some(int_arg(base)?),
                    (None, Some(base)) => Some(int_arg(&base)?),
                    (None, None) => None,
                };
                match args.first() {
                    None => Value::Int(0),
                    Some(value) => to_int(value, base)?,
                }
            }
            Builtin::Float => {
                check_arity(name, &args, 0, 1)?;
                match args.first() {
                    None => Value::Float(0.0),
                    Some(value) => to_float(value)?,
                }
            }
            Builtin::Bool => {
                check_arity(name, &args, 0, 1)?;
                Value::Bool(args.first().is_some_and(Value::is_truthy))
            }
            Builtin::List => {
                check_arity(name, &args, 0, 1)?;
                Value::list(match args.first() {
                    Some(iterable) => iterable.to_vec()?,
                    None => Vec::new(),
                })
            }
            Builtin::Tuple => {
                check_arity(name, &args, 0, 1)?;
                Value::tuple(match args.first() {
                    Some(iterable) => iterable.to_vec()?,
                    None => Vec::new(),
                })
            }
            Builtin::Dict => {
                check_arity(name, &args, 0, 1)?;
                let mut dict = match args.first() {
                    Some(Value::Dict(source)) => source.borrow().clone(),
                    Some(pairs) => ops::dict_from_pairs(pairs)?,
                    None => Dict::new(),
                };
                for (key, value) in kwargs.take_all() {
                    dict.insert(Value::Str(key), value)?;
                }
                Value::dict(dict)
            }
            Builtin::Range => {
                check_arity(name, &args, 1, 3)?;
                let ints = args.iter().map(int_arg).collect::<RunResult<Vec<_>>>()?;
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => unreachable!("arity checked above"),
                };
                if step == 0 {
                    return Err(ExcType::ValueError.msg("range() arg 3 must not be zero"));
                }
                Value::Range(Range { start, stop, step })
            }
            Builtin::Abs => {
                check_arity(name, &args, 1, 1)?;
                match &args[0] {
                    Value::Float(f) => Value::Float(f.abs()),
                    other => match other.as_int() {
                        Some(i) => Value::Int(
                            i.checked_abs()
                                .ok_or_else(|| ExcType::OverflowError.msg("integer result too large"))?,
                        ),
                        None => {
                            return Err(ExcType::TypeError.msg(format!(
                                "bad operand type for abs(): '{}'",
                                other.type_name()
                            )));
                        }
                    },
                }
            }
            Builtin::Min | Builtin::Max => {
                let key = kwargs.take("key").filter(|key| !matches!(key, Value::None));
                let default = kwargs.take("default");
                let items = candidates(name, args)?;
                let (want, symbol) = if builtin == Builtin::Min {
                    (Ordering::Less, "<")
                } else {
                    (Ordering::Greater, ">")
                };
                let mut best: Option<(Value, Value)> = None;
                for item in items {
                    let item_key = match &key {
                        Some(key) => self.call_value(key, vec![item.clone()], Vec::new(), scope)?,
                        None => item.clone(),
                    };
                    let replace = match &best {
                        None => true,
                        Some((best_key, _)) => item_key.py_cmp(best_key, symbol)? == want,
                    };
                    if replace {
                        best = Some((item_key, item));
                    }
                }
                match (best, default) {
                    (Some((_, item)), _) => item,
                    (None, Some(default)) => default,
                    (None, None) => {
                        return Err(ExcType::ValueError.msg(format!("{name}() arg is an empty sequence")));
                    }
                }
            }
            Builtin::Sum => {
                check_arity(name, &args, 1, 2)?;
                let start = args.get(1).cloned().or_else(|| kwargs.take("start")).unwrap_or(Value::Int(0));
                if matches!(start, Value::Str(_)) {
                    return Err(ExcType::TypeError.msg("sum() can't sum strings [use ''.join(seq) instead]"));
                }
                let mut total = start;
                for item in args[0].iter_values()? {
                    total = ops::binary_op(Operator::Add, &total, &item)?;
                }
                total
            }
            Builtin::Sorted => {
                check_arity(name, &args, 1, 1)?;
                let key = kwargs.take("key").filter(|key| !matches!(key, Value::None));
                let reverse = kwargs.take("reverse").is_some_and(|r| r.is_truthy());
                let items = args[0].to_vec()?;
                Value::list(self.sort_values(items, key.as_ref(), reverse, scope)?)
            }
            Builtin::Reversed => {
                check_arity(name, &args, 1, 1)?;
                let mut items = args[0].to_vec()?;
                items.reverse();
                Value::list(items)
            }
            Builtin::Enumerate => {
                check_arity(name, &args, 1, 2)?;
                let start = match args.get(1).cloned().or_else(|| kwargs.take("start")) {
                    Some(start) => int_arg(&start)?,
                    None => 0,
                };
                let mut pairs = Vec::new();
                for (offset, item) in (0_i64..).zip(args[0].iter_values()?) {
                    let index = start
                        .checked_add(offset)
                        .ok_or_else(|| ExcType::OverflowError.msg("integer result too large"))?;
                    pairs.push(Value::tuple(vec![Value::Int(index), item]));
                }
                Value::list(pairs)
            }
            Builtin::Zip => {
                let columns = args.iter().map(Value::to_vec).collect::<RunResult<Vec<_>>>()?;
                let len = columns.iter().map(Vec::len).min().unwrap_or(0);
                let rows = (0..len)
                    .map(|row| Value::tuple(columns.iter().map(|column| column[row].clone()).collect()))
                    .collect();
                Value::list(rows)
            }
            Builtin::Round => {
                check_arity(name, &args, 1, 2)?;
                let ndigits = match args.get(1).cloned().or_else(|| kwargs.take("ndigits")) {
                    None | Some(Value::None) => None,
                    Some(n) => Some(int_arg(&n)?),
                };
                round(&args[0], ndigits)?
            }
            Builtin::Dir => {
                check_arity(name, &args, 0, 1)?;
                let mut names: Vec<String> = match args.first() {
                    None => scope.local_namespace().keys().cloned().collect(),
                    Some(object) => methods::method_names(object).iter().map(|name| (*name).to_owned()).collect(),
                };
                names.sort();
                Value::list(names.into_iter().map(Value::Str).collect())
            }
            Builtin::Locals | Builtin::Globals => {
                check_arity(name, &args, 0, 0)?;
                let namespace = if builtin == Builtin::Locals {
                    scope.local_namespace()
                } else {
                    scope.globals()
                };
                let mut dict = Dict::new();
                for (key, value) in namespace {
                    dict.insert(Value::str(key.as_str()), value.clone())?;
                }
                Value::dict(dict)
            }
            Builtin::Exit | Builtin::Quit => {
                check_arity(name, &args, 0, 1)?;
                let code = args.into_iter().next().or_else(|| kwargs.take("code"));
                return Err(Exception::with_args(ExcType::SystemExit, code.into_iter().collect()));
            }
            Builtin::Isinstance => {
                check_arity(name, &args, 2, 2)?;
                Value::Bool(is_instance(&args[0], &args[1])?)
            }
            Builtin::Any | Builtin::All => {
                check_arity(name, &args, 1, 1)?;
                let mut items = args[0].iter_values()?;
                Value::Bool(if builtin == Builtin::Any {
                    items.any(|item| item.is_truthy())
                } else {
                    items.all(|item| item.is_truthy())
                })
            }
            Builtin::Ord => {
                check_arity(name, &args, 1, 1)?;
                let Value::Str(text) = &args[0] else {
                    return Err(ExcType::TypeError.msg(format!(
                        "ord() expected string of length 1, but {} found",
                        args[0].type_name()
                    )));
                };
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Int(i64::from(u32::from(c))),
                    _ => {
                        return Err(ExcType::TypeError.msg(format!(
                            "ord() expected a character, but string of length {} found",
                            text.chars().count()
                        )));
                    }
                }
            }
            Builtin::Chr => {
                check_arity(name, &args, 1, 1)?;
                let code = int_arg(&args[0])?;
                let c = u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ExcType::ValueError.msg("chr() arg not in range(0x110000)"))?;
                Value::Str(c.to_string())
            }
        };
        kwargs.finish()?;
        Ok(result)
    }

    /// Stable sort by optional key function, raising on unorderable items.
    pub(crate) fn sort_values(
        &mut self,
        items: Vec<Value>,
        key: Option<&Value>,
        reverse: bool,
        scope: &mut Scope<'_>,
    ) -> RunResult<Vec<Value>> {
        let mut sorted: Vec<(Value, Value)> = Vec::with_capacity(items.len());
        for item in items {
            let item_key = match key {
                Some(key) => self.call_value(key, vec![item.clone()], Vec::new(), scope)?,
                None => item.clone(),
            };
            // binary insertion after any equal keys keeps the sort stable
            let (mut lo, mut hi) = (0, sorted.len());
            while lo < hi {
                let mid = (lo + hi) / 2;
                let ordering = item_key.py_cmp(&sorted[mid].0, "<")?;
                let goes_before = if reverse {
                    ordering == Ordering::Greater
                } else {
                    ordering == Ordering::Less
                };
                if goes_before {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }
            sorted.insert(lo, (item_key, item));
        }
        Ok(sorted.into_iter().map(|(_, item)| item).collect())
    }
}

/// A `sep=`/`end=` style argument: a string, or `None` for the default.
fn text_kwarg(value: Option<Value>, default: &str, name: &str) -> RunResult<String> {
    match value {
        None | Some(Value::None) => Ok(default.to_owned()),
        Some(Value::Str(text)) => Ok(text),
        Some(other) => Err(ExcType::TypeError.msg(format!(
            "{name} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}

fn to_int(value: &Value, base: Option<i64>) -> RunResult<Value> {
    if let Some(base) = base {
        let Value::Str(text) = value else {
            return Err(ExcType::TypeError.msg("int() can't convert non-string with explicit base"));
        };
        let radix = u32::try_from(base)
            .ok()
            .filter(|radix| (2..=36).contains(radix))
            .ok_or_else(|| ExcType::ValueError.msg("int() base must be >= 2 and <= 36, or 0"))?;
        return parse_int(text, radix).ok_or_else(|| invalid_int_literal(text, base));
    }
    match value {
        Value::Float(f) => {
            if f.is_nan() {
                return Err(ExcType::ValueError.msg("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(ExcType::OverflowError.msg("cannot convert float infinity to integer"));
            }
            let truncated = f.trunc();
            if truncated < -9.223_372_036_854_776e18 || truncated >= 9.223_372_036_854_776e18 {
                return Err(ExcType::OverflowError.msg("integer result too large"));
            }
            #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
            let int = truncated as i64;
            Ok(Value::Int(int))
        }
        Value::Str(text) => parse_int(text, 10).ok_or_else(|| invalid_int_literal(text, 10)),
        other => other.as_int().map(Value::Int).ok_or_else(|| {
            ExcType::TypeError.msg(format!(
                "int() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn parse_int(text: &str, radix: u32) -> Option<Value> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(Value::Int(if negative { -magnitude } else { magnitude }))
}

fn invalid_int_literal(text: &str, base: i64) -> Exception {
    ExcType::ValueError.msg(format!(
        "invalid literal for int() with base {base}: {}",
        Value::str(text).repr()
    ))
}

fn to_float(value: &Value) -> RunResult<Value> {
    match value {
        Value::Str(text) => {
            let cleaned = text.trim().replace('_', "");
            cleaned.parse::<f64>().map(Value::Float).map_err(|_| {
                ExcType::ValueError.msg(format!("could not convert string to float: {}", value.repr()))
            })
        }
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            ExcType::TypeError.msg(format!(
                "float() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

/// `round()` with Python's round-half-to-even behavior.
fn round(value: &Value, ndigits: Option<i64>) -> RunResult<Value> {
    match (value, ndigits) {
        (Value::Float(f), None) => {
            if !f.is_finite() {
                return to_int(value, None);
            }
            to_int(&Value::Float(f.round_ties_even()), None)
        }
        (Value::Float(f), Some(n)) => {
            let exponent = i32::try_from(n.clamp(-308, 308)).unwrap_or(0);
            let factor = 10_f64.powi(exponent);
            Ok(Value::Float((f * factor).round_ties_even() / factor))
        }
        (other, ndigits) => {
            let i = int_arg(other)?;
            match ndigits {
                Some(n) if n < 0 => {
                    let factor = u32::try_from(-n).ok().and_then(|n| 10_i64.checked_pow(n));
                    let Some(factor) = factor else {
                        return Ok(Value::Int(0));
                    };
                    let quotient = i.div_euclid(factor);
                    let remainder = i.rem_euclid(factor);
                    let rounded = match (remainder * 2).cmp(&factor) {
                        Ordering::Less => quotient,
                        Ordering::Greater => quotient + 1,
                        Ordering::Equal => quotient + quotient.rem_euclid(2),
                    };
                    rounded
                        .checked_mul(factor)
                        .map(Value::Int)
                        .ok_or_else(|| ExcType::OverflowError.msg("integer result too large"))
                }
                _ => Ok(Value::Int(i)),
            }
        }
    }
}

fn is_instance(object: &Value, class: &Value) -> RunResult<bool> {
    match class {
        Value::Builtin(builtin) if builtin.is_type() => {
            let type_name: &'static str = builtin.into();
            Ok(object.type_name() == type_name || (type_name == "int" && matches!(object, Value::Bool(_))))
        }
        Value::ExcClass(exc_type) => Ok(matches!(object, Value::Exception(exc) if exc.exc_type().is_subclass_of(*exc_type))),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if is_instance(object, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(ExcType::TypeError.msg("isinstance() arg 2 must be a type or tuple of types")),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn names_round_trip() {
        assert_eq!(Builtin::from_str("isinstance").unwrap(), Builtin::Isinstance);
        assert_eq!(Builtin::Print.to_string(), "print");
        assert!(Builtin::from_str("Print").is_err());
        assert!(Builtin::Dict.is_type());
        assert!(!Builtin::Len.is_type());
    }

    #[test]
    fn int_conversion() {
        assert_eq!(to_int(&Value::str(" 4_2 "), None).unwrap(), Value::Int(42));
        assert_eq!(to_int(&Value::str("ff"), Some(16)).unwrap(), Value::Int(255));
        assert_eq!(to_int(&Value::Float(-2.7), None).unwrap(), Value::Int(-2));
        assert_eq!(
            to_int(&Value::str("abc"), None).unwrap_err().to_string(),
            "ValueError: invalid literal for int() with base 10: 'abc'"
        );
        assert_eq!(
            to_int(&Value::Float(f64::INFINITY), None).unwrap_err().to_string(),
            "OverflowError: cannot convert float infinity to integer"
        );
    }

    #[test]
    fn rounding_is_half_even() {
        assert_eq!(round(&Value::Float(2.5), None).unwrap(), Value::Int(2));
        assert_eq!(round(&Value::Float(3.5), None).unwrap(), Value::Int(4));
        assert_eq!(round(&Value::Int(125), Some(-1)).unwrap(), Value::Int(120));
        assert_eq!(round(&Value::Int(135), Some(-1)).unwrap(), Value::Int(140));
        assert_eq!(round(&Value::Float(1.25), Some(1)).unwrap(), Value::Float(1.2));
    }

    #[test]
    fn isinstance_checks() {
        let int = Value::Builtin(Builtin::Int);
        assert!(is_instance(&Value::Bool(true), &int).unwrap());
        assert!(!is_instance(&Value::str("x"), &int).unwrap());
        let exc = Value::Exception(std::rc::Rc::new(Exception::new(ExcType::KeyError, "k")));
        assert!(is_instance(&exc, &Value::ExcClass(ExcType::LookupError)).unwrap());
        assert!(is_instance(&Value::Int(1), &Value::tuple(vec![Value::Builtin(Builtin::Str), int])).unwrap());
    }
}
