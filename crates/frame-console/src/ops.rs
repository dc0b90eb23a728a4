//! Operators, comparisons and subscripting on [`Value`]s.

use std::cmp::Ordering;

use ruff_python_ast::{CmpOp, Operator, UnaryOp};

use crate::{
    exception::{ExcType, Exception, RunResult},
    format::percent_format,
    value::{Dict, Range, Value},
};

/// Longest sequence a repetition may produce.
const MAX_REPEAT_LEN: usize = 10_000_000;

fn overflow() -> Exception {
    ExcType::OverflowError.msg("integer result too large")
}

#[must_use]
pub(crate) fn operator_symbol(op: Operator) -> &'static str {
    match op {
        Operator::Add => "+",
        Operator::Sub => "-",
        Operator::Mult => "*",
        Operator::MatMult => "@",
        Operator::Div => "/",
        Operator::Mod => "%",
        Operator::Pow => "**",
        Operator::LShift => "<<",
        Operator::RShift => ">>",
        Operator::BitOr => "|",
        Operator::BitXor => "^",
        Operator::BitAnd => "&",
        Operator::FloorDiv => "//",
    }
}

fn unsupported(symbol: &str, left: &Value, right: &Value) -> Exception {
    ExcType::TypeError.msg(format!(
        "unsupported operand type(s) for {symbol}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

/// Evaluates `left <op> right`.
pub(crate) fn binary_op(op: Operator, left: &Value, right: &Value) -> RunResult<Value> {
    if let (Some(a), Some(b)) = (int_operand(left), int_operand(right)) {
        if let (Value::Bool(a), Value::Bool(b)) = (left, right) {
            match op {
                Operator::BitAnd => return Ok(Value::Bool(*a & *b)),
                Operator::BitOr => return Ok(Value::Bool(*a | *b)),
                Operator::BitXor => return Ok(Value::Bool(*a ^ *b)),
                _ => {}
            }
        }
        return int_op(op, a, b);
    }
    if let (Some(a), Some(b)) = (left.as_float(), right.as_float())
        && let Some(result) = float_op(op, a, b)
    {
        return result;
    }
    match (op, left, right) {
        (Operator::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Operator::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Operator::Add, Value::Tuple(a), Value::Tuple(b)) => Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect())),
        (Operator::Add, Value::Str(_), other) => Err(ExcType::TypeError.msg(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        (Operator::Add, Value::List(_), other) => Err(ExcType::TypeError.msg(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        ))),
        (Operator::Add, Value::Tuple(_), other) => Err(ExcType::TypeError.msg(format!(
            "can only concatenate tuple (not \"{}\") to tuple",
            other.type_name()
        ))),
        (Operator::Mult, seq, count) | (Operator::Mult, count, seq)
            if matches!(seq, Value::Str(_) | Value::List(_) | Value::Tuple(_)) && count.as_int().is_some() =>
        {
            repeat(seq, count.as_int().unwrap_or_default())
        }
        (Operator::Mod, Value::Str(template), args) => percent_format(template, args).map(Value::Str),
        (Operator::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged = a.borrow().clone();
            for (key, value) in b.borrow().iter() {
                merged.insert(key.clone(), value.clone())?;
            }
            Ok(Value::dict(merged))
        }
        _ => Err(unsupported(operator_symbol(op), left, right)),
    }
}

fn int_operand(value: &Value) -> Option<i64> {
    match value {
        Value::Int(_) | Value::Bool(_) => value.as_int(),
        _ => None,
    }
}

fn int_op(op: Operator, a: i64, b: i64) -> RunResult<Value> {
    let value = match op {
        Operator::Add => a.checked_add(b).ok_or_else(overflow)?,
        Operator::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        Operator::Mult => a.checked_mul(b).ok_or_else(overflow)?,
        Operator::Div => {
            if b == 0 {
                return Err(ExcType::ZeroDivisionError.msg("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        Operator::FloorDiv => {
            if b == 0 {
                return Err(ExcType::ZeroDivisionError.msg("integer division or modulo by zero"));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }
        }
        Operator::Mod => {
            if b == 0 {
                return Err(ExcType::ZeroDivisionError.msg("integer modulo by zero"));
            }
            let r = a.checked_rem(b).unwrap_or(0);
            if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
        }
        Operator::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(ExcType::ZeroDivisionError.msg("0.0 cannot be raised to a negative power"));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exp).ok_or_else(overflow)?
        }
        Operator::LShift | Operator::RShift if b < 0 => {
            return Err(ExcType::ValueError.msg("negative shift count"));
        }
        Operator::LShift => {
            if a == 0 {
                0
            } else if b >= 64 {
                return Err(overflow());
            } else {
                i64::try_from(i128::from(a) << b).map_err(|_| overflow())?
            }
        }
        Operator::RShift => a >> b.min(63),
        Operator::BitAnd => a & b,
        Operator::BitOr => a | b,
        Operator::BitXor => a ^ b,
        Operator::MatMult => return Err(unsupported("@", &Value::Int(a), &Value::Int(b))),
    };
    Ok(Value::Int(value))
}

/// Float arithmetic; `None` for operators floats do not support.
fn float_op(op: Operator, a: f64, b: f64) -> Option<RunResult<Value>> {
    let value = match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mult => a * b,
        Operator::Div => {
            if b == 0.0 {
                return Some(Err(ExcType::ZeroDivisionError.msg("float division by zero")));
            }
            a / b
        }
        Operator::FloorDiv => {
            if b == 0.0 {
                return Some(Err(ExcType::ZeroDivisionError.msg("float floor division by zero")));
            }
            (a / b).floor()
        }
        Operator::Mod => {
            if b == 0.0 {
                return Some(Err(ExcType::ZeroDivisionError.msg("float modulo")));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
        }
        Operator::Pow => {
            if a == 0.0 && b < 0.0 {
                return Some(Err(ExcType::ZeroDivisionError.msg("0.0 cannot be raised to a negative power")));
            }
            a.powf(b)
        }
        _ => return None,
    };
    Some(Ok(Value::Float(value)))
}

fn repeat(seq: &Value, count: i64) -> RunResult<Value> {
    let count = usize::try_from(count).unwrap_or(0);
    let len = match seq {
        Value::Str(s) => s.len(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        _ => 0,
    };
    if len.saturating_mul(count) > MAX_REPEAT_LEN {
        return Err(ExcType::OverflowError.msg("repeated sequence is too long"));
    }
    Ok(match seq {
        Value::Str(s) => Value::Str(s.repeat(count)),
        Value::List(items) => Value::list(items.borrow().iter().cloned().cycle().take(len * count).collect()),
        Value::Tuple(items) => Value::tuple(items.iter().cloned().cycle().take(len * count).collect()),
        other => other.clone(),
    })
}

/// Evaluates one comparison of a (possibly chained) comparison expression.
pub(crate) fn compare(op: CmpOp, left: &Value, right: &Value) -> RunResult<bool> {
    let ordering = |symbol| left.py_cmp(right, symbol);
    Ok(match op {
        CmpOp::Eq => left.py_eq(right),
        CmpOp::NotEq => !left.py_eq(right),
        CmpOp::Lt => ordering("<")? == Ordering::Less && !is_nan_pair(left, right),
        CmpOp::LtE => ordering("<=")? != Ordering::Greater && !is_nan_pair(left, right),
        CmpOp::Gt => ordering(">")? == Ordering::Greater && !is_nan_pair(left, right),
        CmpOp::GtE => ordering(">=")? != Ordering::Less && !is_nan_pair(left, right),
        CmpOp::Is => left.is_same(right),
        CmpOp::IsNot => !left.is_same(right),
        CmpOp::In => contains(right, left)?,
        CmpOp::NotIn => !contains(right, left)?,
    })
}

fn is_nan_pair(left: &Value, right: &Value) -> bool {
    matches!(left, Value::Float(f) if f.is_nan()) || matches!(right, Value::Float(f) if f.is_nan())
}

/// `item in container`.
pub(crate) fn contains(container: &Value, item: &Value) -> RunResult<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(ExcType::TypeError.msg(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|v| v.py_eq(item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
        Value::Dict(dict) => {
            if !item.is_hashable() {
                return Err(ExcType::TypeError.msg(format!("unhashable type: '{}'", item.type_name())));
            }
            Ok(dict.borrow().get(item).is_some())
        }
        Value::Range(range) => Ok(match item {
            Value::Float(f) => range.iter().any(|i| i as f64 == *f),
            other => other.as_int().is_some_and(|i| range.contains(i)),
        }),
        other => Err(ExcType::TypeError.msg(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

pub(crate) fn unary_op(op: UnaryOp, operand: &Value) -> RunResult<Value> {
    let bad_operand = |symbol: &str| {
        ExcType::TypeError.msg(format!("bad operand type for unary {symbol}: '{}'", operand.type_name()))
    };
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::USub => match operand {
            Value::Float(f) => Ok(Value::Float(-f)),
            other => match int_operand(other) {
                Some(i) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
                None => Err(bad_operand("-")),
            },
        },
        UnaryOp::UAdd => match operand {
            Value::Float(f) => Ok(Value::Float(*f)),
            other => int_operand(other).map(Value::Int).ok_or_else(|| bad_operand("+")),
        },
        UnaryOp::Invert => int_operand(operand).map(|i| Value::Int(!i)).ok_or_else(|| bad_operand("~")),
    }
}

/// Converts a possibly negative index into a position in `0..len`.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) { usize::try_from(index).ok() } else { None }
}

fn index_operand(container: &Value, index: &Value) -> RunResult<i64> {
    int_operand(index).ok_or_else(|| {
        let message = match container {
            Value::Str(_) => format!("string indices must be integers, not '{}'", index.type_name()),
            other => format!(
                "{} indices must be integers or slices, not {}",
                other.type_name(),
                index.type_name()
            ),
        };
        ExcType::TypeError.msg(message)
    })
}

/// `container[index]`.
pub(crate) fn get_item(container: &Value, index: &Value) -> RunResult<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let i = index_operand(container, index)?;
            normalize_index(i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| ExcType::IndexError.msg("list index out of range"))
        }
        Value::Tuple(items) => {
            let i = index_operand(container, index)?;
            normalize_index(i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| ExcType::IndexError.msg("tuple index out of range"))
        }
        Value::Str(s) => {
            let i = index_operand(container, index)?;
            normalize_index(i, s.chars().count())
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| ExcType::IndexError.msg("string index out of range"))
        }
        Value::Range(range) => {
            let i = index_operand(container, index)?;
            normalize_index(i, range.len())
                .and_then(|i| range.get(i))
                .map(Value::Int)
                .ok_or_else(|| ExcType::IndexError.msg("range object index out of range"))
        }
        Value::Dict(dict) => {
            if !index.is_hashable() {
                return Err(ExcType::TypeError.msg(format!("unhashable type: '{}'", index.type_name())));
            }
            dict.borrow()
                .get(index)
                .cloned()
                .ok_or_else(|| Exception::with_args(ExcType::KeyError, vec![index.clone()]))
        }
        other => Err(ExcType::TypeError.msg(format!("'{}' object is not subscriptable", other.type_name()))),
    }
}

/// Slice bounds after evaluation: each is `None` or an integer.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SliceBounds {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    pub step: Option<i64>,
}

impl SliceBounds {
    pub fn from_values(lower: Option<Value>, upper: Option<Value>, step: Option<Value>) -> RunResult<Self> {
        let bound = |value: Option<Value>| -> RunResult<Option<i64>> {
            match value {
                None | Some(Value::None) => Ok(None),
                Some(value) => int_operand(&value).map(Some).ok_or_else(|| {
                    ExcType::TypeError.msg("slice indices must be integers or None or have an __index__ method")
                }),
            }
        };
        Ok(Self {
            lower: bound(lower)?,
            upper: bound(upper)?,
            step: bound(step)?,
        })
    }

    /// Resolves the bounds against a sequence length: `(start, stop, step)` where iteration runs
    /// from `start` towards `stop` (exclusive) in increments of `step`.
    fn adjust(self, len: usize) -> RunResult<(i64, i64, i64)> {
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(ExcType::ValueError.msg("slice step cannot be zero"));
        }
        let clamp = |value: i64, low: i64, high: i64| {
            let value = if value < 0 { value.saturating_add(len) } else { value };
            value.clamp(low, high)
        };
        Ok(if step > 0 {
            (
                self.lower.map_or(0, |v| clamp(v, 0, len)),
                self.upper.map_or(len, |v| clamp(v, 0, len)),
                step,
            )
        } else {
            (
                self.lower.map_or(len - 1, |v| clamp(v, -1, len - 1)),
                self.upper.map_or(-1, |v| clamp(v, -1, len - 1)),
                step,
            )
        })
    }

    /// Positions selected by this slice in a sequence of `len` items.
    fn indices(self, len: usize) -> RunResult<Vec<usize>> {
        let (start, stop, step) = self.adjust(len)?;
        let mut indices = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            if let Ok(index) = usize::try_from(i) {
                indices.push(index);
            }
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(indices)
    }
}

/// `container[lower:upper:step]`.
pub(crate) fn get_slice(container: &Value, bounds: SliceBounds) -> RunResult<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let indices = bounds.indices(items.len())?;
            Ok(Value::list(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let indices = bounds.indices(items.len())?;
            Ok(Value::tuple(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let indices = bounds.indices(chars.len())?;
            Ok(Value::Str(indices.into_iter().map(|i| chars[i]).collect()))
        }
        Value::Range(range) => {
            let (start, stop, step) = bounds.adjust(range.len())?;
            let at = |i: i64| i.checked_mul(range.step).and_then(|offset| range.start.checked_add(offset));
            match (at(start), at(stop), step.checked_mul(range.step)) {
                (Some(start), Some(stop), Some(step)) => Ok(Value::Range(Range { start, stop, step })),
                _ => Err(overflow()),
            }
        }
        other => Err(ExcType::TypeError.msg(format!("'{}' object is not subscriptable", other.type_name()))),
    }
}

fn immutable(container: &Value, action: &str) -> Exception {
    ExcType::TypeError.msg(format!("'{}' object does not support item {action}", container.type_name()))
}

/// `container[index] = value`.
pub(crate) fn set_item(container: &Value, index: &Value, value: Value) -> RunResult<()> {
    match container {
        Value::List(items) => {
            let i = index_operand(container, index)?;
            let mut items = items.borrow_mut();
            let len = items.len();
            let i = normalize_index(i, len).ok_or_else(|| ExcType::IndexError.msg("list assignment index out of range"))?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(dict) => dict.borrow_mut().insert(index.clone(), value),
        other => Err(immutable(other, "assignment")),
    }
}

/// `container[lower:upper:step] = value`.
pub(crate) fn set_slice(container: &Value, bounds: SliceBounds, value: &Value) -> RunResult<()> {
    let Value::List(items) = container else {
        return Err(immutable(container, "assignment"));
    };
    let replacement = value
        .to_vec()
        .map_err(|_| ExcType::TypeError.msg("can only assign an iterable"))?;
    let mut items = items.borrow_mut();
    if bounds.step.unwrap_or(1) == 1 {
        let (start, stop, _) = bounds.adjust(items.len())?;
        let start = usize::try_from(start).unwrap_or(0);
        let stop = usize::try_from(stop).unwrap_or(0).max(start);
        items.splice(start..stop, replacement);
        return Ok(());
    }
    let indices = bounds.indices(items.len())?;
    if indices.len() != replacement.len() {
        return Err(ExcType::ValueError.msg(format!(
            "attempt to assign sequence of size {} to extended slice of size {}",
            replacement.len(),
            indices.len()
        )));
    }
    for (i, value) in indices.into_iter().zip(replacement) {
        items[i] = value;
    }
    Ok(())
}

/// `del container[index]`.
pub(crate) fn del_item(container: &Value, index: &Value) -> RunResult<()> {
    match container {
        Value::List(items) => {
            let i = index_operand(container, index)?;
            let mut items = items.borrow_mut();
            let len = items.len();
            let i = normalize_index(i, len).ok_or_else(|| ExcType::IndexError.msg("list assignment index out of range"))?;
            items.remove(i);
            Ok(())
        }
        Value::Dict(dict) => dict
            .borrow_mut()
            .remove(index)
            .map(drop)
            .ok_or_else(|| Exception::with_args(ExcType::KeyError, vec![index.clone()])),
        other => Err(immutable(other, "deletion")),
    }
}

/// `del container[lower:upper:step]`.
pub(crate) fn del_slice(container: &Value, bounds: SliceBounds) -> RunResult<()> {
    let Value::List(items) = container else {
        return Err(immutable(container, "deletion"));
    };
    let mut items = items.borrow_mut();
    let mut indices = bounds.indices(items.len())?;
    indices.sort_unstable();
    for i in indices.into_iter().rev() {
        items.remove(i);
    }
    Ok(())
}

/// Builds a dict from `(key, value)` pairs, as `dict(iterable)` does.
pub(crate) fn dict_from_pairs(pairs: &Value) -> RunResult<Dict> {
    let mut dict = Dict::new();
    for (n, pair) in pairs.iter_values()?.enumerate() {
        let items = pair.to_vec().map_err(|_| {
            ExcType::TypeError.msg(format!(
                "cannot convert dictionary update sequence element #{n} to a sequence"
            ))
        })?;
        let [key, value] = <[Value; 2]>::try_from(items).map_err(|items| {
            ExcType::ValueError.msg(format!(
                "dictionary update sequence element #{n} has length {}; 2 is required",
                items.len()
            ))
        })?;
        dict.insert(key, value)?;
    }
    Ok(dict)
}
