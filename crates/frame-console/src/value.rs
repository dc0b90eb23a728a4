//! Runtime values of the console evaluator.
//!
//! Scalars are stored inline; lists and dicts are shared through `Rc<RefCell<_>>` so that
//! aliasing behaves like Python (`b = a; b.append(1)` mutates `a` too).

use std::{cell::RefCell, cmp::Ordering, fmt, rc::Rc};

use crate::{
    builtins::Builtin,
    exception::{ExcType, Exception, RunResult},
    function::Function,
};

/// Maximum nesting depth walked by `repr()` and equality before giving up.
///
/// Guards against self-referential containers such as `a = []; a.append(a)`.
#[cfg(debug_assertions)]
pub const MAX_DATA_RECURSION_DEPTH: u16 = 100;
#[cfg(not(debug_assertions))]
pub const MAX_DATA_RECURSION_DEPTH: u16 = 500;

/// A value produced by console code.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Dict(Rc<RefCell<Dict>>),
    Range(Range),
    /// A function defined in the console.
    Function(Rc<Function>),
    Builtin(Builtin),
    /// A method looked up on a builtin value, e.g. `items.append`.
    Method(Rc<BoundMethod>),
    /// An exception class such as `ValueError`.
    ExcClass(ExcType),
    /// An exception instance, e.g. the result of `ValueError("bad")`.
    Exception(Rc<Exception>),
}

impl Value {
    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(items.into())
    }

    #[must_use]
    pub fn dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    /// The Python type name, as used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Range(_) => "range",
            Self::Function(_) => "function",
            Self::Builtin(builtin) if builtin.is_type() => "type",
            Self::Builtin(_) | Self::Method(_) => "builtin_function_or_method",
            Self::ExcClass(_) => "type",
            Self::Exception(exc) => exc.exc_type().into(),
        }
    }

    /// Python truthiness.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::Dict(dict) => !dict.borrow().is_empty(),
            Self::Range(range) => range.len() != 0,
            _ => true,
        }
    }

    /// Integer view of `bool` and `int` values.
    #[must_use]
    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view of any numeric value.
    #[must_use]
    pub(crate) fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            other => other.as_int().map(|i| i as f64),
        }
    }

    /// Whether the value may be used as a dict key.
    #[must_use]
    pub fn is_hashable(&self) -> bool {
        match self {
            Self::List(_) | Self::Dict(_) => false,
            Self::Tuple(items) => items.iter().all(Self::is_hashable),
            _ => true,
        }
    }

    /// Python `repr()`.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, 0);
        out
    }

    fn write_repr(&self, out: &mut String, depth: u16) {
        if depth > MAX_DATA_RECURSION_DEPTH {
            out.push_str("...");
            return;
        }
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => out.push_str(&i.to_string()),
            Self::Float(f) => out.push_str(&float_repr(*f)),
            Self::Str(s) => out.push_str(&string_repr(s)),
            Self::List(items) => {
                out.push('[');
                write_items(out, &items.borrow(), depth);
                out.push(']');
            }
            Self::Tuple(items) => {
                out.push('(');
                write_items(out, items, depth);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Self::Dict(dict) => {
                out.push('{');
                for (i, (key, value)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out, depth + 1);
                    out.push_str(": ");
                    value.write_repr(out, depth + 1);
                }
                out.push('}');
            }
            Self::Range(range) => out.push_str(&range.to_string()),
            Self::Function(function) => {
                out.push_str("<function ");
                out.push_str(function.name());
                out.push('>');
            }
            Self::Builtin(builtin) if builtin.is_type() => {
                out.push_str("<class '");
                out.push_str(builtin.into());
                out.push_str("'>");
            }
            Self::Builtin(builtin) => {
                out.push_str("<built-in function ");
                out.push_str(builtin.into());
                out.push('>');
            }
            Self::Method(method) => {
                out.push_str("<built-in method ");
                out.push_str(&method.name);
                out.push_str(" of ");
                out.push_str(method.receiver.type_name());
                out.push_str(" object>");
            }
            Self::ExcClass(exc_type) => {
                out.push_str("<class '");
                out.push_str(exc_type.into());
                out.push_str("'>");
            }
            Self::Exception(exc) => {
                out.push_str(exc.exc_type().into());
                out.push('(');
                write_items(out, exc.args(), depth);
                out.push(')');
            }
        }
    }

    /// Python equality (`==`), treating `bool`, `int` and `float` as one numeric tower.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.eq_depth(other, 0)
    }

    fn eq_depth(&self, other: &Self, depth: u16) -> bool {
        if depth > MAX_DATA_RECURSION_DEPTH {
            return false;
        }
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                Rc::ptr_eq(a, b) || seq_eq(&a.borrow(), &b.borrow(), depth)
            }
            (Self::Tuple(a), Self::Tuple(b)) => seq_eq(a, b, depth),
            (Self::Dict(a), Self::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).is_some_and(|other| value.eq_depth(other, depth + 1)))
            }
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Method(a), Self::Method(b)) => Rc::ptr_eq(a, b),
            (Self::ExcClass(a), Self::ExcClass(b)) => a == b,
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => match (a.as_float(), b.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            },
        }
    }

    /// Python identity (`is`): same object for shared values, same value for scalars.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Method(a), Self::Method(b)) => Rc::ptr_eq(a, b),
            (Self::ExcClass(a), Self::ExcClass(b)) => a == b,
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`, `sorted()`, `min()` and `max()`.
    pub(crate) fn py_cmp(&self, other: &Self, op: &str) -> RunResult<Ordering> {
        self.cmp_depth(other, op, 0)
    }

    fn cmp_depth(&self, other: &Self, op: &str, depth: u16) -> RunResult<Ordering> {
        if depth > MAX_DATA_RECURSION_DEPTH {
            return Err(ExcType::RecursionError.msg("maximum recursion depth exceeded in comparison"));
        }
        let unorderable = || {
            ExcType::TypeError.msg(format!(
                "'{op}' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))
        };
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Ok(a.cmp(b)),
            (Self::List(a), Self::List(b)) => seq_cmp(&a.borrow(), &b.borrow(), op, depth),
            (Self::Tuple(a), Self::Tuple(b)) => seq_cmp(a, b, op, depth),
            (a, b) => {
                if let (Some(a), Some(b)) = (a.as_int(), b.as_int()) {
                    return Ok(a.cmp(&b));
                }
                match (a.as_float(), b.as_float()) {
                    // NaN compares false both ways, which sorts as "equal"
                    (Some(a), Some(b)) => Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal)),
                    _ => Err(unorderable()),
                }
            }
        }
    }

    /// Iterates the value the way a `for` loop does.
    ///
    /// Mutable containers are snapshotted, so mutating a list inside its own loop does not
    /// affect the iteration.
    pub(crate) fn iter_values(&self) -> RunResult<Box<dyn Iterator<Item = Self>>> {
        match self {
            Self::List(items) => Ok(Box::new(items.borrow().clone().into_iter())),
            Self::Tuple(items) => Ok(Box::new(items.to_vec().into_iter())),
            Self::Str(s) => Ok(Box::new(
                s.chars().map(|c| Self::Str(c.to_string())).collect::<Vec<_>>().into_iter(),
            )),
            Self::Dict(dict) => Ok(Box::new(dict.borrow().keys().cloned().collect::<Vec<_>>().into_iter())),
            Self::Range(range) => Ok(Box::new(range.iter().map(Self::Int))),
            other => Err(ExcType::TypeError.msg(format!("'{}' object is not iterable", other.type_name()))),
        }
    }

    /// Collects the iteration into a vector.
    pub(crate) fn to_vec(&self) -> RunResult<Vec<Self>> {
        Ok(self.iter_values()?.collect())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

/// `str()` formatting.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Exception(exc) => f.write_str(&exc.message()),
            other => f.write_str(&other.repr()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

fn write_items(out: &mut String, items: &[Value], depth: u16) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_repr(out, depth + 1);
    }
}

fn seq_eq(a: &[Value], b: &[Value], depth: u16) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.eq_depth(b, depth + 1))
}

fn seq_cmp(a: &[Value], b: &[Value], op: &str, depth: u16) -> RunResult<Ordering> {
    for (a, b) in a.iter().zip(b) {
        if !a.eq_depth(b, depth + 1) {
            return a.cmp_depth(b, op, depth + 1);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Formats a float the way Python's `repr()` does.
#[must_use]
pub(crate) fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        // Rust renders `1e16` / `1.5e-5`; Python wants `1e+16` / `1.5e-05`
        let formatted = format!("{f:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => formatted,
        };
    }
    if f == f.trunc() {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// Quotes a string the way Python's `repr()` does.
#[must_use]
pub(crate) fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let code = u32::from(c);
                if code < 0x100 {
                    out.push_str(&format!("\\x{code:02x}"));
                } else {
                    out.push_str(&format!("\\u{code:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// An insertion-ordered dict.
///
/// Keys are compared with Python equality, so `1`, `1.0` and `True` address the same entry.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k.py_eq(key)).map(|(_, v)| v)
    }

    /// Inserts or replaces an entry, keeping the original position of an existing key.
    pub fn insert(&mut self, key: Value, value: Value) -> RunResult<()> {
        if !key.is_hashable() {
            return Err(ExcType::TypeError.msg(format!("unhashable type: '{}'", key.type_name())));
        }
        match self.entries.iter_mut().find(|(k, _)| k.py_eq(&key)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k.py_eq(key))?;
        Some(self.entries.remove(index).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

/// A `range(start, stop, step)` object. `step` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    #[must_use]
    pub fn len(&self) -> usize {
        let (start, stop, step) = (i128::from(self.start), i128::from(self.stop), i128::from(self.step));
        let len = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && start > stop {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        };
        usize::try_from(len).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at `index`, which must be in `0..len()`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        let offset = i64::try_from(index).ok()?.checked_mul(self.step)?;
        self.start.checked_add(offset)
    }

    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= value && value < self.stop
        } else {
            self.stop < value && value <= self.start
        };
        in_bounds && (i128::from(value) - i128::from(self.start)) % i128::from(self.step) == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + use<> {
        let range = *self;
        (0..range.len()).map_while(move |index| range.get(index))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step == 1 {
            write!(f, "range({}, {})", self.start, self.stop)
        } else {
            write!(f, "range({}, {}, {})", self.start, self.stop, self.step)
        }
    }
}

/// A method bound to its receiver, e.g. the value of `items.append`.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub receiver: Value,
    pub name: String,
}
