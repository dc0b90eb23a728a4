//! Format specifications for f-strings, `str.format()` and `%` formatting.
//!
//! Supports the standard format spec mini-language:
//! `[[fill]align][sign][#][0][width][,|_][.precision][type]`.

use crate::{
    exception::{ExcType, RunResult},
    value::{Value, float_repr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    /// Padding goes between the sign and the digits.
    AfterSign,
}

#[derive(Debug, Clone, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<Align>,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

fn invalid_spec() -> crate::exception::Exception {
    ExcType::ValueError.msg("Invalid format specifier")
}

fn parse_align(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

impl FormatSpec {
    fn parse(spec: &str) -> RunResult<Self> {
        let mut result = Self::default();
        let chars: Vec<char> = spec.chars().collect();
        let mut i = 0;
        if chars.len() >= 2
            && let Some(align) = parse_align(chars[1])
        {
            result.fill = Some(chars[0]);
            result.align = Some(align);
            i = 2;
        } else if let Some(align) = chars.first().copied().and_then(parse_align) {
            result.align = Some(align);
            i = 1;
        }
        if let Some(&c) = chars.get(i)
            && matches!(c, '+' | '-' | ' ')
        {
            result.sign = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            result.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            result.zero = true;
            i += 1;
        }
        let digits = |i: &mut usize| {
            let start = *i;
            while chars.get(*i).is_some_and(char::is_ascii_digit) {
                *i += 1;
            }
            chars[start..*i].iter().collect::<String>()
        };
        let width = digits(&mut i);
        if !width.is_empty() {
            result.width = width.parse().map_err(|_| invalid_spec())?;
        }
        if let Some(&c) = chars.get(i)
            && matches!(c, ',' | '_')
        {
            result.grouping = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let precision = digits(&mut i);
            if precision.is_empty() {
                return Err(ExcType::ValueError.msg("Format specifier missing precision"));
            }
            result.precision = Some(precision.parse().map_err(|_| invalid_spec())?);
        }
        if let Some(&c) = chars.get(i) {
            result.kind = Some(c);
            i += 1;
        }
        if i != chars.len() {
            return Err(invalid_spec());
        }
        Ok(result)
    }
}

/// Applies a format spec to a value, as `format(value, spec)` does.
pub(crate) fn format_value(value: &Value, spec: &str) -> RunResult<String> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    let spec = FormatSpec::parse(spec)?;
    let unknown = |kind: char| {
        ExcType::ValueError.msg(format!(
            "Unknown format code '{kind}' for object of type '{}'",
            value.type_name()
        ))
    };
    match value {
        Value::Str(s) => match spec.kind {
            None | Some('s') => {
                let text = match spec.precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s.clone(),
                };
                Ok(pad(&text, &spec, Align::Left))
            }
            Some(kind) => Err(unknown(kind)),
        },
        Value::Int(_) | Value::Bool(_) => {
            let i = value.as_int().unwrap_or_default();
            match spec.kind {
                None | Some('d' | 'n') => Ok(format_number(i < 0, &i.unsigned_abs().to_string(), &spec)),
                Some('x') => Ok(format_prefixed(i, format!("{:x}", i.unsigned_abs()), "0x", &spec)),
                Some('X') => Ok(format_prefixed(i, format!("{:X}", i.unsigned_abs()), "0X", &spec)),
                Some('o') => Ok(format_prefixed(i, format!("{:o}", i.unsigned_abs()), "0o", &spec)),
                Some('b') => Ok(format_prefixed(i, format!("{:b}", i.unsigned_abs()), "0b", &spec)),
                Some('c') => {
                    let c = u32::try_from(i)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| ExcType::OverflowError.msg("%c arg not in range(0x110000)"))?;
                    Ok(pad(&c.to_string(), &spec, Align::Left))
                }
                Some(kind @ ('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%')) => format_float(i as f64, kind, &spec),
                Some(kind) => Err(unknown(kind)),
            }
        }
        Value::Float(f) => match spec.kind {
            None if spec.precision.is_none() => {
                let repr = float_repr(f.abs());
                Ok(format_number(f.is_sign_negative(), &repr, &spec))
            }
            None => format_float(*f, 'g', &spec),
            Some(kind @ ('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%')) => format_float(*f, kind, &spec),
            Some(kind) => Err(unknown(kind)),
        },
        other => Err(ExcType::TypeError.msg(format!(
            "unsupported format string passed to {}.__format__",
            other.type_name()
        ))),
    }
}

fn format_prefixed(i: i64, digits: String, prefix: &str, spec: &FormatSpec) -> String {
    let digits = if spec.alternate { format!("{prefix}{digits}") } else { digits };
    format_number(i < 0, &digits, spec)
}

fn format_float(f: f64, kind: char, spec: &FormatSpec) -> RunResult<String> {
    let precision = spec.precision.unwrap_or(6);
    let abs = f.abs();
    let body = if abs.is_nan() {
        "nan".to_owned()
    } else if abs.is_infinite() {
        "inf".to_owned()
    } else {
        match kind {
            'f' | 'F' => format!("{abs:.precision$}"),
            'e' | 'E' => exponent_form(abs, precision),
            '%' => format!("{:.precision$}%", abs * 100.0),
            _ => general_form(abs, precision.max(1), spec.alternate),
        }
    };
    let body = if kind.is_ascii_uppercase() { body.to_uppercase() } else { body };
    Ok(format_number(f.is_sign_negative() && !f.is_nan(), &body, spec))
}

/// `1.500000e+03` style.
fn exponent_form(f: f64, precision: usize) -> String {
    let formatted = format!("{f:.precision$e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}

/// The `g` presentation: fixed or exponent form, whichever is shorter for the precision.
fn general_form(f: f64, precision: usize, keep_zeros: bool) -> String {
    if f == 0.0 {
        return "0".to_owned();
    }
    let exponent_str = format!("{f:.*e}", precision - 1);
    let exponent: i32 = exponent_str
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or_default();
    let precision_i32 = i32::try_from(precision).unwrap_or(i32::MAX);
    let text = if (-4..precision_i32).contains(&exponent) {
        let decimals = usize::try_from(precision_i32 - 1 - exponent).unwrap_or(0);
        format!("{f:.decimals$}")
    } else {
        exponent_form(f, precision - 1)
    };
    if keep_zeros {
        return text;
    }
    match text.split_once('e') {
        Some((mantissa, exp)) => format!("{}e{exp}", trim_fraction(mantissa)),
        None => trim_fraction(&text).to_owned(),
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Adds sign, grouping and padding to an unsigned numeric body.
fn format_number(negative: bool, body: &str, spec: &FormatSpec) -> String {
    let sign = match (negative, spec.sign) {
        (true, _) => "-",
        (false, Some('+')) => "+",
        (false, Some(' ')) => " ",
        _ => "",
    };
    let body = match spec.grouping {
        Some(separator) => group_digits(body, separator),
        None => body.to_owned(),
    };
    let mut spec = spec.clone();
    if spec.zero && spec.align.is_none() {
        spec.fill = Some(spec.fill.unwrap_or('0'));
        spec.align = Some(Align::AfterSign);
    }
    if spec.align == Some(Align::AfterSign) {
        let fill = spec.fill.unwrap_or(' ');
        let len = sign.chars().count() + body.chars().count();
        let padding: String = std::iter::repeat_n(fill, spec.width.saturating_sub(len)).collect();
        return format!("{sign}{padding}{body}");
    }
    pad(&format!("{sign}{body}"), &spec, Align::Right)
}

/// Inserts a separator every three digits of the integer part.
fn group_digits(body: &str, separator: char) -> String {
    let split = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
    let (int_part, rest) = body.split_at(split);
    let mut grouped = String::with_capacity(body.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(c);
    }
    grouped.push_str(rest);
    grouped
}

fn pad(text: &str, spec: &FormatSpec, default_align: Align) -> String {
    let len = text.chars().count();
    if len >= spec.width {
        return text.to_owned();
    }
    let fill = spec.fill.unwrap_or(' ');
    let total = spec.width - len;
    let (left, right) = match spec.align.unwrap_or(default_align) {
        Align::Left => (0, total),
        Align::Right | Align::AfterSign => (total, 0),
        Align::Center => (total / 2, total - total / 2),
    };
    let mut out = String::with_capacity(spec.width);
    out.extend(std::iter::repeat_n(fill, left));
    out.push_str(text);
    out.extend(std::iter::repeat_n(fill, right));
    out
}

/// `template % args` for strings.
pub(crate) fn percent_format(template: &str, args: &Value) -> RunResult<String> {
    let args: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    let mut args = args.into_iter();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut flags = String::new();
        while let Some(&c) = chars.peek()
            && matches!(c, '-' | '+' | ' ' | '0' | '#')
        {
            flags.push(c);
            chars.next();
        }
        let mut width = String::new();
        while let Some(&c) = chars.peek()
            && c.is_ascii_digit()
        {
            width.push(c);
            chars.next();
        }
        let mut precision = String::new();
        if chars.peek() == Some(&'.') {
            chars.next();
            precision.push('.');
            while let Some(&c) = chars.peek()
                && c.is_ascii_digit()
            {
                precision.push(c);
                chars.next();
            }
        }
        let Some(kind) = chars.next() else {
            return Err(ExcType::ValueError.msg("incomplete format"));
        };
        if kind == '%' {
            out.push('%');
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| ExcType::TypeError.msg("not enough arguments for format string"))?;
        let align = if flags.contains('-') { "<" } else { ">" };
        let zero = if flags.contains('0') && !flags.contains('-') { "0" } else { "" };
        let sign = if flags.contains('+') {
            "+"
        } else if flags.contains(' ') {
            " "
        } else {
            ""
        };
        let formatted = match kind {
            's' => format_value(&Value::Str(arg.to_string()), &format!("{align}{width}{precision}"))?,
            'r' | 'a' => format_value(&Value::Str(arg.repr()), &format!("{align}{width}{precision}"))?,
            'd' | 'i' | 'u' => {
                let number = match arg {
                    Value::Float(f) => Value::Int(f.trunc() as i64),
                    other if other.as_int().is_some() => other,
                    other => {
                        return Err(ExcType::TypeError.msg(format!(
                            "%{kind} format: a real number is required, not {}",
                            other.type_name()
                        )));
                    }
                };
                let spec = if zero.is_empty() {
                    format!("{align}{sign}{width}d")
                } else {
                    format!("{sign}0{width}d")
                };
                format_value(&number, &spec)?
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x' | 'X' | 'o' | 'c' => {
                if arg.as_float().is_none() {
                    return Err(ExcType::TypeError.msg(format!(
                        "must be real number, not {}",
                        arg.type_name()
                    )));
                }
                let spec = if zero.is_empty() {
                    format!("{align}{sign}{width}{precision}{kind}")
                } else {
                    format!("{sign}0{width}{precision}{kind}")
                };
                format_value(&arg, &spec)?
            }
            other => {
                return Err(ExcType::ValueError.msg(format!(
                    "unsupported format character '{other}' (0x{:x})",
                    u32::from(other)
                )));
            }
        };
        out.push_str(&formatted);
    }
    if args.next().is_some() {
        return Err(ExcType::TypeError.msg("not all arguments converted during string formatting"));
    }
    Ok(out)
}

/// `template.format(*args, **kwargs)`.
pub(crate) fn str_format(template: &str, args: &[Value], kwargs: &[(String, Value)]) -> RunResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(ExcType::ValueError.msg("Single '}' encountered in format string")),
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(ExcType::ValueError.msg("expected '}' before end of string")),
                    }
                }
                let (field, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let (name, conversion) = match field.split_once('!') {
                    Some((name, conversion)) => (name, Some(conversion)),
                    None => (field, None),
                };
                let value = if name.is_empty() {
                    let value = args.get(auto_index).cloned();
                    auto_index += 1;
                    value.ok_or_else(|| {
                        ExcType::IndexError.msg(format!(
                            "Replacement index {} out of range for positional args tuple",
                            auto_index - 1
                        ))
                    })?
                } else if let Ok(index) = name.parse::<usize>() {
                    args.get(index).cloned().ok_or_else(|| {
                        ExcType::IndexError.msg(format!(
                            "Replacement index {index} out of range for positional args tuple"
                        ))
                    })?
                } else {
                    kwargs
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| value.clone())
                        .ok_or_else(|| crate::exception::Exception::with_args(ExcType::KeyError, vec![Value::str(name)]))?
                };
                let value = match conversion {
                    None => value,
                    Some("r" | "a") => Value::Str(value.repr()),
                    Some("s") => Value::Str(value.to_string()),
                    Some(other) => {
                        return Err(ExcType::ValueError.msg(format!(
                            "Unknown conversion specifier {other}"
                        )));
                    }
                };
                out.push_str(&format_value(&value, spec)?);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}
