//! Incremental statement buffering for the interactive console.
//!
//! Lines arrive one at a time. The buffer decides after each line whether the accumulated
//! source is a complete statement or whether the console should answer "more input needed",
//! following the rules of an interactive Python prompt: open brackets, unterminated triple-quoted
//! strings and trailing backslashes continue the statement, and a compound statement (`if`,
//! `def`, a decorator, ...) only ends at a blank line.

/// Keywords that open a compound statement when they start the first line.
const COMPOUND_KEYWORDS: [&str; 8] = ["if", "for", "while", "def", "class", "try", "with", "async"];

/// What the buffer holds after a line was pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferState {
    /// The statement is incomplete; keep the lines and ask for another.
    NeedsMore,
    /// Only blank lines or comments were entered; there is nothing to run.
    Empty,
    /// A complete statement, newline-terminated. The buffer has been reset.
    Complete(String),
}

/// Accumulates physical lines until they form a complete statement.
#[derive(Debug, Default, Clone)]
pub struct StatementBuffer {
    lines: Vec<String>,
}

impl StatementBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one line (without its newline) and reports whether the statement is complete.
    pub fn push(&mut self, line: &str) -> BufferState {
        self.lines.push(line.trim_end_matches(['\r', '\n']).to_owned());
        let source = self.lines.join("\n");
        if needs_more_input(&source, self.opens_block(), line.trim().is_empty()) {
            return BufferState::NeedsMore;
        }
        self.lines.clear();
        if source.lines().all(|line| strip_comment(line).trim().is_empty()) {
            BufferState::Empty
        } else {
            BufferState::Complete(source + "\n")
        }
    }

    /// Drops any partially entered statement.
    pub fn reset(&mut self) {
        self.lines.clear();
    }

    /// Whether a statement is partially entered.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.lines.is_empty()
    }

    /// The partially entered lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn opens_block(&self) -> bool {
        let Some(start) = self.lines.iter().position(|line| !strip_comment(line).trim().is_empty()) else {
            return false;
        };
        let first = strip_comment(&self.lines[start]).trim();
        if first.starts_with('@') || first.ends_with(':') {
            return true;
        }
        let keyword = first
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .next()
            .unwrap_or_default();
        COMPOUND_KEYWORDS.contains(&keyword)
            && first.len() > keyword.len()
            && header_has_colon(&self.lines[start..].join("\n"))
    }
}

/// Whether `source` is an incomplete statement.
///
/// `in_block` is true when the first line opens a compound statement; such statements are only
/// complete once a blank line (`last_line_blank`) has been entered.
fn needs_more_input(source: &str, in_block: bool, last_line_blank: bool) -> bool {
    let scan = scan(source);
    if scan.bracket_depth > 0 || scan.open_triple_quote {
        return true;
    }
    if source.trim_end_matches(['\r', '\n']).ends_with('\\') {
        return true;
    }
    in_block && !last_line_blank
}

#[derive(Debug, Default)]
struct Scan {
    bracket_depth: usize,
    open_triple_quote: bool,
}

/// Tracks bracket depth and string state, skipping string contents and comments.
fn scan(source: &str) -> Scan {
    let mut result = Scan::default();
    let mut chars = source.chars().peekable();
    // (quote char, is triple-quoted)
    let mut string: Option<(char, bool)> = None;
    while let Some(c) = chars.next() {
        if let Some((quote, triple)) = string {
            match c {
                '\\' => {
                    chars.next();
                }
                '\n' if !triple => string = None,
                c if c == quote => {
                    if !triple {
                        string = None;
                    } else if chars.peek() == Some(&quote) {
                        chars.next();
                        if chars.peek() == Some(&quote) {
                            chars.next();
                            string = None;
                        }
                    }
                }
                _ => {}
            }
            continue;
        }
        match c {
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '\'' | '"' => {
                let mut lookahead = chars.clone();
                if lookahead.next() == Some(c) && lookahead.next() == Some(c) {
                    chars.next();
                    chars.next();
                    string = Some((c, true));
                } else {
                    string = Some((c, false));
                }
            }
            '(' | '[' | '{' => result.bracket_depth += 1,
            ')' | ']' | '}' => result.bracket_depth = result.bracket_depth.saturating_sub(1),
            _ => {}
        }
    }
    result.open_triple_quote = matches!(string, Some((_, true)));
    result
}

/// Whether the logical line starting `source` has a `:` outside brackets and strings, as the
/// header of `if x: y` or `def f(a: int): ...` does.
fn header_has_colon(source: &str) -> bool {
    let mut depth = 0usize;
    let mut chars = source.chars().peekable();
    // (quote char, is triple-quoted)
    let mut string: Option<(char, bool)> = None;
    while let Some(c) = chars.next() {
        if let Some((quote, triple)) = string {
            match c {
                '\\' => {
                    chars.next();
                }
                c if c == quote && !triple => string = None,
                c if c == quote => {
                    let mut lookahead = chars.clone();
                    if lookahead.next() == Some(quote) && lookahead.next() == Some(quote) {
                        chars.next();
                        chars.next();
                        string = None;
                    }
                }
                _ => {}
            }
            continue;
        }
        match c {
            '\\' => {
                chars.next();
            }
            '#' => {
                while chars.next_if(|&c| c != '\n').is_some() {}
            }
            '\'' | '"' => {
                let mut lookahead = chars.clone();
                let triple = lookahead.next() == Some(c) && lookahead.next() == Some(c);
                if triple {
                    chars.next();
                    chars.next();
                }
                string = Some((c, triple));
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 && chars.peek() != Some(&'=') => return true,
            '\n' if depth == 0 => return false,
            _ => {}
        }
    }
    false
}

/// The code part of a single line, with any trailing comment removed.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '#' => return &line[..i],
            None if c == '\'' || c == '"' => quote = Some(c),
            None => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(lines: &[&str]) -> Vec<BufferState> {
        let mut buffer = StatementBuffer::new();
        lines.iter().map(|line| buffer.push(line)).collect()
    }

    #[test]
    fn simple_statement_completes() {
        assert_eq!(feed(&["x = 1"]), vec![BufferState::Complete("x = 1\n".to_owned())]);
    }

    #[test]
    fn blank_and_comment_lines_are_empty() {
        assert_eq!(feed(&["", "   ", "# note"]), vec![BufferState::Empty; 3]);
    }

    #[test]
    fn block_ends_at_blank_line() {
        assert_eq!(
            feed(&["if x:", "    y = 1", ""]),
            vec![
                BufferState::NeedsMore,
                BufferState::NeedsMore,
                BufferState::Complete("if x:\n    y = 1\n\n".to_owned()),
            ]
        );
    }

    #[test]
    fn one_line_compound_statement_still_needs_blank_line() {
        assert_eq!(feed(&["def f(): return 1"]), vec![BufferState::NeedsMore]);
        assert_eq!(feed(&["iffy = 2"]), vec![BufferState::Complete("iffy = 2\n".to_owned())]);
    }

    #[test]
    fn keyword_line_without_colon_completes() {
        assert_eq!(feed(&["if x"]), vec![BufferState::Complete("if x\n".to_owned())]);
        assert_eq!(feed(&["def f()"]), vec![BufferState::Complete("def f()\n".to_owned())]);
        assert_eq!(
            feed(&["while {'a': 1}"]),
            vec![BufferState::Complete("while {'a': 1}\n".to_owned())],
            "a colon inside brackets is not a header colon"
        );
        assert_eq!(feed(&["if s == ':'"]), vec![BufferState::Complete("if s == ':'\n".to_owned())]);
    }

    #[test]
    fn header_colon_after_bracketed_condition() {
        assert_eq!(
            feed(&["if (a and", "        b): pass", ""]),
            vec![
                BufferState::NeedsMore,
                BufferState::NeedsMore,
                BufferState::Complete("if (a and\n        b): pass\n\n".to_owned()),
            ]
        );
        assert_eq!(feed(&["def f(x: int) -> int: return x"]), vec![BufferState::NeedsMore]);
    }

    #[test]
    fn open_brackets_continue() {
        let states = feed(&["x = [1,", "", "2]"]);
        assert_eq!(states[0], BufferState::NeedsMore);
        assert_eq!(states[1], BufferState::NeedsMore);
        assert_eq!(states[2], BufferState::Complete("x = [1,\n\n2]\n".to_owned()));
    }

    #[test]
    fn brackets_inside_strings_and_comments_are_ignored() {
        assert_eq!(feed(&["s = '('  # ["]), vec![BufferState::Complete("s = '('  # [\n".to_owned())]);
    }

    #[test]
    fn triple_quoted_string_continues() {
        let states = feed(&["s = \"\"\"a", "b\"\"\""]);
        assert_eq!(states[0], BufferState::NeedsMore);
        assert_eq!(states[1], BufferState::Complete("s = \"\"\"a\nb\"\"\"\n".to_owned()));
    }

    #[test]
    fn backslash_continues() {
        assert_eq!(feed(&["x = 1 + \\"]), vec![BufferState::NeedsMore]);
    }

    #[test]
    fn comment_after_colon_still_opens_block() {
        assert_eq!(feed(&["while x:  # loop"]), vec![BufferState::NeedsMore]);
    }

    #[test]
    fn reset_discards_pending_lines() {
        let mut buffer = StatementBuffer::new();
        assert_eq!(buffer.push("for i in x:"), BufferState::NeedsMore);
        assert!(buffer.is_pending());
        buffer.reset();
        assert!(!buffer.is_pending());
        assert_eq!(buffer.push("y"), BufferState::Complete("y\n".to_owned()));
    }
}
