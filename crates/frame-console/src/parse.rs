use std::{fmt, rc::Rc};

use ruff_python_ast::{self as ast, Stmt};
use ruff_python_parser::parse_module;
use ruff_text_size::{Ranged, TextRange, TextSize};

/// Byte-offset to line mapping for one compiled statement.
#[derive(Debug, Clone)]
pub struct SourceMap {
    text: String,
    filename: String,
    line_starts: Vec<usize>,
}

impl SourceMap {
    #[must_use]
    pub fn new(text: &str, filename: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            text: text.to_owned(),
            filename: filename.to_owned(),
            line_starts,
        }
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// 1-based line containing `offset`.
    #[must_use]
    pub fn line_of(&self, offset: TextSize) -> usize {
        let offset = usize::from(offset);
        self.line_starts.partition_point(|start| *start <= offset).max(1)
    }

    /// 1-based line on which `node` starts.
    #[must_use]
    pub fn line_of_node(&self, node: &impl Ranged) -> usize {
        self.line_of(node.start())
    }

    /// Text of a 1-based line, without its newline.
    #[must_use]
    pub fn line_text(&self, line: usize) -> &str {
        let Some(start) = line.checked_sub(1).and_then(|i| self.line_starts.get(i)).copied() else {
            return "";
        };
        let end = self.line_starts.get(line).map_or(self.text.len(), |next| next - 1);
        self.text.get(start..end).unwrap_or_default().trim_end_matches('\r')
    }

    /// Source text covered by `range`.
    #[must_use]
    pub fn text_of(&self, range: TextRange) -> &str {
        self.text.get(std::ops::Range::<usize>::from(range)).unwrap_or_default()
    }

    /// 0-based character column of `offset` within its line.
    #[must_use]
    fn column_of(&self, offset: TextSize) -> usize {
        let line = self.line_of(offset);
        let start = self.line_starts[line - 1];
        let offset = usize::from(offset).min(self.text.len());
        self.text.get(start..offset).map_or(0, |prefix| prefix.chars().count())
    }
}

/// A statement that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub filename: String,
    /// 1-based line of the error.
    pub line: usize,
    /// 0-based character column of the error.
    pub column: usize,
    /// The offending source line.
    pub text: String,
}

impl ParseError {
    fn at(message: impl Into<String>, source: &SourceMap, range: TextRange) -> Self {
        let line = source.line_of(range.start());
        Self {
            message: message.into(),
            filename: source.filename().to_owned(),
            line,
            column: source.column_of(range.start()),
            text: source.line_text(line).to_owned(),
        }
    }

    /// Renders the error the way an interactive console reports it:
    ///
    /// ```text
    ///   File "<console>", line 1
    ///     x = (1 +
    ///             ^
    /// SyntaxError: unexpected EOF while parsing
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("  File \"{}\", line {}\n", self.filename, self.line);
        let trimmed = self.text.trim_start();
        if !trimmed.is_empty() {
            let indent = self.text.chars().count() - trimmed.chars().count();
            let caret = self.column.saturating_sub(indent).min(trimmed.chars().count());
            out.push_str("    ");
            out.push_str(trimmed.trim_end());
            out.push_str("\n    ");
            out.push_str(&" ".repeat(caret));
            out.push_str("^\n");
        }
        out.push_str("SyntaxError: ");
        out.push_str(&self.message);
        out.push('\n');
        out
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {} ({}, line {})", self.message, self.filename, self.line)
    }
}

impl std::error::Error for ParseError {}

/// A compiled statement: its AST plus the source needed for tracebacks.
#[derive(Debug)]
pub struct ParsedSource {
    pub body: Vec<Stmt>,
    pub source: Rc<SourceMap>,
}

/// Parses a complete console statement.
///
/// Besides the grammar, this rejects `return`, `break` and `continue` in positions the
/// Python compiler rejects, since the parser itself accepts them anywhere.
pub fn parse_source(code: &str, filename: &str) -> Result<ParsedSource, ParseError> {
    let source = SourceMap::new(code, filename);
    let parsed = parse_module(code).map_err(|e| ParseError::at(e.error.to_string(), &source, e.range()))?;
    let body: Vec<Stmt> = parsed.into_syntax().body.into_iter().collect();
    check_block(&body, Context::default(), &source)?;
    Ok(ParsedSource {
        body,
        source: Rc::new(source),
    })
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    in_function: bool,
    in_loop: bool,
}

fn check_block(body: &[Stmt], ctx: Context, source: &SourceMap) -> Result<(), ParseError> {
    body.iter().try_for_each(|stmt| check_statement(stmt, ctx, source))
}

fn check_statement(stmt: &Stmt, ctx: Context, source: &SourceMap) -> Result<(), ParseError> {
    let in_loop = Context {
        in_loop: true,
        ..ctx
    };
    match stmt {
        Stmt::Return(_) if !ctx.in_function => Err(ParseError::at("'return' outside function", source, stmt.range())),
        Stmt::Break(_) if !ctx.in_loop => Err(ParseError::at("'break' outside loop", source, stmt.range())),
        Stmt::Continue(_) if !ctx.in_loop => {
            Err(ParseError::at("'continue' not properly in loop", source, stmt.range()))
        }
        Stmt::FunctionDef(def) => check_block(
            &def.body,
            Context {
                in_function: true,
                in_loop: false,
            },
            source,
        ),
        Stmt::ClassDef(class) => check_block(
            &class.body,
            Context {
                in_function: false,
                in_loop: false,
            },
            source,
        ),
        Stmt::For(ast::StmtFor { body, orelse, .. }) | Stmt::While(ast::StmtWhile { body, orelse, .. }) => {
            check_block(body, in_loop, source)?;
            check_block(orelse, ctx, source)
        }
        Stmt::If(stmt) => {
            check_block(&stmt.body, ctx, source)?;
            stmt.elif_else_clauses
                .iter()
                .try_for_each(|clause| check_block(&clause.body, ctx, source))
        }
        Stmt::Try(stmt) => {
            check_block(&stmt.body, ctx, source)?;
            for handler in &stmt.handlers {
                let ast::ExceptHandler::ExceptHandler(handler) = handler;
                check_block(&handler.body, ctx, source)?;
            }
            check_block(&stmt.orelse, ctx, source)?;
            check_block(&stmt.finalbody, ctx, source)
        }
        Stmt::With(stmt) => check_block(&stmt.body, ctx, source),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_map_lines() {
        let map = SourceMap::new("a = 1\nb = 2\n", "<console>");
        assert_eq!(map.line_of(TextSize::new(0)), 1);
        assert_eq!(map.line_of(TextSize::new(6)), 2);
        assert_eq!(map.line_text(2), "b = 2");
        assert_eq!(map.line_text(9), "");
    }

    #[test]
    fn syntax_error_renders_caret() {
        let err = ParseError {
            message: "invalid syntax".to_owned(),
            filename: "<console>".to_owned(),
            line: 1,
            column: 6,
            text: "  x = = 1".to_owned(),
        };
        assert_eq!(
            err.render(),
            "  File \"<console>\", line 1\n    x = = 1\n        ^\nSyntaxError: invalid syntax\n"
        );
    }

    #[test]
    fn return_outside_function_is_rejected() {
        let err = parse_source("return 1\n", "<console>").unwrap_err();
        assert_eq!(err.message, "'return' outside function");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn break_inside_loop_is_accepted() {
        assert!(parse_source("for i in x:\n    break\n", "<console>").is_ok());
        assert!(parse_source("for i in x:\n    pass\nelse:\n    break\n", "<console>").is_err());
    }

    #[test]
    fn grammar_error_has_location() {
        let err = parse_source("x = (1,\n", "<console>").unwrap_err();
        assert_eq!(err.filename, "<console>");
        assert!(err.render().starts_with("  File \"<console>\", line "));
    }
}
