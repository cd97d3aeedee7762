//! Template parser — source markup → [`Program`].
//!
//! Two passes: a scanner that classifies `{…}` blocks into tokens
//! (honoring quotes inside expressions, so `{if $x == "}"}` works), then a
//! tree builder that nests `{if}` / `{loop}` bodies. An opening brace not
//! followed by a recognized construct is literal text.
//!
//! Registered tags are applied *before* this parser runs — by the time a
//! source string gets here it contains only built-in constructs and text.

use vellum_core::config::Settings;

use crate::error::CompileError;
use crate::program::{CmpOp, Expr, Op, Program};

/// Compile template source into a [`Program`].
///
/// `settings.sandbox` rejects `{call}` constructs; `settings.auto_escape`
/// is an execution-time concern and does not affect the compiled ops.
pub fn compile(source: &str, settings: &Settings) -> Result<Program, CompileError> {
    let tokens = tokenize(source, settings)?;
    let mut parser = TreeParser { tokens, pos: 0 };
    let (ops, stop) = parser.parse_ops()?;
    match stop {
        Stop::Eof => Ok(Program::new(ops)),
        Stop::Elseif(..) | Stop::Else => Err(CompileError::UnknownSyntax {
            fragment: "{else}".to_owned(),
        }),
        Stop::EndIf => Err(CompileError::UnknownSyntax {
            fragment: "{/if}".to_owned(),
        }),
        Stop::EndLoop => Err(CompileError::UnknownSyntax {
            fragment: "{/loop}".to_owned(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Token {
    Text(String),
    Interp { expr: Expr, raw: bool },
    If { expr: Expr, fragment: String },
    Elseif(Expr),
    Else,
    EndIf,
    Loop { expr: Expr, var: String, fragment: String },
    EndLoop,
    Call { name: String, args: Vec<Expr> },
}

fn snippet(s: &str) -> String {
    s.chars().take(40).collect()
}

/// Byte offset of the `}` closing the block starting at `block[0] == '{'`,
/// skipping braces inside single- or double-quoted strings.
fn find_block_end(block: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in block.char_indices().skip(1) {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '}' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

fn tokenize(source: &str, settings: &Settings) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut rest = source;

    let mut flush = |text: &mut String, tokens: &mut Vec<Token>| {
        if !text.is_empty() {
            tokens.push(Token::Text(std::mem::take(text)));
        }
    };

    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let block = &rest[open..];

        // {* comment *} — stripped.
        if let Some(inner) = block.strip_prefix("{*") {
            let Some(end) = inner.find("*}") else {
                return Err(CompileError::Unterminated {
                    construct: "comment".to_owned(),
                    fragment: snippet(block),
                });
            };
            rest = &inner[end + 2..];
            continue;
        }

        // {noparse} … {/noparse} — literal region.
        if let Some(inner) = block.strip_prefix("{noparse}") {
            let Some(end) = inner.find("{/noparse}") else {
                return Err(CompileError::Unterminated {
                    construct: "noparse".to_owned(),
                    fragment: snippet(block),
                });
            };
            text.push_str(&inner[..end]);
            rest = &inner[end + "{/noparse}".len()..];
            continue;
        }

        let token = if block.starts_with("{$") {
            let end = find_block_end(block).ok_or_else(|| CompileError::Unterminated {
                construct: "interpolation".to_owned(),
                fragment: snippet(block),
            })?;
            let token = parse_interp(&block[1..end])?;
            rest = &block[end + 1..];
            Some(token)
        } else if block.starts_with("{if ") {
            let end = find_block_end(block).ok_or_else(|| CompileError::Unterminated {
                construct: "if".to_owned(),
                fragment: snippet(block),
            })?;
            let fragment = block[..=end].to_owned();
            let expr = parse_expr(&block[4..end])?;
            rest = &block[end + 1..];
            Some(Token::If { expr, fragment })
        } else if block.starts_with("{elseif ") {
            let end = find_block_end(block).ok_or_else(|| CompileError::Unterminated {
                construct: "elseif".to_owned(),
                fragment: snippet(block),
            })?;
            let expr = parse_expr(&block[8..end])?;
            rest = &block[end + 1..];
            Some(Token::Elseif(expr))
        } else if let Some(after) = block.strip_prefix("{else}") {
            rest = after;
            Some(Token::Else)
        } else if let Some(after) = block.strip_prefix("{/if}") {
            rest = after;
            Some(Token::EndIf)
        } else if block.starts_with("{loop ") {
            let end = find_block_end(block).ok_or_else(|| CompileError::Unterminated {
                construct: "loop".to_owned(),
                fragment: snippet(block),
            })?;
            let fragment = block[..=end].to_owned();
            let (expr, var) = parse_loop_head(&block[6..end])?;
            rest = &block[end + 1..];
            Some(Token::Loop {
                expr,
                var,
                fragment,
            })
        } else if let Some(after) = block.strip_prefix("{/loop}") {
            rest = after;
            Some(Token::EndLoop)
        } else if block.starts_with("{call ") {
            if settings.sandbox {
                return Err(CompileError::Sandboxed {
                    fragment: snippet(block),
                });
            }
            let end = find_block_end(block).ok_or_else(|| CompileError::Unterminated {
                construct: "call".to_owned(),
                fragment: snippet(block),
            })?;
            let (name, args) = parse_call(&block[6..end])?;
            rest = &block[end + 1..];
            Some(Token::Call { name, args })
        } else {
            // Not a construct: a literal brace.
            text.push('{');
            rest = &block[1..];
            None
        };

        if let Some(token) = token {
            flush(&mut text, &mut tokens);
            tokens.push(token);
        }
    }

    text.push_str(rest);
    flush(&mut text, &mut tokens);
    Ok(tokens)
}

/// `$path.to.value` with optional `|raw` modifier (content between braces).
fn parse_interp(inner: &str) -> Result<Token, CompileError> {
    let mut parts = inner.split('|');
    let path = parts.next().unwrap_or_default();
    let mut raw = false;
    for modifier in parts {
        match modifier.trim() {
            "raw" => raw = true,
            other => {
                return Err(CompileError::UnknownSyntax {
                    fragment: format!("{{{inner}}} (modifier '{other}')"),
                })
            }
        }
    }
    let expr = parse_expr(path)?;
    Ok(Token::Interp { expr, raw })
}

/// `$expr as $var` (content of a `{loop …}` head).
fn parse_loop_head(inner: &str) -> Result<(Expr, String), CompileError> {
    let Some(split) = inner.rfind(" as ") else {
        return Err(CompileError::BadExpr {
            fragment: inner.to_owned(),
            reason: "loop head must be '$expr as $var'".to_owned(),
        });
    };
    let expr = parse_expr(&inner[..split])?;
    let var = inner[split + 4..].trim();
    let Some(ident) = var.strip_prefix('$') else {
        return Err(CompileError::BadExpr {
            fragment: inner.to_owned(),
            reason: "loop variable must start with '$'".to_owned(),
        });
    };
    if ident.is_empty() || !ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CompileError::BadExpr {
            fragment: inner.to_owned(),
            reason: format!("invalid loop variable '{var}'"),
        });
    }
    Ok((expr, ident.to_owned()))
}

/// `name(arg, …)` or bare `name` (content of a `{call …}` head).
fn parse_call(inner: &str) -> Result<(String, Vec<Expr>), CompileError> {
    let inner = inner.trim();
    let (name, args) = match inner.find('(') {
        None => (inner, Vec::new()),
        Some(open) => {
            let Some(rest) = inner[open + 1..].strip_suffix(')') else {
                return Err(CompileError::Unterminated {
                    construct: "call arguments".to_owned(),
                    fragment: inner.to_owned(),
                });
            };
            (&inner[..open], parse_expr_list(rest)?)
        }
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CompileError::BadExpr {
            fragment: inner.to_owned(),
            reason: format!("invalid function name '{name}'"),
        });
    }
    Ok((name.to_owned(), args))
}

// ---------------------------------------------------------------------------
// Tree builder
// ---------------------------------------------------------------------------

enum Stop {
    Eof,
    Elseif(Expr),
    Else,
    EndIf,
    EndLoop,
}

struct TreeParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl TreeParser {
    fn parse_ops(&mut self) -> Result<(Vec<Op>, Stop), CompileError> {
        let mut ops = Vec::new();
        while self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;
            match token {
                Token::Text(s) => ops.push(Op::Text(s)),
                Token::Interp { expr, raw } => ops.push(Op::Interp { expr, raw }),
                Token::Call { name, args } => ops.push(Op::Call { name, args }),
                Token::If { expr, fragment } => ops.push(self.parse_if(expr, &fragment)?),
                Token::Loop {
                    expr,
                    var,
                    fragment,
                } => ops.push(self.parse_loop(expr, var, &fragment)?),
                Token::Elseif(expr) => return Ok((ops, Stop::Elseif(expr))),
                Token::Else => return Ok((ops, Stop::Else)),
                Token::EndIf => return Ok((ops, Stop::EndIf)),
                Token::EndLoop => return Ok((ops, Stop::EndLoop)),
            }
        }
        Ok((ops, Stop::Eof))
    }

    fn parse_if(&mut self, cond: Expr, fragment: &str) -> Result<Op, CompileError> {
        let mut branches = Vec::new();
        let mut fallback = Vec::new();
        let mut current = cond;
        loop {
            let (body, stop) = self.parse_ops()?;
            match stop {
                Stop::Elseif(next) => {
                    branches.push((current, body));
                    current = next;
                }
                Stop::Else => {
                    branches.push((current, body));
                    let (else_body, stop) = self.parse_ops()?;
                    if !matches!(stop, Stop::EndIf) {
                        return Err(CompileError::Unterminated {
                            construct: "if".to_owned(),
                            fragment: snippet(fragment),
                        });
                    }
                    fallback = else_body;
                    break;
                }
                Stop::EndIf => {
                    branches.push((current, body));
                    break;
                }
                Stop::Eof | Stop::EndLoop => {
                    return Err(CompileError::Unterminated {
                        construct: "if".to_owned(),
                        fragment: snippet(fragment),
                    });
                }
            }
        }
        Ok(Op::If { branches, fallback })
    }

    fn parse_loop(&mut self, expr: Expr, var: String, fragment: &str) -> Result<Op, CompileError> {
        let (body, stop) = self.parse_ops()?;
        if !matches!(stop, Stop::EndLoop) {
            return Err(CompileError::Unterminated {
                construct: "loop".to_owned(),
                fragment: snippet(fragment),
            });
        }
        Ok(Op::Loop { expr, var, body })
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Parse one expression (`$path`, literals, `!`, comparisons, `&&`/`||`).
fn parse_expr(src: &str) -> Result<Expr, CompileError> {
    let mut parser = ExprParser { src, pos: 0 };
    let expr = parser.or()?;
    parser.skip_ws();
    if parser.pos != src.len() {
        return Err(parser.err("trailing input"));
    }
    Ok(expr)
}

/// Parse a comma-separated expression list (call arguments).
fn parse_expr_list(src: &str) -> Result<Vec<Expr>, CompileError> {
    let mut parser = ExprParser { src, pos: 0 };
    let mut args = Vec::new();
    parser.skip_ws();
    if parser.pos == src.len() {
        return Ok(args);
    }
    loop {
        args.push(parser.or()?);
        parser.skip_ws();
        if parser.pos == src.len() {
            return Ok(args);
        }
        if !parser.eat(",") {
            return Err(parser.err("expected ','"));
        }
    }
}

struct ExprParser<'a> {
    src: &'a str,
    pos: usize,
}

impl ExprParser<'_> {
    fn err(&self, reason: &str) -> CompileError {
        CompileError::BadExpr {
            fragment: self.src.trim().to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn skip_ws(&mut self) {
        self.pos += self.src[self.pos..]
            .len()
            .saturating_sub(self.src[self.pos..].trim_start().len());
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Expr, CompileError> {
        let mut terms = vec![self.and()?];
        loop {
            self.skip_ws();
            if !self.eat("||") {
                break;
            }
            terms.push(self.and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Or(terms)
        })
    }

    fn and(&mut self) -> Result<Expr, CompileError> {
        let mut terms = vec![self.cmp()?];
        loop {
            self.skip_ws();
            if !self.eat("&&") {
                break;
            }
            terms.push(self.cmp()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::And(terms)
        })
    }

    fn cmp(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.unary()?;
        self.skip_ws();
        // Two-char operators first so "<=" is not read as "<".
        for (token, op) in [
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
        ] {
            if self.eat(token) {
                let rhs = self.unary()?;
                return Ok(Expr::Cmp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                });
            }
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        self.skip_ws();
        if self.eat("!") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.or()?;
                self.skip_ws();
                if !self.eat(")") {
                    return Err(self.err("expected ')'"));
                }
                Ok(inner)
            }
            Some('$') => self.path(),
            Some(q @ ('"' | '\'')) => self.string(q),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(_) => {
                if self.eat_word("true") {
                    Ok(Expr::Bool(true))
                } else if self.eat_word("false") {
                    Ok(Expr::Bool(false))
                } else {
                    Err(self.err("expected $path, literal, or '('"))
                }
            }
            None => Err(self.err("unexpected end of expression")),
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        let rest = &self.src[self.pos..];
        if rest.starts_with(word) {
            let next = rest[word.len()..].chars().next();
            if !matches!(next, Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                self.pos += word.len();
                return true;
            }
        }
        false
    }

    fn path(&mut self) -> Result<Expr, CompileError> {
        self.pos += 1; // '$'
        let mut segments = Vec::new();
        loop {
            let rest = &self.src[self.pos..];
            let len = rest
                .char_indices()
                .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
                .count();
            if len == 0 {
                return Err(self.err("empty path segment"));
            }
            segments.push(rest[..len].to_owned());
            self.pos += len;
            if !self.eat(".") {
                break;
            }
        }
        Ok(Expr::Var(segments))
    }

    fn string(&mut self, quote: char) -> Result<Expr, CompileError> {
        self.pos += quote.len_utf8();
        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            if c == '\\' {
                let Some((_, escaped)) = chars.next() else {
                    return Err(self.err("dangling escape"));
                };
                out.push(escaped);
            } else if c == quote {
                self.pos += i + quote.len_utf8();
                return Ok(Expr::Str(out));
            } else {
                out.push(c);
            }
        }
        Err(self.err("unterminated string literal"))
    }

    fn number(&mut self) -> Result<Expr, CompileError> {
        let rest = &self.src[self.pos..];
        let len = rest
            .char_indices()
            .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-'))
            .count();
        let literal = &rest[..len];
        let value: f64 = literal
            .parse()
            .map_err(|_| self.err(&format!("invalid number '{literal}'")))?;
        self.pos += len;
        Ok(Expr::Num(value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    fn ops(source: &str) -> Vec<Op> {
        compile(source, &settings()).unwrap().ops
    }

    #[test]
    fn plain_text_is_one_op() {
        assert_eq!(ops("hello"), vec![Op::Text("hello".into())]);
    }

    #[test]
    fn interpolation_with_dotted_path() {
        assert_eq!(
            ops("{$user.name}"),
            vec![Op::Interp {
                expr: Expr::Var(vec!["user".into(), "name".into()]),
                raw: false,
            }]
        );
    }

    #[test]
    fn raw_modifier_disables_escaping() {
        assert_eq!(
            ops("{$html|raw}"),
            vec![Op::Interp {
                expr: Expr::Var(vec!["html".into()]),
                raw: true,
            }]
        );
    }

    #[test]
    fn unknown_modifier_is_an_error() {
        let err = compile("{$x|shout}", &settings()).unwrap_err();
        assert!(matches!(err, CompileError::UnknownSyntax { .. }));
    }

    #[test]
    fn literal_brace_is_text() {
        assert_eq!(
            ops("body { color: red; }"),
            vec![Op::Text("body { color: red; }".into())]
        );
    }

    #[test]
    fn noparse_region_is_literal() {
        assert_eq!(
            ops("{noparse}{$not.parsed}{/noparse}"),
            vec![Op::Text("{$not.parsed}".into())]
        );
    }

    #[test]
    fn comment_is_stripped() {
        assert_eq!(ops("a{* gone *}b"), vec![Op::Text("ab".into())]);
    }

    #[test]
    fn if_elseif_else_structure() {
        let compiled = ops("{if $a}A{elseif $b}B{else}C{/if}");
        let Op::If { branches, fallback } = &compiled[0] else {
            panic!("expected if, got {compiled:?}");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].1, vec![Op::Text("A".into())]);
        assert_eq!(branches[1].1, vec![Op::Text("B".into())]);
        assert_eq!(*fallback, vec![Op::Text("C".into())]);
    }

    #[test]
    fn nested_loops_and_ifs() {
        let compiled = ops("{loop $rows as $row}{if $row.ok}y{/if}{/loop}");
        let Op::Loop { var, body, .. } = &compiled[0] else {
            panic!("expected loop");
        };
        assert_eq!(var, "row");
        assert!(matches!(body[0], Op::If { .. }));
    }

    #[test]
    fn unterminated_if_carries_fragment() {
        let err = compile("{if $a}never closed", &settings()).unwrap_err();
        match err {
            CompileError::Unterminated {
                construct,
                fragment,
            } => {
                assert_eq!(construct, "if");
                assert!(fragment.contains("{if $a}"));
            }
            other => panic!("expected Unterminated, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_interpolation() {
        let err = compile("{$a", &settings()).unwrap_err();
        assert!(matches!(err, CompileError::Unterminated { .. }));
    }

    #[test]
    fn stray_closer_is_unknown_syntax() {
        let err = compile("text{/if}", &settings()).unwrap_err();
        assert!(matches!(err, CompileError::UnknownSyntax { .. }));
    }

    #[test]
    fn quoted_brace_inside_expression() {
        let compiled = ops(r#"{if $x == "}"}y{/if}"#);
        assert!(matches!(compiled[0], Op::If { .. }));
    }

    #[test]
    fn call_with_args() {
        assert_eq!(
            ops(r#"{call upper($name, "x")}"#),
            vec![Op::Call {
                name: "upper".into(),
                args: vec![Expr::Var(vec!["name".into()]), Expr::Str("x".into())],
            }]
        );
    }

    #[test]
    fn sandbox_rejects_call() {
        let mut sandboxed = settings();
        sandboxed.sandbox = true;
        let err = compile("{call upper($name)}", &sandboxed).unwrap_err();
        assert!(matches!(err, CompileError::Sandboxed { .. }));
        // Everything else still compiles.
        assert!(compile("{$name}", &sandboxed).is_ok());
    }

    #[test]
    fn expression_operators() {
        let expr = match &ops("{if $n >= 2 && !$done || $force}x{/if}")[0] {
            Op::If { branches, .. } => branches[0].0.clone(),
            other => panic!("expected if, got {other:?}"),
        };
        let Expr::Or(terms) = expr else {
            panic!("expected or chain");
        };
        assert_eq!(terms.len(), 2);
        assert!(matches!(terms[0], Expr::And(_)));
    }

    #[test]
    fn bad_expression_reports_fragment() {
        let err = compile("{if $a == }x{/if}", &settings()).unwrap_err();
        assert!(matches!(err, CompileError::BadExpr { .. }));
    }
}
