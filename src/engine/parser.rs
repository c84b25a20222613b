//! Line-oriented parser for the traced scripting language.
//!
//! One statement per line; indentation defines blocks. Each statement keeps
//! its 1-based source line so the interpreter can pause on it.

use super::ast::{BinaryOp, Expr, IfArm, Program, Stmt, StmtKind, UnaryOp};
use super::EngineError;

/// Reserved words. Identifiers may not shadow these.
const KEYWORDS: &[&str] = &[
    "def", "return", "if", "elif", "else", "while", "pass", "and", "or", "not", "True", "False",
    "None",
];

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Assign,
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("'{s}'"),
            Tok::Int(i) => format!("'{i}'"),
            Tok::Float(f) => format!("'{f:?}'"),
            Tok::Str(_) => "string literal".into(),
            Tok::Assign => "'='".into(),
            Tok::EqEq => "'=='".into(),
            Tok::Ne => "'!='".into(),
            Tok::Lt => "'<'".into(),
            Tok::Le => "'<='".into(),
            Tok::Gt => "'>'".into(),
            Tok::Ge => "'>='".into(),
            Tok::Plus => "'+'".into(),
            Tok::Minus => "'-'".into(),
            Tok::Star => "'*'".into(),
            Tok::Slash => "'/'".into(),
            Tok::Percent => "'%'".into(),
            Tok::LParen => "'('".into(),
            Tok::RParen => "')'".into(),
            Tok::LBracket => "'['".into(),
            Tok::RBracket => "']'".into(),
            Tok::Comma => "','".into(),
            Tok::Colon => "':'".into(),
        }
    }
}

fn syntax(line: u32, message: impl Into<String>) -> EngineError {
    EngineError::Syntax {
        line,
        message: message.into(),
    }
}

/// One significant source line: indentation level plus its tokens.
#[derive(Debug)]
struct SrcLine {
    indent: usize,
    line: u32,
    toks: Vec<Tok>,
}

fn lex_line(text: &str, line: u32) -> Result<Vec<Tok>, EngineError> {
    let chars: Vec<char> = text.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '#' {
            break;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let mut is_float = false;
            if i < chars.len() && chars[i] == '.' {
                if i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
                    is_float = true;
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                } else {
                    return Err(syntax(line, "malformed number literal"));
                }
            }
            let text: String = chars[start..i].iter().collect();
            if is_float {
                let f = text
                    .parse::<f64>()
                    .map_err(|_| syntax(line, format!("invalid float literal '{text}'")))?;
                toks.push(Tok::Float(f));
            } else {
                let n = text
                    .parse::<i64>()
                    .map_err(|_| syntax(line, format!("integer literal '{text}' too large")))?;
                toks.push(Tok::Int(n));
            }
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            toks.push(Tok::Ident(chars[start..i].iter().collect()));
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let mut s = String::new();
            loop {
                if i >= chars.len() {
                    return Err(syntax(line, "unterminated string literal"));
                }
                let ch = chars[i];
                i += 1;
                if ch == quote {
                    break;
                }
                if ch == '\\' {
                    if i >= chars.len() {
                        return Err(syntax(line, "unterminated string literal"));
                    }
                    let esc = chars[i];
                    i += 1;
                    s.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        other => return Err(syntax(line, format!("unknown escape '\\{other}'"))),
                    });
                } else {
                    s.push(ch);
                }
            }
            toks.push(Tok::Str(s));
            continue;
        }

        i += 1;
        let eq_next = i < chars.len() && chars[i] == '=';
        match c {
            '=' => {
                if eq_next {
                    i += 1;
                    toks.push(Tok::EqEq);
                } else {
                    toks.push(Tok::Assign);
                }
            }
            '!' => {
                if eq_next {
                    i += 1;
                    toks.push(Tok::Ne);
                } else {
                    return Err(syntax(line, "unexpected character '!'"));
                }
            }
            '<' => {
                if eq_next {
                    i += 1;
                    toks.push(Tok::Le);
                } else {
                    toks.push(Tok::Lt);
                }
            }
            '>' => {
                if eq_next {
                    i += 1;
                    toks.push(Tok::Ge);
                } else {
                    toks.push(Tok::Gt);
                }
            }
            '+' => toks.push(Tok::Plus),
            '-' => toks.push(Tok::Minus),
            '*' => toks.push(Tok::Star),
            '/' => toks.push(Tok::Slash),
            '%' => toks.push(Tok::Percent),
            '(' => toks.push(Tok::LParen),
            ')' => toks.push(Tok::RParen),
            '[' => toks.push(Tok::LBracket),
            ']' => toks.push(Tok::RBracket),
            ',' => toks.push(Tok::Comma),
            ':' => toks.push(Tok::Colon),
            other => return Err(syntax(line, format!("unexpected character '{other}'"))),
        }
    }

    Ok(toks)
}

fn split_lines(source: &str) -> Result<Vec<SrcLine>, EngineError> {
    let mut lines = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line = idx as u32 + 1;
        let mut indent = 0;
        let mut body_start = 0;
        for (pos, c) in raw.char_indices() {
            match c {
                ' ' => indent += 1,
                '\t' => indent += 4,
                _ => {
                    body_start = pos;
                    break;
                }
            }
            body_start = pos + c.len_utf8();
        }
        let rest = &raw[body_start..];
        if rest.is_empty() || rest.starts_with('#') {
            continue;
        }
        let toks = lex_line(rest, line)?;
        if toks.is_empty() {
            continue;
        }
        lines.push(SrcLine { indent, line, toks });
    }
    Ok(lines)
}

/// Parse a complete program.
pub fn parse(source: &str) -> Result<Program, EngineError> {
    let lines = split_lines(source)?;
    if lines.is_empty() {
        return Ok(Program { body: Vec::new() });
    }
    if lines[0].indent != 0 {
        return Err(syntax(lines[0].line, "unexpected indent"));
    }
    let mut pos = 0;
    let body = parse_block(&lines, &mut pos, 0)?;
    if pos < lines.len() {
        return Err(syntax(
            lines[pos].line,
            "unindent does not match any outer indentation level",
        ));
    }
    Ok(Program { body })
}

/// Parse a single expression, e.g. a breakpoint condition.
pub fn parse_expr_str(text: &str) -> Result<Expr, EngineError> {
    let toks = lex_line(text, 0)?;
    if toks.is_empty() {
        return Err(syntax(0, "empty expression"));
    }
    let mut cur = Cursor::new(&toks, 0);
    let expr = parse_expr(&mut cur)?;
    cur.finish()?;
    Ok(expr)
}

fn parse_block(lines: &[SrcLine], pos: &mut usize, indent: usize) -> Result<Vec<Stmt>, EngineError> {
    let mut body = Vec::new();
    while *pos < lines.len() {
        let ln = &lines[*pos];
        if ln.indent < indent {
            break;
        }
        if ln.indent > indent {
            return Err(syntax(ln.line, "unexpected indent"));
        }
        body.push(parse_stmt(lines, pos)?);
    }
    Ok(body)
}

fn parse_suite(
    lines: &[SrcLine],
    pos: &mut usize,
    parent_indent: usize,
    header_line: u32,
) -> Result<Vec<Stmt>, EngineError> {
    if *pos >= lines.len() || lines[*pos].indent <= parent_indent {
        return Err(syntax(header_line, "expected an indented block"));
    }
    let block_indent = lines[*pos].indent;
    parse_block(lines, pos, block_indent)
}

fn line_starts_with_kw(ln: &SrcLine, kw: &str) -> bool {
    matches!(ln.toks.first(), Some(Tok::Ident(s)) if s == kw)
}

fn parse_stmt(lines: &[SrcLine], pos: &mut usize) -> Result<Stmt, EngineError> {
    let ln = &lines[*pos];
    let indent = ln.indent;
    let line = ln.line;
    let mut cur = Cursor::new(&ln.toks, line);

    // `name = expr` assignment; checked first so `pass = 1` reports the
    // keyword misuse instead of a trailing-token error
    if ln.toks.len() >= 2 && ln.toks[1] == Tok::Assign {
        if let Tok::Ident(name) = &ln.toks[0] {
            if KEYWORDS.contains(&name.as_str()) {
                return Err(syntax(line, format!("cannot assign to keyword '{name}'")));
            }
            cur.next();
            cur.next();
            let value = parse_expr(&mut cur)?;
            cur.finish()?;
            *pos += 1;
            return Ok(Stmt {
                line,
                kind: StmtKind::Assign {
                    target: name.clone(),
                    value,
                },
            });
        }
    }

    if cur.eat_kw("def") {
        let name = cur.expect_ident("function name")?;
        cur.expect(Tok::LParen)?;
        let mut params = Vec::new();
        if !cur.eat(&Tok::RParen) {
            loop {
                params.push(cur.expect_ident("parameter name")?);
                if cur.eat(&Tok::Comma) {
                    continue;
                }
                cur.expect(Tok::RParen)?;
                break;
            }
        }
        cur.expect(Tok::Colon)?;
        cur.finish()?;
        *pos += 1;
        let body = parse_suite(lines, pos, indent, line)?;
        return Ok(Stmt {
            line,
            kind: StmtKind::FuncDef { name, params, body },
        });
    }

    if cur.eat_kw("if") {
        let cond = parse_expr(&mut cur)?;
        cur.expect(Tok::Colon)?;
        cur.finish()?;
        *pos += 1;
        let body = parse_suite(lines, pos, indent, line)?;
        let mut arms = vec![IfArm { cond, body }];
        let mut orelse = Vec::new();

        while *pos < lines.len()
            && lines[*pos].indent == indent
            && line_starts_with_kw(&lines[*pos], "elif")
        {
            let arm_line = lines[*pos].line;
            let mut arm_cur = Cursor::new(&lines[*pos].toks, arm_line);
            arm_cur.eat_kw("elif");
            let cond = parse_expr(&mut arm_cur)?;
            arm_cur.expect(Tok::Colon)?;
            arm_cur.finish()?;
            *pos += 1;
            let body = parse_suite(lines, pos, indent, arm_line)?;
            arms.push(IfArm { cond, body });
        }

        if *pos < lines.len()
            && lines[*pos].indent == indent
            && line_starts_with_kw(&lines[*pos], "else")
        {
            let else_line = lines[*pos].line;
            let mut else_cur = Cursor::new(&lines[*pos].toks, else_line);
            else_cur.eat_kw("else");
            else_cur.expect(Tok::Colon)?;
            else_cur.finish()?;
            *pos += 1;
            orelse = parse_suite(lines, pos, indent, else_line)?;
        }

        return Ok(Stmt {
            line,
            kind: StmtKind::If { arms, orelse },
        });
    }

    if line_starts_with_kw(ln, "elif") || line_starts_with_kw(ln, "else") {
        return Err(syntax(line, "'elif'/'else' without a matching 'if'"));
    }

    if cur.eat_kw("while") {
        let cond = parse_expr(&mut cur)?;
        cur.expect(Tok::Colon)?;
        cur.finish()?;
        *pos += 1;
        let body = parse_suite(lines, pos, indent, line)?;
        return Ok(Stmt {
            line,
            kind: StmtKind::While { cond, body },
        });
    }

    if cur.eat_kw("return") {
        let value = if cur.at_end() {
            None
        } else {
            Some(parse_expr(&mut cur)?)
        };
        cur.finish()?;
        *pos += 1;
        return Ok(Stmt {
            line,
            kind: StmtKind::Return(value),
        });
    }

    if cur.eat_kw("pass") {
        cur.finish()?;
        *pos += 1;
        return Ok(Stmt {
            line,
            kind: StmtKind::Pass,
        });
    }

    let expr = parse_expr(&mut cur)?;
    cur.finish()?;
    *pos += 1;
    Ok(Stmt {
        line,
        kind: StmtKind::Expr(expr),
    })
}

struct Cursor<'a> {
    toks: &'a [Tok],
    pos: usize,
    line: u32,
}

impl<'a> Cursor<'a> {
    fn new(toks: &'a [Tok], line: u32) -> Self {
        Self { toks, pos: 0, line }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(s)) if s == kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<(), EngineError> {
        match self.next() {
            Some(t) if t == tok => Ok(()),
            Some(t) => Err(self.err(format!("expected {}, found {}", tok.describe(), t.describe()))),
            None => Err(self.err(format!("expected {}", tok.describe()))),
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, EngineError> {
        match self.next() {
            Some(Tok::Ident(s)) if !KEYWORDS.contains(&s.as_str()) => Ok(s),
            Some(t) => Err(self.err(format!("expected {what}, found {}", t.describe()))),
            None => Err(self.err(format!("expected {what}"))),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn finish(&self) -> Result<(), EngineError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(self.err(format!("unexpected {} after statement", t.describe()))),
        }
    }

    fn err(&self, message: impl Into<String>) -> EngineError {
        syntax(self.line, message)
    }
}

fn parse_expr(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    parse_or(cur)
}

fn parse_or(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    let mut lhs = parse_and(cur)?;
    while cur.eat_kw("or") {
        let rhs = parse_and(cur)?;
        lhs = Expr::Binary {
            op: BinaryOp::Or,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_and(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    let mut lhs = parse_not(cur)?;
    while cur.eat_kw("and") {
        let rhs = parse_not(cur)?;
        lhs = Expr::Binary {
            op: BinaryOp::And,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_not(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    if cur.eat_kw("not") {
        let operand = parse_not(cur)?;
        return Ok(Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        });
    }
    parse_cmp(cur)
}

fn parse_cmp(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    let lhs = parse_add(cur)?;
    let op = match cur.peek() {
        Some(Tok::EqEq) => BinaryOp::Eq,
        Some(Tok::Ne) => BinaryOp::Ne,
        Some(Tok::Lt) => BinaryOp::Lt,
        Some(Tok::Le) => BinaryOp::Le,
        Some(Tok::Gt) => BinaryOp::Gt,
        Some(Tok::Ge) => BinaryOp::Ge,
        _ => return Ok(lhs),
    };
    cur.next();
    let rhs = parse_add(cur)?;
    Ok(Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn parse_add(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    let mut lhs = parse_mul(cur)?;
    loop {
        let op = match cur.peek() {
            Some(Tok::Plus) => BinaryOp::Add,
            Some(Tok::Minus) => BinaryOp::Sub,
            _ => return Ok(lhs),
        };
        cur.next();
        let rhs = parse_mul(cur)?;
        lhs = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
}

fn parse_mul(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    let mut lhs = parse_unary(cur)?;
    loop {
        let op = match cur.peek() {
            Some(Tok::Star) => BinaryOp::Mul,
            Some(Tok::Slash) => BinaryOp::Div,
            Some(Tok::Percent) => BinaryOp::Mod,
            _ => return Ok(lhs),
        };
        cur.next();
        let rhs = parse_unary(cur)?;
        lhs = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
}

fn parse_unary(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    if cur.eat(&Tok::Minus) {
        let operand = parse_unary(cur)?;
        return Ok(Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(operand),
        });
    }
    parse_postfix(cur)
}

fn parse_postfix(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    let mut expr = parse_primary(cur)?;
    loop {
        match cur.peek() {
            Some(Tok::LParen) => {
                let Expr::Name(name) = &expr else {
                    return Err(cur.err("expression is not callable"));
                };
                let callee = name.clone();
                cur.next();
                let mut args = Vec::new();
                if !cur.eat(&Tok::RParen) {
                    loop {
                        args.push(parse_expr(cur)?);
                        if cur.eat(&Tok::Comma) {
                            continue;
                        }
                        cur.expect(Tok::RParen)?;
                        break;
                    }
                }
                expr = Expr::Call { callee, args };
            }
            Some(Tok::LBracket) => {
                cur.next();
                let index = parse_expr(cur)?;
                cur.expect(Tok::RBracket)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            }
            _ => return Ok(expr),
        }
    }
}

fn parse_primary(cur: &mut Cursor<'_>) -> Result<Expr, EngineError> {
    match cur.next() {
        Some(Tok::Int(n)) => Ok(Expr::Int(n)),
        Some(Tok::Float(f)) => Ok(Expr::Float(f)),
        Some(Tok::Str(s)) => Ok(Expr::Str(s)),
        Some(Tok::Ident(name)) => match name.as_str() {
            "True" => Ok(Expr::Bool(true)),
            "False" => Ok(Expr::Bool(false)),
            "None" => Ok(Expr::NoneLit),
            kw if KEYWORDS.contains(&kw) => {
                Err(cur.err(format!("unexpected keyword '{kw}' in expression")))
            }
            _ => Ok(Expr::Name(name)),
        },
        Some(Tok::LParen) => {
            let expr = parse_expr(cur)?;
            cur.expect(Tok::RParen)?;
            Ok(expr)
        }
        Some(Tok::LBracket) => {
            let mut items = Vec::new();
            if !cur.eat(&Tok::RBracket) {
                loop {
                    items.push(parse_expr(cur)?);
                    if cur.eat(&Tok::Comma) {
                        continue;
                    }
                    cur.expect(Tok::RBracket)?;
                    break;
                }
            }
            Ok(Expr::List(items))
        }
        Some(t) => Err(cur.err(format!("unexpected {} in expression", t.describe()))),
        None => Err(cur.err("unexpected end of line")),
    }
}
