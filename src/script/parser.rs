use super::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use super::value::Value;
use super::{Result, ScriptError};

/// Parse compiled script text into a statement list.
pub fn parse_script(source: &str) -> Result<Vec<Stmt>> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let mut stmts = Vec::new();
    while !parser.eof() {
        stmts.push(parser.parse_stmt()?);
    }
    Ok(stmts)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Let,
    If,
    Else,
    While,
    Await,
    True,
    False,
    Null,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Dot,
    Assign,
    Eq,
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
    Bang,
    AndAnd,
    OrOr,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Int(num) => format!("number {}", num),
            Token::Float(num) => format!("number {}", num),
            Token::Str(_) => "string literal".to_string(),
            other => format!("'{}'", token_text(other)),
        }
    }
}

fn token_text(token: &Token) -> &'static str {
    match token {
        Token::Let => "let",
        Token::If => "if",
        Token::Else => "else",
        Token::While => "while",
        Token::Await => "await",
        Token::True => "true",
        Token::False => "false",
        Token::Null => "null",
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBrace => "{",
        Token::RBrace => "}",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::Comma => ",",
        Token::Semi => ";",
        Token::Dot => ".",
        Token::Assign => "=",
        Token::Eq => "==",
        Token::Ne => "!=",
        Token::Lt => "<",
        Token::Le => "<=",
        Token::Gt => ">",
        Token::Ge => ">=",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Slash => "/",
        Token::Percent => "%",
        Token::Bang => "!",
        Token::AndAnd => "&&",
        Token::OrOr => "||",
        _ => "?",
    }
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    index: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            index: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.eof() {
                break;
            }
            let at = self.index;
            let token = self.next_token()?;
            tokens.push((token, at));
        }
        Ok(tokens)
    }

    fn eof(&self) -> bool {
        self.index >= self.bytes.len()
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn advance(&mut self) {
        if self.index < self.bytes.len() {
            self.index += 1;
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            while let Some(ch) = self.current() {
                if ch.is_ascii_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }
            // Line comments: `// …`
            if self.current() == Some(b'/') && self.peek() == Some(b'/') {
                while let Some(ch) = self.current() {
                    self.advance();
                    if ch == b'\n' {
                        break;
                    }
                }
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current().ok_or_else(|| self.error("unexpected end of input"))?;
        match ch {
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b'{' => self.single(Token::LBrace),
            b'}' => self.single(Token::RBrace),
            b'[' => self.single(Token::LBracket),
            b']' => self.single(Token::RBracket),
            b',' => self.single(Token::Comma),
            b';' => self.single(Token::Semi),
            b'.' => self.single(Token::Dot),
            b'+' => self.single(Token::Plus),
            b'-' => self.single(Token::Minus),
            b'*' => self.single(Token::Star),
            b'/' => self.single(Token::Slash),
            b'%' => self.single(Token::Percent),
            b'=' => self.double(b'=', Token::Eq, Token::Assign),
            b'!' => self.double(b'=', Token::Ne, Token::Bang),
            b'<' => self.double(b'=', Token::Le, Token::Lt),
            b'>' => self.double(b'=', Token::Ge, Token::Gt),
            b'&' => {
                self.advance();
                if self.current() == Some(b'&') {
                    self.advance();
                    Ok(Token::AndAnd)
                } else {
                    Err(self.error("expected '&&'"))
                }
            }
            b'|' => {
                self.advance();
                if self.current() == Some(b'|') {
                    self.advance();
                    Ok(Token::OrOr)
                } else {
                    Err(self.error("expected '||'"))
                }
            }
            b'"' => self.lex_string(),
            b'0'..=b'9' => self.lex_number(),
            c if c == b'_' || c.is_ascii_alphabetic() => Ok(self.lex_word()),
            other => Err(self.error(&format!("unexpected character '{}'", other as char))),
        }
    }

    fn single(&mut self, token: Token) -> Result<Token> {
        self.advance();
        Ok(token)
    }

    fn double(&mut self, follow: u8, matched: Token, fallback: Token) -> Result<Token> {
        self.advance();
        if self.current() == Some(follow) {
            self.advance();
            Ok(matched)
        } else {
            Ok(fallback)
        }
    }

    // Decodes chars from the source slice; string literals are the one
    // place non-ASCII text is legal.
    fn lex_string(&mut self) -> Result<Token> {
        self.advance(); // opening quote
        let mut buf = String::new();
        loop {
            let Some(ch) = self.src[self.index..].chars().next() else {
                return Err(self.error("unterminated string literal"));
            };
            self.index += ch.len_utf8();
            match ch {
                '"' => return Ok(Token::Str(buf)),
                '\\' => {
                    let escaped = self.src[self.index..]
                        .chars()
                        .next()
                        .ok_or_else(|| self.error("incomplete escape"))?;
                    self.index += escaped.len_utf8();
                    let value = match escaped {
                        '"' => '"',
                        '\\' => '\\',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => {
                            return Err(self.error(&format!("unknown escape: \\{}", other)));
                        }
                    };
                    buf.push(value);
                }
                _ => buf.push(ch),
            }
        }
    }

    fn lex_number(&mut self) -> Result<Token> {
        let start = self.index;
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        let mut is_float = false;
        if self.current() == Some(b'.') {
            if let Some(next) = self.peek() {
                if next.is_ascii_digit() {
                    is_float = true;
                    self.advance();
                    while let Some(ch) = self.current() {
                        if ch.is_ascii_digit() {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
            }
        }
        let text = &self.src[start..self.index];
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error("invalid float literal"))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.error("integer literal out of range"))
        }
    }

    fn lex_word(&mut self) -> Token {
        let start = self.index;
        while let Some(ch) = self.current() {
            if ch == b'_' || ch.is_ascii_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }
        match &self.src[start..self.index] {
            "let" => Token::Let,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "await" => Token::Await,
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            word => Token::Ident(word.to_string()),
        }
    }

    fn error(&self, message: &str) -> ScriptError {
        ScriptError::Syntax(format!("{} at byte {}", message, self.index))
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    index: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>) -> Self {
        Self { tokens, index: 0 }
    }

    fn eof(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(token, _)| token)
    }

    fn peek_ahead(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.index + offset).map(|(token, _)| token)
    }

    fn bump(&mut self) -> Result<Token> {
        let token = self
            .tokens
            .get(self.index)
            .map(|(token, _)| token.clone())
            .ok_or_else(|| self.error("unexpected end of script"))?;
        self.index += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let token = self.bump()?;
        if token == expected {
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected '{}', found {}",
                token_text(&expected),
                token.describe()
            )))
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            Some(Token::Let) => self.parse_let(),
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            Some(Token::Ident(_)) if self.peek_ahead(1) == Some(&Token::Assign) => {
                self.parse_assign()
            }
            Some(_) => {
                let expr = self.parse_expr()?;
                self.expect(Token::Semi)?;
                Ok(Stmt::Expr(expr))
            }
            None => Err(self.error("expected a statement")),
        }
    }

    fn parse_let(&mut self) -> Result<Stmt> {
        self.expect(Token::Let)?;
        let name = self.parse_ident()?;
        self.expect(Token::Assign)?;
        let expr = self.parse_expr()?;
        self.expect(Token::Semi)?;
        Ok(Stmt::Let { name, expr })
    }

    fn parse_assign(&mut self) -> Result<Stmt> {
        let name = self.parse_ident()?;
        self.expect(Token::Assign)?;
        let expr = self.parse_expr()?;
        self.expect(Token::Semi)?;
        Ok(Stmt::Assign { name, expr })
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let then_body = self.parse_block()?;
        let else_body = if self.peek() == Some(&Token::Else) {
            self.bump()?;
            if self.peek() == Some(&Token::If) {
                // `else if` chains desugar into a nested single-statement block.
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        self.expect(Token::While)?;
        self.expect(Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while self.peek() != Some(&Token::RBrace) {
            if self.eof() {
                return Err(self.error("unterminated block"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(Token::RBrace)?;
        Ok(stmts)
    }

    fn parse_ident(&mut self) -> Result<String> {
        match self.bump()? {
            Token::Ident(name) => Ok(name),
            other => Err(self.error(&format!("expected identifier, found {}", other.describe()))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::Await) {
            self.bump()?;
            let inner = self.parse_or()?;
            return match inner {
                Expr::Call { .. } => Ok(Expr::Await(Box::new(inner))),
                _ => Err(self.error("await must be applied to a host function call")),
            };
        }
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.bump()?;
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.bump()?;
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Bang) => {
                self.bump()?;
                let expr = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                })
            }
            Some(Token::Minus) => {
                self.bump()?;
                let expr = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.bump()?;
                    let field = self.parse_ident()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        field,
                    };
                }
                Some(Token::LBracket) => {
                    self.bump()?;
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::LParen) => {
                    let Expr::Var(name) = expr else {
                        return Err(self.error("only host functions are callable"));
                    };
                    self.bump()?;
                    let mut args = Vec::new();
                    while self.peek() != Some(&Token::RParen) {
                        if !args.is_empty() {
                            self.expect(Token::Comma)?;
                        }
                        args.push(self.parse_expr()?);
                    }
                    self.expect(Token::RParen)?;
                    expr = Expr::Call { name, args };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.bump()? {
            Token::Int(num) => Ok(Expr::Literal(Value::Int(num))),
            Token::Float(num) => Ok(Expr::Literal(Value::Float(num))),
            Token::Str(text) => Ok(Expr::Literal(Value::Str(text))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Ident(name) => Ok(Expr::Var(name)),
            Token::LParen => {
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                while self.peek() != Some(&Token::RBracket) {
                    if !items.is_empty() {
                        self.expect(Token::Comma)?;
                    }
                    items.push(self.parse_expr()?);
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Token::Await => {
                Err(self.error("await is only allowed at the top level of a statement"))
            }
            other => Err(self.error(&format!("unexpected {}", other.describe()))),
        }
    }

    fn error(&self, message: &str) -> ScriptError {
        let at = self
            .tokens
            .get(self.index.min(self.tokens.len().saturating_sub(1)))
            .map(|(_, at)| *at)
            .unwrap_or(0);
        ScriptError::Syntax(format!("{} at byte {}", message, at))
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
