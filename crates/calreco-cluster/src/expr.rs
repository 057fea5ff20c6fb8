//! Adjacency expression DSL.
//!
//! Custom neighbor predicates are written as boolean expressions over the
//! decoded cell-ID fields of a hit pair, e.g.
//! `abs(x_1 - x_2) <= 1 && abs(y_1 - y_2) <= 1`. The suffix `_1` refers to
//! the first hit of the pair, `_2` to the second. The expression is parsed
//! once at algorithm construction into an AST; evaluation per hit pair is a
//! pure tree walk over pre-decoded field values. Unknown field names fail
//! at parse time.

use calreco_core::{CellIdSpec, RecoError, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Num(f64),
    Ident(usize), // index into the identifier table
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    LParen,
    RParen,
    Comma,
}

#[derive(Clone, Copy, Debug)]
enum Func {
    Abs,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Clone, Debug)]
enum Node {
    Num(f64),
    /// Pre-resolved cell-ID field: which decoded slot, and which hit of the pair
    Field { index: usize, second: bool },
    Unary(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

/// A compiled adjacency predicate over a hit pair's cell-ID fields
#[derive(Clone, Debug)]
pub struct AdjacencyExpr {
    root: Node,
    source: String,
}

impl AdjacencyExpr {
    /// Parse and resolve an expression against the given cell-ID layout
    pub fn parse(source: &str, id_spec: &CellIdSpec) -> Result<Self> {
        let mut idents = Vec::new();
        let tokens = tokenize(source, &mut idents)?;
        let mut parser = Parser { tokens: &tokens, pos: 0, idents: &idents, id_spec };
        let root = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(RecoError::expression(format!(
                "trailing input in expression '{}'", source
            )));
        }
        Ok(Self { root, source: source.to_string() })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate over the decoded fields of both hits (nonzero means adjacent)
    pub fn matches(&self, fields_a: &[i64], fields_b: &[i64]) -> bool {
        eval(&self.root, fields_a, fields_b) != 0.0
    }
}

fn tokenize(source: &str, idents: &mut Vec<String>) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Eq);
                    i += 2;
                } else {
                    return Err(RecoError::expression("single '=' is not an operator"));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    return Err(RecoError::expression("unexpected '!'"));
                }
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token::And);
                    i += 2;
                } else {
                    return Err(RecoError::expression("single '&' is not an operator"));
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token::Or);
                    i += 2;
                } else {
                    return Err(RecoError::expression("single '|' is not an operator"));
                }
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit() || bytes[i] == b'.' || bytes[i] == b'e'
                        || bytes[i] == b'E'
                        || ((bytes[i] == b'+' || bytes[i] == b'-')
                            && matches!(bytes[i - 1], b'e' | b'E')))
                {
                    i += 1;
                }
                let text = &source[start..i];
                let value = text.parse::<f64>().map_err(|_| {
                    RecoError::expression(format!("bad number '{}'", text))
                })?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                idents.push(source[start..i].to_string());
                tokens.push(Token::Ident(idents.len() - 1));
            }
            _ => {
                return Err(RecoError::expression(format!(
                    "unexpected character '{}' in expression", c
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    idents: &'a [String],
    id_spec: &'a CellIdSpec,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        match self.bump() {
            Some(t) if t == token => Ok(()),
            other => Err(RecoError::expression(format!(
                "expected {:?}, found {:?}", token, other
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(Token::Or) {
            self.bump();
            let right = self.parse_and()?;
            left = Node::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut left = self.parse_cmp()?;
        while self.peek() == Some(Token::And) {
            self.bump();
            let right = self.parse_cmp()?;
            left = Node::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> Result<Node> {
        let left = self.parse_add()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            _ => return Ok(left),
        };
        self.bump();
        let right = self.parse_add()?;
        Ok(Node::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_add(&mut self) -> Result<Node> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_mul()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_mul(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if self.peek() == Some(Token::Minus) {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(Node::Unary(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node> {
        match self.bump() {
            Some(Token::Num(v)) => Ok(Node::Num(v)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(id)) => {
                let name = self.idents[id].as_str();
                if self.peek() == Some(Token::LParen) {
                    self.bump();
                    let func = match name {
                        "abs" => Func::Abs,
                        "min" => Func::Min,
                        "max" => Func::Max,
                        other => {
                            return Err(RecoError::expression(format!(
                                "unknown function '{}'", other
                            )))
                        }
                    };
                    let mut args = vec![self.parse_or()?];
                    while self.peek() == Some(Token::Comma) {
                        self.bump();
                        args.push(self.parse_or()?);
                    }
                    self.expect(Token::RParen)?;
                    let arity = match func {
                        Func::Abs => 1,
                        Func::Min | Func::Max => 2,
                    };
                    if args.len() != arity {
                        return Err(RecoError::expression(format!(
                            "'{}' takes {} argument(s), got {}", name, arity, args.len()
                        )));
                    }
                    return Ok(Node::Call(func, args));
                }
                self.resolve_field(name)
            }
            other => Err(RecoError::expression(format!(
                "unexpected token {:?}", other
            ))),
        }
    }

    /// `<field>_1` / `<field>_2` resolve against the cell-ID layout
    fn resolve_field(&self, name: &str) -> Result<Node> {
        let (base, second) = match name.rsplit_once('_') {
            Some((base, "1")) => (base, false),
            Some((base, "2")) => (base, true),
            _ => {
                return Err(RecoError::expression(format!(
                    "identifier '{}' must end in _1 or _2", name
                )))
            }
        };
        let index = self
            .id_spec
            .field_index(base)
            .ok_or_else(|| RecoError::UnknownField(base.to_string()))?;
        Ok(Node::Field { index, second })
    }
}

fn eval(node: &Node, a: &[i64], b: &[i64]) -> f64 {
    match node {
        Node::Num(v) => *v,
        Node::Field { index, second } => {
            if *second { b[*index] as f64 } else { a[*index] as f64 }
        }
        Node::Unary(inner) => -eval(inner, a, b),
        Node::Binary(op, l, r) => {
            let x = eval(l, a, b);
            match op {
                BinOp::And => {
                    if x == 0.0 { return 0.0; }
                    bool_val(eval(r, a, b) != 0.0)
                }
                BinOp::Or => {
                    if x != 0.0 { return 1.0; }
                    bool_val(eval(r, a, b) != 0.0)
                }
                _ => {
                    let y = eval(r, a, b);
                    match op {
                        BinOp::Add => x + y,
                        BinOp::Sub => x - y,
                        BinOp::Mul => x * y,
                        BinOp::Div => x / y,
                        BinOp::Lt => bool_val(x < y),
                        BinOp::Le => bool_val(x <= y),
                        BinOp::Gt => bool_val(x > y),
                        BinOp::Ge => bool_val(x >= y),
                        BinOp::Eq => bool_val(x == y),
                        BinOp::Ne => bool_val(x != y),
                        BinOp::And | BinOp::Or => unreachable!(),
                    }
                }
            }
        }
        Node::Call(func, args) => match func {
            Func::Abs => eval(&args[0], a, b).abs(),
            Func::Min => eval(&args[0], a, b).min(eval(&args[1], a, b)),
            Func::Max => eval(&args[0], a, b).max(eval(&args[1], a, b)),
        },
    }
}

fn bool_val(v: bool) -> f64 {
    if v { 1.0 } else { 0.0 }
}
