// Formula parser - converts expression text into an AST
// Supports: numbers, cell refs (A1), basic math (+, -, *, /), unary sign, parentheses

use crate::position::Position;

/// Expression AST. Closed: the evaluator matches it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    CellRef(Position),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parse expression text (without any leading `=`) into an AST.
pub fn parse(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Empty formula".to_string());
    }
    let mut cursor = Cursor { tokens, pos: 0 };
    let expr = parse_expr(&mut cursor)?;
    match cursor.peek() {
        None => Ok(expr),
        Some(tok) => Err(format!("Unexpected token after expression: {:?}", tok)),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    CellRef(Position),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            'A'..='Z' | 'a'..='z' => {
                // Only cell references are alphabetic; the grammar has no
                // functions or named identifiers.
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match Position::parse(&ident) {
                    Some(pos) => tokens.push(Token::CellRef(pos)),
                    None => return Err(format!("Invalid cell reference: {}", ident)),
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }
}

// expr := term (('+' | '-') term)*
fn parse_expr(cursor: &mut Cursor) -> Result<Expr, String> {
    let mut left = parse_term(cursor)?;

    while let Some(tok) = cursor.peek() {
        let op = match tok {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            _ => break,
        };
        cursor.next();
        let right = parse_term(cursor)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    Ok(left)
}

// term := unary (('*' | '/') unary)*
fn parse_term(cursor: &mut Cursor) -> Result<Expr, String> {
    let mut left = parse_unary(cursor)?;

    while let Some(tok) = cursor.peek() {
        let op = match tok {
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            _ => break,
        };
        cursor.next();
        let right = parse_unary(cursor)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    Ok(left)
}

// unary := ('+' | '-') unary | primary
fn parse_unary(cursor: &mut Cursor) -> Result<Expr, String> {
    let op = match cursor.peek() {
        Some(Token::Plus) => Some(UnaryOp::Plus),
        Some(Token::Minus) => Some(UnaryOp::Minus),
        _ => None,
    };
    if let Some(op) = op {
        cursor.next();
        let operand = parse_unary(cursor)?;
        return Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        });
    }
    parse_primary(cursor)
}

// primary := number | cellref | '(' expr ')'
fn parse_primary(cursor: &mut Cursor) -> Result<Expr, String> {
    match cursor.next() {
        Some(Token::Number(n)) => Ok(Expr::Number(n)),
        Some(Token::CellRef(pos)) => Ok(Expr::CellRef(pos)),
        Some(Token::LParen) => {
            let inner = parse_expr(cursor)?;
            match cursor.next() {
                Some(Token::RParen) => Ok(inner),
                Some(tok) => Err(format!("Expected ')', found {:?}", tok)),
                None => Err("Expected ')', found end of formula".to_string()),
            }
        }
        Some(tok) => Err(format!("Unexpected token: {:?}", tok)),
        None => Err("Unexpected end of formula".to_string()),
    }
}

impl Expr {
    /// Binding strength used by the canonical renderer.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op: BinaryOp::Add | BinaryOp::Sub, .. } => 1,
            Expr::Binary { op: BinaryOp::Mul | BinaryOp::Div, .. } => 2,
            Expr::Unary { .. } => 3,
            Expr::Number(_) | Expr::CellRef(_) => 4,
        }
    }

    /// Render back to text with the minimal parentheses that preserve the
    /// parse. `=(1+2)*3` keeps its parens, `=1+(2*3)` loses them.
    pub fn render(&self, out: &mut String) {
        match self {
            Expr::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    out.push_str(&format!("{}", *n as i64));
                } else {
                    out.push_str(&format!("{}", n));
                }
            }
            Expr::CellRef(pos) => out.push_str(&pos.to_string()),
            Expr::Unary { op, operand } => {
                out.push(match op {
                    UnaryOp::Plus => '+',
                    UnaryOp::Minus => '-',
                });
                let parens = operand.precedence() < self.precedence();
                if parens {
                    out.push('(');
                }
                operand.render(out);
                if parens {
                    out.push(')');
                }
            }
            Expr::Binary { op, left, right } => {
                let prec = self.precedence();
                let left_parens = left.precedence() < prec;
                if left_parens {
                    out.push('(');
                }
                left.render(out);
                if left_parens {
                    out.push(')');
                }
                out.push(match op {
                    BinaryOp::Add => '+',
                    BinaryOp::Sub => '-',
                    BinaryOp::Mul => '*',
                    BinaryOp::Div => '/',
                });
                // Subtraction and division are left-associative: an
                // equal-precedence right operand must keep its parens.
                let right_parens = right.precedence() < prec
                    || (right.precedence() == prec
                        && matches!(op, BinaryOp::Sub | BinaryOp::Div));
                if right_parens {
                    out.push('(');
                }
                right.render(out);
                if right_parens {
                    out.push(')');
                }
            }
        }
    }

    /// Collect every cell reference in the tree into `out` (unsorted,
    /// duplicates included; callers sort and dedup).
    pub fn collect_refs(&self, out: &mut Vec<Position>) {
        match self {
            Expr::Number(_) => {}
            Expr::CellRef(pos) => out.push(*pos),
            Expr::Unary { operand, .. } => operand.collect_refs(out),
            Expr::Binary { left, right, .. } => {
                left.collect_refs(out);
                right.collect_refs(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(input: &str) -> String {
        let expr = parse(input).unwrap();
        let mut out = String::new();
        expr.render(&mut out);
        out
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse("3.5").unwrap(), Expr::Number(3.5));
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse("B7").unwrap(), Expr::CellRef(Position::new(6, 1)));
    }

    #[test]
    fn test_precedence() {
        // 1+2*3 parses as 1+(2*3)
        let expr = parse("1+2*3").unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Add, left, .. } => {
                assert_eq!(*left, Expr::Number(1.0));
            }
            other => panic!("expected Add at root, got {:?}", other),
        }
    }

    #[test]
    fn test_parens_override_precedence() {
        let expr = parse("(1+2)*3").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_unary_chain() {
        let expr = parse("--2").unwrap();
        assert!(matches!(expr, Expr::Unary { op: UnaryOp::Minus, .. }));
    }

    #[test]
    fn test_whitespace_ignored() {
        assert_eq!(parse(" 1 +\t2 ").unwrap(), parse("1+2").unwrap());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("").is_err());
        assert!(parse("1+").is_err());
        assert!(parse("(1+2").is_err());
        assert!(parse(")").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("A0").is_err());
        assert!(parse("SUM(A1)").is_err());
        assert!(parse("1..2").is_err());
        assert!(parse("#REF!").is_err());
    }

    #[test]
    fn test_render_minimal_parens() {
        assert_eq!(rendered("(1+2)*3"), "(1+2)*3");
        assert_eq!(rendered("1+(2*3)"), "1+2*3");
        assert_eq!(rendered("(1+2)+3"), "1+2+3");
        assert_eq!(rendered("1-(2-3)"), "1-(2-3)");
        assert_eq!(rendered("A1/(B2/C3)"), "A1/(B2/C3)");
        assert_eq!(rendered("-(A1+B2)"), "-(A1+B2)");
        assert_eq!(rendered("-A1*2"), "-A1*2");
    }

    #[test]
    fn test_render_normalizes_case_and_spacing() {
        assert_eq!(rendered(" a1 + b2 "), "A1+B2");
    }

    #[test]
    fn test_collect_refs() {
        let expr = parse("B2+A1*B2").unwrap();
        let mut refs = Vec::new();
        expr.collect_refs(&mut refs);
        assert_eq!(
            refs,
            vec![
                Position::new(1, 1),
                Position::new(0, 0),
                Position::new(1, 1),
            ]
        );
    }
}
