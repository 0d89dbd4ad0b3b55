use crate::tpl::expr::lexer::{Lexer, Token};
use crate::tpl::expr::{Expr, ExprError, Op, UnaryOp};
use crate::value::Value;

/// Recursive-descent parser, one method per precedence level (loosest
/// first): ternary, `??`, `||`, `&&`, equality, comparison, additive,
/// multiplicative, unary, postfix, primary.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parses a complete expression; trailing tokens are a syntax error.
pub fn parse_expr(src: &str) -> Result<Expr, ExprError> {
    let tokens = Lexer::new(src).tokenize()?;
    if tokens.is_empty() {
        return Err(ExprError::Syntax("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_ternary()?;
    if let Some(t) = parser.peek() {
        return Err(ExprError::Syntax(format!("unexpected {:?}", t)));
    }
    Ok(expr)
}

fn is_keyword(token: Option<&Token>, kw: &str) -> bool {
    matches!(token, Some(Token::Ident(s)) if s.eq_ignore_ascii_case(kw))
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if is_keyword(self.peek(), kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ExprError> {
        match self.consume() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(ExprError::Syntax(format!(
                "expected {:?}, got {:?}",
                token, t
            ))),
            None => Err(ExprError::Syntax(format!(
                "expected {:?}, got end of expression",
                token
            ))),
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, ExprError> {
        let cond = self.parse_coalesce()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        if self.eat(&Token::Colon) {
            let otherwise = self.parse_ternary()?;
            return Ok(Expr::Ternary(Box::new(cond), None, Box::new(otherwise)));
        }
        let then = self.parse_ternary()?;
        self.expect(Token::Colon)?;
        let otherwise = self.parse_ternary()?;
        Ok(Expr::Ternary(
            Box::new(cond),
            Some(Box::new(then)),
            Box::new(otherwise),
        ))
    }

    fn parse_coalesce(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_or()?;
        if self.eat(&Token::Coalesce) {
            let rhs = self.parse_coalesce()?;
            return Ok(Expr::Coalesce(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) || self.eat_keyword("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(Op::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::AndAnd) || self.eat_keyword("and") {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(Op::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => Op::Eq,
                Some(Token::NotEq) => Op::Ne,
                Some(Token::StrictEq) => Op::StrictEq,
                Some(Token::StrictNotEq) => Op::StrictNe,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => Op::Lt,
                Some(Token::Le) => Op::Le,
                Some(Token::Gt) => Op::Gt,
                Some(Token::Ge) => Op::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Op::Add,
                Some(Token::Minus) => Op::Sub,
                Some(Token::Tilde) => Op::Concat,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Op::Mul,
                Some(Token::Slash) => Op::Div,
                Some(Token::Percent) => Op::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = if self.eat(&Token::Not) || self.eat_keyword("not") {
            UnaryOp::Not
        } else if self.eat(&Token::Minus) {
            UnaryOp::Neg
        } else if self.eat(&Token::Plus) {
            UnaryOp::Pos
        } else {
            return self.parse_postfix();
        };
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;

        // Suffixes: .attr, ->attr, .method(args), [index]
        loop {
            match self.peek() {
                Some(Token::Dot) | Some(Token::Arrow) => {
                    self.pos += 1;
                    match self.consume() {
                        Some(Token::Ident(name)) => {
                            if self.eat(&Token::LParen) {
                                let mut args = vec![expr];
                                args.extend(self.parse_args()?);
                                expr = Expr::Call(name.to_ascii_lowercase(), args);
                            } else {
                                expr = Expr::Member(Box::new(expr), name);
                            }
                        }
                        Some(Token::Int(i)) => {
                            expr = Expr::Index(Box::new(expr), Box::new(Expr::Literal(Value::Int(i))));
                        }
                        t => {
                            return Err(ExprError::Syntax(format!(
                                "expected a name after `.`, got {:?}",
                                t
                            )));
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_ternary()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Parses call arguments after the opening `(`, consuming the `)`.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        self.parse_sequence(Token::RParen)
    }

    fn parse_sequence(&mut self, close: Token) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.parse_ternary()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.consume() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Float(n)) => Ok(Expr::Literal(Value::Float(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Var(name)) => Ok(Expr::Var(name)),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    return Ok(Expr::Call(name.to_ascii_lowercase(), args));
                }
                match name.to_ascii_lowercase().as_str() {
                    "true" => Ok(Expr::Literal(Value::Bool(true))),
                    "false" => Ok(Expr::Literal(Value::Bool(false))),
                    "null" => Ok(Expr::Literal(Value::Null)),
                    _ => Ok(Expr::Ident(name)),
                }
            }
            Some(Token::LParen) => {
                let e = self.parse_ternary()?;
                self.expect(Token::RParen)?;
                Ok(e)
            }
            Some(Token::LBracket) => Ok(Expr::List(self.parse_sequence(Token::RBracket)?)),
            t => Err(ExprError::Syntax(format!("expected expression, got {:?}", t))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_string()))
    }

    fn int(n: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Int(n)))
    }

    #[test]
    fn test_precedence() {
        // $a + 2 * 3 > 4 && !$b
        let expr = parse_expr("$a + 2 * 3 > 4 && !$b").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                Op::And,
                Box::new(Expr::Binary(
                    Op::Gt,
                    Box::new(Expr::Binary(
                        Op::Add,
                        var("a"),
                        Box::new(Expr::Binary(Op::Mul, int(2), int(3)))
                    )),
                    int(4)
                )),
                Box::new(Expr::Unary(UnaryOp::Not, var("b")))
            )
        );
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let expr = parse_expr("$a ? 1 : $b ? 2 : 3").unwrap();
        match expr {
            Expr::Ternary(_, Some(_), otherwise) => {
                assert!(matches!(*otherwise, Expr::Ternary(..)));
            }
            other => panic!("Expected Ternary, got {:?}", other),
        }
        assert!(matches!(
            parse_expr("$a ?: 'x'").unwrap(),
            Expr::Ternary(_, None, _)
        ));
    }

    #[test]
    fn test_member_index_and_calls() {
        let expr = parse_expr("$row['tags'][0].name").unwrap();
        assert!(matches!(expr, Expr::Member(_, ref n) if n == "name"));

        let expr = parse_expr("$title.upper()").unwrap();
        assert_eq!(expr, Expr::Call("upper".to_string(), vec![Expr::Var("title".to_string())]));

        let expr = parse_expr("COUNT($items)").unwrap();
        assert_eq!(expr, Expr::Call("count".to_string(), vec![Expr::Var("items".to_string())]));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse_expr("TRUE").unwrap(), Expr::Literal(Value::Bool(true)));
        assert!(matches!(
            parse_expr("a and not b or c").unwrap(),
            Expr::Binary(Op::Or, _, _)
        ));
    }

    #[test]
    fn test_list_literal() {
        assert_eq!(
            parse_expr("[1, 2,]").unwrap(),
            Expr::List(vec![Expr::Literal(Value::Int(1)), Expr::Literal(Value::Int(2))])
        );
        assert_eq!(parse_expr("[]").unwrap(), Expr::List(vec![]));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_expr("").is_err());
        assert!(parse_expr("(1").is_err());
        assert!(parse_expr("1 2").is_err());
        assert!(parse_expr("a ? b").is_err());
        assert!(parse_expr("$a.").is_err());
    }
}
