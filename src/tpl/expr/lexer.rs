use crate::tpl::expr::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    /// `$name`
    Var(String),
    /// bare `name`, including keywords like `and` / `true`
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Arrow,
    Question,
    Colon,
    Coalesce,
    Not,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Tilde,
}

/// Splits an expression into tokens.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ExprError> {
        let mut out = Vec::new();
        while let Some(token) = self.next_token()? {
            out.push(token);
        }
        Ok(out)
    }

    fn remaining(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn next_token(&mut self) -> Result<Option<Token>, ExprError> {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        self.advance(rest.len() - trimmed.len());

        let rest = self.remaining();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        // Longest symbols first.
        const SYMBOLS: [(&str, Token); 28] = [
            ("===", Token::StrictEq),
            ("!==", Token::StrictNotEq),
            ("==", Token::EqEq),
            ("!=", Token::NotEq),
            ("<>", Token::NotEq),
            ("<=", Token::Le),
            (">=", Token::Ge),
            ("&&", Token::AndAnd),
            ("||", Token::OrOr),
            ("??", Token::Coalesce),
            ("->", Token::Arrow),
            ("<", Token::Lt),
            (">", Token::Gt),
            ("!", Token::Not),
            ("?", Token::Question),
            (":", Token::Colon),
            ("(", Token::LParen),
            (")", Token::RParen),
            ("[", Token::LBracket),
            ("]", Token::RBracket),
            (",", Token::Comma),
            ("+", Token::Plus),
            ("-", Token::Minus),
            ("*", Token::Star),
            ("/", Token::Slash),
            ("%", Token::Percent),
            ("~", Token::Tilde),
            (".", Token::Dot),
        ];

        // no leading-dot floats: `list.0` is member access
        if first.is_ascii_digit() {
            return self.lex_number().map(Some);
        }

        if first == '\'' || first == '"' {
            return self.lex_string(first).map(Some);
        }

        if first == '$' {
            let len = ident_len(&rest[1..]);
            if len == 0 {
                return Err(ExprError::Syntax(format!(
                    "expected a name after `$` at offset {}",
                    self.pos
                )));
            }
            let name = rest[1..1 + len].to_string();
            self.advance(1 + len);
            return Ok(Some(Token::Var(name)));
        }

        let len = ident_len(rest);
        if len > 0 {
            let name = rest[..len].to_string();
            self.advance(len);
            return Ok(Some(Token::Ident(name)));
        }

        for (sym, token) in SYMBOLS.iter() {
            if rest.starts_with(sym) {
                self.advance(sym.len());
                return Ok(Some(token.clone()));
            }
        }

        Err(ExprError::Syntax(format!(
            "unexpected character `{}` at offset {}",
            first, self.pos
        )))
    }

    fn lex_number(&mut self) -> Result<Token, ExprError> {
        let rest = self.remaining();
        let mut end = 0;
        let mut seen_dot = false;
        let mut seen_exp = false;
        let bytes = rest.as_bytes();
        while end < bytes.len() {
            let c = bytes[end];
            if c.is_ascii_digit() || c == b'_' {
                end += 1;
            } else if c == b'.'
                && !seen_dot
                && !seen_exp
                && bytes.get(end + 1).is_some_and(|b| b.is_ascii_digit())
            {
                seen_dot = true;
                end += 1;
            } else if (c == b'e' || c == b'E') && !seen_exp && end > 0 {
                let mut next = end + 1;
                if bytes.get(next).is_some_and(|b| *b == b'+' || *b == b'-') {
                    next += 1;
                }
                if !bytes.get(next).is_some_and(|b| b.is_ascii_digit()) {
                    break;
                }
                seen_exp = true;
                end = next;
            } else {
                break;
            }
        }

        let text: String = rest[..end].chars().filter(|c| *c != '_').collect();
        self.advance(end);
        if seen_dot || seen_exp {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|e| ExprError::Syntax(format!("invalid number `{}`: {}", text, e)))
        } else {
            // Integers too large for i64 degrade to floats.
            match text.parse::<i64>() {
                Ok(n) => Ok(Token::Int(n)),
                Err(_) => text
                    .parse::<f64>()
                    .map(Token::Float)
                    .map_err(|e| ExprError::Syntax(format!("invalid number `{}`: {}", text, e))),
            }
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, ExprError> {
        let start = self.pos;
        let rest = &self.remaining()[1..];
        let mut s = String::new();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if c == quote {
                self.advance(1 + i + 1);
                return Ok(Token::Str(s));
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'r')) => s.push('\r'),
                    Some((_, esc)) => s.push(esc),
                    None => break,
                }
            } else {
                s.push(c);
            }
        }
        Err(ExprError::Syntax(format!(
            "unterminated string starting at offset {}",
            start
        )))
    }
}

/// Length of a leading `[A-Za-z_][A-Za-z0-9_]*` identifier, 0 if none.
pub fn ident_len(s: &str) -> usize {
    if !s.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return 0;
    }
    s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> Vec<Token> {
        Lexer::new(s).tokenize().unwrap()
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            lex("$a === 1 && b != 'x'"),
            vec![
                Token::Var("a".to_string()),
                Token::StrictEq,
                Token::Int(1),
                Token::AndAnd,
                Token::Ident("b".to_string()),
                Token::NotEq,
                Token::Str("x".to_string()),
            ]
        );
        assert_eq!(
            lex("a ?? b ?: c"),
            vec![
                Token::Ident("a".to_string()),
                Token::Coalesce,
                Token::Ident("b".to_string()),
                Token::Question,
                Token::Colon,
                Token::Ident("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_lex_numbers() {
        assert_eq!(lex("42"), vec![Token::Int(42)]);
        assert_eq!(lex("1_000"), vec![Token::Int(1000)]);
        assert_eq!(lex("2.5"), vec![Token::Float(2.5)]);
        assert_eq!(
            lex("$list.0"),
            vec![Token::Var("list".to_string()), Token::Dot, Token::Int(0)]
        );
        assert_eq!(lex("1e3"), vec![Token::Float(1000.0)]);
        // member access on a number literal is not a float
        assert_eq!(
            lex("1.x"),
            vec![Token::Int(1), Token::Dot, Token::Ident("x".to_string())]
        );
    }

    #[test]
    fn test_lex_strings() {
        assert_eq!(lex(r#""a\"b""#), vec![Token::Str("a\"b".to_string())]);
        assert_eq!(lex(r"'it\'s'"), vec![Token::Str("it's".to_string())]);
        assert_eq!(lex("'ü'"), vec![Token::Str("ü".to_string())]);
        assert!(Lexer::new("'open").tokenize().is_err());
    }

    #[test]
    fn test_lex_member_access() {
        assert_eq!(
            lex("$row->name"),
            vec![
                Token::Var("row".to_string()),
                Token::Arrow,
                Token::Ident("name".to_string()),
            ]
        );
    }

    #[test]
    fn test_lex_rejects_unknown_characters() {
        assert!(Lexer::new("a ` b").tokenize().is_err());
        assert!(Lexer::new("$ 1").tokenize().is_err());
    }
}
