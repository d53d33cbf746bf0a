//! Expression parser
//!
//! Parses the text between `${{` and `}}` into Expression AST nodes.
//!
//! Supported syntax:
//! - Context access: `parameters.name`, `variables['build.id']`, `item.value[0]`
//! - Literals: `42`, `3.14`, `0xFF`, `'string'`, `"string"`, `true`, `false`, `null`
//! - Binary operators: `==`, `!=`, `<`, `>`, `<=`, `>=`, `+`, `-`, `*`, `/`, `%`
//! - Logical operators: `&&`, `||`
//! - Unary operators: `!`, `-`, `+`
//! - Conditional: `test ? a : b`
//! - Function calls: `eq(a, b)`, `parameters.name.toLowerCase()`
//! - Array and object literals: `[1, 2]`, `{ key: 'value' }`

use crate::error::{ParseError, Result};
use pipex_core::ast::{BinaryOperator, Expression, LogicalOperator, UnaryOperator};
use pipex_core::Value;

/// Expression parser
pub struct ExpressionParser;

impl ExpressionParser {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> Result<Expression> {
        let input = input.trim();

        if input.is_empty() {
            return Err(ParseError::InvalidExpression("Empty expression".to_string()));
        }

        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = TokenParser { tokens, pos: 0 };
        let expr = parser.parse_conditional()?;

        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(ParseError::InvalidExpression(format!(
                "Unexpected token {:?} in '{}'",
                token, input
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Question,
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::InvalidExpression(format!("{} at {} in '{}'", message, self.pos, self.source))
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }

            let token = match c {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                '{' => self.single(Token::LBrace),
                '}' => self.single(Token::RBrace),
                ',' => self.single(Token::Comma),
                ':' => self.single(Token::Colon),
                '?' => self.single(Token::Question),
                '.' if !self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
                    self.single(Token::Dot)
                }
                '\'' | '"' => self.string(c)?,
                c if c.is_ascii_digit() || c == '.' => self.number()?,
                c if is_ident_start(c) => self.identifier(),
                _ => self.operator()?,
            };
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn string(&mut self, quote: char) -> Result<Token> {
        self.pos += 1;
        let mut value = String::new();

        loop {
            let c = self.peek().ok_or_else(|| self.error("Unterminated string"))?;
            self.pos += 1;

            if c == quote {
                // '' inside a single-quoted string is an escaped quote
                if quote == '\'' && self.peek() == Some('\'') {
                    value.push('\'');
                    self.pos += 1;
                    continue;
                }
                return Ok(Token::Str(value));
            }

            if c == '\\' && quote == '"' {
                let escaped = self.peek().ok_or_else(|| self.error("Unterminated string"))?;
                self.pos += 1;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                continue;
            }

            value.push(c);
        }
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[digits_start..self.pos].iter().collect();
            return i64::from_str_radix(&digits, 16)
                .map(|n| Token::Number(n as f64))
                .map_err(|_| self.error("Invalid hex literal"));
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e') | Some('E'))
            && self
                .peek_at(1)
                .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+')
        {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error("Invalid number literal"))
    }

    fn identifier(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;

        while let Some(c) = self.peek() {
            if is_ident_char(c) {
                self.pos += 1;
            } else if c == '-' && self.peek_at(1).is_some_and(is_ident_char) {
                // a hyphen is part of the name only when followed by a name char
                self.pos += 1;
            } else {
                break;
            }
        }

        Token::Ident(self.chars[start..self.pos].iter().collect())
    }

    fn operator(&mut self) -> Result<Token> {
        const TWO_CHAR: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
        const ONE_CHAR: [&str; 8] = ["<", ">", "+", "-", "*", "/", "%", "!"];

        let rest: String = self.chars[self.pos..].iter().take(2).collect();
        if let Some(op) = TWO_CHAR.iter().find(|op| rest == **op) {
            self.pos += 2;
            return Ok(Token::Op(*op));
        }

        let first: String = rest.chars().take(1).collect();
        if let Some(op) = ONE_CHAR.iter().find(|op| first == **op) {
            self.pos += 1;
            return Ok(Token::Op(*op));
        }

        Err(self.error("Unexpected character"))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct TokenParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(ParseError::InvalidExpression(format!(
                "Expected {:?}, found {:?}",
                expected,
                self.peek()
            )))
        }
    }

    fn parse_conditional(&mut self) -> Result<Expression> {
        let test = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.parse_conditional()?;
        self.expect(Token::Colon)?;
        let alternate = self.parse_conditional()?;
        Ok(Expression::conditional(test, consequent, alternate))
    }

    fn parse_or(&mut self) -> Result<Expression> {
        let mut left = self.parse_and()?;
        while self.eat_op(&["||"]).is_some() {
            let right = self.parse_and()?;
            left = Expression::logical(left, LogicalOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression> {
        let mut left = self.parse_equality()?;
        while self.eat_op(&["&&"]).is_some() {
            let right = self.parse_equality()?;
            left = Expression::logical(left, LogicalOperator::And, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression> {
        let mut left = self.parse_relational()?;
        while let Some(op) = self.eat_op(&["==", "!="]) {
            let right = self.parse_relational()?;
            left = Expression::binary(left, binary_operator(op), right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression> {
        let mut left = self.parse_additive()?;
        while let Some(op) = self.eat_op(&["<", ">", "<=", ">="]) {
            let right = self.parse_additive()?;
            left = Expression::binary(left, binary_operator(op), right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let right = self.parse_multiplicative()?;
            left = Expression::binary(left, binary_operator(op), right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let right = self.parse_unary()?;
            left = Expression::binary(left, binary_operator(op), right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        if let Some(op) = self.eat_op(&["!", "-", "+"]) {
            let operand = self.parse_unary()?;
            let op = match op {
                "!" => UnaryOperator::Not,
                "-" => UnaryOperator::Negate,
                _ => UnaryOperator::Plus,
            };
            return Ok(Expression::unary(op, operand));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.eat(&Token::Dot) {
                match self.next() {
                    Some(Token::Ident(name)) => expr = Expression::member(expr, name),
                    other => {
                        return Err(ParseError::InvalidExpression(format!(
                            "Expected property name after '.', found {:?}",
                            other
                        )))
                    }
                }
            } else if self.eat(&Token::LBracket) {
                let property = self.parse_conditional()?;
                self.expect(Token::RBracket)?;
                expr = Expression::index(expr, property);
            } else if self.eat(&Token::LParen) {
                let args = self.parse_list(Token::RParen)?;
                expr = Expression::call(expr, args);
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expression::literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expression::literal(Value::String(s))),
            Some(Token::Ident(name)) => Ok(match name.to_ascii_lowercase().as_str() {
                "true" => Expression::literal(Value::Truth(true)),
                "false" => Expression::literal(Value::Truth(false)),
                "null" => Expression::literal(Value::Null),
                _ => Expression::identifier(name),
            }),
            Some(Token::LParen) => {
                let expr = self.parse_conditional()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => Ok(Expression::Array(self.parse_list(Token::RBracket)?)),
            Some(Token::LBrace) => self.parse_object(),
            other => Err(ParseError::InvalidExpression(format!(
                "Unexpected token {:?}",
                other
            ))),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed
    fn parse_list(&mut self, close: Token) -> Result<Vec<Expression>> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.parse_conditional()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expression> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(Expression::Object(entries));
            }
            let key = match self.next() {
                Some(Token::Ident(name)) | Some(Token::Str(name)) => name,
                Some(Token::Number(n)) => pipex_core::types::format_number(n),
                other => {
                    return Err(ParseError::InvalidExpression(format!(
                        "Invalid object key {:?}",
                        other
                    )))
                }
            };
            self.expect(Token::Colon)?;
            entries.push((key, self.parse_conditional()?));
            if !self.eat(&Token::Comma) {
                self.expect(Token::RBrace)?;
                return Ok(Expression::Object(entries));
            }
        }
    }
}

fn binary_operator(op: &str) -> BinaryOperator {
    match op {
        "==" => BinaryOperator::Eq,
        "!=" => BinaryOperator::Ne,
        "<" => BinaryOperator::Lt,
        ">" => BinaryOperator::Gt,
        "<=" => BinaryOperator::Le,
        ">=" => BinaryOperator::Ge,
        "+" => BinaryOperator::Add,
        "-" => BinaryOperator::Sub,
        "*" => BinaryOperator::Mul,
        "/" => BinaryOperator::Div,
        _ => BinaryOperator::Mod,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_literals() {
        assert_eq!(
            ExpressionParser::parse("42").unwrap(),
            Expression::literal(Value::Number(42.0))
        );
        assert_eq!(
            ExpressionParser::parse("3.14").unwrap(),
            Expression::literal(Value::Number(3.14))
        );
        assert_eq!(
            ExpressionParser::parse("0xFF").unwrap(),
            Expression::literal(Value::Number(255.0))
        );
    }

    #[test]
    fn test_parse_string_literals() {
        assert_eq!(
            ExpressionParser::parse("'it''s'").unwrap(),
            Expression::literal(Value::string("it's"))
        );
        assert_eq!(
            ExpressionParser::parse(r#""say \"hi\"""#).unwrap(),
            Expression::literal(Value::string("say \"hi\""))
        );
    }

    #[test]
    fn test_parse_boolean_and_null() {
        assert_eq!(
            ExpressionParser::parse("true").unwrap(),
            Expression::literal(Value::Truth(true))
        );
        assert_eq!(
            ExpressionParser::parse("False").unwrap(),
            Expression::literal(Value::Truth(false))
        );
        assert_eq!(
            ExpressionParser::parse("null").unwrap(),
            Expression::literal(Value::Null)
        );
    }

    #[test]
    fn test_parse_member_access() {
        let expr = ExpressionParser::parse("parameters.build-config.name").unwrap();
        assert_eq!(
            expr.as_path(),
            Some(vec![
                "parameters".to_string(),
                "build-config".to_string(),
                "name".to_string()
            ])
        );

        let expr = ExpressionParser::parse("variables['build.id']").unwrap();
        assert!(matches!(expr, Expression::Member { computed: true, .. }));
    }

    #[test]
    fn test_hyphen_is_subtraction_before_space() {
        let expr = ExpressionParser::parse("a - b").unwrap();
        assert!(matches!(
            expr,
            Expression::Binary {
                op: BinaryOperator::Sub,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_function_call() {
        let expr = ExpressionParser::parse("eq(parameters.env, 'prod')").unwrap();
        if let Expression::Call { callee, args } = expr {
            assert_eq!(*callee, Expression::identifier("eq"));
            assert_eq!(args.len(), 2);
        } else {
            panic!("Expected call");
        }
    }

    #[test]
    fn test_parse_method_call() {
        let expr = ExpressionParser::parse("parameters.name.toLowerCase()").unwrap();
        if let Expression::Call { callee, args } = expr {
            assert!(matches!(*callee, Expression::Member { .. }));
            assert!(args.is_empty());
        } else {
            panic!("Expected call");
        }
    }

    #[test]
    fn test_precedence() {
        // a || b && c  =>  a || (b && c)
        let expr = ExpressionParser::parse("a || b && c").unwrap();
        if let Expression::Logical { op, right, .. } = expr {
            assert_eq!(op, LogicalOperator::Or);
            assert!(matches!(
                *right,
                Expression::Logical {
                    op: LogicalOperator::And,
                    ..
                }
            ));
        } else {
            panic!("Expected logical");
        }

        // 1 + 2 * 3  =>  1 + (2 * 3)
        let expr = ExpressionParser::parse("1 + 2 * 3").unwrap();
        assert!(matches!(
            expr,
            Expression::Binary {
                op: BinaryOperator::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_conditional() {
        let expr = ExpressionParser::parse("parameters.debug ? 'Debug' : 'Release'").unwrap();
        assert!(matches!(expr, Expression::Conditional { .. }));
    }

    #[test]
    fn test_parse_array_and_object() {
        let expr = ExpressionParser::parse("[1, 2, 3]").unwrap();
        assert!(matches!(expr, Expression::Array(ref items) if items.len() == 3));

        let expr = ExpressionParser::parse("{ name: 'a', 'other key': 2 }").unwrap();
        if let Expression::Object(entries) = expr {
            assert_eq!(entries[0].0, "name");
            assert_eq!(entries[1].0, "other key");
        } else {
            panic!("Expected object");
        }
    }

    #[test]
    fn test_invalid_expression() {
        assert!(ExpressionParser::parse("").is_err());
        assert!(ExpressionParser::parse("@#$").is_err());
        assert!(ExpressionParser::parse("eq(a,").is_err());
        assert!(ExpressionParser::parse("a b").is_err());
        assert!(ExpressionParser::parse("'unterminated").is_err());
    }
}
