//! Expression AST nodes

use crate::types::Value;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Value),

    /// Bare name (e.g. `parameters`, a loop variable)
    Identifier(String),

    /// Property access: `object.property` or `object[property]`
    Member {
        object: Box<Expression>,
        property: Box<Expression>,
        computed: bool,
    },

    /// Function call
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },

    /// Unary operation
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// Binary operation
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// Short-circuit logical operation
    Logical {
        left: Box<Expression>,
        op: LogicalOperator,
        right: Box<Expression>,
    },

    /// Ternary conditional (test ? consequent : alternate)
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },

    /// Array literal
    Array(Vec<Expression>),

    /// Object literal, entries in source order
    Object(Vec<(String, Expression)>),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Logical NOT (!)
    Not,
    /// Arithmetic negation (-)
    Negate,
    /// Numeric conversion (+)
    Plus,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl Expression {
    /// Create a literal expression
    pub fn literal(value: Value) -> Self {
        Expression::Literal(value)
    }

    /// Create an identifier expression
    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier(name.into())
    }

    /// Create a dotted member access (`object.name`)
    pub fn member(object: Expression, name: impl Into<String>) -> Self {
        Expression::Member {
            object: Box::new(object),
            property: Box::new(Expression::Identifier(name.into())),
            computed: false,
        }
    }

    /// Create an indexed member access (`object[property]`)
    pub fn index(object: Expression, property: Expression) -> Self {
        Expression::Member {
            object: Box::new(object),
            property: Box::new(property),
            computed: true,
        }
    }

    /// Create a function call expression
    pub fn call(callee: Expression, args: Vec<Expression>) -> Self {
        Expression::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// Create a unary expression
    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a binary expression
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create a logical expression
    pub fn logical(left: Expression, op: LogicalOperator, right: Expression) -> Self {
        Expression::Logical {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create a conditional expression
    pub fn conditional(test: Expression, consequent: Expression, alternate: Expression) -> Self {
        Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        }
    }

    /// Dotted path of a pure identifier/member chain (`parameters.a.b`)
    pub fn as_path(&self) -> Option<Vec<String>> {
        match self {
            Expression::Identifier(name) => Some(vec![name.clone()]),
            Expression::Member {
                object,
                property,
                computed,
            } => {
                let mut path = object.as_path()?;
                match (computed, property.as_ref()) {
                    (false, Expression::Identifier(name)) => path.push(name.clone()),
                    (true, Expression::Literal(Value::String(name))) => path.push(name.clone()),
                    _ => return None,
                }
                Some(path)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_builder() {
        let expr = Expression::member(Expression::identifier("parameters"), "name");
        match expr {
            Expression::Member {
                object,
                property,
                computed,
            } => {
                assert_eq!(*object, Expression::Identifier("parameters".to_string()));
                assert_eq!(*property, Expression::Identifier("name".to_string()));
                assert!(!computed);
            }
            _ => panic!("Expected Member expression"),
        }
    }

    #[test]
    fn test_as_path() {
        let expr = Expression::index(
            Expression::member(Expression::identifier("variables"), "group"),
            Expression::literal(Value::string("key")),
        );
        assert_eq!(
            expr.as_path(),
            Some(vec![
                "variables".to_string(),
                "group".to_string(),
                "key".to_string()
            ])
        );

        let call = Expression::call(Expression::identifier("eq"), vec![]);
        assert_eq!(call.as_path(), None);
    }
}
