//! Recursive-descent parser that evaluates while it parses.
//!
//! Precedence, lowest to highest:
//!
//! ```text
//! or        := and ( "||" and )*
//! and       := equality ( "&&" equality )*
//! equality  := relational ( ( "==" | "!=" ) relational )*
//! relational:= unary ( ( "<" | "<=" | ">" | ">=" ) unary )*
//! unary     := "!" unary | postfix
//! postfix   := primary ( "(" args ")" | "." ident | "[" or "]" )*
//! primary   := number | string | true | false | null | ident | "(" or ")"
//! ```
//!
//! `&&` and `||` evaluate both operands before combining them.

use super::context::EvaluationContext;
use super::lexer::{Token, TokenKind};
use super::value::Value;
use crate::error::ExpressionError;

/// Evaluate a token stream (as produced by `tokenize`) against a context.
pub fn evaluate(tokens: &[Token], ctx: &EvaluationContext) -> Result<Value, ExpressionError> {
    if tokens.is_empty() {
        return Err(ExpressionError::UnexpectedEnd {
            expected: "an expression".into(),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        ctx,
    };
    let value = parser.or()?.into_value();
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(unexpected(trailing));
    }
    Ok(value)
}

/// Intermediate result: a bare identifier stays a name until we know
/// whether it is being called.
enum Operand {
    Value(Value),
    Name(String),
}

impl Operand {
    fn into_value(self) -> Value {
        match self {
            Operand::Value(v) => v,
            Operand::Name(name) => Value::String(name),
        }
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ctx: &'a EvaluationContext,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &'a Token {
        // tokenize() guarantees a trailing EOF, but hand-built slices may not.
        let tokens: &'a [Token] = self.tokens;
        &tokens[self.pos.min(tokens.len().saturating_sub(1))]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len() || self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Result<&'a Token, ExpressionError> {
        if self.at_end() {
            return Err(ExpressionError::UnexpectedEnd {
                expected: "an operand".into(),
            });
        }
        let tokens: &'a [Token] = self.tokens;
        let token = &tokens[self.pos];
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, symbol: &str) -> bool {
        if !self.at_end() && self.peek().is_symbol(symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, symbol: &str) -> Result<(), ExpressionError> {
        if self.eat(symbol) {
            return Ok(());
        }
        if self.at_end() {
            return Err(ExpressionError::UnexpectedEnd {
                expected: format!("'{symbol}'"),
            });
        }
        Err(unexpected(self.peek()))
    }

    fn or(&mut self) -> Result<Operand, ExpressionError> {
        let mut left = self.and()?.into_value();
        while self.eat("||") {
            let right = self.and()?.into_value();
            left = Value::Bool(left.to_bool() || right.to_bool());
        }
        Ok(Operand::Value(left))
    }

    fn and(&mut self) -> Result<Operand, ExpressionError> {
        let mut left = self.equality()?.into_value();
        while self.eat("&&") {
            let right = self.equality()?.into_value();
            left = Value::Bool(left.to_bool() && right.to_bool());
        }
        Ok(Operand::Value(left))
    }

    fn equality(&mut self) -> Result<Operand, ExpressionError> {
        let mut left = self.relational()?;
        loop {
            let negate = if self.eat("==") {
                false
            } else if self.eat("!=") {
                true
            } else {
                return Ok(left);
            };
            let l = left.into_value();
            let r = self.relational()?.into_value();
            left = Operand::Value(Value::Bool(l.loose_eq(&r) != negate));
        }
    }

    fn relational(&mut self) -> Result<Operand, ExpressionError> {
        let mut left = self.unary()?;
        loop {
            let op = match ["<=", ">=", "<", ">"].into_iter().find(|op| self.eat(op)) {
                Some(op) => op,
                None => return Ok(left),
            };
            let l = left.into_value().to_number();
            let r = self.unary()?.into_value().to_number();
            let result = match op {
                "<" => l < r,
                "<=" => l <= r,
                ">" => l > r,
                _ => l >= r,
            };
            left = Operand::Value(Value::Bool(result));
        }
    }

    fn unary(&mut self) -> Result<Operand, ExpressionError> {
        if self.eat("!") {
            let operand = self.unary()?.into_value();
            return Ok(Operand::Value(Value::Bool(!operand.to_bool())));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Operand, ExpressionError> {
        let mut operand = self.primary()?;
        loop {
            if self.eat("(") {
                let name = match operand {
                    Operand::Name(name) => name,
                    Operand::Value(v) => {
                        return Err(ExpressionError::NotCallable {
                            name: v.to_string(),
                        });
                    }
                };
                let args = self.arguments()?;
                operand = Operand::Value(self.ctx.functions().call(&name, self.ctx, &args)?);
            } else if self.eat(".") {
                let token = self.advance()?;
                if token.kind != TokenKind::Identifier {
                    return Err(unexpected(token));
                }
                let member = token.text.clone();
                operand = Operand::Value(operand.into_value().member(&member));
            } else if self.eat("[") {
                let index = self.or()?.into_value();
                self.expect("]")?;
                operand = Operand::Value(operand.into_value().index(&index));
            } else {
                return Ok(operand);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Value>, ExpressionError> {
        let mut args = Vec::new();
        if self.eat(")") {
            return Ok(args);
        }
        loop {
            args.push(self.or()?.into_value());
            if self.eat(")") {
                return Ok(args);
            }
            self.expect(",")?;
        }
    }

    fn primary(&mut self) -> Result<Operand, ExpressionError> {
        if self.eat("(") {
            let inner = self.or()?;
            self.expect(")")?;
            return Ok(inner);
        }

        let token = self.advance()?;
        match token.kind {
            TokenKind::Integer => Ok(Operand::Value(match token.text.parse::<i64>() {
                Ok(i) => Value::Int(i),
                // Out of i64 range: keep the magnitude as a float.
                Err(_) => Value::Float(token.text.parse::<f64>().unwrap_or(0.0)),
            })),
            TokenKind::Float => Ok(Operand::Value(Value::Float(
                token.text.parse::<f64>().unwrap_or(0.0),
            ))),
            TokenKind::String => Ok(Operand::Value(Value::String(token.text.clone()))),
            TokenKind::Identifier => Ok(match token.text.as_str() {
                "true" => Operand::Value(Value::Bool(true)),
                "false" => Operand::Value(Value::Bool(false)),
                "null" => Operand::Value(Value::Null),
                name => match self.ctx.root(name) {
                    Some(root) => Operand::Value(root),
                    None => Operand::Name(name.to_string()),
                },
            }),
            _ => Err(unexpected(token)),
        }
    }
}

fn unexpected(token: &Token) -> ExpressionError {
    if token.kind == TokenKind::Eof {
        return ExpressionError::UnexpectedEnd {
            expected: "an operand".into(),
        };
    }
    ExpressionError::UnexpectedToken {
        token: token.text.clone(),
        position: token.position,
    }
}
