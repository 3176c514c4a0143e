//! Calculator capability.
//!
//! Evaluates arithmetic expressions with `+`, `-`, `*`, `/`, parentheses,
//! and unary negation, via a small recursive-descent parser. Evaluation
//! failures surface as [`CapabilityError::ExecutionFailed`] so the loop's
//! envelope normalization sees the same error shape as any other handler.

use crate::capability::{Capability, ParamSpec};
use async_trait::async_trait;
use braidline_core::error::CapabilityError;

pub struct CalculatorCapability;

#[async_trait]
impl Capability for CalculatorCapability {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports +, -, *, /, parentheses, and decimal numbers."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "expression",
            "string",
            "The mathematical expression to evaluate, e.g. '(2 + 3) * 4'",
        )]
    }

    async fn execute(
        &self,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, CapabilityError> {
        let expr = arguments
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                CapabilityError::InvalidArguments("missing 'expression' argument".into())
            })?;

        let value = evaluate(expr)?;

        // Integers serialize without a trailing .0 for model readability.
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Ok(serde_json::json!(value as i64))
        } else {
            Ok(serde_json::json!(value))
        }
    }
}

// ── Expression evaluation ─────────────────────────────────────────────────

/// Evaluate an arithmetic expression string.
pub fn evaluate(expr: &str) -> Result<f64, CapabilityError> {
    let tokens = lex(expr)?;
    let mut parser = ExprParser {
        tokens: tokens.as_slice(),
        pos: 0,
    };
    let value = parser.sum()?;
    if let Some(tok) = parser.peek() {
        return Err(eval_error(format!("trailing input after expression: {tok}")));
    }
    Ok(value)
}

fn eval_error(reason: impl Into<String>) -> CapabilityError {
    CapabilityError::ExecutionFailed {
        name: "calculator".into(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Op(c) => write!(f, "'{c}'"),
            Token::Open => write!(f, "'('"),
            Token::Close => write!(f, "')'"),
        }
    }
}

fn lex(input: &str) -> Result<Vec<Token>, CapabilityError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[start..end];
                let n: f64 = literal
                    .parse()
                    .map_err(|_| eval_error(format!("invalid number: {literal}")))?;
                tokens.push(Token::Num(n));
            }
            c => return Err(eval_error(format!("unexpected character: '{c}'"))),
        }
    }

    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // sum = product (('+' | '-') product)*
    fn sum(&mut self) -> Result<f64, CapabilityError> {
        let mut acc = self.product()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.product()?;
            if op == '+' {
                acc += rhs;
            } else {
                acc -= rhs;
            }
        }
        Ok(acc)
    }

    // product = unary (('*' | '/') unary)*
    fn product(&mut self) -> Result<f64, CapabilityError> {
        let mut acc = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op == '*' {
                acc *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err(eval_error("division by zero"));
                }
                acc /= rhs;
            }
        }
        Ok(acc)
    }

    // unary = '-' unary | atom
    fn unary(&mut self) -> Result<f64, CapabilityError> {
        if let Some(Token::Op('-')) = self.peek() {
            self.pos += 1;
            return Ok(-self.unary()?);
        }
        self.atom()
    }

    // atom = NUMBER | '(' sum ')'
    fn atom(&mut self) -> Result<f64, CapabilityError> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.sum()?;
                match self.advance() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(eval_error("expected closing parenthesis")),
                }
            }
            Some(tok) => Err(eval_error(format!("unexpected token: {tok}"))),
            None => Err(eval_error("unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_arithmetic() {
        assert_eq!(evaluate("2 + 3").unwrap(), 5.0);
        assert_eq!(evaluate("10 - 4").unwrap(), 6.0);
        assert_eq!(evaluate("6 * 7").unwrap(), 42.0);
        assert_eq!(evaluate("15 / 3").unwrap(), 5.0);
    }

    #[test]
    fn precedence_and_parens() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("-(2 + 3)").unwrap(), -5.0);
        assert_eq!(evaluate("--4").unwrap(), 4.0);
    }

    #[test]
    fn division_by_zero_rejected() {
        let err = evaluate("1 / 0").unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn garbage_rejected() {
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("hello").is_err());
        assert!(evaluate("3 3").is_err());
        assert!(evaluate("1.2.3").is_err());
    }

    #[test]
    fn errors_carry_capability_name() {
        let err = evaluate("(1 + 2").unwrap_err();
        assert!(matches!(
            err,
            CapabilityError::ExecutionFailed { ref name, .. } if name == "calculator"
        ));
    }

    #[tokio::test]
    async fn capability_formats_integers() {
        let args = serde_json::json!({"expression": "2 + 3"});
        let result = CalculatorCapability
            .execute(args.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!(5));
    }

    #[tokio::test]
    async fn capability_propagates_eval_errors() {
        let args = serde_json::json!({"expression": "1 / 0"});
        let err = CalculatorCapability
            .execute(args.as_object().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }
}
