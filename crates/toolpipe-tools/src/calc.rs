//! Calc tool: evaluate small arithmetic expressions.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '//') unary)*
//! unary  := ('+' | '-') unary | power
//! power  := atom ('**' unary)?
//! atom   := NUMBER | '(' expr ')'
//! ```
//!
//! Integers stay integers until true division (`/`) or a negative exponent
//! produces a float.

use serde::Deserialize;
use serde_json::{Value, json};
use toolpipe_types::{Tool, ToolDefinition, ToolError};

const ALLOWED: &str = "0123456789+-*/(). ";

/// Tool for evaluating arithmetic over digits, `+ - * / ( ) .` and spaces.
pub struct CalcTool;

#[derive(Deserialize)]
struct CalcInput {
    expression: String,
}

impl Tool for CalcTool {
    fn name(&self) -> &str {
        "calc"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calc".to_string(),
            description: "Very small calculator tool. \
                          Only supports safe characters: digits + - * / ( ) . and spaces."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["expression"],
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Arithmetic expression, e.g. 2+2*3"
                    }
                }
            }),
        }
    }

    fn execute(
        &self,
        input: Value,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value, ToolError>> + Send + '_>>
    {
        Box::pin(async move {
            let input: CalcInput =
                serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
                    tool: "calc".into(),
                    message: e.to_string(),
                })?;

            if input.expression.chars().any(|c| !ALLOWED.contains(c)) {
                return Ok(json!({"error": "Unsupported characters in expression."}));
            }

            Ok(match evaluate(&input.expression) {
                Ok(result) => json!({"expression": input.expression, "result": result.to_json()}),
                Err(message) => json!({"error": message}),
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn to_json(self) -> Value {
        match self {
            Num::Int(i) => json!(i),
            Num::Float(f) => json!(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(Num),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    DoubleStar,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_number(&literal)?));
            }
            other => return Err(format!("invalid character '{other}'")),
        }
    }

    Ok(tokens)
}

fn parse_number(literal: &str) -> Result<Num, String> {
    if literal.contains('.') {
        if literal == "." || literal.matches('.').count() > 1 {
            return Err("invalid syntax".to_string());
        }
        return literal
            .parse::<f64>()
            .map(Num::Float)
            .map_err(|_| "invalid syntax".to_string());
    }
    if literal.len() > 1 && literal.starts_with('0') && literal.chars().any(|c| c != '0') {
        return Err("leading zeros in decimal integer literals are not permitted".to_string());
    }
    literal
        .parse::<i64>()
        .map(Num::Int)
        .map_err(|_| "integer literal too large".to_string())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Num, String> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = apply(op, value, rhs)?;
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Num, String> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash | Token::DoubleSlash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = apply(op, value, rhs)?;
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Num, String> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Minus) => {
                self.pos += 1;
                match self.unary()? {
                    Num::Int(i) => i
                        .checked_neg()
                        .map(Num::Int)
                        .ok_or_else(|| "integer overflow".to_string()),
                    Num::Float(f) => Ok(Num::Float(-f)),
                }
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Num, String> {
        let base = self.atom()?;
        if self.peek() == Some(Token::DoubleStar) {
            self.pos += 1;
            let exponent = self.unary()?;
            return apply(Token::DoubleStar, base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Num, String> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("'(' was never closed".to_string()),
                }
            }
            _ => Err("invalid syntax".to_string()),
        }
    }
}

fn apply(op: Token, lhs: Num, rhs: Num) -> Result<Num, String> {
    use Num::{Float, Int};

    let overflow = || "integer overflow".to_string();
    let result = match (op, lhs, rhs) {
        (Token::Plus, Int(a), Int(b)) => Int(a.checked_add(b).ok_or_else(overflow)?),
        (Token::Minus, Int(a), Int(b)) => Int(a.checked_sub(b).ok_or_else(overflow)?),
        (Token::Star, Int(a), Int(b)) => Int(a.checked_mul(b).ok_or_else(overflow)?),
        (Token::Plus, a, b) => Float(a.as_f64() + b.as_f64()),
        (Token::Minus, a, b) => Float(a.as_f64() - b.as_f64()),
        (Token::Star, a, b) => Float(a.as_f64() * b.as_f64()),
        (Token::Slash, a, b) => {
            if b.as_f64() == 0.0 {
                return Err("division by zero".to_string());
            }
            Float(a.as_f64() / b.as_f64())
        }
        (Token::DoubleSlash, Int(a), Int(b)) => {
            if b == 0 {
                return Err("integer division or modulo by zero".to_string());
            }
            Int(floor_div(a, b).ok_or_else(overflow)?)
        }
        (Token::DoubleSlash, a, b) => {
            if b.as_f64() == 0.0 {
                return Err("float floor division by zero".to_string());
            }
            Float((a.as_f64() / b.as_f64()).floor())
        }
        (Token::DoubleStar, Int(a), Int(b)) if b >= 0 => {
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            Int(a.checked_pow(exp).ok_or_else(overflow)?)
        }
        (Token::DoubleStar, a, b) => {
            if a.as_f64() == 0.0 && b.as_f64() < 0.0 {
                return Err("0.0 cannot be raised to a negative power".to_string());
            }
            let value = a.as_f64().powf(b.as_f64());
            if value.is_nan() {
                return Err("complex results are not supported".to_string());
            }
            Float(value)
        }
        _ => return Err("invalid syntax".to_string()),
    };

    match result {
        Float(f) if f.is_infinite() => Err("numerical result out of range".to_string()),
        other => Ok(other),
    }
}

/// Integer division rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn evaluate(expr: &str) -> Result<Num, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("invalid syntax".to_string());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(expression: &str) -> Value {
        CalcTool
            .execute(json!({"expression": expression}))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn precedence_is_respected() {
        assert_eq!(
            run("2+2*3").await,
            json!({"expression": "2+2*3", "result": 8})
        );
    }

    #[tokio::test]
    async fn unsupported_characters_are_rejected() {
        assert_eq!(
            run("2+;rm").await,
            json!({"error": "Unsupported characters in expression."})
        );
        assert_eq!(
            run("__import__('os')").await,
            json!({"error": "Unsupported characters in expression."})
        );
    }

    #[tokio::test]
    async fn syntax_errors_are_reported_as_values() {
        let out = run("2+").await;
        assert_eq!(out["error"], "invalid syntax");
        let out = run("(1+2").await;
        assert!(out["error"].as_str().unwrap().contains("never closed"));
        let out = run("1 2").await;
        assert_eq!(out["error"], "invalid syntax");
    }

    #[tokio::test]
    async fn division_by_zero_is_reported_as_value() {
        assert_eq!(run("1/0").await, json!({"error": "division by zero"}));
    }

    #[tokio::test]
    async fn missing_expression_is_invalid_input() {
        let err = CalcTool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[test]
    fn true_division_yields_float() {
        assert_eq!(evaluate("7/2").unwrap(), Num::Float(3.5));
        assert_eq!(evaluate("4/2").unwrap(), Num::Float(2.0));
    }

    #[test]
    fn floor_division_rounds_down() {
        assert_eq!(evaluate("7//2").unwrap(), Num::Int(3));
        assert_eq!(evaluate("-7//2").unwrap(), Num::Int(-4));
        assert_eq!(evaluate("7.0//2").unwrap(), Num::Float(3.0));
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_unary_minus() {
        assert_eq!(evaluate("2**3**2").unwrap(), Num::Int(512));
        assert_eq!(evaluate("-2**2").unwrap(), Num::Int(-4));
        assert_eq!(evaluate("2**-1").unwrap(), Num::Float(0.5));
    }

    #[test]
    fn parentheses_and_whitespace() {
        assert_eq!(evaluate(" ( 1 + 2 ) * 3 ").unwrap(), Num::Int(9));
        assert_eq!(evaluate("--3").unwrap(), Num::Int(3));
        assert_eq!(evaluate(".5 + 1.").unwrap(), Num::Float(1.5));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert!(evaluate("1.2.3").is_err());
        assert!(evaluate("007").is_err());
        assert_eq!(evaluate("000").unwrap(), Num::Int(0));
        assert!(evaluate("").is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        assert_eq!(
            evaluate("9223372036854775807+1").unwrap_err(),
            "integer overflow"
        );
        assert!(evaluate("2**64").is_err());
    }
}
