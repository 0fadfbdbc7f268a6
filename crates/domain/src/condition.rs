//! Restricted condition expression language.
//!
//! Effects and reaction rules carry free-form string conditions like
//! `after.hp.current <= 0` or `target.guard > 0 and round < 5`. This module
//! evaluates them with a small recursive-descent interpreter limited to
//! boolean logic, chained comparisons, arithmetic, literals, and dotted
//! identifiers resolved against a JSON context. Anything else is rejected,
//! which rules out calls, indexing, and assignment by construction.

use serde_json::Value;
use thiserror::Error;

/// Error from parsing or evaluating a condition expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("Empty condition")]
    Empty,
    #[error("Unexpected token at position {0}: '{1}'")]
    UnexpectedToken(usize, String),
    #[error("Unexpected end of condition")]
    UnexpectedEnd,
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Type error: {0}")]
    TypeError(String),
}

/// Evaluate a condition string against a JSON context.
///
/// Returns the boolean value of the expression. Callers that want the
/// "unsafe conditions are false" policy should map `Err` to `false` and log.
pub fn evaluate_condition(condition: &str, context: &Value) -> Result<bool, ConditionError> {
    let tokens = tokenize(condition)?;
    if tokens.is_empty() {
        return Err(ConditionError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        context,
    };
    let value = parser.parse_or()?;
    parser.expect_end()?;
    Ok(value.truthy())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' | '-' | '*' | '/' | '%' => {
                let op = match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    _ => "%",
                };
                tokens.push(Token::Op(op));
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next_eq = bytes.get(i + 1) == Some(&'=');
                let op = match (c, next_eq) {
                    ('=', true) => "==",
                    ('!', true) => "!=",
                    ('<', true) => "<=",
                    ('>', true) => ">=",
                    ('<', false) => "<",
                    ('>', false) => ">",
                    _ => {
                        return Err(ConditionError::UnexpectedToken(i, c.to_string()));
                    }
                };
                tokens.push(Token::Op(op));
                i += if next_eq { 2 } else { 1 };
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] != quote {
                    j += 1;
                }
                if j >= bytes.len() {
                    return Err(ConditionError::UnexpectedEnd);
                }
                let text: String = bytes[start..j].iter().collect();
                // String literals ride along as quoted identifiers
                tokens.push(Token::Ident(format!("\"{text}\"")));
                i = j + 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == '.') {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ConditionError::UnexpectedToken(start, text.clone()))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '_' || bytes[i] == '.')
                {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                tokens.push(Token::Ident(text));
            }
            other => return Err(ConditionError::UnexpectedToken(i, other.to_string())),
        }
    }

    Ok(tokens)
}

/// Runtime value of a sub-expression.
#[derive(Debug, Clone, PartialEq)]
enum Evaluated {
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl Evaluated {
    fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => !s.is_empty(),
            Self::Null => false,
        }
    }

    fn as_number(&self) -> Result<f64, ConditionError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(ConditionError::TypeError(format!(
                "expected number, got {other:?}"
            ))),
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    context: &'a Value,
}

impl Parser<'_> {
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

    fn expect_end(&self) -> Result<(), ConditionError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(ConditionError::UnexpectedToken(
                self.pos,
                format!("{:?}", self.tokens[self.pos]),
            ))
        }
    }

    fn parse_or(&mut self) -> Result<Evaluated, ConditionError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Ident(w)) if w == "or") {
            self.next();
            let right = self.parse_and()?;
            left = Evaluated::Bool(left.truthy() || right.truthy());
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Evaluated, ConditionError> {
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Some(Token::Ident(w)) if w == "and") {
            self.next();
            let right = self.parse_not()?;
            left = Evaluated::Bool(left.truthy() && right.truthy());
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Evaluated, ConditionError> {
        if matches!(self.peek(), Some(Token::Ident(w)) if w == "not") {
            self.next();
            let inner = self.parse_not()?;
            return Ok(Evaluated::Bool(!inner.truthy()));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Evaluated, ConditionError> {
        let first = self.parse_additive()?;
        let mut left = first;
        let mut result: Option<bool> = None;

        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if !matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=") {
                break;
            }
            self.next();
            let right = self.parse_additive()?;
            let holds = compare(&left, op, &right)?;
            result = Some(result.unwrap_or(true) && holds);
            // Chained comparisons: `3 < x < 7` compares pairwise
            left = right;
        }

        match result {
            Some(b) => Ok(Evaluated::Bool(b)),
            None => Ok(left),
        }
    }

    fn parse_additive(&mut self) -> Result<Evaluated, ConditionError> {
        let mut left = self.parse_multiplicative()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if op != "+" && op != "-" {
                break;
            }
            self.next();
            let right = self.parse_multiplicative()?;
            let value = if op == "+" {
                left.as_number()? + right.as_number()?
            } else {
                left.as_number()? - right.as_number()?
            };
            left = Evaluated::Number(value);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Evaluated, ConditionError> {
        let mut left = self.parse_unary()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if !matches!(op, "*" | "/" | "%") {
                break;
            }
            self.next();
            let right = self.parse_unary()?;
            let (a, b) = (left.as_number()?, right.as_number()?);
            let value = match op {
                "*" => a * b,
                "/" => {
                    if b == 0.0 {
                        return Err(ConditionError::TypeError("division by zero".into()));
                    }
                    a / b
                }
                _ => {
                    if b == 0.0 {
                        return Err(ConditionError::TypeError("modulo by zero".into()));
                    }
                    a % b
                }
            };
            left = Evaluated::Number(value);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Evaluated, ConditionError> {
        if matches!(self.peek(), Some(Token::Op("-"))) {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(Evaluated::Number(-inner.as_number()?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Evaluated, ConditionError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Evaluated::Number(n)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ConditionError::UnexpectedEnd),
                }
            }
            Some(Token::Ident(name)) => self.resolve_ident(&name),
            Some(other) => Err(ConditionError::UnexpectedToken(
                self.pos.saturating_sub(1),
                format!("{other:?}"),
            )),
            None => Err(ConditionError::UnexpectedEnd),
        }
    }

    fn resolve_ident(&self, name: &str) -> Result<Evaluated, ConditionError> {
        // Quoted string literal carried through the tokenizer
        if let Some(text) = name.strip_prefix('"') {
            return Ok(Evaluated::Text(text.trim_end_matches('"').to_string()));
        }
        match name {
            "True" | "true" => return Ok(Evaluated::Bool(true)),
            "False" | "false" => return Ok(Evaluated::Bool(false)),
            "None" | "null" => return Ok(Evaluated::Null),
            _ => {}
        }

        let mut current = self.context;
        for part in name.split('.') {
            match current.get(part) {
                Some(next) => current = next,
                None => return Err(ConditionError::UnknownVariable(name.to_string())),
            }
        }

        Ok(match current {
            Value::Bool(b) => Evaluated::Bool(*b),
            Value::Number(n) => Evaluated::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => Evaluated::Text(s.clone()),
            Value::Null => Evaluated::Null,
            // Objects/arrays are truthy when non-empty, matching the source
            Value::Object(m) => Evaluated::Bool(!m.is_empty()),
            Value::Array(a) => Evaluated::Bool(!a.is_empty()),
        })
    }
}

fn compare(left: &Evaluated, op: &str, right: &Evaluated) -> Result<bool, ConditionError> {
    // Equality works across types; ordering requires numbers
    match op {
        "==" => Ok(loose_eq(left, right)),
        "!=" => Ok(!loose_eq(left, right)),
        _ => {
            let (a, b) = (left.as_number()?, right.as_number()?);
            Ok(match op {
                "<" => a < b,
                "<=" => a <= b,
                ">" => a > b,
                ">=" => a >= b,
                _ => false,
            })
        }
    }
}

fn loose_eq(left: &Evaluated, right: &Evaluated) -> bool {
    match (left, right) {
        (Evaluated::Number(a), Evaluated::Number(b)) => a == b,
        (Evaluated::Text(a), Evaluated::Text(b)) => a == b,
        (Evaluated::Bool(a), Evaluated::Bool(b)) => a == b,
        (Evaluated::Null, Evaluated::Null) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Value {
        json!({
            "after": {"hp": {"current": 2}},
            "before": {"hp": {"current": 8}},
            "effect": {"add": "fear"},
            "target": {"guard": 1, "tags": {}},
            "scene": {"round": 3, "turn_index": 0},
            "hp": 2,
            "guard": 1,
            "round": 3,
        })
    }

    #[test]
    fn test_hp_threshold_condition() {
        assert!(evaluate_condition("after.hp.current <= 3", &ctx()).expect("eval"));
        assert!(!evaluate_condition("after.hp.current <= 0", &ctx()).expect("eval"));
    }

    #[test]
    fn test_crossing_condition() {
        let holds = evaluate_condition(
            "after.hp.current <= 3 and before.hp.current > 3",
            &ctx(),
        )
        .expect("eval");
        assert!(holds);
    }

    #[test]
    fn test_string_equality() {
        assert!(evaluate_condition("effect.add == 'fear'", &ctx()).expect("eval"));
        assert!(!evaluate_condition("effect.add == 'confidence'", &ctx()).expect("eval"));
    }

    #[test]
    fn test_boolean_literals() {
        assert!(evaluate_condition("True", &ctx()).expect("eval"));
        assert!(!evaluate_condition("False", &ctx()).expect("eval"));
    }

    #[test]
    fn test_shorthand_variables() {
        assert!(evaluate_condition("hp <= 3 and guard >= 1", &ctx()).expect("eval"));
        assert!(evaluate_condition("round == 3", &ctx()).expect("eval"));
    }

    #[test]
    fn test_arithmetic() {
        assert!(evaluate_condition("hp + guard == 3", &ctx()).expect("eval"));
        assert!(evaluate_condition("round * 2 - 1 == 5", &ctx()).expect("eval"));
        assert!(evaluate_condition("round % 2 == 1", &ctx()).expect("eval"));
    }

    #[test]
    fn test_chained_comparison() {
        assert!(evaluate_condition("1 < round < 5", &ctx()).expect("eval"));
        assert!(!evaluate_condition("4 < round < 5", &ctx()).expect("eval"));
    }

    #[test]
    fn test_not_and_or() {
        assert!(evaluate_condition("not False or False", &ctx()).expect("eval"));
        assert!(!evaluate_condition("not (hp == 2)", &ctx()).expect("eval"));
    }

    #[test]
    fn test_unknown_variable_is_error() {
        assert!(matches!(
            evaluate_condition("missing.thing > 0", &ctx()),
            Err(ConditionError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_rejected_tokens() {
        // No calls, no indexing, no assignment
        assert!(evaluate_condition("__import__('os')", &ctx()).is_err());
        assert!(evaluate_condition("target[0]", &ctx()).is_err());
        assert!(evaluate_condition("hp = 5", &ctx()).is_err());
    }

    #[test]
    fn test_division_by_zero_is_error() {
        assert!(evaluate_condition("1 / 0 > 0", &ctx()).is_err());
    }
}
