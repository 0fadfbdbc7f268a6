//! Dice expression parsing and seeded evaluation.
//!
//! Supports signed multi-term expressions like "1d6", "-2d4+1", "2d6+1d4-2".
//! Evaluation takes a caller-provided RNG so the engine can replay rolls
//! deterministically from a turn seed.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error when parsing a dice expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceParseError {
    /// The expression string is empty
    #[error("Empty dice expression")]
    Empty,
    /// Invalid format - expected terms like NdM or constants joined by +/-
    #[error("Invalid dice expression: {0}")]
    InvalidFormat(String),
    /// Dice count must be at least 1
    #[error("Dice count must be at least 1")]
    InvalidDiceCount,
    /// Die size must be at least 2
    #[error("Die size must be at least 2")]
    InvalidDieSize,
}

/// One signed term of an expression: either `NdM` dice or a flat constant.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Dice { count: u32, size: u32, negative: bool },
    Constant(i64),
}

/// A parsed dice expression like "2d6+1d4-2".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceExpression {
    terms: Vec<Term>,
    source: String,
}

/// One constituent die result, kept for replay logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieRoll {
    /// Die size (the M in NdM)
    pub size: u32,
    /// Rolled value in [1, size]
    pub value: u32,
    /// Whether this term was subtracted
    pub negative: bool,
}

/// Result of evaluating a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Signed total including constants
    pub total: i64,
    /// Every individual die rolled, in order
    pub details: Vec<DieRoll>,
    /// The expression that produced this roll
    pub expression: String,
}

/// Quick check for strings that look like a dice expression rather than a
/// plain integer ("2d6", "-1d4+2"). Plain signed integers return false.
pub fn looks_like_dice(s: &str) -> bool {
    let s = s.trim();
    s.contains('d') || s.contains('D')
}

impl DiceExpression {
    /// Parse an expression of signed `NdM` and constant terms joined by +/-.
    ///
    /// Supported forms:
    /// - "1d6", "d20" (implicit count of 1)
    /// - "2d6+3", "1d8-1"
    /// - "2d4+1d6", "-1d6+2"
    pub fn parse(input: &str) -> Result<Self, DiceParseError> {
        let source = input.trim().to_lowercase();
        if source.is_empty() {
            return Err(DiceParseError::Empty);
        }

        // Split into signed chunks by scanning for +/- separators.
        let mut terms = Vec::new();
        let mut chunk = String::new();
        let mut negative = false;
        let mut chars = source.chars().peekable();

        // Optional leading sign
        if let Some(&c) = chars.peek() {
            if c == '-' {
                negative = true;
                chars.next();
            } else if c == '+' {
                chars.next();
            }
        }

        let flush = |chunk: &mut String, negative: bool, terms: &mut Vec<Term>| {
            if chunk.is_empty() {
                return Err(DiceParseError::InvalidFormat(source.clone()));
            }
            terms.push(Self::parse_term(chunk, negative)?);
            chunk.clear();
            Ok(())
        };

        for c in chars {
            match c {
                '+' | '-' => {
                    flush(&mut chunk, negative, &mut terms)?;
                    negative = c == '-';
                }
                c if c.is_ascii_alphanumeric() => chunk.push(c),
                c if c.is_whitespace() => {}
                _ => return Err(DiceParseError::InvalidFormat(source)),
            }
        }
        flush(&mut chunk, negative, &mut terms)?;

        Ok(Self { terms, source })
    }

    fn parse_term(chunk: &str, negative: bool) -> Result<Term, DiceParseError> {
        if let Some(d_pos) = chunk.find('d') {
            let count_str = &chunk[..d_pos];
            let size_str = &chunk[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1 // "d20" means "1d20"
            } else {
                count_str.parse().map_err(|_| {
                    DiceParseError::InvalidFormat(format!("invalid dice count: '{count_str}'"))
                })?
            };
            if count == 0 {
                return Err(DiceParseError::InvalidDiceCount);
            }

            let size: u32 = size_str.parse().map_err(|_| {
                DiceParseError::InvalidFormat(format!("invalid die size: '{size_str}'"))
            })?;
            if size < 2 {
                return Err(DiceParseError::InvalidDieSize);
            }

            Ok(Term::Dice { count, size, negative })
        } else {
            let value: i64 = chunk.parse().map_err(|_| {
                DiceParseError::InvalidFormat(format!("invalid constant: '{chunk}'"))
            })?;
            Ok(Term::Constant(if negative { -value } else { value }))
        }
    }

    /// Roll the expression with the provided RNG, capturing every die.
    pub fn roll<R: Rng>(&self, rng: &mut R) -> DiceRoll {
        let mut total: i64 = 0;
        let mut details = Vec::new();

        for term in &self.terms {
            match term {
                Term::Dice { count, size, negative } => {
                    for _ in 0..*count {
                        let value = rng.gen_range(1..=*size);
                        details.push(DieRoll {
                            size: *size,
                            value,
                            negative: *negative,
                        });
                        if *negative {
                            total -= i64::from(value);
                        } else {
                            total += i64::from(value);
                        }
                    }
                }
                Term::Constant(value) => total += value,
            }
        }

        DiceRoll {
            total,
            details,
            expression: self.source.clone(),
        }
    }

    /// Minimum possible total.
    pub fn min_total(&self) -> i64 {
        self.terms
            .iter()
            .map(|t| match t {
                Term::Dice { count, size, negative } => {
                    let edge = if *negative {
                        -i64::from(*count) * i64::from(*size)
                    } else {
                        i64::from(*count)
                    };
                    edge
                }
                Term::Constant(v) => *v,
            })
            .sum()
    }

    /// Maximum possible total.
    pub fn max_total(&self) -> i64 {
        self.terms
            .iter()
            .map(|t| match t {
                Term::Dice { count, size, negative } => {
                    if *negative {
                        -i64::from(*count)
                    } else {
                        i64::from(*count) * i64::from(*size)
                    }
                }
                Term::Constant(v) => *v,
            })
            .sum()
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_simple_d20() {
        let expr = DiceExpression::parse("1d20").expect("parse");
        assert_eq!(expr.min_total(), 1);
        assert_eq!(expr.max_total(), 20);
    }

    #[test]
    fn test_parse_shorthand_d20() {
        let expr = DiceExpression::parse("d20").expect("parse");
        assert_eq!(expr.max_total(), 20);
    }

    #[test]
    fn test_parse_with_positive_modifier() {
        let expr = DiceExpression::parse("1d6+2").expect("parse");
        assert_eq!(expr.min_total(), 3);
        assert_eq!(expr.max_total(), 8);
    }

    #[test]
    fn test_parse_with_negative_modifier() {
        let expr = DiceExpression::parse("1d6-2").expect("parse");
        assert_eq!(expr.min_total(), -1);
        assert_eq!(expr.max_total(), 4);
    }

    #[test]
    fn test_parse_negative_expression() {
        let expr = DiceExpression::parse("-1d6").expect("parse");
        assert_eq!(expr.min_total(), -6);
        assert_eq!(expr.max_total(), -1);
    }

    #[test]
    fn test_parse_multi_term() {
        let expr = DiceExpression::parse("2d4+1d6-1").expect("parse");
        assert_eq!(expr.min_total(), 2);
        assert_eq!(expr.max_total(), 13);
    }

    #[test]
    fn test_parse_case_insensitive_and_whitespace() {
        let expr = DiceExpression::parse("  2D6+3  ").expect("parse");
        assert_eq!(expr.max_total(), 15);
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(DiceExpression::parse(""), Err(DiceParseError::Empty)));
    }

    #[test]
    fn test_parse_invalid_zero_dice() {
        assert!(matches!(
            DiceExpression::parse("0d6"),
            Err(DiceParseError::InvalidDiceCount)
        ));
    }

    #[test]
    fn test_parse_invalid_die_size() {
        assert!(matches!(
            DiceExpression::parse("1d1"),
            Err(DiceParseError::InvalidDieSize)
        ));
    }

    #[test]
    fn test_parse_invalid_garbage() {
        assert!(DiceExpression::parse("abc").is_err());
        assert!(DiceExpression::parse("1d").is_err());
    }

    #[test]
    fn test_roll_within_bounds() {
        let expr = DiceExpression::parse("2d6+1").expect("parse");
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let roll = expr.roll(&mut rng);
            assert!(roll.total >= expr.min_total() && roll.total <= expr.max_total());
            assert_eq!(roll.details.len(), 2);
        }
    }

    #[test]
    fn test_roll_is_deterministic_for_seed() {
        let expr = DiceExpression::parse("3d8+2").expect("parse");
        let a = expr.roll(&mut StdRng::seed_from_u64(42));
        let b = expr.roll(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_negative_expression_roll_is_negative() {
        let expr = DiceExpression::parse("-1d6").expect("parse");
        let mut rng = StdRng::seed_from_u64(3);
        let roll = expr.roll(&mut rng);
        assert!(roll.total <= -1);
        assert!(roll.details[0].negative);
    }

    #[test]
    fn test_looks_like_dice() {
        assert!(looks_like_dice("2d6"));
        assert!(looks_like_dice("-1D4+2"));
        assert!(!looks_like_dice("-3"));
        assert!(!looks_like_dice("12"));
    }
}
