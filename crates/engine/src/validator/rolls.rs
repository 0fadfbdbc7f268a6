//! Shared Style+Domain roll resolution and DC derivation.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taleforge_domain::{DiceExpression, Scene};

use crate::catalog::RollAction;

/// Qualitative bucket of a roll outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollOutcome {
    CritSuccess,
    Success,
    Partial,
    Fail,
}

impl RollOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CritSuccess => "crit_success",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Fail => "fail",
        }
    }

    pub fn to_text(&self) -> &'static str {
        match self {
            Self::CritSuccess => "succeeded brilliantly",
            Self::Success => "succeeded",
            Self::Partial => "partially succeeded",
            Self::Fail => "failed",
        }
    }

    pub fn is_hit(&self) -> bool {
        !matches!(self, Self::Fail)
    }
}

/// Fully resolved roll: d20 + style dice vs a DC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollResolution {
    pub d20: i64,
    pub style_dice: Vec<i64>,
    pub style_sum: i64,
    pub total: i64,
    pub dc: i64,
    pub margin: i64,
    pub effective_style: i64,
    pub outcome: RollOutcome,
}

impl RollResolution {
    /// The `dice` block handed to the narrator.
    pub fn dice_block(&self) -> Value {
        json!({
            "d20": self.d20,
            "style": self.style_dice,
            "style_sum": self.style_sum,
            "total": self.total,
            "dc": self.dc,
            "margin": self.margin,
            "effective_style": self.effective_style,
        })
    }
}

/// Roll d20 + `effective_style` dice of `die_size` against a DC.
///
/// Outcome bands: natural 20 or margin >= 5 is a critical success, margin
/// >= 0 a success, margin >= -3 a partial, anything lower a failure.
pub fn resolve_roll(rng: &mut StdRng, effective_style: i64, die_size: u32, dc: i64) -> RollResolution {
    let d20 = i64::from(rng.gen_range(1..=20u32));
    let style_dice: Vec<i64> = (0..effective_style.max(0))
        .map(|_| i64::from(rng.gen_range(1..=die_size)))
        .collect();
    let style_sum: i64 = style_dice.iter().sum();
    let total = d20 + style_sum;
    let margin = total - dc;

    let outcome = if d20 == 20 || margin >= 5 {
        RollOutcome::CritSuccess
    } else if margin >= 0 {
        RollOutcome::Success
    } else if margin >= -3 {
        RollOutcome::Partial
    } else {
        RollOutcome::Fail
    };

    RollResolution {
        d20,
        style_dice,
        style_sum,
        total,
        dc,
        margin,
        effective_style: effective_style.max(0),
        outcome,
    }
}

/// Derive the DC for an action from the scene's base DC plus additive tag
/// adjustments, clamped to [8, 20]. Sneak reads alert/lighting/noise/cover;
/// persuade reads alert only; everything else takes the base DC.
pub fn derive_dc(action: RollAction, scene: &Scene) -> i64 {
    let sneak_adjust: &[((&str, &str), i64)] = &[
        (("alert", "sleepy"), -2),
        (("alert", "wary"), 2),
        (("alert", "alarmed"), 3),
        (("lighting", "bright"), 2),
        (("lighting", "dim"), -1),
        (("noise", "loud"), -1),
        (("noise", "quiet"), 1),
        (("cover", "good"), -2),
        (("cover", "none"), 2),
    ];
    let persuade_adjust: &[((&str, &str), i64)] = &[
        (("alert", "sleepy"), -1),
        (("alert", "wary"), 1),
        (("alert", "alarmed"), 2),
    ];

    let table = match action {
        RollAction::Sneak => sneak_adjust,
        RollAction::Persuade => persuade_adjust,
        _ => &[],
    };

    let mut dc = scene.base_dc;
    for (key, value) in &scene.tags {
        for ((tag_key, tag_value), adjustment) in table {
            if key == tag_key && value == tag_value {
                dc += adjustment;
            }
        }
    }

    dc.clamp(8, 20)
}

/// One rolled damage die with its role (base or crit bonus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageDie {
    #[serde(rename = "type")]
    pub role: String,
    pub value: i64,
}

/// Roll a damage expression like `1d6` or `2d4+1`; a critical success adds
/// a bonus 1d6. Unparseable expressions fall back to a plain 1d6.
pub fn roll_damage(damage_expr: &str, is_crit: bool, rng: &mut StdRng) -> (Vec<DamageDie>, i64) {
    let mut dice = Vec::new();
    let mut total;

    match DiceExpression::parse(damage_expr) {
        Ok(expr) => {
            let roll = expr.roll(rng);
            total = roll.total;
            for die in roll.details {
                dice.push(DamageDie {
                    role: "base".to_string(),
                    value: i64::from(die.value),
                });
            }
        }
        Err(_) => {
            let value = i64::from(rng.gen_range(1..=6u32));
            dice.push(DamageDie {
                role: "base".to_string(),
                value,
            });
            total = value;
        }
    }

    if is_crit {
        let bonus = i64::from(rng.gen_range(1..=6u32));
        dice.push(DamageDie {
            role: "crit".to_string(),
            value: bonus,
        });
        total += bonus;
    }

    (dice, total)
}
