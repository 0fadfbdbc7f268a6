//! TaleForge domain layer.
//!
//! Pure data model for the tabletop runtime: entities, zones, clocks, the
//! scene, effect atoms, dice expressions, and the restricted condition
//! language. No I/O and no logging live here; everything that mutates a
//! world goes through the engine crate.

pub mod clock;
pub mod condition;
pub mod dice;
pub mod effect;
pub mod entities;
pub mod error;
pub mod meta;
pub mod scene;
pub mod space;
pub mod state;
pub mod utterance;

pub use clock::Clock;
pub use condition::{evaluate_condition, ConditionError};
pub use dice::{DiceExpression, DiceParseError, DiceRoll, DieRoll};
pub use effect::{Delta, Effect, EffectKind, NoiseLevel, TagPayload};
pub use entities::{mark_key, Creature, Entity, Hp, ItemEntity, Mark, ObjectEntity, Stats};
pub use error::DomainError;
pub use meta::{ExportMode, Meta, Visibility};
pub use scene::{ChoiceOption, EffectLogEntry, PendingChoice, PendingEffect, Scene};
pub use space::{Direction, Exit, ExitConditions, TerrainModifiers, Zone};
pub use state::GameState;
pub use utterance::Utterance;
