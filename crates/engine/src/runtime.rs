//! Explicit runtime aggregate.
//!
//! The `Runtime` owns the world, the event bus, the redaction cache, and the
//! turn machinery. All mutation flows through a [`WorldCtx`] borrowed from
//! it, so nothing holds long-lived references into nested state and nothing
//! lives in module-level globals.

use std::sync::Arc;

use taleforge_domain::GameState;

use crate::events::EventBus;
use crate::outcome::OutcomeResolver;
use crate::pipeline::{NarratorPort, PlannerPort, TurnResult, TurnRouter};
use crate::validator::Validator;
use crate::visibility::RedactionCache;

/// Exclusive, short-lived view over the world and its reactive surroundings,
/// handed to effect handlers and tool executors.
pub struct WorldCtx<'a> {
    pub world: &'a mut GameState,
    pub bus: &'a EventBus,
    pub cache: &'a RedactionCache,
}

impl<'a> WorldCtx<'a> {
    pub fn new(world: &'a mut GameState, bus: &'a EventBus, cache: &'a RedactionCache) -> Self {
        Self { world, bus, cache }
    }
}

/// Owns one table's world plus everything that reads or mutates it.
pub struct Runtime {
    pub world: GameState,
    pub bus: EventBus,
    pub cache: RedactionCache,
    pub router: TurnRouter,
}

impl Runtime {
    pub fn new(world: GameState, planner: Arc<dyn PlannerPort>) -> Self {
        Self {
            world,
            bus: EventBus::new(),
            cache: RedactionCache::new(),
            router: TurnRouter::new(Validator::with_defaults(), OutcomeResolver::with_defaults(), planner),
        }
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn NarratorPort>) -> Self {
        self.router.set_narrator(narrator);
        self
    }

    /// Borrow the world-facing context. Field borrows are disjoint, so the
    /// router can be driven while the context is alive.
    pub fn ctx(&mut self) -> WorldCtx<'_> {
        WorldCtx::new(&mut self.world, &self.bus, &self.cache)
    }

    /// Run one full turn for a player utterance.
    pub async fn process_turn(&mut self, input: &str, actor_id: Option<&str>) -> TurnResult {
        let mut ctx = WorldCtx::new(&mut self.world, &self.bus, &self.cache);
        self.router.process_turn(&mut ctx, input, actor_id).await
    }
}
