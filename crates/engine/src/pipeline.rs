//! Turn pipeline: utterance → plan → validate/execute → outcome → result.
//!
//! The planner and narrator are external collaborators behind async ports;
//! everything between the plan arriving and the result leaving is
//! synchronous, so a turn's mutations are observed atomically from outside.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taleforge_domain::{GameState, Utterance};
use tracing::{info, warn};

use crate::catalog::ToolId;
use crate::effects::{ApplyOptions, TransactionMode};
use crate::outcome::OutcomeResolver;
use crate::runtime::WorldCtx;
use crate::validator::{ToolResult, Validator};

/// One planned step: a tool id plus raw arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// What a planner returns for an utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub ok: bool,
    #[serde(default)]
    pub actions: Vec<PlannedAction>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub error: Option<String>,
}

impl PlanResult {
    pub fn single(tool: &str, args: Value) -> Self {
        Self {
            ok: true,
            actions: vec![PlannedAction {
                tool: tool.to_string(),
                args,
            }],
            confidence: 1.0,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            actions: Vec::new(),
            confidence: 0.0,
            error: Some(error.into()),
        }
    }
}

/// External planner contract: must produce tool ids from the catalog with
/// args passing each tool's schema; ambiguity surfaces as `ask_clarifying`.
#[async_trait(?Send)]
pub trait PlannerPort {
    async fn plan(&self, world: &GameState, utterance: &Utterance) -> PlanResult;
}

/// External narration contract: ToolResult + world → prose.
#[cfg_attr(test, mockall::automock)]
#[async_trait(?Send)]
pub trait NarratorPort {
    async fn narrate(&self, result: &ToolResult, world: &GameState, actor_id: &str) -> String;
}

/// Result of processing one full turn.
#[derive(Debug)]
pub struct TurnResult {
    pub success: bool,
    pub narration: String,
    pub tool_results: Vec<ToolResult>,
    pub error_message: Option<String>,
    /// True when the plan carried more than one step
    pub is_compound: bool,
}

/// Failing a step of these tools aborts the rest of a compound sequence.
const CRITICAL_TOOLS: [ToolId; 2] = [ToolId::Move, ToolId::Attack];

/// Coordinates the execution pipeline for a table.
pub struct TurnRouter {
    validator: Validator,
    outcome_resolver: OutcomeResolver,
    planner: Arc<dyn PlannerPort>,
    narrator: Option<Arc<dyn NarratorPort>>,
}

impl TurnRouter {
    pub fn new(
        validator: Validator,
        outcome_resolver: OutcomeResolver,
        planner: Arc<dyn PlannerPort>,
    ) -> Self {
        Self {
            validator,
            outcome_resolver,
            planner,
            narrator: None,
        }
    }

    pub fn set_narrator(&mut self, narrator: Arc<dyn NarratorPort>) {
        self.narrator = Some(narrator);
    }

    pub fn validator_mut(&mut self) -> &mut Validator {
        &mut self.validator
    }

    /// Process a complete turn for a player utterance.
    pub async fn process_turn(
        &mut self,
        ctx: &mut WorldCtx<'_>,
        player_input: &str,
        actor_id: Option<&str>,
    ) -> TurnResult {
        // Effective actor: argument, else the scene's current actor
        let Some(actor_id) = actor_id
            .map(str::to_string)
            .or_else(|| ctx.world.current_actor.clone())
        else {
            return TurnResult {
                success: false,
                narration: "No active character found.".to_string(),
                tool_results: Vec::new(),
                error_message: Some("Missing current_actor in game state".to_string()),
                is_compound: false,
            };
        };

        let utterance = Utterance::new(player_input, actor_id.clone());

        // A live pending choice short-circuits the planner entirely; its
        // consumed step skips the free-text precondition gate
        let mut consumed_choice = false;
        let plan = match self
            .validator
            .maybe_consume_pending_choice(ctx.world, &utterance)
        {
            Some((tool, args)) => {
                consumed_choice = true;
                PlanResult::single(tool.as_str(), args)
            }
            None => self.planner.plan(ctx.world, &utterance).await,
        };

        if !plan.ok || plan.actions.is_empty() {
            return TurnResult {
                success: false,
                narration: "I'm not sure what you want to do. Could you clarify?".to_string(),
                tool_results: Vec::new(),
                error_message: plan.error,
                is_compound: false,
            };
        }

        let is_compound = plan.actions.len() > 1;
        info!(
            actor = %actor_id,
            steps = plan.actions.len(),
            confidence = plan.confidence,
            "executing plan"
        );

        let mut tool_results = Vec::new();
        let mut narrations = Vec::new();
        let mut overall_success = true;

        for (index, action) in plan.actions.iter().enumerate() {
            let result = match (consumed_choice, ToolId::parse(&action.tool)) {
                (true, Some(tool)) => self.validator.execute_consumed_choice(
                    tool,
                    &action.args,
                    ctx,
                    &utterance,
                    None,
                ),
                _ => self.validator.validate_and_execute(
                    &action.tool,
                    &action.args,
                    ctx,
                    &utterance,
                    None,
                ),
            };

            // Outcome enrichment; any appended consequence effects are
            // applied leniently so the story beats land without undoing
            // the mechanical result
            let result = if result.ok {
                let effects_before = result.effects.len();
                let enriched = self.outcome_resolver.resolve_outcome(result, ctx.world);
                let appended = &enriched.effects[effects_before..];
                if !appended.is_empty() {
                    let report = self.validator.effect_engine().apply_effects(
                        ctx,
                        appended,
                        &ApplyOptions {
                            actor: Some(actor_id.clone()),
                            transactional: false,
                            mode: TransactionMode::BestEffort,
                            seed: 0,
                        },
                    );
                    if !report.ok {
                        warn!(step = index, "consequence effects failed to apply");
                    }
                }
                enriched
            } else {
                result
            };

            let step_ok = result.ok;
            let step_tool = ToolId::parse(&result.tool_id);
            narrations.push(self.narrate_step(&result, ctx.world, &actor_id).await);
            tool_results.push(result);

            if !step_ok {
                overall_success = false;
                warn!(step = index, "plan step failed");
                // Critical failures stop the sequence; the rest continue
                let planned_tool = ToolId::parse(&action.tool);
                if planned_tool.is_some_and(|t| CRITICAL_TOOLS.contains(&t))
                    || step_tool.is_some_and(|t| CRITICAL_TOOLS.contains(&t))
                {
                    break;
                }
            }
        }

        // Turn advancement: rotate the order, or just push the round along
        // for a single-player scene
        if ctx.world.scene.turn_order.is_empty() {
            ctx.world.scene.round += 1;
            ctx.world.scene.choice_count_this_turn = 0;
        } else {
            self.validator.advance_turn(ctx.world);
        }

        TurnResult {
            success: overall_success,
            narration: narrations.join(" "),
            tool_results,
            error_message: if overall_success {
                None
            } else {
                Some("One or more actions failed".to_string())
            },
            is_compound,
        }
    }

    async fn narrate_step(&self, result: &ToolResult, world: &GameState, actor_id: &str) -> String {
        if let Some(narrator) = &self.narrator {
            return narrator.narrate(result, world, actor_id).await;
        }
        result
            .narration_hint
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("Something happens.")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::visibility::RedactionCache;
    use serde_json::json;
    use std::cell::RefCell;
    use taleforge_domain::{Creature, Entity, Exit, Zone};

    /// Planner test double that pops pre-scripted plans.
    struct ScriptedPlanner {
        plans: RefCell<Vec<PlanResult>>,
    }

    impl ScriptedPlanner {
        fn new(plans: Vec<PlanResult>) -> Self {
            Self {
                plans: RefCell::new(plans),
            }
        }
    }

    #[async_trait(?Send)]
    impl PlannerPort for ScriptedPlanner {
        async fn plan(&self, _world: &GameState, _utterance: &Utterance) -> PlanResult {
            let mut plans = self.plans.borrow_mut();
            if plans.is_empty() {
                PlanResult::failure("no scripted plan left")
            } else {
                plans.remove(0)
            }
        }
    }

    fn demo_world() -> GameState {
        let mut world = GameState::default();
        let mut courtyard = Zone::new("courtyard", "Courtyard");
        courtyard.add_exit(Exit::new("guard_room"));
        world.zones.insert("courtyard".to_string(), courtyard);
        let mut guard_room = Zone::new("guard_room", "Guard Room");
        guard_room.add_exit(Exit::new("courtyard"));
        world.zones.insert("guard_room".to_string(), guard_room);

        world.entities.insert(
            "pc.arin".to_string(),
            Entity::Pc(Creature::new("pc.arin", "Arin", "courtyard")),
        );
        world.entities.insert(
            "npc.guard".to_string(),
            Entity::Npc(Creature::new("npc.guard", "Guard", "guard_room")),
        );
        world.current_actor = Some("pc.arin".to_string());
        world.update_visibility();
        world
    }

    fn router(plans: Vec<PlanResult>) -> TurnRouter {
        TurnRouter::new(
            Validator::with_defaults(),
            OutcomeResolver::with_defaults(),
            Arc::new(ScriptedPlanner::new(plans)),
        )
    }

    #[tokio::test]
    async fn test_single_step_turn() {
        let mut world = demo_world();
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut router = router(vec![PlanResult::single(
            "move",
            json!({"actor": "pc.arin", "to": "guard_room"}),
        )]);

        let result = {
            let mut ctx = WorldCtx::new(&mut world, &bus, &cache);
            router.process_turn(&mut ctx, "go to the guard room", None).await
        };

        assert!(result.success, "{:?}", result.error_message);
        assert!(!result.is_compound);
        assert_eq!(result.tool_results.len(), 1);
        assert_eq!(world.actor("pc.arin").expect("arin").current_zone, "guard_room");
        // Single-player world: round advanced
        assert_eq!(world.scene.round, 2);
    }

    #[tokio::test]
    async fn test_compound_move_then_attack() {
        let mut world = demo_world();
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut router = router(vec![PlanResult {
            ok: true,
            actions: vec![
                PlannedAction {
                    tool: "move".to_string(),
                    args: json!({"actor": "pc.arin", "to": "guard_room", "method": "run"}),
                },
                PlannedAction {
                    tool: "attack".to_string(),
                    args: json!({"actor": "pc.arin", "target": "npc.guard"}),
                },
            ],
            confidence: 0.9,
            error: None,
        }]);

        let result = {
            let mut ctx = WorldCtx::new(&mut world, &bus, &cache);
            router.process_turn(&mut ctx, "I charge the guard", None).await
        };

        assert!(result.is_compound);
        assert_eq!(result.tool_results.len(), 2);
        // Step 1 landed, so step 2 saw the guard in view
        assert_eq!(world.actor("pc.arin").expect("arin").current_zone, "guard_room");
        assert!(result.tool_results[0].ok);
        assert!(result.tool_results[1].ok, "{:?}", result.tool_results[1].error_message);
        // Running raised the scene noise
        assert_eq!(world.scene.tags.get("noise").map(String::as_str), Some("loud"));
    }

    #[tokio::test]
    async fn test_critical_failure_stops_sequence() {
        let mut world = demo_world();
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut router = router(vec![PlanResult {
            ok: true,
            actions: vec![
                PlannedAction {
                    tool: "move".to_string(),
                    args: json!({"actor": "pc.arin", "to": "nowhere"}),
                },
                PlannedAction {
                    tool: "attack".to_string(),
                    args: json!({"actor": "pc.arin", "target": "npc.guard"}),
                },
            ],
            confidence: 0.9,
            error: None,
        }]);

        let result = {
            let mut ctx = WorldCtx::new(&mut world, &bus, &cache);
            router.process_turn(&mut ctx, "go nowhere then attack", None).await
        };

        assert!(!result.success);
        // The failed move aborted the attack
        assert_eq!(result.tool_results.len(), 1);
    }

    #[tokio::test]
    async fn test_planner_failure_asks_for_clarity() {
        let mut world = demo_world();
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut router = router(vec![PlanResult::failure("utterly confused")]);

        let result = {
            let mut ctx = WorldCtx::new(&mut world, &bus, &cache);
            router.process_turn(&mut ctx, "flibbertigibbet", None).await
        };

        assert!(!result.success);
        assert!(result.narration.contains("clarify"));
        assert_eq!(result.error_message.as_deref(), Some("utterly confused"));
    }

    #[tokio::test]
    async fn test_missing_actor() {
        let mut world = demo_world();
        world.current_actor = None;
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut router = router(vec![]);

        let result = {
            let mut ctx = WorldCtx::new(&mut world, &bus, &cache);
            router.process_turn(&mut ctx, "hello?", None).await
        };
        assert!(!result.success);
        assert!(result
            .error_message
            .expect("error")
            .contains("current_actor"));
    }

    #[tokio::test]
    async fn test_narrator_port_receives_each_step() {
        let mut world = demo_world();
        let bus = EventBus::new();
        let cache = RedactionCache::new();

        let mut narrator = MockNarratorPort::new();
        narrator
            .expect_narrate()
            .times(1)
            .returning(|_, _, _| "Arin slips through the archway.".to_string());

        let mut router = router(vec![PlanResult::single(
            "move",
            json!({"actor": "pc.arin", "to": "guard_room"}),
        )]);
        router.set_narrator(Arc::new(narrator));

        let result = {
            let mut ctx = WorldCtx::new(&mut world, &bus, &cache);
            router.process_turn(&mut ctx, "go to the guard room", None).await
        };

        assert!(result.success);
        assert_eq!(result.narration, "Arin slips through the archway.");
    }

    #[tokio::test]
    async fn test_turn_order_advances() {
        let mut world = demo_world();
        world.scene.turn_order = vec!["pc.arin".to_string(), "npc.guard".to_string()];
        world.scene.turn_index = 0;
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut router = router(vec![PlanResult::single(
            "narrate_only",
            json!({"actor": "pc.arin"}),
        )]);

        {
            let mut ctx = WorldCtx::new(&mut world, &bus, &cache);
            router.process_turn(&mut ctx, "look around", None).await;
        }
        assert_eq!(world.scene.turn_index, 1);
        assert_eq!(world.current_actor.as_deref(), Some("npc.guard"));
        assert_eq!(world.scene.round, 1);
    }
}
