//! Static tool catalog.
//!
//! Each tool is a descriptor: id, description, a precondition over
//! `(world, utterance)`, an argument suggester, and a schema validator that
//! parses raw JSON args into the tool's typed argument struct, applies
//! non-destructive sanitization, and hands back the sanitized args.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use taleforge_domain::{Effect, GameState, Utterance};

/// Identifier of a catalog tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    AskRoll,
    Move,
    Attack,
    Talk,
    UseItem,
    GetInfo,
    NarrateOnly,
    ApplyEffects,
    AskClarifying,
}

impl ToolId {
    pub const ALL: [ToolId; 9] = [
        ToolId::AskRoll,
        ToolId::Move,
        ToolId::Attack,
        ToolId::Talk,
        ToolId::UseItem,
        ToolId::GetInfo,
        ToolId::NarrateOnly,
        ToolId::ApplyEffects,
        ToolId::AskClarifying,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AskRoll => "ask_roll",
            Self::Move => "move",
            Self::Attack => "attack",
            Self::Talk => "talk",
            Self::UseItem => "use_item",
            Self::GetInfo => "get_info",
            Self::NarrateOnly => "narrate_only",
            Self::ApplyEffects => "apply_effects",
            Self::AskClarifying => "ask_clarifying",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ask_roll" => Some(Self::AskRoll),
            "move" => Some(Self::Move),
            "attack" => Some(Self::Attack),
            "talk" => Some(Self::Talk),
            "use_item" => Some(Self::UseItem),
            "get_info" => Some(Self::GetInfo),
            "narrate_only" => Some(Self::NarrateOnly),
            "apply_effects" => Some(Self::ApplyEffects),
            "ask_clarifying" => Some(Self::AskClarifying),
            _ => None,
        }
    }

    /// Escape hatches are always offered to the planner.
    pub fn is_escape_hatch(&self) -> bool {
        matches!(self, Self::NarrateOnly | Self::AskClarifying)
    }
}

// ---------------------------------------------------------------------------
// Argument schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollAction {
    Sneak,
    Persuade,
    Athletics,
    Shove,
    Custom,
}

impl RollAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sneak => "sneak",
            Self::Persuade => "persuade",
            Self::Athletics => "athletics",
            Self::Shove => "shove",
            Self::Custom => "custom",
        }
    }
}

/// Die family for style dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RollDomain {
    #[serde(rename = "d4")]
    D4,
    #[default]
    #[serde(rename = "d6")]
    D6,
    #[serde(rename = "d8")]
    D8,
    #[serde(rename = "d10")]
    D10,
}

impl RollDomain {
    pub fn die_size(&self) -> u32 {
        match self {
            Self::D4 => 4,
            Self::D6 => 6,
            Self::D8 => 8,
            Self::D10 => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::D4 => "d4",
            Self::D6 => "d6",
            Self::D8 => "d8",
            Self::D10 => "d10",
        }
    }
}

fn default_style() -> i64 {
    1
}

fn default_dc_hint() -> i64 {
    12
}

/// Shared argument validation behavior.
pub trait ToolArgs: Sized + Serialize + DeserializeOwned {
    /// Range checks past what the type system enforces.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Non-destructive cleanup: trim strings, clamp numeric hints.
    fn sanitize(&mut self) {}
}

fn trim_in_place(value: &mut Option<String>) {
    if let Some(s) = value {
        *s = s.trim().to_string();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRollArgs {
    pub actor: String,
    pub action: RollAction,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub zone_target: Option<String>,
    #[serde(default = "default_style")]
    pub style: i64,
    #[serde(default)]
    pub domain: RollDomain,
    #[serde(default = "default_dc_hint")]
    pub dc_hint: i64,
    #[serde(default)]
    pub adv_style_delta: i64,
    #[serde(default)]
    pub context: Option<String>,
}

impl ToolArgs for AskRollArgs {
    fn validate(&self) -> Result<(), String> {
        if !(0..=3).contains(&self.style) {
            return Err(format!("style must be in [0, 3], got {}", self.style));
        }
        if !(5..=25).contains(&self.dc_hint) {
            return Err(format!("dc_hint must be in [5, 25], got {}", self.dc_hint));
        }
        if !(-1..=1).contains(&self.adv_style_delta) {
            return Err(format!(
                "adv_style_delta must be in [-1, 1], got {}",
                self.adv_style_delta
            ));
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        self.actor = self.actor.trim().to_string();
        trim_in_place(&mut self.target);
        trim_in_place(&mut self.zone_target);
        self.style = self.style.clamp(0, 3);
        self.dc_hint = self.dc_hint.clamp(5, 25);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MoveMethod {
    #[default]
    Walk,
    Run,
    Sneak,
}

impl MoveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Walk => "walk",
            Self::Run => "run",
            Self::Sneak => "sneak",
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Walk => "walks",
            Self::Run => "runs",
            Self::Sneak => "sneaks",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveArgs {
    pub actor: String,
    pub to: String,
    #[serde(default)]
    pub method: MoveMethod,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub ignore_adjacency: bool,
}

impl ToolArgs for MoveArgs {
    fn sanitize(&mut self) {
        self.actor = self.actor.trim().to_string();
        self.to = self.to.trim().to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    #[default]
    Normal,
    Scroll,
}

fn default_weapon() -> String {
    "basic_melee".to_string()
}

fn default_damage_expr() -> String {
    "1d6".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackArgs {
    pub actor: String,
    pub target: String,
    #[serde(default = "default_weapon")]
    pub weapon: String,
    #[serde(default = "default_damage_expr")]
    pub damage_expr: String,
    #[serde(default = "default_style")]
    pub style: i64,
    #[serde(default)]
    pub domain: RollDomain,
    #[serde(default = "default_dc_hint")]
    pub dc_hint: i64,
    #[serde(default)]
    pub adv_style_delta: i64,
    #[serde(default = "default_true")]
    pub consume_mark: bool,
    #[serde(default)]
    pub attack_mode: AttackMode,
}

impl ToolArgs for AttackArgs {
    fn validate(&self) -> Result<(), String> {
        if !(0..=3).contains(&self.style) {
            return Err(format!("style must be in [0, 3], got {}", self.style));
        }
        if !(5..=25).contains(&self.dc_hint) {
            return Err(format!("dc_hint must be in [5, 25], got {}", self.dc_hint));
        }
        if !(-1..=1).contains(&self.adv_style_delta) {
            return Err(format!(
                "adv_style_delta must be in [-1, 1], got {}",
                self.adv_style_delta
            ));
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        self.actor = self.actor.trim().to_string();
        self.target = self.target.trim().to_string();
        self.weapon = self.weapon.trim().to_string();
        self.damage_expr = self.damage_expr.trim().to_lowercase();
        self.style = self.style.clamp(0, 3);
        self.dc_hint = self.dc_hint.clamp(5, 25);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TalkIntent {
    #[default]
    Persuade,
    Intimidate,
    Deceive,
    Charm,
    Comfort,
    Request,
    Distract,
}

impl TalkIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persuade => "persuade",
            Self::Intimidate => "intimidate",
            Self::Deceive => "deceive",
            Self::Charm => "charm",
            Self::Comfort => "comfort",
            Self::Request => "request",
            Self::Distract => "distract",
        }
    }
}

/// One target id or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TalkTarget {
    One(String),
    Many(Vec<String>),
}

impl TalkTarget {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(target) => vec![target.clone()],
            Self::Many(targets) => targets.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalkArgs {
    pub actor: String,
    pub target: TalkTarget,
    #[serde(default)]
    pub intent: TalkIntent,
    #[serde(default = "default_style")]
    pub style: i64,
    #[serde(default)]
    pub domain: RollDomain,
    #[serde(default = "default_dc_hint")]
    pub dc_hint: i64,
    #[serde(default)]
    pub adv_style_delta: i64,
    #[serde(default)]
    pub topic: Option<String>,
}

impl ToolArgs for TalkArgs {
    fn validate(&self) -> Result<(), String> {
        if !(0..=3).contains(&self.style) {
            return Err(format!("style must be in [0, 3], got {}", self.style));
        }
        if !(5..=25).contains(&self.dc_hint) {
            return Err(format!("dc_hint must be in [5, 25], got {}", self.dc_hint));
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        self.actor = self.actor.trim().to_string();
        trim_in_place(&mut self.topic);
        self.style = self.style.clamp(0, 3);
        self.dc_hint = self.dc_hint.clamp(5, 25);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UseMethod {
    #[default]
    Consume,
    Activate,
    Equip,
    Read,
}

impl UseMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consume => "consume",
            Self::Activate => "activate",
            Self::Equip => "equip",
            Self::Read => "read",
        }
    }
}

fn default_charges() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseItemArgs {
    pub actor: String,
    pub item_id: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub method: UseMethod,
    #[serde(default = "default_charges")]
    pub charges: i64,
}

impl ToolArgs for UseItemArgs {
    fn validate(&self) -> Result<(), String> {
        if self.charges < 1 {
            return Err(format!("charges must be positive, got {}", self.charges));
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        self.actor = self.actor.trim().to_string();
        self.item_id = self.item_id.trim().to_string();
        trim_in_place(&mut self.target);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InfoTopic {
    #[default]
    Status,
    Inventory,
    Zone,
    Scene,
    Effects,
    Clocks,
    Relationships,
    Rules,
}

impl InfoTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Inventory => "inventory",
            Self::Zone => "zone",
            Self::Scene => "scene",
            Self::Effects => "effects",
            Self::Clocks => "clocks",
            Self::Relationships => "relationships",
            Self::Rules => "rules",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    #[default]
    Brief,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GetInfoArgs {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub topic: InfoTopic,
    #[serde(default)]
    pub detail_level: DetailLevel,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub use_refs: bool,
}

impl ToolArgs for GetInfoArgs {
    fn sanitize(&mut self) {
        trim_in_place(&mut self.actor);
        trim_in_place(&mut self.target);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NarrateOnlyArgs {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl ToolArgs for NarrateOnlyArgs {
    fn sanitize(&mut self) {
        trim_in_place(&mut self.actor);
        trim_in_place(&mut self.topic);
    }
}

fn default_transaction_mode() -> String {
    "strict".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyEffectsArgs {
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default = "default_true")]
    pub transactional: bool,
    #[serde(default = "default_transaction_mode")]
    pub transaction_mode: String,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ToolArgs for ApplyEffectsArgs {
    fn validate(&self) -> Result<(), String> {
        if crate::effects::TransactionMode::parse(&self.transaction_mode).is_none() {
            return Err(format!(
                "transaction_mode must be strict, partial, or best_effort, got '{}'",
                self.transaction_mode
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarifyOption {
    pub id: String,
    pub label: String,
    pub tool_id: String,
    #[serde(default)]
    pub args_patch: Value,
}

fn default_expires_in_turns() -> u64 {
    1
}

fn default_clarify_reason() -> String {
    "ambiguous_intent".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskClarifyingArgs {
    pub question: String,
    #[serde(default)]
    pub options: Vec<ClarifyOption>,
    #[serde(default = "default_clarify_reason")]
    pub reason: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub context_note: Option<String>,
    #[serde(default = "default_expires_in_turns")]
    pub expires_in_turns: u64,
}

impl ToolArgs for AskClarifyingArgs {
    fn sanitize(&mut self) {
        self.question = self.question.trim().to_string();
        trim_in_place(&mut self.actor);
        trim_in_place(&mut self.context_note);
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// A catalog tool descriptor.
pub struct Tool {
    pub id: ToolId,
    pub description: &'static str,
    pub precond: fn(&GameState, &Utterance) -> bool,
    pub suggest_args: fn(&GameState, &Utterance) -> Value,
    /// Parse + range-check + sanitize raw args; returns the sanitized args.
    pub validate_args: fn(&Value) -> Result<Value, String>,
}

fn validate_as<T: ToolArgs>(raw: &Value) -> Result<Value, String> {
    let mut typed: T = serde_json::from_value(raw.clone())
        .map_err(|e| format!("Schema validation failed: {e}"))?;
    typed.validate()?;
    typed.sanitize();
    serde_json::to_value(&typed).map_err(|e| format!("Schema validation failed: {e}"))
}

// Preconditions

fn ask_roll_precond(world: &GameState, utterance: &Utterance) -> bool {
    world.pending_action.is_some() || utterance.has_actionable_verb()
}

fn move_precond(world: &GameState, utterance: &Utterance) -> bool {
    let Some(actor) = world.current_creature() else {
        return false;
    };
    let Some(zone) = world.zones.get(&actor.current_zone) else {
        return false;
    };
    zone.adjacent_zones().iter().any(|zone_id| {
        utterance.mentions(zone_id)
            || world
                .zones
                .get(*zone_id)
                .is_some_and(|z| utterance.mentions(&z.name))
    })
}

fn attack_precond(world: &GameState, _utterance: &Utterance) -> bool {
    let Some(actor) = world.current_creature() else {
        return false;
    };
    if !actor.has_weapon {
        return false;
    }
    actor.visible_actors.iter().any(|id| {
        matches!(world.entities.get(id), Some(taleforge_domain::Entity::Npc(_)))
    })
}

fn talk_precond(world: &GameState, _utterance: &Utterance) -> bool {
    match world.current_creature() {
        Some(actor) => !actor.has_talked_this_turn,
        None => true,
    }
}

fn use_item_precond(world: &GameState, _utterance: &Utterance) -> bool {
    world
        .current_creature()
        .is_some_and(|actor| !actor.inventory.is_empty())
}

fn always(_world: &GameState, _utterance: &Utterance) -> bool {
    true
}

// Arg suggesters

fn suggest_ask_roll_args(world: &GameState, utterance: &Utterance) -> Value {
    let mut args = Map::new();
    if let Some(actor) = &world.current_actor {
        args.insert("actor".into(), json!(actor));
    }

    let action_map: &[(&str, &str, i64)] = &[
        ("sneak", "sneak", 12),
        ("persuade", "persuade", 13),
        ("shove", "shove", 13),
        ("climb", "athletics", 12),
        ("athletics", "athletics", 12),
    ];
    let lower = utterance.text.to_lowercase();
    for (keyword, action, dc) in action_map {
        if lower.contains(keyword) {
            args.insert("action".into(), json!(action));
            args.insert("dc_hint".into(), json!(dc));
            break;
        }
    }

    if let Some(actor) = world.current_creature() {
        if let Some(first_visible) = actor.visible_actors.first() {
            args.insert("target".into(), json!(first_visible));
        }
    }

    args.entry("style").or_insert(json!(1));
    args.entry("domain").or_insert(json!("d6"));
    Value::Object(args)
}

fn suggest_move_args(world: &GameState, utterance: &Utterance) -> Value {
    let mut args = Map::new();
    let Some(actor_id) = &world.current_actor else {
        return Value::Object(args);
    };
    args.insert("actor".into(), json!(actor_id));

    if let Some(actor) = world.current_creature() {
        if let Some(zone) = world.zones.get(&actor.current_zone) {
            for zone_id in zone.adjacent_zones() {
                let mentioned = utterance.mentions(zone_id)
                    || world
                        .zones
                        .get(zone_id)
                        .is_some_and(|z| utterance.mentions(&z.name));
                if mentioned {
                    args.insert("to".into(), json!(zone_id));
                    break;
                }
            }
        }
    }

    Value::Object(args)
}

fn suggest_attack_args(world: &GameState, _utterance: &Utterance) -> Value {
    let mut args = Map::new();
    if let Some(actor_id) = &world.current_actor {
        args.insert("actor".into(), json!(actor_id));
    }
    if let Some(actor) = world.current_creature() {
        let npc_target = actor.visible_actors.iter().find(|id| {
            matches!(world.entities.get(*id), Some(taleforge_domain::Entity::Npc(_)))
        });
        if let Some(target) = npc_target {
            args.insert("target".into(), json!(target));
        }
    }
    Value::Object(args)
}

fn suggest_talk_args(world: &GameState, utterance: &Utterance) -> Value {
    let mut args = Map::new();
    if let Some(actor_id) = &world.current_actor {
        args.insert("actor".into(), json!(actor_id));
    }
    if let Some(actor) = world.current_creature() {
        if let Some(first_visible) = actor.visible_actors.first() {
            args.insert("target".into(), json!(first_visible));
        }
    }

    let lower = utterance.text.to_lowercase();
    let intent = if lower.contains("intimidate") || lower.contains("threaten") {
        "intimidate"
    } else if lower.contains("lie") || lower.contains("deceive") {
        "deceive"
    } else if lower.contains("charm") || lower.contains("flatter") {
        "charm"
    } else if lower.contains("comfort") || lower.contains("console") {
        "comfort"
    } else if lower.contains("distract") {
        "distract"
    } else if lower.contains("request") || lower.contains("beg") {
        "request"
    } else {
        "persuade"
    };
    args.insert("intent".into(), json!(intent));
    Value::Object(args)
}

fn suggest_use_item_args(world: &GameState, _utterance: &Utterance) -> Value {
    let mut args = Map::new();
    if let Some(actor_id) = &world.current_actor {
        args.insert("actor".into(), json!(actor_id));
    }
    if let Some(actor) = world.current_creature() {
        if let Some(first_item) = actor.inventory.first() {
            args.insert("item_id".into(), json!(first_item));
        }
    }
    Value::Object(args)
}

fn suggest_get_info_args(_world: &GameState, _utterance: &Utterance) -> Value {
    json!({"topic": "status"})
}

fn suggest_empty_args(_world: &GameState, _utterance: &Utterance) -> Value {
    json!({})
}

fn suggest_apply_effects_args(_world: &GameState, _utterance: &Utterance) -> Value {
    json!({"effects": []})
}

fn suggest_ask_clarifying_args(_world: &GameState, _utterance: &Utterance) -> Value {
    json!({"question": "Could you clarify what you'd like to do?"})
}

static CATALOG: OnceLock<Vec<Tool>> = OnceLock::new();

/// The full tool catalog, in registration order.
pub fn catalog() -> &'static [Tool] {
    CATALOG.get_or_init(|| {
        vec![
            Tool {
                id: ToolId::AskRoll,
                description: "Roll Style+Domain to resolve an action.",
                precond: ask_roll_precond,
                suggest_args: suggest_ask_roll_args,
                validate_args: validate_as::<AskRollArgs>,
            },
            Tool {
                id: ToolId::NarrateOnly,
                description: "No mechanics; just narrate the scene.",
                precond: always,
                suggest_args: suggest_empty_args,
                validate_args: validate_as::<NarrateOnlyArgs>,
            },
            Tool {
                id: ToolId::ApplyEffects,
                description: "Apply mechanical effects to game state.",
                precond: always,
                suggest_args: suggest_apply_effects_args,
                validate_args: validate_as::<ApplyEffectsArgs>,
            },
            Tool {
                id: ToolId::GetInfo,
                description: "Query current game state information.",
                precond: always,
                suggest_args: suggest_get_info_args,
                validate_args: validate_as::<GetInfoArgs>,
            },
            Tool {
                id: ToolId::Move,
                description: "Change zone without a roll if uncontested.",
                precond: move_precond,
                suggest_args: suggest_move_args,
                validate_args: validate_as::<MoveArgs>,
            },
            Tool {
                id: ToolId::Attack,
                description: "Engage in combat with a visible enemy.",
                precond: attack_precond,
                suggest_args: suggest_attack_args,
                validate_args: validate_as::<AttackArgs>,
            },
            Tool {
                id: ToolId::Talk,
                description: "Say something to influence another character.",
                precond: talk_precond,
                suggest_args: suggest_talk_args,
                validate_args: validate_as::<TalkArgs>,
            },
            Tool {
                id: ToolId::UseItem,
                description: "Use an item from your inventory.",
                precond: use_item_precond,
                suggest_args: suggest_use_item_args,
                validate_args: validate_as::<UseItemArgs>,
            },
            Tool {
                id: ToolId::AskClarifying,
                description: "Ask the player a short clarifying question.",
                precond: always,
                suggest_args: suggest_ask_clarifying_args,
                validate_args: validate_as::<AskClarifyingArgs>,
            },
        ]
    })
}

/// Look a tool up by id.
pub fn get_tool(id: ToolId) -> &'static Tool {
    catalog()
        .iter()
        .find(|tool| tool.id == id)
        .unwrap_or_else(|| unreachable!("catalog covers every ToolId"))
}

/// Per-tool keyword sets used for affordance confidence scoring.
pub fn confidence_keywords() -> &'static BTreeMap<ToolId, Vec<&'static str>> {
    static KEYWORDS: OnceLock<BTreeMap<ToolId, Vec<&'static str>>> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        let mut map = BTreeMap::new();
        map.insert(
            ToolId::AskRoll,
            vec!["roll", "check", "try", "attempt", "sneak", "persuade"],
        );
        map.insert(
            ToolId::Move,
            vec!["go", "move", "walk", "run", "travel", "enter"],
        );
        map.insert(
            ToolId::Attack,
            vec!["attack", "fight", "hit", "strike", "combat", "kill"],
        );
        map.insert(
            ToolId::Talk,
            vec!["talk", "say", "tell", "ask", "speak", "whisper"],
        );
        map.insert(
            ToolId::UseItem,
            vec!["use", "drink", "cast", "throw", "activate"],
        );
        map.insert(
            ToolId::GetInfo,
            vec!["look", "examine", "search", "what", "where", "who"],
        );
        map
    })
}
