//! `get_info` executor: read-only structured queries over the world.
//!
//! Dispatches on topic, keeps field ordering stable, supports pagination and
//! field filtering, attaches query metadata with a deterministic snapshot
//! id, and can transform facts into a thin `{facts, refs}` form. Visibility
//! is enforced throughout: hidden entities are omitted and hidden clocks are
//! collapsed into counted placeholders.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use taleforge_domain::{GameState, Visibility};
use uuid::Uuid;

use crate::catalog::{DetailLevel, GetInfoArgs, InfoTopic, ToolId};
use crate::runtime::WorldCtx;
use crate::validator::{ToolResult, Validator};
use crate::visibility::can_player_see;
use crate::zone_graph;

impl Validator {
    pub(super) fn execute_get_info(&mut self, args_value: &Value, ctx: &mut WorldCtx<'_>) -> ToolResult {
        let args: GetInfoArgs = match serde_json::from_value(args_value.clone()) {
            Ok(args) => args,
            Err(err) => {
                return ToolResult::clarify(
                    "What would you like to know?",
                    "missing_arg",
                    json!({}),
                    Value::Null,
                    "Asked for clarification due to malformed query",
                    format!("Schema validation failed: {err}"),
                )
            }
        };

        let world = &*ctx.world;
        let actor = args.actor.clone().or_else(|| world.current_actor.clone());
        let target = args.target.clone().or_else(|| actor.clone());

        if actor.is_none() && target.is_none() {
            return ToolResult::clarify(
                "Who or what would you like to get information about?",
                "missing_arg",
                json!({}),
                Value::Null,
                "Asked for clarification - no valid context provided",
                "No valid actor or target provided",
            );
        }

        // Target resolution + visibility
        if let Some(target_id) = &target {
            let known = world.entities.contains_key(target_id) || world.zones.contains_key(target_id);
            if !known {
                return ToolResult::clarify(
                    format!("I don't see '{target_id}' here. What would you like to check instead?"),
                    "invalid_target",
                    json!({}),
                    Value::Null,
                    format!("Asked for clarification - '{target_id}' not found"),
                    format!("Target '{target_id}' not found in game state"),
                );
            }
            if let Some(entity) = world.entities.get(target_id) {
                let pov = actor.as_deref();
                let is_self = pov == Some(target_id.as_str());
                if !is_self && !can_player_see(pov, entity, world) {
                    return ToolResult::clarify(
                        format!("I don't see '{target_id}' here. What would you like to check instead?"),
                        "invalid_target",
                        json!({}),
                        Value::Null,
                        format!("Asked for clarification - '{target_id}' not visible"),
                        format!("Target '{target_id}' not visible to actor"),
                    );
                }
            }
        }

        let pov = actor.as_deref();
        let (mut facts, summary) = match args.topic {
            InfoTopic::Status => status_info(target.as_deref(), world, args.detail_level),
            InfoTopic::Inventory => {
                inventory_info(target.as_deref(), world, self, args.detail_level, args.limit, args.offset)
            }
            InfoTopic::Zone => zone_info(target.as_deref(), pov, world, args.limit, args.offset),
            InfoTopic::Scene => scene_info(world),
            InfoTopic::Effects => effects_info(world, args.limit),
            InfoTopic::Clocks => clocks_info(pov, world, args.limit, args.offset),
            InfoTopic::Relationships => relationships_info(target.as_deref(), world),
            InfoTopic::Rules => rules_info(),
        };

        facts.insert("_metadata".into(), query_metadata(world));

        if let Some(fields) = &args.fields {
            facts = filter_fields(facts, fields);
        }

        let facts = if args.use_refs {
            let refs = build_refs(&facts, world);
            let thin = thin_facts(facts);
            let mut wrapped = Map::new();
            wrapped.insert("facts".into(), Value::Object(thin));
            wrapped.insert("refs".into(), refs);
            wrapped
        } else {
            facts
        };

        ToolResult::success(
            ToolId::GetInfo,
            args_value.clone(),
            Value::Object(facts),
            Vec::new(),
            json!({
                "summary": summary,
                "tone_tags": ["informative", "status"],
                "sentences_max": if args.detail_level == DetailLevel::Brief { 2 } else { 4 },
                "salient_entities": target.map(|t| vec![t]).unwrap_or_default(),
            }),
        )
    }
}

/// Deterministic snapshot fingerprint plus per-query audit fields.
fn query_metadata(world: &GameState) -> Value {
    let fingerprint = format!(
        "r{}_t{}_{}_{}",
        world.scene.round,
        world.scene.turn_index,
        world.entities.len(),
        world.clocks.len()
    );
    let digest = Sha256::digest(fingerprint.as_bytes());
    let snapshot_id = format!(
        "snap_{:02x}{:02x}{:02x}{:02x}",
        digest[0], digest[1], digest[2], digest[3]
    );

    json!({
        "schema_version": "1.0.0",
        "query_id": Uuid::new_v4().to_string(),
        "timestamp": taleforge_domain::meta::now_iso(),
        "round": world.scene.round,
        "turn_id": format!("r{}_t{}", world.scene.round, world.scene.turn_index),
        "turn_index": world.scene.turn_index,
        "snapshot_id": snapshot_id,
        "current_actor": world.current_actor,
        "scene_id": world.scene.id,
        "game_state_summary": {
            "entity_count": world.entities.len(),
            "clock_count": world.clocks.len(),
            "pending_action": world.pending_action,
        },
    })
}

fn filter_fields(facts: Map<String, Value>, fields: &[String]) -> Map<String, Value> {
    facts
        .into_iter()
        .filter(|(key, _)| key == "_metadata" || fields.iter().any(|f| f == key))
        .collect()
}

fn paginate<T: Clone>(items: &[T], limit: Option<usize>, offset: usize) -> (Vec<T>, Value) {
    let total = items.len();
    let page: Vec<T> = items
        .iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    let pagination = json!({
        "total_count": total,
        "offset": offset,
        "limit": limit,
        "returned_count": page.len(),
        "has_more": offset + page.len() < total,
    });
    (page, pagination)
}

fn status_info(
    target: Option<&str>,
    world: &GameState,
    detail: DetailLevel,
) -> (Map<String, Value>, String) {
    let mut facts = Map::new();
    let Some(target_id) = target else {
        facts.insert("error".into(), json!("no status target"));
        return (facts, "Nothing to report.".to_string());
    };

    if let Some(creature) = world.actor(target_id) {
        facts.insert("entity_id".into(), json!(target_id));
        facts.insert("name".into(), json!(creature.name));
        facts.insert("hp".into(), json!({"current": creature.hp.current, "max": creature.hp.max}));
        facts.insert(
            "zone".into(),
            json!({
                "id": creature.current_zone,
                "name": world
                    .zones
                    .get(&creature.current_zone)
                    .map(|z| z.name.clone()),
            }),
        );
        facts.insert("guard".into(), json!(creature.guard));
        let active_conditions: Vec<&String> = creature
            .conditions
            .iter()
            .filter(|(_, active)| **active)
            .map(|(name, _)| name)
            .collect();
        facts.insert("conditions".into(), json!(active_conditions));
        facts.insert("mark_count".into(), json!(creature.marks.len()));

        if detail == DetailLevel::Full {
            facts.insert("stats".into(), json!(creature.stats));
            facts.insert("inventory".into(), json!(creature.inventory));
            facts.insert("visible_actors".into(), json!(creature.visible_actors));
            facts.insert("marks".into(), json!(creature.marks));
        }

        let summary = format!(
            "{} has {}/{} HP in {}",
            creature.name,
            creature.hp.current,
            creature.hp.max,
            world
                .zones
                .get(&creature.current_zone)
                .map(|z| z.name.as_str())
                .unwrap_or("an unknown place"),
        );
        return (facts, summary);
    }

    if let Some(zone) = world.zones.get(target_id) {
        facts.insert("zone_id".into(), json!(target_id));
        facts.insert("name".into(), json!(zone.name));
        facts.insert("description".into(), json!(zone.description));
        facts.insert("adjacent_zones".into(), json!(zone.adjacent_zones()));
        return (facts, format!("{} lies ahead.", zone.name));
    }

    if let Some(entity) = world.entities.get(target_id) {
        facts.insert("entity_id".into(), json!(target_id));
        facts.insert("name".into(), json!(entity.name()));
        facts.insert("type".into(), json!(entity.type_str()));
        facts.insert("zone".into(), json!({"id": entity.current_zone()}));
        return (facts, format!("You look over the {}.", entity.name()));
    }

    facts.insert("error".into(), json!("target not found"));
    (facts, "Nothing to report.".to_string())
}

fn inventory_info(
    target: Option<&str>,
    world: &GameState,
    validator: &Validator,
    detail: DetailLevel,
    limit: Option<usize>,
    offset: usize,
) -> (Map<String, Value>, String) {
    let mut facts = Map::new();
    let Some(creature) = target.and_then(|id| world.actor(id)) else {
        facts.insert("items".into(), json!([]));
        return (facts, "No inventory to inspect.".to_string());
    };

    // Distinct items with counts, sorted for stable output
    let mut counts: std::collections::BTreeMap<&String, usize> = std::collections::BTreeMap::new();
    for item in &creature.inventory {
        *counts.entry(item).or_insert(0) += 1;
    }
    let distinct: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(id, count)| (id.clone(), count))
        .collect();

    let (page, pagination) = paginate(&distinct, limit, offset);

    let mut item_details = Map::new();
    let mut items = Vec::new();
    for (item_id, count) in &page {
        items.push(json!({"id": item_id, "count": count}));
        let definition = validator.item_registry.get_or_default(item_id);
        let detail_value = match detail {
            DetailLevel::Brief => json!({"name": definition.name}),
            DetailLevel::Full => json!({
                "name": definition.name,
                "description": definition.description,
                "tags": definition.tags,
                "usage_methods": definition.usage_methods,
            }),
        };
        item_details.insert(item_id.clone(), detail_value);
    }

    facts.insert("entity_id".into(), json!(target));
    facts.insert("items".into(), json!(items));
    facts.insert("item_details".into(), Value::Object(item_details));
    facts.insert("total_items".into(), json!(creature.inventory.len()));
    facts.insert("pagination".into(), pagination);

    let summary = if creature.inventory.is_empty() {
        format!("{} is carrying nothing.", creature.name)
    } else {
        format!("{} is carrying {} items.", creature.name, creature.inventory.len())
    };
    (facts, summary)
}

fn zone_info(
    target: Option<&str>,
    pov: Option<&str>,
    world: &GameState,
    limit: Option<usize>,
    offset: usize,
) -> (Map<String, Value>, String) {
    let mut facts = Map::new();

    // Target may be a zone id directly, or an entity whose zone we take
    let zone_id = target
        .filter(|id| world.zones.contains_key(*id))
        .map(str::to_string)
        .or_else(|| {
            target
                .and_then(|id| world.entities.get(id))
                .map(|e| e.current_zone().to_string())
        });
    let Some(zone_id) = zone_id else {
        facts.insert("error".into(), json!("no zone context"));
        return (facts, "Nowhere to look.".to_string());
    };
    let Some(zone) = world.zones.get(&zone_id) else {
        facts.insert("error".into(), json!("zone not found"));
        return (facts, "Nowhere to look.".to_string());
    };

    let mut entity_ids: Vec<String> = world
        .entities
        .iter()
        .filter(|(_, e)| e.current_zone() == zone_id)
        .filter(|(_, e)| can_player_see(pov, e, world))
        .map(|(id, _)| id.clone())
        .collect();
    entity_ids.sort();
    let (entities_page, pagination) = paginate(&entity_ids, limit, offset);

    facts.insert("zone_id".into(), json!(zone_id));
    facts.insert("name".into(), json!(zone.name));
    facts.insert("description".into(), json!(zone.description));
    facts.insert("entities".into(), json!(entities_page));
    facts.insert(
        "exits".into(),
        json!(zone_graph::describe_exits(zone, world, false)),
    );
    facts.insert("adjacent_zones".into(), json!(zone.adjacent_zones()));
    facts.insert("tags".into(), json!(zone.tags));
    facts.insert("region".into(), json!(zone.region));
    facts.insert("pagination".into(), pagination);

    let summary = format!("{} holds {} visible figures.", zone.name, entity_ids.len());
    (facts, summary)
}

fn scene_info(world: &GameState) -> (Map<String, Value>, String) {
    let scene = &world.scene;
    let mut facts = Map::new();
    facts.insert("scene_id".into(), json!(scene.id));
    facts.insert("round".into(), json!(scene.round));
    facts.insert("turn_index".into(), json!(scene.turn_index));
    facts.insert("turn_order".into(), json!(scene.turn_order));
    facts.insert("current_actor".into(), json!(world.current_actor));
    facts.insert("base_dc".into(), json!(scene.base_dc));
    facts.insert("tags".into(), json!(scene.tags));
    facts.insert("objective".into(), json!(scene.objective));
    facts.insert(
        "pending_choice".into(),
        json!(scene.pending_choice.as_ref().map(|c| c.id.clone())),
    );

    (facts, format!("Round {} of the scene.", scene.round))
}

fn effects_info(world: &GameState, limit: Option<usize>) -> (Map<String, Value>, String) {
    let scene = &world.scene;
    let cap = limit.unwrap_or(10);

    let recent: Vec<Value> = scene
        .last_effect_log
        .iter()
        .rev()
        .take(cap)
        .map(|entry| {
            json!({
                "summary": entry.summary,
                "ok": entry.ok,
                "round": entry.round_applied,
                "impact_level": entry.impact_level,
            })
        })
        .collect();

    let pending: Vec<Value> = scene
        .pending_effects
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "trigger_round": p.trigger_round,
                "kind": p.effect.kind.as_str(),
            })
        })
        .collect();

    let mut facts = Map::new();
    facts.insert("recent_effects".into(), json!(recent));
    facts.insert("pending_effects".into(), json!(pending));
    facts.insert("last_diff_summary".into(), json!(scene.last_diff_summary));

    let summary = match scene.last_diff_summary.as_deref() {
        Some(diff) => diff.to_string(),
        None => "Nothing notable has happened yet.".to_string(),
    };
    (facts, summary)
}

fn clocks_info(
    pov: Option<&str>,
    world: &GameState,
    limit: Option<usize>,
    offset: usize,
) -> (Map<String, Value>, String) {
    let mut visible = Map::new();
    let mut hidden_count = 0usize;

    let mut entries: Vec<(&String, &taleforge_domain::Clock)> = world.clocks.iter().collect();
    entries.sort_by_key(|(id, _)| id.as_str());

    for (clock_id, clock) in entries {
        let is_visible = match clock.meta.visibility {
            Visibility::GmOnly => false,
            Visibility::Hidden => pov.is_some_and(|p| clock.meta.known_by.contains(p)),
            Visibility::Public => true,
        };
        if is_visible {
            visible.insert(
                clock_id.clone(),
                json!({
                    "value": clock.value,
                    "max": clock.maximum,
                    "min": clock.minimum,
                    "source": clock.source,
                    "filled": clock.is_filled(),
                }),
            );
        } else {
            // Hidden clocks leave counted placeholders, never details
            hidden_count += 1;
            visible.insert(format!("[hidden_clock_{hidden_count}]"), json!(null));
        }
    }

    let keys: Vec<String> = visible.keys().cloned().collect();
    let (page_keys, pagination) = paginate(&keys, limit, offset);
    let paged: Map<String, Value> = page_keys
        .iter()
        .filter_map(|k| visible.get(k).map(|v| (k.clone(), v.clone())))
        .collect();

    let mut facts = Map::new();
    facts.insert("active_clocks".into(), Value::Object(paged));
    facts.insert("hidden_count".into(), json!(hidden_count));
    facts.insert("pagination".into(), pagination);

    let summary = format!(
        "{} clocks are running{}",
        world.clocks.len(),
        if hidden_count > 0 {
            format!(", {hidden_count} of them out of sight.")
        } else {
            ".".to_string()
        }
    );
    (facts, summary)
}

fn relationships_info(target: Option<&str>, world: &GameState) -> (Map<String, Value>, String) {
    let mut facts = Map::new();
    let Some(creature) = target.and_then(|id| world.actor(id)) else {
        facts.insert("relationships".into(), json!({}));
        return (facts, "No relationships to speak of.".to_string());
    };

    // Marks grouped by the actor that placed them
    let mut by_source: std::collections::BTreeMap<String, Vec<Value>> =
        std::collections::BTreeMap::new();
    for mark in creature.marks.values() {
        by_source.entry(mark.source.clone()).or_default().push(json!({
            "tag": mark.tag,
            "value": mark.value,
            "consumes": mark.consumes,
        }));
    }

    facts.insert("entity_id".into(), json!(target));
    facts.insert("relationships".into(), json!(by_source));
    facts.insert("known_by_count".into(), json!(creature.meta.known_by.len()));
    facts.insert("guard".into(), json!(creature.guard));

    let summary = if by_source.is_empty() {
        format!("{} carries no marks.", creature.name)
    } else {
        format!("{} carries marks from {} sources.", creature.name, by_source.len())
    };
    (facts, summary)
}

fn rules_info() -> (Map<String, Value>, String) {
    let mut facts = Map::new();
    facts.insert(
        "outcome_bands".into(),
        json!({
            "crit_success": "natural 20 or margin >= 5",
            "success": "margin >= 0",
            "partial": "margin >= -3",
            "fail": "margin < -3",
        }),
    );
    facts.insert("dc_range".into(), json!({"min": 5, "max": 25, "default": 12}));
    facts.insert("style_range".into(), json!({"min": 0, "max": 3, "default": 1}));
    facts.insert("domains".into(), json!(["d4", "d6", "d8", "d10"]));
    facts.insert(
        "tools".into(),
        json!(crate::catalog::ToolId::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()),
    );

    (facts, "Rolls are d20 plus style dice against a DC.".to_string())
}

/// Extract entity/zone/clock details referenced by the facts into a refs
/// block.
fn build_refs(facts: &Map<String, Value>, world: &GameState) -> Value {
    let mut entity_ids: Vec<String> = Vec::new();
    if let Some(Value::String(id)) = facts.get("entity_id") {
        entity_ids.push(id.clone());
    }
    if let Some(Value::Array(list)) = facts.get("entities") {
        entity_ids.extend(list.iter().filter_map(Value::as_str).map(str::to_string));
    }
    if let Some(Value::Object(details)) = facts.get("entity_details") {
        entity_ids.extend(details.keys().cloned());
    }
    entity_ids.sort();
    entity_ids.dedup();

    let mut entities = Map::new();
    for entity_id in &entity_ids {
        let Some(entity) = world.entities.get(entity_id) else {
            continue;
        };
        let mut record = Map::new();
        record.insert("id".into(), json!(entity.id()));
        record.insert("name".into(), json!(entity.name()));
        record.insert("type".into(), json!(entity.type_str()));
        record.insert("current_zone".into(), json!(entity.current_zone()));
        if let Some(creature) = entity.as_creature() {
            record.insert("hp".into(), json!(creature.hp.current));
            record.insert("max_hp".into(), json!(creature.hp.max));
            record.insert(
                "marks".into(),
                json!(creature.marks.keys().collect::<Vec<_>>()),
            );
            record.insert("inventory".into(), json!(creature.inventory));
        }
        entities.insert(entity_id.clone(), Value::Object(record));
    }

    let mut zone_ids: Vec<String> = Vec::new();
    if let Some(Value::String(id)) = facts.get("zone_id") {
        zone_ids.push(id.clone());
    }
    if let Some(Value::Array(list)) = facts.get("adjacent_zones") {
        zone_ids.extend(list.iter().filter_map(Value::as_str).map(str::to_string));
    }
    for entity_id in &entity_ids {
        if let Some(entity) = world.entities.get(entity_id) {
            zone_ids.push(entity.current_zone().to_string());
        }
    }
    zone_ids.sort();
    zone_ids.dedup();

    let mut zones = Map::new();
    for zone_id in &zone_ids {
        let Some(zone) = world.zones.get(zone_id) else {
            continue;
        };
        zones.insert(
            zone_id.clone(),
            json!({
                "id": zone.id,
                "name": zone.name,
                "description": zone.description,
                "adjacent_zones": zone.adjacent_zones(),
            }),
        );
    }

    let mut clocks = Map::new();
    if let Some(Value::Object(active)) = facts.get("active_clocks") {
        for clock_id in active.keys().filter(|k| !k.starts_with("[hidden")) {
            if let Some(clock) = world.clocks.get(clock_id) {
                clocks.insert(
                    clock_id.clone(),
                    json!({
                        "id": clock_id,
                        "value": clock.value,
                        "max": clock.maximum,
                        "min": clock.minimum,
                        "source": clock.source,
                    }),
                );
            }
        }
    }

    let mut refs = Map::new();
    if !entities.is_empty() {
        refs.insert("entities".into(), Value::Object(entities));
    }
    if !zones.is_empty() {
        refs.insert("zones".into(), Value::Object(zones));
    }
    if !clocks.is_empty() {
        refs.insert("clocks".into(), Value::Object(clocks));
    }
    Value::Object(refs)
}

/// Collapse detail maps into id lists for the thin facts form.
fn thin_facts(mut facts: Map<String, Value>) -> Map<String, Value> {
    if let Some(Value::Object(details)) = facts.remove("entity_details") {
        facts.insert(
            "entity_ids".into(),
            json!(details.keys().collect::<Vec<_>>()),
        );
    }
    if let Some(Value::Object(details)) = facts.remove("item_details") {
        facts.insert("item_ids".into(), json!(details.keys().collect::<Vec<_>>()));
    }
    if let Some(Value::Object(active)) = facts.remove("active_clocks") {
        let ids: Vec<&String> = active.keys().filter(|k| !k.starts_with("[hidden")).collect();
        if !ids.is_empty() {
            facts.insert("clock_ids".into(), json!(ids));
        }
    }
    if let Some(Value::Object(relationships)) = facts.remove("relationships") {
        let ids: Vec<&String> = relationships.keys().collect();
        if !ids.is_empty() {
            facts.insert("relationship_source_ids".into(), json!(ids));
        }
    }
    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::validator::test_support::demo_world;
    use crate::visibility::RedactionCache;
    use taleforge_domain::{Meta, Utterance};

    fn run_query(world: &mut GameState, args: Value) -> ToolResult {
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut validator = Validator::with_defaults();
        let mut ctx = WorldCtx::new(world, &bus, &cache);
        validator.validate_and_execute(
            "get_info",
            &args,
            &mut ctx,
            &Utterance::new("what's my status", "pc.arin"),
            Some(3),
        )
    }

    #[test]
    fn test_status_topic() {
        let mut world = demo_world();
        let result = run_query(&mut world, json!({"actor": "pc.arin", "topic": "status"}));
        assert!(result.ok, "{:?}", result.error_message);
        assert_eq!(result.facts["hp"]["current"], json!(20));
        assert_eq!(result.facts["zone"]["id"], json!("courtyard"));
        assert!(result.effects.is_empty());
    }

    #[test]
    fn test_metadata_snapshot_is_deterministic() {
        let mut world = demo_world();
        let first = run_query(&mut world, json!({"actor": "pc.arin", "topic": "status"}));
        let second = run_query(&mut world, json!({"actor": "pc.arin", "topic": "status"}));
        assert_eq!(
            first.facts["_metadata"]["snapshot_id"],
            second.facts["_metadata"]["snapshot_id"]
        );
        // Query ids are unique per query
        assert_ne!(
            first.facts["_metadata"]["query_id"],
            second.facts["_metadata"]["query_id"]
        );
    }

    #[test]
    fn test_inventory_topic_counts_duplicates() {
        let mut world = demo_world();
        let arin = world.actor_mut("pc.arin").expect("arin");
        arin.inventory.push("torch".to_string());
        arin.inventory.push("torch".to_string());

        let result = run_query(&mut world, json!({"actor": "pc.arin", "topic": "inventory"}));
        assert!(result.ok);
        let items = result.facts["items"].as_array().expect("items");
        let torch = items
            .iter()
            .find(|i| i["id"] == json!("torch"))
            .expect("torch entry");
        assert_eq!(torch["count"], json!(2));
        assert_eq!(result.facts["total_items"], json!(3));
    }

    #[test]
    fn test_zone_topic_filters_hidden_entities() {
        let mut world = demo_world();
        let mut scout = taleforge_domain::Creature::new("npc.scout", "Scout", "courtyard");
        scout.meta = Meta::with_visibility(Visibility::Hidden);
        world
            .entities
            .insert("npc.scout".to_string(), taleforge_domain::Entity::Npc(scout));

        let result = run_query(&mut world, json!({"actor": "pc.arin", "topic": "zone"}));
        assert!(result.ok);
        let entities: Vec<&str> = result.facts["entities"]
            .as_array()
            .expect("entities")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(entities.contains(&"pc.arin"));
        assert!(!entities.contains(&"npc.scout"));
    }

    #[test]
    fn test_clocks_topic_hides_gm_clocks() {
        let mut world = demo_world();
        let mut doom = taleforge_domain::Clock::new("doom", "Doom");
        doom.meta = Meta::with_visibility(Visibility::GmOnly);
        world.clocks.insert("doom".to_string(), doom);

        let result = run_query(&mut world, json!({"actor": "pc.arin", "topic": "clocks"}));
        assert!(result.ok);
        let active = result.facts["active_clocks"].as_object().expect("clocks");
        assert!(active.contains_key("alarm"));
        assert!(!active.contains_key("doom"));
        assert!(active.keys().any(|k| k.starts_with("[hidden_clock_")));
        assert_eq!(result.facts["hidden_count"], json!(1));
    }

    #[test]
    fn test_use_refs_transform() {
        let mut world = demo_world();
        let result = run_query(
            &mut world,
            json!({"actor": "pc.arin", "topic": "zone", "use_refs": true}),
        );
        assert!(result.ok);
        assert!(result.facts["facts"].is_object());
        assert!(result.facts["refs"]["entities"]["pc.arin"].is_object());
        assert!(result.facts["refs"]["zones"]["courtyard"].is_object());
    }

    #[test]
    fn test_refs_do_not_leak_hidden_entities() {
        let mut world = demo_world();
        let mut scout = taleforge_domain::Creature::new("npc.scout", "Scout", "courtyard");
        scout.meta = Meta::with_visibility(Visibility::Hidden);
        world
            .entities
            .insert("npc.scout".to_string(), taleforge_domain::Entity::Npc(scout));

        let result = run_query(
            &mut world,
            json!({"actor": "pc.arin", "topic": "zone", "use_refs": true}),
        );
        assert!(result.ok);
        let refs = result.facts["refs"]["entities"].as_object().expect("refs");
        assert!(!refs.contains_key("npc.scout"));
    }

    #[test]
    fn test_fields_filter_preserves_metadata() {
        let mut world = demo_world();
        let result = run_query(
            &mut world,
            json!({"actor": "pc.arin", "topic": "status", "fields": ["hp"]}),
        );
        assert!(result.ok);
        let keys: Vec<&String> = result.facts.as_object().expect("facts").keys().collect();
        assert!(keys.iter().any(|k| *k == "hp"));
        assert!(keys.iter().any(|k| *k == "_metadata"));
        assert!(!keys.iter().any(|k| *k == "zone"));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let mut world = demo_world();
        let result = run_query(
            &mut world,
            json!({"actor": "pc.arin", "target": "npc.dragon", "topic": "status"}),
        );
        assert!(!result.ok);
        assert_eq!(result.tool_id, "ask_clarifying");
    }

    #[test]
    fn test_invisible_target_rejected() {
        let mut world = demo_world();
        let mut scout = taleforge_domain::Creature::new("npc.scout", "Scout", "threshold");
        scout.meta = Meta::with_visibility(Visibility::Hidden);
        world
            .entities
            .insert("npc.scout".to_string(), taleforge_domain::Entity::Npc(scout));

        let result = run_query(
            &mut world,
            json!({"actor": "pc.arin", "target": "npc.scout", "topic": "status"}),
        );
        assert!(!result.ok);
        assert!(result.error_message.expect("error").contains("not visible"));
    }
}
