//! `narrate_only` executor: no mechanics, just gather what the camera sees.

use serde_json::{json, Value};

use crate::catalog::{NarrateOnlyArgs, ToolId};
use crate::runtime::WorldCtx;
use crate::validator::{ToolResult, Validator};
use crate::visibility::can_player_see;

const MAX_VISIBLE_ENTITIES: usize = 5;
const MAX_SALIENT_FEATURES: usize = 3;

impl Validator {
    pub(super) fn execute_narrate_only(
        &mut self,
        args_value: &Value,
        ctx: &mut WorldCtx<'_>,
    ) -> ToolResult {
        let args: NarrateOnlyArgs =
            serde_json::from_value(args_value.clone()).unwrap_or_default();

        let world = &*ctx.world;
        let pov = args.actor.clone().or_else(|| world.current_actor.clone());
        let topic = args.topic.clone().unwrap_or_else(|| "look around".to_string());

        let pov_creature = pov.as_deref().and_then(|id| world.actor(id));
        let zone = pov_creature.and_then(|c| world.zones.get(&c.current_zone));

        // Visible entities, capped for the narrator
        let visible: Vec<Value> = match (pov.as_deref(), zone) {
            (Some(pov_id), Some(zone)) => world
                .entities
                .iter()
                .filter(|(id, e)| {
                    id.as_str() != pov_id
                        && e.current_zone() == zone.id
                        && can_player_see(Some(pov_id), e, world)
                })
                .take(MAX_VISIBLE_ENTITIES)
                .map(|(id, e)| json!({"id": id, "name": e.name(), "type": e.type_str()}))
                .collect(),
            _ => Vec::new(),
        };

        // Salient features: interactable objects first, then zone tags
        let mut features: Vec<String> = Vec::new();
        if let Some(zone) = zone {
            for (_, entity) in world.entities.iter() {
                if let taleforge_domain::Entity::Object(object) = entity {
                    if object.current_zone == zone.id && object.interactable {
                        features.push(object.name.clone());
                    }
                }
                if features.len() >= MAX_SALIENT_FEATURES {
                    break;
                }
            }
            for tag in &zone.tags {
                if features.len() >= MAX_SALIENT_FEATURES {
                    break;
                }
                features.push(tag.clone());
            }
        }

        let sensory = json!({
            "alert": world.scene.tags.get("alert"),
            "lighting": world.scene.tags.get("lighting"),
            "noise": world.scene.tags.get("noise"),
            "cover": world.scene.tags.get("cover"),
        });

        let summary = generate_summary(&topic, pov_creature.map(|c| c.name.as_str()), zone.map(|z| z.name.as_str()), &visible);

        let facts = json!({
            "pov": pov,
            "topic": topic,
            "zone": zone.map(|z| json!({"id": z.id, "name": z.name, "description": z.description})),
            "visible_entities": visible,
            "salient_features": features,
            "sensory": sensory,
        });

        let narration_hint = json!({
            "summary": summary,
            "tone_tags": tone_tags(&topic, world),
            "senses": topic_senses(&topic),
            "camera": topic_camera(&topic),
            "sensory": sensory,
            "sentences_max": 3,
            "salient_entities": pov.map(|p| vec![p]).unwrap_or_default(),
        });

        ToolResult::success(ToolId::NarrateOnly, args_value.clone(), facts, Vec::new(), narration_hint)
    }
}

fn generate_summary(
    topic: &str,
    pov_name: Option<&str>,
    zone_name: Option<&str>,
    visible: &[Value],
) -> String {
    let who = pov_name.unwrap_or("The party");
    let along = match visible.len() {
        0 => String::new(),
        1 => " with one other figure nearby".to_string(),
        n => format!(" with {n} others nearby"),
    };

    match (topic, zone_name) {
        ("hesitation", _) => "You hesitate, unsure what to do next.".to_string(),
        ("recap", Some(zone)) => format!("{who} takes stock of recent events in {zone}."),
        ("listen", Some(zone)) => format!("{who} listens carefully in {zone}."),
        ("smell", Some(zone)) => format!("{who} takes in the scents of {zone}."),
        (_, Some(zone)) => format!("{who} surveys {zone}{along}."),
        (_, None) => format!("{who} takes in the surroundings."),
    }
}

fn tone_tags(topic: &str, world: &taleforge_domain::GameState) -> Vec<String> {
    let mut tags = vec!["descriptive".to_string()];
    match topic {
        "hesitation" => {
            tags.push("neutral".to_string());
            tags.push("reflective".to_string());
        }
        "recap" => tags.push("reflective".to_string()),
        _ => tags.push("atmospheric".to_string()),
    }
    if world.scene.tags.get("alert").map(String::as_str) == Some("alarmed") {
        tags.push("tense".to_string());
    }
    tags
}

fn topic_senses(topic: &str) -> Vec<&'static str> {
    match topic {
        "listen" => vec!["audio"],
        "smell" => vec!["smell"],
        "look around" | "establishing" => vec!["visual"],
        _ => vec!["visual", "audio"],
    }
}

fn topic_camera(topic: &str) -> &'static str {
    if topic.starts_with("zoom_in") {
        return "close-up";
    }
    match topic {
        "recap" => "wide",
        "establishing" => "establishing",
        "look around" => "wide",
        _ => "over-shoulder",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::validator::test_support::demo_world;
    use crate::visibility::RedactionCache;
    use taleforge_domain::Utterance;

    fn run(world: &mut taleforge_domain::GameState, args: Value) -> ToolResult {
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut validator = Validator::with_defaults();
        let mut ctx = WorldCtx::new(world, &bus, &cache);
        validator.validate_and_execute(
            "narrate_only",
            &args,
            &mut ctx,
            &Utterance::new("look around", "pc.arin"),
            Some(1),
        )
    }

    #[test]
    fn test_look_around_gathers_scene() {
        let mut world = demo_world();
        let result = run(&mut world, json!({"actor": "pc.arin", "topic": "look around"}));
        assert!(result.ok);
        assert!(result.effects.is_empty());
        assert_eq!(result.facts["zone"]["id"], json!("courtyard"));
        assert_eq!(
            result.facts["visible_entities"].as_array().expect("visible").len(),
            1
        );
        assert_eq!(result.narration_hint["camera"], json!("wide"));
    }

    #[test]
    fn test_zoom_in_camera() {
        let mut world = demo_world();
        let result = run(
            &mut world,
            json!({"actor": "pc.arin", "topic": "zoom_in:npc.guard"}),
        );
        assert!(result.ok);
        assert_eq!(result.narration_hint["camera"], json!("close-up"));
    }

    #[test]
    fn test_listen_topic_senses() {
        let mut world = demo_world();
        let result = run(&mut world, json!({"actor": "pc.arin", "topic": "listen"}));
        assert_eq!(result.narration_hint["senses"], json!(["audio"]));
    }

    #[test]
    fn test_sensory_block_reflects_scene_tags() {
        let mut world = demo_world();
        world.scene.tags.insert("lighting".to_string(), "dim".to_string());
        let result = run(&mut world, json!({"actor": "pc.arin"}));
        assert_eq!(result.narration_hint["sensory"]["lighting"], json!("dim"));
    }
}
