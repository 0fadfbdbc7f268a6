//! Zones and directional exits.
//!
//! Zones are graph nodes connected by directional `Exit` edges supporting
//! conditional travel, blocking, terrain-aware movement costs, per-actor
//! discovery, and regional grouping.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entities::Creature;
use crate::meta::Meta;

/// Compass/relative direction of an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
    In,
    Out,
    Forward,
    Back,
}

impl Direction {
    /// Parse a direction token (case-insensitive). Unknown tokens are None.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "north" | "n" => Some(Self::North),
            "south" | "s" => Some(Self::South),
            "east" | "e" => Some(Self::East),
            "west" | "w" => Some(Self::West),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "northeast" | "ne" => Some(Self::Northeast),
            "northwest" | "nw" => Some(Self::Northwest),
            "southeast" | "se" => Some(Self::Southeast),
            "southwest" | "sw" => Some(Self::Southwest),
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            "forward" => Some(Self::Forward),
            "back" => Some(Self::Back),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
            Self::Up => "up",
            Self::Down => "down",
            Self::Northeast => "northeast",
            Self::Northwest => "northwest",
            Self::Southeast => "southeast",
            Self::Southwest => "southwest",
            Self::In => "in",
            Self::Out => "out",
            Self::Forward => "forward",
            Self::Back => "back",
        }
    }

    /// Canonical opposite used by exit mirroring.
    pub fn opposite(&self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Northeast => Self::Southwest,
            Self::Northwest => Self::Southeast,
            Self::Southeast => Self::Northwest,
            Self::Southwest => Self::Northeast,
            Self::In => Self::Out,
            Self::Out => Self::In,
            Self::Forward => Self::Back,
            Self::Back => Self::Forward,
        }
    }
}

/// Travel requirements attached to an exit, checked in declaration order:
/// key, level, tag, then the reserved stat check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExitConditions {
    /// Item id the actor must carry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_required: Option<String>,
    /// Minimum actor level (from the `level` tag)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_required: Option<i64>,
    /// Tag the actor must carry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_required: Option<String>,
    /// Reserved: stat-based checks always fail with a reason for now
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat_check: Option<String>,
}

impl ExitConditions {
    pub fn is_empty(&self) -> bool {
        self.key_required.is_none()
            && self.level_required.is_none()
            && self.tag_required.is_none()
            && self.stat_check.is_none()
    }
}

/// Terrain modifier table: terrain token → actor property → cost multiplier.
pub type TerrainModifiers = BTreeMap<String, BTreeMap<String, f64>>;

/// A directional exit from one zone to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    /// Target zone id
    pub to: String,
    /// e.g. "north door", "ladder up"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub blocked: bool,
    /// Optional puzzle/door id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ExitConditions>,
    /// Movement cost for pathfinding (1.0 = normal)
    #[serde(default = "default_cost")]
    pub cost: f64,
    /// "stairs", "mud", "fire", "water", ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain: Option<String>,
    #[serde(default)]
    pub meta: Meta,
}

fn default_cost() -> f64 {
    1.0
}

/// Minimum movement cost; prevents zero-cost cycles in pathfinding.
pub const MIN_MOVEMENT_COST: f64 = 0.1;

impl Exit {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            label: None,
            direction: None,
            blocked: false,
            lock_id: None,
            conditions: None,
            cost: 1.0,
            terrain: None,
            meta: Meta::new(),
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_terrain(mut self, terrain: impl Into<String>) -> Self {
        self.terrain = Some(terrain.into());
        self
    }

    pub fn blocked(mut self) -> Self {
        self.blocked = true;
        self
    }

    /// Human-readable label: explicit label, direction, or the target name.
    pub fn display_label(&self, zones: &BTreeMap<String, Zone>) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        if let Some(direction) = &self.direction {
            return direction.as_str().to_string();
        }
        match zones.get(&self.to) {
            Some(zone) => format!("Exit to {}", zone.name),
            None => format!("Exit to {}", self.to),
        }
    }

    /// Movement cost considering terrain and actor modifiers. The first
    /// actor tag that matches a modifier wins; the result is floored at
    /// [`MIN_MOVEMENT_COST`].
    pub fn movement_cost(
        &self,
        actor: Option<&Creature>,
        terrain_modifiers: Option<&TerrainModifiers>,
    ) -> f64 {
        let mut final_cost = self.cost;

        if let (Some(terrain), Some(modifiers)) = (&self.terrain, terrain_modifiers) {
            if let (Some(actor), Some(terrain_mods)) = (actor, modifiers.get(terrain)) {
                for (property, multiplier) in terrain_mods {
                    if actor.tags.contains_key(property) {
                        final_cost *= multiplier;
                        break;
                    }
                }
            }
        }

        final_cost.max(MIN_MOVEMENT_COST)
    }

    /// Human-readable terrain description, empty when no terrain is set.
    pub fn terrain_description(&self) -> String {
        let Some(terrain) = &self.terrain else {
            return String::new();
        };
        match terrain.as_str() {
            "stairs" => "steep stairs",
            "mud" => "muddy ground",
            "fire" => "flames",
            "water" => "deep water",
            "ice" => "slippery ice",
            "thorns" => "thorny undergrowth",
            "sand" => "shifting sand",
            "rubble" => "broken rubble",
            "swamp" => "swampy marsh",
            "lava" => "molten lava",
            other => return format!("{other} terrain"),
        }
        .to_string()
    }
}

/// A game zone/location with rich exit modeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub exits: Vec<Exit>,
    /// "dark", "noisy", "safe", ... Accepts list input on deserialization.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Actor ids who have discovered this zone
    #[serde(default)]
    pub discovered_by: BTreeSet<String>,
    /// Regional grouping for macro-level organization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub meta: Meta,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            exits: Vec::new(),
            tags: BTreeSet::new(),
            discovered_by: BTreeSet::new(),
            region: None,
            meta: Meta::new(),
        }
    }

    /// Zone ids reachable through unblocked exits.
    pub fn adjacent_zones(&self) -> Vec<&str> {
        self.exits
            .iter()
            .filter(|e| !e.blocked)
            .map(|e| e.to.as_str())
            .collect()
    }

    /// Zone ids behind blocked exits.
    pub fn blocked_exits(&self) -> Vec<&str> {
        self.exits
            .iter()
            .filter(|e| e.blocked)
            .map(|e| e.to.as_str())
            .collect()
    }

    /// Append an exit and touch the zone meta.
    pub fn add_exit(&mut self, exit: Exit) -> &Exit {
        self.exits.push(exit);
        self.meta.touch();
        self.exits.last().unwrap_or_else(|| unreachable!("just pushed"))
    }

    /// Remove the exit to a target zone. Returns true if one was removed.
    pub fn remove_exit(&mut self, to: &str) -> bool {
        let before = self.exits.len();
        self.exits.retain(|e| e.to != to);
        if self.exits.len() < before {
            self.meta.touch();
            true
        } else {
            false
        }
    }

    pub fn get_exit(&self, to: &str) -> Option<&Exit> {
        self.exits.iter().find(|e| e.to == to)
    }

    pub fn get_exit_mut(&mut self, to: &str) -> Option<&mut Exit> {
        self.exits.iter_mut().find(|e| e.to == to)
    }

    pub fn exits_by_direction(&self, direction: Direction) -> Vec<&Exit> {
        self.exits
            .iter()
            .filter(|e| e.direction == Some(direction))
            .collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        if self.tags.insert(tag.into()) {
            self.meta.touch();
        }
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let removed = self.tags.remove(tag);
        if removed {
            self.meta.touch();
        }
        removed
    }

    pub fn is_discovered_by(&self, actor_id: &str) -> bool {
        self.discovered_by.contains(actor_id)
    }

    /// Mark the zone discovered. Returns true on a new discovery.
    pub fn discover_by(&mut self, actor_id: &str) -> bool {
        let added = self.discovered_by.insert(actor_id.to_string());
        if added {
            self.meta.touch();
        }
        added
    }

    /// Remove discovery status (memory loss effects and the like).
    pub fn forget_discovery(&mut self, actor_id: &str) -> bool {
        let removed = self.discovered_by.remove(actor_id);
        if removed {
            self.meta.touch();
        }
        removed
    }

    pub fn discovery_status(&self, actor_id: &str) -> &'static str {
        if self.is_discovered_by(actor_id) {
            "discovered"
        } else {
            "undiscovered"
        }
    }

    pub fn set_region(&mut self, region: Option<String>) {
        if self.region != region {
            self.region = region;
            self.meta.touch();
        }
    }

    pub fn is_in_region(&self, region: &str) -> bool {
        self.region.as_deref() == Some(region)
    }
}
