//! PokeAPI resources
//!
//! All five resources page through a listing endpoint and fetch one
//! detail document per listed name. Rows are flattened: nested references
//! become names, stats and flavors become `{name: value}` objects.

use super::fields::{english_entry, keyed_map, nested_names, object, pick, record};
use super::{MapContext, ResourceDescriptor, Strategy};
use crate::error::Result;
use crate::schema::FieldType::{Boolean, Integer, Json, String as Text, StringList};
use crate::schema::{FieldDef, TableSchema};
use crate::types::{JsonObject, JsonValue, Source};

/// Items per listing page
pub const PAGE_SIZE: u32 = 20;

// ============================================================================
// pokemon_details
// ============================================================================

const POKEMON_DETAILS_FIELDS: &[FieldDef] = &[
    FieldDef::required("id", Integer),
    FieldDef::required("name", Text),
    FieldDef::optional("height", Integer),
    FieldDef::optional("weight", Integer),
    FieldDef::optional("base_experience", Integer),
    FieldDef::optional("is_default", Boolean),
    FieldDef::optional("order", Integer),
    FieldDef::optional("species", Text),
    FieldDef::optional("types", StringList),
    FieldDef::optional("abilities", StringList),
    FieldDef::optional("moves", StringList),
    FieldDef::optional("stats", Json),
    FieldDef::optional("sprites", Json),
];

pub static POKEMON_DETAILS: ResourceDescriptor = ResourceDescriptor {
    name: "pokemon_details",
    source: Source::Pokemon,
    description: "Pokemon with stats, types, abilities, moves and sprites",
    strategy: Strategy::FlatPaginated {
        list_endpoint: "/pokemon",
        detail_endpoint: "/pokemon/{{ name }}",
        page_size: PAGE_SIZE,
    },
    schema: TableSchema::new(POKEMON_DETAILS_FIELDS),
    primary_key: &["id"],
    mapper: map_pokemon,
};

fn map_pokemon(body: &JsonValue, _ctx: &MapContext) -> Result<Vec<JsonObject>> {
    object(body, "pokemon")?;

    let sprites = match body.get("sprites") {
        Some(sprites) if sprites.is_object() => serde_json::json!({
            "front_default": pick(sprites, "front_default"),
            "back_default": pick(sprites, "back_default"),
            "front_shiny": pick(sprites, "front_shiny"),
            "back_shiny": pick(sprites, "back_shiny"),
        }),
        _ => JsonValue::Null,
    };

    Ok(vec![record([
        ("id", pick(body, "id")),
        ("name", pick(body, "name")),
        ("height", pick(body, "height")),
        ("weight", pick(body, "weight")),
        ("base_experience", pick(body, "base_experience")),
        ("is_default", pick(body, "is_default")),
        ("order", pick(body, "order")),
        ("species", pick(body, "species.name")),
        ("types", nested_names(body, "types", "type")?),
        ("abilities", nested_names(body, "abilities", "ability")?),
        ("moves", nested_names(body, "moves", "move")?),
        ("stats", keyed_map(body, "stats", "stat.name", "base_stat")?),
        ("sprites", sprites),
    ])])
}

// ============================================================================
// berries
// ============================================================================

const BERRIES_FIELDS: &[FieldDef] = &[
    FieldDef::required("id", Integer),
    FieldDef::required("name", Text),
    FieldDef::optional("growth_time", Integer),
    FieldDef::optional("max_harvest", Integer),
    FieldDef::optional("natural_gift_power", Integer),
    FieldDef::optional("size", Integer),
    FieldDef::optional("smoothness", Integer),
    FieldDef::optional("soil_dryness", Integer),
    FieldDef::optional("firmness", Text),
    FieldDef::optional("flavors", Json),
    FieldDef::optional("item", Text),
];

pub static BERRIES: ResourceDescriptor = ResourceDescriptor {
    name: "berries",
    source: Source::Pokemon,
    description: "Berries with growth, size and flavor potency",
    strategy: Strategy::FlatPaginated {
        list_endpoint: "/berry",
        detail_endpoint: "/berry/{{ name }}",
        page_size: PAGE_SIZE,
    },
    schema: TableSchema::new(BERRIES_FIELDS),
    primary_key: &["id"],
    mapper: map_berry,
};

fn map_berry(body: &JsonValue, _ctx: &MapContext) -> Result<Vec<JsonObject>> {
    object(body, "berry")?;

    Ok(vec![record([
        ("id", pick(body, "id")),
        ("name", pick(body, "name")),
        ("growth_time", pick(body, "growth_time")),
        ("max_harvest", pick(body, "max_harvest")),
        ("natural_gift_power", pick(body, "natural_gift_power")),
        ("size", pick(body, "size")),
        ("smoothness", pick(body, "smoothness")),
        ("soil_dryness", pick(body, "soil_dryness")),
        ("firmness", pick(body, "firmness.name")),
        ("flavors", keyed_map(body, "flavors", "flavor.name", "potency")?),
        ("item", pick(body, "item.name")),
    ])])
}

// ============================================================================
// abilities
// ============================================================================

const ABILITIES_FIELDS: &[FieldDef] = &[
    FieldDef::required("id", Integer),
    FieldDef::required("name", Text),
    FieldDef::optional("is_main_series", Boolean),
    FieldDef::optional("generation", Text),
    FieldDef::optional("effect", Text),
    FieldDef::optional("short_effect", Text),
    FieldDef::optional("pokemon", StringList),
];

pub static ABILITIES: ResourceDescriptor = ResourceDescriptor {
    name: "abilities",
    source: Source::Pokemon,
    description: "Abilities with English effect text and the Pokemon that have them",
    strategy: Strategy::FlatPaginated {
        list_endpoint: "/ability",
        detail_endpoint: "/ability/{{ name }}",
        page_size: PAGE_SIZE,
    },
    schema: TableSchema::new(ABILITIES_FIELDS),
    primary_key: &["id"],
    mapper: map_ability,
};

fn map_ability(body: &JsonValue, _ctx: &MapContext) -> Result<Vec<JsonObject>> {
    object(body, "ability")?;
    let effect = english_entry(body, "effect_entries")?;

    Ok(vec![record([
        ("id", pick(body, "id")),
        ("name", pick(body, "name")),
        ("is_main_series", pick(body, "is_main_series")),
        ("generation", pick(body, "generation.name")),
        ("effect", effect.map_or(JsonValue::Null, |e| pick(e, "effect"))),
        (
            "short_effect",
            effect.map_or(JsonValue::Null, |e| pick(e, "short_effect")),
        ),
        ("pokemon", nested_names(body, "pokemon", "pokemon")?),
    ])])
}

// ============================================================================
// moves
// ============================================================================

const MOVES_FIELDS: &[FieldDef] = &[
    FieldDef::required("id", Integer),
    FieldDef::required("name", Text),
    FieldDef::optional("accuracy", Integer),
    FieldDef::optional("effect_chance", Integer),
    FieldDef::optional("pp", Integer),
    FieldDef::optional("priority", Integer),
    FieldDef::optional("power", Integer),
    FieldDef::optional("damage_class", Text),
    FieldDef::optional("type", Text),
    FieldDef::optional("generation", Text),
    FieldDef::optional("effect", Text),
    FieldDef::optional("short_effect", Text),
];

pub static MOVES: ResourceDescriptor = ResourceDescriptor {
    name: "moves",
    source: Source::Pokemon,
    description: "Moves with power, accuracy, type and English effect text",
    strategy: Strategy::FlatPaginated {
        list_endpoint: "/move",
        detail_endpoint: "/move/{{ name }}",
        page_size: PAGE_SIZE,
    },
    schema: TableSchema::new(MOVES_FIELDS),
    primary_key: &["id"],
    mapper: map_move,
};

fn map_move(body: &JsonValue, _ctx: &MapContext) -> Result<Vec<JsonObject>> {
    object(body, "move")?;
    let effect = english_entry(body, "effect_entries")?;

    Ok(vec![record([
        ("id", pick(body, "id")),
        ("name", pick(body, "name")),
        ("accuracy", pick(body, "accuracy")),
        ("effect_chance", pick(body, "effect_chance")),
        ("pp", pick(body, "pp")),
        ("priority", pick(body, "priority")),
        ("power", pick(body, "power")),
        ("damage_class", pick(body, "damage_class.name")),
        ("type", pick(body, "type.name")),
        ("generation", pick(body, "generation.name")),
        ("effect", effect.map_or(JsonValue::Null, |e| pick(e, "effect"))),
        (
            "short_effect",
            effect.map_or(JsonValue::Null, |e| pick(e, "short_effect")),
        ),
    ])])
}

// ============================================================================
// types
// ============================================================================

const TYPES_FIELDS: &[FieldDef] = &[
    FieldDef::required("id", Integer),
    FieldDef::required("name", Text),
    FieldDef::optional("generation", Text),
    FieldDef::optional("damage_relations", Json),
    FieldDef::optional("pokemon", StringList),
];

pub static TYPES: ResourceDescriptor = ResourceDescriptor {
    name: "types",
    source: Source::Pokemon,
    description: "Types with damage relations and member Pokemon",
    strategy: Strategy::FlatPaginated {
        list_endpoint: "/type",
        detail_endpoint: "/type/{{ name }}",
        page_size: PAGE_SIZE,
    },
    schema: TableSchema::new(TYPES_FIELDS),
    primary_key: &["id"],
    mapper: map_type,
};

const DAMAGE_RELATIONS: [&str; 6] = [
    "double_damage_from",
    "double_damage_to",
    "half_damage_from",
    "half_damage_to",
    "no_damage_from",
    "no_damage_to",
];

fn map_type(body: &JsonValue, _ctx: &MapContext) -> Result<Vec<JsonObject>> {
    object(body, "type")?;

    let damage_relations = match body.get("damage_relations") {
        Some(relations) if relations.is_object() => {
            let mut map = JsonObject::new();
            for relation in DAMAGE_RELATIONS {
                map.insert(relation.to_string(), nested_names(relations, relation, "")?);
            }
            JsonValue::Object(map)
        }
        _ => JsonValue::Null,
    };

    Ok(vec![record([
        ("id", pick(body, "id")),
        ("name", pick(body, "name")),
        ("generation", pick(body, "generation.name")),
        ("damage_relations", damage_relations),
        ("pokemon", nested_names(body, "pokemon", "pokemon")?),
    ])])
}
