//! Chess.com published-data resources
//!
//! Player resources are fetched once per configured username; games are
//! fetched per username and month from the monthly archive endpoint.
//! Every row carries the configured `username` so rows from different
//! players never collide.

use super::fields::{items, object, pick, record};
use super::{MapContext, ResourceDescriptor, Strategy};
use crate::error::{Error, Result};
use crate::schema::FieldType::{Boolean, Integer, Json, String as Text};
use crate::schema::{FieldDef, TableSchema};
use crate::types::{JsonObject, JsonValue, Source};

// ============================================================================
// players_profiles
// ============================================================================

const PLAYERS_PROFILES_FIELDS: &[FieldDef] = &[
    FieldDef::required("player_id", Integer),
    FieldDef::required("username", Text),
    FieldDef::optional("name", Text),
    FieldDef::optional("title", Text),
    FieldDef::optional("status", Text),
    FieldDef::optional("league", Text),
    FieldDef::optional("country", Text),
    FieldDef::optional("location", Text),
    FieldDef::optional("followers", Integer),
    FieldDef::optional("fide", Integer),
    FieldDef::optional("is_streamer", Boolean),
    FieldDef::optional("verified", Boolean),
    FieldDef::optional("joined", Integer),
    FieldDef::optional("last_online", Integer),
    FieldDef::optional("url", Text),
    FieldDef::optional("avatar", Text),
];

pub static PLAYERS_PROFILES: ResourceDescriptor = ResourceDescriptor {
    name: "players_profiles",
    source: Source::Chess,
    description: "Player profiles",
    strategy: Strategy::PerEntity {
        endpoint: "/player/{{ entity }}",
    },
    schema: TableSchema::new(PLAYERS_PROFILES_FIELDS),
    primary_key: &["player_id"],
    mapper: map_profile,
};

fn map_profile(body: &JsonValue, ctx: &MapContext) -> Result<Vec<JsonObject>> {
    object(body, "player profile")?;

    // country is an API URL ending in the ISO code
    let country = match pick(body, "country") {
        JsonValue::String(url) => url
            .rsplit('/')
            .next()
            .map_or(JsonValue::Null, JsonValue::from),
        other => other,
    };

    Ok(vec![record([
        ("player_id", pick(body, "player_id")),
        ("username", ctx.entity_value()),
        ("name", pick(body, "name")),
        ("title", pick(body, "title")),
        ("status", pick(body, "status")),
        ("league", pick(body, "league")),
        ("country", country),
        ("location", pick(body, "location")),
        ("followers", pick(body, "followers")),
        ("fide", pick(body, "fide")),
        ("is_streamer", pick(body, "is_streamer")),
        ("verified", pick(body, "verified")),
        ("joined", pick(body, "joined")),
        ("last_online", pick(body, "last_online")),
        ("url", pick(body, "url")),
        ("avatar", pick(body, "avatar")),
    ])])
}

// ============================================================================
// players_online_status
// ============================================================================

const PLAYERS_ONLINE_STATUS_FIELDS: &[FieldDef] = &[
    FieldDef::required("username", Text),
    FieldDef::optional("online", Boolean),
    FieldDef::required("checked_at", Text),
];

pub static PLAYERS_ONLINE_STATUS: ResourceDescriptor = ResourceDescriptor {
    name: "players_online_status",
    source: Source::Chess,
    description: "Online status snapshots, one row per player per run",
    strategy: Strategy::PerEntity {
        endpoint: "/player/{{ entity }}/is-online",
    },
    schema: TableSchema::new(PLAYERS_ONLINE_STATUS_FIELDS),
    primary_key: &[],
    mapper: map_online_status,
};

fn map_online_status(body: &JsonValue, ctx: &MapContext) -> Result<Vec<JsonObject>> {
    object(body, "online status")?;

    Ok(vec![record([
        ("username", ctx.entity_value()),
        ("online", pick(body, "online")),
        ("checked_at", JsonValue::from(ctx.checked_at.to_rfc3339())),
    ])])
}

// ============================================================================
// players_archives
// ============================================================================

const PLAYERS_ARCHIVES_FIELDS: &[FieldDef] = &[
    FieldDef::required("username", Text),
    FieldDef::required("archive_url", Text),
    FieldDef::optional("year", Integer),
    FieldDef::optional("month", Integer),
];

pub static PLAYERS_ARCHIVES: ResourceDescriptor = ResourceDescriptor {
    name: "players_archives",
    source: Source::Chess,
    description: "Monthly game archives available per player",
    strategy: Strategy::PerEntity {
        endpoint: "/player/{{ entity }}/games/archives",
    },
    schema: TableSchema::new(PLAYERS_ARCHIVES_FIELDS),
    primary_key: &["username", "archive_url"],
    mapper: map_archives,
};

fn map_archives(body: &JsonValue, ctx: &MapContext) -> Result<Vec<JsonObject>> {
    object(body, "archive list")?;

    items(body, "archives")?
        .iter()
        .map(|url| {
            let url = url
                .as_str()
                .ok_or_else(|| Error::mapping("archives", "expected archive URLs"))?;
            let (year, month) = archive_period(url);
            Ok(record([
                ("username", ctx.entity_value()),
                ("archive_url", JsonValue::from(url)),
                ("year", year),
                ("month", month),
            ]))
        })
        .collect()
}

/// `(year, month)` from an archive URL ending in `/YYYY/MM`
fn archive_period(url: &str) -> (JsonValue, JsonValue) {
    let mut tail = url.trim_end_matches('/').rsplit('/');
    let month = tail.next().and_then(|m| m.parse::<i64>().ok());
    let year = tail.next().and_then(|y| y.parse::<i64>().ok());
    match (year, month) {
        (Some(y), Some(m)) => (JsonValue::from(y), JsonValue::from(m)),
        _ => (JsonValue::Null, JsonValue::Null),
    }
}

// ============================================================================
// players_games
// ============================================================================

const PLAYERS_GAMES_FIELDS: &[FieldDef] = &[
    FieldDef::required("url", Text),
    FieldDef::required("username", Text),
    FieldDef::required("archive_month", Text),
    FieldDef::optional("uuid", Text),
    FieldDef::optional("time_control", Text),
    FieldDef::optional("time_class", Text),
    FieldDef::optional("rules", Text),
    FieldDef::optional("rated", Boolean),
    FieldDef::optional("end_time", Integer),
    FieldDef::optional("eco", Text),
    FieldDef::optional("fen", Text),
    FieldDef::optional("pgn", Text),
    FieldDef::optional("white_username", Text),
    FieldDef::optional("white_rating", Integer),
    FieldDef::optional("white_result", Text),
    FieldDef::optional("black_username", Text),
    FieldDef::optional("black_rating", Integer),
    FieldDef::optional("black_result", Text),
    FieldDef::optional("accuracies", Json),
];

pub static PLAYERS_GAMES: ResourceDescriptor = ResourceDescriptor {
    name: "players_games",
    source: Source::Chess,
    description: "Games from the monthly archives within the configured period",
    strategy: Strategy::DateWindowed {
        endpoint: "/player/{{ entity }}/games/{{ year }}/{{ month }}",
    },
    schema: TableSchema::new(PLAYERS_GAMES_FIELDS),
    primary_key: &["url"],
    mapper: map_games,
};

fn map_games(body: &JsonValue, ctx: &MapContext) -> Result<Vec<JsonObject>> {
    object(body, "game archive")?;
    let archive_month = ctx
        .month
        .map_or(JsonValue::Null, |m| JsonValue::from(m.to_string()));

    Ok(items(body, "games")?
        .iter()
        .map(|game| {
            record([
                ("url", pick(game, "url")),
                ("username", ctx.entity_value()),
                ("archive_month", archive_month.clone()),
                ("uuid", pick(game, "uuid")),
                ("time_control", pick(game, "time_control")),
                ("time_class", pick(game, "time_class")),
                ("rules", pick(game, "rules")),
                ("rated", pick(game, "rated")),
                ("end_time", pick(game, "end_time")),
                ("eco", pick(game, "eco")),
                ("fen", pick(game, "fen")),
                ("pgn", pick(game, "pgn")),
                ("white_username", pick(game, "white.username")),
                ("white_rating", pick(game, "white.rating")),
                ("white_result", pick(game, "white.result")),
                ("black_username", pick(game, "black.username")),
                ("black_rating", pick(game, "black.rating")),
                ("black_result", pick(game, "black.result")),
                ("accuracies", pick(game, "accuracies")),
            ])
        })
        .collect())
}
