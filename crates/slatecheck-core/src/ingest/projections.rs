// Projection sheet parsing into a replacement player pool (a belief
// profile).
//
// Header spellings vary by site and tool, so the header row is rewritten to
// canonical field names before rows are deserialized.

use csv::StringRecord;
use serde::Deserialize;
use tracing::{info, warn};

use super::detect::PROJECTION_ALIASES;
use super::{csv_reader, header_key, parse_number, IngestError, NAME_ALIASES};
use crate::model::{checked_ownership, Player, PlayerPool};

/// Canonical field name and the normalized header spellings that map to it.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("name", NAME_ALIASES),
    ("id", &["id", "playerid", "dkid", "dkplayerid"]),
    ("team", &["team", "tm", "teamabbrev"]),
    ("opponent", &["opp", "opponent", "vs"]),
    ("position", &["pos", "position", "rosterposition"]),
    ("salary", &["salary", "sal"]),
    ("projection", PROJECTION_ALIASES),
    ("ownership", &["ownership", "own", "ownpct", "pown", "projown"]),
    ("ceiling", &["ceiling", "ceil"]),
    ("value", &["value", "val"]),
];

/// One projection row after header canonicalization. Numbers stay text here
/// so spreadsheet formatting can be cleaned before parsing.
#[derive(Debug, Deserialize)]
struct RawProjectionRow {
    name: Option<String>,
    id: Option<String>,
    team: Option<String>,
    opponent: Option<String>,
    position: Option<String>,
    salary: Option<String>,
    projection: Option<String>,
    ownership: Option<String>,
    ceiling: Option<String>,
    value: Option<String>,
}

/// Rewrite headers to canonical names. Only the first column claiming a
/// field keeps it; later duplicates and unknown columns keep their own
/// normalized spelling and are ignored on deserialize.
fn canonical_headers(headers: &StringRecord) -> StringRecord {
    let mut claimed: Vec<&str> = Vec::new();
    headers
        .iter()
        .map(|h| {
            let key = header_key(h);
            let field = FIELD_ALIASES
                .iter()
                .find(|(_, aliases)| aliases.contains(&key.as_str()))
                .map(|(field, _)| *field);
            match field {
                Some(field) if !claimed.contains(&field) => {
                    claimed.push(field);
                    field.to_string()
                }
                _ => format!("_{key}"),
            }
        })
        .collect()
}

/// Parse an optional numeric cell. `Err` means present but unparseable.
fn number_cell(raw: Option<&str>) -> Result<Option<f64>, ()> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_number(s).map(Some).ok_or(()),
    }
}

fn trimmed(raw: Option<String>) -> String {
    raw.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn player_from_row(raw: RawProjectionRow) -> Option<Player> {
    let name = trimmed(raw.name);
    if name.is_empty() {
        warn!("skipping projection row without a player name");
        return None;
    }
    let Ok(salary) = number_cell(raw.salary.as_deref()) else {
        warn!("skipping '{}': unparseable salary", name);
        return None;
    };
    let Ok(projection) = number_cell(raw.projection.as_deref()) else {
        warn!("skipping '{}': unparseable projection", name);
        return None;
    };
    let salary = salary.unwrap_or(0.0);
    if salary < 0.0 {
        warn!("skipping '{}': negative salary {}", name, salary);
        return None;
    }

    let ownership_raw = number_cell(raw.ownership.as_deref()).unwrap_or(None);
    let ownership = checked_ownership(ownership_raw);
    if ownership_raw.is_some() && ownership.is_none() {
        warn!("'{}': ownership {:?} outside 0-100, dropped", name, ownership_raw);
    }

    let team = trimmed(raw.team);
    let id = match trimmed(raw.id) {
        id if !id.is_empty() => id,
        _ => format!("{}|{}", name.to_lowercase(), team),
    };

    Some(Player {
        id,
        name,
        team,
        opponent: trimmed(raw.opponent),
        position: trimmed(raw.position),
        salary: salary.round() as u32,
        projection: projection.unwrap_or(0.0),
        ownership,
        ceiling: number_cell(raw.ceiling.as_deref()).unwrap_or(None),
        value: number_cell(raw.value.as_deref()).unwrap_or(None),
    })
}

/// Parse a projections CSV into a full replacement pool.
///
/// Rows lacking a name or carrying an unparseable salary or projection are
/// skipped with a warning. Ids missing from the file are synthesized as
/// `name|team`.
pub fn parse_projections(text: &str) -> Result<PlayerPool, IngestError> {
    let mut reader = csv_reader(text);
    let headers = canonical_headers(reader.headers()?);
    if !headers.iter().any(|h| h == "name") {
        return Err(IngestError::unrecognized(
            "projections file needs a Name column",
        ));
    }
    reader.set_headers(headers);

    let mut players = Vec::new();
    for result in reader.deserialize::<RawProjectionRow>() {
        match result {
            Ok(raw) => {
                if let Some(player) = player_from_row(raw) {
                    players.push(player);
                }
            }
            Err(e) => {
                warn!("skipping malformed projection row: {}", e);
            }
        }
    }

    if players.is_empty() {
        return Err(IngestError::EmptyProjections);
    }
    info!("parsed {} projected players", players.len());
    Ok(PlayerPool::new(players))
}
