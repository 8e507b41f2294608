// Reference pack (pipeline JSON) parsing.
//
// The pack is the authoritative player list for a slate: one player per
// `players` row, ids preserved, plus optional embedded lineups, contest
// parameters, free-form metadata and a map of companion files.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{parse_number, IngestError};
use crate::contest::{ContestInput, PayoutCurve};
use crate::model::{checked_ownership, Lineup, Player, PlayerPool, PlayerRef, SimOutcomes};
use crate::reconcile::resolve_lineups;

/// Set tag for lineups that came with the reference pack.
pub const REFERENCE_SET: &str = "reference";

/// Key in `files` naming the optimizer sidecar CSV.
pub const SIDECAR_KEY: &str = "optimized_lineups";

/// Everything extracted from one pipeline JSON.
#[derive(Debug, Clone, Default)]
pub struct PipelinePack {
    pub players: PlayerPool,
    /// Embedded lineups, already resolved against `players`.
    pub lineups: Vec<Lineup>,
    pub meta: Option<Value>,
    pub diagnostics: Option<Value>,
    pub contest: Option<ContestInput>,
    /// Companion files, name to path relative to the pack.
    pub files: BTreeMap<String, String>,
}

impl PipelinePack {
    /// Relative location of the optimizer sidecar, if the pack names one.
    pub fn sidecar_path(&self) -> Option<&str> {
        self.files
            .get(SIDECAR_KEY)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Raw serde structs (private)
// ---------------------------------------------------------------------------

/// Ids and numbers arrive as either JSON strings or JSON numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose {
    Num(f64),
    Text(String),
}

impl Loose {
    fn as_id(&self) -> String {
        match self {
            Loose::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Loose::Num(n) => n.to_string(),
            Loose::Text(s) => s.trim().to_string(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Loose::Num(n) => Some(*n).filter(|v| v.is_finite()),
            Loose::Text(s) => parse_number(s),
        }
    }
}

fn number(v: &Option<Loose>) -> Option<f64> {
    v.as_ref().and_then(Loose::as_number)
}

#[derive(Debug, Deserialize)]
struct RawPackPlayer {
    id: Loose,
    name: String,
    #[serde(default)]
    team: String,
    #[serde(default, alias = "opp")]
    opponent: String,
    #[serde(default, alias = "pos")]
    position: String,
    #[serde(default)]
    salary: Option<Loose>,
    #[serde(default, alias = "proj", alias = "fpts")]
    projection: Option<Loose>,
    #[serde(default, alias = "own", alias = "ownership_pct")]
    ownership: Option<Loose>,
    #[serde(default, alias = "ceil")]
    ceiling: Option<Loose>,
    #[serde(default)]
    value: Option<Loose>,
}

#[derive(Debug, Deserialize)]
struct RawPackLineup {
    #[serde(alias = "playerIds", alias = "players")]
    player_ids: Vec<Loose>,
    #[serde(default, alias = "lineupId", alias = "id")]
    lineup_id: Option<Loose>,
    #[serde(default)]
    set: Option<String>,
    #[serde(default, alias = "simEV", alias = "ev")]
    sim_ev: Option<Loose>,
    #[serde(default, alias = "simROI", alias = "roi")]
    sim_roi: Option<Loose>,
    #[serde(default, alias = "cashPct")]
    cash_pct: Option<Loose>,
    #[serde(default, alias = "top10Pct")]
    top10_pct: Option<Loose>,
}

/// Contest block: the editable input plus a convenience paid fraction.
#[derive(Debug, Deserialize)]
struct RawPackContest {
    #[serde(flatten)]
    input: ContestInput,
    #[serde(default, alias = "paidPct")]
    paid_pct: Option<f64>,
    #[serde(default)]
    payout: Option<Value>,
}

fn malformed(reason: impl Into<String>) -> IngestError {
    IngestError::MalformedPipelinePayload {
        reason: reason.into(),
    }
}

/// First present key among `aliases`.
fn field<'a>(root: &'a serde_json::Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|k| root.get(*k)).filter(|v| !v.is_null())
}

fn player_from_raw(raw: RawPackPlayer) -> Player {
    let name = raw.name.trim().to_string();
    let ownership_raw = number(&raw.ownership);
    let ownership = checked_ownership(ownership_raw);
    if ownership_raw.is_some() && ownership.is_none() {
        warn!("'{}': ownership {:?} outside 0-100, dropped", name, ownership_raw);
    }
    let salary = number(&raw.salary).unwrap_or(0.0).max(0.0);
    Player {
        id: raw.id.as_id(),
        name,
        team: raw.team.trim().to_string(),
        opponent: raw.opponent.trim().to_string(),
        position: raw.position.trim().to_string(),
        salary: salary.round() as u32,
        projection: number(&raw.projection).unwrap_or(0.0),
        ownership,
        ceiling: number(&raw.ceiling),
        value: number(&raw.value),
    }
}

fn parse_players(value: &Value) -> Result<Vec<Player>, IngestError> {
    let rows = value
        .as_array()
        .ok_or_else(|| malformed("`players` must be an array"))?;
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            RawPackPlayer::deserialize(row)
                .map(player_from_raw)
                .map_err(|e| malformed(format!("players[{i}]: {e}")))
        })
        .collect()
}

fn parse_lineups(value: &Value) -> Result<Vec<Lineup>, IngestError> {
    let rows = value
        .as_array()
        .ok_or_else(|| malformed("`lineups` must be an array"))?;
    let mut lineups = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let raw = RawPackLineup::deserialize(row)
            .map_err(|e| malformed(format!("lineups[{i}]: {e}")))?;
        let refs = raw
            .player_ids
            .iter()
            .map(Loose::as_id)
            .filter(|id| !id.is_empty())
            .map(PlayerRef::by_id)
            .collect();
        let sim = SimOutcomes {
            sim_ev: number(&raw.sim_ev),
            sim_roi: number(&raw.sim_roi),
            cash_pct: number(&raw.cash_pct),
            top10_pct: number(&raw.top10_pct),
        };
        let set = raw
            .set
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(REFERENCE_SET);
        lineups.push(Lineup::new(
            set,
            i + 1,
            raw.lineup_id.as_ref().map(Loose::as_id),
            refs,
            sim,
        ));
    }
    Ok(lineups)
}

fn parse_contest(value: &Value) -> Result<ContestInput, IngestError> {
    let raw = RawPackContest::deserialize(value).map_err(|e| malformed(format!("contest: {e}")))?;
    let mut input = raw.input;
    match (raw.payout, raw.paid_pct) {
        (Some(payout), _) => {
            input.payout = PayoutCurve::deserialize(&payout)
                .map_err(|e| malformed(format!("contest.payout: {e}")))?;
        }
        (None, Some(pct)) if pct.is_finite() && pct > 0.0 => {
            // Accept both 0.22 and 22 for "22 % of the field is paid".
            let fraction = if pct > 1.0 { pct / 100.0 } else { pct };
            input.payout = PayoutCurve::TopFraction {
                fraction: fraction.min(1.0),
            };
        }
        _ => {}
    }
    Ok(input)
}

fn parse_files(value: &Value) -> BTreeMap<String, String> {
    let Some(map) = value.as_object() else {
        warn!("ignoring non-object `files` entry in pipeline JSON");
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

/// Parse a pipeline JSON document.
///
/// The root must be an object with a `players` array whose rows each carry
/// an `id` and a `name`. Everything else is optional. Any violation names
/// the offending field in `MalformedPipelinePayload`.
pub fn parse_pipeline(text: &str) -> Result<PipelinePack, IngestError> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    let root = root
        .as_object()
        .ok_or_else(|| malformed("root must be a JSON object"))?;

    let players_value = field(root, &["players", "referencePlayers", "reference_players"])
        .ok_or_else(|| malformed("missing `players`"))?;
    let players = PlayerPool::new(parse_players(players_value)?);

    let mut lineups = match field(root, &["lineups", "referenceLineups", "reference_lineups"]) {
        Some(v) => parse_lineups(v)?,
        None => Vec::new(),
    };
    let summary = resolve_lineups(&mut lineups, &players);
    if summary.missing > 0 {
        warn!(
            "{} embedded lineup player ids are not in the pack's player list",
            summary.missing
        );
    }

    let contest = field(root, &["contest", "contestInput", "contest_input"])
        .map(parse_contest)
        .transpose()?;
    let files = field(root, &["files"]).map(parse_files).unwrap_or_default();

    info!(
        "parsed pipeline pack: {} players, {} lineups",
        players.len(),
        lineups.len()
    );
    Ok(PipelinePack {
        players,
        lineups,
        meta: field(root, &["meta"]).cloned(),
        diagnostics: field(root, &["diagnostics"]).cloned(),
        contest,
        files,
    })
}
