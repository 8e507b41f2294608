// Canonical player/lineup records shared by every stage of the pipeline.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify::LineupSignals;
use crate::slots::SlotAssignment;

/// Number of players on a complete classic-format roster.
pub const ROSTER_SIZE: usize = 8;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Basketball positions a player can be eligible at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    PointGuard,
    ShootingGuard,
    SmallForward,
    PowerForward,
    Center,
}

impl Position {
    /// Parse a single primary position abbreviation ("PG", "sf", ...).
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PG" => Some(Position::PointGuard),
            "SG" => Some(Position::ShootingGuard),
            "SF" => Some(Position::SmallForward),
            "PF" => Some(Position::PowerForward),
            "C" => Some(Position::Center),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::PointGuard => "PG",
            Position::ShootingGuard => "SG",
            Position::SmallForward => "SF",
            Position::PowerForward => "PF",
            Position::Center => "C",
        }
    }

    pub fn is_guard(&self) -> bool {
        matches!(self, Position::PointGuard | Position::ShootingGuard)
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Position::SmallForward | Position::PowerForward)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// Expand a position designation into the concrete positions it covers.
///
/// Handles multi-eligible forms as sites export them: "PG/SG", "SF-PF",
/// "G" (PG/SG) and "F" (SF/PF). Unknown fragments are ignored, so an
/// unrecognized designation yields an empty list.
pub fn eligible_positions(designation: &str) -> Vec<Position> {
    let mut out: Vec<Position> = Vec::new();
    for part in designation.split(['/', ',', '-', '|']) {
        let part = part.trim().to_uppercase();
        let expanded: Vec<Position> = match part.as_str() {
            "G" => vec![Position::PointGuard, Position::ShootingGuard],
            "F" => vec![Position::SmallForward, Position::PowerForward],
            other => Position::from_str_pos(other).into_iter().collect(),
        };
        for pos in expanded {
            if !out.contains(&pos) {
                out.push(pos);
            }
        }
    }
    out.sort();
    out
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// A single player row from a reference pack or a belief profile.
///
/// Players are never patched in place: a newer upload supersedes the whole
/// pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub team: String,
    pub opponent: String,
    /// Position designation as exported, e.g. "PG/SG".
    pub position: String,
    pub salary: u32,
    pub projection: f64,
    /// Percent of the field rostering this player, 0-100.
    pub ownership: Option<f64>,
    pub ceiling: Option<f64>,
    /// Points per salary unit (typically per $1k).
    pub value: Option<f64>,
}

impl Player {
    pub fn eligible_positions(&self) -> Vec<Position> {
        eligible_positions(&self.position)
    }
}

/// Validate an ownership figure against the 0-100 percent range.
pub fn checked_ownership(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && (0.0..=100.0).contains(v))
}

/// An immutable pool of players. Shared between lineups and the session as
/// `Arc<PlayerPool>`; replacing beliefs means building a new pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerPool {
    players: Vec<Player>,
}

impl PlayerPool {
    pub fn new(players: Vec<Player>) -> Self {
        Self { players }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Player> {
        self.players.iter()
    }

    /// Number of players exported without a salary.
    pub fn missing_salary_count(&self) -> usize {
        self.players.iter().filter(|p| p.salary == 0).count()
    }

    pub fn into_players(self) -> Vec<Player> {
        self.players
    }
}

// ---------------------------------------------------------------------------
// Raw player references
// ---------------------------------------------------------------------------

/// One player identifier exactly as a source listed it, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerRef {
    pub id: Option<String>,
    pub name: Option<String>,
    pub team: Option<String>,
}

impl PlayerRef {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn by_name(name: impl Into<String>, team: Option<&str>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            team: team.map(str::to_string).filter(|t| !t.is_empty()),
        }
    }

    /// Parse a loosely formatted lineup cell.
    ///
    /// Accepts a bare id ("4471"), the site export form "Jane Doe (4471)",
    /// a name with team ("Jane Doe (BOS)") or a bare name. Blank cells
    /// yield `None`.
    pub fn parse_cell(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if cell.is_empty() {
            return None;
        }
        if is_numeric_id(cell) {
            return Some(Self::by_id(cell));
        }
        if let (Some(open), true) = (cell.rfind('('), cell.ends_with(')')) {
            let inner = cell[open + 1..cell.len() - 1].trim();
            let name = cell[..open].trim();
            if is_numeric_id(inner) {
                return Some(Self {
                    id: Some(inner.to_string()),
                    name: Some(name.to_string()).filter(|n| !n.is_empty()),
                    team: None,
                });
            }
            if !name.is_empty() && !inner.is_empty() {
                return Some(Self::by_name(name, Some(inner)));
            }
        }
        Some(Self::by_name(cell, None))
    }

    /// Short label for diagnostics and clipboard export.
    pub fn display(&self) -> String {
        match (&self.id, &self.name, &self.team) {
            (Some(id), _, _) => id.clone(),
            (None, Some(name), Some(team)) => format!("{name} ({team})"),
            (None, Some(name), None) => name.clone(),
            (None, None, _) => "?".to_string(),
        }
    }
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Lineups
// ---------------------------------------------------------------------------

/// A generated or user-supplied lineup.
///
/// `players` and the totals are derived from `player_refs` against whatever
/// pool is active and are recomputed, never edited. The simulated outcome
/// fields come from the optimizer export only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineup {
    /// Synthetic id, `"{set}-{n}"`.
    pub id: String,
    pub lineup_id_raw: Option<String>,
    pub set: String,
    pub player_refs: Vec<PlayerRef>,
    pub players: Vec<Player>,
    pub missing_count: usize,
    pub total_salary: u32,
    pub total_projection: f64,
    pub total_ownership: f64,
    pub total_ceiling: f64,
    pub sim_ev: Option<f64>,
    /// Percent units: 40.0 means +40 %.
    pub sim_roi: Option<f64>,
    pub cash_pct: Option<f64>,
    pub top10_pct: Option<f64>,
    pub slots: Option<SlotAssignment>,
    pub signals: LineupSignals,
}

/// Simulated outcome columns carried through from the optimizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimOutcomes {
    pub sim_ev: Option<f64>,
    pub sim_roi: Option<f64>,
    pub cash_pct: Option<f64>,
    pub top10_pct: Option<f64>,
}

impl Lineup {
    /// Build an unresolved lineup. Every ref counts as missing until the
    /// reconciler fills `players`.
    pub fn new(
        set: &str,
        ordinal: usize,
        lineup_id_raw: Option<String>,
        player_refs: Vec<PlayerRef>,
        sim: SimOutcomes,
    ) -> Self {
        let missing_count = player_refs.len();
        Lineup {
            id: format!("{set}-{ordinal}"),
            lineup_id_raw,
            set: set.to_string(),
            player_refs,
            players: Vec::new(),
            missing_count,
            total_salary: 0,
            total_projection: 0.0,
            total_ownership: 0.0,
            total_ceiling: 0.0,
            sim_ev: sim.sim_ev,
            sim_roi: sim.sim_roi,
            cash_pct: sim.cash_pct,
            top10_pct: sim.top10_pct,
            slots: None,
            signals: LineupSignals::default(),
        }
    }

    /// Replace the resolved players and recompute every sum over them.
    pub fn set_players(&mut self, players: Vec<Player>, missing_count: usize) {
        self.total_salary = players.iter().map(|p| p.salary).sum();
        self.total_projection = players.iter().map(|p| p.projection).sum();
        self.total_ownership = players.iter().filter_map(|p| p.ownership).sum();
        self.total_ceiling = players.iter().filter_map(|p| p.ceiling).sum();
        self.players = players;
        self.missing_count = missing_count;
    }

    /// Exactly eight resolved players and nothing unresolved.
    pub fn is_complete(&self) -> bool {
        self.players.len() == ROSTER_SIZE && self.missing_count == 0
    }

    /// Refs listed but none of them resolved.
    pub fn is_unmapped(&self) -> bool {
        !self.player_refs.is_empty() && self.players.is_empty()
    }

    /// Comma-joined raw ids, as pasted into a site's bulk-entry form.
    pub fn copyable_ids(&self) -> String {
        self.player_refs
            .iter()
            .map(PlayerRef::display)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn sim_outcomes(&self) -> SimOutcomes {
        SimOutcomes {
            sim_ev: self.sim_ev,
            sim_roi: self.sim_roi,
            cash_pct: self.cash_pct,
            top10_pct: self.top10_pct,
        }
    }
}

/// Distinct set tags in first-seen order, for filtering lineups by run.
pub fn lineup_sets(lineups: &[Lineup]) -> Vec<String> {
    let mut sets: Vec<String> = Vec::new();
    for lineup in lineups {
        if !lineup.set.is_empty() && !sets.contains(&lineup.set) {
            sets.push(lineup.set.clone());
        }
    }
    sets
}

// ---------------------------------------------------------------------------
// Slate summary
// ---------------------------------------------------------------------------

/// A single game on the slate, teams in alphabetical order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Game {
    pub away: String,
    pub home: String,
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.away, self.home)
    }
}

/// Derive the slate's games from team/opponent pairs in a pool.
///
/// Exports don't mark home/away consistently, so each pairing is keyed by
/// its sorted team codes.
pub fn derive_games(players: &[Player]) -> Vec<Game> {
    let mut games: BTreeSet<Game> = BTreeSet::new();
    for p in players {
        let team = p.team.trim().to_uppercase();
        let opp = p
            .opponent
            .trim()
            .trim_start_matches('@')
            .trim_start_matches("vs")
            .trim()
            .to_uppercase();
        if team.is_empty() || opp.is_empty() || team == opp {
            continue;
        }
        let (away, home) = if team < opp { (team, opp) } else { (opp, team) };
        games.insert(Game { away, home });
    }
    games.into_iter().collect()
}

/// Non-fatal conditions accumulated for the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    /// Some lineup refs could not be matched to the active pool.
    UnresolvedIdentifiers {
        set: String,
        missing: usize,
        lineups: usize,
    },
    /// Not a single player of an uploaded lineup set could be mapped.
    UnmappedRoster { set: String },
    /// The optional sidecar CSV could not be used.
    SidecarFetchFailed { location: String, reason: String },
    /// No reference pack could be found or parsed at startup.
    ReferencePackAutoLoadFailed { reason: String },
}

impl Warning {
    /// Whether this warning concerns player-identifier mapping and should be
    /// cleared when new lineups arrive.
    pub fn is_mapping(&self) -> bool {
        matches!(
            self,
            Warning::UnresolvedIdentifiers { .. } | Warning::UnmappedRoster { .. }
        )
    }

    pub fn is_auto_load(&self) -> bool {
        matches!(self, Warning::ReferencePackAutoLoadFailed { .. })
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnresolvedIdentifiers {
                set,
                missing,
                lineups,
            } => write!(
                f,
                "Player-identifier mapping partially failed for '{set}': {missing} player(s) unresolved across {lineups} lineup(s)"
            ),
            Warning::UnmappedRoster { set } => write!(
                f,
                "Roster mapping failed for '{set}': no players matched the active reference pack. Ensure the correct pipeline JSON is loaded."
            ),
            Warning::SidecarFetchFailed { location, reason } => {
                write!(
                    f,
                    "Sidecar lineups '{location}' unavailable ({reason}); using embedded lineups"
                )
            }
            Warning::ReferencePackAutoLoadFailed { reason } => {
                write!(f, "Reference pack failed to auto-load: {reason}")
            }
        }
    }
}

/// Counts shown alongside the lineup list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlateStats {
    pub total_players: usize,
    pub total_lineups: usize,
    pub missing_salary_count: usize,
    pub warnings: Vec<Warning>,
}
