// Player identity resolution across sources with drifting identifier schemes.
//
// Priority is strict and first match wins:
// 1. exact identifier
// 2. case-insensitive name + team
// 3. case-insensitive name, only when the reference carries no team and the
//    name identifies exactly one pool player
//
// Keys shared by two distinct pool players are ambiguous and never resolve.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::{Lineup, Player, PlayerPool, PlayerRef, Warning};

/// Which rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Id,
    NameTeam,
    UniqueName,
}

fn name_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn team_key(team: &str) -> String {
    team.trim().to_uppercase()
}

/// Insert `idx` under `key`, marking the key ambiguous (`None`) when a
/// different player already claimed it.
fn insert_unique<K: std::hash::Hash + Eq>(map: &mut HashMap<K, Option<usize>>, key: K, idx: usize) {
    map.entry(key)
        .and_modify(|existing| *existing = None)
        .or_insert(Some(idx));
}

/// Lookup tables over one player pool. Built per call; nothing is retained
/// across uploads.
pub struct Reconciler<'a> {
    players: &'a [Player],
    by_id: HashMap<&'a str, usize>,
    by_name_team: HashMap<(String, String), Option<usize>>,
    by_name: HashMap<String, Option<usize>>,
}

impl<'a> Reconciler<'a> {
    pub fn new(pool: &'a PlayerPool) -> Self {
        let players = pool.players();
        let mut by_id: HashMap<&'a str, usize> = HashMap::with_capacity(players.len());
        let mut by_name_team = HashMap::with_capacity(players.len());
        let mut by_name = HashMap::with_capacity(players.len());

        for (idx, p) in players.iter().enumerate() {
            let id = p.id.trim();
            if !id.is_empty() {
                if by_id.contains_key(id) {
                    warn!("duplicate player id '{}' in pool, keeping first occurrence", id);
                } else {
                    by_id.insert(id, idx);
                }
            }
            let name = name_key(&p.name);
            if name.is_empty() {
                continue;
            }
            insert_unique(&mut by_name_team, (name.clone(), team_key(&p.team)), idx);
            insert_unique(&mut by_name, name, idx);
        }

        Reconciler {
            players,
            by_id,
            by_name_team,
            by_name,
        }
    }

    /// Resolve a single raw reference to at most one pool player.
    pub fn resolve(&self, r: &PlayerRef) -> Option<(&'a Player, MatchKind)> {
        if let Some(id) = r.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if let Some(&idx) = self.by_id.get(id) {
                return Some((&self.players[idx], MatchKind::Id));
            }
        }

        let name = name_key(r.name.as_deref()?);
        if name.is_empty() {
            return None;
        }
        match r.team.as_deref().map(team_key).filter(|t| !t.is_empty()) {
            Some(team) => self
                .by_name_team
                .get(&(name, team))
                .copied()
                .flatten()
                .map(|idx| (&self.players[idx], MatchKind::NameTeam)),
            None => self
                .by_name
                .get(&name)
                .copied()
                .flatten()
                .map(|idx| (&self.players[idx], MatchKind::UniqueName)),
        }
    }

    /// Re-resolve a lineup's refs and recompute its totals.
    ///
    /// Unresolved refs are dropped from `players` and counted as missing.
    pub fn resolve_lineup(&self, lineup: &mut Lineup) {
        let mut players = Vec::with_capacity(lineup.player_refs.len());
        let mut missing = 0;
        for r in &lineup.player_refs {
            match self.resolve(r) {
                Some((p, _)) => players.push(p.clone()),
                None => {
                    debug!("lineup {}: unresolved player '{}'", lineup.id, r.display());
                    missing += 1;
                }
            }
        }
        lineup.set_players(players, missing);
    }

    /// Find the pool player that corresponds to `player` from another pool:
    /// same id, else same name and team.
    pub fn find_counterpart(&self, player: &Player) -> Option<&'a Player> {
        let r = PlayerRef {
            id: Some(player.id.clone()),
            name: Some(player.name.clone()),
            team: Some(player.team.clone()),
        };
        match self.resolve(&r) {
            Some((p, MatchKind::Id | MatchKind::NameTeam)) => Some(p),
            _ => None,
        }
    }
}

/// Aggregate outcome of resolving a batch of lineups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub missing: usize,
    pub lineups_affected: usize,
    /// Refs were listed but not one resolved, across every lineup.
    pub nothing_mapped: bool,
}

impl ResolutionSummary {
    /// Warnings to surface for a lineup set with this outcome.
    pub fn warnings(&self, set: &str) -> Vec<Warning> {
        if self.nothing_mapped {
            return vec![Warning::UnmappedRoster {
                set: set.to_string(),
            }];
        }
        if self.missing > 0 {
            return vec![Warning::UnresolvedIdentifiers {
                set: set.to_string(),
                missing: self.missing,
                lineups: self.lineups_affected,
            }];
        }
        Vec::new()
    }
}

/// Summarize the resolution state of already-resolved lineups.
pub fn summarize<'l>(lineups: impl IntoIterator<Item = &'l Lineup>) -> ResolutionSummary {
    let mut summary = ResolutionSummary::default();
    let mut any_refs = false;
    let mut any_mapped = false;
    for lineup in lineups {
        if lineup.missing_count > 0 {
            summary.missing += lineup.missing_count;
            summary.lineups_affected += 1;
        }
        any_refs |= !lineup.player_refs.is_empty();
        any_mapped |= !lineup.players.is_empty();
    }
    summary.nothing_mapped = any_refs && !any_mapped;
    summary
}

/// Resolve every lineup against `pool` in place.
pub fn resolve_lineups(lineups: &mut [Lineup], pool: &PlayerPool) -> ResolutionSummary {
    let reconciler = Reconciler::new(pool);
    for lineup in lineups.iter_mut() {
        reconciler.resolve_lineup(lineup);
    }
    summarize(lineups.iter())
}

/// Re-key belief players onto reference ids where a counterpart exists, so
/// lineups built from reference ids resolve against the belief pool.
pub fn adopt_reference_ids(beliefs: Vec<Player>, reference: &PlayerPool) -> Vec<Player> {
    let reconciler = Reconciler::new(reference);
    beliefs
        .into_iter()
        .map(|mut p| {
            if let Some(counterpart) = reconciler.find_counterpart(&p) {
                if counterpart.id != p.id {
                    debug!("belief '{}' re-keyed {} -> {}", p.name, p.id, counterpart.id);
                    p.id = counterpart.id.clone();
                }
            }
            p
        })
        .collect()
}
