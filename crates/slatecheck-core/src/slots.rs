// Roster slot assignment for the classic eight-slot basketball roster.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Player, Position, ROSTER_SIZE};

/// A fixed roster slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    PointGuard,
    ShootingGuard,
    SmallForward,
    PowerForward,
    Center,
    /// Guard-class slot: PG or SG.
    Guard,
    /// Forward-class slot: SF or PF.
    Forward,
    /// Catch-all slot: any player.
    Utility,
}

impl Slot {
    /// Every slot in display order.
    pub const ALL: [Slot; ROSTER_SIZE] = [
        Slot::PointGuard,
        Slot::ShootingGuard,
        Slot::SmallForward,
        Slot::PowerForward,
        Slot::Center,
        Slot::Guard,
        Slot::Forward,
        Slot::Utility,
    ];

    /// Parse a slot column header ("PG", "util", ...).
    pub fn from_str_slot(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PG" => Some(Slot::PointGuard),
            "SG" => Some(Slot::ShootingGuard),
            "SF" => Some(Slot::SmallForward),
            "PF" => Some(Slot::PowerForward),
            "C" => Some(Slot::Center),
            "G" => Some(Slot::Guard),
            "F" => Some(Slot::Forward),
            "UTIL" => Some(Slot::Utility),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Slot::PointGuard => "PG",
            Slot::ShootingGuard => "SG",
            Slot::SmallForward => "SF",
            Slot::PowerForward => "PF",
            Slot::Center => "C",
            Slot::Guard => "G",
            Slot::Forward => "F",
            Slot::Utility => "UTIL",
        }
    }

    /// Whether a player eligible at `positions` may fill this slot.
    pub fn accepts(&self, positions: &[Position]) -> bool {
        match self {
            Slot::PointGuard => positions.contains(&Position::PointGuard),
            Slot::ShootingGuard => positions.contains(&Position::ShootingGuard),
            Slot::SmallForward => positions.contains(&Position::SmallForward),
            Slot::PowerForward => positions.contains(&Position::PowerForward),
            Slot::Center => positions.contains(&Position::Center),
            Slot::Guard => positions.iter().any(Position::is_guard),
            Slot::Forward => positions.iter().any(Position::is_forward),
            Slot::Utility => true,
        }
    }

    /// Fill priority: dedicated slots, then guard/forward, then UTIL.
    fn tier(&self) -> u8 {
        match self {
            Slot::Guard | Slot::Forward => 1,
            Slot::Utility => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// Players mapped onto the eight slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAssignment {
    /// One entry per slot, in `Slot::ALL` order. `None` is an unmapped slot.
    pub slots: Vec<(Slot, Option<Player>)>,
    /// Players that could not be placed in any open slot.
    pub unplaced: Vec<Player>,
}

impl SlotAssignment {
    /// Every slot filled.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|(_, p)| p.is_some())
    }

    pub fn player_in(&self, slot: Slot) -> Option<&Player> {
        self.slots
            .iter()
            .find(|(s, _)| *s == slot)
            .and_then(|(_, p)| p.as_ref())
    }

    pub fn unmapped_slots(&self) -> Vec<Slot> {
        self.slots
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(s, _)| *s)
            .collect()
    }
}

/// Slot indices a player may fill, in the order they should be tried.
fn candidate_slots(positions: &[Position]) -> Vec<usize> {
    let mut candidates: Vec<usize> = (0..ROSTER_SIZE)
        .filter(|&i| Slot::ALL[i].accepts(positions))
        .collect();
    candidates.sort_by_key(|&i| Slot::ALL[i].tier());
    candidates
}

/// Depth-first search over player placements, most constrained player first.
struct Search {
    candidates: Vec<Vec<usize>>,
    order: Vec<usize>,
    taken: [Option<usize>; ROSTER_SIZE],
    best: [Option<usize>; ROSTER_SIZE],
    best_filled: usize,
}

impl Search {
    /// Returns true once a full assignment has been found.
    fn run(&mut self, depth: usize, filled: usize) -> bool {
        if filled > self.best_filled {
            self.best = self.taken;
            self.best_filled = filled;
        }
        if self.best_filled == ROSTER_SIZE {
            return true;
        }
        if depth == self.order.len() || filled + (self.order.len() - depth) <= self.best_filled {
            return false;
        }

        let player = self.order[depth];
        for k in 0..self.candidates[player].len() {
            let slot = self.candidates[player][k];
            if self.taken[slot].is_some() {
                continue;
            }
            self.taken[slot] = Some(player);
            if self.run(depth + 1, filled + 1) {
                return true;
            }
            self.taken[slot] = None;
        }

        // Leave this player out; only useful for infeasible rosters.
        self.run(depth + 1, filled)
    }
}

/// Map exactly eight players onto the eight roster slots.
///
/// Returns `None` for any other roster size. When the roster is positionally
/// infeasible the best partial mapping is returned, with the leftover slots
/// unmapped and the leftover players in `unplaced`.
pub fn assign_slots(players: &[Player]) -> Option<SlotAssignment> {
    if players.len() != ROSTER_SIZE {
        return None;
    }

    let candidates: Vec<Vec<usize>> = players
        .iter()
        .map(|p| candidate_slots(&p.eligible_positions()))
        .collect();
    let mut order: Vec<usize> = (0..players.len()).collect();
    order.sort_by_key(|&i| candidates[i].len());

    let mut search = Search {
        candidates,
        order,
        taken: [None; ROSTER_SIZE],
        best: [None; ROSTER_SIZE],
        best_filled: 0,
    };
    search.run(0, 0);

    let mut placed = [false; ROSTER_SIZE];
    let slots = Slot::ALL
        .iter()
        .zip(search.best.iter())
        .map(|(slot, &occupant)| {
            let player = occupant.map(|idx| {
                placed[idx] = true;
                players[idx].clone()
            });
            (*slot, player)
        })
        .collect();
    let unplaced = players
        .iter()
        .enumerate()
        .filter(|(i, _)| !placed[*i])
        .map(|(_, p)| p.clone())
        .collect();

    Some(SlotAssignment { slots, unplaced })
}
