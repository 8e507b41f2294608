// Display recomputation: join lineups, the active pool and contest economics
// into the derived fields the caller renders.

use tracing::debug;

use crate::classify::{classify_lineup, Thresholds};
use crate::contest::ContestState;
use crate::model::{Lineup, PlayerPool};
use crate::reconcile::{resolve_lineups, ResolutionSummary};
use crate::slots::assign_slots;

/// Re-resolve, re-total, re-slot and re-classify every lineup against
/// `pool`. Simulated outcome fields pass through untouched.
///
/// Deterministic: the same inputs produce identical output.
pub fn recompute(
    lineups: &[Lineup],
    contest: &ContestState,
    pool: &PlayerPool,
    thresholds: &Thresholds,
) -> Vec<Lineup> {
    recompute_with_summary(lineups, contest, pool, thresholds).0
}

/// [`recompute`], also returning how resolution went.
pub fn recompute_with_summary(
    lineups: &[Lineup],
    contest: &ContestState,
    pool: &PlayerPool,
    thresholds: &Thresholds,
) -> (Vec<Lineup>, ResolutionSummary) {
    let mut out = lineups.to_vec();
    let summary = resolve_lineups(&mut out, pool);
    for lineup in &mut out {
        lineup.slots = if lineup.missing_count == 0 {
            assign_slots(&lineup.players)
        } else {
            None
        };
        lineup.signals = classify_lineup(lineup, contest, thresholds);
    }
    debug!(
        "recomputed {} lineups ({} unresolved refs)",
        out.len(),
        summary.missing
    );
    (out, summary)
}
