// Optimizer lineup exports: one lineup per row, player cells carrying site
// ids, plus simulated outcome columns.

use tracing::{info, warn};

use super::{
    cell, csv_reader, parse_number, HeaderIndex, IngestError, CASH_ALIASES, SIM_EV_ALIASES,
    SIM_ROI_ALIASES, TOP10_ALIASES,
};
use crate::model::{Lineup, PlayerPool, PlayerRef, SimOutcomes};
use crate::reconcile::resolve_lineups;

const SET_ALIASES: &[&str] = &["set", "run", "build"];
const LINEUP_ID_ALIASES: &[&str] = &["lineupid", "lineup", "entryid", "id"];

/// Parse an optimizer export and resolve it against the reference pool.
///
/// Optimizer cells carry site ids that only the reference pack can map, so
/// an empty `reference` is rejected before any row is read. Rows without a
/// set column are tagged `default_set`.
pub fn parse_optimizer_lineups(
    text: &str,
    reference: &PlayerPool,
    default_set: &str,
) -> Result<Vec<Lineup>, IngestError> {
    if reference.is_empty() {
        return Err(IngestError::ReferencePackRequired);
    }

    let mut reader = csv_reader(text);
    let headers = HeaderIndex::new(reader.headers()?);
    let Some(columns) = headers.lineup_columns() else {
        return Err(IngestError::unrecognized(
            "optimizer export needs PG..UTIL or P1..P8 columns",
        ));
    };

    let ev_col = headers.find(SIM_EV_ALIASES);
    let roi_col = headers.find(SIM_ROI_ALIASES);
    let cash_col = headers.find(CASH_ALIASES);
    let top10_col = headers.find(TOP10_ALIASES);
    let set_col = headers.find(SET_ALIASES);
    let id_col = headers.find(LINEUP_ID_ALIASES).filter(|c| !columns.contains(c));

    let mut lineups = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed optimizer row {}: {}", row + 1, e);
                continue;
            }
        };
        let refs: Vec<PlayerRef> = columns
            .iter()
            .filter_map(|&c| record.get(c))
            .filter_map(PlayerRef::parse_cell)
            .collect();
        if refs.is_empty() {
            warn!("skipping optimizer row {}: no players listed", row + 1);
            continue;
        }
        let number = |col| cell(&record, col).and_then(parse_number);
        let sim = SimOutcomes {
            sim_ev: number(ev_col),
            sim_roi: number(roi_col),
            cash_pct: number(cash_col),
            top10_pct: number(top10_col),
        };
        let set = cell(&record, set_col).unwrap_or(default_set);
        lineups.push(Lineup::new(
            set,
            lineups.len() + 1,
            cell(&record, id_col).map(str::to_string),
            refs,
            sim,
        ));
    }

    let summary = resolve_lineups(&mut lineups, reference);
    if summary.missing > 0 {
        warn!(
            "{} optimizer player ids did not match the reference pack ({} lineups)",
            summary.missing, summary.lineups_affected
        );
    }
    info!("parsed {} optimizer lineups", lineups.len());
    Ok(lineups)
}
