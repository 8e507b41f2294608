// User-supplied lineup files. Produces raw player refs only; resolution
// against a pool happens later in the reconciler.

use csv::StringRecord;
use tracing::{info, warn};

use super::{cell, csv_reader, HeaderIndex, IngestError, GROUP_ALIASES, NAME_ALIASES};
use crate::model::{Lineup, PlayerRef, SimOutcomes};

const ENTRY_ALIASES: &[&str] = &["entryid", "lineupid", "lineup", "entry", "id"];
const SET_ALIASES: &[&str] = &["set", "group", "tag"];
const TEAM_ALIASES: &[&str] = &["team", "tm", "teamabbrev"];
const ID_ALIASES: &[&str] = &["id", "playerid", "dkid", "dkplayerid"];

/// One player per row: a grouping column plus a name or id column.
pub(crate) fn is_long_layout(h: &HeaderIndex) -> bool {
    h.has(GROUP_ALIASES) && (h.has(NAME_ALIASES) || h.has(ID_ALIASES))
}

/// Parse a user lineup CSV in either the wide (one lineup per row) or long
/// (one player per row) shape. Lineups without a set column are tagged
/// `default_set`.
pub fn parse_user_lineups(text: &str, default_set: &str) -> Result<Vec<Lineup>, IngestError> {
    let mut reader = csv_reader(text);
    let headers = HeaderIndex::new(reader.headers()?);
    let records: Vec<StringRecord> = reader
        .records()
        .filter_map(|r| match r {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("skipping malformed lineup row: {}", e);
                None
            }
        })
        .collect();

    let lineups = if let Some(columns) = headers.lineup_columns() {
        parse_wide(&headers, &columns, &records, default_set)
    } else if is_long_layout(&headers) {
        parse_long(&headers, &records, default_set)
    } else {
        return Err(IngestError::unrecognized(
            "lineup file needs slot, P1..P8 or Lineup + Name/ID columns",
        ));
    };
    info!("parsed {} user lineups", lineups.len());
    Ok(lineups)
}

fn parse_wide(
    headers: &HeaderIndex,
    columns: &[usize],
    records: &[StringRecord],
    default_set: &str,
) -> Vec<Lineup> {
    // Player columns never double as the entry id.
    let entry_col = headers.find(ENTRY_ALIASES).filter(|c| !columns.contains(c));
    let set_col = headers.find(SET_ALIASES);

    let mut lineups = Vec::new();
    for (row, record) in records.iter().enumerate() {
        let refs: Vec<PlayerRef> = columns
            .iter()
            .filter_map(|&c| record.get(c))
            .filter_map(PlayerRef::parse_cell)
            .collect();
        if refs.is_empty() {
            warn!("skipping lineup row {}: no players listed", row + 1);
            continue;
        }
        let set = cell(record, set_col).unwrap_or(default_set);
        lineups.push(Lineup::new(
            set,
            lineups.len() + 1,
            cell(record, entry_col).map(str::to_string),
            refs,
            SimOutcomes::default(),
        ));
    }
    lineups
}

fn parse_long(headers: &HeaderIndex, records: &[StringRecord], default_set: &str) -> Vec<Lineup> {
    let group_col = headers.find(GROUP_ALIASES);
    let name_col = headers.find(NAME_ALIASES);
    let team_col = headers.find(TEAM_ALIASES);
    let id_col = headers.find(ID_ALIASES).filter(|c| Some(*c) != group_col);
    let set_col = headers.find(SET_ALIASES);

    // (key, set, refs) for each run of consecutive rows sharing a key
    let mut groups: Vec<(String, String, Vec<PlayerRef>)> = Vec::new();
    for (row, record) in records.iter().enumerate() {
        let Some(key) = cell(record, group_col) else {
            warn!("skipping player row {}: no lineup key", row + 1);
            continue;
        };
        let player_ref = PlayerRef {
            id: cell(record, id_col).map(str::to_string),
            name: cell(record, name_col).map(str::to_string),
            team: cell(record, team_col).map(str::to_string),
        };
        if player_ref.id.is_none() && player_ref.name.is_none() {
            warn!("skipping player row {}: no name or id", row + 1);
            continue;
        }
        match groups.last_mut() {
            Some((last_key, _, refs)) if *last_key == key => refs.push(player_ref),
            _ => {
                let set = cell(record, set_col).unwrap_or(default_set).to_string();
                groups.push((key.to_string(), set, vec![player_ref]));
            }
        }
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(i, (key, set, refs))| {
            Lineup::new(&set, i + 1, Some(key), refs, SimOutcomes::default())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_rows_with_mixed_cell_styles() {
        let csv = "\
Entry ID,PG,SG,SF,PF,C,G,F,UTIL
e-1,Jane Doe (4471),102,103,104,105,106,107,108
e-2,Jane Doe,,,,,,,
,,,,,,,,
";
        let lineups = parse_user_lineups(csv, "upload").unwrap();
        assert_eq!(lineups.len(), 2);
        assert_eq!(lineups[0].id, "upload-1");
        assert_eq!(lineups[0].lineup_id_raw.as_deref(), Some("e-1"));
        assert_eq!(lineups[0].player_refs.len(), 8);
        assert_eq!(lineups[0].player_refs[0].id.as_deref(), Some("4471"));
        assert_eq!(lineups[1].player_refs, vec![PlayerRef::by_name("Jane Doe", None)]);
        assert_eq!(lineups[1].missing_count, 1);
    }

    #[test]
    fn numbered_player_columns() {
        let csv = "Player1,Player2,Player3\nA (BOS),B (NYK),C\n";
        let lineups = parse_user_lineups(csv, "mine").unwrap();
        assert_eq!(lineups.len(), 1);
        assert_eq!(
            lineups[0].player_refs[1],
            PlayerRef::by_name("B", Some("NYK"))
        );
    }

    #[test]
    fn long_rows_group_consecutively() {
        let csv = "\
Lineup,Name,Team
1,Jane Doe,BOS
1,John Roe,NYK
2,Jane Doe,BOS
,Orphan,LAL
1,Late Add,DEN
";
        let lineups = parse_user_lineups(csv, "upload").unwrap();
        assert_eq!(lineups.len(), 3);
        assert_eq!(lineups[0].player_refs.len(), 2);
        assert_eq!(lineups[0].lineup_id_raw.as_deref(), Some("1"));
        assert_eq!(
            lineups[0].player_refs[1],
            PlayerRef::by_name("John Roe", Some("NYK"))
        );
        assert_eq!(lineups[1].player_refs.len(), 1);
        // a key reappearing later starts a new lineup
        assert_eq!(lineups[2].lineup_id_raw.as_deref(), Some("1"));
        assert_eq!(lineups[2].id, "upload-3");
    }

    #[test]
    fn long_rows_keep_ids() {
        let csv = "Entry,Name,ID\nA,Jane Doe,4471\n";
        let lineups = parse_user_lineups(csv, "upload").unwrap();
        assert_eq!(lineups[0].player_refs[0].id.as_deref(), Some("4471"));
        assert_eq!(lineups[0].player_refs[0].name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn set_column_overrides_default() {
        let csv = "Set,P1,P2\ncash,1,2\n";
        let lineups = parse_user_lineups(csv, "upload").unwrap();
        assert_eq!(lineups[0].set, "cash");
        assert_eq!(lineups[0].id, "cash-1");
    }

    #[test]
    fn unknown_shape_is_rejected() {
        assert!(matches!(
            parse_user_lineups("foo,bar\n1,2\n", "upload"),
            Err(IngestError::UnrecognizedFormat { .. })
        ));
    }
}
