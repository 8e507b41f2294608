// CSV format detection as an ordered chain of header probes.
//
// Each probe answers "confidently this format" or "not this format". Exactly
// one confident answer is required; none or several is an error, never a
// guess.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::user_lineups::is_long_layout;
use super::{
    HeaderIndex, IngestError, CASH_ALIASES, NAME_ALIASES, SIM_EV_ALIASES, SIM_ROI_ALIASES,
    TAIL_ALIASES, TOP10_ALIASES,
};

/// The CSV shapes the ingest layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsvFormat {
    /// Optimizer export: one lineup per row with simulated outcome columns.
    OptimizerExport,
    /// User lineups, one lineup per row.
    UserLineupsWide,
    /// User lineups, one player per row grouped by a lineup key.
    UserLineupsLong,
    /// Player projections (a belief profile).
    Projections,
}

impl CsvFormat {
    pub fn label(&self) -> &'static str {
        match self {
            CsvFormat::OptimizerExport => "optimizer export",
            CsvFormat::UserLineupsWide => "user lineups (one per row)",
            CsvFormat::UserLineupsLong => "user lineups (one player per row)",
            CsvFormat::Projections => "projections",
        }
    }
}

impl fmt::Display for CsvFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub(crate) const PROJECTION_ALIASES: &[&str] = &["projection", "proj", "fpts", "points", "median"];

fn has_sim_columns(h: &HeaderIndex) -> bool {
    [SIM_EV_ALIASES, SIM_ROI_ALIASES, CASH_ALIASES, TOP10_ALIASES, TAIL_ALIASES]
        .iter()
        .any(|aliases| h.has(aliases))
}

fn probe_optimizer(h: &HeaderIndex) -> bool {
    h.lineup_columns().is_some() && has_sim_columns(h)
}

fn probe_user_wide(h: &HeaderIndex) -> bool {
    h.lineup_columns().is_some() && !has_sim_columns(h)
}

fn probe_user_long(h: &HeaderIndex) -> bool {
    h.lineup_columns().is_none() && is_long_layout(h)
}

fn probe_projections(h: &HeaderIndex) -> bool {
    h.lineup_columns().is_none() && h.has(NAME_ALIASES) && h.has(PROJECTION_ALIASES)
}

type Probe = fn(&HeaderIndex) -> bool;

const PROBES: [(CsvFormat, Probe); 4] = [
    (CsvFormat::OptimizerExport, probe_optimizer),
    (CsvFormat::UserLineupsWide, probe_user_wide),
    (CsvFormat::UserLineupsLong, probe_user_long),
    (CsvFormat::Projections, probe_projections),
];

/// Classify a CSV by its header row.
pub fn detect_csv_format(text: &str) -> Result<CsvFormat, IngestError> {
    let headers = HeaderIndex::from_text(text)?;
    if headers.is_blank() {
        return Err(IngestError::unrecognized("file has no header row"));
    }

    let matches: Vec<CsvFormat> = PROBES
        .iter()
        .filter(|(_, probe)| probe(&headers))
        .map(|(format, _)| *format)
        .collect();
    debug!("format probes matched {:?}", matches);

    match matches.as_slice() {
        [only] => Ok(*only),
        _ => Err(IngestError::AmbiguousFormat {
            candidates: matches,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_columns_with_sim_data_is_optimizer() {
        let csv = "PG,SG,SF,PF,C,G,F,UTIL,SimEV,SimROI,Cash%,Top10%\n";
        assert_eq!(detect_csv_format(csv).unwrap(), CsvFormat::OptimizerExport);
        let csv = "Set,P1,P2,P3,P4,P5,P6,P7,P8,EV\n";
        assert_eq!(detect_csv_format(csv).unwrap(), CsvFormat::OptimizerExport);
    }

    #[test]
    fn slot_columns_alone_are_user_lineups() {
        let csv = "Entry ID,Contest Name,PG,SG,SF,PF,C,G,F,UTIL\n";
        assert_eq!(detect_csv_format(csv).unwrap(), CsvFormat::UserLineupsWide);
    }

    #[test]
    fn grouped_player_rows_are_long_lineups() {
        let csv = "Lineup,Name,Team\n1,Jane Doe,BOS\n";
        assert_eq!(detect_csv_format(csv).unwrap(), CsvFormat::UserLineupsLong);
    }

    #[test]
    fn grouped_id_rows_are_long_lineups() {
        let csv = "Lineup,ID\n1,4471\n1,101\n";
        assert_eq!(detect_csv_format(csv).unwrap(), CsvFormat::UserLineupsLong);
    }

    #[test]
    fn projection_sheet_detected() {
        let csv = "Name,Team,Pos,Salary,Proj,Own%\n";
        assert_eq!(detect_csv_format(csv).unwrap(), CsvFormat::Projections);
    }

    #[test]
    fn grouped_rows_with_projections_are_ambiguous() {
        let csv = "Entry,Name,Team,FPTS\n";
        match detect_csv_format(csv) {
            Err(IngestError::AmbiguousFormat { candidates }) => {
                assert_eq!(
                    candidates,
                    vec![CsvFormat::UserLineupsLong, CsvFormat::Projections]
                );
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn unknown_headers_match_nothing() {
        match detect_csv_format("foo,bar,baz\n1,2,3\n") {
            Err(IngestError::AmbiguousFormat { candidates }) => assert!(candidates.is_empty()),
            other => panic!("expected no candidates, got {other:?}"),
        }
        assert!(matches!(
            detect_csv_format(""),
            Err(IngestError::UnrecognizedFormat { .. })
        ));
    }
}
