// Source parsers: one module per raw export format, plus format detection.
//
// Every parser is a pure function of decoded text (and, for optimizer
// exports, the reference pool). None of them read or write session state.

pub mod detect;
pub mod optimizer;
pub mod pipeline;
pub mod projections;
pub mod user_lineups;

use csv::StringRecord;

use crate::slots::Slot;

pub use detect::{detect_csv_format, CsvFormat};
pub use optimizer::parse_optimizer_lineups;
pub use pipeline::{parse_pipeline, PipelinePack};
pub use projections::parse_projections;
pub use user_lineups::parse_user_lineups;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed pipeline payload: {reason}")]
    MalformedPipelinePayload { reason: String },

    #[error(
        "reference pack not loaded; load pipeline_YYYY-MM-DD.json first so numeric player ids map to players"
    )]
    ReferencePackRequired,

    #[error("cannot tell what kind of CSV this is (candidates: {})", candidates_label(.candidates))]
    AmbiguousFormat { candidates: Vec<CsvFormat> },

    #[error("unrecognized file format: {reason}")]
    UnrecognizedFormat { reason: String },

    #[error("expected {expected} but the file looks like {found}")]
    UnexpectedFormat {
        expected: &'static str,
        found: CsvFormat,
    },

    #[error("projections file contained no usable players")]
    EmptyProjections,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn candidates_label(candidates: &[CsvFormat]) -> String {
    if candidates.is_empty() {
        return "none".to_string();
    }
    candidates
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ")
}

impl IngestError {
    /// True for an ambiguity between two or more recognized shapes, as
    /// opposed to a header that matched nothing.
    pub fn has_candidates(&self) -> bool {
        matches!(self, IngestError::AmbiguousFormat { candidates } if !candidates.is_empty())
    }

    pub(crate) fn unrecognized(reason: impl Into<String>) -> Self {
        IngestError::UnrecognizedFormat {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared CSV helpers
// ---------------------------------------------------------------------------

/// Normalize a header for matching: lowercase ASCII alphanumerics only, so
/// "Own %", "own_pct" and "OWN%" compare on their letters.
pub(crate) fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Parse a spreadsheet-formatted number: tolerates `$`, `%`, thousands
/// separators and surrounding whitespace. Blank or non-finite is `None`.
pub(crate) fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '%' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes())
}

/// Normalized header row with alias lookup.
#[derive(Debug, Clone)]
pub(crate) struct HeaderIndex {
    keys: Vec<String>,
}

impl HeaderIndex {
    pub(crate) fn new(headers: &StringRecord) -> Self {
        HeaderIndex {
            keys: headers.iter().map(header_key).collect(),
        }
    }

    pub(crate) fn from_text(text: &str) -> Result<Self, IngestError> {
        let mut reader = csv_reader(text);
        let headers = reader.headers()?;
        Ok(Self::new(headers))
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.keys.iter().all(String::is_empty)
    }

    /// Column of the first alias present, trying aliases in order.
    pub(crate) fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.keys.iter().position(|k| k == alias))
    }

    pub(crate) fn has(&self, aliases: &[&str]) -> bool {
        self.find(aliases).is_some()
    }

    /// Player columns of a one-lineup-per-row export, in roster order.
    ///
    /// Slot-named columns win when both PG and UTIL are present; otherwise
    /// numbered `P1..P8` / `Player1..Player8` columns, which must start at 1.
    pub(crate) fn lineup_columns(&self) -> Option<Vec<usize>> {
        let slot_cols: Vec<usize> = Slot::ALL
            .iter()
            .filter_map(|s| self.find(&[header_key(s.display_str()).as_str()]))
            .collect();
        if self.has(&["pg"]) && self.has(&["util"]) {
            return Some(slot_cols);
        }
        for prefix in ["p", "player"] {
            let cols: Vec<usize> = (1..=crate::model::ROSTER_SIZE)
                .filter_map(|n| self.find(&[format!("{prefix}{n}").as_str()]))
                .collect();
            if self.has(&[format!("{prefix}1").as_str()]) {
                return Some(cols);
            }
        }
        None
    }
}

/// Sim-outcome column aliases shared by optimizer detection and parsing.
pub(crate) const SIM_EV_ALIASES: &[&str] = &["simev", "ev", "avgev"];
pub(crate) const SIM_ROI_ALIASES: &[&str] = &["simroi", "roi", "avgroi"];
pub(crate) const CASH_ALIASES: &[&str] = &["cash", "cashpct", "cashrate"];
pub(crate) const TOP10_ALIASES: &[&str] = &["top10", "top10pct"];
pub(crate) const TAIL_ALIASES: &[&str] = &["tailscore"];

/// Grouping column of a one-player-per-row lineup file.
pub(crate) const GROUP_ALIASES: &[&str] =
    &["lineup", "lineupid", "entry", "entryid", "lineupnumber"];
pub(crate) const NAME_ALIASES: &[&str] = &["name", "player", "playername"];

pub(crate) fn cell(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
