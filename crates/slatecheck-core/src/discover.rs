// Reference pack discovery: find today's pipeline JSON in the pack
// directory, falling back to the bundled default and then the newest pack.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

/// Pack name tried when no pack exists for the current date.
pub const DEFAULT_PACK_NAME: &str = "pipeline_2025-12-20.json";

const PACK_PREFIX: &str = "pipeline_";
const PACK_SUFFIX: &str = ".json";

/// File name of the pack for `date`, e.g. `pipeline_2025-12-20.json`.
pub fn pack_name_for(date: NaiveDate) -> String {
    format!("{PACK_PREFIX}{}{PACK_SUFFIX}", date.format("%Y-%m-%d"))
}

/// Locate the pack to auto-load from `dir`.
///
/// Order: the pack for `today`, then [`DEFAULT_PACK_NAME`], then the
/// lexically greatest `pipeline_*.json` (dated names sort chronologically).
/// Returns a human-readable reason when nothing is found.
pub fn discover_pack(dir: &Path, today: NaiveDate) -> Result<PathBuf, String> {
    for name in [pack_name_for(today), DEFAULT_PACK_NAME.to_string()] {
        let candidate = dir.join(&name);
        if candidate.is_file() {
            debug!("discovered reference pack {}", candidate.display());
            return Ok(candidate);
        }
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| format!("cannot read pack directory {}: {e}", dir.display()))?;
    let newest = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PACK_PREFIX) && n.ends_with(PACK_SUFFIX))
        })
        .max();

    newest.ok_or_else(|| {
        format!(
            "no {} or {PACK_PREFIX}*{PACK_SUFFIX} found in {}",
            pack_name_for(today),
            dir.display()
        )
    })
}
