// Session context: the versioned pool arena, current lineups, contest state
// and warnings, plus the stale-load guard for asynchronous reference loads.
//
// Every upload either replaces its slice of state wholesale or fails and
// leaves the session untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classify::{classify_lineup, Thresholds};
use crate::contest::{ContestInput, ContestMemo, ContestState};
use crate::ingest::pipeline::REFERENCE_SET;
use crate::ingest::{
    detect_csv_format, parse_optimizer_lineups, parse_pipeline, parse_projections,
    parse_user_lineups, CsvFormat, IngestError, PipelinePack,
};
use crate::model::{
    derive_games, lineup_sets, Game, Lineup, Player, PlayerPool, SlateStats, Warning,
};
use crate::reconcile::{adopt_reference_ids, summarize};
use crate::recompute::recompute;
use crate::store::{BeliefProfile, PersistedPreferences};

/// Set tag for lineups uploaded by the user.
pub const UPLOAD_SET: &str = "upload";

// ---------------------------------------------------------------------------
// Pool arena
// ---------------------------------------------------------------------------

/// Identifies one immutable pool snapshot. Versions only ever increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolVersion(u64);

impl PoolVersion {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Immutable player pools indexed by version. Pools are never edited; a new
/// upload inserts a new version.
#[derive(Debug, Default)]
pub struct PoolArena {
    pools: BTreeMap<PoolVersion, Arc<PlayerPool>>,
    next: u64,
}

impl PoolArena {
    pub fn insert(&mut self, pool: PlayerPool) -> PoolVersion {
        self.next += 1;
        let version = PoolVersion(self.next);
        self.pools.insert(version, Arc::new(pool));
        version
    }

    pub fn get(&self, version: PoolVersion) -> Option<Arc<PlayerPool>> {
        self.pools.get(&version).cloned()
    }

    pub fn latest_version(&self) -> Option<PoolVersion> {
        self.pools.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Drop every snapshot not listed in `keep`.
    pub fn retain(&mut self, keep: &[PoolVersion]) {
        self.pools.retain(|v, _| keep.contains(v));
    }
}

// ---------------------------------------------------------------------------
// Load tickets
// ---------------------------------------------------------------------------

/// Issued when an asynchronous load starts; committing it succeeds only if
/// no newer load or upload happened in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load superseded this one; nothing changed.
    Stale,
}

/// What happened to the optimizer sidecar during a reference load.
#[derive(Debug, Clone, PartialEq)]
pub enum SidecarStatus {
    /// The pack names no sidecar.
    NotListed,
    /// Sidecar loading is disabled.
    Skipped,
    /// The sidecar replaced the embedded lineups.
    Loaded { lineups: usize },
    /// The sidecar was unusable; embedded lineups were kept.
    FellBack { reason: String },
}

/// A fully prepared reference load, ready to commit.
#[derive(Debug, Clone)]
pub struct ReferenceLoad {
    pub pack: PipelinePack,
    /// Where the pack came from (path or URL).
    pub location: String,
    /// Lineups to show: the sidecar's when it loaded, else the pack's own.
    pub lineups: Vec<Lineup>,
    pub sidecar: SidecarStatus,
}

impl ReferenceLoad {
    /// A load with no sidecar involvement.
    pub fn from_pack(pack: PipelinePack, location: impl Into<String>) -> Self {
        let sidecar = if pack.sidecar_path().is_some() {
            SidecarStatus::Skipped
        } else {
            SidecarStatus::NotListed
        };
        ReferenceLoad {
            lineups: pack.lineups.clone(),
            pack,
            location: location.into(),
            sidecar,
        }
    }
}

/// Provenance of the loaded reference pack.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceInfo {
    pub location: String,
    pub meta: Option<Value>,
    pub diagnostics: Option<Value>,
    pub sidecar: SidecarStatus,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Explicit application context. Owns every pool; parsers and the
/// reconciler only borrow.
#[derive(Debug)]
pub struct Session {
    arena: PoolArena,
    reference: Option<PoolVersion>,
    beliefs: Option<(String, PoolVersion)>,
    reference_info: Option<ReferenceInfo>,
    /// Lineups as ingested, before resolution against the active pool.
    base_lineups: Vec<Lineup>,
    /// `base_lineups` recomputed against the active pool and contest.
    lineups: Vec<Lineup>,
    contest_input: ContestInput,
    contest: ContestMemo,
    thresholds: Thresholds,
    warnings: Vec<Warning>,
    generation: u64,
}

impl Session {
    pub fn new(contest: ContestInput, thresholds: Thresholds) -> Self {
        Session {
            arena: PoolArena::default(),
            reference: None,
            beliefs: None,
            reference_info: None,
            base_lineups: Vec::new(),
            lineups: Vec::new(),
            contest_input: contest,
            contest: ContestMemo::default(),
            thresholds,
            warnings: Vec::new(),
            generation: 0,
        }
    }

    // -- pools ---------------------------------------------------------------

    pub fn reference_pool(&self) -> Option<Arc<PlayerPool>> {
        self.reference.and_then(|v| self.arena.get(v))
    }

    pub fn belief_pool(&self) -> Option<Arc<PlayerPool>> {
        self.beliefs.as_ref().and_then(|(_, v)| self.arena.get(*v))
    }

    /// Beliefs when loaded, else the reference pack, else empty.
    pub fn active_pool(&self) -> Arc<PlayerPool> {
        self.belief_pool()
            .or_else(|| self.reference_pool())
            .unwrap_or_default()
    }

    pub fn active_pool_version(&self) -> Option<PoolVersion> {
        self.beliefs
            .as_ref()
            .map(|(_, v)| *v)
            .or(self.reference)
    }

    pub fn belief_profile_name(&self) -> Option<&str> {
        self.beliefs.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn reference_info(&self) -> Option<&ReferenceInfo> {
        self.reference_info.as_ref()
    }

    pub fn has_reference(&self) -> bool {
        self.reference_pool().is_some_and(|p| !p.is_empty())
    }

    // -- reference loading ---------------------------------------------------

    /// Start an asynchronous load. Any ticket issued earlier becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        debug!("issued load ticket {}", self.generation);
        LoadTicket {
            generation: self.generation,
        }
    }

    fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Install a prepared reference load if `ticket` is still current.
    pub fn commit_reference(&mut self, ticket: LoadTicket, load: ReferenceLoad) -> LoadOutcome {
        if !self.is_current(ticket) {
            info!(
                "discarding stale reference load from {} (ticket {}, current {})",
                load.location, ticket.generation, self.generation
            );
            return LoadOutcome::Stale;
        }

        let ReferenceLoad {
            pack,
            location,
            lineups,
            sidecar,
        } = load;
        info!(
            "reference pack {} committed: {} players, {} lineups",
            location,
            pack.players.len(),
            lineups.len()
        );

        self.reference = Some(self.arena.insert(pack.players));
        self.rekey_beliefs();
        if let Some(contest) = pack.contest {
            self.contest_input = contest;
        }
        self.reference_info = Some(ReferenceInfo {
            location,
            meta: pack.meta,
            diagnostics: pack.diagnostics,
            sidecar,
        });
        self.base_lineups = lineups;
        self.warnings.retain(|w| !w.is_auto_load());
        self.refresh();
        self.compact_arena();
        LoadOutcome::Applied
    }

    /// Record that an automatic load found nothing usable.
    pub fn fail_auto_load(&mut self, ticket: LoadTicket, reason: impl Into<String>) -> LoadOutcome {
        if !self.is_current(ticket) {
            return LoadOutcome::Stale;
        }
        let reason = reason.into();
        warn!("reference pack auto-load failed: {}", reason);
        self.warnings.retain(|w| !w.is_auto_load());
        self.warnings
            .push(Warning::ReferencePackAutoLoadFailed { reason });
        LoadOutcome::Applied
    }

    /// Synchronous upload of a pipeline JSON. Supersedes any pending load.
    pub fn upload_reference(&mut self, text: &str, location: &str) -> Result<(), IngestError> {
        let pack = parse_pipeline(text)?;
        let ticket = self.begin_load();
        self.commit_reference(ticket, ReferenceLoad::from_pack(pack, location));
        Ok(())
    }

    // -- lineups -------------------------------------------------------------

    /// Upload a lineup CSV of any supported lineup shape. Replaces the
    /// current lineups and supersedes any pending reference load.
    pub fn upload_lineups(&mut self, text: &str) -> Result<CsvFormat, IngestError> {
        let format = detect_csv_format(text)?;
        let lineups = match format {
            CsvFormat::OptimizerExport => {
                let reference = self.reference_pool().unwrap_or_default();
                parse_optimizer_lineups(text, &reference, REFERENCE_SET)?
            }
            CsvFormat::UserLineupsWide | CsvFormat::UserLineupsLong => {
                parse_user_lineups(text, UPLOAD_SET)?
            }
            CsvFormat::Projections => {
                return Err(IngestError::UnexpectedFormat {
                    expected: "a lineup file",
                    found: format,
                })
            }
        };

        info!("uploaded {} lineups ({})", lineups.len(), format);
        self.begin_load();
        self.base_lineups = lineups;
        self.refresh();
        Ok(format)
    }

    // -- beliefs -------------------------------------------------------------

    /// Upload a projections CSV as the active belief profile.
    pub fn upload_beliefs(&mut self, text: &str, name: &str) -> Result<(), IngestError> {
        match detect_csv_format(text) {
            Ok(CsvFormat::Projections) => {}
            Ok(found) => {
                return Err(IngestError::UnexpectedFormat {
                    expected: "a projections file",
                    found,
                })
            }
            Err(e) if e.has_candidates() => return Err(e),
            // No probe matched; the projections parser reports what is missing.
            Err(_) => {}
        }
        let pool = parse_projections(text)?;
        info!("belief profile '{}' loaded: {} players", name, pool.len());
        self.install_beliefs(name, pool.into_players());
        Ok(())
    }

    /// Clear the belief profile; the reference pack becomes active again.
    pub fn clear_beliefs(&mut self) {
        if self.beliefs.take().is_some() {
            info!("belief profile cleared");
            self.refresh();
            self.compact_arena();
        }
    }

    fn install_beliefs(&mut self, name: &str, players: Vec<Player>) {
        let players = match self.reference_pool() {
            Some(reference) => adopt_reference_ids(players, &reference),
            None => players,
        };
        let version = self.arena.insert(PlayerPool::new(players));
        self.beliefs = Some((name.to_string(), version));
        self.refresh();
        self.compact_arena();
    }

    /// Re-key the belief pool after a new reference pack arrives.
    fn rekey_beliefs(&mut self) {
        let (Some((name, _)), Some(beliefs), Some(reference)) = (
            self.beliefs.clone(),
            self.belief_pool(),
            self.reference_pool(),
        ) else {
            return;
        };
        let players = adopt_reference_ids(beliefs.players().to_vec(), &reference);
        let version = self.arena.insert(PlayerPool::new(players));
        self.beliefs = Some((name, version));
    }

    // -- contest -------------------------------------------------------------

    pub fn contest_input(&self) -> &ContestInput {
        &self.contest_input
    }

    pub fn contest_state(&mut self) -> ContestState {
        self.contest.state_for(&self.contest_input).clone()
    }

    /// Update the contest parameters and re-classify. Resolution is
    /// unaffected, so lineups are not re-resolved.
    pub fn set_contest(&mut self, input: ContestInput) {
        if input == self.contest_input {
            return;
        }
        self.contest_input = input;
        let contest = self.contest_state();
        for lineup in &mut self.lineups {
            lineup.signals = classify_lineup(lineup, &contest, &self.thresholds);
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
        self.refresh();
    }

    // -- derived views -------------------------------------------------------

    /// Lineups with totals, slots and signals against the active pool.
    pub fn lineups(&self) -> &[Lineup] {
        &self.lineups
    }

    /// Lineups tagged `set`, or every lineup for `None`.
    pub fn lineups_in_set<'s>(&'s self, set: Option<&'s str>) -> impl Iterator<Item = &'s Lineup> {
        self.lineups
            .iter()
            .filter(move |l| set.map_or(true, |s| l.set == s))
    }

    pub fn lineup_sets(&self) -> Vec<String> {
        lineup_sets(&self.lineups)
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Games from the reference pool, or the active pool without one.
    pub fn games(&self) -> Vec<Game> {
        let pool = self
            .reference_pool()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.active_pool());
        derive_games(pool.players())
    }

    pub fn slate_stats(&self) -> SlateStats {
        let active = self.active_pool();
        let total_players = self
            .reference_pool()
            .map(|p| p.len())
            .unwrap_or_else(|| active.len());
        SlateStats {
            total_players,
            total_lineups: self.lineups.len(),
            missing_salary_count: active.missing_salary_count(),
            warnings: self.warnings.clone(),
        }
    }

    // -- persistence ---------------------------------------------------------

    pub fn preferences(&self) -> PersistedPreferences {
        PersistedPreferences {
            contest: Some(self.contest_input.clone()),
            beliefs: self.beliefs.as_ref().and_then(|(name, version)| {
                self.arena.get(*version).map(|pool| BeliefProfile {
                    name: name.clone(),
                    players: pool.players().to_vec(),
                })
            }),
        }
    }

    /// Restore saved preferences. A contest embedded in a reference pack
    /// loaded later still takes precedence.
    pub fn apply_preferences(&mut self, prefs: PersistedPreferences) {
        if let Some(contest) = prefs.contest {
            self.contest_input = contest;
        }
        match prefs.beliefs {
            Some(profile) if !profile.players.is_empty() => {
                info!("restoring belief profile '{}'", profile.name);
                self.install_beliefs(&profile.name, profile.players);
            }
            _ => self.refresh(),
        }
    }

    // -- internals -----------------------------------------------------------

    /// Recompute every lineup against the active pool and replace the
    /// mapping warnings with the current resolution state.
    fn refresh(&mut self) {
        let contest = self.contest_state();
        let pool = self.active_pool();
        self.lineups = recompute(&self.base_lineups, &contest, &pool, &self.thresholds);

        self.warnings.retain(|w| !w.is_mapping());
        for set in lineup_sets(&self.lineups) {
            let summary = summarize(self.lineups.iter().filter(|l| l.set == set));
            self.warnings.extend(summary.warnings(&set));
        }
    }

    fn compact_arena(&mut self) {
        let keep: Vec<PoolVersion> = self
            .reference
            .into_iter()
            .chain(self.beliefs.as_ref().map(|(_, v)| *v))
            .collect();
        self.arena.retain(&keep);
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(ContestInput::default(), Thresholds::default())
    }
}
