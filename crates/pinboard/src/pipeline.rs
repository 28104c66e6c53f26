//! The start / collect / upload pipeline over the cached jobs state.

use crate::aggregate::{build_dataset, read_csv, revision_results, write_csv, ResultRow, Selection};
use crate::git::{last_commit_of_date, Repository};
use crate::pinpoint::PinpointApi;
use crate::state::{insert_item, to_json, Job, JobsState, StateItem, QUEUED};
use crate::storage::CloudStorage;
use crate::time::months_ago;
use crate::Result;
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const JOBS_STATE_FILE: &str = "jobs_state.json";
pub const DATASET_CACHE_FILE: &str = "dataset_cache.csv";
pub const DATASET_CSV_FILE: &str = "dataset.csv";
const RESULTS_DIR: &str = "job_results";

/// Months of history kept in the dataset.
pub const HISTORY_MONTHS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Collect,
    Upload,
}

impl Action {
    /// What `auto` runs.
    pub const ALL: [Action; 3] = [Action::Start, Action::Collect, Action::Upload];
}

/// Local cache directory, mirrored to cloud storage.
#[derive(Debug, Clone)]
pub struct CacheDir {
    pub root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CacheDir { root: root.into() }
    }

    /// `tools/perf/_cached_data/pinboard`.
    pub fn in_tools_perf(tools_perf: &Path) -> Self {
        Self::new(tools_perf.join("_cached_data").join("pinboard"))
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Where the pinpoint CSV for a revision is kept.
    pub fn results_file(&self, item: &StateItem) -> PathBuf {
        self.root
            .join(RESULTS_DIR)
            .join(format!("{}.csv", item.revision))
    }

    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(self.root.join(RESULTS_DIR))?;
        Ok(())
    }
}

/// Revisions with results to fetch, and the cached rows still in range.
#[derive(Debug, Default)]
pub struct ItemsToUpdate {
    pub revisions: BTreeSet<String>,
    pub cached: Option<Vec<ResultRow>>,
}

/// The pipeline and the services it drives.
pub struct PinboardContext<'a> {
    pub cache: CacheDir,
    /// JSON list of pinpoint job configs, one job per entry.
    pub job_configs: PathBuf,
    pub selection: Selection,
    pinpoint: &'a dyn PinpointApi,
    repo: &'a dyn Repository,
    storage: &'a dyn CloudStorage,
}

fn config_string(config: &Map<String, Value>, key: &str) -> Option<String> {
    config.get(key).map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

impl<'a> PinboardContext<'a> {
    pub fn new(
        cache: CacheDir,
        job_configs: PathBuf,
        pinpoint: &'a dyn PinpointApi,
        repo: &'a dyn Repository,
        storage: &'a dyn CloudStorage,
    ) -> Self {
        PinboardContext {
            cache,
            job_configs,
            selection: Selection::default(),
            pinpoint,
            repo,
            storage,
        }
    }

    /// Start one pinpoint job per config on the last commit of `date`,
    /// unless that revision is already tracked.
    pub async fn start_pinpoint_jobs(
        &self,
        state: &mut JobsState,
        date: &DateTime<FixedOffset>,
    ) -> Result<()> {
        let commit = last_commit_of_date(self.repo, date).await?;
        if state.iter().any(|item| item.revision == commit.revision) {
            info!("No new jobs to start.");
            return Ok(());
        }

        let day = commit.timestamp.get(..10).unwrap_or(&commit.timestamp);
        info!("Starting jobs for {} ({}):", day, commit.revision);
        let mut item = StateItem::new(commit.revision.clone(), commit.timestamp.clone());
        let configs: Vec<Map<String, Value>> =
            serde_json::from_str(&fs::read_to_string(&self.job_configs)?)?;
        for mut config in configs {
            config.insert(
                "base_git_hash".to_string(),
                Value::String(commit.revision.clone()),
            );
            let mut tmp = tempfile::Builder::new().suffix(".json").tempfile()?;
            serde_json::to_writer(&mut tmp, &config)?;
            tmp.flush()?;
            let id = self.pinpoint.start_job(tmp.path()).await?;
            item.jobs.push(Job {
                bot: config_string(&config, "configuration"),
                id,
                patch: config_string(&config, "patch"),
                status: QUEUED.to_string(),
            });
        }
        insert_item(state, item);
        Ok(())
    }

    /// Refresh job statuses, then download results for revisions whose
    /// jobs have all finished, unless they all failed.
    pub async fn collect_pinpoint_results(&self, items: &mut [&mut StateItem]) -> Result<()> {
        for item in items.iter_mut() {
            let active = item.active_job_ids();
            if active.is_empty() {
                continue;
            }
            let updates = self.pinpoint.status(&active).await?;
            info!("Got job updates: {:?}.", updates);
            for job in item.jobs.iter_mut() {
                if let Some(status) = updates.get(&job.id) {
                    job.status = status.clone();
                }
            }
        }

        for item in items.iter() {
            if item.skip_processing() {
                continue;
            }
            let output = self.cache.results_file(item);
            if !output.exists() {
                info!("Getting csv data for commit: {}.", item.revision);
                self.pinpoint
                    .get_csv(&output, &item.completed_job_ids())
                    .await?;
            }
        }
        Ok(())
    }

    /// The local state, else the cloud copy, else an empty state.
    pub async fn load_jobs_state(&self) -> Result<JobsState> {
        let local = self.cache.path(JOBS_STATE_FILE);
        if local.exists() || self.storage.download(&local).await? {
            return Ok(serde_json::from_str(&fs::read_to_string(&local)?)?);
        }
        info!("No jobs state found. Creating empty state.");
        Ok(Vec::new())
    }

    /// Write the state and back it up, if it changed. Returns whether it did.
    pub async fn update_jobs_state(&self, state: &JobsState) -> Result<bool> {
        let local = self.cache.path(JOBS_STATE_FILE);
        let json = to_json(state)?;
        if local.exists() && fs::read_to_string(&local)? == json {
            return Ok(false);
        }
        fs::write(&local, json)?;
        self.storage.upload(&local).await?;
        Ok(true)
    }

    async fn cached_dataset(&self) -> Result<Option<Vec<ResultRow>>> {
        let local = self.cache.path(DATASET_CACHE_FILE);
        if local.exists() || self.storage.download(&local).await? {
            return Ok(Some(read_csv(&local)?));
        }
        Ok(None)
    }

    /// Tracked revisions newer than `from_date` (`YYYY-MM-DD`) that are not
    /// in the cache yet, and the cached rows of recent revisions.
    pub async fn items_to_update(&self, state: &JobsState, from_date: &str) -> Result<ItemsToUpdate> {
        let mut revisions: BTreeSet<String> = state
            .iter()
            .filter(|item| item.timestamp.as_str() > from_date)
            .map(|item| item.revision.clone())
            .collect();
        let cached = self.cached_dataset().await?.map(|mut rows| {
            rows.retain(|row| revisions.contains(&row.revision));
            rows
        });
        if let Some(rows) = &cached {
            for row in rows {
                revisions.remove(&row.revision);
            }
        }
        Ok(ItemsToUpdate { revisions, cached })
    }

    /// Aggregate newly finished revisions into the cache and publish the
    /// dataset. Returns false when there was nothing new.
    pub async fn aggregate_and_upload(
        &self,
        state: &JobsState,
        update: ItemsToUpdate,
    ) -> Result<bool> {
        let mut rows = update.cached.unwrap_or_default();
        let mut found_new = false;
        let new_items = state
            .iter()
            .filter(|item| update.revisions.contains(&item.revision))
            .filter(|item| !item.skip_processing());
        for item in new_items {
            if !found_new {
                info!("Processing data from new results:");
                found_new = true;
            }
            let day = item.timestamp.get(..10).unwrap_or(&item.timestamp);
            info!("- {} ({})", day, item.revision);
            rows.extend(revision_results(
                item,
                &self.cache.results_file(item),
                &self.selection,
            )?);
        }
        if !found_new {
            info!("No new data found.");
            return Ok(false);
        }

        let cache_file = self.cache.path(DATASET_CACHE_FILE);
        write_csv(&cache_file, &rows)?;
        self.storage.upload(&cache_file).await?;

        let dataset = build_dataset(&rows);
        let dataset_file = self.cache.path(DATASET_CSV_FILE);
        write_csv(&dataset_file, &dataset)?;
        self.storage.upload(&dataset_file).await?;
        info!("Total {} rows of data uploaded.", dataset.len());
        Ok(true)
    }

    async fn start_and_collect(
        &self,
        state: &mut JobsState,
        actions: &[Action],
        date: &DateTime<FixedOffset>,
        from_date: &str,
    ) -> Result<ItemsToUpdate> {
        if actions.contains(&Action::Start) {
            self.start_pinpoint_jobs(state, date).await?;
        }
        let update = self.items_to_update(state, from_date).await?;
        if actions.contains(&Action::Collect) {
            let mut items: Vec<&mut StateItem> = state
                .iter_mut()
                .filter(|item| update.revisions.contains(&item.revision))
                .collect();
            self.collect_pinpoint_results(&mut items).await?;
        }
        Ok(update)
    }

    /// Run `actions` for `date`. The state is saved even when starting or
    /// collecting fails.
    pub async fn run(
        &self,
        actions: &[Action],
        date: &DateTime<FixedOffset>,
        now: &DateTime<FixedOffset>,
    ) -> Result<()> {
        self.cache.create()?;
        let mut state = self.load_jobs_state().await?;
        let from_date = months_ago(now, HISTORY_MONTHS);
        let outcome = self
            .start_and_collect(&mut state, actions, date, &from_date)
            .await;
        self.update_jobs_state(&state).await?;
        let update = outcome?;

        if actions.contains(&Action::Upload) {
            self.aggregate_and_upload(&state, update).await?;
        }
        Ok(())
    }
}
