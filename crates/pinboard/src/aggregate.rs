//! Per-revision aggregation of pinpoint CSV results, and the dashboard
//! dataset built from them.

use crate::error::PinboardError;
use crate::state::StateItem;
use crate::time::{a_year_before, noon_of};
use crate::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const WITH_PATCH: &str = "with_patch";
pub const WITHOUT_PATCH: &str = "without_patch";
const MISSING: &str = "(missing)";
const UNKNOWN: &str = "unknown";

/// Only these measurements make it into the dataset.
pub const MEASUREMENTS: &[&str] = &[
    // V8 metrics.
    "JavaScript:duration",
    "Optimize-Background:duration",
    "Optimize:duration",
    "RunsPerMinute",
    "Score",
    "Total-Main-Thread:duration",
    "Total:duration",
    "V8-Only-Main-Thread:duration",
    "V8-Only:duration",
    "memory:chrome:renderer_processes:reported_by_chrome:v8:effective_size",
    "total:500ms_window:renderer_eqt:v8",
    // Startup metrics.
    "experimental_content_start_time",
    "experimental_navigation_start_time",
    "first_contentful_paint_time",
    "messageloop_start_time",
    "navigation_commit_time",
];

/// Averages are taken over this fixed set of stories.
pub const ACTIVE_STORIES: &[&str] = &[
    // v8.browsing_mobile.
    "browse:chrome:newtab:2019",
    "browse:chrome:omnibox:2019",
    "browse:media:facebook_photos:2019",
    "browse:media:flickr_infinite_scroll:2019",
    "browse:media:googleplaystore:2019",
    "browse:media:imgur:2019",
    "browse:media:youtube:2019",
    "browse:news:cricbuzz:2019",
    "browse:news:globo:2019",
    "browse:news:nytimes:2019",
    "browse:news:qq:2019",
    "browse:news:reddit:2019",
    "browse:news:toi:2019",
    "browse:shopping:amazon:2019",
    "browse:news:washingtonpost:2019",
    "browse:search:amp:sxg:2019",
    "browse:shopping:avito:2019",
    "browse:shopping:flipkart:2019",
    "browse:shopping:lazada:2019",
    "browse:social:facebook:2019",
    "browse:social:instagram:2019",
    "browse:social:twitter:2019",
    "browse:tools:maps:2019",
    // v8.browsing_desktop.
    "browse:news:nytimes:2020",
    "browse:news:flipboard:2020",
    "browse:social:facebook_infinite_scroll:2018",
    "browse:tools:sheets:2019",
    "browse:media:tumblr:2018",
    "browse:social:twitter_infinite_scroll:2018",
    "browse:tech:discourse_infinite_scroll:2018",
    "browse:social:twitter:2018",
    "browse:social:tumblr_infinite_scroll:2018",
    "browse:media:googleplaystore:2021",
    "browse:search:google:2020",
    "browse:news:cnn:2018",
    "browse:news:reddit:2020",
    "browse:search:google_india:2021",
    "browse:media:youtubetv:2019",
    // Speedometer2.
    "Speedometer2",
    // JetStream2.
    "JetStream2",
];

/// Which pinpoint rows are aggregated.
#[derive(Debug, Clone)]
pub struct Selection {
    pub measurements: BTreeSet<String>,
    pub stories: BTreeSet<String>,
}

impl Default for Selection {
    fn default() -> Self {
        Selection {
            measurements: MEASUREMENTS.iter().map(|s| s.to_string()).collect(),
            stories: ACTIVE_STORIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A row of a pinpoint `get-csv` file. Other columns are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PinpointRow {
    pub change: String,
    pub benchmark: String,
    pub story: String,
    pub name: String,
    pub unit: String,
    pub mean: Option<f64>,
    pub job_id: String,
}

/// Timestamps are written the way spreadsheet tools read them.
mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let value = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&value, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Aggregated results of one (revision, label, job, benchmark, name). Also
/// the row format of the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub revision: String,
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub bot: String,
    pub patch: String,
    pub label: String,
    pub benchmark: String,
    pub name: String,
    /// Empty when the revision produced no matching results.
    pub mean: Option<f64>,
    pub count: u64,
}

/// A dashboard row: a result and whether it is the latest of its series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub revision: String,
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub bot: String,
    pub patch: String,
    pub label: String,
    pub benchmark: String,
    pub name: String,
    pub mean: Option<f64>,
    pub count: u64,
    pub reference: bool,
}

/// Aggregate the pinpoint results for `item` read from `results`.
///
/// Story results are averaged per (change, job, measurement, benchmark,
/// unit). Millisecond units are reported in seconds. When nothing matches
/// `selection` a single `(missing)` row with count 0 records that the
/// revision was processed.
pub fn revision_results(
    item: &StateItem,
    results: &Path,
    selection: &Selection,
) -> Result<Vec<ResultRow>> {
    let rows: Vec<PinpointRow> = read_csv(results)?;
    if !rows.iter().all(|row| row.change.contains(&item.revision)) {
        return Err(PinboardError::RevisionMismatch(item.revision.clone()));
    }

    // (change, job_id, name, benchmark, unit) -> (sum, count)
    let mut groups: BTreeMap<(String, String, String, String, String), (f64, u64)> =
        BTreeMap::new();
    for row in rows {
        if !selection.measurements.contains(&row.name) || !selection.stories.contains(&row.story) {
            continue;
        }
        let entry = groups
            .entry((row.change, row.job_id, row.name, row.benchmark, row.unit))
            .or_insert((0.0, 0));
        if let Some(mean) = row.mean.filter(|mean| !mean.is_nan()) {
            entry.0 += mean;
            entry.1 += 1;
        }
    }

    let noon = noon_of(&item.timestamp)?;
    let mut aggregated = Vec::new();
    if groups.is_empty() {
        aggregated.push((
            item.revision.clone(),
            MISSING.to_string(),
            MISSING.to_string(),
            MISSING.to_string(),
            String::new(),
            None,
            0,
        ));
    }
    for ((change, job_id, name, benchmark, unit), (sum, count)) in groups {
        let mean = (count > 0).then(|| sum / count as f64);
        aggregated.push((change, job_id, name, benchmark, unit, mean, count));
    }

    Ok(aggregated
        .into_iter()
        .map(|(change, job_id, name, benchmark, unit, mean, count)| {
            let mean = if unit.starts_with("ms_") {
                mean.map(|mean| mean / 1000.0)
            } else {
                mean
            };
            let with_patch = change.contains('+');
            // Without-patch runs are shown a year back so both series line
            // up on the dashboard.
            let timestamp = if with_patch { noon } else { a_year_before(noon) };
            let (mut bot, mut patch) = (UNKNOWN.to_string(), UNKNOWN.to_string());
            for job in item.jobs.iter().filter(|job| job_id.contains(&job.id)) {
                bot = job.bot.clone().unwrap_or_else(|| UNKNOWN.to_string());
                patch = job.patch.clone().unwrap_or_else(|| UNKNOWN.to_string());
            }
            ResultRow {
                revision: item.revision.clone(),
                timestamp,
                bot,
                patch,
                label: if with_patch { WITH_PATCH } else { WITHOUT_PATCH }.to_string(),
                benchmark,
                name,
                mean,
                count,
            }
        })
        .collect())
}

/// Drop rows without results and mark the latest row of each (label,
/// benchmark, name) series as its reference.
pub fn build_dataset(rows: &[ResultRow]) -> Vec<DatasetRow> {
    let rows: Vec<&ResultRow> = rows.iter().filter(|row| row.count > 0).collect();
    let mut latest: BTreeMap<(&str, &str, &str), NaiveDateTime> = BTreeMap::new();
    for row in &rows {
        let key = (row.label.as_str(), row.benchmark.as_str(), row.name.as_str());
        let entry = latest.entry(key).or_insert(row.timestamp);
        if row.timestamp > *entry {
            *entry = row.timestamp;
        }
    }
    rows.into_iter()
        .map(|row| {
            let key = (row.label.as_str(), row.benchmark.as_str(), row.name.as_str());
            DatasetRow {
                revision: row.revision.clone(),
                timestamp: row.timestamp,
                bot: row.bot.clone(),
                patch: row.patch.clone(),
                label: row.label.clone(),
                benchmark: row.benchmark.clone(),
                name: row.name.clone(),
                mean: row.mean,
                count: row.count,
                reference: latest.get(&key) == Some(&row.timestamp),
            }
        })
        .collect()
}

/// Read every row of a CSV file with a header line.
pub fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(Into::into)
}

/// Write rows with a header line.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
