//! Pipeline list helpers

use crate::dto::pipeline::PipelineSummary;
use crate::format::last_run_time;

/// Summaries whose name contains `filter` (case-insensitive), sorted by name
///
/// A blank filter matches everything.
pub fn filter_pipelines<'a>(
    summaries: &'a [PipelineSummary],
    filter: &str,
) -> Vec<&'a PipelineSummary> {
    let needle = filter.trim().to_lowercase();
    let mut matched: Vec<&PipelineSummary> = summaries
        .iter()
        .filter(|s| needle.is_empty() || s.name.to_lowercase().contains(&needle))
        .collect();
    matched.sort_by(|a, b| a.name.cmp(&b.name));
    matched
}

impl PipelineSummary {
    /// Last run as relative time, `"-"` when unknown
    pub fn last_run_label(&self, now_ms: i64) -> String {
        match self.last_run {
            None => "-".to_string(),
            Some(ms) => last_run_time(Some(ms), now_ms),
        }
    }

    /// Runtime as reported, `"--:--"` when unknown
    pub fn runtime_label(&self) -> &str {
        self.runtime.as_deref().unwrap_or("--:--")
    }
}
