//! Scan jobs and their results.

use bridge_traits::TagList;
use core_runtime::events::{ScanEvent, ScanFailure};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Caller-visible identifier of a submitted scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScanJobId(u64);

impl ScanJobId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScanJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan#{}", self.0)
    }
}

/// One queued or live scan request and whatever it has accumulated so far.
///
/// Only the head job of the queue is ever mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanJob {
    id: ScanJobId,
    uri: String,
    tags: TagList,
    duration: Option<Duration>,
    error: Option<ScanFailure>,
}

impl ScanJob {
    pub fn new(id: ScanJobId, uri: impl Into<String>) -> Self {
        Self {
            id,
            uri: uri.into(),
            tags: TagList::new(),
            duration: None,
            error: None,
        }
    }

    pub fn id(&self) -> ScanJobId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn tags(&self) -> &TagList {
        &self.tags
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn error(&self) -> Option<&ScanFailure> {
        self.error.as_ref()
    }

    /// Merge a batch of tags. A later value replaces an earlier one of the
    /// same name.
    pub(crate) fn merge_tags(&mut self, tags: TagList) {
        self.tags.extend(tags);
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    /// Record why the job ended. Only the first failure is kept.
    pub(crate) fn fail(&mut self, failure: ScanFailure) {
        if self.error.is_none() {
            self.error = Some(failure);
        }
    }

    /// Freeze the accumulated data into a result.
    pub fn into_result(self) -> ScanResult {
        ScanResult {
            job_id: self.id,
            uri: self.uri,
            error: self.error,
            tags: self.tags,
            duration: self.duration,
        }
    }
}

/// Snapshot delivered once per finished job.
///
/// `error` and the data are independent: a failed job may still carry the
/// tags it read before failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub job_id: ScanJobId,
    pub uri: String,
    pub error: Option<ScanFailure>,
    pub tags: TagList,
    pub duration: Option<Duration>,
}

impl ScanResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<ScanResult> for ScanEvent {
    fn from(result: ScanResult) -> Self {
        ScanEvent::UriScanned {
            job_id: result.job_id.get(),
            uri: result.uri,
            error: result.error,
            tags: result.tags,
            duration_secs: result.duration.map(|d| d.as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::engine::tags;
    use core_runtime::events::ScanFailureKind;

    fn tag_list(pairs: &[(&str, &str)]) -> TagList {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_later_tags_win() {
        let mut job = ScanJob::new(ScanJobId::new(1), "file:///a.flac");
        job.merge_tags(tag_list(&[(tags::TITLE, "Draft"), (tags::ARTIST, "Nobody")]));
        job.merge_tags(tag_list(&[(tags::TITLE, "Final")]));

        assert_eq!(job.tags()[tags::TITLE], "Final");
        assert_eq!(job.tags()[tags::ARTIST], "Nobody");
    }

    #[test]
    fn test_first_failure_is_kept() {
        let mut job = ScanJob::new(ScanJobId::new(1), "file:///a.flac");
        job.fail(ScanFailure::new(ScanFailureKind::Engine, "first"));
        job.fail(ScanFailure::new(ScanFailureKind::UnsupportedType, "second"));

        assert_eq!(job.error().map(|e| e.message.as_str()), Some("first"));
    }

    #[test]
    fn test_result_converts_to_event() {
        let mut job = ScanJob::new(ScanJobId::new(4), "file:///a.flac");
        job.merge_tags(tag_list(&[(tags::ALBUM, "Live")]));
        job.set_duration(Duration::from_millis(183_900));

        let result = job.into_result();
        assert!(result.is_success());

        match ScanEvent::from(result) {
            ScanEvent::UriScanned {
                job_id,
                uri,
                error,
                tags,
                duration_secs,
            } => {
                assert_eq!(job_id, 4);
                assert_eq!(uri, "file:///a.flac");
                assert!(error.is_none());
                assert_eq!(tags.len(), 1);
                assert_eq!(duration_secs, Some(183));
            }
        }
    }
}
