//! Playback observations reported through the `metrics` facade.
//!
//! Nothing here depends on an exporter being installed; without a recorder
//! the calls are no-ops.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

pub const CHUNK_DOWNLOAD_SECONDS: &str = "blobreel_chunk_download_seconds";
pub const CHUNK_DOWNLOAD_SPEED: &str = "blobreel_chunk_download_mib_per_second";
pub const CHUNK_DOWNLOAD_FAILURES: &str = "blobreel_chunk_download_failures_total";
pub const CACHE_HITS: &str = "blobreel_cache_hits_total";
pub const CACHE_MISSES: &str = "blobreel_cache_misses_total";
pub const HOT_WINDOW_HITS: &str = "blobreel_hot_window_hits_total";
pub const STREAM_READS: &str = "blobreel_stream_reads_total";
pub const STREAM_READ_FAILURES: &str = "blobreel_stream_read_failures_total";
pub const STREAMS_RUNNING: &str = "blobreel_streams_running";
pub const BACKGROUND_TASKS_DROPPED: &str = "blobreel_background_tasks_dropped_total";

pub(crate) fn chunk_downloaded(bytes: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    histogram!(CHUNK_DOWNLOAD_SECONDS).record(secs);
    if secs > 0.0 {
        histogram!(CHUNK_DOWNLOAD_SPEED).record(bytes as f64 / (1024.0 * 1024.0) / secs);
    }
}

pub(crate) fn chunk_download_failed() {
    counter!(CHUNK_DOWNLOAD_FAILURES).increment(1);
}

pub(crate) fn cache_hit() {
    counter!(CACHE_HITS).increment(1);
}

pub(crate) fn cache_miss() {
    counter!(CACHE_MISSES).increment(1);
}

pub(crate) fn hot_window_hit() {
    counter!(HOT_WINDOW_HITS).increment(1);
}

pub(crate) fn stream_read(ok: bool) {
    if ok {
        counter!(STREAM_READS).increment(1);
    } else {
        counter!(STREAM_READ_FAILURES).increment(1);
    }
}

pub(crate) fn background_task_dropped(task: &'static str) {
    counter!(BACKGROUND_TASKS_DROPPED, "task" => task).increment(1);
}

/// Counts a stream as running for as long as the guard lives.
pub struct RunningStreamGuard(());

impl RunningStreamGuard {
    pub fn new() -> Self {
        gauge!(STREAMS_RUNNING).increment(1.0);
        Self(())
    }
}

impl Default for RunningStreamGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RunningStreamGuard {
    fn drop(&mut self) {
        gauge!(STREAMS_RUNNING).decrement(1.0);
    }
}
