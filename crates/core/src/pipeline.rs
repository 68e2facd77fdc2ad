//! Shared engine state: buffer, registry and the queue of force-parsed events
//!
//! Everything in here is meant to sit behind the watcher's single mutex. The
//! reactor calls [`EventPipeline::fill_from`]; consumers call
//! [`EventPipeline::next_event`].

use crate::buffer::EventBuffer;
use crate::config::WatcherConfig;
use crate::error::{Error, Result};
use crate::event::{classify, EventKind, WatchEvent};
use crate::mask::EventMask;
use crate::parser::parse_next;
use crate::record::HEADER_SIZE;
use crate::registry::{Registry, WatchEntry};
use crate::source::EventSource;
use serde::Serialize;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Counters describing what the engine has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatcherStats {
    /// Bytes read from the event source
    pub bytes_read: u64,
    /// Records turned into events
    pub events_parsed: u64,
    /// Parses forced by the high-water mark before a read
    pub forced_parses: u64,
    /// Reads put off because the buffer could not take the next record
    pub deferred_reads: u64,
    /// Kernel queue overflow records
    pub overflows: u64,
    /// Records for untracked descriptors; each one discarded the buffer
    pub inconsistencies: u64,
}

/// Result of one attempt to pull bytes from the event source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Bytes appended to the buffer
    Read(usize),
    /// Nothing pending in the source
    Empty,
    /// No room for the next record; retried on the next wake-up
    Deferred,
}

/// Buffer, registry and pending queue guarded together by the watcher lock
#[derive(Debug)]
pub struct EventPipeline {
    buffer: EventBuffer,
    registry: Registry,
    /// Results parsed ahead of consumers, delivered before the buffer
    pending: VecDeque<Result<WatchEvent>>,
    stats: WatcherStats,
}

impl EventPipeline {
    pub fn new(config: &WatcherConfig) -> Self {
        Self {
            buffer: EventBuffer::new(config.buffer_capacity(), config.high_water_percent),
            registry: Registry::new(),
            pending: VecDeque::new(),
            stats: WatcherStats::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> WatcherStats {
        self.stats
    }

    /// Register a path with the source and the registry
    pub fn register(
        &mut self,
        source: &dyn EventSource,
        path: &Path,
        flags: EventMask,
    ) -> Result<&WatchEntry> {
        self.registry.register(source, path, flags)
    }

    /// Drop the kernel watch for a path; its entry goes once `IN_IGNORED` arrives
    pub fn deregister(&mut self, source: &dyn EventSource, path: &Path) -> Result<u32> {
        self.registry.deregister(source, path)
    }

    /// True when a consumer can get a result without waiting
    pub fn has_ready(&self) -> bool {
        !self.pending.is_empty() || !self.buffer.is_empty()
    }

    /// Read what the source has into the buffer tail
    ///
    /// Above the high-water mark one record is parsed out first and queued,
    /// so a burst cannot fill the buffer with nothing consumable. If the
    /// source still does not fit, the read is deferred.
    pub fn fill_from(&mut self, source: &dyn EventSource) -> io::Result<FillOutcome> {
        if self.buffer.is_above_high_water() {
            self.stats.forced_parses += 1;
            debug!(
                "Buffer above high water ({} of {} bytes), parsing ahead",
                self.buffer.len(),
                self.buffer.capacity()
            );
            match self.parse_one(Some(source)) {
                Ok(Some(event)) => self.pending.push_back(Ok(event)),
                Ok(None) => {}
                Err(e) => self.pending.push_back(Err(e)),
            }
        }

        let spare = self.buffer.spare_mut();
        if spare.is_empty() {
            self.stats.deferred_reads += 1;
            return Ok(FillOutcome::Deferred);
        }

        match source.read_events(spare) {
            Ok(0) => Ok(FillOutcome::Empty),
            Ok(count) => {
                self.buffer.commit(count);
                self.stats.bytes_read += count as u64;
                Ok(FillOutcome::Read(count))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(FillOutcome::Empty),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(FillOutcome::Empty),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                self.stats.deferred_reads += 1;
                debug!(
                    "Next record does not fit in {} free bytes, deferring read",
                    self.buffer.available()
                );
                Ok(FillOutcome::Deferred)
            }
            Err(e) => Err(e),
        }
    }

    /// Next event for a consumer, or `None` when nothing is buffered
    ///
    /// A partial record at the front can never be completed (the source only
    /// hands out whole records), so it is reported as an underrun and dropped.
    pub fn next_event(&mut self, source: Option<&dyn EventSource>) -> Result<Option<WatchEvent>> {
        if let Some(result) = self.pending.pop_front() {
            return result.map(Some);
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }

        let available = self.buffer.len();
        if available < HEADER_SIZE {
            self.buffer.clear();
            return Err(Error::BufferUnderrun { available });
        }

        match self.parse_one(source)? {
            Some(event) => Ok(Some(event)),
            None => {
                self.buffer.clear();
                Err(Error::BufferUnderrun { available })
            }
        }
    }

    /// Parse one record and apply whatever registry change it implies
    fn parse_one(&mut self, source: Option<&dyn EventSource>) -> Result<Option<WatchEvent>> {
        let parsed = match parse_next(&mut self.buffer, &mut self.registry) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.stats.inconsistencies += 1;
                return Err(e);
            }
        };

        let classification = classify(parsed.event.mask);
        if classification.kind == EventKind::Overflow {
            self.stats.overflows += 1;
        }
        if classification.kind == EventKind::Unknown {
            warn!(
                "Unrecognized event mask {:#x} for {}",
                parsed.event.mask.bits(),
                parsed.event.file_name.display()
            );
        }
        if let Some(directive) = classification.directive {
            self.registry.apply(parsed.wd, directive, source);
        }

        self.stats.events_parsed += 1;
        Ok(Some(parsed.event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{encode_record, QUEUE_WD};
    use crate::testing::ScriptedSource;
    use tempfile::TempDir;

    fn small_config(records: usize) -> WatcherConfig {
        WatcherConfig {
            buffer_records: records,
            ..WatcherConfig::default()
        }
    }

    #[test]
    fn test_fill_then_drain() {
        let temp_dir = TempDir::new().unwrap();
        let source = ScriptedSource::new();
        let mut pipeline = EventPipeline::new(&WatcherConfig::default());
        let wd = pipeline
            .register(&source, temp_dir.path(), EventMask::CREATE | EventMask::DELETE)
            .unwrap()
            .wd;

        let mut burst = encode_record(wd, EventMask::CREATE.bits(), 0, b"a.txt");
        burst.extend(encode_record(wd, EventMask::DELETE.bits(), 0, b"a.txt"));
        source.push_read(burst);

        assert!(matches!(pipeline.fill_from(&source).unwrap(), FillOutcome::Read(64)));
        assert_eq!(pipeline.fill_from(&source).unwrap(), FillOutcome::Empty);

        let first = pipeline.next_event(Some(&source)).unwrap().unwrap();
        assert_eq!(first.event_name(), "CREATE");
        assert_eq!(first.file_name, temp_dir.path().join("a.txt"));

        let second = pipeline.next_event(Some(&source)).unwrap().unwrap();
        assert_eq!(second.event_name(), "DELETE");

        assert!(pipeline.next_event(Some(&source)).unwrap().is_none());
        assert_eq!(pipeline.stats().events_parsed, 2);
        assert_eq!(pipeline.stats().bytes_read, 64);
    }

    #[test]
    fn test_high_water_forces_parse_before_append() {
        let temp_dir = TempDir::new().unwrap();
        let source = ScriptedSource::new();
        // 2 max-sized records = 544 bytes, high water at 435
        let mut pipeline = EventPipeline::new(&small_config(2));
        let wd = pipeline
            .register(&source, temp_dir.path(), EventMask::CREATE)
            .unwrap()
            .wd;

        // 15 records of 32 bytes = 480 bytes, above high water
        let mut first = Vec::new();
        for i in 0..15 {
            first.extend(encode_record(wd, EventMask::CREATE.bits(), 0, format!("f{:02}", i).as_bytes()));
        }
        source.push_read(first);
        assert_eq!(pipeline.fill_from(&source).unwrap(), FillOutcome::Read(480));
        assert!(pipeline.buffer().is_above_high_water());

        // 2 more records: 64 bytes, exactly the free space once one is parsed out
        let mut second = encode_record(wd, EventMask::CREATE.bits(), 0, b"f15");
        second.extend(encode_record(wd, EventMask::CREATE.bits(), 0, b"f16"));
        source.push_read(second);
        assert_eq!(pipeline.fill_from(&source).unwrap(), FillOutcome::Read(64));
        assert_eq!(pipeline.stats().forced_parses, 1);

        // Every record comes out, in order, the force-parsed one first
        for i in 0..17 {
            let event = pipeline.next_event(Some(&source)).unwrap().unwrap();
            assert_eq!(event.file_name, temp_dir.path().join(format!("f{:02}", i)));
        }
        assert!(pipeline.next_event(Some(&source)).unwrap().is_none());
    }

    #[test]
    fn test_read_deferred_when_record_does_not_fit() {
        let temp_dir = TempDir::new().unwrap();
        let source = ScriptedSource::new();
        // One max-sized record of room, high water above a single 224-byte record
        let config = WatcherConfig {
            high_water_percent: 95,
            ..small_config(1)
        };
        let mut pipeline = EventPipeline::new(&config);
        let wd = pipeline
            .register(&source, temp_dir.path(), EventMask::CREATE)
            .unwrap()
            .wd;

        let long_name = vec![b'n'; 200];
        source.push_read(encode_record(wd, EventMask::CREATE.bits(), 0, &long_name));
        source.push_read(encode_record(wd, EventMask::CREATE.bits(), 0, &long_name));

        assert!(matches!(pipeline.fill_from(&source).unwrap(), FillOutcome::Read(_)));
        assert_eq!(pipeline.fill_from(&source).unwrap(), FillOutcome::Deferred);
        assert_eq!(pipeline.stats().deferred_reads, 1);

        // Nothing was fabricated or lost: drain and retry
        pipeline.next_event(Some(&source)).unwrap().unwrap();
        assert!(pipeline.next_event(Some(&source)).unwrap().is_none());
        assert!(matches!(pipeline.fill_from(&source).unwrap(), FillOutcome::Read(_)));
        assert!(pipeline.next_event(Some(&source)).unwrap().is_some());
        assert_eq!(pipeline.stats().forced_parses, 0);
    }

    #[test]
    fn test_move_self_then_ignored_removes_entry() {
        let temp_dir = TempDir::new().unwrap();
        let source = ScriptedSource::new();
        let mut pipeline = EventPipeline::new(&WatcherConfig::default());
        let wd = pipeline
            .register(&source, temp_dir.path(), EventMask::MOVE_SELF)
            .unwrap()
            .wd;

        source.push_read(encode_record(wd, EventMask::MOVE_SELF.bits(), 0, b""));
        pipeline.fill_from(&source).unwrap();
        let event = pipeline.next_event(Some(&source)).unwrap().unwrap();
        assert_eq!(event.event_name(), "MOVE_SELF");
        assert!(pipeline.registry().resolve(wd).unwrap().pending_removal);
        assert_eq!(source.removed(), vec![wd]);

        source.push_read(encode_record(wd, EventMask::IGNORED.bits(), 0, b""));
        pipeline.fill_from(&source).unwrap();
        let event = pipeline.next_event(Some(&source)).unwrap().unwrap();
        assert_eq!(event.event_name(), "REMOVE");
        assert!(pipeline.registry().resolve(wd).is_none());
    }

    #[test]
    fn test_delete_self_marks_without_deregistering() {
        let temp_dir = TempDir::new().unwrap();
        let source = ScriptedSource::new();
        let mut pipeline = EventPipeline::new(&WatcherConfig::default());
        let wd = pipeline
            .register(&source, temp_dir.path(), EventMask::DELETE_SELF)
            .unwrap()
            .wd;

        source.push_read(encode_record(wd, EventMask::DELETE_SELF.bits(), 0, b""));
        pipeline.fill_from(&source).unwrap();
        pipeline.next_event(Some(&source)).unwrap().unwrap();

        assert!(pipeline.registry().resolve(wd).unwrap().pending_removal);
        assert!(source.removed().is_empty());
    }

    #[test]
    fn test_record_after_finalize_is_inconsistent() {
        // A record queued for a descriptor after its IGNORED was processed
        let temp_dir = TempDir::new().unwrap();
        let other_dir = TempDir::new().unwrap();
        let source = ScriptedSource::new();
        let mut pipeline = EventPipeline::new(&WatcherConfig::default());
        let wd = pipeline
            .register(&source, temp_dir.path(), EventMask::INTEREST)
            .unwrap()
            .wd;
        let other = pipeline
            .register(&source, other_dir.path(), EventMask::INTEREST)
            .unwrap()
            .wd;

        let mut burst = encode_record(wd, EventMask::DELETE_SELF.bits(), 0, b"");
        burst.extend(encode_record(wd, EventMask::IGNORED.bits(), 0, b""));
        burst.extend(encode_record(wd, EventMask::MODIFY.bits(), 0, b""));
        burst.extend(encode_record(other, EventMask::CREATE.bits(), 0, b"lost"));
        source.push_read(burst);
        pipeline.fill_from(&source).unwrap();

        assert_eq!(pipeline.next_event(Some(&source)).unwrap().unwrap().event_name(), "DELETE_SELF");
        assert_eq!(pipeline.next_event(Some(&source)).unwrap().unwrap().event_name(), "REMOVE");
        assert!(pipeline.registry().resolve(wd).is_none());

        let err = pipeline.next_event(Some(&source)).unwrap_err();
        assert!(matches!(err, Error::Inconsistent { .. }));

        // The stale record took the rest of the buffer with it
        assert!(pipeline.next_event(Some(&source)).unwrap().is_none());
        assert_eq!(pipeline.stats().inconsistencies, 1);
    }

    #[test]
    fn test_partial_header_is_underrun() {
        let source = ScriptedSource::new();
        let mut pipeline = EventPipeline::new(&WatcherConfig::default());
        source.push_read(vec![0u8; 7]);
        pipeline.fill_from(&source).unwrap();

        let err = pipeline.next_event(Some(&source)).unwrap_err();
        assert!(matches!(err, Error::BufferUnderrun { available: 7 }));
        assert!(!pipeline.has_ready());
    }

    #[test]
    fn test_overflow_counted() {
        let source = ScriptedSource::new();
        let mut pipeline = EventPipeline::new(&WatcherConfig::default());
        source.push_read(encode_record(QUEUE_WD, EventMask::Q_OVERFLOW.bits(), 0, b""));
        pipeline.fill_from(&source).unwrap();

        let event = pipeline.next_event(Some(&source)).unwrap().unwrap();
        assert_eq!(event.event_name(), "OVERFLOW");
        assert_eq!(pipeline.stats().overflows, 1);
    }

    #[test]
    fn test_read_failure_propagates_and_keeps_buffer() {
        let temp_dir = TempDir::new().unwrap();
        let source = ScriptedSource::new();
        let mut pipeline = EventPipeline::new(&WatcherConfig::default());
        let wd = pipeline
            .register(&source, temp_dir.path(), EventMask::CREATE)
            .unwrap()
            .wd;

        source.push_read(encode_record(wd, EventMask::CREATE.bits(), 0, b"kept"));
        pipeline.fill_from(&source).unwrap();
        let buffered = pipeline.buffer().len();

        source.fail_next_read(io::ErrorKind::Other);
        let err = pipeline.fill_from(&source).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(pipeline.buffer().len(), buffered);
        assert_eq!(pipeline.stats().bytes_read, buffered as u64);

        // What was buffered before the failure is still delivered
        let event = pipeline.next_event(None).unwrap().unwrap();
        assert_eq!(event.file_name, temp_dir.path().join("kept"));
    }
}
