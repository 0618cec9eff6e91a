//! Replay of a line-oriented query trace.
//!
//! ```text
//! selectivity=0.01
//! point: 42
//! range: 10, 20
//! ```
//!
//! A line containing `selectivity` opens a new segment and is kept as its
//! label. `range:` and `point:` lines are queries. Anything else, including
//! queries with malformed numbers, is skipped.
//!
//! Numbers must make up the whole field apart from surrounding whitespace:
//! `point:5abc` is skipped rather than read as a query for `5`.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    mem,
    path::Path,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::{Bitmap, Result, index::IndexStructure};

/// A point or inclusive range query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadEntry {
    Point(i64),
    Range { start: i64, end: i64 },
}

impl WorkloadEntry {
    /// Inclusive bounds; a point is the range `[v, v]`.
    pub fn bounds(&self) -> (i64, i64) {
        match *self {
            WorkloadEntry::Point(value) => (value, value),
            WorkloadEntry::Range { start, end } => (start, end),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkloadLine {
    Segment(String),
    Query(WorkloadEntry),
    Ignored,
}

impl WorkloadLine {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.contains("selectivity") {
            return WorkloadLine::Segment(line.to_string());
        }
        let entry = if let Some(rest) = line.strip_prefix("range:") {
            rest.split_once(',').and_then(|(start, end)| {
                Some(WorkloadEntry::Range {
                    start: start.trim().parse().ok()?,
                    end: end.trim().parse().ok()?,
                })
            })
        } else if let Some(rest) = line.strip_prefix("point:") {
            rest.trim().parse().ok().map(WorkloadEntry::Point)
        } else {
            None
        };
        entry.map_or(WorkloadLine::Ignored, WorkloadLine::Query)
    }
}

/// Union of `qualifying_stripes(v)` over every `v` of the entry.
///
/// An empty range (`start > end`) qualifies no stripe.
pub fn range_qualifying_stripes(
    index: &dyn IndexStructure,
    entry: &WorkloadEntry,
    num_stripes: usize,
) -> Result<Bitmap> {
    let (start, end) = entry.bounds();
    let mut result = Bitmap::new(num_stripes);
    if start > end {
        return Ok(result);
    }
    let mut value = start;
    loop {
        result.or_into(&index.qualifying_stripes(value, num_stripes))?;
        if value == end {
            break;
        }
        value += 1;
    }
    Ok(result)
}

/// Accumulated measurements of one selectivity segment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentStats {
    /// The label line, `None` for queries preceding any label.
    pub label: Option<String>,
    pub num_queries: usize,
    pub total_blocks: u64,
    pub total_time: Duration,
}

impl SegmentStats {
    fn new(label: Option<String>) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    fn record(&mut self, blocks: usize, elapsed: Duration) {
        self.num_queries += 1;
        self.total_blocks += blocks as u64;
        self.total_time += elapsed;
    }

    pub fn mean_block_count(&self) -> f64 {
        if self.num_queries == 0 {
            return 0.0;
        }
        self.total_blocks as f64 / self.num_queries as f64
    }

    pub fn mean_search_secs(&self) -> f64 {
        if self.num_queries == 0 {
            return 0.0;
        }
        self.total_time.as_secs_f64() / self.num_queries as f64
    }
}

/// Progress reported while a trace is replayed, in trace order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReplayEvent<'a> {
    /// A segment with at least one query is complete.
    Segment(&'a SegmentStats),
    /// A label line was read. Any previous segment has been reported
    /// already.
    Label(&'a str),
}

/// Replays traces against one built index.
pub struct WorkloadReplay<'a> {
    index: &'a dyn IndexStructure,
    num_stripes: usize,
}

impl<'a> WorkloadReplay<'a> {
    pub fn new(index: &'a dyn IndexStructure, num_stripes: usize) -> Self {
        Self { index, num_stripes }
    }

    pub fn replay(&self, reader: impl BufRead) -> Result<Vec<SegmentStats>> {
        self.replay_with(reader, |_| {})
    }

    pub fn replay_path(&self, path: impl AsRef<Path>) -> Result<Vec<SegmentStats>> {
        self.replay(BufReader::new(File::open(path)?))
    }

    /// Like [`replay`](Self::replay), calling `on_event` for every label
    /// line as it is read and for every segment as soon as it is complete.
    ///
    /// Segments without queries are dropped, their labels are still
    /// reported.
    pub fn replay_with(
        &self,
        reader: impl BufRead,
        mut on_event: impl FnMut(ReplayEvent<'_>),
    ) -> Result<Vec<SegmentStats>> {
        let mut segments = Vec::new();
        let mut current = SegmentStats::new(None);

        for line in reader.lines() {
            match WorkloadLine::parse(&line?) {
                WorkloadLine::Segment(label) => {
                    debug!(%label, "workload segment");
                    let previous = mem::replace(&mut current, SegmentStats::new(None));
                    flush(previous, &mut segments, &mut on_event);
                    on_event(ReplayEvent::Label(&label));
                    current.label = Some(label);
                }
                WorkloadLine::Query(entry) => {
                    let start = Instant::now();
                    let result = range_qualifying_stripes(self.index, &entry, self.num_stripes)?;
                    let elapsed = start.elapsed();
                    current.record(result.count_ones(), elapsed);
                }
                WorkloadLine::Ignored => {}
            }
        }
        flush(current, &mut segments, &mut on_event);

        Ok(segments)
    }
}

fn flush(
    segment: SegmentStats,
    segments: &mut Vec<SegmentStats>,
    on_event: &mut impl FnMut(ReplayEvent<'_>),
) {
    if segment.num_queries > 0 {
        on_event(ReplayEvent::Segment(&segment));
        segments.push(segment);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{Column, index::PerValueBitmap};

    #[test]
    fn parses_lines() {
        assert_eq!(
            WorkloadLine::parse("selectivity=0.1"),
            WorkloadLine::Segment("selectivity=0.1".to_string())
        );
        assert_eq!(
            WorkloadLine::parse("# low selectivity range: 1,2"),
            WorkloadLine::Segment("# low selectivity range: 1,2".to_string())
        );
        assert_eq!(
            WorkloadLine::parse("range: 10 , 12"),
            WorkloadLine::Query(WorkloadEntry::Range { start: 10, end: 12 })
        );
        assert_eq!(
            WorkloadLine::parse("range:-3,4\r"),
            WorkloadLine::Query(WorkloadEntry::Range { start: -3, end: 4 })
        );
        assert_eq!(
            WorkloadLine::parse("point: 5"),
            WorkloadLine::Query(WorkloadEntry::Point(5))
        );
        for line in [
            "",
            "point:",
            "point: x",
            "point:5abc",
            "range: 1",
            "range: 1,y",
            " point: 5",
            "hello",
        ] {
            assert_eq!(WorkloadLine::parse(line), WorkloadLine::Ignored, "{line:?}");
        }
    }

    #[test]
    fn range_is_union_of_points() {
        let column = Column::new("c", vec![10, 0, 11, 0, 0, 12, 0, 0]);
        let index = PerValueBitmap::new(&column, 2).unwrap();
        let range = WorkloadEntry::Range { start: 10, end: 12 };
        assert_eq!(
            range_qualifying_stripes(&index, &range, 4).unwrap().to_string(),
            "1110"
        );
        let point = WorkloadEntry::Point(11);
        assert_eq!(
            range_qualifying_stripes(&index, &point, 4).unwrap(),
            index.qualifying_stripes(11, 4)
        );
        let empty = WorkloadEntry::Range { start: 12, end: 10 };
        assert_eq!(
            range_qualifying_stripes(&index, &empty, 4)
                .unwrap()
                .count_ones(),
            0
        );
    }

    #[test]
    fn range_ending_at_max_terminates() {
        let column = Column::new("c", vec![i64::MAX, 1]);
        let index = PerValueBitmap::new(&column, 1).unwrap();
        let entry = WorkloadEntry::Range {
            start: i64::MAX - 2,
            end: i64::MAX,
        };
        assert_eq!(
            range_qualifying_stripes(&index, &entry, 2).unwrap().to_string(),
            "10"
        );
    }

    #[test]
    fn segments_follow_labels() {
        let column = Column::new("c", vec![1, 2, 3, 4]);
        let index = PerValueBitmap::new(&column, 1).unwrap();
        let trace = "point: 1\n\
                     selectivity=a\n\
                     selectivity=b\n\
                     range: 1,3\n\
                     garbage\n\
                     point: 9\n\
                     selectivity=c\n";
        let mut seen = Vec::new();
        let segments = WorkloadReplay::new(&index, 4)
            .replay_with(Cursor::new(trace), |event| {
                seen.push(match event {
                    ReplayEvent::Label(label) => label.to_string(),
                    ReplayEvent::Segment(segment) => format!("{} queries", segment.num_queries),
                })
            })
            .unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].label, None);
        assert_eq!(segments[0].num_queries, 1);
        assert_eq!(segments[0].total_blocks, 1);
        assert_eq!(segments[1].label.as_deref(), Some("selectivity=b"));
        assert_eq!(segments[1].num_queries, 2);
        assert_eq!(segments[1].mean_block_count(), 1.5);
        assert_eq!(
            seen,
            vec![
                "1 queries",
                "selectivity=a",
                "selectivity=b",
                "2 queries",
                "selectivity=c",
            ]
        );
    }

    #[test]
    fn empty_trace_has_no_segments() {
        let column = Column::new("c", vec![1]);
        let index = PerValueBitmap::new(&column, 1).unwrap();
        let segments = WorkloadReplay::new(&index, 1)
            .replay(Cursor::new(""))
            .unwrap();
        assert!(segments.is_empty());
        assert_eq!(SegmentStats::default().mean_search_secs(), 0.0);
    }
}
