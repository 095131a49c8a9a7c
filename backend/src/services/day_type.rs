//! Day-Type state timeline.
//!
//! The covered range is cut at every candidate boundary. Each elementary
//! interval takes the highest-priority state whose source window contains it,
//! and equal neighbours are joined. The result covers every instant of the
//! range exactly once.

use serde::{Deserialize, Serialize};

use crate::models::time::{Instant, Interval};
use crate::services::composer::{Block, Window, WindowKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Weekday,
    Erev,
    Shabbos,
    YomTov,
    ShabbosYomTov,
    Motzi,
    FastDay,
    CholHamoed,
    ShabbosCholHamoed,
}

impl DayType {
    pub fn label(self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Erev => "erev",
            DayType::Shabbos => "shabbos",
            DayType::YomTov => "yom_tov",
            DayType::ShabbosYomTov => "shabbos_yom_tov",
            DayType::Motzi => "motzi",
            DayType::FastDay => "fast_day",
            DayType::CholHamoed => "chol_hamoed",
            DayType::ShabbosCholHamoed => "shabbos_chol_hamoed",
        }
    }

    fn priority(self) -> u8 {
        match self {
            DayType::Motzi => 6,
            DayType::Erev => 5,
            DayType::Shabbos
            | DayType::YomTov
            | DayType::ShabbosYomTov
            | DayType::ShabbosCholHamoed => 4,
            DayType::FastDay => 3,
            DayType::CholHamoed => 2,
            DayType::Weekday => 1,
        }
    }
}

struct Candidate {
    interval: Interval,
    state: DayType,
}

fn candidates(blocks: &[Block], windows: &[Window]) -> Vec<Candidate> {
    let mut out = Vec::new();

    for block in blocks {
        for day in block.days.iter().filter(|d| d.start < d.end) {
            let state = match (day.shabbos, day.yomtov, day.chol_hamoed) {
                (true, true, _) => DayType::ShabbosYomTov,
                (true, false, true) => DayType::ShabbosCholHamoed,
                (true, false, false) => DayType::Shabbos,
                _ => DayType::YomTov,
            };
            out.push(Candidate {
                interval: day.interval(),
                state,
            });
        }
    }

    for window in windows {
        let state = match window.kind {
            WindowKind::Motzi => DayType::Motzi,
            WindowKind::Erev => DayType::Erev,
            WindowKind::Holiday(id) if id.is_fast() && !id.is_yomtov() => DayType::FastDay,
            WindowKind::Holiday(id) if id.is_chol_hamoed() && id.is_aggregate() => {
                DayType::CholHamoed
            }
            _ => continue,
        };
        out.push(Candidate {
            interval: window.interval(),
            state,
        });
    }
    out
}

/// State at `t`, highest priority first.
fn state_at(candidates: &[Candidate], t: Instant) -> DayType {
    candidates
        .iter()
        .filter(|c| c.interval.contains(t))
        .map(|c| c.state)
        .max_by_key(|s| (s.priority(), *s))
        .unwrap_or(DayType::Weekday)
}

/// Day-Type windows covering `coverage` with no gap and no overlap.
pub fn timeline(blocks: &[Block], windows: &[Window], coverage: Interval) -> Vec<Window> {
    let candidates = candidates(blocks, windows);

    let mut cuts: Vec<Instant> = vec![coverage.start, coverage.end];
    for c in &candidates {
        for t in [c.interval.start, c.interval.end] {
            if coverage.contains(t) {
                cuts.push(t);
            }
        }
    }
    cuts.sort();
    cuts.dedup();

    let mut out: Vec<Window> = Vec::new();
    for pair in cuts.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let state = state_at(&candidates, start);
        match out.last_mut() {
            Some(last) if last.kind == WindowKind::DayType(state) && last.end == start => {
                last.end = end;
            }
            _ => out.push(Window::from_interval(
                WindowKind::DayType(state),
                Interval { start, end },
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::composer::{BlockClass, BlockDay};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn t(h: i64) -> Instant {
        Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn shabbos_block() -> Block {
        Block {
            start: t(16),
            end: t(42),
            class: BlockClass::PureShabbos,
            days: vec![BlockDay {
                date: NaiveDate::from_ymd_opt(2025, 1, 4).unwrap(),
                start: t(16),
                end: t(42),
                shabbos: true,
                yomtov: false,
                chol_hamoed: false,
            }],
        }
    }

    #[test]
    fn test_timeline_is_total_and_disjoint() {
        let block = shabbos_block();
        let windows = vec![
            Window::new(WindowKind::Erev, t(6), t(16)).unwrap(),
            Window::new(WindowKind::Motzi, t(42), t(50)).unwrap(),
        ];
        let coverage = Interval::new(t(0), t(72)).unwrap();
        let line = timeline(&[block], &windows, coverage);

        assert_eq!(line.first().unwrap().start, coverage.start);
        assert_eq!(line.last().unwrap().end, coverage.end);
        for pair in line.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert_ne!(pair[0].kind, pair[1].kind);
        }
        let states: Vec<WindowKind> = line.iter().map(|w| w.kind).collect();
        assert_eq!(
            states,
            vec![
                WindowKind::DayType(DayType::Weekday),
                WindowKind::DayType(DayType::Erev),
                WindowKind::DayType(DayType::Shabbos),
                WindowKind::DayType(DayType::Motzi),
                WindowKind::DayType(DayType::Weekday),
            ]
        );
    }

    #[test]
    fn test_motzi_outranks_overlapping_block() {
        let block = shabbos_block();
        let windows = vec![Window::new(WindowKind::Motzi, t(40), t(50)).unwrap()];
        let coverage = Interval::new(t(0), t(72)).unwrap();
        let line = timeline(&[block], &windows, coverage);
        let motzi = line
            .iter()
            .find(|w| w.kind == WindowKind::DayType(DayType::Motzi))
            .unwrap();
        assert_eq!(motzi.start, t(40));
    }

    #[test]
    fn test_empty_inputs_yield_single_weekday() {
        let coverage = Interval::new(t(0), t(24)).unwrap();
        let line = timeline(&[], &[], coverage);
        assert_eq!(line.len(), 1);
        assert_eq!(line[0].kind, WindowKind::DayType(DayType::Weekday));
    }
}
