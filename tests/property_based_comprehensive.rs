//! Property-based tests for the sampling core
//!
//! Core features tested:
//! 1. Utilization attribution and history baselines
//! 2. Per-core aggregation and ranking
//! 3. Stat record parsing
//! 4. Absolute-cadence scheduling

use proptest::prelude::*;
use std::time::Duration;

use percore::accounting::{format_stat_line, parse_stat_line};
use percore::aggregator::{CoreAggregator, ReportMode};
use percore::clock::TickClock;
use percore::history::ThreadStateTable;
use percore::scheduler::{ManualClock, SampleScheduler, WallClock};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_utilization_is_never_negative(
        baseline in 0.0f64..10_000.0,
        steps in prop::collection::vec((0.01f64..5.0, 0.0f64..50.0), 1..20),
    ) {
        // Property: arbitrary (even decreasing) CPU counters never yield negative load
        let mut table = ThreadStateTable::with_baseline(baseline);
        let mut uptime = baseline;
        for (advance, cpu) in steps {
            uptime += advance;
            let u = table.update(7, uptime, cpu, 0.0).unwrap();
            prop_assert!(u >= 0.0);
            prop_assert!(u.is_finite());
            table.finish_cycle(uptime);
        }
    }

    #[test]
    fn prop_backwards_counter_reads_as_idle(
        first in 1.0f64..100.0,
        drop in 0.001f64..1.0,
    ) {
        let mut table = ThreadStateTable::with_baseline(10.0);
        table.update(1, 11.0, first, 0.0).unwrap();
        let u = table.update(1, 12.0, first - drop, 0.0).unwrap();
        prop_assert_eq!(u, 0.0);
        // The lower value becomes the new reference
        prop_assert_eq!(table.get(1).unwrap().last_cpu_seconds, first - drop);
    }

    #[test]
    fn prop_first_observation_uses_later_baseline(
        previous in 1.0f64..1000.0,
        start_offset in -50.0f64..50.0,
        run in 0.01f64..10.0,
        busy in 0.0f64..1.0,
    ) {
        // Property: a new thread is measured from max(thread start, previous cycle)
        let start = (previous + start_offset).max(0.0);
        let baseline = previous.max(start);
        let now = baseline + run;
        let cpu = busy * run;

        let mut table = ThreadStateTable::with_baseline(previous);
        let u = table.update(3, now, cpu, start).unwrap();
        prop_assert!((u - busy).abs() < 1e-6, "u={} busy={}", u, busy);
    }

    #[test]
    fn prop_non_advancing_uptime_is_rejected(
        uptime in 0.0f64..1000.0,
        back in 0.0f64..10.0,
    ) {
        let mut table = ThreadStateTable::with_baseline(uptime);
        prop_assert!(table.update(9, uptime - back, 1.0, 0.0).is_err());
        prop_assert!(table.get(9).is_none());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_aggregation_conserves_total(
        core_count in 1usize..64,
        adds in prop::collection::vec((0usize..64, 0.0f64..2.0), 0..50),
    ) {
        // Property: the vector sums to exactly what was routed to valid cores
        let mut aggregator = CoreAggregator::new(core_count);
        let mut expected = 0.0;
        for (core, u) in &adds {
            match aggregator.add(*core, *u) {
                Ok(()) => expected += u,
                Err(_) => {
                    prop_assert!(*core >= core_count);
                }
            }
        }
        let snapshot = aggregator.snapshot();
        prop_assert_eq!(snapshot.len(), core_count);
        let total: f64 = snapshot.iter().sum();
        prop_assert!((total - expected).abs() < 1e-9);
    }

    #[test]
    fn prop_begin_cycle_resets(
        core_count in 1usize..32,
        adds in prop::collection::vec((0usize..32, 0.0f64..1.0), 1..20),
    ) {
        let mut aggregator = CoreAggregator::new(core_count);
        for (core, u) in adds {
            let _ = aggregator.add(core, u);
        }
        aggregator.begin_cycle(core_count);
        prop_assert!(aggregator.snapshot().iter().all(|v| *v == 0.0));
        prop_assert_eq!(aggregator.active_cores(), 0);
    }

    #[test]
    fn prop_busiest_report_is_sorted_prefix(
        core_count in 1usize..32,
        adds in prop::collection::vec((0usize..32, 0.0f64..1.0), 0..40),
        top_n in 1usize..40,
    ) {
        let mut aggregator = CoreAggregator::new(core_count);
        for (core, u) in adds {
            let _ = aggregator.add(core, u);
        }
        let ranked = aggregator.report(ReportMode::Busiest, Some(top_n));
        prop_assert_eq!(ranked.len(), top_n.min(core_count));
        prop_assert!(ranked.windows(2).all(|w| w[0] >= w[1]));
        let full = aggregator.sorted_snapshot();
        prop_assert_eq!(&full[..ranked.len()], &ranked[..]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_stat_parser_handles_any_comm(
        tid in 1u32..4_000_000,
        comm in "[ -~]{0,15}",
        ticks in 0u64..u64::from(u32::MAX),
        start in 0u64..u64::from(u32::MAX),
        core in 0usize..1024,
    ) {
        // Property: command names with spaces or parentheses never shift fields
        let line = format_stat_line(tid, &comm, ticks, start, core);
        let record = parse_stat_line(&line, tid).unwrap();
        prop_assert_eq!(record.cpu_ticks, ticks);
        prop_assert_eq!(record.start_tick, start);
        prop_assert_eq!(record.core, core);
    }

    #[test]
    fn prop_stat_parser_never_panics(line in "\\PC{0,200}") {
        let _ = parse_stat_line(&line, 1);
    }

    #[test]
    fn prop_ticks_to_seconds_is_linear(hz in 1i64..10_000, ticks in 0u64..1_000_000) {
        let clock = TickClock::new(hz).unwrap();
        let secs = clock.ticks_to_seconds(ticks);
        prop_assert!((secs * hz as f64 - ticks as f64).abs() < 1e-6);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_wakes_never_drift(
        cadence_ms in 1u64..5_000,
        work_ms in prop::collection::vec(0u64..10_000, 1..30),
    ) {
        // Property: whatever each cycle costs, cycle k never starts before
        // start + k * cadence, and starts exactly then when nothing overran
        let cadence = Duration::from_millis(cadence_ms);
        let clock = ManualClock::new();
        let mut scheduler = SampleScheduler::new(cadence, &clock).unwrap();
        scheduler.start();

        for (i, work) in work_ms.iter().enumerate() {
            let before = clock.now();
            scheduler.wait_next();
            let k = i as u32 + 1;
            let target = cadence * k;
            let woke = clock.now();
            prop_assert!(woke >= target);
            if before <= target {
                prop_assert_eq!(woke, target);
            } else {
                prop_assert_eq!(woke, before);
            }
            clock.advance(Duration::from_millis(*work));
        }
    }
}
