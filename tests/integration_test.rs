//! End-to-end backtest scenarios over mock ports and the SQLite store.

mod common;

use common::*;
use leaptrader::domain::config::StrategyConfig;
use leaptrader::domain::engine::{BacktestEngine, END_OF_BACKTEST_REASON};
use leaptrader::domain::error::LeaptraderError;
use leaptrader::domain::signals::SignalKind;
use proptest::prelude::*;

mod full_backtest {
    use super::*;

    #[test]
    fn drifting_market_produces_trades_and_signals() {
        let data = MockDataPort::new().with_table("prices", drifting_series(500));
        let ledger = MemoryLedger::new();
        let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

        let report = engine.run().unwrap();

        assert_eq!(report.equity_curve.len(), 500);
        assert!(report.total_trades > 0, "weekly buys should close into trades");
        assert!(!ledger.signals.borrow().is_empty());
        assert_eq!(
            ledger.trades.borrow().len(),
            report.total_trades,
            "every closed trade is persisted exactly once"
        );
        assert!(report.total_return > -100.0 && report.total_return < 1000.0);
        assert!(report.max_drawdown <= 0.0);
    }

    #[test]
    fn open_set_empty_after_run() {
        let data = MockDataPort::new().with_table("prices", drifting_series(400));
        let ledger = MemoryLedger::new();
        let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

        engine.run().unwrap();

        assert_eq!(engine.open_position_count(), 0);
        let signals = ledger.signals.borrow();
        let end_close = signals
            .iter()
            .find(|s| s.kind == SignalKind::Liquidate && s.details == END_OF_BACKTEST_REASON);
        assert!(end_close.is_some(), "remaining lots force-close on the final day");
    }

    #[test]
    fn empty_price_series_is_fatal() {
        let data = MockDataPort::new().with_table("prices", vec![]);
        let ledger = MemoryLedger::new();
        let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

        match engine.run() {
            Err(LeaptraderError::NoData { table }) => assert_eq!(table, "prices"),
            other => panic!("expected NoData, got {other:?}"),
        }
    }

    #[test]
    fn missing_vix_series_is_not_fatal() {
        // No "vix" table registered: the optional lookup yields None and the
        // VIX gate is simply skipped.
        let data = MockDataPort::new().with_table("prices", drifting_series(300));
        let ledger = MemoryLedger::new();
        let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

        assert!(engine.run().is_ok());
    }

    #[test]
    fn broken_vix_store_is_fatal() {
        // A real storage failure on the optional series must still surface.
        let data = MockDataPort::new()
            .with_table("prices", drifting_series(300))
            .with_error("vix", "disk on fire");
        let ledger = MemoryLedger::new();
        let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

        assert!(engine.run().is_err());
    }

    #[test]
    fn equity_and_signal_dates_are_monotonic() {
        let data = MockDataPort::new().with_table("prices", rise_fall_series(200));
        let ledger = MemoryLedger::new();
        let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

        let report = engine.run().unwrap();

        assert!(report
            .equity_curve
            .windows(2)
            .all(|w| w[0].date < w[1].date));
        let signals = ledger.signals.borrow();
        assert!(signals.windows(2).all(|w| w[0].date <= w[1].date));
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn crash_triggers_liquidation() {
        // Flat at $500 for 150 days, then a slide to $380 (-24%).
        let data = MockDataPort::new().with_table("prices", decline_series(150, 150, 380.0));
        let ledger = MemoryLedger::new();
        let config = StrategyConfig {
            liquidate_pct_from_peak: 18.0,
            ..test_config()
        };
        let mut engine = BacktestEngine::new(config, &data, &ledger);

        engine.run().unwrap();

        let signals = ledger.signals.borrow();
        assert!(
            signals.iter().any(|s| s.kind == SignalKind::Liquidate
                && s.details != END_OF_BACKTEST_REASON),
            "the decline must liquidate before the end of the series"
        );
    }

    #[test]
    fn rise_then_fall_pauses_or_liquidates() {
        let data = MockDataPort::new().with_table("prices", rise_fall_series(200));
        let ledger = MemoryLedger::new();
        let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

        engine.run().unwrap();

        let signals = ledger.signals.borrow();
        let decline_start = date(2020, 1, 1) + chrono::Duration::days(200);
        assert!(
            signals.iter().any(|s| s.date >= decline_start
                && (s.kind == SignalKind::Pause || s.kind == SignalKind::Liquidate)),
            "the decline phase should pause buying or liquidate"
        );
    }

    #[test]
    fn oversized_weekly_buys_hit_the_exposure_gate() {
        let data = MockDataPort::new().with_table("prices", drifting_series(200));
        let ledger = MemoryLedger::new();
        let config = StrategyConfig {
            weekly_amount: 10_000.0,
            initial_capital: 100_000.0,
            max_exposure_pct: 5.0,
            ..test_config()
        };
        let mut engine = BacktestEngine::new(config, &data, &ledger);

        engine.run().unwrap();

        let signals = ledger.signals.borrow();
        assert!(
            signals.iter().any(|s| s.kind == SignalKind::MaxExposure),
            "buys cannot all succeed under a 5% exposure cap"
        );
    }

    #[test]
    fn vix_spike_pauses_buying() {
        let prices = make_bars(&vec![450.0; 120]);
        let vix = make_bars(&vec![40.0; 120]); // far above the 25 threshold
        let data = MockDataPort::new()
            .with_table("prices", prices)
            .with_table("vix", vix);
        let ledger = MemoryLedger::new();
        let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

        engine.run().unwrap();

        let signals = ledger.signals.borrow();
        let first_pause = signals.iter().find(|s| s.kind == SignalKind::Pause);
        assert!(first_pause.is_some());
        assert!(first_pause.unwrap().details.contains("VIX"));
        assert!(
            !signals.iter().any(|s| s.kind == SignalKind::Buy),
            "buying never starts under a permanent VIX spike"
        );
    }

    #[test]
    fn calm_vix_does_not_pause() {
        let prices = make_bars(&vec![450.0; 120]);
        let vix = make_bars(&vec![15.0; 120]);
        let data = MockDataPort::new()
            .with_table("prices", prices)
            .with_table("vix", vix);
        let ledger = MemoryLedger::new();
        let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

        engine.run().unwrap();

        let signals = ledger.signals.borrow();
        assert!(!signals.iter().any(|s| s.kind == SignalKind::Pause));
        assert!(signals.iter().any(|s| s.kind == SignalKind::Buy));
    }
}

mod idempotence {
    use super::*;

    #[test]
    fn identical_runs_produce_identical_results() {
        let data = MockDataPort::new().with_table("prices", rise_fall_series(150));

        let ledger_a = MemoryLedger::new();
        let report_a = BacktestEngine::new(test_config(), &data, &ledger_a)
            .run()
            .unwrap();

        let ledger_b = MemoryLedger::new();
        let report_b = BacktestEngine::new(test_config(), &data, &ledger_b)
            .run()
            .unwrap();

        assert_eq!(report_a, report_b);
        assert_eq!(*ledger_a.trades.borrow(), *ledger_b.trades.borrow());
        assert_eq!(*ledger_a.signals.borrow(), *ledger_b.signals.borrow());
    }

    #[test]
    fn rerun_clears_prior_ledger_records() {
        let data = MockDataPort::new().with_table("prices", drifting_series(300));
        let ledger = MemoryLedger::new();

        BacktestEngine::new(test_config(), &data, &ledger)
            .run()
            .unwrap();
        let first_trades = ledger.trades.borrow().len();
        let first_signals = ledger.signals.borrow().len();

        BacktestEngine::new(test_config(), &data, &ledger)
            .run()
            .unwrap();

        assert_eq!(ledger.trades.borrow().len(), first_trades);
        assert_eq!(ledger.signals.borrow().len(), first_signals);
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_pipeline {
    use super::*;
    use leaptrader::adapters::sqlite_adapter::SqliteAdapter;
    use leaptrader::ports::ledger_port::LedgerPort;

    #[test]
    fn full_pipeline_against_seeded_store() {
        let store = SqliteAdapter::in_memory().unwrap();
        store
            .insert_bars(
                "prices",
                &drifting_series(400),
            )
            .unwrap();
        store
            .insert_bars("vix", &make_bars(&vec![18.0; 400]))
            .unwrap();

        let mut engine = BacktestEngine::new(test_config(), &store, &store);
        let report = engine.run().unwrap();

        assert!(report.total_trades > 0);
        let trades = store.load_trades().unwrap();
        assert_eq!(trades.len(), report.total_trades);
        let signals = store.load_signals().unwrap();
        assert!(!signals.is_empty());
    }

    #[test]
    fn parity_with_mock_port() {
        let bars = rise_fall_series(150);

        let store = SqliteAdapter::in_memory().unwrap();
        store.insert_bars("prices", &bars).unwrap();
        let sqlite_report = BacktestEngine::new(test_config(), &store, &store)
            .run()
            .unwrap();

        let data = MockDataPort::new().with_table("prices", bars);
        let ledger = MemoryLedger::new();
        let mock_report = BacktestEngine::new(test_config(), &data, &ledger)
            .run()
            .unwrap();

        assert_eq!(sqlite_report, mock_report);
    }
}

mod properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn cash_stays_non_negative_and_everything_closes(
            closes in proptest::collection::vec(50.0f64..600.0, 30..150),
            weekly in 500.0f64..5000.0,
        ) {
            let data = MockDataPort::new().with_table("prices", make_bars(&closes));
            let ledger = MemoryLedger::new();
            let config = StrategyConfig {
                weekly_amount: weekly,
                ..test_config()
            };
            let mut engine = BacktestEngine::new(config, &data, &ledger);

            engine.run().unwrap();

            prop_assert!(engine.cash() >= 0.0);
            prop_assert_eq!(engine.open_position_count(), 0);
        }

        #[test]
        fn pnl_identity_holds_for_every_persisted_trade(
            closes in proptest::collection::vec(50.0f64..600.0, 30..150),
        ) {
            let data = MockDataPort::new().with_table("prices", make_bars(&closes));
            let ledger = MemoryLedger::new();
            let mut engine = BacktestEngine::new(test_config(), &data, &ledger);

            engine.run().unwrap();

            for trade in ledger.trades.borrow().iter() {
                let expected =
                    (trade.exit_premium - trade.entry_premium) * trade.contracts as f64 * 100.0;
                prop_assert!((trade.pnl - expected).abs() < 1e-9);
            }
        }
    }
}
