//! Cycle integration tests against an in-memory SQLite store.
//!
//! Tests cover:
//! - Morning cycle: digest, scoring, selection and persistence of picks
//! - Morning reruns, provider outages and fallback
//! - Evening cycle: equal-weight paper trades, unpriced securities, reruns
//! - Monthly cycle: aggregation over stored trades, synthetic quote exclusion
//! - A full day from news to monthly summary using the dummy providers

#![cfg(feature = "sqlite")]

mod common;

use approx::assert_relative_eq;
use common::*;
use newswatch::adapters::dummy_news_adapter::DummyNewsAdapter;
use newswatch::adapters::dummy_quote_adapter::DummyQuoteAdapter;
use newswatch::adapters::sqlite_adapter::SqliteAdapter;
use chrono::{DateTime, Utc};
use newswatch::domain::cycle::{
    Degradation, morning_cutoff, run_evening_cycle, run_monthly_cycle, run_morning_cycle,
};
use newswatch::domain::error::NewswatchError;
use newswatch::domain::news::NewsItem;
use newswatch::domain::ledger::{EntryPolicy, PaperTrade};
use newswatch::domain::performance::AggregationPolicy;
use newswatch::domain::quote::QuoteSource;
use newswatch::domain::recommendation::Recommendation;
use newswatch::domain::relevance::{RelevanceScorer, RelevanceStrategy};
use newswatch::domain::security::{Security, SecurityCatalog};
use newswatch::ports::store_port::RecordStore;

fn store() -> SqliteAdapter {
    let store = SqliteAdapter::in_memory().unwrap();
    store.initialize_schema().unwrap();
    store
}

fn scorer() -> RelevanceScorer {
    RelevanceScorer::keyword(0.2)
}

mod morning_cycle {
    use super::*;

    fn chip_feed() -> MockNewsPort {
        let cutoff = morning_cutoff(date(2024, 3, 5)).unwrap();
        MockNewsPort::new("feed")
            .with_items(
                "반도체",
                vec![
                    raw_item("삼성전자, HBM 공급 확대", "Reuters", cutoff, 1),
                    raw_item("삼성전자 실적 개선 전망", "연합뉴스", cutoff, 2),
                    raw_item("SK하이닉스 신고가 경신", "한국경제", cutoff, 3),
                    raw_item("원달러 환율 하락 마감", "매일경제", cutoff, 4),
                ],
            )
            .with_items(
                "증시",
                vec![
                    raw_item("삼성전자, HBM 공급 확대", "Bloomberg", cutoff, 1),
                    raw_item("현대차 미국 판매 호조", "연합뉴스", cutoff, 6),
                    // Published before the overnight window opens.
                    raw_item("셀트리온 유럽 승인", "연합뉴스", cutoff, 20),
                ],
            )
    }

    #[test]
    fn picks_are_ranked_and_persisted() {
        let store = store();
        let feed = chip_feed();
        let mut config = test_config(&["반도체", "증시"]);
        config.selection.max_picks = 2;
        let day = date(2024, 3, 5);

        let report = run_morning_cycle(
            &store,
            &feed,
            None,
            &scorer(),
            &config,
            day,
            morning_cutoff(day).unwrap(),
        )
        .unwrap();

        assert_eq!(report.digest_size, 5);
        assert_eq!(report.picks.len(), 2);
        assert_eq!(report.picks[0].code, "005930");
        assert_eq!(report.picks[0].priority, 1);
        assert_eq!(report.picks[0].news_ids.len(), 2);
        assert_eq!(report.picks[1].code, "000660");
        assert_eq!(report.picks[1].priority, 2);
        assert!(report.picks.iter().all(|p| p.id.is_some()));
        assert!(report.degradations.is_empty());

        let stored = store.recommendations_on(day).unwrap();
        assert_eq!(stored, report.picks);

        let registered: Vec<String> = store
            .list_securities()
            .unwrap()
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert!(registered.contains(&"005930".to_string()));
        assert!(registered.contains(&"005380".to_string()));
        assert!(!registered.contains(&"068270".to_string()));
    }

    #[test]
    fn out_of_range_relevance_aborts_before_writing() {
        struct Overshoot;
        impl RelevanceStrategy for Overshoot {
            fn name(&self) -> &str {
                "overshoot"
            }
            fn base_scores(&self, _: &NewsItem, _: &SecurityCatalog, _: DateTime<Utc>) -> Vec<(String, f64)> {
                vec![("005930".into(), 1.5)]
            }
        }

        let store = store();
        let feed = chip_feed();
        let config = test_config(&["반도체", "증시"]);
        let day = date(2024, 3, 5);
        let scorer = RelevanceScorer::new(Box::new(Overshoot), 0.0);

        let err = run_morning_cycle(
            &store,
            &feed,
            None,
            &scorer,
            &config,
            day,
            morning_cutoff(day).unwrap(),
        )
        .unwrap_err();

        assert!(matches!(err, NewswatchError::RelevanceOutOfRange { .. }));
        assert!(store.recommendations_on(day).unwrap().is_empty());
        assert!(store.list_securities().unwrap().is_empty());
    }

    #[test]
    fn rerun_keeps_existing_picks() {
        let store = store();
        let feed = chip_feed();
        let mut config = test_config(&["반도체", "증시"]);
        config.selection.max_picks = 2;
        let day = date(2024, 3, 5);
        let as_of = morning_cutoff(day).unwrap();

        run_morning_cycle(&store, &feed, None, &scorer(), &config, day, as_of).unwrap();
        let second =
            run_morning_cycle(&store, &feed, None, &scorer(), &config, day, as_of).unwrap();

        assert!(second.picks.is_empty());
        assert_eq!(second.degradations, vec![Degradation::PicksFull { existing: 2 }]);
        assert_eq!(store.recommendations_on(day).unwrap().len(), 2);
    }

    #[test]
    fn outage_falls_back_to_secondary_source() {
        let store = store();
        let primary = MockNewsPort::new("primary").failing();
        let fallback = chip_feed();
        let config = test_config(&["반도체", "증시"]);
        let day = date(2024, 3, 5);

        let report = run_morning_cycle(
            &store,
            &primary,
            Some(&fallback),
            &scorer(),
            &config,
            day,
            morning_cutoff(day).unwrap(),
        )
        .unwrap();

        // Two queries, two attempts each.
        assert_eq!(primary.calls.get(), 4);
        assert_eq!(report.news_source, "feed");
        assert!(report.degradations.contains(&Degradation::FellBack {
            from: "primary".into(),
            to: "feed".into(),
        }));
        assert!(
            report
                .degradations
                .iter()
                .any(|d| matches!(d, Degradation::UpstreamUnavailable { .. }))
        );
        assert_eq!(report.picks[0].code, "005930");
    }

    #[test]
    fn outage_without_fallback_degrades_to_empty_report() {
        let store = store();
        let primary = MockNewsPort::new("primary").failing();
        let config = test_config(&["반도체"]);
        let day = date(2024, 3, 5);

        let report = run_morning_cycle(
            &store,
            &primary,
            None,
            &scorer(),
            &config,
            day,
            morning_cutoff(day).unwrap(),
        )
        .unwrap();

        assert_eq!(report.digest_size, 0);
        assert!(report.picks.is_empty());
        assert!(report.degradations.contains(&Degradation::InsufficientDigest {
            found: 0,
            minimum: 1,
        }));
        assert!(
            report
                .degradations
                .iter()
                .any(|d| matches!(d, Degradation::NoCandidates { .. }))
        );
        assert!(store.recommendations_on(day).unwrap().is_empty());
    }

    #[test]
    fn watchlist_boost_reorders_picks() {
        let store = store();
        let day = date(2024, 3, 5);
        let cutoff = morning_cutoff(day).unwrap();
        let feed = MockNewsPort::new("feed").with_items(
            "증시",
            vec![
                raw_item("삼성전자 주가 강세", "연합뉴스", cutoff, 6),
                raw_item("네이버 AI 검색 서비스 공개", "연합뉴스", cutoff, 1),
            ],
        );
        let mut config = test_config(&["증시"]);
        config.selection.max_picks = 1;
        config.scoring.watchlist = newswatch::domain::security::Watchlist::new(["NAVER"]);

        let report =
            run_morning_cycle(&store, &feed, None, &scorer(), &config, day, cutoff).unwrap();
        assert_eq!(report.picks.len(), 1);
        assert_eq!(report.picks[0].code, "035420");
    }
}

mod evening_cycle {
    use super::*;

    fn seeded(day: chrono::NaiveDate) -> SqliteAdapter {
        let store = store();
        store
            .upsert_security(&Security::new("005930", "삼성전자", "KOSPI"))
            .unwrap();
        store
            .upsert_security(&Security::new("000660", "SK하이닉스", "KOSPI"))
            .unwrap();
        let recs = vec![
            Recommendation {
                id: None,
                date: day,
                code: "005930".into(),
                name: "삼성전자".into(),
                priority: 1,
                rationale: "2 news item(s)".into(),
                news_ids: vec![],
            },
            Recommendation {
                id: None,
                date: day,
                code: "000660".into(),
                name: "SK하이닉스".into(),
                priority: 2,
                rationale: "1 news item(s)".into(),
                news_ids: vec![],
            },
        ];
        store.insert_recommendations(&recs).unwrap();
        store
    }

    fn csv_quotes(day: chrono::NaiveDate) -> MockQuotePort {
        MockQuotePort::new(QuoteSource::Csv)
            .with_quote(daily_quote("005930", day, 50_000.0, 51_000.0, 49_500.0, QuoteSource::Csv))
            .with_quote(daily_quote(
                "000660",
                day,
                100_000.0,
                98_000.0,
                101_000.0,
                QuoteSource::Csv,
            ))
    }

    #[test]
    fn trades_are_equal_weight() {
        let day = date(2024, 3, 4);
        let store = seeded(day);
        let config = test_config(&[]);

        let report = run_evening_cycle(&store, &csv_quotes(day), None, &config, day).unwrap();

        assert!(report.persisted);
        assert_relative_eq!(report.ledger.allocation_per_security, 5_000_000.0);
        let trades = store.paper_trades_on(day).unwrap();
        assert_eq!(trades.len(), 2);

        let samsung = trades.iter().find(|t| t.code == "005930").unwrap();
        assert_eq!(samsung.quantity, 100);
        assert_relative_eq!(samsung.pnl, 100_000.0);
        assert!(samsung.recommendation_id.is_some());
        assert_eq!(samsung.quote_source, QuoteSource::Csv);

        let hynix = trades.iter().find(|t| t.code == "000660").unwrap();
        assert_eq!(hynix.quantity, 50);
        assert_relative_eq!(hynix.pnl, -100_000.0);
    }

    #[test]
    fn prior_close_policy_enters_at_previous_close() {
        let day = date(2024, 3, 4);
        let store = seeded(day);
        let mut config = test_config(&[]);
        config.ledger.entry_policy = EntryPolicy::PriorClose;

        let report = run_evening_cycle(&store, &csv_quotes(day), None, &config, day).unwrap();
        let trade = report
            .ledger
            .trades
            .iter()
            .find(|t| t.code == "005930")
            .unwrap();
        assert_relative_eq!(trade.entry_price, 49_500.0);
        assert_eq!(trade.quantity, 101);
    }

    #[test]
    fn rerun_reports_settled_day() {
        let day = date(2024, 3, 4);
        let store = seeded(day);
        let config = test_config(&[]);
        let quotes = csv_quotes(day);

        run_evening_cycle(&store, &quotes, None, &config, day).unwrap();
        let second = run_evening_cycle(&store, &quotes, None, &config, day).unwrap();

        assert!(!second.persisted);
        assert_eq!(second.ledger.trades.len(), 2);
        assert_eq!(
            second.degradations,
            vec![Degradation::AlreadySettled { trades: 2 }]
        );
        assert_eq!(store.paper_trades_on(day).unwrap().len(), 2);
    }

    #[test]
    fn missing_quote_leaves_security_unpriced() {
        let day = date(2024, 3, 4);
        let store = seeded(day);
        let config = test_config(&[]);
        let quotes = MockQuotePort::new(QuoteSource::Csv).with_quote(daily_quote(
            "005930",
            day,
            50_000.0,
            51_000.0,
            49_500.0,
            QuoteSource::Csv,
        ));

        let report = run_evening_cycle(&store, &quotes, None, &config, day).unwrap();

        assert_eq!(report.ledger.trades.len(), 1);
        assert_eq!(report.ledger.unpriced.len(), 1);
        assert_eq!(report.ledger.unpriced[0].code, "000660");
        // Allocation still divides by every recommendation.
        assert_relative_eq!(report.ledger.allocation_per_security, 5_000_000.0);
        assert!(
            report
                .degradations
                .iter()
                .any(|d| matches!(d, Degradation::QuoteUnavailable { code, .. } if code == "000660"))
        );
        assert_eq!(store.paper_trades_on(day).unwrap().len(), 1);
        // Missing quotes are not retried.
        assert_eq!(quotes.calls.get(), 2);
    }

    #[test]
    fn outage_falls_back_to_dummy_quotes() {
        let day = date(2024, 3, 4);
        let store = seeded(day);
        let config = test_config(&[]);
        let primary = MockQuotePort::new(QuoteSource::Csv).failing();

        let report =
            run_evening_cycle(&store, &primary, Some(&DummyQuoteAdapter), &config, day).unwrap();

        assert_eq!(report.ledger.trades.len(), 2);
        assert!(
            report
                .ledger
                .trades
                .iter()
                .all(|t| t.quote_source == QuoteSource::Dummy)
        );
        assert!(report.degradations.contains(&Degradation::FellBack {
            from: "csv".into(),
            to: "dummy".into(),
        }));
    }

    #[test]
    fn day_without_recommendations_is_reported() {
        let store = store();
        let config = test_config(&[]);
        let day = date(2024, 3, 4);

        let report = run_evening_cycle(&store, &csv_quotes(day), None, &config, day).unwrap();

        assert!(!report.persisted);
        assert!(report.ledger.trades.is_empty());
        assert_eq!(report.degradations, vec![Degradation::NoRecommendations]);
    }
}

mod monthly_cycle {
    use super::*;

    fn trade(code: &str, day: chrono::NaiveDate, pnl: f64, source: QuoteSource) -> PaperTrade {
        PaperTrade {
            date: day,
            code: code.into(),
            name: code.into(),
            recommendation_id: None,
            entry_date: day,
            entry_price: 1_000.0,
            current_price: 1_000.0 + pnl,
            quantity: 1,
            invested_amount: 1_000.0,
            current_value: 1_000.0 + pnl,
            pnl,
            pnl_rate: pnl / 1_000.0,
            quote_source: source,
        }
    }

    fn seeded() -> SqliteAdapter {
        let store = store();
        for code in ["005930", "000660"] {
            store
                .upsert_security(&Security::new(code, code, "KOSPI"))
                .unwrap();
        }
        let days = [
            (date(2024, 3, 4), 100.0),
            (date(2024, 3, 5), -50.0),
            (date(2024, 3, 6), -80.0),
            (date(2024, 3, 7), 200.0),
        ];
        for (day, pnl) in days {
            store
                .append_paper_trades(&[trade("005930", day, pnl, QuoteSource::Csv)])
                .unwrap();
        }
        store
            .append_paper_trades(&[trade("000660", date(2024, 3, 8), -500.0, QuoteSource::Dummy)])
            .unwrap();
        // Outside the month.
        store
            .append_paper_trades(&[trade("005930", date(2024, 4, 1), 999.0, QuoteSource::Csv)])
            .unwrap();
        store
    }

    #[test]
    fn month_excludes_synthetic_quotes_by_default() {
        let store = seeded();
        let report = run_monthly_cycle(&store, &AggregationPolicy::default(), 2024, 3).unwrap();
        let summary = &report.monthly.summary;

        assert_eq!(summary.trade_count, 4);
        assert_eq!(summary.excluded_count, 1);
        assert_relative_eq!(summary.total_pnl, 170.0);
        assert_relative_eq!(summary.max_drawdown.amount, 130.0);
        assert_eq!(summary.win_count, 2);
        assert_eq!(
            report.degradations,
            vec![Degradation::DegenerateExcluded { count: 1 }]
        );
    }

    #[test]
    fn include_degenerate_counts_every_trade() {
        let store = seeded();
        let policy = AggregationPolicy {
            include_degenerate: true,
            ..AggregationPolicy::default()
        };
        let report = run_monthly_cycle(&store, &policy, 2024, 3).unwrap();
        let summary = &report.monthly.summary;

        assert_eq!(summary.trade_count, 5);
        assert_relative_eq!(summary.total_pnl, -330.0);
        assert_eq!(summary.worst_security.as_ref().unwrap().code, "000660");
        assert!(report.degradations.is_empty());
    }

    #[test]
    fn empty_month_is_reported() {
        let store = seeded();
        let report = run_monthly_cycle(&store, &AggregationPolicy::default(), 2024, 2).unwrap();
        assert_eq!(report.monthly.summary.trade_count, 0);
        assert_eq!(report.degradations, vec![Degradation::NoTrades]);
    }
}

mod full_day {
    use super::*;

    #[test]
    fn dummy_providers_run_end_to_end() {
        let store = store();
        let config = test_config(&["반도체", "증시"]);
        let day = date(2024, 3, 5);

        let morning = run_morning_cycle(
            &store,
            &DummyNewsAdapter,
            None,
            &scorer(),
            &config,
            day,
            morning_cutoff(day).unwrap(),
        )
        .unwrap();
        assert_eq!(morning.digest_size, 12);
        assert_eq!(morning.picks.len(), 3);
        let priorities: Vec<u32> = morning.picks.iter().map(|p| p.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3]);

        let evening = run_evening_cycle(&store, &DummyQuoteAdapter, None, &config, day).unwrap();
        assert_eq!(evening.ledger.trades.len(), 3);
        assert!(evening.ledger.total_invested() <= config.ledger.total_capital);

        let excluded = run_monthly_cycle(&store, &config.aggregation, 2024, 3).unwrap();
        assert_eq!(excluded.monthly.summary.trade_count, 0);
        assert_eq!(excluded.monthly.summary.excluded_count, 3);

        let policy = AggregationPolicy {
            include_degenerate: true,
            ..config.aggregation
        };
        let included = run_monthly_cycle(&store, &policy, 2024, 3).unwrap();
        assert_eq!(included.monthly.summary.trade_count, 3);
        assert!(included.to_string().contains("2024-03"));
    }
}
