//! SQLite record store.

use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};

use crate::domain::error::NewswatchError;
use crate::domain::ledger::PaperTrade;
use crate::domain::news::NewsItem;
use crate::domain::quote::{Quote, QuoteSource};
use crate::domain::recommendation::Recommendation;
use crate::domain::relevance::RelevanceScore;
use crate::domain::security::Security;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::RecordStore;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    market TEXT NOT NULL DEFAULT '',
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS news (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fingerprint TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    content TEXT,
    source TEXT NOT NULL,
    sources TEXT NOT NULL,
    url TEXT NOT NULL,
    published_at TEXT NOT NULL,
    collected_at TEXT NOT NULL,
    summary TEXT
);
CREATE TABLE IF NOT EXISTS news_symbols (
    news_id INTEGER NOT NULL REFERENCES news(id),
    symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    relevance_score REAL NOT NULL CHECK (relevance_score >= 0.0 AND relevance_score <= 1.0),
    PRIMARY KEY (news_id, symbol_id)
);
CREATE TABLE IF NOT EXISTS recommendations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    reason TEXT NOT NULL,
    news_ids TEXT NOT NULL,
    priority INTEGER NOT NULL CHECK (priority >= 1),
    UNIQUE (date, symbol_id)
);
CREATE TABLE IF NOT EXISTS daily_prices (
    symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume INTEGER NOT NULL,
    change_rate REAL,
    PRIMARY KEY (symbol_id, date)
);
CREATE TABLE IF NOT EXISTS paper_trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    recommendation_id INTEGER REFERENCES recommendations(id),
    entry_date TEXT NOT NULL,
    entry_price REAL NOT NULL,
    current_price REAL NOT NULL,
    quantity INTEGER NOT NULL,
    invested_amount REAL NOT NULL,
    current_value REAL NOT NULL,
    pnl REAL NOT NULL,
    pnl_rate REAL NOT NULL,
    quote_source TEXT NOT NULL,
    UNIQUE (date, symbol_id)
);
CREATE INDEX IF NOT EXISTS idx_news_published ON news(published_at);
CREATE INDEX IF NOT EXISTS idx_recommendations_date ON recommendations(date);
CREATE INDEX IF NOT EXISTS idx_paper_trades_date ON paper_trades(date);
";

const TRADE_COLUMNS: &str = "t.date, s.symbol, s.name, t.recommendation_id, t.entry_date,
    t.entry_price, t.current_price, t.quantity, t.invested_amount, t.current_value,
    t.pnl, t.pnl_rate, t.quote_source";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> NewswatchError {
    NewswatchError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<PaperTrade> {
    let date: String = row.get(0)?;
    let entry_date: String = row.get(4)?;
    let source: String = row.get(12)?;
    Ok(PaperTrade {
        date: parse_date(0, &date)?,
        code: row.get(1)?,
        name: row.get(2)?,
        recommendation_id: row.get(3)?,
        entry_date: parse_date(4, &entry_date)?,
        entry_price: row.get(5)?,
        current_price: row.get(6)?,
        quantity: row.get(7)?,
        invested_amount: row.get(8)?,
        current_value: row.get(9)?,
        pnl: row.get(10)?,
        pnl_rate: row.get(11)?,
        quote_source: QuoteSource::from_tag(&source),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, NewswatchError> {
        let db_path =
            config
                .get_string("database", "path")
                .ok_or_else(|| NewswatchError::ConfigMissing {
                    section: "database".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("database", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| NewswatchError::Database {
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %db_path, pool_size, "sqlite pool ready");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, NewswatchError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| NewswatchError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, NewswatchError> {
        self.pool.get().map_err(|e: r2d2::Error| NewswatchError::Database {
            reason: e.to_string(),
        })
    }

    fn symbol_id(conn: &rusqlite::Connection, code: &str) -> Result<i64, NewswatchError> {
        conn.query_row("SELECT id FROM symbols WHERE symbol = ?1", params![code], |row| row.get(0))
            .optional()
            .map_err(query_err)?
            .ok_or_else(|| NewswatchError::invariant(format!("security {code} is not registered")))
    }

    fn trades_where(
        &self,
        clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<PaperTrade>, NewswatchError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {TRADE_COLUMNS}
             FROM paper_trades t JOIN symbols s ON s.id = t.symbol_id
             WHERE {clause}
             ORDER BY t.date ASC, s.symbol ASC"
        );
        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt.query_map(args, trade_from_row).map_err(query_err)?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(row.map_err(query_err)?);
        }
        Ok(trades)
    }
}

impl RecordStore for SqliteAdapter {
    fn initialize_schema(&self) -> Result<(), NewswatchError> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA).map_err(query_err)?;
        Ok(())
    }

    fn upsert_security(&self, security: &Security) -> Result<i64, NewswatchError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO symbols (symbol, name, market) VALUES (?1, ?2, ?3)
             ON CONFLICT(symbol) DO UPDATE SET
                name = excluded.name,
                market = excluded.market,
                updated_at = CURRENT_TIMESTAMP",
            params![security.code, security.name, security.market],
        )
        .map_err(query_err)?;
        Self::symbol_id(&conn, &security.code)
    }

    fn list_securities(&self) -> Result<Vec<Security>, NewswatchError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT symbol, name, market FROM symbols ORDER BY symbol")
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Security::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(query_err)?;

        let mut securities = Vec::new();
        for row in rows {
            securities.push(row.map_err(query_err)?);
        }
        Ok(securities)
    }

    fn insert_news(&self, item: &NewsItem) -> Result<i64, NewswatchError> {
        let conn = self.conn()?;
        let fingerprint = item.fingerprint();
        let sources = serde_json::to_string(&item.sources).map_err(|e| NewswatchError::DatabaseQuery {
            reason: e.to_string(),
        })?;
        conn.execute(
            "INSERT INTO news (fingerprint, title, content, source, sources, url,
                               published_at, collected_at, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(fingerprint) DO NOTHING",
            params![
                fingerprint,
                item.title,
                item.body,
                item.source,
                sources,
                item.url,
                item.published_at.to_rfc3339(),
                item.collected_at.to_rfc3339(),
                item.summary
            ],
        )
        .map_err(query_err)?;
        conn.query_row(
            "SELECT id FROM news WHERE fingerprint = ?1",
            params![fingerprint],
            |row| row.get(0),
        )
        .map_err(query_err)
    }

    fn upsert_news_link(
        &self,
        news_id: i64,
        code: &str,
        score: RelevanceScore,
    ) -> Result<(), NewswatchError> {
        let conn = self.conn()?;
        let symbol_id = Self::symbol_id(&conn, code)?;
        conn.execute(
            "INSERT INTO news_symbols (news_id, symbol_id, relevance_score) VALUES (?1, ?2, ?3)
             ON CONFLICT(news_id, symbol_id) DO UPDATE SET relevance_score = excluded.relevance_score",
            params![news_id, symbol_id, score.value()],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn insert_recommendations(
        &self,
        recommendations: &[Recommendation],
    ) -> Result<Vec<i64>, NewswatchError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut ids = Vec::with_capacity(recommendations.len());
        for rec in recommendations {
            let symbol_id = Self::symbol_id(&tx, &rec.code)?;
            let news_ids = serde_json::to_string(&rec.news_ids).map_err(|e| {
                NewswatchError::DatabaseQuery {
                    reason: e.to_string(),
                }
            })?;
            tx.execute(
                "INSERT INTO recommendations (date, symbol_id, reason, news_ids, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    rec.date.format(DATE_FORMAT).to_string(),
                    symbol_id,
                    rec.rationale,
                    news_ids,
                    rec.priority
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    NewswatchError::DuplicateRecommendation {
                        date: rec.date,
                        code: rec.code.clone(),
                    }
                } else {
                    query_err(e)
                }
            })?;
            ids.push(tx.last_insert_rowid());
        }

        tx.commit().map_err(query_err)?;
        Ok(ids)
    }

    fn recommendations_on(&self, date: NaiveDate) -> Result<Vec<Recommendation>, NewswatchError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.date, s.symbol, s.name, r.priority, r.reason, r.news_ids
                 FROM recommendations r JOIN symbols s ON s.id = r.symbol_id
                 WHERE r.date = ?1
                 ORDER BY r.priority ASC, s.symbol ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                let date: String = row.get(1)?;
                let news_ids: String = row.get(6)?;
                Ok(Recommendation {
                    id: Some(row.get(0)?),
                    date: parse_date(1, &date)?,
                    code: row.get(2)?,
                    name: row.get(3)?,
                    priority: row.get(4)?,
                    rationale: row.get(5)?,
                    news_ids: parse_json(6, &news_ids)?,
                })
            })
            .map_err(query_err)?;

        let mut recommendations = Vec::new();
        for row in rows {
            recommendations.push(row.map_err(query_err)?);
        }
        Ok(recommendations)
    }

    fn upsert_daily_price(&self, quote: &Quote) -> Result<(), NewswatchError> {
        let conn = self.conn()?;
        let symbol_id = Self::symbol_id(&conn, &quote.code)?;
        conn.execute(
            "INSERT INTO daily_prices (symbol_id, date, open, high, low, close, volume, change_rate)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(symbol_id, date) DO UPDATE SET
                open = excluded.open, high = excluded.high, low = excluded.low,
                close = excluded.close, volume = excluded.volume,
                change_rate = excluded.change_rate",
            params![
                symbol_id,
                quote.date.format(DATE_FORMAT).to_string(),
                quote.open,
                quote.high,
                quote.low,
                quote.close,
                quote.volume,
                quote.change_rate
            ],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn append_paper_trades(&self, trades: &[PaperTrade]) -> Result<(), NewswatchError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for trade in trades {
            let symbol_id = Self::symbol_id(&tx, &trade.code)?;
            tx.execute(
                "INSERT INTO paper_trades (date, symbol_id, recommendation_id, entry_date,
                    entry_price, current_price, quantity, invested_amount, current_value,
                    pnl, pnl_rate, quote_source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    trade.date.format(DATE_FORMAT).to_string(),
                    symbol_id,
                    trade.recommendation_id,
                    trade.entry_date.format(DATE_FORMAT).to_string(),
                    trade.entry_price,
                    trade.current_price,
                    trade.quantity,
                    trade.invested_amount,
                    trade.current_value,
                    trade.pnl,
                    trade.pnl_rate,
                    trade.quote_source.tag()
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    NewswatchError::DuplicateTrade {
                        date: trade.date,
                        code: trade.code.clone(),
                    }
                } else {
                    query_err(e)
                }
            })?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn paper_trades_on(&self, date: NaiveDate) -> Result<Vec<PaperTrade>, NewswatchError> {
        let day = date.format(DATE_FORMAT).to_string();
        self.trades_where("t.date = ?1", params![day])
    }

    fn paper_trades_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PaperTrade>, NewswatchError> {
        let from = start.format(DATE_FORMAT).to_string();
        let to = end.format(DATE_FORMAT).to_string();
        self.trades_where("t.date >= ?1 AND t.date <= ?2", params![from, to])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn store() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn news(title: &str, source: &str) -> NewsItem {
        let at = Utc.with_ymd_and_hms(2024, 3, 3, 22, 0, 0).unwrap();
        let mut item = NewsItem::from_raw(&crate::domain::news::RawNewsItem {
            title: title.into(),
            body: Some("body".into()),
            source: source.into(),
            url: "https://news.example/x".into(),
            published_at: at,
            collected_at: at,
        });
        item.sources = vec![source.to_string(), "Other".to_string()];
        item
    }

    fn rec(code: &str, priority: u32) -> Recommendation {
        Recommendation {
            id: None,
            date: date(),
            code: code.into(),
            name: String::new(),
            priority,
            rationale: "r".into(),
            news_ids: vec![3, 1],
        }
    }

    fn trade(code: &str, pnl: f64) -> PaperTrade {
        PaperTrade {
            date: date(),
            code: code.into(),
            name: String::new(),
            recommendation_id: None,
            entry_date: date(),
            entry_price: 100.0,
            current_price: 100.0 + pnl / 10.0,
            quantity: 10,
            invested_amount: 1_000.0,
            current_value: 1_000.0 + pnl,
            pnl,
            pnl_rate: pnl / 1_000.0,
            quote_source: QuoteSource::Dummy,
        }
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(NewswatchError::ConfigMissing { section, key }) => {
                assert_eq!(section, "database");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let adapter = store();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn security_upsert_keeps_row_id() {
        let adapter = store();
        let first = adapter.upsert_security(&Security::new("005930", "삼성전자", "KOSPI")).unwrap();
        let second = adapter
            .upsert_security(&Security::new("005930", "Samsung Elec", "KOSPI"))
            .unwrap();
        assert_eq!(first, second);
        let all = adapter.list_securities().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Samsung Elec");
    }

    #[test]
    fn news_dedups_on_fingerprint() {
        let adapter = store();
        let a = adapter.insert_news(&news("Fed holds rates", "Reuters")).unwrap();
        let b = adapter.insert_news(&news("FED holds rates!", "reuters")).unwrap();
        let c = adapter.insert_news(&news("Fed holds rates", "Bloomberg")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn news_link_rescoring_overwrites() {
        let adapter = store();
        adapter.upsert_security(&Security::new("A", "Alpha", "KOSPI")).unwrap();
        let id = adapter.insert_news(&news("Alpha wins", "x")).unwrap();
        adapter.upsert_news_link(id, "A", RelevanceScore::new(0.4).unwrap()).unwrap();
        adapter.upsert_news_link(id, "A", RelevanceScore::new(0.9).unwrap()).unwrap();
        let conn = adapter.conn().unwrap();
        let (count, score): (i64, f64) = conn
            .query_row("SELECT COUNT(*), MAX(relevance_score) FROM news_symbols", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(score, 0.9);
    }

    #[test]
    fn link_to_unknown_security_is_invariant_violation() {
        let adapter = store();
        let id = adapter.insert_news(&news("x", "y")).unwrap();
        let err = adapter
            .upsert_news_link(id, "ZZZ", RelevanceScore::new(0.5).unwrap())
            .unwrap_err();
        assert!(matches!(err, NewswatchError::InvariantViolation { .. }));
    }

    #[test]
    fn recommendations_round_trip_in_priority_order() {
        let adapter = store();
        adapter.upsert_security(&Security::new("A", "Alpha", "KOSPI")).unwrap();
        adapter.upsert_security(&Security::new("B", "Beta", "KOSPI")).unwrap();
        let ids = adapter.insert_recommendations(&[rec("B", 2), rec("A", 1)]).unwrap();
        assert_eq!(ids.len(), 2);

        let stored = adapter.recommendations_on(date()).unwrap();
        assert_eq!(stored[0].code, "A");
        assert_eq!(stored[0].name, "Alpha");
        assert_eq!(stored[0].news_ids, vec![3, 1]);
        assert_eq!(stored[1].id, Some(ids[0]));
        assert!(adapter.recommendations_on(date().succ_opt().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn duplicate_recommendation_rolls_back_batch() {
        let adapter = store();
        adapter.upsert_security(&Security::new("A", "Alpha", "KOSPI")).unwrap();
        adapter.upsert_security(&Security::new("B", "Beta", "KOSPI")).unwrap();
        adapter.insert_recommendations(&[rec("A", 1)]).unwrap();

        let err = adapter.insert_recommendations(&[rec("B", 1), rec("A", 2)]).unwrap_err();
        assert!(matches!(err, NewswatchError::DuplicateRecommendation { .. }));
        assert_eq!(adapter.recommendations_on(date()).unwrap().len(), 1);
    }

    #[test]
    fn paper_trades_append_only() {
        let adapter = store();
        adapter.upsert_security(&Security::new("A", "Alpha", "KOSPI")).unwrap();
        adapter.upsert_security(&Security::new("B", "Beta", "KOSPI")).unwrap();
        adapter.append_paper_trades(&[trade("B", -5.0), trade("A", 12.0)]).unwrap();

        let err = adapter.append_paper_trades(&[trade("A", 1.0)]).unwrap_err();
        assert!(matches!(err, NewswatchError::DuplicateTrade { .. }));

        let stored = adapter.paper_trades_on(date()).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].code, "A");
        assert_eq!(stored[0].name, "Alpha");
        assert_eq!(stored[0].pnl, 12.0);
        assert_eq!(stored[0].quote_source, QuoteSource::Dummy);

        let window = adapter
            .paper_trades_between(date().pred_opt().unwrap(), date())
            .unwrap();
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn daily_price_upsert() {
        let adapter = store();
        adapter.upsert_security(&Security::new("A", "Alpha", "KOSPI")).unwrap();
        let mut quote = Quote {
            code: "A".into(),
            date: date(),
            open: 1.0,
            high: 2.0,
            low: 1.0,
            close: 1.5,
            volume: 10,
            change_rate: Some(0.5),
        };
        adapter.upsert_daily_price(&quote).unwrap();
        quote.close = 1.8;
        adapter.upsert_daily_price(&quote).unwrap();
        let conn = adapter.conn().unwrap();
        let close: f64 = conn
            .query_row("SELECT close FROM daily_prices", [], |r| r.get(0))
            .unwrap();
        assert_eq!(close, 1.8);
    }
}
