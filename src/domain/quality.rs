//! News quality heuristics: source reliability, headline hygiene, freshness.
//!
//! All functions take an explicit `as_of` instant where time matters, so the
//! digest ranking stays reproducible.

use chrono::{DateTime, Utc};

use super::normalizer::jaccard_similarity;

const DEFAULT_RELIABILITY: f64 = 0.5;

const SOURCE_RELIABILITY: &[(&str, f64)] = &[
    ("연합뉴스", 1.0),
    ("한국경제", 0.95),
    ("매일경제", 0.95),
    ("서울경제", 0.95),
    ("이데일리", 0.9),
    ("뉴스1", 0.9),
    ("뉴시스", 0.9),
    ("조선일보", 0.9),
    ("중앙일보", 0.9),
    ("동아일보", 0.9),
    ("전자신문", 0.9),
    ("kbs", 0.9),
    ("bloomberg", 1.0),
    ("reuters", 1.0),
    ("wall street journal", 0.95),
    ("financial times", 0.95),
    ("cnbc", 0.9),
];

/// Market-moving vocabulary and its weight in the importance estimate.
const MARKET_KEYWORDS: &[(&str, f64)] = &[
    ("증시", 10.0),
    ("주가", 10.0),
    ("코스피", 10.0),
    ("코스닥", 10.0),
    ("kospi", 10.0),
    ("kosdaq", 10.0),
    ("나스닥", 10.0),
    ("nasdaq", 10.0),
    ("s&p", 10.0),
    ("연준", 9.0),
    ("fed", 9.0),
    ("금리", 9.0),
    ("cpi", 9.0),
    ("인플레이션", 9.0),
    ("반도체", 9.0),
    ("hbm", 9.0),
    ("dram", 9.0),
    ("엔비디아", 9.0),
    ("nvidia", 9.0),
    ("환율", 8.0),
    ("달러", 8.0),
    ("유가", 8.0),
    ("wti", 8.0),
    ("실적", 7.0),
    ("earnings", 7.0),
    ("수출", 7.0),
    ("관세", 7.0),
    ("tariff", 7.0),
];

const CLICKBAIT_KEYWORDS: &[&str] = &[
    "대박",
    "폭발",
    "지금 담아라",
    "무조건",
    "충격",
    "역대급",
    "100%",
    "must buy",
    "shocking",
    "skyrocket",
];

/// Keywords marking lifestyle and promotional items that are not market news.
pub const DEFAULT_NOISE_KEYWORDS: &[&str] = &[
    "할인", "이벤트", "프로모션", "쿠폰", "맛집", "연예", "결혼", "날씨", "운세", "로또", "경품",
    "레시피", "여행", "coupon", "giveaway", "horoscope", "recipe",
];

/// Reliability of an outlet in [0, 1]; unknown outlets get 0.5.
pub fn source_reliability(source: &str) -> f64 {
    let lowered = source.trim().to_lowercase();
    if lowered.is_empty() {
        return DEFAULT_RELIABILITY;
    }
    SOURCE_RELIABILITY
        .iter()
        .find(|(known, _)| lowered.contains(known) || known.contains(lowered.as_str()))
        .map(|(_, score)| *score)
        .unwrap_or(DEFAULT_RELIABILITY)
}

/// Sum of market keyword weights found in `text` (lowercased by the caller or not).
pub fn market_keyword_weight(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    MARKET_KEYWORDS
        .iter()
        .filter(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, weight)| weight)
        .sum()
}

/// 0.0 for sober headlines, up to 0.9 for three or more sensational phrases.
/// Highly reliable outlets are penalised less.
pub fn clickbait_penalty(text: &str, source: &str) -> f64 {
    let lowered = text.to_lowercase();
    let hits = CLICKBAIT_KEYWORDS
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .count();
    let credible = source_reliability(source) >= 0.95;
    match (hits, credible) {
        (0, _) => 0.0,
        (1, false) => 0.3,
        (1, true) => 0.1,
        (2, false) => 0.6,
        (2, true) => 0.3,
        (_, false) => 0.9,
        (_, true) => 0.5,
    }
}

pub fn is_noise(text: &str, noise_keywords: &[String]) -> bool {
    let lowered = text.to_lowercase();
    noise_keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && lowered.contains(&keyword.to_lowercase()))
}

/// Piecewise-linear decay: 1.0 now, 0.5 at 12h, 0.2 at 24h, 0.05 from 48h.
/// Items stamped in the future count as fresh.
pub fn freshness(published_at: DateTime<Utc>, as_of: DateTime<Utc>) -> f64 {
    let hours = (as_of - published_at).num_seconds() as f64 / 3600.0;
    if hours <= 0.0 {
        1.0
    } else if hours <= 12.0 {
        1.0 - (hours / 12.0) * 0.5
    } else if hours <= 24.0 {
        0.5 - ((hours - 12.0) / 12.0) * 0.3
    } else if hours <= 48.0 {
        0.2 - ((hours - 24.0) / 24.0) * 0.15
    } else {
        0.05
    }
}

/// Normalized titles at least this similar concern the same subject.
pub const REPEAT_SIMILARITY: f64 = 0.4;
const REPEAT_MIN_HOURS: f64 = 24.0;
const REPEAT_MAX_HOURS: f64 = 72.0;

/// Stories in `others` on the same subject as `key`, published 24 to 72
/// hours away from it. Keys are normalized titles.
pub fn repeat_count(
    key: &str,
    published_at: DateTime<Utc>,
    others: &[(&str, DateTime<Utc>)],
) -> usize {
    others
        .iter()
        .filter(|(other_key, other_at)| {
            let hours = (published_at - *other_at).num_seconds().abs() as f64 / 3600.0;
            (REPEAT_MIN_HOURS..=REPEAT_MAX_HOURS).contains(&hours)
                && jaccard_similarity(key, other_key) >= REPEAT_SIMILARITY
        })
        .count()
}

/// (novelty, repeat penalty) for a story with `similar` earlier or later
/// runs of the same subject. Both lie in [0, 1].
pub fn novelty(similar: usize) -> (f64, f64) {
    match similar {
        0 => (1.0, 0.0),
        1..=2 => (0.7, 0.2),
        3..=4 => (0.4, 0.5),
        _ => (0.1, 0.8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
    }

    #[test]
    fn reliability_exact_partial_and_unknown() {
        assert_relative_eq!(source_reliability("연합뉴스"), 1.0);
        assert_relative_eq!(source_reliability("한국경제TV"), 0.95);
        assert_relative_eq!(source_reliability("Reuters"), 1.0);
        assert_relative_eq!(source_reliability("some blog"), 0.5);
        assert_relative_eq!(source_reliability(""), 0.5);
    }

    #[test]
    fn keyword_weight_sums_distinct_keywords() {
        assert_relative_eq!(market_keyword_weight("코스피 반도체 강세"), 19.0);
        assert_relative_eq!(market_keyword_weight("weather today"), 0.0);
    }

    #[test]
    fn clickbait_levels() {
        assert_relative_eq!(clickbait_penalty("Fed holds rates", "x"), 0.0);
        assert_relative_eq!(clickbait_penalty("역대급 대박 종목", "blog"), 0.6);
        assert_relative_eq!(clickbait_penalty("역대급 대박 종목", "Reuters"), 0.3);
    }

    #[test]
    fn noise_detection_is_case_insensitive() {
        let keywords = vec!["Coupon".to_string()];
        assert!(is_noise("Big COUPON day", &keywords));
        assert!(!is_noise("Fed holds rates", &keywords));
        assert!(!is_noise("anything", &[String::new()]));
    }

    #[test]
    fn freshness_curve_points() {
        assert_relative_eq!(freshness(now(), now()), 1.0);
        assert_relative_eq!(freshness(now() + Duration::hours(3), now()), 1.0);
        assert_relative_eq!(freshness(now() - Duration::hours(12), now()), 0.5);
        assert_relative_eq!(freshness(now() - Duration::hours(24), now()), 0.2, epsilon = 1e-12);
        assert_relative_eq!(freshness(now() - Duration::hours(48), now()), 0.05, epsilon = 1e-12);
        assert_relative_eq!(freshness(now() - Duration::hours(100), now()), 0.05);
    }

    #[test]
    fn repeats_count_similar_titles_a_day_or_more_apart() {
        let key = "삼성전자 hbm 공급 확대";
        let others = [
            ("삼성전자 hbm 공급 확대 전망", now() - Duration::hours(30)),
            ("삼성전자 hbm 공급", now() + Duration::hours(72)),
            // Same day: a follow-up, not a repeat.
            ("삼성전자 hbm 공급 확대 속도", now() - Duration::hours(5)),
            // Too old.
            ("삼성전자 hbm 공급 확대", now() - Duration::hours(80)),
            ("원달러 환율 하락", now() - Duration::hours(30)),
        ];
        assert_eq!(repeat_count(key, now(), &others), 2);
        assert_eq!(repeat_count(key, now(), &[]), 0);
    }

    #[test]
    fn novelty_falls_as_repeats_grow() {
        assert_eq!(novelty(0), (1.0, 0.0));
        assert_eq!(novelty(2), (0.7, 0.2));
        assert_eq!(novelty(4), (0.4, 0.5));
        assert_eq!(novelty(9), (0.1, 0.8));
    }
}
