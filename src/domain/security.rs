//! Securities, the symbol catalog used for matching, and the watchlist.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Security {
    pub code: String,
    pub name: String,
    pub market: String,
    /// Alternative spellings that also identify the security in text.
    pub aliases: Vec<String>,
}

impl Security {
    pub fn new(code: impl Into<String>, name: impl Into<String>, market: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            market: market.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }
}

/// Whether `text` mentions `term`. Case-insensitive. An ASCII term may not be
/// glued to other ASCII letters or digits ("KT" does not match "KTX"); Hangul
/// neighbours are allowed since particles attach directly to names.
pub fn mentions(text: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    let haystack = text.to_lowercase();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&term) {
        let start = from + pos;
        let end = start + term.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        let glued = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        let term_starts_ascii = term.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
        let term_ends_ascii = term.chars().next_back().is_some_and(|c| c.is_ascii_alphanumeric());
        if !(term_starts_ascii && glued(before)) && !(term_ends_ascii && glued(after)) {
            return true;
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Overseas names whose news moves domestic suppliers and peers.
const FOREIGN_SUBSTITUTES: &[(&str, &[&str])] = &[
    ("엔비디아", &["삼성전자", "SK하이닉스"]),
    ("nvidia", &["삼성전자", "SK하이닉스"]),
    ("amd", &["삼성전자", "SK하이닉스"]),
    ("테슬라", &["LG에너지솔루션", "삼성SDI"]),
    ("tesla", &["LG에너지솔루션", "삼성SDI"]),
    ("애플", &["삼성전자", "LG디스플레이"]),
    ("apple", &["삼성전자", "LG디스플레이"]),
];

/// Every security the scorer may link news to, keyed by code.
#[derive(Debug, Clone, Default)]
pub struct SecurityCatalog {
    by_code: BTreeMap<String, Security>,
    /// Foreign term to the names or codes of its domestic stand-ins.
    substitutes: Vec<(String, Vec<String>)>,
}

impl SecurityCatalog {
    pub fn new(securities: impl IntoIterator<Item = Security>) -> Self {
        let mut catalog = Self::default();
        for security in securities {
            catalog.insert(security);
        }
        catalog
    }

    /// Adds or replaces display metadata; aliases accumulate.
    pub fn insert(&mut self, security: Security) {
        match self.by_code.get_mut(&security.code) {
            Some(existing) => {
                existing.name = security.name;
                existing.market = security.market;
                for alias in security.aliases {
                    if !existing.aliases.contains(&alias) {
                        existing.aliases.push(alias);
                    }
                }
            }
            None => {
                self.by_code.insert(security.code.clone(), security);
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&Security> {
        self.by_code.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    /// Securities in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Security> {
        self.by_code.values()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Registers domestic stand-ins for a foreign name.
    pub fn with_substitute(mut self, foreign: &str, domestic: &[&str]) -> Self {
        self.substitutes.push((
            foreign.to_string(),
            domestic.iter().map(|d| d.to_string()).collect(),
        ));
        self
    }

    /// Stand-ins for every foreign name mentioned in `text`, in code order.
    /// Stand-ins missing from the catalog are skipped.
    pub fn substitutes_in(&self, text: &str) -> Vec<&Security> {
        let mut found: BTreeMap<&str, &Security> = BTreeMap::new();
        for (foreign, domestic) in &self.substitutes {
            if !mentions(text, foreign) {
                continue;
            }
            for security in domestic.iter().filter_map(|d| self.resolve(d)) {
                found.insert(security.code.as_str(), security);
            }
        }
        found.into_values().collect()
    }

    /// Look up a security by code, display name or alias.
    pub fn resolve(&self, name_or_code: &str) -> Option<&Security> {
        let needle = name_or_code.trim();
        if let Some(found) = self.by_code.get(needle) {
            return Some(found);
        }
        let lowered = needle.to_lowercase();
        self.by_code.values().find(|s| {
            s.name.to_lowercase() == lowered || s.aliases.iter().any(|a| a.to_lowercase() == lowered)
        })
    }

    /// Built-in KOSPI large caps with the aliases Korean outlets commonly use.
    pub fn korean_large_caps() -> Self {
        const KOSPI: &str = "KOSPI";
        let rows: &[(&str, &str, &[&str])] = &[
            ("005930", "삼성전자", &["Samsung Electronics"]),
            ("000660", "SK하이닉스", &["하이닉스", "SK hynix"]),
            ("373220", "LG에너지솔루션", &["LG에너솔"]),
            ("051910", "LG화학", &[]),
            ("006400", "삼성SDI", &[]),
            ("003670", "포스코퓨처엠", &["포스코케미칼"]),
            ("005490", "POSCO홀딩스", &["포스코홀딩스", "포스코", "POSCO"]),
            ("068270", "셀트리온", &["Celltrion"]),
            ("207940", "삼성바이오로직스", &["삼바"]),
            ("000100", "유한양행", &[]),
            ("128940", "한미약품", &[]),
            ("035420", "NAVER", &["네이버"]),
            ("035720", "카카오", &["Kakao"]),
            ("377300", "카카오페이", &[]),
            ("323410", "카카오뱅크", &[]),
            ("032640", "LG유플러스", &[]),
            ("034220", "LG디스플레이", &[]),
            ("030200", "KT", &[]),
            ("017670", "SK텔레콤", &["SKT"]),
            ("005380", "현대차", &["현대자동차", "Hyundai Motor"]),
            ("000270", "기아", &["기아자동차", "Kia"]),
            ("012330", "현대모비스", &[]),
            ("105560", "KB금융", &[]),
            ("055550", "신한지주", &[]),
            ("086790", "하나금융지주", &[]),
            ("316140", "우리금융지주", &[]),
            ("042660", "한화오션", &["대우조선해양"]),
            ("012450", "한화에어로스페이스", &[]),
            ("079550", "LIG넥스원", &[]),
            ("011170", "롯데케미칼", &[]),
            ("096770", "SK이노베이션", &[]),
            ("010950", "S-Oil", &["에쓰오일"]),
            ("090430", "아모레퍼시픽", &[]),
            ("271560", "오리온", &[]),
            ("000720", "현대건설", &[]),
        ];
        let catalog = Self::new(
            rows.iter()
                .map(|(code, name, aliases)| Security::new(*code, *name, KOSPI).with_aliases(aliases)),
        );
        FOREIGN_SUBSTITUTES
            .iter()
            .fold(catalog, |catalog, (foreign, domestic)| {
                catalog.with_substitute(foreign, domestic)
            })
    }
}

/// Operator priority list. Entries are codes or display names.
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    entries: Vec<String>,
}

impl Watchlist {
    pub fn new(entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| e.into().trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, security: &Security) -> bool {
        self.entries.iter().any(|entry| {
            entry == &security.code || entry.to_lowercase() == security.name.to_lowercase()
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
