//! Canned market headlines for dry runs and fallback.

use chrono::Duration;

use crate::domain::error::NewswatchError;
use crate::domain::news::{NewsWindow, RawNewsItem};
use crate::ports::news_port::NewsPort;

const HEADLINES: &[(&str, &str)] = &[
    ("삼성전자, 반도체 업황 개선 기대감 확산", "삼성전자가 반도체 업황 개선 기대감에 힘입어 상승세를 보이고 있다."),
    ("SK하이닉스, HBM 수요 증가로 실적 개선 전망", "AI 반도체 수요 증가로 HBM 매출이 크게 늘어날 전망이다."),
    ("엔비디아, AI 반도체 수요 급증으로 실적 상승", "엔비디아 실적 호조에 국내 반도체주도 동반 강세."),
    ("연준, 기준금리 동결 결정 발표", "연준이 기준금리를 동결하며 시장은 안도했다."),
    ("나스닥, AI 주도 상승세 지속", "나스닥이 AI 관련주 강세로 사상 최고치를 경신했다."),
    ("LG에너지솔루션, 전기차 배터리 수주 증가", "LG에너지솔루션이 북미 완성차 업체와 배터리 공급 계약을 체결했다."),
    ("원달러 환율, 하락세 지속", "달러 약세로 원달러 환율이 하락했다."),
    ("현대차, 미국 관세 우려에도 판매 호조", "현대차의 미국 판매가 전년 대비 증가했다."),
    ("네이버, AI 검색 서비스 공개", "네이버가 생성형 AI 기반 검색 서비스를 출시했다."),
    ("셀트리온, 바이오시밀러 유럽 승인", "셀트리온의 신규 바이오시밀러가 유럽 판매 승인을 받았다."),
    ("국제 유가, 감산 연장에 상승", "WTI가 산유국 감산 연장 소식에 올랐다."),
    ("코스피, 외국인 순매수에 2,700선 회복", "외국인 수급 개선으로 코스피가 반등했다."),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DummyNewsAdapter;

impl NewsPort for DummyNewsAdapter {
    fn name(&self) -> &str {
        "dummy"
    }

    /// The same canned set for every query, stamped one hour apart back from
    /// the end of the window.
    fn fetch(&self, _query: &str, window: &NewsWindow) -> Result<Vec<RawNewsItem>, NewswatchError> {
        Ok(HEADLINES
            .iter()
            .enumerate()
            .map(|(i, (title, body))| {
                let published_at = window.end - Duration::hours(i as i64 + 1);
                RawNewsItem {
                    title: (*title).to_string(),
                    body: Some((*body).to_string()),
                    source: "dummy".into(),
                    url: format!("https://example.com/news/{}", i + 1),
                    published_at,
                    collected_at: published_at + Duration::minutes(5),
                }
            })
            .filter(|item| window.contains(item.published_at))
            .collect())
    }
}
