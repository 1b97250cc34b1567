//! Draft and whole-text rewrite prompts.

use crate::components::resolve_components;
use crate::config::EngineConfig;
use crate::terms::parse_terms;
use seoblog_core::{CountBand, GenerationRequest, OptimizationReport, RewriteRequest};

/// Research text beyond this many chars is clipped before it goes into a prompt.
const MAX_RESEARCH_CHARS: usize = 4_000;

pub(crate) const WRITER_SYSTEM: &str = "당신은 소상공인을 위한 한국어 SEO 블로그 전문 작가입니다. \
지시된 수치 목표를 정확히 지키고, 설명 없이 완성된 블로그 본문만 출력하세요.";

/// Numeric targets shared by every generation-time prompt.
#[derive(Debug, Clone)]
pub struct SeoTargets {
    pub keyword: String,
    pub components: Vec<String>,
    pub complete_min: usize,
    pub complete_max: usize,
    pub component_band: CountBand,
    pub char_band: CountBand,
}

impl SeoTargets {
    pub fn new(keyword: &str, cfg: &EngineConfig) -> Self {
        Self {
            keyword: keyword.trim().to_string(),
            components: resolve_components(keyword).components,
            complete_min: cfg.analyzer.min_complete_keyword,
            complete_max: cfg.max_complete_keyword,
            component_band: cfg.analyzer.component_band,
            char_band: cfg.generation_char_band,
        }
    }

    /// The SEO instruction list built from the component bands.
    pub fn instructions(&self) -> Vec<String> {
        let mut out = vec![format!(
            "완전 키워드 '{}'를 정확히 {}-{}회 사용 (조사가 붙은 형태 포함)",
            self.keyword, self.complete_min, self.complete_max
        )];
        for c in &self.components {
            out.push(format!(
                "'{c}'는 완전 키워드 안에 포함된 것까지 합쳐 {}회 사용",
                self.component_band
            ));
        }
        out.push(format!(
            "공백을 제외한 글자수 {}자 (반드시 범위 안)",
            self.char_band
        ));
        out.push(format!(
            "키워드 구성요소({})보다 더 자주 쓰이는 다른 단어가 없도록 작성",
            self.components.join(", ")
        ));
        out
    }

    fn numbered(&self) -> String {
        self.instructions()
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {s}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn clip(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn context_block(req: &GenerationRequest) -> String {
    let b = &req.business;
    let mut out = format!(
        "[업체 정보]\n- 업체명: {}\n- 업종: {}\n- 전문 분야: {}\n- 차별점: {}\n",
        b.business_name, b.business_type, b.expertise, b.differentiators
    );

    if !req.research.content.trim().is_empty() {
        out.push_str(&format!(
            "\n[참고 자료]\n{}\n",
            clip(req.research.content.trim(), MAX_RESEARCH_CHARS)
        ));
        if !req.research.citations.is_empty() {
            out.push_str("출처:\n");
            for c in &req.research.citations {
                out.push_str(&format!("- {c}\n"));
            }
        }
    }

    if !req.reference_links.is_empty() {
        out.push_str("\n[참고 링크] (본문 흐름을 잡는 데만 참고하고 주소는 본문에 넣지 마세요)\n");
        for l in &req.reference_links {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                l.display_host(),
                if l.purpose.is_empty() {
                    "참고"
                } else {
                    l.purpose.as_str()
                },
                l.description
            ));
        }
    }

    let terms = parse_terms(req.custom_terms.as_deref());
    if !terms.is_empty() {
        out.push_str(&format!(
            "\n[필수 사용어] 다음 단어를 각각 1회 이상 반드시 포함: {}\n",
            terms.join(", ")
        ));
    }
    out
}

fn structure_block(subtitles: &[String]) -> String {
    if subtitles.is_empty() {
        return "[구조] 서론, 본론, 결론으로 구성하세요.\n".to_string();
    }
    let mut out = String::from("[구조] 서론 다음에 아래 소제목을 순서대로 `## 소제목` 형식으로 쓰고, 마지막에 결론을 쓰세요.\n");
    for s in subtitles {
        out.push_str(&format!("## {s}\n"));
    }
    out
}

/// Attempt 1: a brand-new draft.
pub fn draft_request(req: &GenerationRequest, targets: &SeoTargets, cfg: &EngineConfig) -> RewriteRequest {
    let instruction = format!(
        "'{kw}'를 주제로 블로그 글을 작성하세요.\n\n{ctx}\n{structure}\n[SEO 작성 규칙]\n{rules}\n",
        kw = targets.keyword,
        ctx = context_block(req),
        structure = structure_block(&req.subtitles),
        rules = targets.numbered(),
    );
    RewriteRequest::new(instruction)
        .with_system(WRITER_SYSTEM)
        .with_temperature(cfg.draft_temperature)
        .with_max_tokens(cfg.max_tokens)
}

/// The final fresh draft: same context, numeric rules repeated as bluntly as possible.
pub fn last_resort_request(
    req: &GenerationRequest,
    targets: &SeoTargets,
    cfg: &EngineConfig,
) -> RewriteRequest {
    let rules = targets.numbered();
    let mut counts = format!(
        "- '{}' {}-{}회\n",
        targets.keyword, targets.complete_min, targets.complete_max
    );
    for c in &targets.components {
        counts.push_str(&format!("- '{c}' {}회\n", targets.component_band));
    }
    counts.push_str(&format!("- 글자수(공백 제외) {}자\n", targets.char_band));

    let instruction = format!(
        "이전 시도들이 모두 수치 목표를 지키지 못했습니다. 아래 수치는 절대 조건입니다.\n\n\
[절대 조건]\n{rules}\n\n'{kw}'를 주제로 블로그 글을 새로 작성하세요.\n\n{ctx}\n{structure}\n\
[작성 후 스스로 세어 확인할 것]\n{counts}\n\
다시 한 번: 위 수치를 하나라도 벗어나면 안 됩니다.\n{rules}\n",
        kw = targets.keyword,
        ctx = context_block(req),
        structure = structure_block(&req.subtitles),
    );
    RewriteRequest::new(instruction)
        .with_system(WRITER_SYSTEM)
        .with_temperature(cfg.readability_temperature)
        .with_max_tokens(cfg.max_tokens)
}

fn current_numbers(report: &OptimizationReport) -> String {
    let mut out = format!(
        "- 완전 키워드: {}회\n- 글자수(공백 제외): {}자\n",
        report.complete_keyword_count, report.character_count
    );
    for c in &report.components {
        out.push_str(&format!("- '{}': {}회\n", c.component, c.count));
    }
    for i in &report.issues {
        out.push_str(&format!("- 문제: {i}\n"));
    }
    out
}

/// Whole-text rewrite emphasizing the numeric targets.
pub fn seo_rewrite_request(
    content: &str,
    report: &OptimizationReport,
    targets: &SeoTargets,
    cfg: &EngineConfig,
) -> RewriteRequest {
    let instruction = format!(
        "아래 블로그 글을 SEO 목표에 정확히 맞도록 다시 쓰세요. 주제와 소제목 구조는 유지합니다.\n\n\
[현재 수치]\n{now}\n[목표]\n{rules}\n\n[본문]\n{content}",
        now = current_numbers(report),
        rules = targets.numbered(),
    );
    RewriteRequest::new(instruction)
        .with_system(WRITER_SYSTEM)
        .with_temperature(cfg.seo_rewrite_temperature)
        .with_max_tokens(cfg.max_tokens)
}

/// Whole-text rewrite for flow, with the same targets as hard limits.
pub fn readability_rewrite_request(
    content: &str,
    report: &OptimizationReport,
    targets: &SeoTargets,
    cfg: &EngineConfig,
) -> RewriteRequest {
    let instruction = format!(
        "아래 블로그 글의 문장 흐름과 가독성을 다듬으세요. 단, SEO 수치를 깨뜨리면 안 됩니다.\n\
어색한 반복은 자연스럽게 바꾸되 키워드와 구성요소 사용 횟수는 목표 범위로 맞추세요.\n\n\
[현재 수치]\n{now}\n[지켜야 할 목표]\n{rules}\n\n[본문]\n{content}",
        now = current_numbers(report),
        rules = targets.numbered(),
    );
    RewriteRequest::new(instruction)
        .with_system(WRITER_SYSTEM)
        .with_temperature(cfg.readability_temperature)
        .with_max_tokens(cfg.max_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seoblog_core::{BusinessInfo, ReferenceLink, ResearchData};

    fn request() -> GenerationRequest {
        GenerationRequest {
            keyword: "엔진오일교체".into(),
            subtitles: vec![
                "교체 주기".into(),
                "오일 종류".into(),
                "비용".into(),
                "자가 점검".into(),
            ],
            research: ResearchData {
                content: "합성유는 보통 1만 km마다 교체합니다.".into(),
                citations: vec!["https://example.com/oil".into()],
            },
            business: BusinessInfo {
                business_name: "한빛모터스".into(),
                business_type: "자동차 정비".into(),
                expertise: "수입차 엔진 정비".into(),
                differentiators: "당일 작업".into(),
            },
            reference_links: vec![ReferenceLink {
                url: "https://blog.example.com/post/1".into(),
                purpose: "톤 참고".into(),
                description: "친근한 말투".into(),
            }],
            custom_terms: Some("전문가 신뢰성".into()),
        }
    }

    #[test]
    fn instructions_follow_the_bands() {
        let t = SeoTargets::new("엔진오일교체", &EngineConfig::default());
        let i = t.instructions();
        assert_eq!(i.len(), 6);
        assert!(i[0].contains("5-7회"));
        assert!(i[1].contains("'엔진'") && i[1].contains("15-17회"));
        assert!(i[4].contains("1700-2000자"));
    }

    #[test]
    fn draft_carries_every_input() {
        let cfg = EngineConfig::default();
        let req = request();
        let t = SeoTargets::new(&req.keyword, &cfg);
        let r = draft_request(&req, &t, &cfg);
        let s = &r.instruction;
        assert!(s.contains("한빛모터스"));
        assert!(s.contains("합성유는"));
        assert!(s.contains("https://example.com/oil"));
        assert!(s.contains("blog.example.com (톤 참고): 친근한 말투"));
        assert!(s.contains("## 자가 점검"));
        assert!(s.contains("전문가, 신뢰성"));
        assert_eq!(r.temperature, Some(cfg.draft_temperature));
    }

    #[test]
    fn last_resort_repeats_the_rules() {
        let cfg = EngineConfig::default();
        let req = request();
        let t = SeoTargets::new(&req.keyword, &cfg);
        let s = last_resort_request(&req, &t, &cfg).instruction;
        assert_eq!(s.matches("1700-2000자").count(), 3);
    }

    #[test]
    fn research_is_clipped() {
        let mut req = request();
        req.research.content = "가".repeat(MAX_RESEARCH_CHARS + 500);
        let cfg = EngineConfig::default();
        let t = SeoTargets::new(&req.keyword, &cfg);
        let s = draft_request(&req, &t, &cfg).instruction;
        assert!(!s.contains(&"가".repeat(MAX_RESEARCH_CHARS + 1)));
    }
}
