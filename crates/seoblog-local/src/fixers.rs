//! Repair-instruction builders. Text editing itself is delegated to the rewriter.

use crate::rewrite::rewrite_or_keep;
use seoblog_core::{IssueKind, OptimizationIssue, RewriteRequest, Rewriter};
use std::sync::Arc;

pub(crate) const EDITOR_SYSTEM: &str = "당신은 한국어 SEO 블로그 편집자입니다. \
요청된 수정만 적용하고, 설명 없이 수정된 전체 본문만 출력하세요.";

/// (problem, required change) for one issue.
pub fn problem_and_change(issue: &OptimizationIssue, keyword: &str) -> (String, String) {
    let word = issue.word.as_deref().unwrap_or_default();
    match issue.kind {
        IssueKind::CharacterDeficit => (
            format!(
                "글자수 부족: 현재 {}자, 목표 {}자",
                issue.current, issue.target
            ),
            format!(
                "키워드 '{keyword}'를 유지하면서 구체적인 설명과 사례로 약 {}자를 확장",
                issue.target.saturating_sub(issue.current)
            ),
        ),
        IssueKind::CharacterExcess => (
            format!(
                "글자수 초과: 현재 {}자, 최대 {}자",
                issue.current, issue.target
            ),
            format!(
                "반복되거나 불필요한 문장을 정리해 약 {}자를 축약",
                issue.current.saturating_sub(issue.target)
            ),
        ),
        IssueKind::KeywordDeficit => (
            format!(
                "완전 키워드 '{keyword}' 부족: 현재 {}회, 최소 {}회 필요",
                issue.current, issue.target
            ),
            format!(
                "'{keyword}'를 문맥에 맞게 정확히 {}회 더 추가",
                issue.target.saturating_sub(issue.current)
            ),
        ),
        IssueKind::ComponentDeficit => (
            format!(
                "키워드 구성요소 '{word}' 부족: 현재 {}회, 최소 {}회 필요",
                issue.current, issue.target
            ),
            format!(
                "'{word}'를 자연스러운 문장 안에서 {}회 더 사용",
                issue.target.saturating_sub(issue.current)
            ),
        ),
        IssueKind::OverusedWord => (
            format!(
                "'{word}' 과다 사용: 현재 {}회, 최대 {}회",
                issue.current, issue.target
            ),
            format!(
                "'{word}'를 문맥에 맞는 동의어로 5-7회 교체해 {}회 이하로 조정",
                issue.target
            ),
        ),
        IssueKind::ComponentDominance => {
            let listed = issue
                .dominant_words
                .iter()
                .map(|w| format!("'{}'({}회)", w.word, w.count))
                .collect::<Vec<_>>()
                .join(", ");
            (
                format!("키워드보다 자주 쓰인 단어: {listed}"),
                format!(
                    "나열된 단어를 각각 10회 이하로 줄이고 '{keyword}' 관련 표현은 그대로 유지"
                ),
            )
        }
        IssueKind::MissingTerms => (
            format!("필수 사용어 누락: {word}"),
            format!("다음 단어를 각각 1회 이상 자연스럽게 포함: {word}"),
        ),
    }
}

/// Short log line describing an attempted fix.
pub fn fix_label(issue: &OptimizationIssue, keyword: &str) -> String {
    let word = issue.word.as_deref().unwrap_or_default();
    match issue.kind {
        IssueKind::CharacterDeficit => format!(
            "글자수 {}자 보강",
            issue.target.saturating_sub(issue.current)
        ),
        IssueKind::CharacterExcess => format!(
            "글자수 {}자 축약",
            issue.current.saturating_sub(issue.target)
        ),
        IssueKind::KeywordDeficit => format!(
            "키워드 '{keyword}' {}회 추가",
            issue.target.saturating_sub(issue.current)
        ),
        IssueKind::ComponentDeficit => format!(
            "구성요소 '{word}' {}회 추가",
            issue.target.saturating_sub(issue.current)
        ),
        IssueKind::OverusedWord => format!("과다 단어 '{word}' 동의어 교체"),
        IssueKind::ComponentDominance => {
            format!("우위 단어 {}개 축소", issue.dominant_words.len())
        }
        IssueKind::MissingTerms => format!("필수 사용어 추가: {word}"),
    }
}

fn constraint_line(keyword: &str) -> String {
    format!(
        "[제약] 요청한 변경 외의 모든 내용, 특히 글의 구조(소제목, 문단 순서)와 키워드 '{keyword}'는 그대로 유지하세요."
    )
}

pub fn single_instruction(content: &str, issue: &OptimizationIssue, keyword: &str) -> String {
    let (problem, change) = problem_and_change(issue, keyword);
    format!(
        "다음 문제 하나만 수정하세요.\n\n[문제] {problem}\n[필요한 변경] {change}\n{}\n\n[본문]\n{content}",
        constraint_line(keyword)
    )
}

pub fn batch_instruction(content: &str, issues: &[OptimizationIssue], keyword: &str) -> String {
    let mut out = format!(
        "다음 {}가지 문제를 한 번에 함께 수정하세요.\n\n",
        issues.len()
    );
    for (i, issue) in issues.iter().enumerate() {
        let (problem, change) = problem_and_change(issue, keyword);
        out.push_str(&format!(
            "{}. [문제] {problem}\n   [필요한 변경] {change}\n",
            i + 1
        ));
    }
    out.push_str(
        "\n모든 변경을 동시에 반영하세요. 한 문제를 고치면서 다른 수치를 깨뜨리지 마세요 \
(예: 글자수를 늘리면서 키워드 구성요소가 목표 범위를 넘지 않도록).\n",
    );
    out.push_str(&constraint_line(keyword));
    out.push_str(&format!("\n\n[본문]\n{content}"));
    out
}

/// Single- and multi-issue fixers over one rewriter.
#[derive(Clone)]
pub struct IssueFixer {
    rewriter: Arc<dyn Rewriter>,
    temperature: f64,
    max_tokens: u64,
}

impl IssueFixer {
    pub fn new(rewriter: Arc<dyn Rewriter>) -> Self {
        Self {
            rewriter,
            temperature: 0.5,
            max_tokens: 4_096,
        }
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u64) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn request(&self, instruction: String) -> RewriteRequest {
        RewriteRequest::new(instruction)
            .with_system(EDITOR_SYSTEM)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// One issue, one narrowly scoped rewrite. Failures return `content` unchanged.
    pub async fn fix_single(
        &self,
        content: &str,
        issue: &OptimizationIssue,
        keyword: &str,
    ) -> String {
        let req = self.request(single_instruction(content, issue, keyword));
        rewrite_or_keep(self.rewriter.as_ref(), &req, content, "single_fix").await
    }

    /// All issues in one rewrite. Failures return `content` unchanged.
    pub async fn fix_batch(
        &self,
        content: &str,
        issues: &[OptimizationIssue],
        keyword: &str,
    ) -> String {
        let req = self.request(batch_instruction(content, issues, keyword));
        rewrite_or_keep(self.rewriter.as_ref(), &req, content, "batch_fix").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRewriter;
    use seoblog_core::WordCount;

    fn issue(kind: IssueKind, current: usize, target: usize, word: Option<&str>) -> OptimizationIssue {
        OptimizationIssue {
            kind,
            description: String::new(),
            target,
            current,
            word: word.map(str::to_string),
            dominant_words: Vec::new(),
        }
    }

    #[test]
    fn single_instruction_carries_problem_change_and_constraint() {
        let i = issue(IssueKind::CharacterDeficit, 1400, 1500, None);
        let s = single_instruction("본문", &i, "엔진오일교체");
        assert!(s.contains("[문제] 글자수 부족: 현재 1400자"));
        assert!(s.contains("약 100자를 확장"));
        assert!(s.contains("키워드 '엔진오일교체'는 그대로 유지"));
        assert!(s.ends_with("[본문]\n본문"));
    }

    #[test]
    fn batch_instruction_numbers_every_issue() {
        let mut dom = issue(IssueKind::ComponentDominance, 20, 10, None);
        dom.dominant_words = vec![WordCount {
            word: "정비소".into(),
            count: 20,
        }];
        let issues = vec![
            issue(IssueKind::KeywordDeficit, 3, 5, None),
            issue(IssueKind::OverusedWord, 20, 17, Some("교체")),
            dom,
        ];
        let s = batch_instruction("본문", &issues, "엔진오일교체");
        assert!(s.starts_with("다음 3가지 문제를 한 번에"));
        assert!(s.contains("1. [문제] 완전 키워드 '엔진오일교체' 부족"));
        assert!(s.contains("정확히 2회 더 추가"));
        assert!(s.contains("2. [문제] '교체' 과다 사용"));
        assert!(s.contains("3. [문제] 키워드보다 자주 쓰인 단어: '정비소'(20회)"));
    }

    #[test]
    fn labels_name_the_delta() {
        assert_eq!(
            fix_label(&issue(IssueKind::CharacterDeficit, 1400, 1500, None), "k"),
            "글자수 100자 보강"
        );
        assert_eq!(
            fix_label(&issue(IssueKind::ComponentDeficit, 12, 15, Some("오일")), "k"),
            "구성요소 '오일' 3회 추가"
        );
    }

    #[tokio::test]
    async fn fixers_are_noops_when_rewriter_fails() {
        let r = ScriptedRewriter::failing();
        let f = IssueFixer::new(Arc::new(r.clone()));
        let i = issue(IssueKind::CharacterExcess, 1800, 1700, None);
        assert_eq!(f.fix_single("원문", &i, "k").await, "원문");
        assert_eq!(f.fix_batch("원문", &[i.clone(), i], "k").await, "원문");
        assert_eq!(r.calls(), 2);
    }

    #[tokio::test]
    async fn fixer_returns_rewritten_text() {
        let r = ScriptedRewriter::new(vec![Ok("```\n고친 본문\n```".into())]);
        let f = IssueFixer::new(Arc::new(r.clone())).with_sampling(0.2, 1000);
        let i = issue(IssueKind::KeywordDeficit, 3, 5, None);
        assert_eq!(f.fix_single("원문", &i, "k").await, "고친 본문");
        let req = &r.requests()[0];
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, Some(1000));
        assert_eq!(req.system.as_deref(), Some(EDITOR_SYSTEM));
    }
}
