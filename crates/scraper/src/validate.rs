//! Result validation and relevance scoring.
//!
//! Two ordered judgments: structural validity decides whether a raw step
//! result can be trusted at all; relevance scoring (when the caller
//! supplies search terms) re-scores candidate titles into confidence
//! tiers. Confidence constants are tunable heuristics; tests assert
//! ordering and bounds, never exact values.

use joblens_core::{Dictionary, ExtractionResult, JobLink, MatchType};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Base confidence per match tier.
pub const EXACT_CONFIDENCE: f64 = 0.9;
pub const PROXIMITY_CONFIDENCE: f64 = 0.7;
pub const CONTEXTUAL_CONFIDENCE: f64 = 0.6;
pub const PARTIAL_CONFIDENCE: f64 = 0.5;
pub const ISOLATED_CONFIDENCE: f64 = 0.3;

/// Corroboration bonus: per additional matching link, and its cap.
const CORROBORATION_BONUS_PER_LINK: f64 = 0.02;
const CORROBORATION_BONUS_CAP: f64 = 0.08;

/// Fixed bonus when a requested location matches; never gates acceptance.
const LOCATION_BONUS: f64 = 0.05;

/// Token window for the proximity check (multi-word phrases).
const PROXIMITY_WINDOW: usize = 6;

/// Token window for role-vocabulary co-occurrence (single-word phrases).
const CONTEXT_WINDOW: usize = 8;

/// Unrendered template syntax: {{ … }}, {% … %}, <% … %>, ${ … }.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{[^{}]*\}\}|\{%[^%]*%\}|<%[^%]*%>|\$\{[^{}]*\}").expect("placeholder regex")
});

/// Framework binding leftovers (Angular `ng-*`, common Vue `v-*`
/// directives) that survive text flattening when a page shipped its raw
/// template.
static BINDING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bng-[a-z]+(?:-[a-z]+)*\b|\bv-(?:if|else|for|show|bind|model|on|once|text|html|cloak)\b")
        .expect("binding regex")
});

/// Why a result failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("missing url")]
    MissingUrl,

    #[error("text too short: {len} < {floor}")]
    TextTooShort { len: usize, floor: usize },

    #[error("no links and no job vocabulary")]
    NoLinksOrVocabulary,

    #[error("unrendered template placeholders: {placeholders}")]
    TemplatePolluted { placeholders: usize },
}

/// Structural-validity thresholds.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Minimum flattened-text length for a trustworthy result.
    pub min_text_len: usize,

    /// Minimum job-vocabulary hits when a result has no links.
    pub min_vocab_hits: usize,

    /// Placeholder-per-word density above which a result is rejected
    /// outright, links or not.
    pub placeholder_density_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { min_text_len: 80, min_vocab_hits: 2, placeholder_density_threshold: 0.02 }
    }
}

/// Structural validator and relevance scorer.
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Judge whether a raw step result is structurally trustworthy.
    ///
    /// The placeholder check runs even when links are present: a page full
    /// of `{{ job.title }}` was fetched before client-side rendering and
    /// its links are template artifacts. Below the density threshold,
    /// acceptance requires job links to outnumber placeholders two to one.
    pub fn validate(&self, result: &ExtractionResult, dictionary: &Dictionary) -> Result<(), RejectReason> {
        if result.url.trim().is_empty() {
            return Err(RejectReason::MissingUrl);
        }

        let text_len = result.text.trim().len();
        if text_len < self.config.min_text_len {
            return Err(RejectReason::TextTooShort { len: text_len, floor: self.config.min_text_len });
        }

        let placeholder_count = count_placeholders(result);
        if placeholder_count > 0 {
            let words = result.text.split_whitespace().count().max(1);
            let density = placeholder_count as f64 / words as f64;
            if density > self.config.placeholder_density_threshold {
                return Err(RejectReason::TemplatePolluted { placeholders: placeholder_count });
            }
            // Ratio rule below the density threshold.
            if result.links.len() < placeholder_count * 2 {
                return Err(RejectReason::TemplatePolluted { placeholders: placeholder_count });
            }
        }

        if result.links.is_empty() && dictionary.job_term_hits(&result.text) < self.config.min_vocab_hits {
            return Err(RejectReason::NoLinksOrVocabulary);
        }

        Ok(())
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

/// Count unrendered placeholders and binding leftovers across the
/// flattened text and link texts.
fn count_placeholders(result: &ExtractionResult) -> usize {
    let mut count = PLACEHOLDER_RE.find_iter(&result.text).count() + BINDING_RE.find_iter(&result.text).count();
    for link in &result.links {
        count += PLACEHOLDER_RE.find_iter(&link.text).count();
        count += BINDING_RE.find_iter(&link.text).count();
    }
    count
}

/// Score candidate links against caller-supplied search terms.
///
/// Returns surviving links de-duplicated by URL, highest confidence per
/// duplicate, ordered by confidence descending. With no search terms the
/// pre-scores from harvesting are kept as-is (deduped and sorted).
///
/// In strict mode the `Partial` and `Isolated` tiers are rejected.
pub fn score_links(
    links: &[JobLink], page_text: &str, search_terms: &[String], search_locations: &[String],
    dictionary: &Dictionary, strict_mode: bool,
) -> Vec<JobLink> {
    if search_terms.is_empty() {
        return dedupe_sorted(links.to_vec());
    }

    let page_tokens = tokenize(page_text);
    let mut matched: Vec<JobLink> = Vec::new();

    for link in links {
        let Some((tier, base)) = best_tier(&link.text, &page_tokens, search_terms, dictionary) else {
            continue;
        };

        if strict_mode && tier <= MatchType::Partial {
            continue;
        }

        let mut scored = link.clone();
        scored.match_type = Some(tier);
        scored.is_job_posting = true;
        scored.confidence = base;

        if location_matches(&scored, search_locations) {
            scored.confidence += LOCATION_BONUS;
        }

        matched.push(scored);
    }

    // Bounded corroboration bonus: more independent matches on the same
    // page raise confidence in each of them.
    if matched.len() > 1 {
        let bonus = (CORROBORATION_BONUS_PER_LINK * (matched.len() - 1) as f64).min(CORROBORATION_BONUS_CAP);
        for link in &mut matched {
            link.confidence = (link.confidence + bonus).min(1.0);
        }
    }
    for link in &mut matched {
        link.confidence = link.confidence.clamp(0.0, 1.0);
    }

    dedupe_sorted(matched)
}

/// Best match tier for one candidate title across all search terms.
fn best_tier(
    title: &str, page_tokens: &[String], search_terms: &[String], dictionary: &Dictionary,
) -> Option<(MatchType, f64)> {
    let title_lower = title.to_lowercase();
    let title_tokens = tokenize(title);

    let mut best: Option<(MatchType, f64)> = None;
    let mut consider = |tier: MatchType, base: f64| {
        if best.map(|(t, _)| tier > t).unwrap_or(true) {
            best = Some((tier, base));
        }
    };

    for term in search_terms {
        let term_lower = term.trim().to_lowercase();
        if term_lower.is_empty() {
            continue;
        }

        // (a) exact substring of the full phrase.
        if title_lower.contains(&term_lower) {
            consider(MatchType::Exact, EXACT_CONFIDENCE);
            continue;
        }

        let term_words: Vec<String> = tokenize(&term_lower);
        if term_words.len() > 1 {
            // (b) multi-word: all words present plus a proximity check.
            let positions: Vec<Option<usize>> = term_words
                .iter()
                .map(|w| title_tokens.iter().position(|t| t == w))
                .collect();

            if positions.iter().all(Option::is_some) {
                let found: Vec<usize> = positions.into_iter().flatten().collect();
                let min = *found.iter().min().unwrap_or(&0);
                let max = *found.iter().max().unwrap_or(&0);
                if max - min <= PROXIMITY_WINDOW {
                    consider(MatchType::Proximity, PROXIMITY_CONFIDENCE);
                } else {
                    consider(MatchType::Partial, PARTIAL_CONFIDENCE);
                }
            } else if positions.iter().any(Option::is_some) {
                consider(MatchType::Partial, PARTIAL_CONFIDENCE);
            } else if term_words.iter().any(|w| page_tokens.contains(w)) {
                consider(MatchType::Isolated, ISOLATED_CONFIDENCE);
            }
        } else if let Some(word) = term_words.first() {
            // (c) single word: word-boundary match plus a context check.
            if let Some(pos) = title_tokens.iter().position(|t| t == word) {
                if has_role_context(&title_tokens, pos, dictionary) {
                    consider(MatchType::Contextual, CONTEXTUAL_CONFIDENCE);
                } else {
                    consider(MatchType::Partial, PARTIAL_CONFIDENCE);
                }
            } else if page_tokens.contains(word) {
                consider(MatchType::Isolated, ISOLATED_CONFIDENCE);
            }
        }
    }

    best
}

/// Co-occurrence with role/seniority vocabulary within a bounded window.
fn has_role_context(tokens: &[String], pos: usize, dictionary: &Dictionary) -> bool {
    let start = pos.saturating_sub(CONTEXT_WINDOW);
    let end = (pos + CONTEXT_WINDOW + 1).min(tokens.len());

    tokens[start..end].iter().enumerate().any(|(i, token)| {
        start + i != pos
            && dictionary
                .role_context_terms()
                .iter()
                .any(|role| role.eq_ignore_ascii_case(token))
    })
}

fn location_matches(link: &JobLink, search_locations: &[String]) -> bool {
    if search_locations.is_empty() {
        return false;
    }

    let haystacks = [Some(link.text.as_str()), link.location.as_deref()];
    search_locations.iter().any(|loc| {
        let loc_lower = loc.to_lowercase();
        haystacks
            .iter()
            .flatten()
            .any(|h| h.to_lowercase().contains(&loc_lower))
    })
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// De-duplicate by URL keeping the highest confidence, then sort by
/// confidence descending (stable).
fn dedupe_sorted(links: Vec<JobLink>) -> Vec<JobLink> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<JobLink> = Vec::new();

    for link in links {
        match index.get(&link.url) {
            Some(&i) => {
                if link.confidence > out[i].confidence {
                    out[i] = link;
                }
            }
            None => {
                index.insert(link.url.clone(), out.len());
                out.push(link);
            }
        }
    }

    out.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblens_core::{ExtractionResult, LinkType};

    fn dict() -> Dictionary {
        Dictionary::english()
    }

    fn link(url: &str, text: &str) -> JobLink {
        JobLink::new(url, text, LinkType::JobPosting, 0.5)
    }

    fn long_text(prefix: &str) -> String {
        format!("{prefix} we are hiring across many teams and you can apply to our open positions today")
    }

    #[test]
    fn test_validate_ok_with_links() {
        let validator = Validator::default();
        let result = ExtractionResult::new(
            "https://acme.example/careers",
            long_text("Careers at Acme."),
            vec![link("https://acme.example/jobs/1", "Engineer")],
        );
        assert!(validator.validate(&result, &dict()).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_url() {
        let validator = Validator::default();
        let result = ExtractionResult::new("", long_text("Careers."), Vec::new());
        assert_eq!(validator.validate(&result, &dict()), Err(RejectReason::MissingUrl));
    }

    #[test]
    fn test_validate_rejects_short_text() {
        let validator = Validator::default();
        let result = ExtractionResult::new("https://acme.example", "short", Vec::new());
        assert!(matches!(
            validator.validate(&result, &dict()),
            Err(RejectReason::TextTooShort { .. })
        ));
    }

    #[test]
    fn test_validate_no_links_needs_vocabulary() {
        let validator = Validator::default();
        let filler = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod tempor incididunt ut labore";
        let result = ExtractionResult::new("https://acme.example", filler, Vec::new());
        assert_eq!(validator.validate(&result, &dict()), Err(RejectReason::NoLinksOrVocabulary));

        let result = ExtractionResult::new("https://acme.example", long_text("Careers and vacancies."), Vec::new());
        assert!(validator.validate(&result, &dict()).is_ok());
    }

    #[test]
    fn test_validate_rejects_template_pollution_despite_links() {
        let validator = Validator::default();
        // Scenario: every listing still shows {{ job.title }}.
        let text = "Openings: {{ job.title }} {{ job.location }} {{ job.department }} apply now";
        let links = vec![
            link("https://acme.example/jobs/1", "{{ job.title }}"),
            link("https://acme.example/jobs/2", "{{ job.title }}"),
        ];
        let mut result = ExtractionResult::new("https://acme.example/careers", text, links);
        result.text = format!("{} {}", result.text, long_text(""));

        assert!(matches!(
            validator.validate(&result, &dict()),
            Err(RejectReason::TemplatePolluted { .. })
        ));
    }

    #[test]
    fn test_validate_ratio_rule_below_density_threshold() {
        let config = ValidationConfig { placeholder_density_threshold: 0.05, ..Default::default() };
        let validator = Validator::new(config);

        // One placeholder in a long page: density below threshold.
        let filler: String = long_text("Careers at Acme.").repeat(3);
        let text = format!("{filler} footer {{{{ year }}}}");

        // Ratio rule: needs at least 2 job links per placeholder.
        let one_link = vec![link("https://acme.example/jobs/1", "Engineer")];
        let result = ExtractionResult::new("https://acme.example/careers", text.clone(), one_link);
        assert!(matches!(
            validator.validate(&result, &dict()),
            Err(RejectReason::TemplatePolluted { .. })
        ));

        let two_links = vec![
            link("https://acme.example/jobs/1", "Engineer"),
            link("https://acme.example/jobs/2", "Designer"),
        ];
        let result = ExtractionResult::new("https://acme.example/careers", text, two_links);
        assert!(validator.validate(&result, &dict()).is_ok());
    }

    #[test]
    fn test_placeholder_variants_detected() {
        for text in ["{{ x }}", "{% for j in jobs %}", "<% render %>", "${title}", "ng-repeat", "v-for"] {
            let result = ExtractionResult::new("https://a.example", text, Vec::new());
            assert_eq!(count_placeholders(&result), 1, "missed: {text}");
        }
    }

    #[test]
    fn test_binding_leftovers_pollute_result() {
        let validator = Validator::default();
        // A raw Angular template leaked into the flattened text.
        let text = "ng-repeat job in jobs ng-bind job.title ng-show job.open apply now";
        let links = vec![
            link("https://acme.example/jobs/1", "ng-bind title"),
            link("https://acme.example/jobs/2", "v-for listing"),
        ];
        let mut result = ExtractionResult::new("https://acme.example/careers", text, links);
        result.text = format!("{} {}", result.text, long_text(""));

        assert!(matches!(
            validator.validate(&result, &dict()),
            Err(RejectReason::TemplatePolluted { .. })
        ));
    }

    #[test]
    fn test_score_exact_match() {
        let links = vec![link("https://acme.example/jobs/1", "Senior Backend Engineer")];
        let scored = score_links(&links, "", &["backend engineer".to_string()], &[], &dict(), false);

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].match_type, Some(MatchType::Exact));
        assert!(scored[0].confidence >= 0.7);
    }

    #[test]
    fn test_score_proximity_match() {
        // All words present, out of phrase order, within the window.
        let links = vec![link("https://acme.example/jobs/2", "Engineer, Backend Platform")];
        let scored = score_links(&links, "", &["backend engineer".to_string()], &[], &dict(), false);

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].match_type, Some(MatchType::Proximity));
        assert!(scored[0].confidence >= PROXIMITY_CONFIDENCE);
    }

    #[test]
    fn test_score_contextual_match() {
        // Single-word term next to role vocabulary.
        let links = vec![link("https://acme.example/jobs/3", "Senior Rust Developer")];
        let scored = score_links(&links, "", &["rust".to_string()], &[], &dict(), false);

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].match_type, Some(MatchType::Contextual));
    }

    #[test]
    fn test_score_tier_monotonicity() {
        let dict = dict();
        let exact = score_links(
            &[link("https://a.example/1", "Backend Engineer")],
            "",
            &["backend engineer".to_string()],
            &[],
            &dict,
            false,
        );
        let proximity = score_links(
            &[link("https://a.example/2", "Engineer for Backend systems")],
            "",
            &["backend engineer".to_string()],
            &[],
            &dict,
            false,
        );
        let contextual = score_links(
            &[link("https://a.example/3", "Senior Rust Developer")],
            "",
            &["rust".to_string()],
            &[],
            &dict,
            false,
        );

        assert!(exact[0].confidence >= proximity[0].confidence);
        assert!(proximity[0].confidence >= contextual[0].confidence);
        for l in [&exact[0], &proximity[0], &contextual[0]] {
            assert!(l.confidence > 0.0 && l.confidence <= 1.0);
        }
    }

    #[test]
    fn test_strict_mode_rejects_partial() {
        // Only one of two words matches.
        let links = vec![link("https://acme.example/jobs/4", "Backend Operations")];
        let term = vec!["backend engineer".to_string()];

        let lax = score_links(&links, "", &term, &[], &dict(), false);
        assert_eq!(lax.len(), 1);
        assert_eq!(lax[0].match_type, Some(MatchType::Partial));

        let strict = score_links(&links, "", &term, &[], &dict(), true);
        assert!(strict.is_empty());
    }

    #[test]
    fn test_isolated_match_from_page_text() {
        let links = vec![link("https://acme.example/jobs/5", "Open role")];
        let scored = score_links(
            &links,
            "our backend team is growing",
            &["backend".to_string()],
            &[],
            &dict(),
            false,
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].match_type, Some(MatchType::Isolated));
    }

    #[test]
    fn test_location_bonus_additive_not_gating() {
        let term = vec!["backend engineer".to_string()];
        let links = vec![link("https://acme.example/jobs/1", "Backend Engineer (Berlin)")];

        let without = score_links(&links, "", &term, &[], &dict(), false);
        let with = score_links(&links, "", &term, &["Berlin".to_string()], &dict(), false);
        assert!(with[0].confidence > without[0].confidence);

        // Non-matching location still accepted.
        let elsewhere = score_links(&links, "", &term, &["Tokyo".to_string()], &dict(), false);
        assert_eq!(elsewhere.len(), 1);
    }

    #[test]
    fn test_corroboration_bonus_bounded() {
        let term = vec!["engineer".to_string()];
        let links: Vec<JobLink> = (0..20)
            .map(|i| link(&format!("https://acme.example/jobs/{i}"), "Senior Engineer"))
            .collect();

        let scored = score_links(&links, "", &term, &[], &dict(), false);
        assert_eq!(scored.len(), 20);
        for l in &scored {
            assert!(l.confidence <= CONTEXTUAL_CONFIDENCE + CORROBORATION_BONUS_CAP + 1e-9);
            assert!(l.confidence <= 1.0);
        }
    }

    #[test]
    fn test_dedupe_keeps_highest_confidence() {
        let links = vec![
            link("https://acme.example/jobs/1", "Backend Operations"),
            link("https://acme.example/jobs/1", "Backend Engineer"),
        ];
        let scored = score_links(&links, "", &["backend engineer".to_string()], &[], &dict(), false);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].match_type, Some(MatchType::Exact));
    }

    #[test]
    fn test_sorted_by_confidence_descending() {
        let links = vec![
            link("https://acme.example/jobs/partial", "Backend Operations"),
            link("https://acme.example/jobs/exact", "Backend Engineer"),
        ];
        let scored = score_links(&links, "", &["backend engineer".to_string()], &[], &dict(), false);
        assert_eq!(scored.len(), 2);
        assert!(scored[0].confidence >= scored[1].confidence);
        assert!(scored[0].url.ends_with("exact"));
    }

    #[test]
    fn test_no_terms_keeps_prescores() {
        let links = vec![
            JobLink::new("https://a.example/1", "Jobs", LinkType::JobListing, 0.6),
            JobLink::new("https://a.example/2", "Careers", LinkType::JobListing, 0.4),
        ];
        let scored = score_links(&links, "", &[], &[], &dict(), false);
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].confidence, 0.6);
    }

    #[test]
    fn test_scenario_mailto_and_backend_engineer() {
        // Harvesting already dropped the mailto anchor; the listing titled
        // "Senior Backend Engineer" must come back as one deduplicated
        // proximity-or-better match with confidence >= 0.7.
        let links = vec![
            link("https://acme.example/jobs/42", "Senior Backend Engineer"),
            link("https://acme.example/jobs/42", "Senior Backend Engineer"),
        ];
        let scored = score_links(&links, "", &["backend engineer".to_string()], &[], &dict(), false);

        assert_eq!(scored.len(), 1);
        assert!(matches!(scored[0].match_type, Some(MatchType::Exact) | Some(MatchType::Proximity)));
        assert!(scored[0].confidence >= 0.7);
    }
}
