//! Injected vocabulary, selector, and platform-signature bundle.
//!
//! The dictionary is a read-only, per-language collaborator shared across
//! every step (`Arc<Dictionary>`). It is a required construction-time
//! dependency of the pipeline, never a global or a late-bound setter.
//!
//! Platform signatures are kept in declaration order; the detector treats
//! that order as priority (first match wins).

use serde::{Deserialize, Serialize};

use crate::Error;

/// Signature of a known ATS/job-board platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSignature {
    /// Platform name (e.g. "greenhouse").
    pub name: String,

    /// URL substrings that identify the platform.
    pub patterns: Vec<String>,

    /// HTML substrings that identify the platform.
    pub indicators: Vec<String>,

    /// API URL templates with a `{company}` slot, cheapest first.
    #[serde(default)]
    pub api_patterns: Vec<String>,
}

impl PlatformSignature {
    /// True when the URL contains any of this platform's patterns.
    pub fn matches_url(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(&p.to_lowercase()))
    }

    /// True when the HTML contains any of this platform's indicators.
    pub fn matches_html(&self, html: &str) -> bool {
        self.indicators.iter().any(|i| html.contains(i.as_str()))
    }
}

/// Per-language heuristic data consumed by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dictionary {
    /// BCP 47 language tag this bundle targets.
    language: String,

    /// Vocabulary that marks job-related content ("vacancy", "apply", ...).
    job_terms: Vec<String>,

    /// Role/seniority vocabulary for contextual relevance matching.
    role_context_terms: Vec<String>,

    /// Terms that mark a control as content-expanding ("show more", ...).
    expand_positive_terms: Vec<String>,

    /// Terms that veto a control ("cookie", "close", ...).
    expand_negative_terms: Vec<String>,

    /// CSS selectors for cookie/consent dismissal controls.
    cookie_selectors: Vec<String>,

    /// CSS selectors for show-more/load-more controls.
    show_more_selectors: Vec<String>,

    /// CSS selectors for pagination controls.
    pagination_selectors: Vec<String>,

    /// URL substrings that mark a link as a job posting or listing.
    job_url_patterns: Vec<String>,

    /// Known platform signatures, declaration order = priority.
    platforms: Vec<PlatformSignature>,
}

impl Dictionary {
    /// Parse a dictionary from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Dictionary(e.to_string()))
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn job_terms(&self) -> &[String] {
        &self.job_terms
    }

    pub fn role_context_terms(&self) -> &[String] {
        &self.role_context_terms
    }

    pub fn expand_positive_terms(&self) -> &[String] {
        &self.expand_positive_terms
    }

    pub fn expand_negative_terms(&self) -> &[String] {
        &self.expand_negative_terms
    }

    pub fn cookie_selectors(&self) -> &[String] {
        &self.cookie_selectors
    }

    pub fn show_more_selectors(&self) -> &[String] {
        &self.show_more_selectors
    }

    pub fn pagination_selectors(&self) -> &[String] {
        &self.pagination_selectors
    }

    pub fn job_url_patterns(&self) -> &[String] {
        &self.job_url_patterns
    }

    /// Known platform signatures in declaration order.
    pub fn known_platforms(&self) -> &[PlatformSignature] {
        &self.platforms
    }

    /// Count job-vocabulary hits in a text (case-insensitive, per term).
    pub fn job_term_hits(&self, text: &str) -> usize {
        let lower = text.to_lowercase();
        self.job_terms.iter().filter(|t| lower.contains(&t.to_lowercase())).count()
    }

    /// Built-in English bundle.
    ///
    /// Production callers inject their own curated data; this default keeps
    /// the pipeline usable out of the box and backs the test suite.
    pub fn english() -> Self {
        Self {
            language: "en".to_string(),
            job_terms: [
                "job", "jobs", "career", "careers", "vacancy", "vacancies", "position", "positions", "opening",
                "openings", "hiring", "apply", "join our team", "work with us", "employment",
            ]
            .map(String::from)
            .to_vec(),
            role_context_terms: [
                "senior", "junior", "lead", "principal", "staff", "engineer", "developer", "manager", "designer",
                "analyst", "specialist", "intern", "director", "architect",
            ]
            .map(String::from)
            .to_vec(),
            expand_positive_terms: ["show more", "load more", "more jobs", "view all", "see all", "weitere", "mehr"]
                .map(String::from)
                .to_vec(),
            expand_negative_terms: ["cookie", "consent", "close", "dismiss", "accept", "privacy", "subscribe", "login"]
                .map(String::from)
                .to_vec(),
            cookie_selectors: [
                "#onetrust-accept-btn-handler",
                "button[id*='cookie-accept']",
                "button[class*='cookie-accept']",
                ".cc-btn.cc-dismiss",
                "button[aria-label='Accept cookies']",
            ]
            .map(String::from)
            .to_vec(),
            show_more_selectors: [
                "button[class*='load-more']",
                "button[class*='show-more']",
                "a[class*='load-more']",
                "[data-test*='load-more']",
                "button[class*='pagination-more']",
            ]
            .map(String::from)
            .to_vec(),
            pagination_selectors: [
                "a[rel='next']",
                "a[class*='next']",
                "button[class*='next']",
                "[aria-label='Next page']",
            ]
            .map(String::from)
            .to_vec(),
            job_url_patterns: [
                "/jobs/", "/job/", "/careers/", "/career/", "/vacancies/", "/vacancy/", "/positions/", "/openings/",
                "/opportunities/", "gh_jid=", "lever.co/", "jobId=",
            ]
            .map(String::from)
            .to_vec(),
            platforms: vec![
                PlatformSignature {
                    name: "greenhouse".to_string(),
                    patterns: vec!["greenhouse.io".to_string(), "boards.greenhouse".to_string()],
                    indicators: vec!["boards.greenhouse.io".to_string(), "grnhse".to_string()],
                    api_patterns: vec![
                        "https://boards-api.greenhouse.io/v1/boards/{company}/jobs".to_string(),
                    ],
                },
                PlatformSignature {
                    name: "lever".to_string(),
                    patterns: vec!["jobs.lever.co".to_string(), "lever.co".to_string()],
                    indicators: vec!["lever-jobs".to_string(), "jobs.lever.co".to_string()],
                    api_patterns: vec!["https://api.lever.co/v0/postings/{company}?mode=json".to_string()],
                },
                PlatformSignature {
                    name: "workday".to_string(),
                    patterns: vec!["myworkdayjobs.com".to_string(), "workday.com".to_string()],
                    indicators: vec!["workday".to_string(), "wd-browser".to_string()],
                    api_patterns: Vec::new(),
                },
                PlatformSignature {
                    name: "smartrecruiters".to_string(),
                    patterns: vec!["smartrecruiters.com".to_string(), "jobs.smartrecruiters".to_string()],
                    indicators: vec!["smartrecruiters".to_string()],
                    api_patterns: vec![
                        "https://api.smartrecruiters.com/v1/companies/{company}/postings".to_string(),
                    ],
                },
                PlatformSignature {
                    name: "personio".to_string(),
                    patterns: vec![".jobs.personio.de".to_string(), ".jobs.personio.com".to_string()],
                    indicators: vec!["personio".to_string()],
                    api_patterns: vec!["https://{company}.jobs.personio.de/xml".to_string()],
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_accessors_nonempty() {
        let dict = Dictionary::english();
        assert_eq!(dict.language(), "en");
        assert!(!dict.job_terms().is_empty());
        assert!(!dict.cookie_selectors().is_empty());
        assert!(!dict.show_more_selectors().is_empty());
        assert!(!dict.job_url_patterns().is_empty());
        assert!(!dict.known_platforms().is_empty());
    }

    #[test]
    fn test_platform_matches_url_case_insensitive() {
        let dict = Dictionary::english();
        let greenhouse = &dict.known_platforms()[0];
        assert!(greenhouse.matches_url("https://Boards.Greenhouse.io/acme"));
        assert!(!greenhouse.matches_url("https://jobs.lever.co/acme"));
    }

    #[test]
    fn test_job_term_hits() {
        let dict = Dictionary::english();
        let hits = dict.job_term_hits("Careers at Acme - open positions, apply today");
        assert!(hits >= 3);
        assert_eq!(dict.job_term_hits("nothing relevant here"), 0);
    }

    #[test]
    fn test_from_json_roundtrip() {
        let dict = Dictionary::english();
        let json = serde_json::to_string(&dict).unwrap();
        let parsed = Dictionary::from_json(&json).unwrap();
        assert_eq!(parsed.language(), "en");
        assert_eq!(parsed.known_platforms().len(), dict.known_platforms().len());
    }

    #[test]
    fn test_from_json_invalid() {
        let result = Dictionary::from_json("{not json");
        assert!(matches!(result, Err(Error::Dictionary(_))));
    }

    #[test]
    fn test_declaration_order_preserved() {
        let dict = Dictionary::english();
        assert_eq!(dict.known_platforms()[0].name, "greenhouse");
        assert_eq!(dict.known_platforms()[1].name, "lever");
    }
}
