//! Hand-tuned additive relevance scoring.
//!
//! Every signal is a [`ScoringRule`]: a named weight and a function that
//! counts how many times the rule fires for one section. A section's score is
//! the sum of `weight * hits` over [`RULES`]. Weights are chosen so that the
//! current-module bonus outranks exact phrase matches, which outrank keyword
//! frequency.

use crate::models::{ScoredSection, Section};
use regex::Regex;
use std::sync::LazyLock;

/// File name fragment of the book-wide summary document.
pub const SUMMARY_DOCUMENT_MARKER: &str = "comprehensive-summary";

/// Query words that ask about the book as a whole.
pub const BROAD_QUERY_WORDS: [&str; 6] = [
    "book", "summary", "overview", "learn", "modules", "course",
];

/// Domain topics: when the query mentions one of `query_terms`, documents
/// whose file name or title carries one of `markers` get a boost. The boost
/// is applied once however many topics match.
pub struct DomainTopic {
    pub query_terms: &'static [&'static str],
    pub markers: &'static [&'static str],
}

pub const DOMAIN_TOPICS: [DomainTopic; 5] = [
    DomainTopic {
        query_terms: &["ros"],
        markers: &["ros"],
    },
    DomainTopic {
        query_terms: &["gazebo", "simulation", "digital twin", "unity"],
        markers: &["gazebo", "simulation", "digital-twin", "digital twin"],
    },
    DomainTopic {
        query_terms: &["isaac", "nvidia"],
        markers: &["isaac"],
    },
    DomainTopic {
        query_terms: &["humanoid", "locomotion", "bipedal"],
        markers: &["humanoid"],
    },
    DomainTopic {
        query_terms: &["vla", "vision-language", "voice", "whisper"],
        markers: &["vla", "vision-language"],
    },
];

static CHAPTER_QUERY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"chapter\s*(\d+)").unwrap());

enum KeywordPattern {
    Escaped(Regex),
    Plain(String),
}

impl KeywordPattern {
    fn new(keyword: &str) -> Self {
        match Regex::new(&regex::escape(keyword)) {
            Ok(pattern) => KeywordPattern::Escaped(pattern),
            Err(_) => KeywordPattern::Plain(keyword.to_string()),
        }
    }

    fn count_in(&self, haystack: &str) -> u64 {
        match self {
            KeywordPattern::Escaped(pattern) => pattern.find_iter(haystack).count() as u64,
            KeywordPattern::Plain(keyword) => count_plain(haystack, keyword),
        }
    }
}

fn count_plain(haystack: &str, keyword: &str) -> u64 {
    if keyword.is_empty() {
        return 0;
    }
    haystack.split(keyword).count().saturating_sub(1) as u64
}

/// A query prepared once and reused against every section.
pub struct QueryContext {
    pub query: String,
    pub keywords: Vec<String>,
    pub module: Option<String>,
    pub chapter: Option<u32>,
    patterns: Vec<KeywordPattern>,
}

impl QueryContext {
    pub fn new(query: &str, module: Option<&str>) -> Self {
        let query = query.trim().to_lowercase();
        let keywords: Vec<String> = query
            .split_whitespace()
            .filter(|word| word.chars().count() > 2)
            .map(str::to_string)
            .collect();
        let patterns = keywords.iter().map(|k| KeywordPattern::new(k)).collect();
        let chapter = CHAPTER_QUERY
            .captures(&query)
            .and_then(|capture| capture.get(1))
            .and_then(|m| m.as_str().parse().ok());

        Self {
            query,
            keywords,
            module: module
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            chapter,
            patterns,
        }
    }

    fn mentions_any(&self, terms: &[&str]) -> bool {
        terms.iter().any(|term| self.query.contains(term))
    }
}

/// Lowercased view of a section, built once per section per query.
pub struct SectionText<'a> {
    pub section: &'a Section,
    pub file: String,
    pub title: String,
    pub section_path: String,
    pub body: String,
}

impl<'a> SectionText<'a> {
    pub fn new(section: &'a Section) -> Self {
        Self {
            section,
            file: section.file.to_lowercase(),
            title: section.title.to_lowercase(),
            section_path: section.section_path.to_lowercase(),
            body: section.body.to_lowercase(),
        }
    }

    fn is_summary_document(&self) -> bool {
        self.file.contains(SUMMARY_DOCUMENT_MARKER)
    }
}

pub struct ScoringRule {
    pub name: &'static str,
    pub weight: u64,
    hits: fn(&QueryContext, &SectionText<'_>) -> u64,
}

impl ScoringRule {
    pub fn hits(&self, query: &QueryContext, section: &SectionText<'_>) -> u64 {
        (self.hits)(query, section)
    }

    pub fn contribution(&self, query: &QueryContext, section: &SectionText<'_>) -> u64 {
        self.weight.saturating_mul(self.hits(query, section))
    }
}

pub static RULES: [ScoringRule; 10] = [
    ScoringRule {
        name: "module_match",
        weight: 2000,
        hits: module_match,
    },
    ScoringRule {
        name: "phrase_in_title",
        weight: 1000,
        hits: phrase_in_title,
    },
    ScoringRule {
        name: "phrase_in_section_path",
        weight: 500,
        hits: phrase_in_section_path,
    },
    ScoringRule {
        name: "keyword_in_title",
        weight: 50,
        hits: keyword_in_title,
    },
    ScoringRule {
        name: "keyword_in_section_path",
        weight: 30,
        hits: keyword_in_section_path,
    },
    ScoringRule {
        name: "keyword_in_body",
        weight: 5,
        hits: keyword_in_body,
    },
    ScoringRule {
        name: "summary_document_for_broad_query",
        weight: 400,
        hits: summary_document_for_broad_query,
    },
    ScoringRule {
        name: "domain_topic",
        weight: 200,
        hits: domain_topic,
    },
    ScoringRule {
        name: "chapter_number",
        weight: 300,
        hits: chapter_number,
    },
    ScoringRule {
        name: "chapter_summary",
        weight: 100,
        hits: chapter_summary,
    },
];

fn flag(value: bool) -> u64 {
    u64::from(value)
}

fn module_match(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    flag(query.module.is_some() && query.module == section.section.module)
}

fn phrase_in_title(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    flag(!query.query.is_empty() && section.title.contains(&query.query))
}

fn phrase_in_section_path(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    flag(!query.query.is_empty() && section.section_path.contains(&query.query))
}

fn keyword_in_title(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    query
        .keywords
        .iter()
        .filter(|keyword| section.title.contains(keyword.as_str()))
        .count() as u64
}

fn keyword_in_section_path(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    query
        .keywords
        .iter()
        .filter(|keyword| section.section_path.contains(keyword.as_str()))
        .count() as u64
}

fn keyword_in_body(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    query
        .patterns
        .iter()
        .map(|pattern| pattern.count_in(&section.body))
        .sum()
}

fn summary_document_for_broad_query(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    flag(section.is_summary_document() && query.mentions_any(&BROAD_QUERY_WORDS))
}

fn domain_topic(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    flag(DOMAIN_TOPICS.iter().any(|topic| {
        query.mentions_any(topic.query_terms)
            && topic
                .markers
                .iter()
                .any(|marker| section.file.contains(marker) || section.title.contains(marker))
    }))
}

fn chapter_number(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    flag(
        query
            .chapter
            .is_some_and(|wanted| file_chapter_numbers(&section.file).any(|n| n == wanted)),
    )
}

fn chapter_summary(query: &QueryContext, section: &SectionText<'_>) -> u64 {
    flag(
        query.chapter.is_some()
            && query.query.contains("summary")
            && section.is_summary_document(),
    )
}

/// Chapter numbers encoded in a file name as `chapter-03`, `chapter_3` or
/// `chapter3`.
pub fn file_chapter_numbers(file: &str) -> impl Iterator<Item = u32> + '_ {
    file.match_indices("chapter").filter_map(move |(start, word)| {
        let rest = &file[start + word.len()..];
        let rest = rest
            .strip_prefix(|c: char| c == '-' || c == '_' || c == ' ')
            .unwrap_or(rest);
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    })
}

pub fn score_section(query: &QueryContext, section: &Section) -> u64 {
    let text = SectionText::new(section);
    RULES
        .iter()
        .map(|rule| rule.contribution(query, &text))
        .sum()
}

/// Per-rule contributions for one section, skipping rules that did not fire.
pub fn explain_section(query: &QueryContext, section: &Section) -> Vec<(&'static str, u64)> {
    let text = SectionText::new(section);
    RULES
        .iter()
        .map(|rule| (rule.name, rule.contribution(query, &text)))
        .filter(|(_, points)| *points > 0)
        .collect()
}

/// Scores every section and returns the best `limit`, highest first.
/// Sections no rule fired for are dropped; ties keep index order.
pub fn rank_sections(
    query: &str,
    sections: &[Section],
    module: Option<&str>,
    limit: usize,
) -> Vec<ScoredSection> {
    let context = QueryContext::new(query, module);
    let mut scored: Vec<ScoredSection> = sections
        .iter()
        .map(|section| ScoredSection {
            score: score_section(&context, section),
            section: section.clone(),
        })
        .filter(|candidate| candidate.score > 0)
        .collect();

    scored.sort_by(|left, right| right.score.cmp(&left.score));
    scored.truncate(limit);
    scored
}
