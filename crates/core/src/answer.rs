//! Templated answers assembled from ranked sections.
//!
//! Nothing here generates text: each [`QueryIntent`] picks passages out of the
//! ranked section bodies and wraps them in a fixed layout.

use crate::chunking::split_paragraphs;
use crate::models::{QueryIntent, QueryMode, ScoredSection, Section};
use crate::scoring::SUMMARY_DOCUMENT_MARKER;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const REFUSAL: &str =
    "I couldn't find information about that in the book. Try rephrasing your question or asking \
    about a specific topic.";
pub const SELECTED_TEXT_LEAD_IN: &str = "Based on the selected text:";

pub const MAX_SOURCES: usize = 3;
const MAX_KEY_TOPICS: usize = 4;
const MAX_SPECIFIC_PARAGRAPHS: usize = 3;
const MAX_SUMMARY_PARAGRAPHS: usize = 3;
const MAX_BULLETS: usize = 5;
const MAX_CODE_BLOCK_CHARS: usize = 600;

const BOOK_LEVEL_PHRASES: [&str; 7] = [
    "this book",
    "the book",
    "whole book",
    "what will i learn",
    "overview",
    "all modules",
    "the course",
];
const DEFINITION_VERBS: [&str; 4] = ["is ", "provides", "enables", "allows"];
const CODE_PREFIXES: [&str; 20] = [
    "import ", "from ", "def ", "class ", "function ", "const ", "let ", "var ", "#include",
    "public ", "private ", "return ", "ros2 ", "sudo ", "pip ", "$ ", "{", "}", "[", "<",
];
const BULLET_MARKERS: [&str; 3] = ["- ", "* ", "• "];

static WHAT_IS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)what is").unwrap());
static CHAPTER_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)chapter \d").unwrap());
static LEARNED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)In this chapter, you learned:?\s*(.+?)(?:\n\n\*\*|What's Next|$)").unwrap()
});

/// Decides which answer layout fits the question.
///
/// Book-level wins when the hits span three or more documents, the query asks
/// about the book as a whole, or it is a "what is" question that does not name
/// a chapter. Otherwise a query mentioning "summary" gets a summary, and
/// everything else is answered from the top section.
pub fn classify_intent(query: &str, ranked: &[ScoredSection]) -> QueryIntent {
    let lowered = query.to_lowercase();
    let distinct_files = ranked
        .iter()
        .map(|hit| hit.section.source_path.as_str())
        .collect::<HashSet<_>>()
        .len();

    let broad = BOOK_LEVEL_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase));
    let definition = WHAT_IS.is_match(&lowered) && !CHAPTER_MENTION.is_match(&lowered);

    if distinct_files >= 3 || broad || definition {
        QueryIntent::BookLevel
    } else if lowered.contains("summary") {
        QueryIntent::Summary
    } else {
        QueryIntent::Specific
    }
}

pub fn synthesize(
    query: &str,
    ranked: &[ScoredSection],
    mode: QueryMode,
    selected_text: Option<&str>,
) -> String {
    let Some(top) = ranked.first() else {
        return REFUSAL.to_string();
    };

    let mut answer = String::new();
    let has_selection = selected_text.is_some_and(|text| !text.trim().is_empty());
    if mode == QueryMode::SelectedTextOnly && has_selection {
        answer.push_str(SELECTED_TEXT_LEAD_IN);
        answer.push_str("\n\n");
    }

    answer.push_str("**Source:** ");
    answer.push_str(&source_label(&top.section));
    answer.push_str("\n\n");

    let body = match classify_intent(query, ranked) {
        QueryIntent::BookLevel => book_level_answer(ranked),
        QueryIntent::Summary => summary_answer(ranked),
        QueryIntent::Specific => specific_answer(ranked),
    };
    answer.push_str(&body);
    answer
}

/// Section names to show under an answer: distinct, best first.
pub fn source_names(ranked: &[ScoredSection]) -> Vec<String> {
    distinct_names(ranked, MAX_SOURCES)
}

fn source_label(section: &Section) -> String {
    if is_summary_document(section) {
        section.title.clone()
    } else {
        format!("{} ({})", section.section_path, section.title)
    }
}

fn is_summary_document(section: &Section) -> bool {
    section.file.to_lowercase().contains(SUMMARY_DOCUMENT_MARKER)
}

fn book_level_answer(ranked: &[ScoredSection]) -> String {
    let definition = ranked
        .iter()
        .take(3)
        .flat_map(|hit| split_paragraphs(&hit.section.body))
        .find(|paragraph| is_definition(paragraph));

    let mut answer = match definition {
        Some(paragraph) => paragraph.to_string(),
        None => {
            let title = &ranked[0].section.title;
            let prefix = title.split(':').next().unwrap_or(title).trim();
            format!(
                "{prefix} covers topics including {}.",
                distinct_names(ranked, 3).join(", ")
            )
        }
    };

    let topics = distinct_names(ranked, MAX_KEY_TOPICS);
    answer.push_str("\n\n**Key Topics:**");
    for topic in topics {
        answer.push_str("\n- ");
        answer.push_str(&topic);
    }
    answer
}

fn summary_answer(ranked: &[ScoredSection]) -> String {
    let from_summary_document = ranked
        .iter()
        .find(|hit| is_summary_document(&hit.section))
        .map(|hit| {
            split_paragraphs(&hit.section.body)
                .into_iter()
                .filter(|paragraph| is_prose(paragraph, 40, 500))
                .take(MAX_SUMMARY_PARAGRAPHS)
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .filter(|text| !text.is_empty());

    let mut answer = match from_summary_document {
        Some(text) => text,
        None => chapter_recap(&ranked[0].section.body),
    };
    answer.push_str(&see_also(ranked));
    answer
}

/// Recap of one chapter body: the "you learned" passage, else its bullets,
/// else its first readable paragraph.
fn chapter_recap(body: &str) -> String {
    if let Some(learned) = LEARNED
        .captures(body)
        .and_then(|capture| capture.get(1))
        .map(|m| m.as_str().trim())
        .filter(|text| !text.is_empty())
    {
        return learned.to_string();
    }

    let bullets: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| BULLET_MARKERS.iter().any(|marker| line.starts_with(marker)))
        .take(MAX_BULLETS)
        .collect();
    if !bullets.is_empty() {
        return bullets.join("\n");
    }

    first_prose_paragraph(body).unwrap_or_else(|| truncate_chars(body, 300))
}

fn specific_answer(ranked: &[ScoredSection]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut explanatory = 0;
    let mut code_added = false;

    for paragraph in split_paragraphs(&ranked[0].section.body) {
        if explanatory >= MAX_SPECIFIC_PARAGRAPHS {
            break;
        }
        if paragraph.starts_with('#') {
            continue;
        }
        if paragraph.starts_with("```") {
            let compact = paragraph.chars().count() < MAX_CODE_BLOCK_CHARS;
            if !code_added && explanatory > 0 && compact && is_closed_fence(paragraph) {
                parts.push(paragraph);
                code_added = true;
            }
            continue;
        }
        if is_prose(paragraph, 30, 500) {
            parts.push(paragraph);
            explanatory += 1;
        }
    }

    let mut answer = if parts.is_empty() {
        ranked
            .get(1)
            .and_then(|hit| first_prose_paragraph(&hit.section.body))
            .unwrap_or_else(|| truncate_chars(&ranked[0].section.body, 300))
    } else {
        parts.join("\n\n")
    };
    answer.push_str(&see_also(ranked));
    answer
}

fn see_also(ranked: &[ScoredSection]) -> String {
    let names: Vec<&str> = ranked
        .iter()
        .skip(1)
        .take(2)
        .map(|hit| hit.section.section_path.as_str())
        .collect();
    if names.is_empty() {
        return String::new();
    }

    let mut block = String::from("\n\n**See also:**");
    for name in names {
        block.push_str("\n- ");
        block.push_str(name);
    }
    block
}

fn distinct_names(ranked: &[ScoredSection], limit: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for hit in ranked {
        if names.len() >= limit {
            break;
        }
        if !names.contains(&hit.section.section_path) {
            names.push(hit.section.section_path.clone());
        }
    }
    names
}

fn is_definition(paragraph: &str) -> bool {
    let length = paragraph.chars().count();
    (80..=400).contains(&length)
        && !paragraph.starts_with("```")
        && !paragraph.starts_with('#')
        && !looks_like_code(paragraph)
        && DEFINITION_VERBS.iter().any(|verb| paragraph.contains(verb))
}

fn is_prose(paragraph: &str, min_chars: usize, max_chars: usize) -> bool {
    let length = paragraph.chars().count();
    (min_chars..=max_chars).contains(&length)
        && !paragraph.starts_with('#')
        && !paragraph.starts_with("```")
        && !looks_like_code(paragraph)
}

fn first_prose_paragraph(body: &str) -> Option<String> {
    split_paragraphs(body)
        .into_iter()
        .find(|paragraph| is_prose(paragraph, 30, 500))
        .map(str::to_string)
}

fn looks_like_code(paragraph: &str) -> bool {
    CODE_PREFIXES
        .iter()
        .any(|prefix| paragraph.starts_with(prefix))
}

fn is_closed_fence(paragraph: &str) -> bool {
    paragraph.matches("```").count() >= 2 && paragraph.trim_end().ends_with("```")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(file: &str, title: &str, path: &str, body: &str, score: u64) -> ScoredSection {
        ScoredSection {
            section: Section {
                section_id: format!("{file}#{path}"),
                file: file.to_string(),
                title: title.to_string(),
                section_path: path.to_string(),
                body: body.to_string(),
                source_path: format!("/docs/{file}"),
                module: None,
            },
            score,
        }
    }

    const ROS_DEFINITION: &str =
        "ROS 2 is the Robot Operating System, a set of libraries and tools that help developers \
        build robot applications.";

    #[test]
    fn empty_ranking_is_refused() {
        let answer = synthesize("anything", &[], QueryMode::BookScope, None);
        assert_eq!(answer, REFUSAL);
        assert!(source_names(&[]).is_empty());
    }

    #[test]
    fn selected_text_mode_adds_lead_in() {
        let ranked = vec![hit(
            "a.md",
            "Nodes",
            "Publishers",
            "Publishers send messages on a topic to any number of subscribers.",
            10,
        )];
        let answer = synthesize(
            "publishers",
            &ranked,
            QueryMode::SelectedTextOnly,
            Some("a publisher sends messages"),
        );
        assert!(answer
            .starts_with("Based on the selected text:\n\n**Source:** Publishers (Nodes)"));

        let blank = synthesize("publishers", &ranked, QueryMode::SelectedTextOnly, Some("  "));
        assert!(blank.starts_with("**Source:**"));
        let book = synthesize("publishers", &ranked, QueryMode::BookScope, Some("text"));
        assert!(book.starts_with("**Source:**"));
    }

    #[test]
    fn summary_document_is_cited_by_title() {
        let ranked = vec![hit(
            "comprehensive-summary.md",
            "Book Summary",
            "Recap",
            "This recap walks through each module and the skills it builds for you.",
            10,
        )];
        let answer = synthesize("recap", &ranked, QueryMode::BookScope, None);
        assert!(answer.starts_with("**Source:** Book Summary\n\n"));
    }

    #[test]
    fn intent_follows_query_shape() {
        let one = vec![hit("a.md", "A", "S", "body", 1)];
        let three = vec![
            hit("a.md", "A", "S", "body", 3),
            hit("b.md", "B", "S", "body", 2),
            hit("c.md", "C", "S", "body", 1),
        ];
        assert_eq!(classify_intent("pid gains", &three), QueryIntent::BookLevel);
        assert_eq!(classify_intent("what is ROS 2", &one), QueryIntent::BookLevel);
        assert_eq!(classify_intent("Give me an overview", &one), QueryIntent::BookLevel);
        assert_eq!(classify_intent("what is chapter 3 about", &one), QueryIntent::Specific);
        assert_eq!(classify_intent("chapter 3 summary", &one), QueryIntent::Summary);
        assert_eq!(classify_intent("pid gains", &one), QueryIntent::Specific);
    }

    #[test]
    fn book_level_uses_first_definition_paragraph() {
        let body =
            format!("Short intro.\n\n```bash\nros2 run demo talker\n```\n\n{ROS_DEFINITION}");
        let ranked = vec![hit("ros.md", "ROS 2 Fundamentals", "What is ROS 2", &body, 1500)];
        let answer = synthesize("what is ROS 2", &ranked, QueryMode::BookScope, None);

        assert!(answer.starts_with("**Source:** What is ROS 2 (ROS 2 Fundamentals)\n\n"));
        assert!(answer.contains(ROS_DEFINITION));
        assert!(answer.ends_with("**Key Topics:**\n- What is ROS 2"));
    }

    #[test]
    fn book_level_falls_back_to_template() {
        let ranked = vec![
            hit("a.md", "Physical AI: Foundations", "Sensors", "Short text about sensors only.", 3),
            hit("b.md", "B", "Actuators", "Short text about actuators.", 2),
            hit("c.md", "C", "Control", "Short text about control.", 1),
        ];
        let answer = synthesize("anything", &ranked, QueryMode::BookScope, None);
        assert!(
            answer.contains("Physical AI covers topics including Sensors, Actuators, Control.")
        );
        assert!(answer.contains("**Key Topics:**\n- Sensors\n- Actuators\n- Control"));
    }

    #[test]
    fn summary_prefers_summary_document_paragraphs() {
        let summary_body =
            "## skipped heading\n\n\
            Module one teaches the ROS 2 graph: nodes, topics and services.\n\n\
            Module two moves the robot into Gazebo and Unity simulations.\n\n\
            Module three adds perception with NVIDIA Isaac.\n\n\
            Module four closes with vision-language-action models.";
        let ranked = vec![
            hit(
                "chapter-02.md",
                "Chapter 2",
                "Topics",
                "Topics carry typed messages between nodes in the graph.",
                500,
            ),
            hit("comprehensive-summary.md", "Book Summary", "Recap", summary_body, 400),
        ];
        let answer = synthesize("give me a summary", &ranked, QueryMode::BookScope, None);
        assert!(answer.contains("Module one teaches"));
        assert!(answer.contains("Module three adds perception"));
        assert!(!answer.contains("Module four"));
        assert!(answer.ends_with("**See also:**\n- Recap"));
    }

    #[test]
    fn summary_extracts_learned_passage() {
        let body =
            "Intro text.\n\nIn this chapter, you learned:\n- how nodes talk\n- how to launch them\n\
            \n**Next up** is simulation.";
        let ranked = vec![hit("chapter-01.md", "Chapter 1", "Wrap-up", body, 10)];
        let answer = synthesize("chapter 1 summary", &ranked, QueryMode::BookScope, None);
        assert!(answer.ends_with("- how nodes talk\n- how to launch them"));
        assert!(!answer.contains("Next up"));
    }

    #[test]
    fn summary_falls_back_to_bullets() {
        let body = "Key points:\n- one\n- two\n* three\n- four\n- five\n- six";
        let ranked = vec![hit("chapter-01.md", "Chapter 1", "Wrap-up", body, 10)];
        let answer = synthesize("chapter 1 summary", &ranked, QueryMode::BookScope, None);
        assert!(answer.ends_with("- one\n- two\n* three\n- four\n- five"));
    }

    #[test]
    fn specific_answer_mixes_prose_and_one_code_block() {
        let body =
            "```python\nimport rclpy\n```\n\n\
            A publisher is created from a node and sends typed messages.\n\n```python\n\
            node.create_publisher(String, 'chatter', 10)\n```\n\n```python\nrclpy.spin(node)\n```\n\
            \n#### Details\n\nThe queue depth bounds how many messages wait for slow subscribers.\n\
            \nQuality of service settings control reliability and durability.\n\n\
            This paragraph should never be reached by the answer builder.";
        let ranked = vec![hit("pub.md", "Publishers", "Creating a publisher", body, 10)];
        let answer = synthesize("create publisher", &ranked, QueryMode::BookScope, None);

        assert!(!answer.contains("import rclpy"));
        assert!(answer.contains("create_publisher"));
        assert!(!answer.contains("rclpy.spin"));
        assert!(!answer.contains("#### Details"));
        assert!(answer.contains("Quality of service"));
        assert!(!answer.contains("never be reached"));
        assert!(!answer.contains("**See also:**"));
    }

    #[test]
    fn specific_answer_falls_back_to_second_section() {
        let ranked = vec![
            hit("a.md", "A", "Commands", "```bash\nros2 topic list\n```", 10),
            hit(
                "b.md",
                "B",
                "Topics",
                "Topics are named buses over which nodes exchange messages.",
                5,
            ),
        ];
        let answer = synthesize("topic list", &ranked, QueryMode::BookScope, None);
        assert!(answer.contains("\n\nTopics are named buses"));
        assert!(answer.ends_with("**See also:**\n- Topics"));
    }

    #[test]
    fn sources_are_distinct_and_capped() {
        let ranked = vec![
            hit("a.md", "A", "Nodes", "x", 5),
            hit("b.md", "B", "Nodes", "x", 4),
            hit("c.md", "C", "Topics", "x", 3),
            hit("d.md", "D", "Services", "x", 2),
            hit("e.md", "E", "Actions", "x", 1),
        ];
        assert_eq!(source_names(&ranked), vec!["Nodes", "Topics", "Services"]);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
