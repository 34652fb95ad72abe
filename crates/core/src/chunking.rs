use crate::models::{IndexingOptions, Section};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::LazyLock;

static MODULE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(module-\d+-[^/]+|intro)/").unwrap());
static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").unwrap());
static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

const SECTION_MARKER: &str = "\n## ";
const SUBSECTION_MARKER: &str = "\n### ";

/// Module id for a document, taken from a `module-<n>-<slug>` or `intro`
/// directory in its path. The intro document itself is always `intro`.
pub fn infer_module(path: &Path, options: &IndexingOptions) -> Option<String> {
    let is_intro_document = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem == options.intro_stem);
    if is_intro_document {
        return Some(options.intro_stem.clone());
    }

    let normalized = path.to_string_lossy().replace('\\', "/");
    MODULE_PATTERN
        .captures(&normalized)
        .and_then(|capture| capture.get(1))
        .map(|m| m.as_str().to_string())
}

/// First `# ` heading anywhere in the document.
pub fn extract_title(content: &str) -> Option<String> {
    TITLE_PATTERN
        .captures(content)
        .and_then(|capture| capture.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Paragraphs separated by blank lines, trimmed, empties dropped.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

/// Splits one markdown document into `##` sections and `###` subsections.
///
/// Text before the first `##` heading is treated as frontmatter and skipped
/// unless it opens with a heading of its own. Subsections are emitted in
/// addition to their parent, with a `"Parent > Child"` section path.
pub fn segment_document(path: &Path, content: &str, options: &IndexingOptions) -> Vec<Section> {
    let content = content.replace("\r\n", "\n");
    let file = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let title = extract_title(&content).unwrap_or_else(|| {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file.as_str())
            .to_string()
    });

    let mut builder = SectionBuilder {
        file,
        title,
        source_path: path.to_string_lossy().to_string(),
        module: infer_module(path, options),
        min_body_chars: options.min_body_chars,
        ordinal: 0,
        sections: Vec::new(),
    };

    for (index, fragment) in content.split(SECTION_MARKER).enumerate() {
        if index == 0 && !fragment.starts_with('#') {
            continue;
        }

        let (heading, body) = split_heading(fragment);
        builder.push(heading.clone(), body);

        for (sub_index, sub_fragment) in body.split(SUBSECTION_MARKER).enumerate() {
            let sub_fragment = if sub_index == 0 {
                match sub_fragment.strip_prefix("### ") {
                    Some(rest) => rest,
                    None => continue,
                }
            } else {
                sub_fragment
            };

            let (sub_heading, sub_body) = split_heading(sub_fragment);
            builder.push(format!("{heading} > {sub_heading}"), sub_body);
        }
    }

    builder.sections
}

struct SectionBuilder {
    file: String,
    title: String,
    source_path: String,
    module: Option<String>,
    min_body_chars: usize,
    ordinal: u64,
    sections: Vec<Section>,
}

impl SectionBuilder {
    fn push(&mut self, section_path: String, body: &str) {
        if body.chars().count() <= self.min_body_chars {
            return;
        }

        self.sections.push(Section {
            section_id: make_section_id(&self.source_path, &section_path, self.ordinal),
            file: self.file.clone(),
            title: self.title.clone(),
            section_path,
            body: body.to_string(),
            source_path: self.source_path.clone(),
            module: self.module.clone(),
        });
        self.ordinal = self.ordinal.saturating_add(1);
    }
}

fn split_heading(fragment: &str) -> (String, &str) {
    let (first_line, rest) = fragment.split_once('\n').unwrap_or((fragment, ""));
    let heading = first_line.trim().trim_start_matches('#').trim().to_string();
    (heading, rest.trim())
}

fn make_section_id(source_path: &str, section_path: &str, ordinal: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(section_path.as_bytes());
    hasher.update(ordinal.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILLER: &str =
        "This paragraph is long enough to clear the minimum body length for indexing.";

    fn options() -> IndexingOptions {
        IndexingOptions::default()
    }

    #[test]
    fn module_is_taken_from_directory_name() {
        let path = Path::new("/site/docs/module-2-gazebo-simulation/chapter-04-physics.md");
        assert_eq!(
            infer_module(path, &options()).as_deref(),
            Some("module-2-gazebo-simulation")
        );
    }

    #[test]
    fn module_handles_backslash_separators() {
        let path = Path::new(r"C:\site\docs\module-1-ros2\chapter-01.md");
        assert_eq!(infer_module(path, &options()).as_deref(), Some("module-1-ros2"));
    }

    #[test]
    fn intro_document_is_always_intro_module() {
        let path = Path::new("/site/docs/intro.md");
        assert_eq!(infer_module(path, &options()).as_deref(), Some("intro"));
        assert_eq!(infer_module(Path::new("/site/docs/glossary.md"), &options()), None);
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        let content = format!("## Only a section\n{FILLER}\n");
        let sections = segment_document(Path::new("/docs/appendix-a.md"), &content, &options());
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "appendix-a");
        assert_eq!(sections[0].file, "appendix-a.md");
        assert_eq!(sections[0].section_path, "Only a section");
    }

    #[test]
    fn frontmatter_before_first_section_is_skipped() {
        let content = format!(
            "---\nsidebar_position: 1\ntitle: ignored and long enough to pass the threshold check\n\
            ---\n\n## Nodes\n{FILLER}\n"
        );
        let sections = segment_document(Path::new("/docs/nodes.md"), &content, &options());
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_path, "Nodes");
    }

    #[test]
    fn leading_title_fragment_is_indexed_without_markers() {
        let content = format!("# ROS 2 Fundamentals\n\n{FILLER}\n\n## Topics\n{FILLER}\n");
        let sections = segment_document(Path::new("/docs/ros.md"), &content, &options());
        let paths: Vec<_> = sections.iter().map(|s| s.section_path.as_str()).collect();
        assert_eq!(paths, vec!["ROS 2 Fundamentals", "Topics"]);
        assert!(sections.iter().all(|s| s.title == "ROS 2 Fundamentals"));
    }

    #[test]
    fn short_bodies_are_not_indexed() {
        let content = format!("# Doc\n\n## Tiny\nshort body\n\n## Full\n{FILLER}\n");
        let sections = segment_document(Path::new("/docs/doc.md"), &content, &options());
        assert!(sections.iter().all(|s| s.body.chars().count() > 50));
        assert!(sections.iter().all(|s| s.section_path != "Tiny"));
    }

    #[test]
    fn subsections_are_indexed_alongside_parent() {
        let content = format!(
            "# Doc\n\n## Parent\n{FILLER}\n\n### First\n{FILLER}\n\n### Second\n{FILLER}\n"
        );
        let sections = segment_document(Path::new("/docs/doc.md"), &content, &options());
        let paths: Vec<_> = sections.iter().map(|s| s.section_path.as_str()).collect();
        assert_eq!(paths, vec!["Parent", "Parent > First", "Parent > Second"]);
        assert!(sections[0].body.contains("### First"));
    }

    #[test]
    fn subsection_directly_under_heading_is_kept() {
        let content = format!("# Doc\n\n## Parent\n### Child\n{FILLER}\n");
        let sections = segment_document(Path::new("/docs/doc.md"), &content, &options());
        let paths: Vec<_> = sections.iter().map(|s| s.section_path.as_str()).collect();
        assert_eq!(paths, vec!["Parent", "Parent > Child"]);
    }

    #[test]
    fn section_ids_are_stable() {
        let content = format!("# Doc\n\n## Parent\n{FILLER}\n");
        let first = segment_document(Path::new("/docs/doc.md"), &content, &options());
        let second = segment_document(Path::new("/docs/doc.md"), &content, &options());
        assert_eq!(first, second);
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let paragraphs = split_paragraphs("one\ntwo\n\n  \nthree\n \t\nfour");
        assert_eq!(paragraphs, vec!["one\ntwo", "three", "four"]);
    }
}
