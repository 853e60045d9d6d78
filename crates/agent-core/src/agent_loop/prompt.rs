//! System prompt assembly.
//!
//! The system instruction is rebuilt every turn from three parts: the base
//! behavior text, the optional persona, and a page-context section describing
//! what the store knows about the active tab.

use std::fmt::Write as _;

use pagelens_core_types::TabId;
use pagelens_snapshot_store::{DiffResult, SnapshotMeta, TabMeta};

use super::types::ChatMode;

/// Base behavior text for every turn.
pub const BASE_SYSTEM_PROMPT: &str = r#"You are a reading assistant embedded in the user's browser. You answer questions about the page open in the active tab.

## Page Access
The page text is split into numbered chunks (0-based). The page context below lists how many chunks exist and what changed since the previous read; it does not contain the text itself.
- Use `read_page_chunks` to read the chunks you need before answering. Prefer a few targeted chunks over the whole page.
- Pass `"source": "previous"` to read the page as it was at the previous read, for example to explain what changed.
- Use `read_editor` to read code editors or form fields listed under Editors.

## Answering
- Ground every claim in text you have read. Say so when the page does not contain the answer.
- Quote short passages when they help; do not paste whole chunks back to the user.
- Keep answers concise and in the user's language."#;

const AGENT_MODE_PROMPT: &str = r#"## Editing
You may change editors on the live page with `write_editor`. Read the editor first, then replace the smallest exact span of text that achieves the change (`find` must match the editor text exactly). Leave `find` empty only when replacing the whole content. Report whether each write succeeded."#;

const ASK_MODE_PROMPT: &str = "## Editing\nYou cannot modify the page in this mode. If the user asks for an edit, show the change instead.";

/// What the orchestrator learned about the active tab while preparing a turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageView {
    /// Slot metadata for the tab, from the store.
    pub meta: TabMeta,
    /// Diff of the push made for this turn; `None` when nothing was pushed.
    pub diff: Option<DiffResult>,
    /// `(key, label)` pairs of editors on the latest read.
    pub editors: Vec<(String, String)>,
}

impl PageView {
    pub fn url(&self) -> Option<&str> {
        self.meta.latest.as_ref().map(|meta| meta.url.as_str())
    }
}

/// Page the model was last told it is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIdentity {
    pub tab: TabId,
    pub url: Option<String>,
}

impl PageIdentity {
    /// Whether `next` is a different page from the model's point of view.
    /// An unknown URL on the same tab is not treated as a switch.
    pub fn switched_to(&self, next: &PageIdentity) -> bool {
        if self.tab != next.tab {
            return true;
        }
        match (&self.url, &next.url) {
            (Some(before), Some(after)) => before != after,
            _ => false,
        }
    }
}

/// Full system instruction for one turn.
pub fn format_system_prompt(persona: Option<&str>, mode: ChatMode, page_section: &str) -> String {
    let mut prompt = String::from(BASE_SYSTEM_PROMPT);
    prompt.push_str("\n\n");
    prompt.push_str(if mode.allows_writes() {
        AGENT_MODE_PROMPT
    } else {
        ASK_MODE_PROMPT
    });
    if let Some(persona) = persona.map(str::trim).filter(|text| !text.is_empty()) {
        prompt.push_str("\n\n## Additional Instructions\n");
        prompt.push_str(persona);
    }
    prompt.push_str("\n\n");
    prompt.push_str(page_section);
    prompt
}

/// Page-context section. `switched_from` overrides the diff description.
pub fn format_page_section(
    tab: TabId,
    view: &PageView,
    switched_from: Option<&PageIdentity>,
) -> String {
    let mut out = String::from("## Page Context\n");
    let Some(latest) = view.meta.latest.as_ref() else {
        out.push_str("No page content is available for this tab. Answer from the conversation, and tell the user if the page could not be read.");
        if let Some(previous) = switched_from {
            out.push_str("\n\n");
            out.push_str(&format_page_switch(previous));
        }
        return out;
    };

    let _ = writeln!(out, "Tab: {tab}");
    write_meta(&mut out, "Current page", latest);
    if let Some(previous) = view.meta.previous.as_ref() {
        write_meta(&mut out, "Previous read", previous);
    }
    if !view.editors.is_empty() {
        out.push_str("\n### Editors\n");
        for (key, label) in &view.editors {
            if label.is_empty() {
                let _ = writeln!(out, "- `{key}`");
            } else {
                let _ = writeln!(out, "- `{key}`: {label}");
            }
        }
    }

    out.push_str("\n### Changes\n");
    if let Some(previous) = switched_from {
        out.push_str(&format_page_switch(previous));
        return out;
    }
    match view.diff.as_ref() {
        None => out.push_str(
            "The live page could not be read for this message; the details above come from the last successful read.",
        ),
        Some(diff) => out.push_str(&describe_diff(diff)),
    }
    out
}

/// Notice telling the model the user moved to another page.
pub fn format_page_switch(previous: &PageIdentity) -> String {
    let from = match previous.url.as_deref() {
        Some(url) => format!("{url} (tab {})", previous.tab),
        None => format!("tab {}", previous.tab),
    };
    format!(
        "The user is now looking at a different page than earlier in this conversation (previously {from}). Earlier page content and earlier chunk numbers no longer apply; read the current page before answering."
    )
}

fn write_meta(out: &mut String, heading: &str, meta: &SnapshotMeta) {
    let _ = writeln!(out, "{heading}: {}", meta.url);
    if !meta.title.is_empty() {
        let _ = writeln!(out, "  Title: {}", meta.title);
    }
    let _ = writeln!(
        out,
        "  Chunks: {} (read at {})",
        meta.total_chunks,
        meta.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn describe_diff(diff: &DiffResult) -> String {
    match diff {
        DiffResult::NoPrevious => "This is the first read of this page.".to_string(),
        DiffResult::Unchanged => "The page has not changed since the previous read.".to_string(),
        DiffResult::UrlChanged { previous_url, url } => format!(
            "The tab navigated from {previous_url} to {url} since the previous read. Treat it as a new page."
        ),
        DiffResult::SmallDiff {
            patch,
            changed_lines,
            total_lines,
            changed_chunks,
        } => format!(
            "The page changed slightly since the previous read ({changed_lines} of {total_lines} lines). Changed chunks: {}.\n```diff\n{}\n```",
            format_indices(changed_chunks),
            patch.trim_end()
        ),
        DiffResult::LargeDiff {
            changed_lines,
            total_lines,
            changed_chunks,
        } => format!(
            "The page changed substantially since the previous read ({changed_lines} of {total_lines} lines). Changed chunks: {}. Re-read the chunks you need.",
            format_indices(changed_chunks)
        ),
    }
}

fn format_indices(indices: &[usize]) -> String {
    if indices.is_empty() {
        return "none".to_string();
    }
    let list: Vec<String> = indices.iter().map(usize::to_string).collect();
    format!("[{}]", list.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta(url: &str, chunks: usize) -> SnapshotMeta {
        SnapshotMeta {
            url: url.to_string(),
            title: "Docs".to_string(),
            total_chunks: chunks,
            updated_at: Utc::now(),
        }
    }

    fn view(diff: Option<DiffResult>) -> PageView {
        PageView {
            meta: TabMeta {
                latest: Some(meta("https://example.com/b", 3)),
                previous: Some(meta("https://example.com/a", 2)),
            },
            diff,
            editors: vec![("monaco_1".into(), "main.rs".into())],
        }
    }

    #[test]
    fn empty_view_says_no_content() {
        let section = format_page_section(TabId(1), &PageView::default(), None);
        assert!(section.contains("No page content is available"));
        assert!(!section.contains("different page"));
    }

    #[test]
    fn unreadable_page_after_switch_still_gets_notice() {
        let previous = PageIdentity {
            tab: TabId(1),
            url: Some("https://example.com/a".into()),
        };
        let section = format_page_section(TabId(2), &PageView::default(), Some(&previous));
        assert!(section.contains("No page content is available"));
        assert!(section.contains("different page"));
        assert!(section.contains("https://example.com/a (tab 1)"));
    }

    #[test]
    fn small_diff_includes_patch_and_chunks() {
        let section = format_page_section(
            TabId(1),
            &view(Some(DiffResult::SmallDiff {
                patch: "--- previous\n+++ latest\n@@ -1 +1 @@\n-a\n+b\n".into(),
                changed_lines: 2,
                total_lines: 10,
                changed_chunks: vec![0, 2],
            })),
            None,
        );
        assert!(section.contains("Chunks: 3"));
        assert!(section.contains("`monaco_1`: main.rs"));
        assert!(section.contains("Changed chunks: [0, 2]"));
        assert!(section.contains("```diff\n--- previous"));
    }

    #[test]
    fn switch_notice_overrides_diff() {
        let previous = PageIdentity {
            tab: TabId(1),
            url: Some("https://example.com/a".into()),
        };
        let section =
            format_page_section(TabId(2), &view(Some(DiffResult::Unchanged)), Some(&previous));
        assert!(section.contains("different page"));
        assert!(section.contains("https://example.com/a (tab 1)"));
        assert!(!section.contains("has not changed"));
    }

    #[test]
    fn identity_switch_rules() {
        let a = PageIdentity {
            tab: TabId(1),
            url: Some("https://a".into()),
        };
        let b = PageIdentity {
            tab: TabId(1),
            url: Some("https://b".into()),
        };
        let unknown = PageIdentity {
            tab: TabId(1),
            url: None,
        };
        let other_tab = PageIdentity {
            tab: TabId(2),
            url: Some("https://a".into()),
        };
        assert!(!a.switched_to(&a.clone()));
        assert!(a.switched_to(&b));
        assert!(!a.switched_to(&unknown));
        assert!(a.switched_to(&other_tab));
    }

    #[test]
    fn persona_and_mode_sections() {
        let prompt = format_system_prompt(Some("  Be terse. "), ChatMode::Agent, "## Page Context\n");
        assert!(prompt.starts_with(BASE_SYSTEM_PROMPT));
        assert!(prompt.contains("write_editor"));
        assert!(prompt.contains("## Additional Instructions\nBe terse."));
        assert!(prompt.ends_with("## Page Context\n"));

        let prompt = format_system_prompt(Some("   "), ChatMode::Ask, "");
        assert!(!prompt.contains("Additional Instructions"));
        assert!(prompt.contains("cannot modify the page"));
    }
}
