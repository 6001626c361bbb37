//! Prompt templates for overview, chat and commit analysis.

use crate::assistant::context::CommitRef;
use crate::github::types::short_sha;

/// Heading the overview answer is expected under.
pub const OVERVIEW_HEADER: &str = "## Repository Overview";

/// Heading of the evolution part of an analysis.
pub const EVOLUTION_HEADER: &str = "## Evolution Summary";

/// Heading of the target-commit part of an analysis.
pub const COMMIT_DETAIL_HEADER: &str = "## Commit Analysis";

/// Heading of the codebase snapshot part of an analysis.
pub const SNAPSHOT_HEADER: &str = "## Codebase Snapshot";

/// Section names and markers extracted from an analysis answer.
pub const ANALYSIS_SECTIONS: &[(&str, &str)] = &[
    ("evolution", EVOLUTION_HEADER),
    ("commit", COMMIT_DETAIL_HEADER),
    ("snapshot", SNAPSHOT_HEADER),
];

/// Answer returned for a repository without commits.
pub const EMPTY_REPOSITORY_OVERVIEW: &str =
    "This repository has no commits yet, so there is nothing to summarize.";

fn commit_list(commits: &[CommitRef]) -> String {
    if commits.is_empty() {
        return "N/A".to_string();
    }
    commits
        .iter()
        .map(|c| format!("Commit {} (SHA: {})", c.number, short_sha(&c.sha)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prompt summarizing a repository from its first commit and README.
pub fn overview_prompt(first_number: u32, first_sha: &str, diff: &str, readme: Option<&str>) -> String {
    let sha7 = short_sha(first_sha);
    let readme = readme
        .filter(|r| !r.trim().is_empty())
        .unwrap_or("No README file found.");
    format!(
        r#"You are a friendly technical writer. Analyze the first commit diff of a GitHub repository (it shows every initially added file) and its README, if any.
Write a concise outline (about 100-150 words) in plain, non-technical language describing what the repository is for and roughly what it implements.

**Important:** state explicitly that the description is based on "the first commit (number {first_number})".

**Material:**

* **First commit diff (number {first_number}, SHA: {sha7}):**
```diff
{diff}
```

* **README content:**
```
{readme}
```

**Output format:** (only the outline below)
{OVERVIEW_HEADER}
[your 100-150 word outline, mentioning that it is based on the first commit]
"#
    )
}

/// Context part of a chat turn, placed before the user's question.
pub fn chat_context(included: &[CommitRef], diffs: &str) -> String {
    format!(
        "You are an AI assistant for code analysis and Q&A.\n\
         Answer the user's latest question using the diffs of the selected GitHub commits below and the previous conversation.\n\n\
         **Commit diffs under discussion:**\n\
         (selected by the user: {})\n\
         {diffs}\n---\n",
        commit_list(included)
    )
}

/// Full user turn of a chat request: context block, then the question.
pub fn chat_turn(context: &str, question: &str) -> String {
    format!("{context}\n**User's latest question:**\n{question}")
}

/// Prompt reviewing a target commit within its preceding context.
pub fn analysis_prompt(target: &CommitRef, diffs: &str, max_commits: usize) -> String {
    let n = target.number;
    let sha7 = short_sha(&target.sha);
    let context_slots = max_commits.saturating_sub(1);
    format!(
        r#"You are a senior code reviewer. Carefully analyze the diffs of this GitHub repository, focusing on the changes of commit {n} (SHA: {sha7}).

**Goal:**
Describe how the code evolved from the earlier commits (partial context) up to **commit {n}**, and evaluate the changes of commit {n} itself.

**Provided diffs:**
(the target commit and up to {context_slots} preceding commits as context)
{diffs}

**Required report:**

1. **{EVOLUTION_HEADER}**
   * Based on the provided context, briefly describe how the core functionality or goals changed up to commit {n} (about 50-100 words).

2. **{COMMIT_DETAIL_HEADER}: commit {n} (SHA: {sha7})**
   * **Main changes**: what exactly does this commit do?
   * **Technical details**: (optional) notable implementation points.
   * **Potential issues or risks**: (if any) code smells or future risks.
   * **Suggestions**: (if any) how the change could be better (tests, naming, simpler logic, ...).

3. **{SNAPSHOT_HEADER} (as of commit {n})**
   * Overall, what is this codebase for at this commit and what are its main functions? (about 50-100 words)

**Output format:**
Organize the answer strictly under the markdown headings (##) above.
"#
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::assistant::extract::extract_section;

    #[test]
    fn overview_prompt_names_first_commit() {
        let prompt = overview_prompt(1, "a1b2c3d4e5", "+fn main() {}", None);
        assert!(prompt.contains("number 1, SHA: a1b2c3d"));
        assert!(prompt.contains("No README file found."));
        assert!(prompt.trim_end().ends_with("based on the first commit]"));
    }

    #[test]
    fn chat_context_lists_selected_commits() {
        let context = chat_context(
            &[CommitRef::new(2, "bbbbbbbbbb"), CommitRef::new(5, "eeeeeeeeee")],
            "DIFFS",
        );
        assert!(context.contains("Commit 2 (SHA: bbbbbbb), Commit 5 (SHA: eeeeeee)"));
        assert!(context.contains("DIFFS"));
    }

    #[test]
    fn chat_turn_puts_question_last() {
        let turn = chat_turn("ctx", "What changed?");
        assert!(turn.starts_with("ctx"));
        assert!(turn.ends_with("What changed?"));
    }

    #[test]
    fn analysis_prompt_headings_are_not_extracted_from_instructions() {
        let prompt = analysis_prompt(&CommitRef::new(4, "d4d4d4d4d4"), "DIFFS", 10);
        assert!(prompt.contains("up to 9 preceding commits"));
        // Headings in the instructions are bolded list items, not heading lines.
        assert_eq!(extract_section(&prompt, SNAPSHOT_HEADER), None);
    }
}
