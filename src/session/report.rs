// Report rendering and export
// Author: kelexine (https://github.com/kelexine)

use super::{QueryKind, QueryRecord, UsageLedger};
use crate::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default file name for the combined export.
pub const COMBINED_FILE_NAME: &str = "batch_responses_combined.txt";

/// Separator between blocks of the combined report.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Shown in place of an answer when the model returned no text.
pub const NO_TEXT: &str = "_No text response_";

/// One `### [mode] prompt` block followed by the answer.
pub fn render_block(record: &QueryRecord) -> String {
    format!(
        "### [{}] {}\n{}\n",
        record.mode.as_str(),
        record.prompt,
        record.answer_text()
    )
}

/// Every prompt/answer pair in session order, then the aggregate usage summary.
pub fn render(records: &[QueryRecord], ledger: &UsageLedger, discount: f64) -> String {
    let mut blocks: Vec<String> = records.iter().map(render_block).collect();
    blocks.push(ledger.summary(discount));
    blocks.join(BLOCK_SEPARATOR)
}

/// `response_{mode}_{first 20 chars of the prompt}.txt`, spaces replaced.
pub fn response_file_name(mode: QueryKind, prompt: &str) -> String {
    let head: String = prompt.chars().take(20).collect();
    let head: String = head
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect();
    format!("response_{}_{}.txt", mode.as_str(), head)
}

/// Write `content` to `path`, creating parent directories.
pub fn export(path: &Path, content: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    info!("Exported {} bytes to {}", content.len(), path.display());
    Ok(path.to_path_buf())
}

/// Write one file per response into `dir`. Prompts sharing their first
/// 20 characters get `-2`, `-3`, ... suffixes instead of overwriting.
pub fn export_each(dir: &Path, records: &[QueryRecord]) -> Result<Vec<PathBuf>> {
    let mut taken = HashSet::new();
    records
        .iter()
        .map(|record| {
            let name = unique_name(response_file_name(record.mode, &record.prompt), &mut taken);
            export(&dir.join(name), &record.answer_text())
        })
        .collect()
}

fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let stem = name.strip_suffix(".txt").unwrap_or(&name);
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}.txt", stem, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TokenUsage;

    fn record(prompt: &str, answer: Option<&str>, mode: QueryKind) -> QueryRecord {
        QueryRecord {
            prompt: prompt.to_string(),
            answer: answer.map(str::to_string),
            mode,
            usage: Some(TokenUsage::new(10, 0, 5)),
        }
    }

    #[test]
    fn test_render_block() {
        let r = record("List the characters.", Some("Alice and Bob"), QueryKind::Explicit);
        assert_eq!(render_block(&r), "### [explicit] List the characters.\nAlice and Bob\n");
    }

    #[test]
    fn test_missing_answer_placeholder() {
        let r = record("Anything?", None, QueryKind::Implicit);
        assert!(render_block(&r).contains(NO_TEXT));
    }

    #[test]
    fn test_render_ends_with_summary() {
        let records = vec![
            record("first", Some("one"), QueryKind::Implicit),
            record("second", Some("two"), QueryKind::Implicit),
        ];
        let mut ledger = UsageLedger::new();
        for r in &records {
            ledger.record(r.usage.as_ref().unwrap());
        }

        let report = render(&records, &ledger, 0.75);
        let first = report.find("### [implicit] first\none").unwrap();
        let second = report.find("### [implicit] second\ntwo").unwrap();
        let summary = report.find("## Usage summary").unwrap();
        assert!(first < second && second < summary);
    }

    #[test]
    fn test_response_file_name() {
        assert_eq!(
            response_file_name(QueryKind::Explicit, "Summarize the video. Include timestamps"),
            "response_explicit_Summarize_the_video..txt"
        );
        assert_eq!(
            response_file_name(QueryKind::NoCache, "a/b"),
            "response_none_a-b.txt"
        );
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        export(&path, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn test_export_each_keeps_prompts_with_shared_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record("Summarize the video. Include timestamps", Some("FIRST"), QueryKind::Explicit),
            record("Summarize the video. Then list characters", Some("SECOND"), QueryKind::Explicit),
            record("Summarize the video. Any songs?", Some("THIRD"), QueryKind::Explicit),
        ];

        let paths = export_each(dir.path(), &records).unwrap();

        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "response_explicit_Summarize_the_video..txt",
                "response_explicit_Summarize_the_video.-2.txt",
                "response_explicit_Summarize_the_video.-3.txt",
            ]
        );
        let contents: Vec<_> = paths
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(contents, vec!["FIRST", "SECOND", "THIRD"]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }
}
