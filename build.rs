use grep_regex::RegexMatcher;
use grep_searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

// Source hygiene rules enforced on every Rust file of the crate. The reference
// material under ./examples and build output under ./target are not ours to police.

#[derive(Clone, Copy)]
enum Rule {
    UnderscoreBinding,
    ForbiddenMarker,
    StarsInComment,
    ShoutingComment,
    AllowDeadCode,
}

const MARKERS: [&str; 14] = [
    "FIXED", "CORRECTED", "FIX", "FIXES", "NEW", "CHANGED", "CHANGES", "CHANGE", "MODIFIED",
    "MODIFIES", "MODIFY", "UPDATED", "UPDATES", "UPDATE",
];

impl Rule {
    const ALL: [Rule; 5] = [
        Rule::UnderscoreBinding,
        Rule::ForbiddenMarker,
        Rule::StarsInComment,
        Rule::ShoutingComment,
        Rule::AllowDeadCode,
    ];

    fn pattern(self) -> String {
        match self {
            Rule::UnderscoreBinding => r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            Rule::ForbiddenMarker => format!(r"(//|/\*).*(?:{})", MARKERS.join("|")),
            Rule::StarsInComment => r"(//|/\*).*\*\*".to_string(),
            Rule::ShoutingComment => r"(//|/\*).*".to_string(),
            Rule::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
        }
    }

    /// The build script spells out the markers it hunts for, so comment rules skip it.
    fn applies_to_build_script(self) -> bool {
        matches!(self, Rule::UnderscoreBinding)
    }

    fn explanation(self) -> &'static str {
        match self {
            Rule::UnderscoreBinding => {
                "Underscore-prefixed names are not allowed. Use the binding or remove it."
            }
            Rule::ForbiddenMarker => {
                "Comments narrating edits are not allowed. Describe the code as it is."
            }
            Rule::StarsInComment => "Emphasis with ** is not allowed in plain comments.",
            Rule::ShoutingComment => {
                "Comments whose letters are all uppercase are not allowed. Consider deleting them."
            }
            Rule::AllowDeadCode => {
                "#[allow(dead_code)] is not allowed. Use the code or remove it."
            }
        }
    }

    /// Decides whether a line the pattern matched is a real violation.
    fn is_violation(self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self {
            Rule::UnderscoreBinding => {
                let is_comment = trimmed.starts_with("//") || line.contains("/*");
                !is_comment && !underscore_only_in_strings(line)
            }
            Rule::ForbiddenMarker | Rule::AllowDeadCode => true,
            Rule::StarsInComment => !trimmed.starts_with("///"),
            Rule::ShoutingComment => {
                let letters: Vec<char> = comment_text(line)
                    .map(|text| text.chars().filter(|c| c.is_alphabetic()).collect())
                    .unwrap_or_default();
                !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
            }
        }
    }
}

fn underscore_only_in_strings(line: &str) -> bool {
    line.contains('"')
        && line
            .split('"')
            .enumerate()
            .any(|(idx, part)| idx % 2 == 1 && part.contains('_'))
}

fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("///") {
        return Some(rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(rest.trim());
    }
    let start = line.find("/*")? + 2;
    let body = &line[start..];
    Some(body.find("*/").map_or(body, |end| &body[..end]).trim())
}

struct RuleSink {
    rule: Rule,
    hits: Vec<String>,
}

impl Sink for RuleSink {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.rule.is_violation(line_text) {
            self.hits.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn source_files() -> Vec<PathBuf> {
    WalkDir::new(".")
        .into_iter()
        .filter_entry(|e| {
            let path = e.path();
            !path.starts_with("./target") && !path.starts_with("./examples")
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan(rule: Rule, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(&rule.pattern())?;
    let mut searcher = Searcher::new();
    for path in files {
        if path.file_name().is_some_and(|n| n == "build.rs") && !rule.applies_to_build_script() {
            continue;
        }
        let mut sink = RuleSink {
            rule,
            hits: Vec::new(),
        };
        searcher.search_path(&matcher, path, &mut sink)?;
        if !sink.hits.is_empty() {
            return Err(report(rule, path, &sink.hits).into());
        }
    }
    Ok(())
}

fn report(rule: Rule, path: &Path, hits: &[String]) -> String {
    let mut msg = format!(
        "\n❌ ERROR: {} source hygiene violation(s) in {}:\n",
        hits.len(),
        path.display()
    );
    for hit in hits {
        msg.push_str(&format!("   {hit}\n"));
    }
    msg.push_str(&format!("\n⚠️ {}\n", rule.explanation()));
    msg
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in ["score", "cli", "ingest", "report", "tests", "benches"] {
        println!("cargo:rerun-if-changed={dir}");
    }

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    println!("cargo:rustc-env=STIMSCORE_BUILD_TIMESTAMP={timestamp}");

    let files = source_files();
    for rule in Rule::ALL {
        if let Err(e) = scan(rule, &files) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
