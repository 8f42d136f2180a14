/// Stacktrace compressor — keep project frames, fold framework noise.
///
/// Dialect detection picks the frame shape (JS, Python, Rust, Go, Java or a
/// generic indented form); each frame is then classified project/internal
/// and runs of internal frames collapse into one omission marker. Header and
/// message lines always survive.
use once_cell::sync::Lazy;
use regex::Regex;

use super::{CompressOptions, CompressedResult, DetailLevel};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
    Generic,
}

static JS_FRAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+at\s+.+").unwrap());
static PY_FRAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\s*File "[^"]+", line \d+"#).unwrap());
static RUST_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+(\d+:\s+|at\s+)").unwrap());
static GO_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[\w./@-]+\([^)]*\)$|^\s+[\w./@-]+\.go:\d+").unwrap());
static JAVA_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+at\s+[\w.$]+\([\w.]+\.java:\d+\)").unwrap());

static INTERNAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"node_modules|internal/|<anonymous>|webpack:|site-packages|/usr/lib/").unwrap()
});
static PROJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(src|app|lib|pages|components|utils|services|hooks|store)/|\.(ts|tsx|js|jsx|py|go|rs|php|swift)\b")
        .unwrap()
});

pub fn detect_dialect(content: &str) -> Dialect {
    if content.contains("Traceback (most recent call last):") {
        return Dialect::Python;
    }
    if content.contains("panicked at") || content.contains("stack backtrace:") {
        return Dialect::Rust;
    }
    if content.lines().any(|l| l.starts_with("goroutine ") && l.contains('[')) {
        return Dialect::Go;
    }
    if content.lines().any(|l| JAVA_FRAME.is_match(l)) {
        return Dialect::Java;
    }
    if content.lines().any(|l| JS_FRAME.is_match(l)) {
        return Dialect::JavaScript;
    }
    Dialect::Generic
}

fn is_frame(dialect: Dialect, line: &str) -> bool {
    match dialect {
        Dialect::JavaScript => JS_FRAME.is_match(line),
        Dialect::Python => PY_FRAME.is_match(line),
        Dialect::Rust => RUST_FRAME.is_match(line),
        Dialect::Go => GO_FRAME.is_match(line),
        Dialect::Java => JAVA_FRAME.is_match(line),
        Dialect::Generic => {
            line.starts_with(' ') && !line.trim().is_empty()
        }
    }
}

/// Internal wins ties (a node_modules path also looks like source); frames
/// matching neither shape stay internal so unknown noise still folds.
fn is_internal(line: &str) -> bool {
    if INTERNAL.is_match(line) {
        return true;
    }
    !PROJECT.is_match(line)
}

/// Frames kept per internal run in detailed mode.
const DETAILED_KEPT: usize = 3;

pub fn compress(content: &str, options: &CompressOptions) -> Result<CompressedResult> {
    let preserve = options.preserve_regexes()?;
    let dialect = detect_dialect(content);
    let keep_internal = if options.level == DetailLevel::Detailed {
        DETAILED_KEPT
    } else {
        0
    };

    let mut out: Vec<String> = Vec::new();
    let mut internal_run: Vec<&str> = Vec::new();
    let mut omitted_total = 0usize;

    let flush_run = |run: &mut Vec<&str>, out: &mut Vec<String>, omitted: &mut usize| {
        if run.is_empty() {
            return;
        }
        let kept = run.len().min(keep_internal);
        for frame in run.iter().take(kept) {
            out.push((*frame).to_string());
        }
        let omitted_here = run.len() - kept;
        if omitted_here > 0 {
            out.push(format!("… ({omitted_here} internal frames omitted)"));
            *omitted += omitted_here;
        }
        run.clear();
    };

    let mut prev_was_frame = false;
    let mut prev_internal = false;
    for line in content.lines() {
        let pinned = preserve.iter().any(|re| re.is_match(line));
        let frame = is_frame(dialect, line);
        // Continuation lines (Python source echo, Rust `at` detail) follow
        // their frame's classification.
        let continuation = !frame
            && prev_was_frame
            && line.starts_with(' ')
            && !line.trim().is_empty()
            && dialect != Dialect::Generic;

        if pinned || (!frame && !continuation) {
            flush_run(&mut internal_run, &mut out, &mut omitted_total);
            out.push(line.to_string());
            prev_was_frame = false;
            continue;
        }

        let internal = if continuation { prev_internal } else { is_internal(line) };
        if internal {
            internal_run.push(line);
        } else {
            flush_run(&mut internal_run, &mut out, &mut omitted_total);
            out.push(line.to_string());
        }
        prev_was_frame = true;
        prev_internal = internal;
    }
    flush_run(&mut internal_run, &mut out, &mut omitted_total);

    let omitted_info =
        (omitted_total > 0).then(|| format!("{omitted_total} internal frames omitted"));

    Ok(CompressedResult::build(
        content,
        out.join("\n"),
        "stacktrace",
        omitted_info,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn js_trace() -> String {
        let mut s = String::from("TypeError: boom\n");
        for i in 0..5 {
            s.push_str(&format!("    at lib{i} (/repo/node_modules/dep/index.js:{}:1)\n", i + 1));
        }
        s.push_str("    at handler (/repo/src/handler.js:10:5)\n");
        for i in 0..3 {
            s.push_str(&format!("    at run{i} (node:internal/process:{}:3)\n", i + 1));
        }
        s
    }

    #[test]
    fn test_js_collapse_counts() {
        let out = compress(&js_trace(), &CompressOptions::default()).unwrap();
        let text = &out.compressed;
        assert!(text.contains("TypeError: boom"));
        assert!(text.contains("… (5 internal frames omitted)"));
        assert!(text.contains("at handler (/repo/src/handler.js:10:5)"));
        assert!(text.contains("… (3 internal frames omitted)"));
        let project_idx = text.find("handler.js").unwrap();
        let first_marker = text.find("(5 internal").unwrap();
        let second_marker = text.find("(3 internal").unwrap();
        assert!(first_marker < project_idx && project_idx < second_marker);
    }

    #[test]
    fn test_detailed_keeps_up_to_three() {
        let out = compress(
            &js_trace(),
            &CompressOptions::with_level(DetailLevel::Detailed),
        )
        .unwrap();
        assert!(out.compressed.contains("at lib0"));
        assert!(out.compressed.contains("at lib2"));
        assert!(out.compressed.contains("… (2 internal frames omitted)"));
        // The trailing run of 3 fits entirely.
        assert!(out.compressed.contains("at run2"));
    }

    #[test]
    fn test_python_dialect() {
        let src = r#"Traceback (most recent call last):
  File "/usr/lib/python3.11/runner.py", line 5, in run
    do()
  File "/repo/src/app.py", line 12, in do
    raise ValueError("bad")
ValueError: bad
"#;
        let out = compress(src, &CompressOptions::default()).unwrap();
        assert!(out.compressed.contains("src/app.py"));
        assert!(out.compressed.contains("internal frames omitted"));
        assert!(out.compressed.contains("ValueError: bad"));
        assert!(!out.compressed.contains("runner.py"));
    }

    #[test]
    fn test_still_detects_as_stacktrace() {
        let out = compress(&js_trace(), &CompressOptions::default()).unwrap();
        assert_eq!(
            crate::detect::detect(&out.compressed),
            crate::detect::ContentType::Stacktrace
        );
    }
}
