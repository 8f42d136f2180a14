/// Host bridge behind the sandbox — every SDK namespace a script can call.
///
/// Scripts reach the host through one function taking `(op, argsJson)` and
/// returning `{ok, value}` / `{ok, error, code}` JSON. Each operation
/// validates its inputs (paths against the working directory, globs against
/// traversal) before touching anything, and reuses the crate's compressors,
/// parsers and summarizers rather than reimplementing them.
use std::path::PathBuf;
use std::sync::Arc;

use globset::{Glob, GlobSetBuilder};
use regex::Regex;
use serde_json::{json, Value};
use walkdir::WalkDir;

use super::paths::{validate_glob, validate_path};
use crate::cache::{Lookup, SetOptions, SmartCache};
use crate::compress::{
    self, conversation, diff, logs as logs_compress, CompressOptions, DetailLevel,
};
use crate::detect;
use crate::error::{CoreError, Result};
use crate::git::GitContext;
use crate::parsers::{self, Language};
use crate::session::SessionTracker;
use crate::structure::ElementKind;
use crate::tokens::count_tokens;

/// Files larger than this are skipped by search/analyze sweeps.
const MAX_SCAN_BYTES: u64 = 1024 * 1024;
const MAX_GLOB_RESULTS: usize = 1000;
const MAX_GREP_MATCHES: usize = 200;

pub struct SdkBridge {
    pub working_dir: PathBuf,
    pub cache: Arc<SmartCache<Value>>,
    pub session: Arc<SessionTracker>,
}

impl SdkBridge {
    pub fn new(
        working_dir: PathBuf,
        cache: Arc<SmartCache<Value>>,
        session: Arc<SessionTracker>,
    ) -> Self {
        Self { working_dir, cache, session }
    }

    /// Wire entry point: JSON in, `{ok,...}` JSON out. Never panics.
    pub fn dispatch_json(&self, op: &str, args_json: &str) -> String {
        let args: Value = serde_json::from_str(args_json).unwrap_or(Value::Null);
        let response = match self.dispatch(op, &args) {
            Ok(value) => json!({ "ok": true, "value": value }),
            Err(err) => json!({ "ok": false, "error": err.to_string(), "code": err.code() }),
        };
        response.to_string()
    }

    pub fn dispatch(&self, op: &str, args: &Value) -> Result<Value> {
        match op {
            // ── files ────────────────────────────────────────────────────
            "files.read" => self.files_read(args),
            "files.exists" => {
                let path = validate_path(str_arg(args, "path")?, &self.working_dir)?;
                Ok(json!(path.exists()))
            }
            "files.glob" => {
                let files = self.glob_files(str_arg(args, "pattern")?)?;
                Ok(json!(files))
            }

            // ── compress ─────────────────────────────────────────────────
            "compress.auto" => {
                let text = str_arg(args, "text")?;
                let hint = args
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(detect::ContentType::from_str);
                let path = args.get("path").and_then(Value::as_str);
                let result = compress::auto(text, hint, path, &options_from(args)?)?;
                Ok(serde_json::to_value(result).unwrap_or(Value::Null))
            }
            "compress.logs" => {
                let result = logs_compress::compress(str_arg(args, "text")?, &options_from(args)?)?;
                Ok(serde_json::to_value(result).unwrap_or(Value::Null))
            }
            "compress.diff" => {
                let mut opts = diff::DiffOptions::for_level(level_from(args));
                if let Some(s) = args.get("strategy").and_then(Value::as_str) {
                    opts.strategy = match s {
                        "summary" => diff::Strategy::Summary,
                        "semantic" => diff::Strategy::Semantic,
                        _ => diff::Strategy::HunksOnly,
                    };
                }
                if let Some(n) = args.get("max_tokens").and_then(Value::as_u64) {
                    opts.max_tokens = Some(n as usize);
                }
                let result = diff::compress(str_arg(args, "text")?, &opts)?;
                Ok(serde_json::to_value(result).unwrap_or(Value::Null))
            }
            "compress.semantic" => {
                let opts = diff::DiffOptions {
                    strategy: diff::Strategy::Semantic,
                    max_tokens: args.get("max_tokens").and_then(Value::as_u64).map(|n| n as usize),
                    ..Default::default()
                };
                let result = diff::compress(str_arg(args, "text")?, &opts)?;
                Ok(serde_json::to_value(result).unwrap_or(Value::Null))
            }

            // ── code ─────────────────────────────────────────────────────
            "code.parse" => {
                let (content, lang) = self.source_arg(args)?;
                let structure = match lang {
                    Some(lang) => parsers::parse(&content, lang),
                    None => parsers::parse_named(&content, "unknown"),
                };
                Ok(serde_json::to_value(structure).unwrap_or(Value::Null))
            }
            "code.extract" => {
                let (content, lang) = self.source_arg(args)?;
                let lang = lang.ok_or_else(|| {
                    CoreError::UnsupportedLanguage("language required for extract".into())
                })?;
                let name = str_arg(args, "name")?;
                let kind = args
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(ElementKind::from_str);
                let include_imports =
                    args.get("include_imports").and_then(Value::as_bool).unwrap_or(false);
                match parsers::extract(&content, lang, kind, name, include_imports) {
                    Some(extracted) => Ok(serde_json::to_value(extracted).unwrap_or(Value::Null)),
                    None => Err(CoreError::ElementNotFound(name.to_string())),
                }
            }
            "code.skeleton" => {
                let (content, lang) = self.source_arg(args)?;
                let lang = lang.ok_or_else(|| {
                    CoreError::UnsupportedLanguage("language required for skeleton".into())
                })?;
                Ok(json!(parsers::skeleton(&content, lang)))
            }

            // ── utils ────────────────────────────────────────────────────
            "utils.countTokens" => Ok(json!(count_tokens(str_arg(args, "text")?))),
            "utils.detectType" => Ok(json!(detect::detect(str_arg(args, "text")?).as_str())),
            "utils.detectLanguage" => {
                let by_path = args
                    .get("path")
                    .and_then(Value::as_str)
                    .and_then(Language::from_path);
                let lang = by_path.or_else(|| {
                    args.get("text").and_then(Value::as_str).and_then(detect::detect_language)
                });
                Ok(lang.map(|l| json!(l.as_str())).unwrap_or(Value::Null))
            }

            // ── git ──────────────────────────────────────────────────────
            "git.diff" | "git.log" | "git.blame" | "git.status" | "git.branch" => {
                let sub = op.trim_start_matches("git.");
                let extra: Vec<String> = args
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|a| {
                        a.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let git = GitContext::open(&self.working_dir)?;
                Ok(json!(git.run(sub, &extra)?))
            }

            // ── search ───────────────────────────────────────────────────
            "search.grep" => self.search_grep(args),
            "search.symbols" => self.search_symbols(args),
            "search.files" => {
                let files = self.glob_files(str_arg(args, "pattern")?)?;
                Ok(json!(files))
            }
            "search.references" => {
                let name = str_arg(args, "name")?;
                let escaped = regex::escape(name);
                let mut patched = args.clone();
                patched["pattern"] = json!(format!(r"\b{escaped}\b"));
                self.search_grep(&patched)
            }

            // ── analyze ──────────────────────────────────────────────────
            "analyze.structure" => self.dispatch("code.parse", args),
            "analyze.dependencies" => self.analyze_dependencies(args),
            "analyze.exports" => self.analyze_exports(args),
            "analyze.callGraph" => self.analyze_call_graph(args),

            // ── multifile ────────────────────────────────────────────────
            "multifile.readAll" => {
                let mut out = String::new();
                for path in paths_arg(args)? {
                    let content = self.read_file(&path)?;
                    out.push_str(&format!("[{path}]\n{content}\n\n"));
                }
                Ok(json!(out))
            }
            "multifile.skeletons" => {
                let mut out = String::new();
                for path in paths_arg(args)? {
                    if let Some(lang) = Language::from_path(&path) {
                        let content = self.read_file(&path)?;
                        out.push_str(&format!("[{path}]\n{}\n\n", parsers::skeleton(&content, lang)));
                    }
                }
                Ok(json!(out))
            }
            "multifile.compress" => {
                let opts = options_from(args)?;
                let mut sections: Vec<String> = Vec::new();
                let mut original_tokens = 0usize;
                for path in paths_arg(args)? {
                    let content = self.read_file(&path)?;
                    original_tokens += count_tokens(&content);
                    let result = compress::auto(&content, None, Some(path.as_str()), &opts)?;
                    sections.push(format!("[{path}]\n{}", result.compressed));
                }
                let compressed = sections.join("\n\n");
                Ok(json!({
                    "compressed": compressed,
                    "original_tokens": original_tokens,
                    "compressed_tokens": count_tokens(&compressed),
                }))
            }
            "multifile.extractShared" => {
                let mut shared: Option<Vec<String>> = None;
                for path in paths_arg(args)? {
                    let Some(lang) = Language::from_path(&path) else { continue };
                    let content = self.read_file(&path)?;
                    let structure = parsers::parse(&content, lang);
                    let imports: Vec<String> = structure
                        .imports
                        .iter()
                        .filter_map(|i| i.signature.clone())
                        .collect();
                    shared = Some(match shared {
                        None => imports,
                        Some(prev) => prev.into_iter().filter(|i| imports.contains(i)).collect(),
                    });
                }
                Ok(json!(shared.unwrap_or_default()))
            }
            "multifile.chunk" => {
                let max = args
                    .get("max_tokens_per_chunk")
                    .and_then(Value::as_u64)
                    .unwrap_or(4000) as usize;
                let mut chunks: Vec<Vec<String>> = vec![Vec::new()];
                let mut budget = max;
                for path in paths_arg(args)? {
                    let content = self.read_file(&path)?;
                    let tokens = count_tokens(&content);
                    if tokens > budget && !chunks.last().map(Vec::is_empty).unwrap_or(true) {
                        chunks.push(Vec::new());
                        budget = max;
                    }
                    budget = budget.saturating_sub(tokens);
                    chunks.last_mut().unwrap().push(path);
                }
                Ok(json!(chunks))
            }

            // ── conversation ─────────────────────────────────────────────
            "conversation.compress" => {
                let messages = messages_arg(args)?;
                let opts = conversation::ConversationOptions {
                    strategy: args
                        .get("strategy")
                        .and_then(Value::as_str)
                        .and_then(conversation::ConversationStrategy::from_str)
                        .unwrap_or_default(),
                    keep_last: args.get("keep_last").and_then(Value::as_u64).unwrap_or(5) as usize,
                    preserve_system: args
                        .get("preserve_system")
                        .and_then(Value::as_bool)
                        .unwrap_or(true),
                };
                let (new_messages, result) = conversation::compress_messages(&messages, &opts)?;
                Ok(json!({
                    "messages": new_messages,
                    "stats": serde_json::to_value(result.stats).unwrap_or(Value::Null),
                }))
            }
            "conversation.extractDecisions" => {
                let messages = messages_arg(args)?;
                let decisions: Vec<String> = messages
                    .iter()
                    .flat_map(|m| m.content.lines())
                    .filter(|l| DECISION.is_match(l))
                    .map(|l| l.trim().to_string())
                    .collect();
                Ok(json!(decisions))
            }
            "conversation.extractCodeRefs" => {
                let messages = messages_arg(args)?;
                let mut refs: Vec<String> = Vec::new();
                for msg in &messages {
                    for caps in CODE_REF.captures_iter(&msg.content) {
                        let r = caps[0].trim_matches('`').to_string();
                        if !refs.contains(&r) {
                            refs.push(r);
                        }
                    }
                }
                Ok(json!(refs))
            }
            "conversation.createMemory" => {
                let messages = messages_arg(args)?;
                let opts = conversation::ConversationOptions {
                    strategy: conversation::ConversationStrategy::Hybrid,
                    keep_last: 0,
                    preserve_system: false,
                };
                let (compressed, _) = conversation::compress_messages(&messages, &opts)?;
                let summary = compressed
                    .first()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                let decisions = self.dispatch("conversation.extractDecisions", args)?;
                let files = self.dispatch("conversation.extractCodeRefs", args)?;
                Ok(json!({ "summary": summary, "decisions": decisions, "files": files }))
            }

            // ── cache / session (read-only views) ────────────────────────
            "cache.stats" => Ok(serde_json::to_value(self.cache.stats()).unwrap_or(Value::Null)),
            "session.stats" => {
                Ok(serde_json::to_value(self.session.snapshot()).unwrap_or(Value::Null))
            }

            other => Err(CoreError::ExecutionFailed(format!("unknown SDK op: {other}"))),
        }
    }

    // ── files helpers ─────────────────────────────────────────────────────

    fn read_file(&self, path: &str) -> Result<String> {
        let resolved = validate_path(path, &self.working_dir)?;
        if !resolved.exists() {
            return Err(CoreError::FileNotFound(path.to_string()));
        }
        let bytes = std::fs::read(&resolved).map_err(|e| CoreError::from_io(path, &e))?;
        // Non-UTF-8 bytes degrade to replacement characters.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn files_read(&self, args: &Value) -> Result<Value> {
        let path = str_arg(args, "path")?;
        let content = self.read_file(path)?;
        let tokens = count_tokens(&content);
        let key = format!("file:{path}");
        self.cache.set(
            &key,
            json!(content),
            SetOptions {
                file_path: Some(self.working_dir.join(path)),
                token_count: Some(tokens),
                ..Default::default()
            },
        );
        Ok(json!({
            "path": path,
            "content": content,
            "lines": content.lines().count(),
            "tokens": tokens,
        }))
    }

    /// Cached variant used by the heavier sweeps; falls back to disk.
    fn read_file_cached(&self, path: &str) -> Result<String> {
        let key = format!("file:{path}");
        if let Lookup::Hit(v) = self.cache.get(&key) {
            if let Some(s) = v.as_str() {
                return Ok(s.to_string());
            }
        }
        self.read_file(path)
    }

    fn glob_files(&self, pattern: &str) -> Result<Vec<String>> {
        validate_glob(pattern)?;
        let glob = Glob::new(pattern)
            .map_err(|e| CoreError::PatternInvalid(format!("{pattern}: {e}")))?;
        let set = {
            let mut builder = GlobSetBuilder::new();
            builder.add(glob);
            builder
                .build()
                .map_err(|e| CoreError::PatternInvalid(e.to_string()))?
        };

        let mut out = Vec::new();
        for entry in WalkDir::new(&self.working_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.working_dir)
                .unwrap_or(entry.path());
            if set.is_match(rel) {
                out.push(rel.to_string_lossy().into_owned());
                if out.len() >= MAX_GLOB_RESULTS {
                    break;
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Source either inline (`content` + `language`) or from a validated
    /// `path` with the language inferred from the extension.
    fn source_arg(&self, args: &Value) -> Result<(String, Option<Language>)> {
        if let Some(content) = args.get("content").and_then(Value::as_str) {
            let lang = args
                .get("language")
                .and_then(Value::as_str)
                .and_then(Language::from_name)
                .or_else(|| detect::detect_language(content));
            return Ok((content.to_string(), lang));
        }
        let path = str_arg(args, "path")?;
        let content = self.read_file_cached(path)?;
        let lang = args
            .get("language")
            .and_then(Value::as_str)
            .and_then(Language::from_name)
            .or_else(|| Language::from_path(path));
        Ok((content, lang))
    }

    // ── search helpers ────────────────────────────────────────────────────

    fn scan_files(&self, args: &Value) -> Result<Vec<String>> {
        let pattern = args
            .get("glob")
            .and_then(Value::as_str)
            .unwrap_or("**/*");
        self.glob_files(pattern)
    }

    fn search_grep(&self, args: &Value) -> Result<Value> {
        let pattern = str_arg(args, "pattern")?;
        let re = Regex::new(pattern).map_err(CoreError::from)?;
        let max = args
            .get("max_matches")
            .and_then(Value::as_u64)
            .unwrap_or(MAX_GREP_MATCHES as u64) as usize;

        let mut matches = Vec::new();
        'outer: for file in self.scan_files(args)? {
            let resolved = self.working_dir.join(&file);
            if std::fs::metadata(&resolved).map(|m| m.len()).unwrap_or(0) > MAX_SCAN_BYTES {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&resolved) else { continue };
            for (i, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    matches.push(json!({ "file": file, "line": i + 1, "text": line }));
                    if matches.len() >= max {
                        break 'outer;
                    }
                }
            }
        }
        Ok(json!(matches))
    }

    fn search_symbols(&self, args: &Value) -> Result<Value> {
        let query = str_arg(args, "query")?;
        let mut hits = Vec::new();
        for file in self.scan_files(args)? {
            let Some(lang) = Language::from_path(&file) else { continue };
            let Ok(content) = self.read_file_cached(&file) else { continue };
            for element in parsers::search(&content, lang, query) {
                hits.push(json!({
                    "file": file,
                    "name": element.name,
                    "kind": element.kind,
                    "line": element.start_line,
                }));
            }
        }
        Ok(json!(hits))
    }

    // ── analyze helpers ───────────────────────────────────────────────────

    fn analyze_dependencies(&self, args: &Value) -> Result<Value> {
        let mut out = serde_json::Map::new();
        for file in self.scan_files(args)? {
            let Some(lang) = Language::from_path(&file) else { continue };
            let Ok(content) = self.read_file_cached(&file) else { continue };
            let structure = parsers::parse(&content, lang);
            let imports: Vec<String> =
                structure.imports.iter().map(|i| i.name.clone()).collect();
            if !imports.is_empty() {
                out.insert(file, json!(imports));
            }
        }
        Ok(Value::Object(out))
    }

    fn analyze_exports(&self, args: &Value) -> Result<Value> {
        let mut out = serde_json::Map::new();
        for file in self.scan_files(args)? {
            let Some(lang) = Language::from_path(&file) else { continue };
            let Ok(content) = self.read_file_cached(&file) else { continue };
            let structure = parsers::parse(&content, lang);
            let exported: Vec<String> = structure
                .all_elements()
                .filter(|e| e.is_exported)
                .map(|e| e.name.clone())
                .collect();
            if !exported.is_empty() {
                out.insert(file, json!(exported));
            }
        }
        Ok(Value::Object(out))
    }

    /// Heuristic call graph: for every known function, find `name(` call
    /// sites inside other functions' line ranges.
    fn analyze_call_graph(&self, args: &Value) -> Result<Value> {
        struct FnInfo {
            file: String,
            name: String,
            start: usize,
            end: usize,
        }
        let mut functions: Vec<FnInfo> = Vec::new();
        let mut sources: Vec<(String, String)> = Vec::new();

        for file in self.scan_files(args)? {
            let Some(lang) = Language::from_path(&file) else { continue };
            let Ok(content) = self.read_file_cached(&file) else { continue };
            let structure = parsers::parse(&content, lang);
            for f in &structure.functions {
                functions.push(FnInfo {
                    file: file.clone(),
                    name: f.name.clone(),
                    start: f.start_line,
                    end: f.end_line,
                });
            }
            sources.push((file, content));
        }

        let mut edges = Vec::new();
        for (file, content) in &sources {
            let lines: Vec<&str> = content.lines().collect();
            for caller in functions.iter().filter(|f| &f.file == file) {
                let body = lines
                    [caller.start.saturating_sub(1).min(lines.len())..caller.end.min(lines.len())]
                    .join("\n");
                for callee in &functions {
                    if callee.name == caller.name || callee.name.is_empty() {
                        continue;
                    }
                    if body.contains(&format!("{}(", callee.name)) {
                        edges.push(json!({
                            "from": format!("{}:{}", caller.file, caller.name),
                            "to": format!("{}:{}", callee.file, callee.name),
                        }));
                    }
                }
            }
        }
        Ok(json!(edges))
    }
}

// ── Argument plumbing ─────────────────────────────────────────────────────────

static DECISION: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
    Regex::new(r"(?i)\b(decided|will use|chose|agreed|must|should)\b").unwrap()
});
static CODE_REF: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
    Regex::new(r"`[^`]+`|\b[\w./-]+\.(ts|tsx|js|jsx|py|go|rs|php|swift)\b").unwrap()
});

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::ExecutionFailed(format!("missing argument '{key}'")))
}

fn paths_arg(args: &Value) -> Result<Vec<String>> {
    args.get("paths")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .ok_or_else(|| CoreError::ExecutionFailed("missing argument 'paths'".into()))
}

fn messages_arg(args: &Value) -> Result<Vec<conversation::Message>> {
    let raw = args
        .get("messages")
        .ok_or_else(|| CoreError::ExecutionFailed("missing argument 'messages'".into()))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| CoreError::ExecutionFailed(format!("bad messages: {e}")))
}

fn level_from(args: &Value) -> DetailLevel {
    args.get("level")
        .and_then(Value::as_str)
        .and_then(DetailLevel::from_str)
        .unwrap_or_default()
}

fn options_from(args: &Value) -> Result<CompressOptions> {
    let preserve = args
        .get("preserve")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let opts = CompressOptions { level: level_from(args), preserve };
    // Surface bad preserve patterns at the boundary.
    opts.preserve_regexes()?;
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;

    fn bridge() -> (tempfile::TempDir, SdkBridge) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/app.py"),
            "import os\n\ndef main():\n    helper()\n\ndef helper():\n    pass\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "error here\nplain line\n").unwrap();
        let bridge = SdkBridge::new(
            dir.path().to_path_buf(),
            Arc::new(SmartCache::new(CacheConfig::default())),
            Arc::new(SessionTracker::new()),
        );
        (dir, bridge)
    }

    #[test]
    fn test_files_read_and_exists() {
        let (_dir, bridge) = bridge();
        let out = bridge.dispatch("files.read", &json!({"path": "notes.txt"})).unwrap();
        assert_eq!(out["lines"], json!(2));
        assert!(out["content"].as_str().unwrap().contains("error here"));
        let exists = bridge.dispatch("files.exists", &json!({"path": "notes.txt"})).unwrap();
        assert_eq!(exists, json!(true));
        let err = bridge.dispatch("files.read", &json!({"path": "../escape"})).unwrap_err();
        assert_eq!(err.code(), "PATH_VALIDATION_FAILED");
    }

    #[test]
    fn test_glob_and_symbols() {
        let (_dir, bridge) = bridge();
        let files = bridge.dispatch("files.glob", &json!({"pattern": "**/*.py"})).unwrap();
        assert_eq!(files, json!(["src/app.py"]));
        let symbols = bridge
            .dispatch("search.symbols", &json!({"query": "help"}))
            .unwrap();
        assert_eq!(symbols.as_array().unwrap().len(), 1);
        assert_eq!(symbols[0]["name"], json!("helper"));
    }

    #[test]
    fn test_grep_and_references() {
        let (_dir, bridge) = bridge();
        let hits = bridge
            .dispatch("search.grep", &json!({"pattern": "error"}))
            .unwrap();
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["file"], json!("notes.txt"));
        let refs = bridge
            .dispatch("search.references", &json!({"name": "helper"}))
            .unwrap();
        assert_eq!(refs.as_array().unwrap().len(), 2); // definition + call
        let bad = bridge.dispatch("search.grep", &json!({"pattern": "[unclosed"}));
        assert_eq!(bad.unwrap_err().code(), "INVALID_REGEX");
    }

    #[test]
    fn test_code_namespace() {
        let (_dir, bridge) = bridge();
        let parsed = bridge.dispatch("code.parse", &json!({"path": "src/app.py"})).unwrap();
        assert_eq!(parsed["functions"].as_array().unwrap().len(), 2);
        let extracted = bridge
            .dispatch("code.extract", &json!({"path": "src/app.py", "name": "helper"}))
            .unwrap();
        assert!(extracted["content"].as_str().unwrap().contains("def helper"));
        let missing = bridge
            .dispatch("code.extract", &json!({"path": "src/app.py", "name": "zzz"}))
            .unwrap_err();
        assert_eq!(missing.code(), "ELEMENT_NOT_FOUND");
    }

    #[test]
    fn test_analyze_call_graph() {
        let (_dir, bridge) = bridge();
        let edges = bridge.dispatch("analyze.callGraph", &json!({})).unwrap();
        let arr = edges.as_array().unwrap();
        assert!(arr.iter().any(|e| {
            e["from"].as_str().unwrap().ends_with("main")
                && e["to"].as_str().unwrap().ends_with("helper")
        }));
    }

    #[test]
    fn test_multifile_chunk_and_read_all() {
        let (_dir, bridge) = bridge();
        let all = bridge
            .dispatch("multifile.readAll", &json!({"paths": ["notes.txt"]}))
            .unwrap();
        assert!(all.as_str().unwrap().starts_with("[notes.txt]"));
        let chunks = bridge
            .dispatch(
                "multifile.chunk",
                &json!({"paths": ["notes.txt", "src/app.py"], "max_tokens_per_chunk": 5}),
            )
            .unwrap();
        assert_eq!(chunks.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_conversation_ops() {
        let (_dir, bridge) = bridge();
        let messages = json!([
            {"role": "user", "content": "We decided to use sqlite for storage"},
            {"role": "assistant", "content": "I'll wire it up in `src/db.rs` today"}
        ]);
        let decisions = bridge
            .dispatch("conversation.extractDecisions", &json!({"messages": messages}))
            .unwrap();
        assert_eq!(decisions.as_array().unwrap().len(), 1);
        let refs = bridge
            .dispatch("conversation.extractCodeRefs", &json!({"messages": messages}))
            .unwrap();
        assert!(refs.as_array().unwrap().iter().any(|r| r.as_str().unwrap().contains("db.rs")));
    }

    #[test]
    fn test_dispatch_json_wire_shape() {
        let (_dir, bridge) = bridge();
        let ok: Value =
            serde_json::from_str(&bridge.dispatch_json("utils.countTokens", r#"{"text":"abc"}"#))
                .unwrap();
        assert_eq!(ok["ok"], json!(true));
        let err: Value =
            serde_json::from_str(&bridge.dispatch_json("files.read", r#"{"path":"/etc/passwd"}"#))
                .unwrap();
        assert_eq!(err["ok"], json!(false));
        assert_eq!(err["code"], json!("PATH_VALIDATION_FAILED"));
    }
}
