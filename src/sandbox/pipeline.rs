/// Host-side pipeline builder — the typed twin of the script `pipe` API.
///
/// A pipeline is an immutable list of steps; every combinator returns a new
/// pipeline. `build` executes the steps in order over a JSON item list. A
/// failing step aborts with its error unless the step immediately after it
/// is a `recover`, whose fallback value substitutes for the failed output.
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use super::sdk::SdkBridge;
use crate::compress::DetailLevel;
use crate::error::{CoreError, Result};

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type KeyFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;
pub type Inspector = Arc<dyn Fn(&[Value]) + Send + Sync>;

#[derive(Clone)]
enum Step {
    Glob(String),
    Read,
    Parse,
    Filter(Predicate),
    Map(Transform),
    FlatMap(Transform),
    Exclude(String),
    Take(usize),
    Skip(usize),
    Sort(Option<KeyFn>),
    Unique(Option<KeyFn>),
    Compress(DetailLevel),
    Tap(Inspector),
    Recover(Value),
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Glob(_) => "glob",
            Self::Read => "read",
            Self::Parse => "parse",
            Self::Filter(_) => "filter",
            Self::Map(_) => "map",
            Self::FlatMap(_) => "flatMap",
            Self::Exclude(_) => "exclude",
            Self::Take(_) => "take",
            Self::Skip(_) => "skip",
            Self::Sort(_) => "sort",
            Self::Unique(_) => "unique",
            Self::Compress(_) => "compress",
            Self::Tap(_) => "tap",
            Self::Recover(_) => "recover",
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PipelineStats {
    pub steps_executed: usize,
    pub items_processed: usize,
    pub execution_time_ms: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub value: Value,
    pub stats: PipelineStats,
}

#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Step>,
    seed: Option<Vec<Value>>,
}

impl Pipeline {
    pub fn glob(pattern: &str) -> Self {
        Self { steps: vec![Step::Glob(pattern.to_string())], seed: None }
    }

    pub fn from_data(items: Vec<Value>) -> Self {
        Self { steps: Vec::new(), seed: Some(items) }
    }

    fn with(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn read(self) -> Self {
        self.with(Step::Read)
    }

    pub fn parse(self) -> Self {
        self.with(Step::Parse)
    }

    pub fn filter(self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.with(Step::Filter(Arc::new(f)))
    }

    pub fn map(self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.with(Step::Map(Arc::new(f)))
    }

    pub fn flat_map(self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.with(Step::FlatMap(Arc::new(f)))
    }

    pub fn exclude(self, pattern: &str) -> Self {
        self.with(Step::Exclude(pattern.to_string()))
    }

    pub fn take(self, n: usize) -> Self {
        self.with(Step::Take(n))
    }

    pub fn skip(self, n: usize) -> Self {
        self.with(Step::Skip(n))
    }

    pub fn sort(self) -> Self {
        self.with(Step::Sort(None))
    }

    pub fn sort_by_key(self, f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        self.with(Step::Sort(Some(Arc::new(f))))
    }

    pub fn unique(self) -> Self {
        self.with(Step::Unique(None))
    }

    pub fn compress(self, level: DetailLevel) -> Self {
        self.with(Step::Compress(level))
    }

    pub fn tap(self, f: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        self.with(Step::Tap(Arc::new(f)))
    }

    pub fn recover(self, fallback: Value) -> Self {
        self.with(Step::Recover(fallback))
    }

    /// Execute against the bridge. Items flow as a JSON array between steps.
    pub fn build(&self, bridge: &SdkBridge) -> Result<PipelineOutput> {
        let started = Instant::now();
        let mut stats = PipelineStats::default();
        let mut items: Vec<Value> = self.seed.clone().unwrap_or_default();

        let mut i = 0;
        while i < self.steps.len() {
            let step = &self.steps[i];
            match run_step(step, items.clone(), bridge) {
                Ok(next) => {
                    items = next;
                    stats.steps_executed += 1;
                    stats.items_processed = items.len();
                }
                Err(err) => {
                    if let Some(Step::Recover(fallback)) = self.steps.get(i + 1) {
                        stats.errors.push(format!("{}: {err}", step.name()));
                        items = match fallback {
                            Value::Array(a) => a.clone(),
                            other => vec![other.clone()],
                        };
                        stats.steps_executed += 2;
                        i += 1; // the recover step is consumed
                    } else {
                        return Err(err);
                    }
                }
            }
            i += 1;
        }

        stats.execution_time_ms = started.elapsed().as_millis() as u64;
        Ok(PipelineOutput { value: Value::Array(items), stats })
    }
}

fn run_step(step: &Step, items: Vec<Value>, bridge: &SdkBridge) -> Result<Vec<Value>> {
    match step {
        Step::Glob(pattern) => {
            let out = bridge.dispatch("files.glob", &json!({ "pattern": pattern }))?;
            Ok(out.as_array().cloned().unwrap_or_default())
        }
        Step::Read => items
            .into_iter()
            .map(|item| {
                let path = item
                    .as_str()
                    .ok_or_else(|| CoreError::ExecutionFailed("read expects path items".into()))?;
                bridge.dispatch("files.read", &json!({ "path": path }))
            })
            .collect(),
        Step::Parse => items
            .into_iter()
            .map(|item| {
                let args = if let Some(path) = item.as_str() {
                    json!({ "path": path })
                } else {
                    json!({ "content": item["content"], "path": item["path"] })
                };
                bridge.dispatch("code.parse", &args)
            })
            .collect(),
        Step::Filter(f) => Ok(items.into_iter().filter(|v| f(v)).collect()),
        Step::Map(f) => Ok(items.into_iter().map(|v| f(v)).collect()),
        Step::FlatMap(f) => Ok(items
            .into_iter()
            .flat_map(|v| match f(v) {
                Value::Array(a) => a,
                other => vec![other],
            })
            .collect()),
        Step::Exclude(pattern) => {
            let re = regex::Regex::new(pattern).map_err(CoreError::from)?;
            Ok(items
                .into_iter()
                .filter(|v| {
                    let text = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    !re.is_match(&text)
                })
                .collect())
        }
        Step::Take(n) => Ok(items.into_iter().take(*n).collect()),
        Step::Skip(n) => Ok(items.into_iter().skip(*n).collect()),
        Step::Sort(key) => {
            let mut items = items;
            match key {
                Some(f) => items.sort_by_key(|v| f(v)),
                None => items.sort_by_key(|v| v.to_string()),
            }
            Ok(items)
        }
        Step::Unique(key) => {
            let mut seen = std::collections::HashSet::new();
            Ok(items
                .into_iter()
                .filter(|v| {
                    let k = match key {
                        Some(f) => f(v),
                        None => v.to_string(),
                    };
                    seen.insert(k)
                })
                .collect())
        }
        Step::Compress(level) => items
            .into_iter()
            .map(|item| {
                let text = item
                    .as_str()
                    .map(str::to_string)
                    .or_else(|| item["content"].as_str().map(str::to_string))
                    .ok_or_else(|| {
                        CoreError::CompressFailed("compress expects text items".into())
                    })?;
                bridge.dispatch(
                    "compress.auto",
                    &json!({ "text": text, "level": level_name(*level) }),
                )
            })
            .collect(),
        Step::Tap(f) => {
            f(&items);
            Ok(items)
        }
        Step::Recover(_) => Ok(items),
    }
}

fn level_name(level: DetailLevel) -> &'static str {
    match level {
        DetailLevel::Minimal => "minimal",
        DetailLevel::Normal => "normal",
        DetailLevel::Detailed => "detailed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, SmartCache};
    use crate::session::SessionTracker;

    fn bridge() -> (tempfile::TempDir, SdkBridge) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def alpha():\n    pass\n").unwrap();
        std::fs::write(dir.path().join("b.py"), "def beta():\n    pass\n").unwrap();
        std::fs::write(dir.path().join("b_test.py"), "def test_beta():\n    pass\n").unwrap();
        let bridge = SdkBridge::new(
            dir.path().to_path_buf(),
            std::sync::Arc::new(SmartCache::new(CacheConfig::default())),
            std::sync::Arc::new(SessionTracker::new()),
        );
        (dir, bridge)
    }

    #[test]
    fn test_glob_read_parse_chain() {
        let (_dir, bridge) = bridge();
        let out = Pipeline::glob("*.py")
            .exclude("_test")
            .read()
            .parse()
            .build(&bridge)
            .unwrap();
        let arr = out.value.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(out.stats.steps_executed, 4);
        assert!(out.stats.errors.is_empty());
        assert_eq!(arr[0]["functions"][0]["name"], json!("alpha"));
    }

    #[test]
    fn test_from_data_with_combinators() {
        let (_dir, bridge) = bridge();
        let out = Pipeline::from_data(vec![json!(3), json!(1), json!(2), json!(1)])
            .unique()
            .sort()
            .take(2)
            .build(&bridge)
            .unwrap();
        assert_eq!(out.value, json!([1, 2]));
        assert_eq!(out.stats.items_processed, 2);
    }

    #[test]
    fn test_error_aborts_without_recover() {
        let (_dir, bridge) = bridge();
        let err = Pipeline::from_data(vec![json!("missing.py")])
            .read()
            .build(&bridge)
            .unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_recover_substitutes_and_resumes() {
        let (_dir, bridge) = bridge();
        let out = Pipeline::from_data(vec![json!("missing.py")])
            .read()
            .recover(json!(["fallback"]))
            .take(5)
            .build(&bridge)
            .unwrap();
        assert_eq!(out.value, json!(["fallback"]));
        assert_eq!(out.stats.errors.len(), 1);
        assert!(out.stats.errors[0].starts_with("read:"));
    }

    #[test]
    fn test_builder_is_immutable() {
        let base = Pipeline::glob("*.py");
        let with_take = base.clone().take(1);
        let (_dir, bridge) = bridge();
        let all = base.build(&bridge).unwrap();
        let one = with_take.build(&bridge).unwrap();
        assert_eq!(all.value.as_array().unwrap().len(), 3);
        assert_eq!(one.value.as_array().unwrap().len(), 1);
    }
}
