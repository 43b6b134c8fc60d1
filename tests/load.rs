//! Integration tests for the import-graph loader.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use protodyn::error::Error;
use protodyn::load::{Fetch, LoadOptions, Parse, ParseOutput};
use protodyn::schema::Root;
use protodyn::{Loader, Result};

/// In-memory fetch collaborator that records every request.
#[derive(Default)]
struct SpyInner {
    files: HashMap<String, String>,
    delays_ms: HashMap<String, u64>,
    calls: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
struct FetchSpy(Arc<SpyInner>);

impl FetchSpy {
    fn with(files: &[(&str, &str)]) -> Self {
        let mut inner = SpyInner::default();
        for (name, content) in files {
            inner.files.insert(name.to_string(), content.to_string());
        }
        FetchSpy(Arc::new(inner))
    }

    fn delay(self, path: &str, ms: u64) -> Self {
        let mut inner = Arc::try_unwrap(self.0).unwrap_or_else(|_| panic!("spy already shared"));
        inner.delays_ms.insert(path.to_string(), ms);
        FetchSpy(Arc::new(inner))
    }

    fn calls_for(&self, path: &str) -> usize {
        self.0
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == path)
            .count()
    }

    fn lookup(&self, path: &str) -> Result<String> {
        self.0.calls.lock().unwrap().push(path.to_string());
        self.0
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::fetch(path, "not found"))
    }
}

#[async_trait]
impl Fetch for FetchSpy {
    async fn fetch(&self, path: &str) -> Result<String> {
        let delay = self.0.delays_ms.get(path).copied();
        if let Some(ms) = delay {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.lookup(path)
    }

    fn fetch_sync(&self, path: &str) -> Result<String> {
        self.lookup(path)
    }
}

/// Line-directive parser standing in for the `.proto` text collaborator:
/// `import:<path>`, `weak:<path>`, `json:<descriptor>`, `fail`.
struct FakeParse;

impl Parse for FakeParse {
    fn parse(
        &self,
        source: &str,
        filename: &str,
        root: &mut Root,
        _options: &LoadOptions,
    ) -> Result<ParseOutput> {
        let mut out = ParseOutput::default();
        for line in source.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(target) = line.strip_prefix("import:") {
                out.imports.push(target.to_string());
            } else if let Some(target) = line.strip_prefix("weak:") {
                out.weak_imports.push(target.to_string());
            } else if let Some(json) = line.strip_prefix("json:") {
                root.add_json_str(Some(filename), json)?;
            } else if line == "fail" {
                return Err(Error::parse(filename, "forced failure"));
            } else {
                return Err(Error::parse(filename, format!("bad directive '{line}'")));
            }
        }
        Ok(out)
    }
}

fn diamond_fixture() -> FetchSpy {
    FetchSpy::with(&[
        (
            "a.proto",
            "import:b.proto\nimport:c.json\njson:{\"nested\":{\"A\":{\"fields\":{}}}}",
        ),
        (
            "b.proto",
            "import:c.json\njson:{\"nested\":{\"B\":{\"fields\":{}}}}",
        ),
        ("c.json", r#"{"nested":{"C":{"fields":{}}}}"#),
    ])
}

#[tokio::test]
async fn async_load_processes_imports_exactly_once() {
    // Slow down one leg so completions interleave.
    let fetch = diamond_fixture().delay("b.proto", 30);
    let loader = Loader::new(fetch.clone()).with_parser(FakeParse);
    let mut root = Root::new();
    loader.load(&mut root, &["a.proto"]).await.unwrap();
    root.resolve_all().unwrap();

    for ty in ["A", "B", "C"] {
        assert!(root.type_index(ty).is_some(), "missing {ty}");
    }
    // The shared import is fetched once despite two importers.
    assert_eq!(fetch.calls_for("c.json"), 1);
    assert_eq!(fetch.calls_for("b.proto"), 1);
}

#[tokio::test]
async fn async_load_same_file_listed_twice_is_deduped() {
    let fetch = diamond_fixture();
    let loader = Loader::new(fetch.clone()).with_parser(FakeParse);
    let mut root = Root::new();
    loader
        .load(&mut root, &["c.json", "c.json", "./c.json"])
        .await
        .unwrap();
    assert_eq!(fetch.calls_for("c.json"), 1);
}

#[tokio::test]
async fn async_weak_fetch_failure_is_swallowed() {
    let fetch = FetchSpy::with(&[(
        "a.proto",
        "weak:missing.proto\njson:{\"nested\":{\"A\":{\"fields\":{}}}}",
    )]);
    let loader = Loader::new(fetch).with_parser(FakeParse);
    let mut root = Root::new();
    loader.load(&mut root, &["a.proto"]).await.unwrap();
    root.resolve_all().unwrap();
    assert!(root.type_index("A").is_some());
}

#[tokio::test]
async fn async_weak_parse_failure_is_swallowed() {
    let fetch = FetchSpy::with(&[
        ("a.proto", "weak:bad.proto\njson:{\"nested\":{\"A\":{\"fields\":{}}}}"),
        ("bad.proto", "fail"),
    ]);
    let loader = Loader::new(fetch).with_parser(FakeParse);
    let mut root = Root::new();
    loader.load(&mut root, &["a.proto"]).await.unwrap();
    assert!(root.has_file("bad.proto"));
}

#[tokio::test]
async fn async_strong_failure_is_fatal() {
    let fetch = FetchSpy::with(&[("a.proto", "import:missing.proto")]);
    let loader = Loader::new(fetch).with_parser(FakeParse);
    let mut root = Root::new();
    let err = loader.load(&mut root, &["a.proto"]).await.unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
}

#[tokio::test]
async fn async_concurrent_failures_yield_one_error() {
    // Both fetches fail, completing at different times; the driver returns
    // the first and discards the in-flight remainder.
    let fetch = FetchSpy::default().delay("slow.proto", 50);
    let loader = Loader::new(fetch).with_parser(FakeParse);
    let mut root = Root::new();
    let err = loader
        .load(&mut root, &["slow.proto", "fast.proto"])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
}

#[tokio::test]
async fn bundled_imports_shortcut_the_fetcher() {
    let fetch = FetchSpy::with(&[(
        "dir/uses_wkt.proto",
        "import:google/protobuf/duration.proto\njson:{\"nested\":{\"W\":{\"fields\":{}}}}",
    )]);
    let loader = Loader::new(fetch.clone()).with_parser(FakeParse);
    let mut root = Root::new();
    loader.load(&mut root, &["dir/uses_wkt.proto"]).await.unwrap();
    root.resolve_all().unwrap();

    assert!(root.type_index("google.protobuf.Duration").is_some());
    // The import resolved under dir/ but still matched the bundled suffix
    // and never reached the collaborator.
    assert_eq!(fetch.calls_for("dir/google/protobuf/duration.proto"), 0);
    assert!(root.has_file("google/protobuf/duration.proto"));
}

#[test]
fn sync_load_walks_the_same_graph() {
    let fetch = diamond_fixture();
    let loader = Loader::new(fetch.clone()).with_parser(FakeParse);
    let mut root = Root::new();
    loader.load_sync(&mut root, &["a.proto"]).unwrap();
    root.resolve_all().unwrap();

    for ty in ["A", "B", "C"] {
        assert!(root.type_index(ty).is_some(), "missing {ty}");
    }
    assert_eq!(fetch.calls_for("c.json"), 1);
}

#[test]
fn sync_weak_failure_is_swallowed_and_strong_is_fatal() {
    let fetch = FetchSpy::with(&[
        (
            "weakling.proto",
            "weak:missing.proto\njson:{\"nested\":{\"A\":{\"fields\":{}}}}",
        ),
        ("strong.proto", "import:missing.proto"),
    ]);
    let loader = Loader::new(fetch).with_parser(FakeParse);

    let mut root = Root::new();
    loader.load_sync(&mut root, &["weakling.proto"]).unwrap();

    let mut root = Root::new();
    let err = loader.load_sync(&mut root, &["strong.proto"]).unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
}

#[tokio::test]
async fn deferred_extension_resolves_when_target_loads_later() {
    // The extending field arrives before its target type.
    let fetch = FetchSpy::with(&[
        (
            "ext.json",
            r#"{"nested":{"pkg":{"nested":{"x":{"type":"int32","id":100,"extend":"M"}}}}}"#,
        ),
        (
            "msg.json",
            r#"{"nested":{"pkg":{"nested":{"M":{"fields":{}}}}}}"#,
        ),
    ])
    .delay("msg.json", 20);
    let loader = Loader::new(fetch).with_parser(FakeParse);
    let mut root = Root::new();
    loader.load(&mut root, &["ext.json", "msg.json"]).await.unwrap();
    root.resolve_all().unwrap();

    let m = root.type_index("pkg.M").unwrap();
    let ty = root.registry_type(m).unwrap();
    let sister = ty.field_by_id(100).expect("sister field attached");
    assert_eq!(sister.name, "pkg.x");
    assert!(sister.declaring_field.is_some());
}

#[tokio::test]
async fn filesystem_fetcher_loads_json_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.json");
    std::fs::write(
        &path,
        r#"{"nested":{"M":{"fields":{"a":{"type":"int32","id":1}}}}}"#,
    )
    .unwrap();
    let path = path.to_str().unwrap();

    let mut root = protodyn::load::load(&[path]).await.unwrap();
    root.resolve_all().unwrap();
    assert!(root.type_index("M").is_some());

    let mut root = protodyn::load::load_sync(&[path]).unwrap();
    root.resolve_all().unwrap();
    let decoder = protodyn::Decoder::new(&root).unwrap();
    let msg = decoder.decode("M", &[0x08, 0x2A]).unwrap();
    assert_eq!(
        msg.get(&root, "a"),
        Some(&protodyn::Value::Int32(42))
    );
}
