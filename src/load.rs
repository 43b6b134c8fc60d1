//! Schema loading: import-graph traversal over fetch and parse collaborators.
//!
//! The loader owns orchestration only: dedup by resolved filename, the
//! bundled-file shortcut, and the traversal of the import DAG. Reading
//! sources is the [`Fetch`] collaborator's job; turning `.proto` text into
//! schema nodes is the [`Parse`] collaborator's. Sources that start with `{`
//! take the built-in JSON descriptor path and need no parser.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::bundled;
use crate::error::{Error, Result};
use crate::paths;
use crate::schema::Root;

/// Options threaded through to the parse collaborator.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Keep field names as declared instead of camel-casing them.
    pub keep_case: bool,
}

/// What a parse collaborator reports back about one file.
#[derive(Debug, Default)]
pub struct ParseOutput {
    /// Plain imports, relative to the parsed file.
    pub imports: Vec<String>,
    /// Weak imports: failures to fetch or parse these do not fail the load.
    pub weak_imports: Vec<String>,
    /// Declared package, if any.
    pub package: Option<String>,
    /// Declared syntax, if any.
    pub syntax: Option<String>,
}

/// Source-fetching collaborator.
///
/// Implementations own their I/O handles; the loader serializes completions
/// onto its own driver loop, so `fetch` may resolve on any thread.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Read the source text at `path`.
    async fn fetch(&self, path: &str) -> Result<String>;

    /// Synchronous counterpart used by [`Loader::load_sync`].
    ///
    /// The default signals that no synchronous primitive exists.
    fn fetch_sync(&self, path: &str) -> Result<String> {
        let _ = path;
        Err(Error::NotSupported("synchronous fetch"))
    }
}

/// `.proto` text parsing collaborator.
///
/// The tokenizer/parser itself is outside this crate; the collaborator adds
/// parsed declarations to `root` and reports the file's imports.
pub trait Parse: Send + Sync {
    /// Parse `source` (fetched under `filename`) into `root`.
    fn parse(
        &self,
        source: &str,
        filename: &str,
        root: &mut Root,
        options: &LoadOptions,
    ) -> Result<ParseOutput>;
}

/// Filesystem-backed [`Fetch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFetch;

#[async_trait]
impl Fetch for FsFetch {
    async fn fetch(&self, path: &str) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::fetch(path, e.to_string()))
    }

    fn fetch_sync(&self, path: &str) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| Error::fetch(path, e.to_string()))
    }
}

type Fetched = (String, bool, Result<String>);

/// Import-graph loader.
#[derive(Clone)]
pub struct Loader {
    fetch: Arc<dyn Fetch>,
    parser: Option<Arc<dyn Parse>>,
    options: LoadOptions,
}

impl Loader {
    /// A loader over the given fetch collaborator, with no `.proto` parser.
    pub fn new(fetch: impl Fetch + 'static) -> Self {
        Loader {
            fetch: Arc::new(fetch),
            parser: None,
            options: LoadOptions::default(),
        }
    }

    /// Attach a `.proto` text parser.
    pub fn with_parser(mut self, parser: impl Parse + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// Replace the load options.
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Load `files` and everything they transitively import into `root`.
    ///
    /// Fetches run concurrently; completions are drained one at a time on
    /// this call's driver loop, so schema mutation stays serialized. The
    /// future resolves exactly once: with the first fatal error (dropping
    /// the in-flight set, whose completions are then discarded), or with
    /// success once every pending fetch has completed. Weak-import failures
    /// are logged and swallowed. An empty `files` list resolves immediately.
    pub async fn load(&self, root: &mut Root, files: &[&str]) -> Result<()> {
        let mut in_flight: JoinSet<Fetched> = JoinSet::new();
        for file in files {
            self.dispatch(root, &mut in_flight, paths::resolve("", file), false)?;
        }

        while let Some(joined) = in_flight.join_next().await {
            let (filename, weak, fetched) =
                joined.map_err(|e| Error::fetch("<fetch task>", e.to_string()))?;
            let source = match fetched {
                Ok(source) => source,
                Err(err) if weak => {
                    warn!(file = %filename, error = %err, "ignoring weak import failure");
                    continue;
                }
                Err(err) => return Err(err),
            };
            debug!(file = %filename, bytes = source.len(), "fetched");
            match self.process_source(root, &filename, &source) {
                Ok(imports) => {
                    for (target, target_weak) in imports {
                        self.dispatch(root, &mut in_flight, target, target_weak)?;
                    }
                }
                Err(err) if weak => {
                    warn!(file = %filename, error = %err, "ignoring weak import failure");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Synchronous load over an explicit work stack.
    ///
    /// Imports are pushed in reverse so files process in declaration order.
    /// Fails with `NotSupported` when the fetch collaborator has no
    /// synchronous primitive, regardless of weakness.
    pub fn load_sync(&self, root: &mut Root, files: &[&str]) -> Result<()> {
        let mut stack: Vec<(String, bool)> = files
            .iter()
            .rev()
            .map(|file| (paths::resolve("", file), false))
            .collect();

        while let Some((resolved, weak)) = stack.pop() {
            if self.shortcut_bundled(root, &resolved)? {
                continue;
            }
            if !root.mark_file(resolved.clone()) {
                debug!(file = %resolved, "import already processed");
                continue;
            }
            let source = match self.fetch.fetch_sync(&resolved) {
                Ok(source) => source,
                Err(err @ Error::NotSupported(_)) => return Err(err),
                Err(err) if weak => {
                    warn!(file = %resolved, error = %err, "ignoring weak import failure");
                    continue;
                }
                Err(err) => return Err(err),
            };
            let imports = match self.process_source(root, &resolved, &source) {
                Ok(imports) => imports,
                Err(err) if weak => {
                    warn!(file = %resolved, error = %err, "ignoring weak import failure");
                    continue;
                }
                Err(err) => return Err(err),
            };
            for item in imports.into_iter().rev() {
                stack.push(item);
            }
        }
        Ok(())
    }

    /// Handle the bundled shortcut; true when `resolved` was a bundled name.
    fn shortcut_bundled(&self, root: &mut Root, resolved: &str) -> Result<bool> {
        let Some(name) = bundled::bundled_file_name(resolved) else {
            return Ok(false);
        };
        if root.mark_file(name) {
            debug!(file = name, "loading bundled file");
            let source = bundled::source(name).expect("bundled table entry");
            self.process_source(root, name, source)?;
        }
        Ok(true)
    }

    /// Mark and enqueue one resolved filename for asynchronous fetching.
    fn dispatch(
        &self,
        root: &mut Root,
        in_flight: &mut JoinSet<Fetched>,
        resolved: String,
        weak: bool,
    ) -> Result<()> {
        if self.shortcut_bundled(root, &resolved)? {
            return Ok(());
        }
        if !root.mark_file(resolved.clone()) {
            debug!(file = %resolved, "import already processed");
            return Ok(());
        }
        let fetch = Arc::clone(&self.fetch);
        in_flight.spawn(async move {
            let result = fetch.fetch(&resolved).await;
            (resolved, weak, result)
        });
        Ok(())
    }

    /// Ingest one fetched source, returning its resolved imports.
    fn process_source(
        &self,
        root: &mut Root,
        filename: &str,
        source: &str,
    ) -> Result<Vec<(String, bool)>> {
        if source.trim_start().starts_with('{') {
            root.add_json_str(Some(filename), source)?;
            return Ok(Vec::new());
        }

        let Some(parser) = &self.parser else {
            return Err(Error::parse(filename, "no parser configured for .proto text"));
        };
        let output = parser.parse(source, filename, root, &self.options)?;
        let mut imports = Vec::with_capacity(output.imports.len() + output.weak_imports.len());
        for import in &output.imports {
            imports.push((paths::resolve(filename, import), false));
        }
        for import in &output.weak_imports {
            imports.push((paths::resolve(filename, import), true));
        }
        Ok(imports)
    }
}

/// Load files from the filesystem into a fresh root.
///
/// JSON descriptor files only; attach a parser via [`Loader::with_parser`]
/// for `.proto` text.
pub async fn load(files: &[&str]) -> Result<Root> {
    let mut root = Root::new();
    Loader::new(FsFetch).load(&mut root, files).await?;
    Ok(root)
}

/// Synchronous counterpart of [`load`].
pub fn load_sync(files: &[&str]) -> Result<Root> {
    let mut root = Root::new();
    Loader::new(FsFetch).load_sync(&mut root, files)?;
    Ok(root)
}
