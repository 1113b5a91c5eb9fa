//! Build coordinator
//!
//! Runs one indexing pass over a directory:
//! 1. discover source files (gitignore aware)
//! 2. parse them on worker threads
//! 3. assemble every file's entities into one graph
//! 4. announce each file to its language server and resolve every definition
//! 5. shut the servers down and validate the graph

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam::channel::{self, Sender};
use futures::stream::{self, StreamExt};
use ignore::WalkBuilder;

use crate::config::RepographConfig;
use crate::graph::{Graph, GraphStats};
use crate::hierarchy::{HierarchyParser, ParsedFile};
use crate::ignore::IgnoreFilter;
use crate::language::LanguageRegistry;
use crate::lsp::LanguageServerPool;
use crate::record::GraphRecords;
use crate::resolver::{self, FileSyntax, ReferenceResolver, Resolution};
use crate::ui::{ProgressMessage, ProgressPhase};
use crate::uri::FileUri;
use crate::{Error, IndexMessage, Result};

/// A file left out of the graph, and why
#[derive(Debug, Clone, serde::Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a build
#[derive(Debug)]
pub struct BuildOutput {
    pub graph: Graph,
    pub skipped: Vec<SkippedFile>,
}

impl BuildOutput {
    pub fn report(&self) -> BuildReport<'_> {
        BuildReport {
            records: self.graph.to_records(),
            stats: self.graph.stats(),
            skipped: &self.skipped,
        }
    }
}

/// JSON form of a build: `nodes` and `edges` next to `stats` and `skipped`
#[derive(Debug, serde::Serialize)]
pub struct BuildReport<'a> {
    #[serde(flatten)]
    pub records: GraphRecords,
    pub stats: GraphStats,
    pub skipped: &'a [SkippedFile],
}

pub struct GraphBuilder {
    root: PathBuf,
    registry: Arc<LanguageRegistry>,
    config: RepographConfig,
    progress: Option<Sender<ProgressMessage>>,
}

impl GraphBuilder {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<LanguageRegistry>, config: RepographConfig) -> Self {
        Self {
            root: root.into(),
            registry,
            config,
            progress: None,
        }
    }

    /// Report phase progress on `tx`
    pub fn with_progress(mut self, tx: Sender<ProgressMessage>) -> Self {
        self.progress = Some(tx);
        self
    }

    fn emit(&self, message: ProgressMessage) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(message);
        }
    }

    /// Source files under the root with a registered extension, sorted.
    pub fn discover_files(&self) -> Vec<PathBuf> {
        let filter = IgnoreFilter::new(&self.root, &self.config.excludes);
        let walker = WalkBuilder::new(&self.root)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !filter.is_ignored(entry.path(), is_dir)
            })
            .build();

        let mut files: Vec<PathBuf> = walker
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Walk error: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| self.registry.supports_path(path))
            .collect();
        files.sort();
        tracing::debug!("Discovered {} source files under {}", files.len(), self.root.display());
        files
    }

    /// Parse files on `parse_workers` threads. Parsed files come back sorted by
    /// URI so assembly order does not depend on thread scheduling.
    pub fn parse_files(&self, paths: Vec<PathBuf>) -> (Vec<ParsedFile>, Vec<SkippedFile>) {
        let total = paths.len();
        let workers = self.config.parse_workers.clamp(1, total.max(1));
        let parser = HierarchyParser::new(Arc::clone(&self.registry));
        self.emit(ProgressMessage::Started {
            phase: ProgressPhase::Parsing,
            total,
        });

        let (path_tx, path_rx) = channel::unbounded::<PathBuf>();
        let (msg_tx, msg_rx) = channel::unbounded::<IndexMessage>();
        for path in paths {
            let _ = path_tx.send(path);
        }
        drop(path_tx);

        let mut parsed = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let path_rx = path_rx.clone();
                let msg_tx = msg_tx.clone();
                let parser = parser.clone();
                scope.spawn(move || {
                    for path in path_rx.iter() {
                        let message = match parser.parse(&path) {
                            Ok(file) => IndexMessage::Parsed(Box::new(file)),
                            Err(error) => IndexMessage::Skipped { path, error },
                        };
                        if msg_tx.send(message).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(msg_tx);

            for (current, message) in msg_rx.iter().enumerate() {
                match message {
                    IndexMessage::Parsed(file) => {
                        self.emit(ProgressMessage::Progress {
                            phase: ProgressPhase::Parsing,
                            current: current + 1,
                            file: Some(file.uri.file_name().to_string()),
                        });
                        parsed.push(*file);
                    }
                    IndexMessage::Skipped { path, error } => {
                        tracing::warn!("Skipping {}: {}", path.display(), error);
                        self.emit(ProgressMessage::Progress {
                            phase: ProgressPhase::Parsing,
                            current: current + 1,
                            file: None,
                        });
                        skipped.push(SkippedFile {
                            path,
                            reason: error.to_string(),
                        });
                    }
                }
            }
        });

        self.emit(ProgressMessage::Finished {
            phase: ProgressPhase::Parsing,
        });
        parsed.sort_by(|a, b| a.uri.cmp(&b.uri));
        skipped.sort_by(|a, b| a.path.cmp(&b.path));
        (parsed, skipped)
    }

    /// Containment-only graph: no language servers involved.
    pub fn build_structure(&self) -> Result<BuildOutput> {
        let (parsed, skipped) = self.parse_files(self.discover_files());
        let (graph, _) = assemble(parsed);
        graph.validate()?;
        Ok(BuildOutput { graph, skipped })
    }

    /// Full build: structure plus references resolved through `pool`.
    ///
    /// The pool is shut down before this returns, whatever the outcome.
    pub async fn build(&self, pool: &LanguageServerPool) -> Result<BuildOutput> {
        let (parsed, skipped) = self.parse_files(self.discover_files());
        let (mut graph, syntax) = assemble(parsed);
        tracing::info!(
            "Assembled {} nodes from {} files ({} skipped)",
            graph.node_count(),
            syntax.len(),
            skipped.len()
        );

        if let Err(e) = pool.start().await {
            pool.shutdown().await;
            return Err(e);
        }
        let resolutions = self.resolve(pool, &graph, &syntax).await;
        pool.shutdown().await;

        resolver::append(&mut graph, resolutions);
        graph.validate()?;
        Ok(BuildOutput { graph, skipped })
    }

    async fn resolve(
        &self,
        pool: &LanguageServerPool,
        graph: &Graph,
        syntax: &HashMap<FileUri, FileSyntax>,
    ) -> Vec<Resolution> {
        let mut uris: Vec<&FileUri> = syntax.keys().collect();
        uris.sort();
        for uri in uris {
            match pool.announce(uri, &syntax[uri].source).await {
                Ok(()) => {}
                Err(e @ (Error::FileExtensionNotSupported(_) | Error::ServerUnavailable(_))) => {
                    tracing::debug!("Not announcing {}: {}", uri, e);
                }
                Err(e) => tracing::warn!("Could not announce {}: {}", uri, e),
            }
        }

        let definitions: Vec<_> = graph.definition_nodes().collect();
        let total = definitions.len();
        tracing::info!("Resolving references for {} definitions", total);
        self.emit(ProgressMessage::Started {
            phase: ProgressPhase::Resolving,
            total,
        });

        let resolver = ReferenceResolver::new(pool, graph, syntax, &self.registry);
        let resolver = &resolver;
        let mut current = 0;
        let batches: Vec<Vec<Resolution>> = stream::iter(definitions)
            .map(|definition| async move { resolver.resolve(definition).await })
            .buffered(self.config.max_concurrent_requests.max(1))
            .inspect(|_| {
                current += 1;
                self.emit(ProgressMessage::Progress {
                    phase: ProgressPhase::Resolving,
                    current,
                    file: None,
                });
            })
            .collect()
            .await;

        self.emit(ProgressMessage::Finished {
            phase: ProgressPhase::Resolving,
        });
        batches.into_iter().flatten().collect()
    }
}

/// Merge parsed files into one graph, keeping each file's syntax for later
/// classification of reference sites.
pub fn assemble(parsed: Vec<ParsedFile>) -> (Graph, HashMap<FileUri, FileSyntax>) {
    let mut graph = Graph::new();
    let mut syntax = HashMap::with_capacity(parsed.len());
    for file in parsed {
        graph.add_nodes(file.arena);
        for relationship in file.relationships {
            graph.add_relationship(relationship);
        }
        syntax.insert(
            file.uri,
            FileSyntax {
                language: file.language,
                source: file.source,
                tree: file.tree,
            },
        );
    }
    (graph, syntax)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::RelationshipType;
    use crate::node::NodeLabel;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn builder(root: &Path, config: RepographConfig) -> GraphBuilder {
        GraphBuilder::new(root, Arc::new(LanguageRegistry::with_defaults()), config)
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discovery_honours_ignores_and_extensions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/app.py", "def main():\n    pass\n");
        write(root, "src/util.js", "function f() {}\n");
        write(root, "README.md", "# readme\n");
        write(root, "node_modules/dep/index.js", "function g() {}\n");
        write(root, "generated/schema.py", "X = 1\n");
        write(root, "scratch/tmp.go", "package tmp\n");
        write(root, ".gitignore", "scratch/\n");

        let config = RepographConfig {
            excludes: vec!["generated/".to_string()],
            ..RepographConfig::default()
        };
        let files = builder(root, config).discover_files();
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(relative, vec!["src/app.py", "src/util.js"]);
    }

    #[test]
    fn test_parse_failures_are_recorded() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "ok.py", "def ok():\n    pass\n");

        let builder = builder(root, RepographConfig::default());
        let (parsed, skipped) = builder.parse_files(vec![root.join("ok.py"), root.join("gone.py")]);
        assert_eq!(parsed.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].path.ends_with("gone.py"));
    }

    #[test]
    fn test_report_carries_stats_and_skipped_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "ok.py", "def ok():\n    pass\n");

        let builder = builder(root, RepographConfig::default());
        let (parsed, skipped) = builder.parse_files(vec![root.join("ok.py"), root.join("gone.py")]);
        let mut graph = Graph::new();
        for file in parsed {
            graph.add_nodes(file.arena);
        }
        let output = BuildOutput { graph, skipped };

        let json = serde_json::to_value(output.report()).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(json["edges"].as_array().unwrap().len(), 0);
        assert_eq!(json["stats"]["files"], 1);
        assert_eq!(json["stats"]["nodes_by_label"]["FUNCTION"], 1);
        assert_eq!(json["skipped"].as_array().unwrap().len(), 1);
        assert!(json["skipped"][0]["path"].as_str().unwrap().ends_with("gone.py"));
        assert!(json["skipped"][0]["reason"].is_string());
    }

    #[test]
    fn test_build_structure_is_containment_only() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "a.py", "class A:\n    def run(self):\n        pass\n");
        write(root, "b.rs", "struct B;\nimpl B {\n    fn new() -> Self { B }\n}\n");

        let (tx, rx) = channel::unbounded();
        let config = RepographConfig {
            parse_workers: 2,
            ..RepographConfig::default()
        };
        let output = builder(root, config).with_progress(tx).build_structure().unwrap();
        let stats = output.graph.stats();

        assert_eq!(stats.files, 2);
        assert_eq!(stats.nodes_by_label[&NodeLabel::Class], 2);
        assert_eq!(stats.nodes_by_label[&NodeLabel::Method], 2);
        assert!(output
            .graph
            .relationships()
            .iter()
            .all(|r| r.kind == RelationshipType::Contains));
        // a.py: file→A, A→run; b.rs: file→B (struct and impl merged), B→new
        assert_eq!(output.graph.relationships().len(), 4);
        assert!(output.skipped.is_empty());

        let messages: Vec<_> = rx.try_iter().collect();
        assert!(matches!(
            messages.first(),
            Some(ProgressMessage::Started { phase: ProgressPhase::Parsing, total: 2 })
        ));
        assert!(matches!(
            messages.last(),
            Some(ProgressMessage::Finished { phase: ProgressPhase::Parsing })
        ));
    }
}
