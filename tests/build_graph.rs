//! End-to-end builds against an in-process language server

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lsp_types::{Location, Range, Url};
use repograph::config::RepographConfig;
use repograph::lsp::SessionState;
use repograph::position::Position;
use repograph::resolver::location_id;
use repograph::{
    Error, FileUri, GraphBuilder, Language, LanguageRegistry, LanguageServer, LanguageServerPool,
    NodeLabel, RelationshipType,
};
use tempfile::TempDir;

/// Answers reference queries from a fixed table keyed by (document, line)
struct FakeServer {
    state: Mutex<SessionState>,
    fail_start: bool,
    answers: HashMap<(Url, u32), Vec<Location>>,
    opened: Mutex<Vec<Url>>,
}

impl FakeServer {
    fn new(answers: HashMap<(Url, u32), Vec<Location>>) -> Self {
        Self {
            state: Mutex::new(SessionState::Unconnected),
            fail_start: false,
            answers,
            opened: Mutex::new(Vec::new()),
        }
    }

    fn broken() -> Self {
        Self {
            fail_start: true,
            ..Self::new(HashMap::new())
        }
    }
}

#[async_trait]
impl LanguageServer for FakeServer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    async fn start(&self) -> repograph::Result<()> {
        if self.fail_start {
            *self.state.lock().unwrap() = SessionState::Closed;
            return Err(Error::ServerStart {
                language: Language::Python,
                message: "not installed".to_string(),
            });
        }
        *self.state.lock().unwrap() = SessionState::Initialized;
        Ok(())
    }

    async fn did_open(&self, uri: &Url, _text: &str) -> repograph::Result<()> {
        self.opened.lock().unwrap().push(uri.clone());
        Ok(())
    }

    async fn references(&self, uri: &Url, position: Position) -> repograph::Result<Vec<Location>> {
        if self.state() != SessionState::Initialized {
            return Err(Error::ServerUnavailable(Language::Python));
        }
        Ok(self
            .answers
            .get(&(uri.clone(), position.line))
            .cloned()
            .unwrap_or_default())
    }

    async fn shutdown(&self) -> repograph::Result<()> {
        *self.state.lock().unwrap() = SessionState::Closed;
        Ok(())
    }
}

fn url(root: &Path, relative: &str) -> Url {
    FileUri::from_path(&root.join(relative)).unwrap().to_url().unwrap()
}

fn location(uri: Url, line: u32, character: u32) -> Location {
    let start = lsp_types::Position::new(line, character);
    let end = lsp_types::Position::new(line, character + 3);
    Location::new(uri, Range::new(start, end))
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// a.py defines foo; b.py imports and calls it from bar
fn two_file_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.py", "def foo():\n    pass\n");
    write(dir.path(), "b.py", "from a import foo\n\n\ndef bar():\n    foo()\n");
    write(dir.path(), "README.md", "# not source\n");
    dir
}

fn builder(root: &Path) -> (GraphBuilder, Arc<LanguageRegistry>) {
    let registry = Arc::new(LanguageRegistry::with_defaults());
    let config = RepographConfig {
        parse_workers: 2,
        ..RepographConfig::default()
    };
    (GraphBuilder::new(root, Arc::clone(&registry), config), registry)
}

fn hashed(root: &Path, relative: &str, suffix: &str) -> String {
    let uri = FileUri::from_path(&root.join(relative)).unwrap();
    repograph::node::hash_id(&format!("{}{}", uri, suffix))
}

#[tokio::test]
async fn test_cross_file_call_and_import() {
    let dir = two_file_repo();
    let root = dir.path();
    let answers = HashMap::from([(
        (url(root, "a.py"), 0),
        vec![
            location(url(root, "b.py"), 0, 14),
            location(url(root, "b.py"), 4, 4),
        ],
    )]);
    let server = Arc::new(FakeServer::new(answers));
    let (builder, registry) = builder(root);
    let pool = LanguageServerPool::new(registry, vec![server.clone() as Arc<dyn LanguageServer>]);

    let output = builder.build(&pool).await.unwrap();
    let graph = &output.graph;
    graph.validate().unwrap();

    let foo = hashed(root, "a.py", ".foo");
    let bar = hashed(root, "b.py", ".bar");
    let b_file = hashed(root, "b.py", "");

    let usages: Vec<_> = graph
        .relationships()
        .iter()
        .filter(|r| r.kind.is_usage())
        .map(|r| (r.start_node_id.clone(), r.end_node_id.clone(), r.kind))
        .collect();
    assert_eq!(
        usages,
        vec![
            (b_file, foo.clone(), RelationshipType::Imports),
            (bar, foo, RelationshipType::Calls),
        ]
    );
    assert!(graph.external_relationships().is_empty());

    let stats = graph.stats();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.nodes_by_label[&NodeLabel::Function], 2);

    // both Python files announced in path order, README never
    let opened = server.opened.lock().unwrap().clone();
    assert_eq!(opened, vec![url(root, "a.py"), url(root, "b.py")]);
    assert_eq!(pool.states(), vec![(Language::Python, SessionState::Closed)]);
}

#[tokio::test]
async fn test_reference_outside_index_is_external() {
    let dir = two_file_repo();
    let root = dir.path();
    let vendored = url(root, "vendor/lib.py");
    let answers = HashMap::from([(
        (url(root, "a.py"), 0),
        vec![
            location(vendored.clone(), 7, 2),
            location(Url::parse("untitled:Untitled-1").unwrap(), 0, 0),
        ],
    )]);
    let server: Arc<dyn LanguageServer> = Arc::new(FakeServer::new(answers));
    let (builder, registry) = builder(root);
    let pool = LanguageServerPool::new(registry, vec![server]);

    let output = builder.build(&pool).await.unwrap();
    let graph = &output.graph;

    assert!(graph.relationships().iter().all(|r| r.kind == RelationshipType::Contains));
    let external = graph.external_relationships();
    assert_eq!(external.len(), 1);

    let vendored = FileUri::from_url(&vendored).unwrap();
    assert_eq!(external[0].start_node_id, location_id(&vendored, Position::new(7, 2)));
    assert_eq!(external[0].end_node_id, hashed(root, "a.py", ".foo"));
    assert_eq!(external[0].kind, RelationshipType::References);
    graph.validate().unwrap();
}

#[tokio::test]
async fn test_no_references_is_not_an_error() {
    let dir = two_file_repo();
    let server: Arc<dyn LanguageServer> = Arc::new(FakeServer::new(HashMap::new()));
    let (builder, registry) = builder(dir.path());
    let pool = LanguageServerPool::new(registry, vec![server]);

    let output = builder.build(&pool).await.unwrap();
    assert_eq!(output.graph.relationships().len(), 2);
    assert!(output.graph.external_relationships().is_empty());
    assert!(output.skipped.is_empty());
}

#[tokio::test]
async fn test_build_fails_when_no_server_starts() {
    let dir = two_file_repo();
    let server: Arc<dyn LanguageServer> = Arc::new(FakeServer::broken());
    let (builder, registry) = builder(dir.path());
    let pool = LanguageServerPool::new(registry, vec![server]);

    let result = builder.build(&pool).await;
    assert!(matches!(result, Err(Error::NoLanguageServers)));
    assert_eq!(pool.states(), vec![(Language::Python, SessionState::Closed)]);
}

#[tokio::test]
async fn test_build_without_servers_keeps_structure() {
    let dir = two_file_repo();
    let (builder, registry) = builder(dir.path());
    let pool = LanguageServerPool::new(registry, Vec::new());

    let output = builder.build(&pool).await.unwrap();
    assert_eq!(output.graph.stats().files, 2);
    assert!(output.graph.relationships().iter().all(|r| r.kind == RelationshipType::Contains));
}

#[test]
fn test_persisted_graph_matches_build() {
    use repograph::storage::{persist, GraphStore, SqliteStore};

    let dir = two_file_repo();
    let (builder, _) = builder(dir.path());
    let output = builder.build_structure().unwrap();

    let db = dir.path().join(".repograph").join("repograph.db");
    fs::create_dir_all(db.parent().unwrap()).unwrap();
    let mut store = SqliteStore::open(&db).unwrap();
    persist(&output.graph, &mut store).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.nodes, output.graph.node_count());
    assert_eq!(stats.edges, output.graph.relationships().len());
    assert_eq!(stats.nodes_by_label.get("FUNCTION"), Some(&2));
    store.close().unwrap();
}
