//! Process-backed language server session
//!
//! The server runs as a child process. A writer task drains an unbounded
//! channel of framed messages into its stdin; a reader task parses stdout,
//! routes responses to the pending request with the same id, and answers the
//! few requests servers send to their clients.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use lsp_types::{
    ClientCapabilities, DidChangeTextDocumentParams, DidOpenTextDocumentParams,
    DynamicRegistrationClientCapabilities, InitializeParams, Location, ReferenceContext,
    ReferenceParams, TextDocumentClientCapabilities, TextDocumentContentChangeEvent,
    TextDocumentIdentifier, TextDocumentItem, TextDocumentPositionParams,
    TextDocumentSyncClientCapabilities, Url, VersionedTextDocumentIdentifier, WorkspaceFolder,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::transport::{encode_message, read_message};
use super::{LanguageServer, SessionState};
use crate::language::Language;
use crate::position::Position;
use crate::{Error, Result};

/// Upper bound on the `shutdown` handshake and on waiting for the process to exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

type Reply = Result<Value>;
type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Reply>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Process {
    child: Child,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    stderr: Option<JoinHandle<()>>,
}

/// A language server reached over the child's stdio.
pub struct LspClient {
    language: Language,
    command: Vec<String>,
    root: PathBuf,
    request_timeout: Duration,
    state: Arc<Mutex<SessionState>>,
    next_id: AtomicI64,
    pending: PendingMap,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    /// Open documents and their current version
    documents: Mutex<HashMap<Url, i32>>,
    process: tokio::sync::Mutex<Option<Process>>,
}

impl LspClient {
    /// `command` is the program followed by its arguments; `root` is the
    /// workspace the server is initialised with.
    pub fn new(
        language: Language,
        command: Vec<String>,
        root: PathBuf,
        request_timeout: Duration,
    ) -> Self {
        Self {
            language,
            command,
            root,
            request_timeout,
            state: Arc::new(Mutex::new(SessionState::Unconnected)),
            next_id: AtomicI64::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
            outgoing: Mutex::new(None),
            documents: Mutex::new(HashMap::new()),
            process: tokio::sync::Mutex::new(None),
        }
    }

    fn set_state(&self, state: SessionState) -> SessionState {
        std::mem::replace(&mut *lock(&self.state), state)
    }

    fn require_initialized(&self) -> Result<()> {
        match self.state() {
            SessionState::Initialized => Ok(()),
            _ => Err(Error::ServerUnavailable(self.language)),
        }
    }

    fn start_error(&self, message: impl Into<String>) -> Error {
        Error::ServerStart {
            language: self.language,
            message: message.into(),
        }
    }

    fn spawn(&self) -> Result<Process> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| self.start_error("empty command"))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.start_error(format!("{}: {}", program, e)))?;

        let mut stdin = child.stdin.take().ok_or_else(|| self.start_error("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| self.start_error("no stdout"))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        // Stdin writer
        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if stdin.write_all(&frame).await.is_err() || stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        // Stdout reader
        let reader = tokio::spawn(read_loop(
            self.language,
            BufReader::new(stdout),
            Arc::clone(&self.pending),
            Arc::clone(&self.state),
            tx.clone(),
        ));

        // Stderr is only interesting when debugging a server
        let language = self.language;
        let stderr = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::trace!("[{} stderr] {}", language, line);
                }
            })
        });

        *lock(&self.outgoing) = Some(tx);
        Ok(Process {
            child,
            reader,
            writer,
            stderr,
        })
    }

    fn send(&self, message: &Value) -> Result<()> {
        let outgoing = lock(&self.outgoing);
        let tx = outgoing
            .as_ref()
            .ok_or(Error::ServerUnavailable(self.language))?;
        tx.send(encode_message(message))
            .map_err(|_| Error::ServerUnavailable(self.language))
    }

    fn notify(&self, method: &str, params: Value) -> Result<()> {
        tracing::trace!("[{}] -> {}", self.language, method);
        self.send(&json!({ "jsonrpc": "2.0", "method": method, "params": params }))
    }

    async fn send_request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        tracing::trace!("[{}] -> {} #{}", self.language, method, id);
        let message = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        if let Err(e) = self.send(&message) {
            lock(&self.pending).remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            // slot dropped: the session closed underneath us
            Ok(Err(_)) => Err(Error::ServerUnavailable(self.language)),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(Error::RequestTimeout {
                    language: self.language,
                    method: method.to_string(),
                })
            }
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.require_initialized()?;
        self.send_request(method, params, self.request_timeout).await
    }

    fn initialize_params(&self) -> Result<InitializeParams> {
        let root = std::path::absolute(&self.root)?;
        let root_url = Url::from_file_path(&root)
            .map_err(|_| Error::InvalidPath(root.display().to_string()))?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        let capabilities = ClientCapabilities {
            text_document: Some(TextDocumentClientCapabilities {
                synchronization: Some(TextDocumentSyncClientCapabilities {
                    dynamic_registration: Some(false),
                    ..Default::default()
                }),
                references: Some(DynamicRegistrationClientCapabilities {
                    dynamic_registration: Some(false),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        #[allow(deprecated)]
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri: Some(root_url.clone()),
            workspace_folders: Some(vec![WorkspaceFolder { uri: root_url, name }]),
            capabilities,
            ..Default::default()
        };
        Ok(params)
    }

    async fn handshake(&self) -> Result<()> {
        let params = serde_json::to_value(self.initialize_params()?)?;
        self.send_request("initialize", params, self.request_timeout)
            .await?;
        self.notify("initialized", json!({}))
    }
}

#[async_trait]
impl LanguageServer for LspClient {
    fn language(&self) -> Language {
        self.language
    }

    fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    async fn start(&self) -> Result<()> {
        let mut process = self.process.lock().await;
        match self.state() {
            SessionState::Unconnected => {}
            SessionState::Initialized => return Ok(()),
            other => return Err(self.start_error(format!("session is {}", other))),
        }

        tracing::debug!("Starting {} language server: {}", self.language, self.command.join(" "));
        let spawned = match self.spawn() {
            Ok(p) => p,
            Err(e) => {
                self.set_state(SessionState::Closed);
                return Err(e);
            }
        };
        *process = Some(spawned);
        self.set_state(SessionState::Connected);
        drop(process);

        if let Err(e) = self.handshake().await {
            let _ = self.shutdown().await;
            return Err(self.start_error(e.to_string()));
        }

        // the reader may have seen EOF during the handshake
        let mut state = lock(&self.state);
        if *state != SessionState::Connected {
            return Err(self.start_error("server exited during initialization"));
        }
        *state = SessionState::Initialized;
        drop(state);

        tracing::info!("{} language server initialized", self.language);
        Ok(())
    }

    async fn did_open(&self, uri: &Url, text: &str) -> Result<()> {
        self.require_initialized()?;
        let bumped = {
            let mut documents = lock(&self.documents);
            match documents.get_mut(uri) {
                Some(version) => {
                    *version += 1;
                    Some(*version)
                }
                None => {
                    documents.insert(uri.clone(), 1);
                    None
                }
            }
        };

        match bumped {
            None => {
                let params = DidOpenTextDocumentParams {
                    text_document: TextDocumentItem::new(
                        uri.clone(),
                        self.language.as_str().to_string(),
                        1,
                        text.to_string(),
                    ),
                };
                self.notify("textDocument/didOpen", serde_json::to_value(params)?)
            }
            Some(version) => {
                let params = DidChangeTextDocumentParams {
                    text_document: VersionedTextDocumentIdentifier::new(uri.clone(), version),
                    content_changes: vec![TextDocumentContentChangeEvent {
                        range: None,
                        range_length: None,
                        text: text.to_string(),
                    }],
                };
                self.notify("textDocument/didChange", serde_json::to_value(params)?)
            }
        }
    }

    async fn references(&self, uri: &Url, position: Position) -> Result<Vec<Location>> {
        let params = ReferenceParams {
            text_document_position: TextDocumentPositionParams::new(
                TextDocumentIdentifier::new(uri.clone()),
                position.into(),
            ),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: ReferenceContext {
                include_declaration: false,
            },
        };
        let result = self
            .request("textDocument/references", serde_json::to_value(params)?)
            .await?;
        let locations: Option<Vec<Location>> = serde_json::from_value(result)?;
        Ok(locations.unwrap_or_default())
    }

    async fn shutdown(&self) -> Result<()> {
        let mut process = self.process.lock().await;
        let previous = self.set_state(SessionState::ShuttingDown);
        let Some(mut proc) = process.take() else {
            self.set_state(SessionState::Closed);
            return Ok(());
        };

        // in-flight requests fail now rather than after the handshake
        lock(&self.pending).clear();

        if matches!(previous, SessionState::Connected | SessionState::Initialized) {
            if let Err(e) = self.send_request("shutdown", Value::Null, SHUTDOWN_TIMEOUT).await {
                tracing::debug!("{} language server did not acknowledge shutdown: {}", self.language, e);
            }
            let _ = self.notify("exit", Value::Null);
        }

        // Closing the channel lets the writer drain `exit` and close stdin
        lock(&self.outgoing).take();
        proc.reader.abort();
        lock(&self.pending).clear();
        let _ = tokio::time::timeout(Duration::from_secs(1), &mut proc.writer).await;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, proc.child.wait()).await {
            Ok(Ok(status)) => tracing::debug!("{} language server exited: {}", self.language, status),
            _ => {
                tracing::debug!("Killing {} language server", self.language);
                let _ = proc.child.kill().await;
            }
        }
        proc.writer.abort();
        if let Some(stderr) = proc.stderr {
            stderr.abort();
        }

        lock(&self.documents).clear();
        self.set_state(SessionState::Closed);
        Ok(())
    }
}

async fn read_loop<R>(
    language: Language,
    mut reader: R,
    pending: PendingMap,
    state: Arc<Mutex<SessionState>>,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
) where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => dispatch(language, message, &pending, &outgoing),
            Ok(None) => break,
            // the frame was consumed, so the stream is still in sync
            Err(Error::Json(e)) => tracing::warn!("[{}] unreadable message: {}", language, e),
            Err(e) => {
                tracing::warn!("[{}] connection lost: {}", language, e);
                break;
            }
        }
    }

    tracing::debug!("{} language server closed its output", language);
    *lock(&state) = SessionState::Closed;
    lock(&pending).clear();
}

fn dispatch(
    language: Language,
    message: Value,
    pending: &PendingMap,
    outgoing: &mpsc::UnboundedSender<Vec<u8>>,
) {
    let method = message.get("method").and_then(Value::as_str);
    match (message.get("id"), method) {
        // server → client request
        (Some(id), Some(method)) => {
            tracing::trace!("[{}] <- request {}", language, method);
            let result = match method {
                "workspace/configuration" => {
                    let items = message["params"]["items"].as_array().map_or(0, Vec::len);
                    Value::Array(vec![Value::Null; items])
                }
                _ => Value::Null,
            };
            let reply = json!({ "jsonrpc": "2.0", "id": id, "result": result });
            let _ = outgoing.send(encode_message(&reply));
        }
        (Some(id), None) => {
            let Some(id) = id.as_i64() else {
                tracing::debug!("[{}] response with unexpected id {}", language, id);
                return;
            };
            let Some(slot) = lock(pending).remove(&id) else {
                tracing::debug!("[{}] late response #{}", language, id);
                return;
            };
            let reply = match message.get("error") {
                Some(error) => Err(Error::ServerError {
                    language,
                    code: error["code"].as_i64().unwrap_or_default(),
                    message: error["message"].as_str().unwrap_or_default().to_string(),
                }),
                None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
            };
            let _ = slot.send(reply);
        }
        (None, Some(method)) => tracing::trace!("[{}] <- {}", language, method),
        (None, None) => tracing::debug!("[{}] dropping malformed message", language),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(command: &[&str]) -> LspClient {
        LspClient::new(
            Language::Python,
            command.iter().map(|s| s.to_string()).collect(),
            std::env::temp_dir(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_shutdown_without_start_is_idempotent() {
        let client = client(&["jedi-language-server"]);
        assert_eq!(client.state(), SessionState::Unconnected);
        client.shutdown().await.unwrap();
        client.shutdown().await.unwrap();
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_requests_need_an_initialized_session() {
        let client = client(&["jedi-language-server"]);
        let uri = Url::parse("file:///tmp/a.py").unwrap();
        assert!(matches!(
            client.did_open(&uri, "x = 1").await,
            Err(Error::ServerUnavailable(Language::Python))
        ));
        assert!(matches!(
            client.references(&uri, Position::new(0, 0)).await,
            Err(Error::ServerUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_start() {
        let client = client(&["repograph-no-such-language-server"]);
        assert!(matches!(client.start().await, Err(Error::ServerStart { .. })));
        assert_eq!(client.state(), SessionState::Closed);
        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_routing_and_error_mapping() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (ok_tx, ok_rx) = oneshot::channel();
        let (err_tx, err_rx) = oneshot::channel();
        lock(&pending).insert(3, ok_tx);
        lock(&pending).insert(4, err_tx);

        dispatch(Language::Go, json!({"id": 3, "result": [1]}), &pending, &tx);
        dispatch(
            Language::Go,
            json!({"id": 4, "error": {"code": -32601, "message": "nope"}}),
            &pending,
            &tx,
        );
        assert_eq!(ok_rx.await.unwrap().unwrap(), json!([1]));
        assert!(matches!(
            err_rx.await.unwrap(),
            Err(Error::ServerError { code: -32601, .. })
        ));

        dispatch(
            Language::Go,
            json!({"id": 9, "method": "workspace/configuration", "params": {"items": [{}, {}]}}),
            &pending,
            &tx,
        );
        let frame = rx.recv().await.unwrap();
        let mut reader = frame.as_slice();
        let reply = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(reply["id"], 9);
        assert_eq!(reply["result"], json!([null, null]));
    }

    /// Reads everything and never writes a byte back
    #[cfg(unix)]
    fn silent_client(request_timeout: Duration) -> LspClient {
        LspClient::new(
            Language::Python,
            vec!["sh".to_string(), "-c".to_string(), "cat > /dev/null".to_string()],
            std::env::temp_dir(),
            request_timeout,
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_server_times_out_on_initialize() {
        let client = silent_client(Duration::from_millis(200));
        let result = tokio::time::timeout(Duration::from_secs(20), client.start())
            .await
            .expect("start returned");
        assert!(matches!(
            result,
            Err(Error::ServerStart { .. } | Error::RequestTimeout { .. })
        ));
        assert_eq!(client.state(), SessionState::Closed);
        assert!(lock(&client.pending).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_releases_waiting_request() {
        let client = Arc::new(silent_client(Duration::from_secs(60)));
        let process = client.spawn().unwrap();
        *client.process.lock().await = Some(process);
        client.set_state(SessionState::Initialized);

        let uri = Url::parse("file:///tmp/silent.py").unwrap();
        let waiting = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.references(&uri, Position::new(0, 0)).await }
        });
        tokio::time::timeout(Duration::from_secs(5), async {
            while lock(&client.pending).is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("request registered");

        let shutdown = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.shutdown().await }
        });
        let result = tokio::time::timeout(Duration::from_secs(2), waiting)
            .await
            .expect("references returned before the shutdown handshake ended")
            .unwrap();
        assert!(matches!(result, Err(Error::ServerUnavailable(Language::Python))));

        shutdown.await.unwrap().unwrap();
        assert_eq!(client.state(), SessionState::Closed);
    }

    /// `cat` echoes every request back, so each one is first answered by the
    /// client itself and the echoed answer then resolves the original request.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_lifecycle_against_echo_process() {
        let client = client(&["cat"]);
        client.start().await.unwrap();
        assert_eq!(client.state(), SessionState::Initialized);

        let uri = Url::parse("file:///tmp/echo.py").unwrap();
        client.did_open(&uri, "x = 1\n").await.unwrap();
        client.did_open(&uri, "x = 2\n").await.unwrap();
        assert_eq!(lock(&client.documents).get(&uri), Some(&2));

        let refs = client.references(&uri, Position::new(0, 0)).await.unwrap();
        assert!(refs.is_empty());

        client.shutdown().await.unwrap();
        assert_eq!(client.state(), SessionState::Closed);
        client.shutdown().await.unwrap();
    }
}
