//! Language server pool - one session per language, routed by extension

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;

use super::{LanguageServer, LspClient, Reference, SessionState};
use crate::config::RepographConfig;
use crate::language::{Language, LanguageRegistry};
use crate::node::Node;
use crate::uri::FileUri;
use crate::{Error, Result};

pub struct LanguageServerPool {
    registry: Arc<LanguageRegistry>,
    servers: HashMap<Language, Arc<dyn LanguageServer>>,
}

impl LanguageServerPool {
    /// Pool over the given sessions. A later session for the same language
    /// replaces an earlier one.
    pub fn new(registry: Arc<LanguageRegistry>, servers: Vec<Arc<dyn LanguageServer>>) -> Self {
        let servers = servers.into_iter().map(|s| (s.language(), s)).collect();
        Self { registry, servers }
    }

    /// One process-backed session per registered language with a configured command
    pub fn from_config(registry: Arc<LanguageRegistry>, root: &Path, config: &RepographConfig) -> Self {
        let servers = registry
            .languages()
            .filter_map(|language| {
                let command = config.server_command(language)?;
                let client = LspClient::new(
                    language,
                    command.to_vec(),
                    root.to_path_buf(),
                    config.request_timeout(),
                );
                Some(Arc::new(client) as Arc<dyn LanguageServer>)
            })
            .collect();
        Self::new(registry, servers)
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn states(&self) -> Vec<(Language, SessionState)> {
        let mut states: Vec<_> = self.servers.values().map(|s| (s.language(), s.state())).collect();
        states.sort_by_key(|(language, _)| *language);
        states
    }

    /// Start every session concurrently.
    ///
    /// A session that fails is logged and left out. Fails with
    /// `NoLanguageServers` only when sessions were configured and none came up.
    pub async fn start(&self) -> Result<()> {
        if self.servers.is_empty() {
            tracing::info!("No language servers configured, skipping reference resolution");
            return Ok(());
        }

        let results = join_all(
            self.servers
                .values()
                .map(|server| async move { (server.language(), server.start().await) }),
        )
        .await;

        let mut started = 0;
        for (language, result) in results {
            match result {
                Ok(()) => started += 1,
                Err(e) => tracing::warn!("Could not start {} language server: {}", language, e),
            }
        }
        if started == 0 {
            return Err(Error::NoLanguageServers);
        }
        tracing::info!("Started {}/{} language servers", started, self.servers.len());
        Ok(())
    }

    pub fn server_for_extension(&self, extension: &str) -> Result<&Arc<dyn LanguageServer>> {
        self.registry
            .language_for_extension(extension)
            .and_then(|language| self.servers.get(&language))
            .ok_or_else(|| Error::FileExtensionNotSupported(extension.to_string()))
    }

    /// Make a file's content known to the session for its language.
    pub async fn announce(&self, uri: &FileUri, text: &str) -> Result<()> {
        let server = self.server_for_extension(&uri.extension())?;
        server.did_open(&uri.to_url()?, text).await
    }

    /// Usages of a definition node, queried at the start of its identifier.
    pub async fn find_references(&self, node: &Node) -> Result<Vec<Reference>> {
        let anchor = node
            .definition_range
            .filter(|_| node.label.is_definition())
            .ok_or_else(|| Error::NotADefinition(format!("{} {}", node.label, node.name)))?;
        let server = self.server_for_extension(&node.extension())?;

        let locations = server.references(&node.path.to_url()?, anchor.start).await?;
        if locations.is_empty() {
            tracing::info!("No references found for {} {} in {}", node.label, node.name, node.path);
        }
        Ok(locations.into_iter().map(Reference::new).collect())
    }

    /// Stop every session. Failures are logged; never fails.
    pub async fn shutdown(&self) {
        let results = join_all(
            self.servers
                .values()
                .map(|server| async move { (server.language(), server.shutdown().await) }),
        )
        .await;
        for (language, result) in results {
            if let Err(e) = result {
                tracing::warn!("Error shutting down {} language server: {}", language, e);
            }
        }
    }
}
