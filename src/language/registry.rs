//! Language registry
//!
//! Maps file extensions to language definitions. The table is the inverse of
//! every registered definition's extension set; when two definitions claim the
//! same extension, the one registered last wins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tree_sitter::Parser;

use super::fallback::FallbackDefinitions;
use super::go::GoDefinitions;
use super::javascript::JavaScriptDefinitions;
use super::python::PythonDefinitions;
use super::rust::RustDefinitions;
use super::{Language, LanguageDefinition};
use crate::{Error, Result};

/// Registry of language definitions, keyed by extension.
pub struct LanguageRegistry {
    definitions: HashMap<Language, Arc<dyn LanguageDefinition>>,
    /// Registration order, replayed when rebuilding the extension table
    order: Vec<Language>,
    extensions: HashMap<String, Language>,
    fallback: Arc<dyn LanguageDefinition>,
}

impl LanguageRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            order: Vec::new(),
            extensions: HashMap::new(),
            fallback: Arc::new(FallbackDefinitions),
        }
    }

    /// Create a registry with every built-in language whose grammar loads.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let builtins: Vec<Arc<dyn LanguageDefinition>> = vec![
            Arc::new(PythonDefinitions::new()),
            Arc::new(JavaScriptDefinitions::new()),
            Arc::new(RustDefinitions::new()),
            Arc::new(GoDefinitions::new()),
        ];
        for definition in builtins {
            if let Err(e) = registry.register(definition) {
                tracing::warn!("Dropping language: {}", e);
            }
        }
        registry
    }

    /// Register a definition and rebuild the extension table.
    ///
    /// Fails when the definition has no language or its grammar cannot be
    /// loaded; the registry is left unchanged in that case.
    pub fn register(&mut self, definition: Arc<dyn LanguageDefinition>) -> Result<()> {
        let language = definition.language().ok_or_else(|| Error::Grammar {
            language: definition.name().to_string(),
            message: "definition has no language".to_string(),
        })?;
        let grammar = definition.grammar().ok_or_else(|| Error::Grammar {
            language: definition.name().to_string(),
            message: "no grammar available".to_string(),
        })?;
        Parser::new()
            .set_language(&grammar)
            .map_err(|e| Error::Grammar {
                language: definition.name().to_string(),
                message: e.to_string(),
            })?;

        self.order.retain(|l| *l != language);
        self.order.push(language);
        self.definitions.insert(language, definition);
        self.rebuild_extension_table();
        Ok(())
    }

    fn rebuild_extension_table(&mut self) {
        self.extensions.clear();
        for language in &self.order {
            let definition = &self.definitions[language];
            for ext in definition.get_language_file_extensions() {
                if let Some(previous) = self.extensions.insert(ext.to_ascii_lowercase(), *language) {
                    if previous != *language {
                        tracing::debug!("Extension .{} moves from {} to {}", ext, previous, language);
                    }
                }
            }
        }
    }

    /// Language routed to for an extension
    pub fn language_for_extension(&self, extension: &str) -> Option<Language> {
        self.extensions.get(&extension.to_ascii_lowercase()).copied()
    }

    /// Definition for an extension, or the fallback when nothing claims it
    pub fn definitions_for_extension(&self, extension: &str) -> Arc<dyn LanguageDefinition> {
        self.language_for_extension(extension)
            .and_then(|l| self.definitions.get(&l).cloned())
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn definition(&self, language: Language) -> Option<Arc<dyn LanguageDefinition>> {
        self.definitions.get(&language).cloned()
    }

    /// A ready parser plus its definition, or `UnsupportedExtension`
    pub fn parser_for_extension(
        &self,
        extension: &str,
    ) -> Result<(Parser, Arc<dyn LanguageDefinition>)> {
        let unsupported = || Error::UnsupportedExtension(extension.to_string());
        let language = self.language_for_extension(extension).ok_or_else(unsupported)?;
        let definition = self.definition(language).ok_or_else(unsupported)?;
        let grammar = definition.grammar().ok_or_else(unsupported)?;
        let mut parser = Parser::new();
        parser.set_language(&grammar).map_err(|e| Error::Grammar {
            language: language.to_string(),
            message: e.to_string(),
        })?;
        Ok((parser, definition))
    }

    pub fn supports_extension(&self, extension: &str) -> bool {
        self.language_for_extension(extension).is_some()
    }

    /// Check whether a path has a registered extension
    pub fn supports_path(&self, path: &Path) -> bool {
        self.supports_extension(&extension_of(path))
    }

    /// Registered languages in registration order
    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.order.iter().copied()
    }

    /// `(extension, language)` pairs sorted by extension
    pub fn extension_table(&self) -> Vec<(String, Language)> {
        let mut table: Vec<_> = self
            .extensions
            .iter()
            .map(|(ext, lang)| (ext.clone(), *lang))
            .collect();
        table.sort();
        table
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Lower-cased extension of a path, empty when there is none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
