use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Directories and files that never hold indexable source
const DEFAULT_EXCLUDES: &[&str] = &[
    // Dependency and build output
    "target/", "node_modules/", "venv/", ".venv/", "vendor/",
    "dist/", "build/", "out/", "coverage/", "__pycache__/", "*.egg-info/",
    ".git/", ".repograph/", ".vscode/", ".idea/",

    // Generated or bundled sources
    "*.min.js", "*.bundle.js", "*_pb2.py", "*.pb.go",
];

/// Gitignore-style matcher: the root's `.gitignore`/`.ignore`, the default
/// noise list, then user excludes.
pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, extra_excludes: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        for pattern in DEFAULT_EXCLUDES {
            builder.add_line(None, pattern).ok();
        }
        for pattern in extra_excludes {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Ignoring invalid exclude pattern {:?}: {}", pattern, e);
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched(path, is_dir).is_ignore()
    }
}
