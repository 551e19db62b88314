//! Document-scope gating for the health indicator.
//!
//! The indicator is only shown while the active document is in the R
//! language, whatever its URI scheme, so unsaved R buffers count too. This is
//! a visibility rule only; it never touches controller state.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use url::Url;

/// The document currently focused in the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    uri: Url,
    /// Language id assigned by the host, when it knows one.
    language_id: Option<String>,
}

impl ActiveDocument {
    #[must_use]
    pub fn new(uri: Url, language_id: Option<String>) -> Self {
        Self { uri, language_id }
    }

    /// A document on disk without a host-assigned language.
    ///
    /// Returns `None` for relative paths.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        Url::from_file_path(path).ok().map(|uri| Self::new(uri, None))
    }

    #[must_use]
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    #[must_use]
    pub fn language_id(&self) -> Option<&str> {
        self.language_id.as_deref()
    }
}

/// Matches documents by language.
#[derive(Debug, Clone)]
pub struct DocumentSelector {
    language: &'static str,
    /// File-name patterns used when the host gives no language id.
    file_patterns: GlobSet,
}

impl DocumentSelector {
    /// `{ language: "r" }`.
    #[must_use]
    pub fn r_files() -> Self {
        Self {
            language: "r",
            file_patterns: build_patterns(&["*.r"]),
        }
    }

    #[must_use]
    pub fn matches(&self, document: &ActiveDocument) -> bool {
        if let Some(language) = document.language_id() {
            return language.eq_ignore_ascii_case(self.language);
        }
        document
            .uri
            .to_file_path()
            .ok()
            .and_then(|path| path.file_name().map(ToOwned::to_owned))
            .is_some_and(|name| self.file_patterns.is_match(name))
    }
}

fn build_patterns(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match GlobBuilder::new(pattern).case_insensitive(true).build() {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!("Ignoring invalid document pattern '{pattern}': {e}"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!("Failed to build document patterns: {e}");
        GlobSet::empty()
    })
}
