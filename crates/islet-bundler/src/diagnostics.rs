//! Diagnostic extraction from Rolldown errors.
//!
//! Rolldown reports failures as batched diagnostics whose structure changes
//! between releases. This module flattens them into [`ExtractedDiagnostic`],
//! a cloneable, serializable shape the rest of the pipeline relies on.

use serde::{Deserialize, Serialize};

/// Extracted diagnostic information from Rolldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDiagnostic {
    pub kind: DiagnosticKind,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub file: Option<String>,
    pub help: Option<String>,
}

/// Diagnostic kind (mirrors the Rolldown event kinds islet cares about).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MissingExport,
    ParseError,
    UnresolvedEntry,
    UnresolvedImport,
    Plugin,
    Other(String),
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::MissingExport => write!(f, "MissingExport"),
            DiagnosticKind::ParseError => write!(f, "ParseError"),
            DiagnosticKind::UnresolvedEntry => write!(f, "UnresolvedEntry"),
            DiagnosticKind::UnresolvedImport => write!(f, "UnresolvedImport"),
            DiagnosticKind::Plugin => write!(f, "Plugin"),
            DiagnosticKind::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl ExtractedDiagnostic {
    /// An error-level diagnostic that did not come from Rolldown.
    pub fn other(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Other(kind.to_string()),
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            file: None,
            help: None,
        }
    }

    /// Does this diagnostic mention `needle` in its message or file?
    pub fn mentions(&self, needle: &str) -> bool {
        self.message.contains(needle)
            || self
                .file
                .as_deref()
                .is_some_and(|file| file.contains(needle))
    }
}

/// Extract diagnostics from Rolldown error types.
///
/// Works from the debug rendering of the error, since Rolldown does not expose
/// a stable structured API for batched diagnostics.
pub fn extract_from_rolldown_error(error: &dyn std::fmt::Debug) -> Vec<ExtractedDiagnostic> {
    let error_str = format!("{error:?}");

    let parts: Vec<&str> = error_str
        .split("BatchedBuildDiagnostic")
        .filter(|part| {
            !part
                .trim_matches(|c: char| c.is_whitespace() || c == '"')
                .is_empty()
        })
        .collect();

    if parts.len() > 1 {
        parts.into_iter().map(extract_single_from_string).collect()
    } else {
        vec![extract_single_from_string(&error_str)]
    }
}

/// Flatten the warnings a successful build reported.
pub fn extract_warnings<W: std::fmt::Debug>(warnings: &[W]) -> Vec<ExtractedDiagnostic> {
    warnings
        .iter()
        .map(|warning| ExtractedDiagnostic {
            severity: DiagnosticSeverity::Warning,
            ..extract_single_from_string(&format!("{warning:?}"))
        })
        .collect()
}

fn extract_single_from_string(error_str: &str) -> ExtractedDiagnostic {
    let kind = if error_str.contains("MissingExport") {
        DiagnosticKind::MissingExport
    } else if error_str.contains("Parse error") || error_str.contains("Expected") {
        DiagnosticKind::ParseError
    } else if error_str.contains("UnresolvedEntry") {
        DiagnosticKind::UnresolvedEntry
    } else if error_str.contains("UnresolvedImport") || error_str.contains("Cannot resolve") {
        DiagnosticKind::UnresolvedImport
    } else if error_str.contains("Plugin") {
        DiagnosticKind::Plugin
    } else {
        DiagnosticKind::Other("Bundler".to_string())
    };

    let severity = if error_str.contains("Warning") {
        DiagnosticSeverity::Warning
    } else {
        DiagnosticSeverity::Error
    };

    ExtractedDiagnostic {
        kind,
        severity,
        message: error_str.trim().to_string(),
        file: extract_file_path(error_str),
        help: extract_help_text(error_str),
    }
}

/// Extract a script path from an error message.
fn extract_file_path(text: &str) -> Option<String> {
    for ext in [".js", ".jsx", ".ts", ".tsx", ".mjs"] {
        let Some(pos) = text.find(ext) else {
            continue;
        };
        let before = &text[..pos + ext.len()];
        for indicator in ["in ", "at ", "file: ", "\"", "'"] {
            if let Some(start) = before.rfind(indicator) {
                let path = before[start + indicator.len()..]
                    .trim()
                    .trim_matches(|c: char| c == '"' || c == '\\' || c == '\'');
                if !path.is_empty() {
                    return Some(path.to_string());
                }
            }
        }
    }
    None
}

fn extract_help_text(text: &str) -> Option<String> {
    for indicator in ["help: ", "Help: ", "hint: ", "Hint: "] {
        if let Some(pos) = text.find(indicator) {
            // debug output escapes newlines, so stop at either form
            let rest = &text[pos + indicator.len()..];
            let end = rest.find(['\n', '\\', '"']).unwrap_or(rest.len());
            let help = rest[..end].trim();
            if !help.is_empty() {
                return Some(help.to_string());
            }
        }
    }
    None
}
