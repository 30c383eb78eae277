use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use thiserror::Error;

use crate::answers::FileAttachment;
use crate::spec::question::QuestionSpec;

pub const DEFAULT_MAX_FILES: usize = 1;
pub const DEFAULT_MAX_SIZE_MB: f64 = 10.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Reasons a file is refused at accept time. Already accepted files are
/// never affected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FileRejected {
    #[error("only {max} file(s) can be attached")]
    TooMany { max: usize },
    #[error("'{name}' is larger than {max_mb} MB")]
    TooLarge { name: String, max_mb: f64 },
    #[error("'{name}' is not an accepted file type ({accepted})")]
    ExtensionNotAllowed { name: String, accepted: String },
    #[error("question '{0}' does not accept files")]
    NotAFileQuestion(String),
}

/// Attachment limits derived from a file question.
#[derive(Debug, Clone)]
pub struct FilePolicy {
    pub max_files: usize,
    pub max_size_mb: f64,
    accepted: Vec<String>,
    matcher: Option<GlobSet>,
}

impl FilePolicy {
    pub fn for_question(question: &QuestionSpec) -> Self {
        let accepted = question
            .accepted_extensions
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect::<Vec<_>>();
        Self {
            max_files: question.max_files.unwrap_or(DEFAULT_MAX_FILES),
            max_size_mb: question.max_size.unwrap_or(DEFAULT_MAX_SIZE_MB),
            matcher: build_matcher(&accepted),
            accepted,
        }
    }

    pub fn accepted_extensions(&self) -> &[String] {
        &self.accepted
    }

    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * BYTES_PER_MB) as u64
    }

    /// Decide whether `file` may join `existing` accepted files.
    pub fn accept(&self, existing: usize, file: &FileAttachment) -> Result<(), FileRejected> {
        if existing >= self.max_files {
            return Err(FileRejected::TooMany {
                max: self.max_files,
            });
        }
        if file.size_bytes > self.max_size_bytes() {
            return Err(FileRejected::TooLarge {
                name: file.name.clone(),
                max_mb: self.max_size_mb,
            });
        }
        if let Some(matcher) = &self.matcher
            && !matcher.is_match(&file.name)
        {
            return Err(FileRejected::ExtensionNotAllowed {
                name: file.name.clone(),
                accepted: self.accepted.join(", "),
            });
        }
        Ok(())
    }
}

fn build_matcher(extensions: &[String]) -> Option<GlobSet> {
    if extensions.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        if let Ok(glob) = GlobBuilder::new(&format!("*.{}", ext))
            .case_insensitive(true)
            .literal_separator(false)
            .build()
        {
            builder.add(glob);
        }
    }
    builder.build().ok()
}

/// Human-readable size used in reports and prompts.
pub fn format_size(bytes: u64) -> String {
    let bytes_f = bytes as f64;
    if bytes_f >= BYTES_PER_MB {
        format!("{:.1} MB", bytes_f / BYTES_PER_MB)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes_f / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
