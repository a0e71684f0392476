//! Record categories
//!
//! The category tag is what the dispatcher routes on and what the grouped
//! index queries by. Built-in kinds cover stored content (images, volumes,
//! files) and blackboard results (hits, messages); [`Category::Other`] carries
//! schema-specific kinds registered at run time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category tag of a stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Disk image
    Image,
    /// Volume inside an image
    Volume,
    /// File-system directory
    Directory,
    /// Regular file-system file
    File,
    /// Unallocated or slack layout file
    LayoutFile,
    /// File derived from another file (carved, extracted)
    DerivedFile,
    /// File added from the examiner's machine
    LocalFile,
    /// Directory that does not exist on the source media
    VirtualDirectory,

    /// Interesting-file rule hit
    InterestingFileHit,
    /// Interesting-artifact rule hit
    InterestingArtifactHit,
    /// Keyword search hit
    KeywordHit,
    /// Known hash-set hit
    HashsetHit,
    /// Extracted e-mail message
    EmailMessage,

    /// Schema-specific category not known at build time
    Other(String),
}

impl Category {
    /// Built-in stored-content categories
    pub const CONTENT: [Category; 8] = [
        Category::Image,
        Category::Volume,
        Category::Directory,
        Category::File,
        Category::LayoutFile,
        Category::DerivedFile,
        Category::LocalFile,
        Category::VirtualDirectory,
    ];

    /// Built-in blackboard result categories
    pub const RESULTS: [Category; 5] = [
        Category::InterestingFileHit,
        Category::InterestingArtifactHit,
        Category::KeywordHit,
        Category::HashsetHit,
        Category::EmailMessage,
    ];

    /// Stable identifier used in logs and wire formats
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Image => "image",
            Self::Volume => "volume",
            Self::Directory => "directory",
            Self::File => "file",
            Self::LayoutFile => "layout_file",
            Self::DerivedFile => "derived_file",
            Self::LocalFile => "local_file",
            Self::VirtualDirectory => "virtual_directory",
            Self::InterestingFileHit => "interesting_file_hit",
            Self::InterestingArtifactHit => "interesting_artifact_hit",
            Self::KeywordHit => "keyword_hit",
            Self::HashsetHit => "hashset_hit",
            Self::EmailMessage => "email_message",
            Self::Other(name) => name,
        }
    }

    /// Check if this is a stored-content category
    #[inline]
    #[must_use]
    pub fn is_content(&self) -> bool {
        Self::CONTENT.contains(self)
    }

    /// Check if this is a blackboard result category
    #[inline]
    #[must_use]
    pub fn is_result(&self) -> bool {
        Self::RESULTS.contains(self)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
