//! Route-level serving options
//!
//! Plain data with serde derives so hosts can keep these in their TOML route
//! tables; the function-valued knobs (path producers, listing renderers) are
//! code-only and skipped during deserialization.

use crate::etag::EtagMode;
use crate::serve::request::ServeRequest;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// Content-Disposition policy for a route
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Disposition {
    /// No content-disposition header
    #[default]
    None,
    Inline {
        #[serde(default)]
        filename: Option<String>,
    },
    Attachment {
        #[serde(default)]
        filename: Option<String>,
    },
}

impl Disposition {
    /// Header value, or None when no header should be sent
    pub fn header_value(&self) -> Option<String> {
        let (kind, filename) = match self {
            Self::None => return None,
            Self::Inline { filename } => ("inline", filename),
            Self::Attachment { filename } => ("attachment", filename),
        };
        Some(match filename {
            Some(name) => format!("{kind}; filename=\"{name}\""),
            None => kind.to_string(),
        })
    }
}

/// One precompressed sibling to probe for
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompressedVariant {
    /// content-encoding token the client must accept
    pub encoding: String,
    /// Suffix appended to the primary path, e.g. `.gz`
    pub suffix: String,
}

/// Precompressed-variant lookup table, probed in listed order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrecompressedLookup {
    #[serde(default = "default_variants")]
    pub variants: Vec<CompressedVariant>,
}

impl Default for PrecompressedLookup {
    fn default() -> Self {
        Self {
            variants: default_variants(),
        }
    }
}

fn default_variants() -> Vec<CompressedVariant> {
    vec![
        CompressedVariant {
            encoding: "gzip".to_string(),
            suffix: ".gz".to_string(),
        },
        CompressedVariant {
            encoding: "br".to_string(),
            suffix: ".br".to_string(),
        },
    ]
}

/// Fixed byte window: serve only `[start, end)` of the primary content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ByteWindow {
    pub start: u64,
    /// Exclusive end; None means end of file
    #[serde(default)]
    pub end: Option<u64>,
}

/// Options for the file-serving capability
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// Confinement root; None serves the literal path unchecked and is only
    /// for server-configured, non-user-controlled paths
    pub confine: Option<PathBuf>,
    pub etag: EtagMode,
    /// Advertise and honor byte ranges on this route
    pub ranges: bool,
    pub disposition: Disposition,
    /// Precompressed sibling lookup; skipped when a byte window is set
    pub precompressed: Option<PrecompressedLookup>,
    pub window: Option<ByteWindow>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            confine: None,
            etag: EtagMode::default(),
            ranges: true,
            disposition: Disposition::None,
            precompressed: None,
            window: None,
        }
    }
}

/// Options for the directory-serving capability
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DirOptions {
    /// Index filenames tried in order; empty disables index resolution
    pub index: Vec<String>,
    /// Render a listing when no index matches
    pub listing: bool,
    /// Serve and list dotted names
    pub show_hidden: bool,
    /// Redirect directory URLs lacking a trailing slash
    pub redirect_to_slash: bool,
    /// Extension appended once when the bare sub-path is not found
    pub default_extension: Option<String>,
    /// File-level options applied to every file this route serves; the
    /// confinement root is overridden by the matched base directory
    pub file: FileOptions,
    /// Custom listing renderer; the default produces a minimal HTML list
    #[serde(skip)]
    pub renderer: Option<ListingRenderer>,
}

impl Default for DirOptions {
    fn default() -> Self {
        Self {
            index: vec!["index.html".to_string()],
            listing: false,
            show_hidden: false,
            redirect_to_slash: true,
            default_extension: None,
            file: FileOptions::default(),
            renderer: None,
        }
    }
}

impl fmt::Debug for DirOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirOptions")
            .field("index", &self.index)
            .field("listing", &self.listing)
            .field("show_hidden", &self.show_hidden)
            .field("redirect_to_slash", &self.redirect_to_slash)
            .field("default_extension", &self.default_extension)
            .field("file", &self.file)
            .field("renderer", &self.renderer.as_ref().map(|_| "custom"))
            .finish()
    }
}

/// One entry handed to a listing renderer
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// What a listing renderer sees
#[derive(Debug)]
pub struct ListingContext<'a> {
    /// Request path of the directory being listed
    pub request_path: &'a str,
    /// Filtered, sorted entries
    pub entries: &'a [ListingEntry],
    /// True when listing the configured root itself (no parent link)
    pub at_root: bool,
}

/// Rendered listing page
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub content_type: String,
    pub body: String,
}

/// Custom directory-listing renderer
#[derive(Clone)]
pub struct ListingRenderer(Arc<dyn Fn(&ListingContext<'_>) -> ListingPage + Send + Sync>);

impl ListingRenderer {
    pub fn new(render: impl Fn(&ListingContext<'_>) -> ListingPage + Send + Sync + 'static) -> Self {
        Self(Arc::new(render))
    }

    pub fn render(&self, ctx: &ListingContext<'_>) -> ListingPage {
        self.0.as_ref()(ctx)
    }
}

impl fmt::Debug for ListingRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingRenderer").finish_non_exhaustive()
    }
}

/// Where the file-serving capability gets its path
#[derive(Clone)]
pub enum PathSource {
    /// A fixed logical path
    Fixed(PathBuf),
    /// A path produced from the request; a production error is an
    /// `Internal` failure, not a 404
    Produced(Arc<dyn Fn(&ServeRequest<'_>) -> Result<PathBuf, String> + Send + Sync>),
}

impl PathSource {
    pub fn produced(
        produce: impl Fn(&ServeRequest<'_>) -> Result<PathBuf, String> + Send + Sync + 'static,
    ) -> Self {
        Self::Produced(Arc::new(produce))
    }
}

impl fmt::Debug for PathSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(path) => f.debug_tuple("Fixed").field(path).finish(),
            Self::Produced(_) => f.debug_struct("Produced").finish_non_exhaustive(),
        }
    }
}

impl From<&str> for PathSource {
    fn from(path: &str) -> Self {
        Self::Fixed(PathBuf::from(path))
    }
}

impl From<PathBuf> for PathSource {
    fn from(path: PathBuf) -> Self {
        Self::Fixed(path)
    }
}

/// Candidate base directories for directory serving
#[derive(Clone)]
pub enum DirRoots {
    /// Fixed, ordered candidate list
    Fixed(Vec<PathBuf>),
    /// Candidates produced from the request
    Produced(Arc<dyn Fn(&ServeRequest<'_>) -> Result<Vec<PathBuf>, String> + Send + Sync>),
}

impl DirRoots {
    pub fn single(root: impl Into<PathBuf>) -> Self {
        Self::Fixed(vec![root.into()])
    }

    pub fn produced(
        produce: impl Fn(&ServeRequest<'_>) -> Result<Vec<PathBuf>, String> + Send + Sync + 'static,
    ) -> Self {
        Self::Produced(Arc::new(produce))
    }
}

impl fmt::Debug for DirRoots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(roots) => f.debug_tuple("Fixed").field(roots).finish(),
            Self::Produced(_) => f.debug_struct("Produced").finish_non_exhaustive(),
        }
    }
}
