use std::fmt;
use std::path::PathBuf;

/// A `file:line` position in the config sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// A fatal problem in a config source file, located at a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {kind}")]
pub struct ParseError {
    pub location: Location,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(location: Location, kind: ParseErrorKind) -> Self {
        Self { location, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("expected key=value, found '{text}'")]
    BadSeparator { text: String },
    #[error("malformed record header '{text}'")]
    BadHeader { text: String },
    #[error("property '{key}' appears before any [record] header")]
    PropertyOutsideRecord { key: String },
    #[error("unknown property '{key}'")]
    UnknownKey { key: String },
    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("duplicate debugname '{name}' (first defined at {first})")]
    DuplicateDebugname { name: String, first: Location },
    #[error("[{debugname}] is missing required property '{key}'")]
    MissingRequired { debugname: String, key: String },
    #[error("unknown constant '^{name}'")]
    UnknownConstant { name: String },
    #[error("duplicate constant '{name}' (first defined at {first})")]
    DuplicateConstant { name: String, first: Location },
}

/// Errors from crawling and reading config sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("source root {} does not exist", .0.display())]
    MissingRoot(PathBuf),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
