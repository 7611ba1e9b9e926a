use std::fmt;

/// Machine-readable error codes for run failures, surfaced by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SourceUnavailable,
    SourceQueryFailed,
    ConfigParseError,
    InvalidWindow,
    SinkOpenFailed,
    SinkWriteFailed,
    CorruptOutput,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::SourceUnavailable => "E1001",
            Self::SourceQueryFailed => "E1002",
            Self::ConfigParseError => "E2001",
            Self::InvalidWindow => "E2002",
            Self::SinkOpenFailed => "E3001",
            Self::SinkWriteFailed => "E3002",
            Self::CorruptOutput => "E3003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SourceUnavailable => "Staging store unavailable",
            Self::SourceQueryFailed => "Staging store query failed",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidWindow => "Invalid run window",
            Self::SinkOpenFailed => "Output database could not be opened",
            Self::SinkWriteFailed => "Output batch write failed",
            Self::CorruptOutput => "Corrupt output database",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::SourceUnavailable => {
                Some("Check [source] path in rebook.toml, or run `rebook init` for a local store.")
            }
            Self::SourceQueryFailed => {
                Some("The staging schema may be outdated. Re-run the extract job and retry.")
            }
            Self::ConfigParseError => Some("Fix syntax in rebook.toml and retry."),
            Self::InvalidWindow => Some("Use a smaller --days-back or a later --today."),
            Self::SinkOpenFailed => Some("Check disk space and write permissions."),
            Self::SinkWriteFailed => {
                Some("Earlier batches were committed. Re-run; unchanged rows are skipped.")
            }
            Self::CorruptOutput => {
                Some("Move the output database aside and re-run to rebuild the window.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
