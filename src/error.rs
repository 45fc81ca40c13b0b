use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::fmt;
use std::io;
use thiserror::Error;

/// Half-open range of char offsets into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Where a token or node comes from: char offset span plus 1-based line and
/// column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(span: Span, line: u32, column: u32) -> Self {
        Self { span, line, column }
    }

    /// Location starting at `self` and ending where `other` ends.
    pub fn extend(self, other: SourceLocation) -> SourceLocation {
        SourceLocation {
            span: self.span.to(other.span),
            line: self.line,
            column: self.column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Misuse of the static scope resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("no scope is open")]
    NoOpenScope,
    #[error("the global scope can not be closed")]
    GlobalScope,
}

/// Misuse of the stepping API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("an evaluation is already in progress: continue or reset it first")]
    AlreadyRunning,
    #[error("no evaluation is pending")]
    NotPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Syntax,
    Runtime,
}

/// A syntax or runtime error ready to be rendered against its source text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span, message: String) -> Self {
        Self {
            kind,
            span,
            message,
            help: None,
        }
    }

    pub fn syntax(span: Span, message: String) -> Self {
        Self::new(DiagnosticKind::Syntax, span, message)
    }

    pub fn runtime(span: Span, message: String) -> Self {
        Self::new(DiagnosticKind::Runtime, span, message)
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn report(&self, source: &str, filename: Option<&str>) -> io::Result<()> {
        let filename = filename.unwrap_or("<repl>");

        let color = match self.kind {
            DiagnosticKind::Syntax => Color::Yellow,
            DiagnosticKind::Runtime => Color::Magenta,
        };

        let kind_str = match self.kind {
            DiagnosticKind::Syntax => "Syntax Error",
            DiagnosticKind::Runtime => "Runtime Error",
        };

        // Zero-width spans (end of input) still need a visible label.
        let end = self.span.end.max(self.span.start + 1).min(source.len().max(1));
        let start = self.span.start.min(end.saturating_sub(1));

        let mut report_builder = Report::build(ReportKind::Error, filename, start)
            .with_message(format!("{}: {}", kind_str.fg(color), self.message))
            .with_label(
                Label::new((filename, start..end))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        report_builder
            .finish()
            .eprint((filename, Source::from(source)))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Diagnostic {}
