//! Shared machinery for the textual MIR dump.

use std::fmt::{self, Formatter};

/// Knobs for the textual dump.
#[derive(Debug, Clone)]
pub struct PrettyOptions {
    /// Number of spaces to indent per nesting level.
    pub indent_size: usize,
    /// Append `// Span(..)` to statements and terminators.
    pub show_spans: bool,
    /// Print the field type in field projections, `(_1.0: i32)`.
    pub show_types: bool,
}

impl Default for PrettyOptions {
    fn default() -> Self {
        Self {
            indent_size: 4,
            show_spans: false,
            show_types: true,
        }
    }
}

pub struct PrettyCtx<'a> {
    pub options: &'a PrettyOptions,
    indent: usize,
}

impl<'a> PrettyCtx<'a> {
    pub fn new(options: &'a PrettyOptions) -> Self {
        Self { options, indent: 0 }
    }

    pub fn writeln(&self, f: &mut Formatter<'_>, line: impl AsRef<str>) -> fmt::Result {
        write!(f, "{:width$}", "", width = self.indent)?;
        writeln!(f, "{}", line.as_ref())
    }

    /// Empty line without trailing indentation.
    pub fn blank_line(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f)
    }

    pub fn with_indent<F>(&mut self, mut body: F) -> fmt::Result
    where
        F: FnMut(&mut Self) -> fmt::Result,
    {
        self.indent += self.options.indent_size;
        let result = body(self);
        self.indent = self.indent.saturating_sub(self.options.indent_size);
        result
    }
}

pub trait PrettyPrintable {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result;
}

/// `Display` adapter over [`PrettyPrintable`].
pub struct PrettyDisplay<'a, T> {
    value: &'a T,
    options: PrettyOptions,
}

impl<'a, T> fmt::Display for PrettyDisplay<'a, T>
where
    T: PrettyPrintable,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut ctx = PrettyCtx::new(&self.options);
        self.value.fmt_pretty(f, &mut ctx)
    }
}

pub fn pretty<T>(value: &T, options: PrettyOptions) -> PrettyDisplay<'_, T>
where
    T: PrettyPrintable,
{
    PrettyDisplay { value, options }
}

pub fn escape_string(input: &str) -> String {
    input.chars().map(|ch| escape(ch, '"')).collect()
}

pub fn escape_char(ch: char) -> String {
    escape(ch, '\'')
}

fn escape(ch: char, quote: char) -> String {
    match ch {
        '\\' => "\\\\".to_string(),
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        '\t' => "\\t".to_string(),
        ch if ch == quote => format!("\\{}", ch),
        ch if ch.is_control() => format!("\\u{{{:x}}}", ch as u32),
        ch => ch.to_string(),
    }
}
