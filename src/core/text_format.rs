//! Positional message templates (`"user {0} failed {1} times"`)
//!
//! Templates are resolved at runtime, so malformed input is an ordinary
//! error value rather than a panic. Callers on the logging path turn a
//! [`FormatError`] into [`fallback_text`] instead of propagating it.

use std::fmt::{self, Display, Write};

/// Why a template could not be expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// `{n}` refers past the end of the argument list
    MissingArgument { index: usize, provided: usize },
    /// `{` without a matching `}`
    UnclosedPlaceholder { position: usize },
    /// `}` without a preceding `{`
    UnmatchedBrace { position: usize },
    /// Placeholder body is not a non-negative integer
    InvalidPlaceholder { body: String },
    /// An argument's `Display` implementation returned an error
    ArgumentFailed { index: usize },
}

impl Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::MissingArgument { index, provided } => write!(
                f,
                "placeholder {{{}}} has no argument ({} provided)",
                index, provided
            ),
            FormatError::UnclosedPlaceholder { position } => {
                write!(f, "unclosed '{{' at position {}", position)
            }
            FormatError::UnmatchedBrace { position } => {
                write!(f, "unmatched '}}' at position {}", position)
            }
            FormatError::InvalidPlaceholder { body } => {
                write!(f, "invalid placeholder '{{{}}}'", body)
            }
            FormatError::ArgumentFailed { index } => {
                write!(f, "argument {} failed to format", index)
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Expand `{n}` placeholders with `args[n]`. `{{` and `}}` are literal braces.
pub fn format_positional(template: &str, args: &[&dyn Display]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut body = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    body.push(inner);
                }
                if !closed {
                    return Err(FormatError::UnclosedPlaceholder { position: pos });
                }
                let index: usize = body
                    .trim()
                    .parse()
                    .map_err(|_| FormatError::InvalidPlaceholder { body: body.clone() })?;
                let arg = args.get(index).ok_or(FormatError::MissingArgument {
                    index,
                    provided: args.len(),
                })?;
                write!(out, "{}", arg).map_err(|_| FormatError::ArgumentFailed { index })?;
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(FormatError::UnmatchedBrace { position: pos });
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Diagnostic text logged in place of a template that failed to expand
pub fn fallback_text(template: &str, arg_count: usize, error: &FormatError) -> String {
    format!(
        "Unable to format message '{}' with {} argument(s): {}",
        template, arg_count, error
    )
}

/// Expand the template, or produce the fallback diagnostic on failure
pub fn format_or_fallback(template: &str, args: &[&dyn Display]) -> String {
    if args.is_empty() && !template.contains(['{', '}']) {
        return template.to_string();
    }
    format_positional(template, args).unwrap_or_else(|e| fallback_text(template, args.len(), &e))
}
