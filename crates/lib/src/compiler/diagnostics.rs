//! Parsing of command-line compiler output into [`Diagnostic`]s.
//!
//! Understands the message shape shared by `csc` and `mcs`:
//!
//! ```text
//! path/to/file.cs(12,5): error CS1002: ; expected
//! csc : warning CS2008: No source files specified.
//! error CS2001: Source file 'x.cs' could not be found.
//! ```

use std::path::PathBuf;

use super::Diagnostic;

/// Extracts every recognizable diagnostic from compiler output.
///
/// Lines that are not diagnostics (banners, summaries) are skipped.
pub fn parse_output(output: &str) -> Vec<Diagnostic> {
  output.lines().filter_map(parse_line).collect()
}

/// Parses one line of compiler output.
pub fn parse_line(line: &str) -> Option<Diagnostic> {
  let line = line.trim();
  let (location, rest) = split_location(line);

  let (is_warning, rest) = if let Some(rest) = rest.strip_prefix("error ") {
    (false, rest)
  } else if let Some(rest) = rest.strip_prefix("warning ") {
    (true, rest)
  } else {
    return None;
  };

  let (code, message) = rest.split_once(": ")?;
  let code = code.trim();
  if code.is_empty() || code.contains(char::is_whitespace) {
    return None;
  }

  let (file, line, column) = match location {
    Some((file, line, column)) => (Some(file), line, column),
    None => (None, 0, 0),
  };

  Some(Diagnostic {
    file,
    line,
    column,
    code: code.to_string(),
    message: message.trim().to_string(),
    is_warning,
  })
}

fn split_location(line: &str) -> (Option<(PathBuf, u32, u32)>, &str) {
  if let Some(idx) = line.find("): ") {
    let head = &line[..idx];
    if let Some(open) = head.rfind('(')
      && let Some((l, c)) = head[open + 1..].split_once(',')
      && let (Ok(l), Ok(c)) = (l.trim().parse(), c.trim().parse())
    {
      return (Some((PathBuf::from(&head[..open]), l, c)), &line[idx + 3..]);
    }
  }

  // "csc : error CS...": tool-prefixed message without a position
  if let Some((_, rest)) = line.split_once(" : ")
    && (rest.starts_with("error ") || rest.starts_with("warning "))
  {
    return (None, rest);
  }

  (None, line)
}
