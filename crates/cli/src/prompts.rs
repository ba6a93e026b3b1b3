use std::io::{self, IsTerminal, Write};

use anyhow::{Result, bail};

/// Asks a yes/no question on stderr. `assume_yes` skips the question.
///
/// Refuses to guess when there is no terminal to ask on.
pub fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
  if assume_yes {
    return Ok(true);
  }
  if !io::stdin().is_terminal() {
    bail!("Refusing to proceed without confirmation; pass --force");
  }

  let mut stderr = io::stderr();
  write!(stderr, "{} [y/N] ", question)?;
  stderr.flush()?;

  let mut answer = String::new();
  io::stdin().read_line(&mut answer)?;
  let answer = answer.trim();
  Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}
