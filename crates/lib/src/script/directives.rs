//! `//css_*` directives embedded in script source.
//!
//! A directive is a comment line at the start of a script line:
//!
//! ```text
//! //css_include helpers.cs        (alias //css_inc)
//! //css_reference System.Xml.dll  (alias //css_ref, //css_r)
//! //css_searchdir ../shared       (alias //css_dir)
//! ```
//!
//! Arguments may be quoted, separated by commas, and terminated with `;`.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::ScriptError;
use crate::util::paths::{dedup_paths, normalize, path_key};

/// Directives found in a single source text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Directives {
  pub includes: Vec<String>,
  pub references: Vec<String>,
  pub search_dirs: Vec<String>,
}

impl Directives {
  pub fn parse(source: &str) -> Self {
    let mut directives = Directives::default();
    for line in source.lines() {
      let Some(rest) = line.trim_start().strip_prefix("//css_") else {
        continue;
      };
      let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
      let target = match name {
        "include" | "inc" => &mut directives.includes,
        "reference" | "ref" | "r" => &mut directives.references,
        "searchdir" | "dir" => &mut directives.search_dirs,
        _ => continue,
      };
      target.extend(split_args(args));
    }
    directives
  }
}

fn split_args(args: &str) -> impl Iterator<Item = String> + '_ {
  let args = args.trim().trim_end_matches(';');
  args
    .split(',')
    .map(|a| a.trim().trim_matches('"').trim())
    .filter(|a| !a.is_empty())
    .map(str::to_string)
}

/// Transitive closure of a script's directives.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolvedDirectives {
  /// Included files in discovery order, excluding the primary script.
  pub includes: Vec<PathBuf>,
  /// Reference names or paths, as written.
  pub references: Vec<String>,
  /// Search directories, made absolute relative to their declaring script.
  pub search_dirs: Vec<PathBuf>,
}

/// Follows `//css_include` directives starting at `script`.
///
/// Include paths resolve against the including file's directory first, then
/// against each search directory. Cycles and repeated includes are visited
/// once. An include that cannot be found is an error.
pub fn resolve(script: &Path, extra_search_dirs: &[PathBuf]) -> Result<ResolvedDirectives, ScriptError> {
  let mut resolved = ResolvedDirectives::default();
  let mut visited = HashSet::new();
  let mut pending = VecDeque::from([normalize(script)]);
  let mut search_dirs: Vec<PathBuf> = extra_search_dirs.to_vec();

  visited.insert(path_key(script));

  while let Some(file) = pending.pop_front() {
    let source = fs::read_to_string(&file).map_err(|source| ScriptError::Read {
      path: file.clone(),
      source,
    })?;
    let directives = Directives::parse(&source);
    let base = file.parent().map(Path::to_path_buf).unwrap_or_default();

    for dir in &directives.search_dirs {
      search_dirs.push(normalize(&base.join(dir)));
    }
    resolved.references.extend(directives.references);

    for include in directives.includes {
      let found = locate(&include, &base, &search_dirs).ok_or_else(|| ScriptError::IncludeNotFound {
        include: include.clone(),
        from: file.clone(),
      })?;
      if visited.insert(path_key(&found)) {
        debug!(include = %found.display(), from = %file.display(), "resolved include");
        resolved.includes.push(found.clone());
        pending.push_back(found);
      }
    }
  }

  resolved.search_dirs = dedup_paths(search_dirs);
  let mut seen = HashSet::new();
  resolved.references.retain(|r| seen.insert(r.to_lowercase()));
  Ok(resolved)
}

fn locate(include: &str, base: &Path, search_dirs: &[PathBuf]) -> Option<PathBuf> {
  let candidate = Path::new(include);
  if candidate.is_absolute() {
    return candidate.is_file().then(|| normalize(candidate));
  }
  std::iter::once(base)
    .chain(search_dirs.iter().map(PathBuf::as_path))
    .map(|dir| dir.join(candidate))
    .find(|p| p.is_file())
    .map(|p| normalize(&p))
    .or_else(|| {
      warn!(include, "include not found in any search directory");
      None
    })
}
