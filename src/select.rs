//! Picks the program's executable out of an extracted archive tree.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Attributes of one extracted entry that matter for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub path: PathBuf,
    pub is_file: bool,
    pub has_exec_bit: bool,
    pub file_name: String,
    pub parent_name: String,
}

impl ExtractedFile {
    /// Reads metadata of `path`. A symlink is followed only when its
    /// canonical target is one of the `tree` entries; any other link is not a
    /// regular file.
    pub fn inspect(path: &Path, tree: &HashSet<&Path>) -> Self {
        let metadata = fs::symlink_metadata(path).ok().and_then(|m| {
            if m.file_type().is_symlink() {
                followed_within(path, tree)
            } else {
                Some(m)
            }
        });
        let is_file = metadata.as_ref().is_some_and(|m| m.file_type().is_file());
        let has_exec_bit = metadata.as_ref().is_some_and(mode_has_exec_bit);

        Self {
            path: path.to_path_buf(),
            is_file,
            has_exec_bit,
            file_name: name_of(path),
            parent_name: path.parent().map(name_of).unwrap_or_default(),
        }
    }

    fn is_executable(&self, program_name: &str) -> bool {
        self.has_exec_bit || self.file_name == program_name
    }
}

fn followed_within(link: &Path, tree: &HashSet<&Path>) -> Option<fs::Metadata> {
    let target = fs::canonicalize(link).ok()?;
    if !tree.contains(target.as_path()) {
        tracing::debug!(path = %link.display(), "Ignoring link leaving the archive tree");
        return None;
    }
    fs::metadata(target).ok()
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(unix)]
fn mode_has_exec_bit(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn mode_has_exec_bit(_metadata: &fs::Metadata) -> bool {
    false
}

/// Why an executable was taken as a candidate. Rules are tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    ExactName,
    NameContains,
    ParentPrefix,
}

type Matcher = fn(&ExtractedFile, &str) -> bool;

const MATCH_RULES: &[(MatchRule, Matcher)] = &[
    (MatchRule::ExactName, exact_name),
    (MatchRule::NameContains, name_contains),
    (MatchRule::ParentPrefix, parent_prefix),
];

fn exact_name(file: &ExtractedFile, program_name: &str) -> bool {
    file.file_name == program_name
}

fn name_contains(file: &ExtractedFile, program_name: &str) -> bool {
    file.file_name
        .to_lowercase()
        .contains(&program_name.to_lowercase())
}

// versioned release directories, e.g. ripgrep-14.1.0-x86_64-unknown-linux-musl/rg
fn parent_prefix(file: &ExtractedFile, program_name: &str) -> bool {
    file.parent_name.starts_with(program_name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCandidate<'a> {
    pub file: &'a ExtractedFile,
    pub rule: MatchRule,
}

fn classify<'a>(file: &'a ExtractedFile, program_name: &str) -> Option<BinaryCandidate<'a>> {
    if !file.is_file {
        tracing::debug!(program = program_name, path = %file.path.display(), "Skipping (not a file)");
        return None;
    }
    if !file.is_executable(program_name) {
        tracing::debug!(program = program_name, path = %file.path.display(), "File not executable");
        return None;
    }

    let (rule, _) = MATCH_RULES
        .iter()
        .find(|(_, matches)| matches(file, program_name))?;
    tracing::debug!(
        program = program_name,
        path = %file.path.display(),
        rule = ?rule,
        "Adding candidate"
    );
    Some(BinaryCandidate { file, rule: *rule })
}

/// Exact name first, otherwise the shortest file name; earlier entries win
/// ties.
pub fn pick<'a>(files: &'a [ExtractedFile], program_name: &str) -> Option<&'a ExtractedFile> {
    let candidates: Vec<BinaryCandidate<'a>> = files
        .iter()
        .filter_map(|f| classify(f, program_name))
        .collect();

    if let Some(exact) = candidates.iter().find(|c| c.rule == MatchRule::ExactName) {
        tracing::debug!(program = program_name, path = %exact.file.path.display(), "Found exact match");
        return Some(exact.file);
    }

    // min_by_key keeps the first of equal keys
    let shortest = candidates
        .iter()
        .min_by_key(|c| c.file.file_name.chars().count())?;
    tracing::debug!(program = program_name, path = %shortest.file.path.display(), "Selected shortest name");
    Some(shortest.file)
}

pub fn select_binary(entries: &[PathBuf], program_name: &str) -> Option<PathBuf> {
    tracing::debug!(
        program = program_name,
        "Searching for binary among {} files",
        entries.len()
    );
    let tree: HashSet<&Path> = entries.iter().map(PathBuf::as_path).collect();
    let files: Vec<ExtractedFile> = entries
        .iter()
        .map(|p| ExtractedFile::inspect(p, &tree))
        .collect();
    let chosen = pick(&files, program_name).map(|f| f.path.clone());
    if chosen.is_none() {
        tracing::debug!(program = program_name, "No candidates found");
    }
    chosen
}
