//! Unpacks downloaded release archives into a scratch directory.
//!
//! Every member is checked against the canonical target directory twice:
//! once lexically for the whole archive before anything is written, and once
//! against the real filesystem right before the member is written, so links
//! planted by earlier members cannot redirect later ones.

use crate::error::{ResolveError, ResolveResult};
use crate::types::ArchiveKind;
use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use walkdir::WalkDir;

pub fn extract(
    archive_path: &Path,
    kind: ArchiveKind,
    target_dir: &Path,
) -> ResolveResult<Vec<PathBuf>> {
    let archive_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| archive_path.display().to_string());

    let unpack: fn(&Path, &Path) -> ResolveResult<()> = match kind {
        ArchiveKind::Tar => extract_tar_gz,
        ArchiveKind::Zip => extract_zip,
        ArchiveKind::Unknown => {
            return Err(ResolveError::UnsupportedArchiveFormat {
                asset: archive_name,
            })
        }
    };

    tracing::info!(archive = %archive_name, kind = %kind, "Extracting archive");

    fs::create_dir_all(target_dir)?;
    let root = target_dir.canonicalize()?;
    unpack(archive_path, &root)?;

    let entries = list_tree(&root)?;
    tracing::debug!(
        archive = %archive_name,
        "Extracted {} entries into {}",
        entries.len(),
        root.display()
    );
    Ok(entries)
}

/// Joins `member` onto `root` and folds `.`/`..` without touching the
/// filesystem. An absolute member replaces `root` entirely.
fn lexical_destination(root: &Path, member: &Path) -> PathBuf {
    let mut dest = PathBuf::new();
    for component in root.join(member).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                dest.pop();
            }
            other => dest.push(other.as_os_str()),
        }
    }
    dest
}

fn check_member(root: &Path, member: &Path) -> ResolveResult<PathBuf> {
    let dest = lexical_destination(root, member);
    if !dest.starts_with(root) {
        tracing::warn!(member = %member.display(), "Rejecting archive member outside target");
        return Err(ResolveError::PathTraversal {
            member: member.display().to_string(),
        });
    }
    Ok(dest)
}

/// Resolves the deepest part of `dest` that already exists, following
/// symlinks, and re-attaches the rest.
fn resolve_existing(dest: &Path) -> Option<PathBuf> {
    let mut existing = dest;
    let mut rest = Vec::new();
    while fs::symlink_metadata(existing).is_err() {
        rest.push(existing.file_name()?);
        existing = existing.parent()?;
    }
    // a dangling link cannot be verified
    let mut resolved = existing.canonicalize().ok()?;
    for part in rest.into_iter().rev() {
        resolved.push(part);
    }
    Some(resolved)
}

fn check_on_disk(root: &Path, member: &Path, dest: &Path) -> ResolveResult<()> {
    match resolve_existing(dest) {
        Some(resolved) if resolved.starts_with(root) => Ok(()),
        _ => {
            tracing::warn!(member = %member.display(), "Archive member resolves outside target");
            Err(ResolveError::PathTraversal {
                member: member.display().to_string(),
            })
        }
    }
}

fn open_tar_gz(archive_path: &Path) -> io::Result<Archive<GzDecoder<fs::File>>> {
    let file = fs::File::open(archive_path)?;
    Ok(Archive::new(GzDecoder::new(file)))
}

fn extract_tar_gz(archive_path: &Path, root: &Path) -> ResolveResult<()> {
    let mut archive = open_tar_gz(archive_path)?;
    for entry in archive.entries()? {
        let entry = entry?;
        let member = entry.path()?.into_owned();
        check_member(root, &member)?;
        if entry.header().entry_type().is_hard_link() {
            if let Some(target) = entry.link_name()? {
                check_member(root, &target)?;
            }
        }
    }

    let mut archive = open_tar_gz(archive_path)?;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let member = entry.path()?.into_owned();
        let dest = check_member(root, &member)?;
        if dest == root {
            continue;
        }
        check_on_disk(root, &member, &dest)?;

        if !entry.unpack_in(root)? {
            return Err(ResolveError::PathTraversal {
                member: member.display().to_string(),
            });
        }
    }
    Ok(())
}

fn extract_zip(archive_path: &Path, root: &Path) -> ResolveResult<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let member = archive.by_index_raw(i)?;
        check_member(root, Path::new(member.name()))?;
    }

    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        let name = PathBuf::from(member.name());
        let dest = check_member(root, &name)?;
        if dest == root {
            continue;
        }
        check_on_disk(root, &name, &dest)?;

        if member.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
            check_on_disk(root, &name, parent)?;
        }
        let mut outfile = fs::File::create(&dest)?;
        io::copy(&mut member, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = member.unix_mode() {
                fs::set_permissions(&dest, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
    }
    Ok(())
}

fn list_tree(root: &Path) -> ResolveResult<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        entries.push(entry?.into_path());
    }
    Ok(entries)
}
