use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Copies `binary_path` to `bin_dir/program_name` with execute permission for
/// owner, group and other. The copy is staged next to the destination and
/// renamed over it, so a running older binary is replaced atomically.
pub fn install_binary(binary_path: &Path, bin_dir: &Path, program_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(bin_dir)
        .with_context(|| format!("Could not create bin directory {}", bin_dir.display()))?;
    let dest_path = bin_dir.join(program_name);

    let mut source = fs::File::open(binary_path)
        .with_context(|| format!("Could not open {}", binary_path.display()))?;
    let mut staged = NamedTempFile::new_in(bin_dir)?;
    io::copy(&mut source, staged.as_file_mut())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = source.metadata()?.permissions().mode() & 0o777;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(mode | 0o111))?;
    }

    staged
        .persist(&dest_path)
        .with_context(|| format!("Could not install binary to {}", dest_path.display()))?;

    tracing::debug!(path = %dest_path.display(), "Installed binary");
    Ok(dest_path)
}
