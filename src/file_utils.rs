use anyhow::Context;
use filetime::FileTime;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::album::AlbumMembership;
use crate::logger::Logger;

/// Suffix icloudpd's `--xmp-sidecar` appends to the media filename.
pub const SIDECAR_SUFFIX: &str = ".xmp";

/// Turn an album name into a safe directory name.
///
/// Surrounding whitespace is dropped and anything outside
/// `[A-Za-z0-9_\-. ]` becomes `_`. Names made only of dots (or nothing)
/// would point outside the albums directory, so their dots become `_` too.
pub fn sanitize_album_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.chars().all(|c| c == '.') {
        if sanitized.is_empty() {
            return "_".to_string();
        }
        return "_".repeat(sanitized.len());
    }
    sanitized
}

pub fn sidecar_name(file_name: &str) -> String {
    format!("{}{}", file_name, SIDECAR_SUFFIX)
}

/// Copy a file and carry over its access and modification times.
pub fn copy_preserving_times(src: &Path, dest: &Path) -> anyhow::Result<()> {
    fs::copy(src, dest)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
    let meta = fs::metadata(src).with_context(|| format!("Failed to stat {}", src.display()))?;
    filetime::set_file_times(
        dest,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
    .with_context(|| format!("Failed to set timestamps on {}", dest.display()))?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    pub copied: usize,
    pub missing: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    pub removed: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Copy every album's files (and their sidecars) from the flat pool into
/// `albums_dir/<sanitized album>/`.
///
/// Media and sidecar are handled independently. A missing source is only
/// reported; a failed copy is logged and the loop moves on.
pub fn materialize_albums(
    downloads_dir: &Path,
    albums_dir: &Path,
    membership: &AlbumMembership,
    logger: &Logger,
) -> CopyStats {
    let mut stats = CopyStats::default();

    for album in membership.albums() {
        let album_dir = albums_dir.join(sanitize_album_name(&album.name));
        if let Err(e) = fs::create_dir_all(&album_dir) {
            logger.error(&format!(
                "Failed to create album folder {}: {}",
                album_dir.display(),
                e
            ));
            stats.failed += album.files.len();
            continue;
        }

        for file_name in &album.files {
            for name in [file_name.clone(), sidecar_name(file_name)] {
                let src = downloads_dir.join(&name);
                if !src.exists() {
                    logger.file_missing(&name, downloads_dir);
                    stats.missing += 1;
                    continue;
                }
                match copy_preserving_times(&src, &album_dir.join(&name)) {
                    Ok(()) => {
                        logger.file_copied(&name, &album_dir);
                        stats.copied += 1;
                    }
                    Err(e) => {
                        logger.error(&format!("{:#}", e));
                        stats.failed += 1;
                    }
                }
            }
        }
    }

    stats
}

/// Delete every album member (and its sidecar) from the flat pool so only
/// photos without an album are left there.
pub fn prune_flat_pool(downloads_dir: &Path, album_files: &HashSet<String>, logger: &Logger) -> PruneStats {
    let mut stats = PruneStats::default();

    let mut files: Vec<&String> = album_files.iter().collect();
    files.sort();

    for file_name in files {
        for name in [file_name.clone(), sidecar_name(file_name)] {
            let path = downloads_dir.join(&name);
            if !path.exists() {
                logger.file_missing(&name, downloads_dir);
                stats.missing += 1;
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    logger.file_removed(&name, downloads_dir);
                    stats.removed += 1;
                }
                Err(e) => {
                    logger.error(&format!("Failed to remove {}: {}", path.display(), e));
                    stats.failed += 1;
                }
            }
        }
    }

    stats
}
