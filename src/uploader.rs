use std::path::Path;

use crate::config::Config;
use crate::logger::Logger;
use crate::runner::{CommandRunner, Invocation};

/// How immich-go should assign uploaded photos to albums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumMode {
    /// Leave album assignment alone.
    None,
    /// Each top-level folder becomes an album of the same name.
    FolderAsAlbum,
}

pub fn upload_args(config: &Config, folder: &Path, mode: AlbumMode) -> Vec<String> {
    let creds = &config.credentials;
    let mut args = vec!["upload".to_string(), "from-folder".to_string()];
    if mode == AlbumMode::FolderAsAlbum {
        args.push("--folder-as-album=FOLDER".to_string());
    }
    args.extend([
        format!("--server={}", creds.server_url),
        format!("--api-key={}", creds.api_key),
        format!("--admin-api-key={}", creds.admin_api_key),
        folder.to_string_lossy().into_owned(),
    ]);
    args
}

/// Upload one folder tree to Immich. Blocks until immich-go exits.
pub fn upload_folder(
    runner: &dyn CommandRunner,
    config: &Config,
    logger: &Logger,
    folder: &Path,
    mode: AlbumMode,
) -> anyhow::Result<()> {
    let invocation = Invocation::new(&config.uploader, upload_args(config, folder, mode)).captured();
    logger.debug(&format!("Running: {}", invocation.display()));

    let output = runner.run(&invocation)?;
    if !output.success() {
        anyhow::bail!(
            "Failed to upload from {}: {}",
            folder.display(),
            output.stderr.trim()
        );
    }
    if !output.stdout.trim().is_empty() {
        logger.debug(output.stdout.trim());
    }
    Ok(())
}
