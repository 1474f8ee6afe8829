use std::path::Path;

use crate::album::AlbumMembership;
use crate::config::Config;
use crate::logger::Logger;
use crate::runner::{CommandRunner, Invocation};

/// Line `icloudpd --list-albums` prints before the album names.
pub const ALBUMS_HEADER: &str = "Albums:";

/// Smart folders iCloud generates on its own; they are not real albums.
pub const EXCLUDED_ALBUMS: [&str; 7] = [
    "Time-lapse",
    "Videos",
    "Slo-mo",
    "Bursts",
    "Panoramas",
    "Screenshots",
    "Live",
];

fn base_args(config: &Config) -> Vec<String> {
    vec!["--username".to_string(), config.credentials.username.clone()]
}

/// Let icloudpd establish (or refresh) its session.
///
/// Runs attached to the terminal so icloudpd can ask for a 2FA code. A
/// timeout is only logged: the tool may still be waiting on the user.
pub fn authenticate(runner: &dyn CommandRunner, config: &Config, logger: &Logger) -> anyhow::Result<()> {
    let mut args = base_args(config);
    args.push("--auth-only".to_string());
    let invocation = Invocation::new(&config.downloader, args).timeout(config.timeout);
    logger.debug(&format!("Running: {}", invocation.display()));

    let output = runner.run(&invocation)?;
    if output.timed_out {
        logger.warn(&format!(
            "Authentication timed out after {} seconds, continuing.",
            config.timeout.as_secs()
        ));
        return Ok(());
    }
    if !output.success() {
        anyhow::bail!("Authentication failed ({} exited with {:?})", config.downloader, output.code);
    }
    Ok(())
}

/// Ask icloudpd for the album list and return the user-created albums.
pub fn list_albums(runner: &dyn CommandRunner, config: &Config, logger: &Logger) -> anyhow::Result<Vec<String>> {
    let mut args = base_args(config);
    args.push("--list-albums".to_string());
    let invocation = Invocation::new(&config.downloader, args)
        .timeout(config.timeout)
        .captured();
    logger.debug(&format!("Running: {}", invocation.display()));

    let output = runner.run(&invocation)?;
    if output.timed_out {
        logger.warn(&format!(
            "Album listing timed out after {} seconds, using partial output.",
            config.timeout.as_secs()
        ));
    } else if output.failed() {
        anyhow::bail!("Failed to list albums: {}", output.stderr.trim());
    }

    Ok(parse_album_listing(&output.stdout))
}

/// Extract album names from `--list-albums` output.
///
/// Only lines after the header count. Debug log lines and the generated
/// smart folders in [`EXCLUDED_ALBUMS`] are skipped; names come back trimmed
/// and in listing order.
pub fn parse_album_listing(output: &str) -> Vec<String> {
    let mut albums = Vec::new();
    let mut collecting = false;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == ALBUMS_HEADER {
            collecting = true;
            continue;
        }
        if !collecting || line.starts_with("DEBUG") || EXCLUDED_ALBUMS.contains(&line) {
            continue;
        }
        albums.push(line.to_string());
    }

    albums
}

/// Basenames from `--only-print-filenames` output, one per non-blank line.
pub fn parse_filenames(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| Path::new(line).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Files icloudpd would download for one album, without downloading them.
pub fn album_filenames(runner: &dyn CommandRunner, config: &Config, album: &str) -> anyhow::Result<Vec<String>> {
    let mut args = base_args(config);
    args.extend([
        "--album".to_string(),
        album.to_string(),
        "--only-print-filenames".to_string(),
        "--directory".to_string(),
        config.base_dir.to_string_lossy().into_owned(),
    ]);
    let invocation = Invocation::new(&config.downloader, args)
        .timeout(config.timeout)
        .captured();

    let output = runner.run(&invocation)?;
    if output.timed_out {
        anyhow::bail!("timed out after {} seconds", config.timeout.as_secs());
    }
    if !output.success() {
        anyhow::bail!("{}", output.stderr.trim());
    }
    Ok(parse_filenames(&output.stdout))
}

/// Build the album → files mapping. A failing album is logged and left out
/// of the mapping; it never stops discovery of the others.
pub fn discover_membership(
    runner: &dyn CommandRunner,
    config: &Config,
    logger: &Logger,
    albums: &[String],
) -> AlbumMembership {
    let mut membership = AlbumMembership::new();

    for album in albums {
        logger.progress(&format!("Getting filenames for album '{}'", album));
        match album_filenames(runner, config, album) {
            Ok(files) => {
                logger.album_found(album, files.len());
                membership.insert(album, files);
            }
            Err(e) => {
                logger.warn(&format!("Failed to get filenames for album '{}': {:#}", album, e));
            }
        }
    }

    membership
}

/// Download the whole library, flattened, with XMP sidecars, into the flat pool.
pub fn download_all(runner: &dyn CommandRunner, config: &Config, logger: &Logger) -> anyhow::Result<()> {
    let downloads_dir = config.downloads_dir();
    let mut args = base_args(config);
    args.extend([
        "--directory".to_string(),
        downloads_dir.to_string_lossy().into_owned(),
        "--folder-structure".to_string(),
        "none".to_string(),
        "--xmp-sidecar".to_string(),
    ]);
    let invocation = Invocation::new(&config.downloader, args);
    logger.debug(&format!("Running: {}", invocation.display()));

    let output = runner.run(&invocation)?;
    if !output.success() {
        anyhow::bail!(
            "Failed to download photos ({} exited with {:?})",
            config.downloader,
            output.code
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::runner::fake::FakeRunner;
    use crate::runner::CommandOutput;

    #[test]
    fn test_parse_album_listing() {
        let output = "Albums:\nDEBUG foo\nFamily Trip\nScreenshots\n Summer 2021 \n";
        assert_eq!(parse_album_listing(output), vec!["Family Trip", "Summer 2021"]);
    }

    #[test]
    fn test_parse_ignores_lines_before_header() {
        let output = "2024-05-01 10:00:00 INFO Authenticating...\nAll Photos\n\nAlbums:\n\n  Dogs\nRecently Deleted\n";
        assert_eq!(parse_album_listing(output), vec!["Dogs", "Recently Deleted"]);
    }

    #[test]
    fn test_parse_all_excluded() {
        let mut output = String::from("Albums:\n");
        for name in EXCLUDED_ALBUMS {
            output.push_str(name);
            output.push('\n');
        }
        assert!(parse_album_listing(&output).is_empty());
    }

    #[test]
    fn test_parse_without_header() {
        assert!(parse_album_listing("Family Trip\nSummer 2021\n").is_empty());
        assert!(parse_album_listing("").is_empty());
    }

    #[test]
    fn test_parse_filenames() {
        let output = "/photos/2021/IMG_0001.JPG\n\n  relative/IMG_0002.HEIC  \nIMG_0003.MOV\n";
        assert_eq!(
            parse_filenames(output),
            vec!["IMG_0001.JPG", "IMG_0002.HEIC", "IMG_0003.MOV"]
        );
    }

    #[test]
    fn test_auth_timeout_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = FakeRunner::new(|_| Ok(CommandOutput::timeout("")));
        assert!(authenticate(&runner, &config, &Logger::quiet()).is_ok());
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].has_arg("--auth-only"));
        assert!(!calls[0].capture);
        assert_eq!(calls[0].timeout, Some(config.timeout));
    }

    #[test]
    fn test_auth_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = FakeRunner::new(|_| Ok(CommandOutput::exit(1, "")));
        assert!(authenticate(&runner, &config, &Logger::quiet()).is_err());
    }

    #[test]
    fn test_list_albums_timeout_uses_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = FakeRunner::new(|_| Ok(CommandOutput::timeout("Albums:\nDogs\n")));
        let albums = list_albums(&runner, &config, &Logger::quiet()).unwrap();
        assert_eq!(albums, vec!["Dogs"]);
    }

    #[test]
    fn test_list_albums_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = FakeRunner::new(|_| Ok(CommandOutput::exit(1, "invalid session")));
        let err = list_albums(&runner, &config, &Logger::quiet()).unwrap_err();
        assert!(err.to_string().contains("invalid session"));
    }

    #[test]
    fn test_discovery_skips_failing_album() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = FakeRunner::new(|inv| {
            if inv.has_arg("Broken") {
                Ok(CommandOutput::exit(1, "boom"))
            } else if inv.has_arg("Slow") {
                Ok(CommandOutput::timeout("half.jpg\n"))
            } else {
                Ok(CommandOutput::ok("/x/a.jpg\n/x/b.jpg\n"))
            }
        });
        let albums = vec!["Broken".to_string(), "Slow".to_string(), "Good".to_string()];
        let membership = discover_membership(&runner, &config, &Logger::quiet(), &albums);

        assert_eq!(runner.calls.borrow().len(), 3);
        let found = membership.albums();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Good");
        assert_eq!(found[0].files.len(), 2);
    }

    #[test]
    fn test_failed_album_gets_no_folder() {
        let base = tempfile::tempdir().unwrap();
        let config = test_config(base.path());
        let runner = FakeRunner::new(|_| Ok(CommandOutput::exit(1, "boom")));
        let albums = vec!["Broken".to_string()];
        let membership = discover_membership(&runner, &config, &Logger::quiet(), &albums);
        assert!(membership.is_empty());

        crate::file_utils::materialize_albums(
            &config.downloads_dir(),
            &config.albums_dir(),
            &membership,
            &Logger::quiet(),
        );
        assert!(!config.albums_dir().join("Broken").exists());
    }

    #[test]
    fn test_filename_listing_args() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = FakeRunner::new(|_| Ok(CommandOutput::ok("")));
        album_filenames(&runner, &config, "Family Trip").unwrap();
        let calls = runner.calls.borrow();
        let args = &calls[0].args;
        let album_pos = args.iter().position(|a| a == "--album").unwrap();
        assert_eq!(args[album_pos + 1], "Family Trip");
        assert!(calls[0].has_arg("--only-print-filenames"));
        assert!(calls[0].capture);
    }

    #[test]
    fn test_download_all_args_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = FakeRunner::new(|_| Ok(CommandOutput::exit(2, "")));
        assert!(download_all(&runner, &config, &Logger::quiet()).is_err());

        let calls = runner.calls.borrow();
        assert!(calls[0].has_arg("--xmp-sidecar"));
        assert!(calls[0].has_arg("none"));
        assert!(calls[0].has_arg(&config.downloads_dir().to_string_lossy()));
        assert_eq!(calls[0].timeout, None);
    }
}
