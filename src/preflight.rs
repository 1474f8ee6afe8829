use anyhow::Context;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Locate `name` the way a shell would: an explicit path is taken as-is,
/// a bare name is searched for in every `PATH` entry.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    find_in(name, &path_var)
}

fn find_in(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    std::env::split_paths(path_var)
        .flat_map(|dir| executable_names(name).into_iter().map(move |n| dir.join(n)))
        .find(|p| is_executable(p))
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
    let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.CMD;.BAT".to_string());
    std::iter::once(name.to_string())
        .chain(exts.split(';').filter(|e| !e.is_empty()).map(|e| format!("{}{}", name, e)))
        .collect()
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Both external tools must be installed before anything runs.
pub fn check_tools(config: &Config, locate: fn(&str) -> Option<PathBuf>) -> anyhow::Result<()> {
    for tool in [&config.downloader, &config.uploader] {
        if locate(tool).is_none() {
            anyhow::bail!("{} is not installed or not found in PATH", tool);
        }
    }
    Ok(())
}

/// Create `<base>`, `<base>/downloads` and `<base>/albums` if missing.
pub fn prepare_layout(config: &Config) -> anyhow::Result<()> {
    for dir in [config.base_dir.clone(), config.downloads_dir(), config.albums_dir()] {
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[cfg(unix)]
    fn make_tool(dir: &Path, name: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_find_in_path_entries() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let tool = make_tool(second.path(), "icloudpd", 0o755);
        let path_var = std::env::join_paths([first.path(), second.path()]).unwrap();

        assert_eq!(find_in("icloudpd", &path_var), Some(tool));
        assert_eq!(find_in("immich-go", &path_var), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        make_tool(dir.path(), "icloudpd", 0o644);
        let path_var = std::env::join_paths([dir.path()]).unwrap();
        assert_eq!(find_in("icloudpd", &path_var), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = make_tool(dir.path(), "immich-go", 0o755);
        let name = tool.to_string_lossy().into_owned();
        assert_eq!(find_in(&name, OsStr::new("")), Some(tool));
        assert_eq!(find_in(&dir.path().join("missing").to_string_lossy(), OsStr::new("")), None);
    }

    #[test]
    fn test_check_tools_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.downloader = "no-such-downloader-5c1e".to_string();
        let err = check_tools(&config, find_executable).unwrap_err();
        assert!(err.to_string().contains("no-such-downloader-5c1e"));
    }

    #[test]
    fn test_prepare_layout_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir.path().join("nested").join("base"));
        prepare_layout(&config).unwrap();
        prepare_layout(&config).unwrap();
        assert!(config.downloads_dir().is_dir());
        assert!(config.albums_dir().is_dir());
    }
}
