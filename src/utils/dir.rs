use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

const APPLICATION_DIR: &str = "daytally";

fn platform_base_dir() -> Result<PathBuf> {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            env::var("APPDATA")
                .map(PathBuf::from)
                .map_err(|_| anyhow!("APPDATA should be present on Windows"))
        } else if #[cfg(target_os = "macos")] {
            env::var("HOME")
                .map(|home| PathBuf::from(home).join("Library/Application Support"))
                .map_err(|_| anyhow!("Couldn't find HOME"))
        } else {
            env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
                .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))
        }
    }
}

pub fn create_application_default_path() -> Result<PathBuf> {
    let path = platform_base_dir()?.join(APPLICATION_DIR);
    ensure_dir(path)
}

/// Creates the directory if it doesn't exist yet.
pub fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}
