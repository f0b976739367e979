use std::path::PathBuf;

const APP_DIR: &str = "microradio";

pub fn data_dir() -> PathBuf {
    // ~/.local/share/microradio/ (XDG standard)
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join(APP_DIR)
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(APP_DIR)
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Path of the IPC socket for the mpv instance backing the open stream.
pub fn mpv_socket_path() -> PathBuf {
    temp_dir().join(format!("{}-mpv.sock", APP_DIR))
}

pub fn mpv_binary_name() -> &'static str {
    "mpv"
}

/// Find the mpv binary: beside the current exe first, then on PATH.
pub fn find_mpv_binary() -> Option<PathBuf> {
    let exe_name = mpv_binary_name();

    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let local_mpv = dir.join(exe_name);
            if local_mpv.exists() {
                return Some(local_mpv);
            }
        }
    }

    let path = std::env::var("PATH").ok()?;
    path.split(':')
        .map(|dir| PathBuf::from(dir).join(exe_name))
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_are_app_scoped() {
        assert!(data_dir().ends_with("share/microradio"));
        assert!(config_dir().ends_with(".config/microradio"));
        assert!(mpv_socket_path()
            .to_string_lossy()
            .ends_with("microradio-mpv.sock"));
    }
}
