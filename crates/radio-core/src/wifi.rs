//! Plaintext WiFi credentials, `ssid` and `pass` on their own lines.
//!
//! Anyone able to read this file is already on the same network, so it is
//! not protected.

use std::path::Path;

use tracing::{info, warn};

use crate::catalog::{write_replacing, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WifiCredentials {
    pub ssid: String,
    pub pass: String,
}

pub fn save(path: &Path, credentials: &WifiCredentials) -> Result<(), StoreError> {
    info!("saving wifi credentials for {:?}", credentials.ssid);
    let content = format!("{}\n{}\n", credentials.ssid, credentials.pass);
    write_replacing(path, content.as_bytes())
}

/// `None` when no credentials have been stored yet.
pub fn load(path: &Path) -> Result<Option<WifiCredentials>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("no wifi credentials yet, waiting for them on the setup page");
            return Ok(None);
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut lines = content.split('\n');
    let ssid = lines.next().unwrap_or_default().to_string();
    let pass = lines.next().unwrap_or_default().to_string();
    Ok(Some(WifiCredentials { ssid, pass }))
}
