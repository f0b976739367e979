//! Current station and volume, their persistence, and the audio engine
//! lifecycle.
//!
//! The session is the single owner of the open engine instance.  Every
//! station change closes the previous stream before opening the next, so at
//! most one stream is ever open.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::catalog::{write_replacing, StationCatalog, StoreError};
use crate::clock::Clock;
use crate::engine::AudioEngine;
use crate::protocol::{Intent, SessionSnapshot, StationInfo};
use crate::throttle::StatusThrottle;

pub const DEFAULT_VOLUME: u8 = 100;
pub const MAX_VOLUME: u8 = 100;
pub const VOLUME_STEP: u8 = 10;

/// What survives a power cycle.  Stored as two lines: volume, then station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub volume: u8,
    pub current_station: usize,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            current_station: 0,
        }
    }
}

/// Clamp to the volume range and round to the nearest step.
fn snap_volume(volume: u8) -> u8 {
    let volume = volume.min(MAX_VOLUME);
    ((volume + VOLUME_STEP / 2) / VOLUME_STEP * VOLUME_STEP).min(MAX_VOLUME)
}

impl SessionStatus {
    pub fn encode(&self) -> String {
        format!("{}\n{}", self.volume, self.current_station)
    }

    /// Unreadable fields fall back to their defaults.
    pub fn parse(content: &str) -> Self {
        let defaults = Self::default();
        let mut lines = content.lines().map(str::trim);

        let volume = match lines.next().map(str::parse::<u8>) {
            Some(Ok(v)) => snap_volume(v),
            _ => {
                warn!("status file has no usable volume, using {}", defaults.volume);
                defaults.volume
            }
        };
        let current_station = match lines.next().map(str::parse::<usize>) {
            Some(Ok(id)) => id,
            _ => {
                warn!("status file has no usable station id, using 0");
                defaults.current_station
            }
        };

        Self {
            volume,
            current_station,
        }
    }
}

/// Persistence behind the session's `(volume, station)` pair.
pub trait StatusStore {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<SessionStatus>, StoreError>;

    fn save(&mut self, status: &SessionStatus) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct FileStatusStore {
    path: PathBuf,
}

impl FileStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusStore for FileStatusStore {
    fn load(&self) -> Result<Option<SessionStatus>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(SessionStatus::parse(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn save(&mut self, status: &SessionStatus) -> Result<(), StoreError> {
        write_replacing(&self.path, status.encode().as_bytes())
    }
}

/// Clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    content: Arc<Mutex<Option<String>>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Arc::new(Mutex::new(Some(content.into()))),
        }
    }

    pub fn content(&self) -> Option<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.content.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StatusStore for MemoryStatusStore {
    fn load(&self) -> Result<Option<SessionStatus>, StoreError> {
        Ok(self.lock().as_deref().map(SessionStatus::parse))
    }

    fn save(&mut self, status: &SessionStatus) -> Result<(), StoreError> {
        *self.lock() = Some(status.encode());
        Ok(())
    }
}

pub struct PlaybackSession {
    catalog: StationCatalog,
    engine: Box<dyn AudioEngine>,
    status_store: Box<dyn StatusStore>,
    throttle: StatusThrottle,
    current_station: usize,
    volume: u8,
    playing: bool,
}

impl PlaybackSession {
    pub fn new(
        catalog: StationCatalog,
        engine: Box<dyn AudioEngine>,
        status_store: Box<dyn StatusStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            engine,
            status_store,
            throttle: StatusThrottle::new(clock),
            current_station: 0,
            volume: DEFAULT_VOLUME,
            playing: false,
        }
    }

    /// Restore the persisted volume and station, then start playing.
    pub fn start(&mut self) {
        let status = match self.status_store.load() {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!("no status file, using defaults");
                SessionStatus::default()
            }
            Err(e) => {
                error!("failed to read status: {}", e);
                SessionStatus::default()
            }
        };
        info!(
            volume = status.volume,
            station = status.current_station,
            "restoring session"
        );
        self.volume = status.volume;
        self.current_station = status.current_station;

        if self.catalog.is_empty() {
            warn!("station catalog is empty, nothing to play");
            self.revalidate();
            return;
        }
        if self.current_station >= self.catalog.len() {
            warn!(
                "saved station {} no longer exists, starting from 0",
                self.current_station
            );
            self.current_station = 0;
        }
        self.set_station(self.current_station);
    }

    /// Switch to station `id`.  Returns `false` and changes nothing when `id`
    /// is out of range.  A stream that fails to open leaves the session
    /// stopped on `id`.
    pub fn set_station(&mut self, id: usize) -> bool {
        let Some(station) = self.catalog.get(id) else {
            debug!(id, len = self.catalog.len(), "set_station ignored: no such station");
            return false;
        };
        let name = station.name().to_string();
        let url = station.url().to_string();
        info!("setting station {}: {}", id, name);

        self.close_engine();
        self.current_station = id;

        info!("opening {}", url);
        match self.engine.open(&url) {
            Ok(()) => {
                self.playing = true;
                self.engine.set_gain(self.gain());
            }
            Err(e) => {
                error!("{}", e);
                self.engine.close();
                self.playing = false;
            }
        }

        self.persist();
        true
    }

    pub fn next(&mut self) -> bool {
        let len = self.catalog.len();
        if len == 0 {
            return false;
        }
        self.set_station((self.current_station + 1) % len)
    }

    pub fn previous(&mut self) -> bool {
        let len = self.catalog.len();
        if len == 0 {
            return false;
        }
        let prev = if self.current_station == 0 {
            len - 1
        } else {
            (self.current_station - 1).min(len - 1)
        };
        self.set_station(prev)
    }

    pub fn volume_up(&mut self) -> u8 {
        self.set_volume(self.volume.saturating_add(VOLUME_STEP).min(MAX_VOLUME))
    }

    pub fn volume_down(&mut self) -> u8 {
        self.set_volume(self.volume.saturating_sub(VOLUME_STEP))
    }

    fn set_volume(&mut self, volume: u8) -> u8 {
        self.volume = volume;
        debug!(volume, "volume changed");
        if self.playing {
            self.engine.set_gain(self.gain());
        }
        self.persist();
        self.volume
    }

    /// Pump the open stream.  Call once per main-loop iteration.
    pub fn tick(&mut self) {
        if !self.playing {
            return;
        }
        if !self.engine.tick(&mut self.throttle) {
            warn!("stream for station {} ended", self.current_station);
            self.engine.close();
            self.playing = false;
        }
    }

    /// Close the open stream.  Returns whether anything was playing.
    pub fn stop(&mut self) -> bool {
        let was_playing = self.playing;
        if was_playing {
            info!("stopping playback");
        }
        self.close_engine();
        was_playing
    }

    pub fn toggle(&mut self) -> bool {
        if self.playing {
            self.stop()
        } else {
            self.set_station(self.current_station)
        }
    }

    pub fn add_station(&mut self, name: &str, url: &str) -> bool {
        let added = self.catalog.add(name, url);
        self.revalidate();
        added
    }

    /// Delete station `id`.  Out-of-range ids are ignored.  The current id is
    /// kept pointing at the same station where possible and always stays in
    /// range.  Playback is not interrupted.
    pub fn delete_station(&mut self, id: usize) -> bool {
        let before = self.catalog.len();
        let deleted = self.catalog.delete(id);
        if self.catalog.len() < before && id < self.current_station {
            self.current_station -= 1;
            self.persist();
        }
        self.revalidate();
        deleted
    }

    pub fn reload(&mut self) {
        self.catalog.load();
        self.revalidate();
    }

    fn revalidate(&mut self) {
        let len = self.catalog.len();
        let bounded = if len == 0 {
            0
        } else {
            self.current_station.min(len - 1)
        };
        if bounded != self.current_station {
            debug!(
                from = self.current_station,
                to = bounded,
                "current station out of range"
            );
            self.current_station = bounded;
            self.persist();
        }
    }

    /// Apply one intent from a button or the configuration surface.
    pub fn apply(&mut self, intent: Intent) {
        debug!(?intent, "applying intent");
        match intent {
            Intent::Next => {
                self.next();
            }
            Intent::Previous => {
                self.previous();
            }
            Intent::VolumeUp => {
                self.volume_up();
            }
            Intent::VolumeDown => {
                self.volume_down();
            }
            Intent::Toggle => {
                self.toggle();
            }
            Intent::Stop => {
                self.stop();
            }
            Intent::Reload => self.reload(),
            Intent::SetStation { id } => {
                self.set_station(id);
            }
            Intent::AddStation { name, url } => {
                self.add_station(&name, &url);
            }
            Intent::DeleteStation { id } => {
                self.delete_station(id);
            }
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn current_station(&self) -> usize {
        self.current_station
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Name of the current station, empty when the catalog is empty.
    pub fn station_name(&self) -> String {
        self.catalog
            .get(self.current_station)
            .map(|s| s.name().to_string())
            .unwrap_or_default()
    }

    pub fn list(&self) -> String {
        self.catalog.list(Some(self.current_station))
    }

    pub fn catalog(&self) -> &StationCatalog {
        &self.catalog
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stations: self
                .catalog
                .stations()
                .iter()
                .enumerate()
                .map(|(idx, s)| StationInfo {
                    idx,
                    name: s.name().to_string(),
                    url: s.url().to_string(),
                })
                .collect(),
            current_station: self.current_station,
            volume: self.volume,
            is_playing: self.playing,
        }
    }

    fn gain(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }

    fn close_engine(&mut self) {
        if self.playing {
            self.engine.close();
            self.playing = false;
        }
    }

    fn persist(&mut self) {
        let status = SessionStatus {
            volume: self.volume,
            current_station: self.current_station,
        };
        if let Err(e) = self.status_store.save(&status) {
            error!("failed to save status: {}", e);
        }
    }
}
