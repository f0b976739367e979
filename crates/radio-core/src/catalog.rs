//! File-backed station catalog.
//!
//! The record file is the single source of truth: every mutation writes to
//! the store and then reparses it, so memory always mirrors what actually got
//! persisted.
//!
//! Record format, one station per line, no header and no escaping:
//!
//! ```text
//! <name>\t<url>\n
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

const FIELD_SEP: char = '\t';
const RECORD_SEP: char = '\n';

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One catalog entry.  Identity is its position in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    name: String,
    url: String,
}

impl Station {
    /// Separator characters are stripped from both fields.
    pub fn new(name: impl AsRef<str>, url: impl AsRef<str>) -> Self {
        Self {
            name: strip_separators(name.as_ref()),
            url: strip_separators(url.as_ref()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn encode(&self) -> String {
        format!(
            "{}{}{}{}",
            strip_separators(&self.name),
            FIELD_SEP,
            strip_separators(&self.url),
            RECORD_SEP
        )
    }
}

fn strip_separators(s: &str) -> String {
    s.chars()
        .filter(|c| *c != FIELD_SEP && *c != RECORD_SEP)
        .collect()
}

/// The target network stack cannot do TLS, so secure stream URLs are
/// stored with the plain-HTTP scheme.
pub fn downgrade_scheme(url: &str) -> String {
    let trimmed = url.trim();
    match trimmed.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case("https://") => {
            format!("http://{}", &trimmed[8..])
        }
        _ => trimmed.to_string(),
    }
}

/// Character scan of the record file.
///
/// A tab ends the name field, a newline ends the record.  A line without a
/// tab keeps the previous record's name, and trailing text without a final
/// newline is not a record.
pub fn parse_records(content: &str) -> Vec<Station> {
    let mut stations = Vec::new();
    let mut buf = String::new();
    let mut name = String::new();

    for c in content.chars() {
        match c {
            FIELD_SEP => {
                name = std::mem::take(&mut buf);
            }
            RECORD_SEP => {
                stations.push(Station {
                    name: name.clone(),
                    url: std::mem::take(&mut buf),
                });
            }
            _ => buf.push(c),
        }
    }

    stations
}

pub fn encode_records(stations: &[Station]) -> String {
    stations.iter().map(Station::encode).collect()
}

/// Persistence behind a [`StationCatalog`].
pub trait StationStore {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<Vec<Station>>, StoreError>;

    fn append_record(&mut self, station: &Station) -> Result<(), StoreError>;

    fn rewrite_all(&mut self, stations: &[Station]) -> Result<(), StoreError>;
}

/// Station records in a flat text file.
#[derive(Debug, Clone)]
pub struct FileStationStore {
    path: PathBuf,
}

impl FileStationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StationStore for FileStationStore {
    fn load(&self) -> Result<Option<Vec<Station>>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(parse_records(&String::from_utf8_lossy(&bytes)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn append_record(&mut self, station: &Station) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(station.encode().as_bytes())
            .map_err(|e| StoreError::io(&self.path, e))
    }

    fn rewrite_all(&mut self, stations: &[Station]) -> Result<(), StoreError> {
        write_replacing(&self.path, encode_records(stations).as_bytes())
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`, so a
/// reader sees either the old or the new content.
pub(crate) fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// In-memory stand-in for [`FileStationStore`].  Holds the same text format,
/// so it parses exactly like the file does.  Clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryStationStore {
    content: Arc<Mutex<Option<String>>>,
}

impl MemoryStationStore {
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

    pub fn replace(&self, content: impl Into<String>) {
        *self.lock() = Some(content.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.content.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StationStore for MemoryStationStore {
    fn load(&self) -> Result<Option<Vec<Station>>, StoreError> {
        Ok(self.lock().as_deref().map(parse_records))
    }

    fn append_record(&mut self, station: &Station) -> Result<(), StoreError> {
        self.lock()
            .get_or_insert_with(String::new)
            .push_str(&station.encode());
        Ok(())
    }

    fn rewrite_all(&mut self, stations: &[Station]) -> Result<(), StoreError> {
        *self.lock() = Some(encode_records(stations));
        Ok(())
    }
}

/// Ordered station list mirrored from a [`StationStore`].
pub struct StationCatalog {
    store: Box<dyn StationStore>,
    stations: Vec<Station>,
}

impl StationCatalog {
    /// Builds the catalog and loads it from the store.
    pub fn new(store: Box<dyn StationStore>) -> Self {
        let mut catalog = Self {
            store,
            stations: Vec::new(),
        };
        catalog.load();
        catalog
    }

    /// Drop the in-memory list and reparse the store.
    pub fn load(&mut self) {
        self.stations.clear();
        match self.store.load() {
            Ok(Some(stations)) => {
                for (id, s) in stations.iter().enumerate() {
                    debug!("station {}. {}; {}", id, s.name, s.url);
                }
                info!("loaded {} stations", stations.len());
                self.stations = stations;
            }
            Ok(None) => warn!("no station file, starting with an empty catalog"),
            Err(e) => error!("failed to read stations: {}", e),
        }
    }

    /// Append a station.  Returns `false` if it could not be persisted.
    pub fn add(&mut self, name: &str, url: &str) -> bool {
        let station = Station::new(name.trim(), downgrade_scheme(url));
        info!("adding station: {}; {}", station.name, station.url);

        let result = self.store.append_record(&station);
        self.load();
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("failed to append station: {}", e);
                false
            }
        }
    }

    /// Remove the station at `id`.  Out-of-range ids are ignored.
    pub fn delete(&mut self, id: usize) -> bool {
        if id >= self.stations.len() {
            debug!(id, len = self.stations.len(), "delete ignored: no such station");
            return false;
        }

        let removed = self.stations.remove(id);
        info!("deleting station {}: {}", id, removed.name);

        let result = self.store.rewrite_all(&self.stations);
        self.load();
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("failed to rewrite stations: {}", e);
                false
            }
        }
    }

    /// Human-readable listing with the selected entry marked `*`.
    pub fn list(&self, selected: Option<usize>) -> String {
        self.stations
            .iter()
            .enumerate()
            .map(|(id, s)| {
                let mark = if Some(id) == selected { '*' } else { ' ' };
                format!("{} {}. {}\n", mark, id, s.name)
            })
            .collect()
    }

    pub fn get(&self, id: usize) -> Option<&Station> {
        self.stations.get(id)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(content: &str) -> StationCatalog {
        StationCatalog::new(Box::new(MemoryStationStore::with_content(content)))
    }

    #[test]
    fn test_parse_records() {
        let stations = parse_records("One\thttp://a\nTwo\thttp://b\n");
        assert_eq!(
            stations,
            vec![Station::new("One", "http://a"), Station::new("Two", "http://b")]
        );
    }

    #[test]
    fn test_parse_drops_unterminated_tail() {
        let stations = parse_records("One\thttp://a\nTwo\thttp://b");
        assert_eq!(stations.len(), 1);
    }

    #[test]
    fn test_parse_line_without_tab_keeps_previous_name() {
        let stations = parse_records("One\thttp://a\nhttp://orphan\n");
        assert_eq!(stations[1].name(), "One");
        assert_eq!(stations[1].url(), "http://orphan");
    }

    #[test]
    fn test_station_strips_separators() {
        let s = Station::new("Jazz\tFM\n", "http://x\t/y\n");
        assert_eq!(s.name(), "JazzFM");
        assert_eq!(s.url(), "http://x/y");
    }

    #[test]
    fn test_downgrade_scheme() {
        assert_eq!(downgrade_scheme("https://ice.example/a"), "http://ice.example/a");
        assert_eq!(downgrade_scheme("HTTPS://ice.example/a"), "http://ice.example/a");
        assert_eq!(downgrade_scheme("http://ice.example/a"), "http://ice.example/a");
        assert_eq!(downgrade_scheme("  http://x  "), "http://x");
    }

    #[test]
    fn test_missing_store_is_empty() {
        let c = StationCatalog::new(Box::new(MemoryStationStore::new()));
        assert!(c.is_empty());
    }

    #[test]
    fn test_add_appends_and_reloads() {
        let mut c = catalog("One\thttp://a\n");
        assert!(c.add("A", "http://x"));
        assert_eq!(c.len(), 2);
        assert_eq!(c.stations().last(), Some(&Station::new("A", "http://x")));
    }

    #[test]
    fn test_add_rewrites_https() {
        let mut c = catalog("");
        c.add("Secure", "https://stream.example/live");
        assert_eq!(c.get(0).unwrap().url(), "http://stream.example/live");
    }

    #[test]
    fn test_add_sanitizes_separators() {
        let mut c = catalog("");
        c.add("Bad\tName", "http://x\ny");
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(0), Some(&Station::new("BadName", "http://xy")));
    }

    #[test]
    fn test_delete_keeps_relative_order() {
        let mut c = catalog("A\thttp://a\nB\thttp://b\nC\thttp://c\nD\thttp://d\n");
        assert!(c.delete(1));
        c.load();
        let names: Vec<_> = c.stations().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["A", "C", "D"]);
    }

    #[test]
    fn test_delete_out_of_range_is_noop() {
        let mut c = catalog("A\thttp://a\n");
        assert!(!c.delete(1));
        assert!(!c.delete(usize::MAX));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_list_marks_selection() {
        let c = catalog("A\thttp://a\nB\thttp://b\n");
        assert_eq!(c.list(Some(1)), "  0. A\n* 1. B\n");
        assert_eq!(c.list(None), "  0. A\n  1. B\n");
    }

    struct FailingStore;

    impl StationStore for FailingStore {
        fn load(&self) -> Result<Option<Vec<Station>>, StoreError> {
            Ok(Some(vec![Station::new("Kept", "http://k")]))
        }

        fn append_record(&mut self, _station: &Station) -> Result<(), StoreError> {
            Err(StoreError::io(
                Path::new("/ro/stations"),
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ))
        }

        fn rewrite_all(&mut self, _stations: &[Station]) -> Result<(), StoreError> {
            Err(StoreError::io(
                Path::new("/ro/stations"),
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ))
        }
    }

    #[test]
    fn test_failed_write_leaves_memory_matching_store() {
        let mut c = StationCatalog::new(Box::new(FailingStore));
        assert!(!c.add("New", "http://n"));
        assert_eq!(c.stations(), &[Station::new("Kept", "http://k")]);
        assert!(!c.delete(0));
        assert_eq!(c.len(), 1);
    }
}
