//! Linux sysfs GPIO input.
//!
//! Pins are exported under `<root>/export` and read from
//! `<root>/gpio<N>/value`.  sysfs cannot enable pull-ups; the board's device
//! tree or external resistors have to provide them.

use std::path::{Path, PathBuf};

use radio_core::input::{DigitalInput, InputError, Level};
use tracing::{debug, info, warn};

pub struct SysfsGpio {
    root: PathBuf,
    /// Pins whose last read failed, so the failure is only logged once.
    failing: Vec<u32>,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            failing: Vec::new(),
        }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }
}

fn write_attr(path: &Path, value: &str, pin: u32) -> Result<(), InputError> {
    std::fs::write(path, value).map_err(|source| InputError::Io { pin, source })
}

impl DigitalInput for SysfsGpio {
    fn configure_pull_up(&mut self, pin: u32) -> Result<(), InputError> {
        let dir = self.pin_dir(pin);
        if !dir.exists() {
            write_attr(&self.root.join("export"), &pin.to_string(), pin)?;
        }
        write_attr(&dir.join("direction"), "in", pin)?;
        info!(
            "gpio{} configured as input; pull-up must come from board config",
            pin
        );
        Ok(())
    }

    /// Unreadable pins report `High` (released) so they never fire.
    fn read(&mut self, pin: u32) -> Level {
        match std::fs::read(self.pin_dir(pin).join("value")) {
            Ok(bytes) => {
                if let Some(idx) = self.failing.iter().position(|p| *p == pin) {
                    self.failing.swap_remove(idx);
                    debug!("gpio{} readable again", pin);
                }
                match bytes.first() {
                    Some(b'0') => Level::Low,
                    _ => Level::High,
                }
            }
            Err(e) => {
                if !self.failing.contains(&pin) {
                    warn!("gpio{} unreadable: {}", pin, e);
                    self.failing.push(pin);
                }
                Level::High
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_and_read() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("gpio17")).unwrap();

        let mut gpio = SysfsGpio::new(root.path());
        gpio.configure_pull_up(17).unwrap();
        assert_eq!(
            std::fs::read_to_string(root.path().join("gpio17/direction")).unwrap(),
            "in"
        );

        std::fs::write(root.path().join("gpio17/value"), "1\n").unwrap();
        assert_eq!(gpio.read(17), Level::High);
        std::fs::write(root.path().join("gpio17/value"), "0\n").unwrap();
        assert_eq!(gpio.read(17), Level::Low);
    }

    #[test]
    fn test_unexported_pin_is_exported() {
        let root = tempfile::tempdir().unwrap();
        let mut gpio = SysfsGpio::new(root.path());
        // No kernel behind the temp dir, so the export does not create the
        // pin directory and setting the direction fails.
        assert!(gpio.configure_pull_up(5).is_err());
        assert_eq!(
            std::fs::read_to_string(root.path().join("export")).unwrap(),
            "5"
        );
    }

    #[test]
    fn test_missing_pin_reads_released() {
        let root = tempfile::tempdir().unwrap();
        let mut gpio = SysfsGpio::new(root.path());
        assert_eq!(gpio.read(9), Level::High);
        assert_eq!(gpio.read(9), Level::High);
    }
}
