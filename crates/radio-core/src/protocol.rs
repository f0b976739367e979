use serde::{Deserialize, Serialize};

/// Everything a button or the configuration surface can ask the controller to
/// do.  Buttons and HTTP handlers produce intents; only the poll loop applies
/// them to the [`PlaybackSession`](crate::session::PlaybackSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Intent {
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    /// Stop when playing, otherwise reopen the current station.
    Toggle,
    Stop,
    /// Reparse the station file from disk.
    Reload,
    SetStation { id: usize },
    AddStation { name: String, url: String },
    DeleteStation { id: usize },
}

/// The subset of intents that can be bound to a physical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    Toggle,
    Stop,
    Reload,
}

impl From<ButtonAction> for Intent {
    fn from(action: ButtonAction) -> Self {
        match action {
            ButtonAction::Next => Intent::Next,
            ButtonAction::Previous => Intent::Previous,
            ButtonAction::VolumeUp => Intent::VolumeUp,
            ButtonAction::VolumeDown => Intent::VolumeDown,
            ButtonAction::Toggle => Intent::Toggle,
            ButtonAction::Stop => Intent::Stop,
            ButtonAction::Reload => Intent::Reload,
        }
    }
}

/// Read-only view of the controller handed to the configuration surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub stations: Vec<StationInfo>,
    pub current_station: usize,
    pub volume: u8,
    pub is_playing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationInfo {
    pub idx: usize,
    pub name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_wire_format() {
        let json = serde_json::to_string(&Intent::SetStation { id: 3 }).unwrap();
        assert_eq!(json, r#"{"cmd":"set_station","id":3}"#);

        let decoded: Intent = serde_json::from_str(r#"{"cmd":"volume_up"}"#).unwrap();
        assert_eq!(decoded, Intent::VolumeUp);
    }

    #[test]
    fn test_button_action_maps_to_intent() {
        let action: ButtonAction = serde_json::from_str(r#""volume_down""#).unwrap();
        assert_eq!(Intent::from(action), Intent::VolumeDown);
        assert_eq!(Intent::from(ButtonAction::Toggle), Intent::Toggle);
    }
}
