//! Toggle trigger key identifiers.
//!
//! The OS-level hotkey hook lives outside this crate; it reports presses of
//! one of these keys, and the control surface forwards them as toggle
//! commands. Key names resolve through a static table.

/// Keys supported as the global captioning toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleKey {
    F9,
    F10,
    F11,
    F12,
    ScrollLock,
    Pause,
}

/// Static name → key table. Lowercase names only.
const KEY_TABLE: [(&str, ToggleKey); 6] = [
    ("f9", ToggleKey::F9),
    ("f10", ToggleKey::F10),
    ("f11", ToggleKey::F11),
    ("f12", ToggleKey::F12),
    ("scroll_lock", ToggleKey::ScrollLock),
    ("pause", ToggleKey::Pause),
];

impl ToggleKey {
    /// Resolves a key name (case-insensitive) to a key identifier.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        KEY_TABLE
            .iter()
            .find(|(n, _)| *n == lower)
            .map(|(_, key)| *key)
    }

    /// Canonical lowercase name for this key.
    pub fn name(self) -> &'static str {
        match self {
            ToggleKey::F9 => "f9",
            ToggleKey::F10 => "f10",
            ToggleKey::F11 => "f11",
            ToggleKey::F12 => "f12",
            ToggleKey::ScrollLock => "scroll_lock",
            ToggleKey::Pause => "pause",
        }
    }

    /// All supported key names, for error messages.
    pub fn supported_names() -> Vec<&'static str> {
        KEY_TABLE.iter().map(|(n, _)| *n).collect()
    }
}
