//! Pointer and keyboard input as delivered by the host.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on Linux/Windows, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerInput {
    pub position: Point,
    #[serde(default)]
    pub button: MouseButton,
    /// Raw movement since the previous pointer event, in screen pixels.
    #[serde(default)]
    pub movement: Vec2,
}

impl PointerInput {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_movement(mut self, dx: f64, dy: f64) -> Self {
        self.movement = Vec2::new(dx, dy);
        self
    }
}

/// A key press.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    /// Key name as reported by the platform ("Backspace", "z", "A", ...).
    pub key: String,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Whether keyboard focus is inside a text field.
    #[serde(default)]
    pub in_text_input: bool,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_command(mut self) -> Self {
        self.modifiers.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }

    pub fn in_text_input(mut self) -> Self {
        self.in_text_input = true;
        self
    }

    /// Resolve the key press to a canvas command. Keys typed into text fields
    /// never resolve.
    pub fn command(&self) -> Option<Command> {
        if self.in_text_input {
            return None;
        }
        if self.key == "Backspace" {
            return Some(Command::DeleteSelection);
        }
        if !self.modifiers.command() {
            return None;
        }
        match self.key.to_ascii_lowercase().as_str() {
            "z" if self.modifiers.shift => Some(Command::Redo),
            "z" => Some(Command::Undo),
            "a" => Some(Command::SelectAll),
            "s" => Some(Command::Export),
            "o" => Some(Command::Import),
            _ => None,
        }
    }
}

/// Keyboard-triggered canvas commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    DeleteSelection,
    Undo,
    Redo,
    SelectAll,
    Export,
    Import,
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub command_key: bool,
    pub shift: bool,
    pub command: Command,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(
        key: &'static str,
        command_key: bool,
        shift: bool,
        command: Command,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            command_key,
            shift,
            command,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl/Cmd+S").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.command_key {
            parts.push("Ctrl/Cmd");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key);
        parts.join("+")
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("Backspace", false, false, Command::DeleteSelection, "Delete selected layers"),
            Shortcut::new("Z", true, false, Command::Undo, "Undo"),
            Shortcut::new("Z", true, true, Command::Redo, "Redo"),
            Shortcut::new("A", true, false, Command::SelectAll, "Select all layers"),
            Shortcut::new("S", true, false, Command::Export, "Export diagram as JSON"),
            Shortcut::new("O", true, false, Command::Import, "Import diagram from JSON"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_resolution() {
        assert_eq!(KeyInput::new("Backspace").command(), Some(Command::DeleteSelection));
        assert_eq!(KeyInput::new("z").with_command().command(), Some(Command::Undo));
        assert_eq!(KeyInput::new("Z").with_command().with_shift().command(), Some(Command::Redo));
        assert_eq!(KeyInput::new("a").with_command().command(), Some(Command::SelectAll));
        assert_eq!(KeyInput::new("s").with_command().command(), Some(Command::Export));
        assert_eq!(KeyInput::new("o").with_command().command(), Some(Command::Import));
        assert_eq!(KeyInput::new("a").command(), None);
        assert_eq!(KeyInput::new("q").with_command().command(), None);
    }

    #[test]
    fn test_meta_counts_as_command() {
        let mut key = KeyInput::new("z");
        key.modifiers.meta = true;
        assert_eq!(key.command(), Some(Command::Undo));
    }

    #[test]
    fn test_text_input_suppresses_everything() {
        assert_eq!(KeyInput::new("Backspace").in_text_input().command(), None);
        assert_eq!(KeyInput::new("z").with_command().in_text_input().command(), None);
    }

    #[test]
    fn test_registry_matches_resolution() {
        for shortcut in ShortcutRegistry::all() {
            let mut key = KeyInput::new(shortcut.key);
            key.modifiers.ctrl = shortcut.command_key;
            key.modifiers.shift = shortcut.shift;
            assert_eq!(key.command(), Some(shortcut.command), "{}", shortcut.format());
        }
    }
}
