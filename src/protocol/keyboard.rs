//! Keyboard key table for trusted key dispatch.
//!
//! Maps control keys onto the `key`/`code`/`windowsVirtualKeyCode` triple
//! `Input.dispatchKeyEvent` expects. Free text goes through
//! `Input.insertText` instead.

use super::command::{DispatchKeyEventParams, KeyEventType};

// ============================================================================
// Modifiers
// ============================================================================

/// Modifier keys held during a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Alt / Option.
    pub alt: bool,
    /// Control.
    pub ctrl: bool,
    /// Meta / Command.
    pub meta: bool,
    /// Shift.
    pub shift: bool,
}

impl Modifiers {
    /// Returns the protocol bit field (Alt=1, Ctrl=2, Meta=4, Shift=8).
    #[must_use]
    pub fn bits(self) -> u8 {
        u8::from(self.alt)
            | (u8::from(self.ctrl) << 1)
            | (u8::from(self.meta) << 2)
            | (u8::from(self.shift) << 3)
    }
}

// ============================================================================
// Key Enum
// ============================================================================

/// Common keyboard keys for navigation and control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    // ========================================================================
    // Navigation & Control
    // ========================================================================
    /// Enter/Return key
    Enter,
    /// Tab key
    Tab,
    /// Escape key
    Escape,
    /// Backspace key
    Backspace,
    /// Delete key
    Delete,
    /// Space bar
    Space,

    // ========================================================================
    // Arrow Keys
    // ========================================================================
    /// Arrow Up
    ArrowUp,
    /// Arrow Down
    ArrowDown,
    /// Arrow Left
    ArrowLeft,
    /// Arrow Right
    ArrowRight,

    // ========================================================================
    // Page Navigation
    // ========================================================================
    /// Home key
    Home,
    /// End key
    End,
    /// Page Up key
    PageUp,
    /// Page Down key
    PageDown,
}

impl Key {
    /// Returns the key properties: (key, code, keyCode, text).
    #[must_use]
    pub fn properties(self) -> (&'static str, &'static str, u32, Option<&'static str>) {
        match self {
            Key::Enter => ("Enter", "Enter", 13, Some("\r")),
            Key::Tab => ("Tab", "Tab", 9, None),
            Key::Escape => ("Escape", "Escape", 27, None),
            Key::Backspace => ("Backspace", "Backspace", 8, None),
            Key::Delete => ("Delete", "Delete", 46, None),
            Key::Space => (" ", "Space", 32, Some(" ")),
            Key::ArrowUp => ("ArrowUp", "ArrowUp", 38, None),
            Key::ArrowDown => ("ArrowDown", "ArrowDown", 40, None),
            Key::ArrowLeft => ("ArrowLeft", "ArrowLeft", 37, None),
            Key::ArrowRight => ("ArrowRight", "ArrowRight", 39, None),
            Key::Home => ("Home", "Home", 36, None),
            Key::End => ("End", "End", 35, None),
            Key::PageUp => ("PageUp", "PageUp", 33, None),
            Key::PageDown => ("PageDown", "PageDown", 34, None),
        }
    }

    /// Parses a DOM key name such as `"Enter"` or `"ArrowLeft"`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: [Key; 14] = [
            Key::Enter,
            Key::Tab,
            Key::Escape,
            Key::Backspace,
            Key::Delete,
            Key::Space,
            Key::ArrowUp,
            Key::ArrowDown,
            Key::ArrowLeft,
            Key::ArrowRight,
            Key::Home,
            Key::End,
            Key::PageUp,
            Key::PageDown,
        ];
        ALL.into_iter()
            .find(|key| key.properties().1.eq_ignore_ascii_case(name) || key.properties().0 == name)
    }

    /// Builds the press event; printable keys carry their text.
    #[must_use]
    pub fn down_event(self, modifiers: Modifiers) -> DispatchKeyEventParams {
        let (key, code, key_code, text) = self.properties();
        DispatchKeyEventParams {
            event_type: if text.is_some() {
                KeyEventType::KeyDown
            } else {
                KeyEventType::RawKeyDown
            },
            key: Some(key.to_string()),
            code: Some(code.to_string()),
            text: text.map(str::to_string),
            windows_virtual_key_code: Some(key_code),
            modifiers: modifiers.bits(),
        }
    }

    /// Builds the release event.
    #[must_use]
    pub fn up_event(self, modifiers: Modifiers) -> DispatchKeyEventParams {
        let (key, code, key_code, _) = self.properties();
        DispatchKeyEventParams {
            event_type: KeyEventType::KeyUp,
            key: Some(key.to_string()),
            code: Some(code.to_string()),
            text: None,
            windows_virtual_key_code: Some(key_code),
            modifiers: modifiers.bits(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
