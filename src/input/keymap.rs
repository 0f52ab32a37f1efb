//! Terminal key names to device buttons
//!
//! Lowercase letters and plain navigation keys produce short presses;
//! uppercase letters and shifted arrows produce long presses.

use crate::types::InputKey;

/// Mouse wheel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Map a terminal key name to a button and whether it is a long press
///
/// Names are matched case-sensitively for single letters and
/// case-insensitively for named keys (`enter`, `shift+up`, ...).
pub fn map_key(name: &str) -> Option<(InputKey, bool)> {
    let mapped = match name {
        "w" => (InputKey::Up, false),
        "a" => (InputKey::Left, false),
        "s" => (InputKey::Down, false),
        "d" => (InputKey::Right, false),
        "o" | " " => (InputKey::Ok, false),
        "b" => (InputKey::Back, false),
        "W" => (InputKey::Up, true),
        "A" => (InputKey::Left, true),
        "S" => (InputKey::Down, true),
        "D" => (InputKey::Right, true),
        "O" => (InputKey::Ok, true),
        "B" => (InputKey::Back, true),
        _ => return map_named(&name.to_ascii_lowercase()),
    };
    Some(mapped)
}

fn map_named(name: &str) -> Option<(InputKey, bool)> {
    let mapped = match name {
        "up" => (InputKey::Up, false),
        "left" => (InputKey::Left, false),
        "down" => (InputKey::Down, false),
        "right" => (InputKey::Right, false),
        "enter" | "space" => (InputKey::Ok, false),
        "backspace" | "esc" => (InputKey::Back, false),
        "shift+up" => (InputKey::Up, true),
        "shift+left" => (InputKey::Left, true),
        "shift+down" => (InputKey::Down, true),
        "shift+right" => (InputKey::Right, true),
        _ => return None,
    };
    Some(mapped)
}

/// Wheel movement maps to short Up/Down presses
pub fn map_scroll(direction: ScrollDirection) -> (InputKey, bool) {
    match direction {
        ScrollDirection::Up => (InputKey::Up, false),
        ScrollDirection::Down => (InputKey::Down, false),
    }
}
