//! Keyboard handling
//!
//! Keys are encoded to the bytes an xterm would send. The prefix key
//! starts a two-key binding that is handled by the client instead of
//! being forwarded to the pane.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Bytes for the active pane
    Send(Vec<u8>),
    /// Command to run on the server
    Command(Vec<String>),
    Detach,
    None,
}

#[derive(Debug, Default)]
pub struct InputState {
    prefix_pending: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix_pending(&self) -> bool {
        self.prefix_pending
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.kind == KeyEventKind::Release {
            return KeyAction::None;
        }
        if self.prefix_pending {
            self.prefix_pending = false;
            return prefix_binding(key);
        }
        if is_prefix(&key) {
            self.prefix_pending = true;
            return KeyAction::None;
        }
        match encode_key(&key) {
            Some(bytes) => KeyAction::Send(bytes),
            None => KeyAction::None,
        }
    }
}

/// `C-b`
fn is_prefix(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('b') && key.modifiers == KeyModifiers::CONTROL
}

fn command(argv: &[&str]) -> KeyAction {
    KeyAction::Command(argv.iter().map(|s| s.to_string()).collect())
}

/// Second key of a prefix binding
fn prefix_binding(key: KeyEvent) -> KeyAction {
    if is_prefix(&key) {
        return KeyAction::Send(vec![0x02]);
    }
    match key.code {
        KeyCode::Char('d') => KeyAction::Detach,
        KeyCode::Char('c') => command(&["new-window"]),
        KeyCode::Char('%') => command(&["split-window", "-h"]),
        KeyCode::Char('"') => command(&["split-window", "-v"]),
        KeyCode::Char('n') => command(&["select-window", "-n"]),
        KeyCode::Char('p') => command(&["select-window", "-p"]),
        KeyCode::Char('x') => command(&["kill-pane"]),
        KeyCode::Left => command(&["select-pane", "-L"]),
        KeyCode::Right => command(&["select-pane", "-R"]),
        KeyCode::Up => command(&["select-pane", "-U"]),
        KeyCode::Down => command(&["select-pane", "-D"]),
        _ => KeyAction::None,
    }
}

/// xterm modifier parameter: 1 + shift + 2*alt + 4*ctrl
fn modifier_param(mods: KeyModifiers) -> u8 {
    let mut param = 1;
    if mods.contains(KeyModifiers::SHIFT) {
        param += 1;
    }
    if mods.contains(KeyModifiers::ALT) {
        param += 2;
    }
    if mods.contains(KeyModifiers::CONTROL) {
        param += 4;
    }
    param
}

/// `CSI 1 ; m <final>` with modifiers, `CSI <final>` without
fn csi_letter(letter: char, mods: KeyModifiers) -> Vec<u8> {
    let param = modifier_param(mods);
    if param == 1 {
        format!("\x1b[{}", letter).into_bytes()
    } else {
        format!("\x1b[1;{}{}", param, letter).into_bytes()
    }
}

/// `CSI n ~` with optional modifier parameter
fn csi_tilde(n: u8, mods: KeyModifiers) -> Vec<u8> {
    let param = modifier_param(mods);
    if param == 1 {
        format!("\x1b[{}~", n).into_bytes()
    } else {
        format!("\x1b[{};{}~", n, param).into_bytes()
    }
}

/// Encode a key press as terminal input bytes
pub fn encode_key(key: &KeyEvent) -> Option<Vec<u8>> {
    let mods = key.modifiers;
    let alt = mods.contains(KeyModifiers::ALT);

    let mut bytes = match key.code {
        KeyCode::Char(c) if mods.contains(KeyModifiers::CONTROL) => {
            let byte = match c {
                'a'..='z' => c as u8 - b'a' + 1,
                'A'..='Z' => c as u8 - b'A' + 1,
                '@' | ' ' | '2' => 0x00,
                '[' | '3' => 0x1b,
                '\\' | '4' => 0x1c,
                ']' | '5' => 0x1d,
                '^' | '6' => 0x1e,
                '_' | '7' | '/' => 0x1f,
                '8' | '?' => 0x7f,
                _ => return None,
            };
            vec![byte]
        }
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            c.encode_utf8(&mut buf).as_bytes().to_vec()
        }
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => return Some(csi_letter('A', mods)),
        KeyCode::Down => return Some(csi_letter('B', mods)),
        KeyCode::Right => return Some(csi_letter('C', mods)),
        KeyCode::Left => return Some(csi_letter('D', mods)),
        KeyCode::Home => return Some(csi_letter('H', mods)),
        KeyCode::End => return Some(csi_letter('F', mods)),
        KeyCode::Insert => return Some(csi_tilde(2, mods)),
        KeyCode::Delete => return Some(csi_tilde(3, mods)),
        KeyCode::PageUp => return Some(csi_tilde(5, mods)),
        KeyCode::PageDown => return Some(csi_tilde(6, mods)),
        KeyCode::F(n @ 1..=4) => {
            let letter = (b'P' + n - 1) as char;
            let param = modifier_param(mods);
            return Some(if param == 1 {
                format!("\x1bO{}", letter).into_bytes()
            } else {
                format!("\x1b[1;{}{}", param, letter).into_bytes()
            });
        }
        KeyCode::F(n @ 5..=12) => {
            let code = match n {
                5 => 15,
                6 => 17,
                7 => 18,
                8 => 19,
                9 => 20,
                10 => 21,
                11 => 23,
                _ => 24,
            };
            return Some(csi_tilde(code, mods));
        }
        _ => return None,
    };

    if alt {
        bytes.insert(0, 0x1b);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    // ==================== Encoding Tests ====================

    #[test]
    fn test_plain_chars() {
        assert_eq!(encode_key(&key(KeyCode::Char('a'))), Some(b"a".to_vec()));
        assert_eq!(
            encode_key(&key(KeyCode::Char('é'))),
            Some("é".as_bytes().to_vec())
        );
    }

    #[test]
    fn test_control_chars() {
        assert_eq!(encode_key(&ctrl('c')), Some(vec![0x03]));
        assert_eq!(encode_key(&ctrl('[')), Some(vec![0x1b]));
        assert_eq!(encode_key(&ctrl(' ')), Some(vec![0x00]));
    }

    #[test]
    fn test_alt_prefixes_escape() {
        let k = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(encode_key(&k), Some(b"\x1bx".to_vec()));
    }

    #[test]
    fn test_editing_keys() {
        assert_eq!(encode_key(&key(KeyCode::Enter)), Some(b"\r".to_vec()));
        assert_eq!(encode_key(&key(KeyCode::Backspace)), Some(vec![0x7f]));
        assert_eq!(encode_key(&key(KeyCode::BackTab)), Some(b"\x1b[Z".to_vec()));
        assert_eq!(encode_key(&key(KeyCode::Delete)), Some(b"\x1b[3~".to_vec()));
    }

    #[test]
    fn test_cursor_keys() {
        assert_eq!(encode_key(&key(KeyCode::Up)), Some(b"\x1b[A".to_vec()));
        let ctrl_right = KeyEvent::new(KeyCode::Right, KeyModifiers::CONTROL);
        assert_eq!(encode_key(&ctrl_right), Some(b"\x1b[1;5C".to_vec()));
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(encode_key(&key(KeyCode::F(1))), Some(b"\x1bOP".to_vec()));
        assert_eq!(encode_key(&key(KeyCode::F(5))), Some(b"\x1b[15~".to_vec()));
        assert_eq!(encode_key(&key(KeyCode::F(12))), Some(b"\x1b[24~".to_vec()));
    }

    // ==================== Prefix Tests ====================

    #[test]
    fn test_prefix_then_detach() {
        let mut input = InputState::new();
        assert_eq!(input.handle_key(ctrl('b')), KeyAction::None);
        assert!(input.prefix_pending());
        assert_eq!(input.handle_key(key(KeyCode::Char('d'))), KeyAction::Detach);
        assert!(!input.prefix_pending());
    }

    #[test]
    fn test_prefix_split() {
        let mut input = InputState::new();
        input.handle_key(ctrl('b'));
        assert_eq!(
            input.handle_key(key(KeyCode::Char('%'))),
            KeyAction::Command(vec!["split-window".into(), "-h".into()])
        );
    }

    #[test]
    fn test_double_prefix_sends_prefix_byte() {
        let mut input = InputState::new();
        input.handle_key(ctrl('b'));
        assert_eq!(input.handle_key(ctrl('b')), KeyAction::Send(vec![0x02]));
    }

    #[test]
    fn test_unbound_key_after_prefix_swallowed() {
        let mut input = InputState::new();
        input.handle_key(ctrl('b'));
        assert_eq!(input.handle_key(key(KeyCode::Char('z'))), KeyAction::None);
        assert_eq!(
            input.handle_key(key(KeyCode::Char('z'))),
            KeyAction::Send(b"z".to_vec())
        );
    }

    #[test]
    fn test_release_ignored() {
        let mut input = InputState::new();
        let mut k = key(KeyCode::Char('a'));
        k.kind = KeyEventKind::Release;
        assert_eq!(input.handle_key(k), KeyAction::None);
    }
}
