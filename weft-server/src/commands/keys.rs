//! Key names accepted by `send-keys`

/// Bytes for a named key, e.g. `Enter`, `C-c`, `M-x` or `Up`. Returns None
/// for words that are not key names; those are sent as text.
pub fn key_bytes(name: &str) -> Option<Vec<u8>> {
    if let Some(rest) = name.strip_prefix("M-") {
        let mut bytes = vec![0x1b];
        bytes.extend(key_bytes(rest).or_else(|| single_char(rest))?);
        return Some(bytes);
    }
    if let Some(rest) = name.strip_prefix("C-").or_else(|| name.strip_prefix('^')) {
        return control(rest);
    }

    let seq: &[u8] = match name {
        "Enter" => b"\r",
        "Escape" => b"\x1b",
        "Tab" => b"\t",
        "BTab" => b"\x1b[Z",
        "Space" => b" ",
        "BSpace" => b"\x7f",
        "Up" => b"\x1b[A",
        "Down" => b"\x1b[B",
        "Right" => b"\x1b[C",
        "Left" => b"\x1b[D",
        "Home" => b"\x1b[1~",
        "End" => b"\x1b[4~",
        "IC" | "Insert" => b"\x1b[2~",
        "DC" | "Delete" => b"\x1b[3~",
        "PPage" | "PageUp" | "PgUp" => b"\x1b[5~",
        "NPage" | "PageDown" | "PgDn" => b"\x1b[6~",
        "F1" => b"\x1bOP",
        "F2" => b"\x1bOQ",
        "F3" => b"\x1bOR",
        "F4" => b"\x1bOS",
        "F5" => b"\x1b[15~",
        "F6" => b"\x1b[17~",
        "F7" => b"\x1b[18~",
        "F8" => b"\x1b[19~",
        "F9" => b"\x1b[20~",
        "F10" => b"\x1b[21~",
        "F11" => b"\x1b[23~",
        "F12" => b"\x1b[24~",
        _ => return None,
    };
    Some(seq.to_vec())
}

fn single_char(s: &str) -> Option<Vec<u8>> {
    let mut chars = s.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(c.to_string().into_bytes())
}

fn control(rest: &str) -> Option<Vec<u8>> {
    if rest == "Space" {
        return Some(vec![0]);
    }
    let mut chars = rest.chars();
    let c = chars.next()?;
    if chars.next().is_some() || !c.is_ascii() {
        return None;
    }
    let byte = match c {
        '?' => 0x7f,
        '@' | '[' | '\\' | ']' | '^' | '_' => c as u8 & 0x1f,
        c if c.is_ascii_alphabetic() => c.to_ascii_lowercase() as u8 & 0x1f,
        _ => return None,
    };
    Some(vec![byte])
}

/// Encode `send-keys` arguments into one input chunk. With `literal` set
/// every word is sent as text.
pub fn encode_keys(keys: &[String], literal: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for key in keys {
        match (!literal).then(|| key_bytes(key)).flatten() {
            Some(bytes) => out.extend(bytes),
            None => out.extend_from_slice(key.as_bytes()),
        }
    }
    out
}
