// ABOUTME: Control sequences written around session focus changes
// Status-line drawing, screen clearing, focus-reporting reset and replay cleanup

/// Erase the display and home the cursor
pub const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[H";

/// Turn off focus in/out reporting a child may have enabled
pub const DISABLE_FOCUS_REPORTING: &[u8] = b"\x1b[?1004l";

const ERASE_DISPLAY: &[u8] = b"\x1b[2J";
const CURSOR_HOME: &[u8] = b"\x1b[H";

/// Remove clear/home sequences sitting at the very start of a chunk.
///
/// Only a literal prefix is stripped; a sequence split across chunks is left alone.
pub fn strip_leading_clear(chunk: &[u8]) -> &[u8] {
    let mut rest = chunk;
    loop {
        if let Some(stripped) = rest.strip_prefix(ERASE_DISPLAY) {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix(CURSOR_HOME) {
            rest = stripped;
        } else {
            return rest;
        }
    }
}

/// Draw `indicator` on the first row without moving the cursor of the content stream
pub fn status_line(indicator: &str) -> Vec<u8> {
    format!("\x1b[s\x1b[1;1H{indicator}\x1b[u").into_bytes()
}

/// Colored badge for the focused channel, with an optional hint such as `Ctrl+T: Shell`
pub fn mode_badge(label: &str, primary: bool, hint: Option<&str>) -> String {
    let background = if primary { 44 } else { 42 };
    match hint {
        Some(hint) => format!("\x1b[{background}m {label} \x1b[0m \x1b[90m({hint})\x1b[0m"),
        None => format!("\x1b[{background}m {label} \x1b[0m"),
    }
}
