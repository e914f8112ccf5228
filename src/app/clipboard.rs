//! Terminal clipboard via OSC 52.
//!
//! The escape sequence asks the terminal emulator to place text on the
//! system clipboard, which also works over SSH.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// OSC 52 sequence setting the clipboard to `text`.
pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

/// Write the OSC 52 sequence for `text` to `out`.
pub fn copy_to<W: Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(osc52_sequence(text).as_bytes())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osc52_sequence() {
        assert_eq!(osc52_sequence("SELECT 1"), "\x1b]52;c;U0VMRUNUIDE=\x07");
    }

    #[test]
    fn test_copy_to_writer() {
        let mut out = Vec::new();
        copy_to(&mut out, "hi").unwrap();
        assert_eq!(out, b"\x1b]52;c;aGk=\x07");
    }
}
