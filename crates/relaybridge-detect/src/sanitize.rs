//! ANSI stripping and carriage-return line rebuild.
//!
//! Interactive CLIs redraw progress bars and spinners with bare `\r` instead
//! of `\n`; naive byte accumulation produces a buffer full of overwritten
//! garbage. Rebuilding lines the way a terminal emulator would keeps the
//! detector looking at what a human would actually see.

/// Strip ANSI escape sequences from raw bytes and lossily decode to UTF-8.
pub fn strip_ansi(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}

/// Rebuild `text` as a terminal would: within each line, a bare `\r` resets
/// the write cursor to the start of that line rather than appending.
pub fn rebuild_cr_lines(text: &str) -> String {
    let mut out_lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        match ch {
            '\n' => {
                out_lines.push(std::mem::take(&mut current));
            }
            '\r' => {
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    out_lines.push(current);
    out_lines.join("\n")
}

/// Text is "meaningful" once it has enough non-whitespace content to be worth
/// treating as a stable excerpt — filters out bursts of bare cursor control.
pub fn is_meaningful(text: &str) -> bool {
    text.chars().filter(|c| !c.is_whitespace()).count() >= 3
}

/// Clean + rebuild in one step — the usual entry point for a raw output chunk.
pub fn sanitize(raw: &[u8]) -> String {
    rebuild_cr_lines(&strip_ansi(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cr_overwrites_current_line() {
        let out = rebuild_cr_lines("progress: 10%\rprogress: 90%\n");
        assert_eq!(out, "progress: 90%\n");
    }

    #[test]
    fn lf_starts_new_line() {
        let out = rebuild_cr_lines("line one\nline two");
        assert_eq!(out, "line one\nline two");
    }

    #[test]
    fn meaningful_filters_whitespace_noise() {
        assert!(!is_meaningful("   \r\n  "));
        assert!(is_meaningful("y/n?"));
    }
}
