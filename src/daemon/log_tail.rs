use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub const DEFAULT_TAIL_LINES: usize = 50;

/// Bytes read from the end of the log; the file is appended to on every run.
const TAIL_WINDOW: u64 = 64 * 1024;

/// Last `n` lines of the daemon log, joined with newlines.
///
/// Diagnostics only: an unreadable log yields a placeholder instead of an error.
pub fn read_tail(path: &Path, n: usize) -> String {
    match read_window(path, TAIL_WINDOW) {
        Ok(content) => tail_lines(&content, n).join("\n"),
        Err(e) => format!("<daemon log {} unavailable: {}>", path.display(), e),
    }
}

/// At most `window` trailing bytes, starting on a line boundary when truncated.
fn read_window(path: &Path, window: u64) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(window);
    file.seek(SeekFrom::Start(start))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let content = String::from_utf8_lossy(&bytes);
    if start == 0 {
        return Ok(content.into_owned());
    }
    Ok(match content.split_once('\n') {
        Some((_, rest)) => rest.to_string(),
        None => String::new(),
    })
}

fn tail_lines(content: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}
