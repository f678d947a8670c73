use std::path::Path;

use crate::error::Result;

/// Parse a `file '<name>'` manifest. Lines not starting with `file ` are ignored.
pub fn parse_manifest(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("file "))
        .map(|rest| unquote(rest.trim()))
        .filter(|name| !name.is_empty())
        .collect()
}

/// Strip one pair of outer quotes. Inside single quotes, `'\''` stands for `'`.
fn unquote(entry: &str) -> String {
    if let Some(inner) = entry.strip_prefix('\'').and_then(|e| e.strip_suffix('\'')) {
        return inner.replace("'\\''", "'");
    }
    if let Some(inner) = entry.strip_prefix('"').and_then(|e| e.strip_suffix('"')) {
        return inner.to_string();
    }
    entry.to_string()
}

pub fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Ok(parse_manifest(&text))
}

/// One `file '...'` line, with single quotes escaped the way ffmpeg's concat
/// demuxer expects.
pub fn manifest_line(entry: &str) -> String {
    let escaped = entry.replace('\'', "'\\''");
    format!("file '{escaped}'\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_entries_in_order() {
        let text = "file 'b.mp4'\nfile \"a.png\"\n  file 'c.gif'  \n";
        assert_eq!(parse_manifest(text), vec!["b.mp4", "a.png", "c.gif"]);
    }

    #[test]
    fn ignores_other_directives_and_blank_lines() {
        let text = "ffconcat version 1.0\n\nfile 'a.png'\nduration 3\n# comment\n";
        assert_eq!(parse_manifest(text), vec!["a.png"]);
    }

    #[test]
    fn empty_manifest_yields_nothing() {
        assert!(parse_manifest("").is_empty());
        assert!(parse_manifest("file ''\n").is_empty());
    }

    #[test]
    fn manifest_line_escapes_single_quotes() {
        assert_eq!(manifest_line("/tmp/it's.mp4"), "file '/tmp/it'\\''s.mp4'\n");
    }

    #[test]
    fn written_lines_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        let names = ["z.mp4", "it's.png", "a 'quoted' clip.mov"];
        let body: String = names.iter().map(|n| manifest_line(n)).collect();
        std::fs::write(&path, body).unwrap();
        assert_eq!(read_manifest(&path).unwrap(), names);
    }

    #[test]
    fn escaped_quote_resolves_to_real_name() {
        assert_eq!(parse_manifest("file 'it'\\''s.png'\n"), vec!["it's.png"]);
    }

    #[test]
    fn only_the_outer_quote_pair_is_stripped() {
        assert_eq!(parse_manifest("file \"say \"hi\".mp4\"\n"), vec!["say \"hi\".mp4"]);
        assert_eq!(parse_manifest("file bare.gif\n"), vec!["bare.gif"]);
    }

    #[test]
    fn read_missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Io(_)));
    }
}
