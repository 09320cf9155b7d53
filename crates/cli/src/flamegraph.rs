//! Folded-stack profile output for hot source lines, consumable by
//! `inferno-flamegraph`/`flamegraph.pl`.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use cachesim_core::stats::HotLine;

/// Writes one folded-stack line per hot source location to `path`:
/// `"{file};{line} {misses}"`, weighted by miss count since that's the
/// quantity worth visualizing a profile of.
///
/// # Errors
///
/// Returns the underlying I/O error if `path` can't be created or written.
pub fn write_folded(path: &Path, hot_lines: &[HotLine]) -> io::Result<()> {
    let mut file = File::create(path)?;
    for line in hot_lines {
        if line.misses == 0 {
            continue;
        }
        writeln!(file, "{};{} {}", line.file, line.line, line.misses)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_folded_line_per_hot_line_weighted_by_misses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.folded");
        let hot_lines = vec![
            HotLine {
                file: "a.c".to_string(),
                line: 10,
                hits: 5,
                misses: 3,
                thread_count: 1,
            },
            HotLine {
                file: "b.c".to_string(),
                line: 20,
                hits: 1,
                misses: 0,
                thread_count: 1,
            },
        ];
        write_folded(&path, &hot_lines).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "a.c;10 3\n");
    }
}
