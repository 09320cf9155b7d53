//! Trace input abstraction: a file path or stdin, read one line at a time.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// A line-oriented trace source, backed by a file or stdin.
pub enum TraceSource {
    /// Lines read from an open file.
    File(BufReader<File>),
    /// Lines read from the process's standard input.
    Stdin(io::StdinLock<'static>),
}

impl TraceSource {
    /// Opens `path` for reading, or stdin if `path` is `None` or `"-"`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`io::Error`] if the file cannot be opened.
    pub fn open(path: Option<&Path>) -> io::Result<Self> {
        match path {
            None => Ok(Self::Stdin(io::stdin().lock())),
            Some(p) if p == Path::new("-") => Ok(Self::Stdin(io::stdin().lock())),
            Some(p) => Ok(Self::File(BufReader::new(File::open(p)?))),
        }
    }

    /// Returns an iterator over the source's lines.
    pub fn lines(self) -> Box<dyn Iterator<Item = io::Result<String>>> {
        match self {
            Self::File(reader) => Box::new(reader.lines()),
            Self::Stdin(reader) => Box::new(reader.lines()),
        }
    }
}
