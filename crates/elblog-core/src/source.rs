use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::{PipelineError, Result};

/// A local log file, transparently gunzipped when its name ends in `.gz`.
pub struct LogFileSource {
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
}

impl LogFileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| PipelineError::OpenSource {
            path: path.clone(),
            source,
        })?;

        let reader: Box<dyn BufRead + Send> = if is_gzip(&path) {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        Ok(Self { path, reader })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines without their terminators. Invalid UTF-8 is replaced rather than
    /// rejected so one bad byte does not cost the rest of the file.
    pub fn lines(self) -> SourceLines {
        SourceLines {
            reader: self.reader,
            buf: Vec::new(),
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

pub struct SourceLines {
    reader: Box<dyn BufRead + Send>,
    buf: Vec<u8>,
}

impl Iterator for SourceLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
                    self.buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(err) => Some(Err(PipelineError::Io(err))),
        }
    }
}
