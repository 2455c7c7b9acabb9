//! Recorder: write encoded datapoints out, one per line.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use crate::encode::Encoded;
use crate::error::Result;

/// Line-oriented sink for encoded datapoints.
///
/// Every line is flushed as it is written so a reader tailing the output
/// sees each datapoint as soon as it is stored.
#[derive(Debug)]
pub struct TextRecorder<W: Write> {
    out: W,
    lines: u64,
}

impl<W: Write> TextRecorder<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    /// Write `header` as the first line.
    pub fn with_header(out: W, header: &str) -> Result<Self> {
        let mut recorder = Self::new(out);
        recorder.store(header)?;
        Ok(recorder)
    }

    /// Append `line` and a newline.
    pub fn store(&mut self, line: &str) -> Result<()> {
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.lines += 1;
        Ok(())
    }

    /// Text as-is; native datapoints as JSON.
    pub fn store_encoded(&mut self, item: &Encoded) -> Result<()> {
        let line = item.to_line()?;
        self.store(&line)
    }

    /// Lines written so far, header included.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl TextRecorder<fs::File> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(file))
    }
}

impl TextRecorder<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::model::{Datapoint, Fields, TimePlacement, Timestamp};

    fn datapoint() -> Datapoint {
        let fields: Fields = [("a", 1_i64)].into_iter().collect();
        Datapoint::new("rec", Timestamp::Integer(100), fields, TimePlacement::TimeAsKey)
    }

    #[test]
    fn header_comes_first() {
        let mut recorder = TextRecorder::with_header(Vec::new(), "timestamp,a").unwrap();
        recorder.store("100,1").unwrap();

        assert_eq!(recorder.lines(), 2);
        assert_eq!(
            String::from_utf8(recorder.into_inner()).unwrap(),
            "timestamp,a\n100,1\n"
        );
    }

    #[test]
    fn native_datapoints_are_written_as_json() {
        let mut recorder = TextRecorder::new(Vec::new());
        recorder.store_encoded(&Encoded::Native(datapoint())).unwrap();
        recorder
            .store_encoded(&Encoded::Text("already,text".into()))
            .unwrap();

        let written = String::from_utf8(recorder.into_inner()).unwrap();
        let mut lines = written.lines();
        let first: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(first["name"], "rec");
        assert_eq!(first["100"]["a"], 1);
        assert_eq!(lines.next(), Some("already,text"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn append_to_keeps_existing_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "old\n").unwrap();

        let mut recorder = TextRecorder::append_to(&path).unwrap();
        recorder.store("new").unwrap();
        drop(recorder);

        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");
    }
}
