//! Byte sink for the generated triples
//!
//! The sink either feeds a single stream (file or stdout) or one part file
//! per output section. Part files are combined on close: `Concatenate`
//! appends the raw part bytes in a fixed order, `Merge` re-reads each part
//! through the codec and re-writes it so the final file is one coherent
//! stream even when compression is enabled.

use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Output sections, in the order they appear in a combined file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Prefixes = 0,
    Nodes,
    Ways,
    Relations,
    Areas,
    Spatial,
}

const SECTION_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    #[default]
    None,
    Concatenate,
    Merge,
}

pub struct Output {
    path: String,
    compress: bool,
    mode: MergeMode,
    single: Option<Box<dyn Write + Send>>,
    parts: Vec<Option<Box<dyn Write + Send>>>,
    part_paths: Vec<PathBuf>,
}

impl Output {
    /// An output writing to `path`, or to stdout when `path` is empty.
    /// Stdout is always a single stream.
    pub fn new(path: &str, compress: bool, mode: MergeMode) -> Output {
        let mode = if path.is_empty() { MergeMode::None } else { mode };
        Output {
            path: path.to_string(),
            compress,
            mode,
            single: None,
            parts: Vec::new(),
            part_paths: Vec::new(),
        }
    }

    fn make_writer(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
        let inner: Box<dyn Write + Send> = if path.is_empty() {
            Box::new(io::stdout())
        } else {
            Box::new(File::create(path)?)
        };
        Ok(if self.compress {
            Box::new(BufWriter::new(GzEncoder::new(inner, Compression::default())))
        } else {
            Box::new(BufWriter::new(inner))
        })
    }

    pub fn open(&mut self) -> io::Result<()> {
        match self.mode {
            MergeMode::None => {
                self.single = Some(self.make_writer(&self.path)?);
            }
            MergeMode::Concatenate | MergeMode::Merge => {
                for i in 0..SECTION_COUNT {
                    let path = PathBuf::from(format!("{}.part_{i}", self.path));
                    self.parts
                        .push(Some(self.make_writer(path.to_str().unwrap())?));
                    self.part_paths.push(path);
                }
            }
        }
        Ok(())
    }

    pub fn write(&mut self, section: Section, bytes: &[u8]) -> io::Result<()> {
        match self.mode {
            MergeMode::None => self
                .single
                .as_mut()
                .expect("output not opened")
                .write_all(bytes),
            _ => self.parts[section as usize]
                .as_mut()
                .expect("output not opened")
                .write_all(bytes),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(w) = self.single.as_mut() {
            w.flush()?;
        }
        for p in self.parts.iter_mut().flatten() {
            p.flush()?;
        }
        Ok(())
    }

    /// Flushes and closes the sink. In the part-file modes this combines the
    /// parts into the final file and removes them.
    pub fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        // dropping a GzEncoder finishes the stream
        self.single = None;
        self.parts.clear();
        match self.mode {
            MergeMode::None => (),
            MergeMode::Concatenate => {
                let mut out = BufWriter::new(File::create(&self.path)?);
                for path in &self.part_paths {
                    let mut part = File::open(path)?;
                    io::copy(&mut part, &mut out)?;
                }
                out.flush()?;
                self.remove_parts()?;
            }
            MergeMode::Merge => {
                let mut out = self.make_writer(&self.path.clone())?;
                for path in &self.part_paths {
                    let reader = BufReader::new(File::open(path)?);
                    let mut reader: Box<dyn BufRead> = if self.compress {
                        Box::new(BufReader::new(GzDecoder::new(reader)))
                    } else {
                        Box::new(reader)
                    };
                    io::copy(&mut reader, &mut out)?;
                }
                out.flush()?;
                drop(out);
                self.remove_parts()?;
            }
        }
        Ok(())
    }

    fn remove_parts(&mut self) -> io::Result<()> {
        for path in self.part_paths.drain(..) {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Default for Output {
    fn default() -> Output {
        Output::new("", false, MergeMode::None)
    }
}
