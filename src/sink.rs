//! Append-only writers for the samples and trajectory files.
//!
//! Both formats share one shape: a header line with two integers, then one
//! line per record holding the N model components followed by a scalar
//! misfit/energy. The samples file additionally ends with the acceptance
//! count on its own line.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array1;

use crate::error::{Error, Result};

fn create_buffered(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let file = File::create(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

fn write_record(
    out: &mut BufWriter<File>,
    path: &Path,
    model: &Array1<f64>,
    scalar: f64,
) -> Result<()> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    for v in model.iter() {
        write!(out, "{} ", v).map_err(io_err)?;
    }
    writeln!(out, "{}", scalar).map_err(io_err)
}

/// Writer for the chain output: header `N P`, one line per emitted sample,
/// and the acceptance count as a footer.
#[derive(Debug)]
pub struct SampleSink {
    out: BufWriter<File>,
    path: PathBuf,
}

impl SampleSink {
    pub fn create(path: &Path, n_params: usize, proposals: usize) -> Result<Self> {
        let mut out = create_buffered(path)?;
        writeln!(out, "{} {}", n_params, proposals).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            out,
            path: path.to_path_buf(),
        })
    }

    /// Appends one accepted state and its energy.
    pub fn write(&mut self, model: &Array1<f64>, energy: f64) -> Result<()> {
        write_record(&mut self.out, &self.path, model, energy)
    }

    /// Writes the acceptance-count footer and flushes the stream.
    pub fn finish(mut self, accepted: usize) -> Result<()> {
        let io_err = |source| Error::Io {
            path: self.path.clone(),
            source,
        };
        writeln!(self.out, "{}", accepted).map_err(io_err)?;
        self.out.flush().map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Writer for the leap-frog trajectory of a single proposal: header `N n_t`,
/// one line per integration step.
#[derive(Debug)]
pub struct TrajectorySink {
    out: BufWriter<File>,
    path: PathBuf,
}

impl TrajectorySink {
    pub fn create(path: &Path, n_params: usize, n_steps: usize) -> Result<Self> {
        let mut out = create_buffered(path)?;
        writeln!(out, "{} {}", n_params, n_steps).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            out,
            path: path.to_path_buf(),
        })
    }

    pub fn write(&mut self, model: &Array1<f64>, misfit: f64) -> Result<()> {
        write_record(&mut self.out, &self.path, model, misfit)
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush().map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use tempfile::tempdir;

    #[test]
    fn samples_file_has_header_body_and_footer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("samples.txt");

        let mut sink = SampleSink::create(&path, 2, 5).unwrap();
        sink.write(&arr1(&[1.0, -2.5]), 3.25).unwrap();
        sink.write(&arr1(&[0.5, 0.0]), 1.0).unwrap();
        sink.finish(2).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "2 5");
        assert_eq!(lines[1], "1 -2.5 3.25");
        assert_eq!(lines[2], "0.5 0 1");
        assert_eq!(lines[3], "2");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn trajectory_file_has_step_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trajectory.txt");

        let mut sink = TrajectorySink::create(&path, 1, 3).unwrap();
        sink.write(&arr1(&[0.25]), 0.5).unwrap();
        sink.finish().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "1 3");
        assert_eq!(lines[1], "0.25 0.5");
    }

    #[test]
    fn missing_parent_directory_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out/samples.txt");
        let sink = SampleSink::create(&path, 1, 1).unwrap();
        sink.finish(0).unwrap();
        assert!(path.exists());
    }
}
