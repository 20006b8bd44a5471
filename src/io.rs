/*!
Readers for the whitespace-separated ASCII inputs of an inversion.

Three shapes appear on disk: matrices with an `M N` header line followed by
`M` rows of `N` doubles, plain vectors with one value per line, and single
scalars. A fourth reader handles per-parameter prior tables (`mean std`
per line).
*/

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_f64(token: &str, path: &Path, line: usize) -> Result<f64> {
    token.parse::<f64>().map_err(|_| Error::Parse {
        path: path.to_path_buf(),
        line,
        message: format!("expected a number, found {:?}", token),
    })
}

fn parse_usize(token: &str, path: &Path, line: usize) -> Result<usize> {
    token.parse::<usize>().map_err(|_| Error::Parse {
        path: path.to_path_buf(),
        line,
        message: format!("expected a non-negative integer, found {:?}", token),
    })
}

/// Reads a matrix file: header line `rows cols`, then one row per line.
pub fn read_matrix(path: &Path) -> Result<Array2<f64>> {
    let contents = read_to_string(path)?;
    let mut lines = contents
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (header_no, header) = lines.next().ok_or_else(|| Error::Parse {
        path: path.to_path_buf(),
        line: 1,
        message: "empty matrix file".into(),
    })?;
    let mut header_tokens = header.split_whitespace();
    let rows = parse_usize(
        header_tokens.next().unwrap_or(""),
        path,
        header_no + 1,
    )?;
    let cols = parse_usize(
        header_tokens.next().unwrap_or(""),
        path,
        header_no + 1,
    )?;

    let mut data = Vec::with_capacity(rows * cols);
    let mut rows_seen = 0;
    for (line_no, line) in lines {
        let row: Vec<f64> = line
            .split_whitespace()
            .map(|t| parse_f64(t, path, line_no + 1))
            .collect::<Result<_>>()?;
        if row.len() != cols {
            return Err(Error::Dimension(format!(
                "{}: row {} has {} entries, header promised {}",
                path.display(),
                rows_seen + 1,
                row.len(),
                cols
            )));
        }
        data.extend(row);
        rows_seen += 1;
    }
    if rows_seen != rows {
        return Err(Error::Dimension(format!(
            "{}: found {} rows, header promised {}",
            path.display(),
            rows_seen,
            rows
        )));
    }
    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::Dimension(format!("{}: {}", path.display(), e)))
}

/// Reads a vector file: one value per line.
pub fn read_vector(path: &Path) -> Result<Array1<f64>> {
    let contents = read_to_string(path)?;
    let mut values = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        values.push(parse_f64(trimmed, path, line_no + 1)?);
    }
    Ok(Array1::from_vec(values))
}

/// Reads a single scalar from a file.
pub fn read_scalar(path: &Path) -> Result<f64> {
    let contents = read_to_string(path)?;
    let token = contents.split_whitespace().next().ok_or_else(|| Error::Parse {
        path: path.to_path_buf(),
        line: 1,
        message: "empty scalar file".into(),
    })?;
    parse_f64(token, path, 1)
}

/// Reads a per-parameter prior table: `mean std` on each line.
pub fn read_prior_table(path: &Path) -> Result<(Array1<f64>, Array1<f64>)> {
    let contents = read_to_string(path)?;
    let mut means = Vec::new();
    let mut stds = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(Error::Parse {
                path: path.to_path_buf(),
                line: line_no + 1,
                message: format!("expected `mean std`, found {} tokens", tokens.len()),
            });
        }
        means.push(parse_f64(tokens[0], path, line_no + 1)?);
        stds.push(parse_f64(tokens[1], path, line_no + 1)?);
    }
    Ok((Array1::from_vec(means), Array1::from_vec(stds)))
}
