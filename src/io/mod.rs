//! Input/output functionality for geometry searches

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atom::Atom;
use crate::bayesian::domain::Domain;
use crate::internals::ZRow;
use crate::molecule::{AtomSpec, MoleculeSpec};

/// Errors that can occur during file I/O operations
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything one search run needs, bundled in a single JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSpec {
    /// The molecule and its initial geometry
    pub molecule: MoleculeSpec,

    /// Optional internal coordinate topology, one row per atom
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internals: Option<Vec<ZRow>>,

    /// The search domain trial vectors are drawn from
    pub domain: Domain,
}

/// Load a JSON system file
pub fn load_system<P: AsRef<Path>>(path: P) -> Result<SystemSpec, IoError> {
    let file = File::open(path.as_ref())?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Parse an XYZ geometry file into a molecule specification
pub fn parse_xyz<P: AsRef<Path>>(path: P) -> Result<MoleculeSpec, IoError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let count_line = lines.next().ok_or(IoError::Parse {
        line: 1,
        message: "empty file".to_string(),
    })??;
    let expected: usize = count_line.trim().parse().map_err(|_| IoError::Parse {
        line: 1,
        message: format!("invalid atom count: {}", count_line.trim()),
    })?;

    let name = lines
        .next()
        .transpose()?
        .unwrap_or_default()
        .trim()
        .to_string();

    let mut atoms = Vec::with_capacity(expected);
    for (offset, line) in lines.enumerate() {
        let line = line?;
        let line_number = offset + 3;
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(IoError::Parse {
                line: line_number,
                message: format!("expected 'element x y z', got: {}", line),
            });
        }

        let mut position = [0.0; 3];
        for (i, part) in parts[1..4].iter().enumerate() {
            position[i] = part.parse().map_err(|_| IoError::Parse {
                line: line_number,
                message: format!("invalid coordinate: {}", part),
            })?;
        }

        atoms.push(AtomSpec {
            element: parts[0].to_string(),
            position,
        });
    }

    if atoms.len() != expected {
        return Err(IoError::Parse {
            line: 1,
            message: format!("header promises {} atoms, found {}", expected, atoms.len()),
        });
    }

    Ok(MoleculeSpec {
        name: if name.is_empty() {
            path.as_ref()
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string()
        } else {
            name
        },
        atoms,
    })
}

/// Write a geometry as an XYZ file
pub fn write_xyz<P: AsRef<Path>>(path: P, comment: &str, atoms: &[Atom]) -> Result<(), IoError> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", atoms.len())?;
    writeln!(writer, "{}", comment)?;
    for atom in atoms {
        writeln!(
            writer,
            "{:<2} {:>14.8} {:>14.8} {:>14.8}",
            atom.element.symbol(),
            atom.position.x,
            atom.position.y,
            atom.position.z
        )?;
    }

    Ok(())
}
