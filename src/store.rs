use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    slice,
    str::FromStr,
};

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::debug;

use crate::{Measurement, ParseMeasurementError};

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("Could not open `{}`", path.display())]
    #[diagnostic(code(weatherdata::open))]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not read measurements")]
    #[diagnostic(code(weatherdata::read))]
    Read(#[from] io::Error),
    #[error("Bad measurement on line {line}")]
    #[diagnostic(
        code(weatherdata::bad_line),
        help("each line must look like `YYYY-MM-DD;HH:MM[:SS];<temperature>;<G or other flag>`")
    )]
    BadLine {
        line: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
        #[source]
        reason: ParseMeasurementError,
    },
}

/// All the measurements of a station, in the order they were read.
///
/// A store is filled once by one of the loaders and is read-only afterward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    measurements: Vec<Measurement>,
}

impl Store {
    /// Read one measurement per line. The first bad line aborts the whole load.
    pub fn load(reader: impl BufRead) -> Result<Self, LoadError> {
        Self::read(reader, "input")
    }

    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read(BufReader::new(file), &path.display().to_string())
    }

    fn read(reader: impl BufRead, name: &str) -> Result<Self, LoadError> {
        let mut measurements = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            match line.parse::<Measurement>() {
                Ok(measurement) => measurements.push(measurement),
                Err(reason) => {
                    let span = field_span(&line, reason.field());
                    return Err(LoadError::BadLine {
                        line: index + 1,
                        src: NamedSource::new(name, line),
                        span,
                        reason,
                    });
                }
            }
        }

        debug!(source = name, measurements = measurements.len(), "loaded measurements");
        Ok(Self { measurements })
    }

    pub fn iter(&self) -> slice::Iter<'_, Measurement> {
        self.measurements.iter()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

impl FromStr for Store {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::read(s.as_bytes(), "input")
    }
}

impl<'a> IntoIterator for &'a Store {
    type Item = &'a Measurement;
    type IntoIter = slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// Byte range of the `field`th `;` separated field, or of the whole line.
fn field_span(line: &str, field: Option<usize>) -> SourceSpan {
    let mut offset = 0;
    for (index, part) in line.split(';').enumerate() {
        if Some(index) == field {
            return (offset, part.len()).into();
        }
        offset += part.len() + 1;
    }
    (0, line.len()).into()
}
