use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// Errors raised while reading a PLY file.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a PLY file (missing 'ply' magic)")]
    MissingMagic,

    #[error("malformed header at line {line}: {message}")]
    MalformedHeader { line: usize, message: String },

    #[error("element '{element}' declares {count} rows but only {available} bytes follow the header")]
    ImplausibleCount {
        element: String,
        count: u64,
        available: u64,
    },

    #[error("file has no '{0}' element")]
    MissingElement(&'static str),

    #[error("vertex element is missing property '{0}'")]
    MissingProperty(String),

    #[error("PLY parsing error: {0}")]
    Parse(#[from] serde_ply::DeserializeError),
}

/// Scalar properties of the `vertex` element, decoded to `f32` and stored row-major.
#[derive(Debug, Clone, Default)]
pub struct VertexTable {
    pub names: Vec<String>,
    pub rows: usize,
    pub data: Vec<f32>,
}

impl VertexTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn get(&self, row: usize, column: usize) -> f32 {
        self.data[row * self.names.len() + column]
    }
}

#[derive(Deserialize)]
struct PlyFile {
    vertex: VertexTable,
}

/// Read the `vertex` element of a PLY stream. Other elements are skipped.
pub fn read_vertices<R: BufRead + Seek>(mut reader: R) -> Result<VertexTable, PlyError> {
    let len = reader.seek(SeekFrom::End(0))?;
    reader.rewind()?;
    check_header(&mut reader, len)?;
    reader.rewind()?;

    let ply: PlyFile = serde_ply::from_reader(reader)?;
    Ok(ply.vertex)
}

/// Open and read the vertex table of the PLY file at `path`.
pub fn read_vertex_file(path: &Path) -> Result<VertexTable, PlyError> {
    read_vertices(BufReader::new(File::open(path)?))
}

/// Checks the magic line and that each element's row count fits in the bytes after the header.
/// Every property takes at least one byte per row in any encoding.
fn check_header<R: BufRead>(reader: &mut R, len: u64) -> Result<(), PlyError> {
    let mut line = Vec::new();
    let mut consumed = 0u64;
    let mut line_no = 0;
    // (name, rows, properties)
    let mut elements: Vec<(String, u64, u64)> = Vec::new();

    let malformed = |line: usize, message: &str| PlyError::MalformedHeader {
        line,
        message: message.to_string(),
    };

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            return Err(if line_no == 0 {
                PlyError::MissingMagic
            } else {
                malformed(line_no, "header ended before 'end_header'")
            });
        }
        consumed += read as u64;
        line_no += 1;

        let text = String::from_utf8_lossy(&line);
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if line_no == 1 {
            if tokens.first() != Some(&"ply") {
                return Err(PlyError::MissingMagic);
            }
            continue;
        }

        match tokens.as_slice() {
            ["element", name, count] => {
                let count = count
                    .parse()
                    .map_err(|_| malformed(line_no, "element count is not an integer"))?;
                elements.push((name.to_string(), count, 0));
            }
            ["property", ..] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| malformed(line_no, "property before any element"))?;
                element.2 += 1;
            }
            ["end_header"] => break,
            _ => {}
        }
    }

    if !elements.iter().any(|(name, ..)| name == "vertex") {
        return Err(PlyError::MissingElement("vertex"));
    }

    let available = len.saturating_sub(consumed);
    for (element, count, properties) in elements {
        let fits = count
            .checked_mul(properties.max(1))
            .is_some_and(|min_bytes| min_bytes <= available);
        if !fits {
            return Err(PlyError::ImplausibleCount {
                element,
                count,
                available,
            });
        }
    }
    Ok(())
}

impl<'de> Deserialize<'de> for VertexTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(RowsVisitor)
    }
}

struct RowsVisitor;

impl<'de> Visitor<'de> for RowsVisitor {
    type Value = VertexTable;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a sequence of vertex rows")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<VertexTable, A::Error> {
        let mut table = VertexTable::default();
        while seq.next_element_seed(Row { table: &mut table })?.is_some() {
            table.rows += 1;
        }
        Ok(table)
    }
}

/// Appends one vertex row to the table. Column names are taken from the first row.
struct Row<'a> {
    table: &'a mut VertexTable,
}

impl<'de> DeserializeSeed<'de> for Row<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for Row<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a vertex row")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let first = self.table.rows == 0;
        let mut scalars = 0;
        while let Some(name) = map.next_key_seed(PropertyName { keep: first })? {
            // List properties are skipped.
            if let Cell::Scalar(value) = map.next_value()? {
                if let Some(name) = name {
                    self.table.names.push(name);
                }
                self.table.data.push(value);
                scalars += 1;
            }
        }

        if scalars != self.table.names.len() {
            return Err(de::Error::custom(format!(
                "vertex row {} has {} scalar properties, expected {}",
                self.table.rows,
                scalars,
                self.table.names.len()
            )));
        }
        Ok(())
    }
}

struct PropertyName {
    keep: bool,
}

impl<'de> DeserializeSeed<'de> for PropertyName {
    type Value = Option<String>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_string(self)
    }
}

impl<'de> Visitor<'de> for PropertyName {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a property name")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(self.keep.then(|| v.to_string()))
    }
}

enum Cell {
    Scalar(f32),
    List,
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CellVisitor)
    }
}

struct CellVisitor;

impl<'de> Visitor<'de> for CellVisitor {
    type Value = Cell;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a list")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Cell, E> {
        Ok(Cell::Scalar(v as f32))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Cell, E> {
        Ok(Cell::Scalar(v as f32))
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> Result<Cell, E> {
        Ok(Cell::Scalar(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Cell, E> {
        Ok(Cell::Scalar(v as f32))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Cell, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Cell::List)
    }
}
