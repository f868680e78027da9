//! Land-cover legend loading.
//!
//! Legend files are `;`-delimited UTF-8 text with a header row. Parsing is
//! lenient per row (rows without a usable integer id are skipped) and strict
//! per file (an unreadable or undecodable file is an error).

use std::collections::btree_map::{self, BTreeMap};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{RemapError, Result};
use crate::value::PixelValue;

/// Header names accepted for the category id, in priority order.
const ID_COLUMNS: [&str; 3] = ["Class_ID", "ClassId", "ID"];

/// Metadata for one land-cover category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub level: String,
    /// Localized name: `Descricao`, or `Description` when that column is blank.
    pub description: String,
    pub color: String,
    /// `Grupos` column.
    pub group: String,
    /// `SWAT` land-use code.
    pub auxiliary_code: String,
}

/// Category id to record, at most one record per id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTable {
    records: BTreeMap<i64, CategoryRecord>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&CategoryRecord> {
        self.records.get(&id)
    }

    /// Insert unless the id is already present. Returns whether it was kept.
    pub fn insert_first(&mut self, id: i64, record: CategoryRecord) -> bool {
        match self.records.entry(id) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Non-empty description for a pixel value, if the legend has one.
    /// Fractional values use the category of their integer part.
    pub fn description_for(&self, value: PixelValue) -> Option<&str> {
        let record = self.get(value.category_id()?)?;
        (!record.description.is_empty()).then_some(record.description.as_str())
    }

    /// Records in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &CategoryRecord)> + '_ {
        self.records.iter().map(|(id, r)| (*id, r))
    }
}

// ── Column resolution ────────────────────────────────────────────────────────

/// Header positions of the recognised columns; `None` when absent.
struct Columns {
    ids: Vec<usize>,
    level: Option<usize>,
    description: Option<usize>,
    descricao: Option<usize>,
    color: Option<usize>,
    grupos: Option<usize>,
    swat: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h == name);
        Self {
            ids: ID_COLUMNS.iter().filter_map(|name| find(name)).collect(),
            level: find("Level"),
            description: find("Description"),
            descricao: find("Descricao"),
            color: find("Color"),
            grupos: find("Grupos"),
            swat: find("SWAT"),
        }
    }

    /// First id cell that is present and non-empty, trimmed.
    fn raw_id<'r>(&self, row: &'r StringRecord) -> Option<&'r str> {
        self.ids
            .iter()
            .filter_map(|&i| row.get(i))
            .find(|cell| !cell.is_empty())
            .map(str::trim)
    }

    fn record(&self, row: &StringRecord) -> CategoryRecord {
        let cell = |col: Option<usize>| {
            col.and_then(|i| row.get(i)).map(str::trim).unwrap_or_default().to_string()
        };
        let descricao = cell(self.descricao);
        let description = if descricao.is_empty() { cell(self.description) } else { descricao };
        CategoryRecord {
            level: cell(self.level),
            description,
            color: cell(self.color),
            group: cell(self.grupos),
            auxiliary_code: cell(self.swat),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────────

/// Parse a `;`-delimited legend file.
///
/// Rows without an id, or whose id is not an integer, are skipped. When an id
/// repeats, the first row wins.
pub fn load(path: impl AsRef<Path>) -> Result<LookupTable> {
    let path = path.as_ref();
    let parse_err = |source: csv::Error| RemapError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(parse_err)?;

    let columns = Columns::resolve(reader.headers().map_err(parse_err)?);
    let mut table = LookupTable::new();
    let mut skipped = 0usize;

    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(parse_err)?;
        let Some(raw) = columns.raw_id(&row) else {
            skipped += 1;
            continue;
        };
        let Ok(id) = raw.parse::<i64>() else {
            debug!(row = line + 2, id = raw, "skipping legend row with non-integer id");
            skipped += 1;
            continue;
        };
        if !table.insert_first(id, columns.record(&row)) {
            debug!(row = line + 2, id, "ignoring duplicate legend id");
        }
    }

    info!(path = %path.display(), entries = table.len(), skipped, "lookup table loaded");
    Ok(table)
}

/// Like [`load`], but a legend that cannot be read yields an empty table.
///
/// Used where the legend only decorates class names and its absence must not
/// stop class discovery.
pub fn load_or_empty(path: impl AsRef<Path>) -> LookupTable {
    match load(path) {
        Ok(table) => table,
        Err(e) => {
            warn!("continuing without lookup table: {e}");
            LookupTable::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn legend(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_all_recognised_columns() {
        let file = legend(
            "Class_ID;Level;Description;Descricao;Color;Grupos;SWAT\n\
             3;1.1;Forest Formation;Formação Florestal;#1f8d49;Floresta;FRSE\n\
             33;2.2;River, Lake and Ocean;Rio, Lago e Oceano;#2532e4;Água;WATR\n",
        );
        let table = load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        let forest = table.get(3).unwrap();
        assert_eq!(forest.level, "1.1");
        assert_eq!(forest.description, "Formação Florestal");
        assert_eq!(forest.color, "#1f8d49");
        assert_eq!(forest.group, "Floresta");
        assert_eq!(forest.auxiliary_code, "FRSE");
    }

    #[test]
    fn first_duplicate_wins() {
        let file = legend("Class_ID;Description\n3;Forest\n4;Savanna\n3;Should not appear\n");
        let table = load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(3).unwrap().description, "Forest");
    }

    #[test]
    fn non_integer_and_blank_ids_are_skipped() {
        let file = legend("Class_ID;Description\nabc;Bad\n;Blank\n 5 ;Pasture\n2.5;Half\n");
        let table = load(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(5).unwrap().description, "Pasture");
    }

    #[test]
    fn alternate_id_headers_are_recognised() {
        let by_class_id = legend("ClassId;Description\n9;Silviculture\n");
        assert_eq!(load(by_class_id.path()).unwrap().get(9).unwrap().description, "Silviculture");

        let by_id = legend("ID;Description\n24;Urban Area\n");
        assert_eq!(load(by_id.path()).unwrap().get(24).unwrap().description, "Urban Area");
    }

    #[test]
    fn id_falls_through_to_next_column_when_blank() {
        let file = legend("Class_ID;ID;Description\n;12;Grassland\n");
        let table = load(file.path()).unwrap();
        assert_eq!(table.get(12).unwrap().description, "Grassland");
    }

    #[test]
    fn rows_without_id_column_are_skipped() {
        let file = legend("Name;Description\nx;Forest\n");
        assert!(load(file.path()).unwrap().is_empty());
    }

    #[test]
    fn descricao_falls_back_to_description() {
        let file = legend("Class_ID;Description;Descricao\n15;Pasture;\n");
        let table = load(file.path()).unwrap();
        assert_eq!(table.get(15).unwrap().description, "Pasture");
    }

    #[test]
    fn missing_columns_and_short_rows_read_empty() {
        let file = legend("Class_ID;Description;Color\n21;Mosaic\n");
        let record = load(file.path()).unwrap().get(21).cloned().unwrap();
        assert_eq!(record.description, "Mosaic");
        assert_eq!(record.color, "");
        assert_eq!(record.level, "");
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let err = load("/nonexistent/legend.csv").unwrap_err();
        assert!(matches!(err, RemapError::Parse { .. }));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Class_ID;Description\n1;\xff\xfe\n").unwrap();
        file.flush().unwrap();
        assert!(matches!(load(file.path()), Err(RemapError::Parse { .. })));
    }

    #[test]
    fn load_or_empty_swallows_errors() {
        assert!(load_or_empty("/nonexistent/legend.csv").is_empty());
    }

    #[test]
    fn description_for_truncates_fractional_values() {
        let file = legend("Class_ID;Description;Descricao\n1;Water;\n2;;\n");
        let table = load(file.path()).unwrap();
        assert_eq!(table.description_for(PixelValue::from(1)), Some("Water"));
        assert_eq!(table.description_for(PixelValue::new(1.5)), Some("Water"));
        assert_eq!(table.description_for(PixelValue::new(3.5)), None);
        assert_eq!(table.description_for(PixelValue::from(2)), None);
    }
}
