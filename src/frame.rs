//! Columnar stat frames
//!
//! A [`StatFrame`] holds all rows of one stat family: a row index plus named,
//! typed columns. Text columns keep their cells verbatim, float columns use
//! NaN as the single missing marker, and categorical columns carry an ordered
//! level set (used for thresholds once tables are concatenated).

use crate::ordering::compare_leads;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Token the upstream verifier writes for a missing cell.
pub const MISSING_TOKEN: &str = "NA";

/// Header columns that are identifiers, never statistics. They stay text
/// even when every cell looks numeric (leads and valid times in particular).
pub const TEXT_COLUMNS: &[&str] = &[
    "VERSION",
    "MODEL",
    "DESC",
    "FCST_LEAD",
    "FCST_VALID_BEG",
    "FCST_VALID_END",
    "OBS_LEAD",
    "OBS_VALID_BEG",
    "OBS_VALID_END",
    "FCST_VAR",
    "FCST_UNITS",
    "FCST_LEV",
    "OBS_VAR",
    "OBS_UNITS",
    "OBS_LEV",
    "OBTYPE",
    "VX_MASK",
    "INTERP_MTHD",
    "FCST_THRESH",
    "OBS_THRESH",
    "COV_THRESH",
    "LINE_TYPE",
];

pub const COL_MASK: &str = "VX_MASK";
pub const COL_LEAD: &str = "FCST_LEAD";
pub const COL_VALID_END: &str = "FCST_VALID_END";
pub const COL_THRESH: &str = "FCST_THRESH";

/// Cell data of one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Float(#[serde(with = "nan_as_null")] Vec<f64>),
    Category {
        levels: Vec<String>,
        codes: Vec<Option<u32>>,
    },
}

/// A borrowed view of a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Missing,
    Text(&'a str),
    Float(f64),
}

impl Cell<'_> {
    /// Cell as text; floats are formatted with Rust's shortest round-trip form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Text(s) => Some((*s).to_string()),
            Cell::Float(v) if v.is_nan() => None,
            Cell::Float(v) => Some(v.to_string()),
        }
    }

    /// Cell as a float when it is numeric or parses as one.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Cell::Missing => None,
            Cell::Float(v) if v.is_nan() => None,
            Cell::Float(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Float(v) => v.is_nan(),
            Cell::Text(_) => false,
        }
    }
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Category { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cell(&self, row: usize) -> Cell<'_> {
        match self {
            ColumnData::Text(v) => match &v[row] {
                Some(s) => Cell::Text(s.as_str()),
                None => Cell::Missing,
            },
            ColumnData::Float(v) => Cell::Float(v[row]),
            ColumnData::Category { levels, codes } => match codes[row] {
                Some(code) => Cell::Text(levels[code as usize].as_str()),
                None => Cell::Missing,
            },
        }
    }

    /// Column of `len` missing cells shaped like `self`.
    fn missing_like(&self, len: usize) -> ColumnData {
        match self {
            ColumnData::Text(_) => ColumnData::Text(vec![None; len]),
            ColumnData::Float(_) => ColumnData::Float(vec![f64::NAN; len]),
            ColumnData::Category { levels, .. } => ColumnData::Category {
                levels: levels.clone(),
                codes: vec![None; len],
            },
        }
    }

    fn to_text_column(&self) -> Vec<Option<String>> {
        (0..self.len()).map(|i| self.cell(i).to_text()).collect()
    }

    fn take(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
            ColumnData::Float(v) => ColumnData::Float(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Category { levels, codes } => ColumnData::Category {
                levels: levels.clone(),
                codes: rows.iter().map(|&r| codes[r]).collect(),
            },
        }
    }

    /// Appends `other`; mismatched kinds fall back to text.
    fn extend(&mut self, other: &ColumnData) {
        match (self, other) {
            (ColumnData::Text(a), ColumnData::Text(b)) => a.extend(b.iter().cloned()),
            (ColumnData::Float(a), ColumnData::Float(b)) => a.extend(b.iter().copied()),
            (
                ColumnData::Category { levels, codes },
                ColumnData::Category {
                    levels: other_levels,
                    codes: other_codes,
                },
            ) if *levels == *other_levels => codes.extend(other_codes.iter().copied()),
            (this, _) => {
                let mut text = this.to_text_column();
                text.extend(other.to_text_column());
                *this = ColumnData::Text(text);
            }
        }
    }

    /// True when every cell is missing or the empty string.
    pub fn is_blank(&self) -> bool {
        (0..self.len()).all(|i| match self.cell(i) {
            Cell::Text(s) => s.is_empty(),
            other => other.is_missing(),
        })
    }
}

impl PartialEq for ColumnData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnData::Text(a), ColumnData::Text(b)) => a == b,
            (ColumnData::Float(a), ColumnData::Float(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
            }
            (
                ColumnData::Category { levels, codes },
                ColumnData::Category {
                    levels: other_levels,
                    codes: other_codes,
                },
            ) => levels == other_levels && codes == other_codes,
            _ => false,
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Key used by [`StatFrame::sort_by_keys`].
#[derive(Debug, Clone, Copy)]
pub enum SortKey<'a> {
    /// Lexicographic text order, missing first.
    Text(&'a str),
    /// Lead-string order (length, then lexicographic).
    Lead(&'a str),
    /// Categorical level order, missing first.
    Category(&'a str),
}

/// All rows of one stat family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatFrame {
    pub index: Vec<u64>,
    pub columns: Vec<Column>,
}

impl StatFrame {
    /// Builds a frame from a header and whitespace-split records.
    ///
    /// Cells are assigned positionally; short records are padded with missing
    /// cells and surplus tokens are ignored. `NA` becomes the missing marker.
    /// A non-identifier column becomes a float column when every present
    /// token parses as a number.
    pub fn from_records(header: &[String], records: &[Vec<String>], first_index: u64) -> Self {
        let n = records.len();
        let columns = header
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let tokens: Vec<Option<&str>> = records
                    .iter()
                    .map(|rec| {
                        rec.get(c)
                            .map(|s| s.as_str())
                            .filter(|s| *s != MISSING_TOKEN)
                    })
                    .collect();
                let numeric = !TEXT_COLUMNS.contains(&name.as_str())
                    && tokens
                        .iter()
                        .flatten()
                        .all(|t| t.parse::<f64>().is_ok());
                let data = if numeric {
                    ColumnData::Float(
                        tokens
                            .iter()
                            .map(|t| t.and_then(|s| s.parse().ok()).unwrap_or(f64::NAN))
                            .collect(),
                    )
                } else {
                    ColumnData::Text(tokens.iter().map(|t| t.map(str::to_string)).collect())
                };
                Column {
                    name: name.clone(),
                    data,
                }
            })
            .collect();
        StatFrame {
            index: (first_index..first_index + n as u64).collect(),
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Cell at (`name`, `row`); `None` when the column is absent.
    pub fn cell(&self, name: &str, row: usize) -> Option<Cell<'_>> {
        self.column(name).map(|c| c.data.cell(row))
    }

    pub fn text(&self, name: &str, row: usize) -> Option<String> {
        self.cell(name, row).and_then(|c| c.to_text())
    }

    pub fn float(&self, name: &str, row: usize) -> Option<f64> {
        self.cell(name, row).and_then(|c| c.to_f64())
    }

    /// Distinct present text values of a column, in first-seen order.
    pub fn distinct_text(&self, name: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for row in 0..self.len() {
            if let Some(v) = self.text(name, row) {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        out
    }

    /// Rows at the given positions, index included.
    pub fn take_rows(&self, rows: &[usize]) -> StatFrame {
        StatFrame {
            index: rows.iter().map(|&r| self.index[r]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(rows),
                })
                .collect(),
        }
    }

    /// Rows for which `keep(self, row)` holds.
    pub fn filter<F>(&self, keep: F) -> StatFrame
    where
        F: Fn(&StatFrame, usize) -> bool,
    {
        let rows: Vec<usize> = (0..self.len()).filter(|&r| keep(self, r)).collect();
        self.take_rows(&rows)
    }

    /// Rows whose text cell in `name` equals `value`.
    pub fn filter_eq(&self, name: &str, value: &str) -> StatFrame {
        self.filter(|f, r| f.text(name, r).as_deref() == Some(value))
    }

    /// Keeps the named columns that exist, in the requested order.
    pub fn select(&self, names: &[&str]) -> StatFrame {
        StatFrame {
            index: self.index.clone(),
            columns: names
                .iter()
                .filter_map(|n| self.column(n).cloned())
                .collect(),
        }
    }

    /// Adds (or replaces) a text column holding `value` in every row.
    pub fn set_constant_text(&mut self, name: &str, value: &str) {
        let data = ColumnData::Text(vec![Some(value.to_string()); self.len()]);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.data = data,
            None => self.columns.push(Column {
                name: name.to_string(),
                data,
            }),
        }
    }

    /// Appends the rows of `other`. Columns missing on either side are
    /// filled with missing cells; the result keeps `self`'s column order
    /// followed by columns new in `other`.
    pub fn append(&mut self, other: &StatFrame) {
        let (n_self, n_other) = (self.len(), other.len());
        for col in &mut self.columns {
            match other.column(&col.name) {
                Some(o) => col.data.extend(&o.data),
                None => {
                    let pad = col.data.missing_like(n_other);
                    col.data.extend(&pad);
                }
            }
        }
        for o in &other.columns {
            if self.column(&o.name).is_none() {
                let mut data = o.data.missing_like(n_self);
                data.extend(&o.data);
                self.columns.push(Column {
                    name: o.name.clone(),
                    data,
                });
            }
        }
        self.index.extend(other.index.iter().copied());
    }

    /// Drops columns whose cells are all missing or all empty strings.
    pub fn drop_blank_columns(&mut self) {
        if self.is_empty() {
            return;
        }
        self.columns.retain(|c| !c.data.is_blank());
    }

    /// Converts a text column to floats if every present cell parses.
    /// Returns whether the column is numeric afterwards; a column that does
    /// not parse is left untouched.
    pub fn coerce_float(&mut self, name: &str) -> bool {
        let Some(col) = self.columns.iter_mut().find(|c| c.name == name) else {
            return false;
        };
        if matches!(col.data, ColumnData::Float(_)) {
            return true;
        }
        let parsed: Option<Vec<f64>> = (0..col.data.len())
            .map(|i| match col.data.cell(i) {
                Cell::Missing => Some(f64::NAN),
                cell => cell.to_f64(),
            })
            .collect();
        match parsed {
            Some(values) => {
                col.data = ColumnData::Float(values);
                true
            }
            None => false,
        }
    }

    /// Turns `name` into an ordered categorical over `levels`. Rows whose
    /// value is present but not a level are dropped; missing values stay.
    pub fn to_category(&mut self, name: &str, levels: &[String]) {
        let Some(pos) = self.columns.iter().position(|c| c.name == name) else {
            return;
        };
        let codes: Vec<Option<Option<u32>>> = (0..self.len())
            .map(|r| match self.columns[pos].data.cell(r).to_text() {
                None => Some(None),
                Some(v) => levels
                    .iter()
                    .position(|l| *l == v)
                    .map(|p| Some(p as u32)),
            })
            .collect();
        let keep: Vec<usize> = codes
            .iter()
            .enumerate()
            .filter_map(|(r, c)| c.map(|_| r))
            .collect();
        let codes: Vec<Option<u32>> = codes.into_iter().flatten().collect();
        let mut kept = self.take_rows(&keep);
        kept.columns[pos].data = ColumnData::Category {
            levels: levels.to_vec(),
            codes,
        };
        *self = kept;
    }

    /// Stable sort on the given keys, first key most significant.
    pub fn sort_by_keys(&mut self, keys: &[SortKey<'_>]) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            keys.iter()
                .map(|key| self.compare_rows(*key, a, b))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        *self = self.take_rows(&order);
    }

    fn compare_rows(&self, key: SortKey<'_>, a: usize, b: usize) -> Ordering {
        match key {
            SortKey::Text(name) => self.text(name, a).cmp(&self.text(name, b)),
            SortKey::Lead(name) => match (self.text(name, a), self.text(name, b)) {
                (Some(x), Some(y)) => compare_leads(&x, &y),
                (x, y) => x.is_some().cmp(&y.is_some()),
            },
            SortKey::Category(name) => match self.column(name).map(|c| &c.data) {
                Some(ColumnData::Category { codes, .. }) => codes[a].cmp(&codes[b]),
                _ => self.text(name, a).cmp(&self.text(name, b)),
            },
        }
    }

    /// Renumbers the row index as `start, start + 1, ...`.
    pub fn reset_index(&mut self, start: u64) {
        let n = self.len() as u64;
        self.index = (start..start + n).collect();
    }
}

mod nan_as_null {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for v in values {
            if v.is_finite() {
                seq.serialize_element(&Some(*v))?;
            } else {
                seq.serialize_element(&None::<f64>)?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let raw: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}
