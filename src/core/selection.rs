use std::{collections::HashSet, sync::Arc};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{TextError, TextResult};

use super::row::RawRow;

/// Which columns a session reads or writes.
///
/// Inclusion and exclusion are mutually exclusive by construction; names are
/// matched against the header set trimmed and case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSelection {
    IncludeNames(Vec<String>),
    IncludeIndexes(Vec<usize>),
    ExcludeNames(Vec<String>),
    ExcludeIndexes(Vec<usize>),
}

impl FieldSelection {
    pub fn is_by_name(&self) -> bool {
        matches!(
            self,
            FieldSelection::IncludeNames(_) | FieldSelection::ExcludeNames(_)
        )
    }

    pub fn is_exclusion(&self) -> bool {
        matches!(
            self,
            FieldSelection::ExcludeNames(_) | FieldSelection::ExcludeIndexes(_)
        )
    }

    /// One past the highest index named by an index selection, 0 otherwise.
    pub fn required_width(&self) -> usize {
        match self {
            FieldSelection::IncludeIndexes(indexes) | FieldSelection::ExcludeIndexes(indexes) => {
                indexes.iter().max().map_or(0, |max| max + 1)
            }
            _ => 0,
        }
    }

    /// Checks that every index of an index selection exists among
    /// `column_count` columns.
    pub fn check_indexes(&self, column_count: usize) -> TextResult<()> {
        match self {
            FieldSelection::IncludeIndexes(indexes) | FieldSelection::ExcludeIndexes(indexes) => {
                check_indexes(indexes, column_count)
            }
            _ => Ok(()),
        }
    }

    /// Checks the selection on its own, before any header is known.
    pub fn validate(&self) -> TextResult<()> {
        let duplicated = match self {
            FieldSelection::IncludeNames(names) | FieldSelection::ExcludeNames(names) => {
                if names.is_empty() {
                    return Err(TextError::Configuration(
                        "Field selection cannot be empty".to_string(),
                    ));
                }
                find_duplicates(names)
            }
            FieldSelection::IncludeIndexes(indexes) | FieldSelection::ExcludeIndexes(indexes) => {
                if indexes.is_empty() {
                    return Err(TextError::Configuration(
                        "Field selection cannot be empty".to_string(),
                    ));
                }
                let mut seen = HashSet::new();
                indexes
                    .iter()
                    .filter(|index| !seen.insert(**index))
                    .map(|index| index.to_string())
                    .collect()
            }
        };

        if duplicated.is_empty() {
            Ok(())
        } else {
            Err(TextError::Configuration(format!(
                "Field selection contains duplicate entries: {:?}",
                duplicated
            )))
        }
    }
}

/// Resolved projection from output columns to source columns.
///
/// `mapping[i]` is the source column feeding output column `i`; `None`
/// marks a column kept in place but not selected (only produced when column
/// reordering is disabled). Exclusions also keep every column past the
/// resolved width, so rows wider than the first one lose nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionMask {
    mapping: Vec<Option<usize>>,
    selected: Vec<usize>,
    excluded: Option<Vec<usize>>,
    width: usize,
    headers: Option<Arc<[String]>>,
}

impl SelectionMask {
    /// Resolves `selection` against the known headers and the number of
    /// columns observed (or declared) for the session.
    ///
    /// Every selected name or index must exist, otherwise a
    /// [`TextError::Configuration`] is returned.
    pub fn resolve(
        selection: &FieldSelection,
        headers: Option<&[String]>,
        column_count: usize,
        reorder: bool,
    ) -> TextResult<SelectionMask> {
        let width = column_count.max(headers.map_or(0, <[String]>::len));
        selection.check_indexes(width)?;
        Self::build(selection, headers, width, reorder)
    }

    /// Resolves `selection` against headers alone, before any data row is
    /// read.
    ///
    /// Selected indexes past the last header are kept. Once the width of the
    /// first data row is known, [`FieldSelection::check_indexes`] tells
    /// whether they exist.
    pub fn resolve_provisional(
        selection: &FieldSelection,
        headers: &[String],
        reorder: bool,
    ) -> TextResult<SelectionMask> {
        let width = match selection {
            FieldSelection::IncludeIndexes(_) => headers.len().max(selection.required_width()),
            _ => headers.len(),
        };
        Self::build(selection, Some(headers), width, reorder)
    }

    fn build(
        selection: &FieldSelection,
        headers: Option<&[String]>,
        width: usize,
        reorder: bool,
    ) -> TextResult<SelectionMask> {
        let (selected, excluded): (Vec<usize>, Option<Vec<usize>>) = match selection {
            FieldSelection::IncludeIndexes(indexes) => (indexes.clone(), None),
            FieldSelection::IncludeNames(names) => (resolve_names(names, headers)?, None),
            FieldSelection::ExcludeIndexes(indexes) => (
                (0..width).filter(|index| !indexes.contains(index)).collect(),
                Some(indexes.clone()),
            ),
            FieldSelection::ExcludeNames(names) => {
                let excluded = resolve_names(names, headers)?;
                (
                    (0..width).filter(|index| !excluded.contains(index)).collect(),
                    Some(excluded),
                )
            }
        };

        let mapping: Vec<Option<usize>> = if reorder {
            selected.iter().map(|index| Some(*index)).collect()
        } else {
            (0..width)
                .map(|index| selected.contains(&index).then_some(index))
                .collect()
        };

        let headers = headers.map(|headers| {
            let names: Vec<String> = mapping
                .iter()
                .enumerate()
                .map(|(position, source)| {
                    let index = source.unwrap_or(position);
                    headers.get(index).cloned().unwrap_or_default()
                })
                .collect();
            Arc::from(names)
        });

        debug!("Resolved field selection {:?} to {:?}", selection, mapping);

        Ok(SelectionMask {
            mapping,
            selected,
            excluded,
            width,
            headers,
        })
    }

    pub fn mapping(&self) -> &[Option<usize>] {
        &self.mapping
    }

    /// Source columns receiving values, in the order values are given.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Number of source columns the mask was resolved against.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Header names of the projected columns, in output order.
    pub fn headers(&self) -> Option<&Arc<[String]>> {
        self.headers.as_ref()
    }

    /// Source column of every output column for a row of `row_len` values.
    pub fn sources(&self, row_len: usize) -> impl Iterator<Item = Option<usize>> + '_ {
        let (excluded, end) = match &self.excluded {
            Some(excluded) => (excluded.as_slice(), row_len.max(self.width)),
            None => (&[][..], self.width),
        };
        self.mapping.iter().copied().chain(
            (self.width..end)
                .filter(move |index| !excluded.contains(index))
                .map(Some),
        )
    }

    /// Projects a raw row into output order. Selected columns missing from
    /// the row come out as `None`.
    pub fn project<'r>(&self, raw: &'r RawRow) -> Vec<Option<&'r str>> {
        self.sources(raw.len())
            .map(|source| source.and_then(|index| raw.get(index)))
            .collect()
    }

    /// Places values given in selection order back at their source
    /// positions, leaving unselected columns as `None`.
    ///
    /// More values than selected columns is a [`TextError::TextWriting`]
    /// error, except for exclusions where extra values land past the
    /// resolved width.
    pub fn scatter<'v>(&self, values: &[Option<&'v str>]) -> TextResult<Vec<Option<&'v str>>> {
        let targets: Vec<usize> = match &self.excluded {
            Some(excluded) => self
                .selected
                .iter()
                .copied()
                .chain((self.width..).filter(|index| !excluded.contains(index)))
                .take(values.len())
                .collect(),
            None => {
                if values.len() > self.selected.len() {
                    return Err(TextError::TextWriting(format!(
                        "{} values given but only {} columns are selected",
                        values.len(),
                        self.selected.len()
                    )));
                }
                self.selected[..values.len()].to_vec()
            }
        };

        let width = targets
            .iter()
            .map(|index| index + 1)
            .max()
            .unwrap_or(0)
            .max(self.width);
        let mut out = vec![None; width];
        for (value, index) in values.iter().zip(targets) {
            out[index] = *value;
        }
        Ok(out)
    }
}

/// Normalizes a header name for lookup: trimmed and lower case.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Finds the column whose normalized name equals `normalized`.
///
/// Returns `Ok(None)` if there is none and `Err` with every matching index
/// when the name is shared by several columns.
pub fn index_of(headers: &[String], normalized: &str) -> Result<Option<usize>, Vec<usize>> {
    let matches: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, header)| normalize(header) == normalized)
        .map(|(index, _)| index)
        .collect();

    match matches.as_slice() {
        [] => Ok(None),
        [index] => Ok(Some(*index)),
        _ => Err(matches),
    }
}

/// Returns the names of `wanted` that no header matches.
pub fn find_missing(headers: &[String], wanted: &[String]) -> Vec<String> {
    wanted
        .iter()
        .filter(|name| matches!(index_of(headers, &normalize(name)), Ok(None)))
        .cloned()
        .collect()
}

/// Returns the names occurring more than once once normalized.
pub fn find_duplicates(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for name in names {
        let normalized = normalize(name);
        if !seen.insert(normalized.clone()) && !duplicates.contains(&normalized) {
            duplicates.push(normalized);
        }
    }
    duplicates
}

fn check_indexes(indexes: &[usize], width: usize) -> TextResult<()> {
    let missing: Vec<&usize> = indexes.iter().filter(|index| **index >= width).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TextError::Configuration(format!(
            "Selected indexes {:?} do not exist, the input has {} columns",
            missing, width
        )))
    }
}

fn resolve_names(names: &[String], headers: Option<&[String]>) -> TextResult<Vec<usize>> {
    let headers = headers.ok_or_else(|| {
        TextError::Configuration(format!(
            "Fields {:?} are selected by name but no headers are available",
            names
        ))
    })?;

    let missing = find_missing(headers, names);
    if !missing.is_empty() {
        return Err(TextError::Configuration(format!(
            "Selected fields {:?} not found in headers {:?}",
            missing, headers
        )));
    }

    names
        .iter()
        .map(|name| match index_of(headers, &normalize(name)) {
            Ok(Some(index)) => Ok(index),
            Ok(None) => Err(TextError::Configuration(format!(
                "Selected field '{}' not found in headers {:?}",
                name, headers
            ))),
            Err(indexes) => Err(TextError::Configuration(format!(
                "Selected field '{}' matches columns {:?}, duplicated headers can only be selected by index",
                name, indexes
            ))),
        })
        .collect()
}
