use std::collections::BTreeSet;
use std::fs;

use camino::Utf8Path;

use crate::domain::Isbn;
use crate::error::HarvestError;

/// Reads a catalog listing with one ISBN per line.
pub fn read_catalog(path: &Utf8Path) -> Result<Vec<Isbn>, HarvestError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|_| HarvestError::CatalogRead(path.to_path_buf()))?;
    Ok(parse_catalog(&content))
}

/// Blank lines and `#` comments are skipped; the result is sorted and unique.
pub fn parse_catalog(content: &str) -> Vec<Isbn> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.parse::<Isbn>().ok())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
