use crate::error::{Error, Result};

/// Byte between identifiers in a region statistics key. Identifiers may not
/// contain it, which keeps keys unambiguous and ordered like the triples.
pub const SEPARATOR: u8 = 0x00;

/// Coordinates of one statistics row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsKey<'a> {
    pub table: &'a str,
    pub family: &'a str,
    pub region: &'a str,
}

impl StatsKey<'_> {
    pub fn row_key(&self) -> Result<Vec<u8>> {
        region_stats_key(self.table, self.family, self.region)
    }
}

fn identifier<'a>(kind: &str, name: &'a str) -> Result<&'a [u8]> {
    if name.is_empty() {
        return Err(Error::InvalidIdentifier(format!("{} name is empty", kind)));
    }
    if name.as_bytes().contains(&SEPARATOR) {
        return Err(Error::InvalidIdentifier(format!(
            "{} name {:?} contains a separator byte",
            kind, name
        )));
    }
    Ok(name.as_bytes())
}

/// `table 0x00 family 0x00 region`
pub fn region_stats_key(table: &str, family: &str, region: &str) -> Result<Vec<u8>> {
    let table = identifier("table", table)?;
    let family = identifier("family", family)?;
    let region = identifier("region", region)?;

    let mut key = Vec::with_capacity(table.len() + family.len() + region.len() + 2);
    key.extend_from_slice(table);
    key.push(SEPARATOR);
    key.extend_from_slice(family);
    key.push(SEPARATOR);
    key.extend_from_slice(region);
    Ok(key)
}

/// The bare table name. It never carries a separator, so it cannot equal a
/// region statistics key.
pub fn table_marker_key(table: &str) -> Result<Vec<u8>> {
    Ok(identifier("table", table)?.to_vec())
}
