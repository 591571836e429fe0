use std::collections::BTreeSet;
use std::io::{self, Write};

use serde::Serialize;

use crate::aggregate::{DepositSummary, UNKNOWN_BUCKET_ID};

/// Known addresses and their display names, in reporting order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressRegistry {
    entries: Vec<(String, String)>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `address`; a repeated address keeps its slot and takes the new name.
    pub fn insert(&mut self, address: impl Into<String>, name: impl Into<String>) {
        let address = address.into();
        let name = name.into();
        match self.entries.iter_mut().find(|(known, _)| *known == address) {
            Some(entry) => entry.1 = name,
            None => self.entries.push((address, name)),
        }
    }

    pub fn addresses(&self) -> BTreeSet<String> {
        self.entries.iter().map(|(address, _)| address.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .map(|(address, name)| (address.as_str(), name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for AddressRegistry {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut registry = AddressRegistry::new();
        for (address, name) in iter {
            registry.insert(address, name);
        }
        registry
    }
}

/// Write the human-readable deposit report.
///
/// Known addresses without a valid deposit are skipped.
pub fn write_report<W: Write>(
    summary: &DepositSummary,
    registry: &AddressRegistry,
    mut out: W,
) -> io::Result<()> {
    for (address, name) in registry.iter() {
        if let Some(row) = summary.known.iter().find(|row| row.address == address) {
            writeln!(out, "Deposited for {name}: count={} sum={}", row.count, row.sum)?;
        }
    }

    let (count, sum) = summary
        .unknown
        .as_ref()
        .map(|bucket| (bucket.count, bucket.sum.to_string()))
        .unwrap_or((0, "0.00000000".to_string()));
    writeln!(out, "Deposited without reference: count={count} sum={sum}")?;

    let show = |amount: Option<String>| amount.unwrap_or_else(|| "none".to_string());
    writeln!(
        out,
        "Smallest valid deposit: {}",
        show(summary.min.map(|d| d.amount.to_string()))
    )?;
    writeln!(
        out,
        "Largest valid deposit: {}",
        show(summary.max.map(|d| d.amount.to_string()))
    )?;

    out.flush()
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    address: &'a str,
    name: &'a str,
    count: usize,
    sum: String,
}

/// Write per-bucket totals in csv format.
///
/// The unknown bucket is the row whose address is the sentinel id.
pub fn write_csv_report<W: Write>(
    summary: &DepositSummary,
    registry: &AddressRegistry,
    out: W,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    let sentinel = UNKNOWN_BUCKET_ID.to_string();

    for (address, name) in registry.iter() {
        if let Some(row) = summary.known.iter().find(|row| row.address == address) {
            writer.serialize(OutputRow {
                address,
                name,
                count: row.count,
                sum: row.sum.to_string(),
            })?;
        }
    }

    if let Some(bucket) = &summary.unknown {
        writer.serialize(OutputRow {
            address: &sentinel,
            name: "",
            count: bucket.count,
            sum: bucket.sum.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}
