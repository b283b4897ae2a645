//! Solved time series and tab-separated export

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::equations::names::{TIME_INDEX, TIME_VARIABLE};
use crate::error::{SfcError, SfcResult};

/// Output formatting for [`TimeSeries::write_csv`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportFormat {
    pub delimiter: char,
    pub significant_digits: usize,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            significant_digits: 5,
        }
    }
}

/// Values of every variable, one entry per time index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    series: BTreeMap<String, Vec<f64>>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, values: Vec<f64>) {
        self.series.insert(name.to_string(), values);
    }

    pub fn push(&mut self, name: &str, value: f64) {
        self.series.entry(name.to_string()).or_default().push(value);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Value of `name` at time index `k`
    pub fn value(&self, name: &str, k: usize) -> Option<f64> {
        self.series.get(name).and_then(|s| s.get(k)).copied()
    }

    /// Value of `name` at the final time index
    pub fn last(&self, name: &str) -> Option<f64> {
        self.series.get(name).and_then(|s| s.last()).copied()
    }

    /// Number of time indices (the longest series)
    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Variable names with `k` and `t` first, then sorted
    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.series.len());
        for pinned in [TIME_INDEX, TIME_VARIABLE] {
            if self.series.contains_key(pinned) {
                names.push(pinned);
            }
        }
        names.extend(
            self.series
                .keys()
                .map(String::as_str)
                .filter(|n| *n != TIME_INDEX && *n != TIME_VARIABLE),
        );
        names
    }

    /// Write one header row and one row per time index
    pub fn to_writer<W: Write>(&self, writer: W, format: &ExportFormat) -> SfcResult<()> {
        if !format.delimiter.is_ascii() {
            return Err(SfcError::Logic(format!(
                "export delimiter {:?} is not an ASCII character",
                format.delimiter
            )));
        }
        let delimiter = format.delimiter as u8;
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        let names = self.column_names();
        wtr.write_record(&names)?;
        for k in 0..self.len() {
            let row: Vec<String> = names
                .iter()
                .map(|n| match self.value(n, k) {
                    Some(v) => format_significant(v, format.significant_digits),
                    None => String::new(),
                })
                .collect();
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P, format: &ExportFormat) -> SfcResult<()> {
        let file = File::create(path.as_ref())?;
        self.to_writer(file, format)?;
        info!(
            target: "sfc::timeseries",
            "wrote {} series to {}",
            self.series.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.series.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Render `value` with `digits` significant figures, trimming trailing zeros
pub fn format_significant(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let digits = digits.max(1);
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= digits as i32 {
        let text = format!("{:.*e}", digits - 1, value);
        match text.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{}", trim_zeros(mantissa), exp),
            None => text,
        }
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_significant() {
        assert_eq!(format_significant(100.0, 5), "100");
        assert_eq!(format_significant(79.999999, 5), "80");
        assert_eq!(format_significant(0.123456, 5), "0.12346");
        assert_eq!(format_significant(-2.5, 5), "-2.5");
        assert_eq!(format_significant(1.5e-7, 5), "1.5e-7");
        assert_eq!(format_significant(123456789.0, 5), "1.2346e8");
        assert_eq!(format_significant(f64::NAN, 5), "nan");
    }

    #[test]
    fn test_column_order() {
        let mut ts = TimeSeries::new();
        ts.insert("b", vec![1.0]);
        ts.insert("t", vec![0.0]);
        ts.insert("a", vec![2.0]);
        ts.insert("k", vec![0.0]);
        assert_eq!(ts.column_names(), vec!["k", "t", "a", "b"]);
    }

    #[test]
    fn test_tab_separated_output() {
        let mut ts = TimeSeries::new();
        ts.insert("k", vec![0.0, 1.0]);
        ts.insert("x", vec![0.5, 1.0 / 3.0]);
        let mut out = Vec::new();
        ts.to_writer(&mut out, &ExportFormat::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "k\tx\n0\t0.5\n1\t0.33333\n");
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let mut ts = TimeSeries::new();
        ts.insert("x", vec![1.0]);
        for delimiter in ['é', '→'] {
            let format = ExportFormat {
                delimiter,
                ..ExportFormat::default()
            };
            let mut out = Vec::new();
            let result = ts.to_writer(&mut out, &format);
            assert!(matches!(result, Err(SfcError::Logic(_))));
            assert!(out.is_empty());
        }
        let format = ExportFormat {
            delimiter: ',',
            ..ExportFormat::default()
        };
        let mut out = Vec::new();
        ts.to_writer(&mut out, &format).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "x\n1\n");
    }

    #[test]
    fn test_accessors() {
        let mut ts = TimeSeries::new();
        ts.push("y", 1.0);
        ts.push("y", 2.0);
        assert_eq!(ts.len(), 2);
        assert_eq!(ts.value("y", 1), Some(2.0));
        assert_eq!(ts.last("y"), Some(2.0));
        assert_eq!(ts.value("y", 2), None);
    }
}
