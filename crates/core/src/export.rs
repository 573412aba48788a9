//! Text export formats shared by the diagnostics services

use std::str::FromStr;

use thiserror::Error;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Errors raised while exporting diagnostics
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Write a header record and rows as CSV
pub(crate) fn write_csv(headers: &[&str], rows: &[Vec<String>]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat(f)) if f == "xml"
        ));
    }

    #[test]
    fn test_csv_quoting() {
        let out = write_csv(
            &["a", "b"],
            &[vec!["plain".to_string(), "say \"hi\", twice".to_string()]],
        )
        .unwrap();
        assert_eq!(out, "a,b\nplain,\"say \"\"hi\"\", twice\"\n");
    }

    #[test]
    fn test_csv_quotes_headers_and_carriage_returns() {
        let out = write_csv(&["a,b"], &[vec!["x\ry".to_string()]]).unwrap();
        assert_eq!(out, "\"a,b\"\n\"x\ry\"\n");

        let mut reader = csv::Reader::from_reader(out.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 1);
        assert_eq!(&headers[0], "a,b");
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "x\ry");
    }
}
