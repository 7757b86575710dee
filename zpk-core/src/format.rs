use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared container convention of a package.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Plain ZIP rules.
    #[default]
    #[serde(alias = "ZIP", alias = "ZipFormat")]
    Zip,
    /// Office Open XML packaging (OPC): part names are case-insensitive.
    #[serde(alias = "OFOPXML", alias = "OFOPXMLFormat")]
    OfOpXml,
    /// ODF-style package: a stored `mimetype` entry comes first.
    #[serde(alias = "PACKAGE", alias = "PackageFormat")]
    Package,
}

impl StorageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageFormat::Zip => "ZIP",
            StorageFormat::OfOpXml => "OFOPXML",
            StorageFormat::Package => "PACKAGE",
        }
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zip" | "zipformat" => Ok(StorageFormat::Zip),
            "ofopxml" | "ofopxmlformat" | "ooxml" => Ok(StorageFormat::OfOpXml),
            "package" | "packageformat" | "odf" => Ok(StorageFormat::Package),
            other => Err(format!("unknown storage format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_style_names() {
        assert_eq!("ZipFormat".parse(), Ok(StorageFormat::Zip));
        assert_eq!("OFOPXMLFormat".parse(), Ok(StorageFormat::OfOpXml));
        assert_eq!("PackageFormat".parse(), Ok(StorageFormat::Package));
        assert_eq!(" ofopxml ".parse(), Ok(StorageFormat::OfOpXml));
        assert!("tar".parse::<StorageFormat>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for f in [StorageFormat::Zip, StorageFormat::OfOpXml, StorageFormat::Package] {
            assert_eq!(f.to_string().parse::<StorageFormat>(), Ok(f));
        }
    }
}
