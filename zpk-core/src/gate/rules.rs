use crate::format::StorageFormat;

/// Name and layout rules that depend on the declared format rather than on
/// anything found in the bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleSet {
    pub format: StorageFormat,
    /// Part names must stay unique after ASCII case folding.
    pub case_insensitive_names: bool,
    /// The first entry must be a stored `mimetype`.
    pub require_mimetype: bool,
    /// Stored entries may defer their sizes to a data descriptor. Only plain
    /// ZIP tolerates this, and only when the policy allows descriptors at all.
    pub stored_descriptors: bool,
}

impl RuleSet {
    pub fn for_format(format: StorageFormat) -> Self {
        match format {
            StorageFormat::Zip => Self {
                format,
                case_insensitive_names: false,
                require_mimetype: false,
                stored_descriptors: true,
            },
            StorageFormat::OfOpXml => Self {
                format,
                case_insensitive_names: true,
                require_mimetype: false,
                stored_descriptors: false,
            },
            StorageFormat::Package => Self {
                format,
                case_insensitive_names: false,
                require_mimetype: true,
                stored_descriptors: false,
            },
        }
    }
}

pub const MIMETYPE_ENTRY: &str = "mimetype";
