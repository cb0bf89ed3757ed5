use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse Spine binary: {message}")]
    BinaryParse { message: String },

    #[error("unexpected null {what} at offset {offset}")]
    NullValue { what: &'static str, offset: usize },

    #[error("unsupported or invalid Spine version string: {value}")]
    UnsupportedVersion { value: String },

    #[error("invalid {kind} index {index} (len={len}) referenced by {context}")]
    InvalidReference {
        kind: &'static str,
        index: i64,
        len: usize,
        context: String,
    },

    #[error(
        "linked mesh parent '{parent}' not found for skin '{skin}', slot {slot}, attachment '{attachment}'"
    )]
    LinkedMeshParent {
        skin: String,
        slot: usize,
        attachment: String,
        parent: String,
    },

    #[error("region not found in atlas: {path} (attachment: {attachment})")]
    MissingRegion { path: String, attachment: String },

    #[error("failed to parse Spine atlas: {message}")]
    AtlasParse { message: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("attachment '{name}' not found for slot '{slot}'")]
    UnknownAttachment { slot: String, name: String },
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::BinaryParse {
            message: message.into(),
        }
    }

    pub(crate) fn reference(
        kind: &'static str,
        index: i64,
        len: usize,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidReference {
            kind,
            index,
            len,
            context: context.into(),
        }
    }

    /// Load-fatal errors that abort the whole asset, as opposed to per-attachment resource
    /// failures.
    pub fn is_fatal_for_asset(&self) -> bool {
        !matches!(self, Self::MissingRegion { .. })
    }
}
