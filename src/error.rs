/// Coarse classification of a [`SettingsError`], used by callers that only
/// need to decide how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Storage,
    CorruptDocument,
    Validation,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode settings for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("settings file {path} is not valid JSON: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("settings file {path} does not contain a JSON object")]
    NotAnObject { path: String },
    #[error("invalid settings update: {0}")]
    Validation(String),
    #[error("failed to resolve home directory for settings path")]
    HomeDirectoryUnavailable,
}

impl SettingsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Corrupt { .. } | Self::NotAnObject { .. } => ErrorKind::CorruptDocument,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Read { .. }
            | Self::CreateDir { .. }
            | Self::Write { .. }
            | Self::Encode { .. }
            | Self::HomeDirectoryUnavailable => ErrorKind::Storage,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_separate_corruption_from_storage() {
        let corrupt = SettingsError::NotAnObject {
            path: "/tmp/settings.json".to_string(),
        };
        assert_eq!(corrupt.kind(), ErrorKind::CorruptDocument);

        let write = SettingsError::Write {
            path: "/tmp/settings.json".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(write.kind(), ErrorKind::Storage);
        assert!(write.to_string().contains("/tmp/settings.json"));

        assert_eq!(
            SettingsError::validation("env must be an object").kind(),
            ErrorKind::Validation
        );
    }
}
