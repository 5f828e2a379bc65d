use super::models::{Config, ProviderConfig, ProviderKind};
use mime::Mime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Provider #{index} has an empty url")]
    EmptyProviderUrl { index: usize },

    #[error("Content provider '{url}' has no content")]
    MissingContent { url: String },

    #[error("{kind:?} provider '{url}' has no path")]
    MissingPath { kind: ProviderKind, url: String },

    #[error("Invalid MIME type '{value}' in {field}")]
    InvalidMimeType { field: String, value: String },

    #[error("server.chunk_size must be positive")]
    InvalidChunkSize,

    #[error("server.origin '{origin}' must start with http:// or https://")]
    InvalidOrigin { origin: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_mime_type("resources.default_mime_type", &config.resources.default_mime_type)?;
    for (index, provider) in config.providers.iter().enumerate() {
        validate_provider(index, provider)?;
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.chunk_size == 0 {
        return Err(ValidationError::InvalidChunkSize);
    }

    let origin = &config.server.origin;
    if !(origin.starts_with("http://") || origin.starts_with("https://")) {
        return Err(ValidationError::InvalidOrigin {
            origin: origin.clone(),
        });
    }

    Ok(())
}

fn validate_provider(index: usize, provider: &ProviderConfig) -> Result<(), ValidationError> {
    if provider.url.trim().is_empty() {
        return Err(ValidationError::EmptyProviderUrl { index });
    }

    match provider.kind {
        ProviderKind::Content => {
            if provider.content.is_none() {
                return Err(ValidationError::MissingContent {
                    url: provider.url.clone(),
                });
            }
        }
        ProviderKind::Directory | ProviderKind::Archive => {
            if provider.path.as_ref().is_none_or(|p| p.as_os_str().is_empty()) {
                return Err(ValidationError::MissingPath {
                    kind: provider.kind,
                    url: provider.url.clone(),
                });
            }
        }
    }

    if let Some(mime_type) = &provider.mime_type {
        validate_mime_type(&format!("providers[{index}].mime_type"), mime_type)?;
    }

    Ok(())
}

fn validate_mime_type(field: &str, value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Mime>()
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidMimeType {
            field: field.to_string(),
            value: value.to_string(),
        })
}
