use docrag_vector_store::Metadata;
use serde_json::Value;
use mailparse::{parse_mail, MailHeaderMap, MailParseError, ParsedMail};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported file format '{extension}': {}", path.display())]
    Unsupported { path: PathBuf, extension: String },

    #[error("Malformed message {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Extracted text plus loader-specific metadata
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub text: String,
    pub metadata: Metadata,
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<LoadedDocument, LoaderError>;
}

/// Pick a loader by file extension (case-insensitive).
pub fn loader_for_path(path: &Path) -> Result<Box<dyn DocumentLoader>, LoaderError> {
    if !path.exists() {
        return Err(LoaderError::NotFound(path.to_path_buf()));
    }
    let extension = extension_of(path);
    match extension.as_str() {
        "txt" | "md" => Ok(Box::new(PlainTextLoader)),
        "eml" => Ok(Box::new(EmailLoader)),
        _ => Err(LoaderError::Unsupported {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

/// Whether a directory walk should pick up this file
pub fn is_supported(path: &Path) -> bool {
    matches!(extension_of(path).as_str(), "txt" | "md" | "eml")
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, LoaderError> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoaderError::NotFound(path.to_path_buf())
        } else {
            LoaderError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn read_lossy(path: &Path) -> Result<String, LoaderError> {
    let bytes = read_bytes(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `.txt` and `.md` files, read as UTF-8 (invalid sequences replaced).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextLoader;

impl DocumentLoader for PlainTextLoader {
    fn load(&self, path: &Path) -> Result<LoadedDocument, LoaderError> {
        let text = read_lossy(path)?;
        let mut metadata = Metadata::new();
        metadata.insert("title".to_string(), Value::from(file_stem(path)));
        metadata.insert(
            "source".to_string(),
            Value::from(path.display().to_string()),
        );
        metadata.insert("bytes".to_string(), Value::from(text.len()));
        Ok(LoadedDocument { text, metadata })
    }
}

/// RFC 822 messages: `subject`/`from`/`to`/`date` headers plus the body text.
///
/// Single-part messages yield their decoded body whatever the content type; multipart
/// messages yield the first `text/plain` leaf, searched depth-first.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailLoader;

const EMAIL_HEADERS: [&str; 4] = ["subject", "from", "to", "date"];

impl DocumentLoader for EmailLoader {
    fn load(&self, path: &Path) -> Result<LoadedDocument, LoaderError> {
        let raw = read_bytes(path)?;
        let malformed = |err: MailParseError| LoaderError::Malformed {
            path: path.to_path_buf(),
            message: err.to_string(),
        };
        let mail = parse_mail(&raw).map_err(malformed)?;

        let mut metadata = Metadata::new();
        for name in EMAIL_HEADERS {
            if let Some(value) = mail.headers.get_first_value(name) {
                metadata.insert(name.to_string(), Value::from(value));
            }
        }
        let title = mail
            .headers
            .get_first_value("subject")
            .unwrap_or_else(|| file_stem(path));
        metadata.insert("title".to_string(), Value::from(title));

        let text = body_text(&mail).map_err(malformed)?;
        Ok(LoadedDocument { text, metadata })
    }
}

/// Decoded body (transfer encoding and charset applied)
fn body_text(mail: &ParsedMail<'_>) -> Result<String, MailParseError> {
    let part = if mail.subparts.is_empty() {
        Some(mail)
    } else {
        first_plain_leaf(mail)
    };
    match part {
        Some(part) => Ok(part.get_body()?.trim().to_string()),
        None => Ok(String::new()),
    }
}

fn first_plain_leaf<'m, 'a>(mail: &'m ParsedMail<'a>) -> Option<&'m ParsedMail<'a>> {
    if mail.subparts.is_empty() {
        return (mail.ctype.mimetype == "text/plain").then_some(mail);
    }
    mail.subparts.iter().find_map(|part| first_plain_leaf(part))
}
