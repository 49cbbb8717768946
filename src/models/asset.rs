use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ModelError;
use crate::config::{ACCEPTED_LAB_MIME_TYPES, ACCEPTED_MIME_TYPES, MAX_UPLOAD_BYTES};

/// One uploaded file. Immutable once created; derived assets never mutate it.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub id: Uuid,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
    bytes: Vec<u8>,
}

impl ImageAsset {
    pub fn new(original_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            last_modified: None,
            bytes,
        }
    }

    pub fn with_last_modified(mut self, timestamp: DateTime<Utc>) -> Self {
        self.last_modified = Some(timestamp);
        self
    }

    /// Load a file from disk, guessing its mime type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let read_err = |source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        };

        let bytes = std::fs::read(path).map_err(read_err)?;
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let asset = Self::new(name, mime_type, bytes);
        Ok(match modified {
            Some(ts) => asset.with_last_modified(ts),
            None => asset,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Pixel operations only apply to `image/*` assets.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Upload-layer limits: size cap and accepted formats.
    pub fn check_upload_limits(&self) -> Result<(), ModelError> {
        self.check_limits(ACCEPTED_MIME_TYPES)
    }

    /// Same size cap; lab reports may also be PDF documents.
    pub fn check_lab_upload_limits(&self) -> Result<(), ModelError> {
        self.check_limits(ACCEPTED_LAB_MIME_TYPES)
    }

    fn check_limits(&self, accepted: &[&str]) -> Result<(), ModelError> {
        if self.size_bytes > MAX_UPLOAD_BYTES {
            return Err(ModelError::TooLarge {
                name: self.original_name.clone(),
                size: self.size_bytes,
                limit: MAX_UPLOAD_BYTES,
            });
        }
        if !accepted.contains(&self.mime_type.as_str()) {
            return Err(ModelError::UnsupportedFormat {
                name: self.original_name.clone(),
                mime_type: self.mime_type.clone(),
            });
        }
        Ok(())
    }

    /// Name given to the derived, preprocessed upload.
    pub fn processed_name(&self) -> String {
        format!("processed_{}", self.original_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn new_records_size_and_identity() {
        let a = ImageAsset::new("scan.png", "image/png", vec![1, 2, 3]);
        let b = ImageAsset::new("scan.png", "image/png", vec![1, 2, 3]);
        assert_eq!(a.size_bytes, 3);
        assert_ne!(a.id, b.id);
        assert!(a.last_modified.is_none());
    }

    #[test]
    fn image_mime_detection() {
        assert!(ImageAsset::new("a.png", "image/png", vec![]).is_image());
        assert!(ImageAsset::new("a.tif", "image/tiff", vec![]).is_image());
        assert!(!ImageAsset::new("a.pdf", "application/pdf", vec![]).is_image());
    }

    #[test]
    fn upload_limits_reject_oversized() {
        let big = ImageAsset::new("big.png", "image/png", vec![0; (MAX_UPLOAD_BYTES + 1) as usize]);
        assert!(matches!(
            big.check_upload_limits(),
            Err(ModelError::TooLarge { .. })
        ));
    }

    #[test]
    fn upload_limits_reject_unaccepted_format() {
        let tiff = ImageAsset::new("scan.tiff", "image/tiff", vec![0; 10]);
        let err = tiff.check_upload_limits().unwrap_err();
        assert!(err.to_string().contains("image/tiff"));
    }

    #[test]
    fn upload_limits_accept_png() {
        let png = ImageAsset::new("scan.png", "image/png", vec![0; 10]);
        assert!(png.check_upload_limits().is_ok());
    }

    #[test]
    fn lab_limits_also_accept_pdf() {
        let pdf = ImageAsset::new("cbc.pdf", "application/pdf", vec![0; 10]);
        assert!(pdf.check_lab_upload_limits().is_ok());
        assert!(matches!(
            pdf.check_upload_limits(),
            Err(ModelError::UnsupportedFormat { .. })
        ));
        let text = ImageAsset::new("cbc.txt", "text/plain", vec![0; 10]);
        assert!(text.check_lab_upload_limits().is_err());
    }

    #[test]
    fn from_path_guesses_mime_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chest_frontal.jpg");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"not really a jpeg").unwrap();

        let asset = ImageAsset::from_path(&path).unwrap();
        assert_eq!(asset.original_name, "chest_frontal.jpg");
        assert_eq!(asset.mime_type, "image/jpeg");
        assert_eq!(asset.bytes(), b"not really a jpeg");
        assert!(asset.last_modified.is_some());
    }

    #[test]
    fn from_path_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageAsset::from_path(&dir.path().join("missing.png")).unwrap_err();
        assert!(matches!(err, ModelError::Read { .. }));
    }

    #[test]
    fn processed_name_prefixes_original() {
        let asset = ImageAsset::new("knee.png", "image/png", vec![]);
        assert_eq!(asset.processed_name(), "processed_knee.png");
    }
}
