//! Registrar that mints records locally.
//!
//! Stands in for the remote media service: it validates the file name,
//! assigns a record id and an object key, and points the target at the
//! local storage directory.

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use pixdrop_protocol::{ConfirmedRecord, RecordId, Registration, TargetDescriptor};
use pixdrop_transfer::KEY_FIELD;
use pixdrop_upload::{RegistrationError, RegistrationFuture, RemoteRegistrar};

pub struct LocalRegistrar {
    storage_url: String,
    public_base_url: String,
    allowed_extensions: Vec<String>,
}

impl LocalRegistrar {
    pub fn new(storage_dir: &Path, public_base_url: &str, allowed_extensions: &[String]) -> Self {
        Self {
            storage_url: format!("file://{}", storage_dir.display()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn validate(&self, file_name: &str) -> Result<(), RegistrationError> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(RegistrationError::Validation(format!(
                "invalid file name: {file_name:?}"
            )));
        }
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !self.allowed_extensions.iter().any(|e| *e == extension) {
            return Err(RegistrationError::Validation(format!(
                "file type not allowed: {file_name}"
            )));
        }
        Ok(())
    }

    fn mint(&self, file_name: &str) -> Registration {
        let id = Uuid::new_v4();
        let key = format!("uploads/{id}/{file_name}");

        let mut metadata = serde_json::Map::new();
        metadata.insert("key".into(), serde_json::Value::String(key.clone()));

        Registration {
            target: TargetDescriptor::new(&self.storage_url).with_field(KEY_FIELD, key.clone()),
            record: ConfirmedRecord {
                id: RecordId::new(id.to_string()),
                client_file: file_name.to_string(),
                remote_url: format!("{}/{key}", self.public_base_url),
                created_at: Utc::now(),
                metadata,
                preview_correlation_id: None,
            },
        }
    }
}

impl RemoteRegistrar for LocalRegistrar {
    fn register<'a>(&'a self, file_name: &'a str) -> RegistrationFuture<'a> {
        Box::pin(async move {
            self.validate(file_name)?;
            let registration = self.mint(file_name);
            tracing::debug!(
                name = %file_name,
                record = %registration.record.id,
                "record registered"
            );
            Ok(registration)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registrar() -> LocalRegistrar {
        LocalRegistrar::new(
            Path::new("/srv/pixdrop"),
            "https://media.example/",
            &["png".to_string(), ".JPG".to_string()],
        )
    }

    #[tokio::test]
    async fn registers_allowed_files() {
        let registration = registrar().register("Holiday.PNG").await.unwrap();

        let key = registration.target.field(KEY_FIELD).unwrap();
        assert!(key.starts_with("uploads/"));
        assert!(key.ends_with("/Holiday.PNG"));
        assert_eq!(registration.target.url, "file:///srv/pixdrop");

        let record = &registration.record;
        assert_eq!(record.client_file, "Holiday.PNG");
        assert_eq!(record.remote_url, format!("https://media.example/{key}"));
        assert_eq!(record.metadata["key"], key);
        assert!(record.preview_correlation_id.is_none());
    }

    #[tokio::test]
    async fn record_ids_are_unique() {
        let r = registrar();
        let a = r.register("a.jpg").await.unwrap();
        let b = r.register("a.jpg").await.unwrap();
        assert_ne!(a.record.id, b.record.id);
        assert_ne!(a.target.field(KEY_FIELD), b.target.field(KEY_FIELD));
    }

    #[tokio::test]
    async fn rejects_disallowed_extensions() {
        let r = registrar();
        assert!(matches!(
            r.register("notes.txt").await,
            Err(RegistrationError::Validation(_))
        ));
        assert!(matches!(
            r.register("README").await,
            Err(RegistrationError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let r = registrar();
        assert!(r.register("../a.png").await.is_err());
        assert!(r.register("dir\\a.png").await.is_err());
        assert!(r.register("").await.is_err());
    }
}
