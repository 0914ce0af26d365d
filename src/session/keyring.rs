use std::collections::HashMap;

use super::store::{CredentialStore, StoreError};

pub(crate) const SERVICE_NAME: &str = "taskdeck";

/// Bearer token held in the desktop keyring via Secret Service, one item per API server.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    server: String,
}

impl KeyringStore {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    fn attributes(&self) -> HashMap<&str, &str> {
        let mut attrs = HashMap::new();
        attrs.insert("service", SERVICE_NAME);
        attrs.insert("server", self.server.as_str());
        attrs
    }
}

async fn connect() -> Result<oo7::Keyring, StoreError> {
    oo7::Keyring::new()
        .await
        .map_err(|e| StoreError::Keyring(format!("Failed to connect to keyring: {}", e)))
}

impl CredentialStore for KeyringStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        let keyring = connect().await?;

        let items = keyring
            .search_items(&self.attributes())
            .await
            .map_err(|e| StoreError::Keyring(format!("Failed to search keyring: {}", e)))?;

        if let Some(item) = items.first() {
            let secret_bytes = item
                .secret()
                .await
                .map_err(|e| StoreError::Keyring(format!("Failed to read secret: {}", e)))?;
            let token = String::from_utf8(secret_bytes.to_vec())
                .map_err(|e| StoreError::Keyring(format!("Invalid UTF-8 in secret: {}", e)))?;
            if !token.is_empty() {
                return Ok(Some(token));
            }
        }

        Ok(None)
    }

    async fn save(&self, token: &str) -> Result<(), StoreError> {
        let keyring = connect().await?;

        keyring
            .create_item(
                &format!("Taskdeck API token ({})", self.server),
                &self.attributes(),
                token.as_bytes(),
                true, // replace existing
            )
            .await
            .map_err(|e| StoreError::Keyring(format!("Failed to store token: {}", e)))?;

        log::debug!("Stored API token in keyring for {}", self.server);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let keyring = connect().await?;

        let items = keyring
            .search_items(&self.attributes())
            .await
            .map_err(|e| StoreError::Keyring(format!("Failed to search keyring: {}", e)))?;

        for item in items {
            item.delete()
                .await
                .map_err(|e| StoreError::Keyring(format!("Failed to delete token: {}", e)))?;
        }

        Ok(())
    }
}
