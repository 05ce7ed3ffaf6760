use crate::domain::model::OrderFormState;
use crate::domain::ports::Storage;
use crate::utils::error::{PortalError, Result};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = Path::new(&self.base_path).join(path);
        let data = fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(full_path, data).await?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);
        match fs::remove_file(full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 訂單草稿，序列化為 `<name>.draft.json`
pub struct DraftStore<S: Storage> {
    storage: S,
}

impl<S: Storage> DraftStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn file_name(name: &str) -> Result<String> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PortalError::validation(format!(
                "draft name '{}' may only contain letters, digits, '-' and '_'",
                name
            )));
        }
        Ok(format!("{}.draft.json", name))
    }

    pub async fn save(&self, name: &str, form: &OrderFormState) -> Result<String> {
        let file_name = Self::file_name(name)?;
        let data = serde_json::to_vec_pretty(form)?;
        self.storage.write_file(&file_name, &data).await?;
        tracing::debug!("Draft saved to {}", file_name);
        Ok(file_name)
    }

    pub async fn load(&self, name: &str) -> Result<OrderFormState> {
        let file_name = Self::file_name(name)?;
        let data = self.storage.read_file(&file_name).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub async fn discard(&self, name: &str) -> Result<()> {
        let file_name = Self::file_name(name)?;
        self.storage.remove_file(&file_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{FieldAnswer, PaymentMethod};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_draft_round_trip_and_discard() {
        let dir = TempDir::new().unwrap();
        let store = DraftStore::new(LocalStorage::new(dir.path().to_str().unwrap().to_string()));

        let mut form = OrderFormState::for_service("article");
        form.set_answer("topic", FieldAnswer::Text("Rust".to_string()));
        form.toggle_add_on("images");
        form.select_payment(PaymentMethod::Checkout);

        let file_name = store.save("my-order", &form).await.unwrap();
        assert_eq!(file_name, "my-order.draft.json");
        assert!(dir.path().join("my-order.draft.json").exists());

        let loaded = store.load("my-order").await.unwrap();
        assert_eq!(loaded, form);

        store.discard("my-order").await.unwrap();
        assert!(!dir.path().join("my-order.draft.json").exists());
        // 重複刪除不是錯誤
        store.discard("my-order").await.unwrap();
    }

    #[tokio::test]
    async fn test_draft_name_with_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = DraftStore::new(LocalStorage::new(dir.path().to_str().unwrap().to_string()));
        let form = OrderFormState::default();
        assert!(store.save("../escape", &form).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_draft_is_io_error_and_dirs_are_created() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("drafts").join("2026");
        let store = DraftStore::new(LocalStorage::new(nested.to_str().unwrap().to_string()));

        assert!(matches!(
            store.load("nothing-here").await,
            Err(PortalError::IoError(_))
        ));

        store.save("first", &OrderFormState::default()).await.unwrap();
        assert!(nested.join("first.draft.json").exists());
    }

    #[tokio::test]
    async fn test_card_token_is_not_written_to_drafts() {
        let dir = TempDir::new().unwrap();
        let store = DraftStore::new(LocalStorage::new(dir.path().to_str().unwrap().to_string()));

        let mut form = OrderFormState::for_service("article");
        form.select_payment(PaymentMethod::Card {
            token: "tok_visa".to_string(),
        });
        store.save("card", &form).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("card.draft.json")).unwrap();
        assert!(!raw.contains("tok_visa"));
        let loaded = store.load("card").await.unwrap();
        assert_eq!(
            loaded.payment_method,
            Some(PaymentMethod::Card {
                token: String::new()
            })
        );
    }
}
