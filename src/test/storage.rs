#[cfg(test)]
mod tests {
    use crate::storage::{LocalScanStorage, ScanStorage, sanitize_file_name};
    use std::path::PathBuf;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("admissions-registry-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("паспорт.pdf"), "паспорт.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\scans\\my scan.jpg"), "my_scan.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "scan");
    }

    #[rocket::async_test]
    async fn test_store_exists_delete() {
        let root = temp_root("store");
        let storage = LocalScanStorage::new(&root);

        let key = storage
            .store("аттестат.pdf", b"%PDF-1.4")
            .await
            .expect("Failed to store scan");

        assert!(key.starts_with("documents/"));
        assert!(key.ends_with("_аттестат.pdf"));
        assert!(storage.exists(&key).await.expect("Failed to check scan"));
        assert_eq!(
            std::fs::read(root.join(&key)).expect("Scan should be on disk"),
            b"%PDF-1.4"
        );

        storage.delete(&key).await.expect("Failed to delete scan");
        assert!(!storage.exists(&key).await.expect("Failed to check scan"));

        // Already gone is fine.
        storage.delete(&key).await.expect("Second delete should succeed");

        let _ = std::fs::remove_dir_all(root);
    }

    #[rocket::async_test]
    async fn test_keys_outside_media_root_are_refused() {
        let root = temp_root("escape");
        let storage = LocalScanStorage::new(root.join("media"));

        std::fs::create_dir_all(&root).expect("Failed to create temp root");
        let outside = root.join("secret.txt");
        std::fs::write(&outside, b"secret").expect("Failed to write file");

        assert!(
            !storage
                .exists("documents/../../secret.txt")
                .await
                .expect("Failed to check key")
        );
        assert!(!storage.exists("/etc/passwd").await.expect("Failed to check key"));

        storage
            .delete("documents/../../secret.txt")
            .await
            .expect("Refused delete should not error");
        assert!(outside.exists());

        let _ = std::fs::remove_dir_all(root);
    }
}
