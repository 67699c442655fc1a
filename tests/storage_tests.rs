use sipakerte::storage::{MockStorageService, S3StorageClient, StorageService};
use uuid::Uuid;

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "foto/pas_foto.jpg";
        let result = mock.get_presigned_upload_url(key, "image/jpeg").await;
        assert!(result.is_ok());

        let url = result.unwrap();

        assert!(url.contains("signature=fake"));
        // The object key is embedded in the returned URL.
        assert!(url.contains(key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock.get_presigned_upload_url("foto/x.jpg", "image/jpeg").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let result = mock
            .get_presigned_upload_url("../../etc/passwd", "text/plain")
            .await;
        assert!(result.is_ok());

        let url = result.unwrap();

        // Path traversal segments never survive into the object key.
        assert!(!url.contains(".."));
    }

    #[test]
    fn test_mock_public_url_is_sanitized_too() {
        let mock = MockStorageService::new();
        let url = mock.public_url("foto/../secret.jpg");
        assert!(!url.contains(".."));
        assert!(url.contains("foto/secret.jpg"));
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    #[tokio::test]
    async fn test_s3_client_creation() {
        let _client = S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "admin",
            "password",
            "sipakerte-test",
        )
        .await;
        // Just testing that construction doesn't panic.
    }

    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        let client = S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "admin",
            "password",
            "sipakerte-test",
        )
        .await;

        let key = format!("foto/{}.jpg", Uuid::new_v4());
        let result = client.get_presigned_upload_url(&key, "image/jpeg").await;

        // Presigning is a local operation; no MinIO needs to be running.
        assert!(result.is_ok());

        let url = result.unwrap();
        assert!(url.contains("sipakerte-test"));
        assert!(url.contains(&key));
    }

    #[tokio::test]
    async fn test_s3_public_url_shape() {
        let client = S3StorageClient::new(
            "http://localhost:9000/",
            "us-east-1",
            "admin",
            "password",
            "sipakerte-test",
        )
        .await;

        assert_eq!(
            client.public_url("foto/a.jpg"),
            "http://localhost:9000/sipakerte-test/foto/a.jpg"
        );
    }
}
