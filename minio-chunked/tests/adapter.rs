use bytes::Bytes;
use futures::StreamExt;

use minio_chunked::{
    BlobError, ByteRange, ByteStream, MemoryBlobStore, MinioAdapter, ObjectEntry, UploadConfig,
};

fn body(data: &[u8]) -> ByteStream {
    let data = Bytes::copy_from_slice(data);
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

async fn read_all(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

async fn setup() -> (MemoryBlobStore, MinioAdapter) {
    let store = MemoryBlobStore::new();
    let adapter = MinioAdapter::new(store.clone(), UploadConfig::default());
    adapter.create_bucket("media").await.unwrap();
    (store, adapter)
}

#[tokio::test]
async fn test_create_bucket_is_idempotent() {
    let (_store, adapter) = setup().await;

    adapter.create_bucket("media").await.unwrap();

    let info = adapter.bucket_info("media").await.unwrap().unwrap();
    assert_eq!(info.name, "media");
    assert!(info.creation_date.is_some());
    assert!(adapter.bucket_info("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upload_file_sets_content_type_from_suffix() {
    let (_store, adapter) = setup().await;

    adapter.upload_file("media", "cat.PNG", body(b"png")).await.unwrap();
    adapter.upload_stream("media", "raw", body(b"raw")).await.unwrap();

    let stat = adapter.file_status("media", "cat.PNG").await.unwrap();
    assert_eq!(stat.content_type.as_deref(), Some("image/png"));
    assert_eq!(stat.size_bytes, 3);
    assert_eq!(adapter.file_status("media", "raw").await.unwrap().content_type, None);
}

#[tokio::test]
async fn test_upload_local_file() {
    let (store, adapter) = setup().await;
    let path = std::env::temp_dir().join(format!("minio-chunked-{}.mp4", std::process::id()));
    tokio::fs::write(&path, b"frames").await.unwrap();

    adapter.upload_local_file("media", "clips/a.mp4", &path).await.unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    assert_eq!(store.object("media", "clips/a.mp4").unwrap(), b"frames".to_vec());
    let stat = adapter.file_status("media", "clips/a.mp4").await.unwrap();
    assert_eq!(stat.content_type.as_deref(), Some("video/mp4"));
}

#[tokio::test]
async fn test_file_and_folder_existence() {
    let (_store, adapter) = setup().await;

    adapter.create_folder("media", "/albums/2024").await.unwrap();
    adapter.upload_stream("media", "albums/2024/a.jpg", body(b"a")).await.unwrap();

    assert!(adapter.file_exists("media", "albums/2024/a.jpg").await);
    assert!(!adapter.file_exists("media", "albums/2024/b.jpg").await);
    assert!(!adapter.file_exists("nowhere", "a").await);

    assert!(adapter.folder_exists("media", "/albums").await);
    assert!(adapter.folder_exists("media", "/albums/2024").await);
    assert!(!adapter.folder_exists("media", "/photos").await);
    assert!(!adapter.folder_exists("media", "").await);
    assert!(!adapter.folder_exists("nowhere", "/albums").await);

    assert!(matches!(
        adapter.create_folder("media", "/").await,
        Err(BlobError::Invalid { .. })
    ));
}

#[tokio::test]
async fn test_listing_by_prefix() {
    let (_store, adapter) = setup().await;
    for name in ["docs/a.txt", "docs/b.txt", "docs/old/c.txt"] {
        adapter.upload_stream("media", name, body(b"x")).await.unwrap();
    }

    let flat = adapter.list_all_by_prefix("media", "docs/", false).await.unwrap();
    assert_eq!(
        flat,
        vec![
            ObjectEntry::object("docs/a.txt"),
            ObjectEntry::object("docs/b.txt"),
            ObjectEntry::dir("docs/old/"),
        ]
    );

    let deep: Vec<_> = adapter.files_by_prefix("media", "docs/", true).collect().await;
    assert_eq!(deep.len(), 3);
}

#[tokio::test]
async fn test_ranged_reads() {
    let (_store, adapter) = setup().await;
    adapter.upload_stream("media", "log", body(b"0123456789")).await.unwrap();

    let all = adapter.get_file_stream("media", "log", None).await.unwrap();
    assert_eq!(read_all(all).await, b"0123456789".to_vec());

    let window = adapter
        .get_file_stream("media", "log", Some(ByteRange::new(4, 3)))
        .await
        .unwrap();
    assert_eq!(read_all(window).await, b"456".to_vec());

    let tail = adapter
        .get_file_stream("media", "log", Some(ByteRange::from_offset(8)))
        .await
        .unwrap();
    assert_eq!(read_all(tail).await, b"89".to_vec());

    assert!(matches!(
        adapter.get_file_stream("media", "missing", None).await,
        Err(BlobError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_copy_and_remove() {
    let (store, adapter) = setup().await;
    adapter.create_bucket("backup").await.unwrap();
    adapter.upload_stream("media", "a", body(b"payload")).await.unwrap();

    adapter.copy_file("media", "a", "backup", "a.bak").await.unwrap();
    assert_eq!(store.object("backup", "a.bak").unwrap(), b"payload".to_vec());

    adapter.remove_file("media", "/a").await.unwrap();
    assert!(!adapter.file_exists("media", "a").await);
    assert!(matches!(
        adapter.remove_file("media", "/").await,
        Err(BlobError::Invalid { .. })
    ));
}

#[tokio::test]
async fn test_remove_files_reports_failures_only() {
    let (store, adapter) = setup().await;
    for name in ["x", "y", "z"] {
        adapter.upload_stream("media", name, body(b"1")).await.unwrap();
    }
    store.fail_delete("media", "y");

    let failures: Vec<_> = adapter
        .remove_files("media", vec!["x".into(), "y".into(), "z".into()])
        .collect()
        .await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].as_ref().unwrap().object_name, "y");
    assert_eq!(store.object_names("media"), vec!["y".to_string()]);
}

#[tokio::test]
async fn test_chunked_upload_through_adapter() {
    let (store, adapter) = setup().await;

    let first = adapter.upload_chunk(body(b"he"), 0, 2, "md5").await.unwrap();
    assert!(!first.all_completed);
    let last = adapter.upload_chunk(body(b"llo"), 1, 2, "md5").await.unwrap();
    assert!(last.all_completed);

    assert!(adapter.compose("media", "hello.txt", 2, "md5").await.unwrap());
    assert_eq!(store.object("media", "hello.txt").unwrap(), b"hello".to_vec());
    assert!(store.object_names(adapter.uploader().staging_bucket()).is_empty());
}
