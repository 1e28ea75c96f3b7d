use futures::future::join_all;
use serde_json::json;

use crate::backend::{unique_id, AdminClient, Query, SessionClient};
use crate::error::{AppError, Result};
use crate::models::{
    compose_file_name, get_file_type, FileAction, FileActionOutcome, FileList, FileRecord,
    GetFilesParams, IncomingFile, NewFileDocument, TotalSpace, UploadBatchResult, UploadNotice,
    UserRecord, DEFAULT_FILE_LIMIT, DEFAULT_SORT,
};
use crate::revalidate::Revalidator;
use crate::services::UserService;

/// Page size used when walking every record a user owns
const USAGE_PAGE_SIZE: usize = 100;

/// File actions
pub struct FileService;

impl FileService {
    /// Store the blob, then its metadata record. If the record cannot be
    /// created the blob is deleted again and the record error returned.
    pub async fn upload_file(
        admin: &AdminClient,
        revalidator: &Revalidator,
        file: IncomingFile,
        owner_id: &str,
        account_id: &str,
        path: &str,
    ) -> Result<FileRecord> {
        let blob = admin
            .storage
            .create_file(&unique_id(), &file.name, file.data)
            .await
            .map_err(|e| {
                tracing::error!("Failed to store blob for {}: {}", file.name, e);
                e
            })?;

        let (file_type, extension) = get_file_type(&blob.name);
        let doc = NewFileDocument {
            file_type,
            name: blob.name.clone(),
            url: admin.storage.view_url(&blob.id),
            extension,
            size: blob.size_original,
            owner: owner_id.to_string(),
            account_id: account_id.to_string(),
            users: Vec::new(),
            bucket_file_id: blob.id.clone(),
        };

        let created = match admin
            .databases
            .create_document(&admin.collections.files, &unique_id(), serde_json::to_value(doc)?)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                tracing::error!("Failed to create file record for blob {}: {}", blob.id, e);
                if let Err(rollback) = admin.storage.delete_file(&blob.id).await {
                    tracing::error!("Failed to remove orphaned blob {}: {}", blob.id, rollback);
                }
                return Err(e);
            }
        };

        revalidator.revalidate_path(path);
        created.into_typed()
    }

    /// Upload several files concurrently. Files over `max_file_size` are
    /// rejected without touching the backend.
    pub async fn upload_batch(
        admin: &AdminClient,
        revalidator: &Revalidator,
        files: Vec<IncomingFile>,
        owner: &UserRecord,
        path: &str,
        max_file_size: u64,
    ) -> UploadBatchResult {
        let mut result = UploadBatchResult::default();
        let mut accepted = Vec::new();

        for file in files {
            if file.size > max_file_size {
                result.rejected.push(UploadNotice {
                    message: format!(
                        "{} is too large. Max size is {}MB.",
                        file.name,
                        max_file_size / (1024 * 1024)
                    ),
                    name: file.name,
                });
            } else {
                accepted.push(file);
            }
        }

        let uploads = accepted.into_iter().map(|file| async move {
            let name = file.name.clone();
            let outcome =
                Self::upload_file(admin, revalidator, file, &owner.id, &owner.account_id, path).await;
            (name, outcome)
        });

        for (name, outcome) in join_all(uploads).await {
            match outcome {
                Ok(record) => result.uploaded.push(record),
                Err(e) => result.failed.push(UploadNotice {
                    name,
                    message: e.to_string(),
                }),
            }
        }

        result
    }

    /// Queries for a listing: records the user owns or that are shared
    /// with their email, narrowed by type and name, sorted and capped.
    pub fn build_file_queries(user: &UserRecord, params: &GetFilesParams) -> Vec<Query> {
        let mut queries = vec![Query::or(vec![
            Query::equal("owner", [user.id.as_str()]),
            Query::contains("users", [user.email.as_str()]),
        ])];

        if !params.types.is_empty() {
            queries.push(Query::equal("type", params.types.iter().map(|t| t.as_str())));
        }
        if !params.search_text.is_empty() {
            queries.push(Query::contains("name", [params.search_text.as_str()]));
        }
        queries.push(Query::limit(params.limit.unwrap_or(DEFAULT_FILE_LIMIT)));

        let sort_text = if params.sort_text.is_empty() {
            DEFAULT_SORT
        } else {
            params.sort_text.as_str()
        };
        let (sort_by, order_by) = sort_text.rsplit_once('-').unwrap_or((sort_text, "desc"));
        queries.push(if order_by == "asc" {
            Query::order_asc(sort_by)
        } else {
            Query::order_desc(sort_by)
        });

        queries
    }

    /// Files visible to the caller
    pub async fn get_files(
        admin: &AdminClient,
        session: Option<&SessionClient>,
        params: GetFilesParams,
    ) -> Result<FileList> {
        let user = UserService::require_current_user(admin, session).await?;
        let queries = Self::build_file_queries(&user, &params);

        let result = admin
            .databases
            .list_documents(&admin.collections.files, &queries)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list files for {}: {}", user.id, e);
                e
            })?;

        Ok(FileList {
            total: result.total,
            documents: result.into_typed()?,
        })
    }

    pub async fn get_file(admin: &AdminClient, file_id: &str) -> Result<FileRecord> {
        admin
            .databases
            .get_document(&admin.collections.files, file_id)
            .await?
            .into_typed()
    }

    /// A record the user owns or that is shared with them. Other records
    /// are reported as missing.
    pub async fn get_visible_file(
        admin: &AdminClient,
        user: &UserRecord,
        file_id: &str,
    ) -> Result<FileRecord> {
        let file = Self::get_file(admin, file_id).await?;
        if file.owner != user.id && !file.users.contains(&user.email) {
            tracing::warn!("User {} has no access to file {}", user.id, file_id);
            return Err(AppError::NotFound("File not found".to_string()));
        }
        Ok(file)
    }

    /// The record a blob belongs to, if it is visible to the user
    pub async fn get_visible_file_by_blob(
        admin: &AdminClient,
        user: &UserRecord,
        bucket_file_id: &str,
    ) -> Result<FileRecord> {
        let result = admin
            .databases
            .list_documents(
                &admin.collections.files,
                &[
                    Query::equal("bucketFileId", [bucket_file_id]),
                    Query::or(vec![
                        Query::equal("owner", [user.id.as_str()]),
                        Query::contains("users", [user.email.as_str()]),
                    ]),
                    Query::limit(1),
                ],
            )
            .await?;

        result
            .into_typed::<FileRecord>()?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }

    pub async fn rename_file(
        admin: &AdminClient,
        revalidator: &Revalidator,
        user: &UserRecord,
        file_id: &str,
        name: &str,
        extension: &str,
        path: &str,
    ) -> Result<FileRecord> {
        Self::get_visible_file(admin, user, file_id).await?;

        let new_name = compose_file_name(name, extension);
        let updated = admin
            .databases
            .update_document(&admin.collections.files, file_id, json!({ "name": new_name }))
            .await
            .map_err(|e| {
                tracing::error!("Failed to rename file {}: {}", file_id, e);
                e
            })?;

        revalidator.revalidate_path(path);
        updated.into_typed()
    }

    /// Replace the shared-with list wholesale
    pub async fn update_file_users(
        admin: &AdminClient,
        revalidator: &Revalidator,
        user: &UserRecord,
        file_id: &str,
        emails: Vec<String>,
        path: &str,
    ) -> Result<FileRecord> {
        Self::get_visible_file(admin, user, file_id).await?;

        let updated = admin
            .databases
            .update_document(&admin.collections.files, file_id, json!({ "users": emails }))
            .await
            .map_err(|e| {
                tracing::error!("Failed to update users of file {}: {}", file_id, e);
                e
            })?;

        revalidator.revalidate_path(path);
        updated.into_typed()
    }

    /// Delete the record, then its blob. A failure between the two steps
    /// leaves the blob orphaned.
    pub async fn delete_file(
        admin: &AdminClient,
        revalidator: &Revalidator,
        user: &UserRecord,
        file_id: &str,
        bucket_file_id: &str,
        path: &str,
    ) -> Result<()> {
        let file = Self::get_visible_file(admin, user, file_id).await?;
        if file.bucket_file_id != bucket_file_id {
            return Err(AppError::BadRequest(format!(
                "Blob {} does not belong to file {}",
                bucket_file_id, file_id
            )));
        }

        admin
            .databases
            .delete_document(&admin.collections.files, file_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete file record {}: {}", file_id, e);
                e
            })?;

        admin.storage.delete_file(bucket_file_id).await.map_err(|e| {
            tracing::error!("Failed to delete blob {}: {}", bucket_file_id, e);
            e
        })?;

        revalidator.revalidate_path(path);
        Ok(())
    }

    /// Usage per type bucket over every record the caller owns
    pub async fn get_total_space_used(
        admin: &AdminClient,
        session: Option<&SessionClient>,
    ) -> Result<TotalSpace> {
        let user = UserService::require_current_user(admin, session).await?;
        let mut total_space = TotalSpace::default();
        let mut offset = 0;

        loop {
            let page = admin
                .databases
                .list_documents(
                    &admin.collections.files,
                    &[
                        Query::equal("owner", [user.id.as_str()]),
                        Query::order_asc("$id"),
                        Query::limit(USAGE_PAGE_SIZE),
                        Query::offset(offset),
                    ],
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to calculate storage usage for {}: {}", user.id, e);
                    e
                })?;

            let total = page.total as usize;
            let files: Vec<FileRecord> = page.into_typed()?;
            if files.is_empty() {
                break;
            }
            offset += files.len();
            for file in &files {
                total_space.add(file);
            }
            if offset >= total {
                break;
            }
        }

        Ok(total_space)
    }

    /// Run one of the per-file actions
    pub async fn dispatch(
        admin: &AdminClient,
        revalidator: &Revalidator,
        user: &UserRecord,
        file_id: &str,
        action: FileAction,
        path: &str,
    ) -> Result<FileActionOutcome> {
        match action {
            FileAction::Rename { name, extension } => {
                let file =
                    Self::rename_file(admin, revalidator, user, file_id, &name, &extension, path).await?;
                Ok(FileActionOutcome::Record { file })
            }
            FileAction::Share { emails } => {
                let file =
                    Self::update_file_users(admin, revalidator, user, file_id, emails, path).await?;
                Ok(FileActionOutcome::Record { file })
            }
            FileAction::Delete { bucket_file_id } => {
                Self::delete_file(admin, revalidator, user, file_id, &bucket_file_id, path).await?;
                Ok(FileActionOutcome::Deleted {
                    id: file_id.to_string(),
                })
            }
            FileAction::Details => {
                let file = Self::get_visible_file(admin, user, file_id).await?;
                Ok(FileActionOutcome::Record { file })
            }
            FileAction::Download => {
                let file = Self::get_visible_file(admin, user, file_id).await?;
                Ok(FileActionOutcome::Download {
                    url: admin.storage.download_url(&file.bucket_file_id),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileType, TOTAL_SPACE_QUOTA};
    use crate::testing::{
        blob_count, failing_backend, failing_blob_delete_backend, failing_rollback_backend, sign_in,
        test_backend, TestBackend,
    };
    use bytes::Bytes;

    fn incoming(name: &str, data: &'static [u8]) -> IncomingFile {
        IncomingFile {
            name: name.to_string(),
            size: data.len() as u64,
            data: Bytes::from_static(data),
        }
    }

    async fn upload(t: &TestBackend, user: &UserRecord, name: &str, data: &'static [u8]) -> FileRecord {
        FileService::upload_file(
            &t.backend.admin_client(),
            &Revalidator::new(),
            incoming(name, data),
            &user.id,
            &user.account_id,
            "/",
        )
        .await
        .unwrap()
    }

    async fn user_for(t: &TestBackend, session: &SessionClient) -> UserRecord {
        UserService::get_current_user(&t.backend.admin_client(), Some(session))
            .await
            .unwrap()
    }

    #[test]
    fn test_build_file_queries() {
        let user = UserRecord {
            id: "u1".to_string(),
            full_name: "A".to_string(),
            email: "a@example.com".to_string(),
            avatar: String::new(),
            account_id: "acc".to_string(),
        };

        let queries = FileService::build_file_queries(&user, &GetFilesParams::default());
        assert_eq!(
            queries,
            vec![
                Query::or(vec![
                    Query::equal("owner", ["u1"]),
                    Query::contains("users", ["a@example.com"]),
                ]),
                Query::limit(DEFAULT_FILE_LIMIT),
                Query::order_desc("$updatedAt"),
            ]
        );

        let params = GetFilesParams {
            types: vec![FileType::Video, FileType::Audio],
            search_text: "trip".to_string(),
            sort_text: "name-asc".to_string(),
            limit: Some(3),
        };
        let queries = FileService::build_file_queries(&user, &params);
        assert_eq!(queries[1], Query::equal("type", ["video", "audio"]));
        assert_eq!(queries[2], Query::contains("name", ["trip"]));
        assert_eq!(queries[3], Query::limit(3));
        assert_eq!(queries[4], Query::order_asc("name"));
    }

    #[tokio::test]
    async fn test_upload_creates_record() {
        let t = test_backend().await;
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let user = user_for(&t, &session).await;

        let mut rx = t.revalidator.subscribe();
        let record = FileService::upload_file(
            &t.backend.admin_client(),
            &t.revalidator,
            incoming("Photo.JPG", b"jpeg-bytes"),
            &user.id,
            &user.account_id,
            "/images",
        )
        .await
        .unwrap();

        assert_eq!(record.name, "Photo.JPG");
        assert_eq!(record.file_type, FileType::Image);
        assert_eq!(record.extension, "jpg");
        assert_eq!(record.size, 10);
        assert_eq!(record.owner, user.id);
        assert!(record.users.is_empty());
        assert_eq!(record.url, format!("/api/v1/blobs/{}/view", record.bucket_file_id));
        assert_eq!(rx.recv().await.unwrap(), "/images");
        assert_eq!(blob_count(&t), 1);
    }

    #[tokio::test]
    async fn test_failed_record_creation_removes_blob() {
        let t = failing_backend().await;
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let user = user_for(&t, &session).await;

        let err = FileService::upload_file(
            &t.backend.admin_client(),
            &t.revalidator,
            incoming("a.txt", b"abc"),
            &user.id,
            &user.account_id,
            "/",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(blob_count(&t), 0);
    }

    #[tokio::test]
    async fn test_failed_rollback_keeps_record_error() {
        let t = failing_rollback_backend().await;
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let user = user_for(&t, &session).await;

        let err = FileService::upload_file(
            &t.backend.admin_client(),
            &t.revalidator,
            incoming("a.txt", b"abc"),
            &user.id,
            &user.account_id,
            "/",
        )
        .await
        .unwrap_err();

        // the record error surfaces, not the blob store's
        match err {
            AppError::Internal(msg) => assert_eq!(msg, "document store unavailable"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(blob_count(&t), 1);
    }

    #[tokio::test]
    async fn test_upload_batch_rejects_oversized() {
        let t = test_backend().await;
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let user = user_for(&t, &session).await;
        let big = IncomingFile {
            name: "huge.mp4".to_string(),
            size: 60 * 1024 * 1024,
            data: Bytes::new(),
        };

        let result = FileService::upload_batch(
            &t.backend.admin_client(),
            &t.revalidator,
            vec![big, incoming("a.txt", b"a"), incoming("b.png", b"bb")],
            &user,
            "/",
            50 * 1024 * 1024,
        )
        .await;

        assert_eq!(result.uploaded.len(), 2);
        assert!(result.failed.is_empty());
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].message, "huge.mp4 is too large. Max size is 50MB.");
        assert_eq!(blob_count(&t), 2);
    }

    #[tokio::test]
    async fn test_get_files_isolation() {
        let t = test_backend().await;
        let admin = t.backend.admin_client();
        let ann_session = sign_in(&t, "Ann", "ann@example.com").await;
        let bob_session = sign_in(&t, "Bob", "bob@example.com").await;
        let ann = user_for(&t, &ann_session).await;
        let bob = user_for(&t, &bob_session).await;

        let shared = upload(&t, &ann, "shared.txt", b"1").await;
        upload(&t, &ann, "private.txt", b"2").await;
        upload(&t, &bob, "bobs.txt", b"3").await;

        FileService::update_file_users(
            &admin,
            &t.revalidator,
            &ann,
            &shared.id,
            vec!["bob@example.com".to_string()],
            "/",
        )
        .await
        .unwrap();

        let ann_files = FileService::get_files(&admin, Some(&ann_session), GetFilesParams::default())
            .await
            .unwrap();
        assert_eq!(ann_files.total, 2);
        assert!(ann_files.documents.iter().all(|f| f.owner == ann.id));

        let bob_files = FileService::get_files(&admin, Some(&bob_session), GetFilesParams::default())
            .await
            .unwrap();
        let mut names: Vec<&str> = bob_files.documents.iter().map(|f| f.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["bobs.txt", "shared.txt"]);
        assert!(bob_files
            .documents
            .iter()
            .all(|f| f.owner == bob.id || f.users.contains(&bob.email)));
    }

    #[tokio::test]
    async fn test_get_files_filters_and_default_sort() {
        let t = test_backend().await;
        let admin = t.backend.admin_client();
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let ann = user_for(&t, &session).await;

        let first = upload(&t, &ann, "first.png", b"1").await;
        let second = upload(&t, &ann, "second.png", b"2").await;
        upload(&t, &ann, "notes.txt", b"3").await;

        // touch the older file so it becomes the most recently updated
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        FileService::rename_file(&admin, &t.revalidator, &ann, &first.id, "first", "png", "/")
            .await
            .unwrap();

        let images = FileService::get_files(
            &admin,
            Some(&session),
            GetFilesParams {
                types: vec![FileType::Image],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let ids: Vec<&str> = images.documents.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);

        let searched = FileService::get_files(
            &admin,
            Some(&session),
            GetFilesParams {
                search_text: "note".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(searched.total, 1);
        assert_eq!(searched.documents[0].name, "notes.txt");
    }

    #[tokio::test]
    async fn test_get_files_requires_user() {
        let t = test_backend().await;
        let err = FileService::get_files(&t.backend.admin_client(), None, GetFilesParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_rename_and_share_overwrite() {
        let t = test_backend().await;
        let admin = t.backend.admin_client();
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let ann = user_for(&t, &session).await;
        let file = upload(&t, &ann, "draft.txt", b"x").await;

        let renamed =
            FileService::rename_file(&admin, &t.revalidator, &ann, &file.id, "final", "md", "/")
                .await
                .unwrap();
        assert_eq!(renamed.name, "final.md");

        let renamed =
            FileService::rename_file(&admin, &t.revalidator, &ann, &file.id, "README", "", "/")
                .await
                .unwrap();
        assert_eq!(renamed.name, "README");

        let emails = vec!["a@example.com".to_string(), "b@example.com".to_string()];
        FileService::update_file_users(&admin, &t.revalidator, &ann, &file.id, emails, "/")
            .await
            .unwrap();
        let shared = FileService::update_file_users(
            &admin,
            &t.revalidator,
            &ann,
            &file.id,
            vec!["c@example.com".to_string()],
            "/",
        )
        .await
        .unwrap();
        assert_eq!(shared.users, vec!["c@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_blob() {
        let t = test_backend().await;
        let admin = t.backend.admin_client();
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let ann = user_for(&t, &session).await;
        let file = upload(&t, &ann, "gone.txt", b"x").await;

        FileService::delete_file(&admin, &t.revalidator, &ann, &file.id, &file.bucket_file_id, "/")
            .await
            .unwrap();
        assert_eq!(blob_count(&t), 0);
        assert!(matches!(
            FileService::get_file(&admin, &file.id).await,
            Err(AppError::NotFound(_))
        ));

        // record already gone: the blob step is never reached
        let err =
            FileService::delete_file(&admin, &t.revalidator, &ann, &file.id, &file.bucket_file_id, "/")
                .await
                .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_with_failing_blob_step_orphans_blob() {
        let t = failing_blob_delete_backend().await;
        let admin = t.backend.admin_client();
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let ann = user_for(&t, &session).await;
        let file = upload(&t, &ann, "stuck.txt", b"x").await;

        let err =
            FileService::delete_file(&admin, &t.revalidator, &ann, &file.id, &file.bucket_file_id, "/")
                .await
                .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        assert!(matches!(
            FileService::get_file(&admin, &file.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(blob_count(&t), 1);
    }

    #[tokio::test]
    async fn test_actions_limited_to_visible_files() {
        let t = test_backend().await;
        let admin = t.backend.admin_client();
        let ann_session = sign_in(&t, "Ann", "ann@example.com").await;
        let bob_session = sign_in(&t, "Bob", "bob@example.com").await;
        let ann = user_for(&t, &ann_session).await;
        let bob = user_for(&t, &bob_session).await;
        let file = upload(&t, &ann, "secret.txt", b"abc").await;

        let err = FileService::rename_file(&admin, &t.revalidator, &bob, &file.id, "pwned", "", "/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = FileService::delete_file(&admin, &t.revalidator, &bob, &file.id, &file.bucket_file_id, "/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = FileService::dispatch(&admin, &t.revalidator, &bob, &file.id, FileAction::Download, "/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(FileService::get_visible_file_by_blob(&admin, &bob, &file.bucket_file_id)
            .await
            .is_err());

        assert_eq!(FileService::get_file(&admin, &file.id).await.unwrap().name, "secret.txt");
        assert_eq!(blob_count(&t), 1);

        // once shared, the file is Bob's to act on too
        FileService::update_file_users(
            &admin,
            &t.revalidator,
            &ann,
            &file.id,
            vec![bob.email.clone()],
            "/",
        )
        .await
        .unwrap();
        let found = FileService::get_visible_file_by_blob(&admin, &bob, &file.bucket_file_id)
            .await
            .unwrap();
        assert_eq!(found.id, file.id);
    }

    #[tokio::test]
    async fn test_delete_rejects_foreign_blob() {
        let t = test_backend().await;
        let admin = t.backend.admin_client();
        let ann_session = sign_in(&t, "Ann", "ann@example.com").await;
        let bob_session = sign_in(&t, "Bob", "bob@example.com").await;
        let ann = user_for(&t, &ann_session).await;
        let bob = user_for(&t, &bob_session).await;
        let anns = upload(&t, &ann, "anns.txt", b"a").await;
        let bobs = upload(&t, &bob, "bobs.txt", b"b").await;

        let err =
            FileService::delete_file(&admin, &t.revalidator, &bob, &bobs.id, &anns.bucket_file_id, "/")
                .await
                .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(blob_count(&t), 2);
        assert!(FileService::get_file(&admin, &bobs.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_total_space_sums_buckets() {
        let t = test_backend().await;
        let admin = t.backend.admin_client();
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let ann = user_for(&t, &session).await;

        upload(&t, &ann, "a.png", b"1234").await;
        upload(&t, &ann, "b.pdf", b"12").await;
        upload(&t, &ann, "c.mp3", b"123").await;
        upload(&t, &ann, "d.zip", b"1").await;

        let other = sign_in(&t, "Bob", "bob@example.com").await;
        let bob = user_for(&t, &other).await;
        upload(&t, &bob, "e.png", b"123456789").await;

        let total = FileService::get_total_space_used(&admin, Some(&session)).await.unwrap();
        assert_eq!(total.image.size, 4);
        assert_eq!(total.document.size, 2);
        assert_eq!(total.audio.size, 3);
        assert_eq!(total.other.size, 1);
        assert_eq!(total.video.size, 0);
        assert!(total.video.latest_date.is_none());
        assert_eq!(
            total.used,
            total.image.size + total.document.size + total.video.size + total.audio.size + total.other.size
        );
        assert_eq!(total.all, TOTAL_SPACE_QUOTA);

        assert!(matches!(
            FileService::get_total_space_used(&admin, None).await,
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_total_space_pages_through_all_files() {
        let t = test_backend().await;
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let ann = user_for(&t, &session).await;

        for i in 0..(USAGE_PAGE_SIZE + 5) {
            let name = format!("f{}.txt", i);
            FileService::upload_file(
                &t.backend.admin_client(),
                &t.revalidator,
                IncomingFile {
                    name,
                    size: 1,
                    data: Bytes::from_static(b"x"),
                },
                &ann.id,
                &ann.account_id,
                "/",
            )
            .await
            .unwrap();
        }

        let total = FileService::get_total_space_used(&t.backend.admin_client(), Some(&session))
            .await
            .unwrap();
        assert_eq!(total.document.size, (USAGE_PAGE_SIZE + 5) as i64);
    }

    #[tokio::test]
    async fn test_dispatch_actions() {
        let t = test_backend().await;
        let admin = t.backend.admin_client();
        let session = sign_in(&t, "Ann", "ann@example.com").await;
        let ann = user_for(&t, &session).await;
        let file = upload(&t, &ann, "a.txt", b"x").await;

        match FileService::dispatch(&admin, &t.revalidator, &ann, &file.id, FileAction::Details, "/")
            .await
            .unwrap()
        {
            FileActionOutcome::Record { file: details } => assert_eq!(details.id, file.id),
            other => panic!("unexpected outcome: {:?}", other),
        }

        match FileService::dispatch(&admin, &t.revalidator, &ann, &file.id, FileAction::Download, "/")
            .await
            .unwrap()
        {
            FileActionOutcome::Download { url } => {
                assert_eq!(url, format!("/api/v1/blobs/{}/download", file.bucket_file_id))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let action = FileAction::Delete {
            bucket_file_id: file.bucket_file_id.clone(),
        };
        match FileService::dispatch(&admin, &t.revalidator, &ann, &file.id, action, "/")
            .await
            .unwrap()
        {
            FileActionOutcome::Deleted { id } => assert_eq!(id, file.id),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(blob_count(&t), 0);
    }
}
