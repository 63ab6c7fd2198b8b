use std::path::Path;

use chrono::Utc;
use quest_entity::image::DiskType;
use quest_entity::{image, social_profile, user, user_detail};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{error, info, warn};

use crate::api::error::InnerApiError;
use crate::api::request::UpdateProfileRequest;
use crate::api::response::UserProfile;
use crate::api::wrapper::ApiError;
use crate::utils::upload::{detect_image_type, save_image_locally, StoredFileGuard, UploadedFile};

/// 用户及其资料、图片和第三方账号
#[derive(Debug, Clone)]
pub struct ProfileGraph {
    pub user: user::Model,
    pub detail: Option<user_detail::Model>,
    pub image: Option<image::Model>,
    pub social_profiles: Vec<social_profile::Model>,
}

impl From<ProfileGraph> for UserProfile {
    fn from(graph: ProfileGraph) -> Self {
        UserProfile::new(graph.user, graph.detail, graph.image, graph.social_profiles)
    }
}

/// 加载未被软删除的用户及其关联数据
pub async fn load_profile_graph<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<Option<ProfileGraph>, DbErr> {
    let Some(user) = user::Entity::find_by_id(user_id)
        .filter(user::Column::DeletedAt.is_null())
        .one(conn)
        .await?
    else {
        return Ok(None);
    };
    let detail = user.find_related(user_detail::Entity).one(conn).await?;
    let image = match &detail {
        Some(detail) => detail.find_related(image::Entity).one(conn).await?,
        None => None,
    };
    let social_profiles = user
        .find_related(social_profile::Entity)
        .order_by_asc(social_profile::Column::Id)
        .all(conn)
        .await?;
    Ok(Some(ProfileGraph {
        user,
        detail,
        image,
        social_profiles,
    }))
}

/// 资料中可编辑的文本字段
#[derive(Debug, Clone, Default)]
struct DetailFields {
    address: String,
    city: String,
    road: String,
    dirty: bool,
}

impl DetailFields {
    fn from_model(detail: Option<&user_detail::Model>) -> Self {
        detail
            .map(|d| Self {
                address: d.address.clone(),
                city: d.city.clone(),
                road: d.road.clone(),
                dirty: false,
            })
            .unwrap_or_default()
    }

    /// 仅当新值非空且与当前值不同才修改
    fn apply(&mut self, request: &UpdateProfileRequest) {
        for (current, incoming) in [
            (&mut self.address, &request.address),
            (&mut self.city, &request.city),
            (&mut self.road, &request.road),
        ] {
            if !incoming.is_empty() && *current != *incoming {
                current.clone_from(incoming);
                self.dirty = true;
            }
        }
    }
}

fn new_detail(user_id: i32, fields: &DetailFields) -> user_detail::ActiveModel {
    let now = Utc::now();
    user_detail::ActiveModel {
        user_id: Set(user_id),
        address: Set(fields.address.clone()),
        city: Set(fields.city.clone()),
        road: Set(fields.road.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// 创建或原地更新资料对应的图片记录
async fn upsert_image<C: ConnectionTrait>(
    conn: &C,
    detail_id: i32,
    existing: Option<image::Model>,
    stored: &UploadedFile,
) -> Result<image::Model, DbErr> {
    let now = Utc::now();
    match existing {
        Some(existing) => {
            let mut active: image::ActiveModel = existing.into();
            active.path = Set(stored.path.clone());
            active.web_path = Set(stored.web_path.clone());
            active.disk_type = Set(stored.disk_type);
            active.original_name = Set(stored.original_name.clone());
            active.modified_name = Set(stored.modified_name.clone());
            active.updated_at = Set(now);
            active.update(conn).await
        }
        None => {
            image::ActiveModel {
                user_detail_id: Set(Some(detail_id)),
                path: Set(stored.path.clone()),
                web_path: Set(stored.web_path.clone()),
                disk_type: Set(stored.disk_type),
                original_name: Set(stored.original_name.clone()),
                modified_name: Set(stored.modified_name.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(conn)
            .await
        }
    }
}

/// 在一个事务中更新用户名、资料和头像，提交后重新读取完整资料
pub async fn update_profile_internal(
    db: &DatabaseConnection,
    user_id: i32,
    request: &UpdateProfileRequest,
    upload_dir: &Path,
) -> Result<UserProfile, ApiError> {
    let txn = db
        .begin()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to start transaction: {}", e)))?;

    let graph = load_profile_graph(&txn, user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to fetch user: {}", e)))?
        .ok_or_else(|| ApiError::from(InnerApiError::NotFound("User not found".to_string())))?;
    let ProfileGraph {
        mut user,
        mut detail,
        mut image,
        social_profiles,
    } = graph;

    if !request.name.is_empty() && request.name != user.name {
        let mut active: user::ActiveModel = user.into();
        active.name = Set(request.name.clone());
        active.updated_at = Set(Utc::now());
        user = active
            .update(&txn)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to update user name: {}", e)))?;
    }

    let mut fields = DetailFields::from_model(detail.as_ref());
    fields.apply(request);

    let mut guard = None;
    let mut replaced_file = None;
    if let Some(part) = &request.image {
        // 在任何写入之前校验文件类型
        detect_image_type(&part.data)?;

        let saved = match detail.take() {
            Some(saved) => saved,
            None => new_detail(user.id, &fields)
                .insert(&txn)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to create user details: {}", e)))?,
        };

        let stored = save_image_locally(upload_dir, part).await?;
        guard = Some(StoredFileGuard::new(&stored.path));

        replaced_file = image
            .as_ref()
            .filter(|old| old.disk_type == DiskType::Local && old.path != stored.path)
            .map(|old| old.path.clone());
        image = Some(
            upsert_image(&txn, saved.id, image.take(), &stored)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to save image record: {}", e)))?,
        );
        detail = Some(saved);
        fields.dirty = true;
    }

    let detail = match detail {
        None => Some(
            new_detail(user.id, &fields)
                .insert(&txn)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to update user details: {}", e)))?,
        ),
        Some(existing) if fields.dirty => {
            let mut active: user_detail::ActiveModel = existing.into();
            active.address = Set(fields.address.clone());
            active.city = Set(fields.city.clone());
            active.road = Set(fields.road.clone());
            active.updated_at = Set(Utc::now());
            Some(
                active
                    .update(&txn)
                    .await
                    .map_err(|e| ApiError::internal(format!("Failed to update user details: {}", e)))?,
            )
        }
        unchanged => unchanged,
    };

    txn.commit()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to commit transaction: {}", e)))?;
    if let Some(guard) = guard {
        guard.keep();
    }
    info!("用户 {} 的资料已更新", user_id);

    if let Some(path) = replaced_file {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("删除旧头像文件 {} 失败: {}", path, e);
        }
    }

    let committed = ProfileGraph {
        user,
        detail,
        image,
        social_profiles,
    };
    Ok(profile_after_commit(
        user_id,
        load_profile_graph(db, user_id).await,
        committed,
    ))
}

/// 事务已提交，重新读取失败时只记录错误，返回提交后的内存状态
fn profile_after_commit(
    user_id: i32,
    refetched: Result<Option<ProfileGraph>, DbErr>,
    committed: ProfileGraph,
) -> UserProfile {
    match refetched {
        Ok(Some(graph)) => graph.into(),
        Ok(None) => {
            error!("资料更新后重新读取用户 {} 失败: 用户不存在", user_id);
            committed.into()
        }
        Err(e) => {
            error!("资料更新后重新读取用户 {} 失败: {}", user_id, e);
            committed.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::database::memory_database;

    async fn insert_user(db: &DatabaseConnection, name: &str, email: &str) -> user::Model {
        let now = Utc::now();
        user::ActiveModel {
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            role: Set("user".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_profile_graph_hides_soft_deleted() {
        let db = memory_database().await;
        let alive = insert_user(&db, "Alice", "alice@example.com").await;
        let gone = insert_user(&db, "Bob", "bob@example.com").await;
        let mut active: user::ActiveModel = gone.clone().into();
        active.deleted_at = Set(Some(Utc::now()));
        active.update(&db).await.unwrap();

        let graph = load_profile_graph(&db, alive.id).await.unwrap().unwrap();
        assert_eq!(graph.user.name, "Alice");
        assert!(graph.detail.is_none());
        assert!(load_profile_graph(&db, gone.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_creates_detail_once() {
        let db = memory_database().await;
        let alice = insert_user(&db, "Alice", "alice@example.com").await;
        let dir = crate::utils::upload::tests::unique_temp_dir("profile");
        let request = UpdateProfileRequest {
            city: "Dhaka".to_string(),
            ..Default::default()
        };

        let profile = update_profile_internal(&db, alice.id, &request, &dir).await.unwrap();
        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.user_detail.as_ref().unwrap().city, "Dhaka");

        let again = update_profile_internal(&db, alice.id, &request, &dir).await.unwrap();
        assert_eq!(again.user_detail.unwrap().id, profile.user_detail.unwrap().id);
        assert_eq!(user_detail::Entity::find().count(&db).await.unwrap(), 1);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let db = memory_database().await;
        let dir = crate::utils::upload::tests::unique_temp_dir("profile-missing");
        let err = update_profile_internal(&db, 42, &UpdateProfileRequest::default(), &dir)
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refetch_failure_returns_committed_state() {
        use crate::utils::upload::tests::{unique_temp_dir, PNG_BYTES};
        use crate::utils::upload::FilePart;

        let db = memory_database().await;
        let alice = insert_user(&db, "Alice", "alice@example.com").await;
        let dir = unique_temp_dir("profile-refetch");
        let request = UpdateProfileRequest {
            name: "Alice Smith".to_string(),
            city: "Dhaka".to_string(),
            image: Some(FilePart {
                file_name: "me.png".to_string(),
                content_type: Some("image/png".to_string()),
                data: axum::body::Bytes::from_static(PNG_BYTES),
            }),
            ..Default::default()
        };
        update_profile_internal(&db, alice.id, &request, &dir).await.unwrap();
        let committed = load_profile_graph(&db, alice.id).await.unwrap().unwrap();
        let web_path = committed.image.as_ref().unwrap().web_path.clone();

        for refetched in [Ok(None), Err(DbErr::Custom("connection lost".to_string()))] {
            let profile = profile_after_commit(alice.id, refetched, committed.clone());
            assert_eq!(profile.name, "Alice Smith");
            let detail = profile.user_detail.unwrap();
            assert_eq!(detail.city, "Dhaka");
            assert_eq!(detail.image.unwrap().web_path, web_path);
        }

        // 重新读取成功时使用最新数据
        let mut stale = committed.clone();
        stale.user.name = "stale".to_string();
        let fresh = load_profile_graph(&db, alice.id).await;
        assert_eq!(profile_after_commit(alice.id, fresh, stale).name, "Alice Smith");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_detail_fields_apply() {
        let mut fields = DetailFields {
            address: "Old street".to_string(),
            city: "Dhaka".to_string(),
            road: String::new(),
            dirty: false,
        };
        fields.apply(&UpdateProfileRequest {
            city: "Dhaka".to_string(),
            ..Default::default()
        });
        assert!(!fields.dirty);

        fields.apply(&UpdateProfileRequest {
            road: "Road 5".to_string(),
            ..Default::default()
        });
        assert!(fields.dirty);
        assert_eq!(fields.address, "Old street");
        assert_eq!(fields.road, "Road 5");
    }
}
