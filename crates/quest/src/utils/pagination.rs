use std::str::FromStr;

use sea_orm::sea_query::Order;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Select, Value,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_SORT_BY: &str = "created_at";

/// 数据库绑定参数为有符号 64 位整数
const MAX_BIND_VALUE: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl From<SortOrder> for Order {
    fn from(value: SortOrder) -> Self {
        match value {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

#[derive(Error, Debug)]
pub enum PaginationError {
    #[error("invalid sortBy column: {0}")]
    InvalidSortBy(String),
    #[error("invalid sortOrder: {0}, expected asc or desc")]
    InvalidSortOrder(String),
    #[error("page {page} with limit {limit} is out of range")]
    OutOfRange { page: u64, limit: u64 },
    #[error("failed to count records: {0}")]
    Count(#[source] DbErr),
    #[error("failed to fetch records: {0}")]
    Fetch(#[source] DbErr),
}

impl PaginationError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSortBy(_) | Self::InvalidSortOrder(_) | Self::OutOfRange { .. }
        )
    }
}

/// 分页与排序参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOptions {
    pub page: u64,
    pub limit: u64,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort_by: DEFAULT_SORT_BY.to_string(),
            sort_order: SortOrder::Asc,
        }
    }
}

impl PaginationOptions {
    /// 从查询参数构造，page / limit 小于等于 0 时使用默认值
    pub fn from_query(
        page: Option<i64>,
        limit: Option<i64>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> Result<Self, PaginationError> {
        let positive = |value: Option<i64>, default: u64| match value {
            Some(v) if v > 0 => v as u64,
            _ => default,
        };
        let sort_by = match sort_by.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => DEFAULT_SORT_BY.to_string(),
        };
        let sort_order = match sort_order.map(str::trim) {
            Some(s) if !s.is_empty() => {
                SortOrder::from_str(s).map_err(|_| PaginationError::InvalidSortOrder(s.to_string()))?
            }
            _ => SortOrder::default(),
        };
        let options = Self {
            page: positive(page, DEFAULT_PAGE),
            limit: positive(limit, DEFAULT_LIMIT),
            sort_by,
            sort_order,
        };
        options.offset()?;
        Ok(options)
    }

    /// offset = (page - 1) * limit，溢出或超出 i64 范围时报错
    pub fn offset(&self) -> Result<u64, PaginationError> {
        self.page
            .checked_sub(1)
            .and_then(|skipped| skipped.checked_mul(self.limit))
            .filter(|offset| *offset <= MAX_BIND_VALUE && self.limit <= MAX_BIND_VALUE)
            .ok_or(PaginationError::OutOfRange {
                page: self.page,
                limit: self.limit,
            })
    }
}

/// 列表过滤条件：等值过滤之间为 AND，关键字在 search_fields 之间为 OR
pub struct ListFilters<E: EntityTrait> {
    pub equals: Vec<(E::Column, Option<Value>)>,
    pub search_term: Option<String>,
    pub search_fields: Vec<E::Column>,
}

impl<E: EntityTrait> Default for ListFilters<E> {
    fn default() -> Self {
        Self {
            equals: Vec::new(),
            search_term: None,
            search_fields: Vec::new(),
        }
    }
}

impl<E: EntityTrait> ListFilters<E> {
    pub fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        for (column, value) in &self.equals {
            if let Some(value) = value {
                condition = condition.add(column.eq(value.clone()));
            }
        }
        if let Some(term) = self.search_term.as_deref().filter(|t| !t.is_empty()) {
            if !self.search_fields.is_empty() {
                let group = self
                    .search_fields
                    .iter()
                    .fold(Condition::any(), |group, column| group.add(column.contains(term)));
                condition = condition.add(group);
            }
        }
        condition
    }
}

#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub page: u64,
    pub limit: u64,
    pub total_count: u64,
    pub total_pages: u64,
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u64,
    pub limit: u64,
    pub total_count: u64,
    pub total_pages: u64,
}

impl<T> Paged<T> {
    pub fn meta(&self) -> PageMeta {
        PageMeta {
            page: self.page,
            limit: self.limit,
            total_count: self.total_count,
            total_pages: self.total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            page: self.page,
            limit: self.limit,
            total_count: self.total_count,
            total_pages: self.total_pages,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

/// 对任意实体的查询应用过滤、排序与分页
///
/// 总数在应用 offset / limit 之前统计。
pub async fn paginate<E, C>(
    conn: &C,
    base: Select<E>,
    options: &PaginationOptions,
    filters: &ListFilters<E>,
) -> Result<Paged<E::Model>, PaginationError>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let sort_column =
        E::Column::from_str(&options.sort_by).map_err(|_| PaginationError::InvalidSortBy(options.sort_by.clone()))?;
    let offset = options.offset()?;
    let query = base.filter(filters.condition());

    let total_count = query.clone().count(conn).await.map_err(PaginationError::Count)?;
    let data = query
        .order_by(sort_column, options.sort_order.into())
        .offset(offset)
        .limit(options.limit)
        .all(conn)
        .await
        .map_err(PaginationError::Fetch)?;

    Ok(Paged {
        page: options.page,
        limit: options.limit,
        total_count,
        total_pages: total_count.div_ceil(options.limit),
        data,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};
    use quest_entity::{search, user};
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

    use super::*;
    use crate::database::memory_database;

    async fn seed(db: &DatabaseConnection) -> i32 {
        let now = Utc::now();
        let owner = user::ActiveModel {
            name: Set("tester".to_string()),
            email: Set("tester@example.com".to_string()),
            role: Set("user".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        let rows = [
            ("rust abc guide", "10.0.0.1"),
            ("abc of cooking", "10.0.0.2"),
            ("gardening", "10.0.0.1"),
            ("more abc", "10.0.0.1"),
            ("travel", "10.0.0.3"),
        ];
        for (i, (title, ip)) in rows.iter().enumerate() {
            let at = now + Duration::seconds(i as i64);
            search::ActiveModel {
                title: Set(title.to_string()),
                ip: Set(ip.to_string()),
                user_id: Set(owner.id),
                created_at: Set(at),
                updated_at: Set(at),
                ..Default::default()
            }
            .insert(db)
            .await
            .unwrap();
        }
        owner.id
    }

    #[test]
    fn test_options_defaults() {
        let options = PaginationOptions::from_query(None, None, None, None).unwrap();
        assert_eq!(options, PaginationOptions::default());

        let options = PaginationOptions::from_query(Some(0), Some(-5), Some(""), Some("")).unwrap();
        assert_eq!(options.page, 1);
        assert_eq!(options.limit, 10);
        assert_eq!(options.sort_by, "created_at");

        let options = PaginationOptions::from_query(Some(3), Some(20), Some("title"), Some("DESC")).unwrap();
        assert_eq!(options.offset().unwrap(), 40);
        assert_eq!(options.sort_order, SortOrder::Desc);

        assert_matches!(
            PaginationOptions::from_query(None, None, None, Some("sideways")),
            Err(PaginationError::InvalidSortOrder(_))
        );
    }

    #[tokio::test]
    async fn test_paginate_pages() {
        let db = memory_database().await;
        seed(&db).await;

        let options = PaginationOptions::from_query(Some(2), Some(2), None, None).unwrap();
        let paged = paginate(&db, search::Entity::find(), &options, &ListFilters::default())
            .await
            .unwrap();
        assert_eq!(paged.total_count, 5);
        assert_eq!(paged.total_pages, 3);
        assert_eq!(paged.data.len(), 2);
        assert_eq!(paged.data[0].title, "gardening");
        assert_eq!(paged.data[1].title, "more abc");

        let options = PaginationOptions::from_query(Some(3), Some(2), None, None).unwrap();
        let paged = paginate(&db, search::Entity::find(), &options, &ListFilters::default())
            .await
            .unwrap();
        assert_eq!(paged.data.len(), 1);
    }

    #[tokio::test]
    async fn test_paginate_search_or_and_equals() {
        let db = memory_database().await;
        seed(&db).await;

        let filters = ListFilters::<search::Entity> {
            equals: vec![(search::Column::Ip, Some("10.0.0.1".into())), (search::Column::Title, None)],
            search_term: Some("abc".to_string()),
            search_fields: vec![search::Column::Title],
        };
        let options = PaginationOptions::from_query(None, None, Some("created_at"), Some("desc")).unwrap();
        let paged = paginate(&db, search::Entity::find(), &options, &filters).await.unwrap();
        let titles: Vec<_> = paged.data.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["more abc", "rust abc guide"]);
        assert_eq!(paged.total_count, 2);
        assert_eq!(paged.total_pages, 1);
    }

    #[tokio::test]
    async fn test_paginate_rejects_unknown_column() {
        let db = memory_database().await;
        let options = PaginationOptions::from_query(None, None, Some("password"), None).unwrap();
        let err = paginate(&db, search::Entity::find(), &options, &ListFilters::default())
            .await
            .unwrap_err();
        assert_matches!(err, PaginationError::InvalidSortBy(ref column) if column == "password");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_options_reject_offset_outside_bind_range() {
        // offset 超过 i64::MAX
        assert_matches!(
            PaginationOptions::from_query(Some(i64::MAX), Some(2), None, None),
            Err(PaginationError::OutOfRange { .. })
        );
        // (page - 1) * limit 超过 u64
        assert_matches!(
            PaginationOptions::from_query(Some(4_294_967_297), Some(4_294_967_296), None, None),
            Err(PaginationError::OutOfRange { .. })
        );
        let err = PaginationOptions::from_query(Some(i64::MAX), Some(i64::MAX), None, None).unwrap_err();
        assert!(err.is_client_error());

        // 单独的大 limit 仍然可用
        let options = PaginationOptions::from_query(Some(1), Some(i64::MAX), None, None).unwrap();
        assert_eq!(options.offset().unwrap(), 0);
        let options = PaginationOptions::from_query(Some(2), Some(i64::MAX), None, None).unwrap();
        assert_eq!(options.offset().unwrap(), i64::MAX as u64);
    }

    #[tokio::test]
    async fn test_paginate_rejects_huge_offset_without_querying() {
        let db = memory_database().await;
        seed(&db).await;

        let options = PaginationOptions {
            page: i64::MAX as u64,
            limit: 2,
            ..Default::default()
        };
        let err = paginate(&db, search::Entity::find(), &options, &ListFilters::default())
            .await
            .unwrap_err();
        assert_matches!(err, PaginationError::OutOfRange { page, limit: 2 } if page == i64::MAX as u64);

        let options = PaginationOptions::from_query(Some(2), Some(i64::MAX), None, None).unwrap();
        let paged = paginate(&db, search::Entity::find(), &options, &ListFilters::default())
            .await
            .unwrap();
        assert_eq!(paged.total_count, 5);
        assert!(paged.data.is_empty());
    }

    #[tokio::test]
    async fn test_paginate_empty_table() {
        let db = memory_database().await;
        let paged = paginate(
            &db,
            search::Entity::find(),
            &PaginationOptions::default(),
            &ListFilters::default(),
        )
        .await
        .unwrap();
        assert_eq!(paged.total_count, 0);
        assert_eq!(paged.total_pages, 0);
        assert!(paged.data.is_empty());
        assert_eq!(paged.meta().limit, 10);
    }
}
