use std::path::{Path, PathBuf};

use axum::body::Bytes;
use quest_entity::image::DiskType;
use thiserror::Error;
use tracing::{info, warn};

/// 允许上传的图片类型
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// 类型嗅探读取的最大字节数
const SNIFF_LEN: usize = 512;

/// multipart 中的一个文件字段
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// 已写入磁盘的文件信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: String,
    pub web_path: String,
    pub disk_type: DiskType,
    pub original_name: String,
    pub modified_name: String,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("file is not a supported image (jpeg, png, gif, webp)")]
    NotAnImage,
    #[error("failed to create upload directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write uploaded file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotAnImage)
    }
}

/// 按文件头嗅探图片类型，返回 MIME 类型；不看扩展名
pub fn detect_image_type(data: &[u8]) -> Result<&'static str, UploadError> {
    let head = &data[..data.len().min(SNIFF_LEN)];
    infer::get(head)
        .map(|kind| kind.mime_type())
        .filter(|mime| ALLOWED_IMAGE_TYPES.contains(mime))
        .ok_or(UploadError::NotAnImage)
}

/// 上传目录对应的对外路径前缀：去掉开头的 "."，保证以 "/" 开头，统一使用 "/"
pub fn web_dir_for(upload_dir: &Path) -> String {
    let raw = upload_dir.to_string_lossy().replace('\\', "/");
    let trimmed = raw.trim_start_matches('.').trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

pub fn web_path_for(upload_dir: &Path, file_name: &str) -> String {
    let dir = web_dir_for(upload_dir);
    if dir == "/" {
        format!("/{}", file_name)
    } else {
        format!("{}/{}", dir, file_name)
    }
}

/// 生成存储文件名：UUIDv4 + 小写的原始扩展名
fn generated_name(original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    format!("{}{}", uuid::Uuid::new_v4(), ext)
}

/// 校验并保存图片，校验失败时不会产生任何文件系统写入
pub async fn save_image_locally(upload_dir: &Path, part: &FilePart) -> Result<UploadedFile, UploadError> {
    detect_image_type(&part.data)?;

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|source| UploadError::CreateDir {
            path: upload_dir.to_path_buf(),
            source,
        })?;

    let modified_name = generated_name(&part.file_name);
    let path = upload_dir.join(&modified_name);
    tokio::fs::write(&path, &part.data)
        .await
        .map_err(|source| UploadError::Write {
            path: path.clone(),
            source,
        })?;
    info!(
        "已保存上传文件: {} ({} 字节, 声明类型 {:?})",
        path.display(),
        part.data.len(),
        part.content_type
    );

    Ok(UploadedFile {
        path: path.to_string_lossy().into_owned(),
        web_path: web_path_for(upload_dir, &modified_name),
        disk_type: DiskType::Local,
        original_name: part.file_name.clone(),
        modified_name,
    })
}

/// 已写入的文件在事务未提交时需要删除，调用 keep 后保留
pub struct StoredFileGuard {
    path: Option<PathBuf>,
}

impl StoredFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for StoredFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            // Drop 中无法 await，单个文件直接同步删除
            match std::fs::remove_file(&path) {
                Ok(()) => warn!("事务未提交，已删除上传文件: {}", path.display()),
                Err(e) => warn!("删除未提交的上传文件 {} 失败: {}", path.display(), e),
            }
        }
    }
}
