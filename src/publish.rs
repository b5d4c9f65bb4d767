//! 原子发布模块
//!
//! 所有落盘操作都经过这里。周期性发布先写同目录下的临时文件，再重命名覆盖目标，
//! 读取方只会看到旧的完整内容或新的完整内容。

use crate::error::WriteError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

/// 发布文件的默认权限
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// 原子发布器
#[derive(Debug, Clone)]
pub struct AtomicPublisher {
    /// 目标文件权限（仅Unix）
    mode: u32,
}

impl Default for AtomicPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicPublisher {
    /// 创建新的发布器
    pub fn new() -> Self {
        Self {
            mode: DEFAULT_FILE_MODE,
        }
    }

    /// 原子发布内容到 `directory/filename`
    ///
    /// # 参数
    /// * `directory` - 目标目录，临时文件也创建在这里
    /// * `filename` - 目标文件名
    /// * `content` - 文件内容
    ///
    /// # 返回
    /// * `Result<PathBuf, WriteError>` - 目标文件路径
    pub fn publish(
        &self,
        directory: &Path,
        filename: &str,
        content: &str,
    ) -> Result<PathBuf, WriteError> {
        self.stage(directory, filename, content)?.commit()
    }

    /// 写入并同步临时文件，但不移动到目标位置
    pub fn stage(
        &self,
        directory: &Path,
        filename: &str,
        content: &str,
    ) -> Result<StagedFile, WriteError> {
        let mut temp = Builder::new()
            .prefix(&format!(".{filename}."))
            .suffix(".tmp")
            .tempfile_in(directory)
            .map_err(|source| WriteError::CreateTemp {
                dir: directory.to_path_buf(),
                source,
            })?;

        let temp_path = temp.path().to_path_buf();
        let write_err = |source| WriteError::Write {
            path: temp_path.clone(),
            source,
        };
        temp.write_all(content.as_bytes()).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;

        self.apply_mode(temp.as_file(), &temp_path)?;

        Ok(StagedFile {
            temp,
            target: directory.join(filename),
        })
    }

    /// 直接写入目标文件
    ///
    /// 只用于启动时的首次加载，此时还没有读取方。
    pub fn write_direct(
        &self,
        directory: &Path,
        filename: &str,
        content: &str,
    ) -> Result<PathBuf, WriteError> {
        let target = directory.join(filename);
        fs::write(&target, content).map_err(|source| WriteError::Write {
            path: target.clone(),
            source,
        })?;

        let file = fs::File::open(&target).map_err(|source| WriteError::Write {
            path: target.clone(),
            source,
        })?;
        self.apply_mode(&file, &target)?;

        debug!("已写入文件: {}", target.display());
        Ok(target)
    }

    #[cfg(unix)]
    fn apply_mode(&self, file: &fs::File, path: &Path) -> Result<(), WriteError> {
        use std::os::unix::fs::PermissionsExt;

        file.set_permissions(fs::Permissions::from_mode(self.mode))
            .map_err(|source| WriteError::Permissions {
                path: path.to_path_buf(),
                source,
            })
    }

    #[cfg(not(unix))]
    fn apply_mode(&self, _file: &fs::File, _path: &Path) -> Result<(), WriteError> {
        Ok(())
    }
}

/// 已写入但尚未提交的临时文件
///
/// 未提交就被丢弃时临时文件会被删除，目标文件保持不变。
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// 临时文件路径
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// 目标文件路径
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// 把临时文件重命名为目标文件
    pub fn commit(self) -> Result<PathBuf, WriteError> {
        let StagedFile { temp, target } = self;
        temp.persist(&target).map_err(|e| WriteError::Rename {
            from: e.file.path().to_path_buf(),
            to: target.clone(),
            source: e.error,
        })?;

        debug!("已发布文件: {}", target.display());
        Ok(target)
    }
}
