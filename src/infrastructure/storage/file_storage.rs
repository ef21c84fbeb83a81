use crate::application::ports::file_store::{EntryFieldFolder, OfflineFileStore};
use crate::domain::entities::{AttachedFile, LocalFile, StoredFiles};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// 端末内のディレクトリにオフライン添付ファイルを保管する
///
/// レイアウト: `<root>/<database_id>/<entry_id | new_N>/<field_id>/<filename>`
pub struct LocalOfflineFileStore {
    root: PathBuf,
}

impl LocalOfflineFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folder_path(&self, folder: EntryFieldFolder) -> PathBuf {
        let entry_segment = if folder.entry_id.is_provisional() {
            format!("new_{}", folder.entry_id.value().abs())
        } else {
            folder.entry_id.value().to_string()
        };
        self.root
            .join(folder.database_id.to_string())
            .join(entry_segment)
            .join(folder.field_id.to_string())
    }

    /// 同名ファイルは `name_1.ext` のように連番を付ける
    fn unique_target(dir: &Path, filename: &str, taken: &HashSet<PathBuf>) -> PathBuf {
        let target = dir.join(filename);
        if !taken.contains(&target) {
            return target;
        }

        let name = Path::new(filename);
        let stem = name
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = name
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        (1..)
            .map(|n| dir.join(format!("{stem}_{n}{extension}")))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or(target)
    }

    async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
        let mut reader = match fs::read_dir(dir).await {
            Ok(reader) => reader,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl OfflineFileStore for LocalOfflineFileStore {
    async fn store_files(
        &self,
        folder: EntryFieldFolder,
        files: &[AttachedFile],
    ) -> Result<StoredFiles, AppError> {
        let dir = self.folder_path(folder);
        fs::create_dir_all(&dir).await?;

        let mut stored = StoredFiles::default();
        // 保存済みのファイルは名前を変えずに残す
        let mut keep: HashSet<PathBuf> = files
            .iter()
            .filter_map(|file| match file {
                AttachedFile::Local(local) if local.path.parent() == Some(dir.as_path()) => {
                    Some(local.path.clone())
                }
                _ => None,
            })
            .collect();

        for file in files {
            match file {
                AttachedFile::Remote(remote) => stored.online.push(remote.clone()),
                AttachedFile::Local(local) if keep.contains(&local.path) => {}
                AttachedFile::Local(local) => {
                    let target = Self::unique_target(&dir, &local.filename, &keep);
                    fs::copy(&local.path, &target).await?;
                    keep.insert(target);
                }
            }
        }
        stored.offline = keep.len();

        // 今回の一覧に含まれないファイルは前回の保存分なので削除
        for existing in Self::list_files(&dir).await? {
            if !keep.contains(&existing) {
                fs::remove_file(&existing).await?;
            }
        }

        debug!(
            folder = %dir.display(),
            online = stored.online.len(),
            offline = stored.offline,
            "Stored offline files"
        );
        Ok(stored)
    }

    async fn stored_files(&self, folder: EntryFieldFolder) -> Result<Vec<LocalFile>, AppError> {
        let files = Self::list_files(&self.folder_path(folder)).await?;
        Ok(files.into_iter().map(LocalFile::from_path).collect())
    }

    async fn remove_folder(&self, folder: EntryFieldFolder) -> Result<(), AppError> {
        match fs::remove_dir_all(self.folder_path(folder)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::RemoteFile;
    use crate::domain::value_objects::EntryId;
    use tempfile::TempDir;

    fn remote(name: &str) -> AttachedFile {
        AttachedFile::Remote(RemoteFile {
            filename: name.to_string(),
            filepath: "/".to_string(),
            filesize: 10,
            fileurl: format!("https://school.example/pluginfile.php/{name}"),
            mimetype: None,
            timemodified: 0,
        })
    }

    async fn local(dir: &TempDir, name: &str) -> AttachedFile {
        let path = dir.path().join(name);
        fs::write(&path, b"data").await.unwrap();
        AttachedFile::Local(LocalFile::from_path(path))
    }

    #[tokio::test]
    async fn provisional_entries_use_new_prefix() {
        let store = LocalOfflineFileStore::new("/tmp/offlinedatabase");
        let path = store.folder_path(EntryFieldFolder::new(3, EntryId::new(-1000), 9));
        assert!(path.ends_with("3/new_1000/9"));
        let path = store.folder_path(EntryFieldFolder::new(3, EntryId::new(77), 9));
        assert!(path.ends_with("3/77/9"));
    }

    #[tokio::test]
    async fn store_and_list_files() {
        let source = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let store = LocalOfflineFileStore::new(root.path());
        let folder = EntryFieldFolder::new(1, EntryId::new(-50), 4);

        let files = vec![remote("a.pdf"), local(&source, "b.txt").await];
        let stored = store.store_files(folder, &files).await.unwrap();
        assert_eq!(stored.online.len(), 1);
        assert_eq!(stored.offline, 1);

        let listed = store.stored_files(folder).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, "b.txt");

        // 再保存で外されたファイルは消える
        let stored = store.store_files(folder, &[remote("a.pdf")]).await.unwrap();
        assert_eq!(stored.offline, 0);
        assert!(store.stored_files(folder).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_named_files_are_stored_separately() {
        let first_source = TempDir::new().unwrap();
        let second_source = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let store = LocalOfflineFileStore::new(root.path());
        let folder = EntryFieldFolder::new(1, EntryId::new(-50), 4);

        let files = vec![
            local(&first_source, "photo.jpg").await,
            local(&second_source, "photo.jpg").await,
        ];
        let stored = store.store_files(folder, &files).await.unwrap();
        assert_eq!(stored.offline, 2);

        let listed = store.stored_files(folder).await.unwrap();
        let names: Vec<_> = listed.iter().map(|file| file.filename.as_str()).collect();
        assert_eq!(names, vec!["photo.jpg", "photo_1.jpg"]);

        // 保存済みの一覧をそのまま渡すと同じファイルが残る
        let again: Vec<_> = listed.into_iter().map(AttachedFile::Local).collect();
        let stored = store.store_files(folder, &again).await.unwrap();
        assert_eq!(stored.offline, 2);
        assert_eq!(store.stored_files(folder).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_folder_is_empty_and_removable() {
        let root = TempDir::new().unwrap();
        let store = LocalOfflineFileStore::new(root.path());
        let folder = EntryFieldFolder::new(1, EntryId::new(5), 2);

        assert!(store.stored_files(folder).await.unwrap().is_empty());
        assert!(store.remove_folder(folder).await.is_ok());
    }
}
