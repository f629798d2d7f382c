//! Directory-backed media source using walkdir.

use super::{MediaItem, MediaKind, MediaSource};
use crate::error::ScanError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for the directory source
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Roots to enumerate
    pub roots: Vec<PathBuf>,
    /// Path prefixes to leave out
    pub exclude: Vec<PathBuf>,
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
}

/// Enumerates images and videos below a set of roots.
pub struct DirectoryMediaSource {
    config: SourceConfig,
}

impl DirectoryMediaSource {
    /// Create a source over the given configuration
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn is_hidden(entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with('.'))
                .unwrap_or(false)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.config.exclude.iter().any(|prefix| path.starts_with(prefix))
    }

    fn scan_root(&self, root: &Path, items: &mut Vec<MediaItem>) -> Result<(), ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let include_hidden = self.config.include_hidden;
        let walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .into_iter()
            .filter_entry(|e| include_hidden || !Self::is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || self.is_excluded(entry.path()) {
                continue;
            }

            if let Some(item) = media_item_for(entry.path()) {
                items.push(item);
            }
        }

        Ok(())
    }
}

impl MediaSource for DirectoryMediaSource {
    fn media_items(&self) -> Result<Vec<MediaItem>, ScanError> {
        let mut items = Vec::new();
        for root in &self.config.roots {
            self.scan_root(root, &mut items)?;
        }

        // Overlapping roots and followed links reach one file twice
        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.id.clone()));

        debug!("Directory source found {} media items", items.len());
        Ok(items)
    }
}

fn millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Build a media item from a file on disk. Returns `None` for non-media files
/// and files whose metadata cannot be read.
pub(crate) fn media_item_for(path: &Path) -> Option<MediaItem> {
    let ext = path.extension().and_then(|e| e.to_str())?;
    let kind = MediaKind::from_extension(ext);
    if kind == MediaKind::Unknown {
        return None;
    }

    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let metadata = match fs::metadata(&absolute) {
        Ok(m) => m,
        Err(e) => {
            warn!("Cannot stat {}: {}", absolute.display(), e);
            return None;
        }
    };

    let modified = metadata.modified().map(millis).unwrap_or(0);
    let added = metadata.created().map(millis).unwrap_or(modified);

    let (width, height) = match kind {
        MediaKind::Image => image::image_dimensions(&absolute).unwrap_or((0, 0)),
        _ => (0, 0),
    };

    let parent = absolute.parent().unwrap_or_else(|| Path::new(""));
    let id = absolute.to_string_lossy().to_string();

    Some(MediaItem {
        uri: format!("file://{}", id),
        id,
        display_name: absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        mime_type: MediaKind::mime_type(ext).to_string(),
        date_added: added,
        date_modified: modified,
        size: metadata.len(),
        bucket_id: parent.to_string_lossy().to_string(),
        bucket_name: parent
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        is_video: kind == MediaKind::Video,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(&path).unwrap().write_all(b"not really media").unwrap();
        path
    }

    #[test]
    fn finds_images_and_videos_only() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.jpg");
        touch(temp.path(), "b.mp4");
        touch(temp.path(), "notes.txt");

        let source = DirectoryMediaSource::new(SourceConfig {
            roots: vec![temp.path().to_path_buf()],
            ..Default::default()
        });

        let items = source.media_items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items.iter().filter(|i| i.is_video).count(), 1);
    }

    #[test]
    fn skips_hidden_directories_by_default() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), ".thumbs/a.jpg");
        touch(temp.path(), "b.jpg");

        let source = DirectoryMediaSource::new(SourceConfig {
            roots: vec![temp.path().to_path_buf()],
            ..Default::default()
        });

        let items = source.media_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].display_name, "b.jpg");
    }

    #[test]
    fn honours_exclude_prefixes() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "keep/a.jpg");
        touch(temp.path(), "drop/b.jpg");
        let root = fs::canonicalize(temp.path()).unwrap();

        let source = DirectoryMediaSource::new(SourceConfig {
            roots: vec![root.clone()],
            exclude: vec![root.join("drop")],
            ..Default::default()
        });

        let items = source.media_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].bucket_name, "keep");
    }

    #[test]
    fn nested_roots_list_each_file_once() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "trip/only.jpg");

        let source = DirectoryMediaSource::new(SourceConfig {
            roots: vec![temp.path().to_path_buf(), temp.path().join("trip")],
            ..Default::default()
        });

        let items = source.media_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].display_name, "only.jpg");
    }

    #[test]
    fn missing_root_is_an_error() {
        let source = DirectoryMediaSource::new(SourceConfig {
            roots: vec![PathBuf::from("/nonexistent/media/root")],
            ..Default::default()
        });

        assert!(matches!(
            source.media_items(),
            Err(ScanError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn item_records_size_and_mime() {
        let temp = TempDir::new().unwrap();
        let path = touch(temp.path(), "clip.MOV");

        let item = media_item_for(&path).unwrap();
        assert_eq!(item.size, 16);
        assert_eq!(item.mime_type, "video/quicktime");
        assert!(item.is_video);
    }
}
