//! Persisting received payloads as files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::model::MediaFormat;

/// Longest stem kept from a title, in UTF-8 bytes.
///
/// Leaves room under the common 255-byte name limit for the extension, a
/// collision suffix and `.part`.
const MAX_STEM_BYTES: usize = 200;

/// Replaces characters that are unsafe in filenames.
///
/// Path separators and reserved punctuation become `_`, control characters
/// are dropped, and surrounding whitespace and dots are trimmed.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect();
    cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// Builds `<title>.<ext>` for a saved item, falling back to `video`/`audio`.
#[must_use]
pub fn derive_filename(title: &str, format: MediaFormat) -> String {
    let stem = sanitize_filename(title);
    let stem = if stem.is_empty() {
        format.fallback_stem().to_string()
    } else {
        truncate_on_char_boundary(&stem, MAX_STEM_BYTES).trim_end().to_string()
    };
    format!("{stem}.{}", format.extension())
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// `name (n).ext` for the `n`th collision.
fn numbered(filename: &str, n: usize) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map_or_else(|| filename.to_string(), |s| s.to_string_lossy().into_owned());
    match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    }
}

/// Removes a temporary file unless disarmed.
///
/// Held across every await point of a save, so the file goes away on error
/// returns as well as when the save future is dropped.
struct PartGuard<'a> {
    fs: &'a dyn FileSystem,
    path: PathBuf,
    armed: bool,
}

impl<'a> PartGuard<'a> {
    fn new(fs: &'a dyn FileSystem, path: PathBuf) -> Self {
        Self {
            fs,
            path,
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.fs.discard(&self.path);
        }
    }
}

/// Saves payloads into a download directory.
#[derive(Clone)]
pub struct FileMaterializer {
    fs: Arc<dyn FileSystem>,
    download_dir: PathBuf,
    force_overwrite: bool,
}

impl std::fmt::Debug for FileMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMaterializer")
            .field("download_dir", &self.download_dir)
            .field("force_overwrite", &self.force_overwrite)
            .finish_non_exhaustive()
    }
}

impl FileMaterializer {
    /// Creates a materializer writing through `tokio::fs`.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self::with_fs(Arc::new(TokioFileSystem::new()), download_dir)
    }

    /// Creates a materializer with a custom file system implementation.
    #[must_use]
    pub fn with_fs(fs: Arc<dyn FileSystem>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            download_dir: download_dir.into(),
            force_overwrite: false,
        }
    }

    /// Replace existing files instead of picking a numbered name.
    #[must_use]
    pub const fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Writes `payload` as `filename` inside the download directory.
    ///
    /// Returns the path the file was saved under, which differs from
    /// `filename` when a file of that name already exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaterializationFailed`] if the file cannot be written.
    /// No partial file is left behind.
    pub async fn save(&self, payload: &[u8], filename: &str) -> Result<PathBuf> {
        let filename = match sanitize_filename(filename) {
            name if name.is_empty() => "download".to_string(),
            name => name,
        };
        let result = self.write(payload, &filename).await;
        result.map_err(|source| {
            log::warn!("Saving {filename} failed: {source}");
            Error::MaterializationFailed { filename, source }
        })
    }

    async fn write(&self, payload: &[u8], filename: &str) -> std::io::Result<PathBuf> {
        self.fs.create_dir_all(&self.download_dir).await?;
        let target = self.target_path(filename).await;

        let mut guard = PartGuard::new(self.fs.as_ref(), part_path(&target));
        self.fs.write_file(guard.path(), payload).await?;
        self.fs.rename_file(guard.path(), &target).await?;
        guard.disarm();

        log::debug!("Saved {} ({} bytes)", target.display(), payload.len());
        Ok(target)
    }

    async fn target_path(&self, filename: &str) -> PathBuf {
        let first = self.download_dir.join(filename);
        if self.force_overwrite || !self.fs.file_exists(&first).await {
            return first;
        }
        let mut n = 1;
        loop {
            let candidate = self.download_dir.join(numbered(filename, n));
            if !self.fs.file_exists(&candidate).await {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default, Clone, Copy, PartialEq, Eq)]
    enum Fault {
        #[default]
        None,
        Write,
        Rename,
        HangAfterWrite,
    }

    /// In-memory file system with injectable faults.
    #[derive(Default)]
    struct MockFileSystem {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
        fault: Fault,
    }

    impl MockFileSystem {
        fn failing(fault: Fault) -> Self {
            Self {
                fault,
                ..Self::default()
            }
        }

        fn add_file(&self, path: impl Into<PathBuf>) {
            self.files.lock().unwrap().insert(path.into(), Vec::new());
        }

        fn paths(&self) -> Vec<PathBuf> {
            let mut paths: Vec<_> = self.files.lock().unwrap().keys().cloned().collect();
            paths.sort();
            paths
        }
    }

    #[async_trait]
    impl FileSystem for MockFileSystem {
        async fn file_exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        async fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }

        async fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
            if self.fault == Fault::Write {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
            }
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), contents.to_vec());
            if self.fault == Fault::HangAfterWrite {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn rename_file(&self, from: &Path, to: &Path) -> io::Result<()> {
            if self.fault == Fault::Rename {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            let mut files = self.files.lock().unwrap();
            let contents = files
                .remove(from)
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
            files.insert(to.to_path_buf(), contents);
            Ok(())
        }

        fn discard(&self, path: &Path) {
            self.files.lock().unwrap().remove(path);
        }
    }

    fn materializer(fs: &Arc<MockFileSystem>) -> FileMaterializer {
        FileMaterializer::with_fs(fs.clone(), "/media")
    }

    #[test]
    fn sanitize_strips_separators_and_controls() {
        assert_eq!(sanitize_filename("AC/DC: Live"), "AC_DC_ Live");
        assert_eq!(sanitize_filename("a\\b|c?d*e"), "a_b_c_d_e");
        assert_eq!(sanitize_filename("tab\there\nnewline"), "tabherenewline");
        assert_eq!(sanitize_filename("  ..hidden.  "), "hidden");
        assert_eq!(sanitize_filename(".."), "");
    }

    #[test]
    fn derive_filename_uses_format_extension() {
        assert_eq!(derive_filename("My Song", MediaFormat::Audio), "My Song.mp3");
        assert_eq!(derive_filename("Clip", MediaFormat::Video), "Clip.mp4");
    }

    #[test]
    fn derive_filename_falls_back_when_title_unusable() {
        assert_eq!(derive_filename("", MediaFormat::Video), "video.mp4");
        assert_eq!(derive_filename(" / ", MediaFormat::Audio), "_.mp3");
        assert_eq!(derive_filename("\u{7}", MediaFormat::Audio), "audio.mp3");
    }

    #[test]
    fn derive_filename_caps_long_titles() {
        let long = "x".repeat(500);
        let name = derive_filename(&long, MediaFormat::Audio);
        assert_eq!(name.len(), MAX_STEM_BYTES + ".mp3".len());
    }

    #[test]
    fn derive_filename_caps_multibyte_titles_by_bytes() {
        let title = "日本語のタイトル".repeat(13);
        let name = derive_filename(&title, MediaFormat::Audio);
        let stem = name.strip_suffix(".mp3").unwrap();
        assert!(stem.len() <= MAX_STEM_BYTES);
        assert!(title.starts_with(stem));
        // Each of these chars is three bytes wide.
        assert_eq!(stem.len(), MAX_STEM_BYTES / 3 * 3);
    }

    #[test]
    fn numbered_names() {
        assert_eq!(numbered("song.mp3", 1), "song (1).mp3");
        assert_eq!(numbered("archive.tar.gz", 2), "archive.tar (2).gz");
        assert_eq!(numbered("README", 3), "README (3)");
    }

    #[test]
    fn part_path_appends_extension() {
        assert_eq!(
            part_path(Path::new("dir/song.mp3")),
            PathBuf::from("dir/song.mp3.part")
        );
    }

    #[tokio::test]
    async fn save_writes_final_file_only() {
        let fs = Arc::new(MockFileSystem::default());
        let path = materializer(&fs).save(b"data", "song.mp3").await.unwrap();
        assert_eq!(path, PathBuf::from("/media/song.mp3"));
        assert_eq!(fs.paths(), vec![PathBuf::from("/media/song.mp3")]);
    }

    #[tokio::test]
    async fn existing_file_gets_numbered_name() {
        let fs = Arc::new(MockFileSystem::default());
        fs.add_file("/media/song.mp3");
        fs.add_file("/media/song (1).mp3");
        let path = materializer(&fs).save(b"data", "song.mp3").await.unwrap();
        assert_eq!(path, PathBuf::from("/media/song (2).mp3"));
    }

    #[tokio::test]
    async fn force_overwrite_reuses_name() {
        let fs = Arc::new(MockFileSystem::default());
        fs.add_file("/media/song.mp3");
        let path = materializer(&fs)
            .with_force_overwrite(true)
            .save(b"new", "song.mp3")
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/media/song.mp3"));
        assert_eq!(
            fs.files.lock().unwrap()[Path::new("/media/song.mp3")],
            b"new".to_vec()
        );
    }

    #[tokio::test]
    async fn write_failure_is_materialization_failed() {
        let fs = Arc::new(MockFileSystem::failing(Fault::Write));
        let err = materializer(&fs).save(b"data", "song.mp3").await.unwrap_err();
        match err {
            Error::MaterializationFailed { filename, source } => {
                assert_eq!(filename, "song.mp3");
                assert_eq!(source.kind(), io::ErrorKind::StorageFull);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(fs.paths().is_empty());
    }

    #[tokio::test]
    async fn rename_failure_releases_part_file() {
        let fs = Arc::new(MockFileSystem::failing(Fault::Rename));
        assert!(materializer(&fs).save(b"data", "song.mp3").await.is_err());
        assert!(fs.paths().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_save_releases_part_file() {
        let fs = Arc::new(MockFileSystem::failing(Fault::HangAfterWrite));
        let m = materializer(&fs);
        let result = tokio::time::timeout(Duration::from_secs(1), m.save(b"data", "song.mp3")).await;
        assert!(result.is_err());
        assert!(fs.paths().is_empty());
    }

    #[tokio::test]
    async fn unsafe_filename_is_sanitized() {
        let fs = Arc::new(MockFileSystem::default());
        let path = materializer(&fs).save(b"x", "../etc/passwd").await.unwrap();
        assert_eq!(path, PathBuf::from("/media/_etc_passwd"));
    }

    #[tokio::test]
    async fn saves_to_real_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested");
        let m = FileMaterializer::new(&target);

        let first = m.save(b"one", "clip.mp4").await.unwrap();
        let second = m.save(b"two", "clip.mp4").await.unwrap();

        assert_eq!(first, target.join("clip.mp4"));
        assert_eq!(second, target.join("clip (1).mp4"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert!(!target.join("clip.mp4.part").exists());
    }

    #[tokio::test]
    async fn long_multibyte_title_saves_to_real_directory() {
        let dir = TempDir::new().unwrap();
        let m = FileMaterializer::new(dir.path());
        let name = derive_filename(&"日本語のタイトル".repeat(13), MediaFormat::Audio);

        let first = m.save(b"one", &name).await.unwrap();
        let second = m.save(b"two", &name).await.unwrap();

        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert!(second.file_name().unwrap().to_string_lossy().contains(" (1).mp3"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sanitized_names_have_no_separators(name in ".{0,64}") {
                let clean = sanitize_filename(&name);
                prop_assert!(!clean.contains('/'));
                prop_assert!(!clean.contains('\\'));
                prop_assert!(!clean.chars().any(char::is_control));
            }

            #[test]
            fn derived_names_are_never_empty(title in ".{0,64}") {
                let name = derive_filename(&title, MediaFormat::Audio);
                prop_assert!(name.ends_with(".mp3"));
                prop_assert!(name.len() > ".mp3".len());
            }

            #[test]
            fn derived_names_fit_name_limits(title in "\\PC{0,400}") {
                let name = derive_filename(&title, MediaFormat::Video);
                prop_assert!(name.len() <= MAX_STEM_BYTES + ".mp4".len());
            }
        }
    }
}
