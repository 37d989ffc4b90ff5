//! Image storage addressed by opaque string locations.
//!
//! A location is a `/`-separated relative path. Locations ending in a
//! supported image extension are used as given; any other location gets
//! [`DEFAULT_EXTENSION`] appended. Everything resolves under the storage's
//! base directory.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};

/// Extensions stored under their own format, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// Extension appended to locations without a supported one.
pub const DEFAULT_EXTENSION: &str = "png";

/// Errors from [`Storage`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The location is blank or escapes the base directory.
    #[error("invalid location {0:?}")]
    InvalidLocation(String),

    /// Nothing exists at the resolved path.
    #[error("no file at {}", .0.display())]
    NotFound(PathBuf),

    /// The resolved path exists but is not a regular file.
    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),

    /// The file exists but holds no bytes.
    #[error("{} is empty", .0.display())]
    EmptyFile(PathBuf),

    /// Refused to save an image with no pixels.
    #[error("refusing to save an empty image")]
    EmptyImage,

    /// Filesystem failure.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding failure.
    #[error("image error at {}: {source}", path.display())]
    Image {
        /// The image file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: image::ImageError,
    },
}

/// Loads and saves values of `T` by location.
pub trait Storage<T> {
    /// Read the value stored at `location`.
    ///
    /// # Errors
    ///
    /// Implementation specific; see [`StorageError`].
    fn load(&self, location: &str) -> Result<T, StorageError>;

    /// Store `value` at `location`, returning where it was written.
    ///
    /// # Errors
    ///
    /// Implementation specific; see [`StorageError`].
    fn save(&self, location: &str, value: &T) -> Result<PathBuf, StorageError>;
}

/// Images stored as files under a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStorage {
    base: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `base`. The directory is created on first save.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        log::debug!("file storage rooted at {}", base.display());
        Self { base }
    }

    /// The base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The file path `location` maps to.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidLocation`] for blank locations and
    /// locations with a `..` segment.
    pub fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        let normalized = location.trim().replace('\\', "/");
        let relative = normalized.trim_start_matches('/');
        if relative.is_empty() {
            return Err(StorageError::InvalidLocation(location.to_owned()));
        }
        if relative.split('/').any(|segment| segment == "..") {
            log::warn!("rejected path traversal in location {location:?}");
            return Err(StorageError::InvalidLocation(location.to_owned()));
        }

        let mut path = self.base.join(relative);
        if !has_supported_extension(relative) {
            let mut name = path.clone().into_os_string();
            name.push(".");
            name.push(DEFAULT_EXTENSION);
            path = PathBuf::from(name);
            log::debug!("appended default extension: {}", path.display());
        }
        Ok(path)
    }

    /// Resolve `location` and check that it names a readable, non-empty file.
    fn existing_file(&self, location: &str) -> Result<PathBuf, StorageError> {
        let path = self.resolve(location)?;
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path));
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        if !metadata.is_file() {
            return Err(StorageError::NotAFile(path));
        }
        if metadata.len() == 0 {
            return Err(StorageError::EmptyFile(path));
        }
        Ok(path)
    }

    fn open(&self, location: &str) -> Result<image::DynamicImage, StorageError> {
        log::info!("loading {location}");
        let path = self.existing_file(location)?;
        image::open(&path).map_err(|source| StorageError::Image { path, source })
    }

    /// Write through `encode` after validating the location and creating
    /// parent directories.
    fn write(
        &self,
        location: &str,
        (width, height): (u32, u32),
        encode: impl FnOnce(&Path) -> image::ImageResult<()>,
    ) -> Result<PathBuf, StorageError> {
        if width == 0 || height == 0 {
            return Err(StorageError::EmptyImage);
        }
        let path = self.resolve(location)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        encode(&path).map_err(|source| StorageError::Image {
            path: path.clone(),
            source,
        })?;
        log::info!("saved {width}x{height} image to {}", path.display());
        Ok(path)
    }
}

impl Storage<RgbImage> for FileStorage {
    fn load(&self, location: &str) -> Result<RgbImage, StorageError> {
        Ok(self.open(location)?.to_rgb8())
    }

    fn save(&self, location: &str, value: &RgbImage) -> Result<PathBuf, StorageError> {
        self.write(location, value.dimensions(), |path| value.save(path))
    }
}

impl Storage<GrayImage> for FileStorage {
    fn load(&self, location: &str) -> Result<GrayImage, StorageError> {
        Ok(self.open(location)?.to_luma8())
    }

    fn save(&self, location: &str, value: &GrayImage) -> Result<PathBuf, StorageError> {
        self.write(location, value.dimensions(), |path| value.save(path))
    }
}

/// Whether `location` ends in one of [`SUPPORTED_EXTENSIONS`].
#[must_use]
pub fn has_supported_extension(location: &str) -> bool {
    Path::new(location)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Luma, Rgb};

    use super::*;

    fn storage() -> (tempfile::TempDir, FileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        (dir, storage)
    }

    fn sample() -> RgbImage {
        RgbImage::from_fn(12, 8, |x, y| Rgb([(x * 20) as u8, (y * 30) as u8, 77]))
    }

    #[test]
    fn round_trip_with_default_extension() {
        let (dir, storage) = storage();
        let img = sample();
        let path = storage.save("user/photo", &img).unwrap();
        assert_eq!(path, dir.path().join("user/photo.png"));
        assert!(path.is_file());
        let loaded: RgbImage = storage.load("user/photo").unwrap();
        assert_eq!(loaded, img);
    }

    #[test]
    fn supported_extension_is_kept() {
        let (dir, storage) = storage();
        let path = storage.save("shot.PNG", &sample()).unwrap();
        assert_eq!(path, dir.path().join("shot.PNG"));
        let path = storage.save("shot.bmp", &sample()).unwrap();
        assert_eq!(path, dir.path().join("shot.bmp"));
    }

    #[test]
    fn unknown_extension_gets_default_appended() {
        let (dir, storage) = storage();
        assert_eq!(
            storage.resolve("scan.webp").unwrap(),
            dir.path().join("scan.webp.png")
        );
    }

    #[test]
    fn backslashes_are_separators() {
        let (dir, storage) = storage();
        assert_eq!(
            storage.resolve("a\\b\\c.jpg").unwrap(),
            dir.path().join("a/b/c.jpg")
        );
    }

    #[test]
    fn gray_round_trip() {
        let (_dir, storage) = storage();
        let img = GrayImage::from_fn(9, 9, |x, y| Luma([u8::from((x + y) % 2 == 0) * 255]));
        storage.save("tiles/00", &img).unwrap();
        let loaded: GrayImage = storage.load("tiles/00").unwrap();
        assert_eq!(loaded, img);
    }

    #[test]
    fn invalid_locations_are_rejected() {
        let (_dir, storage) = storage();
        for location in ["", "   ", "/", "../escape", "a/../../b", "a\\..\\b"] {
            assert!(
                matches!(storage.resolve(location), Err(StorageError::InvalidLocation(_))),
                "{location:?}"
            );
        }
        assert!(storage.resolve("a..b/c").is_ok());
    }

    #[test]
    fn load_checks_the_file() {
        let (dir, storage) = storage();
        assert!(matches!(
            Storage::<RgbImage>::load(&storage, "missing"),
            Err(StorageError::NotFound(_))
        ));

        std::fs::create_dir_all(dir.path().join("folder.png")).unwrap();
        assert!(matches!(
            Storage::<RgbImage>::load(&storage, "folder"),
            Err(StorageError::NotAFile(_))
        ));

        std::fs::write(dir.path().join("blank.png"), b"").unwrap();
        assert!(matches!(
            Storage::<RgbImage>::load(&storage, "blank"),
            Err(StorageError::EmptyFile(_))
        ));

        std::fs::write(dir.path().join("junk.png"), b"not an image").unwrap();
        assert!(matches!(
            Storage::<RgbImage>::load(&storage, "junk"),
            Err(StorageError::Image { .. })
        ));
    }

    #[test]
    fn empty_image_is_not_saved() {
        let (dir, storage) = storage();
        assert!(matches!(
            storage.save("nothing", &RgbImage::new(0, 0)),
            Err(StorageError::EmptyImage)
        ));
        assert!(!dir.path().join("nothing.png").exists());
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_supported_extension("a/b.JPEG"));
        assert!(has_supported_extension("x.tiff"));
        assert!(!has_supported_extension("x.gif"));
        assert!(!has_supported_extension("png"));
    }
}
