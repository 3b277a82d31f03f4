//! Platform directory resolution.
//!
//! The CLI needs a default model store when neither a flag nor a config
//! file names one. Lookup sits behind [`BaseDirs`] so tests can substitute
//! fixed paths.

use camino::Utf8PathBuf;

/// Application directory name under the platform data directory.
const APP_DIR: &str = "model-archive";

/// Store directory name under [`APP_DIR`].
const STORE_DIR: &str = "store";

/// Source of platform base directories.
pub trait BaseDirs {
    /// The per-user local data directory, if one can be determined.
    fn data_local_dir(&self) -> Option<Utf8PathBuf>;
}

/// [`BaseDirs`] backed by `directories-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn data_local_dir(&self) -> Option<Utf8PathBuf> {
        let dirs = directories_next::BaseDirs::new()?;
        Utf8PathBuf::from_path_buf(dirs.data_local_dir().to_path_buf()).ok()
    }
}

/// Default model store: `<data_local_dir>/model-archive/store`.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use model_archive::dirs::{BaseDirs, default_model_store};
///
/// struct Fixed;
/// impl BaseDirs for Fixed {
///     fn data_local_dir(&self) -> Option<Utf8PathBuf> {
///         Some(Utf8PathBuf::from("/home/u/.local/share"))
///     }
/// }
///
/// assert_eq!(
///     default_model_store(&Fixed).as_deref().map(|p| p.as_str()),
///     Some("/home/u/.local/share/model-archive/store"),
/// );
/// ```
#[must_use]
pub fn default_model_store(dirs: &dyn BaseDirs) -> Option<Utf8PathBuf> {
    dirs.data_local_dir()
        .map(|base| base.join(APP_DIR).join(STORE_DIR))
}
