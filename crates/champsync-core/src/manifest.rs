//! Download tasks and the manifest file that lists them.
//!
//! Scrapers produce the manifest; the engine only needs each task's logical
//! key, source URL, destination and category. The on-disk form is JSON:
//!
//! ```json
//! { "tasks": [ { "key": "Ahri/skins/Base/Splashes/Splash", "url": "https://…/Ahri_0.jpg",
//!                "path": "Ahri/skins/Base/Splashes/Splash.jpg", "category": "splash" } ] }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Kind of media an asset is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Splash,
    Loading,
    Circle,
    Square,
    Centered,
    Tile,
    Ability,
    Audio,
    #[default]
    Other,
}

impl AssetCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetCategory::Splash => "splash",
            AssetCategory::Loading => "loading",
            AssetCategory::Circle => "circle",
            AssetCategory::Square => "square",
            AssetCategory::Centered => "centered",
            AssetCategory::Tile => "tile",
            AssetCategory::Ability => "ability",
            AssetCategory::Audio => "audio",
            AssetCategory::Other => "other",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asset to synchronize. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    logical_key: String,
    source_locator: String,
    destination_path: PathBuf,
    expected_category: AssetCategory,
}

impl DownloadTask {
    /// `destination_path` is normalized lexically (`.` and `..` removed).
    pub fn new(
        logical_key: impl Into<String>,
        source_locator: impl Into<String>,
        destination_path: impl AsRef<Path>,
        expected_category: AssetCategory,
    ) -> Self {
        Self {
            logical_key: logical_key.into(),
            source_locator: source_locator.into(),
            destination_path: normalize(destination_path.as_ref()),
            expected_category,
        }
    }

    pub fn logical_key(&self) -> &str {
        &self.logical_key
    }

    pub fn source_locator(&self) -> &str {
        &self.source_locator
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    pub fn expected_category(&self) -> AssetCategory {
        self.expected_category
    }
}

/// One entry of the JSON manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestEntry {
    pub key: String,
    pub url: String,
    pub path: PathBuf,
    #[serde(default)]
    pub category: AssetCategory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestFile {
    pub tasks: Vec<ManifestEntry>,
}

/// Ordered tasks for one run.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub tasks: Vec<DownloadTask>,
}

impl Manifest {
    /// Read a JSON manifest and resolve relative destinations under `output_dir`.
    pub fn load(path: &Path, output_dir: &Path) -> Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("read manifest: {}", path.display()))?;
        let file: ManifestFile = serde_json::from_slice(&data)
            .with_context(|| format!("parse manifest: {}", path.display()))?;
        Self::from_entries(file.tasks, output_dir)
    }

    pub fn from_entries(entries: Vec<ManifestEntry>, output_dir: &Path) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut dests = HashSet::new();
        let mut tasks = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.key.trim().is_empty() {
                anyhow::bail!("manifest entry with empty key (url {})", entry.url);
            }
            if !seen.insert(entry.key.clone()) {
                anyhow::bail!("duplicate logical key in manifest: {}", entry.key);
            }
            let dest = resolve_destination(output_dir, &entry.path)
                .with_context(|| format!("task {}", entry.key))?;
            if !dests.insert(dest.clone()) {
                anyhow::bail!(
                    "duplicate destination path in manifest: {} (task {})",
                    dest.display(),
                    entry.key
                );
            }
            tasks.push(DownloadTask::new(entry.key, entry.url, dest, entry.category));
        }
        Ok(Self { tasks })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Join a manifest path onto the output root. Relative paths may not climb
/// out of the root; absolute paths are taken as given.
pub fn resolve_destination(output_dir: &Path, path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let mut rel = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Normal(c) => rel.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                if !rel.pop() {
                    anyhow::bail!("destination escapes output directory: {}", path.display());
                }
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    if rel.as_os_str().is_empty() {
        anyhow::bail!("empty destination path");
    }
    Ok(normalize(&output_dir.join(rel)))
}

/// Lexical normalization: drops `.` and resolves `..` against earlier components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, path: &str) -> ManifestEntry {
        ManifestEntry {
            key: key.to_string(),
            url: format!("https://wiki.example/images/{}", key),
            path: PathBuf::from(path),
            category: AssetCategory::Splash,
        }
    }

    #[test]
    fn task_paths_are_normalized() {
        let t = DownloadTask::new("k", "u", "data/./Ahri/../Ahri/splash.jpg", AssetCategory::Splash);
        assert_eq!(t.destination_path(), Path::new("data/Ahri/splash.jpg"));
    }

    #[test]
    fn relative_paths_resolve_under_root() {
        let p = resolve_destination(Path::new("data"), Path::new("Ahri/skins/./Base/splash.jpg")).unwrap();
        assert_eq!(p, PathBuf::from("data/Ahri/skins/Base/splash.jpg"));
    }

    #[test]
    fn escaping_paths_rejected() {
        assert!(resolve_destination(Path::new("data"), Path::new("../etc/passwd")).is_err());
        assert!(resolve_destination(Path::new("data"), Path::new("a/../../b")).is_err());
        assert!(resolve_destination(Path::new("data"), Path::new(".")).is_err());
    }

    #[test]
    fn duplicate_keys_rejected() {
        let err = Manifest::from_entries(vec![entry("a", "a.jpg"), entry("a", "b.jpg")], Path::new("data"))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn duplicate_destinations_rejected() {
        let err = Manifest::from_entries(
            vec![entry("Ahri/Splash?", "Ahri/a.jpg"), entry("Ahri/Splash*", "Ahri/./a.jpg")],
            Path::new("data"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate destination"), "{err}");
    }

    #[test]
    fn load_json_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(
            &path,
            r#"{"tasks": [
                {"key": "Ahri/Base/Splash", "url": "https://x/Ahri_0.jpg", "path": "Ahri/splash.jpg", "category": "splash"},
                {"key": "Ahri/Audio/Move1", "url": "https://x/Ahri_Move_1.ogg", "path": "Ahri/audio/move1.ogg", "category": "audio"},
                {"key": "Ahri/misc", "url": "https://x/misc.png", "path": "Ahri/misc.png"}
            ]}"#,
        )
        .unwrap();
        let m = Manifest::load(&path, Path::new("out")).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.tasks[0].logical_key(), "Ahri/Base/Splash");
        assert_eq!(m.tasks[1].expected_category(), AssetCategory::Audio);
        assert_eq!(m.tasks[2].expected_category(), AssetCategory::Other);
        assert_eq!(m.tasks[1].destination_path(), Path::new("out/Ahri/audio/move1.ogg"));
    }
}
