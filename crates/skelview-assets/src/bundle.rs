//! Assembling a skeleton bundle from user-selected files.
//!
//! A bundle is one skeleton descriptor (`.skel` or `.json`), one atlas and
//! the page images the atlas names, all gathered into a [`ResourceTable`]
//! before any load is issued.

use std::path::{Path, PathBuf};

use crate::atlas::AtlasDescriptor;
use crate::cache::AssetCache;
use crate::error::{AssetError, AssetResult};
use crate::io::FileReader;
use crate::locator::Locator;
use crate::resolver::{ResourceResolver, ResourceTable};
use crate::version::{self, RuntimeLine, SkeletonFormat, SkeletonVersion};

/// Skeleton, atlas and page images ready to be loaded.
#[derive(Debug, Clone)]
pub struct SkeletonBundle {
    pub skeleton_name: String,
    pub atlas_name: String,
    pub format: SkeletonFormat,
    /// Editor version the skeleton was exported with, if it could be read.
    pub version: Option<String>,
    /// Page names in atlas order.
    pub page_names: Vec<String>,
    pub table: ResourceTable,
}

fn file_name(path: &Path) -> AssetResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| AssetError::invalid_bundle(format!("{} has no file name", path.display())))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

impl SkeletonBundle {
    /// Build a bundle from selected file paths.
    ///
    /// The selection needs a skeleton descriptor and an atlas; a `.skel`
    /// wins over a `.json` when both are present. Page images are taken
    /// from the selection when a selected file has the page's name, and
    /// read from the atlas directory otherwise. A page image that cannot be
    /// found is left out, so the atlas load reports it.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> AssetResult<Self> {
        if paths.len() < 2 {
            return Err(AssetError::invalid_bundle(
                "select at least a skeleton file and an atlas file",
            ));
        }

        let mut binary: Option<&Path> = None;
        let mut json: Option<&Path> = None;
        let mut atlas: Option<&Path> = None;
        let mut others: Vec<&Path> = Vec::new();

        for path in paths.iter().map(AsRef::as_ref) {
            match extension(path).as_deref() {
                Some("skel") if binary.is_none() => binary = Some(path),
                Some("json") if json.is_none() => json = Some(path),
                Some("atlas") if atlas.is_none() => atlas = Some(path),
                _ => others.push(path),
            }
        }

        let (skeleton_path, format) = match (binary, json) {
            (Some(path), _) => (path, SkeletonFormat::Binary),
            (None, Some(path)) => (path, SkeletonFormat::Json),
            (None, None) => {
                return Err(AssetError::invalid_bundle(
                    "no .skel or .json skeleton file selected",
                ));
            }
        };
        let atlas_path =
            atlas.ok_or_else(|| AssetError::invalid_bundle("no .atlas file selected"))?;

        let reader = FileReader::new("");
        let skeleton_name = file_name(skeleton_path)?;
        let atlas_name = file_name(atlas_path)?;

        let mut table = ResourceTable::new();
        table.insert(skeleton_name.clone(), reader.read_bytes_sync(skeleton_path)?);
        let atlas_bytes = reader.read_bytes_sync(atlas_path)?;
        let descriptor = parse_atlas(&atlas_name, &atlas_bytes)?;
        table.insert(atlas_name.clone(), atlas_bytes);

        let atlas_dir = atlas_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let page_reader = FileReader::new(&atlas_dir);

        for name in descriptor.page_names() {
            let selected: Option<PathBuf> = others
                .iter()
                .find(|path| path.file_name().and_then(|n| n.to_str()) == Some(Locator::new(name).file_name()))
                .map(|path| path.to_path_buf());

            let result = match &selected {
                Some(path) => reader.read_bytes_sync(path),
                None => page_reader.read_bytes_sync(Path::new(name)),
            };

            match result {
                Ok(bytes) => table.insert(name, bytes),
                Err(err) => tracing::warn!("Page image {} unavailable: {}", name, err),
            }
        }

        Self::assemble(skeleton_name, atlas_name, format, descriptor, table)
    }

    /// Build a bundle from bytes already in `table`.
    pub fn from_table(
        skeleton_name: impl Into<String>,
        atlas_name: impl Into<String>,
        table: ResourceTable,
    ) -> AssetResult<Self> {
        let skeleton_name = skeleton_name.into();
        let atlas_name = atlas_name.into();

        let format = Locator::new(&skeleton_name)
            .extension()
            .and_then(SkeletonFormat::from_extension)
            .ok_or_else(|| {
                AssetError::invalid_bundle(format!("{} is not a .skel or .json file", skeleton_name))
            })?;

        let atlas_bytes = table
            .get(&Locator::new(&atlas_name))
            .ok_or_else(|| AssetError::invalid_bundle(format!("{} is not in the table", atlas_name)))?;
        let descriptor = parse_atlas(&atlas_name, &atlas_bytes)?;

        Self::assemble(skeleton_name, atlas_name, format, descriptor, table)
    }

    fn assemble(
        skeleton_name: String,
        atlas_name: String,
        format: SkeletonFormat,
        descriptor: AtlasDescriptor,
        table: ResourceTable,
    ) -> AssetResult<Self> {
        let skeleton_bytes = table.get(&Locator::new(&skeleton_name)).ok_or_else(|| {
            AssetError::invalid_bundle(format!("{} is not in the table", skeleton_name))
        })?;

        let version = version::sniff(format, &skeleton_bytes);
        match &version {
            Some(version) => tracing::info!("{} exported with version {}", skeleton_name, version),
            None => tracing::warn!("{} carries no readable version", skeleton_name),
        }

        Ok(Self {
            skeleton_name,
            atlas_name,
            format,
            version,
            page_names: descriptor.page_names().map(str::to_string).collect(),
            table,
        })
    }

    /// Parsed form of [`SkeletonBundle::version`].
    pub fn skeleton_version(&self) -> Option<SkeletonVersion> {
        self.version.as_deref().and_then(SkeletonVersion::parse)
    }

    /// The runtime family that can play this skeleton.
    pub fn runtime(&self) -> RuntimeLine {
        self.skeleton_version()
            .map(|version| version.runtime())
            .unwrap_or(RuntimeLine::Unsupported)
    }

    /// A resolver serving this bundle's files, without a network tier.
    pub fn resolver(&self) -> ResourceResolver {
        ResourceResolver::new(self.table.clone())
    }

    /// Issue the skeleton load and the atlas load.
    ///
    /// Returns the skeleton and atlas locators.
    pub fn load_into(&self, cache: &AssetCache) -> (Locator, Locator) {
        let skeleton = match self.format {
            SkeletonFormat::Binary => cache.load_binary(&self.skeleton_name),
            SkeletonFormat::Json => cache.load_text(&self.skeleton_name),
        };
        let atlas = cache.load_texture_atlas(&self.atlas_name);
        (skeleton, atlas)
    }
}

fn parse_atlas(name: &str, bytes: &[u8]) -> AssetResult<AtlasDescriptor> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| AssetError::invalid_bundle(format!("{} is not UTF-8: {}", name, e)))?;
    let descriptor = AtlasDescriptor::parse(text);
    if descriptor.pages.is_empty() {
        return Err(AssetError::invalid_bundle(format!("{} declares no pages", name)));
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::SKELETON_HEADER_SKIP;
    use crate::binary::tests::write_string;
    use crate::loader::tests::png_bytes;

    fn skel_bytes(version: &str) -> Vec<u8> {
        let mut bytes = vec![0u8; SKELETON_HEADER_SKIP];
        write_string(&mut bytes, Some(version));
        bytes
    }

    #[test]
    fn test_from_paths_reads_pages_next_to_atlas() {
        let dir = tempfile::tempdir().unwrap();
        let skel = dir.path().join("hero.skel");
        let atlas = dir.path().join("hero.atlas");
        std::fs::write(&skel, skel_bytes("3.8.95")).unwrap();
        std::fs::write(&atlas, "\nhero.png\nsize: 4,4\nhead\n  xy: 0, 0\n").unwrap();
        std::fs::write(dir.path().join("hero.png"), png_bytes(4, 4)).unwrap();

        let bundle = SkeletonBundle::from_paths(&[&skel, &atlas]).unwrap();
        assert_eq!(bundle.skeleton_name, "hero.skel");
        assert_eq!(bundle.atlas_name, "hero.atlas");
        assert_eq!(bundle.format, SkeletonFormat::Binary);
        assert_eq!(bundle.version.as_deref(), Some("3.8.95"));
        assert_eq!(bundle.runtime(), RuntimeLine::Spine38);
        assert_eq!(bundle.page_names, ["hero.png"]);
        assert_eq!(bundle.table.len(), 3);
    }

    #[test]
    fn test_binary_preferred_over_json() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("hero.json");
        let skel = dir.path().join("hero.skel");
        let atlas = dir.path().join("hero.atlas");
        std::fs::write(&json, r#"{"skeleton":{"spine":"4.1.20"}}"#).unwrap();
        std::fs::write(&skel, skel_bytes("4.1.20")).unwrap();
        std::fs::write(&atlas, "hero.png\n").unwrap();

        let bundle = SkeletonBundle::from_paths(&[&json, &skel, &atlas]).unwrap();
        assert_eq!(bundle.format, SkeletonFormat::Binary);
        assert_eq!(bundle.runtime(), RuntimeLine::Spine41);
        // the page image is missing and left for the atlas load to report
        assert_eq!(bundle.table.len(), 2);
    }

    #[test]
    fn test_invalid_selections() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = dir.path().join("hero.atlas");
        let png = dir.path().join("hero.png");
        std::fs::write(&atlas, "hero.png\n").unwrap();
        std::fs::write(&png, png_bytes(1, 1)).unwrap();

        assert!(matches!(
            SkeletonBundle::from_paths(&[&atlas]),
            Err(AssetError::InvalidBundle { .. })
        ));
        assert!(matches!(
            SkeletonBundle::from_paths(&[&atlas, &png]),
            Err(AssetError::InvalidBundle { .. })
        ));

        let skel = dir.path().join("hero.skel");
        std::fs::write(&skel, skel_bytes("3.8.95")).unwrap();
        assert!(matches!(
            SkeletonBundle::from_paths(&[&skel, &png]),
            Err(AssetError::InvalidBundle { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let skel = dir.path().join("hero.skel");
        let atlas = dir.path().join("hero.atlas");
        std::fs::write(&atlas, "hero.png\n").unwrap();

        assert!(matches!(
            SkeletonBundle::from_paths(&[&skel, &atlas]),
            Err(AssetError::NotFound { .. })
        ));
    }

    #[test]
    fn test_from_table_json() {
        let mut table = ResourceTable::new();
        table.insert("hero.json", br#"{"skeleton":{"spine":"4.1.20"}}"#.to_vec());
        table.insert("hero.atlas", b"hero.png\nhero2.png\n\nhero3.png\n".to_vec());

        let bundle = SkeletonBundle::from_table("hero.json", "hero.atlas", table).unwrap();
        assert_eq!(bundle.format, SkeletonFormat::Json);
        assert_eq!(bundle.version.as_deref(), Some("4.1.20"));
        assert_eq!(bundle.page_names, ["hero.png", "hero3.png"]);

        assert!(matches!(
            SkeletonBundle::from_table("hero.txt", "hero.atlas", bundle.table.clone()),
            Err(AssetError::InvalidBundle { .. })
        ));
    }
}
