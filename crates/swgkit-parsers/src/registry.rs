//! Codec registry for format discovery.
//!
//! The registry maps format ids and file extensions to codecs and detects the
//! format of a byte buffer. Several formats share the `.iff` extension, so
//! detection sniffs the content first and only falls back to the extension
//! when no codec recognizes the bytes.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::asset::{Asset, FormatKind};
use crate::traits::{Codec, ParseError, ParseOptions, ParseResult};

/// Type-erased codec wrapper for storage in the registry
pub trait AnyCodec: Send + Sync {
    /// Get the codec name
    fn name(&self) -> &str;

    /// Get supported file extensions
    fn extensions(&self) -> &[&str];

    /// Check whether the bytes look like this codec's format
    fn sniff(&self, bytes: &[u8]) -> bool;

    /// Decode into the format-independent asset wrapper
    fn decode_asset(&self, bytes: &[u8], options: &ParseOptions) -> ParseResult<Asset>;
}

impl<T> AnyCodec for T
where
    T: Codec + 'static,
    T::Model: Into<Asset>,
{
    fn name(&self) -> &str {
        Codec::name(self)
    }

    fn extensions(&self) -> &[&str] {
        Codec::extensions(self)
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        Codec::sniff(self, bytes)
    }

    fn decode_asset(&self, bytes: &[u8], options: &ParseOptions) -> ParseResult<Asset> {
        self.decode_with_options(bytes, options).map(Into::into)
    }
}

/// Factory function type for creating codec instances
pub type CodecFactory = Box<dyn Fn() -> Arc<dyn AnyCodec> + Send + Sync>;

/// Registration entry for a codec
pub struct CodecRegistration {
    /// Unique identifier for this codec
    pub id: String,
    pub kind: FormatKind,
    /// Human-readable name
    pub name: String,
    pub description: String,
    /// File extensions handled (lowercase)
    pub extensions: Vec<String>,
    /// Sniffing order and extension preference (higher = first)
    pub priority: i32,
    pub factory: CodecFactory,
}

/// Builder for codec registrations
#[derive(Default)]
pub struct CodecRegistrationBuilder {
    id: Option<String>,
    kind: Option<FormatKind>,
    name: Option<String>,
    description: String,
    extensions: Vec<String>,
    priority: i32,
    factory: Option<CodecFactory>,
}

impl CodecRegistrationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn kind(mut self, kind: FormatKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_lowercase()).collect();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn factory<C, F>(mut self, factory: F) -> Self
    where
        C: AnyCodec + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(move || Arc::new(factory()) as Arc<dyn AnyCodec>));
        self
    }

    pub fn build(self) -> Result<CodecRegistration, RegistryError> {
        let missing = |field: &str| RegistryError::IncompleteRegistration(field.to_string());
        Ok(CodecRegistration {
            id: self.id.ok_or_else(|| missing("id"))?,
            kind: self.kind.ok_or_else(|| missing("kind"))?,
            name: self.name.ok_or_else(|| missing("name"))?,
            description: self.description,
            extensions: self.extensions,
            priority: self.priority,
            factory: self.factory.ok_or_else(|| missing("factory"))?,
        })
    }
}

/// Format detected for a buffer
#[derive(Clone)]
pub struct Detection {
    pub id: String,
    pub kind: FormatKind,
    pub codec: Arc<dyn AnyCodec>,
    /// Whether the content was recognized, as opposed to only the extension
    pub sniffed: bool,
}

/// Registry of codecs
pub struct CodecRegistry {
    codecs: RwLock<HashMap<String, CodecRegistration>>,
    /// Map of extensions to codec ids (sorted by priority)
    extension_map: RwLock<HashMap<String, Vec<String>>>,
    /// Cached codec instances
    instances: RwLock<HashMap<String, Arc<dyn AnyCodec>>>,
}

impl CodecRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            codecs: RwLock::new(HashMap::new()),
            extension_map: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Registry holding every built-in codec
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        register_builtin_codecs(&registry);
        registry
    }

    pub fn register(&self, registration: CodecRegistration) -> Result<(), RegistryError> {
        let mut codecs = self.codecs.write();
        let id = registration.id.clone();
        if codecs.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }

        let mut ext_map = self.extension_map.write();
        for ext in &registration.extensions {
            let ids = ext_map.entry(ext.clone()).or_default();
            ids.push(id.clone());
            ids.sort_by_key(|other| {
                let priority = if *other == id {
                    registration.priority
                } else {
                    codecs.get(other).map_or(0, |c| c.priority)
                };
                std::cmp::Reverse(priority)
            });
        }

        tracing::debug!(id = %id, extensions = ?registration.extensions, "Registered codec");
        codecs.insert(id, registration);
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> Result<(), RegistryError> {
        let registration = self
            .codecs
            .write()
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let mut ext_map = self.extension_map.write();
        for ext in &registration.extensions {
            if let Some(ids) = ext_map.get_mut(ext) {
                ids.retain(|i| i != id);
            }
        }
        self.instances.write().remove(id);
        Ok(())
    }

    /// Get a codec instance by id
    pub fn get(&self, id: &str) -> Result<Arc<dyn AnyCodec>, RegistryError> {
        if let Some(instance) = self.instances.read().get(id) {
            return Ok(Arc::clone(instance));
        }

        let instance = {
            let codecs = self.codecs.read();
            let registration = codecs.get(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
            (registration.factory)()
        };
        self.instances.write().insert(id.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Ids of codecs claiming an extension, most preferred first
    pub fn ids_for_extension(&self, ext: &str) -> Vec<String> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.extension_map.read().get(&ext).cloned().unwrap_or_default()
    }

    fn detection(&self, id: &str, sniffed: bool) -> Result<Detection, RegistryError> {
        let kind = self
            .codecs
            .read()
            .get(id)
            .map(|r| r.kind)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Ok(Detection {
            id: id.to_string(),
            kind,
            codec: self.get(id)?,
            sniffed,
        })
    }

    /// Detect the format of `bytes`, using `path` only as a fallback hint
    pub fn detect(&self, path: Option<&Path>, bytes: &[u8]) -> Result<Detection, RegistryError> {
        let mut ids: Vec<(i32, String)> = self
            .codecs
            .read()
            .values()
            .map(|r| (r.priority, r.id.clone()))
            .collect();
        ids.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        for (_, id) in &ids {
            if self.get(id)?.sniff(bytes) {
                return self.detection(id, true);
            }
        }

        if let Some(ext) = path.and_then(Path::extension) {
            if let Some(id) = self.ids_for_extension(&ext.to_string_lossy()).first() {
                tracing::debug!(id = %id, "Content not recognized, falling back to extension");
                return self.detection(id, false);
            }
        }

        Err(match path {
            Some(p) => RegistryError::NoCodecForPath(p.to_path_buf()),
            None => RegistryError::Unrecognized,
        })
    }

    /// Detect and decode in one step
    pub fn decode(&self, path: Option<&Path>, bytes: &[u8], options: &ParseOptions) -> ParseResult<Asset> {
        let detection = self
            .detect(path, bytes)
            .map_err(|e| swgkit_core::Error::invalid_data(e.to_string()))?;
        detection.codec.decode_asset(bytes, options)
    }

    /// Read `path` and decode it
    pub fn decode_file(&self, path: &Path, options: &ParseOptions) -> ParseResult<Asset> {
        let bytes = read_file(path)?;
        self.decode(Some(path), &bytes, options)
    }

    /// List all registered codecs
    pub fn list(&self) -> Vec<CodecInfo> {
        let mut infos: Vec<CodecInfo> = self
            .codecs
            .read()
            .values()
            .map(|c| CodecInfo {
                id: c.id.clone(),
                kind: c.kind,
                name: c.name.clone(),
                description: c.description.clone(),
                extensions: c.extensions.clone(),
                priority: c.priority,
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Codec information for display
#[derive(Debug, Clone, serde::Serialize)]
pub struct CodecInfo {
    pub id: String,
    pub kind: FormatKind,
    pub name: String,
    pub description: String,
    pub extensions: Vec<String>,
    pub priority: i32,
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Codec with ID '{0}' already registered")]
    DuplicateId(String),

    #[error("Codec with ID '{0}' not found")]
    NotFound(String),

    #[error("Registration is missing '{0}'")]
    IncompleteRegistration(String),

    #[error("No codec available for path: {0}")]
    NoCodecForPath(std::path::PathBuf),

    #[error("Content not recognized by any codec")]
    Unrecognized,
}

/// Global registry instance
pub static GLOBAL_REGISTRY: Lazy<CodecRegistry> = Lazy::new(CodecRegistry::with_builtins);

fn builtin<C, F>(kind: FormatKind, name: &str, description: &str, priority: i32, factory: F) -> CodecRegistration
where
    C: Codec + 'static,
    C::Model: Into<Asset>,
    F: Fn() -> C + Send + Sync + 'static,
{
    let instance = factory();
    CodecRegistration {
        id: kind.id().to_string(),
        kind,
        name: name.to_string(),
        description: description.to_string(),
        extensions: Codec::extensions(&instance).iter().map(|e| e.to_string()).collect(),
        priority,
        factory: Box::new(move || Arc::new(factory()) as Arc<dyn AnyCodec>),
    }
}

/// Register all built-in codecs
fn register_builtin_codecs(registry: &CodecRegistry) {
    use crate::{building, camera, customization, floor, interior, palette, snapshot, terrain};

    let registrations = [
        builtin(
            FormatKind::Building,
            "Portal Layout",
            "Building portals, cells, path graph and checksum",
            100,
            || building::BuildingCodec,
        ),
        builtin(FormatKind::FloorMesh, "Floor Mesh", "Cell floor navigation mesh", 100, || floor::FloorCodec),
        builtin(
            FormatKind::TerrainLayers,
            "Terrain Layers",
            "Terrain modification families and layers",
            100,
            || terrain::TerrainCodec,
        ),
        builtin(
            FormatKind::CustomizationMap,
            "Customization Map",
            "Asset customization variables by path checksum",
            90,
            || customization::CustomizationCodec,
        ),
        builtin(
            FormatKind::InteriorLayout,
            "Interior Layout",
            "Object placements inside building cells",
            100,
            || interior::InteriorCodec,
        ),
        builtin(FormatKind::CameraRig, "Camera Rig", "Cockpit camera settings", 80, || camera::CameraCodec),
        // Last: its sniffer falls back to a byte scan
        builtin(FormatKind::WorldSnapshot, "World Snapshot", "Placed world objects", 10, || snapshot::SnapshotCodec),
        builtin(FormatKind::Palette, "Palette", "RIFF color palette", 100, || palette::PaletteCodec),
    ];

    for registration in registrations {
        if let Err(e) = registry.register(registration) {
            tracing::warn!(error = %e, "Failed to register built-in codec");
        }
    }
}

/// Read a whole asset file; a missing file is reported as [`ParseError::FileNotFound`]
pub fn read_file(path: &Path) -> ParseResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ParseError::FileNotFound(path.to_path_buf()),
        _ => ParseError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraRig;
    use crate::customization::CustomizationMap;

    #[test]
    fn test_builtins_registered() {
        let registry = CodecRegistry::with_builtins();
        assert_eq!(registry.list().len(), FormatKind::ALL.len());
        assert_eq!(registry.ids_for_extension(".IFF"), vec!["acst".to_string(), "cckp".to_string()]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = CodecRegistry::with_builtins();
        let again = CodecRegistrationBuilder::new()
            .id("pob")
            .kind(FormatKind::Building)
            .name("again")
            .factory(|| crate::building::BuildingCodec)
            .build()
            .unwrap();
        assert!(matches!(registry.register(again), Err(RegistryError::DuplicateId(_))));
    }

    #[test]
    fn test_builder_requires_factory() {
        let result = CodecRegistrationBuilder::new().id("x").kind(FormatKind::Palette).name("x").build();
        assert!(matches!(result, Err(RegistryError::IncompleteRegistration(_))));
    }

    #[test]
    fn test_detect_by_content_over_extension() {
        let registry = CodecRegistry::with_builtins();
        let rig = crate::camera::encode(&CameraRig::new("a"));
        let detection = registry.detect(Some(Path::new("cockpit.iff")), &rig).unwrap();
        assert_eq!(detection.kind, FormatKind::CameraRig);
        assert!(detection.sniffed);

        let map = crate::customization::encode(&CustomizationMap::new());
        let detection = registry.detect(Some(Path::new("map.iff")), &map).unwrap();
        assert_eq!(detection.kind, FormatKind::CustomizationMap);
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        let registry = CodecRegistry::with_builtins();
        let detection = registry.detect(Some(Path::new("broken.pob")), b"garbage").unwrap();
        assert_eq!(detection.kind, FormatKind::Building);
        assert!(!detection.sniffed);
        assert!(matches!(registry.detect(None, b"garbage"), Err(RegistryError::Unrecognized)));
    }

    #[test]
    fn test_unregister() {
        let registry = CodecRegistry::with_builtins();
        registry.unregister("pal").unwrap();
        assert!(registry.ids_for_extension("pal").is_empty());
        assert!(matches!(registry.get("pal"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_missing_file_reported_by_path() {
        let path = std::env::temp_dir().join("swgkit-registry-no-such-file.pob");
        let err = CodecRegistry::with_builtins()
            .decode_file(&path, &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, ParseError::FileNotFound(p) if p == path));
    }
}
