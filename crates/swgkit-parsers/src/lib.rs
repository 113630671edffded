//! swgkit-parsers
//!
//! Codecs for the chunk-tree (IFF) asset formats of Star Wars Galaxies.
//!
//! # Supported Formats
//!
//! | Format              | Root      | Extension | Description |
//! |---------------------|-----------|-----------|-------------|
//! | Portal layout       | `PRTO`    | `.pob`    | Building portals, cells, path graph |
//! | Floor mesh          | `FLOR`    | `.flr`    | Cell navigation mesh |
//! | Terrain layers      | `TGEN`    | `.lay`    | Terrain modification families and layers |
//! | Customization map   | `ACST`    | `.iff`    | Customization variables per asset |
//! | Interior layout     | `INLY`    | `.ilf`    | Object placements inside cells |
//! | Camera rig          | `CCKP`    | `.iff`    | Cockpit camera settings |
//! | World snapshot      | `WSNP`    | `.ws`     | Placed world objects |
//! | Palette             | RIFF      | `.pal`    | Color palette |
//!
//! Every format exposes `decode(bytes) -> Model` and `encode(&Model) -> bytes`.
//! Decoding a well-formed file and encoding it again reproduces the input
//! byte for byte.
//!
//! # Example
//!
//! ```rust,ignore
//! use swgkit_parsers::building;
//!
//! let bytes = std::fs::read("thm_tato_cantina.pob")?;
//! let layout = building::decode(&bytes)?;
//! for (cell, position) in layout.cell_positions() {
//!     println!("{} at {:?}", layout.cells[cell].name, position);
//! }
//! assert_eq!(building::encode(&layout), bytes);
//! ```

pub mod asset;
pub mod binary;
pub mod building;
pub mod camera;
pub mod crc;
pub mod customization;
pub mod floor;
pub mod iff;
pub mod interior;
pub mod logging;
pub mod palette;
pub mod registry;
pub mod snapshot;
pub mod terrain;
pub mod traits;

// Re-export main types
pub use traits::{Codec, ParseError, ParseOptions, ParseResult};

pub use registry::{
    read_file, AnyCodec, CodecInfo, CodecRegistration, CodecRegistrationBuilder, CodecRegistry, Detection,
    RegistryError, GLOBAL_REGISTRY,
};

pub use asset::{Asset, FormatKind};
pub use binary::{ByteReader, ByteWriter, Endian};
pub use building::{Building, BuildingCodec, BuildingVersion, Cell, Portal, PortalRecord};
pub use camera::{CameraCodec, CameraRig};
pub use customization::{CustomizationCodec, CustomizationMap};
pub use floor::{FloorCodec, FloorMesh};
pub use iff::{Node, Tag};
pub use interior::{InteriorCodec, InteriorLayout, Placement};
pub use palette::{Palette, PaletteCodec};
pub use snapshot::{SnapshotCodec, WorldSnapshot};
pub use terrain::{Layer, TerrainCodec, TerrainLayers};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
