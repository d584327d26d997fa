//! Frame, plane and color descriptions exchanged with decoders and backends.

mod chroma;
mod color;
mod orientation;
mod picture;
mod pixel;

pub use chroma::ChromaLocation;
pub use color::{AlphaMode, BitEncoding, ColorRepr, ColorSpace, ColorSystem, Levels, Light, Primaries, Transfer};
pub use orientation::{Orientation, Rotation};
pub use picture::{Picture, PlaneBuffer, PlaneData, Subpicture, SubpictureRegion, VideoFormat};
pub use pixel::{PixelFormat, PlaneLayout, SUBPICTURE_FORMATS};
