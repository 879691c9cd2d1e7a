pub mod detection;
pub mod frame;
pub mod product;

pub use detection::{clean_text, Detection, Point, Rect, SymbolKind};
pub use frame::{Frame, FrameError, PixelFormat, RawFrame};
pub use product::{Category, InventoryRecord, ProductDetails};
