// Receipt content: copy pools, timed line generation, and the export view.
// Pure code; no timers or I/O beyond loading an optional library file at startup.

pub mod content;
pub mod export;
pub mod generator;
pub mod line;

pub use content::ContentLibrary;
pub use export::{ReceiptExport, ReceiptImage};
pub use generator::generate_lines;
pub use line::{DisplayName, LineKind, ReceiptLine, ReceiptLineSequence};
