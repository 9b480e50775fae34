//! PDF snapshot export.
//!
//! Pipeline: `host` mounts an off-screen print surface and hydrates it, `gate`
//! waits until it is ready, `raster` paints it into one tall bitmap, `paginate`
//! slices that into A4 JPEG pages and `pdf` writes the document. `controller`
//! sequences a run and guarantees teardown.

pub mod assets;
pub mod controller;
pub mod document;
pub mod filename;
pub mod gate;
pub mod glyphs;
pub mod handlers;
pub mod host;
pub mod layout;
pub mod notice;
pub mod paginate;
pub mod pdf;
pub mod raster;
pub mod snapshot;
