pub mod api;
pub mod archive;
pub mod manifest;
pub mod models;

/// Manifest type tag shared by every pack this crate reads or writes.
pub const MANIFEST_TYPE: &str = "minecraftModpack";
/// Name of the single entry inside an exported archive.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
