//! Configuration sources, added to the builder in override order.

pub(super) mod environment;
pub(super) mod zone_file;
