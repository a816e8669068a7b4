//! Presentation hints for the rendering layer.
//!
//! These values never influence graph logic. They are a pure function of a
//! node's category, status and root-ness, so every renderer sees the same
//! size and color for the same node.

use crate::NodeStatus;

/// Size of a node created without a parent.
pub const ROOT_SIZE: u32 = 80;
/// Size of a node whose article has arrived.
pub const COMPLETE_SIZE: u32 = 40;
/// Size of a referenced but unexplored node.
pub const STUB_SIZE: u32 = 20;

/// Color of nodes whose category is not yet known.
pub const UNEXPLORED_COLOR: &str = "#aaddff";
/// Color of nodes whose content session failed.
pub const FAILED_COLOR: &str = "#ff0055";

/// Colors assigned to completed nodes by category.
pub const CATEGORY_PALETTE: [&str; 8] = [
    "#00ffff", "#00ccff", "#7c4dff", "#ff9100", "#00e676", "#ffd600", "#f50057", "#18ffff",
];

/// Size hint for a node.
pub fn size_hint(status: NodeStatus, is_root: bool) -> u32 {
    if is_root {
        ROOT_SIZE
    } else if status == NodeStatus::Complete {
        COMPLETE_SIZE
    } else {
        STUB_SIZE
    }
}

/// Color hint for a node.
pub fn color_hint(category: Option<&str>, status: NodeStatus) -> &'static str {
    match (status, category) {
        (NodeStatus::Failed, _) => FAILED_COLOR,
        (NodeStatus::Complete, Some(category)) => category_color(category),
        _ => UNEXPLORED_COLOR,
    }
}

/// Palette color for a category label; case and surrounding whitespace are
/// ignored.
pub fn category_color(category: &str) -> &'static str {
    // FNV-1a, so the mapping is identical across platforms and releases.
    let mut hash: u32 = 0x811c_9dc5;
    for byte in category.trim().to_lowercase().bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    CATEGORY_PALETTE[hash as usize % CATEGORY_PALETTE.len()]
}
