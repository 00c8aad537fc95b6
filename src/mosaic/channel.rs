use std::fmt;

use serde::Serialize;

/// One of the three planes carried by every tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Image,
    Mask,
    Variance,
}

impl ChannelKind {
    /// Every channel, in output order.
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::Image,
        ChannelKind::Mask,
        ChannelKind::Variance,
    ];

    /// HDU holding this channel in a tile.
    pub const fn hdu_index(self) -> usize {
        match self {
            ChannelKind::Image => 1,
            ChannelKind::Mask => 2,
            ChannelKind::Variance => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ChannelKind::Image => "image",
            ChannelKind::Mask => "mask",
            ChannelKind::Variance => "variance",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
