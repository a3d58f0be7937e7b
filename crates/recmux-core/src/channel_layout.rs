//! 音频声道布局定义.
//!
//! 对标 FFmpeg 的 `AVChannelLayout` / `AV_CH_LAYOUT_*`.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// 声道位掩码, 每个位代表一个扬声器位置
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u64 {
        /// 前方左声道
        const FRONT_LEFT            = 1 << 0;
        /// 前方右声道
        const FRONT_RIGHT           = 1 << 1;
        /// 前方中央声道
        const FRONT_CENTER          = 1 << 2;
        /// 低频效果 (LFE / 重低音)
        const LOW_FREQUENCY         = 1 << 3;
        /// 后方左声道
        const BACK_LEFT             = 1 << 4;
        /// 后方右声道
        const BACK_RIGHT            = 1 << 5;
        /// 后方中央声道
        const BACK_CENTER           = 1 << 8;
        /// 侧方左声道
        const SIDE_LEFT             = 1 << 9;
        /// 侧方右声道
        const SIDE_RIGHT            = 1 << 10;
    }
}

/// 声道布局
///
/// 描述音频流中声道的数量和排列方式.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelLayout {
    /// 声道数量
    pub channels: u32,
    /// 声道位掩码 (标准布局使用)
    pub mask: ChannelMask,
}

const FL_FR: ChannelMask = ChannelMask::FRONT_LEFT.union(ChannelMask::FRONT_RIGHT);

impl ChannelLayout {
    /// 单声道
    pub const MONO: Self = Self {
        channels: 1,
        mask: ChannelMask::FRONT_CENTER,
    };

    /// 立体声 (左右)
    pub const STEREO: Self = Self {
        channels: 2,
        mask: FL_FR,
    };

    /// 3.0 (左右中)
    pub const SURROUND: Self = Self {
        channels: 3,
        mask: FL_FR.union(ChannelMask::FRONT_CENTER),
    };

    /// 4.0 (左右中 + 后中)
    pub const QUAD_CENTER: Self = Self {
        channels: 4,
        mask: FL_FR
            .union(ChannelMask::FRONT_CENTER)
            .union(ChannelMask::BACK_CENTER),
    };

    /// 5.0 (后置环绕)
    pub const SURROUND_5_0: Self = Self {
        channels: 5,
        mask: FL_FR
            .union(ChannelMask::FRONT_CENTER)
            .union(ChannelMask::BACK_LEFT)
            .union(ChannelMask::BACK_RIGHT),
    };

    /// 5.1 环绕声
    pub const SURROUND_5_1: Self = Self {
        channels: 6,
        mask: FL_FR
            .union(ChannelMask::FRONT_CENTER)
            .union(ChannelMask::LOW_FREQUENCY)
            .union(ChannelMask::BACK_LEFT)
            .union(ChannelMask::BACK_RIGHT),
    };

    /// 6.1 环绕声
    pub const SURROUND_6_1: Self = Self {
        channels: 7,
        mask: FL_FR
            .union(ChannelMask::FRONT_CENTER)
            .union(ChannelMask::LOW_FREQUENCY)
            .union(ChannelMask::BACK_CENTER)
            .union(ChannelMask::SIDE_LEFT)
            .union(ChannelMask::SIDE_RIGHT),
    };

    /// 7.1 环绕声
    pub const SURROUND_7_1: Self = Self {
        channels: 8,
        mask: FL_FR
            .union(ChannelMask::FRONT_CENTER)
            .union(ChannelMask::LOW_FREQUENCY)
            .union(ChannelMask::BACK_LEFT)
            .union(ChannelMask::BACK_RIGHT)
            .union(ChannelMask::SIDE_LEFT)
            .union(ChannelMask::SIDE_RIGHT),
    };

    /// 声道数对应的默认布局 (同 `av_get_default_channel_layout`)
    ///
    /// 没有标准布局的声道数返回 `None`.
    pub const fn default_for(channels: u32) -> Option<Self> {
        match channels {
            1 => Some(Self::MONO),
            2 => Some(Self::STEREO),
            3 => Some(Self::SURROUND),
            4 => Some(Self::QUAD_CENTER),
            5 => Some(Self::SURROUND_5_0),
            6 => Some(Self::SURROUND_5_1),
            7 => Some(Self::SURROUND_6_1),
            8 => Some(Self::SURROUND_7_1),
            _ => None,
        }
    }

    /// 根据声道数创建布局, 无标准布局时掩码为空
    pub fn from_channels(channels: u32) -> Self {
        Self::default_for(channels).unwrap_or(Self {
            channels,
            mask: ChannelMask::empty(),
        })
    }

    /// 是否为带位掩码的标准布局
    pub fn is_standard(&self) -> bool {
        self.mask.bits().count_ones() == self.channels && !self.mask.is_empty()
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MONO => write!(f, "mono"),
            Self::STEREO => write!(f, "stereo"),
            Self::SURROUND => write!(f, "3.0"),
            Self::QUAD_CENTER => write!(f, "4.0"),
            Self::SURROUND_5_0 => write!(f, "5.0"),
            Self::SURROUND_5_1 => write!(f, "5.1"),
            Self::SURROUND_6_1 => write!(f, "6.1"),
            Self::SURROUND_7_1 => write!(f, "7.1"),
            _ => write!(f, "{}ch", self.channels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layouts_match_channel_count() {
        for n in 1..=8 {
            let layout = ChannelLayout::default_for(n).expect("应有默认布局");
            assert_eq!(layout.channels, n);
            assert_eq!(layout.mask.bits().count_ones(), n, "{layout}");
            assert!(layout.is_standard());
        }
    }

    #[test]
    fn test_no_default_layout() {
        assert!(ChannelLayout::default_for(0).is_none());
        assert!(ChannelLayout::default_for(9).is_none());
        let layout = ChannelLayout::from_channels(12);
        assert_eq!(layout.channels, 12);
        assert!(!layout.is_standard());
        assert_eq!(format!("{layout}"), "12ch");
    }

    #[test]
    fn test_layout_names() {
        assert_eq!(format!("{}", ChannelLayout::from_channels(1)), "mono");
        assert_eq!(format!("{}", ChannelLayout::from_channels(2)), "stereo");
        assert_eq!(format!("{}", ChannelLayout::from_channels(6)), "5.1");
    }
}
