//! 裸流输入: H.264 Annex B 访问单元切分, ADTS 帧切分, 以及按时间戳交织.

use anyhow::{Result, bail};
use recmux_codec::parsers::adts::split_adts;
use recmux_codec::parsers::h264::{NalUnitType, split_annex_b};

/// 每个 AAC 帧的采样数
pub const AAC_FRAME_SAMPLES: i64 = 1024;

/// 一个 H.264 访问单元 (一帧), 以 4 字节起始码重新拼接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// 把 Annex B 字节流切分为访问单元
///
/// 新访问单元开始于:
/// - AUD
/// - 已出现 VCL NAL 之后的 SPS / PPS / SEI
/// - 已出现 VCL NAL 之后, `first_mb_in_slice == 0` 的 VCL NAL
pub fn split_access_units(stream: &[u8]) -> Vec<AccessUnit> {
    let mut units = Vec::new();
    let mut current = AccessUnit {
        data: Vec::new(),
        is_keyframe: false,
    };
    let mut has_vcl = false;

    for nalu in split_annex_b(stream) {
        let nal_type = nalu.nal_type;
        let starts_new = match nal_type {
            NalUnitType::Aud => !current.data.is_empty(),
            NalUnitType::Sps | NalUnitType::Pps | NalUnitType::Sei => has_vcl,
            t if t.is_vcl() => has_vcl && nalu.first_mb_in_slice() == Some(0),
            _ => false,
        };
        if starts_new {
            units.push(std::mem::replace(
                &mut current,
                AccessUnit {
                    data: Vec::new(),
                    is_keyframe: false,
                },
            ));
            has_vcl = false;
        }

        current.data.extend_from_slice(&[0, 0, 0, 1]);
        current.data.extend_from_slice(nalu.data);
        current.is_keyframe |= nal_type.is_idr();
        has_vcl |= nal_type.is_vcl();
    }

    if !current.data.is_empty() {
        units.push(current);
    }
    units
}

/// ADTS 音频输入
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub sample_rate: u32,
    pub channels: u32,
    /// 去掉帧头的原始 AAC 帧
    pub frames: Vec<Vec<u8>>,
}

/// 解析 ADTS 字节流, 采样率与声道数取自第一帧
pub fn read_adts(data: &[u8]) -> Result<AudioInput> {
    let frames = split_adts(data);
    let Some(first) = frames.first() else {
        bail!("音频输入中没有找到 ADTS 帧");
    };
    let (sample_rate, channels) = (first.header.sample_rate(), first.header.channels());
    if sample_rate == 0 || channels == 0 {
        bail!("不支持的 ADTS 参数: 采样率 {sample_rate}, 声道数 {channels}");
    }
    Ok(AudioInput {
        sample_rate,
        channels,
        frames: frames.iter().map(|f| f.payload.to_vec()).collect(),
    })
}

/// 交织后的一个数据包
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    Video { index: usize, pts_micros: i64 },
    Audio { index: usize, pts_micros: i64 },
}

impl Scheduled {
    pub fn pts_micros(&self) -> i64 {
        match *self {
            Self::Video { pts_micros, .. } | Self::Audio { pts_micros, .. } => pts_micros,
        }
    }
}

/// 按时间戳交织视频帧与音频帧, 时间戳相同时视频在前
///
/// 视频第 n 帧的时间戳为 `n * 1e6 / fps` 微秒, 音频第 n 帧为
/// `n * 1024 * 1e6 / sample_rate` 微秒.
pub fn interleave(
    video_frames: usize,
    fps: u32,
    audio_frames: usize,
    sample_rate: u32,
) -> Vec<Scheduled> {
    let video_pts = |n: usize| n as i64 * 1_000_000 / i64::from(fps.max(1));
    let audio_pts =
        |n: usize| n as i64 * AAC_FRAME_SAMPLES * 1_000_000 / i64::from(sample_rate.max(1));

    let mut out = Vec::with_capacity(video_frames + audio_frames);
    let (mut v, mut a) = (0, 0);
    while v < video_frames || a < audio_frames {
        let take_video = a >= audio_frames || (v < video_frames && video_pts(v) <= audio_pts(a));
        if take_video {
            out.push(Scheduled::Video {
                index: v,
                pts_micros: video_pts(v),
            });
            v += 1;
        } else {
            out.push(Scheduled::Audio {
                index: a,
                pts_micros: audio_pts(a),
            });
            a += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmux_codec::parsers::adts::AdtsHeader;

    fn annex_b(nals: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for nal in nals {
            out.extend_from_slice(&[0, 0, 0, 1]);
            out.extend_from_slice(nal);
        }
        out
    }

    #[test]
    fn test_split_access_units() {
        let stream = annex_b(&[
            &[0x09, 0xF0],
            &[0x67, 0x42, 0x00, 0x1E, 0xAB],
            &[0x68, 0xCE, 0x38, 0x80],
            &[0x65, 0x88, 0x84],
            // 同一图像的第二个切片 (first_mb_in_slice = 1)
            &[0x65, 0x40, 0x21],
            &[0x41, 0x9A, 0x21],
            &[0x06, 0x05, 0x01, 0x80],
            &[0x41, 0x9A, 0x22],
        ]);

        let units = split_access_units(&stream);
        assert_eq!(units.len(), 3);
        assert!(units[0].is_keyframe);
        assert_eq!(split_annex_b(&units[0].data).len(), 5);
        assert!(!units[1].is_keyframe);
        assert_eq!(units[1].data, annex_b(&[&[0x41, 0x9A, 0x21]]));
        assert_eq!(
            units[2].data,
            annex_b(&[&[0x06, 0x05, 0x01, 0x80], &[0x41, 0x9A, 0x22]])
        );
    }

    #[test]
    fn test_split_access_units_at_aud() {
        let stream = annex_b(&[&[0x09, 0xF0], &[0x41, 0x40, 0x21], &[0x09, 0xF0], &[0x41, 0x40, 0x22]]);
        assert_eq!(split_access_units(&stream).len(), 2);
        assert!(split_access_units(&[]).is_empty());
    }

    #[test]
    fn test_read_adts() {
        // AAC-LC, 44100 Hz (索引 4), 双声道
        let mut data = Vec::new();
        for payload in [[0x21, 0x10, 0x04], [0x21, 0x10, 0x05]] {
            data.extend_from_slice(&AdtsHeader::encode(2, 4, 2, payload.len()));
            data.extend_from_slice(&payload);
        }
        let audio = read_adts(&data).unwrap();
        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.frames, vec![vec![0x21, 0x10, 0x04], vec![0x21, 0x10, 0x05]]);

        assert!(read_adts(&[0x00; 16]).is_err());
    }

    #[test]
    fn test_interleave_by_timestamp() {
        // 视频 30 fps: 0, 33333, 66666; 音频 48 kHz: 0, 21333, 42666
        let order = interleave(3, 30, 3, 48000);
        let pts: Vec<i64> = order.iter().map(Scheduled::pts_micros).collect();
        assert_eq!(pts, vec![0, 0, 21333, 33333, 42666, 66666]);
        assert!(matches!(order[0], Scheduled::Video { index: 0, .. }));
        assert!(matches!(order[1], Scheduled::Audio { index: 0, .. }));
        assert_eq!(interleave(2, 25, 0, 44100).len(), 2);
    }
}
