//! 轨道注册.
//!
//! 按调用方声明的编码参数构建输出流并追加到会话, 返回从 0 开始的轨道索引.
//! 音频轨道会临时打开一个编码器实例, 只用来读出它要求的采样格式和
//! AudioSpecificConfig, 随后立即丢弃.

use recmux_codec::{CodecId, CodecParameters};
use recmux_core::{ChannelLayout, DisplayMatrix, MediaType, MuxError, MuxResult, PixelFormat, Rational};

use super::{FormatContext, LifecycleState};
use crate::stream::{AudioStreamParams, SideData, Stream, StreamParams, VideoStreamParams};

/// 视频轨道固定使用的编码器
const VIDEO_CODEC: CodecId = CodecId::H264;
/// 视频轨道固定的像素格式
const VIDEO_PIXEL_FORMAT: PixelFormat = PixelFormat::Yuvj420p;
/// 音频轨道固定使用的编码器
const AUDIO_CODEC: CodecId = CodecId::Aac;

impl FormatContext {
    /// 添加音频轨道
    ///
    /// 声道布局取声道数对应的默认布局, 采样格式取编码器支持的第一个格式,
    /// 时间基为 `1/sample_rate`.
    pub fn add_audio_track(&mut self, bit_rate: u64, sample_rate: u32, channels: u32) -> MuxResult<usize> {
        self.expect_state(LifecycleState::Created, "添加音频轨道")?;
        if sample_rate == 0 || channels == 0 {
            return Err(MuxError::InvalidArgument(format!(
                "音频参数无效: {sample_rate} Hz, {channels} 声道"
            )));
        }
        let tb_den = time_base_den(sample_rate, "采样率")?;
        let channel_layout = ChannelLayout::from_channels(channels);

        let mut encoder = self.codecs.create_encoder(AUDIO_CODEC)?;
        let sample_format = encoder.sample_formats().first().copied().ok_or_else(|| {
            MuxError::Internal(format!("编码器 {} 没有声明采样格式", encoder.name()))
        })?;
        encoder.open(&CodecParameters::audio(
            AUDIO_CODEC,
            bit_rate,
            sample_rate,
            channel_layout,
            sample_format,
        ))?;
        let negotiated = encoder.parameters()?;
        drop(encoder);

        let frame_size = negotiated.audio_params().map_or(0, |a| a.frame_size);
        let index = self.streams.len();
        self.streams.push(Stream {
            index,
            media_type: MediaType::Audio,
            codec_id: AUDIO_CODEC,
            time_base: Rational::new(1, tb_den),
            extra_data: negotiated.extra_data,
            params: StreamParams::Audio(AudioStreamParams {
                sample_rate,
                channel_layout,
                sample_format,
                bit_rate,
                frame_size,
            }),
            side_data: Vec::new(),
        });

        log::debug!(
            target: "recmux",
            "添加音频轨道 #{index}: {sample_rate} Hz, {channel_layout}, {sample_format}, {bit_rate} bps"
        );
        Ok(index)
    }

    /// 添加视频轨道
    ///
    /// 时间基为 `1/frame_rate`. `orientation_hint` 非 0 时附加显示矩阵,
    /// 角度按原值写入, 不要求是 90 的倍数.
    pub fn add_video_track(
        &mut self,
        bit_rate: u64,
        frame_rate: u32,
        width: u32,
        height: u32,
        orientation_hint: i32,
    ) -> MuxResult<usize> {
        self.expect_state(LifecycleState::Created, "添加视频轨道")?;
        if frame_rate == 0 || width == 0 || height == 0 {
            return Err(MuxError::InvalidArgument(format!(
                "视频参数无效: {width}x{height} @ {frame_rate} fps"
            )));
        }
        let tb_den = time_base_den(frame_rate, "帧率")?;

        let mut side_data = Vec::new();
        if orientation_hint != 0 {
            side_data.push(SideData::DisplayMatrix(DisplayMatrix::from_rotation(
                f64::from(orientation_hint),
            )));
        }

        let index = self.streams.len();
        self.streams.push(Stream {
            index,
            media_type: MediaType::Video,
            codec_id: VIDEO_CODEC,
            time_base: Rational::new(1, tb_den),
            extra_data: Vec::new(),
            params: StreamParams::Video(VideoStreamParams {
                width,
                height,
                pixel_format: VIDEO_PIXEL_FORMAT,
                frame_rate: Rational::new(tb_den, 1),
                bit_rate,
            }),
            side_data,
        });

        log::debug!(
            target: "recmux",
            "添加视频轨道 #{index}: {width}x{height} @ {frame_rate} fps, {bit_rate} bps, 旋转 {orientation_hint}"
        );
        Ok(index)
    }
}

/// 把每秒 tick 数转换为时间基分母
fn time_base_den(rate: u32, what: &str) -> MuxResult<i32> {
    i32::try_from(rate).map_err(|_| MuxError::InvalidArgument(format!("{what}过大: {rate}")))
}
