//! AAC-LC 编码器参数协商.
//!
//! 与 FFmpeg 原生 `aac` 编码器的可协商部分保持一致:
//! - 输入采样格式只有 `fltp`
//! - 采样率必须是 MPEG-4 的 13 个标准采样率之一
//! - 声道数 1-6 或 8 (声道配置 1-7)
//! - 每帧 1024 个采样
//!
//! 打开后给出 2 字节 AudioSpecificConfig 作为 extradata, 供 `esds` 使用.

use log::debug;
use recmux_core::{MuxError, MuxResult, SampleFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::{CodecParameters, CodecParamsType};
use crate::encoder::Encoder;
use crate::parsers::adts::{self, AAC_LC_OBJECT_TYPE};

/// AAC 帧大小 (每声道采样数)
pub const AAC_FRAME_SIZE: u32 = 1024;

/// 支持的输入采样格式
const SAMPLE_FORMATS: [SampleFormat; 1] = [SampleFormat::F32p];

/// AAC-LC 编码器
pub struct AacEncoder {
    /// 打开后补全的参数
    opened: Option<CodecParameters>,
}

impl AacEncoder {
    /// 创建 AAC-LC 编码器实例
    pub fn create() -> MuxResult<Box<dyn Encoder>> {
        Ok(Box::new(Self { opened: None }))
    }
}

/// 声道数对应的 MPEG-4 声道配置
///
/// 7 声道没有对应配置, 8 声道对应配置 7.
pub fn channel_configuration(channels: u32) -> Option<u8> {
    match channels {
        1..=6 => Some(channels as u8),
        8 => Some(7),
        _ => None,
    }
}

impl Encoder for AacEncoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Aac
    }

    fn name(&self) -> &str {
        "aac"
    }

    fn sample_formats(&self) -> &[SampleFormat] {
        &SAMPLE_FORMATS
    }

    fn open(&mut self, params: &CodecParameters) -> MuxResult<()> {
        let audio = match &params.params {
            CodecParamsType::Audio(a) => a,
            _ => {
                return Err(MuxError::InvalidArgument("AAC 编码器需要音频参数".into()));
            }
        };

        if audio.sample_rate == 0 {
            return Err(MuxError::InvalidArgument("采样率不能为 0".into()));
        }
        let channels = audio.channel_layout.channels;
        if channels == 0 {
            return Err(MuxError::InvalidArgument("声道数不能为 0".into()));
        }
        let channel_config = channel_configuration(channels)
            .ok_or_else(|| MuxError::Unsupported(format!("AAC 不支持的声道数: {channels}")))?;
        let sr_index = adts::sample_rate_index(audio.sample_rate).ok_or_else(|| {
            MuxError::Unsupported(format!("AAC 不支持的采样率: {} Hz", audio.sample_rate))
        })?;
        if !SAMPLE_FORMATS.contains(&audio.sample_format) {
            return Err(MuxError::Unsupported(format!(
                "AAC 编码器不支持采样格式 {}",
                audio.sample_format,
            )));
        }

        let mut negotiated = params.clone();
        negotiated.codec_id = CodecId::Aac;
        negotiated.extra_data =
            adts::audio_specific_config(AAC_LC_OBJECT_TYPE, sr_index, channel_config).to_vec();
        if let CodecParamsType::Audio(a) = &mut negotiated.params {
            a.frame_size = AAC_FRAME_SIZE;
        }

        debug!(
            target: "recmux",
            "打开 AAC-LC 编码器: {} Hz, {} 声道, {} bps",
            audio.sample_rate, channels, params.bit_rate,
        );
        self.opened = Some(negotiated);
        Ok(())
    }

    fn parameters(&self) -> MuxResult<CodecParameters> {
        self.opened
            .clone()
            .ok_or_else(|| MuxError::InvalidState("编码器未打开, 请先调用 open()".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmux_core::ChannelLayout;

    fn make_aac_params(sample_rate: u32, channels: u32) -> CodecParameters {
        CodecParameters::audio(
            CodecId::Aac,
            128_000,
            sample_rate,
            ChannelLayout::from_channels(channels),
            SampleFormat::F32p,
        )
    }

    #[test]
    fn test_open_stereo_44100() {
        let mut enc = AacEncoder::create().unwrap();
        assert_eq!(enc.sample_formats()[0], SampleFormat::F32p);
        enc.open(&make_aac_params(44100, 2)).unwrap();

        let params = enc.parameters().unwrap();
        assert_eq!(params.extra_data, vec![0x12, 0x10]);
        assert_eq!(params.bit_rate, 128_000);
        let audio = params.audio_params().unwrap();
        assert_eq!(audio.frame_size, 1024);
        assert_eq!(audio.channel_layout, ChannelLayout::STEREO);
    }

    #[test]
    fn test_open_mono_48000() {
        let mut enc = AacEncoder::create().unwrap();
        enc.open(&make_aac_params(48000, 1)).unwrap();
        assert_eq!(enc.parameters().unwrap().extra_data, vec![0x11, 0x88]);
    }

    #[test]
    fn test_eight_channels_use_config_7() {
        let mut enc = AacEncoder::create().unwrap();
        enc.open(&make_aac_params(48000, 8)).unwrap();
        let asc = enc.parameters().unwrap().extra_data;
        assert_eq!((asc[1] >> 3) & 0x0F, 7);
    }

    #[test]
    fn test_reject_invalid_params() {
        let mut enc = AacEncoder::create().unwrap();
        assert!(matches!(
            enc.open(&make_aac_params(0, 2)),
            Err(MuxError::InvalidArgument(_))
        ));
        assert!(matches!(
            enc.open(&make_aac_params(44100, 0)),
            Err(MuxError::InvalidArgument(_))
        ));
        assert!(matches!(
            enc.open(&make_aac_params(44100, 7)),
            Err(MuxError::Unsupported(_))
        ));
        assert!(matches!(
            enc.open(&make_aac_params(44000, 2)),
            Err(MuxError::Unsupported(_))
        ));

        let mut params = make_aac_params(44100, 2);
        if let CodecParamsType::Audio(a) = &mut params.params {
            a.sample_format = SampleFormat::S16;
        }
        assert!(matches!(enc.open(&params), Err(MuxError::Unsupported(_))));
    }

    #[test]
    fn test_reject_video_params() {
        let mut enc = AacEncoder::create().unwrap();
        let mut params = make_aac_params(44100, 2);
        params.params = CodecParamsType::Video(crate::VideoCodecParams {
            width: 640,
            height: 480,
            pixel_format: recmux_core::PixelFormat::Yuvj420p,
            frame_rate: recmux_core::Rational::new(30, 1),
        });
        assert!(matches!(enc.open(&params), Err(MuxError::InvalidArgument(_))));
    }

    #[test]
    fn test_parameters_before_open() {
        let enc = AacEncoder::create().unwrap();
        assert!(matches!(enc.parameters(), Err(MuxError::InvalidState(_))));
    }
}
