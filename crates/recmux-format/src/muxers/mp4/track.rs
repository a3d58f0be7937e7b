//! MP4 轨道的采样索引.
//!
//! 封装期间逐个记录采样的大小, 解码时间和同步标志, 以及采样落在哪个 chunk,
//! 写尾部时据此生成 `stbl` 中的各张表.

use recmux_codec::CodecId;
use recmux_codec::parsers::h264::{ParameterSets, build_avcc_config, is_annex_b, split_annex_b};
use recmux_core::{MediaType, MuxError, MuxResult};

use crate::stream::Stream;

/// 一个采样
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Sample {
    /// 采样大小 (字节)
    pub size: u32,
    /// 解码时间 (轨道 timescale)
    pub dts: i64,
    /// 显示时间相对解码时间的偏移
    pub cts_offset: i32,
    /// 是否为同步采样 (关键帧)
    pub is_sync: bool,
}

/// 一个 chunk: 文件中连续存放的同一轨道采样
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Chunk {
    /// chunk 在文件中的绝对偏移
    pub offset: u64,
    /// chunk 内的采样数
    pub samples: u32,
}

/// 封装中的轨道
pub(super) struct Mp4Track {
    /// 输出流信息
    pub stream: Stream,
    /// 媒体时间刻度 (`mdhd` timescale), 取时间基分母
    pub timescale: u32,
    /// 时间基分子, 时间戳乘以它换算到 timescale
    pub tick_scale: i64,
    /// 解码器配置 (avcC 或 AudioSpecificConfig), 可能由首个数据包补齐
    pub decoder_config: Vec<u8>,
    /// H.264 采样是否已是长度前缀格式 (extradata 为 avcC)
    pub length_prefixed: bool,
    /// 采样列表
    pub samples: Vec<Sample>,
    /// chunk 列表
    pub chunks: Vec<Chunk>,
    /// 已写入的负载总字节数
    pub total_bytes: u64,
}

impl Mp4Track {
    /// 从输出流创建轨道, 校验容器能表达的参数范围
    pub fn new(stream: &Stream) -> MuxResult<Self> {
        let tb = stream.time_base;
        if tb.num <= 0 || tb.den <= 0 {
            return Err(MuxError::InvalidArgument(format!(
                "MP4: 流 #{} 的时间基 {tb} 无效",
                stream.index
            )));
        }
        if stream.codec_id.mp4_sample_entry().is_none()
            || stream.codec_id.media_type() != Some(stream.media_type)
        {
            return Err(MuxError::Unsupported(format!(
                "MP4: 流 #{} 的编解码器 {} 无法写入",
                stream.index, stream.codec_id
            )));
        }
        if let Some(v) = stream.video() {
            if v.width == 0 || v.height == 0 || v.width > 0xFFFF || v.height > 0xFFFF {
                return Err(MuxError::InvalidArgument(format!(
                    "MP4: 视频尺寸 {}x{} 超出范围",
                    v.width, v.height
                )));
            }
        }

        let mut decoder_config = stream.extra_data.clone();
        if stream.codec_id == CodecId::H264 && is_annex_b(&decoder_config) {
            // extradata 是 Annex B 参数集, 换成 avcC 记录
            let nalus = split_annex_b(&stream.extra_data);
            let sets = ParameterSets::collect(&nalus);
            decoder_config = build_avcc_config(&sets.sps, &sets.pps)?;
        }

        Ok(Self {
            stream: stream.clone(),
            timescale: tb.den as u32,
            tick_scale: i64::from(tb.num),
            length_prefixed: stream.extra_data.first() == Some(&1),
            decoder_config,
            samples: Vec::new(),
            chunks: Vec::new(),
            total_bytes: 0,
        })
    }

    /// 轨道 ID (从 1 开始)
    pub fn track_id(&self) -> u32 {
        self.stream.index as u32 + 1
    }

    /// 媒体类型
    pub fn media_type(&self) -> MediaType {
        self.stream.media_type
    }

    /// 最后一个采样的解码时间
    pub fn last_dts(&self) -> Option<i64> {
        self.samples.last().map(|s| s.dts)
    }

    /// 第一个采样的解码时间
    pub fn first_dts(&self) -> i64 {
        self.samples.first().map_or(0, |s| s.dts)
    }

    /// 追加一个采样
    ///
    /// `new_chunk` 为 true 时在 `offset` 处开启新 chunk, 否则并入上一个 chunk.
    pub fn push(&mut self, sample: Sample, offset: u64, new_chunk: bool) {
        match self.chunks.last_mut() {
            Some(chunk) if !new_chunk => chunk.samples += 1,
            _ => self.chunks.push(Chunk { offset, samples: 1 }),
        }
        self.total_bytes += u64::from(sample.size);
        self.samples.push(sample);
    }

    /// 每个采样的时长 (timescale)
    ///
    /// 时长取相邻 dts 之差; 最后一个采样沿用前一个时长,
    /// 只有一个采样时音频取帧长, 视频取 1.
    pub fn sample_durations(&self) -> Vec<u32> {
        let mut durations: Vec<u32> = self
            .samples
            .windows(2)
            .map(|w| clamp_u32(w[1].dts - w[0].dts))
            .collect();
        if !self.samples.is_empty() {
            let last = match durations.last() {
                Some(&d) => d,
                None => self.single_sample_duration(),
            };
            durations.push(last);
        }
        durations
    }

    fn single_sample_duration(&self) -> u32 {
        match self.stream.audio() {
            Some(a) if a.frame_size > 0 => {
                // frame_size 以采样为单位, 换算到 timescale
                let ticks = i64::from(a.frame_size) * i64::from(self.timescale)
                    / i64::from(a.sample_rate.max(1));
                clamp_u32(ticks.max(1))
            }
            _ => 1,
        }
    }

    /// 媒体时长 (timescale)
    pub fn media_duration(&self) -> u64 {
        self.sample_durations().iter().map(|&d| u64::from(d)).sum()
    }

    /// 最大采样大小
    pub fn max_sample_size(&self) -> u32 {
        self.samples.iter().map(|s| s.size).max().unwrap_or(0)
    }

    /// 平均码率 (bps), 由实际负载和时长计算
    pub fn measured_bit_rate(&self) -> u64 {
        let duration = self.media_duration();
        if duration == 0 {
            return 0;
        }
        self.total_bytes * 8 * u64::from(self.timescale) / duration
    }

    /// `stts` 表项 (采样数, 时长)
    pub fn stts_entries(&self) -> Vec<(u32, u32)> {
        run_lengths(self.sample_durations())
    }

    /// `ctts` 表项 (采样数, 偏移), 所有偏移为 0 时为空
    pub fn ctts_entries(&self) -> Vec<(u32, i32)> {
        if self.samples.iter().all(|s| s.cts_offset == 0) {
            return Vec::new();
        }
        run_lengths(self.samples.iter().map(|s| s.cts_offset))
    }

    /// `stsc` 表项 (首个 chunk 序号, 每 chunk 采样数)
    ///
    /// 只在每 chunk 采样数变化时新增表项.
    pub fn stsc_entries(&self) -> Vec<(u32, u32)> {
        let mut entries: Vec<(u32, u32)> = Vec::new();
        for (i, chunk) in self.chunks.iter().enumerate() {
            if entries.last().is_some_and(|&(_, n)| n == chunk.samples) {
                continue;
            }
            entries.push((i as u32 + 1, chunk.samples));
        }
        entries
    }

    /// `stss` 表项 (同步采样序号, 从 1 开始)
    ///
    /// 仅视频轨道写 `stss`; 全部是同步采样或没有任何同步采样时省略.
    pub fn sync_samples(&self) -> Option<Vec<u32>> {
        if self.media_type() != MediaType::Video {
            return None;
        }
        let sync: Vec<u32> = self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_sync)
            .map(|(i, _)| i as u32 + 1)
            .collect();
        if sync.is_empty() || sync.len() == self.samples.len() {
            None
        } else {
            Some(sync)
        }
    }

    /// chunk 偏移是否需要 64 位 (`co64`)
    pub fn needs_co64(&self) -> bool {
        self.chunks.iter().any(|c| c.offset > u64::from(u32::MAX))
    }
}

/// 游程编码: 连续相同的值合并为 (次数, 值)
fn run_lengths<T: PartialEq + Copy>(values: impl IntoIterator<Item = T>) -> Vec<(u32, T)> {
    let mut entries: Vec<(u32, T)> = Vec::new();
    for v in values {
        match entries.last_mut() {
            Some((count, last)) if *last == v => *count += 1,
            _ => entries.push((1, v)),
        }
    }
    entries
}

fn clamp_u32(v: i64) -> u32 {
    v.clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{AudioStreamParams, StreamParams, VideoStreamParams};
    use recmux_core::{ChannelLayout, PixelFormat, Rational, SampleFormat};

    fn video_stream() -> Stream {
        Stream {
            index: 0,
            media_type: MediaType::Video,
            codec_id: CodecId::H264,
            time_base: Rational::new(1, 30),
            extra_data: Vec::new(),
            params: StreamParams::Video(VideoStreamParams {
                width: 640,
                height: 480,
                pixel_format: PixelFormat::Yuvj420p,
                frame_rate: Rational::new(30, 1),
                bit_rate: 1_000_000,
            }),
            side_data: Vec::new(),
        }
    }

    fn audio_stream() -> Stream {
        Stream {
            index: 1,
            media_type: MediaType::Audio,
            codec_id: CodecId::Aac,
            time_base: Rational::new(1, 44100),
            extra_data: vec![0x12, 0x10],
            params: StreamParams::Audio(AudioStreamParams {
                sample_rate: 44100,
                channel_layout: ChannelLayout::STEREO,
                sample_format: SampleFormat::F32p,
                bit_rate: 128_000,
                frame_size: 1024,
            }),
            side_data: Vec::new(),
        }
    }

    fn sample(dts: i64, is_sync: bool) -> Sample {
        Sample {
            size: 100,
            dts,
            cts_offset: 0,
            is_sync,
        }
    }

    #[test]
    fn test_durations_repeat_last_delta() {
        let mut track = Mp4Track::new(&video_stream()).unwrap();
        for (i, dts) in [0, 1, 2, 4].into_iter().enumerate() {
            track.push(sample(dts, i == 0), 0, true);
        }
        assert_eq!(track.sample_durations(), vec![1, 1, 2, 2]);
        assert_eq!(track.stts_entries(), vec![(2, 1), (2, 2)]);
        assert_eq!(track.media_duration(), 6);
    }

    #[test]
    fn test_single_sample_duration() {
        let mut video = Mp4Track::new(&video_stream()).unwrap();
        video.push(sample(0, true), 0, true);
        assert_eq!(video.sample_durations(), vec![1]);

        let mut audio = Mp4Track::new(&audio_stream()).unwrap();
        audio.push(sample(0, true), 0, true);
        assert_eq!(audio.sample_durations(), vec![1024]);
    }

    #[test]
    fn test_stsc_run_length() {
        let mut track = Mp4Track::new(&audio_stream()).unwrap();
        // chunk 1: 2 个采样, chunk 2: 2 个, chunk 3: 1 个
        track.push(sample(0, true), 100, true);
        track.push(sample(1024, true), 200, false);
        track.push(sample(2048, true), 500, true);
        track.push(sample(3072, true), 600, false);
        track.push(sample(4096, true), 900, true);
        assert_eq!(track.chunks.len(), 3);
        assert_eq!(track.stsc_entries(), vec![(1, 2), (3, 1)]);
    }

    #[test]
    fn test_sync_samples() {
        let mut track = Mp4Track::new(&video_stream()).unwrap();
        track.push(sample(0, true), 0, true);
        track.push(sample(1, false), 0, false);
        track.push(sample(2, true), 0, false);
        assert_eq!(track.sync_samples(), Some(vec![1, 3]));

        let mut all_sync = Mp4Track::new(&video_stream()).unwrap();
        all_sync.push(sample(0, true), 0, true);
        assert_eq!(all_sync.sync_samples(), None);

        // 音频从不写 stss
        let mut audio = Mp4Track::new(&audio_stream()).unwrap();
        audio.push(sample(0, false), 0, true);
        assert_eq!(audio.sync_samples(), None);
    }

    #[test]
    fn test_rejects_bad_time_base() {
        let mut stream = video_stream();
        stream.time_base = Rational::UNDEFINED;
        assert!(Mp4Track::new(&stream).is_err());
    }

    #[test]
    fn test_avcc_extradata_marks_length_prefixed() {
        let mut stream = video_stream();
        stream.extra_data = vec![1, 0x42, 0, 0x1E, 0xFF, 0xE0, 0];
        assert!(Mp4Track::new(&stream).unwrap().length_prefixed);
        assert!(!Mp4Track::new(&video_stream()).unwrap().length_prefixed);
    }

    #[test]
    fn test_annex_b_extradata_converted() {
        let mut stream = video_stream();
        stream.extra_data = vec![
            0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1E, 0xAB, 0, 0, 0, 1, 0x68, 0xCE, 0x38, 0x80,
        ];
        let track = Mp4Track::new(&stream).unwrap();
        assert!(!track.length_prefixed);
        assert_eq!(&track.decoder_config[..4], &[1, 0x42, 0x00, 0x1E]);
    }
}
