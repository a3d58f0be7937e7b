//! MP4 (ISO Base Media File Format) 封装器.
//!
//! 采用 "mdat 在前, moov 在后" 的布局, 适合边录边写:
//! 1. 头部写入 `ftyp`, 8 字节 `free` 占位和大小未定的 `mdat` 头
//! 2. 数据包直接追加到 `mdat`, 同时在内存中记录采样索引
//! 3. 尾部回填 `mdat` 大小 (超过 4 GiB 时把 `free`+`mdat` 改写为 64 位头部),
//!    然后在文件末尾写入 `moov`
//!
//! H.264 采样统一写成 4 字节长度前缀格式; 输入为 Annex B 时在此转换,
//! 其他数据按长度前缀格式原样写入. 流没有 extradata 时取首个携带 SPS/PPS
//! 的数据包生成 `avcC`.
//! AAC 输入若带 ADTS 帧头则去掉帧头, 并在需要时据此生成 AudioSpecificConfig.

mod boxes;
mod track;

use std::borrow::Cow;
use std::io::SeekFrom;

use recmux_codec::parsers::adts::AdtsHeader;
use recmux_codec::parsers::h264::{
    ParameterSets, annex_b_to_avcc, build_avcc_config, is_annex_b, split_annex_b, split_avcc,
};
use recmux_codec::{CodecId, Packet};
use recmux_core::timestamp::NOPTS_VALUE;
use recmux_core::{MuxError, MuxResult, rescale_q};

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::stream::Stream;

use track::{Mp4Track, Sample};

/// `free` 占位 box 的大小, 也是 64 位 mdat 头部多出的字节数
const FREE_BOX_SIZE: u32 = 8;

/// MP4 封装器
pub struct Mp4Muxer {
    /// 各轨道的采样索引
    tracks: Vec<Mp4Track>,
    /// `free` 占位 box 的偏移
    free_pos: u64,
    /// `mdat` box 头部的偏移
    mdat_pos: u64,
    /// 最近写入采样的轨道, 用于合并 chunk
    last_track: Option<usize>,
    /// 头部是否已写入
    header_written: bool,
}

impl Mp4Muxer {
    /// 创建 MP4 封装器 (工厂函数)
    pub fn create() -> MuxResult<Box<dyn Muxer>> {
        Ok(Box::new(Self::new()))
    }

    fn new() -> Self {
        Self {
            tracks: Vec::new(),
            free_pos: 0,
            mdat_pos: 0,
            last_track: None,
            header_written: false,
        }
    }

    /// 将 H.264 数据包整理为长度前缀格式的采样
    ///
    /// 非 Annex B 的数据视为已是长度前缀格式, 原样写入.
    fn prepare_h264<'a>(track: &mut Mp4Track, data: &'a [u8]) -> MuxResult<Cow<'a, [u8]>> {
        if track.length_prefixed {
            return Ok(Cow::Borrowed(data));
        }
        let annex_b = is_annex_b(data);

        if track.decoder_config.is_empty() {
            let nalus = if annex_b {
                split_annex_b(data)
            } else {
                split_avcc(data).unwrap_or_default()
            };
            let sets = ParameterSets::collect(&nalus);
            if sets.is_complete() {
                track.decoder_config = build_avcc_config(&sets.sps, &sets.pps)?;
                log::debug!(
                    target: "recmux",
                    "MP4: 流 #{} 从数据包生成 avcC ({} 字节)",
                    track.stream.index,
                    track.decoder_config.len()
                );
            }
        }

        if annex_b {
            Ok(Cow::Owned(annex_b_to_avcc(data)))
        } else {
            Ok(Cow::Borrowed(data))
        }
    }

    /// 去掉 AAC 数据包的 ADTS 帧头
    fn prepare_aac<'a>(track: &mut Mp4Track, data: &'a [u8]) -> MuxResult<Cow<'a, [u8]>> {
        let has_sync = data.len() >= 2 && data[0] == 0xFF && data[1] & 0xF6 == 0xF0;
        if !has_sync {
            return Ok(Cow::Borrowed(data));
        }
        let header = AdtsHeader::parse(data)?;
        if header.raw_data_blocks != 1 {
            return Err(MuxError::Unsupported(
                "MP4: 不支持含多个 raw data block 的 ADTS 帧".into(),
            ));
        }
        if track.decoder_config.is_empty() {
            track.decoder_config = header.audio_specific_config().to_vec();
        }
        let end = header.frame_length.min(data.len());
        Ok(Cow::Borrowed(&data[header.header_length..end]))
    }

    /// 数据包的解码时间换算到轨道 timescale
    fn sample_dts(track: &Mp4Track, packet: &Packet) -> MuxResult<(i64, i32)> {
        let index = track.stream.index;
        let tb = track.stream.time_base;
        let rescale = |ts: i64| {
            if packet.time_base.is_valid() && packet.time_base != tb {
                rescale_q(ts, packet.time_base, tb)
            } else {
                ts
            }
        };

        if packet.dts == NOPTS_VALUE {
            return Err(MuxError::InvalidData(format!("MP4: 流 #{index} 的数据包缺少 dts")));
        }
        let dts = rescale(packet.dts);
        let pts = if packet.pts == NOPTS_VALUE {
            dts
        } else {
            rescale(packet.pts)
        };

        if dts < 0 {
            return Err(MuxError::InvalidData(format!(
                "MP4: 流 #{index} 的 dts {dts} 为负数"
            )));
        }
        if pts < dts {
            return Err(MuxError::InvalidData(format!(
                "MP4: 流 #{index} 的 pts {pts} < dts {dts}"
            )));
        }

        let cts_offset = (pts - dts).saturating_mul(track.tick_scale);
        let dts = dts.saturating_mul(track.tick_scale);
        if let Some(last) = track.last_dts() {
            if dts <= last {
                return Err(MuxError::InvalidData(format!(
                    "MP4: 流 #{index} 的 dts 非单调递增 (non monotonically increasing dts): {last} >= {dts}"
                )));
            }
        }
        let cts_offset = i32::try_from(cts_offset)
            .map_err(|_| MuxError::InvalidData(format!("MP4: 流 #{index} 的 pts 偏移过大")))?;
        Ok((dts, cts_offset))
    }

    /// 回填 mdat 大小
    fn patch_mdat_size(&self, io: &mut IoContext, end: u64) -> MuxResult<()> {
        let mdat_size = end - self.mdat_pos;
        if let Ok(size) = u32::try_from(mdat_size) {
            io.seek(SeekFrom::Start(self.mdat_pos))?;
            io.write_u32_be(size)?;
        } else {
            // free(8) + mdat(8) → 64 位 mdat 头部 (size=1 + type + largesize)
            io.seek(SeekFrom::Start(self.free_pos))?;
            io.write_u32_be(1)?;
            io.write_tag(b"mdat")?;
            io.write_u64_be(end - self.free_pos)?;
        }
        io.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

impl Muxer for Mp4Muxer {
    fn format_id(&self) -> FormatId {
        FormatId::Mp4
    }

    fn name(&self) -> &str {
        "mp4"
    }

    fn write_header(&mut self, io: &mut IoContext, streams: &[Stream]) -> MuxResult<()> {
        if self.header_written {
            return Err(MuxError::InvalidState("MP4: 头部已写入".into()));
        }
        if streams.is_empty() {
            return Err(MuxError::InvalidArgument("MP4: 没有输出流".into()));
        }

        self.tracks = streams.iter().map(Mp4Track::new).collect::<MuxResult<_>>()?;
        let has_avc = streams.iter().any(|s| s.codec_id == CodecId::H264);

        io.write_all(&boxes::build_ftyp(has_avc))?;

        self.free_pos = io.position();
        io.write_u32_be(FREE_BOX_SIZE)?;
        io.write_tag(b"free")?;

        self.mdat_pos = io.position();
        io.write_u32_be(0)?;
        io.write_tag(b"mdat")?;
        io.flush()?;

        self.header_written = true;
        log::debug!(
            target: "recmux",
            "MP4: 头部已写入, {} 条轨道, mdat 偏移 {}",
            self.tracks.len(),
            self.mdat_pos
        );
        Ok(())
    }

    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> MuxResult<()> {
        if !self.header_written {
            return Err(MuxError::InvalidState("MP4: 头部尚未写入".into()));
        }
        let index = packet.stream_index;
        let track = self
            .tracks
            .get_mut(index)
            .ok_or_else(|| MuxError::InvalidArgument(format!("MP4: 流索引 {index} 不存在")))?;
        if packet.is_empty() {
            log::debug!(target: "recmux", "MP4: 流 #{index} 跳过空数据包");
            return Ok(());
        }

        let (dts, cts_offset) = Self::sample_dts(track, packet)?;
        let payload = match track.stream.codec_id {
            CodecId::H264 => Self::prepare_h264(track, &packet.data)?,
            CodecId::Aac => Self::prepare_aac(track, &packet.data)?,
            other => {
                return Err(MuxError::Unsupported(format!("MP4: 不支持编解码器 {other}")));
            }
        };
        let size = u32::try_from(payload.len())
            .map_err(|_| MuxError::InvalidData(format!("MP4: 采样过大: {} 字节", payload.len())))?;

        let offset = io.position();
        io.write_all(&payload)?;

        let new_chunk = self.last_track != Some(index);
        track.push(
            Sample {
                size,
                dts,
                cts_offset,
                is_sync: packet.is_keyframe,
            },
            offset,
            new_chunk,
        );
        self.last_track = Some(index);
        Ok(())
    }

    fn write_trailer(&mut self, io: &mut IoContext) -> MuxResult<()> {
        if !self.header_written {
            return Err(MuxError::InvalidState("MP4: 头部尚未写入".into()));
        }

        io.flush()?;
        let end = io.position();
        self.patch_mdat_size(io, end)?;

        let moov = boxes::build_moov(&self.tracks);
        io.write_all(&moov)?;
        io.flush()?;

        log::debug!(
            target: "recmux",
            "MP4: 尾部已写入, mdat {} 字节, moov {} 字节",
            end - self.mdat_pos,
            moov.len()
        );
        self.header_written = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemorySink, Sink};
    use std::sync::{Arc, Mutex};
    use crate::stream::{AudioStreamParams, SideData, StreamParams, VideoStreamParams};
    use recmux_core::{ChannelLayout, DisplayMatrix, MediaType, PixelFormat, Rational, SampleFormat};

    const SPS: &[u8] = &[0x67, 0x42, 0x00, 0x1E, 0xAB, 0xCD];
    const PPS: &[u8] = &[0x68, 0xCE, 0x38, 0x80];

    fn video_stream() -> Stream {
        Stream {
            index: 0,
            media_type: MediaType::Video,
            codec_id: CodecId::H264,
            time_base: Rational::new(1, 30),
            extra_data: Vec::new(),
            params: StreamParams::Video(VideoStreamParams {
                width: 1920,
                height: 1080,
                pixel_format: PixelFormat::Yuvj420p,
                frame_rate: Rational::new(30, 1),
                bit_rate: 4_000_000,
            }),
            side_data: vec![SideData::DisplayMatrix(DisplayMatrix::from_rotation(90.0))],
        }
    }

    fn audio_stream(index: usize) -> Stream {
        Stream {
            index,
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

    fn annex_b(nals: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for nal in nals {
            out.extend_from_slice(&[0, 0, 0, 1]);
            out.extend_from_slice(nal);
        }
        out
    }

    fn new_io() -> (IoContext, MemorySink) {
        let sink = MemorySink::new();
        let io = IoContext::new(Box::new(sink.clone())).unwrap();
        (io, sink)
    }

    fn video_packet(ts: i64, data: Vec<u8>, key: bool) -> Packet {
        Packet::new(0, data)
            .with_timestamp(ts, Rational::new(1, 30))
            .with_keyframe(key)
    }

    /// 在 `data` 中按路径查找 box, 返回 box 内容
    fn find_box<'a>(mut data: &'a [u8], path: &[&[u8; 4]]) -> Option<&'a [u8]> {
        let (first, rest) = path.split_first()?;
        while data.len() >= 8 {
            let size = u32::from_be_bytes(data[..4].try_into().ok()?) as usize;
            let size = if size == 0 { data.len() } else { size };
            if size < 8 || size > data.len() {
                return None;
            }
            if &data[4..8] == *first {
                let body = &data[8..size];
                return if rest.is_empty() { Some(body) } else { find_box(body, rest) };
            }
            data = &data[size..];
        }
        None
    }

    #[test]
    fn test_header_layout() {
        let (mut io, sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        muxer.write_header(&mut io, &[video_stream()]).unwrap();

        let data = sink.data();
        assert_eq!(&data[4..8], b"ftyp");
        assert_eq!(data.len(), 32 + 8 + 8);
        assert_eq!(&data[32..40], &[0, 0, 0, 8, b'f', b'r', b'e', b'e']);
        assert_eq!(&data[40..48], &[0, 0, 0, 0, b'm', b'd', b'a', b't']);
    }

    #[test]
    fn test_empty_stream_error() {
        let (mut io, _sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        assert!(muxer.write_header(&mut io, &[]).is_err());
    }

    #[test]
    fn test_packet_before_header() {
        let (mut io, _sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        let pkt = video_packet(0, annex_b(&[&[0x65, 0x88]]), true);
        assert!(matches!(
            muxer.write_packet(&mut io, &pkt),
            Err(MuxError::InvalidState(_))
        ));
    }

    #[test]
    fn test_video_annex_b_to_mp4() {
        let (mut io, sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        muxer.write_header(&mut io, &[video_stream()]).unwrap();

        let idr = annex_b(&[SPS, PPS, &[0x65, 0x88, 0x84, 0x21]]);
        muxer.write_packet(&mut io, &video_packet(0, idr, true)).unwrap();
        let p = annex_b(&[&[0x41, 0x9A, 0x02]]);
        muxer.write_packet(&mut io, &video_packet(1, p, false)).unwrap();
        muxer.write_trailer(&mut io).unwrap();

        let data = sink.data();
        // mdat 大小已回填: 8 + (4+6 + 4+4 + 4+4) + (4+3)
        let mdat = &data[40..];
        assert_eq!(&mdat[..8], &[0, 0, 0, 41, b'm', b'd', b'a', b't']);
        // 第一个 NAL 为长度前缀的 SPS
        assert_eq!(&mdat[8..12], &6u32.to_be_bytes());
        assert_eq!(&mdat[12..18], SPS);

        let avcc = find_box(&data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"stsd"])
            .map(|stsd| &stsd[8..])
            .and_then(|entries| find_box(&entries[86..], &[b"avcC"]))
            .unwrap();
        assert_eq!(avcc[0], 1);
        assert_eq!(&avcc[1..4], &SPS[1..4]);

        // 旋转 90 度的显示矩阵
        let tkhd = find_box(&data, &[b"moov", b"trak", b"tkhd"]).unwrap();
        assert_eq!(&tkhd[40..76], &DisplayMatrix::from_rotation(90.0).to_be_bytes());
        assert_eq!(&tkhd[76..80], &(1920u32 << 16).to_be_bytes());

        // 两个采样在同一个 chunk
        let stsc = find_box(&data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"stsc"]).unwrap();
        assert_eq!(&stsc[4..8], &1u32.to_be_bytes());
        assert_eq!(&stsc[12..16], &2u32.to_be_bytes());
        let stco = find_box(&data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"stco"]).unwrap();
        assert_eq!(&stco[8..12], &48u32.to_be_bytes());

        // 只有首帧是关键帧
        let stss = find_box(&data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"stss"]).unwrap();
        assert_eq!(&stss[4..12], &[0, 0, 0, 1, 0, 0, 0, 1]);

        let mdhd = find_box(&data, &[b"moov", b"trak", b"mdia", b"mdhd"]).unwrap();
        assert_eq!(&mdhd[12..16], &30u32.to_be_bytes());
        assert_eq!(&mdhd[16..20], &2u32.to_be_bytes());
    }

    #[test]
    fn test_length_prefixed_samples_written_unchanged() {
        let (mut io, sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        muxer.write_header(&mut io, &[video_stream()]).unwrap();

        let mut idr = Vec::new();
        for nal in [SPS, PPS, &[0x65, 0x88, 0x84][..]] {
            idr.extend_from_slice(&(nal.len() as u32).to_be_bytes());
            idr.extend_from_slice(nal);
        }
        let p = vec![0, 0, 0, 5, 0x41, 1, 2, 3, 4];
        muxer.write_packet(&mut io, &video_packet(0, idr.clone(), true)).unwrap();
        muxer.write_packet(&mut io, &video_packet(1, p.clone(), false)).unwrap();
        // 无法按长度前缀解析的数据也原样写入
        let opaque = vec![0xAB; 16];
        muxer.write_packet(&mut io, &video_packet(2, opaque.clone(), false)).unwrap();
        muxer.write_trailer(&mut io).unwrap();

        let data = sink.data();
        let payload = [idr.as_slice(), &p, &opaque].concat();
        assert_eq!(&data[40..44], &(8 + payload.len() as u32).to_be_bytes());
        assert_eq!(&data[48..48 + payload.len()], payload.as_slice());
        let track = &muxer.tracks[0];
        assert_eq!(track.samples.len(), 3);
        assert_eq!(track.samples[1].size, p.len() as u32);
        // avcC 取自首个携带 SPS/PPS 的数据包
        assert_eq!(&track.decoder_config[..4], &[1, 0x42, 0x00, 0x1E]);
    }

    #[test]
    fn test_non_monotonic_dts_rejected() {
        let (mut io, _sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        muxer.write_header(&mut io, &[video_stream()]).unwrap();

        let frame = || annex_b(&[SPS, PPS, &[0x65, 0x88]]);
        muxer.write_packet(&mut io, &video_packet(1, frame(), true)).unwrap();
        let err = muxer.write_packet(&mut io, &video_packet(1, frame(), true));
        assert!(matches!(err, Err(MuxError::InvalidData(_))));
        let err = muxer.write_packet(&mut io, &video_packet(-1, frame(), true));
        assert!(err.is_err());
        assert_eq!(muxer.tracks[0].samples.len(), 1);
    }

    #[test]
    fn test_unknown_stream_rejected() {
        let (mut io, _sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        muxer.write_header(&mut io, &[video_stream()]).unwrap();
        let mut pkt = video_packet(0, annex_b(&[&[0x65, 0x88]]), true);
        pkt.stream_index = 3;
        assert!(matches!(
            muxer.write_packet(&mut io, &pkt),
            Err(MuxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_first_dts_writes_edit_list() {
        let (mut io, sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        muxer.write_header(&mut io, &[audio_stream(0)]).unwrap();
        for i in 1..4 {
            let pkt = Packet::new(0, vec![0x21; 10])
                .with_timestamp(i * 1024, Rational::new(1, 44100))
                .with_keyframe(true);
            muxer.write_packet(&mut io, &pkt).unwrap();
        }
        muxer.write_trailer(&mut io).unwrap();

        let data = sink.data();
        let elst = find_box(&data, &[b"moov", b"trak", b"edts", b"elst"]).unwrap();
        assert_eq!(&elst[4..8], &2u32.to_be_bytes());
        // 空编辑: 1024 / 44100 s → 23 ms, media_time = -1
        assert_eq!(&elst[8..12], &23u32.to_be_bytes());
        assert_eq!(&elst[12..16], &(-1i32).to_be_bytes());

        // 音频全部为同步采样, 不写 stss; 采样等长, stsz 只写 sample_size
        assert!(find_box(&data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"stss"]).is_none());
        let stsz = find_box(&data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"stsz"]).unwrap();
        assert_eq!(&stsz[4..12], &[0, 0, 0, 10, 0, 0, 0, 3]);
        assert_eq!(stsz.len(), 12);
    }

    #[test]
    fn test_adts_header_stripped() {
        let (mut io, sink) = new_io();
        let mut stream = audio_stream(0);
        stream.extra_data.clear();
        let mut muxer = Mp4Muxer::new();
        muxer.write_header(&mut io, &[stream]).unwrap();

        let payload = [0x21, 0x10, 0x05];
        let mut frame = AdtsHeader::encode(2, 4, 2, payload.len()).to_vec();
        frame.extend_from_slice(&payload);
        let pkt = Packet::new(0, frame)
            .with_timestamp(0, Rational::new(1, 44100))
            .with_keyframe(true);
        muxer.write_packet(&mut io, &pkt).unwrap();
        muxer.write_trailer(&mut io).unwrap();

        let data = sink.data();
        // 纯音频 ftyp 为 28 字节, 负载从 28 + 8 + 8 开始
        assert_eq!(&data[44..47], &payload);
        assert_eq!(muxer.tracks[0].decoder_config, vec![0x12, 0x10]);
    }

    #[test]
    fn test_interleaved_tracks_split_chunks() {
        let (mut io, sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        muxer
            .write_header(&mut io, &[video_stream(), audio_stream(1)])
            .unwrap();

        let frame = annex_b(&[SPS, PPS, &[0x65, 0x88]]);
        muxer.write_packet(&mut io, &video_packet(0, frame, true)).unwrap();
        for i in 0..2 {
            let pkt = Packet::new(1, vec![0x21; 20])
                .with_timestamp(i * 1024, Rational::new(1, 44100))
                .with_keyframe(true);
            muxer.write_packet(&mut io, &pkt).unwrap();
        }
        let frame = annex_b(&[&[0x41, 0x9A]]);
        muxer.write_packet(&mut io, &video_packet(1, frame, false)).unwrap();
        muxer.write_trailer(&mut io).unwrap();

        assert_eq!(muxer.tracks[0].chunks.len(), 2);
        assert_eq!(muxer.tracks[1].chunks.len(), 1);
        assert_eq!(muxer.tracks[1].chunks[0].samples, 2);

        let data = sink.data();
        let mvhd = find_box(&data, &[b"moov", b"mvhd"]).unwrap();
        // next_track_id
        assert_eq!(&mvhd[96..100], &3u32.to_be_bytes());
    }

    #[test]
    fn test_trailer_without_packets() {
        let (mut io, sink) = new_io();
        let mut muxer = Mp4Muxer::new();
        muxer.write_header(&mut io, &[audio_stream(0)]).unwrap();
        muxer.write_trailer(&mut io).unwrap();

        let data = sink.data();
        assert_eq!(&data[36..44], &[0, 0, 0, 8, b'm', b'd', b'a', b't']);
        assert!(find_box(&data, &[b"moov", b"trak"]).is_some());
    }

    /// 不保存数据, 只记录每次写入的 (偏移, 字节) 的 sink
    #[derive(Clone, Default)]
    struct SparseSink {
        state: Arc<Mutex<(u64, Vec<(u64, Vec<u8>)>)>>,
    }

    impl SparseSink {
        fn writes(&self) -> Vec<(u64, Vec<u8>)> {
            self.state.lock().unwrap().1.clone()
        }
    }

    impl Sink for SparseSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut state = self.state.lock().unwrap();
            let pos = state.0;
            state.1.push((pos, buf.to_vec()));
            state.0 += buf.len() as u64;
            Ok(buf.len())
        }

        fn seek(&mut self, offset: u64) -> std::io::Result<u64> {
            self.state.lock().unwrap().0 = offset;
            Ok(offset)
        }
    }

    #[test]
    fn test_mdat_over_4gib_promoted_to_64bit_header() {
        let sink = SparseSink::default();
        let mut io = IoContext::new(Box::new(sink.clone())).unwrap();
        let mut muxer = Mp4Muxer::new();
        muxer.free_pos = 28;
        muxer.mdat_pos = 36;

        let end = 36 + u64::from(u32::MAX) + 1;
        muxer.patch_mdat_size(&mut io, end).unwrap();
        assert_eq!(io.position(), end);

        let mut expected = vec![0, 0, 0, 1];
        expected.extend_from_slice(b"mdat");
        expected.extend_from_slice(&(end - 28).to_be_bytes());
        assert_eq!(sink.writes(), vec![(28, expected)]);
    }

    #[test]
    fn test_mdat_under_4gib_keeps_32bit_header() {
        let sink = SparseSink::default();
        let mut io = IoContext::new(Box::new(sink.clone())).unwrap();
        let mut muxer = Mp4Muxer::new();
        muxer.free_pos = 28;
        muxer.mdat_pos = 36;

        let end = 36 + u64::from(u32::MAX);
        muxer.patch_mdat_size(&mut io, end).unwrap();
        assert_eq!(sink.writes(), vec![(36, u32::MAX.to_be_bytes().to_vec())]);
    }
}
