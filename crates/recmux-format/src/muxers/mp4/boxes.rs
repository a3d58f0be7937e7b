//! MP4 box 构建.
//!
//! 每个 `build_*` 函数返回完整的 box 字节 (含 size + type 头部),
//! 写尾部时由 `build_moov` 一次性组装整个 `moov`.

use recmux_codec::CodecId;
use recmux_core::{DisplayMatrix, MediaType, Rounding, rescale_rnd};

use super::track::Mp4Track;

/// movie timescale (`mvhd`), 毫秒
pub(super) const MOVIE_TIMESCALE: u32 = 1000;

/// 语言代码 "und" (ISO-639-2/T, 每字符 5 位)
const LANGUAGE_UND: u16 = 0x55C4;

// ============================================================
// 文件级 box
// ============================================================

/// ftyp box
///
/// 存在 H.264 轨道时兼容品牌包含 `avc1`.
pub(super) fn build_ftyp(has_avc: bool) -> Vec<u8> {
    let mut content = Vec::with_capacity(24);
    content.extend_from_slice(b"isom");
    content.extend_from_slice(&0x200u32.to_be_bytes());
    content.extend_from_slice(b"isom");
    content.extend_from_slice(b"iso2");
    if has_avc {
        content.extend_from_slice(b"avc1");
    }
    content.extend_from_slice(b"mp41");
    make_box(b"ftyp", &content)
}

/// moov box
pub(super) fn build_moov(tracks: &[Mp4Track]) -> Vec<u8> {
    let movie_duration = tracks.iter().map(track_movie_duration).max().unwrap_or(0);

    let mut content = build_mvhd(movie_duration, tracks.len() as u32 + 1);
    for track in tracks {
        content.extend_from_slice(&build_trak(track));
    }
    make_box(b"moov", &content)
}

/// mvhd box
fn build_mvhd(duration: u64, next_track_id: u32) -> Vec<u8> {
    let mut c = Vec::with_capacity(108);
    let version = push_times(&mut c, MOVIE_TIMESCALE, duration);
    // rate 1.0, volume 1.0
    c.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    c.extend_from_slice(&0x0100u16.to_be_bytes());
    c.extend_from_slice(&[0; 10]);
    c.extend_from_slice(&DisplayMatrix::IDENTITY.to_be_bytes());
    // pre_defined(24)
    c.extend_from_slice(&[0; 24]);
    c.extend_from_slice(&next_track_id.to_be_bytes());
    make_full_box(b"mvhd", version, 0, &c)
}

// ============================================================
// 轨道级 box
// ============================================================

/// trak box
fn build_trak(track: &Mp4Track) -> Vec<u8> {
    let mut content = build_tkhd(track);
    if track.first_dts() > 0 {
        content.extend_from_slice(&build_edts(track));
    }
    content.extend_from_slice(&build_mdia(track));
    make_box(b"trak", &content)
}

/// tkhd box (flags: track_enabled | track_in_movie)
fn build_tkhd(track: &Mp4Track) -> Vec<u8> {
    let duration = track_movie_duration(track);
    let version = u8::from(duration > u64::from(u32::MAX));

    let mut c = Vec::with_capacity(96);
    if version == 1 {
        c.extend_from_slice(&[0; 16]);
    } else {
        c.extend_from_slice(&[0; 8]);
    }
    c.extend_from_slice(&track.track_id().to_be_bytes());
    c.extend_from_slice(&[0; 4]);
    push_duration(&mut c, version, duration);
    c.extend_from_slice(&[0; 8]);
    // layer(2) + alternate_group(2)
    c.extend_from_slice(&[0; 4]);
    let volume: u16 = if track.media_type() == MediaType::Audio {
        0x0100
    } else {
        0
    };
    c.extend_from_slice(&volume.to_be_bytes());
    c.extend_from_slice(&[0; 2]);

    let matrix = track
        .stream
        .display_matrix()
        .copied()
        .unwrap_or(DisplayMatrix::IDENTITY);
    c.extend_from_slice(&matrix.to_be_bytes());

    let (width, height) = track.stream.video().map_or((0, 0), |v| (v.width, v.height));
    c.extend_from_slice(&(width << 16).to_be_bytes());
    c.extend_from_slice(&(height << 16).to_be_bytes());

    make_full_box(b"tkhd", version, 0x03, &c)
}

/// edts + elst box
///
/// 首个采样的 dts 大于 0 时, 用一个空编辑占住开头, 再接完整的媒体编辑.
fn build_edts(track: &Mp4Track) -> Vec<u8> {
    let empty = empty_edit_duration(track);
    let media = media_movie_duration(track);

    let mut c = Vec::with_capacity(28);
    c.extend_from_slice(&2u32.to_be_bytes());
    // 空编辑: media_time = -1
    c.extend_from_slice(&clamp_u32(empty).to_be_bytes());
    c.extend_from_slice(&(-1i32).to_be_bytes());
    c.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    // 媒体编辑
    c.extend_from_slice(&clamp_u32(media).to_be_bytes());
    c.extend_from_slice(&0i32.to_be_bytes());
    c.extend_from_slice(&0x0001_0000u32.to_be_bytes());

    make_box(b"edts", &make_full_box(b"elst", 0, 0, &c))
}

/// mdia box
fn build_mdia(track: &Mp4Track) -> Vec<u8> {
    let mut content = build_mdhd(track);
    content.extend_from_slice(&build_hdlr(track.media_type()));
    content.extend_from_slice(&build_minf(track));
    make_box(b"mdia", &content)
}

/// mdhd box
fn build_mdhd(track: &Mp4Track) -> Vec<u8> {
    let mut c = Vec::with_capacity(32);
    let version = push_times(&mut c, track.timescale, track.media_duration());
    c.extend_from_slice(&LANGUAGE_UND.to_be_bytes());
    c.extend_from_slice(&[0; 2]);
    make_full_box(b"mdhd", version, 0, &c)
}

/// hdlr box
fn build_hdlr(media_type: MediaType) -> Vec<u8> {
    let name: &[u8] = match media_type {
        MediaType::Video => b"VideoHandler\0",
        MediaType::Audio => b"SoundHandler\0",
    };

    let mut c = Vec::with_capacity(20 + name.len());
    c.extend_from_slice(&[0; 4]);
    c.extend_from_slice(media_type.handler_type());
    c.extend_from_slice(&[0; 12]);
    c.extend_from_slice(name);
    make_full_box(b"hdlr", 0, 0, &c)
}

/// minf box
fn build_minf(track: &Mp4Track) -> Vec<u8> {
    let mut content = match track.media_type() {
        // graphicsmode(2) + opcolor(6)
        MediaType::Video => make_full_box(b"vmhd", 0, 1, &[0; 8]),
        // balance(2) + reserved(2)
        MediaType::Audio => make_full_box(b"smhd", 0, 0, &[0; 4]),
    };
    content.extend_from_slice(&build_dinf());
    content.extend_from_slice(&build_stbl(track));
    make_box(b"minf", &content)
}

/// dinf + dref box, 单个自包含的 `url ` 条目
fn build_dinf() -> Vec<u8> {
    let mut dref = 1u32.to_be_bytes().to_vec();
    dref.extend_from_slice(&make_full_box(b"url ", 0, 1, &[]));
    make_box(b"dinf", &make_full_box(b"dref", 0, 0, &dref))
}

// ============================================================
// 采样表
// ============================================================

/// stbl box
fn build_stbl(track: &Mp4Track) -> Vec<u8> {
    let mut content = build_stsd(track);
    content.extend_from_slice(&build_stts(track));
    if let Some(sync) = track.sync_samples() {
        content.extend_from_slice(&build_stss(&sync));
    }
    let ctts = track.ctts_entries();
    if !ctts.is_empty() {
        content.extend_from_slice(&build_ctts(&ctts));
    }
    content.extend_from_slice(&build_stsc(track));
    content.extend_from_slice(&build_stsz(track));
    content.extend_from_slice(&build_stco(track));
    make_box(b"stbl", &content)
}

/// stsd box
fn build_stsd(track: &Mp4Track) -> Vec<u8> {
    let entry = match track.media_type() {
        MediaType::Video => build_avc1(track),
        MediaType::Audio => build_mp4a(track),
    };
    let mut c = 1u32.to_be_bytes().to_vec();
    c.extend_from_slice(&entry);
    make_full_box(b"stsd", 0, 0, &c)
}

/// avc1 sample entry
fn build_avc1(track: &Mp4Track) -> Vec<u8> {
    let (width, height) = track
        .stream
        .video()
        .map_or((0, 0), |v| (v.width as u16, v.height as u16));

    let mut c = Vec::with_capacity(86 + 8 + track.decoder_config.len());
    // reserved(6) + data_reference_index(2)
    c.extend_from_slice(&[0; 6]);
    c.extend_from_slice(&1u16.to_be_bytes());
    // pre_defined(2) + reserved(2) + pre_defined(12)
    c.extend_from_slice(&[0; 16]);
    c.extend_from_slice(&width.to_be_bytes());
    c.extend_from_slice(&height.to_be_bytes());
    // 72 dpi
    c.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    c.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    c.extend_from_slice(&[0; 4]);
    // frame_count
    c.extend_from_slice(&1u16.to_be_bytes());
    // compressorname
    c.extend_from_slice(&[0; 32]);
    // depth + pre_defined(-1)
    c.extend_from_slice(&0x0018u16.to_be_bytes());
    c.extend_from_slice(&0xFFFFu16.to_be_bytes());

    if track.decoder_config.is_empty() {
        log::warn!(
            target: "recmux",
            "MP4: 轨道 #{} 没有 SPS/PPS, avc1 不含 avcC",
            track.stream.index
        );
    } else {
        c.extend_from_slice(&make_box(b"avcC", &track.decoder_config));
    }

    let tag = CodecId::H264.mp4_sample_entry().unwrap_or(b"avc1");
    make_box(tag, &c)
}

/// mp4a sample entry
fn build_mp4a(track: &Mp4Track) -> Vec<u8> {
    let (sample_rate, channels) = track
        .stream
        .audio()
        .map_or((0, 0), |a| (a.sample_rate, a.channel_layout.channels));

    let mut c = Vec::with_capacity(64);
    c.extend_from_slice(&[0; 6]);
    c.extend_from_slice(&1u16.to_be_bytes());
    // reserved(8)
    c.extend_from_slice(&[0; 8]);
    c.extend_from_slice(&(channels as u16).to_be_bytes());
    // samplesize = 16
    c.extend_from_slice(&16u16.to_be_bytes());
    c.extend_from_slice(&[0; 4]);
    // 16.16 采样率, 超出 16 位时写 0
    let rate = u16::try_from(sample_rate).unwrap_or(0);
    c.extend_from_slice(&rate.to_be_bytes());
    c.extend_from_slice(&[0; 2]);
    c.extend_from_slice(&build_esds(track));

    let tag = CodecId::Aac.mp4_sample_entry().unwrap_or(b"mp4a");
    make_box(tag, &c)
}

/// esds box (ES_Descriptor)
fn build_esds(track: &Mp4Track) -> Vec<u8> {
    let measured = track.measured_bit_rate();
    let avg = match track.stream.bit_rate() {
        0 => measured,
        declared => declared,
    };
    let max = avg.max(measured);

    // DecoderConfigDescriptor
    let mut dec_config = Vec::with_capacity(32);
    // objectTypeIndication: MPEG-4 Audio
    dec_config.push(0x40);
    // streamType = audio(5), upStream = 0, reserved = 1
    dec_config.push(0x15);
    let buffer_size = track.max_sample_size().min(0x00FF_FFFF);
    dec_config.extend_from_slice(&buffer_size.to_be_bytes()[1..]);
    dec_config.extend_from_slice(&clamp_u32(max).to_be_bytes());
    dec_config.extend_from_slice(&clamp_u32(avg).to_be_bytes());
    if !track.decoder_config.is_empty() {
        push_descriptor(&mut dec_config, 0x05, &track.decoder_config);
    }

    let mut es = Vec::with_capacity(48);
    es.extend_from_slice(&(track.track_id() as u16).to_be_bytes());
    // streamDependenceFlag + URL_Flag + OCRstreamFlag + streamPriority
    es.push(0x00);
    push_descriptor(&mut es, 0x04, &dec_config);
    // SLConfigDescriptor, predefined = 2
    push_descriptor(&mut es, 0x06, &[0x02]);

    let mut c = Vec::with_capacity(es.len() + 5);
    push_descriptor(&mut c, 0x03, &es);
    make_full_box(b"esds", 0, 0, &c)
}

/// stts box
fn build_stts(track: &Mp4Track) -> Vec<u8> {
    let entries = track.stts_entries();
    let mut c = Vec::with_capacity(4 + entries.len() * 8);
    c.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (count, duration) in entries {
        c.extend_from_slice(&count.to_be_bytes());
        c.extend_from_slice(&duration.to_be_bytes());
    }
    make_full_box(b"stts", 0, 0, &c)
}

/// stss box
fn build_stss(sync: &[u32]) -> Vec<u8> {
    let mut c = Vec::with_capacity(4 + sync.len() * 4);
    c.extend_from_slice(&(sync.len() as u32).to_be_bytes());
    for n in sync {
        c.extend_from_slice(&n.to_be_bytes());
    }
    make_full_box(b"stss", 0, 0, &c)
}

/// ctts box (version 1, 允许负偏移)
fn build_ctts(entries: &[(u32, i32)]) -> Vec<u8> {
    let mut c = Vec::with_capacity(4 + entries.len() * 8);
    c.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (count, offset) in entries {
        c.extend_from_slice(&count.to_be_bytes());
        c.extend_from_slice(&offset.to_be_bytes());
    }
    make_full_box(b"ctts", 1, 0, &c)
}

/// stsc box
fn build_stsc(track: &Mp4Track) -> Vec<u8> {
    let entries = track.stsc_entries();
    let mut c = Vec::with_capacity(4 + entries.len() * 12);
    c.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (first_chunk, samples_per_chunk) in entries {
        c.extend_from_slice(&first_chunk.to_be_bytes());
        c.extend_from_slice(&samples_per_chunk.to_be_bytes());
        // sample_description_index
        c.extend_from_slice(&1u32.to_be_bytes());
    }
    make_full_box(b"stsc", 0, 0, &c)
}

/// stsz box
///
/// 所有采样等长时只写 sample_size, 不写逐采样表.
fn build_stsz(track: &Mp4Track) -> Vec<u8> {
    let samples = &track.samples;
    let uniform = match samples.first() {
        Some(first) if samples.iter().all(|s| s.size == first.size) => first.size,
        _ => 0,
    };

    let mut c = Vec::with_capacity(8 + samples.len() * 4);
    c.extend_from_slice(&uniform.to_be_bytes());
    c.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    if uniform == 0 {
        for s in samples {
            c.extend_from_slice(&s.size.to_be_bytes());
        }
    }
    make_full_box(b"stsz", 0, 0, &c)
}

/// stco / co64 box
fn build_stco(track: &Mp4Track) -> Vec<u8> {
    let chunks = &track.chunks;
    let wide = track.needs_co64();

    let mut c = Vec::with_capacity(4 + chunks.len() * if wide { 8 } else { 4 });
    c.extend_from_slice(&(chunks.len() as u32).to_be_bytes());
    for chunk in chunks {
        if wide {
            c.extend_from_slice(&chunk.offset.to_be_bytes());
        } else {
            c.extend_from_slice(&(chunk.offset as u32).to_be_bytes());
        }
    }
    make_full_box(if wide { b"co64" } else { b"stco" }, 0, 0, &c)
}

// ============================================================
// 工具函数
// ============================================================

/// 组装 box: size(4) + type(4) + 内容
fn make_box(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + content.len());
    buf.extend_from_slice(&(8 + content.len() as u32).to_be_bytes());
    buf.extend_from_slice(tag);
    buf.extend_from_slice(content);
    buf
}

/// 组装 full box: box 头部 + version(1) + flags(3) + 内容
fn make_full_box(tag: &[u8; 4], version: u8, flags: u32, content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12 + content.len());
    buf.extend_from_slice(&(12 + content.len() as u32).to_be_bytes());
    buf.extend_from_slice(tag);
    buf.push(version);
    buf.extend_from_slice(&flags.to_be_bytes()[1..]);
    buf.extend_from_slice(content);
    buf
}

/// 写入 creation_time + modification_time + timescale + duration, 返回 box 版本
///
/// 时长超出 32 位时使用 version 1.
fn push_times(c: &mut Vec<u8>, timescale: u32, duration: u64) -> u8 {
    let version = u8::from(duration > u64::from(u32::MAX));
    if version == 1 {
        c.extend_from_slice(&[0; 16]);
    } else {
        c.extend_from_slice(&[0; 8]);
    }
    c.extend_from_slice(&timescale.to_be_bytes());
    push_duration(c, version, duration);
    version
}

fn push_duration(c: &mut Vec<u8>, version: u8, duration: u64) {
    if version == 1 {
        c.extend_from_slice(&duration.to_be_bytes());
    } else {
        c.extend_from_slice(&(duration as u32).to_be_bytes());
    }
}

/// 写 MPEG-4 descriptor: tag + 可变长长度 + 内容
fn push_descriptor(buf: &mut Vec<u8>, tag: u8, body: &[u8]) {
    buf.push(tag);
    let len = body.len();
    let mut shift = match len {
        0..0x80 => 0,
        0x80..0x4000 => 7,
        0x4000..0x20_0000 => 14,
        _ => 21,
    };
    while shift > 0 {
        buf.push(0x80 | ((len >> shift) & 0x7F) as u8);
        shift -= 7;
    }
    buf.push((len & 0x7F) as u8);
    buf.extend_from_slice(body);
}

/// 空编辑时长 (movie timescale)
fn empty_edit_duration(track: &Mp4Track) -> u64 {
    let first = track.first_dts();
    rescale_rnd(first, i64::from(MOVIE_TIMESCALE), i64::from(track.timescale), Rounding::Down)
        .max(0) as u64
}

/// 媒体时长换算到 movie timescale
fn media_movie_duration(track: &Mp4Track) -> u64 {
    let duration = i64::try_from(track.media_duration()).unwrap_or(i64::MAX);
    rescale_rnd(duration, i64::from(MOVIE_TIMESCALE), i64::from(track.timescale), Rounding::Up)
        .max(0) as u64
}

/// 轨道在 movie timescale 下的总时长 (含空编辑)
fn track_movie_duration(track: &Mp4Track) -> u64 {
    let empty = if track.first_dts() > 0 {
        empty_edit_duration(track)
    } else {
        0
    };
    empty + media_movie_duration(track)
}

fn clamp_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}
