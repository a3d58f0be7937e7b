//! 数据包流水线.
//!
//! 头部与尾部的写入, 以及每帧的热路径: 把微秒时间戳换算到轨道时间基,
//! 复制负载构造数据包, 交给封装器.
//!
//! 头部失败后会话不可能再产生有效输出, 进入 `Failed`; 数据包失败默认只丢弃
//! 该帧; 尾部失败会导致输出缺少索引, 记录日志后仍结束会话.

use bytes::Bytes;
use recmux_codec::Packet;
use recmux_core::{MuxError, MuxResult, MuxStage, Timestamp};

use super::{FormatContext, LifecycleState};
use crate::options::PacketErrorPolicy;
use crate::stream::{Stream, StreamParams};

impl FormatContext {
    /// 写入容器头部
    ///
    /// 失败时会话进入 `Failed`, 只能释放.
    pub fn write_header(&mut self) -> MuxResult<()> {
        self.expect_state(LifecycleState::Created, "写入头部")?;
        self.dump_format();

        match self.muxer.write_header(&mut self.io, &self.streams) {
            Ok(()) => {
                self.state = LifecycleState::HeaderWritten;
                Ok(())
            }
            Err(e) => {
                self.state = LifecycleState::Failed;
                Err(report(e, MuxStage::Header))
            }
        }
    }

    /// 写入一个压缩帧
    ///
    /// `pts_micros` 以微秒为单位, 按四舍五入 (一半远离零) 换算到轨道时间基,
    /// 同时作为 pts 和 dts. 负载在调用期间被复制, 返回后调用方可以复用缓冲区.
    ///
    /// 封装失败返回错误; 默认策略下会话保持 `HeaderWritten`, 后续数据包可以继续写入.
    pub fn write_packet(
        &mut self,
        track_index: usize,
        data: &[u8],
        pts_micros: i64,
        is_keyframe: bool,
    ) -> MuxResult<()> {
        self.expect_state(LifecycleState::HeaderWritten, "写入数据包")?;
        let stream = self.streams.get(track_index).ok_or_else(|| {
            MuxError::InvalidArgument(format!(
                "轨道索引 {track_index} 越界 (共 {} 条轨道)",
                self.streams.len()
            ))
        })?;

        let ts = Timestamp::from_micros(pts_micros).rescale(stream.time_base);
        let packet = Packet::new(track_index, Bytes::copy_from_slice(data))
            .with_timestamp(ts.pts, stream.time_base)
            .with_keyframe(is_keyframe);

        match self.muxer.write_packet(&mut self.io, &packet) {
            Ok(()) => Ok(()),
            Err(e) => {
                if self.packet_error_policy == PacketErrorPolicy::Abort {
                    self.state = LifecycleState::Failed;
                }
                Err(report(e, MuxStage::Packet))
            }
        }
    }

    /// 写入容器尾部 (索引表), 结束会话
    ///
    /// 无论成功与否, 会话都进入 `TrailerWritten`, 尾部只能写一次.
    pub fn write_trailer(&mut self) -> MuxResult<()> {
        self.expect_state(LifecycleState::HeaderWritten, "写入尾部")?;
        let result = self.muxer.write_trailer(&mut self.io);
        self.state = LifecycleState::TrailerWritten;

        match result {
            Ok(()) => {
                log::info!(
                    target: "recmux",
                    "封装完成: {} 条轨道, 共 {} 字节",
                    self.streams.len(),
                    self.io.size()
                );
                Ok(())
            }
            Err(e) => Err(report(e, MuxStage::Trailer)),
        }
    }

    /// 输出布局的诊断日志, 每条轨道一行
    fn dump_format(&self) {
        log::info!(
            target: "recmux",
            "Output #0, {} ({}):",
            self.format,
            self.muxer.name()
        );
        for stream in &self.streams {
            log::info!(target: "recmux", "  {}", describe_stream(stream));
        }
    }
}

/// 把封装器错误包装为指定阶段的错误并记录日志
fn report(err: MuxError, stage: MuxStage) -> MuxError {
    let err = err.at_stage(stage);
    log::error!(target: "recmux", "写入{stage}失败: code={}, {err}", err.code());
    err
}

/// 单条轨道的描述, 格式接近 `av_dump_format`
fn describe_stream(stream: &Stream) -> String {
    let mut line = format!(
        "Stream #0:{}: {}: {}",
        stream.index, stream.media_type, stream.codec_id
    );
    match &stream.params {
        StreamParams::Video(v) => {
            line += &format!(
                ", {}, {}x{}, {} fps",
                v.pixel_format, v.width, v.height, v.frame_rate.num
            );
        }
        StreamParams::Audio(a) => {
            line += &format!(", {} Hz, {}, {}", a.sample_rate, a.channel_layout, a.sample_format);
        }
    }
    let bit_rate = stream.bit_rate();
    if bit_rate > 0 {
        line += &format!(", {} kb/s", bit_rate / 1000);
    }
    line += &format!(", tb {}", stream.time_base);
    if let Some(m) = stream.display_matrix() {
        line += &format!(", rotation {:.0}", m.rotation());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{CallbackSink, MemorySink};
    use crate::options::MuxOptions;

    fn annex_b_frame(nal: &[u8]) -> Vec<u8> {
        let mut out = vec![0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1E, 0xAB, 0, 0, 0, 1, 0x68, 0xCE, 0x38, 0x80];
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(nal);
        out
    }

    #[test]
    fn test_packet_before_header_rejected() {
        let mut ctx = FormatContext::create(MemorySink::new()).unwrap();
        ctx.add_video_track(1_000_000, 30, 640, 480, 0).unwrap();
        let err = ctx.write_packet(0, &annex_b_frame(&[0x65, 0x88]), 0, true);
        assert!(matches!(err, Err(MuxError::InvalidState(_))));
        assert_eq!(ctx.state(), LifecycleState::Created);
    }

    #[test]
    fn test_out_of_range_track_rejected() {
        let sink = MemorySink::new();
        let mut ctx = FormatContext::create(sink.clone()).unwrap();
        ctx.add_video_track(1_000_000, 30, 640, 480, 0).unwrap();
        ctx.write_header().unwrap();
        let err = ctx.write_packet(5, &[1, 2, 3], 0, true);
        assert!(matches!(err, Err(MuxError::InvalidArgument(_))));
        assert_eq!(ctx.state(), LifecycleState::HeaderWritten);

        // 其他轨道不受影响
        ctx.write_packet(0, &annex_b_frame(&[0x65, 0x88]), 0, true).unwrap();
        ctx.write_trailer().unwrap();
        assert_eq!(ctx.state(), LifecycleState::TrailerWritten);
    }

    #[test]
    fn test_packet_failure_soft_by_default() {
        let mut ctx = FormatContext::create(MemorySink::new()).unwrap();
        ctx.add_video_track(1_000_000, 30, 640, 480, 0).unwrap();
        ctx.write_header().unwrap();
        ctx.write_packet(0, &annex_b_frame(&[0x65, 0x88]), 0, true).unwrap();
        // 16_666 µs 在 1/30 时间基下取整为 0, dts 重复
        let err = ctx.write_packet(0, &annex_b_frame(&[0x41, 0x9A]), 16_666, false).unwrap_err();
        assert_eq!(err.stage(), Some(MuxStage::Packet));
        assert_eq!(ctx.state(), LifecycleState::HeaderWritten);
        ctx.write_packet(0, &annex_b_frame(&[0x41, 0x9A]), 33_333, false).unwrap();
    }

    #[test]
    fn test_packet_failure_aborts_with_policy() {
        let opts = MuxOptions {
            packet_error_policy: PacketErrorPolicy::Abort,
            ..MuxOptions::default()
        };
        let mut ctx = FormatContext::create_with_options(MemorySink::new(), &opts).unwrap();
        ctx.add_video_track(1_000_000, 30, 640, 480, 0).unwrap();
        ctx.write_header().unwrap();
        assert!(ctx.write_packet(0, &annex_b_frame(&[0x65, 0x88]), -1_000_000, true).is_err());
        assert_eq!(ctx.state(), LifecycleState::Failed);
        assert!(matches!(ctx.write_trailer(), Err(MuxError::InvalidState(_))));
    }

    #[test]
    fn test_header_failure_on_short_write() {
        let sink = CallbackSink::new(|buf: &[u8]| (buf.len() / 2) as i64, |off| off as i64);
        let mut ctx = FormatContext::create(sink).unwrap();
        ctx.add_audio_track(128_000, 44100, 2).unwrap();
        let err = ctx.write_header().unwrap_err();
        assert_eq!(err.stage(), Some(MuxStage::Header));
        assert!(err.code() < 0);
        assert_eq!(ctx.state(), LifecycleState::Failed);
        ctx.release();
    }

    #[test]
    fn test_header_without_tracks_fails() {
        let mut ctx = FormatContext::create(MemorySink::new()).unwrap();
        let err = ctx.write_header().unwrap_err();
        assert_eq!(err.stage(), Some(MuxStage::Header));
        assert_eq!(ctx.state(), LifecycleState::Failed);
    }

    #[test]
    fn test_trailer_only_once() {
        let mut ctx = FormatContext::create(MemorySink::new()).unwrap();
        ctx.add_audio_track(128_000, 44100, 2).unwrap();
        ctx.write_header().unwrap();
        ctx.write_trailer().unwrap();
        assert!(matches!(ctx.write_trailer(), Err(MuxError::InvalidState(_))));
    }

    #[test]
    fn test_describe_stream() {
        let mut ctx = FormatContext::create(MemorySink::new()).unwrap();
        ctx.add_video_track(4_000_000, 30, 1920, 1080, 90).unwrap();
        let line = describe_stream(&ctx.streams()[0]);
        assert!(line.starts_with("Stream #0:0: "));
        assert!(line.contains("1920x1080"));
        assert!(line.contains("4000 kb/s"));
        assert!(line.contains("rotation"));
    }
}
