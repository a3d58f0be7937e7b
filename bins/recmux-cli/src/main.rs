//! recmux-cli - 裸流封装命令行工具
//!
//! 把 H.264 Annex B 视频裸流 (以及可选的 ADTS AAC 音频) 封装为 MP4 文件,
//! 走与录制端相同的封装会话.

mod source;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;

use recmux::logging::{self, LoggingConfig};
use recmux_format::{FormatContext, WriterSink};

use source::{Scheduled, interleave, read_adts, split_access_units};

#[derive(Parser, Debug)]
#[command(name = "recmux-cli", version, about = "把 H.264 / AAC 裸流封装为 MP4")]
struct Cli {
    /// H.264 Annex B 视频裸流
    #[arg(long)]
    video: PathBuf,

    /// ADTS AAC 音频裸流
    #[arg(long)]
    audio: Option<PathBuf>,

    /// 视频宽度
    #[arg(long)]
    width: u32,

    /// 视频高度
    #[arg(long)]
    height: u32,

    /// 视频帧率
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// 视频码率 (bit/s)
    #[arg(long = "video-bitrate", default_value_t = 4_000_000)]
    video_bitrate: u64,

    /// 音频码率 (bit/s)
    #[arg(long = "audio-bitrate", default_value_t = 128_000)]
    audio_bitrate: u64,

    /// 显示旋转角度 (如 90, 180, 270)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    rotation: i32,

    /// 输出 MP4 文件路径
    #[arg(short, long)]
    output: PathBuf,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,

    /// 日志文件目录, 不指定时只输出到终端
    #[arg(long = "log-dir")]
    log_dir: Option<String>,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// 一次封装的统计
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    video_frames: usize,
    audio_frames: usize,
    dropped: usize,
    bytes: u64,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let config = LoggingConfig {
        level: level.to_string(),
        directory: cli.log_dir.clone(),
        file_prefix: "recmux-cli".to_string(),
        ..LoggingConfig::default()
    };
    if let Err(e) = logging::init(config) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    eprintln!("recmux 版本 {} -- 流式 MP4 封装工具", recmux::version());
    match run(&cli) {
        Ok(summary) => {
            eprintln!("封装完成:");
            eprintln!("  视频帧: {}", summary.video_frames);
            eprintln!("  音频帧: {}", summary.audio_frames);
            if summary.dropped > 0 {
                eprintln!("  丢弃帧: {}", summary.dropped);
            }
            eprintln!("  输出大小: {} 字节", summary.bytes);
        }
        Err(e) => {
            eprintln!("错误: {e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<Summary> {
    if !cli.overwrite && cli.output.exists() {
        bail!("输出文件已存在 '{}', 使用 -y 覆盖", cli.output.display());
    }

    let video = read_input(&cli.video)?;
    let units = split_access_units(&video);
    if units.is_empty() {
        bail!("视频输入中没有找到 H.264 NAL 单元");
    }
    let audio = cli
        .audio
        .as_deref()
        .map(|path| read_adts(&read_input(path)?).with_context(|| format!("解析 '{}'", path.display())))
        .transpose()?;
    tracing::info!(
        "输入: {} 个视频访问单元, {} 个音频帧",
        units.len(),
        audio.as_ref().map_or(0, |a| a.frames.len())
    );

    let sink = WriterSink::create(&cli.output)
        .with_context(|| format!("无法创建输出文件 '{}'", cli.output.display()))?;
    let mut ctx = FormatContext::create(sink)?;

    let video_track =
        ctx.add_video_track(cli.video_bitrate, cli.fps, cli.width, cli.height, cli.rotation)?;
    let audio_track = match &audio {
        Some(a) => Some(ctx.add_audio_track(cli.audio_bitrate, a.sample_rate, a.channels)?),
        None => None,
    };
    ctx.write_header()?;

    let (audio_frames, sample_rate) = audio
        .as_ref()
        .map_or((0, 0), |a| (a.frames.len(), a.sample_rate));
    let mut summary = Summary {
        video_frames: units.len(),
        audio_frames,
        ..Summary::default()
    };

    for item in interleave(units.len(), cli.fps, audio_frames, sample_rate) {
        let result = match (item, &audio, audio_track) {
            (Scheduled::Video { index, pts_micros }, _, _) => {
                let unit = &units[index];
                ctx.write_packet(video_track, &unit.data, pts_micros, unit.is_keyframe)
            }
            (Scheduled::Audio { index, pts_micros }, Some(a), Some(track)) => {
                ctx.write_packet(track, &a.frames[index], pts_micros, true)
            }
            (Scheduled::Audio { .. }, _, _) => continue,
        };
        // 失败已由会话记录, 继续写后续帧
        if result.is_err() {
            summary.dropped += 1;
        }
    }

    ctx.write_trailer()?;
    summary.bytes = ctx.bytes_written();
    ctx.release();
    Ok(summary)
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("无法读取输入文件 '{}'", path.display()))
}
