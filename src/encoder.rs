//! Command construction for the encode/write subprocess pair.
//!
//! Two ffmpeg invocations back every session: the encoder turns the
//! multipart JPEG stream on its stdin into a framed IVF stream on its
//! stdout, burning the stamped EXIF timestamp into the picture; the
//! writer copies that stream into the container file named by its
//! argument. Argument lists are built as plain data so tests can check
//! them without spawning anything.

use crate::config::CamrecConfig;
use std::path::Path;
use std::process::{Command, Stdio};

const FFMPEG: &str = "ffmpeg";

/// Encoder argv: multipart JPEG on stdin, IVF frames on stdout.
pub fn encoder_args(config: &CamrecConfig) -> Vec<String> {
    let rate = frame_rate(config);
    let vfilter = format!(
        "scale_vaapi=format=nv12,hwmap=mode=read+write+direct,\
         drawtext=fontfile={}:\
         x=20:y=20:fontcolor=white:fontsize=32:\
         shadowcolor=black:shadowx=-2:shadowy=-2:\
         text='%{{metadata\\:DateTimeOriginal}}.%{{metadata\\:SubSecTimeOriginal}}',\
         format=nv12,hwmap",
        config.encoder.font_path
    );

    let args: &[&str] = &[
        "-nostdin",
        "-nostats",
        "-hide_banner",
        "-loglevel",
        "warning",
        "-hwaccel",
        "vaapi",
        "-hwaccel_device",
        config.encoder.hwaccel_device.as_str(),
        "-hwaccel_output_format",
        "vaapi",
        "-r",
        rate.as_str(),
        "-f",
        "mpjpeg",
        "-i",
        "-",
        "-vf",
        vfilter.as_str(),
        "-c:v",
        "vp9_vaapi",
        "-b:v",
        config.encoder.video_bitrate.as_str(),
        "-f",
        "ivf",
        "-",
    ];
    args.iter().map(|arg| arg.to_string()).collect()
}

/// Writer argv: IVF frames on stdin, stream-copied into `output`.
pub fn writer_args(config: &CamrecConfig, output: &Path) -> Vec<String> {
    let rate = frame_rate(config);
    let output = output.to_string_lossy();

    let args: &[&str] = &[
        "-nostdin",
        "-nostats",
        "-hide_banner",
        "-loglevel",
        "warning",
        "-r",
        rate.as_str(),
        "-f",
        "ivf",
        "-i",
        "-",
        "-c",
        "copy",
        output.as_ref(),
    ];
    args.iter().map(|arg| arg.to_string()).collect()
}

/// Ready-to-spawn encoder command with both pipes wired up
pub fn encoder_command(config: &CamrecConfig) -> Command {
    let mut command = Command::new(FFMPEG);
    command
        .args(encoder_args(config))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped());
    command
}

/// Ready-to-spawn writer command; it owns the output file itself
pub fn writer_command(config: &CamrecConfig, output: &Path) -> Command {
    let mut command = Command::new(FFMPEG);
    command
        .args(writer_args(config, output))
        .stdin(Stdio::piped());
    command
}

/// Render an argv for logging, the way it would be typed in a shell
pub fn render_command(args: &[String]) -> String {
    format!("{} {}", FFMPEG, args.join(" "))
}

fn frame_rate(config: &CamrecConfig) -> String {
    format!(
        "{}/{}",
        config.stream.fps_numerator, config.stream.fps_denominator
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn position(args: &[String], value: &str) -> usize {
        args.iter()
            .position(|arg| arg == value)
            .unwrap_or_else(|| panic!("missing argument: {}", value))
    }

    #[test]
    fn test_encoder_args() {
        let mut config = CamrecConfig::default();
        config.stream.fps_numerator = 30000;
        config.stream.fps_denominator = 1001;

        let args = encoder_args(&config);

        let rate = position(&args, "-r");
        assert_eq!(args[rate + 1], "30000/1001");

        // mpjpeg in, ivf out
        let input_format = position(&args, "mpjpeg");
        assert_eq!(args[input_format + 1], "-i");
        assert_eq!(args.last().unwrap(), "-");
        assert_eq!(args[args.len() - 2], "ivf");

        let filter = position(&args, "-vf");
        assert!(args[filter + 1].contains("DateTimeOriginal"));
        assert!(args[filter + 1].contains(&config.encoder.font_path));

        let device = position(&args, "-hwaccel_device");
        assert_eq!(args[device + 1], config.encoder.hwaccel_device);
    }

    #[test]
    fn test_writer_args() {
        let config = CamrecConfig::default();
        let output = PathBuf::from("/tmp/.2024-05-01_12.34.56.webm");

        let args = writer_args(&config, &output);

        let input_format = position(&args, "ivf");
        assert_eq!(args[input_format + 1], "-i");

        let copy = position(&args, "-c");
        assert_eq!(args[copy + 1], "copy");
        assert_eq!(args.last().unwrap(), &output.to_string_lossy());
    }

    #[test]
    fn test_render_command() {
        let rendered = render_command(&["-f".to_string(), "ivf".to_string()]);
        assert_eq!(rendered, "ffmpeg -f ivf");
    }
}
