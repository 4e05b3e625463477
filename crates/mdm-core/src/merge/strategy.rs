//! Merge strategy and container selection.

use std::ffi::OsString;
use std::path::Path;

/// Output container for a merged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    Webm,
    Mkv,
}

impl Container {
    pub fn ext(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
            Container::Mkv => "mkv",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Container::Mp4 => "video/mp4",
            Container::Webm => "video/webm",
            Container::Mkv => "video/x-matroska",
        }
    }

    /// Container implied by the video stream's own extension.
    pub fn for_video_ext(ext: &str) -> Container {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "m4v" | "mov" => Container::Mp4,
            "webm" => Container::Webm,
            _ => Container::Mkv,
        }
    }
}

/// How ffmpeg is invoked for the mux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Plain stream copy, no remapping. Tolerant of odd inputs.
    Simple,
    /// Explicit stream mapping with timestamp regeneration. Produces
    /// cleaner files but chokes on some codec/container pairs.
    Advanced,
}

impl MergeStrategy {
    pub fn other(self) -> MergeStrategy {
        match self {
            MergeStrategy::Simple => MergeStrategy::Advanced,
            MergeStrategy::Advanced => MergeStrategy::Simple,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::Simple => "simple",
            MergeStrategy::Advanced => "advanced",
        }
    }
}

// Codec families that misbehave when stream-copied into mp4. Matched as
// prefixes: yt-dlp reports e.g. "av01.0.08M.08" and "vp9.2".
const FRAGILE_VIDEO: &[&str] = &["av01", "av1", "vp9", "vp09", "hev1", "hvc1", "hevc"];
const FRAGILE_AUDIO_IN_MP4: &[&str] = &["opus", "vorbis"];

fn matches_any(codec: &str, families: &[&str]) -> bool {
    let lower = codec.to_ascii_lowercase();
    families.iter().any(|f| lower.starts_with(f))
}

/// Picks the initial strategy and container for a codec pair.
///
/// Fragile codec combinations are routed to the simple strategy and an mkv
/// container, which accepts anything; everything else keeps the requested
/// container and starts with the advanced strategy.
pub fn choose(
    vcodec: Option<&str>,
    acodec: Option<&str>,
    requested: Container,
) -> (MergeStrategy, Container) {
    let fragile_video = vcodec.map(|c| matches_any(c, FRAGILE_VIDEO)).unwrap_or(false);
    let fragile_audio = requested == Container::Mp4
        && acodec
            .map(|c| matches_any(c, FRAGILE_AUDIO_IN_MP4))
            .unwrap_or(false);

    if fragile_video || fragile_audio {
        (MergeStrategy::Simple, Container::Mkv)
    } else {
        (MergeStrategy::Advanced, requested)
    }
}

/// Builds the ffmpeg argument list for one mux attempt.
pub fn command_args(
    strategy: MergeStrategy,
    container: Container,
    video: &Path,
    audio: &Path,
    out: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    args.push("-y".into());
    if strategy == MergeStrategy::Advanced {
        args.push("-fflags".into());
        args.push("+genpts".into());
    }
    args.push("-i".into());
    args.push(video.as_os_str().to_os_string());
    args.push("-i".into());
    args.push(audio.as_os_str().to_os_string());
    match strategy {
        MergeStrategy::Simple => {
            args.push("-c".into());
            args.push("copy".into());
            args.push("-shortest".into());
        }
        MergeStrategy::Advanced => {
            args.push("-map".into());
            args.push("0:v:0".into());
            args.push("-map".into());
            args.push("1:a:0".into());
            args.push("-c".into());
            args.push("copy".into());
            args.push("-shortest".into());
            args.push("-max_interleave_delta".into());
            args.push("500000".into());
            if container == Container::Mp4 {
                args.push("-movflags".into());
                args.push("+faststart".into());
            }
        }
    }
    args.push("-loglevel".into());
    args.push("info".into());
    args.push(out.as_os_str().to_os_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn container_from_video_ext() {
        assert_eq!(Container::for_video_ext("mp4"), Container::Mp4);
        assert_eq!(Container::for_video_ext("MOV"), Container::Mp4);
        assert_eq!(Container::for_video_ext("webm"), Container::Webm);
        assert_eq!(Container::for_video_ext("flv"), Container::Mkv);
    }

    #[test]
    fn clean_codecs_keep_requested_container() {
        let (s, c) = choose(Some("avc1.640028"), Some("mp4a.40.2"), Container::Mp4);
        assert_eq!(s, MergeStrategy::Advanced);
        assert_eq!(c, Container::Mp4);
    }

    #[test]
    fn fragile_video_forces_simple_mkv() {
        for codec in ["av01.0.08M.08", "vp9.2", "hev1.1.6.L93.B0"] {
            let (s, c) = choose(Some(codec), Some("mp4a.40.2"), Container::Mp4);
            assert_eq!(s, MergeStrategy::Simple, "codec {}", codec);
            assert_eq!(c, Container::Mkv, "codec {}", codec);
        }
    }

    #[test]
    fn opus_in_mp4_forces_simple_mkv() {
        let (s, c) = choose(Some("avc1.640028"), Some("opus"), Container::Mp4);
        assert_eq!(s, MergeStrategy::Simple);
        assert_eq!(c, Container::Mkv);
    }

    #[test]
    fn opus_in_webm_is_fine() {
        let (s, c) = choose(Some("avc1.640028"), Some("opus"), Container::Webm);
        assert_eq!(s, MergeStrategy::Advanced);
        assert_eq!(c, Container::Webm);
    }

    #[test]
    fn advanced_mp4_args_include_faststart() {
        let args = command_args(
            MergeStrategy::Advanced,
            Container::Mp4,
            &PathBuf::from("v.mp4"),
            &PathBuf::from("a.m4a"),
            &PathBuf::from("out.mp4"),
        );
        let flat: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(flat.contains(&"+faststart".to_string()));
        assert!(flat.contains(&"+genpts".to_string()));
        assert!(flat.contains(&"0:v:0".to_string()));
    }

    #[test]
    fn simple_args_are_plain_copy() {
        let args = command_args(
            MergeStrategy::Simple,
            Container::Mkv,
            &PathBuf::from("v.webm"),
            &PathBuf::from("a.webm"),
            &PathBuf::from("out.mkv"),
        );
        let flat: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(!flat.contains(&"-map".to_string()));
        assert!(flat.contains(&"copy".to_string()));
        assert_eq!(flat.last().map(String::as_str), Some("out.mkv"));
    }
}
