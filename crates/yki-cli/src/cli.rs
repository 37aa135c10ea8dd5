use std::path::PathBuf;

use clap::{Parser, Subcommand};
use yki_types::TestLevel;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "yki-cli", version = VERSION, about = "YKI Finnish practice exam")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Gemini API key (falls back to the config file, then GEMINI_API_KEY / API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the interactive exam
    Exam {
        /// Skip level selection and generate a test right away
        #[arg(long)]
        level: Option<TestLevel>,
    },

    /// Generate a mock test and write it as JSON
    Generate {
        #[arg(long)]
        level: TestLevel,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Synthesize a Finnish text and play it once
    Speak {
        text: String,
    },

    /// Materialize a base64 PCM16 payload from a file and print buffer stats
    Decode {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value_t = 1)]
        channels: u16,

        #[arg(long, default_value_t = 24_000)]
        sample_rate: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_and_subcommand() {
        let args = Args::try_parse_from([
            "yki-cli",
            "--device",
            "USB",
            "generate",
            "--level",
            "keskitaso",
            "--out",
            "koe.json",
        ])
        .unwrap();
        assert_eq!(args.device.as_deref(), Some("USB"));
        match args.cmd {
            Some(Command::Generate { level, out }) => {
                assert_eq!(level, TestLevel::Keskitaso);
                assert_eq!(out, Some(PathBuf::from("koe.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn decode_defaults_to_speech_format() {
        let args = Args::try_parse_from(["yki-cli", "decode", "--input", "a.b64"]).unwrap();
        match args.cmd {
            Some(Command::Decode {
                channels,
                sample_rate,
                ..
            }) => {
                assert_eq!(channels, 1);
                assert_eq!(sample_rate, 24_000);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_level_is_rejected() {
        assert!(Args::try_parse_from(["yki-cli", "exam", "--level", "C2"]).is_err());
    }
}
