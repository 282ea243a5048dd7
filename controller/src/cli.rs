use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "alarmclock",
    version,
    about = "Trigger a bed shaker from a Raspberry Pi based on an ics calendar."
)]
pub struct Cli {
    /// Log level; RUST_LOG takes precedence when set
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[arg(long, value_enum, ignore_case = true, default_value_t = LogFormat::Full)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Full,
    Compact,
    Pretty,
    Json,
}
