use crate::settings::SETTINGS_FILE;
use crate::timer::DEFAULT_DURATION_SECS;
use clap::Parser;
use std::path::PathBuf;

/// Overlay countdown timer that stays click-through until it rings.
#[derive(Parser, Debug)]
#[command(name = "tea_timer")]
#[command(about = "A translucent always-on-top countdown that turns into an alarm")]
pub struct Cli {
    /// Countdown length in seconds
    #[arg(allow_negative_numbers = true)]
    pub duration: Option<String>,

    /// Settings file to read
    #[arg(long, default_value = SETTINGS_FILE)]
    pub settings: String,

    /// Alarm sound, overriding the settings file
    #[arg(long)]
    pub sound: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Parse a positive number of seconds.
pub fn parse_duration(raw: &str) -> Result<u32, String> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a whole number of seconds"))?;
    if value <= 0 {
        return Err(format!("duration must be positive, got {value}"));
    }
    u32::try_from(value).map_err(|_| format!("duration {value} is too large"))
}

/// Duration to count down from. Invalid input is reported and replaced by
/// the default of five minutes.
pub fn resolve_duration(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else {
        return DEFAULT_DURATION_SECS;
    };
    match parse_duration(raw) {
        Ok(secs) => secs,
        Err(e) => {
            tracing::warn!("invalid duration ({e}); using default 5 minutes");
            DEFAULT_DURATION_SECS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let cli = Cli::parse_from(["tea_timer"]);
        assert_eq!(cli.duration, None);
        assert_eq!(cli.settings, SETTINGS_FILE);
        assert!(!cli.debug);
        assert!(cli.sound.is_none());
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn accepts_flags_and_positional_duration() {
        let cli = Cli::parse_from([
            "tea_timer",
            "90",
            "--sound",
            "bell.wav",
            "--debug",
            "--log-file",
            "timer.log",
        ]);
        assert_eq!(cli.duration.as_deref(), Some("90"));
        assert_eq!(cli.sound, Some(PathBuf::from("bell.wav")));
        assert!(cli.debug);
        assert_eq!(cli.log_file, Some(PathBuf::from("timer.log")));
    }

    #[test]
    fn negative_duration_reaches_validation() {
        let cli = Cli::parse_from(["tea_timer", "-5"]);
        assert_eq!(cli.duration.as_deref(), Some("-5"));
        assert_eq!(resolve_duration(cli.duration.as_deref()), 300);
    }

    #[test]
    fn parse_duration_rejects_bad_input() {
        assert_eq!(parse_duration("60"), Ok(60));
        assert_eq!(parse_duration(" 5 "), Ok(5));
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("five").is_err());
        assert!(parse_duration("1.5").is_err());
        assert!(parse_duration("99999999999").is_err());
    }

    #[test]
    fn resolve_duration_falls_back_to_five_minutes() {
        assert_eq!(resolve_duration(None), 300);
        assert_eq!(resolve_duration(Some("abc")), 300);
        assert_eq!(resolve_duration(Some("12")), 12);
    }
}
