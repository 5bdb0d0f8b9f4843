use std::fmt::Display;

use colored::Colorize;
use log::{Level, LevelFilter};

/// External crates only need to log warnings and errors
const ALLOWED_EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];

/// Installs the colored stdout logger. Verbose also shows debug logs of partyqueue crates.
pub fn init_logger(verbose: bool) -> Result<(), log::SetLoggerError> {
    let local_level = if verbose { Level::Debug } else { Level::Info };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .filter(move |meta| {
            let target = Target::from_str(meta.target());

            let is_allowed = meta.level() <= local_level;
            let is_severe = ALLOWED_EXTERNAL_LEVELS.contains(&meta.level());

            target.is_local() && is_allowed || is_severe
        })
        .level(LevelFilter::Debug)
        .chain(std::io::stdout())
        .apply()
}

enum Target {
    External(String),
    Main,
    Server,
    Collab,
    Core,
}

impl Target {
    fn from_str(str: &str) -> Self {
        let mut split = str.split("::");
        let module = split.next().unwrap_or_default();

        match module {
            "partyqueue" => Self::Main,
            "partyqueue_core" => Self::Core,
            "partyqueue_server" => Self::Server,
            "partyqueue_collab" => Self::Collab,
            other => Target::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Target::External(x) => x.as_str().clear(),
            Target::Main => "MAIN".bright_white(),
            Target::Server => "SERVER".bright_green(),
            Target::Collab => "COLLAB".bright_purple(),
            Target::Core => "CORE".blue(),
        };

        Display::fmt(&result, f)
    }
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets() {
        assert!(Target::from_str("partyqueue_collab::rooms").is_local());
        assert!(Target::from_str("partyqueue").is_local(), "the binary is local");
        assert!(!Target::from_str("sqlx::query").is_local(), "dependencies are external");
        assert!(!Target::from_str("").is_local());
    }
}
