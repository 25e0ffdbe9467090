use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[arg(long, default_value = "all")]
    pub mode: Mode,
    /// Purge expired pending comments once before the schedule starts.
    #[arg(long, default_value_t = false)]
    pub purge: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    All,
    Api,
    Worker,
}

impl Mode {
    pub fn run_api(self) -> bool {
        matches!(self, Mode::All | Mode::Api)
    }

    pub fn run_worker(self) -> bool {
        matches!(self, Mode::All | Mode::Worker)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Mode};

    #[test]
    fn defaults_to_all_without_purge() {
        let cli = Cli::try_parse_from(["quill"]).unwrap();
        assert_eq!(cli.mode, Mode::All);
        assert!(!cli.purge);
    }

    #[test]
    fn parses_mode_and_purge() {
        let cli = Cli::try_parse_from(["quill", "--mode", "worker", "--purge"]).unwrap();
        assert_eq!(cli.mode, Mode::Worker);
        assert!(cli.purge);
        assert!(cli.mode.run_worker() && !cli.mode.run_api());
        assert!(Cli::try_parse_from(["quill", "--mode", "batch"]).is_err());
    }
}
