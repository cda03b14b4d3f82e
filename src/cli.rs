use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tracescope", version, about = "Live viewer server for structured JSON trace logs")]
pub struct Cli {
    /// Path to the trace log file to follow
    #[arg(env = "TRACESCOPE_LOG_FILE")]
    pub log_file: PathBuf,

    /// Address to bind the API server to
    #[arg(long, default_value = "127.0.0.1", env = "TRACESCOPE_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8765", env = "TRACESCOPE_PORT")]
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["tracescope", "trace.log"]);
        assert_eq!(cli.log_file, PathBuf::from("trace.log"));
        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 8765);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from(["tracescope", "/var/log/app.log", "--host", "0.0.0.0", "-p", "9000"]);
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.port, 9000);
    }
}
