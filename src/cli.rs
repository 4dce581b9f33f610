use crate::config::ClientConfig;
use crate::error::Result;
use crate::protocol::WireFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "issue-chat")]
#[command(version)]
#[command(about = "Streaming chat client for per-issue conversations")]
pub struct Args {
    /// Issue whose conversation to join (overrides config and environment)
    pub issue_id: Option<String>,

    /// TOML config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Server host
    #[arg(long)]
    pub host: Option<String>,

    /// Server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Connect with wss:// instead of ws://
    #[arg(long)]
    pub secure: bool,

    /// Frame format spoken on the connection
    #[arg(long, value_enum)]
    pub wire_format: Option<WireFormat>,

    /// Disable the suggested-reply channel
    #[arg(long)]
    pub no_suggested_reply: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Default log filter when RUST_LOG is unset (e.g. debug, issue_chat=trace)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Resolve the effective configuration: file (or defaults), then the
/// environment seen through `env`, then flags.
pub fn build_config<F>(args: &Args, env: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    config.apply_env(env)?;

    if let Some(id) = &args.issue_id {
        config.issue_id = id.clone();
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.secure {
        config.scheme = "wss".to_string();
    }
    if let Some(format) = args.wire_format {
        config.wire_format = format;
    }
    if args.no_suggested_reply {
        config.suggested_reply = false;
    }
    if args.no_color {
        config.color = false;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["issue-chat", "42"]);
        assert_eq!(args.issue_id.as_deref(), Some("42"));
        assert!(args.config.is_none());
        assert!(args.host.is_none());
        assert!(args.port.is_none());
        assert!(!args.secure);
        assert!(!args.no_suggested_reply);
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "issue-chat",
            "7",
            "--host",
            "example.org",
            "--port",
            "9000",
            "--secure",
            "--wire-format",
            "envelope",
            "--no-suggested-reply",
            "--no-color",
            "--log-level",
            "debug",
        ]);
        let cfg = build_config(&args, no_env).unwrap();
        assert_eq!(cfg.url().unwrap(), "wss://example.org:9000/ws/7");
        assert_eq!(cfg.wire_format, WireFormat::Envelope);
        assert!(!cfg.suggested_reply);
        assert!(!cfg.color);
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn test_flag_beats_env() {
        let args = Args::parse_from(["issue-chat", "1", "--port", "1234"]);
        let cfg = build_config(&args, |k| (k == "ISSUE_CHAT_PORT").then(|| "5555".to_string()))
            .unwrap();
        assert_eq!(cfg.port, 1234);
    }

    #[test]
    fn test_env_supplies_issue_id() {
        let args = Args::parse_from(["issue-chat"]);
        let cfg = build_config(&args, |k| (k == "ISSUE_CHAT_ISSUE").then(|| "88".to_string()))
            .unwrap();
        assert_eq!(cfg.issue_id, "88");
    }

    #[test]
    fn test_missing_issue_id_is_an_error() {
        let args = Args::parse_from(["issue-chat"]);
        assert!(build_config(&args, no_env).is_err());
    }

    #[test]
    fn test_bad_wire_format_rejected_by_parser() {
        assert!(Args::try_parse_from(["issue-chat", "1", "--wire-format", "xml"]).is_err());
    }
}
