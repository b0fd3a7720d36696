use clap::Parser;

/// Refund case reconciliation server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable, colored output for local development
    Pretty,
    /// One JSON object per line for log aggregation
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_flag_parses() {
        let args = Args::parse_from(["refund-sync", "--tracing", "json"]);
        assert_eq!(args.tracing, TracingFormat::Json);
    }
}
