//! Command line arguments for the `noteforge` binary

use crate::retrieval::{RetrievalMode, RetrievalRequest};
use clap::Parser;
use std::time::Duration;

/// Query a local vault of interlinked Markdown notes
#[derive(Parser, Debug)]
#[command(name = "noteforge", version, about, long_about = None)]
pub struct Cli {
    /// Question or keywords to search for
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Retrieval mode: naive, local, global, hybrid or precision
    #[arg(long, short = 'm', env = "NOTEFORGE_MODE")]
    pub mode: Option<RetrievalMode>,

    /// Seeds kept (naive) or passages returned (precision)
    #[arg(long, short = 'k', env = "NOTEFORGE_TOP_K")]
    pub top_k: Option<usize>,

    /// Link expansion depth
    #[arg(long)]
    pub depth: Option<usize>,

    /// Minimum passage score in precision mode
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Characters per note in the assembled context
    #[arg(long)]
    pub per_doc_chars: Option<usize>,

    /// Characters per passage
    #[arg(long)]
    pub per_passage_chars: Option<usize>,

    /// Total context budget in characters
    #[arg(long)]
    pub budget_chars: Option<usize>,

    /// Wall-clock limit for the whole query, in seconds
    #[arg(long = "deadline-secs", value_parser = parse_deadline)]
    pub deadline: Option<Duration>,

    /// Return the first passages unscored instead of reranking
    #[arg(long)]
    pub no_rerank: bool,

    /// Config file to load instead of the config/ directory
    #[arg(long, short = 'c', env = "NOTEFORGE_CONFIG")]
    pub config: Option<String>,
}

impl Cli {
    /// Query words joined back into one string
    pub fn query_text(&self) -> String {
        self.query.join(" ")
    }

    pub fn into_request(self) -> RetrievalRequest {
        let mut request = RetrievalRequest::new(self.query_text(), self.mode.unwrap_or_default());
        request.top_k = self.top_k;
        request.depth = self.depth;
        request.threshold = self.threshold;
        request.per_doc_chars = self.per_doc_chars;
        request.per_passage_chars = self.per_passage_chars;
        request.budget_chars = self.budget_chars;
        request.deadline = self.deadline;
        request.rerank = self.no_rerank.then_some(false);
        request
    }
}

fn parse_deadline(value: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    if secs <= 0.0 {
        return Err("deadline must be positive".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_query_and_threshold() {
        let cli = Cli::try_parse_from(["noteforge", "--threshold", "8", "memory"]).unwrap();
        assert_eq!(cli.query, vec!["memory"]);

        let request = cli.into_request();
        assert_eq!(request.query, "memory");
        assert_eq!(request.threshold, Some(8.0));
        assert_eq!(request.rerank, None);
    }

    #[test]
    fn test_all_flags_map_onto_request() {
        let cli = Cli::try_parse_from([
            "noteforge",
            "--mode",
            "precision",
            "--top-k",
            "5",
            "--depth",
            "1",
            "--per-doc-chars",
            "400",
            "--per-passage-chars",
            "120",
            "--budget-chars",
            "4000",
            "--deadline-secs",
            "2.5",
            "--no-rerank",
            "explain",
            "lifetimes",
        ])
        .unwrap();

        let request = cli.into_request();
        assert_eq!(request.query, "explain lifetimes");
        assert_eq!(request.mode, RetrievalMode::Precision);
        assert_eq!(request.top_k, Some(5));
        assert_eq!(request.depth, Some(1));
        assert_eq!(request.per_doc_chars, Some(400));
        assert_eq!(request.per_passage_chars, Some(120));
        assert_eq!(request.budget_chars, Some(4000));
        assert_eq!(request.deadline, Some(Duration::from_millis(2500)));
        assert_eq!(request.rerank, Some(false));
    }

    #[test]
    fn test_query_is_required() {
        assert!(Cli::try_parse_from(["noteforge", "--depth", "2"]).is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["noteforge", "--mode", "fuzzy", "q"]).is_err());
        assert!(Cli::try_parse_from(["noteforge", "--deadline-secs", "0", "q"]).is_err());
        assert!(Cli::try_parse_from(["noteforge", "--deadline-secs", "soon", "q"]).is_err());
        assert!(Cli::try_parse_from(["noteforge", "--top-k", "-1", "q"]).is_err());
    }
}
