//! # tubesig
//!
//! Resolve a video and print its metadata and stream URLs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tubesig_core::VideoMetadata;
use tubesig_resolver::{lookup_by_tag, Resolver, ResolverConfig};

#[derive(Debug, Parser)]
#[command(name = "tubesig")]
#[command(about = "Resolve playable stream URLs for a video")]
#[command(version)]
struct Args {
    /// Video id or watch URL.
    video: String,

    /// Print only the URL of this itag.
    #[arg(long)]
    itag: Option<u32>,

    /// Print the resolved metadata as JSON.
    #[arg(long, conflicts_with = "itag")]
    json: bool,

    /// Only list formats whose signature was resolved.
    #[arg(long)]
    playable_only: bool,

    /// Override the browser user agent.
    #[arg(long)]
    user_agent: Option<String>,

    /// Request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// JSON resolver configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn resolver_config(&self) -> Result<ResolverConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
            }
            None => ResolverConfig::default(),
        };

        if let Some(user_agent) = &self.user_agent {
            config.profile = config.profile.with_user_agent(user_agent.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn render_summary(metadata: &VideoMetadata, playable_only: bool) -> String {
    let mut out = format!(
        "ID\t: {}\nTitle\t: {}\nAuthor\t: {}\nViews\t: {}\nLength\t: {}s\nRating\t: {:.2}\n",
        metadata.id,
        metadata.title,
        metadata.author,
        metadata.view_count,
        metadata.length_seconds,
        metadata.average_rating
    );
    if !metadata.keywords.is_empty() {
        out.push_str(&format!("Tags\t: {}\n", metadata.keywords));
    }
    out.push_str("\nFormats:\n");

    for (index, format) in metadata.formats().iter().enumerate() {
        if playable_only && !format.is_playable() {
            continue;
        }
        let marker = if format.is_playable() { "" } else { "\t(unresolved)" };
        out.push_str(&format!(
            "\t{index}\tItag {}\t{}\t{}\t{}{marker}\n",
            format.itag, format.quality, format.extension, format.mime_type
        ));
    }
    out
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tubesig=info,tubesig_resolver=info,tubesig_cipher=info".into()
            }),
        )
        .init();

    let args = Args::parse();
    info!("tubesig v{}", env!("CARGO_PKG_VERSION"));

    let resolver = Resolver::with_config(args.resolver_config()?)?;
    let metadata = resolver
        .resolve(&args.video)
        .await
        .with_context(|| format!("resolving {}", args.video))?;

    if let Some(itag) = args.itag {
        let format = lookup_by_tag(&metadata, itag)?;
        println!("{}", format.url);
    } else if args.json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else {
        print!("{}", render_summary(&metadata, args.playable_only));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tubesig_core::{ResolvedFormat, SignatureState, StreamKind, VideoDetails};

    fn format(itag: u32, signature: SignatureState) -> ResolvedFormat {
        ResolvedFormat {
            itag,
            url: format!("https://r.test/{itag}"),
            mime_type: "video/mp4".into(),
            quality: "360p".into(),
            extension: "mp4".into(),
            kind: StreamKind::Progressive,
            signature,
            height: Some(360),
            bitrate: None,
        }
    }

    fn metadata() -> VideoMetadata {
        let details = VideoDetails {
            id: "dQw4w9WgXcQ".into(),
            title: "Title".into(),
            author: "Author".into(),
            keywords: "a, b".into(),
            view_count: 42,
            ..VideoDetails::default()
        };
        VideoMetadata::new(
            details,
            vec![
                format(18, SignatureState::Direct),
                format(137, SignatureState::Unresolved),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from(["tubesig", "dQw4w9WgXcQ", "--itag", "18"]).unwrap();
        assert_eq!(args.video, "dQw4w9WgXcQ");
        assert_eq!(args.itag, Some(18));
        assert!(!args.json);
    }

    #[test]
    fn test_json_conflicts_with_itag() {
        assert!(Args::try_parse_from(["tubesig", "x", "--itag", "18", "--json"]).is_err());
    }

    #[test]
    fn test_config_overrides() {
        let args = Args::try_parse_from([
            "tubesig",
            "x",
            "--user-agent",
            "curl/8",
            "--timeout",
            "5",
        ])
        .unwrap();
        let config = args.resolver_config().unwrap();
        assert_eq!(config.profile.user_agent, "curl/8");
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_render_summary() {
        let out = render_summary(&metadata(), false);
        assert!(out.contains("ID\t: dQw4w9WgXcQ"));
        assert!(out.contains("Views\t: 42"));
        assert!(out.contains("Tags\t: a, b"));
        assert!(out.contains("\t0\tItag 18\t360p\tmp4\tvideo/mp4\n"));
        assert!(out.contains("Itag 137\t360p\tmp4\tvideo/mp4\t(unresolved)"));
    }

    #[test]
    fn test_render_summary_layout() {
        let out = render_summary(&metadata(), false);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ID\t: dQw4w9WgXcQ");
        assert_eq!(lines[5], "Rating\t: 0.00");
        assert_eq!(lines[6], "Tags\t: a, b");
        assert_eq!(lines[8], "Formats:");
        assert_eq!(lines.len(), 11);
        assert!(out.ends_with("(unresolved)\n"));
    }

    #[test]
    fn test_render_playable_only() {
        let out = render_summary(&metadata(), true);
        assert!(out.contains("Itag 18"));
        assert!(!out.contains("Itag 137"));
    }
}
