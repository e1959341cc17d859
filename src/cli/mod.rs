//! Command-line front end: resolve a URL, show what it is, download it.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::HttpConversionClient;
use crate::config::AppConfig;
use crate::download::Downloader;
use crate::materialize::FileMaterializer;
use crate::model::{
    AudioQuality, Descriptor, DownloadRequest, EntitlementTier, MediaSelection, VideoQuality,
};
use crate::resolver::{MetadataResolver, Resolved};

use progress::{CliProgress, print_metadata, print_playlist, print_summary};

fn print_usage() {
    eprintln!("Usage: media-dl [OPTIONS] <url>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -a, --audio [QUALITY]  Download audio (128k, 192k, 256k, 320k, max; default 128k)");
    eprintln!("  -q, --quality <RES>    Video resolution (480p, 720p, 1080p, 1440p, 2160p, best)");
    eprintln!("      --premium          Request as a premium user");
    eprintln!("  -o, --output <DIR>     Directory to save files in");
    eprintln!("      --items <LIST>     Playlist items to download, e.g. 1,3,5-7");
    eprintln!("  -f, --force            Overwrite existing files");
    eprintln!("      --delay <MS>       Pause between playlist items in milliseconds");
    eprintln!("      --api <URL>        Conversion service base URL");
    eprintln!("      --info             Show metadata only, do not download");
    eprintln!("  -h, --help             Show this help");
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    url: String,
    selection: MediaSelection,
    tier: EntitlementTier,
    output: Option<PathBuf>,
    items: Option<Vec<usize>>,
    force: bool,
    delay_ms: Option<u64>,
    api: Option<String>,
    info_only: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Download(CliArgs),
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut url = None;
    let mut audio = None;
    let mut video = None;
    let mut tier = EntitlementTier::Free;
    let mut output = None;
    let mut items = None;
    let mut force = false;
    let mut delay_ms = None;
    let mut api = None;
    let mut info_only = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-a" | "--audio" => {
                let quality = args
                    .get(i + 1)
                    .and_then(|next| next.parse::<AudioQuality>().ok());
                if quality.is_some() {
                    i += 1;
                }
                audio = Some(quality.unwrap_or_default());
            }
            "-q" | "--quality" => {
                let raw = value(args, &mut i, "--quality")?;
                video = Some(raw.parse::<VideoQuality>().map_err(|e| e.to_string())?);
            }
            "--premium" => tier = EntitlementTier::Premium,
            "-o" | "--output" => output = Some(PathBuf::from(value(args, &mut i, "--output")?)),
            "--items" => items = Some(parse_item_list(value(args, &mut i, "--items")?)?),
            "-f" | "--force" => force = true,
            "--delay" => {
                let raw = value(args, &mut i, "--delay")?;
                delay_ms = Some(raw.parse().map_err(|_| format!("Invalid delay: {raw}"))?);
            }
            "--api" => api = Some(value(args, &mut i, "--api")?.to_string()),
            "--info" => info_only = true,
            "-h" | "--help" => return Ok(Command::Help),
            arg if !arg.starts_with('-') => {
                if url.replace(arg.to_string()).is_some() {
                    return Err("Only one URL may be given".to_string());
                }
            }
            other => return Err(format!("Unknown option: {other}")),
        }
        i += 1;
    }

    let selection = match (audio, video) {
        (Some(_), Some(_)) => return Err("--audio and --quality cannot be combined".to_string()),
        (Some(q), None) => MediaSelection::Audio(q),
        (None, Some(q)) => MediaSelection::Video(q),
        (None, None) => MediaSelection::default(),
    };

    let Some(url) = url else {
        return Ok(Command::Help);
    };

    Ok(Command::Download(CliArgs {
        url,
        selection,
        tier,
        output,
        items,
        force,
        delay_ms,
        api,
        info_only,
    }))
}

/// Parses `1,3,5-7` into sorted zero-based positions.
fn parse_item_list(raw: &str) -> Result<Vec<usize>, String> {
    let invalid = || format!("Invalid item list: {raw}");
    let parse_one = |s: &str| -> Result<usize, String> {
        match s.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n - 1),
            _ => Err(invalid()),
        }
    };

    let mut positions = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let (start, end) = (parse_one(start)?, parse_one(end)?);
            if start > end {
                return Err(invalid());
            }
            positions.extend(start..=end);
        } else {
            positions.push(parse_one(part)?);
        }
    }
    if positions.is_empty() {
        return Err(invalid());
    }
    positions.sort_unstable();
    positions.dedup();
    Ok(positions)
}

/// Runs the CLI with the process arguments.
///
/// Returns whether the run finished without failures or cancellation.
///
/// # Errors
///
/// Returns an error if configuration, resolution or session start fails.
pub async fn run() -> crate::Result<bool> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args) {
        Ok(Command::Help) => {
            print_usage();
            Ok(args.iter().any(|a| a == "-h" || a == "--help"))
        }
        Ok(Command::Download(cli)) => run_download(cli).await,
        Err(message) => {
            eprintln!("Error: {message}");
            print_usage();
            Ok(false)
        }
    }
}

async fn run_download(cli: CliArgs) -> crate::Result<bool> {
    let mut config = AppConfig::load()?;
    if let Some(api) = cli.api {
        config.api.base_url = api;
    }
    if let Some(dir) = cli.output {
        config.paths.download_dir = dir;
    }
    if let Some(ms) = cli.delay_ms {
        config.download.item_delay_ms = ms;
    }
    config.download.force_overwrite |= cli.force;
    log::debug!("Using conversion service at {}", config.api.base_url);

    let api = Arc::new(HttpConversionClient::new(&config.api)?);
    let resolver = MetadataResolver::new(api.clone());

    println!("Looking up {} ...", cli.url);
    let descriptor = match resolver.resolve(&cli.url).await? {
        Resolved::Single { url, metadata } => {
            print_metadata(&metadata);
            Descriptor::Single(metadata.to_item(&url))
        }
        Resolved::Playlist(playlist) => {
            print_playlist(&playlist);
            match &cli.items {
                Some(positions) => Descriptor::Playlist(playlist.select(positions)),
                None => Descriptor::Playlist(playlist),
            }
        }
    };

    if cli.info_only {
        return Ok(true);
    }

    let materializer = FileMaterializer::new(&config.paths.download_dir)
        .with_force_overwrite(config.download.force_overwrite);
    let downloader = Downloader::new(api, materializer, config.download.clone());
    let request = DownloadRequest::new(cli.url, cli.selection, cli.tier);

    let token = CancellationToken::new();
    let ctrl_c = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling after the current item...");
                token.cancel();
            }
        })
    };

    println!(
        "Saving {} item(s) as {} {} to {}\n",
        descriptor.len(),
        request.selection.quality_name(),
        request.format(),
        config.paths.download_dir.display()
    );
    let progress = CliProgress::new(descriptor.len());
    let result = downloader
        .run_until_cancelled(&descriptor, &request, &progress, &token)
        .await;
    ctrl_c.abort();
    progress.finish();

    let summary = result?;
    print_summary(&summary);
    Ok(summary.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn download(list: &[&str]) -> CliArgs {
        match parse_args(&args(list)).unwrap() {
            Command::Download(cli) => cli,
            Command::Help => panic!("expected a download command"),
        }
    }

    #[test]
    fn defaults_to_720p_video() {
        let cli = download(&["https://example.com/watch?v=a"]);
        assert_eq!(cli.selection, MediaSelection::Video(VideoQuality::P720));
        assert_eq!(cli.tier, EntitlementTier::Free);
        assert!(!cli.force);
        assert!(!cli.info_only);
    }

    #[test]
    fn audio_flag_with_and_without_quality() {
        let cli = download(&["-a", "https://example.com/watch?v=a"]);
        assert_eq!(cli.selection, MediaSelection::Audio(AudioQuality::K128));
        assert_eq!(cli.url, "https://example.com/watch?v=a");

        let cli = download(&["--audio", "320k", "https://example.com/watch?v=a"]);
        assert_eq!(cli.selection, MediaSelection::Audio(AudioQuality::K320));
    }

    #[test]
    fn full_option_set() {
        let cli = download(&[
            "-q", "1080p", "--premium", "-o", "/tmp/out", "--items", "2,4-5", "-f", "--delay",
            "0", "--api", "http://127.0.0.1:9", "--info", "https://example.com/playlist?list=P",
        ]);
        assert_eq!(cli.selection, MediaSelection::Video(VideoQuality::P1080));
        assert_eq!(cli.tier, EntitlementTier::Premium);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.items, Some(vec![1, 3, 4]));
        assert!(cli.force);
        assert_eq!(cli.delay_ms, Some(0));
        assert_eq!(cli.api.as_deref(), Some("http://127.0.0.1:9"));
        assert!(cli.info_only);
    }

    #[test]
    fn help_and_missing_url() {
        assert_eq!(parse_args(&args(&["-h"])).unwrap(), Command::Help);
        assert_eq!(parse_args(&args(&[])).unwrap(), Command::Help);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&["--bogus", "u"])).is_err());
        assert!(parse_args(&args(&["-q"])).is_err());
        assert!(parse_args(&args(&["-q", "999p", "u"])).is_err());
        assert!(parse_args(&args(&["-a", "-q", "720p", "u"])).is_err());
        assert!(parse_args(&args(&["u1", "u2"])).is_err());
    }

    #[test]
    fn item_lists() {
        assert_eq!(parse_item_list("1,3,5-7").unwrap(), vec![0, 2, 4, 5, 6]);
        assert_eq!(parse_item_list("3, 1, 3").unwrap(), vec![0, 2]);
        assert!(parse_item_list("0").is_err());
        assert!(parse_item_list("5-2").is_err());
        assert!(parse_item_list("a").is_err());
        assert!(parse_item_list(",").is_err());
    }
}
