// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use podmirror::{
    CommandDownloader, DEFAULT_FEED_URL_TEMPLATE, Downloader, HttpDownloader, NoopReporter,
    ProgressEvent, ProgressReporter, ReqwestClient, SharedProgressReporter, SiteConfig,
    SyncOptions, feed_url, sync_mirror,
};

// Emoji with fallback for terminals without Unicode support
static RADIO: Emoji<'_, '_> = Emoji("📻 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static TRASH: Emoji<'_, '_> = Emoji("🗑️  ", "[-] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Mirror a Mixcloud account into the current directory and publish it as a podcast feed
#[derive(Parser, Debug)]
#[command(name = "podmirror")]
#[command(about = "Mirror a Mixcloud account as a self-hosted podcast feed")]
#[command(version)]
struct Args {
    /// Account whose uploads are mirrored
    account: String,

    /// Host the mirror is served from, e.g. intergalacticfm.com
    hostname: String,

    /// Path below the host the files are served from (may be empty)
    base_path: String,

    /// Local part of the contact email address at the host
    email: String,

    /// Source feed URL; `{account}` is replaced by the account name
    #[arg(long, default_value = DEFAULT_FEED_URL_TEMPLATE)]
    feed_url: String,

    /// Command fetching one item; `{url}` is replaced by the item link
    #[arg(long, conflicts_with = "direct")]
    download_command: Option<String>,

    /// Download item links directly over HTTP instead of running a command
    #[arg(long)]
    direct: bool,

    /// Keep going when an item fails to download
    #[arg(short, long)]
    keep_going: bool,

    /// Seconds to wait for an HTTP connection or the next chunk of a response
    #[arg(long, default_value = "120")]
    timeout: u64,

    /// Timeout in seconds for a single download command
    #[arg(long, default_value = "3600")]
    download_timeout: u64,

    /// Working directory holding the mirrored files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    download: Mutex<Option<ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            download: Mutex::new(None),
            main_bar,
        }
    }

    fn start_download_bar(&self, message: String) {
        let style = ProgressStyle::default_spinner()
            .template(&format!("  {DOWNLOAD}{{spinner:.cyan}} {{bytes}} {{wide_msg}}"))
            .unwrap();

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(style);
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Some(previous) = self.download.lock().unwrap().replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn update_download_bar(&self, bytes_downloaded: u64, total_bytes: Option<u64>) {
        let download = self.download.lock().unwrap();
        let Some(bar) = download.as_ref() else {
            return;
        };

        if let Some(total) = total_bytes
            && bar.length() != Some(total)
        {
            let style = ProgressStyle::default_bar()
                .template(&format!(
                    "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
                ))
                .unwrap()
                .progress_chars("█▓░");
            bar.set_style(style);
            bar.set_length(total);
        }
        bar.set_position(bytes_downloaded);
    }

    fn finish_download_bar(&self) {
        if let Some(bar) = self.download.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedParsed {
                channel_title,
                total_items,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} items",
                    channel_title.bold().green(),
                    total_items.to_string().cyan()
                ));
            }

            ProgressEvent::PartialFilesCleanedUp { count } => {
                self.main_bar
                    .println(format!("{TRASH}Removed {count} interrupted download(s)"));
            }

            ProgressEvent::PlanReady {
                to_fetch,
                to_keep,
                to_delete,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} new, {} present, {} to remove",
                    to_fetch.to_string().yellow(),
                    to_keep.to_string().cyan(),
                    to_delete.to_string().red()
                ));
            }

            ProgressEvent::DownloadStarting {
                filename,
                index,
                total,
            } => {
                self.start_download_bar(format!(
                    "[{}/{}] {}",
                    (index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    truncate_title(&filename, 50)
                ));
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                self.update_download_bar(bytes_downloaded, total_bytes);
            }

            ProgressEvent::DownloadCompleted { filename } => {
                self.finish_download_bar();
                self.main_bar.println(format!(
                    "{SUCCESS}{}",
                    truncate_title(&filename, 60).green()
                ));
            }

            ProgressEvent::DownloadFailed { filename, error } => {
                self.finish_download_bar();
                self.main_bar.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&filename, 40).red(),
                    error.red()
                ));
            }

            ProgressEvent::FileRenamed { from, to } => {
                self.main_bar.println(format!(
                    "  {} {} {}",
                    from.dimmed(),
                    "→".dimmed(),
                    to.dimmed()
                ));
            }

            ProgressEvent::FileDeleted { filename } => {
                self.main_bar
                    .println(format!("{TRASH}{}", filename.yellow()));
            }

            ProgressEvent::FeedWritten { path, item_count } => {
                self.main_bar.println(format!(
                    "{FOLDER}Wrote {} with {} items",
                    path.display().to_string().cyan(),
                    item_count.to_string().cyan()
                ));
            }

            ProgressEvent::SyncCompleted {
                fetched_count,
                kept_count,
                deleted_count,
                failed_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} fetched, {} kept, {} deleted, {} failed",
                    "Mirror complete:".bold().green(),
                    fetched_count.to_string().green().bold(),
                    kept_count.to_string().cyan(),
                    deleted_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Parse arguments; malformed invocations print usage to stdout and exit 1
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            print!("{}", e.render());
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            RADIO,
            "podmirror".bold().magenta(),
            "- Podcast Mirror".dimmed()
        );
    }

    let client = ReqwestClient::with_timeout(Duration::from_secs(args.timeout))
        .context("Failed to create HTTP client")?;

    let download_timeout = Duration::from_secs(args.download_timeout);
    let downloader: Box<dyn Downloader> = if args.direct {
        Box::new(HttpDownloader::new(client.clone()))
    } else if let Some(command_line) = &args.download_command {
        let command = CommandDownloader::from_command_line(command_line, download_timeout)
            .context("Download command is empty")?;
        Box::new(command)
    } else {
        Box::new(CommandDownloader::default().with_timeout(download_timeout))
    };

    let url = feed_url(&args.feed_url, &args.account).context("Invalid feed URL")?;
    let site = SiteConfig::new(&args.hostname, &args.base_path, &args.email);

    let options = SyncOptions {
        continue_on_error: args.keep_going,
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let result = sync_mirror(
        &client,
        downloader.as_ref(),
        &url,
        &site,
        &args.dir,
        &options,
        reporter,
    )
    .await
    .with_context(|| format!("Failed to mirror {}", args.account))?;

    if !args.quiet && !result.failed_items.is_empty() {
        println!("\n{}", "Failed items:".red().bold());
        for (filename, error) in &result.failed_items {
            println!("  {}{} - {}", CROSS, filename.yellow(), error.dimmed());
        }
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Feed: {}\n",
            site.public_url(podmirror::feed::FEED_FILENAME).cyan()
        );
    }

    if result.failed() > 0 {
        std::process::exit(1);
    }

    Ok(())
}
