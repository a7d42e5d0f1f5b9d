use std::io::{BufRead, Write};
use std::path::PathBuf;

use reelcatch_engine::chrome::ChromeDriver;
use reelcatch_engine::config::{load_scrape_config, load_scrape_config_from, save_scrape_config};
use reelcatch_engine::fetch::HttpMediaSource;
use reelcatch_engine::page;
use reelcatch_engine::paths::AppPaths;
use reelcatch_engine::session::{run, Credentials, RunRequest, ScrapeTarget};
use tracing_subscriber::EnvFilter;

const PASSWORD_ENV: &str = "REELCATCH_PASSWORD";

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut base_dir: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut post_url: Option<String> = None;
    let mut profile: Option<String> = None;
    let mut max_posts: Option<usize> = None;
    let mut login: Option<String> = None;
    let mut headless = false;
    let mut download_dir: Option<PathBuf> = None;
    let mut reset_download_dir = false;
    let mut save_config = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--base-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--base-dir requires a value".to_string())?;
                base_dir = Some(PathBuf::from(v));
            }
            "--config" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(v));
            }
            "--post" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--post requires a value".to_string())?;
                post_url = Some(v.to_string());
            }
            "--profile" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--profile requires a value".to_string())?;
                profile = Some(v.to_string());
            }
            "--max-posts" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--max-posts requires a value".to_string())?;
                let n: usize = v
                    .parse()
                    .map_err(|_| format!("--max-posts expects a number, got {v}"))?;
                max_posts = (n > 0).then_some(n);
            }
            "--login" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--login requires a username".to_string())?;
                login = Some(v.to_string());
            }
            "--download-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--download-dir requires a value".to_string())?;
                download_dir = Some(PathBuf::from(v));
            }
            "--reset-download-dir" => reset_download_dir = true,
            "--save-config" => save_config = true,
            "--headless" => headless = true,
            other => return Err(format!("unknown arg: {other} (try --help)")),
        }
        i += 1;
    }

    if post_url.is_some() && profile.is_some() {
        return Err("pass either --post or --profile, not both".to_string());
    }

    let base_dir = base_dir
        .or_else(default_base_dir)
        .ok_or_else(|| "could not determine base dir; pass --base-dir".to_string())?;
    let paths = AppPaths::new(base_dir);
    paths.ensure_dirs().map_err(|e| e.to_string())?;

    let mut config = match &config_path {
        Some(path) => load_scrape_config_from(path),
        None => load_scrape_config(&paths),
    }
    .map_err(|e| e.to_string())?;
    if headless {
        config.headless = true;
    }

    if reset_download_dir {
        paths
            .clear_download_dir_override()
            .map_err(|e| e.to_string())?;
    }
    if let Some(dir) = &download_dir {
        paths
            .set_download_dir_override(dir)
            .map_err(|e| e.to_string())?;
    }
    if save_config {
        save_scrape_config(&paths, &config).map_err(|e| e.to_string())?;
        println!("Saved config: {}", paths.scrape_config_path().to_string_lossy());
        if post_url.is_none() && profile.is_none() {
            return Ok(());
        }
    }

    let target = match (post_url, profile) {
        (Some(url), None) => post_target(url)?,
        (None, Some(username)) => ScrapeTarget::Profile {
            username,
            max_posts,
        },
        _ => prompt_target(max_posts)?,
    };

    let credentials = match login {
        Some(username) => Some(Credentials {
            password: password_for(&username)?,
            username,
        }),
        None => None,
    };

    let download_root = paths.download_root().map_err(|e| e.to_string())?;
    println!("Download dir: {}", download_root.to_string_lossy());

    let source = HttpMediaSource::from_config(&config);
    let driver = ChromeDriver::launch(&config).map_err(|e| e.to_string())?;
    let request = RunRequest {
        target,
        credentials,
    };
    let summary = run(driver, source, &request, config, &download_root).map_err(|e| e.to_string())?;

    println!("Posts scraped:     {}", summary.posts_scraped);
    println!("Media captured:    {}", summary.candidates_captured);
    println!("Media downloaded:  {}", summary.downloaded);
    println!("Duplicates:        {}", summary.duplicates);
    println!("Too small:         {}", summary.too_small);
    println!("Failed:            {}", summary.failed);
    if summary.dropped_events > 0 {
        println!("Dropped events:    {}", summary.dropped_events);
    }
    println!("Stats: {}", summary.stats_path);

    Ok(())
}

fn post_target(url: String) -> Result<ScrapeTarget, String> {
    let url = url.trim().to_string();
    if page::post_shortcode(&url).is_none() {
        return Err(format!("not a post URL: {url}"));
    }
    Ok(ScrapeTarget::Post { url })
}

fn prompt_target(max_posts: Option<usize>) -> Result<ScrapeTarget, String> {
    let choice = prompt("Scrape (1) Single post or (2) User profile? ")?;
    match choice.as_str() {
        "1" => post_target(prompt("Enter the post URL: ")?),
        "2" => {
            let username = prompt("Enter the username: ")?;
            let max_posts = match max_posts {
                Some(n) => Some(n),
                None => {
                    let raw = prompt("Maximum number of posts (empty or 0 for all): ")?;
                    if raw.is_empty() {
                        None
                    } else {
                        let n = raw
                            .parse::<usize>()
                            .map_err(|_| format!("not a number: {raw}"))?;
                        (n > 0).then_some(n)
                    }
                }
            };
            Ok(ScrapeTarget::Profile {
                username,
                max_posts,
            })
        }
        other => Err(format!("invalid choice: {other:?} (expected 1 or 2)")),
    }
}

fn password_for(username: &str) -> Result<String, String> {
    if let Ok(v) = std::env::var(PASSWORD_ENV) {
        if !v.is_empty() {
            return Ok(v);
        }
    }
    let password = prompt(&format!("Password for {username}: "))?;
    if password.is_empty() {
        return Err(format!("no password given (set {PASSWORD_ENV} or type one)"));
    }
    Ok(password)
}

fn prompt(label: &str) -> Result<String, String> {
    print!("{label}");
    std::io::stdout().flush().map_err(|e| e.to_string())?;
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| e.to_string())?;
    if read == 0 {
        return Err("stdin closed".to_string());
    }
    Ok(line.trim().to_string())
}

fn default_base_dir() -> Option<PathBuf> {
    if let Ok(v) = std::env::var("REELCATCH_BASE_DIR") {
        let t = v.trim();
        if !t.is_empty() {
            return Some(PathBuf::from(t));
        }
    }
    std::env::current_dir().ok().map(|d| d.join("reelcatch"))
}

fn print_help() {
    println!(
        r#"reelcatch

Captures the images and videos a post loads in a mobile-emulated browser,
downloads each unique one to <download-dir>/<post-id>/item_<n>.<ext>, and
records likes/comments per post in <download-dir>/scrape_stats.json.

Usage:
  reelcatch --post https://www.instagram.com/p/<shortcode>/
  reelcatch --profile <username> --max-posts 10
  reelcatch                      (prompts for mode and target)

Options:
  --base-dir <path>     Override base dir (default: $REELCATCH_BASE_DIR or ./reelcatch)
  --config <path>       Read scrape settings from this JSON file instead of <base-dir>/config/scrape.json
  --post <url>          Scrape a single post
  --profile <username>  Scrape posts linked from a profile page
  --max-posts <n>       Cap the number of profile posts (0 means all)
  --login <username>    Sign in first (password from ${PASSWORD_ENV} or a prompt)
  --headless            Run the browser without a window
  --download-dir <path> Remember a download dir (stored in <base-dir>/config/download_dir.txt)
  --reset-download-dir  Forget the remembered download dir (back to <base-dir>/downloads)
  --save-config         Write the effective settings to <base-dir>/config/scrape.json

Logging follows RUST_LOG (default: info).
"#
    );
}
