//! Unifilter CLI
//!
//! CLI tool for compiling rule sources into a binary cache and inspecting it.

mod cache;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use uf_core::blocker::decide;
use uf_core::url::extract_host;
use uf_core::{ContentRequest, ContentType, MatchDecision};

use crate::cache::{cache_info, compile_rule_set, read_cache, write_cache};

#[derive(Parser)]
#[command(name = "uf-cli")]
#[command(about = "Unifilter rule compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON rule source into a cache directory
    Compile {
        /// Input rule source (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output cache directory
        #[arg(short, long, default_value = "rules.cache")]
        output: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a cache directory
    Validate {
        /// Cache directory to validate
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Dump cache info
    Info {
        /// Cache directory to inspect
        #[arg(short, long)]
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate one request against a cache
    Check {
        /// Cache directory
        #[arg(short, long)]
        input: PathBuf,

        /// Request URL
        #[arg(short, long)]
        url: String,

        /// URL of the page that issued the request
        #[arg(short, long)]
        page: Option<String>,

        /// Request type (script, image, document, ...)
        #[arg(short = 't', long = "type", default_value = "other")]
        request_type: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            verbose,
        } => cmd_compile(&input, &output, verbose),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Info { input, json } => cmd_info(&input, json),
        Commands::Check {
            input,
            url,
            page,
            request_type,
        } => cmd_check(&input, &url, page.as_deref(), &request_type),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_compile(input: &Path, output: &Path, verbose: bool) -> Result<(), String> {
    let (rules, stats) = compile_rule_set(input, verbose)?;
    write_cache(output, &rules)?;

    read_cache(output).map_err(|e| format!("Written cache failed validation: {}", e))?;

    println!("Compiled {} lists to '{}'", stats.lists, output.display());
    println!("  Filters:  {}", stats.filters);
    println!("  Elements: {}", stats.elements);
    println!(
        "  Removed:  {} dropped, {} duplicates, {} badfiltered ({} badfilters)",
        stats.dropped, stats.deduped, stats.badfiltered, stats.badfilter_rules
    );
    println!("  Time:     {:.1}ms", stats.total_ms);

    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), String> {
    let rules = read_cache(input)?;
    let info = cache_info(input, &rules);

    println!("Cache '{}' is valid", input.display());
    println!("  Filters:     {}", info.filters);
    println!("  Elements:    {}", info.elements);
    println!("  Size:        {} bytes", info.total_bytes);

    Ok(())
}

fn cmd_info(input: &Path, json: bool) -> Result<(), String> {
    let rules = read_cache(input)?;
    let info = cache_info(input, &rules);

    if json {
        let text = serde_json::to_string_pretty(&info).map_err(|e| e.to_string())?;
        println!("{}", text);
        return Ok(());
    }

    println!("Cache: {}", info.path);
    println!("  Total size:  {} bytes ({:.1} KB)", info.total_bytes, info.total_bytes as f64 / 1024.0);
    println!();
    println!("Categories:");
    for c in &info.categories {
        println!(
            "  {:<18} {:<4} {:>7} filters {:>7} buckets {:>9} bytes",
            c.category, c.file, c.filters, c.buckets, c.bytes
        );
    }
    println!();
    println!("Element hiding:");
    println!("  Filters:     {}", info.elements);
    println!("  Exceptions:  {}", info.element_disable);

    Ok(())
}

fn cmd_check(input: &Path, url: &str, page: Option<&str>, request_type: &str) -> Result<(), String> {
    let content_type =
        ContentType::from_type_name(request_type).ok_or_else(|| format!("Unknown request type '{}'", request_type))?;
    let rules = read_cache(input)?;

    let page_host = match page {
        Some(page) => Some(
            extract_host(page)
                .map(str::to_ascii_lowercase)
                .ok_or_else(|| format!("Page URL '{}' has no host", page))?,
        ),
        None => None,
    };

    let request = ContentRequest::new(url, page_host.as_deref(), content_type);
    let result = decide(&rules, &request);

    let decision = match result.decision {
        MatchDecision::Allow => "allow",
        MatchDecision::Block => "block",
        MatchDecision::Redirect => "redirect",
        MatchDecision::Modify => "modify",
    };
    println!("Decision: {}", decision);
    if let Some(list) = result.list {
        println!("  List:      {}", list);
    }
    if let Some(pattern) = &result.pattern {
        println!("  Filter:    {}", pattern);
    }
    if let Some(resource) = result.redirect_resource {
        println!("  Resource:  {}", resource);
    }
    if let Some(modify) = &result.modify {
        if modify.url != url {
            println!("  URL:       {}", modify.url);
        }
        for (name, value) in &modify.add_request_headers {
            println!("  +Request:  {}: {}", name, value);
        }
        for name in &modify.remove_request_headers {
            println!("  -Request:  {}", name);
        }
        for (name, value) in &modify.add_response_headers {
            println!("  +Response: {}: {}", name, value);
        }
        for name in &modify.remove_response_headers {
            println!("  -Response: {}", name);
        }
        for csp in &modify.csp {
            println!("  CSP:       {}", csp);
        }
    }

    Ok(())
}
