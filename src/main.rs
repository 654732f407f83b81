// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Prestige CLI - run requests from a document

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};

use prestige::document::split_lines;
use prestige::{CookieStore, DocumentParser, Error, Reply, Session, SessionConfig};

/// Options shared by the commands that take a document
#[derive(Debug, Default)]
struct Options {
    file: PathBuf,
    /// Zero-based line of the cursor
    line: usize,
    proxy: Option<String>,
    cookies: Option<PathBuf>,
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr so response bodies can be piped
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("prestige=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let outcome = match args[1].as_str() {
        "run" => match parse_options(&args[2..]) {
            Ok(options) => run_request(options).await,
            Err(e) => Err(e),
        },
        "show" => match parse_options(&args[2..]) {
            Ok(options) => show_request(options).await,
            Err(e) => Err(e),
        },
        "blocks" => match parse_options(&args[2..]) {
            Ok(options) => list_blocks(&options.file),
            Err(e) => Err(e),
        },
        "--help" | "-h" | "help" => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        "--version" | "-v" | "version" => {
            println!("prestige {}", prestige::VERSION);
            return ExitCode::SUCCESS;
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            return ExitCode::from(1);
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"Prestige - Run HTTP requests from a text document

USAGE:
    prestige <COMMAND> <FILE> [OPTIONS]

COMMANDS:
    run <file>      Run the request under the cursor
    show <file>     Print the request under the cursor without sending it
    blocks <file>   List the blocks in a document
    help            Show this help message
    version         Show version information

OPTIONS:
    --line <N>      Cursor line, counting from 1 (default: 1)
    --proxy <URL>   Relay calls through a Prestige proxy (or PRESTIGE_PROXY_URL)
    --cookies <F>   Load cookies from F before the run and save them after
    --json          Print the result as JSON

EXAMPLES:
    prestige run api.prestige --line 12
    prestige run api.prestige --line 12 --proxy http://localhost:3045/proxy --cookies cookies.json
    prestige show api.prestige --line 12
    prestige blocks api.prestige
"#
    );
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut options = Options::default();
    let mut file = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--line" | "-l" => {
                let value = iter.next().context("--line needs a value")?;
                let line: usize = value
                    .parse()
                    .with_context(|| format!("invalid line number: {}", value))?;
                if line == 0 {
                    bail!("line numbers start at 1");
                }
                options.line = line - 1;
            }
            "--proxy" => {
                options.proxy = Some(iter.next().context("--proxy needs a URL")?.clone());
            }
            "--cookies" => {
                options.cookies = Some(iter.next().context("--cookies needs a file")?.into());
            }
            "--json" => options.json = true,
            flag if flag.starts_with("--") => bail!("unknown option: {}", flag),
            path => {
                if file.replace(PathBuf::from(path)).is_some() {
                    bail!("only one document can be given");
                }
            }
        }
    }

    options.file = file.context("missing document file")?;
    Ok(options)
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

async fn open_session(options: &Options) -> anyhow::Result<Session> {
    let mut config = SessionConfig::from_env()?;
    if let Some(proxy) = &options.proxy {
        config = config.proxy(proxy.clone());
    }
    let session = Session::new(config).await?;

    if let Some(path) = options.cookies.as_deref().filter(|p| p.exists()) {
        let json = read_document(path)?;
        let store = CookieStore::from_json(&json)
            .with_context(|| format!("{} is not a cookie file", path.display()))?;
        session.replace_cookies(store);
    }

    Ok(session)
}

async fn run_request(options: Options) -> anyhow::Result<ExitCode> {
    let text = read_document(&options.file)?;
    let session = open_session(&options).await?;

    let outcome = session.run_at_cursor(&text, options.line).await;

    if let Some(path) = &options.cookies {
        let json = session.cookies().to_json()?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    }

    if options.json {
        if let Some(result) = session.result() {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        return Ok(if outcome.is_ok() { ExitCode::SUCCESS } else { ExitCode::from(1) });
    }

    let success = match outcome {
        Ok(success) => success,
        Err(e) => return Err(describe(e)),
    };

    println!("{} {}", success.request.method, success.request.url);
    match &success.reply {
        Reply::Direct(response) | Reply::Proxied { response, .. } => {
            if let Some(proxy) = success.reply.proxy() {
                println!("Via: {}", proxy);
            }
            println!("\n{} {}", response.status, response.status_text);
            for (name, value) in &response.headers {
                println!("{}: {}", name, value);
            }
            println!("\n{}", response.body);
        }
        Reply::Unrecognized { proxy, payload } => {
            println!("Via: {} (unrecognized reply)", proxy);
            println!("\n{}", serde_json::to_string_pretty(payload)?);
        }
    }

    if success.cookie_changes.any {
        eprintln!(
            "Cookies: {} added, {} modified",
            success.cookie_changes.added, success.cookie_changes.modified
        );
    }
    eprintln!("Time: {}ms", success.time_taken.as_millis());

    Ok(match success.reply.status() {
        Some(status) if status >= 400 => ExitCode::from(2),
        _ => ExitCode::SUCCESS,
    })
}

async fn show_request(options: Options) -> anyhow::Result<ExitCode> {
    let text = read_document(&options.file)?;
    let session = open_session(&options).await?;

    let request = session.compile(&text, options.line).await.map_err(describe)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} {}", request.method, request.url);
    for (name, value) in &request.headers {
        println!("{}: {}", name, value);
    }
    if !request.body.is_empty() {
        println!("\n{}", request.body);
    }
    Ok(ExitCode::SUCCESS)
}

fn list_blocks(path: &Path) -> anyhow::Result<ExitCode> {
    let text = read_document(path)?;
    let lines = split_lines(&text);

    for block in DocumentParser::outline(&lines) {
        let label = block
            .title
            .as_deref()
            .or(block.request_line.as_deref())
            .unwrap_or("");
        println!(
            "{:>5}-{:<5} {:<10} {}",
            block.start_line + 1,
            block.end_line,
            format!("{:?}", block.kind).to_lowercase(),
            label
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Attach the document line to errors that carry one
fn describe(error: Error) -> anyhow::Error {
    match error.line() {
        Some(line) => anyhow::Error::new(error).context(format!("at line {}", line + 1)),
        None => error.into(),
    }
}
