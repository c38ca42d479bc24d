//! courier: issue one HTTP request from the command line.
//!
//! ```text
//! courier [--config FILE] GET /users -q page=2 -H "X-Trace: 1"
//!     → load config (or defaults) → init logging
//!     → HttpSetup::from_config (+ XSRF when --cookie is given)
//!     → HttpClient → print body | response | events
//! ```

use std::path::PathBuf;

use clap::Parser;
use futures_util::StreamExt;

use courier::client::{HttpClient, Observe, Observed};
use courier::config::{load_config, ClientConfig};
use courier::http::{HttpEvent, HttpMethod, RequestBody, ResponseBody, ResponseType};
use courier::interceptor::XsrfOptions;
use courier::observability::logging::init_logging;
use courier::setup::{with_xsrf_protection, HttpSetup};

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Send an HTTP request through the courier client", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request method (GET, POST, ...)
    method: HttpMethod,

    /// Absolute URL, or a path resolved against `base_url`
    url: String,

    /// Header as `name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Query parameter as `key=value` (repeatable)
    #[arg(short = 'q', long = "param")]
    params: Vec<String>,

    /// Text body
    #[arg(short, long, conflicts_with = "json")]
    data: Option<String>,

    /// JSON body
    #[arg(short, long)]
    json: Option<String>,

    /// What to print: body, response or events
    #[arg(long, default_value = "body")]
    observe: Observe,

    /// Body decoding: json, text, blob or arraybuffer
    #[arg(long, default_value = "json")]
    response_type: ResponseType,

    /// Report upload and download progress events
    #[arg(long)]
    progress: bool,

    /// Cookie string to read the XSRF token from
    #[arg(long)]
    cookie: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    init_logging(&config.observability);

    tracing::info!(
        method = %cli.method,
        url = %cli.url,
        base_url = ?config.base_url,
        "courier v0.1.0 starting"
    );

    let mut features = Vec::new();
    if let Some(cookie) = cli.cookie.clone() {
        features.push(with_xsrf_protection(XsrfOptions::from_config(
            &config.xsrf,
            move || cookie.clone(),
        )));
    }
    let setup = HttpSetup::from_config(&config)?;
    let client = HttpClient::with_setup(&setup, features);

    let mut builder = client
        .builder(cli.method, cli.url.clone())
        .response_type(cli.response_type)
        .report_progress(cli.progress);
    for header in &cli.headers {
        let (name, value) = split_pair(header, ':')?;
        builder = builder.header(name, value);
    }
    for param in &cli.params {
        let (key, value) = split_pair(param, '=')?;
        builder = builder.param(key, value);
    }
    if let Some(json) = &cli.json {
        let value: serde_json::Value = serde_json::from_str(json)?;
        builder = builder.body(value);
    } else if let Some(data) = &cli.data {
        builder = builder.body(RequestBody::from(data.as_str()));
    }

    let mut results = builder.observe(cli.observe);
    while let Some(item) = results.next().await {
        match item? {
            Observed::Body(body) => print_body(&body),
            Observed::Response(response) => {
                println!("{} {}", response.status, response.status_text);
                for (name, values) in response.headers.iter() {
                    for value in values {
                        println!("{name}: {value}");
                    }
                }
                println!();
                print_body(&response.body);
            }
            Observed::Event(event) => print_event(&event),
        }
    }

    Ok(())
}

fn split_pair(raw: &str, separator: char) -> Result<(&str, &str), String> {
    raw.split_once(separator)
        .map(|(key, value)| (key.trim(), value.trim()))
        .ok_or_else(|| format!("expected `key{separator}value`, got `{raw}`"))
}

fn print_body(body: &ResponseBody) {
    match body {
        ResponseBody::Null => {}
        ResponseBody::Json(value) => match serde_json::to_string_pretty(value) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{value}"),
        },
        ResponseBody::Text(text) => println!("{text}"),
        ResponseBody::Blob { bytes, .. } | ResponseBody::ArrayBuffer(bytes) => {
            println!("<{} bytes>", bytes.len())
        }
    }
}

fn print_event(event: &HttpEvent) {
    match event {
        HttpEvent::Sent => println!("sent"),
        HttpEvent::UploadProgress(progress) => {
            println!("upload {} / {:?}", progress.loaded, progress.total)
        }
        HttpEvent::ResponseHeader(head) => println!("header {} {}", head.status, head.status_text),
        HttpEvent::DownloadProgress(progress) => {
            println!("download {} / {:?}", progress.loaded, progress.total)
        }
        HttpEvent::User(user) => println!("user {} {}", user.name, user.payload),
        HttpEvent::Response(response) => {
            println!("response {} {}", response.status, response.status_text);
            print_body(&response.body);
        }
    }
}
