use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use wirepool_frame::{Frame, Header};
use wirepool_pool::JobFailure;

const PREVIEW_LIMIT: usize = 256;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    index: usize,
    header_size: usize,
    body_size: usize,
    header: Option<&'a Header>,
    body: String,
}

#[derive(Serialize)]
struct FailureOutput<'a> {
    index: usize,
    error: &'a str,
    worker: usize,
    queue_pair: usize,
    panicked: bool,
}

pub fn print_frame(index: usize, frame: &Frame, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                index,
                header_size: frame.header_size,
                body_size: frame.body_size,
                header: frame.header.as_ref(),
                body: body_preview(frame.body.as_ref()),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "HEADER SIZE", "BODY SIZE", "HEADER", "BODY"])
                .add_row(vec![
                    index.to_string(),
                    frame.header_size.to_string(),
                    frame.body_size.to_string(),
                    header_text(frame),
                    body_preview(frame.body.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{index} header_size={} body_size={} header={} body={}",
                frame.header_size,
                frame.body_size,
                header_text(frame),
                body_preview(frame.body.as_ref())
            );
        }
        OutputFormat::Raw => print_raw(frame.body.as_ref()),
    }
}

pub fn print_failure(index: usize, failure: &JobFailure, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FailureOutput {
                index,
                error: &failure.message,
                worker: failure.worker,
                queue_pair: failure.queue_pair,
                panicked: failure.panicked,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "WORKER", "QUEUE PAIR", "ERROR"])
                .add_row(vec![
                    index.to_string(),
                    failure.worker.to_string(),
                    failure.queue_pair.to_string(),
                    failure.message.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("#{index} failed: {failure}"),
        // Raw output carries bodies only; failures go to the log.
        OutputFormat::Raw => tracing::warn!(index, error = %failure, "job failed"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn header_text(frame: &Frame) -> String {
    match &frame.header {
        Some(header) => serde_json::to_string(header).unwrap_or_else(|_| "{}".to_string()),
        None if frame.header_size == 0 => "-".to_string(),
        None => format!("<undecodable {} bytes>", frame.header_size),
    }
}

fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) if text.len() <= PREVIEW_LIMIT => text.to_string(),
        Ok(text) => {
            let mut end = PREVIEW_LIMIT;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... ({} bytes)", &text[..end], body.len())
        }
        Err(_) => format!("<binary {} bytes>", body.len()),
    }
}
