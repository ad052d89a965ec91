use crate::protocol::{ChatRequest, StreamEvent};
use crate::sse::FrameDecoder;
use clap::Args;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use std::error::Error;
use std::io::Write;

type ClientResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Prompt to send.
    pub prompt: String,

    #[arg(long, env = "GATEWAY_URL", default_value = "http://localhost:8080")]
    pub url: String,
}

#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    http: HttpClient,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: HttpClient::new(),
        }
    }

    /// Posts `prompt` to `/chat` and hands every decoded event to `on_event`.
    ///
    /// Returns the terminal event, or `None` if the stream ended without one.
    pub async fn stream_chat<F>(
        &self,
        prompt: &str,
        mut on_event: F,
    ) -> ClientResult<Option<StreamEvent>>
    where
        F: FnMut(StreamEvent),
    {
        let request = ChatRequest {
            prompt: prompt.to_string(),
            auxiliary_payload: None,
            routing_flag: None,
        };
        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Chat request failed: {} - {}", status, body).into());
        }

        let mut stream = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        let mut terminal = None;

        while let Some(chunk) = stream.next().await {
            for event in decoder.push(&chunk?) {
                if event.is_terminal() {
                    terminal = Some(event.clone());
                }
                on_event(event);
            }
        }

        Ok(terminal)
    }
}

/// `chat` subcommand: streams one answer to the terminal.
pub async fn run(args: ChatArgs) -> ClientResult<()> {
    let client = ChatClient::new(&args.url);
    let mut stdout = std::io::stdout();

    let terminal = client
        .stream_chat(&args.prompt, |event| match event {
            StreamEvent::Token { text } => {
                print!("{}", text);
                let _ = stdout.flush();
            }
            StreamEvent::ToolCall { name, args_text } => {
                eprintln!("\n[tool] {}({})", name, args_text);
            }
            StreamEvent::ToolResult {
                name, succeeded, ..
            } => {
                let outcome = if succeeded { "ok" } else { "failed" };
                eprintln!("[tool] {} {}", name, outcome);
            }
            StreamEvent::Start { .. } | StreamEvent::Done { .. } | StreamEvent::Error { .. } => {}
        })
        .await?;

    match terminal {
        Some(StreamEvent::Done { .. }) => {
            println!();
            Ok(())
        }
        Some(StreamEvent::Error { message }) => Err(message.into()),
        _ => Err("stream ended without a terminal event".into()),
    }
}
