//! `caregaps chat` — Interactive or single-message chat mode.

use caregaps_agent::{AgentRequest, AgentStreamEvent, InputMessage, OutputItem, PRIVACY_NOTICE};
use caregaps_core::Role;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let agent = super::build_agent(&config).await?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let response = agent.predict(AgentRequest::user(msg)).await;
        eprint!("\r              \r");
        for item in &response.output {
            if let Some(text) = item.as_text() {
                println!("{text}");
            }
        }
        return Ok(());
    }

    println!();
    println!("  CareGaps Agent — Interactive Mode");
    println!();
    println!("  Model:     {}", agent.model());
    println!("  Profile:   {:?}", agent.profile().kind);
    println!("  Functions: {}", agent.tools().len());
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut history: Vec<InputMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        history.push(InputMessage {
            role: Role::User,
            content: line.to_string(),
        });
        let request = AgentRequest {
            input: history.clone(),
            custom_inputs: None,
        };

        println!();
        print!("  Assistant > ");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        let mut streamed = false;
        let mut rx = agent.run_stream(request);
        while let Some(event) = rx.recv().await {
            match event {
                AgentStreamEvent::TextDelta { delta, .. } => {
                    streamed = true;
                    print!("{delta}");
                    std::io::stdout().flush()?;
                }
                AgentStreamEvent::OutputItemDone { item } => match item {
                    OutputItem::FunctionCall { name, .. } => {
                        eprintln!("\n  [calling {name}]");
                    }
                    OutputItem::Message { text, .. } => {
                        // Rejections, apologies and the notice arrive without deltas
                        if !streamed {
                            print!("{text}");
                        }
                        streamed = false;
                        if text != PRIVACY_NOTICE {
                            answer = text;
                        }
                    }
                    OutputItem::FunctionCallOutput { .. } => {}
                },
            }
        }
        println!();
        println!();

        history.push(InputMessage {
            role: Role::Assistant,
            content: answer,
        });

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
