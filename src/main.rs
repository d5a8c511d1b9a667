use anyhow::Result;
use callshield::{Config, MessageKind, RealtimeSession, SessionConfig, SessionEvent};
use clap::Parser;
use tracing::{info, warn};

/// Stream the microphone to the phishing-analysis backend and print
/// transcripts and risk assessments to the console.
#[derive(Parser)]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(short, long, default_value = "config/callshield")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v0.1.0", cfg.service.name);
    info!("Backend: {}", cfg.backend.endpoint);

    let session_config = SessionConfig {
        endpoint: cfg.backend.endpoint,
        language: cfg.backend.language,
        origin: cfg.backend.origin,
        sample_rate: cfg.audio.sample_rate,
        channels: cfg.audio.channels,
        ..SessionConfig::default()
    };

    let session = RealtimeSession::new(session_config);
    let mut events = session
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("event stream already taken"))?;

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Connected => info!("Session connected, speak now"),
                SessionEvent::Message(msg) => match msg.kind {
                    MessageKind::Partial => {
                        if let Some(text) = &msg.text {
                            print!("\r{}", text);
                            std::io::Write::flush(&mut std::io::stdout()).ok();
                        }
                    }
                    MessageKind::Final => {
                        if let Some(text) = &msg.text {
                            println!("\n{}", text);
                        }
                    }
                    MessageKind::Risk | MessageKind::State => {
                        if let Some(immediate) = &msg.immediate {
                            warn!(
                                "Risk level {} ({:.0}%){}",
                                immediate.level,
                                immediate.probability * 100.0,
                                immediate
                                    .phishing_type
                                    .as_deref()
                                    .map(|t| format!(": {}", t))
                                    .unwrap_or_default()
                            );
                        }
                        if let Some(comprehensive) = &msg.comprehensive {
                            warn!(
                                "Overall assessment: phishing={} (confidence {:.0}%)",
                                comprehensive.is_phishing,
                                comprehensive.confidence * 100.0
                            );
                        }
                    }
                    MessageKind::Unknown => {}
                },
                SessionEvent::Failed { reason } => {
                    warn!("Session failed: {}", reason);
                    break;
                }
                SessionEvent::Closed => {
                    info!("Session closed");
                    break;
                }
            }
        }
    });

    session.start().await?;
    info!("Streaming... press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    session.stop().await;

    let stats = session.stats();
    info!(
        "Sent {} frames ({} bytes), received {} messages",
        stats.frames_sent, stats.bytes_sent, stats.messages_received
    );

    let _ = printer.await;
    Ok(())
}
