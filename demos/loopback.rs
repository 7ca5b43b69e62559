//! Publisher and subscriber in one process
//!
//! Run with: cargo run --example loopback [SECONDS]
//!
//! The publisher announces `live` and generates a synthetic audio track
//! (one sample every 20ms) and video track (30fps, keyframe every second).
//! The subscriber subscribes to both, buffers them in a player and prints
//! each frame with its wall-clock presentation time.
//!
//! Set `RUST_LOG=moq_live=trace` to see every object.

use std::time::Duration;

use bytes::Bytes;
use moq_live::media::{Muxer, RawCodec};
use moq_live::session::{Player, Publisher, PublisherEvent, SessionConfig, Subscriber, TrackWriter};
use moq_live::timeline::{MediaKind, Sample, TimelineConfig};
use moq_live::transport::MemorySession;

/// Buffered duration required before playback starts
const TARGET: f64 = 0.5;

fn print_usage() {
    eprintln!("Usage: loopback [SECONDS]");
    eprintln!();
    eprintln!("  SECONDS  How long to publish (default: 3)");
}

/// Publish synthetic samples until `duration` seconds have been sent
async fn generate(
    mut writer: TrackWriter<MemorySession>,
    interval: Duration,
    keyframe_every: u64,
    duration: f64,
) -> moq_live::Result<u64> {
    let mut muxer = RawCodec::new();
    let mut ticker = tokio::time::interval(interval);
    let mut count = 0u64;

    loop {
        ticker.tick().await;

        let timestamp = count as f64 * interval.as_secs_f64();
        if timestamp >= duration {
            break;
        }

        let sample = Sample {
            is_sync: count % keyframe_every == 0,
            data: Bytes::from(count.to_be_bytes().to_vec()),
        };
        let segment = muxer.encode(&sample, timestamp)?;
        writer.write(segment).await?;
        count += 1;
    }

    writer.finish().await?;
    Ok(count)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let duration: f64 = match args.get(1) {
        Some(arg) => match arg.parse() {
            Ok(seconds) => seconds,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => 3.0,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("moq_live=info".parse()?)
                .add_directive("loopback=info".parse()?),
        )
        .init();

    let (a, b) = MemorySession::pair();

    let (publisher, mut events) =
        Publisher::connect(a, SessionConfig::with_namespace("live")).await?;
    let subscriber = Subscriber::connect(b, SessionConfig::default()).await?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::info!(?event, "Publisher event");
            if matches!(event, PublisherEvent::Closed { .. }) {
                break;
            }
        }
    });

    let namespace = subscriber.announced().await?;
    println!("Subscribed to namespace {}", namespace);

    let audio = subscriber.subscribe("audio").await?;
    let video = subscriber.subscribe("video").await?;

    let player = Player::new(&TimelineConfig::default());
    player.ingest(audio, MediaKind::Audio, RawCodec::new());
    player.ingest(video, MediaKind::Video, RawCodec::new());
    player.play(TARGET).await;

    let audio_writer = publisher
        .track("audio")
        .await
        .ok_or("audio track not subscribed")?;
    let video_writer = publisher
        .track("video")
        .await
        .ok_or("video track not subscribed")?;

    let audio_task = tokio::spawn(generate(audio_writer, Duration::from_millis(20), 1, duration));
    let video_task = tokio::spawn(generate(
        video_writer,
        Duration::from_micros(33_333),
        30,
        duration,
    ));

    // Render until both tracks stop producing
    let mut rendered = 0u64;
    let mut idle = 0u32;
    let mut continuity = 0u64;

    while idle < 100 {
        if !player.is_playing().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
            continue;
        }

        let mut progressed = false;

        for kind in [MediaKind::Audio, MediaKind::Video] {
            if let Some(presentation) = player.next(kind).await {
                if presentation.continuity != continuity {
                    continuity = presentation.continuity;
                    println!("-- discontinuity {} --", continuity);
                }

                println!(
                    "{:?} pts={:.3} wall={:.3} sync={}",
                    kind,
                    presentation.frame.timestamp,
                    presentation.wall_time,
                    presentation.frame.is_sync()
                );
                rendered += 1;
                progressed = true;
            }
        }

        if progressed {
            idle = 0;
        } else {
            idle += 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    let audio_sent = audio_task.await??;
    let video_sent = video_task.await??;

    println!();
    println!("Audio samples sent: {}", audio_sent);
    println!("Video samples sent: {}", video_sent);
    println!("Frames rendered:    {}", rendered);

    publisher.close().await?;
    Ok(())
}
