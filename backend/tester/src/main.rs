use std::{fs, path::PathBuf};

use anyhow::{Context, bail, ensure};
use bank::{
    frames::{PlayerFrame, PlayerTrack},
    lightlist::pattern_channels,
    payloads::UploadItems,
};
use clap::Parser;
use reqwest::Client;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(default_value = "../test.json")]
    output: PathBuf,

    #[arg(long, default_value_t = 3)]
    players: usize,

    #[arg(long, default_value_t = 25)]
    frames: usize,

    /// Base url of a running server, e.g. http://127.0.0.1:8000
    #[arg(long)]
    server: Option<String>,

    #[arg(long, default_value = "testuser")]
    username: String,

    #[arg(long, default_value = "testpassword")]
    password: String,
}

fn sample_frame(index: usize) -> PlayerFrame {
    let [head, shoulder, chest, front, skirt, leg, shoes] = pattern_channels(index);

    PlayerFrame {
        time: index as i64,
        head,
        shoulder,
        chest,
        front,
        skirt,
        leg,
        shoes,
        weap_1: 0,
        weap_2: 0,
    }
}

fn sample_items(players: usize, frames: usize) -> UploadItems {
    UploadItems {
        players: (0..players)
            .map(|player| PlayerTrack {
                frames: (0..frames).map(|i| sample_frame(i + player)).collect(),
            })
            .collect(),
    }
}

async fn drive(base: &str, args: &Args, items: &UploadItems) -> Result<(), anyhow::Error> {
    let client = Client::new();

    let token: Value = client
        .post(format!("{base}/token"))
        .form(&[("username", &args.username), ("password", &args.password)])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let token = token["access_token"]
        .as_str()
        .context("login response has no access_token")?
        .to_string();
    println!("Logged in as {}", args.username);

    let uploaded: Value = client
        .post(format!("{base}/upload_items/"))
        .bearer_auth(&token)
        .json(items)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("Uploaded snapshot {}", uploaded["update_time"]);

    let latest: Value = client
        .get(format!("{base}/items/{}/LATEST", args.username))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    ensure!(
        latest["update_time"] == uploaded["update_time"],
        "LATEST is {}, expected {}",
        latest["update_time"],
        uploaded["update_time"]
    );
    ensure!(
        latest["players"] == serde_json::to_value(&items.players)?,
        "LATEST players differ from the upload"
    );

    let Some(track) = items.players.first() else {
        println!("No players, skipping chunk check");
        return Ok(());
    };

    let chunk: Value = client
        .get(format!("{base}/items/{}/LATEST/player=0/chunk=0", args.username))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let expected = &track.frames[..track.frames.len().min(10)];
    if chunk["player_data"] != serde_json::to_value(expected)? {
        bail!("chunk 0 of player 0 differs from the upload");
    }
    println!("Chunk 0 of player 0 matches");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let items = sample_items(args.players, args.frames);

    fs::write(&args.output, serde_json::to_vec_pretty(&items)?)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!(
        "Wrote {} players x {} frames to {}",
        args.players,
        args.frames,
        args.output.display()
    );

    if let Some(server) = &args.server {
        drive(server.trim_end_matches('/'), &args, &items).await?;
    }

    Ok(())
}
