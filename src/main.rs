use anyhow::{anyhow, bail, Context, Result};
use key_player::{
    Config, KeyActuator, KeyMapping, Mode, Notification, Player, RecordingActuator,
    SessionOutcome,
};
use std::env;
use std::io::stdin;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

const USAGE: &str = "Usage: key-player [--config FILE] [--mode single|folder|playlist] [--start N] [--dry-run] FILE...";

struct Args {
    config: Option<PathBuf>,
    mode: Option<Mode>,
    start: usize,
    dry_run: bool,
    files: Vec<PathBuf>,
}

fn main() {
    env_logger::init();

    match run() {
        Ok(SessionOutcome::StoppedOnError) => process::exit(1),
        Ok(_) => (),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    }
}

fn run() -> Result<SessionOutcome> {
    let args = parse_args(env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("could not load config '{}'", path.display()))?,
        None => Config::default(),
    };
    let mode = args.mode.unwrap_or(if args.files.len() > 1 {
        Mode::Playlist
    } else {
        Mode::Single
    });

    let mut player = if args.dry_run {
        Player::new(KeyMapping::default(), || {
            Ok(Box::new(RecordingActuator::new()) as Box<dyn KeyActuator>)
        })
    } else {
        Player::with_os_keyboard(KeyMapping::default())
    };
    let notifications = player.start(args.files, args.start, mode, config.playback)?;

    println!("Playing, press enter to stop");
    let (stop_sender, stop_receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        if let Ok(read) = stdin().read_line(&mut line) {
            if read > 0 {
                let _ = stop_sender.send(());
            }
        }
    });

    loop {
        match notifications.recv_timeout(Duration::from_millis(100)) {
            Ok(Notification::Log(line)) => println!("{}", line),
            Ok(Notification::Status(status)) => println!("[{}]", status),
            Ok(Notification::IndexSelected(index)) => println!("#{}", index + 1),
            Ok(Notification::Finished(_)) => break,
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if stop_receiver.try_recv().is_ok() {
            println!("Stopping...");
            player.stop();
        }
    }

    player
        .wait()
        .ok_or_else(|| anyhow!("playback session went missing"))
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Args> {
    let mut parsed = Args {
        config: None,
        mode: None,
        start: 0,
        dry_run: false,
        files: Vec::new(),
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.config = Some(value(&mut args, &arg)?.into()),
            "--mode" => {
                let mode = value(&mut args, &arg)?;
                parsed.mode = Some(
                    Mode::from_str(&mode).map_err(|_| anyhow!("unknown mode '{}'", mode))?,
                );
            }
            "--start" => {
                let start: usize = value(&mut args, &arg)?
                    .parse()
                    .context("--start expects a track number")?;
                if start == 0 {
                    bail!("--start counts from 1");
                }
                parsed.start = start - 1;
            }
            "--dry-run" => parsed.dry_run = true,
            flag if flag.starts_with("--") => bail!("unknown option '{}'", flag),
            _ => parsed.files.push(arg.into()),
        }
    }

    if parsed.files.is_empty() {
        bail!("no MIDI files given");
    }
    Ok(parsed)
}

fn value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("{} expects a value", flag))
}
