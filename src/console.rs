use crate::clip::{ClipHandle, ClipList};
use crate::session::{CaptureStatus, PlaybackStatus, SessionHandle, SessionObserver};
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line of console input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start or stop recording, like the single record button
    Toggle,
    Record,
    Stop,
    /// Play the clip at this 1-based position
    Play(usize),
    Halt,
    Clear,
    List,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(ConsoleCommand::Toggle);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "r" | "record" => ConsoleCommand::Record,
        "s" | "stop" => ConsoleCommand::Stop,
        "p" | "play" => {
            let number = words
                .next()
                .ok_or_else(|| anyhow::anyhow!("usage: play <number>"))?
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("clip number must be a positive integer"))?;
            ConsoleCommand::Play(number)
        }
        "h" | "halt" => ConsoleCommand::Halt,
        "c" | "clear" => ConsoleCommand::Clear,
        "l" | "list" => ConsoleCommand::List,
        "q" | "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(anyhow::anyhow!("unknown command: {}", other)),
    };

    if words.next().is_some() {
        return Err(anyhow::anyhow!("too many arguments"));
    }

    Ok(command)
}

pub fn render(capture: CaptureStatus, playback: &PlaybackStatus, clips: &ClipList) -> String {
    let mut out = String::new();

    let toggle = match capture {
        CaptureStatus::Idle => "[enter] Start Recording",
        CaptureStatus::RequestingPermission => "[enter] Waiting for microphone...",
        CaptureStatus::Recording => "[enter] Stop Recording",
    };
    out.push_str(toggle);
    out.push('\n');

    for (index, handle) in clips.iter().enumerate() {
        let marker = match playback {
            PlaybackStatus::Playing(target) if target == handle => " (playing)",
            PlaybackStatus::Loading(target) if target == handle => " (loading)",
            _ => "",
        };
        out.push_str(&format!("  play {:<3} Custom Sound #{}{}\n", index + 1, index + 1, marker));
    }

    if !clips.is_empty() {
        out.push_str("[clear] Clear Recordings\n");
    }

    out
}

/// Read commands from stdin until EOF or `quit`, turning them into intents.
pub async fn run_console(session: SessionHandle, observer: SessionObserver) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_state(&observer);

    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("! {}", e);
                continue;
            }
        };
        tracing::debug!("Console command {:?}", command);

        let result = match command {
            ConsoleCommand::Toggle => {
                let capture = *observer.capture.borrow();
                match capture {
                    CaptureStatus::Idle => session.start_recording().await,
                    CaptureStatus::Recording => session.stop_recording().await.map(|_| ()),
                    CaptureStatus::RequestingPermission => Ok(()),
                }
            }
            ConsoleCommand::Record => session.start_recording().await,
            ConsoleCommand::Stop => session.stop_recording().await.map(|_| ()),
            ConsoleCommand::Play(number) => {
                let handle = observer
                    .clips
                    .borrow()
                    .get_numbered(number)
                    .cloned()
                    .unwrap_or_else(|| ClipHandle::new(""));
                session.play_clip(handle).await
            }
            ConsoleCommand::Halt => session.stop_playback().await,
            ConsoleCommand::Clear => session.clear_all().await,
            ConsoleCommand::List => Ok(()),
            ConsoleCommand::Quit => break,
        };

        if let Err(e) = result {
            println!("! {}", e);
        }
        print_state(&observer);
    }

    Ok(())
}

fn print_state(observer: &SessionObserver) {
    let capture = *observer.capture.borrow();
    let playback = observer.playback.borrow().clone();
    let clips = observer.clips.borrow().clone();
    print!("{}", render(capture, &playback, &clips));
}
