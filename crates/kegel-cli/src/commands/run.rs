use clap::Args;
use kegel_core::notify::{Locale, SequencedAmbient, TerminalVoice, TraceSink};
use kegel_core::{Config, Dispatcher, DriverHandle, PhaseDurations, PhaseEngine, TickDriver};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::resolve_durations;
use crate::render::TerminalPresenter;

#[derive(Args)]
pub struct RunArgs {
    /// Contract phase length in seconds
    #[arg(long)]
    contract: Option<u32>,
    /// Relax phase length in seconds
    #[arg(long)]
    relax: Option<u32>,
    /// Disable spoken cues
    #[arg(long)]
    no_voice: bool,
    /// Cue language (zh-CN or en)
    #[arg(long)]
    locale: Option<Locale>,
    /// Play the ambient melody
    #[arg(long)]
    music: bool,
    /// Ambient volume, 0-100
    #[arg(long)]
    volume: Option<u8>,
}

const HELP: &str =
    "keys: p pause/continue, s start, r reset, h hide, v voice on/off, m music on/off, vol N (0-100), q quit";

/// Stdin line command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    TogglePause,
    Start,
    Reset,
    Hide,
    ToggleVoice,
    ToggleMusic,
    Volume(u8),
    Quit,
}

fn parse_key(line: &str) -> Option<Key> {
    let line = line.trim();
    if let Some(rest) = line
        .strip_prefix("volume ")
        .or_else(|| line.strip_prefix("vol "))
    {
        return rest.trim().parse::<u8>().ok().map(|v| Key::Volume(v.min(100)));
    }
    match line {
        "p" | "pause" | "" => Some(Key::TogglePause),
        "s" | "start" => Some(Key::Start),
        "r" | "reset" => Some(Key::Reset),
        "h" | "hide" => Some(Key::Hide),
        "v" | "voice" => Some(Key::ToggleVoice),
        "m" | "music" => Some(Key::ToggleMusic),
        "q" | "quit" | "exit" => Some(Key::Quit),
        _ => None,
    }
}

fn build_dispatcher(args: &RunArgs, config: &Config) -> Dispatcher {
    let mut dispatcher = Dispatcher::new().with_presenter(TerminalPresenter::new(std::io::stdout()));

    let voice_enabled = config.voice.enabled && !args.no_voice;
    let locale = args.locale.unwrap_or(config.voice.locale);
    dispatcher = dispatcher.with_voice(TerminalVoice::new(locale, std::io::stdout()));
    dispatcher.set_voice_enabled(voice_enabled);

    let volume = args.volume.unwrap_or_else(|| config.volume()).min(100);
    dispatcher = dispatcher.with_ambient(SequencedAmbient::new(volume, TraceSink));
    dispatcher.set_ambient_enabled(config.music.enabled || args.music);
    dispatcher
}

async fn read_commands(
    handle: &DriverHandle,
    durations: PhaseDurations,
    mut voice_enabled: bool,
    mut music_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_key(&line) {
            Some(Key::TogglePause) => handle.toggle_pause().await?,
            Some(Key::Start) => handle.start(durations).await?,
            Some(Key::Reset) => handle.reset().await?,
            Some(Key::Hide) => handle.hide().await?,
            Some(Key::ToggleVoice) => {
                voice_enabled = !voice_enabled;
                handle.set_voice_enabled(voice_enabled).await?;
                println!("voice {}", if voice_enabled { "on" } else { "off" });
            }
            Some(Key::ToggleMusic) => {
                music_enabled = !music_enabled;
                handle.set_music_enabled(music_enabled).await?;
                println!("music {}", if music_enabled { "on" } else { "off" });
            }
            Some(Key::Volume(percent)) => {
                handle.set_volume(percent).await?;
                println!("volume {percent}");
            }
            Some(Key::Quit) => break,
            None => println!("{HELP}"),
        }
    }
    Ok(())
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let durations = resolve_durations(&config, args.contract, args.relax);
    let dispatcher = build_dispatcher(&args, &config);
    let voice_enabled = dispatcher.voice_enabled();
    let music_enabled = dispatcher.ambient_enabled();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let engine = runtime.block_on(async {
        let (handle, join) =
            TickDriver::spawn(PhaseEngine::with_durations(durations), dispatcher);
        println!("{HELP}");
        handle.start(durations).await?;

        let input = read_commands(&handle, durations, voice_enabled, music_enabled).await;
        handle.shutdown().await?;
        let engine = join.await?;
        input?;
        Ok::<_, Box<dyn std::error::Error>>(engine)
    })?;

    println!(
        "rounds completed: {}, total time: {} min",
        engine.total_rounds(),
        engine.total_minutes()
    );
    Ok(())
}
