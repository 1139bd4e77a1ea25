//! twin-runner: headless driver for the digital-twin replay core.
//!
//! Usage:
//!   twin-runner --data-dir ./database --generate 500 --polls 60 --train-after 20
//!   twin-runner --config twin.json --ipc-mode

use anyhow::Result;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use twin_core::{
    config::TwinConfig,
    engine::{CycleReport, TwinEngine},
    error::TwinError,
    modeling::TrainParams,
    synth::{self, SynthSpec},
};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Start,
    Poll {
        #[serde(default = "one")]
        count: u64,
    },
    Pause,
    Resume,
    Reset,
    Train {
        #[serde(default)]
        params: TrainParams,
    },
    GetState,
    SaveModel {
        path: String,
    },
    LoadModel {
        path: String,
    },
    Quit,
}

fn one() -> u64 { 1 }

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let polls = parse_arg(&args, "--polls", 50u64);
    let train_after = parse_arg(&args, "--train-after", 0u64);
    let generate = parse_arg(&args, "--generate", 0usize);
    let seed = parse_arg(&args, "--seed", 42u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./database");

    let mut config = match string_arg(&args, "--config") {
        Some(path) => TwinConfig::load(path)?,
        None => TwinConfig::default_test().with_data_dir(data_dir),
    };
    if let Some(path) = string_arg(&args, "--recording") {
        config.simulator.recording_path = PathBuf::from(path);
    }
    if let Some(path) = string_arg(&args, "--db") {
        config.simulator.database_path = PathBuf::from(path);
    }

    if !ipc_mode {
        println!("Digital Twin: twin-runner");
        println!("  recording:   {}", config.simulator.recording_path.display());
        println!("  database:    {}", config.simulator.database_path.display());
        println!("  polls:       {polls}");
        println!("  train after: {train_after}");
        println!();
    }

    if generate > 0 {
        if let Some(parent) = config.simulator.recording_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let spec = SynthSpec { rows: generate, seed, ..SynthSpec::default() };
        synth::generate(&config.simulator.recording_path, &spec)?;
    }

    let mut engine = TwinEngine::build(config);
    if let Some(path) = string_arg(&args, "--model-in") {
        engine.load_model(Path::new(path))?;
    }

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else {
        engine.start()?;
        let mut last = None;
        for poll in 1..=polls {
            if poll == train_after {
                let message = engine.train(&TrainParams::new())?;
                println!("  {message}");
            }
            last = Some(engine.poll()?);
        }
        if let Some(report) = last {
            print_summary(&report);
        }
        if let Some(path) = string_arg(&args, "--model-out") {
            engine.save_model(Path::new(path))?;
            println!("  model saved: {path}");
        }
    }

    Ok(())
}

fn run_ipc_loop(engine: &mut TwinEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("unparsable command: {e}");
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        // Failed commands are reported; the loop keeps going.
        let reply = match handle_command(engine, cmd) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("command failed: {e}");
                serde_json::json!({ "error": e.to_string(), "kind": format!("{:?}", e.kind()) })
            }
        };
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(
    engine: &mut TwinEngine,
    cmd: IpcCommand,
) -> Result<serde_json::Value, TwinError> {
    let value = match cmd {
        IpcCommand::Start => serde_json::to_value(engine.start()?)?,
        IpcCommand::Poll { count } => match engine.run_polls(count)? {
            Some(report) => serde_json::to_value(report)?,
            None => serde_json::to_value(engine.state()?)?,
        },
        IpcCommand::Pause => {
            engine.pause();
            serde_json::to_value(engine.state()?)?
        }
        IpcCommand::Resume => {
            engine.resume();
            serde_json::to_value(engine.state()?)?
        }
        IpcCommand::Reset => serde_json::to_value(engine.reset()?)?,
        IpcCommand::Train { params } => {
            let message = engine.train(&params)?;
            serde_json::json!({ "message": message })
        }
        IpcCommand::GetState => serde_json::to_value(engine.state()?)?,
        IpcCommand::SaveModel { path } => {
            engine.save_model(Path::new(&path))?;
            serde_json::json!({ "saved": path })
        }
        IpcCommand::LoadModel { path } => {
            engine.load_model(Path::new(&path))?;
            serde_json::json!({ "loaded": path })
        }
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn print_summary(report: &CycleReport) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:       {}", report.run_id);
    println!("  polls:        {}", report.poll);
    if let Some(clock) = report.clock {
        println!("  clock:        {} ({}s elapsed)", clock.current, clock.elapsed());
    }
    println!("  store rows:   {}", report.store_rows);
    println!("  remaining:    {}", report.remaining);
    println!("  trained:      {}", report.trained);
    println!("  predictions:  {}", report.predictions.len());

    println!();
    println!("=== MONITORING (latest) ===");
    match report.monitoring.last() {
        None => println!("  (no measurement yet)"),
        Some(row) => {
            for (name, value) in &row.values {
                let band = report
                    .measures
                    .get(name)
                    .map(|m| format!("[{}, {}]", m.min, m.max))
                    .unwrap_or_default();
                println!("  {name:<8} {value:>10.4}  band {band}");
            }
        }
    }
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
