// Replay tool for Paper Football debug logs
//
// Rebuilds every logged position and searches it again, so answers of an
// older build or parameter set can be compared with the current engine.
//
//   replay paper_debug.jsonl --all
//   replay paper_debug.jsonl --turns 3,6 --qthink 65536
//   replay paper_debug.jsonl --validate 3:sw|s,6:n

use std::env;
use std::process;

use paper_football::config::Config;
use paper_football::replay::ReplayEngine;
use paper_football::step::{parse_steps, Step};

fn print_usage() {
    eprintln!("Paper Football Replay Tool");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  replay <log_file> (--all | --turns <T,..> | --validate <T:S,..>) [OPTIONS]");
    eprintln!();
    eprintln!("MODES:");
    eprintln!("  --all                   Search every logged position again");
    eprintln!("  --turns <T1,T2,...>     Search only the given turns");
    eprintln!("  --validate <T:S,...>    Check logged answers, alternatives separated by '|'");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --config <path>         Engine configuration (default: Paper.toml)");
    eprintln!("  --qthink <N>            Override the simulated steps per answer");
    eprintln!("  --verbose               Log every replayed answer");
    eprintln!("  --help                  Show this help message");
}

enum Mode {
    All,
    Turns(Vec<usize>),
    Validate(Vec<(usize, Vec<Step>)>),
}

struct Options {
    log_file: String,
    config_path: String,
    qthink: Option<u32>,
    verbose: bool,
    mode: Mode,
}

fn parse_turns(text: &str) -> Result<Vec<usize>, String> {
    text.split(',')
        .map(|turn| {
            turn.trim()
                .parse::<usize>()
                .map_err(|e| format!("Invalid turn number '{}': {}", turn, e))
        })
        .collect()
}

/// Parses `turn:step|step,...`
fn parse_expected_steps(text: &str) -> Result<Vec<(usize, Vec<Step>)>, String> {
    text.split(',')
        .map(|item| {
            let mut parts = item.trim().splitn(2, ':');
            let turn = parts.next().unwrap_or("");
            let steps = parts
                .next()
                .ok_or_else(|| format!("Invalid item '{}', expected 'turn:step'", item))?;

            let turn = turn
                .parse::<usize>()
                .map_err(|e| format!("Invalid turn number '{}': {}", turn, e))?;
            let steps = parse_steps(&steps.replace('|', " "))?;
            if steps.is_empty() {
                return Err(format!("No steps given for turn {}", turn));
            }
            Ok((turn, steps))
        })
        .collect()
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let log_file = args.get(1).cloned().ok_or("Missing log file")?;
    let mut config_path = "Paper.toml".to_string();
    let mut qthink = None;
    let mut verbose = false;
    let mut mode = None;

    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        let mut value = |name: &str| {
            rest.next()
                .cloned()
                .ok_or_else(|| format!("{} requires an argument", name))
        };
        match arg.as_str() {
            "--all" => mode = Some(Mode::All),
            "--turns" => mode = Some(Mode::Turns(parse_turns(&value("--turns")?)?)),
            "--validate" => {
                mode = Some(Mode::Validate(parse_expected_steps(&value("--validate")?)?))
            }
            "--config" => config_path = value("--config")?,
            "--qthink" => {
                let text = value("--qthink")?;
                qthink = Some(
                    text.parse::<u32>()
                        .map_err(|e| format!("Invalid qthink '{}': {}", text, e))?,
                );
            }
            "--verbose" => verbose = true,
            other => return Err(format!("Unknown option '{}'", other)),
        }
    }

    let mode = mode.ok_or("Must specify --all, --turns, or --validate")?;
    Ok(Options {
        log_file,
        config_path,
        qthink,
        verbose,
        mode,
    })
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help") {
        print_usage();
        process::exit(0);
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            process::exit(1);
        }
    };

    let mut config = Config::from_file(&options.config_path).unwrap_or_else(|e| {
        eprintln!("Warning: {} ({}), using defaults", options.config_path, e);
        Config::default_hardcoded()
    });
    if let Some(qthink) = options.qthink {
        config.mcts.qthink = qthink;
    }
    println!(
        "Board {}x{}, qthink {}, C {}",
        config.board.width, config.board.height, config.mcts.qthink, config.mcts.c
    );

    let engine = ReplayEngine::new(config, options.verbose);
    let entries = match engine.load_log_file(&options.log_file) {
        Ok(entries) if entries.is_empty() => {
            eprintln!("Error: {} holds no answers", options.log_file);
            process::exit(1);
        }
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let results = match options.mode {
        Mode::All => engine.replay_all(&entries),
        Mode::Turns(turns) => engine.replay_turns(&entries, &turns),
        Mode::Validate(expected) => {
            match engine.validate_expected_moves(&entries, &expected) {
                Ok(()) => println!("✓ {} logged answer(s) as expected", expected.len()),
                Err(e) => {
                    eprintln!("✗ {}", e);
                    process::exit(1);
                }
            }
            return;
        }
    };

    match results {
        Ok(results) => engine.print_report(&results),
        Err(e) => {
            eprintln!("Error during replay: {}", e);
            process::exit(1);
        }
    }
}
