// Interactive engine shell
//
// Reads one command per line from stdin and answers on stdout. Errors are
// printed as "error: ..." and never stop the loop.

use log::info;
use std::env;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use paper_football::ai::{Ai, Explanation, MctsAi};
use paper_football::config::Config;
use paper_football::debug_logger::{DebugLogEntry, DebugLogger};
use paper_football::geometry::{BoardParams, Geometry};
use paper_football::protocol::GameProtocol;
use paper_football::step::{format_steps, parse_steps};

const HELP: &str = "\
commands:
  new W H G F        start a game on a W x H board, goal G, free kick F
  load FILE [N]      replay a recorded game (JSON protocol), first N steps
  step S...          play steps (NW N NE E SE S SW W)
  undo [N]           take back N steps (default 1)
  go [explain]       let the engine answer and play its step
  set NAME VALUE     change an engine parameter
  params             list engine parameters
  status             show the position
  history            list played steps
  warns              list warnings of the last search
  help               this text
  quit               leave";

struct Shell {
    ai: MctsAi,
    logger: DebugLogger,
}

enum Flow {
    Continue,
    Quit,
}

impl Shell {
    fn new(config: &Config) -> Result<Self, String> {
        let geometry = Geometry::from_params(config.board.params())
            .map_err(|e| format!("Invalid board in config: {}", e))?;
        Ok(Shell {
            ai: MctsAi::new(Rc::new(geometry), config.ai_options()),
            logger: DebugLogger::new(config.debug.enabled, &config.debug.log_file_path),
        })
    }

    fn execute(&mut self, line: &str) -> Result<Flow, String> {
        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some(command) => command.to_ascii_lowercase(),
            None => return Ok(Flow::Continue),
        };
        let args: Vec<&str> = words.collect();

        match command.as_str() {
            "new" => self.new_game(&args)?,
            "load" => self.load(&args)?,
            "step" => {
                let steps = parse_steps(&args.join(" "))?;
                self.ai.do_steps(&steps).map_err(|e| e.to_string())?;
                println!("ok {}", self.ai.get_state());
            }
            "undo" => {
                let count = match args.first() {
                    Some(text) => text
                        .parse::<usize>()
                        .map_err(|e| format!("Invalid step count '{}': {}", text, e))?,
                    None => 1,
                };
                self.ai.undo_steps(count).map_err(|e| e.to_string())?;
                println!("ok {}", self.ai.get_state());
            }
            "go" => self.go(args.first().map_or(false, |arg| *arg == "explain"))?,
            "set" => {
                if args.len() != 2 {
                    return Err("usage: set NAME VALUE".to_string());
                }
                self.ai
                    .set_param_str(args[0], args[1])
                    .map_err(|e| e.to_string())?;
                println!("ok");
            }
            "params" => {
                for param in self.ai.get_params() {
                    println!("{} = {}", param.name, param.value);
                }
            }
            "status" => println!("{}", self.ai.status_line()),
            "history" => println!("{}", format_steps(self.ai.history().steps())),
            "warns" => {
                for warn in self.ai.warnings().iter() {
                    println!("{}", warn);
                }
            }
            "help" => println!("{}", HELP),
            "quit" | "exit" => return Ok(Flow::Quit),
            other => return Err(format!("Unknown command '{}', try help", other)),
        }
        Ok(Flow::Continue)
    }

    fn new_game(&mut self, args: &[&str]) -> Result<(), String> {
        if args.len() != 4 {
            return Err("usage: new WIDTH HEIGHT GOAL_WIDTH FREE_KICK_LEN".to_string());
        }
        let mut values = [0u32; 4];
        for (value, text) in values.iter_mut().zip(args) {
            *value = text
                .parse()
                .map_err(|e| format!("Invalid board parameter '{}': {}", text, e))?;
        }
        let params = BoardParams {
            width: values[0],
            height: values[1],
            goal_width: values[2],
            free_kick_len: values[3],
        };
        let geometry = Geometry::from_params(params).map_err(|e| e.to_string())?;
        self.ai.reset(Rc::new(geometry));
        info!("New game {}x{}, goal {}, free kick {}", values[0], values[1], values[2], values[3]);
        println!("ok {}", self.ai.get_state());
        Ok(())
    }

    fn load(&mut self, args: &[&str]) -> Result<(), String> {
        let path = args.first().ok_or("usage: load FILE [N]")?;
        let mut protocol = GameProtocol::from_file(path)?;
        if let Some(count) = args.get(1) {
            let count = count
                .parse::<usize>()
                .map_err(|e| format!("Invalid step count '{}': {}", count, e))?;
            protocol = protocol.prefix(count);
        }
        protocol.replay(&mut self.ai).map_err(|e| e.to_string())?;
        println!("ok {} ({} steps) {}", protocol.name, protocol.steps.len(), self.ai.get_state());
        Ok(())
    }

    fn go(&mut self, explain: bool) -> Result<(), String> {
        let mut explanation = Explanation::default();
        let step = match self.ai.go(Some(&mut explanation)) {
            Some(step) => step,
            None => return Err(self.ai.error().unwrap_or("no answer").to_string()),
        };

        if self.logger.is_enabled() {
            let entry = DebugLogEntry::new(
                self.ai.geometry().params(),
                self.ai.history().steps(),
                self.ai.get_state().active(),
                step,
                &explanation,
            );
            self.logger.log_answer(&entry);
        }

        if explain {
            println!(
                "time {:.3}s score {:.3} qthink {} cache {}/{} bad_alloc {}",
                explanation.time,
                explanation.score,
                explanation.qthink,
                explanation.cache.used,
                explanation.cache.total,
                explanation.cache.bad_alloc
            );
            for stat in &explanation.stats {
                println!(
                    "  {:<24} qgames {:>8} score {:.3}",
                    format_steps(&stat.steps),
                    stat.qgames,
                    stat.score
                );
            }
        }

        self.ai.do_step(step).map_err(|e| e.to_string())?;
        println!("go {}", step);
        Ok(())
    }
}

fn main() {
    // We default to 'info' level logging. But if the `RUST_LOG` environment variable is set,
    // we keep that value instead.
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    info!("Starting Paper Football engine...");

    let config = Config::load_or_default();
    let mut shell = match Shell::new(&config) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error reading stdin: {}", e);
                break;
            }
        };

        match shell.execute(&line) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => println!("error: {}", e),
        }
        // A closed stdout ends the session as well
        if io::stdout().flush().is_err() {
            break;
        }
    }
}
