use coresim_rs::{Config, ProcessHandle, Runtime, REPORT_FILE};
use std::io::{self, BufRead, Write};

const DEFAULT_CONFIG: &str = "config.txt";

fn print_banner() {
    println!("   ____ ___  ____  _____ ____ ___ __  __ ");
    println!("  / ___/ _ \\|  _ \\| ____/ ___|_ _|  \\/  |");
    println!(" | |  | | | | |_) |  _| \\___ \\| || |\\/| |");
    println!(" | |__| |_| |  _ <| |___ ___) | || |  | |");
    println!("  \\____\\___/|_| \\_\\_____|____/___|_|  |_|");
    println!("-------------------------------------------");
    println!("Tick-driven CPU scheduler emulator");
    println!("Type 'initialize' to load config.txt, 'exit' to quit.");
    println!("-------------------------------------------\n");
}

fn print_process_summary(process: &ProcessHandle) {
    let (current, total) = process.progress();
    println!("Process:   {}", process.name());
    println!("ID:        {}", process.id());
    println!("Created:   {}", process.created_at());
    println!("Status:    {}", process.status());
    println!("Core:      {}", process.core_assigned());
    println!("Progress:  {current} / {total}");
    if process.error_flag() {
        println!("Error:     faulted; see {}.txt", process.name());
    }
    let memory = process.memory_snapshot();
    if memory.is_empty() {
        println!("Memory:    (empty)");
    } else {
        println!("Memory:");
        for (name, value) in memory {
            println!("  {name} = {value}");
        }
    }
}

fn main() -> io::Result<()> {
    let mut args = std::env::args().skip(1);
    let mut config_path = DEFAULT_CONFIG.to_string();
    if let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                eprintln!("usage: coresim [config-path]");
                return Ok(());
            }
            path => config_path = path.to_string(),
        }
    }

    print_banner();

    let stdin = io::stdin();
    let mut runtime: Option<Runtime> = None;

    loop {
        print!("coresim> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break; // EOF behaves like `exit`
        }
        let mut tokens = input.split_whitespace();
        let Some(cmd) = tokens.next() else {
            continue;
        };

        match cmd {
            "exit" => {
                println!("Exiting...");
                break;
            }
            "initialize" => {
                if runtime.is_some() {
                    println!("Already initialized.");
                    continue;
                }
                match Config::load(&config_path) {
                    Ok((config, warnings)) => {
                        for warning in &warnings {
                            println!("config: {warning}");
                        }
                        let mut rt = Runtime::new(config);
                        rt.start();
                        runtime = Some(rt);
                        println!("System initialized.");
                    }
                    Err(err) => println!("{err}"),
                }
            }
            _ => {
                let Some(rt) = runtime.as_ref() else {
                    println!("Command not available. Please run 'initialize' first.");
                    continue;
                };
                match cmd {
                    "scheduler-start" => {
                        if rt.generator_start() {
                            println!("Batch generation started.");
                        } else {
                            println!("Batch generation already running.");
                        }
                    }
                    "scheduler-stop" => {
                        if rt.generator_stop() {
                            println!("Batch generation stopped.");
                        } else {
                            println!("Batch generation is not running.");
                        }
                    }
                    "screen" => match (tokens.next(), tokens.next()) {
                        (Some("-s"), Some(name)) => match rt.create_synthetic_process(name) {
                            Ok(process) => {
                                println!("Process '{name}' created and enqueued.");
                                print_process_summary(&process);
                            }
                            Err(err) => println!("{err}"),
                        },
                        (Some("-r"), Some(name)) => match rt.registry().lookup(name) {
                            Some(process) => print_process_summary(&process),
                            None => println!("No process found with the name '{name}'."),
                        },
                        (Some("-ls"), _) => print!("{}", rt.report().render()),
                        (Some("-s"), None) | (Some("-r"), None) => {
                            println!("Please provide a process name.");
                        }
                        _ => println!("Usage: screen -s <name> | screen -r <name> | screen -ls"),
                    },
                    "report-util" => match rt.report().write_to(REPORT_FILE) {
                        Ok(()) => println!("Report saved to {REPORT_FILE}"),
                        Err(err) => println!("Failed to write report: {err}"),
                    },
                    _ => println!("Unrecognized command."),
                }
            }
        }
    }

    if let Some(mut rt) = runtime.take() {
        rt.finish();
        rt.join_all();
    }
    Ok(())
}
