use std::io::{self, IsTerminal, Read};

use fd_core::app::{run_ask, run_chat, run_search};
use fd_core::cli::{parse_args, print_help, Invocation};
use fd_core::config::Config;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("hint: fleetdesk --help");
            std::process::exit(2);
        }
    };

    match invocation {
        Invocation::Help => {
            print_help();
            return;
        }
        Invocation::Version => {
            println!("fleetdesk {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        _ => {}
    }

    let config = Config::load_or_default();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    };

    let code = match invocation {
        Invocation::Search(search) => runtime.block_on(run_search(&config, &search)),
        Invocation::Ask(Some(prompt)) => runtime.block_on(run_ask(&config, &prompt)),
        Invocation::Ask(None) if io::stdin().is_terminal() => runtime.block_on(run_chat(&config)),
        Invocation::Ask(None) => {
            // Piped stdin: one exchange with the whole input as the prompt.
            let mut buf = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buf) {
                eprintln!("error: failed to read stdin: {e}");
                std::process::exit(1);
            }
            if buf.trim().is_empty() {
                eprintln!("error: no prompt given");
                std::process::exit(2);
            }
            runtime.block_on(run_ask(&config, buf.trim()))
        }
        Invocation::Help | Invocation::Version => 0,
    };
    std::process::exit(code);
}
