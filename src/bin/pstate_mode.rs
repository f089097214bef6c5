use std::path::PathBuf;
use std::process;

use pstate_thermald::config::DEFAULT_SOCKET_PATH;
use pstate_thermald::governor::Mode;
use pstate_thermald::server::{Request, Response, send_request};

fn print_usage(program: &str) {
    let modes: Vec<&str> = Mode::ALL.iter().map(|m| m.as_str()).collect();
    eprintln!("Usage: {program} <mode> [socket]");
    eprintln!("       {program} --get [socket]");
    eprintln!("  mode: one of {}", modes.join(", "));
    eprintln!("  socket: daemon control socket (default: {DEFAULT_SOCKET_PATH})");
    eprintln!();
    eprintln!("Example: sudo {program} powersave");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("pstate-mode");

    let Some(first) = args.get(1) else {
        print_usage(program);
        process::exit(1);
    };
    if first == "--help" || first == "-h" {
        print_usage(program);
        process::exit(0);
    }

    let request = if first == "--get" {
        Request::GetMode
    } else {
        Request::SetMode {
            mode: first.clone(),
        }
    };
    let socket = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH));

    match send_request(&socket, &request) {
        Ok(Response::Result(message)) => println!("{message}"),
        Ok(Response::Error(message)) => {
            eprintln!("Error: {message}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: cannot reach daemon at {}: {e}", socket.display());
            process::exit(1);
        }
    }
}
