use std::io;
use std::net::UdpSocket;
use std::process::ExitCode;
use std::str::FromStr;

use log::error;
use rtp::Policy;

struct Args {
    port: u16,
    window_size: u32,
    policy: Policy,
}

fn parse_args() -> Result<Args, String> {
    let mut argv = std::env::args().skip(1);
    let port = argv
        .next()
        .ok_or("missing [Receiver Port]")?
        .parse::<u16>()
        .map_err(|e| e.to_string())?;
    let window_size = argv
        .next()
        .ok_or("missing [Window Size]")?
        .parse::<u32>()
        .map_err(|e| e.to_string())?;

    let mut policy = Policy::GoBackN;
    while let Some(flag) = argv.next() {
        match flag.as_str() {
            "--policy" => {
                let value = argv.next().ok_or("--policy requires a value")?;
                policy = Policy::from_str(&value)?;
            }
            other => return Err(format!("unrecognized argument '{other}'")),
        }
    }

    Ok(Args {
        port,
        window_size,
        policy,
    })
}

fn main() -> ExitCode {
    rtp::logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("Usage: rtp-receiver [Receiver Port] [Window Size] [--policy gbn|sr]");
            return ExitCode::FAILURE;
        }
    };

    let socket = match UdpSocket::bind(("127.0.0.1", args.port)) {
        Ok(socket) => socket,
        Err(e) => {
            error!("failed to bind to port {}: {e}", args.port);
            return ExitCode::FAILURE;
        }
    };
    eprintln!(
        "Receiver bound to port {}, window size: {}, policy: {}",
        args.port, args.window_size, args.policy
    );

    let stdout = io::stdout();
    let mut sink = stdout.lock();

    match rtp::receiver::run(&socket, args.window_size, args.policy, &mut sink) {
        Ok(()) => {
            eprintln!("Receiver socket closed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("receiver aborted: {e}");
            ExitCode::FAILURE
        }
    }
}
