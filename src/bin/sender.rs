use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::process::ExitCode;
use std::str::FromStr;

use log::error;
use rtp::Policy;

struct Args {
    receiver_ip: String,
    receiver_port: u16,
    window_size: u32,
    policy: Policy,
}

fn parse_args() -> Result<Args, String> {
    let mut argv = std::env::args().skip(1);
    let receiver_ip = argv.next().ok_or("missing [Receiver IP]")?;
    let receiver_port = argv
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
        receiver_ip,
        receiver_port,
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
            eprintln!(
                "Usage: rtp-sender [Receiver IP] [Receiver Port] [Window Size] [--policy gbn|sr] < [message]"
            );
            return ExitCode::FAILURE;
        }
    };

    let target: SocketAddr = match format!("{}:{}", args.receiver_ip, args.receiver_port).parse() {
        Ok(target) => target,
        Err(e) => {
            eprintln!("invalid receiver address: {e}");
            return ExitCode::FAILURE;
        }
    };

    let socket = match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => socket,
        Err(e) => {
            error!("failed to open a socket: {e}");
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let mut source = stdin.lock();

    match rtp::sender::run(&socket, target, args.window_size, args.policy, &mut source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("sender aborted: {e}");
            ExitCode::FAILURE
        }
    }
}
