//! A CLI wrapping `p9srv` with the bundled sample driver.
//!
//! Exists to exercise the library end-to-end and as a template for real
//! drivers; it is not itself a spec-mandated module.

mod driver;

use clap::{Parser, ValueEnum};
use log::info;

use driver::DemoDriver;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    Tcp,
    Stdio,
    HexStdio,
}

#[derive(Parser, Debug)]
#[command(name = "p9srv-demo", about = "Sample 9P2000 server over the p9srv library")]
struct Args {
    /// Which transport to serve the sample driver over.
    #[arg(long, value_enum, default_value_t = Transport::Tcp)]
    transport: Transport,

    /// Port to bind when `--transport tcp`.
    #[arg(long, default_value_t = 9999)]
    port: u16,

    /// Host to bind when `--transport tcp`.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Ceiling on the negotiated message size.
    #[arg(long, default_value_t = p9srv::fcall::DEFAULT_MSIZE)]
    msize: u32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let result = match args.transport {
        Transport::Tcp => {
            p9srv::transport::serve_tcp(DemoDriver::default, (args.host.as_str(), args.port), args.msize)
                .map_err(|e| e.to_string())
        }
        Transport::Stdio => {
            info!("serving over stdio");
            p9srv::transport::serve_stdio(DemoDriver::default(), args.msize).map_err(|e| e.to_string())
        }
        Transport::HexStdio => {
            info!("serving over hex-framed stdio");
            p9srv::transport::serve_hex_stdio(DemoDriver::default(), args.msize).map_err(|e| e.to_string())
        }
    };

    if let Err(e) = result {
        eprintln!("p9srv-demo: {e}");
        std::process::exit(1);
    }
}
