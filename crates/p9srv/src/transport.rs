//! Transport adapters that feed a [`Session`] with bytes.
//!
//! Every adapter here is strictly sequential: a [`TcpListener`] loop drains
//! one connection completely via a blocking `Session::run` before calling
//! `accept` again, matching this server's no-concurrency design. There is
//! no spawned thread anywhere in this module.

use std::io;
use std::net::{TcpListener, ToSocketAddrs};

use log::{error, info};

use crate::driver::Driver;
use crate::hexframe::{HexFrameReader, HexFrameWriter};
use crate::session::Session;

/// Serves one `Driver` instance over TCP, handling connections one at a
/// time, forever (or until a fatal I/O error on the listener itself).
pub fn serve_tcp<D, A>(mut driver_factory: impl FnMut() -> D, addr: A, msize: u32) -> io::Result<()>
where
    D: Driver,
    A: ToSocketAddrs,
{
    let listener = TcpListener::bind(addr)?;
    info!("listening on {:?}", listener.local_addr());

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                error!("accept failed: {e}");
                continue;
            }
        };
        info!("accepted connection from {:?}", stream.peer_addr());

        let reader = stream.try_clone()?;
        let mut session = Session::new(driver_factory(), msize);
        if let Err(e) = session.run(reader, stream) {
            error!("session ended: {e}");
        }
    }
    Ok(())
}

/// Serves one `Driver` instance over stdin/stdout, for one session.
pub fn serve_stdio<D: Driver>(driver: D, msize: u32) -> crate::error::Result<()> {
    let mut session = Session::new(driver, msize);
    session.run(io::stdin().lock(), io::stdout().lock())
}

/// Serves one `Driver` instance over stdin/stdout wrapped in the hex
/// framing layer, for one session.
pub fn serve_hex_stdio<D: Driver>(driver: D, msize: u32) -> crate::error::Result<()> {
    let mut session = Session::new(driver, msize);
    let reader = HexFrameReader::new(io::stdin().lock());
    let writer = HexFrameWriter::new(io::stdout().lock());
    session.run(reader, writer)
}
