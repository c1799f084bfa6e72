use std::net::TcpStream;
use std::thread;

use http::StatusCode;
use log::{info, warn};
use socketeer::http::HttpServer;
use socketeer::ws::{self, OpCode, Websocket};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:9001".to_owned());
    let server = HttpServer::bind(addr.as_str())?;
    info!("listening on {}", server.local_addr()?);

    for exchange in server.incoming() {
        let (request, mut response) = match exchange {
            Ok(exchange) => exchange,
            Err(err) => {
                warn!("unable to accept connection: {err}");
                continue;
            }
        };
        match ws::upgrade(&request, &mut response) {
            Ok(ws) => {
                thread::spawn(move || {
                    if let Err(err) = echo(ws) {
                        warn!("connection error: {err}");
                    }
                });
            }
            Err(err) => {
                warn!("{} {}: {err}", request.method(), request.uri());
                if response.is_attached() {
                    response.respond(StatusCode::BAD_REQUEST, b"websocket upgrade expected")?;
                }
            }
        }
    }
    Ok(())
}

fn echo(mut ws: Websocket<TcpStream>) -> anyhow::Result<()> {
    loop {
        let frame = ws.read()?;
        match frame.op_code {
            OpCode::Text | OpCode::Binary => ws.write(frame.payload)?,
            OpCode::Close => break,
            _ => {}
        }
    }
    ws.close()?;
    Ok(())
}
